//! Salted password digests.

use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

#[derive(Clone)]
pub(crate) struct Credential {
    salt: [u8; 16],
    digest: [u8; 32],
}

impl Credential {
    /// Hashes `password` under a fresh random salt.
    pub(crate) fn new(password: &str) -> Self {
        let salt = *Uuid::new_v4().as_bytes();
        let digest = hash(&salt, password);
        Self { salt, digest }
    }

    /// Compares in constant time with respect to the digest.
    pub(crate) fn verify(&self, password: &str) -> bool {
        let candidate = hash(&self.salt, password);
        candidate[..].ct_eq(&self.digest[..]).into()
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Credential(..)")
    }
}

fn hash(salt: &[u8; 16], password: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(password.as_bytes());
    let mut out = [0u8; 32];
    out.copy_from_slice(&hasher.finalize());
    out
}
