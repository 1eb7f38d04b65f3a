//! Activation gating on user properties.
//!
//! `User`-typed constraints on an assignment restrict when the role may be
//! activated: for every key enabled on the role that the assignment carries
//! constraints for, the user's property with that key must equal one of the
//! constraint values.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;
use warden_rbac::ActivationGate;
use warden_types::{ConstraintType, Role, User, UserRole};

/// [`ActivationGate`] backed by the enabled constraint keys of each role.
#[derive(Debug, Clone, Default)]
pub struct UserAttributeGate {
    enabled_keys: BTreeMap<String, BTreeSet<String>>,
}

impl UserAttributeGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a gate from the roles that may be activated.
    pub fn from_roles<'a>(roles: impl IntoIterator<Item = &'a Role>) -> Self {
        let enabled_keys = roles
            .into_iter()
            .map(|r| (r.name.clone(), r.constraint_keys.clone()))
            .collect();
        Self { enabled_keys }
    }

    pub fn with_role(mut self, role: &Role) -> Self {
        self.enabled_keys
            .insert(role.name.clone(), role.constraint_keys.clone());
        self
    }

    /// Evaluates the gate for one assignment.
    pub fn evaluate(&self, user: &User, assignment: &UserRole) -> Result<(), String> {
        let Some(keys) = self.enabled_keys.get(&assignment.role_name) else {
            return Ok(());
        };

        for key in keys {
            let allowed: Vec<&str> = assignment
                .constraints_for(ConstraintType::User, key)
                .map(|c| c.value.as_str())
                .collect();
            if allowed.is_empty() {
                continue;
            }
            match user.props.get(key) {
                Some(actual) if allowed.contains(&actual.as_str()) => {
                    debug!(user = %user.user_id, role = %assignment.role_name, key = %key, "User constraint satisfied");
                }
                Some(actual) => {
                    return Err(format!(
                        "user attribute '{key}' is '{actual}', expected one of {allowed:?}"
                    ));
                }
                None => return Err(format!("user attribute '{key}' is not set")),
            }
        }
        Ok(())
    }
}

impl ActivationGate for UserAttributeGate {
    fn check(&self, user: &User, assignment: &UserRole) -> Result<(), String> {
        self.evaluate(user, assignment)
    }
}
