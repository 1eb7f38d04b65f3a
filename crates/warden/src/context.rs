//! Who is performing an administrative call.

use warden_rbac::Session;

/// Authority under which an administrative operation runs.
///
/// There is no ambient "current admin": every administrative call names its
/// context explicitly.
#[derive(Debug, Clone, Copy)]
pub enum AdminContext<'a> {
    /// Unrestricted super-administrator. No delegated checks apply.
    System,
    /// A delegated administrator acting through the single admin role
    /// active in this session.
    Delegated(&'a Session),
}

impl<'a> AdminContext<'a> {
    pub fn session(&self) -> Option<&'a Session> {
        match self {
            Self::System => None,
            Self::Delegated(session) => Some(session),
        }
    }

    pub fn is_system(&self) -> bool {
        matches!(self, Self::System)
    }
}
