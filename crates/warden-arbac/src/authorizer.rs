//! ARBAC02 delegated-administration decisions.
//!
//! An admin session acts through exactly one active admin role. That role
//! scopes the administrator to subtrees of the user-OU and perm-OU
//! hierarchies and to a range of the role hierarchy:
//!
//! | Operation             | OU checked                     | Role checked        |
//! |-----------------------|--------------------------------|---------------------|
//! | assign / deassign     | target user's OU in `user_ous` | role in role range  |
//! | grant / revoke        | perm object's OU in `perm_ous` | role in role range  |
//! | admin (de)assign      | target user's OU in `user_ous` | admin role at or below the acting one |
//!
//! Decisions are pure range-membership computations; nothing is mutated.

use thiserror::Error;
use tracing::{debug, info};
use warden_rbac::{Hierarchy, Session};
use warden_types::{AdminRole, PermObj, User};

use crate::range::{ou_in_scope, role_in_range};

/// Error type for delegated-administration checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DelegationError {
    /// The session does not carry exactly one active admin role.
    #[error("admin session must have exactly one active admin role, found {found}")]
    AdminRoleCount { found: usize },

    /// The target organizational unit is outside the admin role's scope.
    #[error("admin role '{admin_role}' does not administer {ou_kind} '{ou}'")]
    OuOutOfRange {
        admin_role: String,
        ou_kind: &'static str,
        ou: String,
    },

    /// The target role is outside the admin role's role range.
    #[error("role '{role}' is outside the role range of admin role '{admin_role}'")]
    RoleOutOfRange { admin_role: String, role: String },

    /// The target admin role is not the acting admin role or one of its juniors.
    #[error("admin role '{target}' is not administered by admin role '{admin_role}'")]
    AdminRoleOutOfRange { admin_role: String, target: String },
}

/// Result type for delegated-administration checks.
pub type Result<T> = std::result::Result<T, DelegationError>;

/// Returns the single active admin role of `session`.
pub fn session_admin_role(session: &Session) -> Result<&str> {
    match session.active_admin_roles() {
        [only] => Ok(only.role_name.as_str()),
        other => Err(DelegationError::AdminRoleCount { found: other.len() }),
    }
}

/// Evaluates ARBAC02 checks over the role and OU hierarchies.
#[derive(Debug, Clone, Copy)]
pub struct Authorizer<'a> {
    roles: &'a Hierarchy,
    user_ous: &'a Hierarchy,
    perm_ous: &'a Hierarchy,
}

impl<'a> Authorizer<'a> {
    pub fn new(roles: &'a Hierarchy, user_ous: &'a Hierarchy, perm_ous: &'a Hierarchy) -> Self {
        Self {
            roles,
            user_ous,
            perm_ous,
        }
    }

    /// Checks that `admin` may assign `role` to `user`.
    pub fn check_assign(&self, admin: &AdminRole, user: &User, role: &str) -> Result<()> {
        self.check_user_ou(admin, user)?;
        self.check_role(admin, role)
    }

    /// Deassignment uses the same scope as assignment.
    pub fn check_deassign(&self, admin: &AdminRole, user: &User, role: &str) -> Result<()> {
        self.check_assign(admin, user, role)
    }

    /// Checks that `admin` may grant a permission on `object` to `role`.
    pub fn check_grant(&self, admin: &AdminRole, object: &PermObj, role: &str) -> Result<()> {
        if !ou_in_scope(self.perm_ous, &admin.perm_ous, &object.ou) {
            info!(admin_role = %admin.name, object = %object.obj_name, ou = %object.ou, "Perm OU out of range");
            return Err(DelegationError::OuOutOfRange {
                admin_role: admin.name.clone(),
                ou_kind: "perm org unit",
                ou: object.ou.clone(),
            });
        }
        self.check_role(admin, role)
    }

    /// Revocation uses the same scope as granting.
    pub fn check_revoke(&self, admin: &AdminRole, object: &PermObj, role: &str) -> Result<()> {
        self.check_grant(admin, object, role)
    }

    /// Checks that `admin` may assign or deassign admin role `target` for `user`.
    ///
    /// `target` must be `admin` itself or a junior of it in `admin_roles`,
    /// so an administrator can never hand out more scope than it holds.
    pub fn check_admin_assign(
        &self,
        admin: &AdminRole,
        admin_roles: &Hierarchy,
        user: &User,
        target: &str,
    ) -> Result<()> {
        self.check_user_ou(admin, user)?;
        if target != admin.name && !admin_roles.is_ascendant_of(&admin.name, target) {
            info!(admin_role = %admin.name, target, "Admin role out of range");
            return Err(DelegationError::AdminRoleOutOfRange {
                admin_role: admin.name.clone(),
                target: target.to_string(),
            });
        }
        Ok(())
    }

    pub fn can_assign(&self, admin: &AdminRole, user: &User, role: &str) -> bool {
        self.check_assign(admin, user, role).is_ok()
    }

    pub fn can_deassign(&self, admin: &AdminRole, user: &User, role: &str) -> bool {
        self.check_deassign(admin, user, role).is_ok()
    }

    pub fn can_grant(&self, admin: &AdminRole, object: &PermObj, role: &str) -> bool {
        self.check_grant(admin, object, role).is_ok()
    }

    pub fn can_revoke(&self, admin: &AdminRole, object: &PermObj, role: &str) -> bool {
        self.check_revoke(admin, object, role).is_ok()
    }

    fn check_user_ou(&self, admin: &AdminRole, user: &User) -> Result<()> {
        if !ou_in_scope(self.user_ous, &admin.user_ous, &user.ou) {
            info!(admin_role = %admin.name, user = %user.user_id, ou = %user.ou, "User OU out of range");
            return Err(DelegationError::OuOutOfRange {
                admin_role: admin.name.clone(),
                ou_kind: "user org unit",
                ou: user.ou.clone(),
            });
        }
        Ok(())
    }

    fn check_role(&self, admin: &AdminRole, role: &str) -> Result<()> {
        let in_range = admin
            .role_range
            .as_ref()
            .is_some_and(|range| role_in_range(self.roles, range, role));
        if !in_range {
            info!(admin_role = %admin.name, role, "Role out of range");
            return Err(DelegationError::RoleOutOfRange {
                admin_role: admin.name.clone(),
                role: role.to_string(),
            });
        }
        debug!(admin_role = %admin.name, role, "Delegated operation within range");
        Ok(())
    }
}
