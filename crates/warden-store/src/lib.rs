//! # warden-store: Repository contracts
//!
//! The decision engine never owns entity state. It reads and writes through
//! the narrow repository traits defined here:
//!
//! | Trait                   | Entities                                              |
//! |-------------------------|-------------------------------------------------------|
//! | [`UserRepository`]      | users, credentials, role and admin-role assignments   |
//! | [`RoleRepository`]      | roles and admin roles                                 |
//! | [`HierarchyRepository`] | edges of the four hierarchy graphs                    |
//! | [`SdSetRepository`]     | SSD and DSD sets                                      |
//! | [`OrgUnitRepository`]   | user and perm organizational units                    |
//! | [`PermissionRepository`]| permission objects, permissions, grants, attribute sets |
//!
//! Every fallible call returns a [`StoreError`]. Implementations must reject
//! hierarchy edges that would create a cycle at write time, and must apply
//! each call atomically.
//!
//! [`MemoryStore`] is the reference implementation used by tests and
//! embedded deployments.

mod credential;
mod memory;

use std::collections::BTreeSet;

use thiserror::Error;
use warden_rbac::{Hierarchy, HierarchyError};
use warden_types::{
    AdminRole, HierarchyKind, OrgUnit, OuType, PermKey, PermObj, Permission, PermissionAttribute,
    PermissionAttributeSet, Role, SdSet, SdType, User, UserAdminRole, UserRole,
};

pub use memory::MemoryStore;

// ============================================================================
// Errors
// ============================================================================

/// Error type for repository calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} '{key}' already exists")]
    AlreadyExists { entity: &'static str, key: String },

    /// The write would break a referential rule of the store.
    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("invalid credential for user '{user_id}'")]
    InvalidCredential { user_id: String },

    #[error(transparent)]
    Hierarchy(#[from] HierarchyError),

    /// Transient backend failure. Callers may retry.
    #[error("backend unavailable: {0}")]
    Unavailable(String),
}

impl StoreError {
    pub fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }

    pub fn already_exists(entity: &'static str, key: impl Into<String>) -> Self {
        Self::AlreadyExists {
            entity,
            key: key.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

/// Result type for repository calls.
pub type Result<T> = std::result::Result<T, StoreError>;

// ============================================================================
// Repository traits
// ============================================================================

/// Identity repository.
pub trait UserRepository: Send + Sync {
    /// Creates a user. Assignment lists on `user` are ignored.
    fn add_user(&self, user: User, password: Option<&str>) -> Result<User>;

    /// Replaces the descriptive fields of a user (ou, description, props,
    /// temporal constraint, lock flags). Assignments are left unchanged.
    fn update_user(&self, user: User) -> Result<User>;

    /// Deletes a user with its assignments and direct permission grants.
    fn delete_user(&self, user_id: &str) -> Result<()>;

    fn read_user(&self, user_id: &str) -> Result<User>;

    /// Users whose id starts with `prefix`, in id order.
    fn find_users(&self, prefix: &str) -> Result<Vec<User>>;

    /// Verifies the password and returns the user.
    fn authenticate(&self, user_id: &str, password: &str) -> Result<User>;

    fn set_password(&self, user_id: &str, password: &str) -> Result<()>;

    fn set_locked(&self, user_id: &str, locked: bool) -> Result<()>;

    fn set_reset_required(&self, user_id: &str, reset_required: bool) -> Result<()>;

    /// Stores a new assignment. Fails if the user already has the role.
    fn assign_user(&self, assignment: UserRole) -> Result<()>;

    /// Replaces an existing assignment record (used for constraint edits).
    fn update_assignment(&self, assignment: UserRole) -> Result<()>;

    fn deassign_user(&self, user_id: &str, role: &str) -> Result<UserRole>;

    fn assign_admin_user(&self, assignment: UserAdminRole) -> Result<()>;

    fn deassign_admin_user(&self, user_id: &str, admin_role: &str) -> Result<UserAdminRole>;

    /// Ids of the users directly assigned `role`.
    fn assigned_users(&self, role: &str) -> Result<Vec<String>>;

    /// Ids of the users directly assigned any role in `roles`.
    fn users_assigned_any(&self, roles: &BTreeSet<String>) -> Result<Vec<String>>;

    /// Ids of the users directly assigned admin role `role`.
    fn admin_assigned_users(&self, role: &str) -> Result<Vec<String>>;
}

/// Role and admin-role repository.
pub trait RoleRepository: Send + Sync {
    /// Creates a role and its hierarchy node.
    fn add_role(&self, role: Role) -> Result<Role>;

    fn update_role(&self, role: Role) -> Result<Role>;

    /// Deletes a role with its hierarchy node, SD-set memberships,
    /// permission grants and user assignments.
    fn delete_role(&self, name: &str) -> Result<()>;

    fn read_role(&self, name: &str) -> Result<Role>;

    /// Roles whose name starts with `prefix`, in name order.
    fn find_roles(&self, prefix: &str) -> Result<Vec<Role>>;

    fn add_admin_role(&self, role: AdminRole) -> Result<AdminRole>;

    fn update_admin_role(&self, role: AdminRole) -> Result<AdminRole>;

    /// Deletes an admin role with its hierarchy node, grants and assignments.
    fn delete_admin_role(&self, name: &str) -> Result<()>;

    fn read_admin_role(&self, name: &str) -> Result<AdminRole>;

    fn find_admin_roles(&self, prefix: &str) -> Result<Vec<AdminRole>>;
}

/// Edges of the role, admin-role and OU hierarchies.
///
/// Nodes are created and removed together with their entities.
pub trait HierarchyRepository: Send + Sync {
    /// Snapshot of one hierarchy.
    fn hierarchy(&self, kind: HierarchyKind) -> Result<Hierarchy>;

    /// Adds `parent -> child`, rejecting cycles.
    fn add_inheritance(&self, kind: HierarchyKind, parent: &str, child: &str) -> Result<()>;

    fn delete_inheritance(&self, kind: HierarchyKind, parent: &str, child: &str) -> Result<()>;
}

/// Separation-of-duty set repository. SSD and DSD names are separate namespaces.
pub trait SdSetRepository: Send + Sync {
    fn add_sd_set(&self, set: SdSet) -> Result<SdSet>;

    /// Replaces members, cardinality and description.
    fn update_sd_set(&self, set: SdSet) -> Result<SdSet>;

    fn delete_sd_set(&self, sd_type: SdType, name: &str) -> Result<()>;

    fn read_sd_set(&self, sd_type: SdType, name: &str) -> Result<SdSet>;

    fn sd_sets(&self, sd_type: SdType) -> Result<Vec<SdSet>>;
}

/// Organizational unit repository.
pub trait OrgUnitRepository: Send + Sync {
    /// Creates a unit and its hierarchy node.
    fn add_org_unit(&self, ou: OrgUnit) -> Result<OrgUnit>;

    fn update_org_unit(&self, ou: OrgUnit) -> Result<OrgUnit>;

    /// Deletes a unit. Fails while users or permission objects reference it.
    fn delete_org_unit(&self, ou_type: OuType, name: &str) -> Result<()>;

    fn read_org_unit(&self, ou_type: OuType, name: &str) -> Result<OrgUnit>;

    fn org_units(&self, ou_type: OuType) -> Result<Vec<OrgUnit>>;
}

/// Permission repository.
pub trait PermissionRepository: Send + Sync {
    fn add_perm_obj(&self, obj: PermObj) -> Result<PermObj>;

    fn update_perm_obj(&self, obj: PermObj) -> Result<PermObj>;

    /// Deletes an object and every permission on it.
    fn delete_perm_obj(&self, obj_name: &str) -> Result<()>;

    fn read_perm_obj(&self, obj_name: &str) -> Result<PermObj>;

    fn find_perm_objs(&self, prefix: &str) -> Result<Vec<PermObj>>;

    /// Creates a permission. Grant sets on `perm` are ignored.
    fn add_permission(&self, perm: Permission) -> Result<Permission>;

    /// Replaces description, admin flag and attribute-set reference.
    fn update_permission(&self, perm: Permission) -> Result<Permission>;

    fn delete_permission(&self, key: &PermKey) -> Result<()>;

    fn read_permission(&self, key: &PermKey) -> Result<Permission>;

    /// Permissions on objects whose name starts with `prefix`.
    fn find_permissions(&self, prefix: &str) -> Result<Vec<Permission>>;

    /// Permissions granted to any role in `roles` or directly to `user_id`.
    fn permissions_granted(
        &self,
        roles: &BTreeSet<String>,
        user_id: Option<&str>,
    ) -> Result<Vec<Permission>>;

    fn grant_permission(&self, key: &PermKey, role: &str) -> Result<()>;

    fn revoke_permission(&self, key: &PermKey, role: &str) -> Result<()>;

    fn grant_permission_user(&self, key: &PermKey, user_id: &str) -> Result<()>;

    fn revoke_permission_user(&self, key: &PermKey, user_id: &str) -> Result<()>;

    fn add_attribute_set(&self, set: PermissionAttributeSet) -> Result<PermissionAttributeSet>;

    /// Deletes a set. Fails while a permission references it.
    fn delete_attribute_set(&self, name: &str) -> Result<()>;

    fn read_attribute_set(&self, name: &str) -> Result<PermissionAttributeSet>;

    fn add_attribute(&self, set: &str, attribute: PermissionAttribute) -> Result<()>;

    fn remove_attribute(&self, set: &str, attribute: &str) -> Result<()>;
}

/// Every repository contract the engine needs.
pub trait Repository:
    UserRepository
    + RoleRepository
    + HierarchyRepository
    + SdSetRepository
    + OrgUnitRepository
    + PermissionRepository
{
}

impl<T> Repository for T where
    T: UserRepository
        + RoleRepository
        + HierarchyRepository
        + SdSetRepository
        + OrgUnitRepository
        + PermissionRepository
{
}
