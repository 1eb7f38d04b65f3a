//! The engine's API surface, split by capability.
//!
//! [`Warden`](crate::Warden) implements all four traits. Callers that only
//! need decisions can depend on [`AccessCapability`] alone.

use std::collections::BTreeSet;

use warden_rbac::Session;
use warden_types::{
    AdminRole, ConstraintId, HierarchyKind, OrgUnit, OuType, PermKey, PermObj, Permission,
    PermissionAttribute, PermissionAttributeSet, Role, RoleConstraint, SdSet, SdType, User,
    UserAdminRole, UserRole,
};

use crate::access::AccessDecision;
use crate::context::AdminContext;
use crate::error::Result;

/// Sessions, activation and access decisions.
///
/// Every operation taking `&mut Session` first refreshes it: an expired
/// session fails with `SessionExpired`, and roles past their idle timeout
/// are deactivated with a warning.
pub trait AccessCapability {
    /// Authenticates with a password and opens a session.
    ///
    /// With `roles` of `None` every assigned role that passes its checks is
    /// activated and failures are recorded as session warnings. With an
    /// explicit list, any failing role fails the whole call.
    fn create_session(
        &self,
        user_id: &str,
        password: &str,
        roles: Option<&[&str]>,
    ) -> Result<Session>;

    /// Opens a session without verifying a password.
    fn create_trusted_session(&self, user_id: &str, roles: Option<&[&str]>) -> Result<Session>;

    fn check_access(&self, session: &mut Session, permission: &PermKey) -> Result<bool>;

    /// Like [`check_access`](Self::check_access), with the grant path and reason.
    fn explain_access(&self, session: &mut Session, permission: &PermKey)
    -> Result<AccessDecision>;

    /// Every permission reachable through the active-role closure or granted
    /// to the user directly.
    fn session_permissions(&self, session: &mut Session) -> Result<Vec<Permission>>;

    fn session_roles(&self, session: &mut Session) -> Result<Vec<UserRole>>;

    /// Active roles plus all inherited juniors.
    fn authorized_session_roles(&self, session: &mut Session) -> Result<BTreeSet<String>>;

    fn add_active_role(&self, session: &mut Session, role: &str) -> Result<()>;

    fn drop_active_role(&self, session: &mut Session, role: &str) -> Result<()>;

    fn end_session(&self, session: &mut Session);
}

/// User, role, permission, SoD and constraint administration.
pub trait AdminCapability {
    fn add_user(&self, ctx: AdminContext<'_>, user: User, password: Option<&str>) -> Result<User>;
    fn update_user(&self, ctx: AdminContext<'_>, user: User) -> Result<User>;
    fn delete_user(&self, ctx: AdminContext<'_>, user_id: &str) -> Result<()>;
    fn lock_user(&self, ctx: AdminContext<'_>, user_id: &str) -> Result<()>;
    fn unlock_user(&self, ctx: AdminContext<'_>, user_id: &str) -> Result<()>;
    /// Sets a new password and requires the user to change it.
    fn reset_password(&self, ctx: AdminContext<'_>, user_id: &str, password: &str) -> Result<()>;
    /// Replaces the password after verifying the old one.
    fn change_password(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()>;

    fn add_role(&self, ctx: AdminContext<'_>, role: Role) -> Result<Role>;
    fn update_role(&self, ctx: AdminContext<'_>, role: Role) -> Result<Role>;
    fn delete_role(&self, ctx: AdminContext<'_>, name: &str) -> Result<()>;

    /// Assigns a role after SSD validation. An unrestricted temporal
    /// constraint on `assignment` is replaced by the role's.
    fn assign_user(&self, ctx: AdminContext<'_>, assignment: UserRole) -> Result<UserRole>;
    fn deassign_user(&self, ctx: AdminContext<'_>, user_id: &str, role: &str) -> Result<()>;

    fn add_inheritance(&self, ctx: AdminContext<'_>, parent: &str, child: &str) -> Result<()>;
    fn delete_inheritance(&self, ctx: AdminContext<'_>, parent: &str, child: &str) -> Result<()>;
    /// Creates `parent` as a new direct senior of `child`.
    fn add_ascendant(&self, ctx: AdminContext<'_>, child: &str, parent: Role) -> Result<Role>;
    /// Creates `child` as a new direct junior of `parent`.
    fn add_descendant(&self, ctx: AdminContext<'_>, parent: &str, child: Role) -> Result<Role>;

    fn add_perm_obj(&self, ctx: AdminContext<'_>, obj: PermObj) -> Result<PermObj>;
    fn update_perm_obj(&self, ctx: AdminContext<'_>, obj: PermObj) -> Result<PermObj>;
    fn delete_perm_obj(&self, ctx: AdminContext<'_>, obj_name: &str) -> Result<()>;
    fn add_permission(&self, ctx: AdminContext<'_>, perm: Permission) -> Result<Permission>;
    fn update_permission(&self, ctx: AdminContext<'_>, perm: Permission) -> Result<Permission>;
    fn delete_permission(&self, ctx: AdminContext<'_>, key: &PermKey) -> Result<()>;
    fn grant_permission(&self, ctx: AdminContext<'_>, key: &PermKey, role: &str) -> Result<()>;
    fn revoke_permission(&self, ctx: AdminContext<'_>, key: &PermKey, role: &str) -> Result<()>;
    fn grant_permission_user(
        &self,
        ctx: AdminContext<'_>,
        key: &PermKey,
        user_id: &str,
    ) -> Result<()>;
    fn revoke_permission_user(
        &self,
        ctx: AdminContext<'_>,
        key: &PermKey,
        user_id: &str,
    ) -> Result<()>;

    fn add_attribute_set(
        &self,
        ctx: AdminContext<'_>,
        set: PermissionAttributeSet,
    ) -> Result<PermissionAttributeSet>;
    fn delete_attribute_set(&self, ctx: AdminContext<'_>, name: &str) -> Result<()>;
    fn add_permission_attribute(
        &self,
        ctx: AdminContext<'_>,
        set: &str,
        attribute: PermissionAttribute,
    ) -> Result<()>;
    fn remove_permission_attribute(
        &self,
        ctx: AdminContext<'_>,
        set: &str,
        attribute: &str,
    ) -> Result<()>;

    /// Creates an SSD or DSD set. Existing assignments and sessions are not
    /// re-validated.
    fn create_sd_set(&self, ctx: AdminContext<'_>, set: SdSet) -> Result<SdSet>;
    fn delete_sd_set(&self, ctx: AdminContext<'_>, sd_type: SdType, name: &str) -> Result<()>;
    fn add_sd_member(
        &self,
        ctx: AdminContext<'_>,
        sd_type: SdType,
        name: &str,
        role: &str,
    ) -> Result<SdSet>;
    fn remove_sd_member(
        &self,
        ctx: AdminContext<'_>,
        sd_type: SdType,
        name: &str,
        role: &str,
    ) -> Result<SdSet>;
    fn set_sd_cardinality(
        &self,
        ctx: AdminContext<'_>,
        sd_type: SdType,
        name: &str,
        cardinality: u32,
    ) -> Result<SdSet>;

    /// Attaches a constraint to an assignment and returns it with its new id.
    fn add_role_constraint(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        role: &str,
        constraint: RoleConstraint,
    ) -> Result<RoleConstraint>;
    fn remove_role_constraint(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        role: &str,
        constraint: &RoleConstraint,
    ) -> Result<()>;
    fn remove_role_constraint_by_id(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        role: &str,
        id: ConstraintId,
    ) -> Result<()>;
    fn enable_role_constraint(&self, ctx: AdminContext<'_>, role: &str, key: &str) -> Result<()>;
    /// Stops new constraints with `key`. Existing ones are kept.
    fn disable_role_constraint(&self, ctx: AdminContext<'_>, role: &str, key: &str)
    -> Result<()>;
}

/// Admin roles, organizational units and ARBAC02 decisions.
pub trait DelegatedCapability {
    fn add_admin_role(&self, ctx: AdminContext<'_>, role: AdminRole) -> Result<AdminRole>;
    fn update_admin_role(&self, ctx: AdminContext<'_>, role: AdminRole) -> Result<AdminRole>;
    fn delete_admin_role(&self, ctx: AdminContext<'_>, name: &str) -> Result<()>;
    fn assign_admin_user(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        admin_role: &str,
    ) -> Result<UserAdminRole>;
    fn deassign_admin_user(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        admin_role: &str,
    ) -> Result<()>;
    fn add_admin_inheritance(&self, ctx: AdminContext<'_>, parent: &str, child: &str)
    -> Result<()>;
    fn delete_admin_inheritance(
        &self,
        ctx: AdminContext<'_>,
        parent: &str,
        child: &str,
    ) -> Result<()>;
    fn add_admin_ascendant(
        &self,
        ctx: AdminContext<'_>,
        child: &str,
        parent: AdminRole,
    ) -> Result<AdminRole>;
    fn add_admin_descendant(
        &self,
        ctx: AdminContext<'_>,
        parent: &str,
        child: AdminRole,
    ) -> Result<AdminRole>;

    fn add_org_unit(&self, ctx: AdminContext<'_>, ou: OrgUnit) -> Result<OrgUnit>;
    fn update_org_unit(&self, ctx: AdminContext<'_>, ou: OrgUnit) -> Result<OrgUnit>;
    fn delete_org_unit(&self, ctx: AdminContext<'_>, ou_type: OuType, name: &str) -> Result<()>;
    fn add_org_inheritance(
        &self,
        ctx: AdminContext<'_>,
        ou_type: OuType,
        parent: &str,
        child: &str,
    ) -> Result<()>;
    fn delete_org_inheritance(
        &self,
        ctx: AdminContext<'_>,
        ou_type: OuType,
        parent: &str,
        child: &str,
    ) -> Result<()>;
    fn add_org_ascendant(&self, ctx: AdminContext<'_>, child: &str, parent: OrgUnit)
    -> Result<OrgUnit>;
    fn add_org_descendant(&self, ctx: AdminContext<'_>, parent: &str, child: OrgUnit)
    -> Result<OrgUnit>;

    fn add_active_admin_role(&self, session: &mut Session, role: &str) -> Result<()>;
    fn drop_active_admin_role(&self, session: &mut Session, role: &str) -> Result<()>;
    fn session_admin_roles(&self, session: &mut Session) -> Result<Vec<UserAdminRole>>;
    /// Checks an administrative permission through the active admin roles
    /// and their juniors in the admin-role hierarchy.
    fn check_admin_access(&self, session: &mut Session, permission: &PermKey) -> Result<bool>;

    fn can_assign(&self, session: &Session, user_id: &str, role: &str) -> Result<bool>;
    fn can_deassign(&self, session: &Session, user_id: &str, role: &str) -> Result<bool>;
    fn can_grant(&self, session: &Session, role: &str, permission: &PermKey) -> Result<bool>;
    fn can_revoke(&self, session: &Session, role: &str, permission: &PermKey) -> Result<bool>;
}

/// Read-only queries over the policy.
pub trait ReviewCapability {
    fn read_user(&self, user_id: &str) -> Result<User>;
    fn find_users(&self, prefix: &str) -> Result<Vec<User>>;
    fn read_role(&self, name: &str) -> Result<Role>;
    fn find_roles(&self, prefix: &str) -> Result<Vec<Role>>;
    fn read_admin_role(&self, name: &str) -> Result<AdminRole>;
    fn find_admin_roles(&self, prefix: &str) -> Result<Vec<AdminRole>>;
    fn read_perm_obj(&self, obj_name: &str) -> Result<PermObj>;
    fn find_perm_objs(&self, prefix: &str) -> Result<Vec<PermObj>>;
    fn read_permission(&self, key: &PermKey) -> Result<Permission>;
    fn find_permissions(&self, prefix: &str) -> Result<Vec<Permission>>;
    fn read_attribute_set(&self, name: &str) -> Result<PermissionAttributeSet>;
    fn read_org_unit(&self, ou_type: OuType, name: &str) -> Result<OrgUnit>;

    /// Strict juniors of `name` in the given hierarchy.
    fn descendants(&self, kind: HierarchyKind, name: &str) -> Result<BTreeSet<String>>;
    /// Strict seniors of `name` in the given hierarchy.
    fn ascendants(&self, kind: HierarchyKind, name: &str) -> Result<BTreeSet<String>>;

    /// Users directly assigned `role`.
    fn assigned_users(&self, role: &str) -> Result<Vec<String>>;
    fn assigned_roles(&self, user_id: &str) -> Result<Vec<UserRole>>;
    fn assigned_admin_roles(&self, user_id: &str) -> Result<Vec<UserAdminRole>>;
    /// Users assigned `role` or any of its seniors.
    fn authorized_users(&self, role: &str) -> Result<Vec<String>>;
    /// Assigned roles of `user_id` plus all inherited juniors.
    fn authorized_roles(&self, user_id: &str) -> Result<BTreeSet<String>>;

    /// Permissions granted to `role`, and with `inherited` to its juniors too.
    fn role_permissions(&self, role: &str, inherited: bool) -> Result<Vec<Permission>>;
    /// Permissions reachable through every assigned role or granted directly.
    fn user_permissions(&self, user_id: &str) -> Result<Vec<Permission>>;
    fn permission_roles(&self, key: &PermKey) -> Result<BTreeSet<String>>;
    /// Granted roles plus all their seniors.
    fn authorized_permission_roles(&self, key: &PermKey) -> Result<BTreeSet<String>>;
    fn permission_users(&self, key: &PermKey) -> Result<BTreeSet<String>>;

    /// SSD sets that constrain `role` directly or through an inherited junior.
    fn ssd_role_sets(&self, role: &str) -> Result<Vec<SdSet>>;
    fn dsd_role_sets(&self, role: &str) -> Result<Vec<SdSet>>;
    fn read_ssd_set(&self, name: &str) -> Result<SdSet>;
    fn read_dsd_set(&self, name: &str) -> Result<SdSet>;

    fn role_constraints(&self, user_id: &str, role: &str) -> Result<Vec<RoleConstraint>>;
}
