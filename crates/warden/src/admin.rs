//! Administration of users, roles, permissions, SoD sets and constraints.
//!
//! Every operation authorizes its [`AdminContext`] first, then runs its
//! checks and the repository write under the engine's write guard, so a
//! rejected check never leaves partial state.

use tracing::{debug, info, warn};
use warden_abac::constraint;
use warden_store::StoreError;
use warden_types::{
    ConstraintId, HierarchyKind, PermKey, PermObj, Permission, PermissionAttribute,
    PermissionAttributeSet, Role, RoleConstraint, SdSet, SdType, User, UserRole,
};

use crate::capability::AdminCapability;
use crate::context::AdminContext;
use crate::engine::{ADMIN_OBJECT, Warden};
use crate::error::{Result, WardenError};

fn user_error(user_id: &str) -> impl FnOnce(StoreError) -> WardenError + '_ {
    move |e| match e {
        StoreError::NotFound { entity: "user", .. } => WardenError::UserNotFound(user_id.to_string()),
        other => other.into(),
    }
}

fn require_name(what: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(WardenError::InvalidInput(format!("{what} name must not be empty")));
    }
    Ok(())
}

fn require_cardinality(set: &str, cardinality: u32) -> Result<()> {
    if cardinality < SdSet::MIN_CARDINALITY {
        return Err(WardenError::InvalidCardinality {
            set: set.to_string(),
            cardinality,
        });
    }
    Ok(())
}

impl Warden {
    fn assignment_of(&self, user_id: &str, role: &str) -> Result<UserRole> {
        let user = self.read_user_or_missing(user_id)?;
        user.user_role(role)
            .cloned()
            .ok_or_else(|| WardenError::NotAssigned {
                user_id: user_id.to_string(),
                role: role.to_string(),
            })
    }

    fn edit_sd_set(
        &self,
        sd_type: SdType,
        name: &str,
        edit: impl FnOnce(&mut SdSet) -> Result<()>,
    ) -> Result<SdSet> {
        let _guard = self.write_guard()?;
        let mut set = self.store().read_sd_set(sd_type, name)?;
        edit(&mut set)?;
        let set = self.store().update_sd_set(set)?;
        info!(set = %set.name, kind = %sd_type, members = set.members.len(), cardinality = set.cardinality, "SD set updated");
        Ok(set)
    }
}

impl AdminCapability for Warden {
    // ========================================================================
    // Users
    // ========================================================================

    fn add_user(&self, ctx: AdminContext<'_>, user: User, password: Option<&str>) -> Result<User> {
        self.authorize(ctx, ADMIN_OBJECT, "add_user")?;
        require_name("user", &user.user_id)?;
        let _guard = self.write_guard()?;
        let user = self.store().add_user(user, password)?;
        info!(user = %user.user_id, ou = %user.ou, "User added");
        Ok(user)
    }

    fn update_user(&self, ctx: AdminContext<'_>, user: User) -> Result<User> {
        self.authorize(ctx, ADMIN_OBJECT, "update_user")?;
        let _guard = self.write_guard()?;
        let user_id = user.user_id.clone();
        self.store().update_user(user).map_err(user_error(&user_id))
    }

    fn delete_user(&self, ctx: AdminContext<'_>, user_id: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "delete_user")?;
        if self.config().admin.is_protected_user(user_id) {
            warn!(user = %user_id, "Refusing to delete protected user");
            return Err(WardenError::PolicyViolation(format!(
                "user '{user_id}' is protected"
            )));
        }
        let _guard = self.write_guard()?;
        self.store().delete_user(user_id).map_err(user_error(user_id))?;
        info!(user = %user_id, "User deleted");
        Ok(())
    }

    fn lock_user(&self, ctx: AdminContext<'_>, user_id: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "lock_user")?;
        let _guard = self.write_guard()?;
        self.store()
            .set_locked(user_id, true)
            .map_err(user_error(user_id))?;
        info!(user = %user_id, "User locked");
        Ok(())
    }

    fn unlock_user(&self, ctx: AdminContext<'_>, user_id: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "unlock_user")?;
        let _guard = self.write_guard()?;
        self.store()
            .set_locked(user_id, false)
            .map_err(user_error(user_id))?;
        info!(user = %user_id, "User unlocked");
        Ok(())
    }

    fn reset_password(&self, ctx: AdminContext<'_>, user_id: &str, password: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "reset_password")?;
        let _guard = self.write_guard()?;
        self.store()
            .set_password(user_id, password)
            .map_err(user_error(user_id))?;
        self.store()
            .set_reset_required(user_id, true)
            .map_err(user_error(user_id))?;
        info!(user = %user_id, "Password reset");
        Ok(())
    }

    fn change_password(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        old_password: &str,
        new_password: &str,
    ) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "change_password")?;
        let _guard = self.write_guard()?;
        self.store()
            .authenticate(user_id, old_password)
            .map_err(user_error(user_id))?;
        self.store()
            .set_password(user_id, new_password)
            .map_err(user_error(user_id))?;
        self.store()
            .set_reset_required(user_id, false)
            .map_err(user_error(user_id))?;
        info!(user = %user_id, "Password changed");
        Ok(())
    }

    // ========================================================================
    // Roles and assignments
    // ========================================================================

    fn add_role(&self, ctx: AdminContext<'_>, role: Role) -> Result<Role> {
        self.authorize(ctx, ADMIN_OBJECT, "add_role")?;
        require_name("role", &role.name)?;
        let _guard = self.write_guard()?;
        let role = self.store().add_role(role)?;
        info!(role = %role.name, "Role added");
        Ok(role)
    }

    fn update_role(&self, ctx: AdminContext<'_>, role: Role) -> Result<Role> {
        self.authorize(ctx, ADMIN_OBJECT, "update_role")?;
        let _guard = self.write_guard()?;
        Ok(self.store().update_role(role)?)
    }

    fn delete_role(&self, ctx: AdminContext<'_>, name: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "delete_role")?;
        if self.config().admin.is_protected_role(name) {
            warn!(role = %name, "Refusing to delete protected role");
            return Err(WardenError::PolicyViolation(format!("role '{name}' is protected")));
        }
        let _guard = self.write_guard()?;
        self.store().delete_role(name)?;
        info!(role = %name, "Role deleted");
        Ok(())
    }

    fn assign_user(&self, ctx: AdminContext<'_>, mut assignment: UserRole) -> Result<UserRole> {
        let admin = self.authorize(ctx, ADMIN_OBJECT, "assign_user")?;
        let _guard = self.write_guard()?;
        let user = self.read_user_or_missing(&assignment.user_id)?;
        let role = self.store().read_role(&assignment.role_name)?;

        if let Some(admin) = &admin {
            self.delegation_graphs()?
                .authorizer()
                .check_assign(admin, &user, &role.name)?;
        }
        if user.is_assigned(&role.name) {
            return Err(WardenError::AlreadyAssigned {
                user_id: user.user_id,
                role: role.name,
            });
        }
        if self.config().sod.ssd_enabled {
            let snapshot = self.snapshot()?;
            snapshot
                .ssd()
                .validate_ssd(user.roles.iter().map(|ur| ur.role_name.as_str()), &role.name)?;
        }

        if assignment.temporal.is_unrestricted() {
            assignment.temporal = role.temporal.clone();
        }
        for c in std::mem::take(&mut assignment.constraints) {
            constraint::add(&role, &mut assignment, c)?;
        }

        self.store().assign_user(assignment.clone())?;
        info!(user = %assignment.user_id, role = %assignment.role_name, "Role assigned");
        Ok(assignment)
    }

    fn deassign_user(&self, ctx: AdminContext<'_>, user_id: &str, role: &str) -> Result<()> {
        let admin = self.authorize(ctx, ADMIN_OBJECT, "deassign_user")?;
        let _guard = self.write_guard()?;
        let user = self.read_user_or_missing(user_id)?;
        if let Some(admin) = &admin {
            self.delegation_graphs()?
                .authorizer()
                .check_deassign(admin, &user, role)?;
        }
        if !user.is_assigned(role) {
            return Err(WardenError::NotAssigned {
                user_id: user_id.to_string(),
                role: role.to_string(),
            });
        }
        self.store().deassign_user(user_id, role)?;
        info!(user = %user_id, role = %role, "Role deassigned");
        Ok(())
    }

    // ========================================================================
    // Role hierarchy
    // ========================================================================

    fn add_inheritance(&self, ctx: AdminContext<'_>, parent: &str, child: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "add_inheritance")?;
        let _guard = self.write_guard()?;
        self.store()
            .add_inheritance(HierarchyKind::Role, parent, child)?;
        info!(parent = %parent, child = %child, "Role inheritance added");
        Ok(())
    }

    fn delete_inheritance(&self, ctx: AdminContext<'_>, parent: &str, child: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "delete_inheritance")?;
        let _guard = self.write_guard()?;
        self.store()
            .delete_inheritance(HierarchyKind::Role, parent, child)?;
        info!(parent = %parent, child = %child, "Role inheritance removed");
        Ok(())
    }

    fn add_ascendant(&self, ctx: AdminContext<'_>, child: &str, parent: Role) -> Result<Role> {
        self.authorize(ctx, ADMIN_OBJECT, "add_ascendant")?;
        require_name("role", &parent.name)?;
        let _guard = self.write_guard()?;
        self.store().read_role(child)?;
        let name = parent.name.clone();
        self.create_then_link(
            || Ok(self.store().add_role(parent)?),
            || Ok(self.store().add_inheritance(HierarchyKind::Role, &name, child)?),
            || Ok(self.store().delete_role(&name)?),
        )
    }

    fn add_descendant(&self, ctx: AdminContext<'_>, parent: &str, child: Role) -> Result<Role> {
        self.authorize(ctx, ADMIN_OBJECT, "add_descendant")?;
        require_name("role", &child.name)?;
        let _guard = self.write_guard()?;
        self.store().read_role(parent)?;
        let name = child.name.clone();
        self.create_then_link(
            || Ok(self.store().add_role(child)?),
            || Ok(self.store().add_inheritance(HierarchyKind::Role, parent, &name)?),
            || Ok(self.store().delete_role(&name)?),
        )
    }

    // ========================================================================
    // Permissions
    // ========================================================================

    fn add_perm_obj(&self, ctx: AdminContext<'_>, obj: PermObj) -> Result<PermObj> {
        self.authorize(ctx, ADMIN_OBJECT, "add_perm_obj")?;
        require_name("permission object", &obj.obj_name)?;
        let _guard = self.write_guard()?;
        let obj = self.store().add_perm_obj(obj)?;
        info!(object = %obj.obj_name, ou = %obj.ou, "Permission object added");
        Ok(obj)
    }

    fn update_perm_obj(&self, ctx: AdminContext<'_>, obj: PermObj) -> Result<PermObj> {
        self.authorize(ctx, ADMIN_OBJECT, "update_perm_obj")?;
        let _guard = self.write_guard()?;
        Ok(self.store().update_perm_obj(obj)?)
    }

    fn delete_perm_obj(&self, ctx: AdminContext<'_>, obj_name: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "delete_perm_obj")?;
        let _guard = self.write_guard()?;
        self.store().delete_perm_obj(obj_name)?;
        info!(object = %obj_name, "Permission object deleted");
        Ok(())
    }

    fn add_permission(&self, ctx: AdminContext<'_>, perm: Permission) -> Result<Permission> {
        self.authorize(ctx, ADMIN_OBJECT, "add_permission")?;
        require_name("operation", &perm.op_name)?;
        let _guard = self.write_guard()?;
        let perm = self.store().add_permission(perm)?;
        info!(permission = %perm.key(), "Permission added");
        Ok(perm)
    }

    fn update_permission(&self, ctx: AdminContext<'_>, perm: Permission) -> Result<Permission> {
        self.authorize(ctx, ADMIN_OBJECT, "update_permission")?;
        let _guard = self.write_guard()?;
        Ok(self.store().update_permission(perm)?)
    }

    fn delete_permission(&self, ctx: AdminContext<'_>, key: &PermKey) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "delete_permission")?;
        let _guard = self.write_guard()?;
        self.store().delete_permission(key)?;
        info!(permission = %key, "Permission deleted");
        Ok(())
    }

    fn grant_permission(&self, ctx: AdminContext<'_>, key: &PermKey, role: &str) -> Result<()> {
        let admin = self.authorize(ctx, ADMIN_OBJECT, "grant_permission")?;
        let _guard = self.write_guard()?;
        if let Some(admin) = &admin {
            let object = self.store().read_perm_obj(&key.obj_name)?;
            self.delegation_graphs()?
                .authorizer()
                .check_grant(admin, &object, role)?;
        }
        self.store().grant_permission(key, role)?;
        info!(permission = %key, role = %role, "Permission granted");
        Ok(())
    }

    fn revoke_permission(&self, ctx: AdminContext<'_>, key: &PermKey, role: &str) -> Result<()> {
        let admin = self.authorize(ctx, ADMIN_OBJECT, "revoke_permission")?;
        let _guard = self.write_guard()?;
        if let Some(admin) = &admin {
            let object = self.store().read_perm_obj(&key.obj_name)?;
            self.delegation_graphs()?
                .authorizer()
                .check_revoke(admin, &object, role)?;
        }
        self.store().revoke_permission(key, role)?;
        info!(permission = %key, role = %role, "Permission revoked");
        Ok(())
    }

    fn grant_permission_user(
        &self,
        ctx: AdminContext<'_>,
        key: &PermKey,
        user_id: &str,
    ) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "grant_permission_user")?;
        let _guard = self.write_guard()?;
        self.store()
            .grant_permission_user(key, user_id)
            .map_err(user_error(user_id))?;
        info!(permission = %key, user = %user_id, "Permission granted to user");
        Ok(())
    }

    fn revoke_permission_user(
        &self,
        ctx: AdminContext<'_>,
        key: &PermKey,
        user_id: &str,
    ) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "revoke_permission_user")?;
        let _guard = self.write_guard()?;
        self.store().revoke_permission_user(key, user_id)?;
        info!(permission = %key, user = %user_id, "Permission revoked from user");
        Ok(())
    }

    fn add_attribute_set(
        &self,
        ctx: AdminContext<'_>,
        set: PermissionAttributeSet,
    ) -> Result<PermissionAttributeSet> {
        self.authorize(ctx, ADMIN_OBJECT, "add_attribute_set")?;
        require_name("attribute set", &set.name)?;
        let _guard = self.write_guard()?;
        Ok(self.store().add_attribute_set(set)?)
    }

    fn delete_attribute_set(&self, ctx: AdminContext<'_>, name: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "delete_attribute_set")?;
        let _guard = self.write_guard()?;
        Ok(self.store().delete_attribute_set(name)?)
    }

    fn add_permission_attribute(
        &self,
        ctx: AdminContext<'_>,
        set: &str,
        attribute: PermissionAttribute,
    ) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "add_permission_attribute")?;
        require_name("attribute", &attribute.name)?;
        let _guard = self.write_guard()?;
        Ok(self.store().add_attribute(set, attribute)?)
    }

    fn remove_permission_attribute(
        &self,
        ctx: AdminContext<'_>,
        set: &str,
        attribute: &str,
    ) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "remove_permission_attribute")?;
        let _guard = self.write_guard()?;
        Ok(self.store().remove_attribute(set, attribute)?)
    }

    // ========================================================================
    // Separation of duty
    // ========================================================================

    fn create_sd_set(&self, ctx: AdminContext<'_>, set: SdSet) -> Result<SdSet> {
        self.authorize(ctx, ADMIN_OBJECT, "create_sd_set")?;
        require_name("SD set", &set.name)?;
        require_cardinality(&set.name, set.cardinality)?;
        let _guard = self.write_guard()?;
        let set = self.store().add_sd_set(set)?;
        info!(set = %set.name, kind = %set.sd_type, cardinality = set.cardinality, "SD set created");
        Ok(set)
    }

    fn delete_sd_set(&self, ctx: AdminContext<'_>, sd_type: SdType, name: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "delete_sd_set")?;
        let _guard = self.write_guard()?;
        self.store().delete_sd_set(sd_type, name)?;
        info!(set = %name, kind = %sd_type, "SD set deleted");
        Ok(())
    }

    fn add_sd_member(
        &self,
        ctx: AdminContext<'_>,
        sd_type: SdType,
        name: &str,
        role: &str,
    ) -> Result<SdSet> {
        self.authorize(ctx, ADMIN_OBJECT, "add_sd_member")?;
        self.edit_sd_set(sd_type, name, |set| {
            if !set.members.insert(role.to_string()) {
                return Err(WardenError::AlreadyExists {
                    entity: "SD set member",
                    key: format!("{name}/{role}"),
                });
            }
            Ok(())
        })
    }

    fn remove_sd_member(
        &self,
        ctx: AdminContext<'_>,
        sd_type: SdType,
        name: &str,
        role: &str,
    ) -> Result<SdSet> {
        self.authorize(ctx, ADMIN_OBJECT, "remove_sd_member")?;
        self.edit_sd_set(sd_type, name, |set| {
            if !set.members.remove(role) {
                return Err(WardenError::not_found("SD set member", format!("{name}/{role}")));
            }
            Ok(())
        })
    }

    fn set_sd_cardinality(
        &self,
        ctx: AdminContext<'_>,
        sd_type: SdType,
        name: &str,
        cardinality: u32,
    ) -> Result<SdSet> {
        self.authorize(ctx, ADMIN_OBJECT, "set_sd_cardinality")?;
        require_cardinality(name, cardinality)?;
        self.edit_sd_set(sd_type, name, |set| {
            set.cardinality = cardinality;
            Ok(())
        })
    }

    // ========================================================================
    // Role constraints
    // ========================================================================

    fn add_role_constraint(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        role: &str,
        constraint: RoleConstraint,
    ) -> Result<RoleConstraint> {
        self.authorize(ctx, ADMIN_OBJECT, "add_role_constraint")?;
        let _guard = self.write_guard()?;
        let mut assignment = self.assignment_of(user_id, role)?;
        let role_entity = self.store().read_role(role)?;
        let stored = constraint::add(&role_entity, &mut assignment, constraint)?;
        self.store().update_assignment(assignment)?;
        info!(user = %user_id, role = %role, key = %stored.key, "Role constraint added");
        Ok(stored)
    }

    fn remove_role_constraint(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        role: &str,
        constraint: &RoleConstraint,
    ) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "remove_role_constraint")?;
        let _guard = self.write_guard()?;
        let mut assignment = self.assignment_of(user_id, role)?;
        constraint::remove(&mut assignment, constraint)?;
        self.store().update_assignment(assignment)?;
        info!(user = %user_id, role = %role, key = %constraint.key, "Role constraint removed");
        Ok(())
    }

    fn remove_role_constraint_by_id(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        role: &str,
        id: ConstraintId,
    ) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "remove_role_constraint")?;
        let _guard = self.write_guard()?;
        let mut assignment = self.assignment_of(user_id, role)?;
        let removed = constraint::remove_by_id(&mut assignment, id)?;
        self.store().update_assignment(assignment)?;
        info!(user = %user_id, role = %role, key = %removed.key, "Role constraint removed");
        Ok(())
    }

    fn enable_role_constraint(&self, ctx: AdminContext<'_>, role: &str, key: &str) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "enable_role_constraint")?;
        let _guard = self.write_guard()?;
        let mut entity = self.store().read_role(role)?;
        if constraint::enable_key(&mut entity, key)? {
            self.store().update_role(entity)?;
            info!(role = %role, key = %key, "Constraint key enabled");
        } else {
            debug!(role = %role, key = %key, "Constraint key already enabled");
        }
        Ok(())
    }

    fn disable_role_constraint(
        &self,
        ctx: AdminContext<'_>,
        role: &str,
        key: &str,
    ) -> Result<()> {
        self.authorize(ctx, ADMIN_OBJECT, "disable_role_constraint")?;
        let _guard = self.write_guard()?;
        let mut entity = self.store().read_role(role)?;
        if constraint::disable_key(&mut entity, key) {
            self.store().update_role(entity)?;
            info!(role = %role, key = %key, "Constraint key disabled");
        } else {
            debug!(role = %role, key = %key, "Constraint key was not enabled");
        }
        Ok(())
    }
}
