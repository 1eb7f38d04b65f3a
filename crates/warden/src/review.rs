//! Read-only review queries.
//!
//! Reviews never take an [`AdminContext`](crate::AdminContext): reading the
//! policy is not gated by delegated administration.

use std::collections::BTreeSet;

use warden_rbac::{Hierarchy, PermissionResolver, SodEngine};
use warden_types::{
    AdminRole, HierarchyKind, OrgUnit, OuType, PermKey, PermObj, Permission,
    PermissionAttributeSet, Role, RoleConstraint, SdSet, SdType, User, UserAdminRole, UserRole,
};

use crate::capability::ReviewCapability;
use crate::engine::Warden;
use crate::error::{Result, WardenError};

impl Warden {
    fn graph_node_exists(&self, kind: HierarchyKind, name: &str) -> Result<Hierarchy> {
        let graph = self.store().hierarchy(kind)?;
        if !graph.contains(name) {
            return Err(WardenError::not_found(kind.node_label(), name));
        }
        Ok(graph)
    }

    fn sd_sets_for(&self, sd_type: SdType, role: &str) -> Result<Vec<SdSet>> {
        let roles = self.graph_node_exists(HierarchyKind::Role, role)?;
        let sets = self.store().sd_sets(sd_type)?;
        // SSD membership always counts juniors; DSD follows configuration.
        let inherited = sd_type == SdType::Static || self.config().sod.inherited_dsd_membership;
        Ok(SodEngine::new(&roles, &sets)
            .with_inherited_membership(inherited)
            .sets_for(sd_type, role)
            .into_iter()
            .cloned()
            .collect())
    }
}

impl ReviewCapability for Warden {
    fn read_user(&self, user_id: &str) -> Result<User> {
        self.read_user_or_missing(user_id)
    }

    fn find_users(&self, prefix: &str) -> Result<Vec<User>> {
        Ok(self.store().find_users(prefix)?)
    }

    fn read_role(&self, name: &str) -> Result<Role> {
        Ok(self.store().read_role(name)?)
    }

    fn find_roles(&self, prefix: &str) -> Result<Vec<Role>> {
        Ok(self.store().find_roles(prefix)?)
    }

    fn read_admin_role(&self, name: &str) -> Result<AdminRole> {
        Ok(self.store().read_admin_role(name)?)
    }

    fn find_admin_roles(&self, prefix: &str) -> Result<Vec<AdminRole>> {
        Ok(self.store().find_admin_roles(prefix)?)
    }

    fn read_perm_obj(&self, obj_name: &str) -> Result<PermObj> {
        Ok(self.store().read_perm_obj(obj_name)?)
    }

    fn find_perm_objs(&self, prefix: &str) -> Result<Vec<PermObj>> {
        Ok(self.store().find_perm_objs(prefix)?)
    }

    fn read_permission(&self, key: &PermKey) -> Result<Permission> {
        Ok(self.store().read_permission(key)?)
    }

    fn find_permissions(&self, prefix: &str) -> Result<Vec<Permission>> {
        Ok(self.store().find_permissions(prefix)?)
    }

    fn read_attribute_set(&self, name: &str) -> Result<PermissionAttributeSet> {
        Ok(self.store().read_attribute_set(name)?)
    }

    fn read_org_unit(&self, ou_type: OuType, name: &str) -> Result<OrgUnit> {
        Ok(self.store().read_org_unit(ou_type, name)?)
    }

    fn descendants(&self, kind: HierarchyKind, name: &str) -> Result<BTreeSet<String>> {
        Ok(self.graph_node_exists(kind, name)?.descendants(name))
    }

    fn ascendants(&self, kind: HierarchyKind, name: &str) -> Result<BTreeSet<String>> {
        Ok(self.graph_node_exists(kind, name)?.ascendants(name))
    }

    fn assigned_users(&self, role: &str) -> Result<Vec<String>> {
        self.store().read_role(role)?;
        Ok(self.store().assigned_users(role)?)
    }

    fn assigned_roles(&self, user_id: &str) -> Result<Vec<UserRole>> {
        Ok(self.read_user_or_missing(user_id)?.roles)
    }

    fn assigned_admin_roles(&self, user_id: &str) -> Result<Vec<UserAdminRole>> {
        Ok(self.read_user_or_missing(user_id)?.admin_roles)
    }

    fn authorized_users(&self, role: &str) -> Result<Vec<String>> {
        let roles = self.graph_node_exists(HierarchyKind::Role, role)?;
        let seniors = roles.closure_up([role]);
        Ok(self.store().users_assigned_any(&seniors)?)
    }

    fn authorized_roles(&self, user_id: &str) -> Result<BTreeSet<String>> {
        let user = self.read_user_or_missing(user_id)?;
        let roles = self.store().hierarchy(HierarchyKind::Role)?;
        Ok(PermissionResolver::new(&roles)
            .authorized_roles(user.roles.iter().map(|r| r.role_name.as_str())))
    }

    fn role_permissions(&self, role: &str, inherited: bool) -> Result<Vec<Permission>> {
        let roles = self.graph_node_exists(HierarchyKind::Role, role)?;
        let names = if inherited {
            roles.closure_down([role])
        } else {
            BTreeSet::from([role.to_string()])
        };
        Ok(self.store().permissions_granted(&names, None)?)
    }

    fn user_permissions(&self, user_id: &str) -> Result<Vec<Permission>> {
        let authorized = self.authorized_roles(user_id)?;
        let roles = self.store().hierarchy(HierarchyKind::Role)?;
        let candidates = self.store().permissions_granted(&authorized, Some(user_id))?;
        Ok(PermissionResolver::new(&roles)
            .visible(&candidates, &authorized, user_id)
            .into_iter()
            .cloned()
            .collect())
    }

    fn permission_roles(&self, key: &PermKey) -> Result<BTreeSet<String>> {
        Ok(self.store().read_permission(key)?.roles)
    }

    fn authorized_permission_roles(&self, key: &PermKey) -> Result<BTreeSet<String>> {
        let permission = self.store().read_permission(key)?;
        let roles = self.store().hierarchy(HierarchyKind::Role)?;
        Ok(PermissionResolver::new(&roles).authorized_permission_roles(&permission))
    }

    fn permission_users(&self, key: &PermKey) -> Result<BTreeSet<String>> {
        Ok(self.store().read_permission(key)?.users)
    }

    fn ssd_role_sets(&self, role: &str) -> Result<Vec<SdSet>> {
        self.sd_sets_for(SdType::Static, role)
    }

    fn dsd_role_sets(&self, role: &str) -> Result<Vec<SdSet>> {
        self.sd_sets_for(SdType::Dynamic, role)
    }

    fn read_ssd_set(&self, name: &str) -> Result<SdSet> {
        Ok(self.store().read_sd_set(SdType::Static, name)?)
    }

    fn read_dsd_set(&self, name: &str) -> Result<SdSet> {
        Ok(self.store().read_sd_set(SdType::Dynamic, name)?)
    }

    fn role_constraints(&self, user_id: &str, role: &str) -> Result<Vec<RoleConstraint>> {
        let user = self.read_user_or_missing(user_id)?;
        user.user_role(role)
            .map(|assignment| assignment.constraints.clone())
            .ok_or_else(|| WardenError::NotAssigned {
                user_id: user_id.to_string(),
                role: role.to_string(),
            })
    }
}
