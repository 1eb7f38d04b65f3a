//! In-memory repository.
//!
//! All state sits behind one `RwLock`, so every repository call is atomic.
//! A poisoned lock surfaces as [`StoreError::Unavailable`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;
use warden_rbac::Hierarchy;
use warden_types::{
    AdminRole, HierarchyKind, OrgUnit, OuType, PermKey, PermObj, Permission, PermissionAttribute,
    PermissionAttributeSet, Role, SdSet, SdType, User, UserAdminRole, UserRole,
};

use crate::credential::Credential;
use crate::{
    HierarchyRepository, OrgUnitRepository, PermissionRepository, Result, RoleRepository,
    SdSetRepository, StoreError, UserRepository,
};

const USER: &str = "user";
const ROLE: &str = "role";
const ADMIN_ROLE: &str = "admin role";
const ASSIGNMENT: &str = "assignment";
const PERM_OBJ: &str = "permission object";
const PERMISSION: &str = "permission";
const ATTRIBUTE_SET: &str = "permission attribute set";
const ATTRIBUTE: &str = "permission attribute";

/// Reference repository holding every entity in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

#[derive(Debug)]
struct Inner {
    users: BTreeMap<String, User>,
    credentials: BTreeMap<String, Credential>,
    roles: BTreeMap<String, Role>,
    admin_roles: BTreeMap<String, AdminRole>,
    ssd_sets: BTreeMap<String, SdSet>,
    dsd_sets: BTreeMap<String, SdSet>,
    user_ous: BTreeMap<String, OrgUnit>,
    perm_ous: BTreeMap<String, OrgUnit>,
    perm_objs: BTreeMap<String, PermObj>,
    permissions: BTreeMap<PermKey, Permission>,
    attribute_sets: BTreeMap<String, PermissionAttributeSet>,
    role_graph: Hierarchy,
    admin_role_graph: Hierarchy,
    user_ou_graph: Hierarchy,
    perm_ou_graph: Hierarchy,
}

impl Default for Inner {
    fn default() -> Self {
        Self {
            users: BTreeMap::new(),
            credentials: BTreeMap::new(),
            roles: BTreeMap::new(),
            admin_roles: BTreeMap::new(),
            ssd_sets: BTreeMap::new(),
            dsd_sets: BTreeMap::new(),
            user_ous: BTreeMap::new(),
            perm_ous: BTreeMap::new(),
            perm_objs: BTreeMap::new(),
            permissions: BTreeMap::new(),
            attribute_sets: BTreeMap::new(),
            role_graph: Hierarchy::new(HierarchyKind::Role),
            admin_role_graph: Hierarchy::new(HierarchyKind::AdminRole),
            user_ou_graph: Hierarchy::new(HierarchyKind::UserOu),
            perm_ou_graph: Hierarchy::new(HierarchyKind::PermOu),
        }
    }
}

impl Inner {
    fn graph(&self, kind: HierarchyKind) -> &Hierarchy {
        match kind {
            HierarchyKind::Role => &self.role_graph,
            HierarchyKind::AdminRole => &self.admin_role_graph,
            HierarchyKind::UserOu => &self.user_ou_graph,
            HierarchyKind::PermOu => &self.perm_ou_graph,
        }
    }

    fn graph_mut(&mut self, kind: HierarchyKind) -> &mut Hierarchy {
        match kind {
            HierarchyKind::Role => &mut self.role_graph,
            HierarchyKind::AdminRole => &mut self.admin_role_graph,
            HierarchyKind::UserOu => &mut self.user_ou_graph,
            HierarchyKind::PermOu => &mut self.perm_ou_graph,
        }
    }

    fn sd_sets(&self, sd_type: SdType) -> &BTreeMap<String, SdSet> {
        match sd_type {
            SdType::Static => &self.ssd_sets,
            SdType::Dynamic => &self.dsd_sets,
        }
    }

    fn sd_sets_mut(&mut self, sd_type: SdType) -> &mut BTreeMap<String, SdSet> {
        match sd_type {
            SdType::Static => &mut self.ssd_sets,
            SdType::Dynamic => &mut self.dsd_sets,
        }
    }

    fn ous(&self, ou_type: OuType) -> &BTreeMap<String, OrgUnit> {
        match ou_type {
            OuType::User => &self.user_ous,
            OuType::Perm => &self.perm_ous,
        }
    }

    fn ous_mut(&mut self, ou_type: OuType) -> &mut BTreeMap<String, OrgUnit> {
        match ou_type {
            OuType::User => &mut self.user_ous,
            OuType::Perm => &mut self.perm_ous,
        }
    }

    fn user_mut(&mut self, user_id: &str) -> Result<&mut User> {
        self.users
            .get_mut(user_id)
            .ok_or_else(|| StoreError::not_found(USER, user_id))
    }

    fn permission_mut(&mut self, key: &PermKey) -> Result<&mut Permission> {
        self.permissions
            .get_mut(key)
            .ok_or_else(|| StoreError::not_found(PERMISSION, key.to_string()))
    }

    fn require_ou(&self, ou_type: OuType, name: &str) -> Result<()> {
        if self.ous(ou_type).contains_key(name) {
            Ok(())
        } else {
            Err(StoreError::not_found(ou_label(ou_type), name))
        }
    }

    fn require_roles<'a>(&self, names: impl IntoIterator<Item = &'a String>) -> Result<()> {
        for name in names {
            if !self.roles.contains_key(name) {
                return Err(StoreError::not_found(ROLE, name.clone()));
            }
        }
        Ok(())
    }

    fn name_taken(&self, name: &str) -> bool {
        self.roles.contains_key(name) || self.admin_roles.contains_key(name)
    }
}

fn ou_label(ou_type: OuType) -> &'static str {
    match ou_type {
        OuType::User => "user org unit",
        OuType::Perm => "perm org unit",
    }
}

fn by_prefix<'a, V: Clone>(map: &'a BTreeMap<String, V>, prefix: &'a str) -> Vec<V> {
    map.range(prefix.to_string()..)
        .take_while(|(k, _)| k.starts_with(prefix))
        .map(|(_, v)| v.clone())
        .collect()
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| StoreError::Unavailable("lock poisoned".to_string()))
    }
}

// ============================================================================
// Users
// ============================================================================

impl UserRepository for MemoryStore {
    fn add_user(&self, mut user: User, password: Option<&str>) -> Result<User> {
        let mut inner = self.write()?;
        if inner.users.contains_key(&user.user_id) {
            return Err(StoreError::already_exists(USER, user.user_id));
        }
        inner.require_ou(OuType::User, &user.ou)?;

        user.roles.clear();
        user.admin_roles.clear();
        if let Some(password) = password {
            inner
                .credentials
                .insert(user.user_id.clone(), Credential::new(password));
        }
        inner.users.insert(user.user_id.clone(), user.clone());
        debug!(user = %user.user_id, "User stored");
        Ok(user)
    }

    fn update_user(&self, user: User) -> Result<User> {
        let mut inner = self.write()?;
        inner.require_ou(OuType::User, &user.ou)?;
        let stored = inner.user_mut(&user.user_id)?;
        stored.ou = user.ou;
        stored.description = user.description;
        stored.locked = user.locked;
        stored.reset_required = user.reset_required;
        stored.props = user.props;
        stored.temporal = user.temporal;
        Ok(stored.clone())
    }

    fn delete_user(&self, user_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        if inner.users.remove(user_id).is_none() {
            return Err(StoreError::not_found(USER, user_id));
        }
        inner.credentials.remove(user_id);
        for perm in inner.permissions.values_mut() {
            perm.users.remove(user_id);
        }
        Ok(())
    }

    fn read_user(&self, user_id: &str) -> Result<User> {
        self.read()?
            .users
            .get(user_id)
            .cloned()
            .ok_or_else(|| StoreError::not_found(USER, user_id))
    }

    fn find_users(&self, prefix: &str) -> Result<Vec<User>> {
        Ok(by_prefix(&self.read()?.users, prefix))
    }

    fn authenticate(&self, user_id: &str, password: &str) -> Result<User> {
        let inner = self.read()?;
        let user = inner
            .users
            .get(user_id)
            .ok_or_else(|| StoreError::not_found(USER, user_id))?;
        let verified = inner
            .credentials
            .get(user_id)
            .is_some_and(|c| c.verify(password));
        if !verified {
            return Err(StoreError::InvalidCredential {
                user_id: user_id.to_string(),
            });
        }
        Ok(user.clone())
    }

    fn set_password(&self, user_id: &str, password: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.user_mut(user_id)?;
        inner
            .credentials
            .insert(user_id.to_string(), Credential::new(password));
        Ok(())
    }

    fn set_locked(&self, user_id: &str, locked: bool) -> Result<()> {
        self.write()?.user_mut(user_id)?.locked = locked;
        Ok(())
    }

    fn set_reset_required(&self, user_id: &str, reset_required: bool) -> Result<()> {
        self.write()?.user_mut(user_id)?.reset_required = reset_required;
        Ok(())
    }

    fn assign_user(&self, assignment: UserRole) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.roles.contains_key(&assignment.role_name) {
            return Err(StoreError::not_found(ROLE, assignment.role_name));
        }
        let user = inner.user_mut(&assignment.user_id)?;
        if user.is_assigned(&assignment.role_name) {
            return Err(StoreError::already_exists(
                ASSIGNMENT,
                format!("{}/{}", assignment.user_id, assignment.role_name),
            ));
        }
        user.roles.push(assignment);
        Ok(())
    }

    fn update_assignment(&self, assignment: UserRole) -> Result<()> {
        let mut inner = self.write()?;
        let user = inner.user_mut(&assignment.user_id)?;
        let slot = user.user_role_mut(&assignment.role_name).ok_or_else(|| {
            StoreError::not_found(
                ASSIGNMENT,
                format!("{}/{}", assignment.user_id, assignment.role_name),
            )
        })?;
        *slot = assignment;
        Ok(())
    }

    fn deassign_user(&self, user_id: &str, role: &str) -> Result<UserRole> {
        let mut inner = self.write()?;
        let user = inner.user_mut(user_id)?;
        let pos = user
            .roles
            .iter()
            .position(|ur| ur.role_name == role)
            .ok_or_else(|| StoreError::not_found(ASSIGNMENT, format!("{user_id}/{role}")))?;
        Ok(user.roles.remove(pos))
    }

    fn assign_admin_user(&self, assignment: UserAdminRole) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.admin_roles.contains_key(&assignment.role_name) {
            return Err(StoreError::not_found(ADMIN_ROLE, assignment.role_name));
        }
        let user = inner.user_mut(&assignment.user_id)?;
        if user.user_admin_role(&assignment.role_name).is_some() {
            return Err(StoreError::already_exists(
                ASSIGNMENT,
                format!("{}/{}", assignment.user_id, assignment.role_name),
            ));
        }
        user.admin_roles.push(assignment);
        Ok(())
    }

    fn deassign_admin_user(&self, user_id: &str, admin_role: &str) -> Result<UserAdminRole> {
        let mut inner = self.write()?;
        let user = inner.user_mut(user_id)?;
        let pos = user
            .admin_roles
            .iter()
            .position(|ur| ur.role_name == admin_role)
            .ok_or_else(|| {
                StoreError::not_found(ASSIGNMENT, format!("{user_id}/{admin_role}"))
            })?;
        Ok(user.admin_roles.remove(pos))
    }

    fn assigned_users(&self, role: &str) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner
            .users
            .values()
            .filter(|u| u.is_assigned(role))
            .map(|u| u.user_id.clone())
            .collect())
    }

    fn users_assigned_any(&self, roles: &BTreeSet<String>) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner
            .users
            .values()
            .filter(|u| u.roles.iter().any(|ur| roles.contains(&ur.role_name)))
            .map(|u| u.user_id.clone())
            .collect())
    }

    fn admin_assigned_users(&self, role: &str) -> Result<Vec<String>> {
        let inner = self.read()?;
        Ok(inner
            .users
            .values()
            .filter(|u| u.user_admin_role(role).is_some())
            .map(|u| u.user_id.clone())
            .collect())
    }
}

// ============================================================================
// Roles
// ============================================================================

impl RoleRepository for MemoryStore {
    fn add_role(&self, role: Role) -> Result<Role> {
        let mut inner = self.write()?;
        if inner.name_taken(&role.name) {
            return Err(StoreError::already_exists(ROLE, role.name));
        }
        inner.role_graph.add_node(role.name.clone());
        inner.roles.insert(role.name.clone(), role.clone());
        Ok(role)
    }

    fn update_role(&self, role: Role) -> Result<Role> {
        let mut inner = self.write()?;
        let stored = inner
            .roles
            .get_mut(&role.name)
            .ok_or_else(|| StoreError::not_found(ROLE, role.name.clone()))?;
        *stored = role.clone();
        Ok(role)
    }

    fn delete_role(&self, name: &str) -> Result<()> {
        let mut guard = self.write()?;
        let inner = &mut *guard;
        if inner.roles.remove(name).is_none() {
            return Err(StoreError::not_found(ROLE, name));
        }
        inner.role_graph.remove_node(name);
        for set in inner.ssd_sets.values_mut().chain(inner.dsd_sets.values_mut()) {
            set.members.remove(name);
        }
        for perm in inner.permissions.values_mut().filter(|p| !p.admin) {
            perm.roles.remove(name);
        }
        for user in inner.users.values_mut() {
            user.roles.retain(|ur| ur.role_name != name);
        }
        debug!(role = %name, "Role deleted with its relations");
        Ok(())
    }

    fn read_role(&self, name: &str) -> Result<Role> {
        self.read()?
            .roles
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ROLE, name))
    }

    fn find_roles(&self, prefix: &str) -> Result<Vec<Role>> {
        Ok(by_prefix(&self.read()?.roles, prefix))
    }

    fn add_admin_role(&self, role: AdminRole) -> Result<AdminRole> {
        let mut inner = self.write()?;
        if inner.name_taken(&role.name) {
            return Err(StoreError::already_exists(ADMIN_ROLE, role.name));
        }
        inner.admin_role_graph.add_node(role.name.clone());
        inner.admin_roles.insert(role.name.clone(), role.clone());
        Ok(role)
    }

    fn update_admin_role(&self, role: AdminRole) -> Result<AdminRole> {
        let mut inner = self.write()?;
        let stored = inner
            .admin_roles
            .get_mut(&role.name)
            .ok_or_else(|| StoreError::not_found(ADMIN_ROLE, role.name.clone()))?;
        *stored = role.clone();
        Ok(role)
    }

    fn delete_admin_role(&self, name: &str) -> Result<()> {
        let mut inner = self.write()?;
        if inner.admin_roles.remove(name).is_none() {
            return Err(StoreError::not_found(ADMIN_ROLE, name));
        }
        inner.admin_role_graph.remove_node(name);
        for perm in inner.permissions.values_mut().filter(|p| p.admin) {
            perm.roles.remove(name);
        }
        for user in inner.users.values_mut() {
            user.admin_roles.retain(|ur| ur.role_name != name);
        }
        Ok(())
    }

    fn read_admin_role(&self, name: &str) -> Result<AdminRole> {
        self.read()?
            .admin_roles
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ADMIN_ROLE, name))
    }

    fn find_admin_roles(&self, prefix: &str) -> Result<Vec<AdminRole>> {
        Ok(by_prefix(&self.read()?.admin_roles, prefix))
    }
}

// ============================================================================
// Hierarchies
// ============================================================================

impl HierarchyRepository for MemoryStore {
    fn hierarchy(&self, kind: HierarchyKind) -> Result<Hierarchy> {
        Ok(self.read()?.graph(kind).clone())
    }

    fn add_inheritance(&self, kind: HierarchyKind, parent: &str, child: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.graph_mut(kind).add_edge(parent, child)?;
        debug!(kind = %kind, parent, child, "Hierarchy edge added");
        Ok(())
    }

    fn delete_inheritance(&self, kind: HierarchyKind, parent: &str, child: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.graph_mut(kind).remove_edge(parent, child)?;
        Ok(())
    }
}

// ============================================================================
// Separation of duty
// ============================================================================

impl SdSetRepository for MemoryStore {
    fn add_sd_set(&self, set: SdSet) -> Result<SdSet> {
        let mut inner = self.write()?;
        let entity = sd_label(set.sd_type);
        if inner.sd_sets(set.sd_type).contains_key(&set.name) {
            return Err(StoreError::already_exists(entity, set.name));
        }
        inner.require_roles(&set.members)?;
        inner
            .sd_sets_mut(set.sd_type)
            .insert(set.name.clone(), set.clone());
        Ok(set)
    }

    fn update_sd_set(&self, set: SdSet) -> Result<SdSet> {
        let mut inner = self.write()?;
        inner.require_roles(&set.members)?;
        let stored = inner
            .sd_sets_mut(set.sd_type)
            .get_mut(&set.name)
            .ok_or_else(|| StoreError::not_found(sd_label(set.sd_type), set.name.clone()))?;
        *stored = set.clone();
        Ok(set)
    }

    fn delete_sd_set(&self, sd_type: SdType, name: &str) -> Result<()> {
        self.write()?
            .sd_sets_mut(sd_type)
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(sd_label(sd_type), name))
    }

    fn read_sd_set(&self, sd_type: SdType, name: &str) -> Result<SdSet> {
        self.read()?
            .sd_sets(sd_type)
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(sd_label(sd_type), name))
    }

    fn sd_sets(&self, sd_type: SdType) -> Result<Vec<SdSet>> {
        Ok(self.read()?.sd_sets(sd_type).values().cloned().collect())
    }
}

fn sd_label(sd_type: SdType) -> &'static str {
    match sd_type {
        SdType::Static => "SSD set",
        SdType::Dynamic => "DSD set",
    }
}

// ============================================================================
// Organizational units
// ============================================================================

impl OrgUnitRepository for MemoryStore {
    fn add_org_unit(&self, ou: OrgUnit) -> Result<OrgUnit> {
        let mut inner = self.write()?;
        if inner.ous(ou.ou_type).contains_key(&ou.name) {
            return Err(StoreError::already_exists(ou_label(ou.ou_type), ou.name));
        }
        inner.graph_mut(ou.ou_type.hierarchy()).add_node(ou.name.clone());
        inner.ous_mut(ou.ou_type).insert(ou.name.clone(), ou.clone());
        Ok(ou)
    }

    fn update_org_unit(&self, ou: OrgUnit) -> Result<OrgUnit> {
        let mut inner = self.write()?;
        let stored = inner
            .ous_mut(ou.ou_type)
            .get_mut(&ou.name)
            .ok_or_else(|| StoreError::not_found(ou_label(ou.ou_type), ou.name.clone()))?;
        *stored = ou.clone();
        Ok(ou)
    }

    fn delete_org_unit(&self, ou_type: OuType, name: &str) -> Result<()> {
        let mut inner = self.write()?;
        inner.require_ou(ou_type, name)?;
        let in_use = match ou_type {
            OuType::User => inner.users.values().any(|u| u.ou == name),
            OuType::Perm => inner.perm_objs.values().any(|o| o.ou == name),
        };
        if in_use {
            return Err(StoreError::ConstraintViolation(format!(
                "{} '{name}' is still referenced",
                ou_label(ou_type)
            )));
        }
        inner.ous_mut(ou_type).remove(name);
        inner.graph_mut(ou_type.hierarchy()).remove_node(name);
        Ok(())
    }

    fn read_org_unit(&self, ou_type: OuType, name: &str) -> Result<OrgUnit> {
        self.read()?
            .ous(ou_type)
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ou_label(ou_type), name))
    }

    fn org_units(&self, ou_type: OuType) -> Result<Vec<OrgUnit>> {
        Ok(self.read()?.ous(ou_type).values().cloned().collect())
    }
}

// ============================================================================
// Permissions
// ============================================================================

impl PermissionRepository for MemoryStore {
    fn add_perm_obj(&self, obj: PermObj) -> Result<PermObj> {
        let mut inner = self.write()?;
        if inner.perm_objs.contains_key(&obj.obj_name) {
            return Err(StoreError::already_exists(PERM_OBJ, obj.obj_name));
        }
        inner.require_ou(OuType::Perm, &obj.ou)?;
        inner.perm_objs.insert(obj.obj_name.clone(), obj.clone());
        Ok(obj)
    }

    fn update_perm_obj(&self, obj: PermObj) -> Result<PermObj> {
        let mut inner = self.write()?;
        inner.require_ou(OuType::Perm, &obj.ou)?;
        let stored = inner
            .perm_objs
            .get_mut(&obj.obj_name)
            .ok_or_else(|| StoreError::not_found(PERM_OBJ, obj.obj_name.clone()))?;
        *stored = obj.clone();
        Ok(obj)
    }

    fn delete_perm_obj(&self, obj_name: &str) -> Result<()> {
        let mut inner = self.write()?;
        if inner.perm_objs.remove(obj_name).is_none() {
            return Err(StoreError::not_found(PERM_OBJ, obj_name));
        }
        inner.permissions.retain(|k, _| k.obj_name != obj_name);
        Ok(())
    }

    fn read_perm_obj(&self, obj_name: &str) -> Result<PermObj> {
        self.read()?
            .perm_objs
            .get(obj_name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(PERM_OBJ, obj_name))
    }

    fn find_perm_objs(&self, prefix: &str) -> Result<Vec<PermObj>> {
        Ok(by_prefix(&self.read()?.perm_objs, prefix))
    }

    fn add_permission(&self, mut perm: Permission) -> Result<Permission> {
        let mut inner = self.write()?;
        let key = perm.key();
        if inner.permissions.contains_key(&key) {
            return Err(StoreError::already_exists(PERMISSION, key.to_string()));
        }
        if !inner.perm_objs.contains_key(&perm.obj_name) {
            return Err(StoreError::not_found(PERM_OBJ, perm.obj_name));
        }
        if let Some(set) = &perm.pa_set_name
            && !inner.attribute_sets.contains_key(set)
        {
            return Err(StoreError::not_found(ATTRIBUTE_SET, set.clone()));
        }
        perm.roles.clear();
        perm.users.clear();
        inner.permissions.insert(key, perm.clone());
        Ok(perm)
    }

    fn update_permission(&self, perm: Permission) -> Result<Permission> {
        let mut inner = self.write()?;
        if let Some(set) = &perm.pa_set_name
            && !inner.attribute_sets.contains_key(set)
        {
            return Err(StoreError::not_found(ATTRIBUTE_SET, set.clone()));
        }
        let stored = inner.permission_mut(&perm.key())?;
        stored.description = perm.description;
        stored.admin = perm.admin;
        stored.pa_set_name = perm.pa_set_name;
        Ok(stored.clone())
    }

    fn delete_permission(&self, key: &PermKey) -> Result<()> {
        self.write()?
            .permissions
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(PERMISSION, key.to_string()))
    }

    fn read_permission(&self, key: &PermKey) -> Result<Permission> {
        self.read()?
            .permissions
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::not_found(PERMISSION, key.to_string()))
    }

    fn find_permissions(&self, prefix: &str) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        Ok(inner
            .permissions
            .values()
            .filter(|p| p.obj_name.starts_with(prefix))
            .cloned()
            .collect())
    }

    fn permissions_granted(
        &self,
        roles: &BTreeSet<String>,
        user_id: Option<&str>,
    ) -> Result<Vec<Permission>> {
        let inner = self.read()?;
        Ok(inner
            .permissions
            .values()
            .filter(|p| {
                p.roles.iter().any(|r| roles.contains(r))
                    || user_id.is_some_and(|u| p.users.contains(u))
            })
            .cloned()
            .collect())
    }

    fn grant_permission(&self, key: &PermKey, role: &str) -> Result<()> {
        let mut inner = self.write()?;
        let admin = inner
            .permissions
            .get(key)
            .ok_or_else(|| StoreError::not_found(PERMISSION, key.to_string()))?
            .admin;
        let known = if admin {
            inner.admin_roles.contains_key(role)
        } else {
            inner.roles.contains_key(role)
        };
        if !known {
            return Err(StoreError::not_found(if admin { ADMIN_ROLE } else { ROLE }, role));
        }
        if !inner.permission_mut(key)?.roles.insert(role.to_string()) {
            return Err(StoreError::already_exists("grant", format!("{key} -> {role}")));
        }
        Ok(())
    }

    fn revoke_permission(&self, key: &PermKey, role: &str) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.permission_mut(key)?.roles.remove(role) {
            return Err(StoreError::not_found("grant", format!("{key} -> {role}")));
        }
        Ok(())
    }

    fn grant_permission_user(&self, key: &PermKey, user_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.users.contains_key(user_id) {
            return Err(StoreError::not_found(USER, user_id));
        }
        if !inner.permission_mut(key)?.users.insert(user_id.to_string()) {
            return Err(StoreError::already_exists("grant", format!("{key} -> {user_id}")));
        }
        Ok(())
    }

    fn revoke_permission_user(&self, key: &PermKey, user_id: &str) -> Result<()> {
        let mut inner = self.write()?;
        if !inner.permission_mut(key)?.users.remove(user_id) {
            return Err(StoreError::not_found("grant", format!("{key} -> {user_id}")));
        }
        Ok(())
    }

    fn add_attribute_set(&self, set: PermissionAttributeSet) -> Result<PermissionAttributeSet> {
        let mut inner = self.write()?;
        if inner.attribute_sets.contains_key(&set.name) {
            return Err(StoreError::already_exists(ATTRIBUTE_SET, set.name));
        }
        inner.attribute_sets.insert(set.name.clone(), set.clone());
        Ok(set)
    }

    fn delete_attribute_set(&self, name: &str) -> Result<()> {
        let mut inner = self.write()?;
        if inner
            .permissions
            .values()
            .any(|p| p.pa_set_name.as_deref() == Some(name))
        {
            return Err(StoreError::ConstraintViolation(format!(
                "{ATTRIBUTE_SET} '{name}' is still referenced"
            )));
        }
        inner
            .attribute_sets
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::not_found(ATTRIBUTE_SET, name))
    }

    fn read_attribute_set(&self, name: &str) -> Result<PermissionAttributeSet> {
        self.read()?
            .attribute_sets
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::not_found(ATTRIBUTE_SET, name))
    }

    fn add_attribute(&self, set: &str, attribute: PermissionAttribute) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .attribute_sets
            .get_mut(set)
            .ok_or_else(|| StoreError::not_found(ATTRIBUTE_SET, set))?;
        if stored.attribute(&attribute.name).is_some() {
            return Err(StoreError::already_exists(
                ATTRIBUTE,
                format!("{set}.{}", attribute.name),
            ));
        }
        stored.attributes.push(attribute);
        Ok(())
    }

    fn remove_attribute(&self, set: &str, attribute: &str) -> Result<()> {
        let mut inner = self.write()?;
        let stored = inner
            .attribute_sets
            .get_mut(set)
            .ok_or_else(|| StoreError::not_found(ATTRIBUTE_SET, set))?;
        let before = stored.attributes.len();
        stored.attributes.retain(|a| a.name != attribute);
        if stored.attributes.len() == before {
            return Err(StoreError::not_found(ATTRIBUTE, format!("{set}.{attribute}")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;
    use warden_rbac::HierarchyError;

    fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.add_org_unit(OrgUnit::user("dev")).unwrap();
        store.add_org_unit(OrgUnit::perm("apps")).unwrap();
        store
    }

    #[test]
    fn user_crud_and_prefix_search() {
        let s = store();
        s.add_user(User::new("alice", "dev"), Some("pw")).unwrap();
        s.add_user(User::new("alan", "dev"), None).unwrap();
        s.add_user(User::new("bob", "dev"), None).unwrap();

        let found: Vec<_> = s
            .find_users("al")
            .unwrap()
            .into_iter()
            .map(|u| u.user_id)
            .collect();
        assert_eq!(found, vec!["alan", "alice"]);

        assert!(matches!(
            s.add_user(User::new("alice", "dev"), None),
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(matches!(
            s.add_user(User::new("carol", "nowhere"), None),
            Err(StoreError::NotFound { .. })
        ));

        s.delete_user("bob").unwrap();
        assert!(s.read_user("bob").unwrap_err().is_not_found());
    }

    #[test]
    fn authenticate_checks_password() {
        let s = store();
        s.add_user(User::new("alice", "dev"), Some("secret")).unwrap();

        assert_eq!(s.authenticate("alice", "secret").unwrap().user_id, "alice");
        assert!(matches!(
            s.authenticate("alice", "wrong"),
            Err(StoreError::InvalidCredential { .. })
        ));
        assert!(s.authenticate("ghost", "x").unwrap_err().is_not_found());

        s.set_password("alice", "rotated").unwrap();
        assert!(s.authenticate("alice", "secret").is_err());
        assert!(s.authenticate("alice", "rotated").is_ok());
    }

    #[test]
    fn user_without_password_cannot_authenticate() {
        let s = store();
        s.add_user(User::new("svc", "dev"), None).unwrap();
        assert!(matches!(
            s.authenticate("svc", ""),
            Err(StoreError::InvalidCredential { .. })
        ));
    }

    #[test]
    fn assignment_lifecycle() {
        let s = store();
        s.add_user(User::new("alice", "dev"), None).unwrap();
        s.add_role(Role::new("clerk")).unwrap();

        s.assign_user(UserRole::new("alice", "clerk")).unwrap();
        assert!(matches!(
            s.assign_user(UserRole::new("alice", "clerk")),
            Err(StoreError::AlreadyExists { .. })
        ));
        assert!(s
            .assign_user(UserRole::new("alice", "ghost"))
            .unwrap_err()
            .is_not_found());
        assert_eq!(s.assigned_users("clerk").unwrap(), vec!["alice"]);

        s.deassign_user("alice", "clerk").unwrap();
        assert!(s.assigned_users("clerk").unwrap().is_empty());
        assert!(s.deassign_user("alice", "clerk").unwrap_err().is_not_found());
    }

    #[test]
    fn delete_role_cascades() {
        let s = store();
        s.add_user(User::new("alice", "dev"), None).unwrap();
        for r in ["a", "b", "c"] {
            s.add_role(Role::new(r)).unwrap();
        }
        s.add_inheritance(HierarchyKind::Role, "a", "b").unwrap();
        s.add_sd_set(SdSet::new("s", SdType::Static, 2).with_members(["b", "c"]))
            .unwrap();
        s.add_perm_obj(PermObj::new("Doc", "apps")).unwrap();
        s.add_permission(Permission::new("Doc", "read")).unwrap();
        let key = PermKey::new("Doc", "read");
        s.grant_permission(&key, "b").unwrap();
        s.assign_user(UserRole::new("alice", "b")).unwrap();

        s.delete_role("b").unwrap();

        assert!(!s.hierarchy(HierarchyKind::Role).unwrap().contains("b"));
        assert!(s.hierarchy(HierarchyKind::Role).unwrap().children("a").is_empty());
        assert!(!s.read_sd_set(SdType::Static, "s").unwrap().contains("b"));
        assert!(s.read_permission(&key).unwrap().roles.is_empty());
        assert!(s.read_user("alice").unwrap().roles.is_empty());
    }

    #[test]
    fn hierarchy_cycle_rejected_at_write() {
        let s = store();
        for r in ["a", "b"] {
            s.add_role(Role::new(r)).unwrap();
        }
        s.add_inheritance(HierarchyKind::Role, "a", "b").unwrap();
        let err = s.add_inheritance(HierarchyKind::Role, "b", "a").unwrap_err();
        assert!(matches!(
            err,
            StoreError::Hierarchy(HierarchyError::Cycle { .. })
        ));
    }

    #[test]
    fn role_and_admin_role_names_are_exclusive() {
        let s = store();
        s.add_role(Role::new("ops")).unwrap();
        assert!(matches!(
            s.add_admin_role(AdminRole::new("ops")),
            Err(StoreError::AlreadyExists { .. })
        ));
    }

    #[test]
    fn sd_set_members_must_exist() {
        let s = store();
        s.add_role(Role::new("a")).unwrap();
        let err = s
            .add_sd_set(SdSet::new("s", SdType::Dynamic, 2).with_members(["a", "ghost"]))
            .unwrap_err();
        assert!(err.is_not_found());

        s.add_sd_set(SdSet::new("s", SdType::Dynamic, 2).with_member("a"))
            .unwrap();
        // SSD and DSD names do not collide.
        s.add_sd_set(SdSet::new("s", SdType::Static, 2).with_member("a"))
            .unwrap();
        assert_eq!(s.sd_sets(SdType::Dynamic).unwrap().len(), 1);
    }

    #[test]
    fn org_unit_in_use_cannot_be_deleted() {
        let s = store();
        s.add_user(User::new("alice", "dev"), None).unwrap();
        assert!(matches!(
            s.delete_org_unit(OuType::User, "dev"),
            Err(StoreError::ConstraintViolation(_))
        ));
        s.delete_user("alice").unwrap();
        s.delete_org_unit(OuType::User, "dev").unwrap();
        assert!(!s.hierarchy(HierarchyKind::UserOu).unwrap().contains("dev"));
    }

    #[test]
    fn admin_permissions_grant_to_admin_roles_only() {
        let s = store();
        s.add_role(Role::new("clerk")).unwrap();
        s.add_admin_role(AdminRole::new("ops-admin")).unwrap();
        s.add_perm_obj(PermObj::new("AdminMgr", "apps").admin()).unwrap();
        s.add_permission(Permission::new("AdminMgr", "add_user").admin())
            .unwrap();
        let key = PermKey::new("AdminMgr", "add_user");

        assert!(s.grant_permission(&key, "clerk").unwrap_err().is_not_found());
        s.grant_permission(&key, "ops-admin").unwrap();
        assert!(matches!(
            s.grant_permission(&key, "ops-admin"),
            Err(StoreError::AlreadyExists { .. })
        ));

        let granted = s
            .permissions_granted(&["ops-admin".to_string()].into(), None)
            .unwrap();
        assert_eq!(granted.len(), 1);
    }

    #[test]
    fn attribute_sets() {
        let s = store();
        s.add_attribute_set(PermissionAttributeSet::new("geo")).unwrap();
        s.add_attribute("geo", PermissionAttribute::new("branch"))
            .unwrap();
        assert!(s
            .add_attribute("geo", PermissionAttribute::new("branch"))
            .is_err());

        s.add_perm_obj(PermObj::new("Vault", "apps")).unwrap();
        s.add_permission(Permission::new("Vault", "open").with_pa_set("geo"))
            .unwrap();
        assert!(matches!(
            s.delete_attribute_set("geo"),
            Err(StoreError::ConstraintViolation(_))
        ));

        s.remove_attribute("geo", "branch").unwrap();
        assert!(s.read_attribute_set("geo").unwrap().attributes.is_empty());
        assert!(s.remove_attribute("geo", "branch").unwrap_err().is_not_found());
    }

    #[test_case("Doc", 2; "exact object")]
    #[test_case("D", 3; "shared prefix")]
    #[test_case("X", 0; "no match")]
    fn find_permissions_by_prefix(prefix: &str, expected: usize) {
        let s = store();
        for obj in ["Doc", "Draft"] {
            s.add_perm_obj(PermObj::new(obj, "apps")).unwrap();
        }
        s.add_permission(Permission::new("Doc", "read")).unwrap();
        s.add_permission(Permission::new("Doc", "write")).unwrap();
        s.add_permission(Permission::new("Draft", "read")).unwrap();
        assert_eq!(s.find_permissions(prefix).unwrap().len(), expected);
    }
}
