//! Permission resolution.
//!
//! A session's authority is the closure of its active roles over the role
//! hierarchy, plus anything granted to the user directly. Matching is exact
//! on object name, operation name and object id.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use warden_types::{PermKey, Permission};

use crate::hierarchy::Hierarchy;

/// How a permission reached the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum GrantPath {
    /// Granted to this role, which is in the authorized closure.
    Role(String),
    /// Granted to the user directly.
    User,
}

/// Resolves permissions over the role hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'a> {
    hierarchy: &'a Hierarchy,
}

impl<'a> PermissionResolver<'a> {
    pub fn new(hierarchy: &'a Hierarchy) -> Self {
        Self { hierarchy }
    }

    /// Active roles plus every role they inherit.
    pub fn authorized_roles<'r, I>(&self, active: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'r str>,
    {
        self.hierarchy.closure_down(active)
    }

    /// Returns how `permission` is granted to the caller, or `None`.
    ///
    /// Role grants are preferred over a direct user grant, and among roles
    /// the first in name order wins so the result is stable.
    pub fn grant_path(
        &self,
        permission: &Permission,
        authorized: &BTreeSet<String>,
        user_id: &str,
    ) -> Option<GrantPath> {
        if let Some(role) = permission.roles.iter().find(|r| authorized.contains(*r)) {
            return Some(GrantPath::Role(role.clone()));
        }
        permission.users.contains(user_id).then_some(GrantPath::User)
    }

    /// Every grant path for `permission`, in name order with the user last.
    pub fn grant_paths(
        &self,
        permission: &Permission,
        authorized: &BTreeSet<String>,
        user_id: &str,
    ) -> Vec<GrantPath> {
        let mut paths: Vec<GrantPath> = permission
            .roles
            .iter()
            .filter(|r| authorized.contains(*r))
            .cloned()
            .map(GrantPath::Role)
            .collect();
        if permission.users.contains(user_id) {
            paths.push(GrantPath::User);
        }
        paths
    }

    /// Finds the candidate matching `key` exactly.
    pub fn find<'p>(&self, candidates: &'p [Permission], key: &PermKey) -> Option<&'p Permission> {
        candidates.iter().find(|p| p.matches(key))
    }

    /// All candidates visible to the caller, deduplicated by key.
    pub fn visible<'p>(
        &self,
        candidates: &'p [Permission],
        authorized: &BTreeSet<String>,
        user_id: &str,
    ) -> Vec<&'p Permission> {
        let mut seen: BTreeMap<PermKey, &'p Permission> = BTreeMap::new();
        for perm in candidates {
            if self.grant_path(perm, authorized, user_id).is_some() {
                seen.entry(perm.key()).or_insert(perm);
            }
        }
        seen.into_values().collect()
    }

    /// Roles that hold `permission` directly or through a junior role: the
    /// granted roles plus all of their seniors.
    pub fn authorized_permission_roles(&self, permission: &Permission) -> BTreeSet<String> {
        self.hierarchy
            .closure_up(permission.roles.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_types::HierarchyKind;

    /// role1 -> role2 -> ... -> role{n}; role i is granted TOB{i}_1.TOP{i}_1.
    fn fixture(n: usize) -> (Hierarchy, Vec<Permission>) {
        let mut h = Hierarchy::new(HierarchyKind::Role);
        for i in 1..=n {
            h.add_node(format!("role{i}"));
        }
        for i in 1..n {
            h.add_edge(&format!("role{i}"), &format!("role{}", i + 1))
                .unwrap();
        }
        let perms = (1..=n)
            .map(|i| {
                let mut p = Permission::new(format!("TOB{i}_1"), format!("TOP{i}_1"));
                p.roles.insert(format!("role{i}"));
                p
            })
            .collect();
        (h, perms)
    }

    #[test]
    fn senior_sees_junior_grants() {
        let (h, perms) = fixture(4);
        let resolver = PermissionResolver::new(&h);

        let authorized = resolver.authorized_roles(["role2"]);
        assert_eq!(authorized.len(), 3);

        let visible = resolver.visible(&perms, &authorized, "u");
        let objs: Vec<_> = visible.iter().map(|p| p.obj_name.as_str()).collect();
        assert_eq!(objs, vec!["TOB2_1", "TOB3_1", "TOB4_1"]);
    }

    #[test]
    fn junior_does_not_see_senior_grants() {
        let (h, perms) = fixture(3);
        let resolver = PermissionResolver::new(&h);
        let authorized = resolver.authorized_roles(["role3"]);

        let senior = resolver
            .find(&perms, &PermKey::new("TOB1_1", "TOP1_1"))
            .unwrap();
        assert_eq!(resolver.grant_path(senior, &authorized, "u"), None);

        let own = resolver
            .find(&perms, &PermKey::new("TOB3_1", "TOP3_1"))
            .unwrap();
        assert_eq!(
            resolver.grant_path(own, &authorized, "u"),
            Some(GrantPath::Role("role3".into()))
        );
    }

    #[test]
    fn direct_user_grant() {
        let mut perm = Permission::new("Report", "print");
        perm.users.insert("jdoe".into());
        let h = Hierarchy::new(HierarchyKind::Role);
        let resolver = PermissionResolver::new(&h);

        let none = BTreeSet::new();
        assert_eq!(resolver.grant_path(&perm, &none, "jdoe"), Some(GrantPath::User));
        assert_eq!(resolver.grant_path(&perm, &none, "other"), None);
    }

    #[test]
    fn grant_paths_lists_every_route() {
        let (h, mut perms) = fixture(3);
        perms[2].roles.insert("role2".into());
        perms[2].users.insert("u".into());
        let resolver = PermissionResolver::new(&h);
        let authorized = resolver.authorized_roles(["role1"]);

        let paths = resolver.grant_paths(&perms[2], &authorized, "u");
        assert_eq!(
            paths,
            vec![
                GrantPath::Role("role2".into()),
                GrantPath::Role("role3".into()),
                GrantPath::User
            ]
        );
    }

    #[test]
    fn object_id_must_match_exactly() {
        let mut perm = Permission::new("Account", "read").with_obj_id("42");
        perm.roles.insert("clerk".into());
        let perms = vec![perm];
        let h = Hierarchy::new(HierarchyKind::Role);
        let resolver = PermissionResolver::new(&h);

        assert!(resolver.find(&perms, &PermKey::new("Account", "read")).is_none());
        assert!(resolver
            .find(&perms, &PermKey::new("Account", "read").with_obj_id("42"))
            .is_some());
    }

    #[test]
    fn authorized_permission_roles_walks_up() {
        let (h, perms) = fixture(3);
        let resolver = PermissionResolver::new(&h);
        let roles = resolver.authorized_permission_roles(&perms[2]);
        assert_eq!(roles.len(), 3);
        assert!(roles.contains("role1"));
    }
}
