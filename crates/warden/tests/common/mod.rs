//! Shared fixtures for the engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use warden::prelude::*;
use warden::types::{OrgUnit, PermKey, PermObj, Permission, Role, User, UserRole};
use warden::{FixedClock, Session, WardenConfig};

pub const PASSWORD: &str = "passw0rd";
pub const USER_OU: &str = "staff";
pub const PERM_OU: &str = "apps";

/// Monday 2026-03-02 10:00 UTC.
pub fn start() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap()
}

pub struct Fixture {
    pub warden: Warden,
    pub clock: Arc<FixedClock>,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(WardenConfig::default())
    }

    pub fn with_config(config: WardenConfig) -> Self {
        let clock = Arc::new(FixedClock::new(start()));
        let warden = Warden::in_memory()
            .with_config(config)
            .with_clock(clock.clone());
        warden
            .add_org_unit(AdminContext::System, OrgUnit::user(USER_OU))
            .unwrap();
        warden
            .add_org_unit(AdminContext::System, OrgUnit::perm(PERM_OU))
            .unwrap();
        Self { warden, clock }
    }

    pub fn user(&self, user_id: &str) -> User {
        self.warden
            .add_user(AdminContext::System, User::new(user_id, USER_OU), Some(PASSWORD))
            .unwrap()
    }

    pub fn role(&self, name: &str) -> Role {
        self.warden
            .add_role(AdminContext::System, Role::new(name))
            .unwrap()
    }

    /// Creates `obj.op`, adding the object first when it does not exist.
    pub fn permission(&self, obj: &str, op: &str) -> PermKey {
        if self.warden.read_perm_obj(obj).is_err() {
            self.warden
                .add_perm_obj(AdminContext::System, PermObj::new(obj, PERM_OU))
                .unwrap();
        }
        self.warden
            .add_permission(AdminContext::System, Permission::new(obj, op))
            .unwrap();
        PermKey::new(obj, op)
    }

    pub fn grant(&self, key: &PermKey, role: &str) {
        self.warden
            .grant_permission(AdminContext::System, key, role)
            .unwrap();
    }

    pub fn assign(&self, user_id: &str, role: &str) -> UserRole {
        self.warden
            .assign_user(AdminContext::System, UserRole::new(user_id, role))
            .unwrap()
    }

    pub fn inherit(&self, parent: &str, child: &str) {
        self.warden
            .add_inheritance(AdminContext::System, parent, child)
            .unwrap();
    }

    pub fn login(&self, user_id: &str) -> Session {
        self.warden.create_session(user_id, PASSWORD, None).unwrap()
    }
}

/// Key of the single permission granted to role `i` in the fixtures.
pub fn key(i: usize) -> PermKey {
    PermKey::new(format!("TOB{i}_1"), format!("TOP{i}_1"))
}

/// `jdoe` holds `role1`, which is granted `TOB1_1.TOP1_1`. `role2` exists
/// with `TOB2_1.TOP2_1` but is not assigned.
pub fn flat() -> Fixture {
    let fx = Fixture::new();
    fx.user("jdoe");
    for i in 1..=2 {
        fx.role(&format!("role{i}"));
        let k = key(i);
        fx.permission(&k.obj_name, &k.op_name);
        fx.grant(&k, &format!("role{i}"));
    }
    fx.assign("jdoe", "role1");
    fx
}

/// `role1 -> role2 -> ... -> role{n}` with role `i` granted `key(i)`.
/// `jdoe` holds only `role1`.
pub fn chain(n: usize) -> Fixture {
    let fx = Fixture::new();
    fx.user("jdoe");
    for i in 1..=n {
        fx.role(&format!("role{i}"));
        let k = key(i);
        fx.permission(&k.obj_name, &k.op_name);
        fx.grant(&k, &format!("role{i}"));
    }
    for i in 1..n {
        fx.inherit(&format!("role{i}"), &format!("role{}", i + 1));
    }
    fx.assign("jdoe", "role1");
    fx
}
