//! Integration tests for sessions and access decisions.

mod common;

use common::{Fixture, PASSWORD, chain, flat, key};
use test_case::test_case;
use warden::prelude::*;
use warden::types::PermKey;
use warden::{GrantPath, WardenConfig};

// ============================================================================
// Flat RBAC
// ============================================================================

#[test]
fn flat_role_grants_only_its_permission() {
    let fx = flat();
    let mut session = fx.login("jdoe");

    assert!(fx.warden.check_access(&mut session, &key(1)).unwrap());
    assert!(!fx.warden.check_access(&mut session, &key(2)).unwrap());
}

#[test]
fn unknown_permission_is_denied_not_an_error() {
    let fx = flat();
    let mut session = fx.login("jdoe");

    let decision = fx
        .warden
        .explain_access(&mut session, &PermKey::new("Nope", "nothing"))
        .unwrap();
    assert!(!decision.granted);
    assert!(decision.path.is_none());
}

#[test]
fn explain_access_reports_grant_path() {
    let fx = flat();
    let mut session = fx.login("jdoe");

    let decision = fx.warden.explain_access(&mut session, &key(1)).unwrap();
    assert!(decision.granted);
    assert_eq!(decision.path, Some(GrantPath::Role("role1".to_string())));
    assert!(decision.reason.contains("role1"));
}

#[test]
fn direct_user_grant_is_visible() {
    let fx = flat();
    fx.warden
        .grant_permission_user(AdminContext::System, &key(2), "jdoe")
        .unwrap();
    let mut session = fx.login("jdoe");

    let decision = fx.warden.explain_access(&mut session, &key(2)).unwrap();
    assert!(decision.granted);
    assert_eq!(decision.path, Some(GrantPath::User));

    let perms = fx.warden.session_permissions(&mut session).unwrap();
    let keys: Vec<PermKey> = perms.iter().map(|p| p.key()).collect();
    assert_eq!(keys, vec![key(1), key(2)]);
}

#[test]
fn object_id_must_match_exactly() {
    let fx = flat();
    let scoped = PermKey::new("TOB1_1", "TOP1_1").with_obj_id("42");
    let mut session = fx.login("jdoe");

    assert!(!fx.warden.check_access(&mut session, &scoped).unwrap());
}

// ============================================================================
// Hierarchical RBAC
// ============================================================================

#[test_case(1 ; "single role")]
#[test_case(3 ; "short chain")]
#[test_case(6 ; "long chain")]
fn senior_inherits_every_junior_permission(n: usize) {
    let fx = chain(n);
    let mut session = fx.login("jdoe");

    for i in 1..=n {
        assert!(
            fx.warden.check_access(&mut session, &key(i)).unwrap(),
            "role1 should reach TOB{i}_1"
        );
    }
    assert_eq!(fx.warden.session_permissions(&mut session).unwrap().len(), n);
}

#[test]
fn junior_does_not_inherit_senior_permission() {
    let fx = chain(3);
    fx.user("mary");
    fx.assign("mary", "role3");
    let mut session = fx.login("mary");

    assert!(fx.warden.check_access(&mut session, &key(3)).unwrap());
    assert!(!fx.warden.check_access(&mut session, &key(1)).unwrap());
    assert!(!fx.warden.check_access(&mut session, &key(2)).unwrap());
}

#[test]
fn authorized_session_roles_include_juniors() {
    let fx = chain(4);
    let mut session = fx.login("jdoe");

    let roles = fx.warden.authorized_session_roles(&mut session).unwrap();
    assert_eq!(
        roles.into_iter().collect::<Vec<_>>(),
        vec!["role1", "role2", "role3", "role4"]
    );
    assert_eq!(fx.warden.session_roles(&mut session).unwrap().len(), 1);
}

#[test]
fn hierarchy_change_applies_to_live_session() {
    let fx = flat();
    let mut session = fx.login("jdoe");
    assert!(!fx.warden.check_access(&mut session, &key(2)).unwrap());

    fx.inherit("role1", "role2");
    assert!(fx.warden.check_access(&mut session, &key(2)).unwrap());
}

// ============================================================================
// Authentication
// ============================================================================

#[test]
fn wrong_password_is_rejected() {
    let fx = flat();
    let err = fx.warden.create_session("jdoe", "wrong", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPassword);
}

#[test]
fn unknown_user_is_rejected() {
    let fx = flat();
    let err = fx.warden.create_session("ghost", PASSWORD, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::UserNotFound);
}

#[test]
fn locked_user_cannot_log_in_until_unlocked() {
    let fx = flat();
    fx.warden.lock_user(AdminContext::System, "jdoe").unwrap();

    let err = fx.warden.create_session("jdoe", PASSWORD, None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountLocked);
    let err = fx.warden.create_trusted_session("jdoe", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AccountLocked);

    fx.warden.unlock_user(AdminContext::System, "jdoe").unwrap();
    fx.login("jdoe");
}

#[test]
fn reset_password_forces_change() {
    let fx = flat();
    fx.warden
        .reset_password(AdminContext::System, "jdoe", "temporary")
        .unwrap();

    let err = fx
        .warden
        .create_session("jdoe", "temporary", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PasswordResetRequired);

    fx.warden
        .change_password(AdminContext::System, "jdoe", "temporary", "fresh-one")
        .unwrap();
    let session = fx.warden.create_session("jdoe", "fresh-one", None).unwrap();
    assert!(session.is_active("role1"));
}

#[test]
fn change_password_checks_old_password() {
    let fx = flat();
    let err = fx
        .warden
        .change_password(AdminContext::System, "jdoe", "not-it", "fresh-one")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidPassword);
    fx.login("jdoe");
}

#[test]
fn trusted_session_skips_password() {
    let fx = flat();
    let mut session = fx.warden.create_trusted_session("jdoe", None).unwrap();
    assert!(session.is_trusted());
    assert!(fx.warden.check_access(&mut session, &key(1)).unwrap());
}

#[test]
fn trusted_sessions_can_be_disabled() {
    let fx = Fixture::with_config(WardenConfig::production());
    fx.user("jdoe");
    let err = fx.warden.create_trusted_session("jdoe", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyViolation);
}

#[test]
fn ended_session_rejects_further_checks() {
    let fx = flat();
    let mut session = fx.login("jdoe");
    fx.warden.end_session(&mut session);

    let err = fx.warden.check_access(&mut session, &key(1)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::SessionExpired);
}
