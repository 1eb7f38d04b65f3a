//! Integration tests for attribute constraints on role assignments.

mod common;

use common::{Fixture, PASSWORD, USER_OU};
use warden::prelude::*;
use warden::types::{
    AttributeDataType, AttributeOperator, PermKey, PermObj, Permission, PermissionAttribute,
    PermissionAttributeSet, Role, RoleConstraint, User, UserRole,
};

const SYS: AdminContext<'static> = AdminContext::System;

/// `teller` has key `branch` enabled and `Account.deposit` requires a
/// `branch` filter of `north` or `east`.
fn branch_fixture() -> (Fixture, PermKey) {
    let fx = Fixture::new();
    fx.warden
        .add_role(SYS, Role::new("teller").with_constraint_key("branch"))
        .unwrap();
    fx.warden
        .add_attribute_set(
            SYS,
            PermissionAttributeSet::new("branch-only").with_attribute(
                PermissionAttribute::new("branch")
                    .with_valid_value("north")
                    .with_valid_value("east"),
            ),
        )
        .unwrap();
    fx.warden
        .add_perm_obj(SYS, PermObj::new("Account", common::PERM_OU))
        .unwrap();
    fx.warden
        .add_permission(
            SYS,
            Permission::new("Account", "deposit").with_pa_set("branch-only"),
        )
        .unwrap();
    let deposit = PermKey::new("Account", "deposit");
    fx.grant(&deposit, "teller");
    (fx, deposit)
}

fn teller_in(fx: &Fixture, user_id: &str, branch: Option<&str>) {
    fx.user(user_id);
    let mut assignment = UserRole::new(user_id, "teller");
    if let Some(branch) = branch {
        assignment = assignment.with_constraint(RoleConstraint::filter("branch", branch));
    }
    fx.warden.assign_user(SYS, assignment).unwrap();
}

// ============================================================================
// Constraint bookkeeping
// ============================================================================

#[test]
fn added_constraint_gets_id_and_round_trips() {
    let (fx, _) = branch_fixture();
    teller_in(&fx, "jdoe", None);

    let stored = fx
        .warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("branch", "north"))
        .unwrap();
    assert!(stored.id.is_some());

    let listed = fx.warden.role_constraints("jdoe", "teller").unwrap();
    assert_eq!(listed, vec![stored]);
}

#[test]
fn inline_assignment_constraints_get_ids() {
    let (fx, _) = branch_fixture();
    teller_in(&fx, "jdoe", Some("north"));

    let listed = fx.warden.role_constraints("jdoe", "teller").unwrap();
    assert_eq!(listed.len(), 1);
    assert!(listed[0].id.is_some());
}

#[test]
fn remove_by_value_drops_exactly_one() {
    let (fx, _) = branch_fixture();
    teller_in(&fx, "jdoe", None);
    for branch in ["north", "east", "west"] {
        fx.warden
            .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("branch", branch))
            .unwrap();
    }

    fx.warden
        .remove_role_constraint(SYS, "jdoe", "teller", &RoleConstraint::filter("branch", "east"))
        .unwrap();
    let values: Vec<String> = fx
        .warden
        .role_constraints("jdoe", "teller")
        .unwrap()
        .into_iter()
        .map(|c| c.value)
        .collect();
    assert_eq!(values, vec!["north", "west"]);
}

#[test]
fn remove_by_id_drops_exactly_one() {
    let (fx, _) = branch_fixture();
    teller_in(&fx, "jdoe", None);
    let north = fx
        .warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("branch", "north"))
        .unwrap();
    fx.warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("branch", "east"))
        .unwrap();

    fx.warden
        .remove_role_constraint_by_id(SYS, "jdoe", "teller", north.id.unwrap())
        .unwrap();
    let left = fx.warden.role_constraints("jdoe", "teller").unwrap();
    assert_eq!(left.len(), 1);
    assert_eq!(left[0].value, "east");

    let err = fx
        .warden
        .remove_role_constraint_by_id(SYS, "jdoe", "teller", north.id.unwrap())
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintNotFound);
}

#[test]
fn duplicate_constraint_is_rejected() {
    let (fx, _) = branch_fixture();
    teller_in(&fx, "jdoe", Some("north"));

    let err = fx
        .warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("branch", "north"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::AlreadyExists);
}

#[test]
fn constraint_needs_enabled_key() {
    let (fx, _) = branch_fixture();
    teller_in(&fx, "jdoe", None);

    let err = fx
        .warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("region", "emea"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintKeyNotEnabled);

    fx.warden
        .enable_role_constraint(SYS, "teller", "region")
        .unwrap();
    fx.warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("region", "emea"))
        .unwrap();
    assert!(fx.warden.read_role("teller").unwrap().is_constraint_enabled("region"));
}

#[test]
fn disabling_key_keeps_existing_constraints() {
    let (fx, _) = branch_fixture();
    teller_in(&fx, "jdoe", Some("north"));

    fx.warden
        .disable_role_constraint(SYS, "teller", "branch")
        .unwrap();
    assert_eq!(fx.warden.role_constraints("jdoe", "teller").unwrap().len(), 1);

    let err = fx
        .warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("branch", "east"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConstraintKeyNotEnabled);
}

#[test]
fn constraint_on_unassigned_role_fails() {
    let (fx, _) = branch_fixture();
    fx.user("jdoe");
    let err = fx
        .warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("branch", "north"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotAssigned);
}

// ============================================================================
// Filter constraints at access time
// ============================================================================

#[test]
fn matching_filter_grants_access() {
    let (fx, deposit) = branch_fixture();
    teller_in(&fx, "jdoe", Some("north"));
    let mut session = fx.login("jdoe");

    assert!(fx.warden.check_access(&mut session, &deposit).unwrap());
}

#[test]
fn any_matching_value_is_enough() {
    let (fx, deposit) = branch_fixture();
    teller_in(&fx, "jdoe", Some("west"));
    fx.warden
        .add_role_constraint(SYS, "jdoe", "teller", RoleConstraint::filter("branch", "east"))
        .unwrap();
    let mut session = fx.login("jdoe");

    assert!(fx.warden.check_access(&mut session, &deposit).unwrap());
}

#[test]
fn mismatched_filter_denies_access() {
    let (fx, deposit) = branch_fixture();
    teller_in(&fx, "jdoe", Some("south"));
    let mut session = fx.login("jdoe");

    let decision = fx.warden.explain_access(&mut session, &deposit).unwrap();
    assert!(!decision.granted);
    assert!(decision.reason.contains("branch"));
}

#[test]
fn missing_required_attribute_denies_access() {
    let (fx, deposit) = branch_fixture();
    teller_in(&fx, "jdoe", None);
    let mut session = fx.login("jdoe");

    assert!(!fx.warden.check_access(&mut session, &deposit).unwrap());
}

#[test]
fn optional_attribute_may_be_absent() {
    let (fx, deposit) = branch_fixture();
    fx.warden
        .remove_permission_attribute(SYS, "branch-only", "branch")
        .unwrap();
    fx.warden
        .add_permission_attribute(
            SYS,
            "branch-only",
            PermissionAttribute::new("branch").optional().with_valid_value("north"),
        )
        .unwrap();
    teller_in(&fx, "jdoe", None);
    let mut session = fx.login("jdoe");

    assert!(fx.warden.check_access(&mut session, &deposit).unwrap());
}

#[test]
fn numeric_range_attribute() {
    let (fx, _) = branch_fixture();
    fx.warden
        .enable_role_constraint(SYS, "teller", "limit")
        .unwrap();
    fx.warden
        .add_attribute_set(
            SYS,
            PermissionAttributeSet::new("large-transfer").with_attribute(
                PermissionAttribute::new("limit")
                    .with_data_type(AttributeDataType::Integer)
                    .with_operator(AttributeOperator::GreaterOrEqual)
                    .with_valid_value("10000"),
            ),
        )
        .unwrap();
    fx.warden
        .add_permission(
            SYS,
            Permission::new("Account", "transfer").with_pa_set("large-transfer"),
        )
        .unwrap();
    let transfer = PermKey::new("Account", "transfer");
    fx.grant(&transfer, "teller");

    fx.user("jdoe");
    fx.warden
        .assign_user(
            SYS,
            UserRole::new("jdoe", "teller").with_constraint(RoleConstraint::filter("limit", "25000")),
        )
        .unwrap();
    fx.user("mary");
    fx.warden
        .assign_user(
            SYS,
            UserRole::new("mary", "teller").with_constraint(RoleConstraint::filter("limit", "5000")),
        )
        .unwrap();

    let mut jdoe = fx.login("jdoe");
    let mut mary = fx.login("mary");
    assert!(fx.warden.check_access(&mut jdoe, &transfer).unwrap());
    assert!(!fx.warden.check_access(&mut mary, &transfer).unwrap());
}

#[test]
fn not_equals_denies_every_excluded_value() {
    let (fx, _) = branch_fixture();
    fx.warden
        .add_attribute_set(
            SYS,
            PermissionAttributeSet::new("outside-hq").with_attribute(
                PermissionAttribute::new("branch")
                    .with_operator(AttributeOperator::NotEquals)
                    .with_valid_value("hq")
                    .with_valid_value("vault"),
            ),
        )
        .unwrap();
    fx.warden
        .add_permission(SYS, Permission::new("Account", "audit").with_pa_set("outside-hq"))
        .unwrap();
    let audit = PermKey::new("Account", "audit");
    fx.grant(&audit, "teller");

    teller_in(&fx, "jdoe", Some("hq"));
    teller_in(&fx, "mary", Some("vault"));
    teller_in(&fx, "ann", Some("north"));

    let mut jdoe = fx.login("jdoe");
    let mut mary = fx.login("mary");
    let mut ann = fx.login("ann");
    assert!(!fx.warden.check_access(&mut jdoe, &audit).unwrap());
    assert!(!fx.warden.check_access(&mut mary, &audit).unwrap());
    assert!(fx.warden.check_access(&mut ann, &audit).unwrap());
}

#[test]
fn glob_attribute_matches_multibyte_values() {
    let (fx, _) = branch_fixture();
    fx.warden
        .add_attribute_set(
            SYS,
            PermissionAttributeSet::new("munich").with_attribute(
                PermissionAttribute::new("branch")
                    .with_operator(AttributeOperator::Matches)
                    .with_valid_value("M?nchen-*"),
            ),
        )
        .unwrap();
    fx.warden
        .add_permission(SYS, Permission::new("Account", "close").with_pa_set("munich"))
        .unwrap();
    let close = PermKey::new("Account", "close");
    fx.grant(&close, "teller");

    teller_in(&fx, "jdoe", Some("München-Mitte"));
    teller_in(&fx, "mary", Some("Muenchen-Mitte"));
    let mut jdoe = fx.login("jdoe");
    let mut mary = fx.login("mary");
    assert!(fx.warden.check_access(&mut jdoe, &close).unwrap());
    assert!(!fx.warden.check_access(&mut mary, &close).unwrap());
}

#[test]
fn referenced_attribute_set_cannot_be_deleted() {
    let (fx, deposit) = branch_fixture();
    let err = fx
        .warden
        .delete_attribute_set(SYS, "branch-only")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::PolicyViolation);

    fx.warden.delete_permission(SYS, &deposit).unwrap();
    fx.warden.delete_attribute_set(SYS, "branch-only").unwrap();
}

// ============================================================================
// User constraints at activation time
// ============================================================================

fn ward_fixture() -> Fixture {
    let fx = Fixture::new();
    fx.warden
        .add_role(SYS, Role::new("nurse").with_constraint_key("location"))
        .unwrap();
    fx.role("orderly");
    for (user_id, location) in [("ann", "ward-a"), ("ben", "ward-b")] {
        fx.warden
            .add_user(
                SYS,
                User::new(user_id, USER_OU).with_prop("location", location),
                Some(PASSWORD),
            )
            .unwrap();
        fx.warden
            .assign_user(
                SYS,
                UserRole::new(user_id, "nurse").with_constraint(RoleConstraint::user("location", "ward-a")),
            )
            .unwrap();
        fx.assign(user_id, "orderly");
    }
    fx
}

#[test]
fn user_constraint_admits_matching_property() {
    let fx = ward_fixture();
    let session = fx.login("ann");
    assert!(session.is_active("nurse"));
    assert!(session.warnings().is_empty());
}

#[test]
fn user_constraint_skips_role_on_mismatch() {
    let fx = ward_fixture();
    let mut session = fx.login("ben");

    assert!(!session.is_active("nurse"));
    assert!(session.is_active("orderly"));
    assert_eq!(session.warnings()[0].role, "nurse");

    let err = fx.warden.add_active_role(&mut session, "nurse").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ActivationFailed);
}

#[test]
fn user_constraint_fails_explicit_activation() {
    let fx = ward_fixture();
    let err = fx
        .warden
        .create_session("ben", PASSWORD, Some(&["nurse"][..]))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ActivationFailed);
}
