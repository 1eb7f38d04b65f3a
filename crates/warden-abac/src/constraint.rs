//! Role-constraint bookkeeping on user-role assignments.
//!
//! A constraint may only be attached when its key is enabled on the role.
//! Enabling and disabling keys is a property of the role, independent of any
//! single assignment; disabling a key does not remove constraints already
//! attached, it only stops new ones from being added and stops `User`-typed
//! ones from gating activation.

use thiserror::Error;
use tracing::{debug, warn};
use warden_types::{ConstraintId, Role, RoleConstraint, UserRole};

/// Error type for constraint edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConstraintError {
    /// The role has not enabled constraints with this key.
    #[error("constraint key '{key}' is not enabled for role '{role}'")]
    KeyNotEnabled { role: String, key: String },

    /// The assignment already carries an identical constraint.
    #[error("role '{role}' for user '{user}' already has constraint {key}={value}")]
    Duplicate {
        user: String,
        role: String,
        key: String,
        value: String,
    },

    #[error("constraint {0} not found on assignment")]
    NotFound(String),

    #[error("constraint key must not be empty")]
    EmptyKey,
}

/// Result type for constraint edits.
pub type Result<T> = std::result::Result<T, ConstraintError>;

/// Checks that `constraint` may be attached to assignments of `role`.
pub fn validate(role: &Role, constraint: &RoleConstraint) -> Result<()> {
    if constraint.key.trim().is_empty() {
        return Err(ConstraintError::EmptyKey);
    }
    if !role.is_constraint_enabled(&constraint.key) {
        warn!(role = %role.name, key = %constraint.key, "Constraint key not enabled");
        return Err(ConstraintError::KeyNotEnabled {
            role: role.name.clone(),
            key: constraint.key.clone(),
        });
    }
    Ok(())
}

/// Attaches `constraint` to `assignment` and returns it with a fresh id.
///
/// Any id already present on `constraint` is replaced.
pub fn add(
    role: &Role,
    assignment: &mut UserRole,
    constraint: RoleConstraint,
) -> Result<RoleConstraint> {
    validate(role, &constraint)?;
    if assignment
        .constraints
        .iter()
        .any(|c| c.same_value(&constraint))
    {
        return Err(ConstraintError::Duplicate {
            user: assignment.user_id.clone(),
            role: assignment.role_name.clone(),
            key: constraint.key,
            value: constraint.value,
        });
    }

    let stored = constraint.with_id(ConstraintId::generate());
    assignment.constraints.push(stored.clone());
    debug!(
        user = %assignment.user_id,
        role = %assignment.role_name,
        key = %stored.key,
        "Role constraint added"
    );
    Ok(stored)
}

/// Removes the constraint with the same type, key and value.
pub fn remove(assignment: &mut UserRole, constraint: &RoleConstraint) -> Result<RoleConstraint> {
    let pos = assignment
        .constraints
        .iter()
        .position(|c| c.same_value(constraint))
        .ok_or_else(|| {
            ConstraintError::NotFound(format!("{}={}", constraint.key, constraint.value))
        })?;
    Ok(assignment.constraints.remove(pos))
}

/// Removes the constraint with the given id.
pub fn remove_by_id(assignment: &mut UserRole, id: ConstraintId) -> Result<RoleConstraint> {
    let pos = assignment
        .constraints
        .iter()
        .position(|c| c.id == Some(id))
        .ok_or_else(|| ConstraintError::NotFound(id.to_string()))?;
    Ok(assignment.constraints.remove(pos))
}

/// Enables constraints with `key` on `role`. Returns `false` if already enabled.
pub fn enable_key(role: &mut Role, key: &str) -> Result<bool> {
    if key.trim().is_empty() {
        return Err(ConstraintError::EmptyKey);
    }
    Ok(role.constraint_keys.insert(key.to_string()))
}

/// Disables constraints with `key` on `role`. Returns `false` if not enabled.
pub fn disable_key(role: &mut Role, key: &str) -> bool {
    role.constraint_keys.remove(key)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn teller() -> Role {
        Role::new("teller").with_constraint_key("branch")
    }

    #[test]
    fn add_assigns_id_and_rejects_duplicates() {
        let role = teller();
        let mut ur = UserRole::new("jdoe", "teller");

        let stored = add(&role, &mut ur, RoleConstraint::filter("branch", "north")).unwrap();
        assert!(stored.id.is_some());
        assert_eq!(ur.constraints.len(), 1);
        assert_eq!(ur.constraints[0], stored);

        let err = add(&role, &mut ur, RoleConstraint::filter("branch", "north")).unwrap_err();
        assert!(matches!(err, ConstraintError::Duplicate { .. }));

        add(&role, &mut ur, RoleConstraint::filter("branch", "south")).unwrap();
        assert_eq!(ur.constraints.len(), 2);
    }

    #[test]
    fn key_must_be_enabled() {
        let role = Role::new("teller");
        let mut ur = UserRole::new("jdoe", "teller");
        let err = add(&role, &mut ur, RoleConstraint::filter("branch", "north")).unwrap_err();
        assert_eq!(
            err,
            ConstraintError::KeyNotEnabled {
                role: "teller".into(),
                key: "branch".into()
            }
        );
        assert!(ur.constraints.is_empty());
    }

    #[test]
    fn remove_by_value_and_id() {
        let role = teller();
        let mut ur = UserRole::new("jdoe", "teller");
        let north = add(&role, &mut ur, RoleConstraint::filter("branch", "north")).unwrap();
        add(&role, &mut ur, RoleConstraint::filter("branch", "south")).unwrap();
        add(&role, &mut ur, RoleConstraint::filter("branch", "east")).unwrap();

        remove(&mut ur, &RoleConstraint::filter("branch", "south")).unwrap();
        assert_eq!(ur.constraints.len(), 2);

        let removed = remove_by_id(&mut ur, north.id.unwrap()).unwrap();
        assert_eq!(removed.value, "north");
        assert_eq!(ur.constraints.len(), 1);

        assert!(matches!(
            remove_by_id(&mut ur, ConstraintId::generate()),
            Err(ConstraintError::NotFound(_))
        ));
    }

    #[test]
    fn enable_and_disable_keys() {
        let mut role = Role::new("teller");
        assert!(enable_key(&mut role, "branch").unwrap());
        assert!(!enable_key(&mut role, "branch").unwrap());
        assert_eq!(enable_key(&mut role, " "), Err(ConstraintError::EmptyKey));

        assert!(disable_key(&mut role, "branch"));
        assert!(!disable_key(&mut role, "branch"));
        assert!(validate(&role, &RoleConstraint::filter("branch", "x")).is_err());
    }
}
