//! # warden-abac: Attribute-based role constraints
//!
//! Extends RBAC decisions with key/value constraints attached to user-role
//! assignments:
//! - **Constraint bookkeeping** ([`constraint`]): key enablement per role,
//!   add/remove on assignments with repository-style ids
//! - **Activation gating** ([`activation`]): `User`-typed constraints checked
//!   against the user's runtime properties before a role activates
//! - **Attribute matching** ([`evaluator`]): `Filter`-typed constraints of the
//!   active roles matched against a permission's attribute set
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Active assignments (UserRole + constraints) │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Evaluator                                   │
//! │  ├─ Collect Filter constraints per attribute │
//! │  ├─ Apply attribute operator                 │
//! │  └─ Existential match over values            │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Decision                                    │
//! │  - Effect (Allow/Deny)                       │
//! │  - Deciding attribute                        │
//! │  - Human-readable reason                     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//!
//! ```
//! use warden_abac::{constraint, evaluator};
//! use warden_types::{PermissionAttribute, PermissionAttributeSet, Role, RoleConstraint, UserRole};
//!
//! let role = Role::new("teller").with_constraint_key("branch");
//! let mut assignment = UserRole::new("jdoe", "teller");
//! constraint::add(&role, &mut assignment, RoleConstraint::filter("branch", "north"))?;
//!
//! let set = PermissionAttributeSet::new("branch-only")
//!     .with_attribute(PermissionAttribute::new("branch").with_valid_value("north"));
//!
//! let decision = evaluator::evaluate(&set, &[assignment]);
//! assert!(decision.is_allowed());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod activation;
pub mod constraint;
pub mod evaluator;

pub use activation::UserAttributeGate;
pub use constraint::ConstraintError;
pub use evaluator::{Decision, Effect, evaluate};
