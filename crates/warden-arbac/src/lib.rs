//! # warden-arbac: Delegated administration
//!
//! ARBAC02 authorization for administrators acting through an admin role
//! instead of the system context. An admin role administers:
//! - users whose OU lies in its user-OU subtrees
//! - permission objects whose OU lies in its perm-OU subtrees
//! - regular roles inside its [`RoleRange`](warden_types::RoleRange)
//!
//! `can_assign`/`can_deassign` combine the user-OU check with the role
//! range; `can_grant`/`can_revoke` combine the perm-OU check with it.
//!
//! ## Example
//!
//! ```
//! use warden_arbac::Authorizer;
//! use warden_rbac::Hierarchy;
//! use warden_types::{AdminRole, HierarchyKind, RoleRange, User};
//!
//! let mut roles = Hierarchy::new(HierarchyKind::Role);
//! for name in ["lead", "dev", "intern"] {
//!     roles.add_node(name);
//! }
//! roles.add_edge("lead", "dev")?;
//! roles.add_edge("dev", "intern")?;
//!
//! let mut user_ous = Hierarchy::new(HierarchyKind::UserOu);
//! user_ous.add_node("eng");
//! let perm_ous = Hierarchy::new(HierarchyKind::PermOu);
//!
//! let admin = AdminRole::new("eng-admin")
//!     .with_user_ou("eng")
//!     .with_role_range(RoleRange::inclusive("intern", "dev"));
//!
//! let auth = Authorizer::new(&roles, &user_ous, &perm_ous);
//! assert!(auth.can_assign(&admin, &User::new("jdoe", "eng"), "dev"));
//! assert!(!auth.can_assign(&admin, &User::new("jdoe", "eng"), "lead"));
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod authorizer;
pub mod range;

pub use authorizer::{Authorizer, DelegationError, session_admin_role};
pub use range::{ou_in_scope, role_in_range};
