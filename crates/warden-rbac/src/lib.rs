//! # warden-rbac: Role-Based Access Control core
//!
//! Pure decision logic for hierarchical RBAC:
//! - **Hierarchies** (roles, admin roles, user OUs, perm OUs) with cycle rejection
//! - **Separation of duty** (SSD at assignment, DSD at activation)
//! - **Temporal constraints** (dates, lock windows, daily windows, weekdays, idle timeout)
//! - **Sessions** and the role-activation state machine
//! - **Permission resolution** over the active-role closure
//!
//! Nothing here talks to storage. Callers hand in snapshots of entities and
//! graphs; the only values mutated are the ones passed by `&mut`.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Session (active roles ⊆ assigned roles)    │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  Activator                                  │
//! │  ├─ TemporalValidator                       │
//! │  ├─ ActivationGate (attribute constraints)  │
//! │  └─ SodEngine (DSD)                         │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!                   ▼
//! ┌─────────────────────────────────────────────┐
//! │  PermissionResolver                         │
//! │  - closure of active roles over Hierarchy   │
//! │  - role grants, then direct user grants     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//!
//! ### Hierarchy closure
//!
//! ```
//! use warden_rbac::Hierarchy;
//! use warden_types::HierarchyKind;
//!
//! let mut roles = Hierarchy::new(HierarchyKind::Role);
//! for name in ["manager", "clerk", "intern"] {
//!     roles.add_node(name);
//! }
//! roles.add_edge("manager", "clerk")?;
//! roles.add_edge("clerk", "intern")?;
//!
//! let authorized = roles.closure_down(["manager"]);
//! assert_eq!(authorized.len(), 3);
//!
//! // Cycles are rejected when the edge is inserted.
//! assert!(roles.add_edge("intern", "manager").is_err());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ### Separation of duty
//!
//! ```
//! use warden_rbac::{Hierarchy, SodEngine};
//! use warden_types::{HierarchyKind, SdSet, SdType};
//!
//! let roles = Hierarchy::new(HierarchyKind::Role);
//! let sets = vec![SdSet::new("cashier-auditor", SdType::Static, 2)
//!     .with_members(["cashier", "auditor"])];
//! let sod = SodEngine::new(&roles, &sets);
//!
//! assert!(sod.validate_ssd([], "cashier").is_ok());
//! assert!(sod.validate_ssd(["cashier"], "auditor").is_err());
//! ```

pub mod access;
pub mod hierarchy;
pub mod session;
pub mod sod;
pub mod temporal;

// Re-export commonly used types
pub use access::{GrantPath, PermissionResolver};
pub use hierarchy::{Hierarchy, HierarchyError};
pub use session::{
    ActivationError, ActivationGate, Activator, Session, SessionState, SessionWarning,
};
pub use sod::{SodEngine, SodError};
pub use temporal::{TemporalError, TemporalPolicy, TemporalValidator};
