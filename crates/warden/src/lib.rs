//! # warden: RBAC, ARBAC02 and ABAC policy decision engine
//!
//! `warden` ties the decision cores to a policy repository and exposes them
//! through four capability traits:
//! - [`AccessCapability`]: sessions, role activation and `check_access`
//! - [`AdminCapability`]: users, roles, permissions, SoD sets and constraints
//! - [`DelegatedCapability`]: admin roles, organizational units and ARBAC02
//! - [`ReviewCapability`]: read-only policy queries
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │  Warden (capability traits)                 │
//! │  ├─ AdminContext (System | Delegated)       │
//! │  ├─ Clock                                   │
//! │  └─ WardenConfig                            │
//! └─────────────────┬───────────────────────────┘
//!                   │
//!        ┌──────────┼───────────┐
//!        ▼          ▼           ▼
//! ┌────────────┐ ┌──────────┐ ┌─────────────┐
//! │ warden-rbac│ │warden-   │ │ warden-arbac│
//! │ hierarchy  │ │abac      │ │ OU scope    │
//! │ SoD        │ │ gate     │ │ role range  │
//! │ sessions   │ │ filters  │ │             │
//! └─────┬──────┘ └────┬─────┘ └──────┬──────┘
//!       └─────────────┼──────────────┘
//!                     ▼
//! ┌─────────────────────────────────────────────┐
//! │  Repository (warden-store)                  │
//! │  MemoryStore by default                     │
//! └─────────────────────────────────────────────┘
//! ```
//!
//! ## Examples
//!
//! ### Separation of duty
//!
//! ```
//! use warden::prelude::*;
//! use warden::types::{OrgUnit, Role, SdSet, SdType, User, UserRole};
//!
//! let warden = Warden::in_memory();
//! let ctx = AdminContext::System;
//!
//! warden.add_org_unit(ctx, OrgUnit::user("staff"))?;
//! warden.add_user(ctx, User::new("bob", "staff"), Some("pw"))?;
//! warden.add_role(ctx, Role::new("buyer"))?;
//! warden.add_role(ctx, Role::new("approver"))?;
//! warden.create_sd_set(
//!     ctx,
//!     SdSet::new("purchasing", SdType::Static, 2).with_members(["buyer", "approver"]),
//! )?;
//!
//! warden.assign_user(ctx, UserRole::new("bob", "buyer"))?;
//! let err = warden
//!     .assign_user(ctx, UserRole::new("bob", "approver"))
//!     .unwrap_err();
//! assert_eq!(err.kind(), ErrorKind::SsdFailed);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod access;
mod admin;
mod capability;
mod clock;
mod context;
mod delegated;
mod engine;
mod error;
mod review;

pub use access::AccessDecision;
pub use capability::{AccessCapability, AdminCapability, DelegatedCapability, ReviewCapability};
pub use clock::{Clock, FixedClock, SystemClock};
pub use context::AdminContext;
pub use engine::{ADMIN_OBJECT, DELEGATED_ADMIN_OBJECT, Warden};
pub use error::{ErrorKind, Result, WardenError};

pub use warden_config::WardenConfig;
pub use warden_rbac::{GrantPath, Session, SessionState, SessionWarning};
pub use warden_store::{MemoryStore, Repository};
pub use warden_types as types;

/// The capability traits and the handles needed to call them.
pub mod prelude {
    pub use crate::{
        AccessCapability, AdminCapability, AdminContext, DelegatedCapability, ErrorKind,
        ReviewCapability, Warden,
    };
}
