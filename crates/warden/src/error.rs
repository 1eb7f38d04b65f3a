//! Unified error taxonomy.
//!
//! Every failure leaving the engine is a [`WardenError`]. Errors from the
//! decision cores and the repository are translated here so callers never
//! see storage-specific codes.

use thiserror::Error;
use warden_abac::ConstraintError;
use warden_arbac::DelegationError;
use warden_rbac::{ActivationError, HierarchyError, SodError, TemporalError};
use warden_store::StoreError;
use warden_types::SessionId;

/// Stable classification of a [`WardenError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    // Credential
    UserNotFound,
    InvalidPassword,
    AccountLocked,
    PasswordResetRequired,
    SessionExpired,
    UserTemporalConstraint,
    // Assignment and activation
    ActivationFailed,
    AlreadyActive,
    NotActive,
    AlreadyAssigned,
    NotAssigned,
    // Constraint
    SsdFailed,
    DsdFailed,
    ConstraintKeyNotEnabled,
    HierarchyCycle,
    InvalidCardinality,
    ConstraintNotFound,
    // Entity
    NotFound,
    AlreadyExists,
    PolicyViolation,
    InvalidInput,
    // Delegated administration
    AdminRoleMissing,
    OutOfRange,
    AdminPermissionDenied,
    // Collaborator
    BackendUnavailable,
}

impl ErrorKind {
    /// Numeric code, stable across releases.
    pub fn code(self) -> u16 {
        match self {
            Self::UserNotFound => 1000,
            Self::InvalidPassword => 1001,
            Self::AccountLocked => 1002,
            Self::PasswordResetRequired => 1003,
            Self::SessionExpired => 1004,
            Self::UserTemporalConstraint => 1005,
            Self::ActivationFailed => 2000,
            Self::AlreadyActive => 2001,
            Self::NotActive => 2002,
            Self::AlreadyAssigned => 2003,
            Self::NotAssigned => 2004,
            Self::SsdFailed => 3000,
            Self::DsdFailed => 3001,
            Self::ConstraintKeyNotEnabled => 3002,
            Self::HierarchyCycle => 3003,
            Self::InvalidCardinality => 3004,
            Self::ConstraintNotFound => 3005,
            Self::NotFound => 4000,
            Self::AlreadyExists => 4001,
            Self::PolicyViolation => 4002,
            Self::InvalidInput => 4003,
            Self::AdminRoleMissing => 5000,
            Self::OutOfRange => 5001,
            Self::AdminPermissionDenied => 5002,
            Self::BackendUnavailable => 9000,
        }
    }

    /// Only transient backend faults are worth retrying unchanged.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::BackendUnavailable)
    }
}

/// Error type for every engine operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WardenError {
    #[error("user '{0}' not found")]
    UserNotFound(String),

    #[error("invalid password for user '{user_id}'")]
    InvalidPassword { user_id: String },

    #[error("user '{user_id}' is locked")]
    AccountLocked { user_id: String },

    #[error("user '{user_id}' must reset their password")]
    PasswordResetRequired { user_id: String },

    #[error("session {0} has expired")]
    SessionExpired(SessionId),

    #[error("user '{user_id}' may not sign in now: {source}")]
    UserTemporalConstraint {
        user_id: String,
        source: TemporalError,
    },

    #[error("role '{role}' cannot be activated: {reason}")]
    ActivationFailed { role: String, reason: String },

    #[error("role '{role}' is already active")]
    AlreadyActive { role: String },

    #[error("role '{role}' is not active")]
    NotActive { role: String },

    #[error("user '{user_id}' is already assigned role '{role}'")]
    AlreadyAssigned { user_id: String, role: String },

    #[error("user '{user_id}' is not assigned role '{role}'")]
    NotAssigned { user_id: String, role: String },

    #[error(transparent)]
    Ssd(SodError),

    #[error(transparent)]
    Dsd(SodError),

    #[error("constraint key '{key}' is not enabled for role '{role}'")]
    ConstraintKeyNotEnabled { role: String, key: String },

    #[error(transparent)]
    HierarchyCycle(HierarchyError),

    #[error("SD set '{set}' cardinality {cardinality} is below the minimum of 2")]
    InvalidCardinality { set: String, cardinality: u32 },

    #[error("role constraint {0} not found")]
    ConstraintNotFound(String),

    #[error("{entity} '{key}' not found")]
    NotFound { entity: &'static str, key: String },

    #[error("{entity} '{key}' already exists")]
    AlreadyExists { entity: &'static str, key: String },

    #[error("policy violation: {0}")]
    PolicyViolation(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("admin session must have exactly one active admin role, found {found}")]
    AdminRoleMissing { found: usize },

    #[error(transparent)]
    OutOfRange(DelegationError),

    #[error("admin role '{admin_role}' lacks permission {object}.{operation}")]
    AdminPermissionDenied {
        admin_role: String,
        object: String,
        operation: String,
    },

    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),
}

impl WardenError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_) => ErrorKind::UserNotFound,
            Self::InvalidPassword { .. } => ErrorKind::InvalidPassword,
            Self::AccountLocked { .. } => ErrorKind::AccountLocked,
            Self::PasswordResetRequired { .. } => ErrorKind::PasswordResetRequired,
            Self::SessionExpired(_) => ErrorKind::SessionExpired,
            Self::UserTemporalConstraint { .. } => ErrorKind::UserTemporalConstraint,
            Self::ActivationFailed { .. } => ErrorKind::ActivationFailed,
            Self::AlreadyActive { .. } => ErrorKind::AlreadyActive,
            Self::NotActive { .. } => ErrorKind::NotActive,
            Self::AlreadyAssigned { .. } => ErrorKind::AlreadyAssigned,
            Self::NotAssigned { .. } => ErrorKind::NotAssigned,
            Self::Ssd(_) => ErrorKind::SsdFailed,
            Self::Dsd(_) => ErrorKind::DsdFailed,
            Self::ConstraintKeyNotEnabled { .. } => ErrorKind::ConstraintKeyNotEnabled,
            Self::HierarchyCycle(_) => ErrorKind::HierarchyCycle,
            Self::InvalidCardinality { .. } => ErrorKind::InvalidCardinality,
            Self::ConstraintNotFound(_) => ErrorKind::ConstraintNotFound,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::AlreadyExists { .. } => ErrorKind::AlreadyExists,
            Self::PolicyViolation(_) => ErrorKind::PolicyViolation,
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::AdminRoleMissing { .. } => ErrorKind::AdminRoleMissing,
            Self::OutOfRange(_) => ErrorKind::OutOfRange,
            Self::AdminPermissionDenied { .. } => ErrorKind::AdminPermissionDenied,
            Self::BackendUnavailable(_) => ErrorKind::BackendUnavailable,
        }
    }

    pub fn code(&self) -> u16 {
        self.kind().code()
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }

    pub(crate) fn not_found(entity: &'static str, key: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            key: key.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, WardenError>;

// ============================================================================
// Translations
// ============================================================================

impl From<StoreError> for WardenError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { entity, key } => Self::NotFound { entity, key },
            StoreError::AlreadyExists { entity, key } => Self::AlreadyExists { entity, key },
            StoreError::ConstraintViolation(msg) => Self::PolicyViolation(msg),
            StoreError::InvalidCredential { user_id } => Self::InvalidPassword { user_id },
            StoreError::Hierarchy(e) => e.into(),
            StoreError::Unavailable(msg) => Self::BackendUnavailable(msg),
        }
    }
}

impl From<HierarchyError> for WardenError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::Cycle { .. } => Self::HierarchyCycle(err),
            HierarchyError::NodeNotFound { kind, name } => Self::not_found(kind.node_label(), name),
            HierarchyError::NodeExists { kind, name } => Self::AlreadyExists {
                entity: kind.node_label(),
                key: name,
            },
            HierarchyError::EdgeExists { parent, child, .. } => Self::AlreadyExists {
                entity: "hierarchy edge",
                key: format!("{parent} -> {child}"),
            },
            HierarchyError::EdgeNotFound { parent, child, .. } => {
                Self::not_found("hierarchy edge", format!("{parent} -> {child}"))
            }
        }
    }
}

impl From<SodError> for WardenError {
    fn from(err: SodError) -> Self {
        match err {
            SodError::SsdViolation { .. } => Self::Ssd(err),
            SodError::DsdViolation { .. } => Self::Dsd(err),
        }
    }
}

impl From<ActivationError> for WardenError {
    fn from(err: ActivationError) -> Self {
        let reason = err.to_string();
        match err {
            ActivationError::NotAssigned { role, .. }
            | ActivationError::Temporal { role, .. }
            | ActivationError::Constraint { role, .. } => Self::ActivationFailed { role, reason },
            ActivationError::AlreadyActive { role } => Self::AlreadyActive { role },
            ActivationError::NotActive { role } => Self::NotActive { role },
            ActivationError::Sod(e) => e.into(),
            ActivationError::Expired(id) | ActivationError::Terminated(id) => {
                Self::SessionExpired(id)
            }
        }
    }
}

impl From<ConstraintError> for WardenError {
    fn from(err: ConstraintError) -> Self {
        match err {
            ConstraintError::KeyNotEnabled { role, key } => {
                Self::ConstraintKeyNotEnabled { role, key }
            }
            ConstraintError::Duplicate {
                user,
                role,
                key,
                value,
            } => Self::AlreadyExists {
                entity: "role constraint",
                key: format!("{user}/{role}/{key}={value}"),
            },
            ConstraintError::NotFound(what) => Self::ConstraintNotFound(what),
            ConstraintError::EmptyKey => Self::InvalidInput(err.to_string()),
        }
    }
}

impl From<DelegationError> for WardenError {
    fn from(err: DelegationError) -> Self {
        match err {
            DelegationError::AdminRoleCount { found } => Self::AdminRoleMissing { found },
            DelegationError::OuOutOfRange { .. }
            | DelegationError::RoleOutOfRange { .. }
            | DelegationError::AdminRoleOutOfRange { .. } => Self::OutOfRange(err),
        }
    }
}
