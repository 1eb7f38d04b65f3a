//! The `Warden` engine handle and the plumbing shared by its capabilities.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, warn};
use warden_arbac::session_admin_role;
use warden_config::WardenConfig;
use warden_rbac::{
    ActivationGate, Activator, Hierarchy, Session, SessionState, SodEngine, TemporalPolicy,
    TemporalValidator,
};
use warden_store::{MemoryStore, Repository, StoreError};
use warden_types::{AdminRole, HierarchyKind, PermKey, SdSet, SdType, User};

use crate::clock::{Clock, SystemClock};
use crate::context::AdminContext;
use crate::error::{Result, WardenError};

/// Permission object guarding [`AdminCapability`](crate::AdminCapability) calls.
pub const ADMIN_OBJECT: &str = "AdminMgr";
/// Permission object guarding [`DelegatedCapability`](crate::DelegatedCapability) calls.
pub const DELEGATED_ADMIN_OBJECT: &str = "DelAdminMgr";

/// Policy decision engine.
///
/// Cloning is cheap: clones share the repository, configuration, clock and
/// write serialization.
///
/// # Example
///
/// ```
/// use warden::{AccessCapability, AdminCapability, AdminContext, Warden};
/// use warden::types::{OrgUnit, PermKey, PermObj, Permission, Role, User, UserRole};
/// use warden::DelegatedCapability;
///
/// let warden = Warden::in_memory();
/// let ctx = AdminContext::System;
///
/// warden.add_org_unit(ctx, OrgUnit::user("staff"))?;
/// warden.add_org_unit(ctx, OrgUnit::perm("apps"))?;
/// warden.add_user(ctx, User::new("alice", "staff"), Some("s3cret"))?;
/// warden.add_role(ctx, Role::new("teller"))?;
/// warden.assign_user(ctx, UserRole::new("alice", "teller"))?;
///
/// warden.add_perm_obj(ctx, PermObj::new("Account", "apps"))?;
/// warden.add_permission(ctx, Permission::new("Account", "deposit"))?;
/// let deposit = PermKey::new("Account", "deposit");
/// warden.grant_permission(ctx, &deposit, "teller")?;
///
/// let mut session = warden.create_session("alice", "s3cret", None)?;
/// assert!(warden.check_access(&mut session, &deposit)?);
/// assert!(!warden.check_access(&mut session, &PermKey::new("Account", "close"))?);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
#[derive(Clone)]
pub struct Warden {
    store: Arc<dyn Repository>,
    config: Arc<WardenConfig>,
    clock: Arc<dyn Clock>,
    writes: Arc<Mutex<()>>,
}

impl fmt::Debug for Warden {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Warden")
            .field("config", &self.config)
            .field("clock", &self.clock)
            .finish_non_exhaustive()
    }
}

impl Warden {
    /// Creates an engine over `store` with default configuration.
    pub fn new(store: impl Repository + 'static) -> Self {
        Self::from_shared(Arc::new(store))
    }

    /// Creates an engine over a repository shared with other owners.
    pub fn from_shared(store: Arc<dyn Repository>) -> Self {
        Self {
            store,
            config: Arc::new(WardenConfig::default()),
            clock: Arc::new(SystemClock),
            writes: Arc::new(Mutex::new(())),
        }
    }

    /// Creates an engine over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(MemoryStore::new())
    }

    pub fn with_config(mut self, config: WardenConfig) -> Self {
        self.config = Arc::new(config);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn config(&self) -> &WardenConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn Repository {
        self.store.as_ref()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    // ========================================================================
    // Shared plumbing
    // ========================================================================

    pub(crate) fn temporal(&self) -> TemporalValidator {
        let t = &self.config.temporal;
        TemporalValidator::new(TemporalPolicy {
            date: t.date,
            lock_date: t.lock_date,
            time: t.time,
            day: t.day,
            timeout: t.timeout,
        })
    }

    pub(crate) fn session_ttl(&self) -> Option<Duration> {
        match self.config.session.timeout_minutes {
            0 => None,
            minutes => Some(Duration::minutes(i64::from(minutes))),
        }
    }

    /// Serializes administrative check-then-write sequences.
    pub(crate) fn write_guard(&self) -> Result<MutexGuard<'_, ()>> {
        self.writes
            .lock()
            .map_err(|_| WardenError::BackendUnavailable("write lock poisoned".to_string()))
    }

    pub(crate) fn snapshot(&self) -> Result<PolicySnapshot> {
        let mut sets = self.store.sd_sets(SdType::Static)?;
        sets.extend(self.store.sd_sets(SdType::Dynamic)?);
        Ok(PolicySnapshot {
            roles: self.store.hierarchy(HierarchyKind::Role)?,
            sets,
        })
    }

    pub(crate) fn activator<'a>(
        &self,
        snapshot: &'a PolicySnapshot,
        gate: Option<&'a dyn ActivationGate>,
    ) -> Activator<'a> {
        let sod = &self.config.sod;
        let engine = SodEngine::new(&snapshot.roles, &snapshot.sets)
            .with_inherited_membership(sod.inherited_dsd_membership);
        let activator = Activator::new(engine, self.temporal(), self.now()).with_dsd(sod.dsd_enabled);
        match gate {
            Some(gate) => activator.with_gate(gate),
            None => activator,
        }
    }

    /// Expiry check, idle-timeout sweep and `last_access` update.
    pub(crate) fn refresh(&self, session: &mut Session) -> Result<()> {
        let empty = PolicySnapshot::empty();
        let dropped = self.activator(&empty, None).refresh(session)?;
        if !dropped.is_empty() {
            debug!(session = %session.id(), dropped = dropped.len(), "Session refreshed");
        }
        Ok(())
    }

    /// Read-only liveness check for sessions passed by shared reference.
    pub(crate) fn ensure_live(&self, session: &Session) -> Result<()> {
        if session.state() != SessionState::Active || session.is_expired(self.now()) {
            return Err(WardenError::SessionExpired(session.id()));
        }
        Ok(())
    }

    pub(crate) fn read_user_or_missing(&self, user_id: &str) -> Result<User> {
        self.store.read_user(user_id).map_err(|e| match e {
            StoreError::NotFound { .. } => WardenError::UserNotFound(user_id.to_string()),
            other => other.into(),
        })
    }

    /// Resolves the authority behind an administrative call.
    ///
    /// Returns the acting admin role for delegated contexts, `None` for the
    /// system context.
    pub(crate) fn authorize(
        &self,
        ctx: AdminContext<'_>,
        object: &str,
        operation: &str,
    ) -> Result<Option<AdminRole>> {
        let AdminContext::Delegated(session) = ctx else {
            return Ok(None);
        };
        self.ensure_live(session)?;
        let name = session_admin_role(session)?;
        let admin = self.store.read_admin_role(name)?;

        if self.config.admin.enforce_admin_permissions {
            let key = PermKey::new(object, operation);
            if !self.admin_permission_held([name], &key)? {
                warn!(
                    session = %session.id(),
                    admin_role = %name,
                    permission = %key,
                    "Administrative operation rejected"
                );
                return Err(WardenError::AdminPermissionDenied {
                    admin_role: name.to_string(),
                    object: object.to_string(),
                    operation: operation.to_string(),
                });
            }
        }
        Ok(Some(admin))
    }

    /// Creates an entity and links it into a hierarchy as one unit.
    ///
    /// If `link` fails, `undo` removes what `create` made before the link
    /// error is returned.
    pub(crate) fn create_then_link<T>(
        &self,
        create: impl FnOnce() -> Result<T>,
        link: impl FnOnce() -> Result<()>,
        undo: impl FnOnce() -> Result<()>,
    ) -> Result<T> {
        let created = create()?;
        if let Err(err) = link() {
            if let Err(undo_err) = undo() {
                warn!(error = %undo_err, "Failed to roll back entity after hierarchy error");
            }
            return Err(err);
        }
        Ok(created)
    }

    /// Whether any of `admin_roles` or their juniors holds admin permission `key`.
    pub(crate) fn admin_permission_held<'a, I>(&self, admin_roles: I, key: &PermKey) -> Result<bool>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let graph = self.store.hierarchy(HierarchyKind::AdminRole)?;
        let closure = graph.closure_down(admin_roles);
        let granted = self.store.permissions_granted(&closure, None)?;
        Ok(granted.iter().any(|p| p.admin && p.matches(key)))
    }
}

/// Role graph and SD sets read once per decision.
pub(crate) struct PolicySnapshot {
    pub(crate) roles: Hierarchy,
    pub(crate) sets: Vec<SdSet>,
}

impl PolicySnapshot {
    pub(crate) fn empty() -> Self {
        Self {
            roles: Hierarchy::new(HierarchyKind::Role),
            sets: Vec::new(),
        }
    }

    /// SSD engine. Inherited juniors always count toward static sets.
    pub(crate) fn ssd(&self) -> SodEngine<'_> {
        SodEngine::new(&self.roles, &self.sets)
    }
}
