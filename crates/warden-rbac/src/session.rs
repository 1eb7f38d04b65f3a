//! Sessions and the role-activation state machine.
//!
//! A [`Session`] holds a snapshot of the authenticated user and the subset of
//! its assignments that are currently active. Sessions are plain values owned
//! by the caller; nothing in this module is shared between callers.
//!
//! The [`Activator`] is the only way to change a session's active set. Every
//! transition is validated in isolation:
//!
//! ```text
//!   create ──► Active ──(add/drop role)──► Active
//!                │  │
//!                │  └──(terminate)──► Terminated
//!                └──(expires_at passed)──► Expired
//! ```
//!
//! Checks run in a fixed order: assignment, duplicate, temporal, activation
//! gate, DSD. A rejected transition leaves the session untouched.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};
use warden_types::{SessionId, User, UserAdminRole, UserRole};

use crate::sod::{SodEngine, SodError};
use crate::temporal::{TemporalError, TemporalValidator};

/// Error type for session and activation transitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActivationError {
    /// The role is not assigned to the session's user.
    #[error("role '{role}' is not assigned to user '{user}'")]
    NotAssigned { user: String, role: String },

    /// A temporal constraint on the assignment rejected activation.
    #[error("role '{role}' cannot be activated: {source}")]
    Temporal {
        role: String,
        #[source]
        source: TemporalError,
    },

    /// An activation gate (attribute constraint) rejected the role.
    #[error("role '{role}' cannot be activated: {reason}")]
    Constraint { role: String, reason: String },

    #[error("role '{role}' is already active")]
    AlreadyActive { role: String },

    #[error("role '{role}' is not active")]
    NotActive { role: String },

    #[error(transparent)]
    Sod(#[from] SodError),

    #[error("session {0} has expired")]
    Expired(SessionId),

    #[error("session {0} has been terminated")]
    Terminated(SessionId),
}

impl ActivationError {
    /// Name of the role the transition was about, if any.
    pub fn role(&self) -> Option<&str> {
        match self {
            ActivationError::NotAssigned { role, .. }
            | ActivationError::Temporal { role, .. }
            | ActivationError::Constraint { role, .. }
            | ActivationError::AlreadyActive { role }
            | ActivationError::NotActive { role } => Some(role.as_str()),
            ActivationError::Sod(
                SodError::SsdViolation { role, .. } | SodError::DsdViolation { role, .. },
            ) => Some(role.as_str()),
            ActivationError::Expired(_) | ActivationError::Terminated(_) => None,
        }
    }
}

/// Result type for activation transitions.
pub type Result<T> = std::result::Result<T, ActivationError>;

/// Lifecycle state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Active,
    Expired,
    Terminated,
}

/// A role that was skipped or dropped without failing the calling operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionWarning {
    pub role: String,
    pub reason: String,
}

/// Short-lived authorization context for one authenticated user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    id: SessionId,
    user: User,
    active_roles: Vec<UserRole>,
    active_admin_roles: Vec<UserAdminRole>,
    trusted: bool,
    created_at: DateTime<Utc>,
    last_access: DateTime<Utc>,
    expires_at: Option<DateTime<Utc>>,
    warnings: Vec<SessionWarning>,
    state: SessionState,
}

impl Session {
    /// Creates a session with no active roles.
    ///
    /// `ttl` of `None` means the session never expires on its own.
    pub fn new(user: User, trusted: bool, now: DateTime<Utc>, ttl: Option<Duration>) -> Self {
        Self {
            id: SessionId::generate(),
            user,
            active_roles: Vec::new(),
            active_admin_roles: Vec::new(),
            trusted,
            created_at: now,
            last_access: now,
            expires_at: ttl.map(|t| now + t),
            warnings: Vec::new(),
            state: SessionState::Active,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Snapshot of the user taken when the session was created.
    pub fn user(&self) -> &User {
        &self.user
    }

    pub fn user_id(&self) -> &str {
        &self.user.user_id
    }

    pub fn is_trusted(&self) -> bool {
        self.trusted
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn last_access(&self) -> DateTime<Utc> {
        self.last_access
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        self.expires_at
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn active_roles(&self) -> &[UserRole] {
        &self.active_roles
    }

    /// Names of the active roles, in activation order.
    pub fn active_role_names(&self) -> impl Iterator<Item = &str> {
        self.active_roles.iter().map(|ur| ur.role_name.as_str())
    }

    pub fn is_active(&self, role: &str) -> bool {
        self.active_roles.iter().any(|ur| ur.role_name == role)
    }

    pub fn active_admin_roles(&self) -> &[UserAdminRole] {
        &self.active_admin_roles
    }

    pub fn is_admin_active(&self, role: &str) -> bool {
        self.active_admin_roles.iter().any(|ur| ur.role_name == role)
    }

    pub fn warnings(&self) -> &[SessionWarning] {
        &self.warnings
    }

    /// Records a skipped role.
    pub fn add_warning(&mut self, role: impl Into<String>, reason: impl Into<String>) {
        self.warnings.push(SessionWarning {
            role: role.into(),
            reason: reason.into(),
        });
    }

    /// Returns whether the session is past its expiry at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == SessionState::Expired || self.expires_at.is_some_and(|exp| now > exp)
    }

    /// Fails unless the session is usable at `now`. Marks it expired if its
    /// lifetime has run out.
    pub fn ensure_live(&mut self, now: DateTime<Utc>) -> Result<()> {
        match self.state {
            SessionState::Terminated => return Err(ActivationError::Terminated(self.id)),
            SessionState::Expired => return Err(ActivationError::Expired(self.id)),
            SessionState::Active => {}
        }
        if self.is_expired(now) {
            self.state = SessionState::Expired;
            info!(session = %self.id, user = %self.user.user_id, "Session expired");
            return Err(ActivationError::Expired(self.id));
        }
        Ok(())
    }

    /// Ends the session. Later use fails with [`ActivationError::Terminated`].
    pub fn terminate(&mut self) {
        self.state = SessionState::Terminated;
        self.active_roles.clear();
        self.active_admin_roles.clear();
    }
}

/// Pre-activation check supplied by another decision core.
///
/// Returns a human-readable reason when the assignment must not activate.
pub trait ActivationGate {
    fn check(&self, user: &User, assignment: &UserRole) -> std::result::Result<(), String>;
}

/// Applies activation transitions to sessions.
#[derive(Clone, Copy)]
pub struct Activator<'a> {
    sod: SodEngine<'a>,
    dsd_enabled: bool,
    temporal: TemporalValidator,
    gate: Option<&'a dyn ActivationGate>,
    now: DateTime<Utc>,
}

impl<'a> Activator<'a> {
    pub fn new(sod: SodEngine<'a>, temporal: TemporalValidator, now: DateTime<Utc>) -> Self {
        Self {
            sod,
            dsd_enabled: true,
            temporal,
            gate: None,
            now,
        }
    }

    /// Enables or disables DSD checks.
    pub fn with_dsd(mut self, enabled: bool) -> Self {
        self.dsd_enabled = enabled;
        self
    }

    pub fn with_gate(mut self, gate: &'a dyn ActivationGate) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Activates the initial role set of a new session.
    ///
    /// Candidates are processed in order. When `explicit` is false, a
    /// candidate that fails temporal, gate or DSD checks is skipped and
    /// recorded as a warning. When `explicit` is true the caller asked for
    /// exactly these roles, so the first failure aborts and the session is
    /// left without any of them.
    pub fn activate_initial(
        &self,
        session: &mut Session,
        candidates: &[UserRole],
        explicit: bool,
    ) -> Result<()> {
        let mut accepted: Vec<UserRole> = session.active_roles.clone();
        let mut skipped: Vec<SessionWarning> = Vec::new();

        for candidate in candidates {
            if accepted.iter().any(|ur| ur.role_name == candidate.role_name) {
                continue;
            }
            let active = accepted.iter().map(|ur| ur.role_name.as_str());
            match self.check(&session.user, candidate, active, None) {
                Ok(()) => accepted.push(candidate.clone()),
                Err(err) if !explicit => {
                    warn!(
                        session = %session.id,
                        user = %session.user.user_id,
                        role = %candidate.role_name,
                        reason = %err,
                        "Skipping role during session activation"
                    );
                    skipped.push(SessionWarning {
                        role: candidate.role_name.clone(),
                        reason: err.to_string(),
                    });
                }
                Err(err) => return Err(err),
            }
        }

        session.active_roles = accepted;
        session.warnings.extend(skipped);
        debug!(
            session = %session.id,
            active = session.active_roles.len(),
            "Initial roles activated"
        );
        Ok(())
    }

    /// Activates one more role in a live session.
    ///
    /// `assignment` is the user's current assignment record for `role`, as
    /// read from the repository; `None` means the role is not assigned.
    pub fn add_active_role(
        &self,
        session: &mut Session,
        assignment: Option<&UserRole>,
        role: &str,
    ) -> Result<()> {
        let Some(assignment) = assignment else {
            return Err(ActivationError::NotAssigned {
                user: session.user.user_id.clone(),
                role: role.to_string(),
            });
        };
        if session.is_active(role) {
            return Err(ActivationError::AlreadyActive {
                role: role.to_string(),
            });
        }
        self.check(
            &session.user,
            assignment,
            session.active_role_names(),
            Some(session.last_access),
        )?;

        session.active_roles.push(assignment.clone());
        info!(session = %session.id, user = %session.user.user_id, role, "Role activated");
        Ok(())
    }

    /// Deactivates a role.
    pub fn drop_active_role(&self, session: &mut Session, role: &str) -> Result<()> {
        let Some(pos) = session.active_roles.iter().position(|ur| ur.role_name == role) else {
            return Err(ActivationError::NotActive {
                role: role.to_string(),
            });
        };
        session.active_roles.remove(pos);
        info!(session = %session.id, user = %session.user.user_id, role, "Role deactivated");
        Ok(())
    }

    /// Activates every temporally valid admin assignment, skipping the rest.
    pub fn activate_initial_admin(&self, session: &mut Session, candidates: &[UserAdminRole]) {
        for candidate in candidates {
            if session.is_admin_active(&candidate.role_name) {
                continue;
            }
            match self.temporal.validate(&candidate.temporal, self.now, None) {
                Ok(()) => session.active_admin_roles.push(candidate.clone()),
                Err(err) => {
                    warn!(
                        session = %session.id,
                        role = %candidate.role_name,
                        reason = %err,
                        "Skipping admin role during session activation"
                    );
                    session.add_warning(candidate.role_name.clone(), err.to_string());
                }
            }
        }
    }

    pub fn add_active_admin_role(
        &self,
        session: &mut Session,
        assignment: Option<&UserAdminRole>,
        role: &str,
    ) -> Result<()> {
        let Some(assignment) = assignment else {
            return Err(ActivationError::NotAssigned {
                user: session.user.user_id.clone(),
                role: role.to_string(),
            });
        };
        if session.is_admin_active(role) {
            return Err(ActivationError::AlreadyActive {
                role: role.to_string(),
            });
        }
        self.temporal
            .validate(&assignment.temporal, self.now, Some(session.last_access))
            .map_err(|source| ActivationError::Temporal {
                role: role.to_string(),
                source,
            })?;
        session.active_admin_roles.push(assignment.clone());
        info!(session = %session.id, role, "Admin role activated");
        Ok(())
    }

    pub fn drop_active_admin_role(&self, session: &mut Session, role: &str) -> Result<()> {
        let Some(pos) = session
            .active_admin_roles
            .iter()
            .position(|ur| ur.role_name == role)
        else {
            return Err(ActivationError::NotActive {
                role: role.to_string(),
            });
        };
        session.active_admin_roles.remove(pos);
        info!(session = %session.id, role, "Admin role deactivated");
        Ok(())
    }

    /// Prepares a session for use at the activator's `now`.
    ///
    /// Fails if the session is terminated or expired. Otherwise drops every
    /// role whose idle timeout has elapsed since the last access, records a
    /// warning for each, and advances `last_access`. Returns the dropped roles.
    pub fn refresh(&self, session: &mut Session) -> Result<Vec<String>> {
        session.ensure_live(self.now)?;

        let last = session.last_access;
        let mut dropped = Vec::new();
        session.active_roles.retain(|ur| {
            match self.temporal.validate_timeout(&ur.temporal, self.now, last) {
                Ok(()) => true,
                Err(err) => {
                    dropped.push((ur.role_name.clone(), err.to_string()));
                    false
                }
            }
        });
        for (role, reason) in &dropped {
            warn!(session = %session.id, role = %role, "Role deactivated after idle timeout");
            session.add_warning(role.clone(), reason.clone());
        }

        session.last_access = self.now;
        Ok(dropped.into_iter().map(|(role, _)| role).collect())
    }

    fn check<'r, I>(
        &self,
        user: &User,
        assignment: &UserRole,
        active: I,
        last_access: Option<DateTime<Utc>>,
    ) -> Result<()>
    where
        I: IntoIterator<Item = &'r str>,
    {
        let role = &assignment.role_name;
        self.temporal
            .validate(&assignment.temporal, self.now, last_access)
            .map_err(|source| ActivationError::Temporal {
                role: role.clone(),
                source,
            })?;

        if let Some(gate) = self.gate {
            gate.check(user, assignment)
                .map_err(|reason| ActivationError::Constraint {
                    role: role.clone(),
                    reason,
                })?;
        }

        if self.dsd_enabled {
            self.sod.validate_dsd(active, role)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hierarchy::Hierarchy;
    use chrono::TimeZone;
    use warden_types::{DayMask, HierarchyKind, SdSet, SdType, TemporalConstraint};

    fn now() -> DateTime<Utc> {
        // Wednesday
        Utc.with_ymd_and_hms(2026, 3, 4, 12, 0, 0).unwrap()
    }

    fn user_with(roles: &[&str]) -> User {
        let mut user = User::new("jdoe", "dev");
        for r in roles {
            user.roles.push(UserRole::new("jdoe", *r));
        }
        user
    }

    fn roles(h: &mut Hierarchy, names: &[&str]) {
        for n in names {
            h.add_node(*n);
        }
    }

    struct DenyRole(&'static str);

    impl ActivationGate for DenyRole {
        fn check(&self, _user: &User, assignment: &UserRole) -> std::result::Result<(), String> {
            if assignment.role_name == self.0 {
                Err("branch mismatch".to_string())
            } else {
                Ok(())
            }
        }
    }

    #[test]
    fn initial_activation_skips_dsd_overflow() {
        let mut h = Hierarchy::new(HierarchyKind::Role);
        roles(&mut h, &["d1", "d2", "d3", "free"]);
        let sets = vec![SdSet::new("dsd", SdType::Dynamic, 3).with_members(["d1", "d2", "d3"])];
        let activator = Activator::new(SodEngine::new(&h, &sets), TemporalValidator::default(), now());

        let user = user_with(&["d1", "d2", "d3", "free"]);
        let mut session = Session::new(user.clone(), false, now(), None);
        activator
            .activate_initial(&mut session, &user.roles, false)
            .unwrap();

        let active: Vec<_> = session.active_role_names().collect();
        assert_eq!(active, vec!["d1", "d2", "free"]);
        assert_eq!(session.warnings().len(), 1);
        assert_eq!(session.warnings()[0].role, "d3");
    }

    #[test]
    fn explicit_activation_fails_whole() {
        let mut h = Hierarchy::new(HierarchyKind::Role);
        roles(&mut h, &["d1", "d2"]);
        let sets = vec![SdSet::new("dsd", SdType::Dynamic, 2).with_members(["d1", "d2"])];
        let activator = Activator::new(SodEngine::new(&h, &sets), TemporalValidator::default(), now());

        let user = user_with(&["d1", "d2"]);
        let mut session = Session::new(user.clone(), true, now(), None);
        let err = activator
            .activate_initial(&mut session, &user.roles, true)
            .unwrap_err();
        assert!(matches!(err, ActivationError::Sod(SodError::DsdViolation { .. })));
        assert!(session.active_roles().is_empty());
        assert!(session.warnings().is_empty());
    }

    #[test]
    fn add_and_drop_negative_paths() {
        let h = Hierarchy::new(HierarchyKind::Role);
        let activator = Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), now());
        let user = user_with(&["a", "b"]);
        let mut session = Session::new(user.clone(), false, now(), None);
        activator
            .activate_initial(&mut session, &user.roles, false)
            .unwrap();

        let err = activator
            .add_active_role(&mut session, user.user_role("a"), "a")
            .unwrap_err();
        assert_eq!(err, ActivationError::AlreadyActive { role: "a".into() });

        let err = activator
            .add_active_role(&mut session, None, "ghost")
            .unwrap_err();
        assert!(matches!(err, ActivationError::NotAssigned { .. }));

        let err = activator.drop_active_role(&mut session, "ghost").unwrap_err();
        assert_eq!(err, ActivationError::NotActive { role: "ghost".into() });

        activator.drop_active_role(&mut session, "a").unwrap();
        assert_eq!(session.active_roles().len(), 1);
        activator
            .add_active_role(&mut session, user.user_role("a"), "a")
            .unwrap();
        assert_eq!(session.active_roles().len(), 2);
    }

    #[test]
    fn temporal_failure_skips_or_rejects() {
        let h = Hierarchy::new(HierarchyKind::Role);
        let activator = Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), now());

        let mut user = user_with(&["weekend"]);
        user.roles[0].temporal = TemporalConstraint::default()
            .with_day_mask(DayMask::from_weekdays([chrono::Weekday::Sat]));

        let mut session = Session::new(user.clone(), false, now(), None);
        activator
            .activate_initial(&mut session, &user.roles, false)
            .unwrap();
        assert!(session.active_roles().is_empty());
        assert_eq!(session.warnings().len(), 1);

        let err = activator
            .add_active_role(&mut session, user.user_role("weekend"), "weekend")
            .unwrap_err();
        assert!(matches!(err, ActivationError::Temporal { .. }));
    }

    #[test]
    fn gate_rejection() {
        let h = Hierarchy::new(HierarchyKind::Role);
        let gate = DenyRole("teller");
        let activator = Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), now())
            .with_gate(&gate);

        let user = user_with(&["teller", "clerk"]);
        let mut session = Session::new(user.clone(), false, now(), None);
        activator
            .activate_initial(&mut session, &user.roles, false)
            .unwrap();
        assert_eq!(session.active_role_names().collect::<Vec<_>>(), vec!["clerk"]);
        assert_eq!(session.warnings()[0].reason, "role 'teller' cannot be activated: branch mismatch");
    }

    #[test]
    fn refresh_expires_session() {
        let h = Hierarchy::new(HierarchyKind::Role);
        let mut session = Session::new(user_with(&[]), false, now(), Some(Duration::minutes(10)));

        let later = now() + Duration::minutes(5);
        let activator = Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), later);
        assert!(activator.refresh(&mut session).is_ok());
        assert_eq!(session.last_access(), later);

        let too_late = now() + Duration::minutes(11);
        let activator =
            Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), too_late);
        let err = activator.refresh(&mut session).unwrap_err();
        assert_eq!(err, ActivationError::Expired(session.id()));
        assert_eq!(session.state(), SessionState::Expired);
    }

    #[test]
    fn refresh_drops_idle_roles() {
        let h = Hierarchy::new(HierarchyKind::Role);
        let mut user = user_with(&["short", "long"]);
        user.roles[0].temporal = TemporalConstraint::default().with_timeout(5);

        let mut session = Session::new(user.clone(), false, now(), None);
        Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), now())
            .activate_initial(&mut session, &user.roles, false)
            .unwrap();

        let later = now() + Duration::minutes(6);
        let dropped = Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), later)
            .refresh(&mut session)
            .unwrap();
        assert_eq!(dropped, vec!["short".to_string()]);
        assert_eq!(session.active_role_names().collect::<Vec<_>>(), vec!["long"]);
    }

    #[test]
    fn terminated_session_rejects_use() {
        let h = Hierarchy::new(HierarchyKind::Role);
        let mut session = Session::new(user_with(&[]), false, now(), None);
        session.terminate();
        let err = Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), now())
            .refresh(&mut session)
            .unwrap_err();
        assert!(matches!(err, ActivationError::Terminated(_)));
    }

    #[test]
    fn admin_role_transitions() {
        let h = Hierarchy::new(HierarchyKind::Role);
        let activator = Activator::new(SodEngine::new(&h, &[]), TemporalValidator::default(), now());
        let mut user = user_with(&[]);
        user.admin_roles.push(UserAdminRole::new("jdoe", "ops-admin"));

        let mut session = Session::new(user.clone(), false, now(), None);
        activator.activate_initial_admin(&mut session, &user.admin_roles);
        assert!(session.is_admin_active("ops-admin"));

        let err = activator
            .add_active_admin_role(&mut session, user.user_admin_role("ops-admin"), "ops-admin")
            .unwrap_err();
        assert!(matches!(err, ActivationError::AlreadyActive { .. }));

        activator.drop_active_admin_role(&mut session, "ops-admin").unwrap();
        assert!(session.active_admin_roles().is_empty());
        assert!(matches!(
            activator.drop_active_admin_role(&mut session, "ops-admin"),
            Err(ActivationError::NotActive { .. })
        ));
    }
}
