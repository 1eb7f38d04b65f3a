//! Sessions, activation and access decisions.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};
use warden_abac::{UserAttributeGate, evaluate};
use warden_rbac::{GrantPath, PermissionResolver, Session};
use warden_store::StoreError;
use warden_types::{PermKey, Permission, User, UserRole};

use crate::capability::AccessCapability;
use crate::engine::{PolicySnapshot, Warden};
use crate::error::{Result, WardenError};

/// Outcome of an access check with its justification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessDecision {
    pub granted: bool,
    /// How the permission was reached, when a grant exists.
    pub path: Option<GrantPath>,
    /// Human-readable explanation of why this decision was made.
    pub reason: String,
}

impl AccessDecision {
    fn deny(reason: impl Into<String>) -> Self {
        Self {
            granted: false,
            path: None,
            reason: reason.into(),
        }
    }
}

impl Warden {
    fn open_session(&self, user: User, trusted: bool, roles: Option<&[&str]>) -> Result<Session> {
        if user.locked {
            warn!(user = %user.user_id, "Session refused for locked user");
            return Err(WardenError::AccountLocked {
                user_id: user.user_id,
            });
        }

        let now = self.now();
        self.temporal()
            .validate(&user.temporal, now, None)
            .map_err(|source| {
                warn!(user = %user.user_id, reason = %source, "Session refused by user temporal constraint");
                WardenError::UserTemporalConstraint {
                    user_id: user.user_id.clone(),
                    source,
                }
            })?;

        let (candidates, explicit) = match roles {
            Some(names) => {
                let mut picked = Vec::with_capacity(names.len());
                for name in names {
                    let assignment = user.user_role(name).ok_or_else(|| {
                        WardenError::ActivationFailed {
                            role: (*name).to_string(),
                            reason: format!("role '{name}' is not assigned to user '{}'", user.user_id),
                        }
                    })?;
                    picked.push(assignment.clone());
                }
                (picked, true)
            }
            None => (user.roles.clone(), false),
        };

        let snapshot = self.snapshot()?;
        let gate = self.gate_for(&candidates)?;
        let admin_roles = user.admin_roles.clone();
        let mut session = Session::new(user, trusted, now, self.session_ttl());

        let activator = self.activator(&snapshot, Some(&gate));
        activator.activate_initial(&mut session, &candidates, explicit)?;
        activator.activate_initial_admin(&mut session, &admin_roles);

        info!(
            session = %session.id(),
            user = %session.user_id(),
            trusted,
            active = session.active_roles().len(),
            admin_active = session.active_admin_roles().len(),
            warnings = session.warnings().len(),
            "Session created"
        );
        Ok(session)
    }

    /// Activation gate over the enabled constraint keys of the given roles.
    fn gate_for(&self, assignments: &[UserRole]) -> Result<UserAttributeGate> {
        let mut gate = UserAttributeGate::new();
        for assignment in assignments {
            match self.store().read_role(&assignment.role_name) {
                Ok(role) => gate = gate.with_role(&role),
                // A dangling assignment has no keys to enforce.
                Err(StoreError::NotFound { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        Ok(gate)
    }

    fn decide(&self, session: &Session, key: &PermKey) -> Result<AccessDecision> {
        let roles = self.snapshot()?.roles;
        let resolver = PermissionResolver::new(&roles);
        let authorized = resolver.authorized_roles(session.active_role_names());
        let candidates = self
            .store()
            .permissions_granted(&authorized, Some(session.user_id()))?;

        let Some(permission) = resolver.find(&candidates, key) else {
            return Ok(AccessDecision::deny(format!("{key} is not granted")));
        };
        let path = resolver.grant_path(permission, &authorized, session.user_id());

        if let Some(set_name) = &permission.pa_set_name {
            let attributes = self.store().read_attribute_set(set_name)?;
            let decision = evaluate(&attributes, session.active_roles());
            if !decision.is_allowed() {
                return Ok(AccessDecision::deny(decision.reason));
            }
        }

        Ok(AccessDecision {
            granted: true,
            reason: match &path {
                Some(GrantPath::Role(role)) => format!("{key} granted through role '{role}'"),
                Some(GrantPath::User) | None => format!("{key} granted to user directly"),
            },
            path,
        })
    }
}

impl AccessCapability for Warden {
    fn create_session(
        &self,
        user_id: &str,
        password: &str,
        roles: Option<&[&str]>,
    ) -> Result<Session> {
        let user = self
            .store()
            .authenticate(user_id, password)
            .map_err(|e| match e {
                StoreError::NotFound { .. } => WardenError::UserNotFound(user_id.to_string()),
                other => {
                    info!(user = %user_id, reason = %other, "Authentication failed");
                    other.into()
                }
            })?;
        if user.reset_required {
            return Err(WardenError::PasswordResetRequired {
                user_id: user.user_id,
            });
        }
        self.open_session(user, false, roles)
    }

    fn create_trusted_session(&self, user_id: &str, roles: Option<&[&str]>) -> Result<Session> {
        if !self.config().session.allow_trusted {
            return Err(WardenError::PolicyViolation(
                "trusted sessions are disabled".to_string(),
            ));
        }
        let user = self.read_user_or_missing(user_id)?;
        self.open_session(user, true, roles)
    }

    fn check_access(&self, session: &mut Session, permission: &PermKey) -> Result<bool> {
        Ok(self.explain_access(session, permission)?.granted)
    }

    fn explain_access(
        &self,
        session: &mut Session,
        permission: &PermKey,
    ) -> Result<AccessDecision> {
        self.refresh(session)?;
        let decision = self.decide(session, permission)?;
        if decision.granted {
            debug!(session = %session.id(), user = %session.user_id(), permission = %permission, "Access granted");
        } else {
            info!(
                session = %session.id(),
                user = %session.user_id(),
                permission = %permission,
                reason = %decision.reason,
                "Access denied"
            );
        }
        Ok(decision)
    }

    fn session_permissions(&self, session: &mut Session) -> Result<Vec<Permission>> {
        self.refresh(session)?;
        let roles = self.snapshot()?.roles;
        let resolver = PermissionResolver::new(&roles);
        let authorized = resolver.authorized_roles(session.active_role_names());
        let candidates = self
            .store()
            .permissions_granted(&authorized, Some(session.user_id()))?;
        Ok(resolver
            .visible(&candidates, &authorized, session.user_id())
            .into_iter()
            .cloned()
            .collect())
    }

    fn session_roles(&self, session: &mut Session) -> Result<Vec<UserRole>> {
        self.refresh(session)?;
        Ok(session.active_roles().to_vec())
    }

    fn authorized_session_roles(&self, session: &mut Session) -> Result<BTreeSet<String>> {
        self.refresh(session)?;
        let roles = self.snapshot()?.roles;
        Ok(PermissionResolver::new(&roles).authorized_roles(session.active_role_names()))
    }

    fn add_active_role(&self, session: &mut Session, role: &str) -> Result<()> {
        self.refresh(session)?;
        // Assignments may have changed since the session was created.
        let user = self.read_user_or_missing(session.user_id())?;
        let assignment = user.user_role(role);
        let snapshot = self.snapshot()?;
        let gate = match assignment {
            Some(a) => self.gate_for(std::slice::from_ref(a))?,
            None => UserAttributeGate::new(),
        };
        self.activator(&snapshot, Some(&gate))
            .add_active_role(session, assignment, role)?;
        Ok(())
    }

    fn drop_active_role(&self, session: &mut Session, role: &str) -> Result<()> {
        self.refresh(session)?;
        let empty = PolicySnapshot::empty();
        self.activator(&empty, None)
            .drop_active_role(session, role)?;
        Ok(())
    }

    fn end_session(&self, session: &mut Session) {
        session.terminate();
        info!(session = %session.id(), user = %session.user_id(), "Session ended");
    }
}
