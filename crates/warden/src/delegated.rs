//! Admin roles, organizational units and ARBAC02 decisions.

use tracing::{debug, info, warn};
use warden_arbac::{Authorizer, session_admin_role};
use warden_rbac::{Hierarchy, Session};
use warden_types::{AdminRole, HierarchyKind, OrgUnit, OuType, PermKey, User, UserAdminRole};

use crate::capability::DelegatedCapability;
use crate::context::AdminContext;
use crate::engine::{DELEGATED_ADMIN_OBJECT, PolicySnapshot, Warden};
use crate::error::{Result, WardenError};

/// Role and OU graphs read once for an ARBAC02 decision.
pub(crate) struct DelegationGraphs {
    roles: Hierarchy,
    user_ous: Hierarchy,
    perm_ous: Hierarchy,
}

impl DelegationGraphs {
    pub(crate) fn authorizer(&self) -> Authorizer<'_> {
        Authorizer::new(&self.roles, &self.user_ous, &self.perm_ous)
    }
}

impl Warden {
    pub(crate) fn delegation_graphs(&self) -> Result<DelegationGraphs> {
        Ok(DelegationGraphs {
            roles: self.store().hierarchy(HierarchyKind::Role)?,
            user_ous: self.store().hierarchy(HierarchyKind::UserOu)?,
            perm_ous: self.store().hierarchy(HierarchyKind::PermOu)?,
        })
    }

    /// Admin role active in `session`, read back from the repository.
    fn acting_admin(&self, session: &Session) -> Result<AdminRole> {
        self.ensure_live(session)?;
        let name = session_admin_role(session)?;
        Ok(self.store().read_admin_role(name)?)
    }

    /// Every OU and range boundary an admin role names must exist.
    fn check_admin_scope(&self, role: &AdminRole) -> Result<()> {
        if role.name.trim().is_empty() {
            return Err(WardenError::InvalidInput(
                "admin role name must not be empty".to_string(),
            ));
        }
        for ou in &role.user_ous {
            self.store().read_org_unit(OuType::User, ou)?;
        }
        for ou in &role.perm_ous {
            self.store().read_org_unit(OuType::Perm, ou)?;
        }
        if let Some(range) = &role.role_range {
            self.store().read_role(&range.begin)?;
            self.store().read_role(&range.end)?;
        }
        Ok(())
    }

    /// ARBAC check for a delegated admin-role (de)assignment.
    fn check_admin_assign(&self, admin: &AdminRole, user: &User, target: &str) -> Result<()> {
        let admin_roles = self.store().hierarchy(HierarchyKind::AdminRole)?;
        self.delegation_graphs()?
            .authorizer()
            .check_admin_assign(admin, &admin_roles, user, target)?;
        Ok(())
    }

    fn check_ou_unprotected(&self, name: &str) -> Result<()> {
        if self.config().admin.is_protected_org_unit(name) {
            warn!(ou = %name, "Refusing to change protected organizational unit");
            return Err(WardenError::PolicyViolation(format!(
                "organizational unit '{name}' is protected"
            )));
        }
        Ok(())
    }
}

impl DelegatedCapability for Warden {
    // ========================================================================
    // Admin roles
    // ========================================================================

    fn add_admin_role(&self, ctx: AdminContext<'_>, role: AdminRole) -> Result<AdminRole> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "add_admin_role")?;
        let _guard = self.write_guard()?;
        self.check_admin_scope(&role)?;
        let role = self.store().add_admin_role(role)?;
        info!(admin_role = %role.name, user_ous = role.user_ous.len(), perm_ous = role.perm_ous.len(), "Admin role added");
        Ok(role)
    }

    fn update_admin_role(&self, ctx: AdminContext<'_>, role: AdminRole) -> Result<AdminRole> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "update_admin_role")?;
        let _guard = self.write_guard()?;
        self.check_admin_scope(&role)?;
        Ok(self.store().update_admin_role(role)?)
    }

    fn delete_admin_role(&self, ctx: AdminContext<'_>, name: &str) -> Result<()> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "delete_admin_role")?;
        if self.config().admin.is_protected_role(name) {
            warn!(admin_role = %name, "Refusing to delete protected admin role");
            return Err(WardenError::PolicyViolation(format!(
                "admin role '{name}' is protected"
            )));
        }
        let _guard = self.write_guard()?;
        self.store().delete_admin_role(name)?;
        info!(admin_role = %name, "Admin role deleted");
        Ok(())
    }

    fn assign_admin_user(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        admin_role: &str,
    ) -> Result<UserAdminRole> {
        let admin = self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "assign_admin_user")?;
        let _guard = self.write_guard()?;
        let user = self.read_user_or_missing(user_id)?;
        let role = self.store().read_admin_role(admin_role)?;
        if let Some(admin) = &admin {
            self.check_admin_assign(admin, &user, &role.name)?;
        }
        if user.user_admin_role(admin_role).is_some() {
            return Err(WardenError::AlreadyAssigned {
                user_id: user.user_id,
                role: role.name,
            });
        }
        let assignment = UserAdminRole::new(user_id, admin_role).with_temporal(role.temporal);
        self.store().assign_admin_user(assignment.clone())?;
        info!(user = %user_id, admin_role = %admin_role, "Admin role assigned");
        Ok(assignment)
    }

    fn deassign_admin_user(
        &self,
        ctx: AdminContext<'_>,
        user_id: &str,
        admin_role: &str,
    ) -> Result<()> {
        let admin = self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "deassign_admin_user")?;
        let _guard = self.write_guard()?;
        let user = self.read_user_or_missing(user_id)?;
        if let Some(admin) = &admin {
            self.check_admin_assign(admin, &user, admin_role)?;
        }
        if user.user_admin_role(admin_role).is_none() {
            return Err(WardenError::NotAssigned {
                user_id: user_id.to_string(),
                role: admin_role.to_string(),
            });
        }
        self.store().deassign_admin_user(user_id, admin_role)?;
        info!(user = %user_id, admin_role = %admin_role, "Admin role deassigned");
        Ok(())
    }

    fn add_admin_inheritance(&self, ctx: AdminContext<'_>, parent: &str, child: &str) -> Result<()> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "add_admin_inheritance")?;
        let _guard = self.write_guard()?;
        self.store()
            .add_inheritance(HierarchyKind::AdminRole, parent, child)?;
        info!(parent = %parent, child = %child, "Admin role inheritance added");
        Ok(())
    }

    fn delete_admin_inheritance(
        &self,
        ctx: AdminContext<'_>,
        parent: &str,
        child: &str,
    ) -> Result<()> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "delete_admin_inheritance")?;
        let _guard = self.write_guard()?;
        self.store()
            .delete_inheritance(HierarchyKind::AdminRole, parent, child)?;
        info!(parent = %parent, child = %child, "Admin role inheritance removed");
        Ok(())
    }

    fn add_admin_ascendant(
        &self,
        ctx: AdminContext<'_>,
        child: &str,
        parent: AdminRole,
    ) -> Result<AdminRole> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "add_admin_ascendant")?;
        let _guard = self.write_guard()?;
        self.check_admin_scope(&parent)?;
        self.store().read_admin_role(child)?;
        let name = parent.name.clone();
        self.create_then_link(
            || Ok(self.store().add_admin_role(parent)?),
            || Ok(self.store().add_inheritance(HierarchyKind::AdminRole, &name, child)?),
            || Ok(self.store().delete_admin_role(&name)?),
        )
    }

    fn add_admin_descendant(
        &self,
        ctx: AdminContext<'_>,
        parent: &str,
        child: AdminRole,
    ) -> Result<AdminRole> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "add_admin_descendant")?;
        let _guard = self.write_guard()?;
        self.check_admin_scope(&child)?;
        self.store().read_admin_role(parent)?;
        let name = child.name.clone();
        self.create_then_link(
            || Ok(self.store().add_admin_role(child)?),
            || Ok(self.store().add_inheritance(HierarchyKind::AdminRole, parent, &name)?),
            || Ok(self.store().delete_admin_role(&name)?),
        )
    }

    // ========================================================================
    // Organizational units
    // ========================================================================

    fn add_org_unit(&self, ctx: AdminContext<'_>, ou: OrgUnit) -> Result<OrgUnit> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "add_org_unit")?;
        if ou.name.trim().is_empty() {
            return Err(WardenError::InvalidInput(
                "organizational unit name must not be empty".to_string(),
            ));
        }
        let _guard = self.write_guard()?;
        let ou = self.store().add_org_unit(ou)?;
        info!(ou = %ou.name, kind = ?ou.ou_type, "Organizational unit added");
        Ok(ou)
    }

    fn update_org_unit(&self, ctx: AdminContext<'_>, ou: OrgUnit) -> Result<OrgUnit> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "update_org_unit")?;
        let _guard = self.write_guard()?;
        Ok(self.store().update_org_unit(ou)?)
    }

    fn delete_org_unit(&self, ctx: AdminContext<'_>, ou_type: OuType, name: &str) -> Result<()> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "delete_org_unit")?;
        self.check_ou_unprotected(name)?;
        let _guard = self.write_guard()?;
        self.store().delete_org_unit(ou_type, name)?;
        info!(ou = %name, kind = ?ou_type, "Organizational unit deleted");
        Ok(())
    }

    fn add_org_inheritance(
        &self,
        ctx: AdminContext<'_>,
        ou_type: OuType,
        parent: &str,
        child: &str,
    ) -> Result<()> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "add_org_inheritance")?;
        let _guard = self.write_guard()?;
        self.store()
            .add_inheritance(ou_type.hierarchy(), parent, child)?;
        info!(parent = %parent, child = %child, kind = ?ou_type, "Organizational unit inheritance added");
        Ok(())
    }

    fn delete_org_inheritance(
        &self,
        ctx: AdminContext<'_>,
        ou_type: OuType,
        parent: &str,
        child: &str,
    ) -> Result<()> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "delete_org_inheritance")?;
        let _guard = self.write_guard()?;
        self.store()
            .delete_inheritance(ou_type.hierarchy(), parent, child)?;
        info!(parent = %parent, child = %child, kind = ?ou_type, "Organizational unit inheritance removed");
        Ok(())
    }

    fn add_org_ascendant(&self, ctx: AdminContext<'_>, child: &str, parent: OrgUnit) -> Result<OrgUnit> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "add_org_ascendant")?;
        let _guard = self.write_guard()?;
        let ou_type = parent.ou_type;
        self.store().read_org_unit(ou_type, child)?;
        let name = parent.name.clone();
        self.create_then_link(
            || Ok(self.store().add_org_unit(parent)?),
            || Ok(self.store().add_inheritance(ou_type.hierarchy(), &name, child)?),
            || Ok(self.store().delete_org_unit(ou_type, &name)?),
        )
    }

    fn add_org_descendant(&self, ctx: AdminContext<'_>, parent: &str, child: OrgUnit) -> Result<OrgUnit> {
        self.authorize(ctx, DELEGATED_ADMIN_OBJECT, "add_org_descendant")?;
        let _guard = self.write_guard()?;
        let ou_type = child.ou_type;
        self.store().read_org_unit(ou_type, parent)?;
        let name = child.name.clone();
        self.create_then_link(
            || Ok(self.store().add_org_unit(child)?),
            || Ok(self.store().add_inheritance(ou_type.hierarchy(), parent, &name)?),
            || Ok(self.store().delete_org_unit(ou_type, &name)?),
        )
    }

    // ========================================================================
    // Admin sessions
    // ========================================================================

    fn add_active_admin_role(&self, session: &mut Session, role: &str) -> Result<()> {
        self.refresh(session)?;
        let user = self.read_user_or_missing(session.user_id())?;
        let empty = PolicySnapshot::empty();
        self.activator(&empty, None)
            .add_active_admin_role(session, user.user_admin_role(role), role)?;
        Ok(())
    }

    fn drop_active_admin_role(&self, session: &mut Session, role: &str) -> Result<()> {
        self.refresh(session)?;
        let empty = PolicySnapshot::empty();
        self.activator(&empty, None)
            .drop_active_admin_role(session, role)?;
        Ok(())
    }

    fn session_admin_roles(&self, session: &mut Session) -> Result<Vec<UserAdminRole>> {
        self.refresh(session)?;
        Ok(session.active_admin_roles().to_vec())
    }

    fn check_admin_access(&self, session: &mut Session, permission: &PermKey) -> Result<bool> {
        self.refresh(session)?;
        let names = session
            .active_admin_roles()
            .iter()
            .map(|r| r.role_name.as_str());
        let granted = self.admin_permission_held(names, permission)?;
        debug!(session = %session.id(), permission = %permission, granted, "Admin access checked");
        Ok(granted)
    }

    // ========================================================================
    // ARBAC02 decisions
    // ========================================================================

    fn can_assign(&self, session: &Session, user_id: &str, role: &str) -> Result<bool> {
        let admin = self.acting_admin(session)?;
        let user = self.read_user_or_missing(user_id)?;
        let graphs = self.delegation_graphs()?;
        Ok(graphs.authorizer().can_assign(&admin, &user, role))
    }

    fn can_deassign(&self, session: &Session, user_id: &str, role: &str) -> Result<bool> {
        let admin = self.acting_admin(session)?;
        let user = self.read_user_or_missing(user_id)?;
        let graphs = self.delegation_graphs()?;
        Ok(graphs.authorizer().can_deassign(&admin, &user, role))
    }

    fn can_grant(&self, session: &Session, role: &str, permission: &PermKey) -> Result<bool> {
        let admin = self.acting_admin(session)?;
        let object = self.store().read_perm_obj(&permission.obj_name)?;
        let graphs = self.delegation_graphs()?;
        Ok(graphs.authorizer().can_grant(&admin, &object, role))
    }

    fn can_revoke(&self, session: &Session, role: &str, permission: &PermKey) -> Result<bool> {
        let admin = self.acting_admin(session)?;
        let object = self.store().read_perm_obj(&permission.obj_name)?;
        let graphs = self.delegation_graphs()?;
        Ok(graphs.authorizer().can_revoke(&admin, &object, role))
    }
}
