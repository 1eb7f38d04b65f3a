//! # warden-types: Core types for `Warden`
//!
//! This crate contains the entity model shared across the `Warden` system:
//! - Identifiers ([`SessionId`], [`ConstraintId`])
//! - Principals ([`User`], [`UserRole`], [`UserAdminRole`])
//! - Roles ([`Role`], [`AdminRole`], [`RoleRange`])
//! - Attribute constraints ([`RoleConstraint`], [`ConstraintType`])
//! - Separation of duty ([`SdSet`], [`SdType`])
//! - Permissions ([`PermObj`], [`Permission`], [`PermKey`], [`PermissionAttributeSet`])
//! - Organization ([`OrgUnit`], [`OuType`])
//! - Temporal constraints ([`TemporalConstraint`], [`DayMask`])
//! - Graph selection ([`HierarchyKind`])
//!
//! Entities are plain values. Hierarchy edges are never stored on the
//! entities themselves; they live in the graphs owned by `warden-rbac`.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::{self, Display},
};

use chrono::{NaiveDate, NaiveTime, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

/// Unique identifier for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a fresh random session id.
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for SessionId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

/// Repository-assigned identifier of a persisted [`RoleConstraint`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConstraintId(Uuid);

impl ConstraintId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Display for ConstraintId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for ConstraintId {
    fn from(value: Uuid) -> Self {
        Self(value)
    }
}

// ============================================================================
// Hierarchy selection
// ============================================================================

/// The four independent hierarchies maintained by the engine.
///
/// Every hierarchy is a DAG of names with edges pointing from the senior
/// (parent) node to the junior (child) node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum HierarchyKind {
    /// Regular role hierarchy.
    Role,
    /// Administrative role hierarchy.
    AdminRole,
    /// Organizational units that group users.
    UserOu,
    /// Organizational units that group permission objects.
    PermOu,
}

impl HierarchyKind {
    /// All hierarchy kinds, in a stable order.
    pub const ALL: [HierarchyKind; 4] = [
        HierarchyKind::Role,
        HierarchyKind::AdminRole,
        HierarchyKind::UserOu,
        HierarchyKind::PermOu,
    ];

    /// Returns the human-readable entity name for nodes of this graph.
    pub fn node_label(&self) -> &'static str {
        match self {
            HierarchyKind::Role => "role",
            HierarchyKind::AdminRole => "admin role",
            HierarchyKind::UserOu => "user org unit",
            HierarchyKind::PermOu => "perm org unit",
        }
    }
}

impl Display for HierarchyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.node_label())
    }
}

// ============================================================================
// Temporal constraints
// ============================================================================

/// Set of weekdays on which an entity may be used.
///
/// Stored as a bitmask with Monday in bit 0 and Sunday in bit 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DayMask(u8);

impl DayMask {
    /// Every day of the week.
    pub const ALL: DayMask = DayMask(0b0111_1111);

    /// No day of the week.
    pub const NONE: DayMask = DayMask(0);

    /// Monday through Friday.
    pub const WEEKDAYS: DayMask = DayMask(0b0001_1111);

    /// Builds a mask from the given weekdays.
    pub fn from_weekdays(days: impl IntoIterator<Item = Weekday>) -> Self {
        let bits = days
            .into_iter()
            .fold(0u8, |acc, d| acc | (1 << d.num_days_from_monday()));
        Self(bits)
    }

    /// Returns whether the given weekday is part of this mask.
    pub fn contains(&self, day: Weekday) -> bool {
        self.0 & (1 << day.num_days_from_monday()) != 0
    }

    pub fn bits(&self) -> u8 {
        self.0
    }
}

impl Default for DayMask {
    fn default() -> Self {
        Self::ALL
    }
}

/// Temporal restrictions attached to users, roles, and assignments.
///
/// Every field is optional; an unset field never restricts anything.
/// Role constraints are copied onto the [`UserRole`] at assignment time so
/// that later edits to the role do not alter existing assignments.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemporalConstraint {
    /// First calendar date (inclusive) on which the entity is usable.
    pub begin_date: Option<NaiveDate>,
    /// Last calendar date (inclusive) on which the entity is usable.
    pub end_date: Option<NaiveDate>,
    /// Start of a locked interval (inclusive).
    pub begin_lock_date: Option<NaiveDate>,
    /// End of a locked interval (inclusive).
    pub end_lock_date: Option<NaiveDate>,
    /// Start of the daily usage window.
    pub begin_time: Option<NaiveTime>,
    /// End of the daily usage window. May be earlier than `begin_time`,
    /// in which case the window spans midnight.
    pub end_time: Option<NaiveTime>,
    /// Days of the week on which the entity is usable.
    pub day_mask: Option<DayMask>,
    /// Idle timeout in minutes.
    pub timeout_minutes: Option<u32>,
}

impl TemporalConstraint {
    /// Returns a constraint with no restrictions.
    pub fn unrestricted() -> Self {
        Self::default()
    }

    /// Returns whether no field is set.
    pub fn is_unrestricted(&self) -> bool {
        *self == Self::default()
    }

    pub fn with_dates(mut self, begin: NaiveDate, end: NaiveDate) -> Self {
        self.begin_date = Some(begin);
        self.end_date = Some(end);
        self
    }

    pub fn with_lock_dates(mut self, begin: NaiveDate, end: NaiveDate) -> Self {
        self.begin_lock_date = Some(begin);
        self.end_lock_date = Some(end);
        self
    }

    pub fn with_times(mut self, begin: NaiveTime, end: NaiveTime) -> Self {
        self.begin_time = Some(begin);
        self.end_time = Some(end);
        self
    }

    pub fn with_day_mask(mut self, mask: DayMask) -> Self {
        self.day_mask = Some(mask);
        self
    }

    pub fn with_timeout(mut self, minutes: u32) -> Self {
        self.timeout_minutes = Some(minutes);
        self
    }
}

// ============================================================================
// Attribute constraints
// ============================================================================

/// How a [`RoleConstraint`] is used by the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConstraintType {
    /// Gates role activation against the user's runtime properties.
    User,
    /// Matched against permission attribute sets at access-check time.
    Filter,
    /// Stored for callers; never evaluated by the engine.
    Other,
}

/// Typed key/value attribute attached to a user-role assignment.
///
/// Example: `type = Filter, key = "branch", value = "north"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RoleConstraint {
    /// Assigned by the repository once persisted.
    pub id: Option<ConstraintId>,
    pub constraint_type: ConstraintType,
    pub key: String,
    pub value: String,
}

impl RoleConstraint {
    /// Creates an unpersisted constraint.
    pub fn new(
        constraint_type: ConstraintType,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            constraint_type,
            key: key.into(),
            value: value.into(),
        }
    }

    /// Creates an unpersisted `Filter` constraint.
    pub fn filter(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ConstraintType::Filter, key, value)
    }

    /// Creates an unpersisted `User` constraint.
    pub fn user(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(ConstraintType::User, key, value)
    }

    pub fn with_id(mut self, id: ConstraintId) -> Self {
        self.id = Some(id);
        self
    }

    /// Returns whether two constraints describe the same attribute value,
    /// ignoring the repository id.
    pub fn same_value(&self, other: &RoleConstraint) -> bool {
        self.constraint_type == other.constraint_type
            && self.key == other.key
            && self.value == other.value
    }
}

// ============================================================================
// Users and assignments
// ============================================================================

/// Assignment of a regular role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRole {
    pub user_id: String,
    pub role_name: String,
    /// Copied from the role at assignment time.
    pub temporal: TemporalConstraint,
    pub constraints: Vec<RoleConstraint>,
}

impl UserRole {
    pub fn new(user_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role_name: role_name.into(),
            temporal: TemporalConstraint::default(),
            constraints: Vec::new(),
        }
    }

    pub fn with_temporal(mut self, temporal: TemporalConstraint) -> Self {
        self.temporal = temporal;
        self
    }

    pub fn with_constraint(mut self, constraint: RoleConstraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Returns the constraints of the given type and key.
    pub fn constraints_for<'a>(
        &'a self,
        constraint_type: ConstraintType,
        key: &'a str,
    ) -> impl Iterator<Item = &'a RoleConstraint> + 'a {
        self.constraints
            .iter()
            .filter(move |c| c.constraint_type == constraint_type && c.key == key)
    }
}

/// Assignment of an administrative role to a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserAdminRole {
    pub user_id: String,
    pub role_name: String,
    pub temporal: TemporalConstraint,
}

impl UserAdminRole {
    pub fn new(user_id: impl Into<String>, role_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            role_name: role_name.into(),
            temporal: TemporalConstraint::default(),
        }
    }

    pub fn with_temporal(mut self, temporal: TemporalConstraint) -> Self {
        self.temporal = temporal;
        self
    }
}

/// A principal known to the identity repository.
///
/// The credential itself never lives on this struct; the repository keeps it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub user_id: String,
    /// User organizational unit.
    pub ou: String,
    pub description: String,
    /// Set by an administrator or a password policy; blocks authentication.
    pub locked: bool,
    /// The password must be changed before a non-trusted session is created.
    pub reset_required: bool,
    /// Runtime attributes matched against `User`-typed role constraints.
    pub props: BTreeMap<String, String>,
    pub temporal: TemporalConstraint,
    pub roles: Vec<UserRole>,
    pub admin_roles: Vec<UserAdminRole>,
}

impl User {
    pub fn new(user_id: impl Into<String>, ou: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            ou: ou.into(),
            description: String::new(),
            locked: false,
            reset_required: false,
            props: BTreeMap::new(),
            temporal: TemporalConstraint::default(),
            roles: Vec::new(),
            admin_roles: Vec::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn with_temporal(mut self, temporal: TemporalConstraint) -> Self {
        self.temporal = temporal;
        self
    }

    /// Returns the assignment record for the given role, if any.
    pub fn user_role(&self, role_name: &str) -> Option<&UserRole> {
        self.roles.iter().find(|ur| ur.role_name == role_name)
    }

    pub fn user_role_mut(&mut self, role_name: &str) -> Option<&mut UserRole> {
        self.roles.iter_mut().find(|ur| ur.role_name == role_name)
    }

    /// Returns the admin assignment record for the given admin role, if any.
    pub fn user_admin_role(&self, role_name: &str) -> Option<&UserAdminRole> {
        self.admin_roles.iter().find(|ur| ur.role_name == role_name)
    }

    pub fn is_assigned(&self, role_name: &str) -> bool {
        self.user_role(role_name).is_some()
    }

    /// Names of the directly assigned roles.
    pub fn role_names(&self) -> BTreeSet<String> {
        self.roles.iter().map(|ur| ur.role_name.clone()).collect()
    }
}

// ============================================================================
// Roles
// ============================================================================

/// A regular role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    pub name: String,
    pub description: String,
    pub temporal: TemporalConstraint,
    /// Attribute keys for which role constraints may be attached to
    /// assignments of this role.
    pub constraint_keys: BTreeSet<String>,
}

impl Role {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            temporal: TemporalConstraint::default(),
            constraint_keys: BTreeSet::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_temporal(mut self, temporal: TemporalConstraint) -> Self {
        self.temporal = temporal;
        self
    }

    pub fn with_constraint_key(mut self, key: impl Into<String>) -> Self {
        self.constraint_keys.insert(key.into());
        self
    }

    /// Returns whether role constraints with this key may be attached.
    pub fn is_constraint_enabled(&self, key: &str) -> bool {
        self.constraint_keys.contains(key)
    }
}

/// A contiguous range of the role hierarchy, from a junior `begin` role up to
/// a senior `end` role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRange {
    pub begin: String,
    pub end: String,
    pub begin_inclusive: bool,
    pub end_inclusive: bool,
}

impl RoleRange {
    /// Creates a range that includes both endpoints.
    pub fn inclusive(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
            begin_inclusive: true,
            end_inclusive: true,
        }
    }

    /// Creates a range that excludes both endpoints.
    pub fn exclusive(begin: impl Into<String>, end: impl Into<String>) -> Self {
        Self {
            begin: begin.into(),
            end: end.into(),
            begin_inclusive: false,
            end_inclusive: false,
        }
    }
}

impl Display for RoleRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let open = if self.begin_inclusive { '[' } else { '(' };
        let close = if self.end_inclusive { ']' } else { ')' };
        write!(f, "{open}{}, {}{close}", self.begin, self.end)
    }
}

/// An administrative role, scoped to ranges of the user-OU, perm-OU and
/// role hierarchies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRole {
    pub name: String,
    pub description: String,
    pub temporal: TemporalConstraint,
    /// Roots of the user-OU subtrees this role administers.
    pub user_ous: BTreeSet<String>,
    /// Roots of the perm-OU subtrees this role administers.
    pub perm_ous: BTreeSet<String>,
    /// Range of regular roles this admin role may assign and grant.
    pub role_range: Option<RoleRange>,
}

impl AdminRole {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: String::new(),
            temporal: TemporalConstraint::default(),
            user_ous: BTreeSet::new(),
            perm_ous: BTreeSet::new(),
            role_range: None,
        }
    }

    pub fn with_user_ou(mut self, ou: impl Into<String>) -> Self {
        self.user_ous.insert(ou.into());
        self
    }

    pub fn with_perm_ou(mut self, ou: impl Into<String>) -> Self {
        self.perm_ous.insert(ou.into());
        self
    }

    pub fn with_role_range(mut self, range: RoleRange) -> Self {
        self.role_range = Some(range);
        self
    }

    pub fn with_temporal(mut self, temporal: TemporalConstraint) -> Self {
        self.temporal = temporal;
        self
    }
}

// ============================================================================
// Separation of duty
// ============================================================================

/// Whether a separation-of-duty set is enforced at assignment or activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SdType {
    /// Static: evaluated when roles are assigned.
    Static,
    /// Dynamic: evaluated when roles are activated in a session.
    Dynamic,
}

impl Display for SdType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SdType::Static => f.write_str("SSD"),
            SdType::Dynamic => f.write_str("DSD"),
        }
    }
}

/// A set of mutually exclusive roles.
///
/// A user may hold at most `cardinality - 1` members of the set at once
/// (assigned for SSD, active for DSD).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdSet {
    pub name: String,
    pub sd_type: SdType,
    pub members: BTreeSet<String>,
    pub cardinality: u32,
    pub description: String,
}

impl SdSet {
    /// Smallest meaningful cardinality.
    pub const MIN_CARDINALITY: u32 = 2;

    pub fn new(name: impl Into<String>, sd_type: SdType, cardinality: u32) -> Self {
        Self {
            name: name.into(),
            sd_type,
            members: BTreeSet::new(),
            cardinality,
            description: String::new(),
        }
    }

    pub fn with_member(mut self, role: impl Into<String>) -> Self {
        self.members.insert(role.into());
        self
    }

    pub fn with_members<I, S>(mut self, roles: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.members.extend(roles.into_iter().map(Into::into));
        self
    }

    /// Most members a single user may hold simultaneously.
    pub fn max_held(&self) -> usize {
        (self.cardinality.saturating_sub(1)) as usize
    }

    pub fn contains(&self, role: &str) -> bool {
        self.members.contains(role)
    }
}

// ============================================================================
// Organizational units
// ============================================================================

/// Which population an organizational unit groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OuType {
    User,
    Perm,
}

impl OuType {
    /// Returns the hierarchy that holds units of this type.
    pub fn hierarchy(&self) -> HierarchyKind {
        match self {
            OuType::User => HierarchyKind::UserOu,
            OuType::Perm => HierarchyKind::PermOu,
        }
    }
}

/// An organizational unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrgUnit {
    pub name: String,
    pub ou_type: OuType,
    pub description: String,
}

impl OrgUnit {
    pub fn new(name: impl Into<String>, ou_type: OuType) -> Self {
        Self {
            name: name.into(),
            ou_type,
            description: String::new(),
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self::new(name, OuType::User)
    }

    pub fn perm(name: impl Into<String>) -> Self {
        Self::new(name, OuType::Perm)
    }
}

// ============================================================================
// Permissions
// ============================================================================

/// The resource identity permissions are grouped under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermObj {
    pub obj_name: String,
    /// Perm organizational unit.
    pub ou: String,
    pub description: String,
    pub admin: bool,
}

impl PermObj {
    pub fn new(obj_name: impl Into<String>, ou: impl Into<String>) -> Self {
        Self {
            obj_name: obj_name.into(),
            ou: ou.into(),
            description: String::new(),
            admin: false,
        }
    }

    pub fn admin(mut self) -> Self {
        self.admin = true;
        self
    }
}

/// Identity of a permission: object, operation, and optional object instance.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PermKey {
    pub obj_name: String,
    pub op_name: String,
    pub obj_id: Option<String>,
}

impl PermKey {
    pub fn new(obj_name: impl Into<String>, op_name: impl Into<String>) -> Self {
        Self {
            obj_name: obj_name.into(),
            op_name: op_name.into(),
            obj_id: None,
        }
    }

    pub fn with_obj_id(mut self, obj_id: impl Into<String>) -> Self {
        self.obj_id = Some(obj_id.into());
        self
    }
}

impl Display for PermKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.obj_name, self.op_name)?;
        if let Some(id) = &self.obj_id {
            write!(f, "#{id}")?;
        }
        Ok(())
    }
}

/// An operation on an object, with the roles and users it is granted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
    pub obj_name: String,
    pub op_name: String,
    pub obj_id: Option<String>,
    pub description: String,
    /// Granted to admin roles rather than regular roles.
    pub admin: bool,
    /// Attribute set consulted by ABAC matching at access-check time.
    pub pa_set_name: Option<String>,
    pub roles: BTreeSet<String>,
    pub users: BTreeSet<String>,
}

impl Permission {
    pub fn new(obj_name: impl Into<String>, op_name: impl Into<String>) -> Self {
        Self {
            obj_name: obj_name.into(),
            op_name: op_name.into(),
            obj_id: None,
            description: String::new(),
            admin: false,
            pa_set_name: None,
            roles: BTreeSet::new(),
            users: BTreeSet::new(),
        }
    }

    pub fn with_obj_id(mut self, obj_id: impl Into<String>) -> Self {
        self.obj_id = Some(obj_id.into());
        self
    }

    pub fn with_pa_set(mut self, name: impl Into<String>) -> Self {
        self.pa_set_name = Some(name.into());
        self
    }

    pub fn admin(mut self) -> Self {
        self.admin = true;
        self
    }

    pub fn key(&self) -> PermKey {
        PermKey {
            obj_name: self.obj_name.clone(),
            op_name: self.op_name.clone(),
            obj_id: self.obj_id.clone(),
        }
    }

    pub fn matches(&self, key: &PermKey) -> bool {
        self.obj_name == key.obj_name && self.op_name == key.op_name && self.obj_id == key.obj_id
    }
}

/// Comparison applied between a constraint value and an attribute's valid values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AttributeOperator {
    Equals,
    NotEquals,
    LessThan,
    LessOrEqual,
    GreaterThan,
    GreaterOrEqual,
    /// Value must appear in the valid-value set. Same as `Equals` applied
    /// existentially, kept for readability of attribute definitions.
    In,
    /// Valid values are glob patterns (`*`, `?`).
    Matches,
}

impl AttributeOperator {
    pub fn symbol(&self) -> &'static str {
        match self {
            AttributeOperator::Equals => "=",
            AttributeOperator::NotEquals => "!=",
            AttributeOperator::LessThan => "<",
            AttributeOperator::LessOrEqual => "<=",
            AttributeOperator::GreaterThan => ">",
            AttributeOperator::GreaterOrEqual => ">=",
            AttributeOperator::In => "IN",
            AttributeOperator::Matches => "MATCHES",
        }
    }
}

/// How attribute values are compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttributeDataType {
    #[default]
    String,
    Integer,
}

/// A single attribute a permission requires of the caller's role constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionAttribute {
    pub name: String,
    pub required: bool,
    pub operator: AttributeOperator,
    pub data_type: AttributeDataType,
    pub valid_values: BTreeSet<String>,
    pub description: String,
}

impl PermissionAttribute {
    /// Creates a required string attribute compared with `Equals`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            required: true,
            operator: AttributeOperator::Equals,
            data_type: AttributeDataType::String,
            valid_values: BTreeSet::new(),
            description: String::new(),
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn with_operator(mut self, operator: AttributeOperator) -> Self {
        self.operator = operator;
        self
    }

    pub fn with_data_type(mut self, data_type: AttributeDataType) -> Self {
        self.data_type = data_type;
        self
    }

    pub fn with_valid_value(mut self, value: impl Into<String>) -> Self {
        self.valid_values.insert(value.into());
        self
    }
}

/// A named group of attributes referenced by [`Permission::pa_set_name`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionAttributeSet {
    pub name: String,
    pub attributes: Vec<PermissionAttribute>,
    pub description: String,
}

impl PermissionAttributeSet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            description: String::new(),
        }
    }

    pub fn with_attribute(mut self, attribute: PermissionAttribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&PermissionAttribute> {
        self.attributes.iter().find(|a| a.name == name)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn day_mask_weekdays() {
        assert!(DayMask::WEEKDAYS.contains(Weekday::Mon));
        assert!(DayMask::WEEKDAYS.contains(Weekday::Fri));
        assert!(!DayMask::WEEKDAYS.contains(Weekday::Sat));
        assert!(!DayMask::WEEKDAYS.contains(Weekday::Sun));
        assert!(!DayMask::NONE.contains(Weekday::Wed));
    }

    #[test]
    fn day_mask_from_weekdays_matches_constants() {
        let weekdays = DayMask::from_weekdays([
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ]);
        assert_eq!(weekdays, DayMask::WEEKDAYS);

        let all = DayMask::from_weekdays([
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
            Weekday::Sat,
            Weekday::Sun,
        ]);
        assert_eq!(all, DayMask::ALL);
    }

    #[test]
    fn temporal_default_is_unrestricted() {
        assert!(TemporalConstraint::default().is_unrestricted());
        assert!(!TemporalConstraint::default().with_timeout(5).is_unrestricted());
    }

    #[test]
    fn user_role_lookup() {
        let mut user = User::new("jdoe", "dev");
        user.roles.push(UserRole::new("jdoe", "engineer"));
        user.roles.push(UserRole::new("jdoe", "reviewer"));

        assert!(user.is_assigned("engineer"));
        assert!(!user.is_assigned("manager"));
        assert_eq!(user.role_names().len(), 2);

        user.user_role_mut("reviewer")
            .unwrap()
            .constraints
            .push(RoleConstraint::filter("branch", "north"));
        let found: Vec<_> = user
            .user_role("reviewer")
            .unwrap()
            .constraints_for(ConstraintType::Filter, "branch")
            .collect();
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn role_constraint_same_value_ignores_id() {
        let a = RoleConstraint::filter("branch", "north");
        let b = a.clone().with_id(ConstraintId::generate());
        assert!(a.same_value(&b));
        assert_ne!(a, b);
        assert!(!a.same_value(&RoleConstraint::user("branch", "north")));
    }

    #[test_case(3, 2; "cardinality three")]
    #[test_case(2, 1; "cardinality two")]
    #[test_case(0, 0; "degenerate zero")]
    fn sd_set_max_held(cardinality: u32, expected: usize) {
        let set = SdSet::new("s", SdType::Static, cardinality);
        assert_eq!(set.max_held(), expected);
    }

    #[test]
    fn perm_key_display() {
        assert_eq!(PermKey::new("TOB1_1", "TOP1_1").to_string(), "TOB1_1.TOP1_1");
        assert_eq!(
            PermKey::new("Account", "read").with_obj_id("42").to_string(),
            "Account.read#42"
        );
    }

    #[test]
    fn permission_matches_key_exactly() {
        let perm = Permission::new("Account", "read").with_obj_id("42");
        assert!(perm.matches(&PermKey::new("Account", "read").with_obj_id("42")));
        assert!(!perm.matches(&PermKey::new("Account", "read")));
        assert!(!perm.matches(&PermKey::new("Account", "write").with_obj_id("42")));
    }

    #[test]
    fn role_range_display() {
        assert_eq!(RoleRange::inclusive("a", "b").to_string(), "[a, b]");
        assert_eq!(RoleRange::exclusive("a", "b").to_string(), "(a, b)");
    }

    #[test]
    fn ou_type_selects_hierarchy() {
        assert_eq!(OuType::User.hierarchy(), HierarchyKind::UserOu);
        assert_eq!(OuType::Perm.hierarchy(), HierarchyKind::PermOu);
    }

    #[test]
    fn entities_serialize_round_trip() {
        let user = User::new("jdoe", "dev")
            .with_prop("branch", "north")
            .with_temporal(TemporalConstraint::default().with_day_mask(DayMask::WEEKDAYS));
        let json = serde_json::to_string(&user).unwrap();
        let back: User = serde_json::from_str(&json).unwrap();
        assert_eq!(back, user);
    }
}
