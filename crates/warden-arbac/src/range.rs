//! Range membership over hierarchy graphs.

use std::collections::BTreeSet;

use warden_rbac::Hierarchy;
use warden_types::RoleRange;

/// Returns whether `role` lies within `range` on the role hierarchy.
///
/// `range.begin` is the junior boundary and `range.end` the senior one. A
/// role strictly between them (a senior of `begin` and a junior of `end`) is
/// always inside; the endpoints themselves are inside only when inclusive.
pub fn role_in_range(roles: &Hierarchy, range: &RoleRange, role: &str) -> bool {
    if role == range.begin {
        return range.begin_inclusive;
    }
    if role == range.end {
        return range.end_inclusive;
    }
    roles.is_ascendant_of(role, &range.begin) && roles.is_ascendant_of(&range.end, role)
}

/// Returns whether `ou` is one of `roots` or a junior of one of them.
pub fn ou_in_scope(ous: &Hierarchy, roots: &BTreeSet<String>, ou: &str) -> bool {
    roots
        .iter()
        .any(|root| root == ou || ous.is_ascendant_of(root, ou))
}
