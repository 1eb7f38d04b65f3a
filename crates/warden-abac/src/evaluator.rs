//! Permission attribute matching.
//!
//! A permission may reference a [`PermissionAttributeSet`]. At access-check
//! time each attribute of the set is matched against the `Filter`-typed
//! constraints carried by the session's active assignments:
//!
//! - no candidate constraint for a required attribute denies
//! - no candidate constraint for an optional attribute is ignored
//! - an attribute with no valid values is satisfied by any candidate
//! - otherwise at least one candidate value must satisfy the attribute's
//!   operator against at least one valid value, except `NotEquals`, which
//!   a value satisfies only when it equals none of the valid values
//!
//! Every attribute must be satisfied for the decision to allow.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use warden_types::{
    AttributeDataType, AttributeOperator, ConstraintType, PermissionAttribute,
    PermissionAttributeSet, UserRole,
};

// ============================================================================
// Decision
// ============================================================================

/// Outcome of attribute matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effect {
    Allow,
    Deny,
}

/// The result of matching a session against a permission attribute set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Whether access is allowed or denied.
    pub effect: Effect,
    /// The attribute that decided a denial, or `None` when allowed.
    pub attribute: Option<String>,
    /// Human-readable explanation of why this decision was made.
    pub reason: String,
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        self.effect == Effect::Allow
    }

    fn allow(reason: impl Into<String>) -> Self {
        Self {
            effect: Effect::Allow,
            attribute: None,
            reason: reason.into(),
        }
    }

    fn deny(attribute: &str, reason: impl Into<String>) -> Self {
        Self {
            effect: Effect::Deny,
            attribute: Some(attribute.to_string()),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Public API
// ============================================================================

/// Matches the active assignments of a session against `attributes`.
///
/// # Postcondition
///
/// Always returns a `Decision`, never panics on valid input.
pub fn evaluate(attributes: &PermissionAttributeSet, active: &[UserRole]) -> Decision {
    for attribute in &attributes.attributes {
        let candidates: Vec<&str> = active
            .iter()
            .flat_map(|ur| ur.constraints_for(ConstraintType::Filter, &attribute.name))
            .map(|c| c.value.as_str())
            .collect();

        if candidates.is_empty() {
            if attribute.required {
                return Decision::deny(
                    &attribute.name,
                    format!(
                        "No active role carries required attribute '{}' of set '{}'",
                        attribute.name, attributes.name
                    ),
                );
            }
            continue;
        }

        if !candidates.iter().any(|v| satisfies(attribute, v)) {
            return Decision::deny(
                &attribute.name,
                format!(
                    "No value of '{}' satisfies {} {:?}",
                    attribute.name,
                    attribute.operator.symbol(),
                    attribute.valid_values
                ),
            );
        }
    }

    Decision::allow(format!("All attributes of set '{}' satisfied", attributes.name))
}

/// Returns whether a single constraint value satisfies `attribute`.
pub fn satisfies(attribute: &PermissionAttribute, value: &str) -> bool {
    if attribute.valid_values.is_empty() {
        return true;
    }
    let mut valid = attribute.valid_values.iter();
    match attribute.operator {
        AttributeOperator::NotEquals => {
            !valid.any(|v| compare(attribute.data_type, value, v) == Ordering::Equal)
        }
        operator => valid.any(|v| compare_with(operator, attribute.data_type, value, v)),
    }
}

// ============================================================================
// Value Comparison
// ============================================================================

fn compare_with(
    operator: AttributeOperator,
    data_type: AttributeDataType,
    value: &str,
    valid: &str,
) -> bool {
    match operator {
        AttributeOperator::Equals | AttributeOperator::In => {
            compare(data_type, value, valid) == Ordering::Equal
        }
        AttributeOperator::NotEquals => compare(data_type, value, valid) != Ordering::Equal,
        AttributeOperator::LessThan => compare(data_type, value, valid) == Ordering::Less,
        AttributeOperator::LessOrEqual => compare(data_type, value, valid) != Ordering::Greater,
        AttributeOperator::GreaterThan => compare(data_type, value, valid) == Ordering::Greater,
        AttributeOperator::GreaterOrEqual => compare(data_type, value, valid) != Ordering::Less,
        AttributeOperator::Matches => glob_matches(valid, value),
    }
}

/// Numeric when declared `Integer` and both sides parse, lexical otherwise.
fn compare(data_type: AttributeDataType, a: &str, b: &str) -> Ordering {
    if data_type == AttributeDataType::Integer
        && let (Ok(x), Ok(y)) = (a.trim().parse::<i64>(), b.trim().parse::<i64>())
    {
        return x.cmp(&y);
    }
    a.cmp(b)
}

/// Glob matching with `*` (any run) and `?` (one character).
///
/// Iterative: on a mismatch after a `*`, the star absorbs one more
/// character and matching resumes, so the cost is bounded by
/// `pattern.len() * value.len()`.
fn glob_matches(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();

    let (mut p, mut v) = (0, 0);
    // Pattern index after the last `*`, and the value index it resumed from.
    let mut star: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p) {
            Some('*') => {
                star = Some((p + 1, v));
                p += 1;
            }
            Some(&c) if c == '?' || c == value[v] => {
                p += 1;
                v += 1;
            }
            _ => match star {
                Some((after_star, from)) => {
                    p = after_star;
                    v = from + 1;
                    star = Some((after_star, from + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|&c| c == '*')
}

// ============================================================================
// Tests
// ============================================================================
