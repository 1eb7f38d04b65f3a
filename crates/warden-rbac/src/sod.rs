//! Separation-of-duty enforcement.
//!
//! Static (SSD) and dynamic (DSD) checks share one algorithm: given the roles
//! a user already holds and a candidate role, count how many members of each
//! set of the relevant type the user would hold afterwards. A set with
//! cardinality `k` tolerates at most `k - 1` held members.
//!
//! Membership is counted over the hierarchy closure: a senior role that
//! inherits a conflicting junior counts as holding it. For DSD this can be
//! switched off with [`SodEngine::with_inherited_membership`].

use std::collections::BTreeSet;

use thiserror::Error;
use tracing::{debug, warn};
use warden_types::{SdSet, SdType};

use crate::hierarchy::Hierarchy;

/// Error type for separation-of-duty checks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SodError {
    /// Assignment would exceed a static set's cardinality.
    #[error(
        "SSD validation failed: role '{role}' conflicts with set '{set}' (cardinality {cardinality}, already held {held})"
    )]
    SsdViolation {
        set: String,
        role: String,
        cardinality: u32,
        held: usize,
    },

    /// Activation would exceed a dynamic set's cardinality.
    #[error(
        "DSD validation failed: role '{role}' conflicts with set '{set}' (cardinality {cardinality}, already active {held})"
    )]
    DsdViolation {
        set: String,
        role: String,
        cardinality: u32,
        held: usize,
    },
}

impl SodError {
    /// Name of the set that rejected the role.
    pub fn set_name(&self) -> &str {
        match self {
            SodError::SsdViolation { set, .. } | SodError::DsdViolation { set, .. } => set,
        }
    }
}

/// Result type for separation-of-duty checks.
pub type Result<T> = std::result::Result<T, SodError>;

/// Evaluates SSD and DSD sets against a role hierarchy.
#[derive(Debug, Clone, Copy)]
pub struct SodEngine<'a> {
    hierarchy: &'a Hierarchy,
    sets: &'a [SdSet],
    inherited_membership: bool,
}

impl<'a> SodEngine<'a> {
    /// Creates an engine over the role hierarchy and the given sets.
    ///
    /// Sets of both types may be mixed; each check only looks at its own type.
    pub fn new(hierarchy: &'a Hierarchy, sets: &'a [SdSet]) -> Self {
        Self {
            hierarchy,
            sets,
            inherited_membership: true,
        }
    }

    /// Whether inherited juniors count toward a set's cardinality.
    pub fn with_inherited_membership(mut self, enabled: bool) -> Self {
        self.inherited_membership = enabled;
        self
    }

    /// Validates assigning `candidate` to a user already assigned `assigned`.
    pub fn validate_ssd<'r, I>(&self, assigned: I, candidate: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'r str>,
    {
        self.validate(SdType::Static, assigned, candidate)
    }

    /// Validates activating `candidate` in a session with `active` roles.
    pub fn validate_dsd<'r, I>(&self, active: I, candidate: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'r str>,
    {
        self.validate(SdType::Dynamic, active, candidate)
    }

    /// Sets of the given type whose members intersect the closure of `role`.
    pub fn sets_for(&self, sd_type: SdType, role: &str) -> Vec<&'a SdSet> {
        let closure = self.closure([role]);
        self.sets
            .iter()
            .filter(|s| s.sd_type == sd_type)
            .filter(|s| s.members.iter().any(|m| closure.contains(m)))
            .collect()
    }

    fn validate<'r, I>(&self, sd_type: SdType, held: I, candidate: &str) -> Result<()>
    where
        I: IntoIterator<Item = &'r str>,
    {
        let held = self.closure(held);
        let incoming: BTreeSet<String> = self
            .closure([candidate])
            .into_iter()
            .filter(|r| !held.contains(r))
            .collect();

        for set in self.sets.iter().filter(|s| s.sd_type == sd_type) {
            let new_hits = set.members.iter().filter(|m| incoming.contains(*m)).count();
            if new_hits == 0 {
                continue;
            }
            let held_count = set.members.iter().filter(|m| held.contains(*m)).count();
            let total = held_count + new_hits;

            if total >= set.cardinality as usize {
                warn!(
                    set = %set.name,
                    role = %candidate,
                    kind = %sd_type,
                    held = held_count,
                    cardinality = set.cardinality,
                    "Separation of duty violated"
                );
                let (set, role, cardinality) =
                    (set.name.clone(), candidate.to_string(), set.cardinality);
                return Err(match sd_type {
                    SdType::Static => SodError::SsdViolation {
                        set,
                        role,
                        cardinality,
                        held: held_count,
                    },
                    SdType::Dynamic => SodError::DsdViolation {
                        set,
                        role,
                        cardinality,
                        held: held_count,
                    },
                });
            }
            debug!(set = %set.name, role = %candidate, total, "Separation of duty satisfied");
        }
        Ok(())
    }

    fn closure<'r, I>(&self, roles: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'r str>,
    {
        if self.inherited_membership {
            self.hierarchy.closure_down(roles)
        } else {
            roles.into_iter().map(str::to_string).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use warden_types::HierarchyKind;

    fn flat(names: &[&str]) -> Hierarchy {
        let mut h = Hierarchy::new(HierarchyKind::Role);
        for n in names {
            h.add_node(*n);
        }
        h
    }

    fn members(prefix: &str, n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("{prefix}{i}")).collect()
    }

    #[test]
    fn ssd_allows_cardinality_minus_one() {
        let names = members("ssd", 4);
        let h = flat(&names.iter().map(String::as_str).collect::<Vec<_>>());
        let sets = vec![SdSet::new("s1", SdType::Static, 3).with_members(names.clone())];
        let engine = SodEngine::new(&h, &sets);

        let mut assigned: Vec<&str> = Vec::new();
        assert!(engine.validate_ssd(assigned.iter().copied(), "ssd1").is_ok());
        assigned.push("ssd1");
        assert!(engine.validate_ssd(assigned.iter().copied(), "ssd2").is_ok());
        assigned.push("ssd2");

        let err = engine
            .validate_ssd(assigned.iter().copied(), "ssd3")
            .unwrap_err();
        assert_eq!(
            err,
            SodError::SsdViolation {
                set: "s1".to_string(),
                role: "ssd3".to_string(),
                cardinality: 3,
                held: 2,
            }
        );
    }

    #[test]
    fn dsd_ignores_static_sets() {
        let h = flat(&["a", "b"]);
        let sets = vec![SdSet::new("s", SdType::Static, 2).with_members(["a", "b"])];
        let engine = SodEngine::new(&h, &sets);

        assert!(engine.validate_dsd(["a"], "b").is_ok());
        assert!(engine.validate_ssd(["a"], "b").is_err());
    }

    #[test]
    fn senior_role_counts_inherited_members() {
        // senior inherits junior_a; set {junior_a, junior_b} cardinality 2
        let mut h = flat(&["senior", "junior_a", "junior_b"]);
        h.add_edge("senior", "junior_a").unwrap();
        let sets = vec![SdSet::new("s", SdType::Dynamic, 2).with_members(["junior_a", "junior_b"])];

        let engine = SodEngine::new(&h, &sets);
        assert!(matches!(
            engine.validate_dsd(["senior"], "junior_b"),
            Err(SodError::DsdViolation { .. })
        ));

        // Activating the senior when the other junior is active also conflicts.
        assert!(engine.validate_dsd(["junior_b"], "senior").is_err());

        let direct_only = engine.with_inherited_membership(false);
        assert!(direct_only.validate_dsd(["senior"], "junior_b").is_ok());
    }

    #[test]
    fn senior_covering_two_members_rejected_alone() {
        let mut h = flat(&["boss", "a", "b"]);
        h.add_edge("boss", "a").unwrap();
        h.add_edge("boss", "b").unwrap();
        let sets = vec![SdSet::new("s", SdType::Static, 2).with_members(["a", "b"])];
        let engine = SodEngine::new(&h, &sets);

        assert!(engine.validate_ssd(std::iter::empty(), "boss").is_err());
    }

    #[test]
    fn re_holding_an_inherited_member_is_not_a_new_hit() {
        let mut h = flat(&["senior", "junior"]);
        h.add_edge("senior", "junior").unwrap();
        let sets = vec![SdSet::new("s", SdType::Dynamic, 2).with_members(["junior", "other"])];
        let engine = SodEngine::new(&h, &sets);

        assert!(engine.validate_dsd(["senior"], "junior").is_ok());
    }

    #[test]
    fn sets_for_uses_closure() {
        let mut h = flat(&["senior", "junior", "x"]);
        h.add_edge("senior", "junior").unwrap();
        let sets = vec![
            SdSet::new("has-junior", SdType::Static, 2).with_members(["junior", "x"]),
            SdSet::new("unrelated", SdType::Static, 2).with_members(["y", "z"]),
        ];
        let engine = SodEngine::new(&h, &sets);

        let found = engine.sets_for(SdType::Static, "senior");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name, "has-junior");
        assert!(engine.sets_for(SdType::Dynamic, "senior").is_empty());
    }

    proptest! {
        /// Property: one-at-a-time assignment succeeds exactly
        /// min(members, cardinality - 1) times.
        #[test]
        fn prop_cardinality_law(member_count in 1usize..8, cardinality in 2u32..10) {
            let names = members("m", member_count);
            let h = flat(&names.iter().map(String::as_str).collect::<Vec<_>>());
            let sets = vec![SdSet::new("s", SdType::Static, cardinality).with_members(names.clone())];
            let engine = SodEngine::new(&h, &sets);

            let mut held: Vec<&str> = Vec::new();
            let mut successes = 0usize;
            for name in &names {
                if engine.validate_ssd(held.iter().copied(), name).is_ok() {
                    held.push(name);
                    successes += 1;
                }
            }
            let expected = member_count.min(cardinality as usize - 1);
            prop_assert_eq!(successes, expected);
        }
    }
}
