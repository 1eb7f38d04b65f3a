//! Hierarchy graphs.
//!
//! A [`Hierarchy`] is an adjacency-map DAG keyed by node name. Edges point
//! from the senior node (parent) to the junior node (child); a senior node
//! inherits everything its descendants carry.
//!
//! The same structure backs all four graphs the engine maintains (roles,
//! admin roles, user OUs, perm OUs). Closures are computed on demand by
//! breadth-first traversal. Acyclicity is enforced when edges are inserted,
//! so traversal never needs a cycle guard beyond its visited set.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use warden_types::HierarchyKind;

/// Error type for hierarchy edits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HierarchyError {
    /// Referenced node does not exist.
    #[error("{kind} '{name}' not found in hierarchy")]
    NodeNotFound { kind: HierarchyKind, name: String },

    /// Node being created already exists.
    #[error("{kind} '{name}' already exists in hierarchy")]
    NodeExists { kind: HierarchyKind, name: String },

    /// Edge being added already exists.
    #[error("{kind} hierarchy already has edge '{parent}' -> '{child}'")]
    EdgeExists {
        kind: HierarchyKind,
        parent: String,
        child: String,
    },

    /// Edge being removed does not exist.
    #[error("{kind} hierarchy has no edge '{parent}' -> '{child}'")]
    EdgeNotFound {
        kind: HierarchyKind,
        parent: String,
        child: String,
    },

    /// Edge would make the graph cyclic.
    #[error("edge '{parent}' -> '{child}' would create a cycle in the {kind} hierarchy")]
    Cycle {
        kind: HierarchyKind,
        parent: String,
        child: String,
    },
}

/// Result type for hierarchy operations.
pub type Result<T> = std::result::Result<T, HierarchyError>;

/// Directed acyclic graph of named nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hierarchy {
    kind: HierarchyKind,
    /// parent -> children
    children: BTreeMap<String, BTreeSet<String>>,
    /// child -> parents
    parents: BTreeMap<String, BTreeSet<String>>,
}

impl Hierarchy {
    /// Creates an empty hierarchy.
    pub fn new(kind: HierarchyKind) -> Self {
        Self {
            kind,
            children: BTreeMap::new(),
            parents: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> HierarchyKind {
        self.kind
    }

    pub fn contains(&self, name: &str) -> bool {
        self.children.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Iterates over all node names in sorted order.
    pub fn nodes(&self) -> impl Iterator<Item = &str> {
        self.children.keys().map(String::as_str)
    }

    /// Number of edges in the graph.
    pub fn edge_count(&self) -> usize {
        self.children.values().map(BTreeSet::len).sum()
    }

    /// Adds an isolated node. Returns `false` if it was already present.
    pub fn add_node(&mut self, name: impl Into<String>) -> bool {
        let name = name.into();
        if self.children.contains_key(&name) {
            return false;
        }
        self.children.insert(name.clone(), BTreeSet::new());
        self.parents.insert(name, BTreeSet::new());
        true
    }

    /// Removes a node together with every edge touching it.
    ///
    /// Juniors of the removed node are not reattached to its seniors.
    /// Returns `false` if the node was not present.
    pub fn remove_node(&mut self, name: &str) -> bool {
        let Some(children) = self.children.remove(name) else {
            return false;
        };
        let parents = self.parents.remove(name).unwrap_or_default();

        for child in &children {
            if let Some(p) = self.parents.get_mut(child) {
                p.remove(name);
            }
        }
        for parent in &parents {
            if let Some(c) = self.children.get_mut(parent) {
                c.remove(name);
            }
        }
        true
    }

    /// Adds an edge from `parent` (senior) to `child` (junior).
    ///
    /// # Errors
    ///
    /// - [`HierarchyError::NodeNotFound`] if either endpoint is missing
    /// - [`HierarchyError::EdgeExists`] if the edge is already present
    /// - [`HierarchyError::Cycle`] if `child` already reaches `parent`
    pub fn add_edge(&mut self, parent: &str, child: &str) -> Result<()> {
        self.require(parent)?;
        self.require(child)?;

        if parent == child || self.reaches(child, parent) {
            return Err(HierarchyError::Cycle {
                kind: self.kind,
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }

        let inserted = self
            .children
            .get_mut(parent)
            .is_some_and(|c| c.insert(child.to_string()));
        if !inserted {
            return Err(HierarchyError::EdgeExists {
                kind: self.kind,
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        if let Some(p) = self.parents.get_mut(child) {
            p.insert(parent.to_string());
        }
        Ok(())
    }

    /// Removes the edge from `parent` to `child`.
    pub fn remove_edge(&mut self, parent: &str, child: &str) -> Result<()> {
        let removed = self
            .children
            .get_mut(parent)
            .is_some_and(|c| c.remove(child));
        if !removed {
            return Err(HierarchyError::EdgeNotFound {
                kind: self.kind,
                parent: parent.to_string(),
                child: child.to_string(),
            });
        }
        if let Some(p) = self.parents.get_mut(child) {
            p.remove(parent);
        }
        Ok(())
    }

    /// Creates `new_parent` and makes it a direct senior of the existing `child`.
    pub fn add_ascendant(&mut self, child: &str, new_parent: &str) -> Result<()> {
        self.require(child)?;
        self.require_absent(new_parent)?;
        self.add_node(new_parent);
        self.add_edge(new_parent, child)
    }

    /// Creates `new_child` and makes it a direct junior of the existing `parent`.
    pub fn add_descendant(&mut self, parent: &str, new_child: &str) -> Result<()> {
        self.require(parent)?;
        self.require_absent(new_child)?;
        self.add_node(new_child);
        self.add_edge(parent, new_child)
    }

    /// Direct seniors of `name`.
    pub fn parents(&self, name: &str) -> BTreeSet<String> {
        self.parents.get(name).cloned().unwrap_or_default()
    }

    /// Direct juniors of `name`.
    pub fn children(&self, name: &str) -> BTreeSet<String> {
        self.children.get(name).cloned().unwrap_or_default()
    }

    /// All strict juniors of `name` (transitive).
    pub fn descendants(&self, name: &str) -> BTreeSet<String> {
        Self::traverse(&self.children, [name])
    }

    /// All strict seniors of `name` (transitive).
    pub fn ascendants(&self, name: &str) -> BTreeSet<String> {
        Self::traverse(&self.parents, [name])
    }

    /// The given names plus all of their juniors.
    ///
    /// Names unknown to the graph are still included: a role with no
    /// hierarchy entry carries only itself.
    pub fn closure_down<'a, I>(&self, names: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = names.into_iter().collect();
        let mut out = Self::traverse(&self.children, names.iter().copied());
        out.extend(names.iter().map(|n| (*n).to_string()));
        out
    }

    /// The given names plus all of their seniors.
    pub fn closure_up<'a, I>(&self, names: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let names: Vec<&str> = names.into_iter().collect();
        let mut out = Self::traverse(&self.parents, names.iter().copied());
        out.extend(names.iter().map(|n| (*n).to_string()));
        out
    }

    /// Returns whether `junior` is reachable from `senior` (strictly).
    pub fn is_ascendant_of(&self, senior: &str, junior: &str) -> bool {
        senior != junior && self.reaches(senior, junior)
    }

    fn reaches(&self, from: &str, to: &str) -> bool {
        let mut queue = VecDeque::from([from]);
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        while let Some(node) = queue.pop_front() {
            if node == to {
                return true;
            }
            if !seen.insert(node) {
                continue;
            }
            if let Some(next) = self.children.get(node) {
                queue.extend(next.iter().map(String::as_str));
            }
        }
        false
    }

    fn traverse<'a, I>(edges: &BTreeMap<String, BTreeSet<String>>, start: I) -> BTreeSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut out = BTreeSet::new();
        let mut queue: VecDeque<&str> = VecDeque::new();
        for s in start {
            if let Some(next) = edges.get(s) {
                queue.extend(next.iter().map(String::as_str));
            }
        }
        while let Some(node) = queue.pop_front() {
            if !out.insert(node.to_string()) {
                continue;
            }
            if let Some(next) = edges.get(node) {
                queue.extend(next.iter().map(String::as_str));
            }
        }
        out
    }

    fn require(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Ok(())
        } else {
            Err(HierarchyError::NodeNotFound {
                kind: self.kind,
                name: name.to_string(),
            })
        }
    }

    fn require_absent(&self, name: &str) -> Result<()> {
        if self.contains(name) {
            Err(HierarchyError::NodeExists {
                kind: self.kind,
                name: name.to_string(),
            })
        } else {
            Ok(())
        }
    }
}
