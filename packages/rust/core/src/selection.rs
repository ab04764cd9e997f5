//! Node handles and selection deduplication.
//!
//! The discovered forest is moved into a [`NodeTable`] that hands out
//! [`NodeId`]s. Ids are pre-order positions, so for a given source tree the
//! same node always gets the same id and `scan` output can be fed back into
//! `build --select`.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use docbuilder_shared::DocNode;

// ---------------------------------------------------------------------------
// NodeId
// ---------------------------------------------------------------------------

/// Opaque handle to a node in a [`NodeTable`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(usize);

impl NodeId {
    pub fn new(raw: usize) -> Self {
        Self(raw)
    }

    pub fn get(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<usize>()
            .map(Self)
            .map_err(|_| format!("invalid node id: {s}"))
    }
}

// ---------------------------------------------------------------------------
// Parent lookup
// ---------------------------------------------------------------------------

/// Anything that can answer "what is this node's parent".
pub trait ParentLookup {
    /// The parent of `id`, or `None` for a root or an unknown id.
    fn parent(&self, id: NodeId) -> Option<NodeId>;
}

/// Reduce a selection to its topmost members.
///
/// A selected node is kept only if none of its ancestors is also selected.
/// Order of first occurrence is preserved and duplicates are dropped.
pub fn top_level_selections(selected: &[NodeId], lookup: &impl ParentLookup) -> Vec<NodeId> {
    let chosen: HashSet<NodeId> = selected.iter().copied().collect();
    let mut seen = HashSet::new();

    selected
        .iter()
        .copied()
        .filter(|id| seen.insert(*id))
        .filter(|id| !has_selected_ancestor(*id, &chosen, lookup))
        .collect()
}

fn has_selected_ancestor(id: NodeId, chosen: &HashSet<NodeId>, lookup: &impl ParentLookup) -> bool {
    let mut current = lookup.parent(id);
    while let Some(parent) = current {
        if chosen.contains(&parent) {
            return true;
        }
        current = lookup.parent(parent);
    }
    false
}

// ---------------------------------------------------------------------------
// NodeTable
// ---------------------------------------------------------------------------

/// Where a node sits: child positions from the roots down, plus its parent.
#[derive(Debug, Clone)]
struct Slot {
    path: Vec<usize>,
    parent: Option<NodeId>,
}

/// Owns a discovered forest and maps [`NodeId`]s to its nodes.
#[derive(Debug, Clone, Default)]
pub struct NodeTable {
    roots: Vec<DocNode>,
    slots: Vec<Slot>,
}

impl NodeTable {
    pub fn new(roots: Vec<DocNode>) -> Self {
        let mut slots = Vec::new();
        let mut path = Vec::new();
        for (i, root) in roots.iter().enumerate() {
            path.push(i);
            index_subtree(root, &mut path, None, &mut slots);
            path.pop();
        }
        Self { roots, slots }
    }

    pub fn roots(&self) -> &[DocNode] {
        &self.roots
    }

    /// Ids of the top-level nodes.
    pub fn root_ids(&self) -> Vec<NodeId> {
        self.ids().filter(|id| self.parent(*id).is_none()).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.slots.len()
    }

    /// All ids in pre-order.
    pub fn ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        (0..self.slots.len()).map(NodeId)
    }

    pub fn get(&self, id: NodeId) -> Option<&DocNode> {
        let slot = self.slots.get(id.0)?;
        let (first, rest) = slot.path.split_first()?;
        rest.iter()
            .try_fold(self.roots.get(*first)?, |node, i| node.children.get(*i))
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.slots.get(id.0).and_then(|slot| slot.parent)
    }

    /// Depth below the roots, 0 for a root.
    pub fn depth(&self, id: NodeId) -> Option<usize> {
        self.slots.get(id.0).map(|slot| slot.path.len() - 1)
    }

    /// Every node with its id, in pre-order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &DocNode)> + '_ {
        self.ids().filter_map(|id| self.get(id).map(|node| (id, node)))
    }
}

impl ParentLookup for NodeTable {
    fn parent(&self, id: NodeId) -> Option<NodeId> {
        NodeTable::parent(self, id)
    }
}

fn index_subtree(
    node: &DocNode,
    path: &mut Vec<usize>,
    parent: Option<NodeId>,
    slots: &mut Vec<Slot>,
) {
    let id = NodeId(slots.len());
    slots.push(Slot {
        path: path.clone(),
        parent,
    });

    for (i, child) in node.children.iter().enumerate() {
        path.push(i);
        index_subtree(child, path, Some(id), slots);
        path.pop();
    }
}
