//! Cluster roster and the tree topology rounds run over

use crate::error::BeaconError;
use serde::{Deserialize, Serialize};

/// A cluster member
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Member {
    /// Stable member identifier
    pub id: String,
    /// RPC endpoint (`host:port`)
    pub address: String,
}

impl Member {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
        }
    }
}

/// Ordered list of cluster members
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Roster {
    pub members: Vec<Member>,
}

impl Roster {
    pub fn new(members: Vec<Member>) -> Self {
        Self { members }
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Member> {
        self.members.iter()
    }
}

/// One position in the topology tree
#[derive(Debug, Clone, PartialEq, Eq)]
struct TreeNode {
    member: Member,
    children: Vec<usize>,
}

/// Binary tree over the roster.
///
/// Member `i` sits at position `i`; its children are `2i + 1` and `2i + 2`.
/// The first roster member is the root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClusterTopology {
    nodes: Vec<TreeNode>,
}

impl ClusterTopology {
    /// Build the binary tree for a roster
    pub fn binary_tree(roster: &Roster) -> Result<Self, BeaconError> {
        if roster.is_empty() {
            return Err(BeaconError::invalid("roster has no members"));
        }

        let len = roster.len();
        let nodes = roster
            .iter()
            .enumerate()
            .map(|(i, member)| TreeNode {
                member: member.clone(),
                children: [2 * i + 1, 2 * i + 2]
                    .into_iter()
                    .filter(|c| *c < len)
                    .collect(),
            })
            .collect();

        Ok(Self { nodes })
    }

    /// Number of members in the tree
    pub fn size(&self) -> usize {
        self.nodes.len()
    }

    pub fn root(&self) -> &Member {
        &self.nodes[0].member
    }

    /// Number of levels in the tree
    pub fn depth(&self) -> usize {
        // The leftmost path is the longest in a complete tree
        let mut depth = 1;
        let mut node = &self.nodes[0];
        while let Some(first) = node.children.first() {
            node = &self.nodes[*first];
            depth += 1;
        }
        depth
    }

    /// Members in breadth-first order (which is roster order for this layout)
    pub fn members(&self) -> impl Iterator<Item = &Member> {
        self.nodes.iter().map(|n| &n.member)
    }
}
