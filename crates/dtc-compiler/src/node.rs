use std::fmt;

use crate::error::CompileError;
use crate::operator::Operator;

/// Zero-based feature index as stored in the artifact.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct FeatureIndex(u16);

impl FeatureIndex {
    /// Create a feature index from its 16-bit wire value.
    #[must_use]
    pub fn new(index: u16) -> Self {
        Self(index)
    }

    /// Convert a feature position, checking that it fits the 16-bit field.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::CapacityExceeded`] when `position > u16::MAX`.
    pub fn try_from_usize(position: usize) -> Result<Self, CompileError> {
        u16::try_from(position)
            .map(Self)
            .map_err(|_| CompileError::CapacityExceeded {
                what: "feature",
                count: position + 1,
                max: usize::from(u16::MAX) + 1,
            })
    }

    /// Return the zero-based feature index.
    #[must_use]
    pub fn index(self) -> usize {
        usize::from(self.0)
    }

    /// Return the raw wire value.
    #[must_use]
    pub fn get(self) -> u16 {
        self.0
    }
}

impl fmt::Display for FeatureIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Zero-based class code written into a leaf.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct ClassIndex(i16);

impl ClassIndex {
    /// Convert a class position, checking that it fits the signed 16-bit field.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::CapacityExceeded`] when `position > i16::MAX`.
    pub fn try_from_usize(position: usize) -> Result<Self, CompileError> {
        i16::try_from(position)
            .map(Self)
            .map_err(|_| CompileError::CapacityExceeded {
                what: "class",
                count: position + 1,
                max: i16::MAX as usize + 1,
            })
    }

    /// Return the zero-based class index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Return the raw wire value.
    #[must_use]
    pub fn get(self) -> i16 {
        self.0
    }
}

impl fmt::Display for ClassIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Position of a node inside its [`FlatTree`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash,
    serde::Serialize, serde::Deserialize,
)]
pub struct NodeIndex(usize);

impl NodeIndex {
    /// Create a node index from a zero-based arena position.
    #[must_use]
    pub fn new(index: usize) -> Self {
        Self(index)
    }

    /// Return the zero-based arena index.
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for NodeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A node of a flattened tree.
///
/// The artifact stores both variants in one fixed-width record; only the
/// encoder knows that layout.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeNode {
    /// A binary split: samples satisfying `feature <operator> threshold` go left.
    Internal {
        /// Comparison applied to the feature value.
        operator: Operator,
        /// Feature the split reads.
        feature: FeatureIndex,
        /// Comparison threshold, always stored as `f64`.
        threshold: f64,
        /// Index of the left child.
        left: NodeIndex,
        /// Index of the right child.
        right: NodeIndex,
    },
    /// A terminal node carrying the predicted class.
    Leaf {
        /// Class code of the outcome.
        class: ClassIndex,
    },
}

impl TreeNode {
    /// Return `true` if this node is a leaf.
    #[must_use]
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Return the `(left, right)` children of an internal node.
    #[must_use]
    pub fn children(&self) -> Option<(NodeIndex, NodeIndex)> {
        match *self {
            TreeNode::Internal { left, right, .. } => Some((left, right)),
            TreeNode::Leaf { .. } => None,
        }
    }
}

/// A tree flattened into an index-addressed arena. Index 0 is the root.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct FlatTree {
    nodes: Vec<TreeNode>,
}

impl FlatTree {
    /// Wrap a node sequence. Use [`FlatTree::validate`] to check the links.
    #[must_use]
    pub fn from_nodes(nodes: Vec<TreeNode>) -> Self {
        Self { nodes }
    }

    /// Return the nodes in index order.
    #[must_use]
    pub fn nodes(&self) -> &[TreeNode] {
        &self.nodes
    }

    /// Return the node at `index`.
    #[must_use]
    pub fn get(&self, index: NodeIndex) -> Option<&TreeNode> {
        self.nodes.get(index.index())
    }

    /// Return the number of nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Return `true` if the tree has no nodes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Return the number of leaves.
    #[must_use]
    pub fn n_leaves(&self) -> usize {
        self.nodes.iter().filter(|n| n.is_leaf()).count()
    }

    /// Return the number of edges on the longest root-to-leaf path.
    ///
    /// Assumes forward-only links, which holds for every tree built by the
    /// flattener or accepted by [`FlatTree::validate`].
    #[must_use]
    pub fn depth(&self) -> usize {
        let mut depths = vec![0usize; self.nodes.len()];
        let mut max_depth = 0;
        for (i, node) in self.nodes.iter().enumerate() {
            max_depth = max_depth.max(depths[i]);
            if let Some((left, right)) = node.children() {
                let next = depths[i] + 1;
                for child in [left, right] {
                    if let Some(d) = depths.get_mut(child.index()) {
                        *d = next;
                    }
                }
            }
        }
        max_depth
    }

    /// Check the link structure: non-empty, every child index points forward
    /// inside the arena, and every node except the root has exactly one parent.
    ///
    /// Together these guarantee that a walk from index 0 reaches every node
    /// exactly once and stops only at leaves.
    ///
    /// # Errors
    ///
    /// Returns [`CompileError::MalformedArtifact`] describing the first violation.
    pub fn validate(&self) -> Result<(), CompileError> {
        if self.nodes.is_empty() {
            return Err(CompileError::malformed_artifact("tree has no nodes"));
        }
        let mut parents = vec![0u32; self.nodes.len()];
        for (i, node) in self.nodes.iter().enumerate() {
            let Some((left, right)) = node.children() else {
                continue;
            };
            for child in [left, right] {
                let c = child.index();
                if c <= i || c >= self.nodes.len() {
                    return Err(CompileError::malformed_artifact(format!(
                        "node {i} links to {c}, outside ({i}, {})",
                        self.nodes.len()
                    )));
                }
                parents[c] += 1;
            }
        }
        if let Some(orphan) = parents.iter().skip(1).position(|&p| p != 1) {
            let index = orphan + 1;
            return Err(CompileError::malformed_artifact(format!(
                "node {index} has {} parents, expected 1",
                parents[index]
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{ClassIndex, FeatureIndex, FlatTree, NodeIndex, TreeNode};
    use crate::{CompileError, Operator};

    fn leaf(class: usize) -> TreeNode {
        TreeNode::Leaf {
            class: ClassIndex::try_from_usize(class).unwrap(),
        }
    }

    fn split(left: usize, right: usize) -> TreeNode {
        TreeNode::Internal {
            operator: Operator::LessOrEqual,
            feature: FeatureIndex::new(0),
            threshold: 1.0,
            left: NodeIndex::new(left),
            right: NodeIndex::new(right),
        }
    }

    // --- indices ---

    #[test]
    fn feature_index_bounds() {
        assert_eq!(FeatureIndex::try_from_usize(65_535).unwrap().get(), u16::MAX);
        let err = FeatureIndex::try_from_usize(65_536).unwrap_err();
        assert!(matches!(err, CompileError::CapacityExceeded { what: "feature", .. }));
    }

    #[test]
    fn class_index_bounds() {
        assert_eq!(ClassIndex::try_from_usize(32_767).unwrap().get(), i16::MAX);
        let err = ClassIndex::try_from_usize(32_768).unwrap_err();
        assert!(matches!(err, CompileError::CapacityExceeded { what: "class", .. }));
    }

    #[test]
    fn index_display() {
        assert_eq!(format!("{}", NodeIndex::new(4)), "4");
        assert_eq!(format!("{}", FeatureIndex::new(2)), "2");
    }

    // --- FlatTree ---

    #[test]
    fn single_leaf_is_valid() {
        let tree = FlatTree::from_nodes(vec![leaf(0)]);
        tree.validate().unwrap();
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.n_leaves(), 1);
    }

    #[test]
    fn nested_tree_stats() {
        // 0 -> (1, 4); 1 -> (2, 3)
        let tree = FlatTree::from_nodes(vec![split(1, 4), split(2, 3), leaf(0), leaf(1), leaf(1)]);
        tree.validate().unwrap();
        assert_eq!(tree.len(), 5);
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.n_leaves(), 3);
        assert!(tree.get(NodeIndex::new(3)).unwrap().is_leaf());
    }

    #[test]
    fn empty_tree_is_invalid() {
        assert!(FlatTree::default().validate().is_err());
    }

    #[test]
    fn backward_link_is_invalid() {
        let tree = FlatTree::from_nodes(vec![split(1, 2), split(0, 3), leaf(0), leaf(1)]);
        assert!(matches!(tree.validate(), Err(CompileError::MalformedArtifact { .. })));
    }

    #[test]
    fn out_of_range_link_is_invalid() {
        let tree = FlatTree::from_nodes(vec![split(1, 3), leaf(0), leaf(1)]);
        assert!(tree.validate().is_err());
    }

    #[test]
    fn shared_child_is_invalid() {
        let tree = FlatTree::from_nodes(vec![split(1, 1), leaf(0)]);
        assert!(tree.validate().is_err());
    }

    #[test]
    fn unreachable_node_is_invalid() {
        let tree = FlatTree::from_nodes(vec![split(1, 2), leaf(0), leaf(1), leaf(0)]);
        let err = tree.validate().unwrap_err();
        assert!(matches!(err, CompileError::MalformedArtifact { ref reason } if reason.contains("node 3")));
    }
}
