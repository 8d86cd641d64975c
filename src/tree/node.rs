//! Decision tree nodes and the per-tree model.

use crate::core::types::{AttributeIndex, SplitValue};
use serde::{Deserialize, Serialize};

/// A node of a trained decision tree.
///
/// Leaf distributions are the per-class weighted counts divided by the
/// number of instances that reached the leaf; they are deliberately not
/// forced to sum to 1, which preserves the effect of instance weighting
/// on voting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum TreeNode {
    /// Terminal node holding a class distribution.
    Leaf {
        /// Per-class weight divided by instance count at this leaf.
        distribution: Vec<f64>,
    },
    /// Binary split node.
    Internal {
        /// The attribute tested at this node.
        attribute: AttributeIndex,
        /// How values route to the two branches.
        split: SplitValue,
        /// Fraction of non-missing training weight sent each way; sums
        /// to 1 and routes missing values proportionally.
        props: [f64; 2],
        /// Branch 0 and branch 1 subtrees.
        children: Box<[TreeNode; 2]>,
    },
}

impl TreeNode {
    /// Is this a terminal node?
    pub fn is_leaf(&self) -> bool {
        matches!(self, TreeNode::Leaf { .. })
    }

    /// Total number of nodes in this subtree.
    pub fn count_nodes(&self) -> usize {
        match self {
            TreeNode::Leaf { .. } => 1,
            TreeNode::Internal { children, .. } => {
                1 + children[0].count_nodes() + children[1].count_nodes()
            }
        }
    }
}

/// One trained tree of the forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tree {
    root: TreeNode,
    /// The attribute subset this tree was permitted to use; immutable for
    /// the tree's lifetime and required for out-of-bag and importance
    /// bookkeeping.
    selected_attributes: Vec<AttributeIndex>,
    num_nodes: usize,
}

impl Tree {
    pub(crate) fn new(root: TreeNode, selected_attributes: Vec<AttributeIndex>) -> Self {
        let num_nodes = root.count_nodes();
        Tree {
            root,
            selected_attributes,
            num_nodes,
        }
    }

    /// The root node.
    pub fn root(&self) -> &TreeNode {
        &self.root
    }

    /// The attribute subset this tree was trained on.
    pub fn selected_attributes(&self) -> &[AttributeIndex] {
        &self.selected_attributes
    }

    /// Whether the tree had access to the given attribute.
    pub fn uses_attribute(&self, att: AttributeIndex) -> bool {
        self.selected_attributes.contains(&att)
    }

    /// Number of nodes in the tree.
    pub fn num_nodes(&self) -> usize {
        self.num_nodes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn leaf(d: Vec<f64>) -> TreeNode {
        TreeNode::Leaf { distribution: d }
    }

    #[test]
    fn test_node_counting() {
        let node = TreeNode::Internal {
            attribute: 0,
            split: SplitValue::Numeric(1.5),
            props: [0.5, 0.5],
            children: Box::new([leaf(vec![1.0, 0.0]), leaf(vec![0.0, 1.0])]),
        };
        assert_eq!(node.count_nodes(), 3);
        assert!(!node.is_leaf());

        let tree = Tree::new(node, vec![0, 2]);
        assert_eq!(tree.num_nodes(), 3);
        assert!(tree.uses_attribute(2));
        assert!(!tree.uses_attribute(1));
    }
}
