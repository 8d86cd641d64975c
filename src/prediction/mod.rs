//! Class-distribution inference for single trees.
//!
//! Traversal is value-source agnostic: callers supply a lookup closure
//! mapping an attribute index to `Some(value)` or `None` for missing.
//! A missing value at an internal node blends both subtrees weighted by
//! the branch proportions recorded at training time.

use crate::core::types::{AttributeIndex, SplitValue};
use crate::tree::{Tree, TreeNode};

/// Walk a subtree and return its (normalized) class distribution.
pub(crate) fn node_distribution<F>(node: &TreeNode, lookup: &F) -> Vec<f64>
where
    F: Fn(AttributeIndex) -> Option<f64>,
{
    match node {
        TreeNode::Leaf { distribution } => {
            let total: f64 = distribution.iter().sum();
            if total > 0.0 {
                distribution.iter().map(|w| w / total).collect()
            } else {
                vec![1.0 / distribution.len() as f64; distribution.len()]
            }
        }
        TreeNode::Internal {
            attribute,
            split,
            props,
            children,
        } => match lookup(*attribute) {
            None => {
                let left = node_distribution(&children[0], lookup);
                let right = node_distribution(&children[1], lookup);
                left.iter()
                    .zip(&right)
                    .map(|(l, r)| props[0] * l + props[1] * r)
                    .collect()
            }
            Some(value) => {
                let branch = match split {
                    SplitValue::Numeric(threshold) => usize::from(value >= *threshold),
                    SplitValue::Category(category) => {
                        usize::from(value as usize != *category as usize)
                    }
                };
                node_distribution(&children[branch], lookup)
            }
        },
    }
}

impl Tree {
    /// Class distribution for a dense instance row, indexed by
    /// attribute with `NaN` marking a missing value. The class
    /// attribute's slot is never read.
    pub fn distribution(&self, instance: &[f64]) -> Vec<f64> {
        node_distribution(self.root(), &|att| {
            let v = instance[att];
            if v.is_nan() {
                None
            } else {
                Some(v)
            }
        })
    }
}
