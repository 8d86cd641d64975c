//! Core data types for the fast random forest implementation.
//!
//! This module defines the fundamental index and attribute types shared by
//! the dataset, tree induction, and forest aggregation layers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Attribute (column) index into the dataset, class attribute included.
pub type AttributeIndex = usize;

/// Instance (row) index into the dataset.
pub type InstanceIndex = usize;

/// Class label index, `0..num_classes`.
pub type ClassIndex = usize;

/// Index of a tree within a trained forest.
pub type TreeIndex = usize;

/// Sentinel for a missing feature value in the columnar matrix.
///
/// Missing values are encoded as `f32::MAX` so that every per-attribute
/// ascending sort places them at the end of the permutation.
pub const MISSING: f32 = f32::MAX;

/// Kind of a dataset attribute as declared by the caller.
///
/// Only numeric (dates included) and categorical attributes can be trained
/// on; declaring a [`AttributeKind::Text`] column fails dataset
/// construction with an `UnsupportedAttributeKind` error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttributeKind {
    /// Real-valued attribute.
    Numeric,
    /// Date/timestamp attribute; treated as numeric during induction.
    Date,
    /// Categorical attribute with the given number of categories.
    Categorical(u32),
    /// Free-form text attribute. Not supported for training.
    Text,
}

impl AttributeKind {
    /// Returns true if values of this kind are ordered reals.
    pub fn is_numeric(&self) -> bool {
        matches!(self, AttributeKind::Numeric | AttributeKind::Date)
    }

    /// Returns true if this is a categorical attribute.
    pub fn is_categorical(&self) -> bool {
        matches!(self, AttributeKind::Categorical(_))
    }

    /// Number of categories, or `None` for non-categorical kinds.
    pub fn num_categories(&self) -> Option<u32> {
        match self {
            AttributeKind::Categorical(n) => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for AttributeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeKind::Numeric => write!(f, "numeric"),
            AttributeKind::Date => write!(f, "date"),
            AttributeKind::Categorical(n) => write!(f, "categorical({n})"),
            AttributeKind::Text => write!(f, "text"),
        }
    }
}

/// How a split value routes an instance at an internal node.
///
/// Numeric splits send `value < threshold` to branch 0; categorical splits
/// send the single named category to branch 0 and everything else to
/// branch 1 (splits are always binary, even for multi-category attributes).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum SplitValue {
    /// Midpoint threshold for a numeric attribute.
    Numeric(f64),
    /// The category routed to branch 0 of a categorical attribute.
    Category(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_kind_predicates() {
        assert!(AttributeKind::Numeric.is_numeric());
        assert!(AttributeKind::Date.is_numeric());
        assert!(!AttributeKind::Categorical(3).is_numeric());
        assert!(AttributeKind::Categorical(3).is_categorical());
        assert_eq!(AttributeKind::Categorical(3).num_categories(), Some(3));
        assert_eq!(AttributeKind::Numeric.num_categories(), None);
        assert!(!AttributeKind::Text.is_numeric());
        assert!(!AttributeKind::Text.is_categorical());
    }

    #[test]
    fn test_missing_sorts_last() {
        let mut vals = vec![3.0f32, MISSING, 1.0, 2.0];
        vals.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(vals[3], MISSING);
    }
}
