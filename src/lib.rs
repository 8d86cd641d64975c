//! # Fast Random Forest
//!
//! A fast random forest classifier for tabular data, built around
//! columnar storage, precomputed sort orders and parallel tree
//! construction.
//!
//! ## Features
//!
//! - **Columnar Training Data**: Features are stored attribute-major so
//!   split search scans contiguous memory, with per-attribute ascending
//!   permutations computed once and shared by every tree.
//! - **Randomized Split Search**: Each node examines a random quota of
//!   the tree's attribute subset, extending the draw until a split with
//!   a meaningful entropy gain is found.
//! - **Parallel Construction**: Trees are built concurrently with Rayon,
//!   with per-tree RNG streams derived from the dataset content so
//!   results are identical across runs and thread counts.
//! - **Out-of-Bag Diagnostics**: Generalization error, permutation
//!   feature importances, dropout importances and pairwise attribute
//!   interactions, all without a holdout set.
//! - **Missing Values**: Handled natively during both training and
//!   prediction, with proportional weight redistribution at splits.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fast_random_forest::{AttributeKind, Forest, ForestConfig, TabularDataset};
//! use ndarray::array;
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Columns are indexed [attribute, instance]; the last row is the class.
//! let columns = array![
//!     [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
//!     [0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
//! ];
//! let dataset = TabularDataset::from_columns(
//!     columns,
//!     vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
//!     1,
//!     None,
//! )?;
//!
//! let config = ForestConfig::builder()
//!     .num_trees(100)
//!     .seed(42)
//!     .compute_importances(true)
//!     .build()?;
//!
//! let forest = Forest::train(Arc::new(dataset), config)?;
//!
//! println!("out-of-bag error: {}", forest.oob_error());
//! println!("class distribution: {:?}", forest.predict(&[2.5]));
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`core`]: Fundamental types, constants and error handling
//! - [`config`]: Training configuration and parameter derivation
//! - [`dataset`]: Columnar dataset storage and per-tree resampled views
//! - [`tree`]: Decision-tree construction and representation
//! - [`forest`]: Parallel forest training and out-of-bag diagnostics
//! - [`prediction`]: Model inference

#![warn(missing_docs)]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(
    missing_debug_implementations,
    rust_2018_idioms,
    non_snake_case,
    non_upper_case_globals
)]

// Core infrastructure module
pub mod core;

// Configuration management module
pub mod config;

// Dataset management module
pub mod dataset;

// Tree construction module
pub mod tree;

// Forest training module
pub mod forest;

// Prediction module
pub mod prediction;

// Re-export the caller-facing surface for convenience
pub use crate::core::{
    error::{ForestError, Result},
    types::{AttributeKind, SplitValue, MISSING},
};

pub use crate::config::{ForestConfig, ForestConfigBuilder, ResolvedParams};

pub use crate::dataset::{DatasetView, TabularDataset};

pub use crate::forest::{BuildMetrics, Forest};

pub use crate::tree::{Tree, TreeNode};
