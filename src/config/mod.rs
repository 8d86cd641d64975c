//! Forest training configuration.
//!
//! [`ForestConfig`] carries the caller-facing parameters; the derived
//! per-dataset values (the split quota `k`, the per-tree attribute subset
//! size, and any tree-count adjustments required by the requested
//! diagnostics) are produced by [`ForestConfig::resolve`] and frozen into
//! [`ResolvedParams`] for the lifetime of a forest.

use crate::core::constants::{DEFAULT_MIN_TREES_PER_GROUP, DEFAULT_NUM_TREES, DEFAULT_SEED};
use crate::core::error::{ForestError, Result};
use serde::{Deserialize, Serialize};

/// Configuration for training a random forest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestConfig {
    /// Number of trees to build.
    pub num_trees: usize,
    /// Seed for the random number generators.
    pub seed: u64,
    /// Worker threads for parallel tree construction (0 = autodetect).
    pub num_threads: usize,
    /// Maximum tree depth (0 = unlimited).
    pub max_depth: usize,
    /// Number of attributes examined per split (0 = derived from the
    /// dataset as `floor(log2(A)) + 5`).
    pub k_value: usize,
    /// Number of attributes available to each tree (0 = derived from the
    /// dataset as `floor(A^0.6) + 60`).
    pub num_features_per_tree: usize,
    /// Compute permutation-based feature importances after training.
    pub compute_importances: bool,
    /// Compute dropout importances after training. Adjusts `num_trees` and
    /// `num_features_per_tree` to guarantee tree coverage per attribute.
    pub compute_dropout_importance: bool,
    /// Compute pairwise attribute interactions after training.
    pub compute_interactions: bool,
    /// Minimum trees required both containing and excluding an attribute
    /// for dropout importance and interactions.
    pub min_trees_per_group: usize,
}

impl Default for ForestConfig {
    fn default() -> Self {
        ForestConfig {
            num_trees: DEFAULT_NUM_TREES,
            seed: DEFAULT_SEED,
            num_threads: 0,
            max_depth: 0,
            k_value: 0,
            num_features_per_tree: 0,
            compute_importances: false,
            compute_dropout_importance: false,
            compute_interactions: false,
            min_trees_per_group: DEFAULT_MIN_TREES_PER_GROUP,
        }
    }
}

impl ForestConfig {
    /// Create a builder for constructing a configuration.
    pub fn builder() -> ForestConfigBuilder {
        ForestConfigBuilder::new()
    }

    /// Validate parameter combinations that do not need the dataset.
    pub fn validate(&self) -> Result<()> {
        if self.num_trees == 0 {
            return Err(ForestError::config("num_trees must be at least 1"));
        }
        if self.min_trees_per_group == 0 {
            return Err(ForestError::config("min_trees_per_group must be at least 1"));
        }
        Ok(())
    }

    /// Derive the effective training parameters for a dataset with
    /// `num_attributes` attributes (class attribute included).
    ///
    /// Reproduces the collaborator-facing derivation exactly: `k` defaults
    /// to `floor(log2(A)) + 5` clamped to `A - 1`; the per-tree subset
    /// defaults to `floor(A^0.6) + 60` clamped below `A`, recomputing `k`
    /// as `floor(log2(A)) + 1` when the clamp triggers. When dropout
    /// importance or interactions are requested, the tree count and subset
    /// size are pushed up so that every attribute is expected to appear in
    /// (and be absent from) at least `min_trees_per_group` trees.
    pub fn resolve(&self, num_attributes: usize) -> Result<ResolvedParams> {
        self.validate()?;
        if num_attributes < 2 {
            return Err(ForestError::config(
                "parameter derivation requires at least one non-class attribute",
            ));
        }

        let a = num_attributes;
        let log2_a = (a as f64).log2().floor() as usize;
        let mut num_trees = self.num_trees;
        let mut k = self.k_value;
        let mut num_feat_tree = self.num_features_per_tree;

        if k > a - 1 {
            k = a - 1;
        }
        if k < 1 {
            k = log2_a + 5;
        }
        if num_feat_tree < 1 {
            num_feat_tree = (a as f64).powf(0.6) as usize + 60;
        }
        if num_feat_tree >= a {
            num_feat_tree = a - 1;
            k = log2_a + 1;
        }

        let min_trees = self.min_trees_per_group;
        if self.compute_dropout_importance {
            num_trees = num_trees.max(2 * min_trees);
            num_feat_tree = num_feat_tree.max(min_trees * a / num_trees + 1);
            num_feat_tree = num_feat_tree.min((num_trees - min_trees) * a / num_trees);
        }
        if self.compute_interactions {
            num_trees = num_trees.max(40);
            num_feat_tree = (num_trees / 2) * a / num_trees + 1;
        }

        let num_threads = if self.num_threads == 0 {
            num_cpus::get()
        } else {
            self.num_threads
        };

        Ok(ResolvedParams {
            num_trees,
            seed: self.seed,
            num_threads,
            max_depth: self.max_depth,
            k_value: k,
            num_features_per_tree: num_feat_tree,
            min_trees_per_group: min_trees,
        })
    }
}

/// Effective training parameters after dataset-dependent derivation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedParams {
    /// Number of trees to build.
    pub num_trees: usize,
    /// Seed for the random number generators.
    pub seed: u64,
    /// Worker threads (resolved, never 0).
    pub num_threads: usize,
    /// Maximum tree depth (0 = unlimited).
    pub max_depth: usize,
    /// Number of attributes examined per split.
    pub k_value: usize,
    /// Number of attributes available to each tree.
    pub num_features_per_tree: usize,
    /// Minimum trees per saw/did-not-see group for diagnostics.
    pub min_trees_per_group: usize,
}

/// Builder for [`ForestConfig`].
#[derive(Debug, Clone, Default)]
pub struct ForestConfigBuilder {
    config: ForestConfig,
}

impl ForestConfigBuilder {
    /// Create a builder seeded with default values.
    pub fn new() -> Self {
        ForestConfigBuilder {
            config: ForestConfig::default(),
        }
    }

    /// Set the number of trees.
    pub fn num_trees(mut self, num_trees: usize) -> Self {
        self.config.num_trees = num_trees;
        self
    }

    /// Set the random seed.
    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    /// Set the worker thread count (0 = autodetect).
    pub fn num_threads(mut self, num_threads: usize) -> Self {
        self.config.num_threads = num_threads;
        self
    }

    /// Set the maximum tree depth (0 = unlimited).
    pub fn max_depth(mut self, max_depth: usize) -> Self {
        self.config.max_depth = max_depth;
        self
    }

    /// Set the per-split attribute quota (0 = derived).
    pub fn k_value(mut self, k_value: usize) -> Self {
        self.config.k_value = k_value;
        self
    }

    /// Set the per-tree attribute subset size (0 = derived).
    pub fn num_features_per_tree(mut self, num_features_per_tree: usize) -> Self {
        self.config.num_features_per_tree = num_features_per_tree;
        self
    }

    /// Request permutation feature importances.
    pub fn compute_importances(mut self, enabled: bool) -> Self {
        self.config.compute_importances = enabled;
        self
    }

    /// Request dropout feature importances.
    pub fn compute_dropout_importance(mut self, enabled: bool) -> Self {
        self.config.compute_dropout_importance = enabled;
        self
    }

    /// Request pairwise attribute interactions.
    pub fn compute_interactions(mut self, enabled: bool) -> Self {
        self.config.compute_interactions = enabled;
        self
    }

    /// Set the minimum trees per saw/did-not-see group.
    pub fn min_trees_per_group(mut self, min_trees: usize) -> Self {
        self.config.min_trees_per_group = min_trees;
        self
    }

    /// Validate and produce the configuration.
    pub fn build(self) -> Result<ForestConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
