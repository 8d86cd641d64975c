//! Forest training and the trained-model handle.
//!
//! Trees are built in parallel inside a dedicated rayon pool. Each tree
//! task derives its RNG stream from the dataset content and the tree
//! index alone, so the forest is identical across runs and across thread
//! counts. Out-of-bag diagnostics live in [`oob`]; they are computed
//! lazily behind `OnceLock` caches and only ever read state frozen at
//! the end of training.

pub mod oob;

use crate::config::{ForestConfig, ResolvedParams};
use crate::core::error::{ForestError, Result};
use crate::dataset::TabularDataset;
use crate::prediction::node_distribution;
use crate::tree::{Tree, TreeBuilder};
use log::{debug, info, warn};
use ndarray::Array2;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

/// Construction statistics gathered while training.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuildMetrics {
    /// Node count of every tree, in tree order.
    pub nodes_per_tree: Vec<usize>,
    /// Sum of all per-tree node counts.
    pub total_nodes: usize,
    /// Wall-clock time spent building trees.
    pub elapsed: Duration,
}

/// A trained random forest classifier.
#[derive(Debug)]
pub struct Forest {
    trees: Vec<Tree>,
    /// Per-tree in-bag membership, indexed `[tree][instance]`.
    in_bag: Vec<Vec<bool>>,
    params: ResolvedParams,
    /// Majority-class fallback used when the dataset has no predictive
    /// attributes; `Some` implies `trees` is empty.
    zero_rule: Option<Vec<f64>>,
    dataset: Arc<TabularDataset>,
    metrics: BuildMetrics,
    oob_error_cache: OnceLock<f64>,
    importance_cache: OnceLock<Vec<f64>>,
    dropout_cache: OnceLock<Vec<f64>>,
    interaction_cache: OnceLock<Array2<f64>>,
}

impl Forest {
    /// Train a forest on a dataset.
    ///
    /// Diagnostics requested in the configuration are computed eagerly
    /// before this returns, so a trained forest never fails later for a
    /// reason known at training time.
    pub fn train(dataset: Arc<TabularDataset>, config: ForestConfig) -> Result<Forest> {
        config.validate()?;

        if dataset.num_attributes() == 1 {
            warn!("dataset has no predictive attributes; using a majority-class model");
            return Ok(Self::zero_rule_forest(dataset, &config));
        }

        let params = config.resolve(dataset.num_attributes())?;
        if config.compute_dropout_importance {
            oob::check_expected_coverage(&params, dataset.num_attributes())?;
        }
        info!(
            "training {} trees (k = {}, {} attributes per tree, {} threads)",
            params.num_trees, params.k_value, params.num_features_per_tree, params.num_threads
        );

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(params.num_threads)
            .build()
            .map_err(|e| ForestError::config(format!("failed to build thread pool: {e}")))?;

        let start = Instant::now();
        let built: Result<Vec<(Tree, Vec<bool>, usize)>> = pool.install(|| {
            (0..params.num_trees)
                .into_par_iter()
                .map(|t| {
                    let stream = params.seed.wrapping_add(t as u64);
                    let mut rng = StdRng::seed_from_u64(dataset.derived_seed(stream));
                    let mut view = dataset.resample(&mut rng, params.num_features_per_tree)?;
                    let builder =
                        TreeBuilder::new(&mut view, &mut rng, params.k_value, params.max_depth);
                    let (tree, num_nodes) = builder.build()?;
                    debug!("tree {t} built with {num_nodes} nodes");
                    Ok((tree, view.into_in_bag(), num_nodes))
                })
                .collect()
        });
        let built = built?;
        let elapsed = start.elapsed();

        let mut trees = Vec::with_capacity(built.len());
        let mut in_bag = Vec::with_capacity(built.len());
        let mut nodes_per_tree = Vec::with_capacity(built.len());
        for (tree, bag, num_nodes) in built {
            trees.push(tree);
            in_bag.push(bag);
            nodes_per_tree.push(num_nodes);
        }
        let total_nodes = nodes_per_tree.iter().sum();
        info!(
            "built {} trees ({} nodes) in {:.2?}",
            trees.len(),
            total_nodes,
            elapsed
        );

        let forest = Forest {
            trees,
            in_bag,
            params,
            zero_rule: None,
            dataset,
            metrics: BuildMetrics {
                nodes_per_tree,
                total_nodes,
                elapsed,
            },
            oob_error_cache: OnceLock::new(),
            importance_cache: OnceLock::new(),
            dropout_cache: OnceLock::new(),
            interaction_cache: OnceLock::new(),
        };

        if config.compute_importances {
            let _ = forest.feature_importances();
        }
        if config.compute_dropout_importance {
            forest.dropout_importances()?;
        }
        if config.compute_interactions {
            forest.interactions()?;
        }
        Ok(forest)
    }

    fn zero_rule_forest(dataset: Arc<TabularDataset>, config: &ForestConfig) -> Forest {
        let distribution = dataset.class_distribution();
        let params = ResolvedParams {
            num_trees: 0,
            seed: config.seed,
            num_threads: 1,
            max_depth: config.max_depth,
            k_value: 0,
            num_features_per_tree: 0,
            min_trees_per_group: config.min_trees_per_group,
        };
        Forest {
            trees: Vec::new(),
            in_bag: Vec::new(),
            params,
            zero_rule: Some(distribution),
            dataset,
            metrics: BuildMetrics {
                nodes_per_tree: Vec::new(),
                total_nodes: 0,
                elapsed: Duration::ZERO,
            },
            oob_error_cache: OnceLock::new(),
            importance_cache: OnceLock::new(),
            dropout_cache: OnceLock::new(),
            interaction_cache: OnceLock::new(),
        }
    }

    /// The trained trees.
    pub fn trees(&self) -> &[Tree] {
        &self.trees
    }

    /// Number of trained trees (0 for the majority-class fallback).
    pub fn num_trees(&self) -> usize {
        self.trees.len()
    }

    /// Effective parameters the forest was trained with.
    pub fn params(&self) -> &ResolvedParams {
        &self.params
    }

    /// Construction statistics.
    pub fn metrics(&self) -> &BuildMetrics {
        &self.metrics
    }

    /// The training dataset.
    pub fn dataset(&self) -> &TabularDataset {
        &self.dataset
    }

    /// True when the forest degenerated to the majority-class model.
    pub fn is_majority_class_model(&self) -> bool {
        self.zero_rule.is_some()
    }

    pub(crate) fn in_bag(&self, tree: usize) -> &[bool] {
        &self.in_bag[tree]
    }

    pub(crate) fn zero_rule(&self) -> Option<&[f64]> {
        self.zero_rule.as_deref()
    }

    /// Averaged class distribution for a dense instance row.
    ///
    /// `instance` is indexed by attribute, with `NaN` marking a missing
    /// value. The class attribute's slot is never read and may be left
    /// off entirely when the class is the last attribute.
    pub fn predict(&self, instance: &[f64]) -> Vec<f64> {
        if let Some(zero_rule) = &self.zero_rule {
            return zero_rule.clone();
        }
        let mut votes = vec![0.0; self.dataset.num_classes()];
        for tree in &self.trees {
            let dist = tree.distribution(instance);
            for (vote, p) in votes.iter_mut().zip(&dist) {
                *vote += p;
            }
        }
        let n = self.trees.len() as f64;
        for vote in votes.iter_mut() {
            *vote /= n;
        }
        votes
    }

    /// Most probable class for a dense instance row.
    pub fn predict_class(&self, instance: &[f64]) -> usize {
        max_index(&self.predict(instance))
    }

    pub(crate) fn tree_distribution_in_dataset<F>(&self, tree: usize, lookup: &F) -> Vec<f64>
    where
        F: Fn(usize) -> Option<f64>,
    {
        node_distribution(self.trees[tree].root(), lookup)
    }
}

/// Index of the first maximum.
pub(crate) fn max_index(values: &[f64]) -> usize {
    let mut best = 0;
    for (i, &v) in values.iter().enumerate().skip(1) {
        if v > values[best] {
            best = i;
        }
    }
    best
}
