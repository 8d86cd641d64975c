//! Out-of-bag diagnostics.
//!
//! All measures here score training instances only with trees whose
//! bootstrap sample excluded them. Results are cached after the first
//! computation; a given forest always reports the same numbers.
//!
//! Three measures are provided. The out-of-bag error estimates
//! generalization error without a holdout set. Permutation importance
//! re-scores the forest with one attribute's column scrambled and
//! reports the error increase. Dropout importance compares the error of
//! the trees that never saw an attribute against the trees that did,
//! which extends to a pairwise interaction measure over the four
//! saw/did-not-see tree groups of an attribute pair.

use crate::config::ResolvedParams;
use crate::core::error::{ForestError, Result};
use crate::core::types::{AttributeIndex, MISSING};
use crate::forest::{max_index, Forest};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rayon::prelude::*;

/// Verify that the resolved parameters make every attribute *expected*
/// to appear in, and be absent from, at least `min_trees_per_group`
/// trees. This is a necessary precondition for dropout importance, not
/// a guarantee; group sizes are re-checked after training.
pub(crate) fn check_expected_coverage(
    params: &ResolvedParams,
    num_attributes: usize,
) -> Result<()> {
    let a = num_attributes as f64;
    let t = params.num_trees as f64;
    let m = params.min_trees_per_group as f64;
    let nft = params.num_features_per_tree as f64;
    if nft < m * a / t + 1.0 {
        return Err(ForestError::insufficient_coverage(format!(
            "{} attributes per tree is too few for {} trees containing each of {} attributes; \
             raise num_features_per_tree or num_trees",
            params.num_features_per_tree, params.min_trees_per_group, num_attributes
        )));
    }
    if nft > (t - m) * a / t {
        return Err(ForestError::insufficient_coverage(format!(
            "{} attributes per tree is too many for {} trees excluding each of {} attributes; \
             lower num_features_per_tree or raise num_trees",
            params.num_features_per_tree, params.min_trees_per_group, num_attributes
        )));
    }
    Ok(())
}

impl Forest {
    /// Out-of-bag classification error, weighted by instance weights.
    ///
    /// Instances never out of bag are excluded from the estimate. For
    /// the majority-class fallback this degenerates to the training
    /// error of the majority prediction.
    pub fn oob_error(&self) -> f64 {
        *self.oob_error_cache.get_or_init(|| {
            if let Some(zero_rule) = self.zero_rule() {
                let predicted = max_index(zero_rule);
                let d = self.dataset();
                let mut wrong = 0.0;
                let mut total = 0.0;
                for i in 0..d.num_instances() {
                    total += d.weight(i);
                    if d.label(i) != predicted {
                        wrong += d.weight(i);
                    }
                }
                return if total > 0.0 { wrong / total } else { 0.0 };
            }
            let all: Vec<usize> = (0..self.num_trees()).collect();
            self.oob_error_over(&all, None)
        })
    }

    /// Permutation feature importances, one entry per attribute.
    ///
    /// The entry for an attribute is the out-of-bag error increase,
    /// after scrambling that attribute's column, over the trees whose
    /// subset contained the attribute, against those trees' own
    /// baseline. The class attribute's entry is `NaN` and attributes
    /// available to no tree score zero.
    pub fn feature_importances(&self) -> &[f64] {
        self.importance_cache.get_or_init(|| {
            let d = self.dataset();
            let num_attributes = d.num_attributes();
            let mut importances = vec![f64::NAN; num_attributes];
            if self.num_trees() == 0 {
                return importances;
            }

            // Scrambled columns are drawn sequentially from one stream so
            // the result does not depend on scheduling.
            let stream = self.params().seed.wrapping_add(self.params().num_trees as u64);
            let mut rng = StdRng::seed_from_u64(self.dataset().derived_seed(stream));
            let mut scrambled: Vec<Option<Vec<f32>>> = Vec::with_capacity(num_attributes);
            for att in 0..num_attributes {
                if att == d.class_index() {
                    scrambled.push(None);
                    continue;
                }
                let mut column = d.column(att);
                column.shuffle(&mut rng);
                scrambled.push(Some(column));
            }

            let scores: Vec<(AttributeIndex, f64)> = scrambled
                .par_iter()
                .enumerate()
                .filter_map(|(att, column)| {
                    let column = column.as_ref()?;
                    let (saw, _) = self.split_trees_by_attribute(att);
                    if saw.is_empty() {
                        return Some((att, 0.0));
                    }
                    let baseline = self.oob_error_over(&saw, None);
                    let scrambled_error = self.oob_error_over(&saw, Some((att, column)));
                    Some((att, scrambled_error - baseline))
                })
                .collect();
            for (att, score) in scores {
                importances[att] = score;
            }
            importances
        })
    }

    /// Dropout feature importances, one entry per attribute.
    ///
    /// The entry for an attribute is the out-of-bag error of the trees
    /// that never had it available minus the error of the trees that
    /// did; the class attribute's entry is `NaN`. Fails when either tree
    /// group of some attribute is smaller than `min_trees_per_group`.
    pub fn dropout_importances(&self) -> Result<&[f64]> {
        if let Some(cached) = self.dropout_cache.get() {
            return Ok(cached);
        }
        if self.num_trees() == 0 {
            return Err(ForestError::insufficient_coverage(
                "forest has no trees; dropout importance is unavailable",
            ));
        }
        let d = self.dataset();
        let min_trees = self.params().min_trees_per_group;
        let mut importances = vec![f64::NAN; d.num_attributes()];

        for att in 0..d.num_attributes() {
            if att == d.class_index() {
                continue;
            }
            let (saw, blind) = self.split_trees_by_attribute(att);
            if saw.len() < min_trees || blind.len() < min_trees {
                return Err(ForestError::insufficient_coverage(format!(
                    "attribute {} appears in {} trees and is absent from {}, need {} of each; \
                     raise num_trees or adjust num_features_per_tree",
                    att,
                    saw.len(),
                    blind.len(),
                    min_trees
                )));
            }
            importances[att] = self.oob_error_over(&blind, None) - self.oob_error_over(&saw, None);
        }

        let _ = self.dropout_cache.set(importances);
        Ok(self.dropout_cache.get().expect("cache was just populated"))
    }

    /// Pairwise attribute interactions as a symmetric matrix.
    ///
    /// For a pair `(a, b)` the trees are split into four groups by which
    /// of the two attributes they had available; the entry is
    /// `(e_neither + e_both) - (e_only_a + e_only_b)` over the groups'
    /// out-of-bag errors. A deviation from zero means the attributes
    /// help (or hurt) the forest beyond their individual contributions.
    /// Entries involving the class attribute, the diagonal and pairs
    /// with an empty tree group are `NaN`.
    pub fn interactions(&self) -> Result<&ndarray::Array2<f64>> {
        if let Some(cached) = self.interaction_cache.get() {
            return Ok(cached);
        }
        if self.num_trees() == 0 {
            return Err(ForestError::insufficient_coverage(
                "forest has no trees; interactions are unavailable",
            ));
        }
        let d = self.dataset();
        let num_attributes = d.num_attributes();
        let mut matrix =
            ndarray::Array2::<f64>::from_elem((num_attributes, num_attributes), f64::NAN);

        let pairs: Vec<(usize, usize)> = (0..num_attributes)
            .flat_map(|a| ((a + 1)..num_attributes).map(move |b| (a, b)))
            .filter(|&(a, b)| a != d.class_index() && b != d.class_index())
            .collect();

        let scores: Vec<((usize, usize), f64)> = pairs
            .par_iter()
            .map(|&(a, b)| {
                let mut groups: [Vec<usize>; 4] = Default::default();
                for (t, tree) in self.trees().iter().enumerate() {
                    let saw_a = tree.uses_attribute(a);
                    let saw_b = tree.uses_attribute(b);
                    groups[usize::from(saw_a) * 2 + usize::from(saw_b)].push(t);
                }
                if groups.iter().any(Vec::is_empty) {
                    return ((a, b), f64::NAN);
                }
                let errs: Vec<f64> = groups
                    .iter()
                    .map(|g| self.oob_error_over(g, None))
                    .collect();
                // neither + both, minus only-b + only-a.
                (((a, b)), (errs[0] + errs[3]) - (errs[1] + errs[2]))
            })
            .collect();
        for ((a, b), score) in scores {
            matrix[[a, b]] = score;
            matrix[[b, a]] = score;
        }

        let _ = self.interaction_cache.set(matrix);
        Ok(self
            .interaction_cache
            .get()
            .expect("cache was just populated"))
    }

    /// Tree indices that had the attribute available versus not.
    fn split_trees_by_attribute(&self, att: AttributeIndex) -> (Vec<usize>, Vec<usize>) {
        let mut saw = Vec::new();
        let mut blind = Vec::new();
        for (t, tree) in self.trees().iter().enumerate() {
            if tree.uses_attribute(att) {
                saw.push(t);
            } else {
                blind.push(t);
            }
        }
        (saw, blind)
    }

    /// Weighted out-of-bag error over a subset of trees, optionally with
    /// one attribute's column replaced by a scrambled copy.
    fn oob_error_over(
        &self,
        tree_indices: &[usize],
        scramble: Option<(AttributeIndex, &[f32])>,
    ) -> f64 {
        let d = self.dataset();
        let num_classes = d.num_classes();
        let (wrong, total) = (0..d.num_instances())
            .into_par_iter()
            .map(|i| {
                let lookup = |att: AttributeIndex| {
                    let v = match scramble {
                        Some((scrambled_att, column)) if scrambled_att == att => column[i],
                        _ => d.value(att, i),
                    };
                    if v == MISSING {
                        None
                    } else {
                        Some(v as f64)
                    }
                };
                let mut votes = vec![0.0; num_classes];
                let mut voted = false;
                for &t in tree_indices {
                    if self.in_bag(t)[i] {
                        continue;
                    }
                    let dist = self.tree_distribution_in_dataset(t, &lookup);
                    for (vote, p) in votes.iter_mut().zip(&dist) {
                        *vote += p;
                    }
                    voted = true;
                }
                if !voted {
                    return (0.0, 0.0);
                }
                let weight = d.weight(i);
                if max_index(&votes) != d.label(i) {
                    (weight, weight)
                } else {
                    (0.0, weight)
                }
            })
            .reduce(|| (0.0, 0.0), |x, y| (x.0 + y.0, x.1 + y.1));
        if total > 0.0 {
            wrong / total
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ForestConfig;
    use crate::core::types::AttributeKind;
    use crate::dataset::TabularDataset;
    use ndarray::Array2;
    use std::sync::Arc;

    /// Nine numeric attributes plus a binary class; only attribute 0 is
    /// informative.
    fn wide_dataset(n: usize) -> Arc<TabularDataset> {
        let num_attributes = 10;
        let mut columns = Array2::<f64>::zeros((num_attributes, n));
        for i in 0..n {
            let class = (i % 2) as f64;
            columns[[0, i]] = class * 10.0 + (i / 2) as f64 * 0.1;
            for a in 1..9 {
                // Deterministic noise, uncorrelated with the class.
                columns[[a, i]] = ((i * 7 + a * 13) % 23) as f64;
            }
            columns[[9, i]] = class;
        }
        let mut kinds = vec![AttributeKind::Numeric; 9];
        kinds.push(AttributeKind::Categorical(2));
        Arc::new(TabularDataset::from_columns(columns, kinds, 9, None).unwrap())
    }

    #[test]
    fn test_oob_error_separable_is_low() {
        let forest = Forest::train(
            wide_dataset(60),
            ForestConfig::builder()
                .num_trees(30)
                .seed(4)
                .num_features_per_tree(4)
                .build()
                .unwrap(),
        )
        .unwrap();
        let err = forest.oob_error();
        assert!((0.0..=1.0).contains(&err));
        assert!(err < 0.4, "out-of-bag error {err} unexpectedly high");
        // Cached value is stable.
        assert_eq!(forest.oob_error(), err);
    }

    #[test]
    fn test_feature_importances_shape_and_class_entry() {
        let forest = Forest::train(
            wide_dataset(60),
            ForestConfig::builder()
                .num_trees(30)
                .seed(4)
                .num_features_per_tree(4)
                .compute_importances(true)
                .build()
                .unwrap(),
        )
        .unwrap();
        let importances = forest.feature_importances();
        assert_eq!(importances.len(), 10);
        assert!(importances[9].is_nan());
        for &imp in &importances[..9] {
            assert!(imp.is_finite());
        }
        // Scrambling the only informative attribute must hurt.
        assert!(importances[0] > 0.0);
    }

    #[test]
    fn test_dropout_importances_with_adequate_coverage() {
        let forest = Forest::train(
            wide_dataset(60),
            ForestConfig::builder()
                .num_trees(40)
                .seed(4)
                .num_features_per_tree(4)
                .min_trees_per_group(2)
                .compute_dropout_importance(true)
                .build()
                .unwrap(),
        )
        .unwrap();
        let importances = forest.dropout_importances().unwrap();
        assert_eq!(importances.len(), 10);
        assert!(importances[9].is_nan());
        for &imp in &importances[..9] {
            assert!(imp.is_finite());
        }
    }

    #[test]
    fn test_dropout_rejects_insufficient_coverage() {
        // Two attributes total: every tree sees the single predictive
        // attribute, so the expected-coverage check fails at training.
        let mut columns = Array2::<f64>::zeros((2, 30));
        for i in 0..30 {
            columns[[0, i]] = i as f64;
            columns[[1, i]] = (i % 2) as f64;
        }
        let data = Arc::new(
            TabularDataset::from_columns(
                columns,
                vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
                1,
                None,
            )
            .unwrap(),
        );
        let err = Forest::train(
            data,
            ForestConfig::builder()
                .num_trees(15)
                .compute_dropout_importance(true)
                .build()
                .unwrap(),
        )
        .unwrap_err();
        assert!(matches!(err, ForestError::InsufficientTreeCoverage { .. }));
    }

    #[test]
    fn test_interactions_matrix_shape() {
        let forest = Forest::train(
            wide_dataset(60),
            ForestConfig::builder()
                .num_trees(40)
                .seed(4)
                .min_trees_per_group(2)
                .compute_interactions(true)
                .build()
                .unwrap(),
        )
        .unwrap();
        let matrix = forest.interactions().unwrap();
        assert_eq!(matrix.dim(), (10, 10));
        for a in 0..10 {
            assert!(matrix[[a, a]].is_nan());
            assert!(matrix[[a, 9]].is_nan());
            assert!(matrix[[9, a]].is_nan());
        }
        for a in 0..9 {
            for b in 0..9 {
                let x = matrix[[a, b]];
                let y = matrix[[b, a]];
                assert!(x.is_nan() == y.is_nan());
                if x.is_finite() {
                    assert_eq!(x, y);
                }
            }
        }
    }

    #[test]
    fn test_expected_coverage_formulas() {
        let params = ResolvedParams {
            num_trees: 40,
            seed: 1,
            num_threads: 1,
            max_depth: 0,
            k_value: 2,
            num_features_per_tree: 3,
            min_trees_per_group: 2,
        };
        assert!(check_expected_coverage(&params, 6).is_ok());

        let too_few = ResolvedParams {
            num_features_per_tree: 1,
            ..params.clone()
        };
        assert!(check_expected_coverage(&too_few, 6).is_err());

        let too_many = ResolvedParams {
            num_features_per_tree: 6,
            ..params
        };
        assert!(check_expected_coverage(&too_many, 6).is_err());
    }
}
