//! Columnar dataset storage for forest training.
//!
//! The feature matrix is stored indexed by attribute first and instance
//! second, so the sequential scans performed during split search touch
//! contiguous memory. Missing values are encoded with the [`MISSING`]
//! sentinel, which sorts to the end of every per-attribute ascending
//! permutation. The permutations are computed once over the full dataset;
//! per-tree views never mutate them.

use crate::core::error::{ForestError, Result};
use crate::core::types::{AttributeIndex, AttributeKind, ClassIndex, InstanceIndex, MISSING};
use crate::dataset::view::DatasetView;
use ndarray::Array2;
use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

/// Immutable tabular dataset with per-instance weights and a nominal class.
///
/// Constructed once from raw columns; all trees share it read-only.
#[derive(Debug, Clone)]
pub struct TabularDataset {
    /// Feature matrix indexed `[attribute, instance]`.
    values: Array2<f32>,
    /// Declared kind of every attribute.
    kinds: Vec<AttributeKind>,
    /// Index of the class attribute.
    class_index: AttributeIndex,
    /// Number of class categories.
    num_classes: usize,
    /// Class label of every instance.
    labels: Vec<ClassIndex>,
    /// Weight of every instance.
    weights: Vec<f64>,
    /// Ascending permutation of instance indices per attribute, missing
    /// values last, ties broken by original index. Empty for the class.
    sorted_indices: Vec<Vec<u32>>,
}

impl TabularDataset {
    /// Build a dataset from raw columns.
    ///
    /// `columns` is indexed `[attribute, instance]` with `f64::NAN` marking
    /// a missing value. Instances whose class value is missing are dropped.
    /// Only numeric and nominal attribute kinds are supported; any other
    /// kind fails with [`ForestError::UnsupportedAttributeKind`].
    pub fn from_columns(
        columns: Array2<f64>,
        kinds: Vec<AttributeKind>,
        class_index: AttributeIndex,
        weights: Option<Vec<f64>>,
    ) -> Result<Self> {
        let num_attributes = columns.nrows();
        if num_attributes == 0 || columns.ncols() == 0 {
            return Err(ForestError::dataset("dataset must not be empty"));
        }
        if kinds.len() != num_attributes {
            return Err(ForestError::dataset(format!(
                "expected {} attribute kinds, got {}",
                num_attributes,
                kinds.len()
            )));
        }
        if class_index >= num_attributes {
            return Err(ForestError::dataset(format!(
                "class index {} out of range for {} attributes",
                class_index, num_attributes
            )));
        }
        for (index, kind) in kinds.iter().enumerate() {
            if !kind.is_numeric() && !kind.is_categorical() {
                return Err(ForestError::UnsupportedAttributeKind { index, kind: *kind });
            }
        }
        let num_classes = match kinds[class_index] {
            AttributeKind::Categorical(n) if n >= 1 => n as usize,
            _ => {
                return Err(ForestError::dataset(
                    "class attribute must be nominal with at least one category",
                ))
            }
        };

        // Keep only instances with a known class label.
        let class_row = columns.row(class_index);
        let kept: Vec<InstanceIndex> = (0..columns.ncols())
            .filter(|&i| !class_row[i].is_nan())
            .collect();
        if kept.is_empty() {
            return Err(ForestError::dataset("all instances have a missing class"));
        }
        let num_instances = kept.len();

        let raw_weights = match weights {
            Some(w) => {
                if w.len() != columns.ncols() {
                    return Err(ForestError::dataset(format!(
                        "expected {} instance weights, got {}",
                        columns.ncols(),
                        w.len()
                    )));
                }
                w
            }
            None => vec![1.0; columns.ncols()],
        };

        let mut values = Array2::<f32>::zeros((num_attributes, num_instances));
        for a in 0..num_attributes {
            let src = columns.row(a);
            for (i, &orig) in kept.iter().enumerate() {
                let v = src[orig];
                values[[a, i]] = if v.is_nan() { MISSING } else { v as f32 };
            }
            if let AttributeKind::Categorical(n) = kinds[a] {
                for i in 0..num_instances {
                    let v = values[[a, i]];
                    if v != MISSING && (v < 0.0 || v >= n as f32 || v.fract() != 0.0) {
                        return Err(ForestError::dataset(format!(
                            "attribute {} is nominal with {} categories but holds value {}",
                            a, n, v
                        )));
                    }
                }
            }
        }

        let mut labels = Vec::with_capacity(num_instances);
        let mut inst_weights = Vec::with_capacity(num_instances);
        for (i, &orig) in kept.iter().enumerate() {
            labels.push(values[[class_index, i]] as ClassIndex);
            inst_weights.push(raw_weights[orig]);
        }

        let mut sorted_indices = vec![Vec::new(); num_attributes];
        for a in 0..num_attributes {
            if a == class_index {
                continue;
            }
            let mut order: Vec<u32> = (0..num_instances as u32).collect();
            // Stable sort keeps ties in original index order; MISSING is
            // f32::MAX and lands at the end.
            order.sort_by(|&x, &y| {
                values[[a, x as usize]]
                    .partial_cmp(&values[[a, y as usize]])
                    .expect("missing values are encoded as a finite sentinel")
            });
            sorted_indices[a] = order;
        }

        Ok(TabularDataset {
            values,
            kinds,
            class_index,
            num_classes,
            labels,
            weights: inst_weights,
            sorted_indices,
        })
    }

    /// Number of instances.
    pub fn num_instances(&self) -> usize {
        self.labels.len()
    }

    /// Number of attributes, class attribute included.
    pub fn num_attributes(&self) -> usize {
        self.kinds.len()
    }

    /// Number of class categories.
    pub fn num_classes(&self) -> usize {
        self.num_classes
    }

    /// Index of the class attribute.
    pub fn class_index(&self) -> AttributeIndex {
        self.class_index
    }

    /// Declared kind of an attribute.
    pub fn kind(&self, att: AttributeIndex) -> AttributeKind {
        self.kinds[att]
    }

    /// Is the given attribute nominal?
    pub fn is_categorical(&self, att: AttributeIndex) -> bool {
        self.kinds[att].is_categorical()
    }

    /// Number of categories of a nominal attribute (0 for numeric).
    pub fn num_categories(&self, att: AttributeIndex) -> usize {
        self.kinds[att].num_categories().unwrap_or(0) as usize
    }

    /// Stored value of an attribute/instance pair (may be the sentinel).
    pub fn value(&self, att: AttributeIndex, inst: InstanceIndex) -> f32 {
        self.values[[att, inst]]
    }

    /// Does the given attribute/instance pair hold a missing value?
    pub fn is_missing(&self, att: AttributeIndex, inst: InstanceIndex) -> bool {
        self.values[[att, inst]] == MISSING
    }

    /// Class label of an instance.
    pub fn label(&self, inst: InstanceIndex) -> ClassIndex {
        self.labels[inst]
    }

    /// Weight of an instance.
    pub fn weight(&self, inst: InstanceIndex) -> f64 {
        self.weights[inst]
    }

    /// All instance weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// Full ascending sort order for an attribute (empty for the class).
    pub fn sorted_order(&self, att: AttributeIndex) -> &[u32] {
        &self.sorted_indices[att]
    }

    /// One raw value column, used by permutation importance to build a
    /// scrambled copy.
    pub(crate) fn column(&self, att: AttributeIndex) -> Vec<f32> {
        self.values.row(att).to_vec()
    }

    /// Global class-weight distribution, normalized to sum 1.
    pub(crate) fn class_distribution(&self) -> Vec<f64> {
        let mut dist = vec![0.0; self.num_classes];
        for i in 0..self.num_instances() {
            dist[self.labels[i]] += self.weights[i];
        }
        let total: f64 = dist.iter().sum();
        if total > 0.0 {
            for d in dist.iter_mut() {
                *d /= total;
            }
        }
        dist
    }

    /// Bootstrap-resample the dataset and select a per-tree attribute
    /// subset, producing the private view one tree trains on.
    ///
    /// Draws `num_instances` samples with replacement; duplicate draws
    /// accumulate into the instance's per-tree weight instead of creating
    /// duplicate rows. The attribute subset is drawn via a random
    /// permutation of all attribute indices, swapping the class attribute
    /// out if it lands inside the subset.
    pub fn resample<R: Rng>(
        &self,
        rng: &mut R,
        num_features_for_tree: usize,
    ) -> Result<DatasetView<'_>> {
        let n = self.num_instances();
        let a = self.num_attributes();
        if num_features_for_tree >= a {
            return Err(ForestError::InvalidFeatureCount {
                requested: num_features_for_tree,
                num_attributes: a,
            });
        }
        if num_features_for_tree == 0 {
            return Err(ForestError::InvalidFeatureCount {
                requested: 0,
                num_attributes: a,
            });
        }

        let bag_size = n;
        let mut weights = vec![0.0; n];
        let mut in_bag = vec![false; n];
        let mut num_in_bag = 0;
        for _ in 0..bag_size {
            let idx = rng.gen_range(0..n);
            weights[idx] += self.weights[idx];
            if !in_bag[idx] {
                num_in_bag += 1;
                in_bag[idx] = true;
            }
        }

        let mut perm: Vec<AttributeIndex> = (0..a).collect();
        perm.shuffle(rng);
        let mut selected = Vec::with_capacity(num_features_for_tree);
        for i in 0..num_features_for_tree {
            let mut att = perm[i];
            if att == self.class_index {
                // Swap the class attribute for the first excluded one.
                att = perm[num_features_for_tree];
            }
            selected.push(att);
        }

        let mut view = DatasetView::new(self, weights, in_bag, num_in_bag, selected);
        view.apply_in_bag_sort();
        Ok(view)
    }

    /// Produce a dataset-content-dependent seed by hashing one
    /// arbitrarily-chosen attribute's sort order together with the caller
    /// seed. Guarantees distinct, reproducible per-tree RNG streams.
    pub fn derived_seed(&self, seed: u64) -> u64 {
        use rand::SeedableRng;
        let mut hasher = DefaultHasher::new();
        if self.num_attributes() > 1 {
            // Hash an arbitrary non-class permutation; the class column
            // owns none.
            let mut r = rand::rngs::StdRng::seed_from_u64(seed);
            let mut att = r.gen_range(0..self.num_attributes() - 1);
            if att >= self.class_index {
                att += 1;
            }
            self.sorted_indices[att].hash(&mut hasher);
        } else {
            self.labels.hash(&mut hasher);
        }
        hasher.finish().wrapping_add(seed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn two_attribute_dataset() -> TabularDataset {
        // One numeric feature, one binary class.
        let columns = array![
            [4.0, 2.0, f64::NAN, 1.0, 3.0, 2.0],
            [0.0, 0.0, 1.0, 1.0, 0.0, 1.0],
        ];
        TabularDataset::from_columns(
            columns,
            vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
            1,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_construction_basics() {
        let data = two_attribute_dataset();
        assert_eq!(data.num_instances(), 6);
        assert_eq!(data.num_attributes(), 2);
        assert_eq!(data.num_classes(), 2);
        assert!(data.is_missing(0, 2));
        assert_eq!(data.label(3), 1);
    }

    #[test]
    fn test_sorted_order_with_missing_last() {
        let data = two_attribute_dataset();
        let order = data.sorted_order(0);
        // Values: [4, 2, MISSING, 1, 3, 2]; ascending with the duplicate 2s
        // tie-broken by index and the missing value last.
        assert_eq!(order, &[3, 1, 5, 4, 0, 2]);
        // The class attribute owns no permutation.
        assert!(data.sorted_order(1).is_empty());
    }

    #[test]
    fn test_unsupported_kind_rejected() {
        let columns = array![[1.0, 2.0], [0.0, 1.0]];
        let err = TabularDataset::from_columns(
            columns,
            vec![AttributeKind::Text, AttributeKind::Categorical(2)],
            1,
            None,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ForestError::UnsupportedAttributeKind { index: 0, .. }
        ));
    }

    #[test]
    fn test_missing_class_instances_dropped() {
        let columns = array![[1.0, 2.0, 3.0], [0.0, f64::NAN, 1.0]];
        let data = TabularDataset::from_columns(
            columns,
            vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
            1,
            None,
        )
        .unwrap();
        assert_eq!(data.num_instances(), 2);
        assert_eq!(data.label(0), 0);
        assert_eq!(data.label(1), 1);
    }

    #[test]
    fn test_resample_accumulates_weights() {
        let data = two_attribute_dataset();
        let mut rng = StdRng::seed_from_u64(7);
        let view = data.resample(&mut rng, 1).unwrap();
        // Total resampled weight equals bag_size draws of unit weight.
        let total: f64 = view.weights().iter().sum();
        assert!((total - data.num_instances() as f64).abs() < 1e-9);
        // Out-of-bag instances carry zero weight.
        for i in 0..data.num_instances() {
            if !view.in_bag()[i] {
                assert_eq!(view.weights()[i], 0.0);
            }
        }
        // The class attribute never enters the subset.
        assert!(!view.selected_attributes().contains(&1));
    }

    #[test]
    fn test_resample_rejects_feature_count() {
        let data = two_attribute_dataset();
        let mut rng = StdRng::seed_from_u64(7);
        assert!(matches!(
            data.resample(&mut rng, 2).unwrap_err(),
            ForestError::InvalidFeatureCount { .. }
        ));
    }

    #[test]
    fn test_derived_seed_reproducible_and_content_dependent() {
        let data = two_attribute_dataset();
        assert_eq!(data.derived_seed(42), data.derived_seed(42));
        assert_ne!(data.derived_seed(42), data.derived_seed(43));

        // A dataset with different content yields a different stream.
        let columns = array![[9.0, 8.0, 7.0, 6.0, 5.0, 4.0], [0.0, 0.0, 1.0, 1.0, 0.0, 1.0]];
        let other = TabularDataset::from_columns(
            columns,
            vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
            1,
            None,
        )
        .unwrap();
        assert_ne!(data.derived_seed(42), other.derived_seed(42));
    }

    #[test]
    fn test_class_distribution_weighted() {
        let columns = array![[1.0, 2.0, 3.0, 4.0], [0.0, 0.0, 1.0, 1.0]];
        let data = TabularDataset::from_columns(
            columns,
            vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
            1,
            Some(vec![1.0, 1.0, 1.0, 3.0]),
        )
        .unwrap();
        let dist = data.class_distribution();
        assert!((dist[0] - 2.0 / 6.0).abs() < 1e-12);
        assert!((dist[1] - 4.0 / 6.0).abs() < 1e-12);
    }
}
