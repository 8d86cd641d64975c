//! Per-tree dataset views.
//!
//! A view owns everything a tree-build task mutates: the bootstrap
//! weights, the in-bag bitmap, the attribute subset, sorted-index arrays
//! restricted to in-bag instances, and the scratch buffers the recursive
//! split search reuses. The base dataset is shared read-only, which is
//! what makes parallel tree construction race-free without locking.

use crate::core::types::{AttributeIndex, ClassIndex, InstanceIndex};
use crate::dataset::TabularDataset;

/// A resampled, attribute-subset view of a [`TabularDataset`].
#[derive(Debug)]
pub struct DatasetView<'a> {
    pub(crate) base: &'a TabularDataset,
    /// Per-tree instance weights (bootstrap multiples of the base weight).
    pub(crate) weights: Vec<f64>,
    /// In-bag membership over the full original instance set.
    pub(crate) in_bag: Vec<bool>,
    /// Number of distinct in-bag instances.
    pub(crate) num_in_bag: usize,
    /// The attribute subset this tree is permitted to use.
    pub(crate) selected_attributes: Vec<AttributeIndex>,
    /// Attributes that own an in-bag sorted array: the numeric members of
    /// the subset, or a single categorical stand-in when the subset is
    /// all-categorical (its order then only enumerates in-bag instances).
    pub(crate) atts_in_sorted: Vec<AttributeIndex>,
    /// In-bag-restricted ascending permutations, indexed by attribute.
    /// Empty for attributes outside `atts_in_sorted`.
    pub(crate) sorted_indices: Vec<Vec<u32>>,
    /// Branch assignment per original instance during a partition step.
    pub(crate) what_goes_where: Vec<u8>,
    /// Indices of instances with a missing value for the attribute under
    /// evaluation.
    pub(crate) missing_scratch: Vec<u32>,
    /// Category-by-class weight matrix reused by the one-vs-rest search.
    pub(crate) category_class_weights: Vec<Vec<f64>>,
}

impl<'a> DatasetView<'a> {
    pub(crate) fn new(
        base: &'a TabularDataset,
        weights: Vec<f64>,
        in_bag: Vec<bool>,
        num_in_bag: usize,
        selected_attributes: Vec<AttributeIndex>,
    ) -> Self {
        let num_attributes = base.num_attributes();
        let num_instances = base.num_instances();
        DatasetView {
            base,
            weights,
            in_bag,
            num_in_bag,
            selected_attributes,
            atts_in_sorted: Vec::new(),
            sorted_indices: vec![Vec::new(); num_attributes],
            what_goes_where: vec![0; num_instances],
            missing_scratch: Vec::new(),
            category_class_weights: Vec::new(),
        }
    }

    /// Build the in-bag sorted-index arrays by filtering the base
    /// dataset's permutations; the base arrays are never touched.
    pub(crate) fn apply_in_bag_sort(&mut self) {
        let base = self.base;
        let all_categorical = self
            .selected_attributes
            .iter()
            .all(|&a| base.is_categorical(a));
        let mut atts_in_sorted = Vec::new();
        let mut max_categories = 0usize;

        for &att in &self.selected_attributes {
            if base.is_categorical(att) {
                max_categories = max_categories.max(base.num_categories(att));
                // At most one categorical attribute enters the sorted set,
                // and only when there is no numeric attribute to stand in.
                if !(all_categorical && att == self.selected_attributes[0]) {
                    continue;
                }
            }
            let mut order = Vec::with_capacity(self.num_in_bag);
            for &idx in base.sorted_order(att) {
                if self.in_bag[idx as usize] {
                    order.push(idx);
                }
            }
            self.sorted_indices[att] = order;
            atts_in_sorted.push(att);
        }

        self.atts_in_sorted = atts_in_sorted;
        self.missing_scratch = Vec::with_capacity(self.num_in_bag);
        self.category_class_weights = vec![vec![0.0; base.num_classes()]; max_categories];
    }

    /// The shared base dataset.
    pub fn base(&self) -> &'a TabularDataset {
        self.base
    }

    /// Per-tree instance weights.
    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    /// In-bag membership bitmap over the original instance set.
    pub fn in_bag(&self) -> &[bool] {
        &self.in_bag
    }

    /// Number of distinct in-bag instances.
    pub fn num_in_bag(&self) -> usize {
        self.num_in_bag
    }

    /// The tree's permitted attribute subset.
    pub fn selected_attributes(&self) -> &[AttributeIndex] {
        &self.selected_attributes
    }

    /// Class label of an instance.
    pub fn label(&self, inst: InstanceIndex) -> ClassIndex {
        self.base.label(inst)
    }

    /// Per-tree weight of an instance.
    pub fn weight(&self, inst: InstanceIndex) -> f64 {
        self.weights[inst]
    }

    /// Consume the view, keeping only the in-bag bitmap for out-of-bag
    /// bookkeeping.
    pub(crate) fn into_in_bag(self) -> Vec<bool> {
        self.in_bag
    }

    /// A view with every instance in bag and the given attribute subset;
    /// used by tests that need deterministic tree construction.
    #[cfg(test)]
    pub(crate) fn full(base: &'a TabularDataset, selected: Vec<AttributeIndex>) -> Self {
        let n = base.num_instances();
        let weights = base.weights().to_vec();
        let mut view = DatasetView::new(base, weights, vec![true; n], n, selected);
        view.apply_in_bag_sort();
        view
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AttributeKind;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn dataset() -> TabularDataset {
        let columns = array![
            [5.0, 1.0, 4.0, 2.0, 3.0, 0.0],
            [0.0, 1.0, 2.0, 0.0, 1.0, 2.0],
            [0.0, 0.0, 1.0, 1.0, 0.0, 1.0],
        ];
        TabularDataset::from_columns(
            columns,
            vec![
                AttributeKind::Numeric,
                AttributeKind::Categorical(3),
                AttributeKind::Categorical(2),
            ],
            2,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_in_bag_sort_is_restriction_of_base_order() {
        let data = dataset();
        let mut rng = StdRng::seed_from_u64(99);
        let view = data.resample(&mut rng, 2).unwrap();
        for &att in &view.atts_in_sorted {
            let restricted: Vec<u32> = data
                .sorted_order(att)
                .iter()
                .copied()
                .filter(|&i| view.in_bag[i as usize])
                .collect();
            assert_eq!(view.sorted_indices[att], restricted);
            assert_eq!(view.sorted_indices[att].len(), view.num_in_bag);
        }
    }

    #[test]
    fn test_all_categorical_subset_keeps_one_stand_in() {
        let data = dataset();
        let mut view = DatasetView::full(&data, vec![1]);
        view.apply_in_bag_sort();
        assert_eq!(view.atts_in_sorted, vec![1]);
        assert_eq!(view.sorted_indices[1].len(), data.num_instances());
        // Scratch matrix sized by the largest selected cardinality.
        assert_eq!(view.category_class_weights.len(), 3);
    }

    #[test]
    fn test_numeric_subset_excludes_categorical_from_sorted() {
        let data = dataset();
        let view = DatasetView::full(&data, vec![0, 1]);
        assert_eq!(view.atts_in_sorted, vec![0]);
        assert!(view.sorted_indices[1].is_empty());
    }
}
