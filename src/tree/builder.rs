//! Recursive binary tree induction over a resampled dataset view.
//!
//! The builder walks index ranges of the view's in-bag sorted arrays,
//! drawing attributes without replacement from a shrinking window and
//! keeping the best split seen so far. Split evaluation moves weight
//! incrementally between two class-distribution accumulators instead of
//! rescanning, and the chosen split physically partitions every sorted
//! array in lockstep so all of them stay mutually consistent down the
//! recursion. Scratch buffers are owned per builder, one builder per
//! tree-build task, so concurrent trees never share mutable state.

use crate::core::constants::{
    FALLBACK_STRATEGY_THRESHOLD, MIN_LEAF_SIZE, SENSIBLE_GAIN_EPSILON, WEIGHT_EPSILON,
};
use crate::core::error::{ForestError, Result};
use crate::core::types::{AttributeIndex, SplitValue};
use crate::dataset::view::DatasetView;
use crate::tree::criteria::{entropy_conditioned_on_rows, entropy_over_columns};
use crate::tree::fallback::FallbackBuilder;
use crate::tree::node::{Tree, TreeNode};
use rand::Rng;

/// Growth strategy chosen per subtree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum NodeStrategy {
    /// Randomized-attribute split search over the sorted arrays.
    Fast,
    /// Plain exhaustive decision-tree induction over the subset.
    Fallback,
}

/// Builds one decision tree from a dataset view.
pub(crate) struct TreeBuilder<'a, 'v, R: Rng> {
    view: &'v mut DatasetView<'a>,
    rng: &'v mut R,
    k_value: usize,
    max_depth: usize,
    num_classes: usize,
    /// Contingency table of the attribute under evaluation ("dist").
    temp_dist: [Vec<f64>; 2],
    /// Running accumulators for the incremental scan ("currDist").
    temp_curr: [Vec<f64>; 2],
    temp_props: [f64; 2],
    num_nodes: usize,
}

impl<'a, 'v, R: Rng> TreeBuilder<'a, 'v, R> {
    pub(crate) fn new(
        view: &'v mut DatasetView<'a>,
        rng: &'v mut R,
        k_value: usize,
        max_depth: usize,
    ) -> Self {
        let num_classes = view.base().num_classes();
        TreeBuilder {
            view,
            rng,
            k_value,
            max_depth,
            num_classes,
            temp_dist: [vec![0.0; num_classes], vec![0.0; num_classes]],
            temp_curr: [vec![0.0; num_classes], vec![0.0; num_classes]],
            temp_props: [0.0; 2],
            num_nodes: 0,
        }
    }

    /// Grow the tree and return it together with its node count.
    pub(crate) fn build(mut self) -> Result<(Tree, usize)> {
        let base = self.view.base();
        let mut class_probs = vec![0.0; self.num_classes];
        for i in 0..base.num_instances() {
            class_probs[base.label(i)] += self.view.weights[i];
        }

        let selected = self.view.selected_attributes.clone();
        let mut window = selected.clone();

        let root = match self.strategy(self.view.num_in_bag) {
            NodeStrategy::Fast => {
                let end = self.view.num_in_bag;
                self.build_node(0, end, class_probs, &mut window, 0)?
            }
            NodeStrategy::Fallback => {
                let in_bag: Vec<u32> = (0..base.num_instances() as u32)
                    .filter(|&i| self.view.in_bag[i as usize])
                    .collect();
                self.build_fallback(in_bag, class_probs, 0)
            }
        };

        let num_nodes = self.num_nodes;
        Ok((Tree::new(root, selected), num_nodes))
    }

    /// Decide the growth strategy for a branch of `n` instances. The
    /// comparison formula is fixed; the threshold constant is the
    /// near-disabled safety valve described in `core::constants`.
    fn strategy(&self, n: usize) -> NodeStrategy {
        if n == 0 {
            return NodeStrategy::Fast;
        }
        let k = self.k_value as f64;
        let subset = self.view.selected_attributes.len() as f64;
        if k * (n as f64).log2() / (k + subset) > FALLBACK_STRATEGY_THRESHOLD {
            NodeStrategy::Fast
        } else {
            NodeStrategy::Fallback
        }
    }

    fn build_fallback(&mut self, instances: Vec<u32>, class_probs: Vec<f64>, depth: usize) -> TreeNode {
        let mut fb = FallbackBuilder::new(
            self.view.base(),
            &self.view.selected_attributes,
            &self.view.weights,
            self.rng,
            self.max_depth,
        );
        let node = fb.build(instances, class_probs, depth);
        self.num_nodes += fb.num_nodes();
        node
    }

    /// Normalize a class-weight vector into a leaf distribution by
    /// dividing with the number of instances that reached the leaf.
    fn leaf(mut class_probs: Vec<f64>, len: usize) -> TreeNode {
        if len != 0 {
            for w in class_probs.iter_mut() {
                *w /= len as f64;
            }
        }
        TreeNode::Leaf {
            distribution: class_probs,
        }
    }

    /// Recursively grow the subtree over the half-open range
    /// `[start, end)` of the view's sorted arrays.
    fn build_node(
        &mut self,
        start: usize,
        end: usize,
        class_probs: Vec<f64>,
        window: &mut [AttributeIndex],
        depth: usize,
    ) -> Result<TreeNode> {
        self.num_nodes += 1;
        let len = end - start;

        let total: f64 = class_probs.iter().sum();
        let max_class = class_probs.iter().cloned().fold(f64::MIN, f64::max);
        let pure = (total - max_class).abs() < WEIGHT_EPSILON;
        if len < MIN_LEAF_SIZE.max(2)
            || pure
            || (self.max_depth > 0 && depth >= self.max_depth)
        {
            return Ok(Self::leaf(class_probs, len));
        }

        let mut best_dist = [vec![0.0; self.num_classes], vec![0.0; self.num_classes]];
        let mut best_props = [0.0f64; 2];
        let mut best_split = f64::NEG_INFINITY;
        let mut best_att: Option<AttributeIndex> = None;

        let mut window_size = window.len();
        let mut quota = self.k_value;
        let mut sensible_split_found = false;
        let mut prior: Option<f64> = None;
        // Negated conditioned entropy of the incumbent; larger is better.
        let mut best_score = f64::NEG_INFINITY;

        // Draw attributes without replacement until the quota is spent AND
        // a sensible split exists, or the window runs dry.
        while window_size > 0 && (quota > 0 || !sensible_split_found) {
            quota = quota.saturating_sub(1);

            let chosen = self.rng.gen_range(0..window_size);
            let att = window[chosen];
            window[chosen] = window[window_size - 1];
            window[window_size - 1] = att;
            window_size -= 1;

            let candidate = self.evaluate_attribute(
                att,
                start,
                end,
                &class_probs,
                best_score,
                &mut best_props,
                &mut best_dist,
            );
            let Some(split) = candidate else {
                // No improvement over the incumbent; best_dist unchanged.
                continue;
            };
            best_split = split;
            best_att = Some(att);

            // Same for every attribute in this range, compute only once.
            let prior_entropy = *prior
                .get_or_insert_with(|| entropy_over_columns([&best_dist[0], &best_dist[1]]));

            let neg_posterior = -entropy_conditioned_on_rows([&best_dist[0], &best_dist[1]]);
            if neg_posterior > best_score {
                best_score = neg_posterior;
            } else {
                // The incumbent's score may never regress; continuing
                // would grow a statistically meaningless tree.
                return Err(ForestError::internal(
                    "conditioned entropy regressed after incumbent update in split search",
                ));
            }

            if prior_entropy + neg_posterior > SENSIBLE_GAIN_EPSILON {
                sensible_split_found = true;
            }
        }

        if !sensible_split_found {
            return Ok(Self::leaf(class_probs, len));
        }

        let attribute = best_att.expect("a sensible split implies an incumbent attribute");
        let props = best_props;
        let mid = self.partition_range(attribute, best_split, start, end, &props, &mut best_dist);

        let split = if self.view.base().is_categorical(attribute) {
            SplitValue::Category(best_split as u32)
        } else {
            SplitValue::Numeric(best_split)
        };

        let mut children: Vec<TreeNode> = Vec::with_capacity(2);
        for (i, (child_start, child_end)) in [(start, mid), (mid, end)].into_iter().enumerate() {
            let branch_probs = std::mem::take(&mut best_dist[i]);
            let child_len = child_end - child_start;
            let child = if child_len == 0 {
                // Empty branch: only possible for multi-category nominal
                // splits. Becomes a leaf holding the parent's distribution.
                self.num_nodes += 1;
                Self::leaf(class_probs.clone(), len)
            } else {
                match self.strategy(child_len) {
                    NodeStrategy::Fast => {
                        self.build_node(child_start, child_end, branch_probs, window, depth + 1)?
                    }
                    NodeStrategy::Fallback => {
                        let enum_att = self.view.atts_in_sorted[0];
                        let instances =
                            self.view.sorted_indices[enum_att][child_start..child_end].to_vec();
                        self.build_fallback(instances, branch_probs, depth + 1)
                    }
                }
            };
            children.push(child);
        }
        let child1 = children.pop().expect("two children were built");
        let child0 = children.pop().expect("two children were built");

        Ok(TreeNode::Internal {
            attribute,
            split,
            props,
            children: Box::new([child0, child1]),
        })
    }

    /// Evaluate one attribute against the incumbent split.
    ///
    /// Fills the scratch contingency table for the attribute's best split
    /// point; if its (negated) conditioned entropy beats `best_score`,
    /// overwrites `best_props`/`best_dist` and returns the split value,
    /// otherwise returns `None` and leaves the incumbent untouched.
    /// `None` is also the sentinel for "no usable split" (for example an
    /// all-missing attribute range).
    #[allow(clippy::too_many_arguments)]
    fn evaluate_attribute(
        &mut self,
        att: AttributeIndex,
        start: usize,
        end: usize,
        class_probs: &[f64],
        best_score: f64,
        best_props: &mut [f64; 2],
        best_dist: &mut [Vec<f64>; 2],
    ) -> Option<f64> {
        let base = self.view.base();
        let num_classes = self.num_classes;
        let DatasetView {
            sorted_indices,
            missing_scratch,
            category_class_weights,
            weights,
            atts_in_sorted,
            ..
        } = &mut *self.view;
        let dist = &mut self.temp_dist;
        let curr = &mut self.temp_curr;
        let props = &mut self.temp_props;

        let len = end - start;
        let mut split_point = f64::NEG_INFINITY;
        missing_scratch.clear();
        curr[1].copy_from_slice(class_probs);

        if base.is_categorical(att) {
            let num_categories = base.num_categories(att);
            // Any kept sorted array enumerates the range's instances.
            let enumerator = &sorted_indices[atts_in_sorted[0]];
            let mut best_category = 0usize;

            if num_categories <= 2 {
                // Trivial binary split: category 0 goes to branch 0.
                dist[0].fill(0.0);
                dist[1].fill(0.0);
                for &inst in &enumerator[start..end] {
                    let inst = inst as usize;
                    if base.is_missing(att, inst) {
                        missing_scratch.push(inst as u32);
                    } else {
                        let category = base.value(att, inst) as usize;
                        dist[category][base.label(inst)] += weights[inst];
                    }
                }
                if missing_scratch.len() == len {
                    return None;
                }
            } else {
                // One level vs. rest: weigh up every category once, then
                // transfer weight between candidate tables incrementally.
                for row in category_class_weights[..num_categories].iter_mut() {
                    row.fill(0.0);
                }
                for &inst in &enumerator[start..end] {
                    let inst = inst as usize;
                    if base.is_missing(att, inst) {
                        curr[1][base.label(inst)] -= weights[inst];
                        missing_scratch.push(inst as u32);
                    } else {
                        let category = base.value(att, inst) as usize;
                        category_class_weights[category][base.label(inst)] += weights[inst];
                    }
                }
                if missing_scratch.len() == len {
                    return None;
                }

                // curr[1] now holds the full non-missing distribution.
                dist[1].copy_from_slice(&curr[1]);

                for c in 0..num_classes {
                    curr[1][c] -= category_class_weights[0][c];
                }
                let mut best_val =
                    -entropy_conditioned_on_rows([&category_class_weights[0], &curr[1]]);
                for category in 1..num_categories {
                    for c in 0..num_classes {
                        curr[1][c] += category_class_weights[category - 1][c];
                        curr[1][c] -= category_class_weights[category][c];
                    }
                    let val =
                        -entropy_conditioned_on_rows([&category_class_weights[category], &curr[1]]);
                    if val > best_val {
                        best_val = val;
                        best_category = category;
                    }
                }

                for c in 0..num_classes {
                    dist[0][c] = category_class_weights[best_category][c];
                    dist[1][c] -= category_class_weights[best_category][c];
                }
            }

            split_point = best_category as f64;
            counts_to_freqs(dist, props);
            // Distribute the missing-valued weight proportionally.
            for &inst in missing_scratch.iter() {
                let inst = inst as usize;
                let c = base.label(inst);
                dist[0][c] += props[0] * weights[inst];
                dist[1][c] += props[1] * weights[inst];
            }
        } else {
            let sorted = &sorted_indices[att];
            curr[0].fill(0.0);

            // Missing values sort last; peel them off the tail and take
            // their weight out of the "at/after" accumulator.
            let mut nonmissing_end = end;
            while nonmissing_end > start {
                let inst = sorted[nonmissing_end - 1] as usize;
                if base.is_missing(att, inst) {
                    curr[1][base.label(inst)] -= weights[inst];
                    nonmissing_end -= 1;
                } else {
                    break;
                }
            }
            if nonmissing_end <= start {
                // Only missing values: cannot split on this attribute.
                return None;
            }

            dist[0].copy_from_slice(&curr[0]);
            dist[1].copy_from_slice(&curr[1]);

            let mut best_val = f64::NEG_INFINITY;
            let mut best_i = start;
            for i in (start + 1)..nonmissing_end {
                let inst = sorted[i] as usize;
                let prev = sorted[i - 1] as usize;
                curr[0][base.label(prev)] += weights[prev];
                curr[1][base.label(prev)] -= weights[prev];

                // A split point is legal only between two consecutive
                // instances of different class and different value.
                if base.label(prev) != base.label(inst)
                    && base.value(att, inst) > base.value(att, prev)
                {
                    let val = -entropy_conditioned_on_rows([&curr[0], &curr[1]]);
                    if val > best_val {
                        best_val = val;
                        best_i = i;
                    }
                }
            }

            if best_i > start {
                let before = sorted[best_i - 1] as usize;
                let after = sorted[best_i] as usize;
                split_point =
                    (base.value(att, after) as f64 + base.value(att, before) as f64) / 2.0;
                // Rebuild the exact table for the chosen split point from
                // the all-in-branch-1 default.
                for &inst in &sorted[start..best_i] {
                    let inst = inst as usize;
                    dist[0][base.label(inst)] += weights[inst];
                    dist[1][base.label(inst)] -= weights[inst];
                }
            }

            counts_to_freqs(dist, props);
            for &inst in &sorted[nonmissing_end..end] {
                let inst = inst as usize;
                let c = base.label(inst);
                dist[0][c] += props[0] * weights[inst];
                dist[1][c] += props[1] * weights[inst];
            }
        }

        // Redistributing missing values changed the table, so the score is
        // recomputed here; the incumbent is replaced only on a strict win.
        let score = -entropy_conditioned_on_rows([&dist[0], &dist[1]]);
        if score > best_score && split_point > f64::NEG_INFINITY {
            best_dist[0].copy_from_slice(&dist[0]);
            best_dist[1].copy_from_slice(&dist[1]);
            *best_props = *props;
            Some(split_point)
        } else {
            None
        }
    }

    /// Physically partition `[start, end)` of every kept sorted array so
    /// branch-0 instances form a contiguous prefix. Missing-valued
    /// instances are assigned stochastically by `props` first, so the
    /// partition itself only ever sees fully-assigned branch labels.
    /// Overwrites `dist` with the exact post-assignment branch counts and
    /// returns the first index of branch 1.
    fn partition_range(
        &mut self,
        att: AttributeIndex,
        split_point: f64,
        start: usize,
        end: usize,
        props: &[f64; 2],
        dist: &mut [Vec<f64>; 2],
    ) -> usize {
        let base = self.view.base();
        let categorical = base.is_categorical(att);
        let rng = &mut *self.rng;
        let DatasetView {
            sorted_indices,
            what_goes_where,
            weights,
            atts_in_sorted,
            ..
        } = &mut *self.view;

        dist[0].fill(0.0);
        dist[1].fill(0.0);
        let mut counts = [0usize; 2];
        let enum_att = if categorical { atts_in_sorted[0] } else { att };

        for j in start..end {
            let inst = sorted_indices[enum_att][j] as usize;
            let branch = if base.is_missing(att, inst) {
                // Bigger branches get a proportionally higher chance.
                usize::from(rng.gen::<f64>() > props[0])
            } else if categorical {
                usize::from(base.value(att, inst) as usize != split_point as usize)
            } else {
                usize::from((base.value(att, inst) as f64) >= split_point)
            };
            what_goes_where[inst] = branch as u8;
            dist[branch][base.label(inst)] += weights[inst];
            counts[branch] += 1;
        }

        // Stable partition, applied to every array so they stay mutually
        // consistent.
        let mut below = vec![0u32; end - start];
        for &a in atts_in_sorted.iter() {
            let arr = &mut sorted_indices[a];
            let mut above_at = start;
            let mut below_at = 0;
            for j in start..end {
                let inst = arr[j];
                if what_goes_where[inst as usize] == 0 {
                    arr[above_at] = inst;
                    above_at += 1;
                } else {
                    below[below_at] = inst;
                    below_at += 1;
                }
            }
            arr[start + counts[0]..end].copy_from_slice(&below[..counts[1]]);
        }

        start + counts[0]
    }
}

/// Convert branch class counts into branch-size fractions summing to 1;
/// a zero-weight table falls back to an even split.
fn counts_to_freqs(dist: &[Vec<f64>; 2], props: &mut [f64; 2]) {
    props[0] = dist[0].iter().sum();
    props[1] = dist[1].iter().sum();
    let total = props[0] + props[1];
    if total.abs() < WEIGHT_EPSILON {
        props[0] = 0.5;
        props[1] = 0.5;
    } else {
        props[0] /= total;
        props[1] /= total;
    }
}
