//! Exhaustive decision-tree induction for branches where the randomized
//! search is predicted to be slower than a plain scan.
//!
//! Works from an explicit instance list instead of the shared sorted
//! arrays: every selected attribute is evaluated in full at every node.
//! Split scoring, leaf normalization and stochastic missing-value
//! routing match the randomized builder so both strategies grow
//! interchangeable subtrees.

use crate::core::constants::{MIN_LEAF_SIZE, SENSIBLE_GAIN_EPSILON, WEIGHT_EPSILON};
use crate::core::types::{AttributeIndex, SplitValue};
use crate::dataset::TabularDataset;
use crate::tree::criteria::{entropy_conditioned_on_rows, entropy_over_columns};
use crate::tree::node::TreeNode;
use rand::Rng;

pub(crate) struct FallbackBuilder<'a, 'r, R: Rng> {
    base: &'a TabularDataset,
    selected: &'r [AttributeIndex],
    weights: &'r [f64],
    rng: &'r mut R,
    max_depth: usize,
    num_nodes: usize,
}

struct Candidate {
    attribute: AttributeIndex,
    split: SplitValue,
    dist: [Vec<f64>; 2],
    props: [f64; 2],
    score: f64,
}

impl<'a, 'r, R: Rng> FallbackBuilder<'a, 'r, R> {
    pub(crate) fn new(
        base: &'a TabularDataset,
        selected: &'r [AttributeIndex],
        weights: &'r [f64],
        rng: &'r mut R,
        max_depth: usize,
    ) -> Self {
        FallbackBuilder {
            base,
            selected,
            weights,
            rng,
            max_depth,
            num_nodes: 0,
        }
    }

    pub(crate) fn num_nodes(&self) -> usize {
        self.num_nodes
    }

    pub(crate) fn build(
        &mut self,
        instances: Vec<u32>,
        class_probs: Vec<f64>,
        depth: usize,
    ) -> TreeNode {
        self.num_nodes += 1;
        let len = instances.len();

        let total: f64 = class_probs.iter().sum();
        let max_class = class_probs.iter().cloned().fold(f64::MIN, f64::max);
        let pure = (total - max_class).abs() < WEIGHT_EPSILON;
        if len < MIN_LEAF_SIZE.max(2)
            || pure
            || (self.max_depth > 0 && depth >= self.max_depth)
        {
            return Self::leaf(class_probs, len);
        }

        let mut best: Option<Candidate> = None;
        for &att in self.selected {
            let candidate = self.evaluate(att, &instances);
            if let Some(c) = candidate {
                if best.as_ref().map_or(true, |b| c.score > b.score) {
                    best = Some(c);
                }
            }
        }

        let Some(chosen) = best else {
            return Self::leaf(class_probs, len);
        };
        let prior = entropy_over_columns([&chosen.dist[0], &chosen.dist[1]]);
        if prior + chosen.score <= SENSIBLE_GAIN_EPSILON {
            return Self::leaf(class_probs, len);
        }

        let mut branches: [Vec<u32>; 2] = [Vec::new(), Vec::new()];
        for &inst in &instances {
            let i = inst as usize;
            let branch = if self.base.is_missing(chosen.attribute, i) {
                usize::from(self.rng.gen::<f64>() > chosen.props[0])
            } else {
                let v = self.base.value(chosen.attribute, i);
                match chosen.split {
                    SplitValue::Numeric(t) => usize::from(v as f64 >= t),
                    SplitValue::Category(c) => usize::from(v as usize != c as usize),
                }
            };
            branches[branch].push(inst);
        }

        let mut children: Vec<TreeNode> = Vec::with_capacity(2);
        for branch in branches {
            let child = if branch.is_empty() {
                self.num_nodes += 1;
                Self::leaf(class_probs.clone(), len)
            } else {
                let mut probs = vec![0.0; self.base.num_classes()];
                for &inst in &branch {
                    probs[self.base.label(inst as usize)] += self.weights[inst as usize];
                }
                self.build(branch, probs, depth + 1)
            };
            children.push(child);
        }
        let child1 = children.pop().expect("two branches");
        let child0 = children.pop().expect("two branches");

        TreeNode::Internal {
            attribute: chosen.attribute,
            split: chosen.split,
            props: chosen.props,
            children: Box::new([child0, child1]),
        }
    }

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

    /// Score every split point of one attribute over an instance list.
    fn evaluate(&self, att: AttributeIndex, instances: &[u32]) -> Option<Candidate> {
        let num_classes = self.base.num_classes();
        let mut missing: Vec<u32> = Vec::new();

        if self.base.is_categorical(att) {
            let num_categories = self.base.num_categories(att);
            let mut per_category = vec![vec![0.0; num_classes]; num_categories];
            let mut rest = vec![0.0; num_classes];
            for &inst in instances {
                let i = inst as usize;
                if self.base.is_missing(att, i) {
                    missing.push(inst);
                } else {
                    let category = self.base.value(att, i) as usize;
                    per_category[category][self.base.label(i)] += self.weights[i];
                    rest[self.base.label(i)] += self.weights[i];
                }
            }
            if missing.len() == instances.len() {
                return None;
            }

            let full = rest.clone();
            let mut best_category = 0usize;
            let mut best_val = f64::NEG_INFINITY;
            for (category, row) in per_category.iter().enumerate() {
                for c in 0..num_classes {
                    rest[c] = full[c] - row[c];
                }
                let val = -entropy_conditioned_on_rows([row, &rest]);
                if val > best_val {
                    best_val = val;
                    best_category = category;
                }
            }

            let mut dist = [per_category[best_category].clone(), full];
            for c in 0..num_classes {
                dist[1][c] -= dist[0][c];
            }
            Some(self.finish(att, SplitValue::Category(best_category as u32), dist, &missing))
        } else {
            let mut ordered: Vec<(f32, u32)> = Vec::with_capacity(instances.len());
            for &inst in instances {
                let i = inst as usize;
                if self.base.is_missing(att, i) {
                    missing.push(inst);
                } else {
                    ordered.push((self.base.value(att, i), inst));
                }
            }
            if ordered.is_empty() {
                return None;
            }
            ordered.sort_by(|a, b| {
                a.0.partial_cmp(&b.0)
                    .expect("missing values are filtered before sorting")
                    .then(a.1.cmp(&b.1))
            });

            let mut above = vec![0.0; num_classes];
            for &(_, inst) in &ordered {
                above[self.base.label(inst as usize)] += self.weights[inst as usize];
            }
            let mut below = vec![0.0; num_classes];

            let mut best_val = f64::NEG_INFINITY;
            let mut threshold = f64::NEG_INFINITY;
            let mut best_i = 0usize;
            for i in 1..ordered.len() {
                let (prev_value, prev_inst) = ordered[i - 1];
                below[self.base.label(prev_inst as usize)] += self.weights[prev_inst as usize];
                above[self.base.label(prev_inst as usize)] -= self.weights[prev_inst as usize];
                if ordered[i].0 > prev_value {
                    let val = -entropy_conditioned_on_rows([&below, &above]);
                    if val > best_val {
                        best_val = val;
                        threshold = (ordered[i].0 as f64 + prev_value as f64) / 2.0;
                        best_i = i;
                    }
                }
            }
            if threshold == f64::NEG_INFINITY {
                return None;
            }

            let mut dist = [vec![0.0; num_classes], vec![0.0; num_classes]];
            for (i, &(_, inst)) in ordered.iter().enumerate() {
                let branch = usize::from(i >= best_i);
                dist[branch][self.base.label(inst as usize)] += self.weights[inst as usize];
            }
            Some(self.finish(att, SplitValue::Numeric(threshold), dist, &missing))
        }
    }

    /// Fold missing-valued weight into the table proportionally and
    /// score the finished candidate.
    fn finish(
        &self,
        attribute: AttributeIndex,
        split: SplitValue,
        mut dist: [Vec<f64>; 2],
        missing: &[u32],
    ) -> Candidate {
        let mut props = [dist[0].iter().sum::<f64>(), dist[1].iter().sum::<f64>()];
        let total = props[0] + props[1];
        if total.abs() < WEIGHT_EPSILON {
            props = [0.5, 0.5];
        } else {
            props[0] /= total;
            props[1] /= total;
        }
        for &inst in missing {
            let i = inst as usize;
            let c = self.base.label(i);
            dist[0][c] += props[0] * self.weights[i];
            dist[1][c] += props[1] * self.weights[i];
        }
        let score = -entropy_conditioned_on_rows([&dist[0], &dist[1]]);
        Candidate {
            attribute,
            split,
            dist,
            props,
            score,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::AttributeKind;
    use ndarray::array;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_fallback_matches_obvious_split() {
        let columns = array![
            [1.0, 2.0, 3.0, 4.0, 5.0, 6.0],
            [0.0, 0.0, 0.0, 1.0, 1.0, 1.0],
        ];
        let data = TabularDataset::from_columns(
            columns,
            vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
            1,
            None,
        )
        .unwrap();
        let selected = vec![0usize];
        let weights = vec![1.0; 6];
        let mut rng = StdRng::seed_from_u64(3);
        let mut fb = FallbackBuilder::new(&data, &selected, &weights, &mut rng, 0);
        let root = fb.build((0..6).collect(), vec![3.0, 3.0], 0);

        let TreeNode::Internal { split, children, .. } = root else {
            panic!("expected a split");
        };
        assert_eq!(split, SplitValue::Numeric(3.5));
        assert!(children[0].is_leaf() && children[1].is_leaf());
        assert!(fb.num_nodes() >= 3);
    }

    #[test]
    fn test_fallback_pure_input_is_leaf() {
        let columns = array![
            [1.0, 2.0, 3.0],
            [1.0, 1.0, 1.0],
        ];
        let data = TabularDataset::from_columns(
            columns,
            vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
            1,
            None,
        )
        .unwrap();
        let selected = vec![0usize];
        let weights = vec![1.0; 3];
        let mut rng = StdRng::seed_from_u64(3);
        let mut fb = FallbackBuilder::new(&data, &selected, &weights, &mut rng, 0);
        let root = fb.build(vec![0, 1, 2], vec![0.0, 3.0], 0);
        assert_eq!(
            root,
            TreeNode::Leaf {
                distribution: vec![0.0, 1.0]
            }
        );
    }
}
