//! Impurity criteria driving the split search.
//!
//! Both functions operate on a 2-by-K weighted contingency table (branch by
//! class), given as a pair of class-weight rows. Natural logarithms are
//! used throughout; only relative comparisons matter, so any single base
//! would do. Zero-weight branches and classes contribute exactly zero
//! impurity, never NaN.

/// Entropy of the class distribution with the branches collapsed: the
/// impurity of the parent range before any split.
pub fn entropy_over_columns(dist: [&[f64]; 2]) -> f64 {
    let mut total = 0.0;
    let mut acc = 0.0;
    for c in 0..dist[0].len() {
        let w = dist[0][c] + dist[1][c];
        if w > 0.0 {
            acc -= w * w.ln();
        }
        total += w;
    }
    if total <= 0.0 {
        return 0.0;
    }
    (acc + total * total.ln()) / total
}

/// Weighted entropy of the class distribution after the 2-way split:
/// `sum_branch (branch_weight / total_weight) * entropy(branch)`.
pub fn entropy_conditioned_on_rows(dist: [&[f64]; 2]) -> f64 {
    let mut total = 0.0;
    let mut acc = 0.0;
    for row in dist {
        let mut row_total = 0.0;
        for &w in row {
            if w > 0.0 {
                acc -= w * w.ln();
            }
            row_total += w;
        }
        if row_total > 0.0 {
            acc += row_total * row_total.ln();
        }
        total += row_total;
    }
    if total <= 0.0 {
        return 0.0;
    }
    acc / total
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_entropy_over_columns_uniform() {
        // Two classes with equal weight: entropy is ln 2.
        let row0 = [3.0, 0.0];
        let row1 = [0.0, 3.0];
        let h = entropy_over_columns([&row0, &row1]);
        assert_abs_diff_eq!(h, 2f64.ln(), epsilon = 1e-12);
    }

    #[test]
    fn test_entropy_over_columns_pure() {
        let row0 = [4.0, 0.0];
        let row1 = [2.0, 0.0];
        assert_abs_diff_eq!(entropy_over_columns([&row0, &row1]), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_conditioned_entropy_of_pure_branches_is_zero() {
        let row0 = [3.0, 0.0];
        let row1 = [0.0, 3.0];
        assert_abs_diff_eq!(
            entropy_conditioned_on_rows([&row0, &row1]),
            0.0,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_conditioned_entropy_of_unsplit_table() {
        // All weight in one branch: conditioned entropy equals the plain
        // entropy of that branch.
        let row0 = [0.0, 0.0];
        let row1 = [2.0, 2.0];
        assert_abs_diff_eq!(
            entropy_conditioned_on_rows([&row0, &row1]),
            2f64.ln(),
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_zero_weight_never_nan() {
        let empty = [0.0, 0.0];
        assert_eq!(entropy_over_columns([&empty, &empty]), 0.0);
        assert_eq!(entropy_conditioned_on_rows([&empty, &empty]), 0.0);
    }

    #[test]
    fn test_split_never_increases_entropy() {
        // Conditioned entropy is bounded above by the prior.
        let row0 = [5.0, 1.0, 0.5];
        let row1 = [0.5, 4.0, 2.0];
        let prior = entropy_over_columns([&row0, &row1]);
        let posterior = entropy_conditioned_on_rows([&row0, &row1]);
        assert!(posterior <= prior + 1e-12);
    }
}
