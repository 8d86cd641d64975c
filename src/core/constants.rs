//! Tuning constants for tree induction and forest diagnostics.

/// Minimum number of instances required in a leaf.
pub const MIN_LEAF_SIZE: usize = 1;

/// A split is "sensible" only if the entropy reduction it achieves exceeds
/// this tolerance; guards against spurious splits caused by floating-point
/// noise in the entropy computation.
pub const SENSIBLE_GAIN_EPSILON: f64 = 1e-2;

/// Tolerance used when comparing weighted class counts for purity checks.
pub const WEIGHT_EPSILON: f64 = 1e-6;

/// Threshold gating the fast/fallback growth-strategy switch.
///
/// A subtree keeps the fast randomized-attribute strategy while
/// `k * log2(n) / (k + subset_len)` exceeds this value. The extreme
/// default keeps the fast path in effectively all realistic cases; it is
/// a tunable safety valve rather than an active heuristic.
pub const FALLBACK_STRATEGY_THRESHOLD: f64 = -999_999.0;

/// Default minimum number of trees that must both contain and exclude an
/// attribute for dropout importance and interaction estimates to be
/// statistically meaningful.
pub const DEFAULT_MIN_TREES_PER_GROUP: usize = 20;

/// Default number of trees in a forest.
pub const DEFAULT_NUM_TREES: usize = 100;

/// Default random seed.
pub const DEFAULT_SEED: u64 = 1;
