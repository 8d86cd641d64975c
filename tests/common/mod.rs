//! Shared dataset builders for integration tests.

use fast_random_forest::{AttributeKind, TabularDataset};
use ndarray::Array2;
use std::sync::Arc;

/// Route `log` output through the test harness.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A binary-class dataset where attribute 0 separates the classes
/// perfectly and the remaining numeric attributes carry deterministic
/// noise. The class attribute is the last row.
pub fn separable_dataset(n: usize, noise_attributes: usize) -> Arc<TabularDataset> {
    let num_attributes = noise_attributes + 2;
    let class_index = num_attributes - 1;
    let mut columns = Array2::<f64>::zeros((num_attributes, n));
    for i in 0..n {
        let class = (i % 2) as f64;
        columns[[0, i]] = class * 10.0 + (i / 2) as f64 * 0.1;
        for a in 1..=noise_attributes {
            columns[[a, i]] = ((i * 7 + a * 13) % 23) as f64;
        }
        columns[[class_index, i]] = class;
    }
    let mut kinds = vec![AttributeKind::Numeric; num_attributes - 1];
    kinds.push(AttributeKind::Categorical(2));
    Arc::new(TabularDataset::from_columns(columns, kinds, class_index, None).unwrap())
}

/// A dataset mixing one numeric and one three-category nominal attribute,
/// with missing values sprinkled into both. The class attribute is row 2.
pub fn mixed_dataset_with_missing(n: usize) -> Arc<TabularDataset> {
    let mut columns = Array2::<f64>::zeros((3, n));
    for i in 0..n {
        let class = (i % 2) as f64;
        columns[[0, i]] = if i % 7 == 3 {
            f64::NAN
        } else {
            class * 5.0 + (i % 5) as f64 * 0.2
        };
        columns[[1, i]] = if i % 11 == 5 {
            f64::NAN
        } else {
            ((i + i % 2) % 3) as f64
        };
        columns[[2, i]] = class;
    }
    let kinds = vec![
        AttributeKind::Numeric,
        AttributeKind::Categorical(3),
        AttributeKind::Categorical(2),
    ];
    Arc::new(TabularDataset::from_columns(columns, kinds, 2, None).unwrap())
}
