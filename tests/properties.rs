//! Property-based tests for the split criteria, dataset invariants and
//! parameter derivation.

use fast_random_forest::tree::criteria::{entropy_conditioned_on_rows, entropy_over_columns};
use fast_random_forest::{AttributeKind, ForestConfig, TabularDataset, MISSING};
use ndarray::Array2;
use proptest::prelude::*;

/// Two equal-length rows of non-negative class weights.
fn weight_table() -> impl Strategy<Value = (Vec<f64>, Vec<f64>)> {
    (1usize..6).prop_flat_map(|num_classes| {
        let row = prop::collection::vec(0.0f64..50.0, num_classes);
        (row.clone(), row)
    })
}

proptest! {
    #[test]
    fn prop_entropy_is_non_negative((row0, row1) in weight_table()) {
        let total = entropy_over_columns([&row0, &row1]);
        let conditioned = entropy_conditioned_on_rows([&row0, &row1]);
        prop_assert!(total >= -1e-9);
        prop_assert!(conditioned >= -1e-9);
    }

    #[test]
    fn prop_conditioning_never_increases_entropy((row0, row1) in weight_table()) {
        let total = entropy_over_columns([&row0, &row1]);
        let conditioned = entropy_conditioned_on_rows([&row0, &row1]);
        prop_assert!(conditioned <= total + 1e-9);
    }

    #[test]
    fn prop_sorted_orders_are_ascending_permutations(
        values in prop::collection::vec(prop::option::of(-100.0f64..100.0), 2..60)
    ) {
        let n = values.len();
        let mut columns = Array2::<f64>::zeros((2, n));
        for (i, v) in values.iter().enumerate() {
            columns[[0, i]] = v.unwrap_or(f64::NAN);
            columns[[1, i]] = (i % 2) as f64;
        }
        let data = TabularDataset::from_columns(
            columns,
            vec![AttributeKind::Numeric, AttributeKind::Categorical(2)],
            1,
            None,
        )
        .unwrap();

        let order = data.sorted_order(0);
        // A permutation of all instances.
        let mut seen: Vec<u32> = order.to_vec();
        seen.sort_unstable();
        prop_assert_eq!(seen, (0..n as u32).collect::<Vec<_>>());

        // Ascending, ties broken by index, missing values at the end.
        for w in order.windows(2) {
            let (x, y) = (w[0] as usize, w[1] as usize);
            let (vx, vy) = (data.value(0, x), data.value(0, y));
            prop_assert!(vx <= vy);
            if vx == vy {
                prop_assert!(x < y);
            }
        }
        if let Some(first_missing) = order.iter().position(|&i| data.value(0, i as usize) == MISSING) {
            for &i in &order[first_missing..] {
                prop_assert!(data.is_missing(0, i as usize));
            }
        }
    }

    #[test]
    fn prop_parameter_derivation_is_legal(
        num_attributes in 2usize..2000,
        k in 0usize..600,
        num_features in 0usize..3000,
        num_trees in 1usize..500,
    ) {
        let config = ForestConfig::builder()
            .num_trees(num_trees)
            .k_value(k)
            .num_features_per_tree(num_features)
            .build()
            .unwrap();
        let params = config.resolve(num_attributes).unwrap();
        prop_assert!(params.k_value >= 1);
        prop_assert!(params.num_features_per_tree >= 1);
        prop_assert!(params.num_features_per_tree < num_attributes);
        prop_assert!(params.num_trees >= num_trees);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_forest_distributions_are_proper(seed in 0u64..1000) {
        use fast_random_forest::Forest;
        use std::sync::Arc;

        let n = 24;
        let mut columns = Array2::<f64>::zeros((3, n));
        for i in 0..n {
            columns[[0, i]] = ((i * 17 + seed as usize) % 13) as f64;
            columns[[1, i]] = ((i * 5) % 7) as f64;
            columns[[2, i]] = (i % 2) as f64;
        }
        let data = Arc::new(
            TabularDataset::from_columns(
                columns,
                vec![
                    AttributeKind::Numeric,
                    AttributeKind::Numeric,
                    AttributeKind::Categorical(2),
                ],
                2,
                None,
            )
            .unwrap(),
        );
        let forest = Forest::train(
            data,
            ForestConfig::builder().num_trees(5).seed(seed).build().unwrap(),
        )
        .unwrap();

        let dist = forest.predict(&[3.0, 4.0]);
        prop_assert_eq!(dist.len(), 2);
        prop_assert!((dist.iter().sum::<f64>() - 1.0).abs() < 1e-9);
        prop_assert!(dist.iter().all(|&p| (-1e-12..=1.0 + 1e-12).contains(&p)));

        let err = forest.oob_error();
        prop_assert!((0.0..=1.0).contains(&err));
    }
}
