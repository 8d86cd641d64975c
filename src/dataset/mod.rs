//! Dataset management: columnar storage, bootstrap resampling, and
//! per-tree views.

pub mod dataset;
pub mod view;

pub use dataset::TabularDataset;
pub use view::DatasetView;
