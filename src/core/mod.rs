//! Core infrastructure: fundamental types, constants, and error handling.

pub mod constants;
pub mod error;
pub mod types;

pub use error::{ForestError, Result};
pub use types::{
    AttributeIndex, AttributeKind, ClassIndex, InstanceIndex, SplitValue, TreeIndex, MISSING,
};
