//! Decision-tree construction and representation.

mod builder;
pub mod criteria;
mod fallback;
pub mod node;

pub use node::{Tree, TreeNode};

pub(crate) use builder::TreeBuilder;
