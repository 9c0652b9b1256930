//! The central mutable tree-sequence state: nodes, an edge arena organized
//! into per-child chains, and the three sorted indexes (`Il`, `Ir`, `Ip`) kept
//! consistent under path compression.

mod builder;
mod edge;
mod error;
mod index;

pub use builder::TreeSequenceBuilder;
pub use edge::{Edge, OrderedF64, NODE_IS_SAMPLE};
pub use error::TreeSequenceError;
pub use index::Indexes;
