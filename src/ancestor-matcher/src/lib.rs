mod error;
mod likelihood;
mod matcher;
mod tree_state;

pub use error::AncestorMatcherError;
pub use likelihood::Likelihood;
pub use matcher::{find_path, MatchResult};
pub use tree_state::{SparseTree, NULL_NODE};
