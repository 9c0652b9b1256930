use thiserror::Error;

#[derive(Error, Debug)]
pub enum TreeSequenceError {
    #[error("node {node}: add_path called but this node already has a chain")]
    ChildPathNotEmpty { node: u32 },

    #[error("restore_edges given mismatched column lengths: left={left}, right={right}, parent={parent}, child={child}")]
    RestoreLengthMismatch { left: usize, right: usize, parent: usize, child: usize },

    #[error("restore_mutations given mismatched column lengths: site={site}, node={node}, derived_state={derived_state}")]
    RestoreMutationsLengthMismatch { site: usize, node: usize, derived_state: usize },

    #[error("restore referenced node {node}, but only {num_nodes} nodes exist")]
    UnknownNode { node: u32, num_nodes: usize },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}
