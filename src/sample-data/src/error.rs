use thiserror::Error;

/// Errors raised while registering site or ancestor data, or while reading back
/// from an [`crate::AncestorSink`].
///
/// These map onto the `InvalidInput` / `InvalidAncestor` kinds of the inference core;
/// `IncompatibleRestore` and `InternalInvariant` live closer to the tree-sequence builder
/// and are defined in the `tree-sequence` crate instead.
#[derive(Error, Debug)]
pub enum SampleDataError {
    #[error("site {site}: genotype value {value} is not in {{0,1}} (biallelic core only)")]
    NonBiallelic { site: u32, value: u8 },

    #[error("site {site}: position {position} is not strictly greater than the previous site's position {previous}")]
    NonIncreasingPosition { site: u32, position: f64, previous: f64 },

    #[error("site {site}: position {position} must be < sequence_length {sequence_length}")]
    PositionOutOfRange { site: u32, position: f64, sequence_length: f64 },

    #[error("site {site}: negative position {position}")]
    NegativePosition { site: u32, position: f64 },

    #[error("site {site}: genotype vector has {got} entries, expected {expected} (num_samples)")]
    GenotypeLengthMismatch { site: u32, got: usize, expected: usize },

    #[error("ancestor {ancestor}: start ({start}) must be < end ({end})")]
    InvalidAncestorInterval { ancestor: usize, start: i32, end: i32 },

    #[error("ancestor {ancestor}: focal_sites must be nonempty")]
    EmptyFocalSites { ancestor: usize },

    #[error("ancestor {ancestor}: focal_sites must be strictly increasing (site {prev} appears at or after site {next})")]
    FocalSitesNotSorted { ancestor: usize, prev: i32, next: i32 },

    #[error("ancestor {ancestor}: focal site {site} lies outside [{start}, {end})")]
    FocalSiteOutOfRange { ancestor: usize, site: i32, start: i32, end: i32 },

    #[error("ancestor {ancestor}: haplotype length {got} does not match interval length {expected}")]
    HaplotypeLengthMismatch { ancestor: usize, got: usize, expected: usize },

    #[error("ancestor {ancestor}: focal site {site} has derived state {got}, expected 1")]
    FocalSiteNotDerived { ancestor: usize, site: i32, got: u8 },

    #[error("ancestor {ancestor}: haplotype value {value} at site {site} is not a valid allele (>1)")]
    InvalidAlleleValue { ancestor: usize, site: i32, value: u8 },

    #[error("ancestor sink received ancestor index {got} out of order; expected {expected}")]
    OutOfOrderCommit { expected: usize, got: usize },
}
