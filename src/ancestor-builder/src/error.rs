use thiserror::Error;

#[derive(Error, Debug)]
pub enum AncestorBuilderError {
    #[error("site {site}: frequency {frequency} is not > 1; only inference sites may be registered")]
    FrequencyTooLow { site: u32, frequency: u32 },

    #[error("site {site}: genotype vector has {got} entries, expected {expected} (num_samples)")]
    GenotypeLengthMismatch { site: u32, got: usize, expected: usize },

    #[error("site {site} was never registered via add_site before ancestor_descriptors() was called")]
    UnregisteredSite { site: u32 },
}
