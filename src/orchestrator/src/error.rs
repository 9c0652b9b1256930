use thiserror::Error;

#[derive(Error, Debug)]
pub enum OrchestratorError {
    #[error("ancestor generation was cancelled before completion")]
    Cancelled,

    #[error("restored tree sequence has {restored_sites} sites but the samples artifact has {sample_sites}")]
    IncompatibleRestoreSiteCount { restored_sites: u32, sample_sites: u32 },

    #[error(
        "restored tree sequence's site position at index {index} is {restored} but the samples artifact's \
         inference sites expect {expected}"
    )]
    IncompatibleRestoreSitePositions { index: usize, restored: f64, expected: f64 },

    #[error("ancestors artifact {path} was built against {built_sites} sites, samples artifact has {sample_sites}")]
    IncompatibleAncestorsSiteCount { path: String, built_sites: u32, sample_sites: u32 },

    #[error("artifact {path}: {reason}")]
    Artifact { path: String, reason: String },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}
