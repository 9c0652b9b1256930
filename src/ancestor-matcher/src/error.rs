use thiserror::Error;

#[derive(Error, Debug)]
pub enum AncestorMatcherError {
    #[error("find_path called with an empty or inverted interval [{start}, {end})")]
    EmptyInterval { start: u32, end: u32 },

    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}
