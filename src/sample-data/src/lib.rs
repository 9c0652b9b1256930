//! In-memory stand-ins for the sample-data and ancestor-data stores that sit at
//! the edges of the inference core: a read-only [`GenotypeSource`] of site
//! genotypes, and an append-only [`AncestorSink`] of emitted ancestors.

mod ancestor;
mod ancestor_sink;
mod error;
mod genotype_source;
mod site;

pub use ancestor::Ancestor;
pub use ancestor_sink::{AncestorSink, InMemoryAncestorSink};
pub use error::SampleDataError;
pub use genotype_source::{GenotypeSource, InMemorySampleData, SampleDataBuilder, SiteCursor};
pub use site::{Site, UNKNOWN_ALLELE};
