//! Groups inference sites by frequency and genotype pattern, emits ancestor
//! descriptors in deterministic order (independent of thread count or
//! insertion order), and materializes each descriptor into a haplotype
//! interval via older-site disambiguation.

mod builder;
mod descriptors;
mod error;
mod haplotype;
mod registry;
mod time_map;

pub use builder::{synthetic_ancestors, AncestorBuilder, AncestorPlan};
pub use descriptors::{ancestor_descriptors, Descriptor};
pub use error::AncestorBuilderError;
pub use haplotype::make_ancestor;
pub use registry::SiteRegistry;
pub use time_map::TimeMap;
