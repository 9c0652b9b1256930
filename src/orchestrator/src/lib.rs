//! Drives the three inference stages (`build-ancestors`, `match-ancestors`,
//! `match-samples`) and their combined `infer` pipeline on top of the
//! `sample-data`, `ancestor-builder`, `tree-sequence` and `ancestor-matcher`
//! crates. Owns all artifact I/O, the rayon thread pool, and provenance
//! stamping; the core crates stay oblivious to files, threads, and logging.

mod artifact;
mod error;
mod generate;
mod match_ancestors;
mod match_samples;
mod provenance;

use std::path::Path;
use std::sync::atomic::AtomicBool;

use ancestor_builder::AncestorBuilder;
use log::info;
use sample_data::GenotypeSource;
use tree_sequence::TreeSequenceBuilder;

pub use artifact::{AncestorsArtifact, InferenceSites, SamplesArtifact, TreesArtifact};
pub use error::OrchestratorError;
pub use provenance::Provenance;

/// Check that a restored tree sequence's site positions match the current
/// samples artifact's freshly-recomputed inference-site positions, not just
/// their count: two datasets can agree on inference-site count while
/// disagreeing on which sites those are.
fn check_restored_site_positions(restored: &[f64], expected: &[f64]) -> Result<(), OrchestratorError> {
    if restored.len() != expected.len() {
        return Err(OrchestratorError::IncompatibleRestoreSiteCount {
            restored_sites: restored.len() as u32,
            sample_sites: expected.len() as u32,
        });
    }
    for (index, (&r, &e)) in restored.iter().zip(expected).enumerate() {
        if r != e {
            return Err(OrchestratorError::IncompatibleRestoreSitePositions { index, restored: r, expected: e });
        }
    }
    Ok(())
}

/// `build-ancestors`: read a samples artifact, select its inference sites,
/// generate every ancestor descriptor, and write an ancestors artifact.
pub fn build_ancestors(
    input: &Path,
    output: &Path,
    num_threads: usize,
    provenance: Provenance,
    cancel: &AtomicBool,
) -> anyhow::Result<()> {
    let samples = SamplesArtifact::load(input)?;
    let (builder, inference_sites) = artifact::select_inference_sites(&samples)?;
    info!("selected {} inference site(s) out of {}", inference_sites.len(), samples.num_sites());

    let plan = builder
        .plan()
        .map_err(|e| OrchestratorError::InternalInvariant(e.to_string()))?;
    let sink = generate::generate_ancestors(&builder, &plan, num_threads, cancel)?;

    AncestorsArtifact::from_sink(builder.num_sites(), &sink, provenance).save(output)?;
    Ok(())
}

/// `match-ancestors`: read a samples artifact and an ancestors artifact (or
/// resume from a previously-dumped tree sequence), match every ancestor epoch
/// oldest-to-youngest, and write a tree-sequence artifact that does not yet
/// include sample paths.
pub fn run_match_ancestors(
    samples_path: &Path,
    ancestors_path: &Path,
    output: &Path,
    restore: Option<&Path>,
    num_threads: usize,
    path_compression: bool,
    provenance: Provenance,
    cancel: &AtomicBool,
) -> anyhow::Result<()> {
    let samples = SamplesArtifact::load(samples_path)?;
    let (_, inference_sites) = artifact::select_inference_sites(&samples)?;

    let (num_sites, sink) = AncestorsArtifact::load(ancestors_path)?;
    if num_sites as usize != inference_sites.len() {
        return Err(OrchestratorError::IncompatibleAncestorsSiteCount {
            path: ancestors_path.display().to_string(),
            built_sites: num_sites,
            sample_sites: inference_sites.len() as u32,
        }
        .into());
    }

    // A restored tree sequence already carries one node per ancestor (it was
    // dumped from a run that preallocated them the same way); a fresh run
    // allocates them here, in sink order, so ancestor index and node id line up.
    let mut tsb = if let Some(restore_path) = restore {
        let (tsb, site_positions, _) = TreesArtifact::load(restore_path)?;
        check_restored_site_positions(&site_positions, &inference_sites.positions)?;
        info!("resumed from {}: {} node(s) already present", restore_path.display(), tsb.num_nodes());
        tsb
    } else {
        let mut tsb = TreeSequenceBuilder::new(num_sites);
        for ancestor in sink.iter() {
            tsb.add_node(f64::from(ancestor.time), false);
        }
        tsb
    };

    match_ancestors::match_ancestors(&mut tsb, &sink, num_threads, path_compression, cancel)?;

    TreesArtifact::from_builder(&tsb, inference_sites.positions, samples.sequence_length(), provenance).save(output)?;
    Ok(())
}

/// `match-samples`: read a samples artifact and the tree sequence produced by
/// `match-ancestors`, match every sample against it, and write the completed
/// tree-sequence artifact.
pub fn run_match_samples(
    samples_path: &Path,
    ancestors_trees_path: &Path,
    output: &Path,
    num_threads: usize,
    path_compression: bool,
    provenance: Provenance,
    cancel: &AtomicBool,
) -> anyhow::Result<()> {
    let samples = SamplesArtifact::load(samples_path)?;
    let (_, inference_sites) = artifact::select_inference_sites(&samples)?;

    let (mut tsb, site_positions, sequence_length) = TreesArtifact::load(ancestors_trees_path)?;
    check_restored_site_positions(&site_positions, &inference_sites.positions)?;

    match_samples::match_samples(&mut tsb, &samples, &inference_sites, num_threads, path_compression, cancel)?;

    TreesArtifact::from_builder(&tsb, site_positions, sequence_length, provenance).save(output)?;
    Ok(())
}

/// `infer`: run all three stages in one pass, without writing the
/// intermediate `.ancestors`/`.trees` artifacts to disk.
pub fn infer(
    input: &Path,
    output: &Path,
    num_threads: usize,
    path_compression: bool,
    provenance: Provenance,
    cancel: &AtomicBool,
) -> anyhow::Result<()> {
    let samples = SamplesArtifact::load(input)?;
    let (builder, inference_sites): (AncestorBuilder, InferenceSites) = artifact::select_inference_sites(&samples)?;
    info!("selected {} inference site(s) out of {}", inference_sites.len(), samples.num_sites());

    let plan = builder
        .plan()
        .map_err(|e| OrchestratorError::InternalInvariant(e.to_string()))?;
    let ancestor_sink = generate::generate_ancestors(&builder, &plan, num_threads, cancel)?;

    let mut tsb = TreeSequenceBuilder::new(builder.num_sites());
    for ancestor in ancestor_sink.iter() {
        tsb.add_node(f64::from(ancestor.time), false);
    }
    match_ancestors::match_ancestors(&mut tsb, &ancestor_sink, num_threads, path_compression, cancel)?;
    match_samples::match_samples(&mut tsb, &samples, &inference_sites, num_threads, path_compression, cancel)?;

    TreesArtifact::from_builder(&tsb, inference_sites.positions, samples.sequence_length(), provenance).save(output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicBool;

    use ancestor_matcher::find_path;
    use sample_data::InMemorySampleData;

    use super::*;

    /// Builds a tiny 3-sample, 2-inference-site dataset and drives the whole
    /// pipeline (minus artifact I/O) directly against the in-memory types,
    /// then re-runs `find_path` for every sample against the finished tree
    /// sequence to confirm each sample's own path reproduces its observed
    /// genotype at every inference site.
    #[test]
    fn tiny_pipeline_round_trips_every_sample() {
        let mut builder = InMemorySampleData::builder(3, 1.0);
        builder.add_site(0.25, "A", "T", vec![1, 1, 0]).unwrap();
        builder.add_site(0.75, "C", "G", vec![1, 0, 1]).unwrap();
        let samples = builder.finalise();

        let (ancestor_builder, inference_sites) = artifact::select_inference_sites(&samples).unwrap();
        assert_eq!(inference_sites.len(), 2);

        let plan = ancestor_builder.plan().unwrap();
        assert!(!plan.descriptors.is_empty());

        let cancel = AtomicBool::new(false);
        let sink = generate::generate_ancestors(&ancestor_builder, &plan, 1, &cancel).unwrap();
        assert_eq!(sink.len(), plan.descriptors.len() + 2);

        let mut tsb = TreeSequenceBuilder::new(ancestor_builder.num_sites());
        for ancestor in sink.iter() {
            tsb.add_node(f64::from(ancestor.time), false);
        }
        match_ancestors::match_ancestors(&mut tsb, &sink, 1, true, &cancel).unwrap();
        match_samples::match_samples(&mut tsb, &samples, &inference_sites, 1, true, &cancel).unwrap();

        tsb.check_state().unwrap();
        assert_eq!(tsb.num_nodes(), sink.len() + 3);

        let first_sample_node = sink.len() as u32;
        for sample in 0..3usize {
            let mut h = vec![0u8; inference_sites.len()];
            for (dense_index, &original_id) in inference_sites.original_site_id.iter().enumerate() {
                h[dense_index] = samples.site(original_id).genotypes[sample];
            }
            let node = first_sample_node + sample as u32;
            // The sample's own path was built from exactly this haplotype, so
            // re-running find_path against the finished tree (which already
            // contains that path and any explicit mismatch mutations) must
            // recover it exactly.
            let result = find_path(&tsb, &h, 0, ancestor_builder.num_sites()).unwrap();
            assert_eq!(result.matched_haplotype, h, "sample {sample} (node {node}) did not round-trip");
        }
    }

    #[test]
    fn restored_site_positions_must_match_not_just_count() {
        check_restored_site_positions(&[0.25, 0.75], &[0.25, 0.75]).unwrap();

        let err = check_restored_site_positions(&[0.25, 0.75], &[0.25, 0.80]).unwrap_err();
        assert!(matches!(err, OrchestratorError::IncompatibleRestoreSitePositions { index: 1, .. }));

        let err = check_restored_site_positions(&[0.25], &[0.25, 0.80]).unwrap_err();
        assert!(matches!(err, OrchestratorError::IncompatibleRestoreSiteCount { restored_sites: 1, sample_sites: 2 }));
    }
}
