use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use ancestor_matcher::{find_path, MatchResult};
use log::info;
use rayon::ThreadPoolBuilder;
use sample_data::{GenotypeSource, UNKNOWN_ALLELE};
use tree_sequence::TreeSequenceBuilder;

use crate::artifact::InferenceSites;
use crate::error::OrchestratorError;

/// Allocate one sample node (time `0.0`) per sample in `samples`, then match
/// every sample haplotype against the already-built ancestor tree sequence in
/// a single final epoch. Any site where the matcher's reconstructed
/// haplotype disagrees with the observed genotype is recorded as an explicit
/// mutation on the sample node, so the resulting tree sequence reproduces the
/// input exactly.
///
/// `inference_sites` maps the tree sequence's dense site index back to
/// `samples`' original site id, exactly as produced by
/// [`crate::artifact::select_inference_sites`] when the ancestors were built.
pub fn match_samples(
    tsb: &mut TreeSequenceBuilder,
    samples: &impl GenotypeSource,
    inference_sites: &InferenceSites,
    num_threads: usize,
    path_compression: bool,
    cancel: &AtomicBool,
) -> Result<(), OrchestratorError> {
    let num_samples = samples.num_samples() as usize;
    let num_sites = tsb.num_sites();
    if inference_sites.len() as u32 != num_sites {
        return Err(OrchestratorError::InternalInvariant(format!(
            "tree sequence has {num_sites} sites but inference-site map has {}",
            inference_sites.len()
        )));
    }

    let first_sample_node = tsb.num_nodes() as u32;
    for _ in 0..num_samples {
        tsb.add_node(0.0, true);
    }

    info!("matching {num_samples} sample(s) across {num_threads} thread(s)");

    let haplotypes = build_sample_haplotypes(samples, inference_sites);

    let results: Vec<Mutex<Option<MatchResult>>> = (0..num_samples).map(|_| Mutex::new(None)).collect();
    let failure: Mutex<Option<String>> = Mutex::new(None);
    let readonly: &TreeSequenceBuilder = tsb;

    let match_one = |i: usize| {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        match find_path(readonly, &haplotypes[i], 0, num_sites) {
            Ok(result) => *results[i].lock().expect("result mutex poisoned") = Some(result),
            Err(e) => {
                cancel.store(true, Ordering::Relaxed);
                *failure.lock().expect("failure mutex poisoned") = Some(e.to_string());
            }
        }
    };

    if num_threads == 1 {
        for i in 0..num_samples {
            match_one(i);
        }
    } else {
        let pool = ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| OrchestratorError::InternalInvariant(format!("failed to build match-samples thread pool: {e}")))?;
        pool.scope(|scope| {
            for i in 0..num_samples {
                scope.spawn(move |_| match_one(i));
            }
        });
    }

    if let Some(reason) = failure.into_inner().expect("failure mutex poisoned") {
        return Err(OrchestratorError::InternalInvariant(format!("sample matching failed: {reason}")));
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(OrchestratorError::Cancelled);
    }

    for (i, result) in results.into_iter().enumerate() {
        let result = result
            .into_inner()
            .expect("result mutex poisoned")
            .expect("every result is filled when no failure occurred");
        let node = first_sample_node + i as u32;
        tsb.add_path(node, &result.lefts, &result.rights, &result.parents, path_compression)
            .map_err(|e| OrchestratorError::InternalInvariant(e.to_string()))?;

        let mut sites = Vec::new();
        let mut derived = Vec::new();
        for site in 0..num_sites as usize {
            let observed = haplotypes[i][site];
            let reconstructed = result.matched_haplotype[site];
            if reconstructed != UNKNOWN_ALLELE && reconstructed != observed {
                sites.push(site as u32);
                derived.push(observed);
            }
        }
        tsb.add_mutations(node, &sites, &derived);
    }

    info!("finished matching samples: {} node(s), {} edge(s) total", tsb.num_nodes(), tsb.num_edges());
    Ok(())
}

fn build_sample_haplotypes(samples: &impl GenotypeSource, inference_sites: &InferenceSites) -> Vec<Vec<u8>> {
    let num_samples = samples.num_samples() as usize;
    let mut haplotypes = vec![vec![UNKNOWN_ALLELE; inference_sites.len()]; num_samples];
    for (dense_index, &original_id) in inference_sites.original_site_id.iter().enumerate() {
        let site = samples.site(original_id);
        for (sample, &genotype) in site.genotypes.iter().enumerate() {
            haplotypes[sample][dense_index] = genotype;
        }
    }
    haplotypes
}
