use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use ancestor_matcher::{find_path, MatchResult};
use log::info;
use rayon::ThreadPoolBuilder;
use sample_data::{AncestorSink, UNKNOWN_ALLELE};
use tree_sequence::TreeSequenceBuilder;

use crate::error::OrchestratorError;

/// Group `sink`'s ancestor indices `[1, len)` into maximal contiguous runs
/// sharing the same `time`. Index `0` (the ultimate ancestor) is excluded: it
/// is never matched. The sink is built in descending-time order (the root's
/// time is the largest, real descriptors then follow from highest frequency
/// down to lowest, i.e. oldest to youngest), so this naturally partitions
/// into the root's singleton epoch followed by the real epochs, already in
/// oldest-to-youngest processing order.
fn epoch_groups(sink: &impl AncestorSink) -> Vec<Range<usize>> {
    let mut groups = Vec::new();
    if sink.len() <= 1 {
        return groups;
    }
    let mut start = 1usize;
    for i in 2..sink.len() {
        if sink.get(i).time != sink.get(start).time {
            groups.push(start..i);
            start = i;
        }
    }
    groups.push(start..sink.len());
    groups
}

/// Process ancestors oldest-to-youngest into `tsb`: the root epoch first (the
/// sole ancestor matched against the bare ultimate-ancestor node), then real
/// descriptor epochs in descending time order (highest frequency, i.e.
/// oldest, first), finishing at the smallest real time just before sample
/// matching begins.
///
/// `tsb` must already have one node per sink entry, in sink order, so that
/// ancestor index `i` and node id `i` coincide. Any ancestor that already has
/// a path (`tsb.path_head` is `Some`) is treated as already matched and
/// skipped, which is what lets a restored tree sequence resume a run that
/// crashed partway through an epoch.
pub fn match_ancestors(
    tsb: &mut TreeSequenceBuilder,
    sink: &impl AncestorSink,
    num_threads: usize,
    path_compression: bool,
    cancel: &AtomicBool,
) -> Result<(), OrchestratorError> {
    let order = epoch_groups(sink);

    let num_epochs = order.len();
    for (epoch_index, epoch) in order.into_iter().enumerate() {
        if cancel.load(Ordering::Relaxed) {
            return Err(OrchestratorError::Cancelled);
        }
        let epoch_time = sink.get(epoch.start).time;
        let pending: Vec<usize> = epoch.clone().filter(|&id| tsb.path_head(id as u32).is_none()).collect();
        if pending.is_empty() {
            info!("epoch {}/{num_epochs} already matched (restored), skipping", epoch_index + 1);
            continue;
        }
        info!(
            "starting epoch {}/{num_epochs}: {} ancestor(s) at time {epoch_time} ({} already restored)",
            epoch_index + 1,
            pending.len(),
            epoch.len() - pending.len()
        );

        let results: Vec<Mutex<Option<MatchResult>>> = pending.iter().map(|_| Mutex::new(None)).collect();
        let failure: Mutex<Option<String>> = Mutex::new(None);
        let num_sites = tsb.num_sites();
        let readonly: &TreeSequenceBuilder = tsb;

        let match_one = |offset: usize| {
            if cancel.load(Ordering::Relaxed) {
                return;
            }
            let ancestor_id = pending[offset];
            let ancestor = sink.get(ancestor_id);
            let mut h = vec![UNKNOWN_ALLELE; num_sites as usize];
            h[ancestor.start as usize..ancestor.end as usize].copy_from_slice(&ancestor.haplotype);
            for &focal in &ancestor.focal_sites {
                h[focal as usize] = 0;
            }
            match find_path(readonly, &h, ancestor.start as u32, ancestor.end as u32) {
                Ok(result) => *results[offset].lock().expect("result mutex poisoned") = Some(result),
                Err(e) => {
                    cancel.store(true, Ordering::Relaxed);
                    *failure.lock().expect("failure mutex poisoned") = Some(e.to_string());
                }
            }
        };

        if num_threads == 1 {
            for offset in 0..pending.len() {
                match_one(offset);
            }
        } else {
            let pool = ThreadPoolBuilder::new().num_threads(num_threads).build().map_err(|e| {
                OrchestratorError::InternalInvariant(format!("failed to build match-ancestors thread pool: {e}"))
            })?;
            pool.scope(|scope| {
                for offset in 0..pending.len() {
                    scope.spawn(move |_| match_one(offset));
                }
            });
        }

        if let Some(reason) = failure.into_inner().expect("failure mutex poisoned") {
            return Err(OrchestratorError::InternalInvariant(format!("ancestor matching failed: {reason}")));
        }
        if cancel.load(Ordering::Relaxed) {
            return Err(OrchestratorError::Cancelled);
        }

        let nodes_before = tsb.num_nodes();
        for (offset, result) in results.into_iter().enumerate() {
            let ancestor_id = pending[offset];
            let result = result
                .into_inner()
                .expect("result mutex poisoned")
                .expect("every result is filled when no failure occurred");
            let ancestor = sink.get(ancestor_id);
            tsb.add_path(ancestor_id as u32, &result.lefts, &result.rights, &result.parents, path_compression)
                .map_err(|e| OrchestratorError::InternalInvariant(e.to_string()))?;
            let sites: Vec<u32> = ancestor.focal_sites.iter().map(|&s| s as u32).collect();
            let derived = vec![1u8; sites.len()];
            tsb.add_mutations(ancestor_id as u32, &sites, &derived);
        }
        let extra_nodes = tsb.num_nodes() - nodes_before - pending.len();
        info!("finished epoch {}/{num_epochs}: {extra_nodes} extra node(s), {} edge(s) total", epoch_index + 1, tsb.num_edges());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use sample_data::{Ancestor, InMemoryAncestorSink};

    use super::*;

    fn ancestor(start: i32, end: i32, time: u32, focal_sites: Vec<i32>, haplotype: Vec<u8>) -> Ancestor {
        Ancestor { start, end, time, focal_sites, haplotype }
    }

    #[test]
    fn epoch_groups_splits_root_then_descending_real_runs() {
        let mut sink = InMemoryAncestorSink::new();
        sink.push(0, ancestor(0, 4, 5, vec![], vec![0, 0, 0, 0])).unwrap(); // ultimate
        sink.push(1, ancestor(0, 4, 4, vec![], vec![0, 0, 0, 0])).unwrap(); // root
        sink.push(2, ancestor(0, 4, 2, vec![2], vec![0, 0, 1, 0])).unwrap(); // freq 2, oldest real epoch
        sink.push(3, ancestor(0, 2, 1, vec![0], vec![1, 0])).unwrap(); // freq 1
        sink.push(4, ancestor(0, 2, 1, vec![1], vec![0, 1])).unwrap(); // freq 1

        let groups = epoch_groups(&sink);
        assert_eq!(groups, vec![1..2, 2..3, 3..5]);
    }
}
