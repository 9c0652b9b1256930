use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use ancestor_builder::{synthetic_ancestors, AncestorBuilder, AncestorPlan};
use log::info;
use sample_data::{Ancestor, AncestorSink, InMemoryAncestorSink};

use crate::error::OrchestratorError;

/// Materialize every descriptor in `plan` into an [`Ancestor`] and commit them,
/// in strictly ascending index order, to a fresh [`InMemoryAncestorSink`].
///
/// Index `0` is always the ultimate ancestor (never matched, lands on node 0),
/// index `1` the root ancestor (matched first, anchoring everything else),
/// indices `2..` the builder's own descriptors in emission order.
///
/// `num_threads == 0` uses rayon's default pool size; `num_threads == 1` runs
/// `make_ancestor` sequentially on the calling thread, skipping pool setup
/// entirely. `make_ancestor` is read-only over the registered site data, so
/// descriptors may be computed in any order; only the final commit order is
/// constrained. `cancel` is polled between descriptors so a failure in one
/// worker stops the others from doing further useless work.
pub fn generate_ancestors(
    builder: &AncestorBuilder,
    plan: &AncestorPlan,
    num_threads: usize,
    cancel: &AtomicBool,
) -> Result<InMemoryAncestorSink, OrchestratorError> {
    let num_sites = builder.num_sites();
    let mut sink = InMemoryAncestorSink::with_capacity(plan.descriptors.len() + 2);

    let (root, ultimate) = synthetic_ancestors(num_sites, plan.root_time, plan.ultimate_time);
    sink.push(0, ultimate).map_err(|e| OrchestratorError::InternalInvariant(e.to_string()))?;
    sink.push(1, root).map_err(|e| OrchestratorError::InternalInvariant(e.to_string()))?;

    if plan.descriptors.is_empty() {
        return Ok(sink);
    }

    info!("generating {} ancestors across {} thread(s)", plan.descriptors.len(), num_threads);

    let slots: Vec<Mutex<Option<Ancestor>>> = (0..plan.descriptors.len()).map(|_| Mutex::new(None)).collect();
    let failure: Mutex<Option<String>> = Mutex::new(None);

    let fill_slot = |i: usize| {
        if cancel.load(Ordering::Relaxed) {
            return;
        }
        let (time, descriptor) = &plan.descriptors[i];
        match builder.make_ancestor(&descriptor.focal_sites) {
            Ok((start, end, haplotype)) => {
                *slots[i].lock().expect("slot mutex poisoned") =
                    Some(Ancestor { start, end, time: *time, focal_sites: descriptor.focal_sites.clone(), haplotype });
            }
            Err(e) => {
                cancel.store(true, Ordering::Relaxed);
                *failure.lock().expect("failure mutex poisoned") = Some(e.to_string());
            }
        }
    };

    if num_threads == 1 {
        for i in 0..plan.descriptors.len() {
            fill_slot(i);
        }
    } else {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| OrchestratorError::InternalInvariant(format!("failed to build ancestor-generation thread pool: {e}")))?;
        pool.scope(|scope| {
            for i in 0..plan.descriptors.len() {
                scope.spawn(|_| fill_slot(i));
            }
        });
    }

    if let Some(reason) = failure.into_inner().expect("failure mutex poisoned") {
        return Err(OrchestratorError::InternalInvariant(format!("ancestor generation failed: {reason}")));
    }
    if cancel.load(Ordering::Relaxed) {
        return Err(OrchestratorError::Cancelled);
    }

    for (offset, slot) in slots.into_iter().enumerate() {
        let ancestor = slot.into_inner().expect("slot mutex poisoned").expect("every slot is filled when no failure occurred");
        sink.push(offset + 2, ancestor).map_err(|e| OrchestratorError::InternalInvariant(e.to_string()))?;
    }

    Ok(sink)
}
