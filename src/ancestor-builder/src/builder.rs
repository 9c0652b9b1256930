use sample_data::Ancestor;

use crate::descriptors::{ancestor_descriptors, Descriptor};
use crate::error::AncestorBuilderError;
use crate::haplotype::make_ancestor;
use crate::registry::SiteRegistry;
use crate::time_map::TimeMap;

/// The full descriptor/time plan for a population of inference sites: every
/// descriptor `ancestor_descriptors` emits, paired with its time (equal to its
/// frequency), plus the two synthetic ancestor times that sit above every real
/// one.
#[derive(Debug)]
pub struct AncestorPlan {
    /// `(time, descriptor)` pairs, in emission order (decreasing frequency,
    /// lexicographic pattern, break-rule runs).
    pub descriptors: Vec<(u32, Descriptor)>,
    pub root_time: u32,
    pub ultimate_time: u32,
}

/// Groups inference sites by frequency and genotype pattern, emits ancestor
/// descriptors in deterministic order, and materializes each descriptor's
/// haplotype on request.
#[derive(Debug, Default)]
pub struct AncestorBuilder {
    registry: SiteRegistry,
}

impl AncestorBuilder {
    #[must_use]
    pub fn new(num_samples: u32) -> Self {
        Self { registry: SiteRegistry::new(num_samples) }
    }

    /// Register an inference site. `frequency` must be `> 1`.
    pub fn add_site(&mut self, site_id: u32, frequency: u32, genotypes: &[u8]) -> Result<(), AncestorBuilderError> {
        self.registry.add_site(site_id, frequency, genotypes)
    }

    #[must_use]
    pub fn num_sites(&self) -> u32 {
        self.registry.num_registered()
    }

    /// Enumerate descriptors and assign each a dense integer time, plus the
    /// root/ultimate times sitting above them.
    pub fn plan(&self) -> Result<AncestorPlan, AncestorBuilderError> {
        let descriptors = ancestor_descriptors(&self.registry)?;
        let mut time_map = TimeMap::new();
        let timed = descriptors.into_iter().map(|d| (time_map.time_for(d.frequency), d)).collect();
        Ok(AncestorPlan { descriptors: timed, root_time: time_map.root_time(), ultimate_time: time_map.ultimate_time() })
    }

    /// Materialize one descriptor's haplotype: `(start, end, h[start:end])`.
    pub fn make_ancestor(&self, focal_sites: &[i32]) -> Result<(u32, u32, Vec<u8>), AncestorBuilderError> {
        make_ancestor(&self.registry, focal_sites)
    }
}

/// The two synthetic ancestors always prepended before any builder-emitted
/// ancestor. The ultimate ancestor is the oldest and is pushed first, landing
/// on node 0; it is never matched against (it exists only so ancestor index
/// and tree-sequence node id stay aligned). The root ancestor is pushed
/// second, lands on node 1, and is the one actually matched: with no edges
/// yet in the tree it copies entirely from node 0, anchoring everything else.
/// Both span the whole sequence with an all-zero haplotype and no focal sites.
#[must_use]
pub fn synthetic_ancestors(num_sites: u32, root_time: u32, ultimate_time: u32) -> (Ancestor, Ancestor) {
    (Ancestor::synthetic(num_sites, root_time), Ancestor::synthetic(num_sites, ultimate_time))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_assigns_time_equal_to_frequency_and_root_ultimate_above_all() {
        let mut builder = AncestorBuilder::new(4);
        builder.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        builder.add_site(1, 3, &[1, 1, 1, 0]).unwrap();
        let plan = builder.plan().unwrap();

        assert_eq!(plan.descriptors.len(), 2);
        let times: Vec<u32> = plan.descriptors.iter().map(|(t, _)| *t).collect();
        assert_eq!(times, vec![3, 2]); // freq 3 seen first (emission order), time == frequency
        assert_eq!(plan.root_time, 4);
        assert_eq!(plan.ultimate_time, 5);
    }

    #[test]
    fn synthetic_ancestors_span_whole_sequence_with_no_focal_sites() {
        let (root, ultimate) = synthetic_ancestors(5, 3, 4);
        assert_eq!((root.start, root.end), (0, 5));
        assert!(root.focal_sites.is_empty());
        assert_eq!(root.haplotype, vec![0; 5]);
        assert_eq!(ultimate.time, 4);
        assert_eq!(root.time, 3);
    }

    #[test]
    fn end_to_end_plan_and_materialize() {
        let mut builder = AncestorBuilder::new(4);
        builder.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        let plan = builder.plan().unwrap();
        let (time, descriptor) = &plan.descriptors[0];
        let (start, end, hap) = builder.make_ancestor(&descriptor.focal_sites).unwrap();
        assert_eq!(*time, 2);
        assert_eq!((start, end), (0, 1));
        assert_eq!(hap, vec![1]);
    }
}
