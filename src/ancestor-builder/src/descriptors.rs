use crate::error::AncestorBuilderError;
use crate::registry::SiteRegistry;

/// One `(frequency, focal_sites)` ancestor descriptor, emitted in decreasing
/// frequency and deterministic pattern order.
#[derive(Debug, Clone, PartialEq)]
pub struct Descriptor {
    pub frequency: u32,
    pub focal_sites: Vec<i32>,
}

/// Sample indices carrying the derived allele in `pattern` (i.e. the `S` set of
/// §4.1: the samples whose genotype equals `1` in this pattern key).
fn carriers(pattern: &[u8]) -> Vec<usize> {
    pattern.iter().enumerate().filter(|&(_, &g)| g == 1).map(|(i, _)| i).collect()
}

/// The break rule: should the run of focal sites be split between `a` and `b`
/// (both indices of the same frequency/pattern bucket)?
///
/// Splits whenever an intervening inference site `k` strictly between `a` and `b`
/// has a higher frequency than `a`'s, and its genotype restricted to `carriers` is
/// neither all-0 nor all-1 (i.e. it can't unambiguously extend the ancestor
/// either way).
fn should_break(registry: &SiteRegistry, a: i32, b: i32, carriers: &[usize]) -> Result<bool, AncestorBuilderError> {
    let freq_a = registry.frequency(a)?;
    for k in (a + 1)..b {
        if registry.frequency(k)? > freq_a {
            let genotypes_k = registry.genotypes(k)?;
            let all_one = carriers.iter().all(|&s| genotypes_k[s] == 1);
            let all_zero = carriers.iter().all(|&s| genotypes_k[s] == 0);
            if !all_one && !all_zero {
                return Ok(true);
            }
        }
    }
    Ok(false)
}

/// Enumerate all ancestor descriptors from a fully-populated [`SiteRegistry`], in
/// the order the spec requires: decreasing frequency, lexicographic pattern-byte
/// order within a frequency, and maximal break-rule runs within a pattern.
pub fn ancestor_descriptors(registry: &SiteRegistry) -> Result<Vec<Descriptor>, AncestorBuilderError> {
    let mut out = Vec::new();
    for (frequency, patterns) in registry.buckets_desc() {
        for (pattern, sites) in patterns {
            let carrier_set = carriers(pattern);
            let mut run_start = 0usize;
            for j in 0..sites.len().saturating_sub(1) {
                if should_break(registry, sites[j], sites[j + 1], &carrier_set)? {
                    out.push(Descriptor { frequency, focal_sites: sites[run_start..=j].to_vec() });
                    run_start = j + 1;
                }
            }
            out.push(Descriptor { frequency, focal_sites: sites[run_start..].to_vec() });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_site_descriptor() {
        let mut reg = SiteRegistry::new(3);
        reg.add_site(0, 2, &[1, 1, 0]).unwrap();
        let d = ancestor_descriptors(&reg).unwrap();
        assert_eq!(d, vec![Descriptor { frequency: 2, focal_sites: vec![0] }]);
    }

    #[test]
    fn same_pattern_sites_merge_into_one_descriptor_absent_break() {
        let mut reg = SiteRegistry::new(4);
        // Two sites sharing the exact same pattern, no intervening higher-freq site.
        reg.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        reg.add_site(1, 2, &[1, 1, 0, 0]).unwrap();
        let d = ancestor_descriptors(&reg).unwrap();
        assert_eq!(d, vec![Descriptor { frequency: 2, focal_sites: vec![0, 1] }]);
    }

    #[test]
    fn ambiguous_intervening_higher_freq_site_splits_run() {
        let mut reg = SiteRegistry::new(4);
        reg.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        // site 1 has higher frequency (3) and is ambiguous among carriers {0,1}: genotypes [1,0,..] -> not all-0/all-1.
        reg.add_site(1, 3, &[1, 0, 1, 0]).unwrap();
        reg.add_site(2, 2, &[1, 1, 0, 0]).unwrap();
        let d = ancestor_descriptors(&reg).unwrap();
        assert_eq!(
            d,
            vec![
                Descriptor { frequency: 3, focal_sites: vec![1] },
                Descriptor { frequency: 2, focal_sites: vec![0] },
                Descriptor { frequency: 2, focal_sites: vec![2] },
            ]
        );
    }

    #[test]
    fn unambiguous_intervening_site_does_not_split() {
        let mut reg = SiteRegistry::new(4);
        reg.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        // site 1 has higher frequency but is all-1 among carriers {0,1}: unambiguous, no split.
        reg.add_site(1, 3, &[1, 1, 1, 0]).unwrap();
        reg.add_site(2, 2, &[1, 1, 0, 0]).unwrap();
        let d = ancestor_descriptors(&reg).unwrap();
        assert_eq!(d, vec![Descriptor { frequency: 2, focal_sites: vec![0, 2] }]);
    }
}
