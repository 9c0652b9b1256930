use std::collections::BTreeMap;

use crate::error::AncestorBuilderError;

/// Per-site bookkeeping the builder needs after registration: its frequency and
/// its full genotype vector (used later both by the break rule and by haplotype
/// materialization).
#[derive(Debug, Default)]
pub struct SiteRegistry {
    num_samples: u32,
    frequencies: Vec<Option<u32>>,
    genotypes: Vec<Option<Vec<u8>>>,
    /// frequency (desc. iteration) -> genotype pattern bytes (lex. asc.) -> site ids (asc.)
    buckets: BTreeMap<u32, BTreeMap<Vec<u8>, Vec<i32>>>,
}

impl SiteRegistry {
    #[must_use]
    pub fn new(num_samples: u32) -> Self {
        Self { num_samples, frequencies: Vec::new(), genotypes: Vec::new(), buckets: BTreeMap::new() }
    }

    /// Register site `site_id`'s frequency and genotype vector, and file it into
    /// the appropriate frequency/pattern bucket.
    pub fn add_site(&mut self, site_id: u32, frequency: u32, genotypes: &[u8]) -> Result<(), AncestorBuilderError> {
        if frequency <= 1 {
            return Err(AncestorBuilderError::FrequencyTooLow { site: site_id, frequency });
        }
        if genotypes.len() != self.num_samples as usize {
            return Err(AncestorBuilderError::GenotypeLengthMismatch {
                site: site_id,
                got: genotypes.len(),
                expected: self.num_samples as usize,
            });
        }

        let idx = site_id as usize;
        if self.frequencies.len() <= idx {
            self.frequencies.resize(idx + 1, None);
            self.genotypes.resize(idx + 1, None);
        }
        self.frequencies[idx] = Some(frequency);
        self.genotypes[idx] = Some(genotypes.to_vec());

        self.buckets
            .entry(frequency)
            .or_default()
            .entry(genotypes.to_vec())
            .or_default()
            .push(site_id as i32);

        Ok(())
    }

    #[must_use]
    pub fn num_registered(&self) -> u32 {
        self.frequencies.len() as u32
    }

    pub fn frequency(&self, site_id: i32) -> Result<u32, AncestorBuilderError> {
        self.frequencies
            .get(site_id as usize)
            .copied()
            .flatten()
            .ok_or(AncestorBuilderError::UnregisteredSite { site: site_id as u32 })
    }

    pub fn genotypes(&self, site_id: i32) -> Result<&[u8], AncestorBuilderError> {
        self.genotypes
            .get(site_id as usize)
            .and_then(Option::as_deref)
            .ok_or(AncestorBuilderError::UnregisteredSite { site: site_id as u32 })
    }

    /// Frequency buckets in **decreasing** frequency order, each holding its
    /// genotype-pattern groups in lexicographic (ascending) byte order.
    pub fn buckets_desc(&self) -> impl Iterator<Item = (u32, &BTreeMap<Vec<u8>, Vec<i32>>)> {
        self.buckets.iter().rev().map(|(&f, m)| (f, m))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_low_frequency() {
        let mut reg = SiteRegistry::new(4);
        let err = reg.add_site(0, 1, &[1, 0, 0, 0]).unwrap_err();
        assert!(matches!(err, AncestorBuilderError::FrequencyTooLow { site: 0, frequency: 1 }));
    }

    #[test]
    fn buckets_are_desc_by_frequency_then_lex_by_pattern() {
        let mut reg = SiteRegistry::new(4);
        reg.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        reg.add_site(1, 3, &[1, 1, 1, 0]).unwrap();
        reg.add_site(2, 2, &[0, 1, 1, 0]).unwrap();

        let freqs: Vec<u32> = reg.buckets_desc().map(|(f, _)| f).collect();
        assert_eq!(freqs, vec![3, 2]);

        let (_, freq2_patterns) = reg.buckets_desc().nth(1).unwrap();
        let keys: Vec<&Vec<u8>> = freq2_patterns.keys().collect();
        assert_eq!(keys, vec![&vec![0u8, 1, 1, 0], &vec![1u8, 1, 0, 0]]);
    }
}
