use sample_data::UNKNOWN_ALLELE;

use crate::error::AncestorBuilderError;
use crate::registry::SiteRegistry;

/// Extend the partially-built haplotype `a` over `sites`, using `focal_site`'s
/// genotype column as the reference pattern.
///
/// For each candidate site `l` (in iteration order): if `l` is no higher
/// frequency than the focal site, it's set to `0` unconditionally (older,
/// more common variation is assumed absent from this ancestor). If `l` is
/// higher frequency, it can only be resolved when the carriers of the focal
/// pattern agree unanimously at `l`; the first site where they don't forces a
/// stop, leaving everything beyond it at `UNKNOWN_ALLELE`.
fn extend(
    registry: &SiteRegistry,
    focal_site: i32,
    sites: impl Iterator<Item = i32>,
    a: &mut [u8],
) -> Result<(), AncestorBuilderError> {
    let focal_genotypes = registry.genotypes(focal_site)?;
    let carriers: Vec<usize> =
        focal_genotypes.iter().enumerate().filter(|&(_, &g)| g == 1).map(|(i, _)| i).collect();
    let focal_frequency = registry.frequency(focal_site)?;

    for l in sites {
        if registry.frequency(l)? > focal_frequency {
            let g_l = registry.genotypes(l)?;
            let num_ones = carriers.iter().filter(|&&s| g_l[s] == 1).count();
            if num_ones == carriers.len() {
                a[l as usize] = 1;
            } else if num_ones == 0 {
                a[l as usize] = 0;
            } else {
                break;
            }
        } else {
            a[l as usize] = 0;
        }
    }
    Ok(())
}

/// Materialize the haplotype for one set of focal sites: extend rightward past
/// the last focal site (keyed off the first), leftward before the first focal
/// site (keyed off the last), then fill the interior between them (keyed off
/// the last again), before pinning every focal site to `1`.
///
/// Returns `(start, end, haplotype)` where `haplotype` spans `[start, end)` and
/// is guaranteed free of `UNKNOWN_ALLELE`.
pub fn make_ancestor(
    registry: &SiteRegistry,
    focal_sites: &[i32],
) -> Result<(u32, u32, Vec<u8>), AncestorBuilderError> {
    let num_sites = registry.num_registered() as i32;
    let mut a = vec![UNKNOWN_ALLELE; num_sites as usize];

    let first_focal = focal_sites[0];
    let last_focal = *focal_sites.last().expect("focal_sites is never empty");

    extend(registry, first_focal, (last_focal + 1)..num_sites, &mut a)?;
    extend(registry, last_focal, (0..first_focal).rev(), &mut a)?;
    for j in first_focal..=last_focal {
        if focal_sites.contains(&j) {
            a[j as usize] = 1;
        } else {
            extend(registry, last_focal, std::iter::once(j), &mut a)?;
        }
    }

    let start = a
        .iter()
        .position(|&x| x != UNKNOWN_ALLELE)
        .expect("focal sites are always set to 1, so at least one known entry exists") as u32;
    let last_known = a
        .iter()
        .rposition(|&x| x != UNKNOWN_ALLELE)
        .expect("focal sites are always set to 1, so at least one known entry exists");
    let end = last_known as u32 + 1;

    debug_assert!(a[start as usize..end as usize].iter().all(|&x| x != UNKNOWN_ALLELE));
    Ok((start, end, a[start as usize..end as usize].to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_focal_site_minimal_context() {
        let mut reg = SiteRegistry::new(4);
        reg.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        let (start, end, hap) = make_ancestor(&reg, &[0]).unwrap();
        assert_eq!((start, end), (0, 1));
        assert_eq!(hap, vec![1]);
    }

    #[test]
    fn extends_using_unanimous_higher_frequency_neighbours() {
        let mut reg = SiteRegistry::new(4);
        // focal site 1, freq 2, carriers {0,1}
        reg.add_site(0, 3, &[1, 1, 1, 0]).unwrap(); // to the left, higher freq, unanimous-1 among carriers -> 1
        reg.add_site(1, 2, &[1, 1, 0, 0]).unwrap();
        reg.add_site(2, 3, &[0, 0, 1, 0]).unwrap(); // to the right, higher freq, unanimous-0 among carriers -> 0

        let (start, end, hap) = make_ancestor(&reg, &[1]).unwrap();
        assert_eq!((start, end), (0, 3));
        assert_eq!(hap, vec![1, 1, 0]);
    }

    #[test]
    fn stops_extension_at_first_ambiguous_higher_frequency_site() {
        let mut reg = SiteRegistry::new(4);
        reg.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        // site 1 is higher freq and ambiguous among carriers {0,1}: values [1,0] -> stop, leave site 2 unknown.
        reg.add_site(1, 3, &[1, 0, 1, 0]).unwrap();
        reg.add_site(2, 3, &[1, 1, 1, 0]).unwrap();

        let (start, end, hap) = make_ancestor(&reg, &[0]).unwrap();
        assert_eq!((start, end), (0, 1));
        assert_eq!(hap, vec![1]);
    }

    #[test]
    fn lower_or_equal_frequency_neighbours_are_always_zero() {
        let mut reg = SiteRegistry::new(4);
        reg.add_site(0, 2, &[1, 1, 1, 0]).unwrap(); // lower freq than focal -> forced to 0
        reg.add_site(1, 3, &[1, 1, 0, 0]).unwrap();

        let (start, end, hap) = make_ancestor(&reg, &[1]).unwrap();
        assert_eq!((start, end), (0, 2));
        assert_eq!(hap, vec![0, 1]);
    }

    #[test]
    fn multi_focal_site_run_fills_interior_and_pins_focal_sites() {
        let mut reg = SiteRegistry::new(4);
        reg.add_site(0, 2, &[1, 1, 0, 0]).unwrap();
        // interior, non-focal, same frequency as the focal run -> forced to 0 unconditionally
        reg.add_site(1, 2, &[0, 0, 1, 1]).unwrap();
        reg.add_site(2, 2, &[1, 1, 0, 0]).unwrap();

        let (start, end, hap) = make_ancestor(&reg, &[0, 2]).unwrap();
        assert_eq!((start, end), (0, 3));
        assert_eq!(hap, vec![1, 0, 1]);
    }
}
