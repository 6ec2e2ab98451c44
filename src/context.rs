//! Per-run state shared read-only by every worker.
//!
//! One [`RunContext`] exists per engine run. It carries the taxon masks of
//! the round, the dropset size bound, and the per-taxon random values the
//! dropset hash is built from. The random values are drawn once per analysis
//! and shared by all of its rounds, so a dropset hashes identically in every
//! round.

use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

use crate::bitset::Bitset;

/// Taxon masks for one run.
///
/// - `dropped`: taxa removed in earlier rounds
/// - `droppable`: taxa that may appear in a dropset; a candidate touching any
///   other taxon is rejected whole
/// - `padding`: bits beyond the taxon count
#[derive(Clone, Debug)]
pub struct TaxonMasks {
    pub dropped: Bitset,
    pub droppable: Bitset,
    pub padding: Bitset,
}

impl TaxonMasks {
    /// Masks for `num_taxa` taxa: everything not dropped and not `excluded` is droppable.
    pub fn new(num_taxa: usize, dropped: Bitset, excluded: &Bitset) -> Self {
        let words = Bitset::words_for(num_taxa);
        let mut droppable = Bitset::ones(words, num_taxa);
        droppable.and_not_assign(&dropped);
        droppable.and_not_assign(excluded);
        TaxonMasks {
            dropped,
            droppable,
            padding: Bitset::padding(words, num_taxa),
        }
    }

    /// Taxa that are neither dropped nor padding.
    pub fn live(&self) -> Bitset {
        let mut live = Bitset::zeros(self.padding.words());
        live.or_assign(&self.dropped);
        live.or_assign(&self.padding);
        for w in live.0.iter_mut() {
            *w = !*w;
        }
        live
    }
}

#[derive(Clone, Debug)]
pub struct RunContext {
    pub num_taxa: usize,
    pub max_dropset_size: usize,
    pub masks: TaxonMasks,
    taxon_hashes: Arc<[u32]>,
}

impl RunContext {
    pub fn new(
        num_taxa: usize,
        max_dropset_size: usize,
        masks: TaxonMasks,
        taxon_hashes: Arc<[u32]>,
    ) -> Self {
        assert!(
            taxon_hashes.len() >= num_taxa,
            "{} taxon hash values for {num_taxa} taxa",
            taxon_hashes.len()
        );
        RunContext {
            num_taxa,
            max_dropset_size,
            masks,
            taxon_hashes,
        }
    }

    /// One random 32-bit value per taxon, reproducible from `seed`.
    pub fn random_taxon_hashes(num_taxa: usize, seed: u64) -> Arc<[u32]> {
        let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
        (0..num_taxa).map(|_| rng.next_u32()).collect()
    }

    pub fn taxon_hashes(&self) -> Arc<[u32]> {
        Arc::clone(&self.taxon_hashes)
    }

    /// Number of u64 words per taxon bit vector.
    #[inline]
    pub fn words(&self) -> usize {
        Bitset::words_for(self.num_taxa)
    }

    pub fn live_taxa(&self) -> Bitset {
        self.masks.live()
    }

    pub fn live_count(&self) -> usize {
        self.num_taxa - self.masks.dropped.count_ones()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_masks() {
        let mut dropped = Bitset::zeros(1);
        dropped.set(2);
        let mut excluded = Bitset::zeros(1);
        excluded.set(4);

        let masks = TaxonMasks::new(6, dropped, &excluded);
        assert_eq!(masks.droppable.iter_ones().collect::<Vec<_>>(), vec![0, 1, 3, 5]);
        assert_eq!(masks.live().iter_ones().collect::<Vec<_>>(), vec![0, 1, 3, 4, 5]);
        assert_eq!(masks.padding.count_ones(), 64 - 6);
    }

    #[test]
    fn test_hashes_are_reproducible() {
        let a = RunContext::random_taxon_hashes(50, 7);
        let b = RunContext::random_taxon_hashes(50, 7);
        let c = RunContext::random_taxon_hashes(50, 8);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 50);
    }

    #[test]
    fn test_live_count() {
        let mut dropped = Bitset::zeros(2);
        dropped.set(65);
        let masks = TaxonMasks::new(70, dropped, &Bitset::zeros(2));
        let ctx = RunContext::new(70, 2, masks, RunContext::random_taxon_hashes(70, 1));
        assert_eq!(ctx.live_count(), 69);
        assert_eq!(ctx.live_taxa().count_ones(), 69);
        assert_eq!(ctx.words(), 2);
    }
}
