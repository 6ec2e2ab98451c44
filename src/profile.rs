//! The bipartition profile of a tree collection.
//!
//! # Overview
//! The profile lists every distinct non-trivial split seen in the collection
//! exactly once, together with the set of trees that contain it. Taxa that
//! were dropped in earlier rounds are projected away before splits are
//! compared, so two splits that only differed in dropped taxa become one
//! profile element.
//!
//! # Canonical form
//! As in the snapshots, a split is stored as the side that does not contain
//! the *first live taxon* (the smallest taxon index that is not dropped).

use std::collections::HashMap;

use crate::bitset::Bitset;
use crate::error::Result;
use crate::snapshot::{TreeSnapshot, check_same_taxa};

/// One distinct split of the collection.
#[derive(Clone, Debug)]
pub struct ProfileElem {
    /// Dense id, equal to the element's position in the profile.
    pub id: usize,
    /// Taxa on the stored side of the split.
    pub bits: Bitset,
    /// Trees containing the split.
    pub trees: Bitset,
    /// `bits.count_ones()`, cached.
    pub num_bits: usize,
}

impl ProfileElem {
    /// Number of trees containing this split.
    #[inline]
    pub fn support(&self) -> usize {
        self.trees.count_ones()
    }
}

#[derive(Clone, Debug)]
pub struct BipartitionProfile {
    elems: Vec<ProfileElem>,
    taxa: Vec<String>,
    num_trees: usize,
    live_taxa: usize,
    /// Element ids ordered by `num_bits`.
    by_bits: Vec<usize>,
}

impl BipartitionProfile {
    /// Builds the profile of a collection of snapshots, ignoring `dropped` taxa.
    ///
    /// # Errors
    /// Fails when there are no snapshots or their taxa differ.
    pub fn from_snapshots(snapshots: &[TreeSnapshot], dropped: &Bitset) -> Result<Self> {
        check_same_taxa(snapshots)?;
        let taxa = snapshots[0].taxa.clone();
        let splits = snapshots
            .iter()
            .enumerate()
            .flat_map(|(tree, snap)| snap.parts.iter().map(move |part| (part.clone(), tree)));
        Ok(Self::from_splits(taxa, snapshots.len(), splits, dropped))
    }

    /// Builds a profile from `(split, tree index)` observations.
    ///
    /// Splits may be given in either orientation and may include dropped
    /// taxa. After projection, trivial splits are discarded and equal
    /// splits are merged.
    pub fn from_splits(
        taxa: Vec<String>,
        num_trees: usize,
        splits: impl IntoIterator<Item = (Bitset, usize)>,
        dropped: &Bitset,
    ) -> Self {
        let num_taxa = taxa.len();
        let words = Bitset::words_for(num_taxa);
        let mut live = Bitset::ones(words, num_taxa);
        live.and_not_assign(dropped);
        let live_taxa = live.count_ones();
        let anchor = live.first_one();
        let tree_words = Bitset::words_for(num_trees);

        let mut seen: HashMap<Bitset, Bitset> = HashMap::new();
        for (mut bits, tree) in splits {
            bits.and_assign(&live);
            if anchor.is_some_and(|a| bits.test(a)) {
                let mut flipped = live.clone();
                flipped.and_not_assign(&bits);
                bits = flipped;
            }
            let ones = bits.count_ones();
            if ones <= 1 || ones + 1 >= live_taxa {
                continue;
            }
            seen.entry(bits)
                .or_insert_with(|| Bitset::zeros(tree_words))
                .set(tree);
        }

        let mut splits: Vec<(Bitset, Bitset)> = seen.into_iter().collect();
        splits.sort_unstable();

        let elems: Vec<ProfileElem> = splits
            .into_iter()
            .enumerate()
            .map(|(id, (bits, trees))| ProfileElem {
                id,
                num_bits: bits.count_ones(),
                bits,
                trees,
            })
            .collect();

        let mut by_bits: Vec<usize> = (0..elems.len()).collect();
        by_bits.sort_by_key(|&id| (elems[id].num_bits, id));

        BipartitionProfile {
            elems,
            taxa,
            num_trees,
            live_taxa,
            by_bits,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.elems.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.elems.is_empty()
    }

    #[inline]
    pub fn get(&self, id: usize) -> &ProfileElem {
        &self.elems[id]
    }

    pub fn elems(&self) -> &[ProfileElem] {
        &self.elems
    }

    /// Taxon names in bit order.
    pub fn taxa(&self) -> &[String] {
        &self.taxa
    }

    pub fn num_taxa(&self) -> usize {
        self.taxa.len()
    }

    pub fn num_trees(&self) -> usize {
        self.num_trees
    }

    /// Number of taxa that are not dropped.
    pub fn live_taxa(&self) -> usize {
        self.live_taxa
    }

    /// Elements whose split side holds between `lo` and `hi` taxa (inclusive).
    pub fn with_bit_count(&self, lo: usize, hi: usize) -> impl Iterator<Item = &ProfileElem> {
        let start = self
            .by_bits
            .partition_point(|&id| self.elems[id].num_bits < lo);
        let end = self
            .by_bits
            .partition_point(|&id| self.elems[id].num_bits <= hi);
        self.by_bits[start..end.max(start)]
            .iter()
            .map(|&id| &self.elems[id])
    }

    /// Elements that may still gain support: those missing from at least one tree.
    pub fn candidates(&self) -> Bitset {
        let mut candidates = Bitset::zeros(Bitset::words_for(self.elems.len()));
        for elem in self.elems.iter().filter(|e| e.support() < self.num_trees) {
            candidates.set(elem.id);
        }
        candidates
    }
}
