//! Compact bitset representation for taxon sets and tree sets.
//!
//! # Overview
//! A bitset records which taxa lie on one side of a split, which taxa have
//! already been dropped, or which trees of the collection contain a split.
//! Each bit position corresponds to a taxon (or tree) index.
//!
//! # Example
//! For a collection with taxa [A, B, C, D] mapped to indices [0, 1, 2, 3]:
//! - Split side {A, C} → bitset `0b0101` (bits 0 and 2 set)
//! - Split side {B, C, D} → bitset `0b1110` (bits 1, 2, 3 set)

/// Number of bits held by one word.
pub const WORD_BITS: usize = 64;

/// A compact bitset over taxon (or tree) indices.
///
/// Internally stores bits in `Vec<u64>` words to support arbitrarily large trees.
/// Each u64 word holds 64 indices.
///
/// # Memory efficiency
/// - Traditional HashSet<usize>: ~24 bytes per element + overhead
/// - Bitset: 1 bit per possible element (8 bytes per 64 taxa)
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Bitset(pub Vec<u64>);

impl Bitset {
    /// Creates a new bitset with all bits set to 0.
    ///
    /// # Parameters
    /// - `words`: Number of u64 words needed. Calculate with [`Bitset::words_for`].
    ///
    /// # Example
    /// ```
    /// # use rogue_dropsets::bitset::Bitset;
    /// // For 100 taxa, need 2 words (128 bits)
    /// let bs = Bitset::zeros(2);
    /// assert_eq!(bs.0.len(), 2);
    /// ```
    pub fn zeros(words: usize) -> Self {
        Bitset(vec![0u64; words])
    }

    /// Number of words needed to hold `bits` indices.
    #[inline]
    pub fn words_for(bits: usize) -> usize {
        bits.div_ceil(WORD_BITS)
    }

    /// Creates a bitset with bits `0..len` set.
    pub fn ones(words: usize, len: usize) -> Self {
        let mut bs = Bitset::zeros(words);
        for idx in 0..len {
            bs.set(idx);
        }
        bs
    }

    /// The trailing bits of the last word that lie beyond `len`.
    ///
    /// These bits never correspond to a taxon and must never be counted.
    ///
    /// # Example
    /// ```
    /// # use rogue_dropsets::bitset::Bitset;
    /// let pad = Bitset::padding(1, 60);
    /// assert_eq!(pad.count_ones(), 4);
    /// assert!(pad.test(60) && !pad.test(59));
    /// ```
    pub fn padding(words: usize, len: usize) -> Self {
        let mut bs = Bitset::zeros(words);
        for idx in len..words * WORD_BITS {
            bs.set(idx);
        }
        bs
    }

    /// Number of words backing this bitset.
    #[inline]
    pub fn words(&self) -> usize {
        self.0.len()
    }

    /// Sets the bit at the given index to 1.
    ///
    /// # Example
    /// ```
    /// # use rogue_dropsets::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(5);
    /// assert_eq!(bs.0[0], 0b00100001);
    /// ```
    #[inline]
    pub fn set(&mut self, idx: usize) {
        let word = idx >> 6;     // Equivalent to idx / 64
        let bit = idx & 63;      // Equivalent to idx % 64
        self.0[word] |= 1u64 << bit;
    }

    /// Clears the bit at the given index.
    #[inline]
    pub fn clear(&mut self, idx: usize) {
        self.0[idx >> 6] &= !(1u64 << (idx & 63));
    }

    /// Returns whether the bit at `idx` is set. Out-of-range indices read as unset.
    #[inline]
    pub fn test(&self, idx: usize) -> bool {
        self.0
            .get(idx >> 6)
            .is_some_and(|w| w & (1u64 << (idx & 63)) != 0)
    }

    /// Performs bitwise OR with another bitset (union operation).
    ///
    /// Merges two sets: `self` becomes `self ∪ other`
    ///
    /// # Example
    /// ```
    /// # use rogue_dropsets::bitset::Bitset;
    /// let mut left = Bitset::zeros(1);
    /// left.set(0);   // {0}
    ///
    /// let mut right = Bitset::zeros(1);
    /// right.set(1);  // {1}
    ///
    /// left.or_assign(&right);  // {0} ∪ {1} = {0, 1}
    /// assert_eq!(left.0[0], 0b11);
    /// ```
    #[inline]
    pub fn or_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a |= *b;
        }
    }

    /// Bitwise AND: `self` becomes `self ∩ other`.
    #[inline]
    pub fn and_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a &= *b;
        }
    }

    /// Removes every bit of `other`: `self` becomes `self \ other`.
    #[inline]
    pub fn and_not_assign(&mut self, other: &Bitset) {
        for (a, b) in self.0.iter_mut().zip(&other.0) {
            *a &= !*b;
        }
    }

    /// Returns whether the two bitsets share at least one set bit.
    #[inline]
    pub fn intersects(&self, other: &Bitset) -> bool {
        self.0.iter().zip(&other.0).any(|(a, b)| a & b != 0)
    }

    /// Returns whether no bit is set.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(|&w| w == 0)
    }

    /// Counts the number of set bits (population count).
    ///
    /// # Example
    /// ```
    /// # use rogue_dropsets::bitset::Bitset;
    /// let mut bs = Bitset::zeros(1);
    /// bs.set(0);
    /// bs.set(2);
    /// bs.set(5);
    /// assert_eq!(bs.count_ones(), 3);
    /// ```
    #[inline]
    pub fn count_ones(&self) -> usize {
        self.0.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// Iterates over the indices of set bits in increasing order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().enumerate().flat_map(|(i, &word)| {
            let mut rest = word;
            std::iter::from_fn(move || {
                if rest == 0 {
                    return None;
                }
                let bit = rest.trailing_zeros() as usize;
                rest &= rest - 1;
                Some(i * WORD_BITS + bit)
            })
        })
    }

    /// Index of the lowest set bit, if any.
    pub fn first_one(&self) -> Option<usize> {
        self.iter_ones().next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bitset_basic() {
        let mut bs = Bitset::zeros(1);
        bs.set(0);
        bs.set(2);
        assert_eq!(bs.0[0], 0b0101);
        assert!(bs.test(2));
        bs.clear(2);
        assert!(!bs.test(2));
        assert!(!bs.test(500));
    }

    #[test]
    fn test_bitset_or_and() {
        let mut bs1 = Bitset::zeros(1);
        bs1.set(0);
        bs1.set(1);

        let mut bs2 = Bitset::zeros(1);
        bs2.set(1);
        bs2.set(3);

        let mut union = bs1.clone();
        union.or_assign(&bs2);
        assert_eq!(union.0[0], 0b1011);

        let mut inter = bs1.clone();
        inter.and_assign(&bs2);
        assert_eq!(inter.0[0], 0b0010);

        let mut minus = bs1.clone();
        minus.and_not_assign(&bs2);
        assert_eq!(minus.0[0], 0b0001);

        assert!(bs1.intersects(&bs2));
        assert!(!minus.intersects(&bs2));
    }

    /// Trailing bits beyond the taxon count form the padding mask.
    ///
    /// ```text
    /// 70 taxa → 2 words, bits 70..128 are padding
    /// ```
    #[test]
    fn test_padding_and_ones() {
        let pad = Bitset::padding(2, 70);
        assert_eq!(pad.count_ones(), 128 - 70);
        assert!(!pad.test(69));
        assert!(pad.test(70));

        let all = Bitset::ones(2, 70);
        assert_eq!(all.count_ones(), 70);
        assert!(!all.intersects(&pad));
    }

    #[test]
    fn test_iter_ones_large() {
        // Test with more than 64 taxa (multiple words)
        let mut bs = Bitset::zeros(2);
        bs.set(0);    // First word
        bs.set(63);   // Last bit of first word
        bs.set(64);   // First bit of second word
        bs.set(127);  // Last bit of second word

        assert_eq!(bs.count_ones(), 4);
        assert_eq!(bs.iter_ones().collect::<Vec<_>>(), vec![0, 63, 64, 127]);
        assert_eq!(bs.first_one(), Some(0));
        assert_eq!(Bitset::zeros(2).first_one(), None);
        assert!(Bitset::zeros(3).is_empty());
    }
}
