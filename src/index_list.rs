//! Unordered sets of small non-negative indices.
//!
//! An [`IndexList`] holds the taxa of a dropset or the bipartition ids of a
//! complex merging event. The sets are tiny (bounded by the maximum dropset
//! size, or by the size of one merging group), so a flat vector with linear
//! scans beats any hashed representation.
//!
//! # Ownership
//! Operations that build a new set out of their inputs ([`IndexList::set_minus`],
//! [`IndexList::union_with`], [`IndexList::concat`]) take their inputs by value.
//! The consumed sets cannot be used afterwards, which the borrow checker enforces.

use std::fmt;

use crate::bitset::Bitset;

/// An unordered set of indices without duplicates.
///
/// Equality is set equality: same cardinality and mutual containment.
/// Insertion order carries no meaning.
#[derive(Clone, Debug, Default)]
pub struct IndexList(Vec<usize>);

impl IndexList {
    pub fn new() -> Self {
        IndexList(Vec::new())
    }

    /// Set holding exactly `a` and `b`.
    pub fn pair(a: usize, b: usize) -> Self {
        assert_ne!(a, b, "a pair needs two distinct indices");
        IndexList(vec![a, b])
    }

    /// Collects the set bits of `bits` below `limit`, in increasing order.
    pub fn from_bitset(bits: &Bitset, limit: usize) -> Self {
        IndexList(bits.iter_ones().take_while(|&i| i < limit).collect())
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    pub fn as_slice(&self) -> &[usize] {
        &self.0
    }

    /// Membership test.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    /// Whether either `a` or `b` is a member.
    #[inline]
    pub fn contains_any(&self, a: usize, b: usize) -> bool {
        self.0.iter().any(|&i| i == a || i == b)
    }

    /// Appends `index` unless already present. Returns whether it was added.
    pub fn push_if_absent(&mut self, index: usize) -> bool {
        if self.contains(index) {
            false
        } else {
            self.0.push(index);
            true
        }
    }

    /// Elements of `self` that are not in `subtract`.
    ///
    /// Consumes `self`; the result is a fresh set.
    ///
    /// # Example
    /// ```
    /// # use rogue_dropsets::index_list::IndexList;
    /// let set: IndexList = [1, 2, 3, 4].into_iter().collect();
    /// let sub: IndexList = [4, 2].into_iter().collect();
    /// let expected: IndexList = [3, 1].into_iter().collect();
    /// assert_eq!(set.set_minus(&sub), expected);
    /// ```
    pub fn set_minus(self, subtract: &IndexList) -> IndexList {
        IndexList(
            self.0
                .into_iter()
                .filter(|i| !subtract.contains(*i))
                .collect(),
        )
    }

    /// Whether every element of `self` is contained in `set`. O(n·m).
    pub fn is_subset_of(&self, set: &IndexList) -> bool {
        self.iter().all(|i| set.contains(i))
    }

    /// Subset test by merging two sorted sequences. O(n + m).
    ///
    /// Both lists must be strictly increasing; see [`IndexList::is_sorted`].
    /// [`IndexList::is_subset_of`] is the general variant.
    pub fn is_subset_of_sorted(&self, set: &IndexList) -> bool {
        debug_assert!(self.is_sorted() && set.is_sorted());
        let mut rest = set.0.iter().peekable();
        'outer: for &wanted in &self.0 {
            while let Some(&&candidate) = rest.peek() {
                rest.next();
                if candidate == wanted {
                    continue 'outer;
                }
                if candidate > wanted {
                    return false;
                }
            }
            return false;
        }
        true
    }

    /// Whether the elements are strictly increasing in storage order.
    pub fn is_sorted(&self) -> bool {
        self.0.windows(2).all(|w| w[0] < w[1])
    }

    /// Union of both sets without duplicates. Consumes both inputs.
    pub fn union_with(self, other: IndexList) -> IndexList {
        let mut result = self;
        for i in other.0 {
            result.push_if_absent(i);
        }
        result
    }

    /// Concatenation of both sets without a duplicate check.
    ///
    /// Only valid when the caller knows the sets are disjoint.
    pub fn concat(self, other: IndexList) -> IndexList {
        let mut result = self;
        result.0.extend(other.0);
        debug_assert!(result.has_no_duplicates());
        result
    }

    /// Whether the two sets share at least one element.
    pub fn intersects(&self, other: &IndexList) -> bool {
        self.first_common(other).is_some()
    }

    /// The first element of `self` (in storage order) that is also in `other`.
    pub fn first_common(&self, other: &IndexList) -> Option<usize> {
        self.iter().find(|&i| other.contains(i))
    }

    /// Largest element, or `None` for the empty set.
    pub fn max(&self) -> Option<usize> {
        self.0.iter().copied().max()
    }

    fn has_no_duplicates(&self) -> bool {
        self.0
            .iter()
            .enumerate()
            .all(|(pos, i)| !self.0[pos + 1..].contains(i))
    }
}

impl PartialEq for IndexList {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len() && self.is_subset_of(other) && other.is_subset_of(self)
    }
}

impl Eq for IndexList {}

impl FromIterator<usize> for IndexList {
    /// Collects indices, skipping repeated ones.
    fn from_iter<T: IntoIterator<Item = usize>>(iter: T) -> Self {
        let mut list = IndexList::new();
        for i in iter {
            list.push_if_absent(i);
        }
        list
    }
}

impl IntoIterator for IndexList {
    type Item = usize;
    type IntoIter = std::vec::IntoIter<usize>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Comma separated, e.g. `3,7,12`.
impl fmt::Display for IndexList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (k, i) in self.0.iter().enumerate() {
            if k > 0 {
                write!(f, ",")?;
            }
            write!(f, "{i}")?;
        }
        Ok(())
    }
}
