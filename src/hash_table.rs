//! Content-addressed hash table with caller-supplied hashing.
//!
//! The table never inspects its values itself: a [`ContentHasher`] decides how
//! a value hashes and when two values are the same entry. This allows keys
//! such as "the set of taxa of a dropset", whose hash must not depend on
//! element order.
//!
//! Values live in one arena in insertion order; buckets only hold the full
//! 32-bit hash and the arena position. Entry positions are stable, so other
//! structures may refer to an entry by its position.

/// Hash and equality for values stored in a [`HashTable`].
///
/// Equal values must hash equally. Equal hashes do not imply equal values.
pub trait ContentHasher<V: ?Sized> {
    fn hash(&self, value: &V) -> u32;
    fn equal(&self, a: &V, b: &V) -> bool;
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    full_key: u32,
    entry: usize,
}

/// Chained hash table with a bucket count fixed at creation.
///
/// `insert` does not check for duplicates; callers that need uniqueness
/// `search` first.
#[derive(Debug)]
pub struct HashTable<V, H> {
    hasher: H,
    buckets: Vec<Vec<Slot>>,
    entries: Vec<V>,
}

impl<V, H: ContentHasher<V>> HashTable<V, H> {
    /// Creates a table with `size` buckets (at least one).
    pub fn new(size: usize, hasher: H) -> Self {
        HashTable {
            hasher,
            buckets: vec![Vec::new(); size.max(1)],
            entries: Vec::new(),
        }
    }

    /// Hash of `value` under this table's hasher.
    #[inline]
    pub fn hash_of(&self, value: &V) -> u32 {
        self.hasher.hash(value)
    }

    #[inline]
    fn bucket(&self, hash: u32) -> usize {
        hash as usize % self.buckets.len()
    }

    /// Appends `value` to the chain of `hash` and returns its entry position.
    ///
    /// `hash` must be `self.hash_of(&value)`.
    pub fn insert(&mut self, value: V, hash: u32) -> usize {
        debug_assert_eq!(hash, self.hasher.hash(&value));
        let entry = self.entries.len();
        self.entries.push(value);
        let bucket = self.bucket(hash);
        self.buckets[bucket].push(Slot { full_key: hash, entry });
        entry
    }

    /// Position of the first entry equal to `value`, walking the chain of `hash`.
    pub fn search(&self, value: &V, hash: u32) -> Option<usize> {
        self.buckets[self.bucket(hash)]
            .iter()
            .filter(|slot| slot.full_key == hash)
            .map(|slot| slot.entry)
            .find(|&entry| self.hasher.equal(&self.entries[entry], value))
    }

    /// Position of the first entry whose full hash equals `hash`.
    pub fn search_by_hash(&self, hash: u32) -> Option<usize> {
        self.buckets[self.bucket(hash)]
            .iter()
            .find(|slot| slot.full_key == hash)
            .map(|slot| slot.entry)
    }

    pub fn get(&self, entry: usize) -> Option<&V> {
        self.entries.get(entry)
    }

    pub fn get_mut(&mut self, entry: usize) -> Option<&mut V> {
        self.entries.get_mut(entry)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of buckets.
    pub fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// All live entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, V> {
        self.entries.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, V> {
        self.entries.iter_mut()
    }

    /// The arena of entries, indexable by entry position.
    pub fn entries(&self) -> &[V] {
        &self.entries
    }

    /// Consumes the table and returns its entries in insertion order.
    pub fn into_entries(self) -> Vec<V> {
        self.entries
    }
}
