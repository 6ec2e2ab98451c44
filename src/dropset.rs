//! Dropsets and the merging events they cause.
//!
//! # Overview
//! A dropset is a set of taxa. Removing it from every tree makes some pairs
//! of profile elements identical; each such pair is a *prime event* of the
//! dropset. Prime events that share an element chain together: if dropping
//! `D` makes `a = b` and `b = c`, then `a`, `b` and `c` all collapse into one
//! split. Such groups are *complex events*.
//!
//! # Ownership
//! A dropset owns the prime events it discovered (`own_prime`) and the
//! complex events built for it (`complex_events`). A dropset `D` also
//! reconciles every pair reconciled by a smaller dropset `S ⊂ D`; those prime
//! events stay owned by `S` and `D` refers to them through [`EventRef`]
//! indices into the dropset arena (`acquired_prime`).

use std::sync::Arc;

use itertools::Itertools;

use crate::hash_table::{ContentHasher, HashTable};
use crate::index_list::IndexList;

/// Two profile elements that become identical once a dropset is removed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PrimeEvent {
    pub pair: [usize; 2],
}

impl PrimeEvent {
    pub fn new(a: usize, b: usize) -> Self {
        assert_ne!(a, b, "a prime event joins two distinct bipartitions");
        PrimeEvent { pair: [b, a] }
    }

    /// Whether this event joins `a` and `b` (in either order).
    ///
    /// # Panics
    /// If the event shares exactly one element with `{a, b}`: two different
    /// pairs of one dropset never overlap.
    fn matches(&self, a: usize, b: usize) -> bool {
        let [x, y] = self.pair;
        if x != a && x != b && y != a && y != b {
            return false;
        }
        let hits = (x == a) as u8 + (y == b) as u8 + (x == b) as u8 + (y == a) as u8;
        assert_eq!(
            hits, 2,
            "prime event {:?} overlaps ({a}, {b}) partially",
            self.pair
        );
        true
    }
}

/// A group of at least two profile elements that all collapse into one split.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ComplexEvent {
    pub bipartitions: IndexList,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MergingEvent {
    Prime(PrimeEvent),
    Complex(ComplexEvent),
}

impl MergingEvent {
    pub fn is_complex(&self) -> bool {
        matches!(self, MergingEvent::Complex(_))
    }
}

/// Position of a prime event owned by another dropset of the same arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventRef {
    pub dropset: usize,
    pub event: usize,
}

#[derive(Clone, Debug, Default)]
pub struct Dropset {
    /// Taxa to remove. Identifies the dropset.
    pub taxa: IndexList,
    pub own_prime: Vec<PrimeEvent>,
    pub complex_events: Vec<ComplexEvent>,
    pub acquired_prime: Vec<EventRef>,
    /// Score change caused by removing `taxa`; `None` until scored.
    pub improvement: Option<i64>,
}

impl Dropset {
    pub fn new(taxa: IndexList) -> Self {
        Dropset {
            taxa,
            ..Dropset::default()
        }
    }

    /// Records that `a` and `b` become identical once `taxa` are removed.
    ///
    /// Only for events this dropset discovered itself. Repeated pairs are ignored.
    pub fn add_prime_event(&mut self, a: usize, b: usize) {
        if self.own_prime.iter().any(|event| event.matches(a, b)) {
            return;
        }
        self.own_prime.push(PrimeEvent::new(a, b));
    }

    /// Installs the result of the combination pass.
    pub fn absorb(&mut self, combined: CombinedEvents) {
        self.acquired_prime = combined.acquired;
        self.complex_events = combined.complex;
    }

    /// The events to report: complex events once combined, own prime events before.
    pub fn merging_events(&self) -> Vec<MergingEvent> {
        if self.complex_events.is_empty() {
            self.own_prime.iter().copied().map(MergingEvent::Prime).collect()
        } else {
            self.complex_events
                .iter()
                .cloned()
                .map(MergingEvent::Complex)
                .collect()
        }
    }
}

/// Folds the prime event `(a, b)` into the disjoint groups of `complex`.
///
/// 1. `a` and `b` sit in two different groups: the second group is merged
///    into the first and removed.
/// 2. One group holds `a` or `b`: both are added to it.
/// 3. Otherwise a new group `{a, b}` is appended.
pub fn combine_event(complex: &mut Vec<ComplexEvent>, event: PrimeEvent) {
    let [a, b] = event.pair;
    let mut hits = complex
        .iter()
        .positions(|c| c.bipartitions.contains_any(a, b));
    let first = hits.next();
    let second = hits.next();

    match (first, second) {
        (Some(first), Some(second)) => {
            let absorbed = complex.remove(second);
            let kept = std::mem::take(&mut complex[first].bipartitions);
            complex[first].bipartitions = kept.union_with(absorbed.bipartitions);
        }
        (Some(first), None) => {
            let group = &mut complex[first].bipartitions;
            group.push_if_absent(a);
            group.push_if_absent(b);
        }
        (None, _) => complex.push(ComplexEvent {
            bipartitions: IndexList::pair(a, b),
        }),
    }
}

/// Output of the combination pass for one dropset.
#[derive(Clone, Debug, Default)]
pub struct CombinedEvents {
    pub acquired: Vec<EventRef>,
    pub complex: Vec<ComplexEvent>,
}

/// Hashes a dropset by XOR-ing one random value per taxon.
///
/// The hash ignores taxon order. Taxa must not repeat (a repeated taxon
/// cancels itself out), which [`IndexList`] guarantees.
#[derive(Clone, Debug)]
pub struct TaxonHasher {
    values: Arc<[u32]>,
}

impl TaxonHasher {
    pub fn new(values: Arc<[u32]>) -> Self {
        TaxonHasher { values }
    }

    pub fn hash_taxa(&self, taxa: &IndexList) -> u32 {
        taxa.iter().fold(0, |acc, taxon| {
            assert!(taxon < self.values.len(), "taxon {taxon} out of range");
            acc ^ self.values[taxon]
        })
    }
}

impl ContentHasher<Dropset> for TaxonHasher {
    fn hash(&self, value: &Dropset) -> u32 {
        self.hash_taxa(&value.taxa)
    }

    fn equal(&self, a: &Dropset, b: &Dropset) -> bool {
        a.taxa == b.taxa
    }
}

/// All dropsets of a run, deduplicated by taxa.
pub type DropsetTable = HashTable<Dropset, TaxonHasher>;

/// Builds the complex events of dropset `entry`.
///
/// The own prime events of the dropset and of every dropset whose taxa form
/// a proper subset of its taxa are folded through [`combine_event`].
pub fn combine_events_for_dropset(table: &DropsetTable, entry: usize) -> CombinedEvents {
    let dropsets = table.entries();
    let target = &dropsets[entry];

    let mut acquired = Vec::new();
    for subset in target.taxa.iter().powerset() {
        if subset.is_empty() || subset.len() == target.taxa.len() {
            continue;
        }
        let probe = Dropset::new(subset.into_iter().collect());
        let hash = table.hash_of(&probe);
        if let Some(found) = table.search(&probe, hash) {
            acquired.extend((0..dropsets[found].own_prime.len()).map(|event| EventRef {
                dropset: found,
                event,
            }));
        }
    }

    let mut complex = Vec::new();
    let acquired_events = acquired
        .iter()
        .map(|r| dropsets[r.dropset].own_prime[r.event]);
    for event in target.own_prime.iter().copied().chain(acquired_events) {
        combine_event(&mut complex, event);
    }

    CombinedEvents { acquired, complex }
}
