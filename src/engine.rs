//! One run of the dropset engine over a bipartition profile.
//!
//! # Passes
//! 1. **Discovery**: every candidate element is compared against the
//!    elements whose size is within `max_dropset_size` of its own (directly)
//!    or of its complement. Each reconciling set of taxa becomes a dropset
//!    in a shared table, and the pair becomes one of its prime events.
//! 2. **Combination**: every dropset folds its own prime events and those of
//!    its proper subsets into complex events.
//! 3. **Scoring**: every dropset gets the change of the consensus score its
//!    removal causes.
//!
//! Passes are separated by the barrier of [`WorkerPool::dispatch`].

use std::sync::{Mutex, PoisonError};

use log::{debug, info};

use crate::bitset::Bitset;
use crate::context::RunContext;
use crate::difference::compute_dropset;
use crate::dropset::{Dropset, DropsetTable, TaxonHasher, combine_events_for_dropset};
use crate::index_list::IndexList;
use crate::mre::{Scoring, consensus_score};
use crate::profile::{BipartitionProfile, ProfileElem};
use crate::scheduler::{JobKind, WorkerPool};

/// Result of one engine run.
#[derive(Debug)]
pub struct EngineOutcome {
    /// Consensus score with no taxa removed.
    pub baseline: i64,
    /// Every distinct dropset found, scored.
    pub dropsets: Vec<Dropset>,
}

pub struct Engine<'a> {
    profile: &'a BipartitionProfile,
    ctx: &'a RunContext,
    pool: &'a WorkerPool,
    scoring: Scoring,
}

impl<'a> Engine<'a> {
    pub fn new(
        profile: &'a BipartitionProfile,
        ctx: &'a RunContext,
        pool: &'a WorkerPool,
        scoring: Scoring,
    ) -> Self {
        Engine {
            profile,
            ctx,
            pool,
            scoring,
        }
    }

    pub fn run(&self) -> EngineOutcome {
        let candidates = self.profile.candidates();
        info!(
            "{} bipartitions, {} candidates, {} live taxa",
            self.profile.len(),
            candidates.count_ones(),
            self.ctx.live_count()
        );

        let mut table = self.discover(&candidates);
        info!("discovered {} dropsets", table.len());

        self.combine(&mut table);
        let baseline = self.score(&mut table);
        info!("baseline consensus score {baseline}");

        EngineOutcome {
            baseline,
            dropsets: table.into_entries(),
        }
    }

    /// Finds all dropsets reconciling a candidate with another element.
    pub fn discover(&self, candidates: &Bitset) -> DropsetTable {
        let size = (self.profile.len() * 4).max(64);
        let hasher = TaxonHasher::new(self.ctx.taxon_hashes());
        let table = Mutex::new(DropsetTable::new(size, hasher.clone()));

        self.pool.dispatch(
            JobKind::EventDiscovery,
            self.profile.len(),
            Some(candidates),
            |job| {
                let elem = self.profile.get(job);
                let found = find_candidates_for_bip(self.profile, self.ctx, candidates, elem);
                for (partner, taxa) in found {
                    let hash = hasher.hash_taxa(&taxa);
                    let probe = Dropset::new(taxa);
                    let mut table = table.lock().unwrap_or_else(PoisonError::into_inner);
                    let entry = match table.search(&probe, hash) {
                        Some(entry) => entry,
                        None => table.insert(probe, hash),
                    };
                    if let Some(dropset) = table.get_mut(entry) {
                        dropset.add_prime_event(elem.id, partner);
                    }
                }
            },
        );

        table.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    /// Builds the complex events of every dropset in `table`.
    pub fn combine(&self, table: &mut DropsetTable) {
        let shared: &DropsetTable = table;
        let combined = self
            .pool
            .map_jobs(JobKind::EventCombination, shared.len(), |entry| {
                combine_events_for_dropset(shared, entry)
            });
        for (dropset, events) in table.iter_mut().zip(combined) {
            dropset.absorb(events);
        }
    }

    /// Scores every dropset in `table` and returns the baseline score.
    pub fn score(&self, table: &mut DropsetTable) -> i64 {
        let baseline = consensus_score(
            self.profile,
            self.ctx,
            &IndexList::new(),
            &[],
            self.scoring,
        );
        let shared: &DropsetTable = table;
        let improvements = self
            .pool
            .map_jobs(JobKind::MreScoring, shared.len(), |entry| {
                let dropset = &shared.entries()[entry];
                consensus_score(
                    self.profile,
                    self.ctx,
                    &dropset.taxa,
                    &dropset.complex_events,
                    self.scoring,
                ) - baseline
            });
        for (dropset, improvement) in table.iter_mut().zip(improvements) {
            debug!("dropset {} improves by {improvement}", dropset.taxa);
            dropset.improvement = Some(improvement);
        }
        baseline
    }
}

/// The dropsets reconciling candidate `elem` with other elements, with the partner id.
///
/// A pair of two candidates is reported only from the side of the smaller id.
pub fn find_candidates_for_bip(
    profile: &BipartitionProfile,
    ctx: &RunContext,
    candidates: &Bitset,
    elem: &ProfileElem,
) -> Vec<(usize, IndexList)> {
    let max = ctx.max_dropset_size;
    let handled_elsewhere = |partner: &ProfileElem| {
        partner.id == elem.id || (candidates.test(partner.id) && partner.id < elem.id)
    };

    let mut found = Vec::new();
    let direct = profile.with_bit_count(
        elem.num_bits.saturating_sub(max),
        elem.num_bits.saturating_add(max),
    );
    for partner in direct.filter(|p| !handled_elsewhere(p)) {
        if let Some(taxa) = compute_dropset(elem, partner, false, ctx) {
            found.push((partner.id, taxa));
        }
    }

    let flipped = profile.live_taxa().saturating_sub(elem.num_bits);
    let complement =
        profile.with_bit_count(flipped.saturating_sub(max), flipped.saturating_add(max));
    for partner in complement.filter(|p| !handled_elsewhere(p)) {
        if let Some(taxa) = compute_dropset(elem, partner, true, ctx) {
            found.push((partner.id, taxa));
        }
    }
    found
}
