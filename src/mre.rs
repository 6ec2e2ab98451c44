//! Consensus support after removing a dropset.
//!
//! Removing the taxa of a dropset turns every group of a complex event into
//! one split, supported by every tree that contained any member of the
//! group. The score of a dropset is the support of the extended majority rule
//! (MRE) consensus of the merged profile: splits are added greedily by
//! decreasing support as long as they are compatible with all splits added
//! before.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::bitset::Bitset;
use crate::config::{Config, Consensus, Objective};
use crate::context::RunContext;
use crate::dropset::ComplexEvent;
use crate::index_list::IndexList;
use crate::profile::BipartitionProfile;

/// How a consensus is built and scored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Scoring {
    pub objective: Objective,
    pub consensus: Consensus,
}

impl From<&Config> for Scoring {
    fn from(config: &Config) -> Self {
        Scoring {
            objective: config.objective,
            consensus: config.consensus,
        }
    }
}

/// A split of the merged profile.
struct MergedSplit {
    id: usize,
    bits: Bitset,
    support: usize,
}

/// Whether two splits over the `live` taxa can appear in one tree.
///
/// Splits `A|A'` and `B|B'` conflict iff all four of `A∩B`, `A∩B'`, `A'∩B`
/// and `A'∩B'` are non-empty.
pub fn compatible(a: &Bitset, b: &Bitset, live: &Bitset) -> bool {
    let (mut both, mut only_a, mut only_b, mut neither) = (false, false, false, false);
    for ((&x, &y), &l) in a.0.iter().zip(&b.0).zip(&live.0) {
        let (x, y) = (x & l, y & l);
        both |= x & y != 0;
        only_a |= x & !y != 0;
        only_b |= !x & y != 0;
        neither |= l & !(x | y) != 0;
    }
    !(both && only_a && only_b && neither)
}

/// Score of the consensus once the taxa in `drop` are removed.
///
/// `groups` are the complex events of the dropset; each collapses into one
/// split. With an empty `drop` and no groups this is the baseline score.
///
/// # Panics
/// If two groups share a profile element.
pub fn consensus_score(
    profile: &BipartitionProfile,
    ctx: &RunContext,
    drop: &IndexList,
    groups: &[ComplexEvent],
    scoring: Scoring,
) -> i64 {
    let mut live = ctx.live_taxa();
    for taxon in drop.iter() {
        live.clear(taxon);
    }
    let live_count = live.count_ones();
    let anchor = live.first_one();

    let mut grouped = Bitset::zeros(Bitset::words_for(profile.len()));
    let mut splits = Vec::with_capacity(profile.len());
    for group in groups {
        let Some(id) = group.bipartitions.iter().min() else {
            continue;
        };
        let mut trees = Bitset::zeros(profile.get(id).trees.words());
        for member in group.bipartitions.iter() {
            assert!(
                !grouped.test(member),
                "bipartition {member} belongs to two complex events"
            );
            grouped.set(member);
            trees.or_assign(&profile.get(member).trees);
        }
        splits.push(MergedSplit {
            id,
            bits: profile.get(id).bits.clone(),
            support: trees.count_ones(),
        });
    }
    splits.extend(
        profile
            .elems()
            .iter()
            .filter(|e| !grouped.test(e.id))
            .map(|e| MergedSplit {
                id: e.id,
                bits: e.bits.clone(),
                support: e.support(),
            }),
    );

    for split in splits.iter_mut() {
        split.bits.and_assign(&live);
        if anchor.is_some_and(|a| split.bits.test(a)) {
            let mut flipped = live.clone();
            flipped.and_not_assign(&split.bits);
            split.bits = flipped;
        }
    }
    let num_trees = profile.num_trees();
    splits.retain(|s| {
        let ones = s.bits.count_ones();
        let trivial = ones <= 1 || ones + 1 >= live_count;
        let kept = match scoring.consensus {
            Consensus::Mre => true,
            Consensus::MajorityRule => s.support * 2 > num_trees,
        };
        !trivial && kept
    });
    splits.sort_unstable_by_key(|s| (Reverse(s.support), s.id));

    let mut seen: HashSet<&Bitset> = HashSet::new();
    let mut accepted: Vec<&Bitset> = Vec::new();
    let mut score = 0i64;
    for split in &splits {
        if !seen.insert(&split.bits) {
            continue;
        }
        if accepted.iter().all(|a| compatible(a, &split.bits, &live)) {
            accepted.push(&split.bits);
            score += match scoring.objective {
                Objective::Support => split.support as i64,
                Objective::Bipartitions => 1,
            };
        }
    }
    score
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::TaxonMasks;

    fn bits(idx: &[usize]) -> Bitset {
        let mut bs = Bitset::zeros(1);
        for &i in idx {
            bs.set(i);
        }
        bs
    }

    fn list(items: &[usize]) -> IndexList {
        items.iter().copied().collect()
    }

    fn context(num_taxa: usize) -> RunContext {
        let masks = TaxonMasks::new(num_taxa, Bitset::zeros(1), &Bitset::zeros(1));
        RunContext::new(num_taxa, 1, masks, RunContext::random_taxon_hashes(num_taxa, 1))
    }

    fn profile(
        num_taxa: usize,
        num_trees: usize,
        splits: &[(&[usize], &[usize])],
    ) -> BipartitionProfile {
        let observations = splits
            .iter()
            .flat_map(|&(taxa, trees)| trees.iter().map(move |&t| (bits(taxa), t)));
        let names = (0..num_taxa).map(|i| format!("t{i}")).collect();
        BipartitionProfile::from_splits(names, num_trees, observations, &Bitset::zeros(1))
    }

    fn id_of(profile: &BipartitionProfile, taxa: &[usize]) -> usize {
        profile.elems().iter().find(|e| e.bits == bits(taxa)).unwrap().id
    }

    /// Six taxa, ten trees. {1,2} and {1,2,3} differ only in taxon 3.
    fn toy() -> BipartitionProfile {
        profile(
            6,
            10,
            &[
                (&[1, 2], &[0, 1, 2]),
                (&[1, 2, 3], &[3, 4, 5]),
                (&[3, 4], &[6]),
                (&[2, 5], &[6, 7, 8, 9]),
            ],
        )
    }

    #[test]
    fn test_compatibility() {
        let live = Bitset::ones(1, 6);
        assert!(compatible(&bits(&[1, 2]), &bits(&[1, 2, 3]), &live));
        assert!(compatible(&bits(&[1, 2]), &bits(&[3, 4]), &live));
        assert!(!compatible(&bits(&[1, 2]), &bits(&[2, 5]), &live));
        // Without taxa 0, 3 and 4 both sides of {2,5} cover everything else.
        assert!(compatible(&bits(&[1, 2]), &bits(&[2, 5]), &bits(&[1, 2, 5])));
    }

    #[test]
    fn test_baseline_is_greedy_consensus() {
        let profile = toy();
        let ctx = context(6);
        // {2,5} (4 trees) conflicts with both {1,2} and {1,2,3}; {3,4} fits.
        let score = consensus_score(&profile, &ctx, &IndexList::new(), &[], Scoring::default());
        assert_eq!(score, 5);

        let count = Scoring {
            objective: Objective::Bipartitions,
            ..Scoring::default()
        };
        assert_eq!(consensus_score(&profile, &ctx, &IndexList::new(), &[], count), 2);
    }

    #[test]
    fn test_complex_event_merges_support() {
        let profile = toy();
        let ctx = context(6);
        let group = ComplexEvent {
            bipartitions: list(&[id_of(&profile, &[1, 2]), id_of(&profile, &[1, 2, 3])]),
        };
        // {1,2} now in six trees wins over {2,5}; {3,4} became trivial.
        let score = consensus_score(&profile, &ctx, &list(&[3]), &[group], Scoring::default());
        assert_eq!(score, 6);
    }

    #[test]
    fn test_majority_rule_drops_minority_splits() {
        let profile = toy();
        let ctx = context(6);
        let majority = Scoring {
            consensus: Consensus::MajorityRule,
            ..Scoring::default()
        };
        assert_eq!(consensus_score(&profile, &ctx, &IndexList::new(), &[], majority), 0);

        let group = ComplexEvent {
            bipartitions: list(&[id_of(&profile, &[1, 2]), id_of(&profile, &[1, 2, 3])]),
        };
        assert_eq!(consensus_score(&profile, &ctx, &list(&[3]), &[group], majority), 6);
    }

    /// Dropping taxon 0 moves the anchor to taxon 1, so {1,2} is seen as
    /// {3,4,5} and coincides with the existing {3,4,5}.
    #[test]
    fn test_duplicates_after_projection_count_once() {
        let profile = profile(6, 4, &[(&[1, 2], &[0, 1, 2]), (&[3, 4, 5], &[3])]);
        let ctx = context(6);
        assert_eq!(consensus_score(&profile, &ctx, &IndexList::new(), &[], Scoring::default()), 4);
        assert_eq!(consensus_score(&profile, &ctx, &list(&[0]), &[], Scoring::default()), 3);

        let group = ComplexEvent {
            bipartitions: list(&[0, 1]),
        };
        assert_eq!(
            consensus_score(&profile, &ctx, &list(&[0]), &[group], Scoring::default()),
            4
        );
    }

    #[test]
    #[should_panic(expected = "two complex events")]
    fn test_overlapping_groups_are_fatal() {
        let profile = toy();
        let ctx = context(6);
        let groups = [
            ComplexEvent { bipartitions: list(&[0, 1]) },
            ComplexEvent { bipartitions: list(&[1, 2]) },
        ];
        consensus_score(&profile, &ctx, &list(&[3]), &groups, Scoring::default());
    }
}
