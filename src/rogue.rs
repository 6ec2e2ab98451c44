//! Iterative rogue taxon search.
//!
//! Each round runs the engine on the collection with all previously dropped
//! taxa removed, drops the dropset with the largest positive improvement, and
//! starts over. The search ends when no dropset improves the consensus, when
//! too few taxa would be left, or after the configured number of rounds.

use std::cmp::Reverse;
use std::sync::Arc;

use log::info;
use phylotree::tree::Tree as PhyloTree;

use crate::bitset::Bitset;
use crate::config::Config;
use crate::context::{RunContext, TaxonMasks};
use crate::dropset::Dropset;
use crate::engine::Engine;
use crate::error::{Error, Result};
use crate::mre::Scoring;
use crate::profile::BipartitionProfile;
use crate::scheduler::WorkerPool;
use crate::snapshot::{TreeSnapshot, check_same_taxa};

/// Fewest taxa a pruned collection may keep.
pub const MIN_LIVE_TAXA: usize = 4;

/// One dropped dropset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundResult {
    /// 1-based round number.
    pub round: usize,
    /// Dropped taxon indices, increasing.
    pub taxa: Vec<usize>,
    pub names: Vec<String>,
    pub improvement: i64,
    /// Consensus score after this round's taxa are removed.
    pub score: i64,
}

#[derive(Clone, Debug)]
pub struct RogueReport {
    /// All taxon names in bit order.
    pub taxa: Vec<String>,
    pub num_trees: usize,
    /// Consensus score of the unpruned collection.
    pub initial_score: i64,
    pub rounds: Vec<RoundResult>,
}

impl RogueReport {
    /// Names of all dropped taxa, in the order they were dropped.
    pub fn dropped_names(&self) -> Vec<&str> {
        self.rounds
            .iter()
            .flat_map(|r| r.names.iter().map(String::as_str))
            .collect()
    }

    /// Score once every round is applied.
    pub fn final_score(&self) -> i64 {
        self.rounds.last().map_or(self.initial_score, |r| r.score)
    }
}

/// Searches rogue taxa in parsed trees.
pub fn identify_rogues_in_trees(trees: &[PhyloTree], config: &Config) -> Result<RogueReport> {
    let snapshots = trees
        .iter()
        .map(TreeSnapshot::from_tree)
        .collect::<Result<Vec<_>>>()?;
    identify_rogues(&snapshots, config)
}

/// Searches rogue taxa in a collection of tree snapshots.
///
/// # Errors
/// Fails on an invalid configuration, an empty collection, trees over
/// different taxa, unknown excluded taxa, or when the worker pool cannot start.
pub fn identify_rogues(snapshots: &[TreeSnapshot], config: &Config) -> Result<RogueReport> {
    config.validate()?;
    check_same_taxa(snapshots)?;
    let taxa = snapshots[0].taxa.clone();
    let num_taxa = taxa.len();
    let words = Bitset::words_for(num_taxa);

    let excluded = resolve_taxa(&taxa, &config.excluded_taxa)?;
    let hashes = RunContext::random_taxon_hashes(num_taxa, config.seed);
    let pool = WorkerPool::new(config.threads, config.pin_threads)?;
    let scoring = Scoring::from(config);
    info!(
        "searching rogues among {num_taxa} taxa in {} trees with {} threads",
        snapshots.len(),
        pool.threads()
    );

    let mut dropped = Bitset::zeros(words);
    let mut initial_score = None;
    let mut rounds: Vec<RoundResult> = Vec::new();

    while config.max_rounds.is_none_or(|max| rounds.len() < max) {
        let round = rounds.len() + 1;
        let profile = BipartitionProfile::from_snapshots(snapshots, &dropped)?;
        let masks = TaxonMasks::new(num_taxa, dropped.clone(), &excluded);
        let ctx = RunContext::new(
            num_taxa,
            config.max_dropset_size,
            masks,
            Arc::clone(&hashes),
        );

        info!("round {round}");
        let outcome = Engine::new(&profile, &ctx, &pool, scoring).run();
        initial_score.get_or_insert(outcome.baseline);

        let Some(best) = select_best(&outcome.dropsets, ctx.live_count()) else {
            info!("no dropset improves the consensus");
            break;
        };
        let improvement = best.improvement.unwrap_or_default();
        let mut best_taxa = best.taxa.as_slice().to_vec();
        best_taxa.sort_unstable();
        for &taxon in &best_taxa {
            dropped.set(taxon);
        }
        let names: Vec<String> = best_taxa.iter().map(|&t| taxa[t].clone()).collect();
        info!(
            "round {round}: dropping {} improves the score by {improvement}",
            names.join(",")
        );

        rounds.push(RoundResult {
            round,
            taxa: best_taxa,
            names,
            improvement,
            score: outcome.baseline + improvement,
        });
    }

    Ok(RogueReport {
        taxa,
        num_trees: snapshots.len(),
        initial_score: initial_score.unwrap_or_default(),
        rounds,
    })
}

/// The dropset to remove next, if any improves the score.
///
/// Largest improvement first, then fewer taxa, then the lexicographically
/// smaller sorted taxon list. Dropsets leaving fewer than [`MIN_LIVE_TAXA`]
/// of the `live_count` taxa are not considered.
pub fn select_best(dropsets: &[Dropset], live_count: usize) -> Option<&Dropset> {
    dropsets
        .iter()
        .filter(|d| d.improvement.is_some_and(|i| i > 0))
        .filter(|d| live_count.saturating_sub(d.taxa.len()) >= MIN_LIVE_TAXA)
        .min_by_key(|d| {
            let mut taxa = d.taxa.as_slice().to_vec();
            taxa.sort_unstable();
            (Reverse(d.improvement), taxa.len(), taxa)
        })
}

/// Bitset of the named taxa.
fn resolve_taxa(taxa: &[String], names: &[String]) -> Result<Bitset> {
    let mut bits = Bitset::zeros(Bitset::words_for(taxa.len()));
    for name in names {
        let index = taxa
            .iter()
            .position(|t| t == name)
            .ok_or_else(|| Error::UnknownTaxon(name.clone()))?;
        bits.set(index);
    }
    Ok(bits)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index_list::IndexList;
    use test_log::test;

    /// X and Y jump between branches of (((A,B),C),(D,(E,F))).
    const TWO_ROGUES: [&str; 5] = [
        "((((A,X),B),(C,Y)),(D,(E,F)));",
        "(((A,B),C),((D,X),(E,(F,Y))));",
        "((((A,Y),B),C),(D,(E,(F,X))));",
        "(((A,B),(C,X)),((D,Y),(E,F)));",
        "(((A,B),C),((D,X),(E,F)),Y);",
    ];

    fn trees(newicks: &[&str]) -> Vec<PhyloTree> {
        newicks
            .iter()
            .map(|nwk| PhyloTree::from_newick(nwk).unwrap())
            .collect()
    }

    fn config() -> Config {
        Config {
            threads: 2,
            ..Config::default()
        }
    }

    fn dropset(taxa: &[usize], improvement: i64) -> Dropset {
        let mut d = Dropset::new(taxa.iter().copied().collect::<IndexList>());
        d.improvement = Some(improvement);
        d
    }

    #[test]
    fn test_drops_rogues_one_by_one() {
        let report = identify_rogues_in_trees(&trees(&TWO_ROGUES), &config()).unwrap();

        assert_eq!(report.num_trees, 5);
        assert_eq!(report.initial_score, 12);
        assert_eq!(report.rounds.len(), 2);
        assert_eq!(report.rounds[0].names, ["X"]);
        assert_eq!(report.rounds[0].improvement, 2);
        assert_eq!(report.rounds[0].score, 14);
        assert_eq!(report.rounds[1].names, ["Y"]);
        assert_eq!(report.rounds[1].improvement, 1);
        assert_eq!(report.final_score(), 15);
        assert_eq!(report.dropped_names(), ["X", "Y"]);
    }

    #[test]
    fn test_max_rounds() {
        let config = Config {
            max_rounds: Some(1),
            ..config()
        };
        let report = identify_rogues_in_trees(&trees(&TWO_ROGUES), &config).unwrap();
        assert_eq!(report.dropped_names(), ["X"]);
        assert_eq!(report.final_score(), 14);
    }

    #[test]
    fn test_larger_dropsets_win_when_allowed() {
        let config = Config {
            max_dropset_size: 2,
            ..config()
        };
        let report = identify_rogues_in_trees(&trees(&TWO_ROGUES), &config).unwrap();
        assert_eq!(report.rounds.len(), 1);
        assert_eq!(report.rounds[0].names, ["X", "Y"]);
        assert_eq!(report.rounds[0].improvement, 3);
        assert_eq!(report.final_score(), 15);
    }

    #[test]
    fn test_excluded_taxa_stay() {
        let config = Config {
            excluded_taxa: vec!["X".into()],
            ..config()
        };
        let report = identify_rogues_in_trees(&trees(&TWO_ROGUES), &config).unwrap();
        assert_eq!(report.dropped_names(), ["Y"]);
        assert_eq!(report.final_score(), 13);

        let config = Config {
            excluded_taxa: vec!["Z".into()],
            ..self::config()
        };
        let err = identify_rogues_in_trees(&trees(&TWO_ROGUES), &config).unwrap_err();
        assert!(matches!(err, Error::UnknownTaxon(name) if name == "Z"));
    }

    #[test]
    fn test_identical_trees_have_no_rogues() {
        let report = identify_rogues_in_trees(
            &trees(&["((A,B),(C,(D,E)));", "((A,B),(C,(D,E)));"]),
            &config(),
        )
        .unwrap();
        assert!(report.rounds.is_empty());
        assert_eq!(report.initial_score, 4);
    }

    #[test]
    fn test_input_errors() {
        assert!(matches!(identify_rogues(&[], &config()), Err(Error::NoTrees)));

        let mismatch = trees(&["((A,B),(C,D));", "((A,B),(C,E));"]);
        assert!(matches!(
            identify_rogues_in_trees(&mismatch, &config()),
            Err(Error::LeafSetMismatch { index: 1 })
        ));
    }

    #[test]
    fn test_select_best_tie_breaks() {
        let dropsets = vec![
            dropset(&[5], 2),
            dropset(&[1, 2], 3),
            dropset(&[4, 0], 3),
            dropset(&[3], -1),
            dropset(&[2], 0),
        ];
        let best = select_best(&dropsets, 20).unwrap();
        assert_eq!(best.taxa, [0, 4].into_iter().collect::<IndexList>());

        let dropsets = vec![dropset(&[7], 1), dropset(&[6], 1)];
        assert_eq!(select_best(&dropsets, 20).unwrap().taxa.as_slice(), &[6]);

        // Only four taxa left: nothing may go.
        assert!(select_best(&dropsets, MIN_LIVE_TAXA).is_none());
        assert!(select_best(&[dropset(&[1], 0)], 20).is_none());
    }
}
