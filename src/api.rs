//! Python binding layer for the rogue taxon search.
//!
//! Provides a Python function that reads tree files, runs the search and
//! returns the removed taxa round by round.

use phylotree::tree::Tree as PhyloTree;
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;

use crate::config::{Config, Consensus, DEFAULT_SEED, Objective};
use crate::io::read_trees;
use crate::rogue::identify_rogues_in_trees;

/// One round as returned to Python: (round, taxa, improvement, score).
type PyRound = (usize, Vec<String>, i64, i64);

/// Identify rogue taxa in the trees of one or more files.
///
/// Args:
///     paths: List of file paths to BEAST/NEXUS tree files or Newick files (one tree per line)
///     max_dropset_size: Maximum number of taxa removed together (default: 1)
///     threads: Number of worker threads (default: all cores)
///     seed: Seed of the per-taxon hash values
///     objective: "support" or "bipartitions" (default: "support")
///     consensus: "mre" or "majority" (default: "mre")
///     max_rounds: Stop after this many rounds (default: no limit)
///     excluded_taxa: Taxa that must never be removed
///     burnin_trees: Number of trees to skip at the beginning of each file (default: 0)
///     burnin_states: Minimum STATE value to keep trees (default: 0)
///     use_real_taxa: Use TRANSLATE block for taxon names when available (default: True)
///
/// Returns:
///     A tuple of (initial_score, rounds) where each round is
///     (round, removed_taxa, improvement, score)
///
/// Raises:
///     ValueError: If no trees are found, trees have different leaf sets, or an option is invalid
#[pyfunction]
#[pyo3(signature = (
    paths,
    max_dropset_size=1,
    threads=None,
    seed=DEFAULT_SEED,
    objective="support",
    consensus="mre",
    max_rounds=None,
    excluded_taxa=Vec::new(),
    burnin_trees=0,
    burnin_states=0,
    use_real_taxa=true
))]
#[allow(clippy::too_many_arguments)]
fn find_rogues(
    paths: Vec<String>,
    max_dropset_size: usize,
    threads: Option<usize>,
    seed: u64,
    objective: &str,
    consensus: &str,
    max_rounds: Option<usize>,
    excluded_taxa: Vec<String>,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> PyResult<(i64, Vec<PyRound>)> {
    let objective = match objective {
        "support" => Objective::Support,
        "bipartitions" => Objective::Bipartitions,
        other => return Err(PyValueError::new_err(format!("unknown objective '{other}'"))),
    };
    let consensus = match consensus {
        "mre" => Consensus::Mre,
        "majority" => Consensus::MajorityRule,
        other => return Err(PyValueError::new_err(format!("unknown consensus '{other}'"))),
    };

    let defaults = Config::default();
    let config = Config {
        max_dropset_size,
        threads: threads.unwrap_or(defaults.threads),
        seed,
        objective,
        consensus,
        pin_threads: false,
        max_rounds,
        excluded_taxa,
    };

    let trees = read_all_trees(&paths, burnin_trees, burnin_states, use_real_taxa)?;
    let report = identify_rogues_in_trees(&trees, &config)
        .map_err(|e| PyValueError::new_err(e.to_string()))?;

    let rounds = report
        .rounds
        .into_iter()
        .map(|r| (r.round, r.names, r.improvement, r.score))
        .collect();
    Ok((report.initial_score, rounds))
}

/// Helper function to read trees from multiple files
fn read_all_trees(
    paths: &[String],
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> PyResult<Vec<PhyloTree>> {
    let mut all_trees = Vec::new();

    for path in paths {
        let named_trees = read_trees(path, burnin_trees, burnin_states, use_real_taxa)
            .map_err(|e| PyValueError::new_err(e.to_string()))?;

        if named_trees.is_empty() {
            return Err(PyValueError::new_err(format!(
                "No trees found in file '{}' after burnin removal",
                path
            )));
        }
        all_trees.extend(named_trees.into_iter().map(|(_, tree)| tree));
    }

    if all_trees.is_empty() {
        return Err(PyValueError::new_err(
            "No trees found in any of the provided files",
        ));
    }

    Ok(all_trees)
}

/// Python module definition
#[pymodule]
fn rogue_dropsets(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(find_rogues, m)?)?;
    Ok(())
}
