//! Crate root: lightweight module orchestration and public re-exports.
//!
//! Modules:
//! - `bitset`, `index_list`, `hash_table`: taxon sets, id lists and the dropset table.
//! - `snapshot`, `profile`: splits of single trees and the bipartition profile of a collection.
//! - `context`, `difference`, `dropset`: per-run state, candidate dropsets and merging events.
//! - `scheduler`, `engine`, `mre`: the worker pool and the discovery, combination and scoring passes.
//! - `rogue`: the iterative search driver.
//! - `config`, `error`, `io`: configuration, errors, tree files and reports.
//! - `api`: Python bindings via `pyo3` (gated behind "python" feature).

pub mod bitset;
pub mod config;
pub mod context;
pub mod difference;
pub mod dropset;
pub mod engine;
pub mod error;
pub mod hash_table;
pub mod index_list;
pub mod io;
pub mod mre;
pub mod profile;
pub mod rogue;
pub mod scheduler;
pub mod snapshot;

#[cfg(feature = "python")]
pub mod api;

// Re-export frequently used types & functions
pub use bitset::Bitset;
pub use config::Config;
pub use error::{Error, Result};
pub use io::{read_trees, write_rounds_tsv};
pub use rogue::{RogueReport, RoundResult, identify_rogues, identify_rogues_in_trees};
pub use snapshot::TreeSnapshot;
