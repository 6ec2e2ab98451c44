//! Error type shared by the library and the command line tool.
//!
//! Only conditions caused by inputs or the environment are errors. Broken
//! internal invariants panic, and candidates rejected by the size bound are
//! reported as `None` by the functions that produce them.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to access {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed tree: {0}")]
    Snapshot(String),

    #[error("no trees to analyse")]
    NoTrees,

    #[error("tree {index} has a different leaf set than tree 0")]
    LeafSetMismatch { index: usize },

    #[error("unknown taxon '{0}'")]
    UnknownTaxon(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("failed to start worker threads: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

impl From<phylotree::tree::TreeError> for Error {
    fn from(err: phylotree::tree::TreeError) -> Self {
        Error::Snapshot(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
