//! Run configuration for the rogue taxon search.

use std::thread;

use crate::error::{Error, Result};

/// What the consensus score counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Objective {
    /// Sum of the supports (in trees) of all consensus splits.
    #[default]
    Support,
    /// Number of splits in the consensus.
    Bipartitions,
}

/// Which consensus the score is computed on.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Consensus {
    /// Extended majority rule: greedily add compatible splits by support.
    #[default]
    Mre,
    /// Majority rule: only splits found in more than half of the trees.
    MajorityRule,
}

/// Seed used when none is given, so repeated runs hash taxa identically.
pub const DEFAULT_SEED: u64 = 0x5eed_d20b_5e75;

#[derive(Clone, Debug)]
pub struct Config {
    /// Upper bound on the number of taxa in one dropset.
    pub max_dropset_size: usize,
    /// Worker threads of the pool.
    pub threads: usize,
    /// Seed for the per-taxon hash values.
    pub seed: u64,
    pub objective: Objective,
    pub consensus: Consensus,
    /// Pin worker `i` to core `i` where the platform allows it.
    pub pin_threads: bool,
    /// Stop after this many dropsets have been removed.
    pub max_rounds: Option<usize>,
    /// Taxa that must never be dropped.
    pub excluded_taxa: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            max_dropset_size: 1,
            threads: thread::available_parallelism().map_or(1, |n| n.get()),
            seed: DEFAULT_SEED,
            objective: Objective::default(),
            consensus: Consensus::default(),
            pin_threads: false,
            max_rounds: None,
            excluded_taxa: Vec::new(),
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<()> {
        if self.max_dropset_size == 0 {
            return Err(Error::InvalidConfig(
                "maximum dropset size must be at least 1".into(),
            ));
        }
        if self.threads == 0 {
            return Err(Error::InvalidConfig(
                "number of threads must be at least 1".into(),
            ));
        }
        if self.max_rounds == Some(0) {
            return Err(Error::InvalidConfig(
                "maximum number of rounds must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.max_dropset_size, 1);
        assert!(config.threads >= 1);
    }

    #[test]
    fn test_rejects_zero_bounds() {
        let config = Config {
            max_dropset_size: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            threads: 0,
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));

        let config = Config {
            max_rounds: Some(0),
            ..Config::default()
        };
        assert!(matches!(config.validate(), Err(Error::InvalidConfig(_))));
    }
}
