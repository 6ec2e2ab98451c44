use clap::{Parser, ValueEnum};
use log::{LevelFilter, error, info};
use rogue_dropsets::config::{Config, Consensus, DEFAULT_SEED, Objective};
use rogue_dropsets::io::{read_taxon_list, read_trees, write_rounds_tsv};
use rogue_dropsets::rogue::identify_rogues;
use rogue_dropsets::snapshot::TreeSnapshot;
use std::path::PathBuf;
use std::time::Instant;

/// Identify rogue taxa in a tree collection by repeatedly removing the set of
/// taxa whose removal improves the consensus the most, and write one TSV row
/// per removed set.
#[derive(Parser, Debug)]
#[command(
    name = "rogue-dropsets",
    version,
    about = "Rogue taxon identification for tree collections"
)]
struct Args {
    /// Path to a BEAST .trees (NEXUS) file or a file with one Newick tree per line
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Burn-in by number of trees (drop first N trees)
    #[arg(short = 't', long = "burnin-trees", default_value_t = 0)]
    burnin_trees: usize,

    /// Burn-in by state (keep trees with STATE_ > value)
    #[arg(short = 's', long = "burnin-states", default_value_t = 0)]
    burnin_states: usize,

    /// Output path for the TSV of removed taxa (gzip-compressed if it ends with .gz)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Use TRANSLATE block to map taxon IDs to labels when available
    #[arg(long = "use-real-taxa", default_value_t = false)]
    use_real_taxa: bool,

    /// Maximum number of taxa removed together
    #[arg(short = 'd', long = "max-dropset-size", default_value_t = 1)]
    max_dropset_size: usize,

    /// Worker threads (default: all cores)
    #[arg(short = 'T', long = "threads")]
    threads: Option<usize>,

    /// Seed of the per-taxon hash values
    #[arg(long = "seed", default_value_t = DEFAULT_SEED)]
    seed: u64,

    /// What the consensus score counts: support | bipartitions
    #[arg(long = "objective", value_enum, default_value_t = ObjectiveArg::Support)]
    objective: ObjectiveArg,

    /// Consensus to optimize: mre | majority
    #[arg(long = "consensus", value_enum, default_value_t = ConsensusArg::Mre)]
    consensus: ConsensusArg,

    /// Pin worker threads to cores
    #[arg(long = "pin-threads", default_value_t = false)]
    pin_threads: bool,

    /// Stop after this many rounds
    #[arg(long = "max-rounds")]
    max_rounds: Option<usize>,

    /// File with taxa that must never be removed, one per line
    #[arg(short = 'x', long = "exclude")]
    exclude: Option<PathBuf>,

    /// Quiet mode: only errors are reported
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,

    /// Verbose mode: report every dispatch and dropset
    #[arg(short = 'v', long = "verbose", default_value_t = false)]
    verbose: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ObjectiveArg {
    Support,
    Bipartitions,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ConsensusArg {
    Mre,
    Majority,
}

fn main() {
    let args = Args::parse();

    let level = match (args.quiet, args.verbose) {
        (true, _) => LevelFilter::Error,
        (false, true) => LevelFilter::Debug,
        (false, false) => LevelFilter::Info,
    };
    if let Err(e) = simplelog::TermLogger::init(
        level,
        simplelog::Config::default(),
        simplelog::TerminalMode::Mixed,
        simplelog::ColorChoice::Auto,
    ) {
        eprintln!("Failed to set up logging: {e}");
    }

    let excluded_taxa = match &args.exclude {
        Some(path) => match read_taxon_list(path) {
            Ok(taxa) => taxa,
            Err(e) => {
                error!("{e}");
                std::process::exit(2);
            }
        },
        None => Vec::new(),
    };

    let defaults = Config::default();
    let config = Config {
        max_dropset_size: args.max_dropset_size,
        threads: args.threads.unwrap_or(defaults.threads),
        seed: args.seed,
        objective: match args.objective {
            ObjectiveArg::Support => Objective::Support,
            ObjectiveArg::Bipartitions => Objective::Bipartitions,
        },
        consensus: match args.consensus {
            ConsensusArg::Mre => Consensus::Mre,
            ConsensusArg::Majority => Consensus::MajorityRule,
        },
        pin_threads: args.pin_threads,
        max_rounds: args.max_rounds,
        excluded_taxa,
    };

    // Read trees with names
    let t0 = Instant::now();
    let named_trees = match read_trees(
        &args.input,
        args.burnin_trees,
        args.burnin_states,
        args.use_real_taxa,
    ) {
        Ok(trees) if !trees.is_empty() => trees,
        Ok(_) => {
            error!("No trees parsed from {:?}.", args.input);
            std::process::exit(2);
        }
        Err(e) => {
            error!("{e}");
            std::process::exit(2);
        }
    };
    info!("Read {} trees in {:.3}s", named_trees.len(), t0.elapsed().as_secs_f64());

    let t1 = Instant::now();
    let snaps = match named_trees
        .iter()
        .map(|(_, tree)| TreeSnapshot::from_tree(tree))
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(s) => s,
        Err(e) => {
            error!("Failed to build snapshots: {e}");
            std::process::exit(3);
        }
    };
    info!("Creating tree bit snapshots {:.3}s", t1.elapsed().as_secs_f64());

    let t2 = Instant::now();
    let report = match identify_rogues(&snaps, &config) {
        Ok(r) => r,
        Err(e) => {
            error!("{e}");
            std::process::exit(3);
        }
    };
    info!(
        "Removed {} taxa in {} rounds, score {} -> {} ({:.3}s)",
        report.dropped_names().len(),
        report.rounds.len(),
        report.initial_score,
        report.final_score(),
        t2.elapsed().as_secs_f64()
    );

    let t3 = Instant::now();
    if let Err(e) = write_rounds_tsv(&args.output, &report) {
        error!("{e}");
        std::process::exit(4);
    }
    info!("Writing to output {:.3}s", t3.elapsed().as_secs_f64());
}
