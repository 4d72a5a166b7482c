use clap::Parser;
use std::path::PathBuf;
use tracing::Level;

#[derive(Debug, Parser, Clone)]
#[clap(
    version = "0.1.0",
    name = "netrace",
    about = "A race simulator whose car speed follows live network quality"
)]
pub struct SimOpts {
    // FLAGS ---------------------------------------------------------------------------------------
    /// Activate debug logging (same as --log-level debug)
    #[clap(short, long)]
    pub debug: bool,

    /// Run a single race in real time and print every snapshot
    #[clap(short, long)]
    pub live: bool,

    // OPTIONS -------------------------------------------------------------------------------------
    /// Set number of simulation runs (only for batch mode, ignored in live mode)
    #[clap(short, long, default_value = "1")]
    pub no_sim_runs: u32,

    /// Set path to the simulation parameter file (OPTIONAL: if not set, uses hardcoded 2-competitor race)
    #[clap(short, long)]
    pub parfile_path: Option<PathBuf>,

    /// Set seed for obstacles and network sampling, overrides the seed of the parameter file
    #[clap(short, long)]
    pub seed: Option<u64>,

    /// Set real-time factor (only relevant in live mode)
    #[clap(short, long, default_value = "1.0")]
    pub realtime_factor: f64,

    /// Set path of the CSV file receiving the position trace of a finished race
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Set log level, can be refined through RUST_LOG
    #[clap(long, default_value = "info")]
    pub log_level: Level,
}
