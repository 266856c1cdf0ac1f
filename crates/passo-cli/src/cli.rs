use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    version,
    about = "PASSO CLI - Multi-start docking and design searches built on the PASSO protocol.",
    help_template = HELP_TEMPLATE,
)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, global = true, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compute the virtual center and list the grid origins of a docking system.
    Grid(GridArgs),
    /// Run a complete multi-start search, locally or on a SLURM cluster.
    Run(RunArgs),
    /// Run a single decoy. Cluster jobs invoke this command.
    Decoy(DecoyArgs),
    /// Summarize the progress of a search from the files it has written.
    Status(StatusArgs),
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    Local,
    Cluster,
}

/// Inputs shared by every command that needs the search configuration.
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Geometry file (TOML) with the coordinates of blocks A, B and C.
    #[arg(short, long, required = true, value_name = "PATH")]
    pub geometry: PathBuf,

    /// Search configuration file in TOML format.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Directory that receives every decoy's logs and state files.
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Override the number of decoys started from each grid origin.
    #[arg(short = 'n', long, value_name = "INT")]
    pub decoys: Option<usize>,

    /// Override the number of PASSO steps per decoy.
    #[arg(short = 's', long, value_name = "INT")]
    pub max_steps: Option<usize>,

    /// Override the chain designed around the movable block.
    #[arg(long, value_name = "CHAR")]
    pub target_chain: Option<char>,

    /// Base seed for reproducible decoy trajectories.
    #[arg(long, value_name = "INT")]
    pub seed: Option<u64>,

    /// Set a specific configuration value, overriding the config file.
    /// Can be used multiple times. Example: -S protocol.max-steps=500
    #[arg(short = 'S', long = "set", value_name = "KEY=VALUE", num_args(0..))]
    pub set_values: Vec<String>,
}

/// Arguments for the `grid` subcommand.
#[derive(Args, Debug)]
pub struct GridArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Write the grid origins to a TOML file.
    #[arg(short, long, value_name = "PATH")]
    pub write: Option<PathBuf>,
}

/// Arguments for the `run` subcommand.
#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Where decoys run.
    #[arg(short, long, value_enum, value_name = "MODE")]
    pub mode: Option<ModeArg>,

    /// Number of decoys run concurrently in local mode.
    #[arg(short = 'j', long, value_name = "NUM")]
    pub max_parallel: Option<usize>,

    /// Maximum number of jobs held in the cluster queue at once.
    #[arg(long, value_name = "INT")]
    pub admission_cap: Option<usize>,

    /// Keep polling the cluster queue until every submitted job has left it.
    #[arg(long)]
    pub wait: bool,
}

/// Arguments for the `decoy` subcommand.
#[derive(Args, Debug)]
pub struct DecoyArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Grid origin the decoy starts from.
    #[arg(long, required = true, value_name = "INT")]
    pub origin: usize,

    /// Index of the decoy within its grid origin.
    #[arg(long, required = true, value_name = "INT")]
    pub index: usize,
}

/// Arguments for the `status` subcommand.
#[derive(Args, Debug)]
pub struct StatusArgs {
    #[command(flatten)]
    pub search: SearchArgs,

    /// Also list every decoy that has started but not finished.
    #[arg(long)]
    pub active: bool,
}
