use std::path::PathBuf;

use clap::{ArgAction, Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "labflux",
    version,
    about = "Extracts lab-report results into a fixed-slot flowsheet mapping"
)]
pub struct Cli {
    /// Raise the default log level (`-v` debug, `-vv` trace); `RUST_LOG` takes precedence.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Inventory(InventoryArgs),
    Extract(ExtractArgs),
    Status(StatusArgs),
}

#[derive(Args, Debug, Clone)]
pub struct InventoryArgs {
    #[arg(long)]
    pub input_dir: PathBuf,

    #[arg(long, default_value = ".cache/labflux")]
    pub work_dir: PathBuf,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ExtractArgs {
    /// PDF, zip or text files, or directories holding them.
    #[arg(long = "input", required = true)]
    pub inputs: Vec<PathBuf>,

    #[arg(long, default_value = ".cache/labflux")]
    pub work_dir: PathBuf,

    #[arg(long)]
    pub output_path: Option<PathBuf>,

    /// Also write every assembled row, resolved or not.
    #[arg(long)]
    pub rows_path: Option<PathBuf>,

    #[arg(long)]
    pub manifest_path: Option<PathBuf>,

    /// JSON file with extra alias rules, tried before the built-in ones.
    #[arg(long)]
    pub alias_config: Option<PathBuf>,

    #[arg(long)]
    pub max_pages_per_doc: Option<usize>,
}

#[derive(Args, Debug, Clone)]
pub struct StatusArgs {
    #[arg(long, default_value = ".cache/labflux")]
    pub work_dir: PathBuf,
}
