use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "marginalia",
    version,
    about = "Ingest reading highlights into a local book and quote catalog"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    Ingest(IngestArgs),
    Goodreads(GoodreadsArgs),
    Convert(ConvertArgs),
}

#[derive(Args, Debug, Clone)]
pub struct IngestArgs {
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,
}

#[derive(Args, Debug, Clone)]
pub struct GoodreadsArgs {
    #[arg(long, default_value = "data")]
    pub data_root: PathBuf,

    #[arg(long)]
    pub export_path: Option<PathBuf>,

    #[arg(long, default_value_t = false)]
    pub merge: bool,
}

#[derive(Args, Debug, Clone)]
pub struct ConvertArgs {
    pub target: PathBuf,
}
