mod calc;
mod cmd;
mod data;
mod logging;
mod ui;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "invoice-form", about = "fill in an invoice in the terminal")]
struct Cli {
    /// Path to the directory holding config.yaml (default: ./config)
    #[arg(long, default_value = "./config")]
    data_dir: PathBuf,

    /// Append debug logs to this file
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Print the saved invoice as JSON instead of a text summary
    #[arg(long)]
    json: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Commands {
    /// Write a default config.yaml into the data directory
    Init,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Some(path) = &cli.log_file {
        logging::init_tracing(path)?;
    }

    let data_dir = if cli.data_dir.is_absolute() {
        cli.data_dir.clone()
    } else {
        std::env::current_dir()?.join(&cli.data_dir)
    };
    data::persistence::set_data_dir(data_dir);

    match cli.command {
        None => cmd::root::run(cli.json),
        Some(Commands::Init) => cmd::init::run(),
    }
}
