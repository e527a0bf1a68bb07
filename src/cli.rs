use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "craftwatch", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Config file path
    #[arg(short, long, value_name = "FILE")]
    pub config_path: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Watch the server and keep the status message up to date
    Run,

    /// Generate sample configuration
    ConfigSample {
        /// Output path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Ask a running monitor to poll the server now
    ForceCheck,

    /// Print the roster reconstructed from the server log
    Replay,

    /// Query the server once and print a connectivity diagnosis
    Probe,
}
