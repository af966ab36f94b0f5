use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "reelbox")]
#[command(author, version, about = "MP4 container inspection and remux tool")]
pub struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Open a file and display duration, dimensions and track layout
    Info {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Print the box tree, one tag per line
    Dump {
        /// File to inspect
        #[arg(required = true)]
        file: PathBuf,
    },

    /// Rewrite a file through the box writer, regenerating the sample
    /// tables
    Remux {
        /// Input file
        #[arg(required = true)]
        input: PathBuf,

        /// Output file
        #[arg(required = true)]
        output: PathBuf,
    },

    /// Display version information
    Version,
}
