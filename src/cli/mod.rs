//! CLI commands and interface

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "polymesh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub debug: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Print statistics of a built-in shape as JSON
    Info {
        /// Shape name (tetrahedron, cube, octahedron, dodecahedron, icosahedron, cuboctahedron)
        #[arg(short, long, default_value = "cube")]
        shape: String,

        /// Shape size
        #[arg(long, default_value = "1.0")]
        size: f32,
    },

    /// Apply operators to a built-in shape and print the result's statistics
    Apply {
        /// Shape name
        #[arg(short, long, default_value = "cube")]
        shape: String,

        /// Shape size
        #[arg(long, default_value = "1.0")]
        size: f32,

        /// Operators to apply in order (copy, ambo, gyro, chamfer, merge-coplanar, weld)
        #[arg(short = 'o', long = "op", value_name = "OPERATION")]
        ops: Vec<String>,

        /// Configuration file (JSON)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Run the sanity check on every intermediate mesh
        #[arg(long)]
        check: bool,
    },

    /// Write the default configuration file
    Config {
        /// Output JSON file path
        #[arg(short, long, value_name = "FILE")]
        output: PathBuf,
    },
}
