//! Command-line interface.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Handwritten-digit classifier inference service
#[derive(Debug, Parser)]
#[command(name = "mnist-serving")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON)
    #[arg(short = 'c', long, global = true, env = "MNIST_SERVING_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the HTTP server (default)
    Serve,

    /// Classify one image file and print the distribution
    Predict {
        /// Image to classify
        image: PathBuf,

        /// Model artifact, overriding the configured path
        #[arg(short, long)]
        model: Option<PathBuf>,
    },

    /// Measure accuracy over a directory of `<digit>/<image>` files
    Validate {
        /// Directory with one sub-directory per digit
        dir: PathBuf,

        /// Model artifact, overriding the configured path
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}
