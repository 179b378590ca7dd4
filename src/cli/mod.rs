//! Command-line interface.

use clap::{Parser, Subcommand};

/// Galleria - image gallery API server
#[derive(Parser)]
#[command(name = "galleria")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the API server (default)
    Serve,

    /// Reset the database and fill it with sample users and images
    Seed,
}
