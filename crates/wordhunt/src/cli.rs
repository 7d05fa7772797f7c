//! Command-line interface for wordhunt.

use clap::{Parser, Subcommand};

/// Wordhunt - shared word-search sessions
#[derive(Parser, Debug)]
#[command(name = "wordhunt")]
#[command(about = "Word-search grids shared between concurrent players", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Path to a TOML config file. Defaults plus WORDHUNT_* variables when
    /// omitted.
    #[arg(short, long, global = true)]
    pub config: Option<std::path::PathBuf>,

    /// Subcommand to run
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the word categories and their words
    Categories,

    /// Generate a grid and print where each word landed
    Generate {
        /// Word category (unknown names fall back to animals)
        #[arg(long)]
        category: Option<String>,

        /// Grid columns
        #[arg(long)]
        width: Option<usize>,

        /// Grid rows
        #[arg(long)]
        height: Option<usize>,

        /// Seed for a reproducible grid
        #[arg(long)]
        seed: Option<u64>,
    },

    /// Race several in-process players over one shared session
    Simulate {
        /// Number of players, host included
        #[arg(short, long, default_value = "3")]
        players: usize,

        /// Word category (unknown names fall back to animals)
        #[arg(long)]
        category: Option<String>,

        /// Seed for the grid and the players' search order
        #[arg(long)]
        seed: Option<u64>,
    },
}
