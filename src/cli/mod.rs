//! CLI module - Command-line interface for jobfeed
//!
//! This module provides a structured CLI using clap for argument parsing.

mod commands;

use clap::{Parser, Subcommand};

/// jobfeed - job search RSS feeds
/// Turns a job board search into a feed that refreshes itself every hour
#[derive(Parser)]
#[command(name = "jobfeed")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the scheduler and the feed server until Ctrl+C
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Scrape every stored query once, now
    #[command(alias = "-c", alias = "--check")]
    Check,

    /// Create a query and run its first scrape
    #[command(alias = "a")]
    Add {
        /// Search keywords, e.g. "golang"
        keywords: String,
        /// Search location, e.g. "berlin"
        location: String,
    },

    /// List stored queries
    #[command(alias = "ls", alias = "l")]
    List,

    /// Delete offers older than the retention window
    Sweep,

    /// Create default config file
    #[command(alias = "--init")]
    Init,
}

pub use commands::*;
