//! This module defines the command-line interface for the application using
//! `clap`.
//!
//! It provides a `Cli` struct that represents the parsed command-line
//! arguments, and a `Commands` enum that represents the available
//! subcommands and their options.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Represents the parsed command-line arguments.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None, propagate_version = true, color = clap::ColorChoice::Always)]
pub struct Cli {
    /// The parsed subcommand and its options.
    #[command(subcommand)]
    pub command: Commands,
}

/// Represents the available subcommands and their options.
#[derive(Subcommand, Debug)]
#[command(about, long_about = None, color = clap::ColorChoice::Always)]
pub enum Commands {
    /// Run one end-to-end diagnosis and print the report JSON.
    ///
    /// The case bank is in-memory and per-process: seed it for this run
    /// with `--cases` (precomputed embeddings, JSONL of ingest requests)
    /// and/or `--dataset` (labeled observations, JSONL, embedded through
    /// the configured embedding model).
    #[clap(name = "diagnose", alias = "d")]
    Diagnose {
        /// The free-text question for the doctor.
        query: Option<String>,

        /// JSON file holding the current sensor snapshot (array of
        /// readings).
        #[arg(short = 's', long)]
        snapshot: Option<PathBuf>,

        /// JSONL file of precomputed embeddings to ingest before querying.
        #[arg(long)]
        cases: Option<PathBuf>,

        /// JSONL file of labeled cases to embed and index before querying.
        #[arg(long)]
        dataset: Option<PathBuf>,

        /// How many similar cases to ground the report on.
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// Name of a report template under the config directory.
        #[arg(short = 't', long)]
        template: Option<String>,
    },

    /// Evaluate the sensor threshold rules against a snapshot file.
    #[clap(name = "alerts", alias = "a")]
    Alerts {
        /// JSON file holding the sensor snapshot (array of readings).
        #[arg(short = 's', long)]
        snapshot: PathBuf,
    },

    /// Write the default configuration and report template.
    Init,
}
