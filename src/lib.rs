//! # HarvestMind (library root)
//!
//! Core plumbing for the **HarvestMind** agronomic diagnostic service:
//!
//! - Case-embedding similarity retrieval (`vector_store`).
//! - Grounding-context assembly (`context`).
//! - The report orchestrator that drives retrieval-augmented generation
//!   under a strict output contract and degrades deterministically on
//!   failure (`doctor`).
//! - External capabilities consumed as opaque collaborators: the embedding
//!   model (`embedding`) and an OpenAI-compatible generation service.
//! - Bulk dataset indexing (`indexer`), sensor threshold alerting
//!   (`alerts`), configuration (`config`), prompt templates (`template`),
//!   and the domain data model (`models`).
//!
//! The case bank is in-memory and append-only: it is created at process
//! start, grows monotonically, and is discarded at process exit. Nothing is
//! persisted, so callers that need their cases back after a restart must
//! replay them through ingestion or bulk indexing.
//!
//! ## Modules
//! - [`alerts`], [`commands`], [`config`], [`context`], [`doctor`],
//!   [`embedding`], [`indexer`], [`models`], [`template`], [`vector_store`]

use directories::ProjectDirs;
use std::error::Error;

pub mod alerts;
pub mod commands;
pub mod config;
pub mod context;
pub mod doctor;
pub mod embedding;
pub mod indexer;
pub mod models;
pub mod template;
pub mod vector_store;

/// Return the per-platform configuration directory used by HarvestMind.
///
/// This uses [`directories::ProjectDirs`] with the application triple
/// `("com", "awful-sec", "hm")`, so you get the right place on each OS
/// (e.g., `~/.config/hm` on Linux via XDG).
///
/// The directory is **not** created by this function; callers that need it
/// should create it with `fs::create_dir_all`.
///
/// # Errors
/// Returns an error if the platform configuration directory cannot be
/// determined.
pub fn config_dir() -> Result<std::path::PathBuf, Box<dyn Error>> {
    let proj_dirs = ProjectDirs::from("com", "awful-sec", "hm")
        .ok_or("Unable to determine config directory")?;
    let config_dir = proj_dirs.config_dir().to_path_buf();

    Ok(config_dir)
}
