use std::path::PathBuf;

use serde::Serialize;
use tracing::debug;

use rollcall_core::errors::AppResult;
use rollcall_core::faces::{list_identities, IdentityListing};

use crate::cli::RosterArgs;
use crate::config::load_app_config;

#[derive(Debug, Clone, Serialize)]
pub struct RosterOutcome {
    pub dir: PathBuf,
    pub entries: Vec<IdentityListing>,
}

pub fn run_roster(args: &RosterArgs) -> AppResult<RosterOutcome> {
    let loaded = load_app_config()?;
    let dir = args
        .known_faces_dir
        .clone()
        .unwrap_or(loaded.resolved.known_faces_dir);
    roster_for_dir(dir)
}

/// Lists who is enrolled under `dir`. A directory that does not exist yet
/// is an empty roster, not an error.
pub fn roster_for_dir(dir: PathBuf) -> AppResult<RosterOutcome> {
    let entries = list_identities(&dir)?;
    debug!(dir = %dir.display(), identities = entries.len(), "roster listed");
    Ok(RosterOutcome { dir, entries })
}
