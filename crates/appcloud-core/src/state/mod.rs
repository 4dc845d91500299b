//! Local state kept between commands.
//!
//! Two files live in the state directory: the session token (read once
//! per command, never written here) and the instance debug map that
//! lets `files` address a crashed or canary instance by a short label.

pub mod instance_map;

use std::path::{Path, PathBuf};

use anyhow::Context;

pub use instance_map::{InstanceMap, InstanceMapStore};

pub const TOKEN_FILE: &str = "token";

/// Read the session token, if one has been stored.
pub fn load_token(state_dir: &Path) -> anyhow::Result<Option<String>> {
    let path = token_path(state_dir);
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read token file: {}", path.display()))?;
    let token = content.trim();
    if token.is_empty() {
        Ok(None)
    } else {
        Ok(Some(token.to_string()))
    }
}

pub fn token_path(state_dir: &Path) -> PathBuf {
    state_dir.join(TOKEN_FILE)
}
