use std::path::Path;

use anyhow::{Context, Result};
use chatstate_core::{GlobalAction, GlobalState};

/// Load a `GlobalState` snapshot in the persisted camelCase shape
pub fn load_snapshot<P: AsRef<Path>>(path: P) -> Result<GlobalState> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read snapshot: {}", path.display()))?;
    parse_snapshot(&content).with_context(|| format!("Failed to parse snapshot: {}", path.display()))
}

pub fn parse_snapshot(json: &str) -> Result<GlobalState> {
    serde_json::from_str(json).context("Failed to deserialize snapshot")
}

/// Load a JSON array of actions, e.g. `[{"type": "markChatRead", "chatId": "1"}]`
pub fn load_actions<P: AsRef<Path>>(path: P) -> Result<Vec<GlobalAction>> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read actions: {}", path.display()))?;
    parse_actions(&content).with_context(|| format!("Failed to parse actions: {}", path.display()))
}

pub fn parse_actions(json: &str) -> Result<Vec<GlobalAction>> {
    serde_json::from_str(json).context("Failed to deserialize actions")
}
