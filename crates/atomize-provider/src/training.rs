//! Few-shot training pairs for the chat provider.

use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// One V3 input with its expected V4 output.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPair {
    pub v3: Value,
    pub v4: Value,
}

fn pair_paths(dir: &Path, n: usize) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("container-v3-{n}.json")),
        dir.join(format!("container-v4-{n}.json")),
    )
}

fn read_json(path: &Path) -> Option<Value> {
    let text = match std::fs::read_to_string(path) {
        Ok(text) => text,
        Err(error) => {
            warn!(path = %path.display(), %error, "skipping unreadable training file");
            return None;
        }
    };
    match serde_json::from_str(&text) {
        Ok(value) => Some(value),
        Err(error) => {
            warn!(path = %path.display(), %error, "skipping malformed training file");
            None
        }
    }
}

/// Load `container-v3-{n}.json` / `container-v4-{n}.json` pairs from `dir`.
///
/// Numbering starts at 1 and stops at the first `n` with neither file.
/// Pairs missing a half or failing to parse are skipped.
#[must_use]
pub fn load_training_pairs(dir: &Path) -> Vec<TrainingPair> {
    let mut pairs = Vec::new();
    for n in 1.. {
        let (v3_path, v4_path) = pair_paths(dir, n);
        match (v3_path.is_file(), v4_path.is_file()) {
            (false, false) => break,
            (true, true) => {
                if let (Some(v3), Some(v4)) = (read_json(&v3_path), read_json(&v4_path)) {
                    pairs.push(TrainingPair { v3, v4 });
                }
            }
            _ => warn!(dir = %dir.display(), n, "training pair is missing a half"),
        }
    }
    debug!(dir = %dir.display(), pairs = pairs.len(), "loaded training pairs");
    pairs
}
