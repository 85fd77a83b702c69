//! Diagnostic capture of composed instructions.
//!
//! When enabled via `dump_prompts = true` in `[logging]`, every instruction
//! sent to the model is written as a readable transcript to
//! `./logs/prompts/{timestamp}.txt`. Failures are logged as warnings and
//! never block the request.

use std::path::{Path, PathBuf};

use chrono::Utc;
use medirag_knowledge::InstructionPair;
use tracing::{debug, warn};

pub const PROMPT_DIR: &str = "./logs/prompts";

#[derive(Debug, Clone)]
pub struct PromptDump {
    dir: PathBuf,
}

impl Default for PromptDump {
    fn default() -> Self {
        Self::new(PROMPT_DIR)
    }
}

impl PromptDump {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write the transcript; returns the file path when it was written.
    pub async fn write(&self, instruction: &InstructionPair) -> Option<PathBuf> {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!("dump_prompts: failed to create {}: {}", self.dir.display(), e);
            return None;
        }

        let timestamp = Utc::now().format("%Y%m%d-%H%M%S%.3f");
        let mut path = self.dir.join(format!("{timestamp}.txt"));
        let mut suffix = 1;
        while tokio::fs::try_exists(&path).await.unwrap_or(false) {
            path = self.dir.join(format!("{timestamp}-{suffix}.txt"));
            suffix += 1;
        }

        match tokio::fs::write(&path, instruction.transcript()).await {
            Ok(()) => {
                debug!("dump_prompts: wrote {}", path.display());
                Some(path)
            }
            Err(e) => {
                warn!("dump_prompts: failed to write {}: {}", path.display(), e);
                None
            }
        }
    }
}
