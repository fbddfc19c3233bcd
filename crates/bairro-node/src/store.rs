//! Chain state persistence.
//!
//! The whole chain is one JSON document. Writes go to a sibling temp file
//! first and are renamed into place, so a crash never leaves a torn file.

use std::fs;
use std::path::{Path, PathBuf};

use bairro_governance::Chain;
use tracing::debug;

pub struct ChainStore {
    path: PathBuf,
}

impl ChainStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    pub fn load(&self) -> anyhow::Result<Chain> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            anyhow::anyhow!(
                "Failed to read chain state '{}': {} (run `bairro init` first)",
                self.path.display(),
                e
            )
        })?;
        let chain: Chain = serde_json::from_str(&contents).map_err(|e| {
            anyhow::anyhow!("Corrupt chain state '{}': {}", self.path.display(), e)
        })?;
        debug!(path = %self.path.display(), block = chain.block(), "chain state loaded");
        Ok(chain)
    }

    pub fn save(&self, chain: &Chain) -> anyhow::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let contents = serde_json::to_string_pretty(chain)?;
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents)
            .map_err(|e| anyhow::anyhow!("Failed to write '{}': {}", tmp.display(), e))?;
        fs::rename(&tmp, &self.path).map_err(|e| {
            anyhow::anyhow!("Failed to move state into '{}': {}", self.path.display(), e)
        })?;

        debug!(path = %self.path.display(), block = chain.block(), "chain state saved");
        Ok(())
    }
}
