// src/config/roster.rs
use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::{env, fs, path::Path, path::PathBuf};

use crate::poll::PollingConfig;
use crate::roster::{Candidate, MergeOptions, Provenance, DEFAULT_HIGHLIGHT_SIZE};

pub const DEFAULT_CONFIG_PATH: &str = "config/roster.toml";
pub const ENV_CONFIG_PATH: &str = "ROSTER_CONFIG_PATH";
pub const ENV_BACKEND_URL: &str = "ROSTER_BACKEND_URL";

fn default_backend_url() -> String {
    "http://127.0.0.1:8000".to_string()
}
fn default_highlight_size() -> usize {
    DEFAULT_HIGHLIGHT_SIZE
}

#[derive(Debug, Clone, Deserialize)]
pub struct MergeSection {
    #[serde(default = "default_highlight_size")]
    pub highlight_size: usize,
    /// Internal/demo accounts kept out of the general list.
    #[serde(default)]
    pub excluded: Vec<String>,
}

impl Default for MergeSection {
    fn default() -> Self {
        Self {
            highlight_size: DEFAULT_HIGHLIGHT_SIZE,
            excluded: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RosterSyncConfig {
    #[serde(default = "default_backend_url")]
    pub backend_url: String,
    #[serde(default = "PollingConfig::roster")]
    pub roster: PollingConfig,
    #[serde(default)]
    pub stats: PollingConfig,
    #[serde(default)]
    pub thread: PollingConfig,
    #[serde(default = "PollingConfig::roster")]
    pub inferred: PollingConfig,
    #[serde(default)]
    pub merge: MergeSection,
    /// Static seed list shipped with the client.
    #[serde(default)]
    pub seed: Vec<Candidate>,
}

impl Default for RosterSyncConfig {
    fn default() -> Self {
        Self {
            backend_url: default_backend_url(),
            roster: PollingConfig::roster(),
            stats: PollingConfig::default(),
            thread: PollingConfig::default(),
            inferred: PollingConfig::roster(),
            merge: MergeSection::default(),
            seed: Vec::new(),
        }
    }
}

impl RosterSyncConfig {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading roster config from {}", path.display()))?;
        let cfg: RosterSyncConfig = toml::from_str(&data)
            .with_context(|| format!("parsing roster config {}", path.display()))?;
        Ok(cfg.normalized())
    }

    /// Resolution order:
    /// 1) $ROSTER_CONFIG_PATH (must exist)
    /// 2) config/roster.toml
    /// 3) built-in defaults
    ///
    /// Env overrides are applied last in every case.
    pub fn load_default() -> Result<Self> {
        let cfg = if let Ok(p) = env::var(ENV_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if !pb.exists() {
                return Err(anyhow!("{ENV_CONFIG_PATH} points to non-existent path"));
            }
            Self::load_from_file(&pb)?
        } else {
            let fallback = PathBuf::from(DEFAULT_CONFIG_PATH);
            if fallback.exists() {
                Self::load_from_file(&fallback)?
            } else {
                Self::default()
            }
        };
        Ok(cfg.with_env_overrides())
    }

    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = env::var(ENV_BACKEND_URL) {
            let url = url.trim();
            if !url.is_empty() {
                self.backend_url = url.to_string();
            }
        }
        self.roster = self.roster.with_env_overrides().sanitized();
        self.normalized()
    }

    fn normalized(mut self) -> Self {
        self.backend_url = self.backend_url.trim().trim_end_matches('/').to_string();
        self.roster = self.roster.sanitized();
        self.stats = self.stats.sanitized();
        self.thread = self.thread.sanitized();
        self.inferred = self.inferred.sanitized();
        for c in &mut self.seed {
            c.provenance = Provenance::Seed;
        }
        self
    }

    pub fn merge_options(&self) -> MergeOptions {
        MergeOptions::default()
            .with_highlight_size(self.merge.highlight_size)
            .exclude(&self.merge.excluded)
    }

    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.backend_url, path.trim_start_matches('/'))
    }

    /// `/api/conversations/<email>` with the address as one percent-encoded path segment.
    pub fn thread_endpoint(&self, email: &str) -> Result<reqwest::Url> {
        let base = self.endpoint("api/conversations");
        let mut url = reqwest::Url::parse(&base).with_context(|| format!("invalid backend url: {base}"))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("backend url cannot carry a path: {base}"))?
            .push(email.trim());
        Ok(url)
    }
}
