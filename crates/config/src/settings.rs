use std::env;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogSettings {
    pub csv_path: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self { csv_path: "config/catalog.csv".to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VectorSettings {
    /// Prebuilt index JSON. When unset the index is embedded from the
    /// catalog at startup.
    pub index_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Base URL for the completion endpoint. Overridden at runtime by the
    /// `LAPADVISOR_LLM_BASE_URL` environment variable when set.
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            model: "qwen2.5:14b".to_string(),
            temperature: 0.1,
            max_tokens: 2048,
            timeout_secs: 90,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FunnelSettings {
    pub session_ttl_hours: u64,
    pub sweep_interval_minutes: u64,
    /// Shuffle the first three questions of each session. The shuffle is
    /// seeded from the session id so transcripts stay reproducible.
    pub shuffle_lead_questions: bool,
    /// Hand out all questions at once instead of one per turn.
    pub one_shot: bool,
}

impl Default for FunnelSettings {
    fn default() -> Self {
        Self {
            session_ttl_hours: 24,
            sweep_interval_minutes: 60,
            shuffle_lead_questions: false,
            one_shot: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalSettings {
    /// Series shown when a funnel filter set matches nothing.
    pub default_series: Vec<String>,
    /// Top-k vector hits merged into general-topic retrieval.
    pub vector_k: usize,
}

impl Default for RetrievalSettings {
    fn default() -> Self {
        Self {
            default_series: vec!["958".to_string(), "819".to_string(), "839".to_string()],
            vector_k: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Table cells longer than this are shown truncated with an ellipsis.
    pub cell_width: usize,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self { cell_width: 50 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactSettings {
    /// Directory holding the four dialogue artifacts.
    pub dir: String,
}

impl Default for ArtifactSettings {
    fn default() -> Self {
        Self { dir: "config".to_string() }
    }
}

/// Process-wide settings, loaded once from TOML at startup and immutable
/// thereafter. Every field has a default so an absent file still yields a
/// runnable configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub catalog: CatalogSettings,
    pub vector: VectorSettings,
    pub llm: LlmSection,
    pub funnel: FunnelSettings,
    pub retrieval: RetrievalSettings,
    pub display: DisplaySettings,
    pub artifacts: ArtifactSettings,
}

impl AppConfig {
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)
                .with_context(|| format!("parsing settings at {}", path.display()))?;
        }

        if let Ok(value) = env::var("LAPADVISOR_LLM_BASE_URL") {
            if !value.is_empty() {
                config.llm.base_url = value;
            }
        }

        Ok(config)
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }
}
