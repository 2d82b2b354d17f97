//! # Configuration
//!
//! Runtime settings resolved from `.orchestrai/config.json` and `ORCHESTRAI_*`
//! environment variables. The persisted document is sparse: only fields the
//! user changed are written back.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::models::{LlmProvider, ModelConfig};
use crate::state::AgentKind;

const CONFIG_FILE: &str = "config.json";

/// Get the runtime directory path (.orchestrai)
pub fn runtime_path() -> PathBuf {
    if let Ok(path) = std::env::var("ORCHESTRAI_RUNTIME_PATH") {
        return PathBuf::from(path);
    }

    std::env::current_dir()
        .unwrap_or_else(|_| PathBuf::from("."))
        .join(".orchestrai")
}

/// Where a failing QA verdict sends the run
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QaFailureRoute {
    /// Regenerate the plan with the QA findings
    #[default]
    Planner,
    /// Let the executor patch the files directly
    Executor,
}

/// Persistence backend chosen at startup
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Json,
}

impl StorageBackend {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sqlite" => Some(Self::Sqlite),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Sparse settings document as stored in `config.json` and accepted by
/// `PATCH /api/config`
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct PersistedSettings {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub force_simulation: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub qa_failure_route: Option<QaFailureRoute>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stall_limit: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cycles: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_plan_attempts: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_qa_rounds: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sim_pacing: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_timeout_secs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage: Option<StorageBackend>,
    /// agent id -> provider id
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_providers: HashMap<String, String>,
    /// agent id -> model name
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub per_agent_models: HashMap<String, String>,
}

impl PersistedSettings {
    /// Load `config.json` from the runtime directory, empty when missing
    pub async fn load(runtime_dir: &Path) -> Result<Self> {
        let path = runtime_dir.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read config: {:?}", path))?;
        serde_json::from_str(&content).with_context(|| format!("Invalid config: {:?}", path))
    }

    pub async fn save(&self, runtime_dir: &Path) -> Result<()> {
        tokio::fs::create_dir_all(runtime_dir)
            .await
            .with_context(|| format!("Failed to create runtime directory: {:?}", runtime_dir))?;
        let path = runtime_dir.join(CONFIG_FILE);
        let content = serde_json::to_string_pretty(self)?;
        tokio::fs::write(&path, content)
            .await
            .with_context(|| format!("Failed to write config: {:?}", path))
    }

    /// Overlay the fields set in `other`
    pub fn merge(&mut self, other: PersistedSettings) {
        if other.provider.is_some() {
            self.provider = other.provider;
        }
        if other.model.is_some() {
            self.model = other.model;
        }
        if other.base_url.is_some() {
            self.base_url = other.base_url;
        }
        if other.force_simulation.is_some() {
            self.force_simulation = other.force_simulation;
        }
        if other.qa_failure_route.is_some() {
            self.qa_failure_route = other.qa_failure_route;
        }
        if other.stall_limit.is_some() {
            self.stall_limit = other.stall_limit;
        }
        if other.max_cycles.is_some() {
            self.max_cycles = other.max_cycles;
        }
        if other.max_plan_attempts.is_some() {
            self.max_plan_attempts = other.max_plan_attempts;
        }
        if other.max_qa_rounds.is_some() {
            self.max_qa_rounds = other.max_qa_rounds;
        }
        if other.sim_pacing.is_some() {
            self.sim_pacing = other.sim_pacing;
        }
        if other.read_timeout_secs.is_some() {
            self.read_timeout_secs = other.read_timeout_secs;
        }
        if other.storage.is_some() {
            self.storage = other.storage;
        }
        self.per_agent_providers.extend(other.per_agent_providers);
        self.per_agent_models.extend(other.per_agent_models);
    }
}

/// Fully resolved settings
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Settings {
    pub model: ModelConfig,
    /// Per-agent overrides of `model`
    pub agent_models: HashMap<AgentKind, ModelConfig>,
    /// Skip the live loop and stream the simulated run
    pub force_simulation: bool,
    pub qa_failure_route: QaFailureRoute,
    /// Identical decisions without state change tolerated before aborting
    pub stall_limit: u32,
    /// Hard ceiling on coordinator cycles per run
    pub max_cycles: usize,
    pub max_plan_attempts: u32,
    /// Failing QA verdicts tolerated before the run is wrapped up
    pub max_qa_rounds: u32,
    /// Multiplier on simulated pacing delays, 0 disables them
    pub sim_pacing: f64,
    pub read_timeout_secs: u64,
    pub storage: StorageBackend,
    #[serde(skip)]
    pub runtime_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            agent_models: HashMap::new(),
            force_simulation: false,
            qa_failure_route: QaFailureRoute::Planner,
            stall_limit: 3,
            max_cycles: 64,
            max_plan_attempts: 2,
            max_qa_rounds: 2,
            sim_pacing: 1.0,
            read_timeout_secs: 120,
            storage: StorageBackend::Sqlite,
            runtime_dir: PathBuf::from(".orchestrai"),
        }
    }
}

impl Settings {
    /// Resolve settings from the runtime directory and the process environment
    pub async fn load() -> Result<Self> {
        let runtime_dir = runtime_path();
        let persisted = PersistedSettings::load(&runtime_dir).await?;

        let mut settings = Self {
            runtime_dir,
            ..Self::default()
        };
        settings.merge(persisted);
        settings.apply_env(|key| std::env::var(key).ok());
        Ok(settings)
    }

    /// Overlay a sparse settings document field-by-field
    pub fn merge(&mut self, patch: PersistedSettings) {
        if let Some(provider) = patch.provider.as_deref().and_then(LlmProvider::parse) {
            self.model = ModelConfig::for_provider(provider);
        }
        if let Some(model) = patch.model {
            self.model.model = model;
        }
        if let Some(url) = patch.base_url {
            self.model = self.model.clone().with_base_url(url);
        }
        if let Some(v) = patch.force_simulation {
            self.force_simulation = v;
        }
        if let Some(v) = patch.qa_failure_route {
            self.qa_failure_route = v;
        }
        if let Some(v) = patch.stall_limit {
            self.stall_limit = v.max(1);
        }
        if let Some(v) = patch.max_cycles {
            self.max_cycles = v.max(1);
        }
        if let Some(v) = patch.max_plan_attempts {
            self.max_plan_attempts = v.max(1);
        }
        if let Some(v) = patch.max_qa_rounds {
            self.max_qa_rounds = v.max(1);
        }
        if let Some(v) = patch.sim_pacing {
            self.sim_pacing = v.max(0.0);
        }
        if let Some(v) = patch.read_timeout_secs {
            self.read_timeout_secs = v.max(1);
        }
        if let Some(v) = patch.storage {
            self.storage = v;
        }

        for (agent_id, provider_id) in &patch.per_agent_providers {
            let (Some(agent), Some(provider)) =
                (AgentKind::parse(agent_id), LlmProvider::parse(provider_id))
            else {
                tracing::warn!(agent = %agent_id, provider = %provider_id, "Ignoring unknown per-agent provider");
                continue;
            };
            self.agent_models
                .insert(agent, ModelConfig::for_provider(provider));
        }
        for (agent_id, model) in patch.per_agent_models {
            let Some(agent) = AgentKind::parse(&agent_id) else {
                tracing::warn!(agent = %agent_id, "Ignoring per-agent model for unknown agent");
                continue;
            };
            let base = self.model.clone();
            self.agent_models.entry(agent).or_insert(base).model = model;
        }
    }

    /// Apply `ORCHESTRAI_*` overrides through `lookup`
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup("ORCHESTRAI_RUNTIME_PATH") {
            self.runtime_dir = PathBuf::from(dir);
        }
        if let Some(v) = lookup("ORCHESTRAI_DEMO_MODE") {
            self.force_simulation = matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes");
        }
        if let Some(p) = lookup("ORCHESTRAI_PROVIDER") {
            match LlmProvider::parse(&p) {
                Some(provider) => self.model = ModelConfig::for_provider(provider),
                None => tracing::warn!(provider = %p, "Unknown ORCHESTRAI_PROVIDER, keeping {:?}", self.model.provider),
            }
        }
        if let Some(m) = lookup("ORCHESTRAI_MODEL") {
            self.model.model = m;
        }
        if let Some(url) = lookup("ORCHESTRAI_BASE_URL") {
            self.model = self.model.clone().with_base_url(url);
        }
        if let Some(s) = lookup("ORCHESTRAI_STORAGE") {
            match StorageBackend::parse(&s) {
                Some(storage) => self.storage = storage,
                None => tracing::warn!(storage = %s, "Unknown ORCHESTRAI_STORAGE, keeping {:?}", self.storage),
            }
        }
    }

    /// Model used by `agent`
    pub fn model_for(&self, agent: AgentKind) -> ModelConfig {
        self.agent_models
            .get(&agent)
            .cloned()
            .unwrap_or_else(|| self.model.clone())
    }

    /// Settings suited to tests: no pacing, isolated runtime directory
    pub fn for_tests(runtime_dir: impl Into<PathBuf>) -> Self {
        Self {
            sim_pacing: 0.0,
            runtime_dir: runtime_dir.into(),
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.qa_failure_route, QaFailureRoute::Planner);
        assert_eq!(settings.stall_limit, 3);
        assert_eq!(settings.max_cycles, 64);
        assert_eq!(settings.storage, StorageBackend::Sqlite);
        assert_eq!(settings.model.model, "gpt-4o-mini");
    }

    #[test]
    fn test_merge_overlays_only_set_fields() {
        let mut settings = Settings::default();
        settings.merge(PersistedSettings {
            provider: Some("anthropic".into()),
            qa_failure_route: Some(QaFailureRoute::Executor),
            per_agent_models: HashMap::from([("qa".into(), "gpt-4o".into())]),
            ..Default::default()
        });

        assert_eq!(settings.model.provider, LlmProvider::Anthropic);
        assert_eq!(settings.qa_failure_route, QaFailureRoute::Executor);
        assert_eq!(settings.stall_limit, 3);
        assert_eq!(settings.model_for(AgentKind::Qa).model, "gpt-4o");
        assert_eq!(
            settings.model_for(AgentKind::Planner).provider,
            LlmProvider::Anthropic
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        settings.apply_env(|key| match key {
            "ORCHESTRAI_DEMO_MODE" => Some("true".into()),
            "ORCHESTRAI_STORAGE" => Some("json".into()),
            "ORCHESTRAI_BASE_URL" => Some("http://localhost:11434/v1".into()),
            _ => None,
        });
        assert!(settings.force_simulation);
        assert_eq!(settings.storage, StorageBackend::Json);
        assert_eq!(
            settings.model.base_url.as_deref(),
            Some("http://localhost:11434/v1")
        );
    }

    #[test]
    fn test_persisted_merge_and_roundtrip() {
        let mut base = PersistedSettings {
            stall_limit: Some(5),
            ..Default::default()
        };
        base.merge(PersistedSettings {
            max_cycles: Some(10),
            ..Default::default()
        });
        assert_eq!(base.stall_limit, Some(5));
        assert_eq!(base.max_cycles, Some(10));

        let json = serde_json::to_string(&base).unwrap();
        assert!(!json.contains("provider"));
    }

    #[tokio::test]
    async fn test_persisted_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(
            PersistedSettings::load(dir.path()).await.unwrap(),
            PersistedSettings::default()
        );

        let doc = PersistedSettings {
            storage: Some(StorageBackend::Json),
            ..Default::default()
        };
        doc.save(dir.path()).await.unwrap();
        assert_eq!(PersistedSettings::load(dir.path()).await.unwrap(), doc);
    }
}
