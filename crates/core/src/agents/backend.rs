//! # LLM Backend
//!
//! The seam between worker nodes and the language model. Nodes render their
//! context to text and receive schema-validated structured output back.

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;

use super::executor::CodeOutput;
use super::planner::PlanOutput;
use super::qa::QaOutput;
use super::reporting::ReportOutput;
use super::requirement::RequirementOutput;
use super::prompts;
use crate::config::Settings;
use crate::models::ModelConfig;
use crate::run_llm_function;
use crate::state::AgentKind;

/// Structured-output model calls, one per node contract
#[async_trait]
pub trait LlmBackend: Send + Sync {
    async fn analyze_requirements(&self, context: String) -> Result<RequirementOutput>;
    async fn plan(&self, context: String) -> Result<PlanOutput>;
    async fn implement(&self, context: String) -> Result<CodeOutput>;
    async fn review(&self, context: String) -> Result<QaOutput>;
    async fn report(&self, context: String) -> Result<ReportOutput>;
}

/// Production backend calling radkit `LlmFunction`s
pub struct RadkitBackend {
    models: HashMap<AgentKind, ModelConfig>,
    fallback: ModelConfig,
}

impl RadkitBackend {
    pub fn new(settings: &Settings) -> Self {
        let models = AgentKind::ALL
            .into_iter()
            .map(|agent| (agent, settings.model_for(agent)))
            .collect();
        Self {
            models,
            fallback: settings.model.clone(),
        }
    }

    fn model(&self, agent: AgentKind) -> &ModelConfig {
        self.models.get(&agent).unwrap_or(&self.fallback)
    }
}

#[async_trait]
impl LlmBackend for RadkitBackend {
    async fn analyze_requirements(&self, context: String) -> Result<RequirementOutput> {
        run_llm_function!(
            self.model(AgentKind::Requirement),
            RequirementOutput,
            prompts::REQUIREMENT,
            context
        )
    }

    async fn plan(&self, context: String) -> Result<PlanOutput> {
        run_llm_function!(
            self.model(AgentKind::Planner),
            PlanOutput,
            prompts::PLANNER,
            context
        )
    }

    async fn implement(&self, context: String) -> Result<CodeOutput> {
        run_llm_function!(
            self.model(AgentKind::Executor),
            CodeOutput,
            prompts::EXECUTOR,
            context
        )
    }

    async fn review(&self, context: String) -> Result<QaOutput> {
        run_llm_function!(self.model(AgentKind::Qa), QaOutput, prompts::QA, context)
    }

    async fn report(&self, context: String) -> Result<ReportOutput> {
        run_llm_function!(
            self.model(AgentKind::Reporting),
            ReportOutput,
            prompts::REPORTING,
            context
        )
    }
}
