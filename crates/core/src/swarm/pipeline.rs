//! # Pipeline Stages
//!
//! State machine over the orchestration graph. Control starts at the
//! coordinator, passes to exactly one worker per cycle and always returns to
//! the coordinator. The pipeline also carries the loop guards: a cycle cap
//! that grows with the plan, and a stall counter for repeated decisions that
//! change nothing.

use serde::{Deserialize, Serialize};

use crate::error::RunError;
use crate::state::{AgentKind, Decision};

/// Stage of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// The manager is choosing the next worker
    Coordinating,
    /// A worker is running
    Working(AgentKind),
    /// `finish` was chosen
    Complete,
    Failed,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    pub stage: PipelineStage,
    /// Coordinator decisions taken so far
    pub cycles: usize,
    /// Base ceiling before any plan exists
    pub max_cycles: usize,
    /// Effective ceiling, raised by [`Pipeline::fit_plan`]
    budget: usize,
    pub stall_limit: u32,
    /// Last decision whose worker made no progress, with its repeat count
    stalled: Option<(Decision, u32)>,
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(3, 64)
    }
}

impl Pipeline {
    pub fn new(stall_limit: u32, max_cycles: usize) -> Self {
        Self {
            stage: PipelineStage::Coordinating,
            cycles: 0,
            max_cycles,
            budget: max_cycles,
            stall_limit: stall_limit.max(1),
            stalled: None,
        }
    }

    /// Take the coordinator's decision. Returns the worker to run, or
    /// `None` once the run is complete.
    pub fn route(&mut self, decision: Decision) -> Result<Option<AgentKind>, RunError> {
        self.cycles += 1;
        match decision.worker() {
            None => {
                self.stage = PipelineStage::Complete;
                Ok(None)
            }
            Some(_) if self.cycles > self.budget => {
                self.fail();
                Err(RunError::CycleLimit(self.budget))
            }
            Some(worker) => {
                self.stage = PipelineStage::Working(worker);
                Ok(Some(worker))
            }
        }
    }

    /// Make room for a plan of `tasks` tasks: each may run once per QA round,
    /// plus its manager turn. The ceiling never shrinks.
    pub fn fit_plan(&mut self, tasks: usize, qa_rounds: u32) {
        let needed = self.max_cycles + tasks * (qa_rounds as usize + 2);
        self.budget = self.budget.max(needed);
    }

    pub fn budget(&self) -> usize {
        self.budget
    }

    /// The worker returned; hand control back to the coordinator.
    ///
    /// Fails once `stall_limit` consecutive runs of the same decision left the
    /// state unchanged.
    pub fn worker_done(&mut self, decision: Decision, progressed: bool) -> Result<(), RunError> {
        if progressed {
            self.stalled = None;
        } else {
            let repeats = match self.stalled {
                Some((last, n)) if last == decision => n + 1,
                _ => 1,
            };
            self.stalled = Some((decision, repeats));
            if repeats >= self.stall_limit {
                self.fail();
                return Err(RunError::Stalled { decision, repeats });
            }
        }
        self.stage = PipelineStage::Coordinating;
        Ok(())
    }

    pub fn fail(&mut self) {
        self.stage = PipelineStage::Failed;
    }

    pub fn is_complete(&self) -> bool {
        matches!(self.stage, PipelineStage::Complete | PipelineStage::Failed)
    }

    pub fn is_success(&self) -> bool {
        self.stage == PipelineStage::Complete
    }
}
