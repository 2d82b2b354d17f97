//! # Manager (Coordinator)
//!
//! Routing is a pure function of the state. Rules are evaluated top-down and
//! the first match wins:
//!
//! 1. no requirements → `requirement`
//! 2. no plan (or an empty one) → `planner`
//! 3. an eligible task exists → `executor`
//! 4. no QA verdict for the current plan → `qa`
//! 5. report already produced → `finish`
//! 6. QA failed → the configured [`QaFailureRoute`], or `reporting` once
//!    `max_qa_rounds` failing verdicts have been seen
//! 7. QA passed → `reporting`

use crate::config::{QaFailureRoute, Settings};
use crate::state::plan::{blocked_tasks, next_eligible};
use crate::state::{AgentKind, Decision, ProjectState, StateUpdate};

/// A routing decision with its reasoning
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Routing {
    pub decision: Decision,
    pub reasoning: String,
}

impl Routing {
    fn new(decision: Decision, reasoning: impl Into<String>) -> Self {
        Self {
            decision,
            reasoning: reasoning.into(),
        }
    }

    /// The manager's state update: one log line plus `next_agent`
    pub fn into_update(self) -> StateUpdate {
        let mut update = StateUpdate::from_agent(AgentKind::Manager)
            .log(format!("Manager: {}", self.reasoning));
        update.next_agent = Some(self.decision);
        update
    }
}

/// Chooses the next worker from a state snapshot
pub trait RoutingPolicy: Send + Sync {
    fn decide(&self, state: &ProjectState) -> Routing;
}

/// The deterministic routing table described in the module docs
#[derive(Debug, Clone)]
pub struct DefaultPolicy {
    pub qa_failure_route: QaFailureRoute,
    pub max_qa_rounds: u32,
}

impl Default for DefaultPolicy {
    fn default() -> Self {
        Self {
            qa_failure_route: QaFailureRoute::Planner,
            max_qa_rounds: 2,
        }
    }
}

impl DefaultPolicy {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            qa_failure_route: settings.qa_failure_route,
            max_qa_rounds: settings.max_qa_rounds,
        }
    }
}

impl RoutingPolicy for DefaultPolicy {
    fn decide(&self, state: &ProjectState) -> Routing {
        if state.requirements.is_none() {
            return Routing::new(
                Decision::Requirement,
                "Requirements missing. Delegating to requirement.",
            );
        }

        let plan = state.plan_tasks();
        if plan.is_empty() {
            return Routing::new(
                Decision::Planner,
                "Requirements received. Calling Planner.",
            );
        }

        if let Some(task) = next_eligible(plan) {
            return Routing::new(
                Decision::Executor,
                format!("Executing Task {}: {}", task.id, task.title),
            );
        }

        let Some(feedback) = &state.qa_feedback else {
            let blocked = blocked_tasks(plan).len();
            let reasoning = if blocked == 0 {
                "Tasks complete. Requesting QA.".to_string()
            } else {
                format!("No executable tasks remain ({} blocked). Requesting QA.", blocked)
            };
            return Routing::new(Decision::Qa, reasoning);
        };

        if state.reported {
            return Routing::new(Decision::Finish, "Project successfully completed.");
        }

        if !feedback.passed {
            if state.qa_failures >= self.max_qa_rounds {
                return Routing::new(
                    Decision::Reporting,
                    format!(
                        "QA failed {} times. Reporting with open issues.",
                        state.qa_failures
                    ),
                );
            }
            let issues = feedback.issues.len();
            return match self.qa_failure_route {
                QaFailureRoute::Planner => Routing::new(
                    Decision::Planner,
                    format!("QA failed with {} issue(s). Re-planning fixes.", issues),
                ),
                QaFailureRoute::Executor => Routing::new(
                    Decision::Executor,
                    format!("QA failed with {} issue(s). Sending fixes to executor.", issues),
                ),
            };
        }

        Routing::new(Decision::Reporting, "QA passed. Generating final report.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{QaFeedback, Task, TaskStatus};

    fn done_plan() -> Vec<Task> {
        vec![
            Task::new("1", "Setup").with_status(TaskStatus::Completed),
            Task::new("2", "Core")
                .depends_on("1")
                .with_status(TaskStatus::Completed),
        ]
    }

    fn failing() -> QaFeedback {
        QaFeedback {
            passed: false,
            issues: vec!["missing auth".into()],
            recommendations: vec![],
        }
    }

    #[test]
    fn test_fresh_project_routes_to_requirement() {
        let policy = DefaultPolicy::default();
        let routing = policy.decide(&ProjectState::new("Build a todo app"));
        assert_eq!(routing.decision, Decision::Requirement);

        let update = routing.into_update();
        assert_eq!(update.next_agent, Some(Decision::Requirement));
        assert_eq!(
            update.logs,
            vec!["Manager: Requirements missing. Delegating to requirement."]
        );
    }

    #[test]
    fn test_happy_path_sequence() {
        let policy = DefaultPolicy::default();
        let mut state = ProjectState::new("x");
        state.requirements = Some("# R".into());
        assert_eq!(policy.decide(&state).decision, Decision::Planner);

        state.plan = Some(vec![]);
        assert_eq!(policy.decide(&state).decision, Decision::Planner);

        state.plan = Some(vec![Task::new("1", "Setup")]);
        let routing = policy.decide(&state);
        assert_eq!(routing.decision, Decision::Executor);
        assert_eq!(routing.reasoning, "Executing Task 1: Setup");

        state.plan = Some(done_plan());
        assert_eq!(policy.decide(&state).decision, Decision::Qa);

        state.qa_feedback = Some(QaFeedback {
            passed: true,
            ..Default::default()
        });
        assert_eq!(policy.decide(&state).decision, Decision::Reporting);

        state.reported = true;
        assert_eq!(policy.decide(&state).decision, Decision::Finish);
    }

    #[test]
    fn test_qa_failure_never_finishes() {
        let mut state = ProjectState::new("x");
        state.requirements = Some("# R".into());
        state.plan = Some(done_plan());
        state.qa_feedback = Some(failing());
        state.qa_failures = 1;

        let replan = DefaultPolicy::default();
        assert_eq!(replan.decide(&state).decision, Decision::Planner);

        let direct = DefaultPolicy {
            qa_failure_route: QaFailureRoute::Executor,
            ..Default::default()
        };
        assert_eq!(direct.decide(&state).decision, Decision::Executor);
    }

    #[test]
    fn test_qa_rounds_exhausted_reports_then_finishes() {
        let mut state = ProjectState::new("x");
        state.requirements = Some("# R".into());
        state.plan = Some(done_plan());
        state.qa_feedback = Some(failing());
        state.qa_failures = 2;

        let policy = DefaultPolicy::default();
        assert_eq!(policy.decide(&state).decision, Decision::Reporting);

        state.reported = true;
        assert_eq!(policy.decide(&state).decision, Decision::Finish);
    }

    #[test]
    fn test_blocked_plan_goes_to_qa() {
        let mut state = ProjectState::new("x");
        state.requirements = Some("# R".into());
        state.plan = Some(vec![
            Task::new("1", "Setup").with_status(TaskStatus::Failed),
            Task::new("2", "Core").depends_on("1"),
        ]);
        let routing = DefaultPolicy::default().decide(&state);
        assert_eq!(routing.decision, Decision::Qa);
        assert!(routing.reasoning.contains("1 blocked"));
    }
}
