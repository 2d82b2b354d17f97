//! # Simulated Run
//!
//! A hand-authored happy-path project used when the live loop cannot reach
//! its model provider. Events use exactly the same payload shapes as the
//! live loop, so a consumer cannot tell the two sources apart.

use std::time::Duration;
use tokio::sync::mpsc;

use crate::error::RunError;
use crate::state::{
    AgentKind, CompletionSignal, Decision, Message, ProjectFile, QaFeedback, Task, TaskStatus,
};

use super::events::{Payload, WireEvent};

/// One scripted event and the pause that follows it
#[derive(Debug, Clone, PartialEq)]
pub struct SimulatedStep {
    pub event: WireEvent,
    pub delay: Duration,
}

fn step(agent: AgentKind, payload: Payload, delay_ms: u64) -> SimulatedStep {
    SimulatedStep {
        event: WireEvent::update(agent, payload),
        delay: Duration::from_millis(delay_ms),
    }
}

fn manager(next: Decision, logs: &[&str], delay_ms: u64) -> SimulatedStep {
    let payload = Payload {
        next_agent: Some(next),
        current_agent: Some(AgentKind::Manager),
        ..Payload::logs(logs.iter().copied())
    };
    step(AgentKind::Manager, payload, delay_ms)
}

fn worker(agent: AgentKind, payload: Payload, delay_ms: u64) -> SimulatedStep {
    step(
        agent,
        Payload {
            current_agent: Some(agent),
            ..payload
        },
        delay_ms,
    )
}

fn simulated_plan() -> Vec<Task> {
    vec![
        Task::new("1", "Setup Project").with_description("Initialize repo"),
        Task::new("2", "Implement Core Features")
            .with_description("Business logic implementation")
            .depends_on("1"),
        Task::new("3", "Frontend UI")
            .with_description("React components")
            .depends_on("2"),
    ]
}

fn simulated_files() -> [ProjectFile; 3] {
    [
        ProjectFile::draft(
            "package.json",
            "{\n  \"name\": \"ai-app\",\n  \"version\": \"1.0.0\"\n}",
            "json",
        ),
        ProjectFile::draft(
            "src/core.ts",
            "export const logic = () => {\n  console.log('AI Magic');\n}",
            "typescript",
        ),
        ProjectFile::draft(
            "src/App.tsx",
            "export default function App() {\n  return <h1>Hello AI</h1>;\n}",
            "typescript",
        ),
    ]
}

/// The full scripted sequence for `prompt`
pub fn script(prompt: &str) -> Vec<SimulatedStep> {
    let mut steps = vec![manager(
        Decision::Requirement,
        &["Manager: Analyzing request...", "Manager: Delegating to Business Analyst."],
        800,
    )];

    let requirements = format!(
        "## Requirements for: {}\n\n1. Core Logic\n2. User Interface\n3. Integration Tests\n\nAssumptions: Standard stack.",
        prompt
    );
    steps.push(worker(
        AgentKind::Requirement,
        Payload {
            requirements: Some(Some(requirements.clone())),
            plan: Some(None),
            ..Payload::logs([
                "Requirement Analyst: Drafting requirements...",
                "Requirement Analyst: Requirements finalized.",
            ])
        },
        1000,
    ));

    steps.push(manager(
        Decision::Planner,
        &["Manager: Requirements received. Calling Planner."],
        600,
    ));
    let mut plan = simulated_plan();
    steps.push(worker(
        AgentKind::Planner,
        Payload {
            plan: Some(Some(plan.clone())),
            qa_feedback: Some(None),
            ..Payload::logs(["Planner: Creating execution plan...", "Planner: Plan approved."])
        },
        1000,
    ));

    let executor_logs = [
        ["Executor: Writing 'package.json'...", "Executor: Environment setup complete."],
        ["Executor: Writing 'core.ts'...", "Executor: Logic implemented."],
        ["Executor: Building UI components...", "Executor: Frontend complete."],
    ];
    let files = simulated_files();
    for (i, logs) in executor_logs.iter().enumerate() {
        let line = format!("Manager: Executing Task {}: {}", plan[i].id, plan[i].title);
        steps.push(manager(Decision::Executor, &[line.as_str()], 800));
        plan[i].status = TaskStatus::Completed;
        steps.push(worker(
            AgentKind::Executor,
            Payload {
                files: Some(files[..=i].to_vec()),
                plan: Some(Some(plan.clone())),
                ..Payload::logs(logs.iter().copied())
            },
            1200,
        ));
    }

    steps.push(manager(Decision::Qa, &["Manager: Tasks complete. Requesting QA."], 800));
    steps.push(worker(
        AgentKind::Qa,
        Payload {
            qa_feedback: Some(Some(QaFeedback {
                passed: true,
                issues: vec![],
                recommendations: vec!["Ready for deploy".to_string()],
            })),
            ..Payload::logs(["QA: Running test suite...", "QA: All tests passed."])
        },
        1000,
    ));

    steps.push(manager(
        Decision::Reporting,
        &["Manager: QA passed. Generating final report."],
        600,
    ));
    let report = format!(
        "# Project Report\n\n{}\n\n## Delivered\n\n- package.json\n- src/core.ts\n- src/App.tsx\n\nQA: passed. Ready for deploy.",
        requirements
    );
    steps.push(worker(
        AgentKind::Reporting,
        Payload {
            messages: vec![Message::assistant(report)],
            status: Some(CompletionSignal::Completed),
            ..Payload::logs(["Reporting: Final report generated."])
        },
        800,
    ));

    steps.push(manager(
        Decision::Finish,
        &["Manager: Project successfully completed."],
        0,
    ));
    steps
}

/// Emit the scripted sequence with its delays scaled by `pacing`
/// (`0.0` disables pacing).
pub async fn play(
    prompt: &str,
    pacing: f64,
    tx: &mpsc::Sender<WireEvent>,
) -> Result<(), RunError> {
    let pacing = if pacing.is_finite() { pacing.max(0.0) } else { 0.0 };
    for SimulatedStep { event, delay } in script(prompt) {
        tracing::debug!(?event, "Emitting simulated event");
        tx.send(event).await.map_err(|_| RunError::ConsumerClosed)?;
        let pause = delay.mul_f64(pacing);
        if !pause.is_zero() {
            tokio::time::sleep(pause).await;
        }
    }
    Ok(())
}
