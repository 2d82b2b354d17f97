//! End-to-end runs: producer → wire frames → consumer mirror → store.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

use orchestrai_core::agents::executor::{CodeOutput, CompletionStatus, GeneratedFile};
use orchestrai_core::agents::planner::{PlanOutput, PlannedTask};
use orchestrai_core::agents::qa::QaOutput;
use orchestrai_core::agents::{Routing, RoutingPolicy, ScriptedBackend, ScriptedCall};
use orchestrai_core::client::{fold, LinearProgress, Mirror, PersistenceSync, StreamConsumer};
use orchestrai_core::config::Settings;
use orchestrai_core::state::{
    AgentKind, AgentStatus, Decision, MemoryStore, Metadata, ProjectState, ProjectStore,
    RecordStatus,
};
use orchestrai_core::swarm::{
    spawn_run, Coordinator, CoordinatorConfig, ProducerOptions, WireEvent, FALLBACK_NOTICE,
};

fn settings() -> Settings {
    Settings::for_tests(std::env::temp_dir().join("orchestrai-tests"))
}

fn live() -> ProducerOptions {
    ProducerOptions {
        force_simulation: false,
        sim_pacing: 0.0,
    }
}

fn coordinator(backend: Arc<ScriptedBackend>) -> Arc<Coordinator> {
    Arc::new(Coordinator::with_backend(&settings(), backend))
}

/// Every event a run produces, in order
async fn collect(coordinator: Arc<Coordinator>, options: ProducerOptions) -> Vec<WireEvent> {
    let mut run = spawn_run(coordinator, "Build a todo app".into(), options);
    let mut events = Vec::new();
    while let Some(event) = run.events.recv().await {
        events.push(event);
    }
    events
}

/// Consume a run through the wire format into a mirror backed by `store`
async fn consume_run(
    coordinator: Arc<Coordinator>,
    options: ProducerOptions,
    store: Arc<dyn ProjectStore>,
    thread_id: &str,
) -> (Mirror, Vec<WireEvent>) {
    let mirror = Mirror::start(thread_id, Metadata::new("Todo App", "A shared list"));
    let consumer = StreamConsumer::new(Duration::from_secs(10))
        .with_sync(PersistenceSync::spawn(store, thread_id));
    consumer.persist(mirror.start_patch());

    let frames = spawn_run(coordinator, mirror.prompt.clone(), options).into_frames();
    let mut seen = Vec::new();
    let mirror = consumer
        .consume(mirror, frames, |_, event| seen.push(event.clone()))
        .await;
    consumer.finish().await;
    (mirror, seen)
}

fn decisions(events: &[WireEvent]) -> Vec<Decision> {
    events
        .iter()
        .filter_map(|e| match e {
            WireEvent::Update {
                agent: AgentKind::Manager,
                payload,
            } => payload.next_agent,
            _ => None,
        })
        .collect()
}

fn task(id: &str, title: &str, deps: &[&str]) -> PlannedTask {
    PlannedTask {
        id: id.into(),
        title: title.into(),
        description: String::new(),
        dependencies: deps.iter().map(|d| d.to_string()).collect(),
        assigned_to: Some("executor".into()),
    }
}

fn code(path: &str, content: &str) -> CodeOutput {
    CodeOutput {
        files: vec![GeneratedFile {
            path: path.into(),
            content: content.into(),
            language: "typescript".into(),
        }],
        completion_status: CompletionStatus::Success,
        execution_log: String::new(),
    }
}

#[tokio::test]
async fn test_fresh_run_starts_with_requirement() {
    let events = collect(coordinator(Arc::new(ScriptedBackend::new())), live()).await;

    let WireEvent::Update { agent, payload } = &events[0] else {
        panic!("expected manager update first");
    };
    assert_eq!(*agent, AgentKind::Manager);
    assert_eq!(payload.next_agent, Some(Decision::Requirement));

    let WireEvent::Update { agent, payload } = &events[1] else {
        panic!("expected requirement update second");
    };
    assert_eq!(*agent, AgentKind::Requirement);
    assert!(matches!(&payload.requirements, Some(Some(doc)) if !doc.is_empty()));
    assert_eq!(payload.plan, Some(None));

    assert_eq!(events.last(), Some(&WireEvent::Done));
    assert_eq!(decisions(&events).last(), Some(&Decision::Finish));
}

#[tokio::test]
async fn test_executor_follows_dependency_order() {
    let backend = Arc::new(ScriptedBackend::new());
    let events = collect(coordinator(backend.clone()), live()).await;
    assert_eq!(events.last(), Some(&WireEvent::Done));

    let tasks: Vec<String> = backend
        .contexts(ScriptedCall::Implement)
        .iter()
        .filter_map(|ctx| ctx.lines().next().map(str::to_string))
        .collect();
    assert_eq!(
        tasks,
        vec![
            "Current Task: Setup Project",
            "Current Task: Implement Core Features",
            "Current Task: Frontend UI",
        ]
    );
}

#[tokio::test]
async fn test_failed_qa_never_routes_to_finish() {
    let backend = Arc::new(ScriptedBackend::new().with_reviews(vec![QaOutput {
        passed: false,
        issues: vec!["missing auth".into()],
        recommendations: vec![],
    }]));
    let events = collect(coordinator(backend.clone()), live()).await;
    assert_eq!(events.last(), Some(&WireEvent::Done));

    let failed_at = events
        .iter()
        .position(|e| {
            matches!(e, WireEvent::Update { agent: AgentKind::Qa, payload }
                if matches!(&payload.qa_feedback, Some(Some(f)) if !f.passed))
        })
        .unwrap();
    let WireEvent::Update { agent, payload } = &events[failed_at + 1] else {
        panic!("expected manager decision after QA");
    };
    assert_eq!(*agent, AgentKind::Manager);
    assert_eq!(payload.next_agent, Some(Decision::Planner));

    assert_eq!(backend.contexts(ScriptedCall::Plan).len(), 2);
    assert_eq!(backend.contexts(ScriptedCall::Review).len(), 2);
}

#[tokio::test]
async fn test_stream_without_done_fails_the_run() {
    let frames = vec![
        "data: {\"manager\":{\"next_agent\":\"requirement\"}}\n\n",
        "data: {\"requirement\":{\"requirements\":\"# R\",\"plan\":null}}\n\n",
    ];
    let stream =
        futures::stream::iter(frames.into_iter().map(Ok::<_, std::io::Error>));

    let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
    let consumer = StreamConsumer::new(Duration::from_secs(10))
        .with_sync(PersistenceSync::spawn(store.clone(), "t-cut"));
    let mirror = consumer
        .consume(Mirror::new("t-cut"), stream, |_, _| {})
        .await;
    consumer.finish().await;

    assert_eq!(mirror.status, RecordStatus::Failed);
    assert!(!mirror.is_completed);
    assert_eq!(mirror.requirements.as_deref(), Some("# R"));
    assert!(mirror.logs.last().unwrap().starts_with("Error: "));

    let record = tokio_test::assert_ok!(store.load_by_thread_id("t-cut").await).unwrap();
    assert_eq!(record.status, RecordStatus::Failed);
}

#[tokio::test]
async fn test_rewritten_file_keeps_latest_content() {
    let backend = Arc::new(
        ScriptedBackend::new()
            .with_plans(vec![PlanOutput {
                items: vec![task("1", "Scaffold", &[]), task("2", "Wire state", &["1"])],
            }])
            .with_code(vec![
                code("src/app.ts", "export const v = 1;"),
                code("src/app.ts", "export const v = 2;"),
            ]),
    );
    let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
    let (mirror, _) = consume_run(coordinator(backend), live(), store.clone(), "t-dup").await;

    let files = mirror.files.unwrap();
    let app: Vec<_> = files.iter().filter(|f| f.path == "src/app.ts").collect();
    assert_eq!(app.len(), 1);
    assert_eq!(app[0].content, "export const v = 2;");

    let record = store.load_by_thread_id("t-dup").await.unwrap().unwrap();
    assert_eq!(record.files.unwrap().len(), 1);
}

#[tokio::test]
async fn test_completed_run_is_persisted() {
    let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
    let (mirror, seen) = consume_run(
        coordinator(Arc::new(ScriptedBackend::new())),
        live(),
        store.clone(),
        "t-ok",
    )
    .await;

    assert!(mirror.is_completed);
    assert_eq!(mirror.global_progress(), 100);
    assert!(AgentKind::ALL
        .iter()
        .all(|a| mirror.status_of(*a) == AgentStatus::Completed));
    assert!(mirror.report.is_some());
    assert_eq!(seen.last(), Some(&WireEvent::Done));

    let record = store.load_by_thread_id("t-ok").await.unwrap().unwrap();
    assert_eq!(record.prompt, "Todo App");
    assert_eq!(record.status, RecordStatus::Completed);
    assert_eq!(record.global_progress, 100);
    assert_eq!(record.files.unwrap().len(), 3);
    assert!(record.report.is_some());
    assert_eq!(record.metadata.unwrap().description, "A shared list");
}

#[tokio::test]
async fn test_folding_is_idempotent_per_state() {
    let events = collect(coordinator(Arc::new(ScriptedBackend::new())), live()).await;
    let estimator = LinearProgress::default();

    let once = events
        .iter()
        .fold(Mirror::new("t"), |m, e| fold(m, e, &estimator));
    let twice = events
        .iter()
        .fold(Mirror::new("t"), |m, e| fold(m, e, &estimator));
    assert_eq!(once, twice);
}

#[tokio::test]
async fn test_agent_progress_never_decreases() {
    let events = collect(coordinator(Arc::new(ScriptedBackend::new())), live()).await;
    let estimator = LinearProgress::default();

    let mut mirror = Mirror::new("t");
    let mut last_global = 0;
    for event in &events {
        let before: Vec<u8> = AgentKind::ALL.iter().map(|a| mirror.progress_of(*a)).collect();
        mirror.apply(event, &estimator);
        for (agent, prev) in AgentKind::ALL.iter().zip(before) {
            assert!(mirror.progress_of(*agent) >= prev, "{agent} went backwards");
        }
        assert!(mirror.global_progress() >= last_global);
        last_global = mirror.global_progress();
    }
    assert_eq!(last_global, 100);
}

#[tokio::test]
async fn test_quota_error_falls_back_to_simulation() {
    let backend = Arc::new(
        ScriptedBackend::new().failing(ScriptedCall::Plan, "429 Too Many Requests"),
    );
    let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
    let (mirror, seen) = consume_run(coordinator(backend), live(), store, "t-quota").await;

    assert!(mirror.is_completed);
    assert_eq!(mirror.status, RecordStatus::Completed);
    assert!(mirror.logs.iter().any(|l| l == FALLBACK_NOTICE));
    assert_eq!(mirror.files.as_ref().map(Vec::len), Some(3));
    assert_eq!(seen.last(), Some(&WireEvent::Done));
    assert!(!seen.iter().any(|e| matches!(e, WireEvent::Error(_))));
}

#[tokio::test]
async fn test_simulated_events_match_live_schema() {
    let live_events = collect(coordinator(Arc::new(ScriptedBackend::new())), live()).await;
    let simulated = collect(
        coordinator(Arc::new(ScriptedBackend::new())),
        ProducerOptions {
            force_simulation: true,
            sim_pacing: 0.0,
        },
    )
    .await;

    for event in live_events.iter().chain(simulated.iter()) {
        let frame = event.encode().unwrap();
        let decoded = WireEvent::decode_frame(frame.trim_end()).unwrap();
        assert_eq!(&decoded, event);
    }

    let keys = |events: &[WireEvent]| -> BTreeMap<AgentKind, BTreeSet<String>> {
        let mut keys: BTreeMap<AgentKind, BTreeSet<String>> = BTreeMap::new();
        for event in events {
            let WireEvent::Update { agent, payload } = event else {
                continue;
            };
            let value = serde_json::to_value(payload).unwrap();
            let fields = value.as_object().unwrap().keys().cloned();
            keys.entry(*agent).or_default().extend(fields);
        }
        keys
    };
    let live_keys = keys(&live_events);
    assert_eq!(live_keys, keys(&simulated));
    assert!(live_keys[&AgentKind::Manager].contains("current_agent"));
    assert_eq!(decisions(&simulated).last(), Some(&Decision::Finish));
}

#[tokio::test]
async fn test_long_plan_runs_to_completion() {
    let items: Vec<PlannedTask> = (1..=70)
        .map(|i| {
            let prev = (i - 1).to_string();
            let deps: Vec<&str> = if i == 1 { vec![] } else { vec![prev.as_str()] };
            task(&i.to_string(), &format!("Task {i}"), &deps)
        })
        .collect();
    let backend = Arc::new(ScriptedBackend::new().with_plans(vec![PlanOutput { items }]));
    let events = collect(coordinator(backend.clone()), live()).await;

    assert_eq!(events.last(), Some(&WireEvent::Done));
    assert!(!events.iter().any(|e| matches!(e, WireEvent::Error(_))));
    assert!(events
        .iter()
        .any(|e| matches!(e, WireEvent::Update { agent: AgentKind::Reporting, .. })));
    assert_eq!(backend.contexts(ScriptedCall::Implement).len(), 70);
    assert_eq!(decisions(&events).last(), Some(&Decision::Finish));
}

#[tokio::test]
async fn test_fatal_error_ends_without_done() {
    let backend =
        Arc::new(ScriptedBackend::new().failing(ScriptedCall::Requirements, "invalid api key"));
    let store: Arc<dyn ProjectStore> = Arc::new(MemoryStore::new());
    let (mirror, seen) = consume_run(coordinator(backend), live(), store.clone(), "t-fatal").await;

    assert!(matches!(seen.last(), Some(WireEvent::Error(m)) if m.contains("invalid api key")));
    assert!(!seen.iter().any(WireEvent::is_done));
    assert_eq!(mirror.status, RecordStatus::Failed);
    assert!(mirror.error.as_deref().unwrap().contains("invalid api key"));

    let record = tokio_test::assert_ok!(store.load_by_thread_id("t-fatal").await).unwrap();
    assert_eq!(record.status, RecordStatus::Failed);
}

struct AlwaysQa;

impl RoutingPolicy for AlwaysQa {
    fn decide(&self, _state: &ProjectState) -> Routing {
        Routing {
            decision: Decision::Qa,
            reasoning: "Requesting QA.".into(),
        }
    }
}

#[tokio::test]
async fn test_repeated_decision_without_progress_stalls() {
    let coordinator = Arc::new(Coordinator::new(
        CoordinatorConfig::default(),
        Arc::new(ScriptedBackend::new()),
        Arc::new(AlwaysQa),
    ));
    let events = collect(coordinator, live()).await;

    let Some(WireEvent::Error(message)) = events.last() else {
        panic!("expected an error event, got {:?}", events.last());
    };
    assert!(message.contains("no progress"));
    assert!(!events.iter().any(WireEvent::is_done));
    assert!(decisions(&events).iter().all(|d| *d == Decision::Qa));
}
