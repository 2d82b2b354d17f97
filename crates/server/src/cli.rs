//! # CLI Commands
//!
//! `run` and `watch` drive the same client path as a browser would: a
//! [`Mirror`] folded from the event stream and persisted after every event.

use anyhow::{Context, Result};
use futures::Stream;
use std::fmt::Display;
use std::sync::Arc;
use std::time::Duration;

use orchestrai_core::client::{Mirror, PersistenceSync, StreamConsumer};
use orchestrai_core::config::Settings;
use orchestrai_core::state::{new_thread_id, open_store, Metadata, ProjectStore, RecordStatus};
use orchestrai_core::swarm::{spawn_run, Coordinator, ProducerOptions};

/// Prompt sent to the producer, plus the metadata the record is created with
fn describe(prompt: &str, title: Option<String>) -> (String, Metadata) {
    match title {
        Some(title) => {
            let metadata = Metadata::new(title, prompt);
            (metadata.render_prompt(), metadata)
        }
        None => (prompt.to_string(), Metadata::new(prompt, "")),
    }
}

/// Consume `stream` into a fresh mirror, printing trace lines as they arrive
async fn follow<S, B, E>(
    store: Arc<dyn ProjectStore>,
    settings: &Settings,
    thread_id: String,
    metadata: Metadata,
    stream: S,
) -> Mirror
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: Display,
{
    let mirror = Mirror::start(thread_id.clone(), metadata);
    let consumer = StreamConsumer::new(Duration::from_secs(settings.read_timeout_secs))
        .with_sync(PersistenceSync::spawn(store, thread_id));
    consumer.persist(mirror.start_patch());

    for line in &mirror.logs {
        println!("{}", line);
    }
    let mut printed = mirror.logs.len();
    let mirror = consumer
        .consume(mirror, stream, |m, _| {
            for line in m.logs.iter().skip(printed) {
                println!("{}", line);
            }
            printed = m.logs.len();
        })
        .await;
    for line in mirror.logs.iter().skip(printed) {
        println!("{}", line);
    }

    let written = consumer.finish().await;
    tracing::debug!(written, "Persistence flushed");
    mirror
}

fn summarize(mirror: &Mirror) -> Result<()> {
    println!();
    println!("Thread:   {}", mirror.thread_id);
    println!("Status:   {}", mirror.status.as_str());
    println!("Progress: {}%", mirror.global_progress());
    if let Some(files) = &mirror.files {
        println!("Files:    {}", files.len());
        for file in files {
            println!("  - {} ({})", file.path, file.language);
        }
    }
    match mirror.status {
        RecordStatus::Failed => anyhow::bail!(
            "Run failed: {}",
            mirror.error.as_deref().unwrap_or("unknown error")
        ),
        _ => Ok(()),
    }
}

/// `orchestrai run`: producer and consumer in one process
pub async fn run(
    settings: Settings,
    prompt: String,
    title: Option<String>,
    simulate: bool,
) -> Result<()> {
    let store = open_store(&settings)?;
    let (prompt, metadata) = describe(&prompt, title);

    let options = ProducerOptions {
        force_simulation: simulate || settings.force_simulation,
        ..ProducerOptions::from(&settings)
    };
    let coordinator = Arc::new(Coordinator::from_settings(&settings));
    let stream = spawn_run(coordinator, prompt, options).into_frames();

    let mirror = follow(store, &settings, new_thread_id(), metadata, stream).await;
    summarize(&mirror)
}

/// `orchestrai watch`: stream from a running server
pub async fn watch(
    settings: Settings,
    url: String,
    prompt: String,
    title: Option<String>,
) -> Result<()> {
    let store = open_store(&settings)?;
    let (prompt, metadata) = describe(&prompt, title);
    let thread_id = new_thread_id();

    let endpoint = format!("{}/api/agent", url.trim_end_matches('/'));
    let response = reqwest::Client::new()
        .post(&endpoint)
        .json(&serde_json::json!({ "message": prompt, "threadId": thread_id }))
        .send()
        .await
        .with_context(|| format!("Failed to reach {}", endpoint))?
        .error_for_status()
        .with_context(|| format!("{} rejected the request", endpoint))?;

    let mirror = follow(store, &settings, thread_id, metadata, response.bytes_stream()).await;
    summarize(&mirror)
}

/// `orchestrai show`: print a stored record
pub async fn show(settings: Settings, thread_id: String) -> Result<()> {
    let store = open_store(&settings)?;
    let record = store
        .load_by_thread_id(&thread_id)
        .await?
        .with_context(|| format!("Project '{}' not found", thread_id))?;
    println!("{}", serde_json::to_string_pretty(&record)?);
    Ok(())
}
