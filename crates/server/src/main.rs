use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use orchestrai_core::config::Settings;
use orchestrai_core::state::open_store;

mod api;
mod cli;

use api::AppState;

#[derive(Parser, Clone)]
#[command(author, version, about = "OrchestrAI - Multi-agent project orchestrator")]
struct Args {
    #[command(subcommand)]
    command: Option<CliCommand>,
}

#[derive(Subcommand, Clone)]
enum CliCommand {
    /// Start the HTTP server (default)
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
    },
    /// Run a project in-process and follow its progress
    Run {
        /// Project description
        prompt: String,
        /// Project title; the prompt becomes its description
        #[arg(short, long)]
        title: Option<String>,
        /// Stream the simulated run instead of calling a model
        #[arg(long)]
        simulate: bool,
    },
    /// Start a project on a running server and follow its stream
    Watch {
        prompt: String,
        #[arg(short, long)]
        title: Option<String>,
        /// Server base URL
        #[arg(long, default_value = "http://127.0.0.1:8080")]
        url: String,
    },
    /// Print a stored project record
    Show { thread_id: String },
}

async fn run_server(settings: Settings, port: u16) -> anyhow::Result<()> {
    let store = open_store(&settings)?;
    let app = api::router(AppState::new(settings, store));

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    println!("OrchestrAI server running at http://{}", addr);
    println!("   Agent:    POST /api/agent (SSE)");
    println!("   Projects: /api/projects, /api/projects/:id");
    println!("   Config:   /api/config (GET, PATCH), /api/health");

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("orchestrai=info,orchestrai_core=info,tower_http=warn")),
        )
        .init();

    let args = Args::parse();
    let settings = Settings::load().await?;

    match args.command {
        None => run_server(settings, 8080).await,
        Some(CliCommand::Serve { port }) => run_server(settings, port).await,
        Some(CliCommand::Run {
            prompt,
            title,
            simulate,
        }) => cli::run(settings, prompt, title, simulate).await,
        Some(CliCommand::Watch { prompt, title, url }) => {
            cli::watch(settings, url, prompt, title).await
        }
        Some(CliCommand::Show { thread_id }) => cli::show(settings, thread_id).await,
    }
}
