//! casestrainer server binary
//!
//! Thin entrypoint: parse flags, load configuration, wire the engine, and
//! serve HTTP until interrupted. All logic lives in the library.

use anyhow::{Context, Result};
use casestrainer::config::Config;
use casestrainer::dispatch::Dispatcher;
use casestrainer::docext::BuiltinExtractor;
use casestrainer::fetch::ReqwestFetcher;
use casestrainer::pipeline::Pipeline;
use casestrainer::progress::ResultStore;
use casestrainer::queue::MemoryQueue;
use casestrainer::server::{AppState, router};
use casestrainer::verify::{HttpCitationApi, Verifier};
use casestrainer::worker::{WorkerContext, spawn_workers};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "casestrainer", version, about = "Legal citation analysis service")]
struct Args {
    /// Path to a TOML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Address to bind the HTTP server to
    #[arg(long, default_value = "127.0.0.1:8080")]
    bind: String,

    /// Override the configured worker count
    #[arg(long)]
    workers: Option<usize>,

    /// Verbose logging
    #[arg(long, short)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    casestrainer::logging::init_tracing(args.verbose)
        .map_err(|e| anyhow::anyhow!("tracing init failed: {e}"))?;

    let mut config = match &args.config {
        Some(path) => Config::load(path).context("loading configuration")?,
        None => Config::default(),
    };
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    config.validate().context("validating configuration")?;
    let config = Arc::new(config);

    let fetch = Arc::new(ReqwestFetcher::new().context("building HTTP client")?);
    let api = Arc::new(HttpCitationApi::new(
        fetch.clone(),
        config.citation_api_url.clone(),
        config.citation_api_search_url.clone(),
        config.citation_api_token.clone(),
        config.per_call_timeout(),
    ));
    let verifier = Arc::new(Verifier::new(&config, api, fetch.clone()));
    let pipeline = Arc::new(Pipeline::new(config.clone(), verifier));
    let queue = Arc::new(MemoryQueue::new(&config.queue_name));
    let store = Arc::new(ResultStore::new(config.result_ttl()));
    let dispatcher = Arc::new(Dispatcher::new(
        config.clone(),
        queue.clone(),
        pipeline.clone(),
        fetch.clone(),
        Arc::new(BuiltinExtractor),
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker_ctx = WorkerContext {
        config: config.clone(),
        queue: queue.clone(),
        store: store.clone(),
        pipeline,
    };
    let worker_handles = spawn_workers(&worker_ctx, &shutdown_rx);
    info!(workers = config.worker_count, "worker pool running");

    let state = AppState {
        config: config.clone(),
        dispatcher,
        queue,
        store,
    };
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("binding {}", args.bind))?;
    info!(bind = %args.bind, version = %casestrainer::casestrainer_version(), "serving");

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("server error")?;

    let _ = shutdown_tx.send(true);
    for handle in worker_handles {
        handle.abort();
        let _ = handle.await;
    }
    info!("stopped");
    Ok(())
}
