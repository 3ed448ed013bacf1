use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinSet;
use tracing::{error, info, warn};

use judger::callback::CallbackClient;
use judger::config::JudgerConfig;
use judger::jobs::process_job;
use judger::judger::Judge;
use judger::languages::LanguageRegistry;
use judger::redis_manager::RedisManager;
use judger::sandbox::{DockerCli, SandboxPool, SandboxProvider};
use judger::workspace::Workspace;

/// Upper bound of one queue wait, so shutdown is noticed between waits
const POP_TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("judger=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    let config = JudgerConfig::from_env()?;

    // Load language configurations
    let languages = match &config.languages_config {
        Some(path) => {
            let registry = LanguageRegistry::load(path)?;
            info!("Loaded language configurations from {:?}", path);
            registry
        }
        None => LanguageRegistry::builtin()?,
    };
    info!("Supported languages: {}", languages.supported().join(", "));

    info!("Starting Judge Worker...");

    let mut redis = RedisManager::with_worker_lease(&config.redis_url).await?;
    let worker_id = redis.worker_id();

    let names = config.sandbox.slot_names(worker_id);
    info!(
        "Sandbox config: worker_id={}, image={}, sandboxes={}",
        worker_id,
        config.sandbox.image,
        names.join(", ")
    );
    let provider = SandboxProvider::new(Arc::new(DockerCli::from_env()), config.sandbox.clone());
    let judge = Arc::new(Judge::new(
        SandboxPool::new(provider, names),
        languages,
        Workspace::new(&config.sandbox.volume_path),
    ));

    let sink = redis.result_sink().await?;
    let callbacks = CallbackClient::new()?;

    let (shutdown_tx, mut shutdown) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(true);
            }
            Err(e) => {
                error!("Failed to listen for shutdown signal: {}", e);
                // Keep the sender alive so the worker keeps running
                std::future::pending::<()>().await;
            }
        }
    });

    // One job per sandbox; further jobs stay in the queue for other workers
    let slots = Arc::new(Semaphore::new(judge.pool().capacity()));
    let mut tasks = JoinSet::new();

    info!("Waiting for jobs...");

    loop {
        let permit = tokio::select! {
            _ = shutdown.changed() => break,
            permit = Arc::clone(&slots).acquire_owned() => permit.context("Job slots closed")?,
        };
        if *shutdown.borrow() {
            break;
        }

        while let Some(finished) = tasks.try_join_next() {
            if let Err(e) = finished {
                error!("Job task failed: {}", e);
            }
        }

        let Some(job) = redis.pop_job(POP_TIMEOUT).await? else {
            continue;
        };

        let judge = Arc::clone(&judge);
        let mut sink = sink.clone();
        let callbacks = callbacks.clone();
        tasks.spawn(async move {
            let _permit = permit;

            let report = process_job(&judge, &job).await;
            if let Err(e) = sink.store_report(&report).await {
                error!("Failed to store report {}: {:#}", report.request_id, e);
            }
            if let Some(url) = &job.request().callback_url {
                callbacks.notify(url, &report).await;
            }
        });
    }

    info!("Shutting down, waiting for {} in-flight job(s)...", tasks.len());
    while let Some(finished) = tasks.join_next().await {
        if let Err(e) = finished {
            error!("Job task failed: {}", e);
        }
    }

    judge.pool().close();
    if let Err(e) = redis.close().await {
        warn!("{:#}", e);
    }
    info!("Judge Worker stopped");

    Ok(())
}
