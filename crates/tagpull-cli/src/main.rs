// tagpull demo binary
//
// Seeds an in-memory tagged pull queue, (re)starts a worker pool, lets it
// drain for a while and prints the resulting stats as JSON.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tagpull_core::app::{AppBuilder, ReschedulePolicy, WorkerHost};
use tagpull_core::config::{ControlParams, PullQueueConfig, RemoteConfig};
use tagpull_core::domain::{Credentials, WorkerTemplate};
use tagpull_core::impls::{InMemoryCredentialStore, InMemoryRemoteBackend};
use tagpull_core::ports::{CredentialStore, QueueService, RemoteTaskApi, SystemClock};
use tagpull_core::queue::InMemoryQueueService;

#[derive(Parser)]
#[command(name = "tagpull")]
#[command(about = "Tagged pull queue demo: populate, start workers, watch them drain")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Workers lease from this process's own queue
    Local(RunArgs),

    /// Workers lease from a queue owned by another (simulated) deployment
    Remote {
        #[command(flatten)]
        run: RunArgs,

        /// App that owns the pull queue
        #[arg(long, default_value = "provider")]
        provider_app: String,

        /// Identity whose credentials the workers use
        #[arg(long, default_value = "service-account")]
        identity: String,
    },
}

#[derive(Args, Clone, Copy)]
struct RunArgs {
    #[arg(long, default_value_t = 100)]
    total_batches: u32,

    #[arg(long, default_value_t = 10)]
    tasks_per_batch: u32,

    #[arg(long, default_value_t = 2)]
    workers: u32,

    #[arg(long, default_value_t = 2)]
    tasks_per_worker: u32,

    #[arg(long, default_value_t = 10)]
    lease_seconds: u64,

    #[arg(long, default_value_t = 3)]
    max_leases_per_task: u32,

    /// How long to let the pool run
    #[arg(long, env = "TAGPULL_RUN_SECS", default_value_t = 5)]
    run_secs: u64,

    /// Concurrent executor slots of the worker host
    #[arg(long, default_value_t = 4)]
    slots: usize,

    /// Only reschedule workers whose pass failed
    #[arg(long)]
    reschedule_on_failure: bool,
}

impl RunArgs {
    fn params(&self) -> ControlParams {
        ControlParams {
            total_batches: self.total_batches,
            tasks_per_batch: self.tasks_per_batch,
            workers: self.workers,
            tasks_per_worker: self.tasks_per_worker,
            lease_seconds: self.lease_seconds,
            max_leases_per_task: self.max_leases_per_task,
        }
        .clamped()
    }

    fn policy(&self) -> ReschedulePolicy {
        if self.reschedule_on_failure {
            ReschedulePolicy::OnFailure
        } else {
            ReschedulePolicy::Always
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "tagpull=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = PullQueueConfig::from_env()?;
    tracing::info!(num_tags = config.num_tags, queue = %config.pull_queue_name, "tagpull starting");

    match cli.command {
        Command::Local(args) => run_local(config, args).await,
        Command::Remote {
            run,
            provider_app,
            identity,
        } => run_remote(config, run, provider_app, identity).await,
    }
}

async fn run_local(config: PullQueueConfig, args: RunArgs) -> Result<()> {
    let params = args.params();
    let app = AppBuilder::new().config(config).build()?;

    app.producer
        .enqueue_batch(params.total_batches, params.tasks_per_batch)
        .await?;
    app.controller
        .restart(params.workers as usize, &WorkerTemplate::new(params.lease_settings()))
        .await?;

    let host = app.start_host(args.slots, args.policy());
    let snapshot = wait_and_stop(host, args.run_secs).await;
    app.controller.purge_workers().await?;

    let stats = app.queue.fetch_stats().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "queue": stats, "workers": snapshot }))?
    );
    Ok(())
}

async fn run_remote(
    config: PullQueueConfig,
    args: RunArgs,
    provider_app: String,
    identity: String,
) -> Result<()> {
    let params = args.params();
    let remote = RemoteConfig::new(provider_app, config.pull_queue_name.clone())
        .with_default_identity(identity.clone());

    // Provider side: its own app seeds the queue the remote workers lease from.
    let provider_queue = Arc::new(InMemoryQueueService::new(Arc::new(SystemClock)));
    let provider = AppBuilder::new()
        .config(config.clone())
        .queue(provider_queue.clone())
        .build()?;
    provider
        .producer
        .enqueue_batch(params.total_batches, params.tasks_per_batch)
        .await?;

    let backend = Arc::new(InMemoryRemoteBackend::new(
        provider_queue,
        remote.project(),
        remote.job_queue.clone(),
    ));
    let token = format!("token-{identity}");
    backend.accept_token(token.clone());

    let factory_backend = Arc::clone(&backend);
    let store = Arc::new(InMemoryCredentialStore::new(Arc::new(move |c: &Credentials| {
        Arc::new(factory_backend.api(c.access_token.clone())) as Arc<dyn RemoteTaskApi>
    })));
    store
        .store_credentials(&identity, &Credentials::bearer(token))
        .await?;

    // Consumer side: an app whose workers lease remotely.
    let consumer = AppBuilder::new().config(config).build()?;
    consumer
        .controller
        .restart(params.workers as usize, &WorkerTemplate::new(params.lease_settings()))
        .await?;
    let worker = Arc::new(consumer.remote_worker(store, remote));
    let host = WorkerHost::spawn(
        args.slots,
        Arc::clone(&consumer.dispatcher),
        worker,
        Arc::clone(&consumer.clock),
        args.policy(),
    );
    let snapshot = wait_and_stop(host, args.run_secs).await;
    consumer.controller.purge_workers().await?;

    let stats = provider.queue.fetch_stats().await?;
    println!(
        "{}",
        serde_json::to_string_pretty(&serde_json::json!({ "provider_queue": stats, "workers": snapshot }))?
    );
    Ok(())
}

async fn wait_and_stop(host: WorkerHost, run_secs: u64) -> tagpull_core::app::HostSnapshot {
    tokio::select! {
        _ = tokio::time::sleep(Duration::from_secs(run_secs)) => {}
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("interrupted");
        }
    }
    let snapshot = host.shutdown_and_join().await;
    tracing::info!(passes = snapshot.passes, deleted = snapshot.deleted, "worker host stopped");
    snapshot
}
