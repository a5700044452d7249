use clap::Parser;
use opstool_client::RedisQueue;
use opstool_worker::config::redis_url_from_env;
use opstool_worker::{HandlerRegistry, Worker, WorkerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "opstool-worker")]
#[command(about = "OPSTOOL task dispatch worker", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(long)]
    config: Option<String>,

    /// Redis URL, e.g. redis://:password@host:6379
    #[arg(long, env = "REDIS_URL")]
    redis_url: Option<String>,

    /// Worker ID (auto-generated if not provided)
    #[arg(long)]
    worker_id: Option<String>,

    /// Webhook that receives alert notifications
    #[arg(long, env = "ALERT_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Emit JSON log lines
    #[arg(long)]
    log_json: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        WorkerConfig::from_file(config_path)?
    } else {
        WorkerConfig::default()
    };

    // Override with CLI args and environment
    if let Some(url) = args.redis_url.or_else(redis_url_from_env) {
        config.queue.redis_url = url;
    }
    if let Some(worker_id) = args.worker_id {
        config.worker_id = Some(worker_id);
    }
    if let Some(webhook_url) = args.webhook_url {
        config.alerts.webhook_url = Some(webhook_url);
    }
    if args.log_json {
        config.logging.json = true;
    }

    init_tracing(&config);

    let queue = RedisQueue::open(&config.queue.redis_url)?
        .with_keys(&config.queue.task_queue, &config.queue.result_queue)
        .with_connect_timeout(config.connect_timeout());

    let registry = HandlerRegistry::from_config(&config)?;
    tracing::info!("Registered task types: {:?}", registry.task_types());
    if config.alerts.webhook_url.is_none() {
        tracing::warn!("No alert webhook configured, notifications are disabled");
    }

    let mut worker = Worker::new(config, queue, registry);

    // Handle shutdown signals
    let shutdown = worker.shutdown_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        tracing::info!("Received shutdown signal, finishing current task");
        shutdown.trigger();
    });

    worker.run().await;

    Ok(())
}

fn init_tracing(config: &WorkerConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.logging.level));

    let registry = tracing_subscriber::registry().with(filter);
    if config.logging.json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry.with(tracing_subscriber::fmt::layer().with_target(false)).init();
    }
}
