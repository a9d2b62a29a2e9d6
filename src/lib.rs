pub mod api;
pub mod cli;
pub mod clients;
pub mod config;
pub mod db;
pub mod domain;
pub mod entities;
pub mod models;
pub mod scheduler;
pub mod scrape;
pub mod services;

use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use anyhow::Context;
use clap::{CommandFactory, Parser};
use cli::{Cli, Commands};
use clients::LinkedInClient;
pub use config::Config;
use db::Store;
use scheduler::QueryScheduler;
use scrape::ScrapePipeline;
use services::{DefaultFeedService, FeedService, LifecycleManager};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

pub async fn run() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let config = Config::load()?;
    config.validate()?;

    let prometheus_handle = if config.observability.metrics_enabled {
        use metrics_exporter_prometheus::PrometheusBuilder;
        let builder = PrometheusBuilder::new();
        let handle = builder
            .install_recorder()
            .context("Failed to install Prometheus recorder")?;
        info!("Prometheus metrics recorder initialized");
        Some(handle)
    } else {
        None
    };

    init_tracing(&config)?;

    match cli.command {
        Some(Commands::Daemon) => run_daemon(config, prometheus_handle).await,
        Some(Commands::Check) => cli::cmd_check(&config).await,
        Some(Commands::Add { keywords, location }) => {
            cli::cmd_add_query(&config, &keywords, &location).await
        }
        Some(Commands::List) => cli::cmd_list_queries(&config).await,
        Some(Commands::Sweep) => cli::cmd_sweep(&config).await,
        Some(Commands::Init) => {
            if Config::create_default_if_missing()? {
                println!("✓ Config file created. Edit config.toml and run again.");
            } else {
                println!("config.toml already exists, left untouched.");
            }
            Ok(())
        }
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    }
}

fn init_tracing(config: &Config) -> anyhow::Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.general.log_level));

    let json = config.general.json_logs;
    let fmt_layer = (!json).then(tracing_subscriber::fmt::layer);
    let json_layer = json.then(|| tracing_subscriber::fmt::layer().json());

    let registry = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(json_layer);

    if config.observability.loki_enabled {
        let url = url::Url::parse(&config.observability.loki_url).context("Invalid Loki URL")?;

        let (layer, task) = tracing_loki::builder()
            .label("app", "jobfeed")?
            .extra_field("env", "production")?
            .build_url(url)?;

        tokio::spawn(task);

        registry.with(layer).init();
        info!(
            "Loki logging initialized at {}",
            config.observability.loki_url
        );
    } else {
        registry.init();
    }

    Ok(())
}

/// Opens the store and wires the job board client into a lifecycle manager.
pub async fn build_lifecycle(config: &Config) -> anyhow::Result<Arc<LifecycleManager>> {
    let store = Store::with_pool_options(
        &config.general.database_path,
        config.general.max_db_connections,
        config.general.min_db_connections,
    )
    .await?;

    let client = LinkedInClient::new(&config.scraper)?;
    let pipeline = ScrapePipeline::new(client, &config.scraper);

    Ok(Arc::new(LifecycleManager::new(
        store,
        Arc::new(pipeline),
        config.lifecycle.clone(),
    )))
}

async fn run_daemon(
    config: Config,
    prometheus_handle: Option<metrics_exporter_prometheus::PrometheusHandle>,
) -> anyhow::Result<()> {
    info!(
        "jobfeed v{} starting in daemon mode...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Arc::new(config);
    let lifecycle = build_lifecycle(&config).await?;
    let store = lifecycle.store().clone();

    let scheduler = QueryScheduler::new(lifecycle, config.scheduler.clone()).await?;
    scheduler.start().await?;

    let feeds: Arc<dyn FeedService> = Arc::new(DefaultFeedService::new(scheduler.clone()));
    let shutdown = CancellationToken::new();

    let server_handle: Option<tokio::task::JoinHandle<()>> = if config.server.enabled {
        let port = config.server.port;
        info!("Starting feed server on port {}", port);

        let state = api::AppState::new(Arc::clone(&config), store, feeds, prometheus_handle);
        let app = api::router(state);
        let addr = format!("0.0.0.0:{port}");
        let listener = tokio::net::TcpListener::bind(&addr).await?;
        let token = shutdown.clone();

        Some(tokio::spawn(async move {
            info!("Feed server running at http://0.0.0.0:{}", port);
            if let Err(e) = axum::serve(listener, app)
                .with_graceful_shutdown(token.cancelled_owned())
                .await
            {
                error!("Web server error: {}", e);
            }
        }))
    } else {
        None
    };

    info!("Daemon running. Press Ctrl+C to stop.");

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received");
        }
        Err(e) => {
            error!("Error listening for shutdown: {}", e);
        }
    }

    shutdown.cancel();
    if let Some(handle) = server_handle {
        if let Err(e) = handle.await {
            error!("Web server task failed: {}", e);
        }
    }

    scheduler.shutdown().await?;
    info!("Daemon stopped");

    Ok(())
}
