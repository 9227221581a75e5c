//! API server entry point.

use api::config::{Config, LogFormat};
use duel_store::{DuelStore, InMemoryDuelStore, PostgresDuelStore};
use metrics_exporter_prometheus::PrometheusHandle;
use scheduler::{
    AutoRollScheduler, AutoRollWorker, InMemoryScheduler, PostgresScheduler, TaskQueue,
};
use sqlx::postgres::PgPoolOptions;
use tokio::signal;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Waits for a shutdown signal (SIGINT or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received SIGINT, starting graceful shutdown");
        }
        () = terminate => {
            tracing::info!("received SIGTERM, starting graceful shutdown");
        }
    }
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
    }
}

/// Runs the HTTP server and the auto-roll worker until shutdown.
async fn serve<S, Sc>(config: &Config, store: S, scheduler: Sc, metrics_handle: PrometheusHandle)
where
    S: DuelStore + Clone + 'static,
    Sc: AutoRollScheduler + TaskQueue + Clone + 'static,
{
    let state = api::create_state(store, scheduler.clone());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = AutoRollWorker::new(scheduler, state.coordinator.clone(), config.worker());
    let worker_handle = tokio::spawn(worker.run(shutdown_rx));

    let app = api::create_app(state, metrics_handle);

    let addr = config.addr();
    tracing::info!(%addr, "starting API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("failed to bind address");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .expect("server error");

    let _ = shutdown_tx.send(true);
    if let Err(e) = worker_handle.await {
        tracing::error!(error = %e, "auto-roll worker panicked");
    }

    tracing::info!("server shut down gracefully");
}

#[tokio::main]
async fn main() {
    let config = Config::from_env();

    // 1. Initialize tracing
    init_tracing(&config);

    // 2. Install Prometheus metrics recorder
    let metrics_handle = metrics_exporter_prometheus::PrometheusBuilder::new()
        .install_recorder()
        .expect("failed to install Prometheus recorder");

    // 3. Pick storage and start serving
    match &config.database_url {
        Some(url) => {
            let pool = PgPoolOptions::new()
                .max_connections(config.database_max_connections)
                .connect(url)
                .await
                .expect("failed to connect to database");

            let store = PostgresDuelStore::new(pool.clone());
            store
                .run_migrations()
                .await
                .expect("failed to run migrations");
            let scheduler = PostgresScheduler::with_retry_delay(pool, config.auto_roll_retry_delay);

            tracing::info!("using PostgreSQL storage");
            serve(&config, store, scheduler, metrics_handle).await;
        }
        None => {
            let store = InMemoryDuelStore::new();
            let scheduler = InMemoryScheduler::with_retry_delay(config.auto_roll_retry_delay);

            tracing::info!("DATABASE_URL not set, using in-memory storage");
            serve(&config, store, scheduler, metrics_handle).await;
        }
    }
}
