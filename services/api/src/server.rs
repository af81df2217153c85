use crate::cli::ServeArgs;
use crate::infra::{AppState, InMemoryHost, InMemoryPersistence, LoggingNotifier};
use crate::routes::with_progress_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use progress_engine::config::AppConfig;
use progress_engine::error::AppError;
use progress_engine::progress::{spawn_maintenance, Collaborators, ProgressService};
use progress_engine::telemetry;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let host = Arc::new(InMemoryHost::default());
    let service = ProgressService::new(
        config.scoring.clone(),
        Collaborators {
            persistence: Arc::new(InMemoryPersistence::default()),
            snapshots: host.clone(),
            wealth: Some(host.clone()),
            notifier: Arc::new(LoggingNotifier),
        },
    );
    let maintenance = spawn_maintenance(service.clone());
    let service = Arc::new(service);

    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
        host,
        progress: service.clone(),
    };

    let app = with_progress_routes(service.clone())
        .layer(Extension(app_state))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(
        ?config.environment,
        %addr,
        maintenance_jobs = maintenance.len(),
        "progress engine ready"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    readiness_flag.store(false, Ordering::Release);
    maintenance.abort();
    let flushed = service.shutdown().await;
    info!(flushed, "progress records flushed; shutting down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
