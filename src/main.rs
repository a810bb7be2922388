use std::{net::SocketAddr, process, sync::Arc, time::Duration};

use tokio::sync::watch;
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;
use wayfarer::{
    application::{error::AppError, gateway::GatewayError},
    config,
    domain::{EndpointId, QueryParams},
    infra::{
        bootstrap::{self, BootstrapError},
        error::InfraError,
        http::{self, ApiRateLimiter, ApiState},
        telemetry,
    },
};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    let command = cli_args
        .command
        .unwrap_or(config::Command::Serve(Box::<config::ServeArgs>::default()));

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Fetch(args) => run_fetch(settings, args).await,
        config::Command::PruneCache(args) => run_prune_cache(settings, args),
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let gateway = Arc::new(bootstrap::build_gateway(&settings).map_err(bootstrap_failure)?);
    let limiter = ApiRateLimiter::new(
        Duration::from_secs(settings.rate_limit.window_seconds.get().into()),
        settings.rate_limit.max_requests.get(),
    );
    let router = http::build_router(ApiState::new(gateway, limiter));

    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;
    info!(
        target = "wayfarer::serve",
        addr = %settings.server.addr,
        rate_limit = settings.rate_limit.max_requests.get(),
        rate_window_secs = settings.rate_limit.window_seconds.get(),
        "Listening"
    );

    let (stop_tx, mut stop_rx) = watch::channel(false);
    let mut server = tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = stop_rx.changed().await;
        })
        .await
    });

    tokio::select! {
        joined = &mut server => return server_outcome(joined),
        () = shutdown_signal() => {}
    }

    info!(
        target = "wayfarer::serve",
        grace_secs = settings.server.graceful_shutdown.as_secs(),
        "Shutdown requested; draining connections"
    );
    let _ = stop_tx.send(true);

    match tokio::time::timeout(settings.server.graceful_shutdown, &mut server).await {
        Ok(joined) => server_outcome(joined),
        Err(_) => {
            warn!(
                target = "wayfarer::serve",
                "Graceful shutdown timed out; aborting open connections"
            );
            server.abort();
            Ok(())
        }
    }
}

fn server_outcome(
    joined: Result<std::io::Result<()>, tokio::task::JoinError>,
) -> Result<(), AppError> {
    match joined {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(AppError::unexpected(format!("server error: {err}"))),
        Err(err) => Err(AppError::unexpected(format!("server task failed: {err}"))),
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(target = "wayfarer::serve", error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}

async fn run_fetch(settings: config::Settings, args: config::FetchArgs) -> Result<(), AppError> {
    let endpoint: EndpointId = args
        .action
        .parse()
        .map_err(|err| AppError::from(GatewayError::from(err)))?;
    let params: QueryParams = args.params.into_iter().collect();

    let gateway = bootstrap::build_gateway(&settings).map_err(bootstrap_failure)?;
    let ttl = args
        .ttl_seconds
        .map(Duration::from_secs)
        .unwrap_or_else(|| gateway.ttl_for(endpoint));

    let envelope = gateway.fetch_endpoint(endpoint, &params, ttl).await?;
    let rendered = serde_json::to_string_pretty(&envelope)
        .map_err(|err| AppError::unexpected(format!("failed to encode response: {err}")))?;
    println!("{rendered}");
    Ok(())
}

fn run_prune_cache(
    settings: config::Settings,
    args: config::PruneCacheArgs,
) -> Result<(), AppError> {
    let store = bootstrap::open_cache(&settings)?;
    let older_than = args
        .older_than_seconds
        .map(Duration::from_secs)
        .unwrap_or(settings.cache.ttl.reference);

    let removed = store.prune(older_than)?;
    info!(
        target = "wayfarer::prune",
        backend = store.backend_name(),
        older_than_secs = older_than.as_secs(),
        removed,
        "Cache pruned"
    );
    println!("removed {removed} cache entries");
    Ok(())
}

fn bootstrap_failure(err: BootstrapError) -> AppError {
    match err {
        BootstrapError::Cache(err) => AppError::from(err),
        BootstrapError::Infra(err) => AppError::from(err),
    }
}
