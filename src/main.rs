use std::process;

use rfpl::{
    application::error::AppError,
    cache::{CacheConfig, CacheKey, CacheState, CacheStore, RequestIdentity, now_unix_seconds},
    config::{self, KeyArgs},
    infra::{
        error::InfraError,
        http::{self, UpstreamState},
        telemetry,
    },
};
use tracing::{Dispatch, Level, dispatcher, error, info, warn};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
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

    match command {
        config::Command::Serve(_) => {
            telemetry::init(&settings.logging)?;
            run_serve(settings).await
        }
        config::Command::Key(args) => run_key(&settings, &args).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let base_url = settings.upstream.base_url.clone().ok_or_else(|| {
        AppError::from(InfraError::configuration(
            "upstream.base_url is required to serve (set --upstream-url or RFPL__UPSTREAM__BASE_URL)",
        ))
    })?;

    let cache = CacheState::new(CacheConfig::from(&settings.cache))?;
    let upstream = UpstreamState::new(base_url, settings.upstream.timeout)?;

    info!(
        addr = %settings.server.addr,
        cache_root = %cache.store.root().display(),
        ttl_seconds = cache.store.ttl_seconds(),
        upstream = %upstream.base_url(),
        "starting respond-first cache"
    );

    let router = http::build_router(cache, upstream);
    let listener = tokio::net::TcpListener::bind(settings.server.addr)
        .await
        .map_err(|err| AppError::from(InfraError::from(err)))?;

    let graceful = settings.server.graceful_shutdown;
    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal(graceful))
        .await
        .map_err(|err| AppError::unexpected(format!("server error: {err}")))?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal(grace: std::time::Duration) {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!(
        grace_seconds = grace.as_secs(),
        "shutdown requested, draining connections"
    );
    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!("graceful shutdown timed out");
        process::exit(1);
    });
}

async fn run_key(settings: &config::Settings, args: &KeyArgs) -> Result<(), AppError> {
    let store = CacheStore::open(&CacheConfig::from(&settings.cache))?;
    let identity = RequestIdentity::new(args.host.clone(), args.path_and_query.clone());
    let key = CacheKey::derive(&identity);

    println!("identity: {identity}");
    println!("key:      {key}");
    println!("path:     {}", store.entry_path(&key).display());

    match store.lookup(&key).await {
        Some(entry) => {
            let now = now_unix_seconds();
            let state = if store.is_entry_fresh(&entry, now) {
                "fresh"
            } else {
                "stale"
            };
            println!("entry:    {} bytes, {state}, age {}s", entry.content.len(), now - entry.modified);
        }
        None => println!("entry:    absent"),
    }

    Ok(())
}
