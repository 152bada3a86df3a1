use std::sync::Arc;

use clap::Parser;
use grantwell_core::model::{ApplicationId, GroupId, UserId};
use grantwell_server::cli::{Cli, Command};
use grantwell_server::config::{AppConfig, LogFormat, StorageBackend};
use grantwell_server::metrics::Metrics;
use grantwell_server::rest;
use grantwell_server::service::{PermissionService, UserReport};
use grantwell_server::telemetry;
use grantwell_storage::{
    DirectoryStore, InMemoryCacheStore, InMemoryDirectory, MokaSharedCache, PermissionCacheStore,
    PostgresCacheStore, PostgresDirectory,
};

use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[cfg(feature = "telemetry")]
type TelemetryProvider = opentelemetry_sdk::trace::TracerProvider;
#[cfg(not(feature = "telemetry"))]
type TelemetryProvider = ();

fn init_logging(
    config: &AppConfig,
) -> Result<Option<TelemetryProvider>, Box<dyn std::error::Error>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log.level));

    let otel_provider = telemetry::init_telemetry(&config.tracing)?;

    // OTel layer is typed to bare Registry, so it must be added first.
    // Layer order (bottom to top): Registry → OTel → EnvFilter → fmt
    let registry = tracing_subscriber::registry();

    #[cfg(feature = "telemetry")]
    let registry = registry.with(otel_provider.as_ref().map(telemetry::make_otel_layer));

    let registry = registry.with(filter);

    match config.log.format {
        LogFormat::Json => {
            let fmt_layer = tracing_subscriber::fmt::layer().json();
            registry.with(fmt_layer).init();
        }
        LogFormat::Pretty => {
            let fmt_layer = tracing_subscriber::fmt::layer().pretty();
            registry.with(fmt_layer).init();
        }
    }

    if otel_provider.is_some() {
        tracing::info!("OpenTelemetry tracing enabled");
    } else if config.tracing.enabled {
        tracing::warn!("tracing.enabled is set but the telemetry feature is not compiled in");
    }

    Ok(otel_provider)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let config = AppConfig::load(cli.config.as_deref())?;
    let otel_provider = init_logging(&config)?;

    let result = run(cli.command.unwrap_or(Command::Serve), config).await;

    if let Some(provider) = otel_provider {
        telemetry::shutdown_telemetry(provider);
    }
    result
}

async fn run(command: Command, config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    match (command, config.storage.backend) {
        (Command::Migrate, _) => run_migrate(&config).await,
        (command, StorageBackend::Memory) => {
            tracing::warn!("using the in-memory backend; data is not persisted");
            let directory = Arc::new(InMemoryDirectory::new());
            let caches = Arc::new(InMemoryCacheStore::new());
            dispatch(command, config, directory, caches).await
        }
        (command, StorageBackend::Postgres) => {
            let pool = connect(&config).await?;
            let directory = Arc::new(PostgresDirectory::new(pool.clone()));
            let caches = Arc::new(PostgresCacheStore::new(pool));
            dispatch(command, config, directory, caches).await
        }
    }
}

async fn connect(config: &AppConfig) -> Result<sqlx::PgPool, sqlx::Error> {
    sqlx::postgres::PgPoolOptions::new()
        .max_connections(config.database.max_connections)
        .connect(&config.database.url)
        .await
}

async fn run_migrate(config: &AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!("running database migrations");
    let pool = connect(config).await?;
    grantwell_storage::postgres::migrations::run_migrations(&pool).await?;
    tracing::info!("migrations completed successfully");
    Ok(())
}

async fn dispatch<D, C>(
    command: Command,
    config: AppConfig,
    directory: Arc<D>,
    caches: Arc<C>,
) -> Result<(), Box<dyn std::error::Error>>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
{
    let metrics = Arc::new(Metrics::new());
    let shared = Arc::new(MokaSharedCache::new(
        config.shared_cache.max_capacity,
        config.shared_cache_ttl(),
    ));
    let service = Arc::new(PermissionService::new(
        directory,
        caches,
        shared,
        config.to_engine_config(),
        Arc::clone(&metrics),
    ));

    match command {
        Command::Serve => run_serve(&config, service, metrics).await,
        Command::Migrate => run_migrate(&config).await,
        Command::RecalculateUser { user_id } => run_recalculate_user(&service, user_id).await,
        Command::RecalculateGroup { group_id } => run_recalculate_group(&service, group_id).await,
        Command::ShowUser {
            user_id,
            application_id,
        } => run_show_user(&service, user_id, application_id).await,
    }
}

async fn run_recalculate_user<D, C>(
    service: &PermissionService<D, C, MokaSharedCache>,
    user_id: UserId,
) -> Result<(), Box<dyn std::error::Error>>
where
    D: DirectoryStore,
    C: PermissionCacheStore,
{
    let effective = service.recalculate_user(&user_id).await?;

    println!("Recalculated user {user_id}");
    println!("  Global: {}", join(&effective.global));
    for (app, kinds) in &effective.applications {
        println!("  App {app}: {}", join(kinds));
    }
    Ok(())
}

async fn run_recalculate_group<D, C>(
    service: &PermissionService<D, C, MokaSharedCache>,
    group_id: GroupId,
) -> Result<(), Box<dyn std::error::Error>>
where
    D: DirectoryStore,
    C: PermissionCacheStore,
{
    let outcome = service.recalculate_group(&group_id).await?;

    println!("Recalculated group {group_id}");
    println!("  Members recalculated: {}", outcome.recalculated.len());
    for user_id in &outcome.removed_orphans {
        println!("  Removed orphaned membership: {user_id}");
    }
    Ok(())
}

async fn run_show_user<D, C>(
    service: &PermissionService<D, C, MokaSharedCache>,
    user_id: UserId,
    application_id: Option<ApplicationId>,
) -> Result<(), Box<dyn std::error::Error>>
where
    D: DirectoryStore,
    C: PermissionCacheStore,
{
    let report = service.show_user(&user_id, application_id.as_ref()).await?;
    print_report(&report, application_id.as_ref());
    Ok(())
}

fn print_report(report: &UserReport, application_id: Option<&ApplicationId>) {
    println!("User {}", report.user_id);
    println!("  Groups:");
    for group in &report.groups {
        println!("    {} (priority {}) {}", group.name, group.priority, group.id);
    }

    match &report.cached_global {
        Some(record) => println!(
            "  Cached global ({}): {}",
            record.updated_at.to_rfc3339(),
            join(&record.permissions)
        ),
        None => println!("  Cached global: none"),
    }
    println!("  Effective global: {}", join(&report.effective_global));

    if let Some(app) = application_id {
        match &report.cached_application {
            Some(record) => println!(
                "  Cached app {app} ({}): {}",
                record.updated_at.to_rfc3339(),
                join(&record.permissions)
            ),
            None => println!("  Cached app {app}: none"),
        }
        if let Some(kinds) = &report.effective_application {
            println!("  Effective app {app}: {}", join(kinds));
        }
    }
}

fn join<T: std::fmt::Display>(kinds: impl IntoIterator<Item = T>) -> String {
    let names: Vec<String> = kinds.into_iter().map(|k| k.to_string()).collect();
    if names.is_empty() {
        "(none)".to_string()
    } else {
        names.join(", ")
    }
}

async fn run_serve<D, C>(
    config: &AppConfig,
    service: Arc<PermissionService<D, C, MokaSharedCache>>,
    metrics: Arc<Metrics>,
) -> Result<(), Box<dyn std::error::Error>>
where
    D: DirectoryStore + 'static,
    C: PermissionCacheStore + 'static,
{
    let rest_addr: std::net::SocketAddr = config.rest_addr().parse()?;
    tracing::info!(
        %rest_addr,
        backend = ?config.storage.backend,
        "starting grantwell server"
    );

    let router = rest::create_router(rest::AppState { service, metrics });

    let listener = tokio::net::TcpListener::bind(rest_addr).await?;
    tracing::info!(%rest_addr, "REST server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("server shut down gracefully");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();

    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c => { tracing::info!("received SIGINT"); }
                _ = sigterm.recv() => { tracing::info!("received SIGTERM"); }
            }
        }
        Err(e) => {
            tracing::warn!(error = %e, "failed to register SIGTERM handler, using SIGINT only");
            let _ = ctrl_c.await;
            tracing::info!("received SIGINT");
        }
    }
}
