use std::{process, sync::Arc};

use catalog::{
    application::{
        catalog::CatalogService,
        error::AppError,
        repos::{ProductsRepo, ProductsWriteRepo},
    },
    cache::{self, CacheConfig, CacheStore},
    config,
    infra::{
        db::PostgresRepositories,
        error::InfraError,
        http::{self, ApiState},
        telemetry,
    },
};
use tokio_util::sync::CancellationToken;
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

    telemetry::init(&settings.logging)?;

    match command {
        config::Command::Serve(_) => run_serve(settings).await,
        config::Command::Migrate(_) => run_migrate(settings).await,
    }
}

async fn run_serve(settings: config::Settings) -> Result<(), AppError> {
    let repositories = init_repositories(&settings).await?;

    let cache_config = CacheConfig::from(&settings.cache);
    let store = cache::build_store(&cache_config).map_err(InfraError::from)?;
    let cache_backend = store.backend();

    let reader: Arc<dyn ProductsRepo> = repositories.clone();
    let writer: Arc<dyn ProductsWriteRepo> = repositories.clone();
    let catalog = Arc::new(CatalogService::new(reader, writer, store, &cache_config));

    let shutdown = CancellationToken::new();
    let state = ApiState {
        catalog,
        readiness: repositories,
        cache_backend,
        shutdown: shutdown.clone(),
    };

    serve_http(&settings, state, shutdown).await
}

async fn run_migrate(settings: config::Settings) -> Result<(), AppError> {
    let pool = connect_pool(&settings).await?;
    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;
    info!("Migrations applied");
    Ok(())
}

async fn connect_pool(settings: &config::Settings) -> Result<sqlx::PgPool, AppError> {
    let database_url = settings
        .database
        .url
        .as_ref()
        .ok_or_else(|| InfraError::configuration("database url is not configured"))?;

    let pool =
        PostgresRepositories::connect(database_url, settings.database.max_connections.get())
            .await
            .map_err(InfraError::database)?;
    Ok(pool)
}

async fn init_repositories(
    settings: &config::Settings,
) -> Result<Arc<PostgresRepositories>, AppError> {
    let pool = connect_pool(settings).await?;

    PostgresRepositories::run_migrations(&pool)
        .await
        .map_err(InfraError::from)?;

    Ok(Arc::new(PostgresRepositories::new(pool)))
}

async fn serve_http(
    settings: &config::Settings,
    state: ApiState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let router = http::build_router(state);

    let addr = settings.server.addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|source| InfraError::Bind { addr, source })?;
    info!(%addr, "Catalog listening");

    let requested = CancellationToken::new();
    let signal_token = requested.clone();
    let server = axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(async move {
            wait_for_signal().await;
            info!("Shutdown requested, draining connections");
            signal_token.cancel();
        });
    let server = tokio::spawn(async move { server.await });
    let server = async {
        server
            .await
            .map_err(|err| AppError::unexpected(format!("server task failed: {err}")))?
            .map_err(InfraError::Serve)?;
        Ok::<_, AppError>(())
    };

    let grace = settings.server.graceful_shutdown;
    match http::run_until_drained(server, &requested, &shutdown, grace).await? {
        http::Drain::Completed => info!("Server stopped"),
        http::Drain::Abandoned => warn!("Server stopped after canceling in-flight requests"),
    }
    Ok(())
}

async fn wait_for_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
