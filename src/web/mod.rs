use axum::Router;
use migration::MigratorTrait;
use sea_orm::Database;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

use crate::config::{Config, StorageBackend};
use crate::todo::repository::{
    InMemoryRepository, RdbmsRepository, RepositoryError, TodoRepository,
};
use crate::todo::web::{TodoState, dispatch_handler};
use crate::todo::{Dispatcher, Status, Todo};

/// Builds the application router: the operational health endpoint, the
/// static asset service, and the dispatcher fallback that owns every other
/// route.
pub fn create_router(state: TodoState, static_dir: &str) -> Router {
    Router::new()
        .route("/health", axum::routing::get(health_check_handler))
        .nest_service("/css", ServeDir::new(static_dir))
        .fallback(dispatch_handler)
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()))
}

#[tracing::instrument(skip(config))]
pub async fn start_web_server(config: Config) -> anyhow::Result<()> {
    let server_address = format!("0.0.0.0:{}", &config.port);
    let listener = tokio::net::TcpListener::bind(&server_address).await?;
    tracing::info!("Web server running on http://{}", server_address);

    let repository = build_repository(&config).await?;
    let dispatcher = Arc::new(Dispatcher::new(repository));
    reset_store(dispatcher.repository()).await?;

    let state = TodoState { dispatcher };
    let app = create_router(state, &config.static_dir);

    axum::serve(listener, app).await?;
    Ok(())
}

async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn TodoRepository>> {
    match config.storage {
        StorageBackend::Memory => {
            tracing::info!("using in-memory storage");
            Ok(Arc::new(InMemoryRepository::new()))
        }
        StorageBackend::Postgres => {
            let db_url = config
                .db_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("DB_URL must be set when STORAGE=postgres"))?;
            let db = Database::connect(db_url).await?;
            migration::Migrator::up(&db, None).await?;
            tracing::info!("Database migrations applied successfully");
            Ok(Arc::new(RdbmsRepository::new(db)))
        }
    }
}

/// Clears the store and inserts the two todos shown on first boot. The
/// fixed low ids stay clear of the clock-seeded ids handed to new todos.
async fn reset_store(repository: &dyn TodoRepository) -> Result<(), RepositoryError> {
    repository.delete_all().await?;
    repository.save(Todo::new(1, "Serve todos over HTTP")).await?;
    repository
        .save(Todo::new(2, "Set up the storage backend").with_status(Status::Completed))
        .await?;
    tracing::info!(
        count = repository.count().await?,
        "reset store with starter todos"
    );
    Ok(())
}

#[tracing::instrument]
pub async fn health_check_handler() -> &'static str {
    "OK"
}
