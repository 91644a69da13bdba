use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cinerec_api::{
    api::{create_router, state::ResultLimits, AppState},
    config::Config,
    db::{create_pool, CatalogStore, MemoryStore, PgStore, RatingStore},
    services::RecommendationService,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,cinerec_api=debug,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let (catalog, ratings): (Arc<dyn CatalogStore>, Arc<dyn RatingStore>) =
        match (&config.database_url, &config.seed_path) {
            (Some(url), _) => {
                tracing::info!("Using PostgreSQL store");
                shared(PgStore::new(create_pool(url).await?, config.rating_scale()))
            }
            (None, Some(path)) => {
                shared(MemoryStore::from_seed_file(path).await?)
            }
            (None, None) => {
                tracing::warn!("No DATABASE_URL or SEED_PATH set, starting with an empty catalog");
                shared(MemoryStore::default())
            }
        };

    let service =
        RecommendationService::new(catalog.as_ref(), ratings, config.service_options()).await?;
    tracing::info!(catalog_items = service.catalog_len(), "Recommendation service ready");

    let limits = ResultLimits {
        default: config.default_results,
        max: config.max_results,
    };
    let app = create_router(AppState::new(service, limits));

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// One store serving both the catalog and the rating log
fn shared<S>(store: S) -> (Arc<dyn CatalogStore>, Arc<dyn RatingStore>)
where
    S: CatalogStore + RatingStore + 'static,
{
    let store = Arc::new(store);
    (store.clone(), store)
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
