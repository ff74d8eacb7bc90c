use axum::Router;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_cron_scheduler::{Job, JobScheduler};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wellness_engine::config::{EngineConfig, ServerConfig};
use wellness_engine::db::{seed, MemoryStore, PgStore, Storage};
use wellness_engine::engine::WellnessEngine;
use wellness_engine::state::{AppState, SharedState};
use wellness_engine::time_utils::EngineTimezone;
use wellness_engine::web;

/// Where the weekly challenge windows live, for the hourly roll-forward.
#[derive(Clone)]
enum CatalogHandle {
    Postgres(sqlx::PgPool),
    Memory(Arc<MemoryStore>),
}

impl CatalogHandle {
    async fn roll_weekly_windows(&self, timezone: EngineTimezone) {
        let today = timezone.local_date(chrono::Utc::now());
        match self {
            CatalogHandle::Postgres(pool) => {
                if let Err(e) = seed::seed_all(pool, today).await {
                    tracing::error!("Failed to roll weekly challenge windows: {:#}", e);
                }
            }
            CatalogHandle::Memory(store) => {
                let rolled = store.roll_weekly_windows(today).await;
                if rolled > 0 {
                    tracing::info!("Rolled {} weekly challenge windows forward to {}", rolled, today);
                }
            }
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let engine_config = EngineConfig::from_env()?;
    let server_config = ServerConfig::from_env();
    let today = engine_config.timezone.local_date(chrono::Utc::now());
    tracing::info!(
        "Engine timezone {}, score window {} days",
        engine_config.timezone_name,
        engine_config.score_window_days
    );

    let (store, catalog): (Arc<dyn Storage>, CatalogHandle) = match &server_config.database_url {
        Some(database_url) => {
            tracing::info!("Connecting to database...");
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to database: {}", e);
                    e
                })?;
            tracing::info!("Database connection established");

            tracing::info!("Running database migrations...");
            sqlx::migrate!("./migrations").run(&pool).await.map_err(|e| {
                tracing::error!("Failed to run database migrations: {}", e);
                e
            })?;
            tracing::info!("Database migrations completed");

            seed::seed_all(&pool, today).await?;
            (Arc::new(PgStore::new(pool.clone())), CatalogHandle::Postgres(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, keeping all data in memory");
            let memory = Arc::new(MemoryStore::with_catalog(
                seed::default_challenges(today),
                seed::default_achievements(),
            ));
            (memory.clone(), CatalogHandle::Memory(memory))
        }
    };

    let timezone = engine_config.timezone;
    let engine = WellnessEngine::new(store, engine_config);
    let shared: SharedState = Arc::new(AppState { engine });

    // Drop per-user locks nobody is holding, every hour
    let scheduler = JobScheduler::new().await?;
    let shared_for_cleanup = shared.clone();
    scheduler
        .add(Job::new_async("0 0 * * * *", move |_uuid, _l| {
            let state = shared_for_cleanup.clone();
            Box::pin(async move {
                state.engine.locks().cleanup().await;
            })
        })?)
        .await?;

    // Weekly windows are seeded relative to a day; keep them open
    scheduler
        .add(Job::new_async("0 5 * * * *", move |_uuid, _l| {
            let catalog = catalog.clone();
            Box::pin(async move {
                catalog.roll_weekly_windows(timezone).await;
            })
        })?)
        .await?;

    scheduler.start().await?;
    tracing::info!("Scheduler started:");
    tracing::info!("  - User lock cleanup: hourly");
    tracing::info!("  - Weekly window roll-forward: hourly at :05");

    let app = Router::new()
        .merge(web::routes(shared))
        .layer(TraceLayer::new_for_http());

    let addr = server_config.bind_addr;
    tracing::info!("Listening on {addr}");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
