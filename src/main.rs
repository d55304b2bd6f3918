use lending_desk::{
    adapters::memory::{MemoryAuthGate, MemoryLendingStore},
    adapters::postgres::{PostgresLendingStore, run_migrations},
    api::{handlers::AppState, router::create_router},
    application::lending::ServiceDependencies,
    domain::EmailAddress,
    ports::LendingStore,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lending_desk=debug,tower_http=debug,axum=trace".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Capability gate: comma-separated manager emails from the environment
    let managers = std::env::var("LIBRARY_MANAGERS").unwrap_or_default();
    let auth_gate = Arc::new(MemoryAuthGate::with_managers(
        managers
            .split(',')
            .filter_map(|raw| EmailAddress::parse(raw).ok()),
    ));

    // Store: PostgreSQL when DATABASE_URL is provided, in-memory otherwise
    let store: Arc<dyn LendingStore> = match std::env::var("DATABASE_URL") {
        Ok(database_url) => {
            let pool = sqlx::postgres::PgPoolOptions::new()
                .max_connections(5)
                .connect(&database_url)
                .await
                .expect("Failed to connect to database");

            run_migrations(&pool)
                .await
                .expect("Failed to run migrations");

            tracing::info!("Using the PostgreSQL store");
            Arc::new(PostgresLendingStore::new(pool))
        }
        Err(_) => {
            tracing::info!("DATABASE_URL not set, using the in-memory store");
            Arc::new(MemoryLendingStore::new())
        }
    };

    // Create service dependencies
    let service_deps = ServiceDependencies { store, auth_gate };

    // Create application state
    let app_state = Arc::new(AppState { service_deps });

    // Create router
    let app = create_router(app_state);

    // Server configuration
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".into());
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .expect("Failed to bind to address");

    tracing::info!("Server listening on {}", addr);

    // Start server
    axum::serve(listener, app)
        .await
        .expect("Failed to start server");
}
