use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use club_roster::api::router;
use club_roster::config::AppConfig;
use club_roster::source::PortalConnector;
use club_roster::state::AppState;
use club_roster::store;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "club_roster=debug".to_string()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::new_from_env()?;

    let roster_store = store::open(&config.store).await?;
    info!("Roster store backend: {}", roster_store.backend());

    let state = AppState::new(
        roster_store,
        Arc::new(PortalConnector::new(config.portal.clone())),
        config.sync.clone(),
    );

    let app = router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}
