use anyhow::Result;
use tracing_subscriber::EnvFilter;

use verifaced::config::Config;
use verifaced::store::IdentityStore;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    tracing::info!("verifaced starting");

    let config = Config::from_env();
    let store = IdentityStore::open(&config.db_path).await?;
    let registered = store.count_all().await?;

    tracing::info!(
        db = %config.db_path.display(),
        registered,
        same_person_threshold = config.same_person_threshold,
        "verifaced ready — waiting for the transport front-end to attach"
    );

    // Keep running until signaled
    tokio::signal::ctrl_c().await?;
    tracing::info!("verifaced shutting down");

    Ok(())
}
