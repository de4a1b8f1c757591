use anyhow::{anyhow, Context, Result};
use broker::BrokerConfig;
use database::{initialize_database, Database};
use std::sync::Arc;

/// Load the effective broker configuration (file, `.env` and overrides)
pub fn load_config() -> Result<BrokerConfig> {
    BrokerConfig::from_env().context("Failed to load broker configuration")
}

/// Open the broker database without creating it.
///
/// Operator commands read what a running broker wrote; an absent file means the
/// broker was never started here.
pub async fn open_database(config: &BrokerConfig) -> Result<Arc<Database>> {
    let path = &config.database.database_path;
    if !path.exists() {
        return Err(anyhow!(
            "Database not initialized at {}. Start the broker first.",
            path.display()
        ));
    }

    let db_config = config.database.clone().with_create_tables(false);
    initialize_database(&db_config)
        .await
        .with_context(|| format!("Failed to open database at {}", path.display()))
}
