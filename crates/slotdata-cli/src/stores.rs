//! Store table maintenance commands.

use slotdata_core::{AppConfig, SeedStore, SiteProfile};
use slotdata_scraper::{discover_store_ids, StaticFetcher};
use sqlx::PgPool;

/// Insert the site profile's seed stores that are not registered yet.
///
/// # Errors
///
/// Returns an error if the insert fails.
pub(crate) async fn run_setup_stores(pool: &PgPool, profile: &SiteProfile) -> anyhow::Result<()> {
    if profile.seed_stores.is_empty() {
        println!("site profile has no seed stores");
        return Ok(());
    }
    let added = slotdata_db::seed_stores(pool, &profile.seed_stores).await?;
    println!(
        "registered {added} new store(s) ({} in profile)",
        profile.seed_stores.len()
    );
    Ok(())
}

/// Print the store ids linked from a prefecture's category page, and
/// register them when a pool is given.
///
/// # Errors
///
/// Returns an error if the category page cannot be fetched or the insert
/// fails.
pub(crate) async fn run_discover_stores(
    pool: Option<&PgPool>,
    config: &AppConfig,
    profile: &SiteProfile,
    prefecture: &str,
) -> anyhow::Result<()> {
    let fetcher = StaticFetcher::new(
        config.request_timeout_secs,
        &config.user_agent,
        &config.accept_language,
    )
    .map_err(|e| anyhow::anyhow!("failed to build HTTP client: {e}"))?;

    let ids = discover_store_ids(&fetcher, profile, prefecture).await?;
    for id in &ids {
        println!("{id}");
    }

    if let Some(pool) = pool {
        let seeds = discovered_seeds(&ids, prefecture);
        let added = slotdata_db::seed_stores(pool, &seeds).await?;
        println!("registered {added} new store(s) of {} discovered", ids.len());
    }
    Ok(())
}

fn discovered_seeds(ids: &[String], prefecture: &str) -> Vec<SeedStore> {
    ids.iter()
        .map(|id| SeedStore {
            store_id: id.clone(),
            name: None,
            prefecture: Some(prefecture.to_string()),
        })
        .collect()
}
