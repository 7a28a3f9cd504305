use anyhow::Context;
use rightmove_scout::{JsonStore, ScoutConfig, SearchPipeline, SearchQuery};
use std::path::Path;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("🏠 Rightmove Scout");
    info!("==================");

    let config = ScoutConfig::from_env().context("Failed to load configuration")?;
    let query = match std::env::args().nth(1) {
        Some(path) => load_query(Path::new(&path)).await?,
        None => SearchQuery::default(),
    };

    info!("Searching {}...", query);
    let store = JsonStore::new(&config.output_path);
    let results = SearchPipeline::new(config)
        .run_and_persist(&query, &store)
        .await
        .context("Search run failed")?;

    info!("\n✅ Scraped {} listings\n", results.listing_count());

    for (i, listing) in results.listings().enumerate() {
        println!(
            "{}. {} ({})",
            i + 1,
            listing.address.as_deref().unwrap_or("Unknown address"),
            listing.display_price.as_deref().unwrap_or("price on request")
        );
        match listing.bedrooms {
            Some(0) => println!("   Studio"),
            Some(beds) => println!("   {} bedrooms", beds),
            None => {}
        }
        if let Some(postcode) = &listing.postcode {
            println!("   Postcode: {}", postcode);
        }
        println!("   ID: {}", listing.id);
        println!("   URL: {}", listing.url);
        println!();
    }

    Ok(())
}

async fn load_query(path: &Path) -> anyhow::Result<SearchQuery> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read search query from {}", path.display()))?;
    serde_json::from_str(&json)
        .with_context(|| format!("Invalid search query in {}", path.display()))
}
