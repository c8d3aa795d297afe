use reqwest::Client;
use tracing::{info, warn};

use crate::api::fetch_ended_auctions;
use crate::config::AppConfig;
use crate::error::{IngestError, RequestError};
use crate::normalize::{finished_sales, parse_page};
use crate::store::AuctionStore;
use crate::types::IngestSummary;

/// One ingestion run: fetch, normalize, insert.
///
/// The store is only opened after the payload has been fully normalized, so
/// request and parse failures never touch the database.
pub async fn ingest(client: &Client, config: &AppConfig) -> Result<IngestSummary, IngestError> {
    info!("Fetching ended auctions from {}", config.api.url);
    let payload = fetch_ended_auctions(client, &config.api.url).await?;

    if let Some(path) = &config.ingest.raw_payload_path {
        // Debug output only; never fails the run.
        if let Err(e) = std::fs::write(path, &payload) {
            warn!("Failed to write raw payload to {}: {e}", path.display());
        }
    }

    let page = parse_page(&payload)?;
    if !page.success {
        return Err(RequestError::Rejected {
            cause: page.cause.unwrap_or_else(|| "unknown cause".to_string()),
        }
        .into());
    }

    let records = finished_sales(&page, &config.ingest.normalize_options())?;
    info!(
        "Got {} auction(s), {} finished with a buyer",
        page.auctions.len(),
        records.len()
    );

    let mut store = AuctionStore::open(&config.storage.db_path)?;
    let inserted = store.insert_new(&records)?;
    let total_rows = store.count()?;

    Ok(IngestSummary {
        timestamp: chrono::Utc::now().to_rfc3339(),
        auctions_seen: page.auctions.len(),
        finished_sales: records.len(),
        inserted,
        already_stored: records.len() - inserted,
        total_rows,
    })
}
