use serde::{Deserialize, Serialize};

/// Envelope returned by the `auctions_ended` endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndedAuctionsPage {
    pub success: bool,
    /// Failure reason when `success` is false.
    #[serde(default)]
    pub cause: Option<String>,
    /// Epoch millis of the API's last refresh.
    #[serde(default)]
    pub last_updated: Option<i64>,
    #[serde(default)]
    pub auctions: Vec<RawAuction>,
}

/// A single auction exactly as the API reports it.
#[derive(Debug, Clone, Deserialize)]
pub struct RawAuction {
    pub auction_id: String,
    pub seller: String,
    #[serde(default)]
    pub seller_profile: Option<String>,
    #[serde(default)]
    pub buyer: Option<String>,
    #[serde(default)]
    pub buyer_profile: Option<String>,
    /// Completion time in epoch millis. Absent while the auction is running.
    #[serde(default)]
    pub timestamp: Option<i64>,
    pub price: i64,
    #[serde(default)]
    pub bin: bool,
    /// Base64 gzipped NBT blob describing the item.
    pub item_bytes: String,
}

/// A finished, sold auction as persisted in the `auctions` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuctionRecord {
    pub auction_id: String,
    pub seller: String,
    pub seller_profile: Option<String>,
    pub buyer: Option<String>,
    pub buyer_profile: Option<String>,
    pub price: i64,
    pub bin: bool,
    pub item_bytes: String,
    /// `ExtraAttributes.id` decoded from `item_bytes`.
    pub item_id: String,
    pub item_name: Option<String>,
    pub item_count: i64,
    pub ended_at: i64,
    pub observed_at: i64,
}

impl AuctionRecord {
    /// Sale price per item in the stack.
    pub fn unit_price(&self) -> f64 {
        if self.item_count <= 0 {
            return self.price as f64;
        }
        self.price as f64 / self.item_count as f64
    }
}

/// Outcome of one ingestion run, reported as a JSON line on stdout.
#[derive(Debug, Clone, Serialize)]
pub struct IngestSummary {
    pub timestamp: String,
    pub auctions_seen: usize,
    pub finished_sales: usize,
    pub inserted: usize,
    pub already_stored: usize,
    pub total_rows: u64,
}

/// Outcome of a snapshot export.
#[derive(Debug, Clone, Serialize)]
pub struct SnapshotSummary {
    pub path: String,
    pub rows: u64,
    pub dump_bytes: u64,
    pub compressed_bytes: u64,
}

impl SnapshotSummary {
    /// Size reduction of the archive relative to the raw SQL dump, in percent.
    pub fn ratio_percent(&self) -> f64 {
        if self.dump_bytes == 0 {
            return 0.0;
        }
        (1.0 - self.compressed_bytes as f64 / self.dump_bytes as f64) * 100.0
    }
}
