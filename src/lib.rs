pub mod api;
pub mod config;
pub mod error;
pub mod item;
pub mod normalize;
pub mod pipeline;
pub mod reporter;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod types;

/// Hypixel SkyBlock endpoint listing auctions that ended in the last minute
/// (public, no API key required).
pub const AUCTIONS_ENDED_URL: &str = "https://api.hypixel.net/skyblock/auctions_ended";

/// Default SQLite database path.
pub const DEFAULT_DB_PATH: &str = "auctions.db";

/// Default snapshot archive path.
pub const DEFAULT_SNAPSHOT_PATH: &str = "auctions.sql.zip";
