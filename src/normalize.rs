use tracing::debug;

use crate::error::ParseError;
use crate::item::{ItemMeta, decode_item_bytes};
use crate::types::{AuctionRecord, EndedAuctionsPage, RawAuction};

/// Filters applied on top of the finished/sold classification.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizeOptions {
    /// Keep only Buy-It-Now auctions.
    pub bin_only: bool,
}

/// Parse the raw payload into the endpoint envelope.
pub fn parse_page(payload: &[u8]) -> Result<EndedAuctionsPage, ParseError> {
    Ok(serde_json::from_slice(payload)?)
}

/// Extract finished auctions that have a buyer.
///
/// An auction is finished when it carries a completion timestamp that is not
/// later than the page's `lastUpdated`. Kept auctions have their
/// `item_bytes` decoded. Any schema violation fails the whole page so
/// nothing from it gets written.
pub fn finished_sales(
    page: &EndedAuctionsPage,
    options: &NormalizeOptions,
) -> Result<Vec<AuctionRecord>, ParseError> {
    let mut records = Vec::new();

    for raw in &page.auctions {
        validate(raw)?;

        let Some(ended_at) = finished_at(raw, page.last_updated) else {
            continue;
        };
        let Some(buyer) = raw.buyer.as_deref().map(str::trim).filter(|b| !b.is_empty()) else {
            continue;
        };
        if options.bin_only && !raw.bin {
            continue;
        }
        let item = decode_item(raw)?;

        records.push(AuctionRecord {
            auction_id: raw.auction_id.clone(),
            seller: raw.seller.clone(),
            seller_profile: raw.seller_profile.clone(),
            buyer: Some(buyer.to_string()),
            buyer_profile: raw.buyer_profile.clone(),
            price: raw.price,
            bin: raw.bin,
            item_bytes: raw.item_bytes.clone(),
            item_id: item.item_id,
            item_name: item.item_name,
            item_count: item.count,
            ended_at,
            observed_at: page.last_updated.unwrap_or(ended_at),
        });
    }

    debug!(
        "Normalized {} of {} auctions into finished sales",
        records.len(),
        page.auctions.len()
    );
    Ok(records)
}

/// Parse and normalize in one step.
pub fn normalize(
    payload: &[u8],
    options: &NormalizeOptions,
) -> Result<Vec<AuctionRecord>, ParseError> {
    let page = parse_page(payload)?;
    finished_sales(&page, options)
}

fn finished_at(raw: &RawAuction, last_updated: Option<i64>) -> Option<i64> {
    let ended_at = raw.timestamp?;
    match last_updated {
        Some(updated) if ended_at > updated => None,
        _ => Some(ended_at),
    }
}

fn decode_item(raw: &RawAuction) -> Result<ItemMeta, ParseError> {
    decode_item_bytes(&raw.item_bytes).map_err(|e| ParseError::InvalidField {
        auction_id: raw.auction_id.clone(),
        field: "item_bytes",
        reason: e.to_string(),
    })
}

fn validate(raw: &RawAuction) -> Result<(), ParseError> {
    if raw.auction_id.trim().is_empty() {
        return Err(ParseError::InvalidField {
            auction_id: raw.auction_id.clone(),
            field: "auction_id",
            reason: "empty".to_string(),
        });
    }
    if raw.price < 0 {
        return Err(ParseError::InvalidField {
            auction_id: raw.auction_id.clone(),
            field: "price",
            reason: format!("negative value {}", raw.price),
        });
    }
    Ok(())
}
