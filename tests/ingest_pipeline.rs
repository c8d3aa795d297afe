use std::path::Path;
use std::time::Duration;

use serde_json::{Value, json};
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

use auction_archive::config::AppConfig;
use auction_archive::error::{IngestError, RequestError};
use auction_archive::pipeline::ingest;
use auction_archive::snapshot;
use auction_archive::store::AuctionStore;

const UPDATED: i64 = 1_741_000_060_000;

/// Real `item_bytes`: `§aEnchanted Diamond` x4 with id `ENCHANTED_DIAMOND`.
const ENCHANTED_DIAMOND_X4: &str = "H4sIAAAAAAAC/xWOzW6CQBRGPyhWnE1j4qJLFm5p/MFYl8QhaRPFjV03l5kBJylDA5ekfSLfwycT1yc55whgAs8KAJ4P32ov9DDaN73jQOCJqRIYa9v9/tB/iCCn2mB2u1Lm1IUcGx1JS3Xj9ATBoWlN+BDh9XbdfnUD5CZSLZUc8cW6qnuDwEv2xy2lzK0tejZd+KhimuX7jzQ/Z/JbfqbHUy6HWt8PZJ6UK7XQWxMvaV3EidroeGfey3hBy2Kl1joxmxLw8SyppsoMA7gDzLOkxtYAAAA=";

/// Serve the given responses in order, one per connection.
async fn serve(responses: Vec<(&'static str, String)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        for (status_line, body) in responses {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let mut buf = vec![0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
    });
    format!("http://{addr}/skyblock/auctions_ended")
}

fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .timeout(Duration::from_secs(5))
        .build()
        .unwrap()
}

fn config(url: String, db_path: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.api.url = url;
    config.storage.db_path = db_path.to_path_buf();
    config
}

fn auction(id: &str, buyer: Value, price: i64) -> Value {
    json!({
        "auction_id": id,
        "seller": "seller-uuid",
        "seller_profile": "seller-profile",
        "buyer": buyer,
        "buyer_profile": "buyer-profile",
        "timestamp": UPDATED - 10_000,
        "price": price,
        "bin": true,
        "item_bytes": ENCHANTED_DIAMOND_X4
    })
}

fn page(auctions: Vec<Value>) -> String {
    json!({ "success": true, "lastUpdated": UPDATED, "auctions": auctions }).to_string()
}

fn stored_count(db_path: &Path) -> u64 {
    AuctionStore::open(db_path).unwrap().count().unwrap()
}

#[tokio::test]
async fn stores_only_sold_auctions() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let body = page(vec![
        auction("A", json!("buyer-a"), 1_000),
        auction("B", Value::Null, 2_000),
    ]);
    let cfg = config(serve(vec![("200 OK", body)]).await, &db);

    let summary = ingest(&client(), &cfg).await.unwrap();
    assert_eq!(summary.auctions_seen, 2);
    assert_eq!(summary.finished_sales, 1);
    assert_eq!(summary.inserted, 1);
    assert_eq!(summary.total_rows, 1);

    let store = AuctionStore::open(&db).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    let sold = store.get("A").unwrap().unwrap();
    assert_eq!(sold.item_id, "ENCHANTED_DIAMOND");
    assert_eq!(sold.item_name.as_deref(), Some("Enchanted Diamond"));
    assert_eq!(sold.item_count, 4);
    assert!(store.get("B").unwrap().is_none());
    assert_eq!(store.sales_of("ENCHANTED_DIAMOND").unwrap().len(), 1);
}

#[tokio::test]
async fn undecodable_item_bytes_is_parse_error() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let mut bad = auction("A", json!("buyer-a"), 1_000);
    bad["item_bytes"] = json!("aGVsbG8=");
    let cfg = config(serve(vec![("200 OK", page(vec![bad]))]).await, &db);

    let err = ingest(&client(), &cfg).await.unwrap_err();
    assert_eq!(err.kind(), "parse");
    assert!(!db.exists());
}

#[tokio::test]
async fn identical_payload_twice_keeps_row_count() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let body = page(vec![
        auction("A", json!("buyer-a"), 1_000),
        auction("C", json!("buyer-c"), 3_000),
    ]);
    let cfg = config(
        serve(vec![("200 OK", body.clone()), ("200 OK", body)]).await,
        &db,
    );

    let first = ingest(&client(), &cfg).await.unwrap();
    let after_first = stored_count(&db);
    let second = ingest(&client(), &cfg).await.unwrap();

    assert_eq!(first.inserted, 2);
    assert_eq!(second.inserted, 0);
    assert_eq!(second.already_stored, 2);
    assert_eq!(stored_count(&db), after_first);
}

#[tokio::test]
async fn later_payload_cannot_change_stored_values() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let cfg = config(
        serve(vec![
            ("200 OK", page(vec![auction("A", json!("buyer-a"), 1_000)])),
            ("200 OK", page(vec![auction("A", json!("someone-else"), 9_999)])),
        ])
        .await,
        &db,
    );

    ingest(&client(), &cfg).await.unwrap();
    ingest(&client(), &cfg).await.unwrap();

    let stored = AuctionStore::open(&db).unwrap().get("A").unwrap().unwrap();
    assert_eq!(stored.price, 1_000);
    assert_eq!(stored.buyer.as_deref(), Some("buyer-a"));
}

#[tokio::test]
async fn http_failure_is_request_error_and_writes_nothing() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let cfg = config(serve(vec![("502 Bad Gateway", String::new())]).await, &db);

    let err = ingest(&client(), &cfg).await.unwrap_err();
    assert_eq!(err.kind(), "request");
    assert!(!db.exists());
}

#[tokio::test]
async fn api_rejection_is_request_error() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let body = json!({ "success": false, "cause": "Key throttle" }).to_string();
    let cfg = config(serve(vec![("200 OK", body)]).await, &db);

    let err = ingest(&client(), &cfg).await.unwrap_err();
    assert!(matches!(
        err,
        IngestError::Request(RequestError::Rejected { ref cause }) if cause == "Key throttle"
    ));
    assert!(!db.exists());
}

#[tokio::test]
async fn malformed_payload_is_parse_error_without_partial_writes() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let mut bad = auction("B", json!("buyer"), 1);
    bad.as_object_mut().unwrap().remove("item_bytes");
    let cfg = config(
        serve(vec![
            ("200 OK", page(vec![auction("A", json!("buyer-a"), 1_000)])),
            ("200 OK", page(vec![auction("C", json!("buyer-c"), 5), bad])),
        ])
        .await,
        &db,
    );

    ingest(&client(), &cfg).await.unwrap();
    let err = ingest(&client(), &cfg).await.unwrap_err();

    assert_eq!(err.kind(), "parse");
    let store = AuctionStore::open(&db).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert!(store.get("C").unwrap().is_none());
}

#[tokio::test]
async fn raw_payload_is_saved_when_configured() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let raw = dir.path().join("raw_auctions.json");
    let body = page(vec![auction("A", json!("buyer-a"), 1_000)]);
    let mut cfg = config(serve(vec![("200 OK", body.clone())]).await, &db);
    cfg.ingest.raw_payload_path = Some(raw.clone());

    ingest(&client(), &cfg).await.unwrap();

    assert_eq!(std::fs::read_to_string(&raw).unwrap(), body);
}

#[tokio::test]
async fn ingested_store_survives_snapshot_round_trip() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("auctions.db");
    let archive = dir.path().join("auctions.sql.zip");
    let restored = dir.path().join("restored.db");
    let body = page(vec![
        auction("A", json!("buyer-a"), 1_000),
        auction("B", Value::Null, 2_000),
        auction("C", json!("buyer-c"), 3_000),
    ]);
    let cfg = config(serve(vec![("200 OK", body)]).await, &db);
    ingest(&client(), &cfg).await.unwrap();

    let summary = snapshot::export(&db, &archive).unwrap();
    assert_eq!(summary.rows, 2);
    assert_eq!(snapshot::restore(&archive, &restored).unwrap(), 2);

    let original = AuctionStore::open(&db).unwrap().all().unwrap();
    let copy = AuctionStore::open(&restored).unwrap().all().unwrap();
    assert_eq!(original, copy);
}
