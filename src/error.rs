use std::path::PathBuf;

use thiserror::Error;

/// Network or API failure while fetching the auction payload.
#[derive(Debug, Error)]
pub enum RequestError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("API rejected the request: {cause}")]
    Rejected { cause: String },
}

/// Payload does not match the expected auction schema.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("malformed auction payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("auction {auction_id:?}: invalid {field}: {reason}")]
    InvalidField {
        auction_id: String,
        field: &'static str,
        reason: String,
    },
}

/// The auction store could not be opened, read or written.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open database {}: {source}", path.display())]
    Open {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Snapshot export or restore failure. The live store is never modified.
#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("database {} does not exist", .0.display())]
    MissingDatabase(PathBuf),

    #[error("refusing to overwrite existing database {}", .0.display())]
    TargetExists(PathBuf),

    #[error("database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("snapshot is not valid UTF-8 SQL: {0}")]
    Encoding(#[from] std::string::FromUtf8Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl StoreError {
    /// Short error kind used in logs.
    pub fn kind(&self) -> &'static str {
        "store"
    }
}

impl SnapshotError {
    /// Short error kind used in logs.
    pub fn kind(&self) -> &'static str {
        "snapshot"
    }
}

/// Any failure that aborts an ingestion run.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error(transparent)]
    Request(#[from] RequestError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Write(#[from] StoreError),
}

impl IngestError {
    /// Short error kind used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            IngestError::Request(_) => "request",
            IngestError::Parse(_) => "parse",
            IngestError::Write(_) => "write",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds() {
        let req: IngestError = RequestError::Rejected {
            cause: "Key throttle".into(),
        }
        .into();
        assert_eq!(req.kind(), "request");

        let parse: IngestError = ParseError::InvalidField {
            auction_id: "a".into(),
            field: "price",
            reason: "negative".into(),
        }
        .into();
        assert_eq!(parse.kind(), "parse");

        let write: IngestError = StoreError::Io(std::io::Error::other("locked")).into();
        assert_eq!(write.kind(), "write");
    }

    #[test]
    fn snapshot_and_store_kinds() {
        assert_eq!(SnapshotError::MissingDatabase("auctions.db".into()).kind(), "snapshot");
        let wrapped: SnapshotError = StoreError::Io(std::io::Error::other("disk")).into();
        assert_eq!(wrapped.kind(), "snapshot");
        assert_eq!(StoreError::Io(std::io::Error::other("disk")).kind(), "store");
    }

    #[test]
    fn rejected_message_includes_cause() {
        let err = RequestError::Rejected {
            cause: "Key throttle".into(),
        };
        assert_eq!(err.to_string(), "API rejected the request: Key throttle");
    }
}
