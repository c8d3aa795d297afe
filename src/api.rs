use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::RequestError;

/// Build the HTTP client used for the auction endpoint.
pub fn build_client(timeout_secs: u64) -> Result<Client, RequestError> {
    let client = Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
        .build()?;
    Ok(client)
}

/// Fetch the ended-auctions payload with a single GET.
///
/// Non-2xx responses are errors. Retries are left to the next scheduled run.
pub async fn fetch_ended_auctions(client: &Client, url: &str) -> Result<Vec<u8>, RequestError> {
    let resp = client.get(url).send().await?;
    let status = resp.status();
    if !status.is_success() {
        return Err(RequestError::Status {
            url: url.to_string(),
            status,
        });
    }
    let body = resp.bytes().await?;
    debug!("Fetched {} bytes from {url} (HTTP {status})", body.len());
    Ok(body.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn test_client() -> Client {
        Client::builder()
            .no_proxy()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap()
    }

    /// Serve one canned HTTP response and return the URL to hit.
    async fn serve_once(status_line: &'static str, body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
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

    #[test]
    fn builds_client_with_timeout() {
        assert!(build_client(30).is_ok());
    }

    #[tokio::test]
    async fn returns_body_on_success() {
        let url = serve_once("200 OK", r#"{"success":true,"auctions":[]}"#).await;
        let client = test_client();
        let body = fetch_ended_auctions(&client, &url).await.unwrap();
        assert_eq!(body, br#"{"success":true,"auctions":[]}"#);
    }

    #[tokio::test]
    async fn non_success_status_is_error() {
        let url = serve_once("503 Service Unavailable", "{}").await;
        let client = test_client();
        let err = fetch_ended_auctions(&client, &url).await.unwrap_err();
        match err {
            RequestError::Status { status, .. } => assert_eq!(status.as_u16(), 503),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let client = test_client();
        let err = fetch_ended_auctions(&client, &format!("http://{addr}/"))
            .await
            .unwrap_err();
        assert!(matches!(err, RequestError::Transport(_)));
    }
}
