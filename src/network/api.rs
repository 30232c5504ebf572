//! REST Snapshots
//!
//! Authoritative full-grid and leaderboard snapshots over HTTP.

use std::future::Future;
use std::time::Duration;
use serde::{Serialize, Deserialize};
use serde::de::DeserializeOwned;

use crate::grid::{Color, Coord, GridBounds, GridError};

/// One claimed cell as returned by `GET /api/blocks/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockRecord {
    /// Column.
    pub x: i64,
    /// Row.
    pub y: i64,
    /// Current color.
    pub color: Color,
    /// Last painter, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_name: Option<String>,
}

impl BlockRecord {
    /// Validated coordinate.
    pub fn coord(&self, bounds: GridBounds) -> Result<Coord, GridError> {
        bounds.checked(self.x, self.y)
    }
}

/// One leaderboard row as returned by `GET /api/leaderboard/`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderboardEntry {
    /// Participant label.
    pub owner_name: String,
    /// Tiles currently owned.
    pub count: u32,
}

/// Fetch errors.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// Request failed (connect, timeout, bad status).
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Body was not the expected JSON.
    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    /// Anything else (used by non-HTTP backends).
    #[error("{0}")]
    Other(String),
}

/// Source of authoritative snapshots.
pub trait GridApi: Send + Sync + 'static {
    /// Every claimed cell.
    fn fetch_blocks(&self) -> impl Future<Output = Result<Vec<BlockRecord>, FetchError>> + Send;

    /// Ranking, pre-sorted descending by count.
    fn fetch_leaderboard(&self) -> impl Future<Output = Result<Vec<LeaderboardEntry>, FetchError>> + Send;
}

// =============================================================================
// HTTP CLIENT
// =============================================================================

/// [`GridApi`] over HTTP with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpApi {
    client: reqwest::Client,
    blocks_url: String,
    leaderboard_url: String,
}

impl HttpApi {
    /// Create a client for the given endpoints.
    pub fn new(
        blocks_url: impl Into<String>,
        leaderboard_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("colorgrid-sync/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            blocks_url: blocks_url.into(),
            leaderboard_url: leaderboard_url.into(),
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

impl GridApi for HttpApi {
    async fn fetch_blocks(&self) -> Result<Vec<BlockRecord>, FetchError> {
        self.get_json(&self.blocks_url).await
    }

    async fn fetch_leaderboard(&self) -> Result<Vec<LeaderboardEntry>, FetchError> {
        self.get_json(&self.leaderboard_url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one HTTP response with `body` and return the request line.
    async fn serve_once(body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = stream.read(&mut buf).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).await.unwrap();
            request.lines().next().unwrap_or_default().to_string()
        });

        (base, handle)
    }

    #[test]
    fn test_block_record_decoding() {
        let records: Vec<BlockRecord> = serde_json::from_str(
            r##"[{"x":3,"y":4,"color":"#3498db","owner_name":"Alice"},{"x":0,"y":0,"color":"#fff"}]"##,
        ).unwrap();

        assert_eq!(records.len(), 2);
        assert_eq!(records[0].coord(GridBounds::default()).unwrap(), Coord::new(3, 4));
        assert_eq!(records[0].owner_name.as_deref(), Some("Alice"));
        assert_eq!(records[1].owner_name, None);
    }

    #[test]
    fn test_leaderboard_decoding_keeps_order() {
        let entries: Vec<LeaderboardEntry> = serde_json::from_str(
            r#"[{"owner_name":"Bob","count":9},{"owner_name":"Alice","count":12}]"#,
        ).unwrap();

        assert_eq!(entries[0].owner_name, "Bob");
        assert_eq!(entries[1].count, 12);
    }

    #[tokio::test]
    async fn test_http_fetch_blocks() {
        let (base, server) = serve_once(r##"[{"x":1,"y":2,"color":"#e74c3c"}]"##).await;
        let api = HttpApi::new(
            format!("{}/api/blocks/", base),
            format!("{}/api/leaderboard/", base),
            Duration::from_secs(5),
        ).unwrap();

        let blocks = api.fetch_blocks().await.unwrap();
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].color, Color::new("#e74c3c"));

        let request_line = server.await.unwrap();
        assert_eq!(request_line, "GET /api/blocks/ HTTP/1.1");
    }

    #[tokio::test]
    async fn test_http_fetch_rejects_bad_body() {
        let (base, server) = serve_once(r#"{"detail":"nope"}"#).await;
        let api = HttpApi::new(
            format!("{}/api/blocks/", base),
            format!("{}/api/leaderboard/", base),
            Duration::from_secs(5),
        ).unwrap();

        let result = api.fetch_leaderboard().await;
        assert!(matches!(result, Err(FetchError::Decode(_))));
        server.await.unwrap();
    }
}
