//! reqwest-backed source fetcher

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, RANGE};

use super::{SourceError, SourceFetcher, SourceMetadata};
use crate::upload::ByteRange;

/// Fetches source files over HTTP(S)
#[derive(Clone)]
pub struct HttpSource {
    client: reqwest::Client,
}

impl HttpSource {
    pub fn new(timeout: Duration) -> Result<Self, SourceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Transport(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

fn status_error(response: &reqwest::Response) -> SourceError {
    let status = response.status();
    SourceError::Status {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or_default().to_string(),
    }
}

#[async_trait]
impl SourceFetcher for HttpSource {
    async fn probe(&self, url: &str) -> Result<SourceMetadata, SourceError> {
        let response = self
            .client
            .head(url)
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(&response));
        }

        // Read the header directly: a HEAD response has no body to size.
        let headers = response.headers();
        let content_length = headers
            .get(CONTENT_LENGTH)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());
        let content_type = headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|v| v.to_string());

        Ok(SourceMetadata {
            content_length,
            content_type,
        })
    }

    async fn fetch_range(&self, url: &str, range: ByteRange) -> Result<Bytes, SourceError> {
        let mut response = self
            .client
            .get(url)
            .header(RANGE, range.header_value())
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(status_error(&response));
        }

        let expected = range.len();
        let mismatch = |actual| SourceError::LengthMismatch { expected, actual };

        // A source ignoring `Range` answers with the whole file; refuse it
        // before reading anything.
        if let Some(declared) = response.content_length() {
            if declared != expected {
                return Err(mismatch(declared));
            }
        }

        let mut body = Vec::with_capacity(expected as usize);
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| SourceError::Transport(format!("Failed to read body: {}", e)))?
        {
            body.extend_from_slice(&chunk);
            if body.len() as u64 > expected {
                return Err(mismatch(body.len() as u64));
            }
        }

        if body.len() as u64 != expected {
            return Err(mismatch(body.len() as u64));
        }

        Ok(Bytes::from(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, HeaderMap, StatusCode};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::Router;

    const BODY_LEN: usize = 3000;

    fn body() -> Vec<u8> {
        (0..BODY_LEN).map(|i| (i % 251) as u8).collect()
    }

    async fn ranged(headers: HeaderMap) -> impl IntoResponse {
        let data = body();
        let range = headers
            .get(header::RANGE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("bytes="))
            .and_then(|v| v.split_once('-'))
            .and_then(|(s, e)| Some((s.parse::<usize>().ok()?, e.parse::<usize>().ok()?)));

        match range {
            Some((start, end)) => (
                StatusCode::PARTIAL_CONTENT,
                data[start..=end.min(BODY_LEN - 1)].to_vec(),
            ),
            None => (StatusCode::OK, data),
        }
    }

    async fn head_only() -> impl IntoResponse {
        (
            [
                (header::CONTENT_LENGTH, BODY_LEN.to_string()),
                (header::CONTENT_TYPE, "video/mp4".to_string()),
            ],
            (),
        )
    }

    async fn ignores_range() -> Vec<u8> {
        body()
    }

    const MIB: usize = 1024 * 1024;

    /// 256 MiB without a declared length
    async fn endless() -> Body {
        let chunks = futures::stream::iter(
            (0..256).map(|_| Ok::<_, std::io::Error>(vec![0u8; MIB])),
        );
        Body::from_stream(chunks)
    }

    async fn spawn_source() -> String {
        let app = Router::new()
            .route("/file", get(ranged).head(head_only))
            .route("/whole", get(ignores_range))
            .route("/stream", get(endless));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}", addr)
    }

    fn source() -> HttpSource {
        HttpSource::new(Duration::from_secs(10)).unwrap()
    }

    #[tokio::test]
    async fn test_probe_reads_declared_headers() {
        let base = spawn_source().await;
        let metadata = source().probe(&format!("{}/file", base)).await.unwrap();

        assert_eq!(metadata.content_length, Some(BODY_LEN as u64));
        assert_eq!(metadata.content_type.as_deref(), Some("video/mp4"));
    }

    #[tokio::test]
    async fn test_probe_error_status() {
        let base = spawn_source().await;
        let result = source().probe(&format!("{}/missing", base)).await;

        match result {
            Err(SourceError::Status { status, .. }) => assert_eq!(status, 404),
            other => panic!("expected status error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_fetch_range() {
        let base = spawn_source().await;
        let range = ByteRange {
            start: 1024,
            end: 2048,
        };

        let data = source()
            .fetch_range(&format!("{}/file", base), range)
            .await
            .unwrap();

        assert_eq!(data.len(), 1024);
        assert_eq!(&data[..], &body()[1024..2048]);
    }

    #[tokio::test]
    async fn test_fetch_range_rejects_wrong_length() {
        let base = spawn_source().await;
        let range = ByteRange { start: 0, end: 1024 };

        let result = source()
            .fetch_range(&format!("{}/whole", base), range)
            .await;

        assert!(matches!(
            result,
            Err(SourceError::LengthMismatch {
                expected: 1024,
                actual: 3000
            })
        ));
    }

    #[tokio::test]
    async fn test_fetch_range_stops_reading_oversized_body() {
        let base = spawn_source().await;
        let range = ByteRange { start: 0, end: 1024 };

        let result = source()
            .fetch_range(&format!("{}/stream", base), range)
            .await;

        match result {
            Err(SourceError::LengthMismatch { expected, actual }) => {
                assert_eq!(expected, 1024);
                assert!(actual > 1024);
                assert!(actual < 16 * MIB as u64);
            }
            other => panic!("expected length mismatch, got {:?}", other),
        }
    }
}
