//! Callq Client Implementation

use crate::error::{Result, SdkError};
use crate::sse::SseDecoder;
use crate::types::{
    ErrorBody, HealthResponse, JoinResponse, PositionResponse, QueueRequest, Summary, SummaryEvent,
};
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::{Client, Response, Url};
use serde::de::DeserializeOwned;
use std::collections::VecDeque;
use std::time::Duration;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const NOT_IN_QUEUE: &str = "NOT_IN_QUEUE";

/// Callq Service Client
///
/// # Example
///
/// ```no_run
/// use callq_sdk::QueueClient;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = QueueClient::new("http://127.0.0.1:8000")?;
/// client.join("555-1111", "Sales").await?;
/// client.leave("555-1111", "Sales").await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct QueueClient {
    client: Client,
    base: Url,
}

impl QueueClient {
    /// Create a client for a service base URL (e.g. `http://127.0.0.1:8000`)
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let base_url = base_url.as_ref();
        let base = Url::parse(base_url)
            .map_err(|e| SdkError::InvalidUrl(format!("{}: {}", base_url, e)))?;
        if !matches!(base.scheme(), "http" | "https") {
            return Err(SdkError::InvalidUrl(format!(
                "{}: expected http or https",
                base_url
            )));
        }

        // No overall timeout here: it would cut the summary stream
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .build()
            .map_err(|e| SdkError::Connection(format!("Failed to create client: {}", e)))?;

        Ok(Self { client, base })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Join a queue; returns the assigned position
    pub async fn join(&self, phone_number: &str, queue_name: &str) -> Result<JoinResponse> {
        let resp = self
            .client
            .post(self.endpoint(&["queue", "increment"])?)
            .timeout(REQUEST_TIMEOUT)
            .json(&QueueRequest {
                phone_number,
                queue_name,
            })
            .send()
            .await?;

        parse_json(resp).await
    }

    /// Leave a queue
    pub async fn leave(&self, phone_number: &str, queue_name: &str) -> Result<()> {
        let resp = self
            .client
            .post(self.endpoint(&["queue", "decrement"])?)
            .timeout(REQUEST_TIMEOUT)
            .json(&QueueRequest {
                phone_number,
                queue_name,
            })
            .send()
            .await?;

        let _: serde_json::Value = parse_json(resp).await?;
        Ok(())
    }

    /// Current position, `None` if the caller is not queued
    pub async fn position(&self, phone_number: &str, queue_name: &str) -> Result<Option<i64>> {
        let resp = self
            .client
            .get(self.endpoint(&["queue", queue_name, phone_number])?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        match parse_json::<PositionResponse>(resp).await {
            Ok(body) => Ok(Some(body.position)),
            Err(e) if e.code() == Some(NOT_IN_QUEUE) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Last snapshot computed by the service
    pub async fn summary(&self) -> Result<Summary> {
        let resp = self
            .client
            .get(self.endpoint(&["queues", "summary"])?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        parse_json(resp).await
    }

    pub async fn health(&self) -> Result<HealthResponse> {
        let resp = self
            .client
            .get(self.endpoint(&["health"])?)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;

        parse_json(resp).await
    }

    /// Open the live summary feed
    pub async fn watch_summary(&self) -> Result<SummaryStream> {
        let resp = self
            .client
            .get(self.endpoint(&["stream", "queues", "summary"])?)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await?;

        if !resp.status().is_success() {
            return Err(api_error(resp).await);
        }

        let body = resp
            .bytes_stream()
            .map(|chunk| chunk.map(|bytes| bytes.to_vec()))
            .boxed();

        Ok(SummaryStream {
            body,
            decoder: SseDecoder::default(),
            ready: VecDeque::new(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| SdkError::InvalidUrl(format!("{} cannot be a base", self.base)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }
}

/// Live summary feed. Ends (`None`) when the server closes the stream.
pub struct SummaryStream {
    body: BoxStream<'static, reqwest::Result<Vec<u8>>>,
    decoder: SseDecoder,
    ready: VecDeque<String>,
}

impl SummaryStream {
    pub async fn next_event(&mut self) -> Option<Result<SummaryEvent>> {
        loop {
            if let Some(data) = self.ready.pop_front() {
                return Some(serde_json::from_str(&data).map_err(SdkError::from));
            }

            match self.body.next().await? {
                Ok(chunk) => self.ready.extend(self.decoder.push(&chunk)),
                Err(e) => return Some(Err(e.into())),
            }
        }
    }
}

async fn parse_json<T: DeserializeOwned>(resp: Response) -> Result<T> {
    if !resp.status().is_success() {
        return Err(api_error(resp).await);
    }
    Ok(resp.json().await?)
}

async fn api_error(resp: Response) -> SdkError {
    let status = resp.status();
    let text = resp.text().await.unwrap_or_default();

    match serde_json::from_str::<ErrorBody>(&text) {
        Ok(body) => SdkError::Api {
            status: status.as_u16(),
            code: body.error.code,
            message: body.error.message,
        },
        Err(_) => SdkError::Api {
            status: status.as_u16(),
            code: status
                .canonical_reason()
                .unwrap_or("UNKNOWN")
                .to_uppercase()
                .replace(' ', "_"),
            message: text,
        },
    }
}
