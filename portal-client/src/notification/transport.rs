//! Push transports
//!
//! A transport opens the order stream and yields decoded SSE frames. The
//! HTTP implementation streams the response body through [`SseDecoder`];
//! tests plug in scripted transports.

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream::BoxStream;
use std::collections::VecDeque;
use thiserror::Error;

use super::sse::{SseDecoder, SseFrame};

pub type EventStream = BoxStream<'static, Result<SseFrame, TransportError>>;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// Server answered with a non-success status
    #[error("Stream rejected with HTTP {status}")]
    Rejected { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Stream closed by server")]
    Closed,
}

#[async_trait]
pub trait PushTransport: Send + Sync {
    /// Open the stream at `url`; resolves once the server accepted it.
    async fn open(&self, url: &str) -> Result<EventStream, TransportError>;
}

/// `text/event-stream` over HTTP
#[derive(Debug, Clone)]
pub struct HttpPushTransport {
    client: reqwest::Client,
}

impl HttpPushTransport {
    /// No overall request timeout: the stream is meant to stay open.
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(10))
            .build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PushTransport for HttpPushTransport {
    async fn open(&self, url: &str) -> Result<EventStream, TransportError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .header(reqwest::header::CACHE_CONTROL, "no-cache")
            .send()
            .await
            .map_err(|e| TransportError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Rejected {
                status: status.as_u16(),
            });
        }

        let state = (
            response.bytes_stream().boxed(),
            SseDecoder::new(),
            VecDeque::new(),
            false,
        );
        let frames = futures::stream::unfold(
            state,
            |(mut body, mut decoder, mut pending, done)| async move {
                loop {
                    if let Some(frame) = pending.pop_front() {
                        return Some((Ok(frame), (body, decoder, pending, done)));
                    }
                    if done {
                        return None;
                    }
                    match body.next().await {
                        Some(Ok(chunk)) => pending.extend(decoder.feed(&chunk)),
                        Some(Err(e)) => {
                            let err = TransportError::Network(e.to_string());
                            return Some((Err(err), (body, decoder, pending, true)));
                        }
                        None => {
                            return Some((Err(TransportError::Closed), (body, decoder, pending, true)));
                        }
                    }
                }
            },
        );
        Ok(frames.boxed())
    }
}
