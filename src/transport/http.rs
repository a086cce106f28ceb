//! reqwest-backed [`StreamTransport`] implementation.
//!
//! Streams response bodies chunk by chunk into the event channel so large
//! media files never sit in memory whole. Enforces the single-listener
//! rule: a second `issue_request` while one [`EventStream`] is alive
//! fails with [`TransportError::Busy`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tracing::{debug, instrument, trace};
use url::Url;

use super::{EventStream, ListenerRegistration, StreamEvent, StreamTransport, TransportError};

/// Default HTTP connect timeout (30 seconds).
pub const CONNECT_TIMEOUT_SECS: u64 = 30;

/// Default overall request timeout (5 minutes for large media files).
pub const READ_TIMEOUT_SECS: u64 = 300;

/// Depth of the event channel between the response pump and the consumer.
/// Bounded so a slow disk applies backpressure to the network read.
const EVENT_CHANNEL_CAPACITY: usize = 32;

/// User-Agent sent with every request.
const USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

/// HTTP streaming transport with connection pooling.
///
/// Create once and reuse across sessions; only one request may be
/// outstanding at a time.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    in_flight: Arc<AtomicBool>,
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpTransport {
    /// Creates a transport with default timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the static
    /// configuration. This should never happen in practice.
    #[must_use]
    pub fn new() -> Self {
        Self::new_with_timeouts(CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS)
    }

    /// Creates a transport with explicit timeout values.
    ///
    /// # Panics
    ///
    /// Panics if the HTTP client builder fails to build with the supplied
    /// timeout configuration.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn new_with_timeouts(connect_timeout_secs: u64, read_timeout_secs: u64) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .timeout(Duration::from_secs(read_timeout_secs))
            .gzip(true)
            .user_agent(USER_AGENT)
            .build()
            .expect("failed to build HTTP client with static configuration");
        Self {
            client,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait]
impl StreamTransport for HttpTransport {
    #[instrument(level = "debug", skip(self))]
    async fn issue_request(&self, url: &str) -> Result<EventStream, TransportError> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(TransportError::Busy);
        }

        if Url::parse(url).is_err() {
            self.in_flight.store(false, Ordering::SeqCst);
            return Err(TransportError::invalid_url(url));
        }

        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let client = self.client.clone();
        let url = url.to_string();
        debug!(%url, "issuing streaming request");
        let pump = tokio::spawn(pump_response(client, url, tx));

        Ok(EventStream::with_registration(
            rx,
            ListenerRegistration::new(Arc::clone(&self.in_flight), pump),
        ))
    }

    fn is_available(&self) -> bool {
        !self.in_flight.load(Ordering::SeqCst)
    }
}

/// Drives one response, translating it into [`StreamEvent`]s.
///
/// Every send is an abort point: when the listener drops its
/// [`EventStream`], this task is aborted and the connection torn down.
async fn pump_response(client: Client, url: String, tx: mpsc::Sender<StreamEvent>) {
    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            let _ = tx
                .send(StreamEvent::Error(TransportError::network(
                    &url,
                    e.to_string(),
                )))
                .await;
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let _ = tx
            .send(StreamEvent::Error(TransportError::http_status(
                &url,
                status.as_u16(),
            )))
            .await;
        return;
    }

    let content_length = response.content_length().unwrap_or(0);
    if tx
        .send(StreamEvent::ResponseStarted {
            url: url.clone(),
            content_length,
        })
        .await
        .is_err()
    {
        return; // listener unregistered
    }

    let mut stream = response.bytes_stream();
    while let Some(chunk_result) = stream.next().await {
        match chunk_result {
            Ok(chunk) => {
                trace!(bytes = chunk.len(), "received chunk");
                if tx
                    .send(StreamEvent::DataReceived(chunk.to_vec()))
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                let _ = tx
                    .send(StreamEvent::Error(TransportError::network(
                        &url,
                        e.to_string(),
                    )))
                    .await;
                return;
            }
        }
    }

    let _ = tx.send(StreamEvent::DataCompleted).await;
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn collect_events(mut stream: EventStream) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = stream.next_event().await {
            let terminal = matches!(
                event,
                StreamEvent::DataCompleted | StreamEvent::Error(_)
            );
            events.push(event);
            if terminal {
                break;
            }
        }
        events
    }

    #[tokio::test]
    async fn test_success_delivers_started_chunks_completed_in_order() {
        let body = b"0123456789abcdef".to_vec();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/media.mp4"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(body.clone()))
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let url = format!("{}/media.mp4", server.uri());
        let stream = transport.issue_request(&url).await.unwrap();
        let events = collect_events(stream).await;

        assert!(matches!(
            &events[0],
            StreamEvent::ResponseStarted { url: started, content_length }
                if *started == url && *content_length == body.len() as u64
        ));
        assert!(matches!(events.last(), Some(StreamEvent::DataCompleted)));

        let mut received = Vec::new();
        for event in &events {
            if let StreamEvent::DataReceived(chunk) = event {
                received.extend_from_slice(chunk);
            }
        }
        assert_eq!(received, body, "chunks must concatenate to the body");
    }

    #[tokio::test]
    async fn test_http_error_status_becomes_error_event() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/missing.ts"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let url = format!("{}/missing.ts", server.uri());
        let stream = transport.issue_request(&url).await.unwrap();
        let events = collect_events(stream).await;

        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            StreamEvent::Error(TransportError::HttpStatus { status: 404, .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_url_rejected_synchronously_and_slot_released() {
        let transport = HttpTransport::new();
        let result = transport.issue_request("not a url").await;
        assert!(matches!(result, Err(TransportError::InvalidUrl { .. })));
        assert!(
            transport.is_available(),
            "failed validation must not leak the listener slot"
        );
    }

    #[tokio::test]
    async fn test_second_request_while_stream_alive_is_busy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"aa".to_vec()))
            .mount(&server)
            .await;

        let transport = HttpTransport::new();
        let url = format!("{}/a", server.uri());
        let stream = transport.issue_request(&url).await.unwrap();
        assert!(!transport.is_available());

        let second = transport.issue_request(&url).await;
        assert!(matches!(second, Err(TransportError::Busy)));

        drop(stream);
        assert!(
            transport.is_available(),
            "dropping the stream unregisters the listener"
        );
    }
}
