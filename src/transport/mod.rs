//! Streaming transport abstraction for incremental byte delivery.
//!
//! A [`StreamTransport`] issues one HTTP GET at a time and delivers the
//! response as a sequence of [`StreamEvent`]s to a single listener. The
//! listener is represented by an [`EventStream`] handle: holding the
//! handle is the registration, dropping it is the unregistration. At most
//! one handle may be outstanding per transport, mirroring host streaming
//! APIs where registering a second observer before clearing the first is
//! undefined behavior.

mod http;

pub use http::HttpTransport;

use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Errors reported by a streaming transport.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A listener is already registered for an outstanding request.
    #[error("transport is busy with an outstanding request")]
    Busy,

    /// Network-level failure (DNS, connection refused, TLS, mid-body drop).
    #[error("network error fetching {url}: {message}")]
    Network {
        /// The URL that failed.
        url: String,
        /// Host-reported failure description.
        message: String,
    },

    /// HTTP error response (4xx client errors, 5xx server errors).
    #[error("HTTP {status} fetching {url}")]
    HttpStatus {
        /// The URL that returned an error status.
        url: String,
        /// The HTTP status code.
        status: u16,
    },

    /// The provided URL is malformed or invalid.
    #[error("invalid URL: {url}")]
    InvalidUrl {
        /// The invalid URL string.
        url: String,
    },

    /// The event sequence violated the transport contract.
    #[error("transport protocol violation: {message}")]
    Protocol {
        /// What the transport did out of order.
        message: String,
    },
}

impl TransportError {
    /// Creates a network error with a host-reported message.
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates an HTTP status error.
    pub fn http_status(url: impl Into<String>, status: u16) -> Self {
        Self::HttpStatus {
            url: url.into(),
            status,
        }
    }

    /// Creates an invalid URL error.
    pub fn invalid_url(url: impl Into<String>) -> Self {
        Self::InvalidUrl { url: url.into() }
    }

    /// Creates a protocol violation error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

/// Lifecycle events delivered for one outstanding request, in order:
/// `ResponseStarted`, zero or more `DataReceived`, then exactly one of
/// `DataCompleted` or `Error`.
#[derive(Debug)]
pub enum StreamEvent {
    /// Response headers arrived; `content_length` is 0 when unknown.
    ResponseStarted {
        /// The URL the response belongs to.
        url: String,
        /// Declared body length in bytes, 0 when the server did not say.
        content_length: u64,
    },
    /// One body chunk, delivered in arrival order.
    DataReceived(Vec<u8>),
    /// The body was delivered completely.
    DataCompleted,
    /// The request failed; no further events follow.
    Error(TransportError),
}

/// Receiving side of one request's event sequence.
///
/// Dropping the stream unregisters the listener and releases the
/// transport for the next request.
#[derive(Debug)]
pub struct EventStream {
    rx: mpsc::Receiver<StreamEvent>,
    _registration: Option<ListenerRegistration>,
}

impl EventStream {
    /// Wraps a plain channel receiver, without a transport registration.
    ///
    /// Intended for transports (and test doubles) that manage listener
    /// bookkeeping themselves.
    #[must_use]
    pub fn from_receiver(rx: mpsc::Receiver<StreamEvent>) -> Self {
        Self {
            rx,
            _registration: None,
        }
    }

    pub(crate) fn with_registration(
        rx: mpsc::Receiver<StreamEvent>,
        registration: ListenerRegistration,
    ) -> Self {
        Self {
            rx,
            _registration: Some(registration),
        }
    }

    /// Receives the next event, or `None` if the transport went away
    /// without delivering a terminal event.
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }
}

/// Ties an [`EventStream`] to the transport's single-listener slot.
///
/// Dropping it aborts the producer task and frees the slot.
#[derive(Debug)]
pub(crate) struct ListenerRegistration {
    in_flight: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

impl ListenerRegistration {
    pub(crate) fn new(in_flight: Arc<AtomicBool>, pump: JoinHandle<()>) -> Self {
        Self { in_flight, pump }
    }
}

impl Drop for ListenerRegistration {
    fn drop(&mut self) {
        self.pump.abort();
        self.in_flight.store(false, Ordering::SeqCst);
    }
}

/// Host capability that performs network fetches and streams bytes back.
///
/// Requests are always HTTP GET. Implementations must deliver events for
/// one request to exactly one [`EventStream`] and must refuse a second
/// concurrent request with [`TransportError::Busy`].
///
/// This trait uses `async_trait` to support dynamic dispatch via
/// `Arc<dyn StreamTransport>`; Rust 2024 native async traits are not
/// object-safe.
#[async_trait]
pub trait StreamTransport: Send + Sync {
    /// Issues a GET request and returns the event stream for it.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Busy`] when a listener is already
    /// registered, or [`TransportError::InvalidUrl`] for malformed URLs.
    async fn issue_request(&self, url: &str) -> Result<EventStream, TransportError>;

    /// Whether the transport can accept a request right now.
    fn is_available(&self) -> bool {
        true
    }
}
