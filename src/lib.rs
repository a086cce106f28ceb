//! Playlist Downloader Core Library
//!
//! This library implements a stateful, multi-step, asynchronous fetch
//! pipeline: given a media item that is either a single file or an HLS
//! media playlist referencing many segments, it fetches all required
//! bytes through a streaming transport, assembles them into a local
//! file in playback order, and reports aggregate progress and
//! completion to a caller-supplied delegate.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//! - [`transport`] - Streaming transport abstraction and reqwest-backed implementation
//! - [`manifest`] - Segment descriptors and manifest parsing (HLS adapter)
//! - [`queue`] - Ordered single-consumer segment work queue
//! - [`download`] - File sink, error taxonomy, and the download orchestrator

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod download;
pub mod manifest;
pub mod queue;
pub mod transport;

// Re-export commonly used types
pub use download::{
    DownloadDelegate, DownloadError, DownloadOrchestrator, DownloadRequest, FileSink,
    SessionHandle, SessionState,
};
pub use manifest::{HlsManifestParser, ManifestParser, ParseError, SegmentDescriptor};
pub use queue::SegmentQueue;
pub use transport::{EventStream, HttpTransport, StreamEvent, StreamTransport, TransportError};
