//! Fetch-assemble-report pipeline for streaming downloads.
//!
//! This module owns the session state machine: one
//! [`DownloadOrchestrator`] drives a [`crate::transport::StreamTransport`]
//! one request at a time, appends received bytes to a [`FileSink`] in
//! arrival order, and reports aggregate progress through a
//! [`DownloadDelegate`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use playlist_core::download::{DownloadOrchestrator, DownloadRequest, DownloadDelegate};
//! use playlist_core::manifest::HlsManifestParser;
//! use playlist_core::transport::HttpTransport;
//!
//! struct Quiet;
//! impl DownloadDelegate for Quiet {}
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let orchestrator = DownloadOrchestrator::new(
//!     Arc::new(HttpTransport::new()),
//!     Arc::new(HlsManifestParser::new()),
//! );
//! let handle = orchestrator.start(
//!     DownloadRequest::manifest("http://example.com/hls/media.m3u8", "./media.mp4"),
//!     Arc::new(Quiet),
//! )?;
//! # Ok(())
//! # }
//! ```

mod error;
mod orchestrator;
mod sink;

pub use error::DownloadError;
pub use orchestrator::{
    DownloadDelegate, DownloadOrchestrator, DownloadRequest, SessionHandle, SessionState,
};
pub use sink::FileSink;
