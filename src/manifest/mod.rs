//! Manifest parsing contracts and segment URL resolution.
//!
//! The pipeline core does not understand manifest syntax; it consumes a
//! [`ManifestParser`] that turns raw manifest bytes into an ordered list
//! of [`SegmentDescriptor`]s. Ordering is significant: segments are
//! media-time-ordered and are appended to the destination file in
//! exactly this order. Byte lengths are estimates used only for progress
//! totals, never for integrity checks.

mod hls;

pub use hls::HlsManifestParser;

use thiserror::Error;
use url::Url;

/// Errors from manifest parsing and segment URL resolution.
#[derive(Debug, Error)]
pub enum ParseError {
    /// The manifest bytes are not valid text.
    #[error("manifest is not valid UTF-8: {message}")]
    InvalidEncoding {
        /// Decoder failure description.
        message: String,
    },

    /// The manifest text does not parse as a playlist.
    #[error("invalid manifest: {message}")]
    Syntax {
        /// Parser failure description.
        message: String,
    },

    /// A segment URL could not be resolved against the manifest base URL.
    #[error("cannot resolve segment URL {uri:?} against {base:?}")]
    UrlResolve {
        /// The manifest base URL.
        base: String,
        /// The segment URL as written in the manifest.
        uri: String,
    },
}

impl ParseError {
    /// Creates an encoding error.
    pub fn invalid_encoding(message: impl Into<String>) -> Self {
        Self::InvalidEncoding {
            message: message.into(),
        }
    }

    /// Creates a syntax error.
    pub fn syntax(message: impl Into<String>) -> Self {
        Self::Syntax {
            message: message.into(),
        }
    }

    /// Creates a URL resolution error.
    pub fn url_resolve(base: impl Into<String>, uri: impl Into<String>) -> Self {
        Self::UrlResolve {
            base: base.into(),
            uri: uri.into(),
        }
    }
}

/// One addressable chunk of media referenced by a manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentDescriptor {
    /// Segment URL exactly as written in the manifest; may be relative
    /// to the manifest URL. Resolved at fetch time.
    pub url: String,
    /// Estimated byte length for progress totals; 0 when unknown.
    pub expected_bytes: u64,
}

impl SegmentDescriptor {
    /// Creates a descriptor.
    #[must_use]
    pub fn new(url: impl Into<String>, expected_bytes: u64) -> Self {
        Self {
            url: url.into(),
            expected_bytes,
        }
    }
}

/// Turns raw manifest bytes into media-playback-ordered segments.
///
/// `base_url` is the URL the manifest was fetched from; implementations
/// may use it to absolutize segment URLs, or leave them relative for the
/// caller to resolve with [`resolve_segment_url`].
pub trait ManifestParser: Send + Sync {
    /// Parses the manifest.
    ///
    /// # Errors
    ///
    /// Returns [`ParseError`] when the bytes are not a well-formed
    /// manifest. A manifest with zero segments is valid.
    fn parse(&self, manifest: &[u8], base_url: &str)
    -> Result<Vec<SegmentDescriptor>, ParseError>;
}

/// Resolves a relative-or-absolute segment URL against the manifest URL.
///
/// Absolute candidates pass through unchanged; relative ones are joined
/// RFC 3986 style, so `seg/001.ts` against `http://h/p/media.m3u8`
/// yields `http://h/p/seg/001.ts`.
///
/// # Errors
///
/// Returns [`ParseError::UrlResolve`] when either URL is malformed.
pub fn resolve_segment_url(base_url: &str, candidate: &str) -> Result<String, ParseError> {
    let base = Url::parse(base_url).map_err(|_| ParseError::url_resolve(base_url, candidate))?;
    let resolved = base
        .join(candidate)
        .map_err(|_| ParseError::url_resolve(base_url, candidate))?;
    Ok(resolved.into())
}
