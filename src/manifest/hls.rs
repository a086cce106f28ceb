//! HLS media playlist adapter.
//!
//! Wraps the `hls_m3u8` crate and converts a parsed media playlist into
//! ordered [`SegmentDescriptor`]s. Master playlists are out of scope:
//! variant selection happens before this pipeline is handed a URL, so
//! the input here is always a media playlist.

use hls_m3u8::MediaPlaylist;
use tracing::debug;

use super::{ManifestParser, ParseError, SegmentDescriptor};

/// Parser for HLS (`.m3u8`) media playlists.
///
/// Segment URIs are kept exactly as written (relative or absolute) and
/// resolved at fetch time. Plain M3U8 carries no per-segment byte sizes,
/// so `expected_bytes` is 0 and progress totals fall back to bytes
/// received so far.
#[derive(Debug, Default, Clone, Copy)]
pub struct HlsManifestParser;

impl HlsManifestParser {
    /// Creates the parser.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl ManifestParser for HlsManifestParser {
    fn parse(
        &self,
        manifest: &[u8],
        base_url: &str,
    ) -> Result<Vec<SegmentDescriptor>, ParseError> {
        let input = std::str::from_utf8(manifest)
            .map_err(|e| ParseError::invalid_encoding(e.to_string()))?;
        let playlist = MediaPlaylist::try_from(input)
            .map_err(|e| ParseError::syntax(e.to_string()))?
            .into_owned();

        let segments: Vec<SegmentDescriptor> = playlist
            .segments
            .iter()
            .map(|(_, segment)| SegmentDescriptor::new(segment.uri().to_string(), 0))
            .collect();

        debug!(
            base_url,
            segment_count = segments.len(),
            "parsed HLS media playlist"
        );
        Ok(segments)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const BASE_URL: &str = "http://example.com/hls/media.m3u8";

    fn playlist(segments: &[&str]) -> String {
        let mut text = String::from("#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n");
        for uri in segments {
            text.push_str("#EXTINF:9.0,\n");
            text.push_str(uri);
            text.push('\n');
        }
        text.push_str("#EXT-X-ENDLIST\n");
        text
    }

    #[test]
    fn test_parse_preserves_playback_order() {
        let text = playlist(&["seg-000.ts", "seg-001.ts", "seg-002.ts"]);
        let parser = HlsManifestParser::new();
        let segments = parser.parse(text.as_bytes(), BASE_URL).unwrap();

        let uris: Vec<&str> = segments.iter().map(|s| s.url.as_str()).collect();
        assert_eq!(uris, vec!["seg-000.ts", "seg-001.ts", "seg-002.ts"]);
    }

    #[test]
    fn test_parse_keeps_uris_as_written() {
        let text = playlist(&["v0/seg-000.ts", "http://cdn.example.net/seg-001.ts"]);
        let parser = HlsManifestParser::new();
        let segments = parser.parse(text.as_bytes(), BASE_URL).unwrap();

        assert_eq!(segments[0].url, "v0/seg-000.ts");
        assert_eq!(segments[1].url, "http://cdn.example.net/seg-001.ts");
    }

    #[test]
    fn test_parse_reports_zero_byte_estimates() {
        let text = playlist(&["seg-000.ts"]);
        let parser = HlsManifestParser::new();
        let segments = parser.parse(text.as_bytes(), BASE_URL).unwrap();
        assert_eq!(segments[0].expected_bytes, 0);
    }

    #[test]
    fn test_parse_rejects_invalid_utf8() {
        let parser = HlsManifestParser::new();
        let result = parser.parse(&[0xff, 0xfe, 0xfd], BASE_URL);
        assert!(matches!(result, Err(ParseError::InvalidEncoding { .. })));
    }

    #[test]
    fn test_parse_rejects_non_playlist_text() {
        let parser = HlsManifestParser::new();
        let result = parser.parse(b"<html>not a playlist</html>", BASE_URL);
        assert!(matches!(result, Err(ParseError::Syntax { .. })));
    }
}
