//! CLI argument definitions using clap derive macros.

use std::path::PathBuf;

use clap::Parser;

/// Download a media file or an HLS media playlist to a local file.
///
/// In manifest mode the playlist is fetched first, its segments are then
/// downloaded one at a time in playback order and concatenated into the
/// output file.
#[derive(Parser, Debug)]
#[command(name = "playlist-dl")]
#[command(author, version, about)]
pub struct Args {
    /// URL of the media file, or of the playlist with --manifest
    pub url: String,

    /// Output file path
    #[arg(short, long)]
    pub output: PathBuf,

    /// Treat the URL as an HLS media playlist enumerating segments
    #[arg(short, long)]
    pub manifest: bool,

    /// Emit progress as JSON lines on stdout instead of a progress bar
    #[arg(long)]
    pub json: bool,

    /// Increase output verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(short, long)]
    pub quiet: bool,
}
