//! Progress delegates for the CLI (progress bar, JSON lines, silent).

use std::path::Path;
use std::sync::Mutex;

use indicatif::{ProgressBar, ProgressStyle};
use playlist_core::{DownloadDelegate, DownloadError};
use serde::Serialize;

/// Byte progress bar rendered from delegate callbacks.
///
/// The bar is created on `on_started` because the session total is not
/// known before that. Unknown totals (0) render as a spinner with a byte
/// counter.
pub(crate) struct ProgressBarDelegate {
    bar: Mutex<Option<ProgressBar>>,
}

impl ProgressBarDelegate {
    pub(crate) fn new() -> Self {
        Self {
            bar: Mutex::new(None),
        }
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        let guard = self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        if let Some(bar) = guard.as_ref() {
            f(bar);
        }
    }
}

impl DownloadDelegate for ProgressBarDelegate {
    fn on_started(&self, _url: &str, total_bytes: u64) {
        let bar = if total_bytes > 0 {
            ProgressBar::new(total_bytes).with_style(
                ProgressStyle::with_template(
                    "{bar:40} {bytes}/{total_bytes} ({bytes_per_sec}, {eta})",
                )
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::new_spinner().with_style(
                ProgressStyle::with_template("{spinner} {bytes} ({bytes_per_sec})")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            )
        };
        *self
            .bar
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = Some(bar);
    }

    fn on_progress(&self, total_bytes: u64, received_so_far: u64) {
        self.with_bar(|bar| {
            if total_bytes > 0 {
                bar.set_length(total_bytes);
            }
            bar.set_position(received_so_far);
        });
    }

    fn on_completed(&self, _final_path: &Path) {
        self.with_bar(ProgressBar::finish_and_clear);
    }

    fn on_failed(&self, _error: &DownloadError) {
        self.with_bar(ProgressBar::abandon);
    }
}

/// Machine-readable progress: one JSON object per callback on stdout.
#[derive(Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
enum ProgressEvent<'a> {
    Started {
        url: &'a str,
        total_bytes: u64,
    },
    Progress {
        total_bytes: u64,
        received_bytes: u64,
    },
    Completed {
        path: &'a Path,
    },
    Failed {
        code: &'a str,
        message: String,
    },
}

pub(crate) struct JsonDelegate;

impl JsonDelegate {
    fn emit(event: &ProgressEvent<'_>) {
        if let Ok(line) = serde_json::to_string(event) {
            println!("{line}");
        }
    }
}

impl DownloadDelegate for JsonDelegate {
    fn on_started(&self, url: &str, total_bytes: u64) {
        Self::emit(&ProgressEvent::Started { url, total_bytes });
    }

    fn on_progress(&self, total_bytes: u64, received_so_far: u64) {
        Self::emit(&ProgressEvent::Progress {
            total_bytes,
            received_bytes: received_so_far,
        });
    }

    fn on_completed(&self, final_path: &Path) {
        Self::emit(&ProgressEvent::Completed { path: final_path });
    }

    fn on_failed(&self, error: &DownloadError) {
        Self::emit(&ProgressEvent::Failed {
            code: error.code(),
            message: error.to_string(),
        });
    }
}

/// No-op delegate for `--quiet` runs; the exit code carries the outcome.
pub(crate) struct SilentDelegate;

impl DownloadDelegate for SilentDelegate {}
