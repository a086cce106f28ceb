//! Download orchestrator: the session state machine.
//!
//! Drives one streaming fetch at a time, feeds bytes to a [`FileSink`],
//! advances the segment queue, aggregates byte counts across the whole
//! session, and invokes the caller's delegate callbacks. One logical
//! stream of control per session: segment N+1 is never requested before
//! segment N's completion event has been observed, so bytes land in the
//! destination file in playback order with no reassembly buffer.
//!
//! The original event-driven continuation chain (each completion callback
//! issuing the next fetch) is flattened here into an explicit dispatcher
//! loop advanced by transport events, so long segment queues cost no call
//! stack.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, instrument, warn};

use super::error::DownloadError;
use super::sink::FileSink;
use crate::manifest::{ManifestParser, resolve_segment_url};
use crate::queue::SegmentQueue;
use crate::transport::{EventStream, StreamEvent, StreamTransport, TransportError};

/// Immutable description of one download.
#[derive(Debug, Clone)]
pub struct DownloadRequest {
    /// URL of the media file, or of the manifest when `is_manifest` is set.
    pub target_url: String,
    /// Whether `target_url` points at a manifest enumerating segments.
    pub is_manifest: bool,
    /// Where the assembled media bytes go.
    pub destination_path: PathBuf,
}

impl DownloadRequest {
    /// Request for a plain single-file download.
    #[must_use]
    pub fn single_file(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            target_url: url.into(),
            is_manifest: false,
            destination_path: destination.into(),
        }
    }

    /// Request for a manifest-driven multi-segment download.
    #[must_use]
    pub fn manifest(url: impl Into<String>, destination: impl Into<PathBuf>) -> Self {
        Self {
            target_url: url.into(),
            is_manifest: true,
            destination_path: destination.into(),
        }
    }
}

/// Caller-visible session lifecycle callbacks.
///
/// Invocation order per session: `on_started` once, then zero or more
/// `on_progress` with monotonically non-decreasing received counts, then
/// exactly one of `on_completed` or `on_failed`, after which no further
/// callbacks are delivered. All methods default to no-ops so delegates
/// implement only what they need.
pub trait DownloadDelegate: Send + Sync {
    /// The session knows its total and has begun writing output.
    fn on_started(&self, _url: &str, _total_bytes: u64) {}
    /// A chunk was appended; counts are session-wide, never per segment.
    fn on_progress(&self, _total_bytes: u64, _received_so_far: u64) {}
    /// Terminal: all bytes are in `final_path`.
    fn on_completed(&self, _final_path: &Path) {}
    /// Terminal: the session failed; partial output is left in place.
    fn on_failed(&self, _error: &DownloadError) {}
}

/// Session lifecycle states; transitions are strictly forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    /// Created, nothing fetched yet.
    Idle,
    /// Fetching the manifest body into the scratch file.
    FetchingManifest,
    /// Streaming media bytes (single file, or the current segment).
    DownloadingSegment,
    /// Terminal success.
    Completed,
    /// Terminal failure (including cancellation).
    Failed,
}

/// Mutable per-session state, owned exclusively by the driver task.
///
/// Byte counters live here rather than in any shared place, so
/// concurrent sessions can never interfere with each other's totals.
#[derive(Debug)]
struct DownloadSession {
    request: DownloadRequest,
    total_expected: u64,
    received: u64,
    pending: SegmentQueue,
    state: SessionState,
}

impl DownloadSession {
    fn new(request: DownloadRequest) -> Self {
        Self {
            request,
            total_expected: 0,
            received: 0,
            pending: SegmentQueue::new(),
            state: SessionState::Idle,
        }
    }

    fn advance(&mut self, next: SessionState) {
        debug_assert!(
            next >= self.state,
            "session state may only move forward: {:?} -> {next:?}",
            self.state
        );
        self.state = next;
    }

    fn record_received(&mut self, bytes: u64) {
        self.received += bytes;
    }

    /// Total reported to the delegate. Manifest byte lengths are
    /// estimates, so the total is ratcheted up to the received count to
    /// keep `received <= total` when an estimate undershoots.
    fn reported_total(&self) -> u64 {
        self.total_expected.max(self.received)
    }
}

/// Handle to one in-progress session.
///
/// Dropping the handle does not cancel the session; cancellation is an
/// explicit [`DownloadOrchestrator::cancel`] call.
#[derive(Debug)]
pub struct SessionHandle {
    id: u64,
    destination: PathBuf,
    cancel_tx: mpsc::Sender<()>,
    outcome_rx: oneshot::Receiver<Result<PathBuf, DownloadError>>,
}

impl SessionHandle {
    /// Unique id of this session.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Destination path the session writes to.
    #[must_use]
    pub fn destination(&self) -> &Path {
        &self.destination
    }

    /// Waits for the terminal callback and returns the session outcome.
    ///
    /// # Errors
    ///
    /// Returns the same [`DownloadError`] that was delivered to the
    /// delegate's failure callback.
    pub async fn wait(self) -> Result<PathBuf, DownloadError> {
        // The driver only goes away without reporting when the runtime
        // tears it down, which is indistinguishable from cancellation.
        self.outcome_rx
            .await
            .unwrap_or(Err(DownloadError::Cancelled))
    }
}

/// Core state machine driving streaming downloads.
///
/// `start()` returns immediately; all further progress happens on a
/// spawned driver task fed by transport events. Exactly one session per
/// destination path may be active at a time.
pub struct DownloadOrchestrator {
    transport: Arc<dyn StreamTransport>,
    parser: Arc<dyn ManifestParser>,
    active: Arc<DashMap<PathBuf, u64>>,
    next_session_id: AtomicU64,
}

impl DownloadOrchestrator {
    /// Creates an orchestrator over the given transport and parser.
    #[must_use]
    pub fn new(transport: Arc<dyn StreamTransport>, parser: Arc<dyn ManifestParser>) -> Self {
        Self {
            transport,
            parser,
            active: Arc::new(DashMap::new()),
            next_session_id: AtomicU64::new(1),
        }
    }

    /// Begins a download session.
    ///
    /// Precondition failures are synchronous: no session is created and
    /// no delegate callback fires.
    ///
    /// # Errors
    ///
    /// Returns [`DownloadError::AlreadyInProgress`] when a session for
    /// the same destination path is active, or
    /// [`DownloadError::TransportUnavailable`] when the transport cannot
    /// be acquired.
    pub fn start(
        &self,
        request: DownloadRequest,
        delegate: Arc<dyn DownloadDelegate>,
    ) -> Result<SessionHandle, DownloadError> {
        let session_id = self.next_session_id.fetch_add(1, Ordering::SeqCst);

        match self.active.entry(request.destination_path.clone()) {
            Entry::Occupied(_) => {
                return Err(DownloadError::already_in_progress(
                    &request.destination_path,
                ));
            }
            Entry::Vacant(slot) => {
                slot.insert(session_id);
            }
        }

        if !self.transport.is_available() {
            self.active.remove(&request.destination_path);
            return Err(DownloadError::TransportUnavailable);
        }

        info!(
            session_id,
            url = %request.target_url,
            is_manifest = request.is_manifest,
            destination = %request.destination_path.display(),
            "starting download session"
        );

        // Capacity 1 so a cancel issued between fetches is still
        // observed by the next select.
        let (cancel_tx, cancel_rx) = mpsc::channel(1);
        let (outcome_tx, outcome_rx) = oneshot::channel();
        let destination = request.destination_path.clone();

        tokio::spawn(run_session(
            Arc::clone(&self.transport),
            Arc::clone(&self.parser),
            request,
            delegate,
            Arc::clone(&self.active),
            session_id,
            cancel_rx,
            outcome_tx,
        ));

        Ok(SessionHandle {
            id: session_id,
            destination,
            cancel_tx,
            outcome_rx,
        })
    }

    /// Requests cancellation of a session.
    ///
    /// At most one terminal callback fires even when cancellation races a
    /// just-arrived completion event; after the terminal callback this is
    /// a no-op.
    pub fn cancel(&self, handle: &SessionHandle) {
        if handle.cancel_tx.try_send(()).is_err() {
            debug!(
                session_id = handle.id,
                "cancel ignored: session already terminal or cancel already pending"
            );
        }
    }

    /// Whether a session is currently active for `destination`.
    #[must_use]
    pub fn is_active(&self, destination: &Path) -> bool {
        self.active.contains_key(destination)
    }
}

/// Scratch path the manifest body is fetched into before parsing.
fn scratch_manifest_path(destination: &Path) -> PathBuf {
    let mut os = destination.as_os_str().to_os_string();
    os.push(".manifest");
    PathBuf::from(os)
}

/// Driver task: runs the session to its terminal state and fires exactly
/// one terminal callback. This is the only place terminal callbacks are
/// invoked, which makes the at-most-once guarantee structural.
#[allow(clippy::too_many_arguments)]
#[instrument(level = "debug", skip_all, fields(session_id))]
async fn run_session(
    transport: Arc<dyn StreamTransport>,
    parser: Arc<dyn ManifestParser>,
    request: DownloadRequest,
    delegate: Arc<dyn DownloadDelegate>,
    active: Arc<DashMap<PathBuf, u64>>,
    session_id: u64,
    mut cancel_rx: mpsc::Receiver<()>,
    outcome_tx: oneshot::Sender<Result<PathBuf, DownloadError>>,
) {
    let mut session = DownloadSession::new(request);

    let result = if session.request.is_manifest {
        drive_manifest(
            &mut session,
            transport.as_ref(),
            parser.as_ref(),
            delegate.as_ref(),
            &mut cancel_rx,
        )
        .await
    } else {
        drive_single_file(
            &mut session,
            transport.as_ref(),
            delegate.as_ref(),
            &mut cancel_rx,
        )
        .await
    };

    // Session resources are released before the terminal callback, so a
    // caller reacting to the callback can immediately start a new
    // session for the same destination.
    session.pending.clear();
    active.remove(&session.request.destination_path);

    match result {
        Ok(()) => {
            session.advance(SessionState::Completed);
            info!(
                session_id,
                received = session.received,
                destination = %session.request.destination_path.display(),
                "download completed"
            );
            delegate.on_completed(&session.request.destination_path);
            let _ = outcome_tx.send(Ok(session.request.destination_path.clone()));
        }
        Err(error) => {
            session.advance(SessionState::Failed);
            warn!(
                session_id,
                received = session.received,
                error = %error,
                "download failed"
            );
            delegate.on_failed(&error);
            let _ = outcome_tx.send(Err(error));
        }
    }
}

/// Single-file path: one fetch, truncate on response start, append
/// chunks, done on stream completion.
async fn drive_single_file(
    session: &mut DownloadSession,
    transport: &dyn StreamTransport,
    delegate: &dyn DownloadDelegate,
    cancel_rx: &mut mpsc::Receiver<()>,
) -> Result<(), DownloadError> {
    session.advance(SessionState::DownloadingSegment);
    let url = session.request.target_url.clone();
    let destination = session.request.destination_path.clone();

    let mut stream = transport.issue_request(&url).await?;
    let mut sink: Option<FileSink> = None;

    loop {
        match next_or_cancelled(&mut stream, cancel_rx).await? {
            StreamEvent::ResponseStarted {
                url: started_url,
                content_length,
            } => {
                session.total_expected = content_length;
                sink = Some(FileSink::open(&destination, true).await?);
                delegate.on_started(&started_url, content_length);
            }
            StreamEvent::DataReceived(chunk) => {
                let sink = sink.as_mut().ok_or_else(|| {
                    TransportError::protocol("data received before response started")
                })?;
                sink.append(&chunk).await?;
                session.record_received(chunk.len() as u64);
                delegate.on_progress(session.reported_total(), session.received);
            }
            StreamEvent::DataCompleted => {
                let sink = sink.take().ok_or_else(|| {
                    TransportError::protocol("stream completed before response started")
                })?;
                sink.finish().await?;
                return Ok(());
            }
            StreamEvent::Error(error) => return Err(error.into()),
        }
    }
    // `stream` drops here, unregistering the transport listener.
}

/// Manifest path: fetch the manifest, parse it, then drain the segment
/// queue one fetch at a time into the shared destination sink.
async fn drive_manifest(
    session: &mut DownloadSession,
    transport: &dyn StreamTransport,
    parser: &dyn ManifestParser,
    delegate: &dyn DownloadDelegate,
    cancel_rx: &mut mpsc::Receiver<()>,
) -> Result<(), DownloadError> {
    session.advance(SessionState::FetchingManifest);
    let base_url = session.request.target_url.clone();
    let destination = session.request.destination_path.clone();
    let scratch = scratch_manifest_path(&destination);

    let manifest_bytes = fetch_manifest(transport, &base_url, &scratch, cancel_rx).await?;
    let segments = parser.parse(&manifest_bytes, &base_url)?;
    if let Err(error) = tokio::fs::remove_file(&scratch).await {
        // Transient scratch file; leaving it behind is not a failure.
        debug!(path = %scratch.display(), %error, "could not remove manifest scratch file");
    }

    session.pending = SegmentQueue::from_segments(segments);
    session.total_expected = session.pending.expected_total_bytes();
    let mut sink = FileSink::open(&destination, true).await?;
    session.advance(SessionState::DownloadingSegment);
    delegate.on_started(&base_url, session.total_expected);
    info!(
        segments = session.pending.len(),
        expected_bytes = session.total_expected,
        "manifest parsed; downloading segments"
    );

    // The head stays queued while its fetch is in flight and is dequeued
    // only after its completion event was observed. An empty queue is a
    // vacuous success: queue empty means done.
    loop {
        let Some(segment_url) = session.pending.front().map(|s| s.url.clone()) else {
            break;
        };
        let resolved = resolve_segment_url(&base_url, &segment_url)?;
        debug!(segment = %resolved, remaining = session.pending.len(), "fetching segment");
        fetch_segment(transport, &resolved, &mut sink, session, delegate, cancel_rx).await?;
        session.pending.dequeue();
    }

    sink.finish().await?;
    Ok(())
}

/// Fetches the manifest body into the scratch sink, returning the bytes
/// for parsing. No delegate callbacks fire here: the session total is
/// not known until the manifest is parsed.
async fn fetch_manifest(
    transport: &dyn StreamTransport,
    url: &str,
    scratch: &Path,
    cancel_rx: &mut mpsc::Receiver<()>,
) -> Result<Vec<u8>, DownloadError> {
    let mut stream = transport.issue_request(url).await?;
    let mut sink: Option<FileSink> = None;
    let mut buffer = Vec::new();

    loop {
        match next_or_cancelled(&mut stream, cancel_rx).await? {
            StreamEvent::ResponseStarted { .. } => {
                sink = Some(FileSink::open(scratch, true).await?);
            }
            StreamEvent::DataReceived(chunk) => {
                let sink = sink.as_mut().ok_or_else(|| {
                    TransportError::protocol("data received before response started")
                })?;
                sink.append(&chunk).await?;
                buffer.extend_from_slice(&chunk);
            }
            StreamEvent::DataCompleted => {
                let sink = sink.take().ok_or_else(|| {
                    TransportError::protocol("stream completed before response started")
                })?;
                sink.finish().await?;
                return Ok(buffer);
            }
            StreamEvent::Error(error) => return Err(error.into()),
        }
    }
}

/// Fetches one segment, appending its bytes to the shared destination
/// sink. Byte counts accumulate across the whole session.
async fn fetch_segment(
    transport: &dyn StreamTransport,
    url: &str,
    sink: &mut FileSink,
    session: &mut DownloadSession,
    delegate: &dyn DownloadDelegate,
    cancel_rx: &mut mpsc::Receiver<()>,
) -> Result<(), DownloadError> {
    let mut stream = transport.issue_request(url).await?;

    loop {
        match next_or_cancelled(&mut stream, cancel_rx).await? {
            StreamEvent::ResponseStarted {
                url: started_url,
                content_length,
            } => {
                debug!(segment = %started_url, content_length, "segment response started");
            }
            StreamEvent::DataReceived(chunk) => {
                sink.append(&chunk).await?;
                session.record_received(chunk.len() as u64);
                delegate.on_progress(session.reported_total(), session.received);
            }
            StreamEvent::DataCompleted => return Ok(()),
            StreamEvent::Error(error) => return Err(error.into()),
        }
    }
}

/// Receives the next transport event unless cancellation arrives first.
///
/// A closed event channel without a terminal event is a transport
/// contract violation and is reported as such.
async fn next_or_cancelled(
    stream: &mut EventStream,
    cancel_rx: &mut mpsc::Receiver<()>,
) -> Result<StreamEvent, DownloadError> {
    tokio::select! {
        Some(()) = cancel_rx.recv() => Err(DownloadError::Cancelled),
        event = stream.next_event() => event.ok_or_else(|| {
            TransportError::protocol("event stream closed without a terminal event").into()
        }),
    }
}
