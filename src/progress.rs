//! Progress reporting for the source and target scans.
//!
//! Scanners report a [`ScanProgress`] snapshot to a [`ProgressCallback`]
//! after every entry, file and archive. Two sinks ship with the crate:
//!
//! * [`Progress`]: indicatif bars for the command line.
//! * [`ChannelProgress`]: forwards snapshots over a bounded channel and
//!   drops them when the receiver lags, so scanning never waits on a slow
//!   consumer. [`ChannelProgress::forward_to`] drains the channel into
//!   another sink on its own thread; the binary draws its bars this way.

use std::fmt;
use std::io;
use std::sync::mpsc::{self, Receiver, SyncSender, TrySendError};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

/// The two scanning phases.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScanPhase {
    /// Indexing the contents of source archives.
    #[default]
    SourceScan,
    /// Hashing target files and matching them against the index.
    TargetScan,
}

impl ScanPhase {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SourceScan => "source_scan",
            Self::TargetScan => "target_scan",
        }
    }
}

impl fmt::Display for ScanPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Snapshot of scan progress.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanProgress {
    pub phase: ScanPhase,
    /// Archive currently being walked (source scan only).
    pub current_archive: Option<String>,
    /// Entry or file currently being hashed.
    pub current_file: Option<String>,
    pub files_processed: usize,
    pub total_files: usize,
    pub archives_processed: usize,
    pub total_archives: usize,
}

impl ScanProgress {
    /// Create an empty snapshot for `phase`.
    #[must_use]
    pub fn new(phase: ScanPhase) -> Self {
        Self {
            phase,
            ..Self::default()
        }
    }

    /// Completion in percent, based on archives for the source scan and on
    /// files for the target scan.
    #[must_use]
    pub fn progress_pct(&self) -> f64 {
        let (done, total) = match self.phase {
            ScanPhase::SourceScan => (self.archives_processed, self.total_archives),
            ScanPhase::TargetScan => (self.files_processed, self.total_files),
        };
        if total == 0 {
            0.0
        } else {
            (done as f64 / total as f64 * 100.0).min(100.0)
        }
    }
}

/// Receives progress from the scanners.
///
/// Implementations must return quickly; they are called from the scanning
/// thread (and from rayon workers during target hashing).
pub trait ProgressCallback: Send + Sync {
    /// Called when a phase starts with the number of work items.
    fn on_phase_start(&self, phase: ScanPhase, total: usize);

    /// Called after every processed entry, file or archive.
    fn on_progress(&self, progress: &ScanProgress);

    /// Called once a phase has finished (or was interrupted).
    fn on_phase_end(&self, phase: ScanPhase);

    /// Free-form status message.
    fn on_message(&self, _message: &str) {}
}

/// Progress bars using indicatif.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter; with `quiet` set nothing is drawn.
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    fn style(phase: ScanPhase) -> ProgressStyle {
        let template = match phase {
            ScanPhase::SourceScan => {
                "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} archives ({percent}%) {msg}"
            }
            ScanPhase::TargetScan => {
                "[{elapsed_precise}] [{bar:40.green/blue}] {pos}/{len} files ({percent}%) {msg} (ETA: {eta})"
            }
        };
        ProgressStyle::with_template(template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█>-")
    }

    fn with_bar(&self, f: impl FnOnce(&ProgressBar)) {
        if let Ok(guard) = self.bar.lock() {
            if let Some(bar) = guard.as_ref() {
                f(bar);
            }
        }
    }
}

impl ProgressCallback for Progress {
    fn on_phase_start(&self, phase: ScanPhase, total: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::style(phase));
        bar.enable_steady_tick(Duration::from_millis(100));
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(old) = guard.replace(bar) {
                old.finish_and_clear();
            }
        }
    }

    fn on_progress(&self, progress: &ScanProgress) {
        if self.quiet {
            return;
        }
        let position = match progress.phase {
            ScanPhase::SourceScan => progress.archives_processed,
            ScanPhase::TargetScan => progress.files_processed,
        };
        let message = match (&progress.current_archive, &progress.current_file) {
            (Some(archive), Some(file)) => {
                format!("{}: {}", truncate_path(archive, 30), truncate_path(file, 30))
            }
            (Some(path), None) | (None, Some(path)) => truncate_path(path, 40),
            (None, None) => String::new(),
        };
        self.with_bar(|bar| {
            bar.set_position(position as u64);
            bar.set_message(message);
        });
    }

    fn on_phase_end(&self, phase: ScanPhase) {
        if self.quiet {
            return;
        }
        if let Ok(mut guard) = self.bar.lock() {
            if let Some(bar) = guard.take() {
                let done = match phase {
                    ScanPhase::SourceScan => "Source scan complete",
                    ScanPhase::TargetScan => "Target scan complete",
                };
                bar.finish_with_message(done);
            }
        }
    }

    fn on_message(&self, message: &str) {
        if self.quiet {
            return;
        }
        let message = message.to_string();
        self.with_bar(|bar| bar.set_message(message));
    }
}

/// Event forwarded by [`ChannelProgress`].
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    PhaseStart(ScanPhase, usize),
    Update(ScanProgress),
    PhaseEnd(ScanPhase),
    Message(String),
}

impl ProgressEvent {
    /// Deliver this event to `sink`.
    pub fn dispatch(self, sink: &dyn ProgressCallback) {
        match self {
            Self::PhaseStart(phase, total) => sink.on_phase_start(phase, total),
            Self::Update(progress) => sink.on_progress(&progress),
            Self::PhaseEnd(phase) => sink.on_phase_end(phase),
            Self::Message(message) => sink.on_message(&message),
        }
    }

    fn is_phase_boundary(&self) -> bool {
        matches!(self, Self::PhaseStart(..) | Self::PhaseEnd(_))
    }
}

/// Progress sink backed by a bounded channel.
///
/// Updates and messages are dropped when the channel is full. Phase starts
/// and ends wait for room, so a consumer always sees every phase.
pub struct ChannelProgress {
    sender: Mutex<SyncSender<ProgressEvent>>,
}

impl ChannelProgress {
    /// Create the sink and the receiving end; at most `capacity` events are
    /// buffered.
    #[must_use]
    pub fn channel(capacity: usize) -> (Self, Receiver<ProgressEvent>) {
        let (sender, receiver) = mpsc::sync_channel(capacity.max(1));
        (
            Self {
                sender: Mutex::new(sender),
            },
            receiver,
        )
    }

    /// Forward events to `sink` from a dedicated thread.
    ///
    /// The thread ends once the returned sink (and every clone of the `Arc`
    /// it is wrapped in) has been dropped; join the handle to wait for the
    /// last events to be drawn.
    ///
    /// # Errors
    ///
    /// Returns an error if the thread cannot be spawned.
    pub fn forward_to(
        sink: Arc<dyn ProgressCallback>,
        capacity: usize,
    ) -> io::Result<(Self, JoinHandle<()>)> {
        let (progress, receiver) = Self::channel(capacity);
        let handle = thread::Builder::new()
            .name("progress".to_string())
            .spawn(move || {
                for event in receiver {
                    event.dispatch(sink.as_ref());
                }
            })?;
        Ok((progress, handle))
    }

    fn send(&self, event: ProgressEvent) {
        let Ok(sender) = self.sender.lock() else {
            return;
        };
        if event.is_phase_boundary() {
            // Only fails when the receiver is gone.
            let _ = sender.send(event);
            return;
        }
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => log::trace!("Progress consumer lagging, update dropped"),
            Err(TrySendError::Disconnected(_)) => {}
        }
    }
}

impl ProgressCallback for ChannelProgress {
    fn on_phase_start(&self, phase: ScanPhase, total: usize) {
        self.send(ProgressEvent::PhaseStart(phase, total));
    }

    fn on_progress(&self, progress: &ScanProgress) {
        self.send(ProgressEvent::Update(progress.clone()));
    }

    fn on_phase_end(&self, phase: ScanPhase) {
        self.send(ProgressEvent::PhaseEnd(phase));
    }

    fn on_message(&self, message: &str) {
        self.send(ProgressEvent::Message(message.to_string()));
    }
}

/// Truncate a path for display in the progress bar.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }
    let file_name = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let count = file_name.chars().count();
    if count + 4 > max_len {
        let tail: String = file_name.chars().skip(count + 3 - max_len).collect();
        return format!("...{tail}");
    }
    format!(".../{file_name}")
}
