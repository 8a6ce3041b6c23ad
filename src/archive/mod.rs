//! Recursive archive traversal.
//!
//! # Overview
//!
//! [`ArchiveWalker`] turns one archive file into a flat sequence of entries,
//! descending into archives stored inside archives. Entries are handed to a
//! visitor one at a time; the visitor reads the entry stream before the next
//! entry is produced, and can stop the walk by returning
//! [`ControlFlow::Break`].
//!
//! For each file an ordered plan of [`HandlerKind`]s is built from its magic
//! bytes and name (see [`plan_handlers`]). Handlers are tried in order until
//! one produces an entry. From that point the walker is committed to the
//! handler: a later error is logged and the remaining handlers are not tried.
//!
//! Nested archives are copied to a [`ScratchArena`], reported as an opaque
//! entry and then walked one level deeper, with `"<entry>/"` prepended to
//! every inner path.
//!
//! A walk never fails. Unreadable or unsupported files simply produce no
//! entries; the reasons are collected in [`WalkOutcome::failures`].
//!
//! # Example
//!
//! ```no_run
//! use std::ops::ControlFlow;
//! use std::path::Path;
//! use arcdupe::archive::{ArchiveWalker, Capabilities};
//!
//! let walker = ArchiveWalker::new(Capabilities::detect(), 10);
//! let outcome = walker.walk(Path::new("bundle.zip"), |entry| {
//!     println!("{} ({} bytes)", entry.path, entry.size);
//!     ControlFlow::Continue(())
//! });
//! println!("{} entries", outcome.entries);
//! ```

pub mod capability;
pub mod detect;
mod readers;
pub mod scratch;

use std::fs::File;
use std::io::{self, Read};
use std::ops::ControlFlow;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

pub use capability::{Capabilities, ContainerTool, ToolKind};
pub use detect::{archive_extension, is_archive_name, plan_handlers, HandlerKind, SNIFF_LEN};
pub use scratch::ScratchArena;

use readers::HandlerContext;

/// Default limit on how deep nested archives are followed.
pub const DEFAULT_MAX_RECURSION_DEPTH: u32 = 10;

/// Errors raised by a single extraction attempt.
///
/// These never leave the walker; they decide whether the next handler is
/// tried and end up in [`WalkOutcome::failures`].
#[derive(thiserror::Error, Debug)]
pub enum ExtractError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("7z error: {0}")]
    SevenZip(String),

    #[error("rar error: {0}")]
    Rar(String),

    #[error("{tool} failed with {status}")]
    ToolFailed { tool: String, status: String },

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    #[error("unsupported: {0}")]
    Unsupported(String),
}

/// One file produced by a walk.
pub struct ArchiveEntry<'a> {
    /// Path relative to the top-level archive, `/`-separated.
    pub path: String,
    /// Entry contents. Only valid during the visitor call.
    pub reader: &'a mut dyn Read,
    /// Size reported by the container (or the spilled size for nested archives).
    pub size: u64,
    /// Whether the entry name looks like an archive itself.
    pub is_nested_archive: bool,
}

impl ArchiveEntry<'_> {
    /// Base name of the entry.
    #[must_use]
    pub fn filename(&self) -> &str {
        base_name(&self.path)
    }
}

/// Summary of one top-level walk.
#[derive(Debug, Clone, Default)]
pub struct WalkOutcome {
    /// Entries delivered to the visitor, nested levels included.
    pub entries: usize,
    /// Handler attempts that failed, in the order they were tried.
    pub failures: Vec<(HandlerKind, String)>,
    /// Handler that produced the top-level entries.
    pub handler: Option<HandlerKind>,
    /// The visitor or a shutdown request ended the walk early.
    pub stopped: bool,
}

impl WalkOutcome {
    /// Whether the walk produced nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries == 0
    }
}

type Visitor<'v> = dyn FnMut(ArchiveEntry<'_>) -> ControlFlow<()> + 'v;

struct WalkState<'v> {
    arena: ScratchArena,
    visitor: &'v mut Visitor<'v>,
    outcome: WalkOutcome,
}

/// Depth-first archive walker.
#[derive(Debug, Clone)]
pub struct ArchiveWalker {
    capabilities: Capabilities,
    max_depth: u32,
    scratch_root: Option<PathBuf>,
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl ArchiveWalker {
    /// Create a walker with the given capabilities and recursion limit.
    #[must_use]
    pub fn new(capabilities: Capabilities, max_depth: u32) -> Self {
        Self {
            capabilities,
            max_depth,
            scratch_root: None,
            shutdown_flag: None,
        }
    }

    /// Place scratch arenas under `root` instead of the system temp directory.
    #[must_use]
    pub fn with_scratch_root(mut self, root: PathBuf) -> Self {
        self.scratch_root = Some(root);
        self
    }

    /// Set the shutdown flag; the walk stops before the next entry once set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    #[must_use]
    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    #[must_use]
    pub fn max_depth(&self) -> u32 {
        self.max_depth
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Walk `path` as a top-level archive, feeding every entry to `visitor`.
    pub fn walk<F>(&self, path: &Path, mut visitor: F) -> WalkOutcome
    where
        F: FnMut(ArchiveEntry<'_>) -> ControlFlow<()>,
    {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mut state = WalkState {
            arena: ScratchArena::new(self.scratch_root.clone()),
            visitor: &mut visitor,
            outcome: WalkOutcome::default(),
        };
        self.walk_at(path, &name, 0, "", &mut state);
        state.outcome
    }

    /// Walk one container file at `depth`. Returns the number of entries
    /// emitted at this level by the handler that was committed to.
    fn walk_at(
        &self,
        path: &Path,
        name: &str,
        depth: u32,
        prefix: &str,
        state: &mut WalkState<'_>,
    ) -> usize {
        if depth > self.max_depth {
            log::debug!("Max recursion depth reached for {}", path.display());
            return 0;
        }
        if state.outcome.stopped {
            return 0;
        }

        let head = match read_head(path) {
            Ok(head) => head,
            Err(e) => {
                log::warn!("Cannot read {}: {}", path.display(), e);
                return 0;
            }
        };
        let plan = plan_handlers(name, &head, &self.capabilities);
        log::trace!("Handler plan for {}: {:?}", name, plan);

        for &kind in &plan {
            let ctx = HandlerContext {
                path,
                name,
                head: &head,
                capabilities: &self.capabilities,
                plan: &plan,
            };
            let mut sink = EntrySink {
                walker: self,
                state: &mut *state,
                depth,
                prefix,
                emitted: 0,
            };
            let result = kind.run(&ctx, &mut sink);
            let emitted = sink.emitted;

            match result {
                Ok(()) if emitted > 0 => {
                    if depth == 0 {
                        state.outcome.handler = Some(kind);
                    }
                    return emitted;
                }
                Err(e) if emitted > 0 => {
                    log::warn!(
                        "{} handler failed after {} entries of {}: {}",
                        kind,
                        emitted,
                        path.display(),
                        e
                    );
                    state.outcome.failures.push((kind, e.to_string()));
                    if depth == 0 {
                        state.outcome.handler = Some(kind);
                    }
                    return emitted;
                }
                Ok(()) => {
                    log::debug!("{} handler produced no entries for {}", kind, path.display());
                }
                Err(e) => {
                    log::debug!("{} handler failed for {}: {}", kind, path.display(), e);
                    state.outcome.failures.push((kind, e.to_string()));
                }
            }
            if state.outcome.stopped {
                return 0;
            }
        }

        if plan.is_empty() {
            log::warn!("No handler available for {}", path.display());
        } else if depth == 0 {
            log::warn!("Could not extract any files from {}", path.display());
        } else {
            log::debug!("Nested archive {} produced no entries", name);
        }
        0
    }
}

/// Receives entries from one handler attempt.
///
/// Counts what was emitted (the commit decision in `walk_at` depends on it),
/// applies the path prefix and takes care of nested archives.
pub(crate) struct EntrySink<'s, 'v> {
    walker: &'s ArchiveWalker,
    state: &'s mut WalkState<'v>,
    depth: u32,
    prefix: &'s str,
    emitted: usize,
}

impl EntrySink<'_, '_> {
    /// Emit one entry. Archive-like entries below the depth limit are spilled,
    /// reported, and then walked one level deeper.
    pub(crate) fn emit(
        &mut self,
        name: &str,
        reader: &mut dyn Read,
        size: u64,
    ) -> Result<ControlFlow<()>, ExtractError> {
        if self.state.outcome.stopped || self.walker.is_shutdown_requested() {
            self.state.outcome.stopped = true;
            return Ok(ControlFlow::Break(()));
        }

        let name = normalize_entry_name(name);
        if name.is_empty() {
            return Ok(ControlFlow::Continue(()));
        }
        let base = base_name(&name).to_string();
        let path = format!("{}{}", self.prefix, name);
        let is_nested = is_archive_name(&base);

        if !(is_nested && self.depth < self.walker.max_depth) {
            return Ok(self.deliver(path, reader, size, is_nested));
        }

        let suffix = archive_extension(&base).unwrap_or_default();
        let (mut scratch, spilled) = self.state.arena.spill(reader, suffix)?;
        if self.deliver(path.clone(), scratch.as_file_mut(), spilled, true).is_break() {
            return Ok(ControlFlow::Break(()));
        }

        let nested_prefix = format!("{path}/");
        self.walker
            .walk_at(scratch.path(), &base, self.depth + 1, &nested_prefix, self.state);
        drop(scratch);

        Ok(if self.state.outcome.stopped {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        })
    }

    /// Walk a carved container one level deeper without adding a path prefix.
    pub(crate) fn descend(&mut self, path: &Path, name: &str) -> ControlFlow<()> {
        let emitted = self
            .walker
            .walk_at(path, name, self.depth + 1, self.prefix, self.state);
        self.emitted += emitted;
        if self.state.outcome.stopped {
            ControlFlow::Break(())
        } else {
            ControlFlow::Continue(())
        }
    }

    pub(crate) fn arena(&mut self) -> &mut ScratchArena {
        &mut self.state.arena
    }

    pub(crate) fn emitted(&self) -> usize {
        self.emitted
    }

    fn deliver(
        &mut self,
        path: String,
        reader: &mut dyn Read,
        size: u64,
        is_nested_archive: bool,
    ) -> ControlFlow<()> {
        self.emitted += 1;
        self.state.outcome.entries += 1;
        let flow = (self.state.visitor)(ArchiveEntry {
            path,
            reader: &mut *reader,
            size,
            is_nested_archive,
        });
        // Leave the container positioned after this entry.
        if let Err(e) = io::copy(reader, &mut io::sink()) {
            log::debug!("Failed to skip rest of entry: {}", e);
        }
        if flow.is_break() {
            self.state.outcome.stopped = true;
        }
        flow
    }
}

fn read_head(path: &Path) -> io::Result<Vec<u8>> {
    let file = File::open(path)?;
    let mut head = Vec::with_capacity(SNIFF_LEN);
    file.take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    Ok(head)
}

/// Normalize a container entry name to a relative `/`-separated path.
fn normalize_entry_name(name: &str) -> String {
    name.replace('\\', "/")
        .split('/')
        .filter(|part| !part.is_empty() && *part != ".")
        .collect::<Vec<_>>()
        .join("/")
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}
