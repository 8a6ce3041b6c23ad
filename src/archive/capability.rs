//! Registry of optional extraction capabilities.
//!
//! In-process readers (zip, 7z, rar, tar) are always available. External
//! container tools and running self-extracting executables depend on the
//! host, so they are looked up once and handed to the walker.

use std::env;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::ExtractError;

/// Default bound on any extraction subprocess.
pub const DEFAULT_EXTRACT_TIMEOUT: Duration = Duration::from_secs(300);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Flavor of external container tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    /// `7z` / `7za` (p7zip or 7-Zip).
    SevenZip,
    /// `bsdtar` (libarchive).
    Bsdtar,
}

/// An external program able to unpack many container formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerTool {
    pub kind: ToolKind,
    pub program: PathBuf,
}

impl ContainerTool {
    #[must_use]
    pub fn seven_zip(program: PathBuf) -> Self {
        Self {
            kind: ToolKind::SevenZip,
            program,
        }
    }

    #[must_use]
    pub fn bsdtar(program: PathBuf) -> Self {
        Self {
            kind: ToolKind::Bsdtar,
            program,
        }
    }

    /// Command extracting `archive` into `dest`.
    pub(crate) fn extract_command(&self, archive: &Path, dest: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        match self.kind {
            ToolKind::SevenZip => {
                let mut out = std::ffi::OsString::from("-o");
                out.push(dest);
                cmd.arg("x").arg("-y").arg("-p-").arg(out).arg(archive);
            }
            ToolKind::Bsdtar => {
                cmd.arg("-xf").arg(archive).arg("-C").arg(dest);
            }
        }
        cmd
    }

    pub(crate) fn name(&self) -> String {
        self.program
            .file_name()
            .map_or_else(|| self.program.display().to_string(), |n| n.to_string_lossy().into_owned())
    }
}

/// What the current host allows the archive walker to do.
#[derive(Debug, Clone)]
pub struct Capabilities {
    /// External tool used for the generic container fallback.
    pub container_tool: Option<ContainerTool>,
    /// Whether self-extracting executables may be run.
    pub allow_self_extract: bool,
    /// Upper bound on any subprocess.
    pub extract_timeout: Duration,
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::builtin_only()
    }
}

impl Capabilities {
    /// Only the in-process readers; nothing is ever executed.
    #[must_use]
    pub fn builtin_only() -> Self {
        Self {
            container_tool: None,
            allow_self_extract: false,
            extract_timeout: DEFAULT_EXTRACT_TIMEOUT,
        }
    }

    /// Search `PATH` for a container tool and allow self-extraction.
    #[must_use]
    pub fn detect() -> Self {
        let container_tool = ["7z", "7za"]
            .iter()
            .find_map(|name| find_in_path(name))
            .map(ContainerTool::seven_zip)
            .or_else(|| find_in_path("bsdtar").map(ContainerTool::bsdtar));

        match &container_tool {
            Some(tool) => log::debug!("Using {} for generic containers", tool.program.display()),
            None => log::info!("No 7z/bsdtar found on PATH; generic container fallback disabled"),
        }

        Self {
            container_tool,
            allow_self_extract: true,
            extract_timeout: DEFAULT_EXTRACT_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_container_tool(mut self, tool: Option<ContainerTool>) -> Self {
        self.container_tool = tool;
        self
    }

    #[must_use]
    pub fn with_self_extract(mut self, allow: bool) -> Self {
        self.allow_self_extract = allow;
        self
    }

    #[must_use]
    pub fn with_extract_timeout(mut self, timeout: Duration) -> Self {
        self.extract_timeout = timeout;
        self
    }
}

fn find_in_path(name: &str) -> Option<PathBuf> {
    let paths = env::var_os("PATH")?;
    env::split_paths(&paths).find_map(|dir| {
        let candidate = dir.join(name);
        if candidate.is_file() {
            return Some(candidate);
        }
        let exe = dir.join(format!("{name}.exe"));
        exe.is_file().then_some(exe)
    })
}

/// Run `cmd` to completion, killing it once `timeout` elapses.
pub(crate) fn run_with_timeout(
    cmd: &mut Command,
    tool: &str,
    timeout: Duration,
) -> Result<ExitStatus, ExtractError> {
    let mut child = cmd
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let started = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(status);
        }
        if started.elapsed() >= timeout {
            log::warn!("{} exceeded {:?}, killing it", tool, timeout);
            if let Err(e) = child.kill() {
                log::debug!("Failed to kill {}: {}", tool, e);
            }
            let _ = child.wait();
            return Err(ExtractError::Timeout {
                tool: tool.to_string(),
                secs: timeout.as_secs(),
            });
        }
        thread::sleep(POLL_INTERVAL);
    }
}
