use std::path::{Path, PathBuf};
use std::process::Command;

use super::{emit_directory, HandlerContext};
use crate::archive::capability::run_with_timeout;
use crate::archive::scratch::executable_copy;
use crate::archive::{EntrySink, ExtractError};

/// File name of the private copy that is actually run.
const PROGRAM_NAME: &str = "program";

/// How a self-extracting executable is asked to unpack itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SelfExtractor {
    /// AppImage runtime: `--appimage-extract` into `squashfs-root`.
    AppImage,
    /// makeself shell archive: `--noexec --target <dir>`.
    Makeself,
}

impl SelfExtractor {
    fn detect(name: &str, head: &[u8]) -> Self {
        let script = head.starts_with(b"#!");
        let elf = head.starts_with(b"\x7FELF");
        if script || (!elf && name.to_lowercase().ends_with(".run")) {
            Self::Makeself
        } else {
            Self::AppImage
        }
    }

    /// Directory the payload ends up in.
    fn output_root(self, workdir: &Path) -> PathBuf {
        match self {
            Self::AppImage => workdir.join("squashfs-root"),
            Self::Makeself => workdir.join("payload"),
        }
    }

    fn command(self, program: &Path, workdir: &Path) -> Command {
        let mut cmd = Command::new(program);
        match self {
            Self::AppImage => {
                cmd.arg("--appimage-extract");
            }
            Self::Makeself => {
                cmd.args(["--noexec", "--nox11", "--target"])
                    .arg(self.output_root(workdir));
            }
        }
        cmd.current_dir(workdir);
        cmd
    }
}

/// Let a self-extracting executable unpack itself inside an isolated
/// scratch directory. A closed, executable copy is run, never the file
/// itself.
pub(super) fn extract(ctx: &HandlerContext<'_>, sink: &mut EntrySink<'_, '_>) -> Result<(), ExtractError> {
    if !ctx.capabilities.allow_self_extract {
        return Err(ExtractError::Unsupported("self-extraction disabled".into()));
    }
    let kind = SelfExtractor::detect(ctx.name, ctx.head);
    let workdir = sink.arena().directory("selfextract-")?;
    let program = executable_copy(ctx.path, workdir.path(), PROGRAM_NAME)?;
    log::debug!("Self-extracting {} as {:?}", ctx.name, kind);

    let mut cmd = kind.command(&program, workdir.path());
    let status = run_with_timeout(&mut cmd, ctx.name, ctx.capabilities.extract_timeout)?;

    let root = kind.output_root(workdir.path());
    if !root.is_dir() {
        return Err(ExtractError::ToolFailed {
            tool: ctx.name.to_string(),
            status: status.to_string(),
        });
    }
    emit_directory(&root, sink)
}
