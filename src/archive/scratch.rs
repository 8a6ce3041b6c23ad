//! Scratch space for nested and carved archives.
//!
//! A [`ScratchArena`] owns one temporary directory per top-level walk. The
//! directory is created on first use and removed with everything in it when
//! the arena is dropped, whichever way the walk ends.

use std::fs::File;
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tempfile::{Builder, NamedTempFile, TempDir};

/// Per-walk temporary directory.
#[derive(Debug, Default)]
pub struct ScratchArena {
    root: Option<PathBuf>,
    dir: Option<TempDir>,
}

impl ScratchArena {
    /// Create an arena under `root`, or the system temp directory when `None`.
    #[must_use]
    pub fn new(root: Option<PathBuf>) -> Self {
        Self { root, dir: None }
    }

    /// Location of the arena directory, if it has been created.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.dir.as_ref().map(TempDir::path)
    }

    fn dir(&mut self) -> io::Result<&Path> {
        if self.dir.is_none() {
            let mut builder = Builder::new();
            builder.prefix("arcdupe-");
            let dir = match &self.root {
                Some(root) => {
                    std::fs::create_dir_all(root)?;
                    builder.tempdir_in(root)?
                }
                None => builder.tempdir()?,
            };
            log::trace!("Created scratch arena {}", dir.path().display());
            self.dir = Some(dir);
        }
        match &self.dir {
            Some(dir) => Ok(dir.path()),
            None => Err(io::Error::other("scratch arena unavailable")),
        }
    }

    /// Copy `reader` to a new scratch file and rewind it.
    ///
    /// `suffix` is appended to the file name so tools that look at
    /// extensions still recognize the format. Returns the file and the number
    /// of bytes written. The file is deleted when the handle is dropped.
    pub fn spill(
        &mut self,
        reader: &mut dyn Read,
        suffix: &str,
    ) -> io::Result<(NamedTempFile, u64)> {
        let dir = self.dir()?.to_path_buf();
        let mut file = Builder::new()
            .prefix("spill-")
            .suffix(suffix)
            .tempfile_in(dir)?;
        let written = {
            let mut writer = BufWriter::new(file.as_file_mut());
            let n = io::copy(reader, &mut writer)?;
            writer.flush()?;
            n
        };
        file.as_file_mut().seek(SeekFrom::Start(0))?;
        Ok((file, written))
    }

    /// Copy `source` from `offset` to its end into a new scratch file.
    pub fn spill_from(
        &mut self,
        source: &mut File,
        offset: u64,
        suffix: &str,
    ) -> io::Result<(NamedTempFile, u64)> {
        source.seek(SeekFrom::Start(offset))?;
        self.spill(source, suffix)
    }

    /// Create an empty directory inside the arena for an external extractor.
    pub fn directory(&mut self, label: &str) -> io::Result<TempDir> {
        let dir = self.dir()?.to_path_buf();
        Builder::new().prefix(label).tempdir_in(dir)
    }
}

/// Copy `source` into `dir` under `name` and mark the copy executable.
///
/// The copy is closed when this returns, so it can be run straight away even
/// when `source` is still open for writing (a spilled nested archive).
pub fn executable_copy(source: &Path, dir: &Path, name: &str) -> io::Result<PathBuf> {
    let dest = dir.join(name);
    std::fs::copy(source, &dest)?;
    set_executable(&dest)?;
    Ok(dest)
}

#[cfg(unix)]
fn set_executable(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
}

#[cfg(not(unix))]
fn set_executable(_path: &Path) -> io::Result<()> {
    Ok(())
}
