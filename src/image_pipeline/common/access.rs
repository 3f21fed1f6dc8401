//! Proactive filesystem checks, run before an external tool is invoked so a
//! bad path fails with a clear message instead of an opaque tool error.

use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::image_pipeline::common::error::{ProcessingError, Result};

pub fn ensure_readable(path: &Path) -> Result<()> {
    match fs::File::open(path) {
        Ok(file) if file.metadata().map(|m| m.is_file()).unwrap_or(false) => Ok(()),
        _ => Err(ProcessingError::InputNotReadable(path.to_path_buf())),
    }
}

/// Checks the directory that `output` would be created in accepts new files.
pub fn ensure_parent_writable(output: &Path) -> Result<()> {
    let parent = parent_dir(output);
    ensure_dir_writable(&parent).map_err(|_| ProcessingError::OutputNotWritable(output.to_path_buf()))
}

pub fn ensure_dir_writable(dir: &Path) -> Result<()> {
    let not_writable = || ProcessingError::OutputNotWritable(dir.to_path_buf());
    let metadata = fs::metadata(dir).map_err(|_| not_writable())?;
    if !metadata.is_dir() {
        return Err(not_writable());
    }
    // Permission bits don't account for root, ACLs or read-only mounts.
    tempfile::Builder::new()
        .prefix(".write-probe_")
        .tempfile_in(dir)
        .map(drop)
        .map_err(|_| not_writable())
}

/// An existing file is overwritten in place by tools such as exiftool.
pub fn ensure_file_writable(path: &Path) -> Result<()> {
    OpenOptions::new()
        .append(true)
        .open(path)
        .map(drop)
        .map_err(|_| ProcessingError::OutputNotWritable(path.to_path_buf()))
}

/// Moves a finished file to `destination`, replacing anything already there.
/// Falls back to [`copy_into_place`] when a rename is refused, such as
/// across filesystems.
pub fn move_into_place(from: &Path, destination: &Path) -> Result<()> {
    match fs::rename(from, destination) {
        Ok(()) => Ok(()),
        Err(e) => {
            debug!(from = %from.display(), error = %e, "Rename refused, copying instead");
            copy_into_place(from, destination)?;
            if let Err(e) = fs::remove_file(from) {
                debug!(from = %from.display(), error = %e, "Staged file left behind after copy");
            }
            Ok(())
        }
    }
}

/// Copies `from` beside `destination` and swaps it in, so `destination` is
/// never seen half written.
pub fn copy_into_place(from: &Path, destination: &Path) -> Result<()> {
    let mut partial = tempfile::Builder::new()
        .prefix(".partial_")
        .tempfile_in(parent_dir(destination))?;
    io::copy(&mut File::open(from)?, partial.as_file_mut())?;
    fs::set_permissions(partial.path(), fs::metadata(from)?.permissions())?;
    partial.persist(destination).map_err(|e| e.error)?;
    Ok(())
}

pub fn parent_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// True if `cmd` exists and can be executed. Bare names are looked up on `PATH`.
pub fn cmd_is_executable(cmd: &Path) -> bool {
    if cmd.is_absolute() || cmd.components().count() > 1 {
        return is_executable_file(cmd);
    }
    if is_executable_file(cmd) {
        return true;
    }
    std::env::var_os("PATH")
        .map(|paths| std::env::split_paths(&paths).any(|dir| is_executable_file(&dir.join(cmd))))
        .unwrap_or(false)
}

#[cfg(unix)]
fn is_executable_file(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;
    fs::metadata(path)
        .map(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_executable_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
        || fs::metadata(path.with_extension("exe")).map(|m| m.is_file()).unwrap_or(false)
}
