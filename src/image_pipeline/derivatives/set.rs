use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DerivativeKind {
    /// JPEG for display
    AccessCopy,
    /// XMP sidecar with the extracted embedded metadata
    EmbeddedMetadata,
    /// Copy of the source TIFF
    MasterCopy,
    /// Lossless JPEG2000
    PreservationCopy,
}

impl fmt::Display for DerivativeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DerivativeKind::AccessCopy => "access copy",
            DerivativeKind::EmbeddedMetadata => "embedded metadata",
            DerivativeKind::MasterCopy => "master copy",
            DerivativeKind::PreservationCopy => "preservation copy",
        };
        f.write_str(name)
    }
}

/// Files produced for one source image, in creation order.
///
/// A path is recorded before the file is written, so a failed step's partial
/// output is covered by [`DerivativeSet::discard`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivativeSet {
    files: Vec<(DerivativeKind, PathBuf)>,
}

impl DerivativeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: DerivativeKind, path: PathBuf) {
        self.files.push((kind, path));
    }

    pub fn get(&self, kind: DerivativeKind) -> Option<&Path> {
        self.files
            .iter()
            .find(|(k, _)| *k == kind)
            .map(|(_, path)| path.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (DerivativeKind, &Path)> {
        self.files.iter().map(|(kind, path)| (*kind, path.as_path()))
    }

    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|(_, path)| path.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Removes every recorded file, newest first. Failures are logged, files
    /// that were never written are skipped.
    pub fn discard(self) {
        for (kind, path) in self.files.into_iter().rev() {
            match fs::remove_file(&path) {
                Ok(()) => debug!(kind = %kind, path = %path.display(), "Removed partial output"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(kind = %kind, path = %path.display(), error = %e, "Failed to remove partial output"),
            }
        }
    }
}
