use std::path::{Path, PathBuf};

use crate::image_pipeline::codecs::options::ConversionOptions;
use crate::image_pipeline::common::cancel::CancellationToken;
use crate::image_pipeline::common::error::{ProcessingError, Result};

/// Inputs handed to the JPEG2000 compressor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompressInput {
    Single(PathBuf),
    /// One file per output component, 1 to 3 of them
    Channels(Vec<PathBuf>),
}

impl CompressInput {
    pub const MAX_CHANNELS: usize = 3;

    /// The same file used for `count` components.
    pub fn repeated(path: &Path, count: usize) -> Self {
        CompressInput::Channels(vec![path.to_path_buf(); count])
    }

    pub fn paths(&self) -> &[PathBuf] {
        match self {
            CompressInput::Single(path) => std::slice::from_ref(path),
            CompressInput::Channels(paths) => paths,
        }
    }

    pub fn validate(&self) -> Result<()> {
        let count = self.paths().len();
        if !(1..=Self::MAX_CHANNELS).contains(&count) {
            return Err(ProcessingError::InvalidOption(format!(
                "expected between 1 and {} compressor inputs, got {count}",
                Self::MAX_CHANNELS
            )));
        }
        Ok(())
    }
}

pub trait Jpeg2000Codec {
    fn compress(
        &self,
        input: &CompressInput,
        output: &Path,
        options: &ConversionOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<()>;

    /// Decompresses a JPEG2000 file. The format of `output` follows its extension.
    fn expand(
        &self,
        input: &Path,
        output: &Path,
        args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()>;
}
