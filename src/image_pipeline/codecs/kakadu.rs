use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, error};

use crate::image_pipeline::codecs::jpeg2000::{CompressInput, Jpeg2000Codec};
use crate::image_pipeline::codecs::options::ConversionOptions;
use crate::image_pipeline::common::access;
use crate::image_pipeline::common::cancel::CancellationToken;
use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::common::process::ExternalCommand;

const COMPRESS_COMMAND: &str = "kdu_compress";
const EXPAND_COMMAND: &str = "kdu_expand";

/// JPEG2000 codec backed by the Kakadu `kdu_compress` and `kdu_expand`
/// executables found under one base directory.
#[derive(Debug, Clone)]
pub struct Kakadu {
    base_path: PathBuf,
    timeout: Option<Duration>,
}

impl Kakadu {
    /// Fails if `kdu_compress` is missing. A missing `kdu_expand` is only
    /// logged, since compression alone still works without lossless checks.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let kakadu = Self {
            base_path: base_path.into(),
            timeout: None,
        };
        let compress = kakadu.command_path(COMPRESS_COMMAND);
        if !access::cmd_is_executable(&compress) {
            return Err(ProcessingError::ToolNotFound(compress));
        }
        let expand = kakadu.command_path(EXPAND_COMMAND);
        if !access::cmd_is_executable(&expand) {
            error!(
                path = %expand.display(),
                "Could not find kdu_expand. Lossless checks will not work"
            );
        }
        Ok(kakadu)
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_path(&self, command: &str) -> PathBuf {
        if self.base_path.as_os_str().is_empty() {
            PathBuf::from(command)
        } else {
            self.base_path.join(command)
        }
    }

    fn run_command(
        &self,
        command: &str,
        inputs: &[PathBuf],
        output: &Path,
        args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        // -i takes every input at once
        for input in inputs {
            access::ensure_readable(input)?;
        }
        access::ensure_parent_writable(output)?;

        let input_option = inputs
            .iter()
            .map(|p| p.to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join(",");

        ExternalCommand::new(self.command_path(command))
            .arg("-i")
            .arg(input_option)
            .arg("-o")
            .path_arg(output)
            .args(args.iter().cloned())
            .timeout(self.timeout)
            .cancellation(cancel)
            .run()?;
        Ok(())
    }
}

impl Jpeg2000Codec for Kakadu {
    fn compress(
        &self,
        input: &CompressInput,
        output: &Path,
        options: &ConversionOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        input.validate()?;
        self.run_command(COMPRESS_COMMAND, input.paths(), output, &options.to_args(), cancel)?;
        debug!(output = %output.display(), "kdu_compress finished");
        Ok(())
    }

    fn expand(
        &self,
        input: &Path,
        output: &Path,
        args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.run_command(EXPAND_COMMAND, &[input.to_path_buf()], output, args, cancel)?;
        debug!(output = %output.display(), "kdu_expand finished");
        Ok(())
    }
}
