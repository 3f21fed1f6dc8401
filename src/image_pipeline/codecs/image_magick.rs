use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::image_pipeline::codecs::raster::RasterCodec;
use crate::image_pipeline::common::access;
use crate::image_pipeline::common::cancel::CancellationToken;
use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::common::process::{CommandOutput, ExternalCommand};

pub const DEFAULT_IMAGE_MAGICK_PATH: &str = "/usr/bin/";

/// Raster codec backed by the ImageMagick `convert`, `mogrify` and `identify`
/// executables.
#[derive(Debug, Clone)]
pub struct ImageMagick {
    base_path: PathBuf,
    timeout: Option<Duration>,
}

impl ImageMagick {
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let magick = Self {
            base_path: base_path.into(),
            timeout: None,
        };
        let convert = magick.command_path("convert");
        if !access::cmd_is_executable(&convert) {
            return Err(ProcessingError::ToolNotFound(convert));
        }
        Ok(magick)
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
        input: &str,
        output: Option<&str>,
        initial_args: &[String],
        post_args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<CommandOutput> {
        ExternalCommand::new(self.command_path(command))
            .args(initial_args.iter().cloned())
            .arg(input)
            .args(post_args.iter().cloned())
            .args(output)
            .timeout(self.timeout)
            .cancellation(cancel)
            .run()
    }
}

impl RasterCodec for ImageMagick {
    fn convert(
        &self,
        input: &str,
        output: &str,
        initial_args: &[String],
        post_args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        access::ensure_readable(Path::new(strip_frame_selector(input)))?;
        access::ensure_parent_writable(Path::new(strip_format_prefix(output)))?;
        self.run_command("convert", input, Some(output), initial_args, post_args, cancel)?;
        debug!(input, output, "convert finished");
        Ok(())
    }

    fn mogrify(
        &self,
        input: &Path,
        initial_args: &[String],
        post_args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        access::ensure_readable(input)?;
        self.run_command(
            "mogrify",
            &input.to_string_lossy(),
            None,
            initial_args,
            post_args,
            cancel,
        )?;
        Ok(())
    }

    fn identify_colourspace(&self, path: &Path) -> Result<String> {
        access::ensure_readable(path)?;
        let format_args = ["-format".to_string(), "%[colorspace]".to_string()];
        let result = self.run_command(
            "identify",
            &format!("{}[0]", path.to_string_lossy()),
            None,
            &format_args,
            &[],
            None,
        )?;
        Ok(result.output.trim().to_string())
    }
}

/// `scan.tif[0]` names the file `scan.tif`.
fn strip_frame_selector(input: &str) -> &str {
    match input.strip_suffix(']').and_then(|rest| rest.rsplit_once('[')) {
        Some((path, selector)) if !selector.is_empty() && selector.bytes().all(|b| b.is_ascii_digit() || b == b'-' || b == b',') => {
            path
        }
        _ => input,
    }
}

/// `tif:out.tif` names the file `out.tif`. Single letter prefixes are left
/// alone so Windows drive letters survive.
fn strip_format_prefix(output: &str) -> &str {
    match output.split_once(':') {
        Some((format, path)) if format.len() > 1 && format.bytes().all(|b| b.is_ascii_alphanumeric()) => path,
        _ => output,
    }
}
