use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::debug;

use crate::image_pipeline::codecs::metadata::MetadataExtractor;
use crate::image_pipeline::common::access;
use crate::image_pipeline::common::cancel::CancellationToken;
use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::common::process::ExternalCommand;

pub const DEFAULT_EXIFTOOL_PATH: &str = "exiftool";

/// Maps the ICC profile description onto `photoshop:ICCProfile` in the sidecar.
const ICC_PROFILE_NAME_MAPPING: &str = "-ICC_Profile:ProfileDescription>ICCProfileName";

#[derive(Debug, Clone)]
pub struct ExifTool {
    exiftool_path: PathBuf,
    timeout: Option<Duration>,
}

impl ExifTool {
    pub fn new(exiftool_path: impl Into<PathBuf>) -> Result<Self> {
        let exiftool_path = exiftool_path.into();
        if !access::cmd_is_executable(&exiftool_path) {
            return Err(ProcessingError::ToolNotFound(exiftool_path));
        }
        Ok(Self {
            exiftool_path,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn command(&self, cancel: Option<&CancellationToken>) -> ExternalCommand {
        ExternalCommand::new(&self.exiftool_path)
            .timeout(self.timeout)
            .cancellation(cancel)
    }
}

impl MetadataExtractor for ExifTool {
    fn copy_embedded_metadata(
        &self,
        input: &Path,
        output: &Path,
        xmp_only: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        access::ensure_readable(input)?;
        access::ensure_file_writable(output)?;

        let mut command = self
            .command(cancel)
            .arg("-tagsFromFile")
            .path_arg(input)
            .arg("-overwrite_original");
        if xmp_only {
            command = command.arg("-xmp:all<all");
        }
        command.path_arg(output).run()?;
        debug!(input = %input.display(), output = %output.display(), xmp_only, "Copied embedded metadata");
        Ok(())
    }

    fn extract_xmp_to_sidecar(
        &self,
        input: &Path,
        output: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        if output.extension().and_then(|e| e.to_str()) != Some("xmp") {
            return Err(ProcessingError::InvalidOutputPath {
                path: output.to_path_buf(),
                reason: "XMP sidecar needs an .xmp extension".to_string(),
            });
        }
        access::ensure_readable(input)?;
        access::ensure_parent_writable(output)?;
        // exiftool -o refuses to overwrite
        if output.is_file() {
            fs::remove_file(output)?;
        }

        self.command(cancel)
            .arg("-tagsFromFile")
            .path_arg(input)
            .arg("-all")
            .arg(ICC_PROFILE_NAME_MAPPING)
            .arg("-o")
            .path_arg(output)
            .run()?;
        debug!(input = %input.display(), output = %output.display(), "Extracted XMP sidecar");
        Ok(())
    }
}
