use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::image_pipeline::raster::ColourMode;
use crate::image_pipeline::validation::Jp2Report;

#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Unsupported colour mode {mode} for {path}")]
    UnsupportedFormat { mode: String, path: PathBuf },

    #[error("No ICC profile embedded in {path} ({mode} images require one)")]
    MissingProfile { mode: ColourMode, path: PathBuf },

    #[error(
        "Converted file {converted_file} has colour mode {converted_mode}, which does not match {source_mode} of {source_file}"
    )]
    ColourModeMismatch {
        source_mode: ColourMode,
        converted_mode: ColourMode,
        source_file: PathBuf,
        converted_file: PathBuf,
    },

    #[error("Converted file {converted_file} has a different colour profile from {source_file}")]
    ColourProfileMismatch { source_file: PathBuf, converted_file: PathBuf },

    #[error("Converted file {converted_file} does not visually match original {source_file}")]
    VisualMismatch { source_file: PathBuf, converted_file: PathBuf },

    #[error("{path} failed JP2 structural validation:\n{report}")]
    InvalidJp2 { path: PathBuf, report: Jp2Report },

    #[error("{command} exited with {status}. Command: {command_line}\nOutput:\n{output}")]
    Codec {
        command: String,
        args: Vec<String>,
        command_line: String,
        status: String,
        output: String,
    },

    #[error("{command} did not finish within {timeout:?}. Command: {command_line}")]
    CodecTimeout {
        command: String,
        command_line: String,
        timeout: Duration,
    },

    #[error("Processing was cancelled before {stage}")]
    Cancelled { stage: String },

    #[error("Could not find executable {0}")]
    ToolNotFound(PathBuf),

    #[error("Could not read input file {0}")]
    InputNotReadable(PathBuf),

    #[error("Could not write to output path {0}")]
    OutputNotWritable(PathBuf),

    #[error("Invalid output path {path}: {reason}")]
    InvalidOutputPath { path: PathBuf, reason: String },

    #[error("{0} is not a format the native decoders recognise")]
    UnrecognisedFormat(PathBuf),

    #[error("Failed to decode {path}: {message}")]
    Decode { path: PathBuf, message: String },

    #[error("Invalid option: {0}")]
    InvalidOption(String),

    #[error("Refusing to verify {0}: pixel verification is only defined for lossless JPEG2000 options")]
    LossyVerification(PathBuf),

    #[error("Preservation copy {preservation_copy} was written but failed verification: {cause}")]
    VerificationFailed {
        preservation_copy: PathBuf,
        outputs: Vec<PathBuf>,
        #[source]
        cause: Box<ProcessingError>,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl ProcessingError {
    pub(crate) fn decode(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        Self::Decode {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True for the failures raised by the verification gates, as opposed to
    /// failures that stopped a derivative from being produced at all.
    pub fn is_verification_failure(&self) -> bool {
        matches!(
            self,
            Self::ColourModeMismatch { .. }
                | Self::ColourProfileMismatch { .. }
                | Self::VisualMismatch { .. }
                | Self::InvalidJp2 { .. }
                | Self::VerificationFailed { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ProcessingError>;
