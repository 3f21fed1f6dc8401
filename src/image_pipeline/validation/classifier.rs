use std::fmt;
use std::path::Path;

use tracing::{instrument, warn};

use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raster::{probe, ColourMode};

/// Which colour modes must carry an embedded ICC profile. Bitonal images never
/// need one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SuitabilityPolicy {
    pub require_icc_profile_for_greyscale: bool,
    pub require_icc_profile_for_colour: bool,
}

impl Default for SuitabilityPolicy {
    fn default() -> Self {
        Self {
            require_icc_profile_for_greyscale: false,
            require_icc_profile_for_colour: true,
        }
    }
}

impl SuitabilityPolicy {
    pub fn requires_profile(&self, mode: ColourMode) -> bool {
        match mode {
            ColourMode::Bitonal => false,
            ColourMode::Greyscale => self.require_icc_profile_for_greyscale,
            _ => self.require_icc_profile_for_colour,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuitabilityWarning {
    MissingIccProfile,
    /// Only the first frame is converted
    MultipleFrames { frames: usize },
    /// Unassociated alpha may not survive the round trip through JPEG2000
    AlphaChannelMayBeDropped,
}

impl fmt::Display for SuitabilityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SuitabilityWarning::MissingIccProfile => f.write_str("no ICC profile embedded"),
            SuitabilityWarning::MultipleFrames { frames } => {
                write!(f, "{frames} frames, only the first one will be converted")
            }
            SuitabilityWarning::AlphaChannelMayBeDropped => {
                f.write_str("alpha channel may be dropped on conversion, verification required")
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suitability {
    pub mode: ColourMode,
    pub accepted: bool,
    /// The conversion has to be checked with the pixel verifier
    pub must_verify: bool,
    pub warnings: Vec<SuitabilityWarning>,
}

const ACCEPTED_MODES: [ColourMode; 5] = [
    ColourMode::Rgb,
    ColourMode::Rgba,
    ColourMode::Rgbx,
    ColourMode::Greyscale,
    ColourMode::Bitonal,
];

/// Checks an image is in a colour configuration that converts to JPEG2000
/// reliably.
///
/// Fails with [`ProcessingError::UnsupportedFormat`] for modes outside the
/// accepted set (16-bit variants included) and with
/// [`ProcessingError::MissingProfile`] when the policy demands a profile the
/// image lacks. Everything else is reported as a warning.
#[instrument(skip(policy), fields(path = %path.display()))]
pub fn check_image_suitable_for_jp2_conversion(path: &Path, policy: &SuitabilityPolicy) -> Result<Suitability> {
    let info = probe(path)?;
    let mode = info.mode;
    if !ACCEPTED_MODES.contains(&mode) {
        return Err(ProcessingError::UnsupportedFormat {
            mode: mode.to_string(),
            path: path.to_path_buf(),
        });
    }

    let mut warnings = Vec::new();
    let must_verify = matches!(mode, ColourMode::Rgba | ColourMode::Rgbx);
    if must_verify {
        warn!(
            mode = %mode,
            "The JPEG2000 may convert back to RGB if the alpha channel is unassociated. The conversion must be verified"
        );
        warnings.push(SuitabilityWarning::AlphaChannelMayBeDropped);
    }

    if info.icc_profile.is_none() {
        if policy.requires_profile(mode) {
            return Err(ProcessingError::MissingProfile {
                mode,
                path: path.to_path_buf(),
            });
        }
        warn!("No ICC profile embedded");
        warnings.push(SuitabilityWarning::MissingIccProfile);
    }

    if info.is_multi_frame() {
        warn!(frames = info.frame_count, "File has multiple frames: only the first one will be converted");
        warnings.push(SuitabilityWarning::MultipleFrames {
            frames: info.frame_count,
        });
    }

    Ok(Suitability {
        mode,
        accepted: true,
        must_verify,
        warnings,
    })
}
