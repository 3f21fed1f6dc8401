//! Derivative generation configuration types

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::image_pipeline::codecs::{ConversionOptions, DEFAULT_EXIFTOOL_PATH, DEFAULT_IMAGE_MAGICK_PATH};
use crate::image_pipeline::common::cancel::CancellationToken;
use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::derivatives::set::DerivativeKind;
use crate::image_pipeline::validation::{PixelChecksum, SuitabilityPolicy};

pub const DEFAULT_TIFF_FILENAME: &str = "full.tiff";
pub const DEFAULT_EMBEDDED_METADATA_FILENAME: &str = "full.xmp";
pub const DEFAULT_JPG_FILENAME: &str = "full.jpg";
pub const DEFAULT_LOSSLESS_JP2_FILENAME: &str = "full_lossless.jp2";

pub const DEFAULT_JPG_THUMBNAIL_RESIZE_VALUE: f64 = 0.6;
pub const DEFAULT_JPG_HIGH_QUALITY_VALUE: u8 = 92;
pub const DEFAULT_KAKADU_BASE_PATH: &str = "";
pub const DEFAULT_CODEC_TIMEOUT: Duration = Duration::from_secs(60 * 60);

/// File names of the derivatives inside the output folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivativeFilenames {
    pub jpg: String,
    pub jp2: String,
    pub xmp: String,
    pub tiff: String,
}

impl Default for DerivativeFilenames {
    fn default() -> Self {
        Self {
            jpg: DEFAULT_JPG_FILENAME.to_string(),
            jp2: DEFAULT_LOSSLESS_JP2_FILENAME.to_string(),
            xmp: DEFAULT_EMBEDDED_METADATA_FILENAME.to_string(),
            tiff: DEFAULT_TIFF_FILENAME.to_string(),
        }
    }
}

impl DerivativeFilenames {
    /// Names built from the source file stem: `scan.tif` gives `scan.jpg`,
    /// `scan.jp2`, `scan.xmp` and `scan.tiff`.
    pub fn from_source(source: &Path) -> Result<Self> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ProcessingError::InvalidOutputPath {
                path: source.to_path_buf(),
                reason: "source has no usable file name".to_string(),
            })?;
        Ok(Self {
            jpg: format!("{stem}.jpg"),
            jp2: format!("{stem}.jp2"),
            xmp: format!("{stem}.xmp"),
            tiff: format!("{stem}.tiff"),
        })
    }

    pub fn name_for(&self, kind: DerivativeKind) -> &str {
        match kind {
            DerivativeKind::AccessCopy => &self.jpg,
            DerivativeKind::PreservationCopy => &self.jp2,
            DerivativeKind::EmbeddedMetadata => &self.xmp,
            DerivativeKind::MasterCopy => &self.tiff,
        }
    }
}

/// Configuration for a [`DerivativeFilesGenerator`](super::DerivativeFilesGenerator)
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Directory holding `kdu_compress` and `kdu_expand`; empty means `PATH`
    pub kakadu_base_path: PathBuf,
    /// Directory holding the ImageMagick executables
    pub image_magick_path: PathBuf,
    pub exiftool_path: PathBuf,
    /// Quality of a full-size access copy, 1 to 95
    pub jpg_high_quality: u8,
    /// Scale factor of a thumbnail access copy, in (0, 1]
    pub jpg_thumbnail_resize: f64,
    pub compress_options: ConversionOptions,
    /// Use `filenames` rather than names derived from the source
    pub use_default_filenames: bool,
    pub filenames: DerivativeFilenames,
    /// Bitonal images never need a profile, even when this is set
    pub require_icc_profile_for_greyscale: bool,
    pub require_icc_profile_for_colour: bool,
    /// Upper bound on each external tool invocation
    pub codec_timeout: Option<Duration>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            kakadu_base_path: PathBuf::from(DEFAULT_KAKADU_BASE_PATH),
            image_magick_path: PathBuf::from(DEFAULT_IMAGE_MAGICK_PATH),
            exiftool_path: PathBuf::from(DEFAULT_EXIFTOOL_PATH),
            jpg_high_quality: DEFAULT_JPG_HIGH_QUALITY_VALUE,
            jpg_thumbnail_resize: DEFAULT_JPG_THUMBNAIL_RESIZE_VALUE,
            compress_options: ConversionOptions::lossless(),
            use_default_filenames: true,
            filenames: DerivativeFilenames::default(),
            require_icc_profile_for_greyscale: false,
            require_icc_profile_for_colour: true,
            codec_timeout: Some(DEFAULT_CODEC_TIMEOUT),
        }
    }
}

impl GeneratorConfig {
    pub fn builder() -> GeneratorConfigBuilder {
        GeneratorConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=95).contains(&self.jpg_high_quality) {
            return Err(ProcessingError::InvalidOption(format!(
                "jpg_high_quality must be between 1 and 95, got {}",
                self.jpg_high_quality
            )));
        }
        if !(self.jpg_thumbnail_resize > 0.0 && self.jpg_thumbnail_resize <= 1.0) {
            return Err(ProcessingError::InvalidOption(format!(
                "jpg_thumbnail_resize must be in (0, 1], got {}",
                self.jpg_thumbnail_resize
            )));
        }
        if self.codec_timeout == Some(Duration::ZERO) {
            return Err(ProcessingError::InvalidOption("codec_timeout must not be zero".to_string()));
        }
        Ok(())
    }

    pub fn suitability_policy(&self) -> SuitabilityPolicy {
        SuitabilityPolicy {
            require_icc_profile_for_greyscale: self.require_icc_profile_for_greyscale,
            require_icc_profile_for_colour: self.require_icc_profile_for_colour,
        }
    }

    pub fn filenames_for(&self, source: &Path) -> Result<DerivativeFilenames> {
        if self.use_default_filenames {
            Ok(self.filenames.clone())
        } else {
            DerivativeFilenames::from_source(source)
        }
    }
}

/// Builder for GeneratorConfig
#[derive(Default)]
pub struct GeneratorConfigBuilder {
    kakadu_base_path: Option<PathBuf>,
    image_magick_path: Option<PathBuf>,
    exiftool_path: Option<PathBuf>,
    jpg_high_quality: Option<u8>,
    jpg_thumbnail_resize: Option<f64>,
    compress_options: Option<ConversionOptions>,
    use_default_filenames: Option<bool>,
    filenames: Option<DerivativeFilenames>,
    require_icc_profile_for_greyscale: Option<bool>,
    require_icc_profile_for_colour: Option<bool>,
    codec_timeout: Option<Option<Duration>>,
}

impl GeneratorConfigBuilder {
    pub fn kakadu_base_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.kakadu_base_path = Some(path.into());
        self
    }

    pub fn image_magick_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.image_magick_path = Some(path.into());
        self
    }

    pub fn exiftool_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.exiftool_path = Some(path.into());
        self
    }

    pub fn jpg_high_quality(mut self, quality: u8) -> Self {
        self.jpg_high_quality = Some(quality);
        self
    }

    pub fn jpg_thumbnail_resize(mut self, resize: f64) -> Self {
        self.jpg_thumbnail_resize = Some(resize);
        self
    }

    pub fn compress_options(mut self, options: ConversionOptions) -> Self {
        self.compress_options = Some(options);
        self
    }

    pub fn use_default_filenames(mut self, enable: bool) -> Self {
        self.use_default_filenames = Some(enable);
        self
    }

    pub fn filenames(mut self, filenames: DerivativeFilenames) -> Self {
        self.filenames = Some(filenames);
        self
    }

    pub fn require_icc_profile_for_greyscale(mut self, require: bool) -> Self {
        self.require_icc_profile_for_greyscale = Some(require);
        self
    }

    pub fn require_icc_profile_for_colour(mut self, require: bool) -> Self {
        self.require_icc_profile_for_colour = Some(require);
        self
    }

    pub fn codec_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.codec_timeout = Some(timeout);
        self
    }

    pub fn build(self) -> GeneratorConfig {
        let default = GeneratorConfig::default();
        GeneratorConfig {
            kakadu_base_path: self.kakadu_base_path.unwrap_or(default.kakadu_base_path),
            image_magick_path: self.image_magick_path.unwrap_or(default.image_magick_path),
            exiftool_path: self.exiftool_path.unwrap_or(default.exiftool_path),
            jpg_high_quality: self.jpg_high_quality.unwrap_or(default.jpg_high_quality),
            jpg_thumbnail_resize: self.jpg_thumbnail_resize.unwrap_or(default.jpg_thumbnail_resize),
            compress_options: self.compress_options.unwrap_or(default.compress_options),
            use_default_filenames: self.use_default_filenames.unwrap_or(default.use_default_filenames),
            filenames: self.filenames.unwrap_or(default.filenames),
            require_icc_profile_for_greyscale: self
                .require_icc_profile_for_greyscale
                .unwrap_or(default.require_icc_profile_for_greyscale),
            require_icc_profile_for_colour: self
                .require_icc_profile_for_colour
                .unwrap_or(default.require_icc_profile_for_colour),
            codec_timeout: self.codec_timeout.unwrap_or(default.codec_timeout),
        }
    }
}

/// Per-call options for deriving files from a TIFF master.
#[derive(Debug, Clone)]
pub struct TiffDerivativeOptions {
    /// Copy the source TIFF into the output folder
    pub include_tiff: bool,
    /// Extract embedded metadata into an XMP sidecar
    pub save_embedded_metadata: bool,
    /// Resized thumbnail access copy rather than a full-size high quality one
    pub create_jpg_as_thumbnail: bool,
    /// Verify the JPEG2000 is pixel-identical to the source. Forced on for
    /// sources with an alpha channel.
    pub check_lossless: bool,
    /// Precomputed checksum of the source pixels
    pub source_checksum: Option<PixelChecksum>,
    pub cancellation: Option<CancellationToken>,
}

impl Default for TiffDerivativeOptions {
    fn default() -> Self {
        Self {
            include_tiff: false,
            save_embedded_metadata: true,
            create_jpg_as_thumbnail: true,
            check_lossless: true,
            source_checksum: None,
            cancellation: None,
        }
    }
}

/// Per-call options for deriving files from a JPEG.
#[derive(Debug, Clone)]
pub struct JpgDerivativeOptions {
    pub save_embedded_metadata: bool,
    /// Verify the JPEG2000 against the TIFF made from the JPEG
    pub check_lossless: bool,
    pub cancellation: Option<CancellationToken>,
}

impl Default for JpgDerivativeOptions {
    fn default() -> Self {
        Self {
            save_embedded_metadata: true,
            check_lossless: true,
            cancellation: None,
        }
    }
}
