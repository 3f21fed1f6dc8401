use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};

use crate::image_pipeline::codecs::{
    CompressInput, ConversionOptions, ImageMagick, Jpeg2000Codec, Kakadu, MetadataExtractor, RasterCodec,
};
use crate::image_pipeline::common::cancel::{self, CancellationToken};
use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raster::{probe, probe_colour_mode};

/// Converts between image formats by driving a JPEG2000 codec and a raster
/// tool.
pub struct ImageConverter<K: Jpeg2000Codec, R: RasterCodec> {
    kakadu: K,
    image_magick: R,
}

impl ImageConverter<Kakadu, ImageMagick> {
    pub fn new(kakadu_base_path: impl Into<PathBuf>, image_magick_path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            kakadu: Kakadu::new(kakadu_base_path)?,
            image_magick: ImageMagick::new(image_magick_path)?,
        })
    }
}

impl<K: Jpeg2000Codec, R: RasterCodec> ImageConverter<K, R> {
    pub fn with_custom(kakadu: K, image_magick: R) -> Self {
        Self { kakadu, image_magick }
    }

    pub fn jpeg2000_codec(&self) -> &K {
        &self.kakadu
    }

    pub fn raster_codec(&self) -> &R {
        &self.image_magick
    }

    /// Converts a file the JPEG2000 codec can read. Bitonal and greyscale
    /// sources become a three channel image built from the same input.
    #[instrument(skip(self, options, cancel), fields(input = %input.display(), output = %output.display()))]
    pub fn convert_to_jpeg2000(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let mode = probe_colour_mode(input, &self.image_magick)?;
        debug!(mode = %mode, "Source colour mode");
        if mode.is_monochrome() {
            self.convert_monochrome_to_jpeg2000(input, output, options, cancel)
        } else {
            self.convert_colour_to_jpeg2000(input, output, options, cancel)
        }
    }

    pub fn convert_colour_to_jpeg2000(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.kakadu
            .compress(&CompressInput::Single(input.to_path_buf()), output, options, cancel)
    }

    /// Copies the single channel into all three colour channels with no
    /// palette, giving a 24-bit image.
    pub fn convert_monochrome_to_jpeg2000(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let options = options
            .clone()
            .with_switch("-no_palette", None)
            .with_switch("-jp2_space", Some("sRGB"));
        self.kakadu.compress(
            &CompressInput::repeated(input, CompressInput::MAX_CHANNELS),
            output,
            &options,
            cancel,
        )
    }

    /// Converts a file the JPEG2000 codec can't read (e.g. JPEG) by way of an
    /// uncompressed scratch TIFF.
    #[instrument(skip(self, options, cancel), fields(input = %input.display(), output = %output.display()))]
    pub fn convert_unsupported_file_to_jpeg2000(
        &self,
        input: &Path,
        output: &Path,
        options: &ConversionOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let scratch = tempfile::Builder::new().prefix("image-processing_").tempdir()?;
        let scratch_tiff = scratch.path().join("source.tif");

        let result = self
            .convert_to_tiff(input, &scratch_tiff, cancel)
            .and_then(|_| cancel::check(cancel, "jpeg2000 compression"))
            .and_then(|_| self.convert_to_jpeg2000(&scratch_tiff, output, options, cancel));

        if let Err(e) = scratch.close() {
            warn!(error = %e, "Failed to remove scratch directory");
        }
        result
    }

    pub fn convert_to_tiff(&self, input: &Path, output: &Path, cancel: Option<&CancellationToken>) -> Result<()> {
        self.image_magick.convert_to_tiff(input, output, cancel)
    }

    /// JPEG of the first frame. `resize` is a factor in (0, 1], `quality` 1 to 95.
    pub fn convert_to_jpg(
        &self,
        input: &Path,
        output: &Path,
        resize: Option<f64>,
        quality: Option<u8>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        if let Some(resize) = resize {
            if !(resize > 0.0 && resize <= 1.0) {
                return Err(ProcessingError::InvalidOption(format!(
                    "resize must be in (0, 1], got {resize}"
                )));
            }
        }
        if let Some(quality) = quality {
            if !(1..=95).contains(&quality) {
                return Err(ProcessingError::InvalidOption(format!(
                    "jpg quality must be between 1 and 95, got {quality}"
                )));
            }
        }
        self.image_magick.convert_to_jpg(input, output, resize, quality, cancel)
    }

    /// Resets the virtual canvas so the image's offset is discarded. When
    /// `output` is `input` the file is rewritten in place.
    pub fn repage_image(&self, input: &Path, output: &Path, cancel: Option<&CancellationToken>) -> Result<()> {
        let post_args = ["+repage".to_string()];
        if input == output {
            return self.image_magick.mogrify(input, &[], &post_args, cancel);
        }
        self.image_magick
            .convert(&input.to_string_lossy(), &output.to_string_lossy(), &[], &post_args, cancel)
    }

    /// Transforms the pixels from the embedded ICC profile into
    /// `icc_profile`. Monochrome sources are expanded to 8-bit truecolour.
    /// Embedded metadata is then copied over from `input` with `metadata`.
    #[instrument(skip(self, metadata, cancel), fields(input = %input.display(), output = %output.display()))]
    pub fn convert_icc_profile<M: MetadataExtractor>(
        &self,
        input: &Path,
        output: &Path,
        icc_profile: &Path,
        metadata: &M,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let info = probe(input)?;
        if info.mode.is_sixteen_bit() {
            return Err(ProcessingError::UnsupportedFormat {
                mode: info.mode.to_string(),
                path: input.to_path_buf(),
            });
        }
        if info.icc_profile.is_none() {
            return Err(ProcessingError::MissingProfile {
                mode: info.mode,
                path: input.to_path_buf(),
            });
        }
        if !icc_profile.is_file() {
            return Err(ProcessingError::InputNotReadable(icc_profile.to_path_buf()));
        }

        let mut post_args = vec!["-profile".to_string(), icc_profile.to_string_lossy().into_owned()];
        if info.mode.is_monochrome() {
            info!(mode = %info.mode, "Expanding monochrome image to truecolour");
            post_args.extend(["-type".to_string(), "TrueColor".to_string()]);
        }
        self.image_magick.convert(
            &input.to_string_lossy(),
            &output.to_string_lossy(),
            &[],
            &post_args,
            cancel,
        )?;
        metadata.copy_embedded_metadata(input, output, false, cancel)
    }
}
