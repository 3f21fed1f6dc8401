use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;
use tracing::{debug, info, info_span, instrument, warn};

use crate::image_pipeline::codecs::{
    CompressInput, ExifTool, ImageMagick, Jpeg2000Codec, Kakadu, MetadataExtractor, RasterCodec,
};
use crate::image_pipeline::common::access;
use crate::image_pipeline::common::cancel::{self, CancellationToken};
use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::conversions::ImageConverter;
use crate::image_pipeline::derivatives::config::{
    DerivativeFilenames, GeneratorConfig, JpgDerivativeOptions, TiffDerivativeOptions,
};
use crate::image_pipeline::derivatives::set::{DerivativeKind, DerivativeSet};
use crate::image_pipeline::raster::probe;
use crate::image_pipeline::validation::{
    check_colour_profiles_match, check_image_suitable_for_jp2_conversion, check_visually_identical,
    ensure_valid_jp2, Jp2Validator, NativeJp2Validator, PixelChecksum, Suitability,
};

const SCRATCH_PREFIX: &str = "image-processing_";
const SCRATCH_SOURCE_TIFF: &str = "source.tif";
const RECONVERTED_TIFF: &str = "reconverted.tif";
// Outputs are built under these names in scratch space. The sidecar keeps an
// `.xmp` extension whatever its published name, since exiftool picks the
// output format by extension.
const STAGED_ACCESS_COPY: &str = "access.jpg";
const STAGED_SIDECAR: &str = "embedded.xmp";
const STAGED_PRESERVATION_COPY: &str = "preservation.jp2";
const EXPAND_ARGS: [&str; 1] = ["-fussy"];

/// Produces the access copy, preservation copy and metadata sidecar for a
/// source image, verifying the preservation copy against its source.
pub struct DerivativeFilesGenerator<K, R, M, V>
where
    K: Jpeg2000Codec,
    R: RasterCodec,
    M: MetadataExtractor,
    V: Jp2Validator,
{
    converter: ImageConverter<K, R>,
    exiftool: M,
    validator: V,
    config: GeneratorConfig,
}

impl DerivativeFilesGenerator<Kakadu, ImageMagick, ExifTool, NativeJp2Validator> {
    /// Locates the external tools named by `config`.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        let kakadu = Kakadu::new(&config.kakadu_base_path)?.with_timeout(config.codec_timeout);
        let image_magick = ImageMagick::new(&config.image_magick_path)?.with_timeout(config.codec_timeout);
        let exiftool = ExifTool::new(&config.exiftool_path)?.with_timeout(config.codec_timeout);
        Ok(Self {
            converter: ImageConverter::with_custom(kakadu, image_magick),
            exiftool,
            validator: NativeJp2Validator,
            config,
        })
    }
}

impl<K, R, M, V> DerivativeFilesGenerator<K, R, M, V>
where
    K: Jpeg2000Codec,
    R: RasterCodec,
    M: MetadataExtractor,
    V: Jp2Validator,
{
    pub fn with_custom(kakadu: K, raster: R, metadata: M, validator: V, config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            converter: ImageConverter::with_custom(kakadu, raster),
            exiftool: metadata,
            validator,
            config,
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn converter(&self) -> &ImageConverter<K, R> {
        &self.converter
    }

    /// Generates derivatives from a TIFF master into `output_folder`.
    ///
    /// Every output is built in scratch space and only moved into
    /// `output_folder` once all of them exist, so a classification, option or
    /// codec failure leaves files already in the folder untouched. The
    /// preservation copy is verified after it has been placed: a verification
    /// failure leaves every output in place and is reported as
    /// [`ProcessingError::VerificationFailed`], while a failure to expand it
    /// removes what this run placed.
    #[instrument(skip(self, options), fields(source = %tiff.display(), output_folder = %output_folder.display()))]
    pub fn generate_derivatives_from_tiff(
        &self,
        tiff: &Path,
        output_folder: &Path,
        options: &TiffDerivativeOptions,
    ) -> Result<DerivativeSet> {
        info!("Generating derivatives from TIFF");
        let suitability = {
            let _span = info_span!("classify").entered();
            check_image_suitable_for_jp2_conversion(tiff, &self.config.suitability_policy())?
        };
        let check_lossless = options.check_lossless || suitability.must_verify;
        self.ensure_lossless_options(check_lossless, tiff)?;
        access::ensure_dir_writable(output_folder)?;
        let filenames = self.config.filenames_for(tiff)?;

        let scratch = scratch_dir()?;
        let mut outputs = DerivativeSet::new();
        let result = self.tiff_derivatives(
            tiff,
            output_folder,
            &filenames,
            scratch.path(),
            &suitability,
            check_lossless,
            options,
            &mut outputs,
        );
        close_scratch(scratch);
        finish(result, outputs)
    }

    #[allow(clippy::too_many_arguments)]
    fn tiff_derivatives(
        &self,
        tiff: &Path,
        output_folder: &Path,
        filenames: &DerivativeFilenames,
        scratch: &Path,
        suitability: &Suitability,
        check_lossless: bool,
        options: &TiffDerivativeOptions,
        outputs: &mut DerivativeSet,
    ) -> Result<()> {
        let cancel = options.cancellation.as_ref();
        let master = {
            let _span = info_span!("normalise").entered();
            normalised_master(tiff, scratch, cancel)?
        };
        let mut staged = Vec::new();

        {
            let _span = info_span!("access_copy").entered();
            cancel::check(cancel, "access copy")?;
            let jpg = scratch.join(STAGED_ACCESS_COPY);
            if suitability.mode.has_alpha() {
                warn!(mode = %suitability.mode, "The alpha channel will be removed from the access copy");
            }
            let (resize, quality) = if options.create_jpg_as_thumbnail {
                (Some(self.config.jpg_thumbnail_resize), None)
            } else {
                (None, Some(self.config.jpg_high_quality))
            };
            self.converter.convert_to_jpg(&master, &jpg, resize, quality, cancel)?;
            self.exiftool.copy_embedded_metadata(tiff, &jpg, false, cancel)?;
            staged.push(Staged::moved(DerivativeKind::AccessCopy, jpg, output_folder.join(&filenames.jpg)));
        }

        if options.save_embedded_metadata {
            let _span = info_span!("embedded_metadata").entered();
            let xmp = scratch.join(STAGED_SIDECAR);
            self.exiftool.extract_xmp_to_sidecar(tiff, &xmp, cancel)?;
            staged.push(Staged::moved(DerivativeKind::EmbeddedMetadata, xmp, output_folder.join(&filenames.xmp)));
        }

        if options.include_tiff {
            staged.push(Staged::copied(DerivativeKind::MasterCopy, tiff, output_folder.join(&filenames.tiff)));
        }

        let _span = info_span!("preservation_copy").entered();
        let staged_jp2 = scratch.join(STAGED_PRESERVATION_COPY);
        self.generate_jp2_from_tiff(&master, &staged_jp2, cancel)?;
        let jp2 = output_folder.join(&filenames.jp2);
        staged.push(Staged::moved(DerivativeKind::PreservationCopy, staged_jp2, jp2.clone()));

        publish(staged, outputs, cancel)?;
        self.validate_jp2_conversion(&master, &jp2, check_lossless, options.source_checksum.as_ref(), cancel)
    }

    /// Generates derivatives from a JPEG. The JPEG itself becomes the access
    /// copy, and the preservation copy is made by way of an uncompressed TIFF.
    #[instrument(skip(self, options), fields(source = %jpg.display(), output_folder = %output_folder.display()))]
    pub fn generate_derivatives_from_jpg(
        &self,
        jpg: &Path,
        output_folder: &Path,
        options: &JpgDerivativeOptions,
    ) -> Result<DerivativeSet> {
        info!("Generating derivatives from JPEG. There may be some loss converting from a lossy source");
        {
            let _span = info_span!("classify").entered();
            check_image_suitable_for_jp2_conversion(jpg, &self.config.suitability_policy())?;
        }
        self.ensure_lossless_options(options.check_lossless, jpg)?;
        access::ensure_dir_writable(output_folder)?;
        let filenames = self.config.filenames_for(jpg)?;

        let scratch = scratch_dir()?;
        let mut outputs = DerivativeSet::new();
        let result = self.jpg_derivatives(jpg, output_folder, &filenames, scratch.path(), options, &mut outputs);
        close_scratch(scratch);
        finish(result, outputs)
    }

    fn jpg_derivatives(
        &self,
        jpg: &Path,
        output_folder: &Path,
        filenames: &DerivativeFilenames,
        scratch: &Path,
        options: &JpgDerivativeOptions,
        outputs: &mut DerivativeSet,
    ) -> Result<()> {
        let cancel = options.cancellation.as_ref();
        let mut staged = vec![Staged::copied(DerivativeKind::AccessCopy, jpg, output_folder.join(&filenames.jpg))];

        if options.save_embedded_metadata {
            let _span = info_span!("embedded_metadata").entered();
            let xmp = scratch.join(STAGED_SIDECAR);
            self.exiftool.extract_xmp_to_sidecar(jpg, &xmp, cancel)?;
            staged.push(Staged::moved(DerivativeKind::EmbeddedMetadata, xmp, output_folder.join(&filenames.xmp)));
        }

        let tiff = scratch.join(SCRATCH_SOURCE_TIFF);
        {
            let _span = info_span!("normalise").entered();
            self.converter.convert_to_tiff(jpg, &tiff, cancel)?;
            self.exiftool.copy_embedded_metadata(jpg, &tiff, false, cancel)?;
            check_colour_profiles_match(jpg, &tiff)?;
        }

        let _span = info_span!("preservation_copy").entered();
        let staged_jp2 = scratch.join(STAGED_PRESERVATION_COPY);
        self.generate_jp2_from_tiff(&tiff, &staged_jp2, cancel)?;
        let jp2 = output_folder.join(&filenames.jp2);
        staged.push(Staged::moved(DerivativeKind::PreservationCopy, staged_jp2, jp2.clone()));

        publish(staged, outputs, cancel)?;
        self.validate_jp2_conversion(&tiff, &jp2, options.check_lossless, None, cancel)
    }

    /// Compresses `tiff` with the configured options, marking the last
    /// channel as alpha when the source has one.
    pub fn generate_jp2_from_tiff(&self, tiff: &Path, jp2: &Path, cancel: Option<&CancellationToken>) -> Result<()> {
        let mode = probe(tiff)?.mode;
        let options = if mode.has_alpha() {
            self.config.compress_options.clone().with_alpha()
        } else {
            self.config.compress_options.clone()
        };
        debug!(options = %options, "Compressing preservation copy");
        self.converter
            .jpeg2000_codec()
            .compress(&CompressInput::Single(tiff.to_path_buf()), jp2, &options, cancel)?;
        info!(path = %jp2.display(), "Preservation copy compressed");
        Ok(())
    }

    /// Structural validation, then the pixel comparison when `check_lossless`
    /// is set.
    pub fn validate_jp2_conversion(
        &self,
        tiff: &Path,
        jp2: &Path,
        check_lossless: bool,
        source_checksum: Option<&PixelChecksum>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        ensure_valid_jp2(&self.validator, jp2)?;
        if check_lossless {
            self.ensure_lossless_options(true, tiff)?;
            self.check_conversion_was_lossless(tiff, jp2, source_checksum, cancel)?;
        }
        Ok(())
    }

    /// Expands `jp2` into scratch space and compares it with `source`.
    #[instrument(skip(self, source_checksum, cancel), fields(source = %source.display(), jp2 = %jp2.display()))]
    pub fn check_conversion_was_lossless(
        &self,
        source: &Path,
        jp2: &Path,
        source_checksum: Option<&PixelChecksum>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        let scratch = scratch_dir()?;
        let reconverted = scratch.path().join(RECONVERTED_TIFF);
        let args: Vec<String> = EXPAND_ARGS.iter().map(|a| a.to_string()).collect();

        let result = self
            .converter
            .jpeg2000_codec()
            .expand(jp2, &reconverted, &args, cancel)
            .and_then(|_| check_visually_identical(source, &reconverted, source_checksum));
        close_scratch(scratch);
        result?;
        info!("Preservation copy is lossless");
        Ok(())
    }

    fn ensure_lossless_options(&self, verify: bool, path: &Path) -> Result<()> {
        if verify && !self.config.compress_options.is_lossless() {
            return Err(ProcessingError::LossyVerification(path.to_path_buf()));
        }
        Ok(())
    }
}

/// The external tools pick a decoder by extension, so a TIFF with any other
/// extension is copied into scratch space under a `.tif` name.
fn normalised_master(tiff: &Path, scratch: &Path, cancel: Option<&CancellationToken>) -> Result<PathBuf> {
    let is_tiff_extension = tiff
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
    if is_tiff_extension {
        return Ok(tiff.to_path_buf());
    }
    cancel::check(cancel, "normalise")?;
    let copy = scratch.join(SCRATCH_SOURCE_TIFF);
    fs::copy(tiff, &copy)?;
    debug!(path = %copy.display(), "Copied source to scratch with a .tif extension");
    Ok(copy)
}

/// An output waiting in scratch space (or, for plain copies, at its source)
/// to be placed in the output folder.
struct Staged {
    kind: DerivativeKind,
    from: PathBuf,
    destination: PathBuf,
    keep_source: bool,
}

impl Staged {
    fn moved(kind: DerivativeKind, from: PathBuf, destination: PathBuf) -> Self {
        Self { kind, from, destination, keep_source: false }
    }

    fn copied(kind: DerivativeKind, from: &Path, destination: PathBuf) -> Self {
        Self { kind, from: from.to_path_buf(), destination, keep_source: true }
    }
}

/// Places every staged output once all of them have been produced. A file is
/// recorded in `outputs` only after it has reached its destination, so a
/// failure part way through discards just what this run placed.
fn publish(staged: Vec<Staged>, outputs: &mut DerivativeSet, cancel: Option<&CancellationToken>) -> Result<()> {
    let _span = info_span!("publish").entered();
    cancel::check(cancel, "publish")?;
    for file in staged {
        if file.keep_source {
            access::copy_into_place(&file.from, &file.destination)?;
        } else {
            access::move_into_place(&file.from, &file.destination)?;
        }
        info!(kind = %file.kind, path = %file.destination.display(), "Derivative written");
        outputs.push(file.kind, file.destination);
    }
    Ok(())
}

fn scratch_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix(SCRATCH_PREFIX).tempdir()?)
}

fn close_scratch(scratch: TempDir) {
    let path = scratch.path().to_path_buf();
    if let Err(e) = scratch.close() {
        warn!(path = %path.display(), error = %e, "Failed to remove scratch directory");
    }
}

fn finish(result: Result<()>, outputs: DerivativeSet) -> Result<DerivativeSet> {
    match result {
        Ok(()) => {
            info!(files = outputs.len(), "Derivatives generated");
            Ok(outputs)
        }
        Err(cause) if cause.is_verification_failure() => {
            let Some(preservation_copy) = outputs.get(DerivativeKind::PreservationCopy).map(Path::to_path_buf) else {
                outputs.discard();
                return Err(cause);
            };
            warn!(
                path = %preservation_copy.display(),
                error = %cause,
                "Preservation copy left in place after failed verification"
            );
            Err(ProcessingError::VerificationFailed {
                preservation_copy,
                outputs: outputs.paths(),
                cause: Box::new(cause),
            })
        }
        Err(e) => {
            outputs.discard();
            Err(e)
        }
    }
}
