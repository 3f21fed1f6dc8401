//! Pixel-equivalence verification of a converted image against its source.

use std::path::Path;

use tracing::{debug, info, instrument};

use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raster::{are_modes_equivalent, probe, ColourMode, ImageInfo, StreamEncoding};
use crate::image_pipeline::validation::checksum::{generate_pixel_checksum_as, PixelChecksum};

/// Checks the two images share a colour mode (up to the codec's expected
/// expansions) and carry byte-identical ICC profiles. Reads headers only.
#[instrument(skip_all, fields(source = %source.display(), converted = %converted.display()))]
pub fn check_colour_profiles_match(source: &Path, converted: &Path) -> Result<()> {
    compare_headers(source, converted).map(drop)
}

fn compare_headers(source: &Path, converted: &Path) -> Result<(ImageInfo, ImageInfo)> {
    let source_info = probe(source)?;
    let converted_info = probe(converted)?;

    if source_info.mode != converted_info.mode {
        if !are_modes_equivalent(source_info.mode, converted_info.mode) {
            return Err(ProcessingError::ColourModeMismatch {
                source_mode: source_info.mode,
                converted_mode: converted_info.mode,
                source_file: source.to_path_buf(),
                converted_file: converted.to_path_buf(),
            });
        }
        info!(
            source_mode = %source_info.mode,
            converted_mode = %converted_info.mode,
            "Colour modes differ in the way the codec is expected to change them"
        );
    }

    if source_info.icc_profile != converted_info.icc_profile {
        return Err(ProcessingError::ColourProfileMismatch {
            source_file: source.to_path_buf(),
            converted_file: converted.to_path_buf(),
        });
    }
    Ok((source_info, converted_info))
}

/// Encoding both pixel streams are compared in. A bitonal image on either side
/// forces bilevel, so the greyscale side gets repacked whichever way round the
/// files are passed.
fn comparison_encoding(source: ColourMode, converted: ColourMode) -> StreamEncoding {
    if source == ColourMode::Bitonal || converted == ColourMode::Bitonal {
        StreamEncoding::Bilevel
    } else {
        StreamEncoding::for_mode(source)
    }
}

/// Fails unless `converted` holds exactly the pixels of `source`.
///
/// The colour profile check runs first and short-circuits. `source_checksum`
/// is reused when it was taken in the encoding the comparison needs and is
/// recomputed otherwise. Only meaningful for lossless conversions.
#[instrument(skip_all, fields(source = %source.display(), converted = %converted.display()))]
pub fn check_visually_identical(
    source: &Path,
    converted: &Path,
    source_checksum: Option<&PixelChecksum>,
) -> Result<()> {
    let (source_info, converted_info) = compare_headers(source, converted)?;
    let encoding = comparison_encoding(source_info.mode, converted_info.mode);

    let source_checksum = match source_checksum.filter(|c| c.encoding() == encoding) {
        Some(checksum) => Some(checksum.clone()),
        None => generate_pixel_checksum_as(source, encoding)?,
    };
    let converted_checksum = generate_pixel_checksum_as(converted, encoding)?;

    match (source_checksum, converted_checksum) {
        (Some(a), Some(b)) if a.matches(&b) => {
            debug!(checksum = %a, "Pixels are identical");
            Ok(())
        }
        _ => Err(ProcessingError::VisualMismatch {
            source_file: source.to_path_buf(),
            converted_file: converted.to_path_buf(),
        }),
    }
}
