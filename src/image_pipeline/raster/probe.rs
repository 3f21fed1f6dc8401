//! Format detection and the two-step colour mode probe.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::info;

use crate::image_pipeline::codecs::RasterCodec;
use crate::image_pipeline::common::access;
use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raster::jpeg_reader::read_jpeg_info;
use crate::image_pipeline::raster::tiff_reader::read_tiff_info;
use crate::image_pipeline::raster::types::{ColourMode, ImageFormat, ImageInfo};

/// Identifies the container from its leading bytes.
pub fn detect_format(path: &Path) -> Result<Option<ImageFormat>> {
    let mut file = File::open(path).map_err(|_| ProcessingError::InputNotReadable(path.to_path_buf()))?;
    let mut magic = [0u8; 4];
    let read = file.read(&mut magic)?;
    let format = match &magic[..read] {
        [b'I', b'I', 42, 0] | [b'M', b'M', 0, 42] => Some(ImageFormat::Tiff),
        // BigTIFF
        [b'I', b'I', 43, 0] | [b'M', b'M', 0, 43] => Some(ImageFormat::Tiff),
        [0xff, 0xd8, 0xff, _] => Some(ImageFormat::Jpeg),
        _ => None,
    };
    Ok(format)
}

/// Opens an image and describes it without decoding its pixels.
///
/// Fails with [`ProcessingError::UnrecognisedFormat`] when neither native
/// decoder understands the file; that error, and only that error, is what
/// [`probe_colour_mode`] treats as a reason to ask ImageMagick instead.
pub fn probe(path: &Path) -> Result<ImageInfo> {
    access::ensure_readable(path)?;
    match detect_format(path)? {
        Some(ImageFormat::Tiff) => read_tiff_info(path),
        Some(ImageFormat::Jpeg) => read_jpeg_info(path),
        None => Err(ProcessingError::UnrecognisedFormat(path.to_path_buf())),
    }
}

/// Colour mode via the native probe, falling back to the raster tool's
/// `identify` for formats the native decoders don't handle.
pub fn probe_colour_mode<R: RasterCodec + ?Sized>(path: &Path, fallback: &R) -> Result<ColourMode> {
    match probe(path) {
        Ok(info) => Ok(info.mode),
        Err(ProcessingError::UnrecognisedFormat(_)) => {
            info!(path = %path.display(), "Native decoders don't support this file, asking the raster tool");
            let colourspace = fallback.identify_colourspace(path)?;
            parse_identified_colourspace(colourspace.trim(), path)
        }
        Err(e) => Err(e),
    }
}

/// Maps an ImageMagick `%[colorspace]` answer onto a colour mode. ImageMagick
/// reports bitonal images as `Gray`.
pub fn parse_identified_colourspace(colourspace: &str, path: &Path) -> Result<ColourMode> {
    match colourspace {
        "Gray" | "Grey" => Ok(ColourMode::Greyscale),
        "sRGB" | "RGB" => Ok(ColourMode::Rgb),
        other => Err(ProcessingError::UnsupportedFormat {
            mode: other.to_string(),
            path: path.to_path_buf(),
        }),
    }
}
