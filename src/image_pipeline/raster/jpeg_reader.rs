use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use image::codecs::jpeg::JpegDecoder;
use image::{ColorType, ImageDecoder};
use tracing::debug;

use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raster::types::{ColourMode, ImageFormat, ImageInfo};

/// Reads the JPEG header: dimensions, output colour type and the ICC profile
/// reassembled from its APP2 segments. Scan data is not decoded.
pub fn read_jpeg_info(path: &Path) -> Result<ImageInfo> {
    let file = File::open(path).map_err(|_| ProcessingError::InputNotReadable(path.to_path_buf()))?;
    let mut decoder =
        JpegDecoder::new(BufReader::new(file)).map_err(|e| ProcessingError::decode(path, e))?;

    let (width, height) = decoder.dimensions();
    let mode = match decoder.color_type() {
        ColorType::L8 => ColourMode::Greyscale,
        ColorType::Rgb8 => ColourMode::Rgb,
        other => {
            return Err(ProcessingError::UnsupportedFormat {
                mode: format!("{other:?}"),
                path: path.to_path_buf(),
            });
        }
    };
    let icc_profile = decoder.icc_profile().map_err(|e| ProcessingError::decode(path, e))?;

    debug!(path = %path.display(), width, height, %mode, has_icc = icc_profile.is_some(), "Probed JPEG");

    Ok(ImageInfo {
        path: path.to_path_buf(),
        format: ImageFormat::Jpeg,
        width,
        height,
        mode,
        icc_profile,
        frame_count: 1,
    })
}
