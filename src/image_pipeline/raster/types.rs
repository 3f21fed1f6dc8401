//! Raster image description types

use std::fmt;
use std::path::PathBuf;

/// Colour mode of a decoded raster.
///
/// The short tags used by [`fmt::Display`] follow the conventional mode names
/// ("1", "L", "RGB", "I;16", ...) that show up in logs and error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColourMode {
    /// 1 bit per pixel black/white
    Bitonal,
    /// 8-bit greyscale
    Greyscale,
    /// 8-bit greyscale with alpha
    GreyscaleAlpha,
    Rgb,
    /// 8-bit RGB with an associated or unassociated alpha channel
    Rgba,
    /// 8-bit RGB with a fourth sample of unspecified meaning
    Rgbx,
    /// 8-bit palette indices
    Palette,
    Cmyk,
    Greyscale16,
    Rgb16,
    Rgba16,
}

impl ColourMode {
    pub fn tag(self) -> &'static str {
        match self {
            ColourMode::Bitonal => "1",
            ColourMode::Greyscale => "L",
            ColourMode::GreyscaleAlpha => "LA",
            ColourMode::Rgb => "RGB",
            ColourMode::Rgba => "RGBA",
            ColourMode::Rgbx => "RGBX",
            ColourMode::Palette => "P",
            ColourMode::Cmyk => "CMYK",
            ColourMode::Greyscale16 => "I;16",
            ColourMode::Rgb16 => "RGB;16",
            ColourMode::Rgba16 => "RGBA;16",
        }
    }

    pub fn is_monochrome(self) -> bool {
        matches!(self, ColourMode::Bitonal | ColourMode::Greyscale)
    }

    pub fn has_alpha(self) -> bool {
        matches!(
            self,
            ColourMode::Rgba | ColourMode::Rgbx | ColourMode::Rgba16 | ColourMode::GreyscaleAlpha
        )
    }

    pub fn is_sixteen_bit(self) -> bool {
        matches!(self, ColourMode::Greyscale16 | ColourMode::Rgb16 | ColourMode::Rgba16)
    }

    pub fn channels(self) -> u8 {
        match self {
            ColourMode::Bitonal | ColourMode::Greyscale | ColourMode::Palette | ColourMode::Greyscale16 => 1,
            ColourMode::GreyscaleAlpha => 2,
            ColourMode::Rgb | ColourMode::Rgb16 => 3,
            ColourMode::Rgba | ColourMode::Rgbx | ColourMode::Cmyk | ColourMode::Rgba16 => 4,
        }
    }

    pub fn bits_per_sample(self) -> u8 {
        match self {
            ColourMode::Bitonal => 1,
            m if m.is_sixteen_bit() => 16,
            _ => 8,
        }
    }
}

impl fmt::Display for ColourMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Whether two colour modes describe the same visual information across a
/// lossless JPEG2000 round trip.
///
/// Identical modes always match. The only cross-mode pairs are the two the
/// codec produces on expansion: bitonal sources come back as 8-bit greyscale,
/// and RGBX sources come back as RGBA once the fourth channel is tagged as
/// alpha. The relation is symmetric so that comparing in either direction
/// gives the same answer.
pub fn are_modes_equivalent(a: ColourMode, b: ColourMode) -> bool {
    use ColourMode::*;
    match (a, b) {
        (Bitonal, Greyscale) | (Greyscale, Bitonal) => true,
        (Rgbx, Rgba) | (Rgba, Rgbx) => true,
        _ => a == b,
    }
}

/// Container format detected from the file signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Tiff,
    Jpeg,
}

/// Header-level description of an image: everything needed to classify it and
/// compare colour configuration, without decoding pixel data.
#[derive(Debug, Clone)]
pub struct ImageInfo {
    pub path: PathBuf,
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    pub mode: ColourMode,
    /// Embedded ICC profile bytes, copied verbatim
    pub icc_profile: Option<Vec<u8>>,
    /// Number of frames (TIFF directories); 1 for single-page images
    pub frame_count: usize,
}

impl ImageInfo {
    pub fn is_multi_frame(&self) -> bool {
        self.frame_count > 1
    }
}

/// Byte layout of a canonical pixel stream. Two streams can only be compared
/// byte for byte when their encodings are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamEncoding {
    /// 1 bit per pixel, MSB first, rows padded with zero bits to a byte
    Bilevel,
    /// Interleaved samples, 16-bit samples little-endian
    Interleaved { channels: u8, bits: u8 },
}

impl StreamEncoding {
    pub fn for_mode(mode: ColourMode) -> Self {
        match mode {
            ColourMode::Bitonal => StreamEncoding::Bilevel,
            other => StreamEncoding::Interleaved {
                channels: other.channels(),
                bits: other.bits_per_sample(),
            },
        }
    }
}

impl fmt::Display for StreamEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StreamEncoding::Bilevel => f.write_str("bilevel"),
            StreamEncoding::Interleaved { channels, bits } => write!(f, "{channels}x{bits}-bit"),
        }
    }
}
