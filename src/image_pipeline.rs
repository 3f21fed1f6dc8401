//! Image processing pipeline module
//!
//! This module turns master images into preservation and access derivatives,
//! with separate modules for raster probing, codec adapters, verification
//! and derivative orchestration.

pub mod codecs;
pub mod common;
pub mod conversions;
pub mod derivatives;
pub mod raster;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use common::{
    CancellationToken,
    ProcessingError,
    Result,
};

pub use raster::{
    ColourMode,
    ImageFormat,
    ImageInfo,
    StreamEncoding,
    TiffPixelStream,
    are_modes_equivalent,
    probe,
    probe_colour_mode,
};

pub use codecs::{
    ConversionOptions,
    ExifTool,
    ImageMagick,
    Jpeg2000Codec,
    Kakadu,
    MetadataExtractor,
    RasterCodec,
};

pub use validation::{
    Jp2Report,
    Jp2Validator,
    NativeJp2Validator,
    PixelChecksum,
    Suitability,
    SuitabilityPolicy,
    check_colour_profiles_match,
    check_image_suitable_for_jp2_conversion,
    check_visually_identical,
    generate_pixel_checksum,
    validate_jp2,
};

pub use conversions::ImageConverter;

pub use derivatives::{
    DerivativeFilenames,
    DerivativeFilesGenerator,
    DerivativeKind,
    DerivativeSet,
    GeneratorConfig,
    JpgDerivativeOptions,
    TiffDerivativeOptions,
};
