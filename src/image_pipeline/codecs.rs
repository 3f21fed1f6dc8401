//! Codec adapters module
//!
//! Thin adapters over the external tools the pipeline drives: the JPEG2000
//! compressor/decompressor, the general raster converter and the metadata
//! copier. Each sits behind a trait so the orchestrator can be exercised with
//! in-process fakes.

pub mod exiftool;
pub mod image_magick;
pub mod jpeg2000;
pub mod kakadu;
pub mod metadata;
pub mod options;
pub mod raster;

pub use exiftool::{ExifTool, DEFAULT_EXIFTOOL_PATH};
pub use image_magick::{ImageMagick, DEFAULT_IMAGE_MAGICK_PATH};
pub use jpeg2000::{CompressInput, Jpeg2000Codec};
pub use kakadu::Kakadu;
pub use metadata::MetadataExtractor;
pub use options::{ConversionOptions, KakaduArg};
pub use raster::RasterCodec;
