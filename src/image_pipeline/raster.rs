//! Raster reading module
//!
//! Header probing for TIFF and JPEG sources, the colour mode model with its
//! verification equivalence table, and streaming pixel access for TIFFs.

mod jpeg_reader;
mod probe;
mod tiff_reader;
pub mod types;


pub use jpeg_reader::read_jpeg_info;
pub use probe::{detect_format, parse_identified_colourspace, probe, probe_colour_mode};
pub use tiff_reader::{read_tiff_info, row_bytes, TiffPixelStream};
pub use types::{are_modes_equivalent, ColourMode, ImageFormat, ImageInfo, StreamEncoding};
