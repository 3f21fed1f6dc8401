//! Format conversions module
//!
//! Conversion recipes built on the codec adapters: JPEG2000 encoding (with
//! monochrome expansion), TIFF and JPEG derivatives, repaging and ICC profile
//! conversion.

mod image_converter;


pub use image_converter::ImageConverter;
