//! Validation module
//!
//! Everything that decides whether an image may be converted and whether a
//! conversion was faithful: the suitability classifier, streaming pixel
//! checksums, the pixel-equivalence verifier and JP2 structural validation.

pub mod checksum;
pub mod classifier;
pub mod jp2_structure;
pub mod verifier;


pub use checksum::{generate_pixel_checksum, generate_pixel_checksum_as, BitonalRepacker, PixelChecksum};
pub use classifier::{check_image_suitable_for_jp2_conversion, Suitability, SuitabilityPolicy, SuitabilityWarning};
pub use jp2_structure::{ensure_valid_jp2, validate_jp2, Jp2Check, Jp2Report, Jp2Validator, NativeJp2Validator};
pub use verifier::{check_colour_profiles_match, check_visually_identical};
