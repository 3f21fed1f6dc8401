//! Streaming pixel checksums.
//!
//! Pixels are hashed band by band straight off the decoder, so peak memory is
//! one strip (or one row of tiles) no matter how large the master is.

use std::fmt;
use std::path::Path;

use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raster::{StreamEncoding, TiffPixelStream};

const GREYSCALE_8: StreamEncoding = StreamEncoding::Interleaved { channels: 1, bits: 8 };

/// SHA-256 of an image's canonical pixel stream, tagged with the encoding the
/// bytes were hashed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PixelChecksum {
    encoding: StreamEncoding,
    digest: String,
}

impl PixelChecksum {
    pub fn new(encoding: StreamEncoding, digest: impl Into<String>) -> Self {
        Self {
            encoding,
            digest: digest.into(),
        }
    }

    pub fn encoding(&self) -> StreamEncoding {
        self.encoding
    }

    /// Lowercase hex SHA-256.
    pub fn digest(&self) -> &str {
        &self.digest
    }

    /// Digests are only meaningful against one another when both were taken
    /// over the same byte layout.
    pub fn is_comparable_with(&self, other: &PixelChecksum) -> bool {
        self.encoding == other.encoding
    }

    /// Equal pixels in a comparable encoding.
    pub fn matches(&self, other: &PixelChecksum) -> bool {
        self.is_comparable_with(other) && self.digest == other.digest
    }
}

impl fmt::Display for PixelChecksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.encoding, self.digest)
    }
}

/// Packs 8-bit greyscale rows into 1 bit per pixel, MSB first, 255 as a set bit.
///
/// Only 0 and 255 have a bilevel equivalent. Any other sample means the
/// greyscale image holds information a bitonal one cannot, and the repack is
/// refused rather than thresholded.
#[derive(Debug, Clone)]
pub struct BitonalRepacker {
    width: usize,
    partial: Vec<u8>,
}

impl BitonalRepacker {
    pub fn new(width: u32) -> Self {
        Self {
            width: width as usize,
            partial: Vec::new(),
        }
    }

    pub fn packed_row_bytes(&self) -> usize {
        self.width.div_ceil(8)
    }

    /// Packs every complete row in `grey` (plus any row left over from the
    /// previous call) onto `out`. Returns `false` on a non-bilevel sample.
    pub fn push(&mut self, grey: &[u8], out: &mut Vec<u8>) -> bool {
        if self.width == 0 {
            return grey.is_empty();
        }
        let mut input = grey;
        if !self.partial.is_empty() {
            let needed = self.width - self.partial.len();
            let take = needed.min(input.len());
            self.partial.extend_from_slice(&input[..take]);
            input = &input[take..];
            if self.partial.len() < self.width {
                return true;
            }
            let row = std::mem::take(&mut self.partial);
            if !self.pack_row(&row, out) {
                return false;
            }
        }

        let mut rows = input.chunks_exact(self.width);
        for row in rows.by_ref() {
            if !self.pack_row(row, out) {
                return false;
            }
        }
        self.partial.extend_from_slice(rows.remainder());
        true
    }

    /// True if the input ended on a row boundary.
    pub fn finish(self) -> bool {
        self.partial.is_empty()
    }

    fn pack_row(&self, row: &[u8], out: &mut Vec<u8>) -> bool {
        for pixels in row.chunks(8) {
            let mut byte = 0u8;
            for (i, &sample) in pixels.iter().enumerate() {
                match sample {
                    0 => {}
                    255 => byte |= 0x80 >> i,
                    _ => return false,
                }
            }
            out.push(byte);
        }
        true
    }
}

/// Checksum of the first frame of a TIFF in its native encoding.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn generate_pixel_checksum(path: &Path) -> Result<PixelChecksum> {
    let stream = TiffPixelStream::open(path)?;
    let encoding = stream.encoding();
    let mut hasher = Sha256::new();
    for band in stream {
        hasher.update(band?);
    }
    let checksum = PixelChecksum::new(encoding, hex::encode(hasher.finalize()));
    debug!(checksum = %checksum, "Pixel checksum generated");
    Ok(checksum)
}

/// Checksum of the first frame of a TIFF re-expressed in `encoding`.
///
/// Returns `Ok(None)` when the pixels cannot be represented in `encoding`
/// without losing information: an incompatible layout, or a greyscale image
/// holding values other than black and white when bilevel is requested.
#[instrument(skip_all, fields(path = %path.display(), encoding = %encoding))]
pub fn generate_pixel_checksum_as(path: &Path, encoding: StreamEncoding) -> Result<Option<PixelChecksum>> {
    let stream = TiffPixelStream::open(path)?;
    let native = stream.encoding();
    if native == encoding {
        drop(stream);
        return generate_pixel_checksum(path).map(Some);
    }
    if !(encoding == StreamEncoding::Bilevel && native == GREYSCALE_8) {
        debug!(native = %native, "No lossless mapping between encodings");
        return Ok(None);
    }

    let mut repacker = BitonalRepacker::new(stream.width());
    let mut hasher = Sha256::new();
    let mut packed = Vec::new();
    for band in stream {
        let band = band?;
        packed.clear();
        if !repacker.push(&band, &mut packed) {
            debug!("Greyscale pixels are not bilevel");
            return Ok(None);
        }
        hasher.update(&packed);
    }
    if !repacker.finish() {
        return Err(ProcessingError::decode(path, "pixel stream ended mid-row"));
    }
    Ok(Some(PixelChecksum::new(encoding, hex::encode(hasher.finalize()))))
}
