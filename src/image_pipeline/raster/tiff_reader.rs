//! TIFF header probing and streaming pixel access using the tiff library.
//!
//! Pixel data is never decoded in one piece: [`TiffPixelStream`] pulls one
//! strip, or one row of tiles, at a time and hands out complete scanlines in
//! the canonical byte layout described by [`StreamEncoding`].

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tiff::ColorType;
use tracing::debug;

use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raster::types::{ColourMode, ImageFormat, ImageInfo, StreamEncoding};

/// TIFF tag holding an embedded ICC profile (InterColorProfile).
const ICC_PROFILE_TAG: u16 = 34675;

/// ExtraSamples value for a fourth sample of unspecified meaning.
const EXTRA_SAMPLE_UNSPECIFIED: u16 = 0;

const PLANAR_CONFIG_SEPARATE: u16 = 2;

type TiffDecoder = Decoder<BufReader<File>>;

fn open_decoder(path: &Path) -> Result<TiffDecoder> {
    let file = File::open(path).map_err(|_| ProcessingError::InputNotReadable(path.to_path_buf()))?;
    Decoder::new(BufReader::new(file)).map_err(|e| ProcessingError::decode(path, e))
}

fn colour_mode(decoder: &mut TiffDecoder, path: &Path) -> Result<ColourMode> {
    let colortype = decoder.colortype().map_err(|e| ProcessingError::decode(path, e))?;
    let mode = match colortype {
        ColorType::Gray(1) => ColourMode::Bitonal,
        ColorType::Gray(8) => ColourMode::Greyscale,
        ColorType::Gray(16) => ColourMode::Greyscale16,
        ColorType::GrayA(8) => ColourMode::GreyscaleAlpha,
        ColorType::RGB(8) => ColourMode::Rgb,
        ColorType::RGB(16) => ColourMode::Rgb16,
        ColorType::RGBA(16) => ColourMode::Rgba16,
        ColorType::Palette(8) => ColourMode::Palette,
        ColorType::CMYK(8) => ColourMode::Cmyk,
        ColorType::RGBA(8) => {
            let extra = decoder
                .find_tag_unsigned_vec::<u16>(Tag::ExtraSamples)
                .map_err(|e| ProcessingError::decode(path, e))?;
            match extra.as_deref() {
                None | Some([EXTRA_SAMPLE_UNSPECIFIED, ..]) => ColourMode::Rgbx,
                Some(_) => ColourMode::Rgba,
            }
        }
        other => {
            return Err(ProcessingError::UnsupportedFormat {
                mode: format!("{other:?}"),
                path: path.to_path_buf(),
            });
        }
    };
    Ok(mode)
}

fn icc_profile(decoder: &mut TiffDecoder, path: &Path) -> Result<Option<Vec<u8>>> {
    decoder
        .find_tag(Tag::from_u16_exhaustive(ICC_PROFILE_TAG))
        .map_err(|e| ProcessingError::decode(path, e))?
        .map(|value| value.into_u8_vec().map_err(|e| ProcessingError::decode(path, e)))
        .transpose()
}

/// Reads dimensions, colour mode, ICC profile and frame count of a TIFF.
pub fn read_tiff_info(path: &Path) -> Result<ImageInfo> {
    let mut decoder = open_decoder(path)?;
    let (width, height) = decoder.dimensions().map_err(|e| ProcessingError::decode(path, e))?;
    let mode = colour_mode(&mut decoder, path)?;
    let icc_profile = icc_profile(&mut decoder, path)?;

    let mut frame_count = 1;
    while decoder.more_images() {
        decoder.next_image().map_err(|e| ProcessingError::decode(path, e))?;
        frame_count += 1;
    }

    debug!(
        path = %path.display(),
        width, height, %mode, frame_count,
        has_icc = icc_profile.is_some(),
        "Probed TIFF"
    );

    Ok(ImageInfo {
        path: path.to_path_buf(),
        format: ImageFormat::Tiff,
        width,
        height,
        mode,
        icc_profile,
        frame_count,
    })
}

/// Pull-based stream over the first frame's pixels, one band of scanlines per
/// item. Peak memory is one strip (or one row of tiles) plus its canonical
/// copy, regardless of image size.
pub struct TiffPixelStream {
    decoder: TiffDecoder,
    path: PathBuf,
    mode: ColourMode,
    width: u32,
    height: u32,
    chunk_width: u32,
    chunk_height: u32,
    tiled: bool,
    next_band: u32,
    bands: u32,
}

impl TiffPixelStream {
    pub fn open(path: &Path) -> Result<Self> {
        let mut decoder = open_decoder(path)?;
        let (width, height) = decoder.dimensions().map_err(|e| ProcessingError::decode(path, e))?;
        let mode = colour_mode(&mut decoder, path)?;

        let planar = decoder
            .find_tag_unsigned::<u16>(Tag::PlanarConfiguration)
            .map_err(|e| ProcessingError::decode(path, e))?;
        if planar == Some(PLANAR_CONFIG_SEPARATE) && mode.channels() > 1 {
            return Err(ProcessingError::UnsupportedFormat {
                mode: format!("{mode} (planar)"),
                path: path.to_path_buf(),
            });
        }

        let tiled = decoder
            .find_tag(Tag::TileWidth)
            .map_err(|e| ProcessingError::decode(path, e))?
            .is_some();
        let (chunk_width, chunk_height) = decoder.chunk_dimensions();
        if chunk_width == 0 || chunk_height == 0 {
            return Err(ProcessingError::decode(path, "zero-sized strip or tile"));
        }
        let bands = height.div_ceil(chunk_height);

        Ok(Self {
            decoder,
            path: path.to_path_buf(),
            mode,
            width,
            height,
            chunk_width,
            chunk_height,
            tiled,
            next_band: 0,
            bands,
        })
    }

    pub fn mode(&self) -> ColourMode {
        self.mode
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn encoding(&self) -> StreamEncoding {
        StreamEncoding::for_mode(self.mode)
    }

    /// Bytes in one canonical scanline.
    pub fn row_bytes(&self) -> usize {
        row_bytes(self.mode, self.width)
    }

    fn read_chunk_bytes(&mut self, index: u32) -> Result<Vec<u8>> {
        let chunk = self
            .decoder
            .read_chunk(index)
            .map_err(|e| ProcessingError::decode(&self.path, e))?;
        match chunk {
            DecodingResult::U8(bytes) => Ok(bytes),
            DecodingResult::U16(samples) => {
                Ok(samples.iter().flat_map(|s| s.to_le_bytes()).collect())
            }
            _ => Err(ProcessingError::UnsupportedFormat {
                mode: format!("{} (non-integer samples)", self.mode),
                path: self.path.clone(),
            }),
        }
    }

    /// Works out the row stride of a decoded chunk. Depending on the decoder a
    /// chunk is either cropped to the image or padded to the full chunk size.
    fn chunk_stride(&self, len: usize, data_width: u32, data_height: u32) -> Result<(usize, u32)> {
        let padded = row_bytes(self.mode, self.chunk_width);
        let cropped = row_bytes(self.mode, data_width);
        if len == padded * self.chunk_height as usize {
            Ok((padded, self.chunk_height))
        } else if len == cropped * data_height as usize {
            Ok((cropped, data_height))
        } else if data_height > 0 && len % data_height as usize == 0 && len / data_height as usize >= cropped {
            Ok((len / data_height as usize, data_height))
        } else {
            Err(ProcessingError::decode(
                &self.path,
                format!("chunk of {len} bytes does not hold {data_width}x{data_height} {} pixels", self.mode),
            ))
        }
    }

    fn read_strip_band(&mut self, band: u32) -> Result<Vec<u8>> {
        let (data_width, data_height) = self.decoder.chunk_data_dimensions(band);
        let bytes = self.read_chunk_bytes(band)?;
        let (stride, _) = self.chunk_stride(bytes.len(), data_width, data_height)?;
        let row_len = self.row_bytes();

        if stride == row_len && self.mode != ColourMode::Bitonal {
            let mut bytes = bytes;
            bytes.truncate(row_len * data_height as usize);
            return Ok(bytes);
        }

        let mut band_bytes = Vec::with_capacity(row_len * data_height as usize);
        for row in bytes.chunks_exact(stride).take(data_height as usize) {
            band_bytes.extend_from_slice(&row[..row_len]);
        }
        if self.mode == ColourMode::Bitonal {
            clear_padding_bits(&mut band_bytes, row_len, self.width);
        }
        Ok(band_bytes)
    }

    fn read_tile_band(&mut self, band: u32) -> Result<Vec<u8>> {
        let tiles_across = self.width.div_ceil(self.chunk_width);
        let band_height = self.chunk_height.min(self.height - band * self.chunk_height) as usize;
        let row_len = self.row_bytes();
        let mut band_bytes = vec![0u8; row_len * band_height];

        for column in 0..tiles_across {
            let index = band * tiles_across + column;
            let (data_width, data_height) = self.decoder.chunk_data_dimensions(index);
            let tile = self.read_chunk_bytes(index)?;
            let (stride, _) = self.chunk_stride(tile.len(), data_width, data_height)?;
            let x_offset = column * self.chunk_width;

            for (y, tile_row) in tile.chunks_exact(stride).take(band_height).enumerate() {
                let out_row = &mut band_bytes[y * row_len..(y + 1) * row_len];
                if self.mode == ColourMode::Bitonal {
                    copy_bits(tile_row, out_row, x_offset as usize, data_width as usize);
                } else {
                    let pixel_bytes = row_len / self.width as usize;
                    let start = x_offset as usize * pixel_bytes;
                    let len = data_width as usize * pixel_bytes;
                    out_row[start..start + len].copy_from_slice(&tile_row[..len]);
                }
            }
        }
        Ok(band_bytes)
    }
}

impl Iterator for TiffPixelStream {
    type Item = Result<Vec<u8>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_band >= self.bands {
            return None;
        }
        let band = self.next_band;
        self.next_band += 1;
        let result = if self.tiled {
            self.read_tile_band(band)
        } else {
            self.read_strip_band(band)
        };
        if result.is_err() {
            // A failed chunk leaves the decoder in an unknown state.
            self.next_band = self.bands;
        }
        Some(result)
    }
}

pub fn row_bytes(mode: ColourMode, width: u32) -> usize {
    let bits = width as usize * mode.channels() as usize * mode.bits_per_sample() as usize;
    bits.div_ceil(8)
}

/// Zeroes the bits past `width` in the last byte of every packed row.
fn clear_padding_bits(band: &mut [u8], row_len: usize, width: u32) {
    let used = (width % 8) as u8;
    if used == 0 {
        return;
    }
    let mask = 0xffu8 << (8 - used);
    for row in band.chunks_exact_mut(row_len) {
        if let Some(last) = row.last_mut() {
            *last &= mask;
        }
    }
}

fn copy_bits(src: &[u8], dst: &mut [u8], dst_offset: usize, count: usize) {
    for i in 0..count {
        let bit = (src[i / 8] >> (7 - i % 8)) & 1;
        let target = dst_offset + i;
        if bit == 1 {
            dst[target / 8] |= 0x80 >> (target % 8);
        }
    }
}
