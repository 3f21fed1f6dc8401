//! Fixture builders shared by the unit tests: a small baseline TIFF writer
//! (uncompressed, strips or tiles, 1/8/16-bit), a minimal JP2 container and
//! in-process mocks of the codec adapters.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::image_pipeline::codecs::{
    CompressInput, ConversionOptions, Jpeg2000Codec, MetadataExtractor, RasterCodec,
};
use crate::image_pipeline::common::cancel::{self, CancellationToken};
use crate::image_pipeline::common::error::{ProcessingError, Result};
use crate::image_pipeline::raster::{probe, ColourMode, ImageFormat, TiffPixelStream};

const BYTE: u16 = 1;
const SHORT: u16 = 3;
const LONG: u16 = 4;
const UNDEFINED: u16 = 7;

const PHOTOMETRIC_WHITE_IS_ZERO: u16 = 0;
const PHOTOMETRIC_BLACK_IS_ZERO: u16 = 1;
const PHOTOMETRIC_RGB: u16 = 2;
const PHOTOMETRIC_SEPARATED: u16 = 5;

pub(crate) const SRGB_LIKE_ICC: &[u8] = b"\x00\x00\x01\x00test-icc-profile-srgb-v4";
pub(crate) const OTHER_ICC: &[u8] = b"\x00\x00\x01\x00test-icc-profile-adobe-rgb";

#[derive(Debug, Clone)]
pub(crate) struct TestTiff {
    width: u32,
    height: u32,
    bits: u16,
    samples: u16,
    photometric: u16,
    extra_samples: Option<u16>,
    icc: Option<Vec<u8>>,
    xmp: Option<Vec<u8>>,
    /// Canonical rows: packed MSB-first for 1-bit, little-endian for 16-bit
    data: Vec<u8>,
    rows_per_strip: u32,
    tile: Option<(u32, u32)>,
    pages: usize,
}

impl TestTiff {
    fn new(width: u32, height: u32, bits: u16, samples: u16, photometric: u16, data: Vec<u8>) -> Self {
        let row = (width as usize * samples as usize * bits as usize).div_ceil(8);
        assert_eq!(data.len(), row * height as usize, "fixture data does not fill the image");
        Self {
            width,
            height,
            bits,
            samples,
            photometric,
            extra_samples: None,
            icc: None,
            xmp: None,
            data,
            rows_per_strip: height.max(1),
            tile: None,
            pages: 1,
        }
    }

    /// `packed` holds MSB-first rows, 1 = white.
    pub(crate) fn bitonal(width: u32, height: u32, packed: Vec<u8>) -> Self {
        Self::new(width, height, 1, 1, PHOTOMETRIC_BLACK_IS_ZERO, packed)
    }

    /// `packed` holds MSB-first rows as stored, 1 = black.
    pub(crate) fn bitonal_white_is_zero(width: u32, height: u32, packed: Vec<u8>) -> Self {
        Self::new(width, height, 1, 1, PHOTOMETRIC_WHITE_IS_ZERO, packed)
    }

    pub(crate) fn grey(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(width, height, 8, 1, PHOTOMETRIC_BLACK_IS_ZERO, data)
    }

    pub(crate) fn grey16(width: u32, height: u32, samples: &[u16]) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(width, height, 16, 1, PHOTOMETRIC_BLACK_IS_ZERO, data)
    }

    pub(crate) fn rgb(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(width, height, 8, 3, PHOTOMETRIC_RGB, data)
    }

    pub(crate) fn rgb16(width: u32, height: u32, samples: &[u16]) -> Self {
        let data = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        Self::new(width, height, 16, 3, PHOTOMETRIC_RGB, data)
    }

    /// RGBA with unassociated alpha.
    pub(crate) fn rgba(width: u32, height: u32, data: Vec<u8>) -> Self {
        let mut tiff = Self::new(width, height, 8, 4, PHOTOMETRIC_RGB, data);
        tiff.extra_samples = Some(2);
        tiff
    }

    /// Four samples, the fourth of unspecified meaning.
    pub(crate) fn rgbx(width: u32, height: u32, data: Vec<u8>) -> Self {
        let mut tiff = Self::new(width, height, 8, 4, PHOTOMETRIC_RGB, data);
        tiff.extra_samples = Some(0);
        tiff
    }

    pub(crate) fn cmyk(width: u32, height: u32, data: Vec<u8>) -> Self {
        Self::new(width, height, 8, 4, PHOTOMETRIC_SEPARATED, data)
    }

    pub(crate) fn with_icc(mut self, icc: &[u8]) -> Self {
        self.icc = Some(icc.to_vec());
        self
    }

    pub(crate) fn with_xmp(mut self, xmp: &str) -> Self {
        self.xmp = Some(xmp.as_bytes().to_vec());
        self
    }

    pub(crate) fn rows_per_strip(mut self, rows: u32) -> Self {
        self.rows_per_strip = rows;
        self
    }

    /// Tile dimensions must be multiples of 16.
    pub(crate) fn tiled(mut self, tile_width: u32, tile_height: u32) -> Self {
        self.tile = Some((tile_width, tile_height));
        self
    }

    pub(crate) fn pages(mut self, pages: usize) -> Self {
        self.pages = pages;
        self
    }

    fn row_len(&self, width: u32) -> usize {
        (width as usize * self.samples as usize * self.bits as usize).div_ceil(8)
    }

    fn chunks(&self) -> Vec<Vec<u8>> {
        let row_len = self.row_len(self.width);
        match self.tile {
            None => self
                .data
                .chunks(row_len * self.rows_per_strip as usize)
                .map(<[u8]>::to_vec)
                .collect(),
            Some((tile_width, tile_height)) => {
                let tile_row_len = self.row_len(tile_width);
                let mut tiles = Vec::new();
                for ty in 0..self.height.div_ceil(tile_height) {
                    for tx in 0..self.width.div_ceil(tile_width) {
                        let mut tile = vec![0u8; tile_row_len * tile_height as usize];
                        let start = self.row_len(tx * tile_width);
                        for y in 0..tile_height {
                            let image_y = ty * tile_height + y;
                            if image_y >= self.height {
                                break;
                            }
                            let row = &self.data[image_y as usize * row_len..(image_y as usize + 1) * row_len];
                            let available = row.len().saturating_sub(start).min(tile_row_len);
                            let out = y as usize * tile_row_len;
                            tile[out..out + available].copy_from_slice(&row[start..start + available]);
                        }
                        tiles.push(tile);
                    }
                }
                tiles
            }
        }
    }

    fn entries(&self, offsets: &[u32], counts: &[u32]) -> Vec<(u16, u16, u32, Vec<u8>)> {
        let longs = |values: &[u32]| values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>();
        let shorts = |values: &[u16]| values.iter().flat_map(|v| v.to_le_bytes()).collect::<Vec<u8>>();
        let count = offsets.len() as u32;

        let mut entries = vec![
            (256, LONG, 1, longs(&[self.width])),
            (257, LONG, 1, longs(&[self.height])),
            (258, SHORT, self.samples as u32, shorts(&vec![self.bits; self.samples as usize])),
            (259, SHORT, 1, shorts(&[1])),
            (262, SHORT, 1, shorts(&[self.photometric])),
        ];
        if self.tile.is_none() {
            entries.push((273, LONG, count, longs(offsets)));
        }
        entries.push((277, SHORT, 1, shorts(&[self.samples])));
        if self.tile.is_none() {
            entries.push((278, LONG, 1, longs(&[self.rows_per_strip])));
            entries.push((279, LONG, count, longs(counts)));
        }
        entries.push((284, SHORT, 1, shorts(&[1])));
        if let Some((tile_width, tile_height)) = self.tile {
            entries.push((322, LONG, 1, longs(&[tile_width])));
            entries.push((323, LONG, 1, longs(&[tile_height])));
            entries.push((324, LONG, count, longs(offsets)));
            entries.push((325, LONG, count, longs(counts)));
        }
        if let Some(extra) = self.extra_samples {
            entries.push((338, SHORT, 1, shorts(&[extra])));
        }
        if let Some(xmp) = &self.xmp {
            entries.push((700, BYTE, xmp.len() as u32, xmp.clone()));
        }
        if let Some(icc) = &self.icc {
            entries.push((34675, UNDEFINED, icc.len() as u32, icc.clone()));
        }
        entries
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut buf = vec![b'I', b'I', 42, 0, 0, 0, 0, 0];
        let mut offsets = Vec::new();
        let mut counts = Vec::new();
        for chunk in self.chunks() {
            offsets.push(buf.len() as u32);
            counts.push(chunk.len() as u32);
            buf.extend_from_slice(&chunk);
        }

        let mut next_ifd_pointer = 4;
        for _ in 0..self.pages {
            let mut resolved = Vec::new();
            for (tag, kind, count, mut value) in self.entries(&offsets, &counts) {
                if value.len() > 4 {
                    if buf.len() % 2 == 1 {
                        buf.push(0);
                    }
                    let offset = buf.len() as u32;
                    buf.extend_from_slice(&value);
                    value = offset.to_le_bytes().to_vec();
                } else {
                    value.resize(4, 0);
                }
                resolved.push((tag, kind, count, value));
            }
            if buf.len() % 2 == 1 {
                buf.push(0);
            }
            let ifd_offset = buf.len() as u32;
            buf[next_ifd_pointer..next_ifd_pointer + 4].copy_from_slice(&ifd_offset.to_le_bytes());
            buf.extend_from_slice(&(resolved.len() as u16).to_le_bytes());
            for (tag, kind, count, value) in resolved {
                buf.extend_from_slice(&tag.to_le_bytes());
                buf.extend_from_slice(&kind.to_le_bytes());
                buf.extend_from_slice(&count.to_le_bytes());
                buf.extend_from_slice(&value);
            }
            next_ifd_pointer = buf.len();
            buf.extend_from_slice(&0u32.to_le_bytes());
        }
        buf
    }

    pub(crate) fn write(&self, path: &Path) -> PathBuf {
        std::fs::write(path, self.to_bytes()).expect("write fixture tiff");
        path.to_path_buf()
    }
}

/// Deterministic RGB test pattern.
pub(crate) fn gradient(width: u32, height: u32, channels: usize) -> Vec<u8> {
    let mut data = Vec::with_capacity(width as usize * height as usize * channels);
    for y in 0..height {
        for x in 0..width {
            for c in 0..channels {
                data.push(((x * 7 + y * 13 + c as u32 * 31) % 256) as u8);
            }
        }
    }
    data
}

/// Checkerboard packed 1 bit per pixel, plus its 8-bit greyscale expansion.
pub(crate) fn checkerboard(width: u32, height: u32) -> (Vec<u8>, Vec<u8>) {
    let row_len = (width as usize).div_ceil(8);
    let mut packed = vec![0u8; row_len * height as usize];
    let mut grey = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height as usize {
        for x in 0..width as usize {
            let white = (x / 2 + y) % 2 == 0;
            if white {
                packed[y * row_len + x / 8] |= 0x80 >> (x % 8);
            }
            grey.push(if white { 255 } else { 0 });
        }
    }
    (packed, grey)
}

fn jp2_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = ((payload.len() + 8) as u32).to_be_bytes().to_vec();
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// Smallest JP2 file the structural validator accepts: signature, file type,
/// header with ihdr and colr, and a codestream holding SOC, SIZ and EOC.
pub(crate) fn minimal_jp2(width: u32, height: u32, components: u16) -> Vec<u8> {
    let mut ihdr = Vec::new();
    ihdr.extend_from_slice(&height.to_be_bytes());
    ihdr.extend_from_slice(&width.to_be_bytes());
    ihdr.extend_from_slice(&components.to_be_bytes());
    ihdr.extend_from_slice(&[7, 7, 0, 0]);

    let enumerated = if components >= 3 { 16u32 } else { 17u32 };
    let mut colr = vec![1, 0, 0];
    colr.extend_from_slice(&enumerated.to_be_bytes());

    let mut header = jp2_box(b"ihdr", &ihdr);
    header.extend(jp2_box(b"colr", &colr));

    let mut codestream = vec![0xff, 0x4f, 0xff, 0x51];
    codestream.extend_from_slice(&(38 + 3 * components).to_be_bytes());
    codestream.extend_from_slice(&0u16.to_be_bytes());
    for value in [width, height, 0, 0, width, height, 0, 0] {
        codestream.extend_from_slice(&value.to_be_bytes());
    }
    codestream.extend_from_slice(&components.to_be_bytes());
    for _ in 0..components {
        codestream.extend_from_slice(&[7, 1, 1]);
    }
    codestream.extend_from_slice(&[0xff, 0xd9]);

    let mut ftyp = b"jp2 ".to_vec();
    ftyp.extend_from_slice(&0u32.to_be_bytes());
    ftyp.extend_from_slice(b"jp2 ");

    let mut file = b"\x00\x00\x00\x0CjP  \r\n\x87\n".to_vec();
    file.extend(jp2_box(b"ftyp", &ftyp));
    file.extend(jp2_box(b"jp2h", &header));
    file.extend(jp2_box(b"jp2c", &codestream));
    file
}

pub(crate) fn write_jpeg(path: &Path, width: u32, height: u32, greyscale: bool) -> PathBuf {
    use image::ExtendedColorType;
    use image::codecs::jpeg::JpegEncoder;

    let mut file = std::fs::File::create(path).expect("create fixture jpeg");
    let (data, colour) = if greyscale {
        (gradient(width, height, 1), ExtendedColorType::L8)
    } else {
        (gradient(width, height, 3), ExtendedColorType::Rgb8)
    };
    JpegEncoder::new_with_quality(&mut file, 90)
        .encode(&data, width, height, colour)
        .expect("encode fixture jpeg");
    path.to_path_buf()
}

// =============================================================================
// Codec mocks
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum CodecCall {
    Compress { inputs: Vec<PathBuf>, output: PathBuf, args: Vec<String> },
    Expand { input: PathBuf, output: PathBuf, args: Vec<String> },
    Convert { input: String, output: String, initial_args: Vec<String>, post_args: Vec<String> },
    Mogrify { input: PathBuf, post_args: Vec<String> },
    Identify { input: PathBuf },
    ToTiff { input: PathBuf, output: PathBuf },
    ToJpg { input: PathBuf, output: PathBuf, resize: Option<f64>, quality: Option<u8> },
    CopyMetadata { input: PathBuf, output: PathBuf, xmp_only: bool },
    ExtractXmp { input: PathBuf, output: PathBuf },
}

pub(crate) type CallLog = Arc<Mutex<Vec<CodecCall>>>;

fn mock_failure(command: &str) -> ProcessingError {
    ProcessingError::Codec {
        command: command.to_string(),
        args: Vec::new(),
        command_line: command.to_string(),
        status: "exit status: 1".to_string(),
        output: "mock failure".to_string(),
    }
}

/// How the mock JPEG2000 codec reproduces a compressed image on expansion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum ExpandBehaviour {
    /// Bitonal comes back as greyscale and RGBX as RGBA, like the real codec
    #[default]
    Faithful,
    /// RGBA comes back as RGB
    DropAlpha,
    /// The first sample changes
    AlterPixel,
    /// The ICC profile is lost
    DropProfile,
}

/// Writes a structurally valid JP2 on compress and remembers the source
/// pixels so a later expand can reproduce them. Fixtures are keyed by the
/// bytes written, since the file is moved after compression.
#[derive(Clone, Default)]
pub(crate) struct MockKakadu {
    pub calls: CallLog,
    pub expand_behaviour: ExpandBehaviour,
    pub fail_compress: bool,
    pub fail_expand: bool,
    pub compressed: Arc<Mutex<HashMap<Vec<u8>, TestTiff>>>,
}

impl MockKakadu {
    pub(crate) fn with_behaviour(expand_behaviour: ExpandBehaviour) -> Self {
        Self {
            expand_behaviour,
            ..Self::default()
        }
    }
}

fn unpack_bits(packed: &[u8], width: u32) -> Vec<u8> {
    let row_len = (width as usize).div_ceil(8);
    packed
        .chunks(row_len)
        .flat_map(|row| (0..width as usize).map(move |x| if row[x / 8] & (0x80 >> (x % 8)) != 0 { 255 } else { 0 }))
        .collect()
}

fn le_u16(bytes: &[u8]) -> Vec<u16> {
    bytes.chunks_exact(2).map(|b| u16::from_le_bytes([b[0], b[1]])).collect()
}

fn expanded_fixture(source: &Path, behaviour: ExpandBehaviour) -> TestTiff {
    let info = probe(source).expect("probe mock codec input");
    let pixels = TiffPixelStream::open(source)
        .expect("open mock codec input")
        .collect::<Result<Vec<_>>>()
        .expect("read mock codec input")
        .concat();
    let (w, h) = (info.width, info.height);
    let mut tiff = match (info.mode, behaviour) {
        (ColourMode::Bitonal, _) => TestTiff::grey(w, h, unpack_bits(&pixels, w)),
        (ColourMode::Greyscale, _) => TestTiff::grey(w, h, pixels),
        (ColourMode::Rgb, _) => TestTiff::rgb(w, h, pixels),
        (ColourMode::Rgba, ExpandBehaviour::DropAlpha) => {
            TestTiff::rgb(w, h, pixels.chunks_exact(4).flat_map(|p| p[..3].to_vec()).collect())
        }
        (ColourMode::Rgba | ColourMode::Rgbx, _) => TestTiff::rgba(w, h, pixels),
        (ColourMode::Greyscale16, _) => TestTiff::grey16(w, h, &le_u16(&pixels)),
        (ColourMode::Rgb16, _) => TestTiff::rgb16(w, h, &le_u16(&pixels)),
        (other, _) => panic!("mock codec can't expand {other}"),
    };
    if behaviour == ExpandBehaviour::AlterPixel {
        tiff.data[0] ^= 0x01;
    }
    match (&info.icc_profile, behaviour) {
        (Some(icc), b) if b != ExpandBehaviour::DropProfile => tiff.with_icc(icc),
        _ => tiff,
    }
}

impl Jpeg2000Codec for MockKakadu {
    fn compress(
        &self,
        input: &CompressInput,
        output: &Path,
        options: &ConversionOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        cancel::check(cancel, "kdu_compress")?;
        self.calls.lock().unwrap().push(CodecCall::Compress {
            inputs: input.paths().to_vec(),
            output: output.to_path_buf(),
            args: options.to_args(),
        });
        if self.fail_compress {
            return Err(mock_failure("kdu_compress"));
        }
        let source = &input.paths()[0];
        let info = probe(source)?;
        let components = if input.paths().len() > 1 {
            input.paths().len() as u16
        } else {
            info.mode.channels() as u16
        };
        let jp2 = minimal_jp2(info.width, info.height, components);
        fs::write(output, &jp2)?;
        if info.format == ImageFormat::Tiff {
            self.compressed
                .lock()
                .unwrap()
                .insert(jp2, expanded_fixture(source, self.expand_behaviour));
        }
        Ok(())
    }

    fn expand(
        &self,
        input: &Path,
        output: &Path,
        args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        cancel::check(cancel, "kdu_expand")?;
        self.calls.lock().unwrap().push(CodecCall::Expand {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            args: args.to_vec(),
        });
        if self.fail_expand {
            return Err(mock_failure("kdu_expand"));
        }
        let not_readable = || ProcessingError::InputNotReadable(input.to_path_buf());
        let jp2 = fs::read(input).map_err(|_| not_readable())?;
        let compressed = self.compressed.lock().unwrap();
        let fixture = compressed.get(&jp2).ok_or_else(not_readable)?;
        fixture.write(output);
        Ok(())
    }
}

/// Writes small real JPEG and TIFF files in place of ImageMagick output.
#[derive(Clone)]
pub(crate) struct MockRaster {
    pub calls: CallLog,
    pub colourspace: String,
    pub fail_jpg: bool,
}

impl Default for MockRaster {
    fn default() -> Self {
        Self {
            calls: CallLog::default(),
            colourspace: "sRGB".to_string(),
            fail_jpg: false,
        }
    }
}

fn without_frame_selector(input: &str) -> &str {
    match input.strip_suffix(']').and_then(|rest| rest.rsplit_once('[')) {
        Some((path, _)) => path,
        None => input,
    }
}

impl RasterCodec for MockRaster {
    fn convert(
        &self,
        input: &str,
        output: &str,
        initial_args: &[String],
        post_args: &[String],
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        cancel::check(cancel, "convert")?;
        self.calls.lock().unwrap().push(CodecCall::Convert {
            input: input.to_string(),
            output: output.to_string(),
            initial_args: initial_args.to_vec(),
            post_args: post_args.to_vec(),
        });
        fs::copy(without_frame_selector(input), output)?;
        Ok(())
    }

    fn mogrify(
        &self,
        input: &Path,
        _initial_args: &[String],
        post_args: &[String],
        _cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        self.calls.lock().unwrap().push(CodecCall::Mogrify {
            input: input.to_path_buf(),
            post_args: post_args.to_vec(),
        });
        Ok(())
    }

    fn identify_colourspace(&self, path: &Path) -> Result<String> {
        self.calls.lock().unwrap().push(CodecCall::Identify {
            input: path.to_path_buf(),
        });
        Ok(self.colourspace.clone())
    }

    /// JPEG sources become a TIFF with the same mode and profile.
    fn convert_to_tiff(&self, input: &Path, output: &Path, cancel: Option<&CancellationToken>) -> Result<()> {
        cancel::check(cancel, "convert")?;
        self.calls.lock().unwrap().push(CodecCall::ToTiff {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });
        let info = probe(input)?;
        if info.format == ImageFormat::Tiff {
            fs::copy(input, output)?;
            return Ok(());
        }
        let (w, h) = (info.width, info.height);
        let tiff = if info.mode.is_monochrome() {
            TestTiff::grey(w, h, gradient(w, h, 1))
        } else {
            TestTiff::rgb(w, h, gradient(w, h, 3))
        };
        match &info.icc_profile {
            Some(icc) => tiff.with_icc(icc).write(output),
            None => tiff.write(output),
        };
        Ok(())
    }

    fn convert_to_jpg(
        &self,
        input: &Path,
        output: &Path,
        resize: Option<f64>,
        quality: Option<u8>,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        cancel::check(cancel, "convert")?;
        self.calls.lock().unwrap().push(CodecCall::ToJpg {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            resize,
            quality,
        });
        if self.fail_jpg {
            return Err(mock_failure("convert"));
        }
        let info = probe(input)?;
        let scale = resize.unwrap_or(1.0);
        let width = ((info.width as f64 * scale) as u32).max(1);
        let height = ((info.height as f64 * scale) as u32).max(1);
        write_jpeg(output, width, height, info.mode.is_monochrome());
        Ok(())
    }
}

#[derive(Clone, Default)]
pub(crate) struct MockMetadata {
    pub calls: CallLog,
    pub fail: bool,
}

impl MetadataExtractor for MockMetadata {
    fn copy_embedded_metadata(
        &self,
        input: &Path,
        output: &Path,
        xmp_only: bool,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        cancel::check(cancel, "exiftool")?;
        self.calls.lock().unwrap().push(CodecCall::CopyMetadata {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            xmp_only,
        });
        if self.fail {
            return Err(mock_failure("exiftool"));
        }
        Ok(())
    }

    fn extract_xmp_to_sidecar(
        &self,
        input: &Path,
        output: &Path,
        cancel: Option<&CancellationToken>,
    ) -> Result<()> {
        cancel::check(cancel, "exiftool")?;
        self.calls.lock().unwrap().push(CodecCall::ExtractXmp {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
        });
        if self.fail {
            return Err(mock_failure("exiftool"));
        }
        fs::write(output, "<x:xmpmeta/>")?;
        Ok(())
    }
}
