//! JP2 box-structure validation (ISO/IEC 15444-1 Annex I).
//!
//! Only box headers, the `jp2h` contents and the ends of the codestream are
//! read, so validating a large preservation copy costs a few kilobytes of IO.

use std::fmt;
use std::fs::File;
use std::io::{self, BufReader, Read, Seek, SeekFrom};
use std::path::Path;

use tracing::{debug, error};

use crate::image_pipeline::common::access;
use crate::image_pipeline::common::error::{ProcessingError, Result};

const SIGNATURE: [u8; 4] = [0x0d, 0x0a, 0x87, 0x0a];
const SOC: [u8; 2] = [0xff, 0x4f];
const SIZ: [u8; 2] = [0xff, 0x51];
const EOC: [u8; 2] = [0xff, 0xd9];
/// `jp2h` holds a handful of small boxes; anything larger is not a header.
const MAX_HEADER_BOX: u64 = 16 * 1024 * 1024;

/// Outcome of one structural check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jp2Check {
    pub name: &'static str,
    pub passed: bool,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Jp2Report {
    pub valid: bool,
    pub checks: Vec<Jp2Check>,
}

impl Jp2Report {
    fn push(&mut self, name: &'static str, passed: bool, detail: impl Into<String>) {
        self.checks.push(Jp2Check {
            name,
            passed,
            detail: detail.into(),
        });
    }

    pub fn failures(&self) -> impl Iterator<Item = &Jp2Check> {
        self.checks.iter().filter(|c| !c.passed)
    }

    fn finish(mut self) -> Self {
        self.valid = !self.checks.is_empty() && self.checks.iter().all(|c| c.passed);
        self
    }
}

impl fmt::Display for Jp2Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for check in &self.checks {
            let status = if check.passed { "ok" } else { "FAILED" };
            writeln!(f, "  [{status}] {}: {}", check.name, check.detail)?;
        }
        Ok(())
    }
}

pub trait Jp2Validator {
    fn validate(&self, path: &Path) -> Result<Jp2Report>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NativeJp2Validator;

impl Jp2Validator for NativeJp2Validator {
    fn validate(&self, path: &Path) -> Result<Jp2Report> {
        access::ensure_readable(path)?;
        let mut reader = BufReader::new(File::open(path)?);
        let len = reader.seek(SeekFrom::End(0))?;
        Ok(inspect(&mut reader, len)?.finish())
    }
}

/// Validates with [`NativeJp2Validator`], failing with
/// [`ProcessingError::InvalidJp2`] if any check fails.
pub fn validate_jp2(path: &Path) -> Result<()> {
    ensure_valid_jp2(&NativeJp2Validator, path)
}

pub fn ensure_valid_jp2<V: Jp2Validator + ?Sized>(validator: &V, path: &Path) -> Result<()> {
    let report = validator.validate(path)?;
    if !report.valid {
        error!(path = %path.display(), report = %report, "JP2 failed structural validation");
        return Err(ProcessingError::InvalidJp2 {
            path: path.to_path_buf(),
            report,
        });
    }
    debug!(path = %path.display(), "Valid JP2 file");
    Ok(())
}

#[derive(Debug, Clone, Copy)]
struct BoxHeader {
    box_type: [u8; 4],
    offset: u64,
    header_len: u64,
    length: u64,
}

impl BoxHeader {
    fn content_offset(&self) -> u64 {
        self.offset + self.header_len
    }

    fn content_len(&self) -> u64 {
        self.length - self.header_len
    }

    fn type_name(&self) -> String {
        String::from_utf8_lossy(&self.box_type).into_owned()
    }
}

/// Walks the boxes in `[start, end)`. Errors describe the first structural
/// problem found.
fn read_boxes<R: Read + Seek>(reader: &mut R, start: u64, end: u64) -> std::result::Result<Vec<BoxHeader>, String> {
    let mut boxes = Vec::new();
    let mut offset = start;
    while offset < end {
        if end - offset < 8 {
            return Err(format!("{} trailing bytes at offset {offset}", end - offset));
        }
        let mut header = [0u8; 8];
        read_at(reader, offset, &mut header).map_err(|e| format!("box header at offset {offset}: {e}"))?;
        let mut length = u32::from_be_bytes([header[0], header[1], header[2], header[3]]) as u64;
        let box_type = [header[4], header[5], header[6], header[7]];
        let mut header_len = 8;

        if length == 1 {
            let mut extended = [0u8; 8];
            read_at(reader, offset + 8, &mut extended)
                .map_err(|e| format!("extended length at offset {offset}: {e}"))?;
            length = u64::from_be_bytes(extended);
            header_len = 16;
        } else if length == 0 {
            length = end - offset;
        }

        let found = BoxHeader {
            box_type,
            offset,
            header_len,
            length,
        };
        if length < header_len || length > end - offset {
            return Err(format!(
                "'{}' box at offset {offset} declares {length} bytes, {} available",
                found.type_name(),
                end - offset
            ));
        }
        boxes.push(found);
        offset += length;
    }
    Ok(boxes)
}

fn read_at<R: Read + Seek>(reader: &mut R, offset: u64, buf: &mut [u8]) -> io::Result<()> {
    reader.seek(SeekFrom::Start(offset))?;
    reader.read_exact(buf)
}

fn read_content<R: Read + Seek>(reader: &mut R, header: &BoxHeader, limit: u64) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; header.content_len().min(limit) as usize];
    read_at(reader, header.content_offset(), &mut buf)?;
    Ok(buf)
}

fn be_u32(bytes: &[u8], at: usize) -> Option<u32> {
    bytes.get(at..at + 4).map(|b| u32::from_be_bytes([b[0], b[1], b[2], b[3]]))
}

fn be_u16(bytes: &[u8], at: usize) -> Option<u16> {
    bytes.get(at..at + 2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Geometry {
    width: u32,
    height: u32,
    components: u16,
}

fn inspect<R: Read + Seek>(reader: &mut R, len: u64) -> io::Result<Jp2Report> {
    let mut report = Jp2Report::default();

    let boxes = match read_boxes(reader, 0, len) {
        Ok(boxes) => {
            report.push("box lengths", true, format!("{} top-level boxes", boxes.len()));
            boxes
        }
        Err(problem) => {
            report.push("box lengths", false, problem);
            return Ok(report);
        }
    };

    check_signature(reader, &boxes, &mut report)?;
    check_file_type(reader, &boxes, &mut report)?;
    let header_geometry = check_header(reader, &boxes, &mut report)?;
    let codestream_geometry = check_codestream(reader, &boxes, &mut report)?;

    match (header_geometry, codestream_geometry) {
        (Some(header), Some(codestream)) => report.push(
            "codestream geometry",
            header == codestream,
            format!(
                "ihdr {}x{}x{}, SIZ {}x{}x{}",
                header.width,
                header.height,
                header.components,
                codestream.width,
                codestream.height,
                codestream.components
            ),
        ),
        _ => report.push("codestream geometry", false, "not comparable"),
    }
    Ok(report)
}

fn check_signature<R: Read + Seek>(reader: &mut R, boxes: &[BoxHeader], report: &mut Jp2Report) -> io::Result<()> {
    let Some(first) = boxes.first() else {
        report.push("signature", false, "empty file");
        return Ok(());
    };
    if &first.box_type != b"jP  " || first.length != 12 {
        report.push("signature", false, format!("first box is '{}'", first.type_name()));
        return Ok(());
    }
    let content = read_content(reader, first, 4)?;
    report.push(
        "signature",
        content == SIGNATURE,
        if content == SIGNATURE { "present" } else { "corrupt signature bytes" },
    );
    Ok(())
}

fn check_file_type<R: Read + Seek>(reader: &mut R, boxes: &[BoxHeader], report: &mut Jp2Report) -> io::Result<()> {
    let Some(ftyp) = boxes.get(1).filter(|b| &b.box_type == b"ftyp") else {
        report.push("file type", false, "'ftyp' is not the second box");
        return Ok(());
    };
    let content = read_content(reader, ftyp, MAX_HEADER_BOX)?;
    if content.len() < 8 || (content.len() - 8) % 4 != 0 {
        report.push("file type", false, format!("'ftyp' has {} bytes", content.len()));
        return Ok(());
    }
    let compatible = content[8..].chunks_exact(4).any(|brand| brand == b"jp2 ");
    report.push(
        "file type",
        compatible,
        format!(
            "brand '{}', {}",
            String::from_utf8_lossy(&content[..4]),
            if compatible { "jp2 compatible" } else { "not jp2 compatible" }
        ),
    );
    Ok(())
}

fn check_header<R: Read + Seek>(
    reader: &mut R,
    boxes: &[BoxHeader],
    report: &mut Jp2Report,
) -> io::Result<Option<Geometry>> {
    let Some(jp2h) = boxes.iter().find(|b| &b.box_type == b"jp2h") else {
        report.push("header box", false, "no 'jp2h' box");
        return Ok(None);
    };
    if jp2h.content_len() > MAX_HEADER_BOX {
        report.push("header box", false, format!("'jp2h' is {} bytes", jp2h.content_len()));
        return Ok(None);
    }
    let children = match read_boxes(reader, jp2h.content_offset(), jp2h.offset + jp2h.length) {
        Ok(children) => children,
        Err(problem) => {
            report.push("header box", false, problem);
            return Ok(None);
        }
    };

    let first_is_ihdr = children.first().is_some_and(|b| &b.box_type == b"ihdr");
    let has_colr = children.iter().any(|b| &b.box_type == b"colr");
    report.push(
        "header box",
        first_is_ihdr && has_colr,
        match (first_is_ihdr, has_colr) {
            (true, true) => "'ihdr' first, 'colr' present".to_string(),
            (false, _) => "'ihdr' is not the first child of 'jp2h'".to_string(),
            (true, false) => "no 'colr' box".to_string(),
        },
    );
    if !first_is_ihdr {
        return Ok(None);
    }

    let ihdr = read_content(reader, &children[0], 64)?;
    if ihdr.len() != 14 {
        report.push("image header", false, format!("'ihdr' has {} bytes, expected 14", ihdr.len()));
        return Ok(None);
    }
    let geometry = Geometry {
        height: be_u32(&ihdr, 0).unwrap_or(0),
        width: be_u32(&ihdr, 4).unwrap_or(0),
        components: be_u16(&ihdr, 8).unwrap_or(0),
    };
    let compression = ihdr[11];
    let passed = geometry.width > 0 && geometry.height > 0 && geometry.components > 0 && compression == 7;
    report.push(
        "image header",
        passed,
        format!(
            "{}x{}, {} components, compression type {compression}",
            geometry.width, geometry.height, geometry.components
        ),
    );
    Ok(passed.then_some(geometry))
}

fn check_codestream<R: Read + Seek>(
    reader: &mut R,
    boxes: &[BoxHeader],
    report: &mut Jp2Report,
) -> io::Result<Option<Geometry>> {
    let Some(jp2c) = boxes.iter().find(|b| &b.box_type == b"jp2c") else {
        report.push("codestream", false, "no 'jp2c' box");
        return Ok(None);
    };
    // SOC, SIZ marker, Lsiz, Rsiz, 8 x 4 bytes of geometry, Csiz
    const SIZ_PREFIX: u64 = 2 + 2 + 2 + 2 + 32 + 2;
    if jp2c.content_len() < SIZ_PREFIX + 2 {
        report.push("codestream", false, format!("'jp2c' is only {} bytes", jp2c.content_len()));
        return Ok(None);
    }

    let head = read_content(reader, jp2c, SIZ_PREFIX)?;
    let mut tail = [0u8; 2];
    read_at(reader, jp2c.offset + jp2c.length - 2, &mut tail)?;

    let starts = head[0..2] == SOC && head[2..4] == SIZ;
    let ends = tail == EOC;
    report.push(
        "codestream",
        starts && ends,
        match (starts, ends) {
            (true, true) => "SOC, SIZ and EOC markers present",
            (false, _) => "does not start with SOC followed by SIZ",
            (true, false) => "does not end with EOC",
        },
    );
    if !starts {
        return Ok(None);
    }

    let field = |index: usize| be_u32(&head, 8 + index * 4).unwrap_or(0);
    let (x_size, y_size, x_offset, y_offset) = (field(0), field(1), field(2), field(3));
    Ok(Some(Geometry {
        width: x_size.saturating_sub(x_offset),
        height: y_size.saturating_sub(y_offset),
        components: be_u16(&head, 40).unwrap_or(0),
    }))
}
