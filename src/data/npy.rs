// ============================================================
// Layer 4 — NumPy .npy Codec
// ============================================================
// Mels and speaker embeddings arrive as `.npy` files written by
// the Python preprocessing step. Only what that step produces
// is supported:
//   - little-endian float32 ('<f4')
//   - C (row-major) order
//   - format versions 1.0, 2.0 and 3.0
//
// File layout:
//   \x93NUMPY | major | minor | header_len (u16 v1, u32 v2+) | header | data
//
// The header is a Python dict literal, padded with spaces and
// terminated by '\n' so that the data starts 64-byte aligned.

use std::{fs, path::Path};

use thiserror::Error;

const MAGIC: &[u8] = b"\x93NUMPY";
const ALIGN: usize = 64;

#[derive(Error, Debug)]
pub enum NpyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an .npy file (bad magic)")]
    BadMagic,

    #[error("unsupported .npy format version {0}")]
    UnsupportedVersion(u8),

    #[error("malformed .npy header: {0}")]
    MalformedHeader(String),

    #[error("unsupported dtype '{0}', expected '<f4'")]
    UnsupportedDtype(String),

    #[error("fortran-ordered arrays are not supported")]
    FortranOrder,

    #[error("data holds {actual} values but shape implies {expected}")]
    SizeMismatch { expected: usize, actual: usize },
}

/// A decoded float32 array.
#[derive(Debug, Clone, PartialEq)]
pub struct NpyArray {
    pub shape:  Vec<usize>,
    pub values: Vec<f32>,
}

/// Read and decode a float32 `.npy` file.
pub fn read_f32(path: &Path) -> Result<NpyArray, NpyError> {
    let bytes = fs::read(path)?;
    parse_f32(&bytes)
}

/// Decode a float32 `.npy` byte buffer.
pub fn parse_f32(bytes: &[u8]) -> Result<NpyArray, NpyError> {
    if bytes.len() < 10 || &bytes[..6] != MAGIC {
        return Err(NpyError::BadMagic);
    }

    let major = bytes[6];
    let (header_len, header_start) = match major {
        1 => (u16::from_le_bytes([bytes[8], bytes[9]]) as usize, 10),
        2 | 3 => {
            if bytes.len() < 12 {
                return Err(NpyError::MalformedHeader("truncated length field".into()));
            }
            let len = u32::from_le_bytes([bytes[8], bytes[9], bytes[10], bytes[11]]);
            (len as usize, 12)
        }
        v => return Err(NpyError::UnsupportedVersion(v)),
    };

    let data_start = header_start + header_len;
    if bytes.len() < data_start {
        return Err(NpyError::MalformedHeader("header runs past end of file".into()));
    }

    let header = std::str::from_utf8(&bytes[header_start..data_start])
        .map_err(|_| NpyError::MalformedHeader("header is not utf-8".into()))?;

    let descr = header_value(header, "descr")?;
    let descr = descr.trim().trim_matches(|c| c == '\'' || c == '"');
    if descr != "<f4" {
        return Err(NpyError::UnsupportedDtype(descr.to_string()));
    }

    if header_value(header, "fortran_order")?.trim() != "False" {
        return Err(NpyError::FortranOrder);
    }

    let shape = parse_shape(header)?;
    let expected: usize = shape.iter().product();

    let data = &bytes[data_start..];
    if data.len() % 4 != 0 || data.len() / 4 != expected {
        return Err(NpyError::SizeMismatch { expected, actual: data.len() / 4 });
    }

    let values = data
        .chunks_exact(4)
        .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
        .collect();

    Ok(NpyArray { shape, values })
}

/// Encode a float32 array as a version 1.0 `.npy` buffer.
pub fn encode_f32(shape: &[usize], values: &[f32]) -> Result<Vec<u8>, NpyError> {
    let expected: usize = shape.iter().product();
    if expected != values.len() {
        return Err(NpyError::SizeMismatch { expected, actual: values.len() });
    }

    let dims = match shape {
        [d] => format!("({d},)"),
        _ => format!(
            "({})",
            shape.iter().map(|d| d.to_string()).collect::<Vec<_>>().join(", ")
        ),
    };
    let mut header = format!("{{'descr': '<f4', 'fortran_order': False, 'shape': {dims}, }}");

    // magic(6) + version(2) + len(2) + header + '\n' must be a multiple of ALIGN
    let unpadded = 10 + header.len() + 1;
    let padding = (ALIGN - unpadded % ALIGN) % ALIGN;
    header.extend(std::iter::repeat(' ').take(padding));
    header.push('\n');

    let mut out = Vec::with_capacity(10 + header.len() + values.len() * 4);
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&[1, 0]);
    out.extend_from_slice(&(header.len() as u16).to_le_bytes());
    out.extend_from_slice(header.as_bytes());
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    Ok(out)
}

/// Encode and write a float32 array to disk.
pub fn write_f32(path: &Path, shape: &[usize], values: &[f32]) -> Result<(), NpyError> {
    let bytes = encode_f32(shape, values)?;
    fs::write(path, bytes)?;
    Ok(())
}

/// Return the raw text following `'key':` up to the next top-level comma.
fn header_value<'a>(header: &'a str, key: &str) -> Result<&'a str, NpyError> {
    let single = format!("'{key}':");
    let double = format!("\"{key}\":");
    let start = header
        .find(&single)
        .map(|i| i + single.len())
        .or_else(|| header.find(&double).map(|i| i + double.len()))
        .ok_or_else(|| NpyError::MalformedHeader(format!("missing '{key}'")))?;

    let rest = &header[start..];
    let mut depth = 0i32;
    for (i, c) in rest.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' | '}' if depth == 0 => return Ok(&rest[..i]),
            _ => {}
        }
    }
    Ok(rest)
}

fn parse_shape(header: &str) -> Result<Vec<usize>, NpyError> {
    let raw = header_value(header, "shape")?.trim();
    let inner = raw
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| NpyError::MalformedHeader(format!("bad shape '{raw}'")))?;

    inner
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<usize>()
                .map_err(|_| NpyError::MalformedHeader(format!("bad dimension '{s}'")))
        })
        .collect()
}
