//! Fixed-width field encoding shared by the `.def` and `.dat` layouts.
//!
//! Every function here is pure: it converts between in-memory values and the
//! byte representation of a single field.

use crate::dtype::{Coding, DataType};
use crate::NefisError;
use num_traits::ToPrimitive;

/// Dispatches a `byteorder::ByteOrder` method on the file's coding.
macro_rules! by_coding {
    ($coding:expr, $method:ident($($arg:expr),*)) => {
        match $coding {
            $crate::dtype::Coding::Big => {
                <::byteorder::BigEndian as ::byteorder::ByteOrder>::$method($($arg),*)
            }
            $crate::dtype::Coding::Little => {
                <::byteorder::LittleEndian as ::byteorder::ByteOrder>::$method($($arg),*)
            }
        }
    };
}

/// Width of every identifier field (element, cell, group and attribute names).
pub const NAME_LEN: usize = 16;

/// Maximum rank of elements and groups.
pub const MAX_DIMS: usize = 5;

/// Width of the quantity and unit fields of an element.
pub(crate) const QUANTITY_LEN: usize = 16;
pub(crate) const UNIT_LEN: usize = 16;
/// Width of the description field of an element.
pub(crate) const DESCRIPTION_LEN: usize = 64;
/// Width of a text attribute value.
pub(crate) const ATTRIBUTE_TEXT_LEN: usize = 16;

fn is_storable(c: char) -> bool {
    c.is_ascii() && !c.is_ascii_control()
}

/// Encodes an identifier into its space-padded fixed-width field.
///
/// Names are never truncated: anything longer than [`NAME_LEN`] bytes is
/// rejected, as are empty names, names with leading or trailing spaces,
/// names containing `/` (the separator of qualified variable names) and names
/// with non-printable or non-ASCII characters.
pub fn encode_name(name: &str) -> Result<[u8; NAME_LEN], NefisError> {
    if name.is_empty()
        || name.len() > NAME_LEN
        || name.trim() != name
        || name.contains('/')
        || !name.chars().all(is_storable)
    {
        return Err(NefisError::InvalidName(name.to_owned()));
    }
    let mut out = [b' '; NAME_LEN];
    out[..name.len()].copy_from_slice(name.as_bytes());
    Ok(out)
}

/// Decodes an identifier field, stripping trailing padding.
pub fn decode_name(bytes: &[u8]) -> Result<String, NefisError> {
    let name = decode_text(bytes)?;
    if name.is_empty() {
        return Err(NefisError::Format("empty name field".into()));
    }
    Ok(name)
}

/// Encodes a free-text field into `width` space-padded bytes.
pub(crate) fn encode_text(text: &str, width: usize, field: &str) -> Result<Vec<u8>, NefisError> {
    if text.len() > width {
        return Err(NefisError::InvalidDescriptor(format!(
            "{} is {} bytes long, maximum is {}",
            field,
            text.len(),
            width
        )));
    }
    if text.trim_end() != text || !text.chars().all(is_storable) {
        return Err(NefisError::InvalidDescriptor(format!(
            "{} {:?} contains characters that cannot be stored",
            field, text
        )));
    }
    let mut out = vec![b' '; width];
    out[..text.len()].copy_from_slice(text.as_bytes());
    Ok(out)
}

/// Strips trailing space and NUL padding.
pub(crate) fn strip_padding(bytes: &[u8]) -> &[u8] {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != 0)
        .map_or(0, |i| i + 1);
    &bytes[..end]
}

/// Decodes a free-text field, stripping trailing padding.
pub(crate) fn decode_text(bytes: &[u8]) -> Result<String, NefisError> {
    String::from_utf8(strip_padding(bytes).to_vec())
        .map_err(|_| NefisError::Format("text field is not valid UTF-8".into()))
}

/// Space-pads a character value to exactly `width` bytes.
pub(crate) fn pad_character(value: &str, width: usize) -> Result<Vec<u8>, NefisError> {
    if value.len() > width {
        return Err(NefisError::ShapeMismatch(format!(
            "character value of {} bytes does not fit width {}",
            value.len(),
            width
        )));
    }
    let mut out = Vec::with_capacity(width);
    out.extend_from_slice(value.as_bytes());
    out.resize(width, b' ');
    Ok(out)
}

/// A single decoded value.
#[derive(Clone, Debug, PartialEq)]
pub enum Scalar {
    Real32(f32),
    Real64(f64),
    Integer32(i32),
    Integer64(i64),
    Character(String),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Real32(_) => DataType::Real32,
            Scalar::Real64(_) => DataType::Real64,
            Scalar::Integer32(_) => DataType::Integer32,
            Scalar::Integer64(_) => DataType::Integer64,
            Scalar::Character(s) => DataType::Character(s.len()),
        }
    }
}

/// Decodes one value of `data_type` from `bytes`, which must be exactly
/// `data_type.byte_width()` long.
pub fn decode_scalar(
    bytes: &[u8],
    data_type: DataType,
    coding: Coding,
) -> Result<Scalar, NefisError> {
    if bytes.len() != data_type.byte_width() {
        return Err(NefisError::ShapeMismatch(format!(
            "{} bytes given for a {} value",
            bytes.len(),
            data_type
        )));
    }
    Ok(match data_type {
        DataType::Real32 => Scalar::Real32(by_coding!(coding, read_f32(bytes))),
        DataType::Real64 => Scalar::Real64(by_coding!(coding, read_f64(bytes))),
        DataType::Integer32 => Scalar::Integer32(by_coding!(coding, read_i32(bytes))),
        DataType::Integer64 => Scalar::Integer64(by_coding!(coding, read_i64(bytes))),
        DataType::Character(_) => Scalar::Character(
            String::from_utf8(strip_padding(bytes).to_vec())
                .map_err(|_| NefisError::Format("character data is not valid UTF-8".into()))?,
        ),
    })
}

/// Appends the encoding of `value` as a `data_type` field to `out`.
pub fn encode_scalar(
    value: &Scalar,
    data_type: DataType,
    coding: Coding,
    out: &mut Vec<u8>,
) -> Result<(), NefisError> {
    match (value, data_type) {
        (Scalar::Character(s), DataType::Character(width)) => {
            out.extend_from_slice(&pad_character(s, width)?);
        }
        (Scalar::Real32(v), DataType::Real32) => {
            let mut buf = [0; 4];
            by_coding!(coding, write_f32(&mut buf, *v));
            out.extend_from_slice(&buf);
        }
        (Scalar::Real64(v), DataType::Real64) => {
            let mut buf = [0; 8];
            by_coding!(coding, write_f64(&mut buf, *v));
            out.extend_from_slice(&buf);
        }
        (Scalar::Integer32(v), DataType::Integer32) => {
            let mut buf = [0; 4];
            by_coding!(coding, write_i32(&mut buf, *v));
            out.extend_from_slice(&buf);
        }
        (Scalar::Integer64(v), DataType::Integer64) => {
            let mut buf = [0; 8];
            by_coding!(coding, write_i64(&mut buf, *v));
            out.extend_from_slice(&buf);
        }
        (other, _) => {
            return Err(NefisError::ShapeMismatch(format!(
                "cannot encode a {} value as {}",
                other.data_type().element_type(),
                data_type
            )))
        }
    }
    Ok(())
}

/// Encodes a dimension vector into the format's five slots, zero-filling
/// unused trailing slots.
pub fn encode_dimensions(dims: &[usize]) -> Result<[u32; MAX_DIMS], NefisError> {
    if dims.len() > MAX_DIMS {
        return Err(NefisError::TooManyDimensions(dims.len()));
    }
    let mut out = [0; MAX_DIMS];
    for (slot, &dim) in out.iter_mut().zip(dims) {
        *slot = dim
            .to_u32()
            .ok_or_else(|| NefisError::InvalidShape(format!("extent {} does not fit", dim)))?;
    }
    Ok(out)
}

/// Inverse of [`encode_dimensions`] for a known rank.
pub fn decode_dimensions(rank: usize, slots: &[u32; MAX_DIMS]) -> Result<Vec<usize>, NefisError> {
    if rank > MAX_DIMS {
        return Err(NefisError::Format(format!("rank {} exceeds {}", rank, MAX_DIMS)));
    }
    slots[..rank]
        .iter()
        .map(|&d| {
            d.to_usize()
                .ok_or_else(|| NefisError::Format(format!("extent {} does not fit", d)))
        })
        .collect()
}
