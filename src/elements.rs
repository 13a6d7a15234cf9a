//! Conversion between Rust element types and stored values.

use crate::codec;
use crate::dtype::{Coding, DataType};
use crate::NefisError;
use ndarray::{ArrayD, IxDyn};

/// An element type that can be decoded from stored values.
///
/// The stored type must match exactly; there is no widening or narrowing.
pub trait ReadableElement: Sized {
    /// Decodes `bytes`, which hold consecutive values of `data_type`.
    fn read_values(
        bytes: &[u8],
        data_type: DataType,
        coding: Coding,
    ) -> Result<Vec<Self>, NefisError>;
}

/// An element type that can be encoded into stored values.
pub trait WritableElement: Sized {
    /// Appends the encoding of `values` as `data_type` fields to `out`.
    fn write_values<'a, I>(
        values: I,
        data_type: DataType,
        coding: Coding,
        out: &mut Vec<u8>,
    ) -> Result<(), NefisError>
    where
        I: IntoIterator<Item = &'a Self>,
        Self: 'a;
}

fn check_len(bytes: &[u8], data_type: DataType) -> Result<usize, NefisError> {
    let width = data_type.byte_width();
    if bytes.len() % width != 0 {
        return Err(NefisError::ShapeMismatch(format!(
            "{} bytes is not a whole number of {} values",
            bytes.len(),
            data_type
        )));
    }
    Ok(bytes.len() / width)
}

macro_rules! impl_numeric {
    ($elem:ty, $data_type:path, $zero:expr, $read_into:ident, $write_into:ident) => {
        impl ReadableElement for $elem {
            fn read_values(
                bytes: &[u8],
                data_type: DataType,
                coding: Coding,
            ) -> Result<Vec<Self>, NefisError> {
                if data_type != $data_type {
                    return Err(NefisError::TypeMismatch {
                        data_type,
                        requested: stringify!($elem),
                    });
                }
                let mut out = vec![$zero; check_len(bytes, data_type)?];
                by_coding!(coding, $read_into(bytes, &mut out));
                Ok(out)
            }
        }

        impl WritableElement for $elem {
            fn write_values<'a, I>(
                values: I,
                data_type: DataType,
                coding: Coding,
                out: &mut Vec<u8>,
            ) -> Result<(), NefisError>
            where
                I: IntoIterator<Item = &'a Self>,
                Self: 'a,
            {
                if data_type != $data_type {
                    return Err(NefisError::TypeMismatch {
                        data_type,
                        requested: stringify!($elem),
                    });
                }
                let values: Vec<$elem> = values.into_iter().copied().collect();
                let start = out.len();
                out.resize(start + values.len() * data_type.byte_width(), 0);
                by_coding!(coding, $write_into(&values, &mut out[start..]));
                Ok(())
            }
        }
    };
}

impl_numeric!(f32, DataType::Real32, 0., read_f32_into, write_f32_into);
impl_numeric!(f64, DataType::Real64, 0., read_f64_into, write_f64_into);
impl_numeric!(i32, DataType::Integer32, 0, read_i32_into, write_i32_into);
impl_numeric!(i64, DataType::Integer64, 0, read_i64_into, write_i64_into);

impl ReadableElement for String {
    fn read_values(
        bytes: &[u8],
        data_type: DataType,
        _coding: Coding,
    ) -> Result<Vec<Self>, NefisError> {
        match data_type {
            DataType::Character(width) => {
                check_len(bytes, data_type)?;
                bytes.chunks_exact(width).map(codec::decode_text).collect()
            }
            _ => Err(NefisError::TypeMismatch {
                data_type,
                requested: "String",
            }),
        }
    }
}

impl WritableElement for String {
    fn write_values<'a, I>(
        values: I,
        data_type: DataType,
        _coding: Coding,
        out: &mut Vec<u8>,
    ) -> Result<(), NefisError>
    where
        I: IntoIterator<Item = &'a Self>,
        Self: 'a,
    {
        match data_type {
            DataType::Character(width) => {
                for value in values {
                    out.extend_from_slice(&codec::pad_character(value, width)?);
                }
                Ok(())
            }
            _ => Err(NefisError::TypeMismatch {
                data_type,
                requested: "String",
            }),
        }
    }
}

/// Decodes `bytes` into an array with the given row-major shape.
pub(crate) fn to_array<A: ReadableElement>(
    bytes: &[u8],
    data_type: DataType,
    coding: Coding,
    shape: &[usize],
) -> Result<ArrayD<A>, NefisError> {
    let values = A::read_values(bytes, data_type, coding)?;
    ArrayD::from_shape_vec(IxDyn(shape), values)
        .map_err(|err| NefisError::ShapeMismatch(err.to_string()))
}
