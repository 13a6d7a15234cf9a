//! Element types and file byte order.

use crate::NefisError;
use std::fmt;
use std::str::FromStr;

/// Width of the type tag field in the `.def` file.
pub(crate) const TYPE_TAG_LEN: usize = 8;

/// The basic kind of an element, as named in a definition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ElementType {
    Real,
    Integer,
    Character,
}

impl ElementType {
    /// The 8-byte tag stored in the `.def` file.
    pub(crate) fn tag(self) -> &'static [u8; TYPE_TAG_LEN] {
        match self {
            ElementType::Real => b"REAL    ",
            ElementType::Integer => b"INTEGER ",
            ElementType::Character => b"CHARACTE",
        }
    }

    pub(crate) fn from_tag(tag: &[u8]) -> Option<ElementType> {
        match tag {
            b"REAL    " => Some(ElementType::Real),
            b"INTEGER " => Some(ElementType::Integer),
            b"CHARACTE" => Some(ElementType::Character),
            _ => None,
        }
    }
}

impl FromStr for ElementType {
    type Err = NefisError;

    /// Parses `real`, `integer` or `character` in any case. The truncated
    /// `characte` spelling of the on-disk tag is accepted too.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "REAL" => Ok(ElementType::Real),
            "INTEGER" => Ok(ElementType::Integer),
            "CHARACTER" | "CHARACTE" => Ok(ElementType::Character),
            other => Err(NefisError::InvalidDescriptor(format!(
                "unknown element type {:?}",
                other
            ))),
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(match self {
            ElementType::Real => "REAL",
            ElementType::Integer => "INTEGER",
            ElementType::Character => "CHARACTER",
        })
    }
}

/// An element type resolved together with its byte width.
///
/// This is decided once, when the element is defined, and carried on the
/// element from then on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DataType {
    Real32,
    Real64,
    Integer32,
    Integer64,
    /// Fixed-width byte string of the given length.
    Character(usize),
}

impl DataType {
    /// Combines a type kind and byte width, rejecting widths the format
    /// does not support for that kind.
    pub fn from_parts(kind: ElementType, byte_width: usize) -> Result<DataType, NefisError> {
        match (kind, byte_width) {
            (ElementType::Real, 4) => Ok(DataType::Real32),
            (ElementType::Real, 8) => Ok(DataType::Real64),
            (ElementType::Integer, 4) => Ok(DataType::Integer32),
            (ElementType::Integer, 8) => Ok(DataType::Integer64),
            (ElementType::Character, n) if n > 0 => Ok(DataType::Character(n)),
            (kind, n) => Err(NefisError::InvalidDescriptor(format!(
                "unsupported byte width {} for {}",
                n, kind
            ))),
        }
    }

    pub fn element_type(self) -> ElementType {
        match self {
            DataType::Real32 | DataType::Real64 => ElementType::Real,
            DataType::Integer32 | DataType::Integer64 => ElementType::Integer,
            DataType::Character(_) => ElementType::Character,
        }
    }

    /// Number of bytes of a single value.
    pub fn byte_width(self) -> usize {
        match self {
            DataType::Real32 | DataType::Integer32 => 4,
            DataType::Real64 | DataType::Integer64 => 8,
            DataType::Character(n) => n,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}*{}", self.element_type(), self.byte_width())
    }
}

/// Byte order of the numeric fields in a file pair.
///
/// The format's neutral representation is big endian.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Coding {
    #[default]
    Big,
    Little,
}

impl Coding {
    pub(crate) fn to_byte(self) -> u8 {
        match self {
            Coding::Big => b'B',
            Coding::Little => b'L',
        }
    }

    pub(crate) fn from_byte(byte: u8) -> Option<Coding> {
        match byte {
            b'B' => Some(Coding::Big),
            b'L' => Some(Coding::Little),
            _ => None,
        }
    }
}
