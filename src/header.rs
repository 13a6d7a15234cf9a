//! The fixed 128-byte header at the start of both files of a pair.
//!
//! Header integers are always little endian; the coding byte describes the
//! rest of the pair.

use crate::codec;
use crate::dtype::Coding;
use crate::NefisError;
use byteorder::{ByteOrder, LittleEndian};
use std::error::Error;
use std::fmt;
use std::io;

/// Total header length. Data in the `.dat` file starts at this offset, the
/// directory body of the `.def` file likewise.
pub(crate) const HEADER_LEN: usize = 128;

/// Width of the free-form header text.
pub(crate) const HEADER_TEXT_LEN: usize = 64;

const MAGIC_LEN: usize = 8;
const VERSION_OFFSET: usize = 8;
const CODING_OFFSET: usize = 10;
const TOKEN_OFFSET: usize = 16;
const BODY_LEN_OFFSET: usize = 24;
const CRC_OFFSET: usize = 32;
const TEXT_OFFSET: usize = 40;

pub(crate) const DEFAULT_DEF_TEXT: &str = "NEFIS Definition File; 5.00";
pub(crate) const DEFAULT_DAT_TEXT: &str = "NEFIS Data File; 5.00";

/// Which file of the pair a header belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum FileKind {
    Definition,
    Data,
}

impl FileKind {
    fn magic(self) -> &'static [u8; MAGIC_LEN] {
        match self {
            FileKind::Definition => b"\x93NEF-DEF",
            FileKind::Data => b"\x93NEF-DAT",
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FileKind::Definition => write!(f, ".def"),
            FileKind::Data => write!(f, ".dat"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum ParseHeaderError {
    MagicString(FileKind),
    Version { major: u8, minor: u8 },
    Coding(u8),
    Text,
}

impl Error for ParseHeaderError {}

impl fmt::Display for ParseHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use ParseHeaderError::*;
        match self {
            MagicString(kind) => write!(f, "start does not match the {} magic string", kind),
            Version { major, minor } => write!(f, "unknown version number: {}.{}", major, minor),
            Coding(byte) => write!(f, "unknown coding byte: {:#04x}", byte),
            Text => write!(f, "header text is not valid UTF-8"),
        }
    }
}

#[derive(Debug)]
pub(crate) enum ReadHeaderError {
    Io(io::Error),
    Parse(ParseHeaderError),
}

impl Error for ReadHeaderError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ReadHeaderError::Io(err) => Some(err),
            ReadHeaderError::Parse(err) => Some(err),
        }
    }
}

impl fmt::Display for ReadHeaderError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ReadHeaderError::Io(err) => write!(f, "I/O error: {}", err),
            ReadHeaderError::Parse(err) => write!(f, "error parsing header: {}", err),
        }
    }
}

impl From<io::Error> for ReadHeaderError {
    fn from(err: io::Error) -> ReadHeaderError {
        ReadHeaderError::Io(err)
    }
}

impl From<ParseHeaderError> for ReadHeaderError {
    fn from(err: ParseHeaderError) -> ReadHeaderError {
        ReadHeaderError::Parse(err)
    }
}

impl From<ReadHeaderError> for NefisError {
    fn from(err: ReadHeaderError) -> NefisError {
        match err {
            ReadHeaderError::Io(err) if err.kind() == io::ErrorKind::UnexpectedEof => {
                NefisError::Format("file is too short to hold a header".into())
            }
            ReadHeaderError::Io(err) => NefisError::Io(err),
            ReadHeaderError::Parse(err) => NefisError::Format(err.to_string()),
        }
    }
}

#[allow(non_camel_case_types)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Version {
    V5_0,
}

impl Version {
    fn from_bytes(bytes: &[u8]) -> Result<Self, ParseHeaderError> {
        match (bytes[0], bytes[1]) {
            (5, 0) => Ok(Version::V5_0),
            (major, minor) => Err(ParseHeaderError::Version { major, minor }),
        }
    }

    fn major_version(self) -> u8 {
        match self {
            Version::V5_0 => 5,
        }
    }

    fn minor_version(self) -> u8 {
        match self {
            Version::V5_0 => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Header {
    pub kind: FileKind,
    pub coding: Coding,
    /// Shared by both files of a pair; written once at creation.
    pub pair_token: u64,
    /// Length of the directory body. Always 0 for `.dat` headers.
    pub body_len: u64,
    /// CRC-32 of the directory body. Always 0 for `.dat` headers.
    pub body_crc: u32,
    pub text: String,
}

impl Header {
    pub fn new(kind: FileKind, coding: Coding, pair_token: u64, text: &str) -> Header {
        Header {
            kind,
            coding,
            pair_token,
            body_len: 0,
            body_crc: 0,
            text: text.to_owned(),
        }
    }

    pub fn from_reader<R: io::Read>(
        mut reader: R,
        kind: FileKind,
    ) -> Result<Self, ReadHeaderError> {
        let mut buf = [0; HEADER_LEN];
        reader.read_exact(&mut buf)?;
        if &buf[..MAGIC_LEN] != kind.magic() {
            return Err(ParseHeaderError::MagicString(kind).into());
        }
        Version::from_bytes(&buf[VERSION_OFFSET..VERSION_OFFSET + 2])?;
        let coding = Coding::from_byte(buf[CODING_OFFSET])
            .ok_or(ParseHeaderError::Coding(buf[CODING_OFFSET]))?;
        let text = std::str::from_utf8(codec::strip_padding(
            &buf[TEXT_OFFSET..TEXT_OFFSET + HEADER_TEXT_LEN],
        ))
        .map_err(|_| ParseHeaderError::Text)?;
        Ok(Header {
            kind,
            coding,
            pair_token: LittleEndian::read_u64(&buf[TOKEN_OFFSET..]),
            body_len: LittleEndian::read_u64(&buf[BODY_LEN_OFFSET..]),
            body_crc: LittleEndian::read_u32(&buf[CRC_OFFSET..]),
            text: text.to_owned(),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, NefisError> {
        let version = Version::V5_0;
        let mut out = vec![0; HEADER_LEN];
        out[..MAGIC_LEN].copy_from_slice(self.kind.magic());
        out[VERSION_OFFSET] = version.major_version();
        out[VERSION_OFFSET + 1] = version.minor_version();
        out[CODING_OFFSET] = self.coding.to_byte();
        LittleEndian::write_u64(&mut out[TOKEN_OFFSET..], self.pair_token);
        LittleEndian::write_u64(&mut out[BODY_LEN_OFFSET..], self.body_len);
        LittleEndian::write_u32(&mut out[CRC_OFFSET..], self.body_crc);
        let text = codec::encode_text(&self.text, HEADER_TEXT_LEN, "header text")?;
        out[TEXT_OFFSET..TEXT_OFFSET + HEADER_TEXT_LEN].copy_from_slice(&text);
        Ok(out)
    }
}
