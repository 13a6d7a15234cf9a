use crate::dtype::DataType;
use std::error::Error;
use std::fmt;
use std::io;
use std::path::PathBuf;

/// The catalog an entry belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Catalog {
    Element,
    Cell,
    GroupDefinition,
    GroupInstance,
    Attribute,
}

impl fmt::Display for Catalog {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Catalog::Element => "element",
            Catalog::Cell => "cell",
            Catalog::GroupDefinition => "group definition",
            Catalog::GroupInstance => "group instance",
            Catalog::Attribute => "attribute",
        };
        f.write_str(name)
    }
}

/// An error raised by any operation on a NEFIS file pair.
///
/// Every operation either succeeds completely or returns one of these
/// variants; nothing is retried internally.
#[derive(Debug)]
pub enum NefisError {
    /// An identifier is empty, too long, or contains characters that cannot
    /// be stored in a fixed-width name field.
    InvalidName(String),
    /// An element, cell or attribute definition is malformed.
    InvalidDescriptor(String),
    /// A group definition's dimensions or order are malformed.
    InvalidShape(String),
    /// More than five dimensions were supplied.
    TooManyDimensions(usize),
    /// The name is already present in the catalog.
    DuplicateName { catalog: Catalog, name: String },
    /// A cell definition references an element that does not exist.
    UnknownElement(String),
    /// A group definition references a cell that does not exist.
    UnknownCell(String),
    /// A group instance references a group definition that does not exist.
    UnknownGroupDef(String),
    /// A lookup found no entry with this name.
    NotFound { catalog: Catalog, name: String },
    /// A variable name matches an element held by several group instances;
    /// qualify it as `<group>/<element>`.
    AmbiguousVariable { name: String, groups: Vec<String> },
    /// The element exists but is not part of the group instance's cell.
    ElementNotInGroup { element: String, group: String },
    /// The request does not fit the declared shape (rank or buffer length).
    ShapeMismatch(String),
    /// An index lies outside the declared extent or the current `max_index`.
    ///
    /// For the unbounded axis of a group that another session is still
    /// appending to, this can be transient; re-check `max_index`.
    OutOfRange { axis: usize, index: usize, extent: usize },
    /// The requested Rust element type does not match the element's type.
    TypeMismatch { data_type: DataType, requested: &'static str },
    /// A catalog grew beyond the number of entries the `.def` body can record.
    CatalogOverflow(Catalog),
    /// File content failed structural validation.
    Format(String),
    /// The `.dat` and `.def` files do not belong to the same pair.
    MismatchedPair { dat: PathBuf, def: PathBuf },
    /// A file required by the open mode does not exist.
    FileNotFound(PathBuf),
    /// The file pair is already open in a conflicting mode.
    AlreadyOpen(PathBuf),
    /// The session has been closed.
    SessionClosed,
    /// A mutating operation was attempted on a read-only session.
    ReadOnly,
    /// An error in the underlying file system.
    Io(io::Error),
}

impl Error for NefisError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            NefisError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for NefisError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use NefisError::*;
        match self {
            InvalidName(name) => write!(f, "invalid name: {:?}", name),
            InvalidDescriptor(msg) => write!(f, "invalid descriptor: {}", msg),
            InvalidShape(msg) => write!(f, "invalid shape: {}", msg),
            TooManyDimensions(n) => write!(f, "too many dimensions: {} (maximum is 5)", n),
            DuplicateName { catalog, name } => write!(f, "duplicate {} name: {}", catalog, name),
            UnknownElement(name) => write!(f, "unknown element: {}", name),
            UnknownCell(name) => write!(f, "unknown cell: {}", name),
            UnknownGroupDef(name) => write!(f, "unknown group definition: {}", name),
            NotFound { catalog, name } => write!(f, "{} not found: {}", catalog, name),
            AmbiguousVariable { name, groups } => write!(
                f,
                "variable {} is held by several groups: {}",
                name,
                groups.join(", ")
            ),
            ElementNotInGroup { element, group } => {
                write!(f, "element {} is not part of group {}", element, group)
            }
            ShapeMismatch(msg) => write!(f, "shape mismatch: {}", msg),
            OutOfRange {
                axis,
                index,
                extent,
            } => write!(
                f,
                "index {} out of range for axis {} with extent {}",
                index, axis, extent
            ),
            TypeMismatch {
                data_type,
                requested,
            } => write!(f, "cannot read {} element as {}", data_type, requested),
            CatalogOverflow(catalog) => write!(f, "{} catalog overflow", catalog),
            Format(msg) => write!(f, "format error: {}", msg),
            MismatchedPair { dat, def } => write!(
                f,
                "{} and {} are not a matching file pair",
                dat.display(),
                def.display()
            ),
            FileNotFound(path) => write!(f, "file not found: {}", path.display()),
            AlreadyOpen(path) => write!(f, "file already open: {}", path.display()),
            SessionClosed => write!(f, "session is closed"),
            ReadOnly => write!(f, "session is opened read-only"),
            Io(err) => write!(f, "I/O error: {}", err),
        }
    }
}

impl From<io::Error> for NefisError {
    fn from(err: io::Error) -> NefisError {
        NefisError::Io(err)
    }
}
