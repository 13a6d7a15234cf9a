//! This crate reads and writes NEFIS file pairs: a `.def` file holding the
//! catalogs of elements, cells, group definitions and group instances, and a
//! `.dat` file holding the cell data of every group instance.
//!
//! Open a pair with [`Session::open`] or [`OpenOptions`]. Values move in and
//! out either as raw bytes in the file's coding ([`Session::read`],
//! [`Session::write`]) or as [`ndarray`] arrays ([`Session::typed_read`],
//! [`Session::typed_write`]).
//!
//! [`ndarray`]: https://github.com/rust-ndarray/ndarray
//!
//! ```
//! use nefis::{AxisOrder, DataType, Element, OpenMode, Session};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! # let dir = tempfile::tempdir()?;
//! # let (dat, def) = (dir.path().join("trim.dat"), dir.path().join("trim.def"));
//! let mut session = Session::open(&dat, &def, OpenMode::Create)?;
//! session.define_element(
//!     Element::new("THICK", DataType::Real32, &[5])
//!         .with_quantity("thickness")
//!         .with_description("Fraction part of layer thickness"),
//! )?;
//! session.define_cell("map-const", &["THICK"])?;
//! session.define_group("map-const", "map-const", &[1], &[0])?;
//! session.instantiate_group("map-const", "map-const")?;
//! let thick = ndarray::arr2(&[[0.4f32, 0.27, 0.18, 0.1, 0.05]]);
//! session.typed_write("map-const", "THICK", &[], &AxisOrder::identity(1), &thick)?;
//! session.close()?;
//!
//! let mut session = Session::open(&dat, &def, OpenMode::Read)?;
//! let read = session.typed_read::<f32>("map-const", "THICK", &[], &AxisOrder::identity(1))?;
//! assert_eq!(read.shape(), &[1, 5]);
//! # Ok(())
//! # }
//! ```
//!
//! # Shapes
//!
//! The format lists dimensions fastest varying first. Arrays handed to and
//! from this crate use the reverse, row-major order; see [`natural_shape`].
//!
//! # Limitations
//!
//! * Only one writer may hold a file pair at a time, and only within one
//!   process. Nothing guards against other processes.
//!
//! * Elements are limited to 32 and 64 bit reals and integers and to
//!   fixed-width character strings.

#[macro_use]
mod codec;
mod data;
mod directory;
mod dtype;
mod elements;
mod error;
mod header;
mod index;
mod registry;
mod session;

pub use crate::codec::{
    decode_name, decode_scalar, encode_name, encode_scalar, Scalar, MAX_DIMS, NAME_LEN,
};
pub use crate::directory::{
    AttributeValue, Cell, Directory, Element, GroupDefinition, GroupInstance,
};
pub use crate::dtype::{Coding, DataType, ElementType};
pub use crate::elements::{ReadableElement, WritableElement};
pub use crate::error::{Catalog, NefisError};
pub use crate::index::{natural_shape, storage_shape, AxisOrder, IndexRange};
pub use crate::session::{
    Dump, OpenMode, OpenOptions, ParseOpenModeError, Session, Variable, VariableData,
};

/// Version of this library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
