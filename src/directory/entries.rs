//! Catalog entry types.

use crate::codec::{self, DESCRIPTION_LEN, MAX_DIMS, QUANTITY_LEN, UNIT_LEN};
use crate::dtype::DataType;
use crate::NefisError;
use indexmap::IndexMap;
use std::fmt;

/// A named field descriptor: type, shape and descriptive metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct Element {
    pub name: String,
    pub data_type: DataType,
    pub quantity: String,
    pub unit: String,
    pub description: String,
    /// Extents in storage order, fastest varying first.
    pub dimensions: Vec<usize>,
}

impl Element {
    /// Creates an element with empty quantity, unit and description.
    pub fn new<N: Into<String>>(name: N, data_type: DataType, dimensions: &[usize]) -> Element {
        Element {
            name: name.into(),
            data_type,
            quantity: String::new(),
            unit: String::new(),
            description: String::new(),
            dimensions: dimensions.to_vec(),
        }
    }

    pub fn with_quantity<S: Into<String>>(mut self, quantity: S) -> Element {
        self.quantity = quantity.into();
        self
    }

    pub fn with_unit<S: Into<String>>(mut self, unit: S) -> Element {
        self.unit = unit.into();
        self
    }

    pub fn with_description<S: Into<String>>(mut self, description: S) -> Element {
        self.description = description.into();
        self
    }

    /// Number of values in one instance of the element. Saturates at
    /// `usize::MAX` for an element too large to be defined.
    pub fn value_count(&self) -> usize {
        self.dimensions
            .iter()
            .try_fold(1usize, |n, &d| n.checked_mul(d))
            .unwrap_or(usize::MAX)
    }

    /// Number of bytes one instance of the element takes up in a record.
    /// Saturates like [`Element::value_count`].
    pub fn size(&self) -> usize {
        self.checked_size().unwrap_or(usize::MAX)
    }

    pub(crate) fn checked_size(&self) -> Option<usize> {
        self.dimensions
            .iter()
            .try_fold(self.data_type.byte_width(), |n, &d| n.checked_mul(d))
    }

    pub(crate) fn validate(&self) -> Result<(), NefisError> {
        codec::encode_name(&self.name)?;
        codec::encode_text(&self.quantity, QUANTITY_LEN, "quantity")?;
        codec::encode_text(&self.unit, UNIT_LEN, "unit")?;
        codec::encode_text(&self.description, DESCRIPTION_LEN, "description")?;
        if self.dimensions.len() > MAX_DIMS {
            return Err(NefisError::TooManyDimensions(self.dimensions.len()));
        }
        if self.dimensions.iter().any(|&d| d == 0) {
            return Err(NefisError::InvalidDescriptor(format!(
                "element {} has a zero extent in {:?}",
                self.name, self.dimensions
            )));
        }
        codec::encode_dimensions(&self.dimensions)?;
        if self.checked_size().is_none() {
            return Err(NefisError::InvalidDescriptor(format!(
                "element {} of {:?} values is too large",
                self.name, self.dimensions
            )));
        }
        Ok(())
    }
}

/// A record layout: an ordered tuple of elements.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Cell {
    pub name: String,
    /// Element names in on-disk field order.
    pub elements: Vec<String>,
    /// Total record size in bytes.
    pub size: usize,
}

/// A template binding a cell to a shape.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupDefinition {
    pub name: String,
    pub cell: String,
    /// Extents per group axis; `0` marks the unbounded axis.
    pub dimensions: Vec<usize>,
    /// Group axes listed from fastest to slowest varying in storage.
    pub order: Vec<usize>,
}

impl GroupDefinition {
    pub fn rank(&self) -> usize {
        self.dimensions.len()
    }

    /// The axis allowed to grow, if any.
    pub fn unbounded_axis(&self) -> Option<usize> {
        self.dimensions.iter().position(|&d| d == 0)
    }

    /// The slowest varying storage axis. One slab holds every cell for a
    /// single index along this axis.
    pub fn slab_axis(&self) -> usize {
        // Validated non-empty at definition time.
        self.order[self.order.len() - 1]
    }

    /// Number of cells in one slab, `None` on overflow.
    pub(crate) fn cells_per_slab(&self) -> Option<usize> {
        let slab_axis = self.slab_axis();
        self.dimensions
            .iter()
            .enumerate()
            .filter(|&(axis, _)| axis != slab_axis)
            .try_fold(1usize, |n, (_, &d)| n.checked_mul(d))
    }

    /// Bytes in one slab of cells of `cell_size` bytes, `None` on overflow.
    pub(crate) fn slab_len(&self, cell_size: usize) -> Option<u64> {
        let len = self.cells_per_slab()?.checked_mul(cell_size)?;
        u64::try_from(len).ok()
    }

    /// Checks that the storage of an instance can be addressed: one slab,
    /// and every slab of a fixed group, must fit in a `u64` offset.
    pub(crate) fn check_size(&self, cell_size: usize) -> Result<(), NefisError> {
        let slab_len = self.slab_len(cell_size);
        let total = match self.unbounded_axis() {
            Some(_) => slab_len,
            None => slab_len
                .and_then(|len| len.checked_mul(self.dimensions[self.slab_axis()] as u64)),
        };
        if total.is_none() {
            return Err(NefisError::InvalidShape(format!(
                "group definition {} with dimensions {:?} is too large",
                self.name, self.dimensions
            )));
        }
        Ok(())
    }

    pub(crate) fn validate(&self) -> Result<(), NefisError> {
        codec::encode_name(&self.name)?;
        let rank = self.rank();
        if rank == 0 {
            return Err(NefisError::InvalidShape(format!(
                "group definition {} has no dimensions",
                self.name
            )));
        }
        codec::encode_dimensions(&self.dimensions)?;
        if self.dimensions.iter().filter(|&&d| d == 0).count() > 1 {
            return Err(NefisError::InvalidShape(format!(
                "group definition {} has more than one unbounded axis: {:?}",
                self.name, self.dimensions
            )));
        }
        let mut seen = [false; MAX_DIMS];
        if self.order.len() != rank
            || !self
                .order
                .iter()
                .all(|&axis| axis < rank && !std::mem::replace(&mut seen[axis], true))
        {
            return Err(NefisError::InvalidShape(format!(
                "order {:?} is not a permutation of {} axes",
                self.order, rank
            )));
        }
        if let Some(axis) = self.unbounded_axis() {
            if axis != self.slab_axis() {
                return Err(NefisError::InvalidShape(format!(
                    "unbounded axis {} of group definition {} must be the slowest varying",
                    axis, self.name
                )));
            }
        }
        Ok(())
    }
}

/// Value of a group attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    Integer(i32),
    Real(f32),
    Text(String),
}

impl fmt::Display for AttributeValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AttributeValue::Integer(v) => write!(f, "{}", v),
            AttributeValue::Real(v) => write!(f, "{}", v),
            AttributeValue::Text(v) => write!(f, "{:?}", v),
        }
    }
}

/// A file-resident instantiation of a group definition.
#[derive(Clone, Debug, PartialEq)]
pub struct GroupInstance {
    pub name: String,
    /// Name of the group definition this instance binds.
    pub definition: String,
    pub(crate) slabs: Vec<u64>,
    pub(crate) attributes: IndexMap<String, AttributeValue>,
}

impl GroupInstance {
    pub(crate) fn new(name: String, definition: String) -> GroupInstance {
        GroupInstance {
            name,
            definition,
            slabs: Vec::new(),
            attributes: IndexMap::new(),
        }
    }

    /// Current extent along the slab axis.
    pub fn max_index(&self) -> usize {
        self.slabs.len()
    }

    /// Group attributes in insertion order.
    pub fn attributes(&self) -> &IndexMap<String, AttributeValue> {
        &self.attributes
    }
}
