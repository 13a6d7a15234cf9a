//! Binary layout of the catalogs in the `.def` body.
//!
//! The body is the element, cell, group definition and group instance
//! catalogs in that order, each prefixed by its entry count. Numeric fields
//! use the file pair's coding. Loading replays every entry through the
//! `define_*` operations, so a decoded directory satisfies the same
//! invariants as one built in memory.

use super::{AttributeValue, Directory, Element};
use crate::codec::{
    self, ATTRIBUTE_TEXT_LEN, DESCRIPTION_LEN, MAX_DIMS, NAME_LEN, QUANTITY_LEN, UNIT_LEN,
};
use crate::dtype::{Coding, DataType, ElementType, TYPE_TAG_LEN};
use crate::error::Catalog;
use crate::NefisError;
use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use num_traits::ToPrimitive;
use std::io::{self, Write};
use std::marker::PhantomData;

fn count<B: ByteOrder>(out: &mut Vec<u8>, len: usize, catalog: Catalog) -> Result<(), NefisError> {
    let len = len.to_u32().ok_or(NefisError::CatalogOverflow(catalog))?;
    out.write_u32::<B>(len)?;
    Ok(())
}

fn dims<B: ByteOrder>(out: &mut Vec<u8>, slots: &[u32; MAX_DIMS]) -> io::Result<()> {
    for &slot in slots {
        out.write_u32::<B>(slot)?;
    }
    Ok(())
}

fn write_body<B: ByteOrder>(dir: &Directory, out: &mut Vec<u8>) -> Result<(), NefisError> {
    count::<B>(out, dir.elements.len(), Catalog::Element)?;
    for element in dir.elements.values() {
        out.write_all(&codec::encode_name(&element.name)?)?;
        out.write_all(element.data_type.element_type().tag())?;
        let width = element.data_type.byte_width().to_u32().ok_or_else(|| {
            NefisError::InvalidDescriptor(format!("element {} is too wide", element.name))
        })?;
        out.write_u32::<B>(width)?;
        out.write_all(&codec::encode_text(&element.quantity, QUANTITY_LEN, "quantity")?)?;
        out.write_all(&codec::encode_text(&element.unit, UNIT_LEN, "unit")?)?;
        out.write_all(&codec::encode_text(
            &element.description,
            DESCRIPTION_LEN,
            "description",
        )?)?;
        out.write_u32::<B>(element.dimensions.len() as u32)?;
        dims::<B>(out, &codec::encode_dimensions(&element.dimensions)?)?;
    }

    count::<B>(out, dir.cells.len(), Catalog::Cell)?;
    for cell in dir.cells.values() {
        out.write_all(&codec::encode_name(&cell.name)?)?;
        out.write_u32::<B>(cell.elements.len() as u32)?;
        for element in &cell.elements {
            out.write_all(&codec::encode_name(element)?)?;
        }
        out.write_u64::<B>(cell.size as u64)?;
    }

    count::<B>(out, dir.group_definitions.len(), Catalog::GroupDefinition)?;
    for def in dir.group_definitions.values() {
        out.write_all(&codec::encode_name(&def.name)?)?;
        out.write_all(&codec::encode_name(&def.cell)?)?;
        out.write_u32::<B>(def.rank() as u32)?;
        dims::<B>(out, &codec::encode_dimensions(&def.dimensions)?)?;
        // Orders are stored 1-based, as the format counts axes from one.
        let order: Vec<usize> = def.order.iter().map(|&axis| axis + 1).collect();
        dims::<B>(out, &codec::encode_dimensions(&order)?)?;
    }

    count::<B>(out, dir.group_instances.len(), Catalog::GroupInstance)?;
    for group in dir.group_instances.values() {
        out.write_all(&codec::encode_name(&group.name)?)?;
        out.write_all(&codec::encode_name(&group.definition)?)?;
        count::<B>(out, group.slabs.len(), Catalog::GroupInstance)?;
        for &slab in &group.slabs {
            out.write_u64::<B>(slab)?;
        }
        count::<B>(out, group.attributes.len(), Catalog::Attribute)?;
        for (name, value) in &group.attributes {
            out.write_all(&codec::encode_name(name)?)?;
            match value {
                AttributeValue::Integer(v) => {
                    out.write_all(ElementType::Integer.tag())?;
                    out.write_i32::<B>(*v)?;
                }
                AttributeValue::Real(v) => {
                    out.write_all(ElementType::Real.tag())?;
                    out.write_f32::<B>(*v)?;
                }
                AttributeValue::Text(v) => {
                    out.write_all(ElementType::Character.tag())?;
                    out.write_all(&codec::encode_text(v, ATTRIBUTE_TEXT_LEN, "attribute value")?)?;
                }
            }
        }
    }
    Ok(())
}

/// Cursor over a `.def` body. Running out of bytes is a format error.
struct BodyReader<'a, B> {
    rest: &'a [u8],
    order: PhantomData<B>,
}

fn truncated(_: io::Error) -> NefisError {
    NefisError::Format("truncated definition file body".into())
}

impl<'a, B: ByteOrder> BodyReader<'a, B> {
    fn bytes(&mut self, len: usize) -> Result<&'a [u8], NefisError> {
        if self.rest.len() < len {
            return Err(NefisError::Format("truncated definition file body".into()));
        }
        let (head, tail) = self.rest.split_at(len);
        self.rest = tail;
        Ok(head)
    }

    fn u32(&mut self) -> Result<u32, NefisError> {
        self.rest.read_u32::<B>().map_err(truncated)
    }

    fn len(&mut self) -> Result<usize, NefisError> {
        let value = self.u32()?;
        value
            .to_usize()
            .ok_or_else(|| NefisError::Format(format!("count {} does not fit", value)))
    }

    fn u64(&mut self) -> Result<u64, NefisError> {
        self.rest.read_u64::<B>().map_err(truncated)
    }

    fn name(&mut self) -> Result<String, NefisError> {
        codec::decode_name(self.bytes(NAME_LEN)?)
    }

    fn text(&mut self, width: usize) -> Result<String, NefisError> {
        codec::decode_text(self.bytes(width)?)
    }

    fn tag(&mut self) -> Result<ElementType, NefisError> {
        let tag = self.bytes(TYPE_TAG_LEN)?;
        ElementType::from_tag(tag).ok_or_else(|| {
            NefisError::Format(format!("unknown type tag {:?}", String::from_utf8_lossy(tag)))
        })
    }

    fn dims(&mut self, rank: usize) -> Result<Vec<usize>, NefisError> {
        let mut slots = [0; MAX_DIMS];
        for slot in &mut slots {
            *slot = self.u32()?;
        }
        codec::decode_dimensions(rank, &slots)
    }
}

/// Wraps a catalog violation found while loading as a format error.
fn corrupt(err: NefisError) -> NefisError {
    match err {
        NefisError::Format(_) | NefisError::Io(_) => err,
        other => NefisError::Format(format!("invalid catalog entry: {}", other)),
    }
}

fn read_body<B: ByteOrder>(bytes: &[u8]) -> Result<Directory, NefisError> {
    let mut reader = BodyReader::<B> {
        rest: bytes,
        order: PhantomData,
    };
    let mut dir = Directory::new();

    for _ in 0..reader.len()? {
        let name = reader.name()?;
        let kind = reader.tag()?;
        let width = reader.len()?;
        let quantity = reader.text(QUANTITY_LEN)?;
        let unit = reader.text(UNIT_LEN)?;
        let description = reader.text(DESCRIPTION_LEN)?;
        let rank = reader.len()?;
        let dimensions = reader.dims(rank)?;
        let data_type = DataType::from_parts(kind, width).map_err(corrupt)?;
        dir.define_element(Element {
            name,
            data_type,
            quantity,
            unit,
            description,
            dimensions,
        })
        .map_err(corrupt)?;
    }

    for _ in 0..reader.len()? {
        let name = reader.name()?;
        let n = reader.len()?;
        let elements = (0..n)
            .map(|_| reader.name())
            .collect::<Result<Vec<_>, _>>()?;
        let size = reader.u64()?;
        dir.define_cell(&name, &elements).map_err(corrupt)?;
        if dir.cells[&name].size as u64 != size {
            return Err(NefisError::Format(format!(
                "cell {} records {} bytes but its elements take {}",
                name, size, dir.cells[&name].size
            )));
        }
    }

    for _ in 0..reader.len()? {
        let name = reader.name()?;
        let cell = reader.name()?;
        let rank = reader.len()?;
        let dimensions = reader.dims(rank)?;
        let order = reader
            .dims(rank)?
            .into_iter()
            .map(|axis| {
                axis.checked_sub(1).ok_or_else(|| {
                    NefisError::Format(format!("group {} has axis 0 in its order", name))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        dir.define_group(&name, &cell, &dimensions, &order)
            .map_err(corrupt)?;
    }

    for _ in 0..reader.len()? {
        let name = reader.name()?;
        let definition = reader.name()?;
        dir.instantiate_group(&name, &definition).map_err(corrupt)?;
        let slabs = (0..reader.len()?)
            .map(|_| reader.u64())
            .collect::<Result<Vec<_>, _>>()?;
        let def = &dir.group_definitions[&definition];
        if def.unbounded_axis().is_none() && slabs.len() != def.dimensions[def.slab_axis()] {
            return Err(NefisError::Format(format!(
                "fixed group {} has {} slabs, expected {}",
                name,
                slabs.len(),
                def.dimensions[def.slab_axis()]
            )));
        }
        dir.group_instance_mut(&name)?.slabs = slabs;
        for _ in 0..reader.len()? {
            let attr = reader.name()?;
            let value = match reader.tag()? {
                ElementType::Integer => {
                    AttributeValue::Integer(reader.rest.read_i32::<B>().map_err(truncated)?)
                }
                ElementType::Real => {
                    AttributeValue::Real(reader.rest.read_f32::<B>().map_err(truncated)?)
                }
                ElementType::Character => AttributeValue::Text(reader.text(ATTRIBUTE_TEXT_LEN)?),
            };
            dir.put_attribute(&name, &attr, value).map_err(corrupt)?;
        }
    }

    if !reader.rest.is_empty() {
        return Err(NefisError::Format(format!(
            "{} trailing bytes after the catalogs",
            reader.rest.len()
        )));
    }
    Ok(dir)
}

impl Directory {
    /// Serializes the catalogs into a `.def` body.
    pub fn encode(&self, coding: Coding) -> Result<Vec<u8>, NefisError> {
        let mut out = Vec::new();
        match coding {
            Coding::Big => write_body::<BigEndian>(self, &mut out)?,
            Coding::Little => write_body::<LittleEndian>(self, &mut out)?,
        }
        Ok(out)
    }

    /// Loads catalogs from a `.def` body. Any structural problem is a
    /// [`NefisError::Format`].
    pub fn decode(bytes: &[u8], coding: Coding) -> Result<Directory, NefisError> {
        match coding {
            Coding::Big => read_body::<BigEndian>(bytes),
            Coding::Little => read_body::<LittleEndian>(bytes),
        }
    }
}
