//! The element, cell, group definition and group instance catalogs.
//!
//! Catalogs are append-only and iterate in insertion order. Iteration ends
//! when a catalog is exhausted; there is no cap on the number of entries.

mod encode;
mod entries;

pub use self::entries::{AttributeValue, Cell, Element, GroupDefinition, GroupInstance};

use crate::codec::{self, ATTRIBUTE_TEXT_LEN};
use crate::error::Catalog;
use crate::NefisError;
use indexmap::IndexMap;

/// Largest number of entries a catalog can record in a `.def` body.
pub(crate) const MAX_CATALOG_LEN: usize = u32::MAX as usize;

fn check_capacity(len: usize, catalog: Catalog) -> Result<(), NefisError> {
    if len >= MAX_CATALOG_LEN {
        Err(NefisError::CatalogOverflow(catalog))
    } else {
        Ok(())
    }
}

fn check_unique<T>(
    map: &IndexMap<String, T>,
    name: &str,
    catalog: Catalog,
) -> Result<(), NefisError> {
    if map.contains_key(name) {
        Err(NefisError::DuplicateName {
            catalog,
            name: name.to_owned(),
        })
    } else {
        Ok(())
    }
}

fn not_found(catalog: Catalog, name: &str) -> NefisError {
    NefisError::NotFound {
        catalog,
        name: name.to_owned(),
    }
}

/// The metadata of a file pair.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Directory {
    elements: IndexMap<String, Element>,
    cells: IndexMap<String, Cell>,
    group_definitions: IndexMap<String, GroupDefinition>,
    group_instances: IndexMap<String, GroupInstance>,
}

impl Directory {
    pub fn new() -> Directory {
        Directory::default()
    }

    /// Appends an element to the element catalog.
    pub fn define_element(&mut self, element: Element) -> Result<(), NefisError> {
        element.validate()?;
        check_unique(&self.elements, &element.name, Catalog::Element)?;
        check_capacity(self.elements.len(), Catalog::Element)?;
        log::debug!(
            "defining element {} as {} {:?}",
            element.name,
            element.data_type,
            element.dimensions
        );
        self.elements.insert(element.name.clone(), element);
        Ok(())
    }

    /// Appends a cell built from already defined elements. The record size
    /// is the sum of the element sizes.
    pub fn define_cell<S: AsRef<str>>(
        &mut self,
        name: &str,
        elements: &[S],
    ) -> Result<(), NefisError> {
        codec::encode_name(name)?;
        check_unique(&self.cells, name, Catalog::Cell)?;
        if elements.is_empty() {
            return Err(NefisError::InvalidDescriptor(format!("cell {} has no elements", name)));
        }
        let mut size = 0usize;
        for element in elements {
            let element = element.as_ref();
            let found = self
                .elements
                .get(element)
                .ok_or_else(|| NefisError::UnknownElement(element.to_owned()))?;
            size = found
                .checked_size()
                .and_then(|len| size.checked_add(len))
                .ok_or_else(|| {
                    NefisError::InvalidDescriptor(format!("cell {} is too large", name))
                })?;
        }
        let names: Vec<String> = elements.iter().map(|e| e.as_ref().to_owned()).collect();
        for (i, element) in names.iter().enumerate() {
            if names[..i].contains(element) {
                return Err(NefisError::InvalidDescriptor(format!(
                    "cell {} lists element {} twice",
                    name, element
                )));
            }
        }
        check_capacity(self.cells.len(), Catalog::Cell)?;
        log::debug!("defining cell {} ({} bytes) with {:?}", name, size, names);
        self.cells.insert(
            name.to_owned(),
            Cell {
                name: name.to_owned(),
                elements: names,
                size,
            },
        );
        Ok(())
    }

    /// Appends a group definition binding `cell` to a shape.
    ///
    /// `dimensions` may contain a single `0` for the unbounded axis, which
    /// must then be the last entry of `order` (the slowest varying axis).
    pub fn define_group(
        &mut self,
        name: &str,
        cell: &str,
        dimensions: &[usize],
        order: &[usize],
    ) -> Result<(), NefisError> {
        let definition = GroupDefinition {
            name: name.to_owned(),
            cell: cell.to_owned(),
            dimensions: dimensions.to_vec(),
            order: order.to_vec(),
        };
        codec::encode_name(name)?;
        check_unique(&self.group_definitions, name, Catalog::GroupDefinition)?;
        let cell_size = match self.cells.get(cell) {
            Some(found) => found.size,
            None => return Err(NefisError::UnknownCell(cell.to_owned())),
        };
        definition.validate()?;
        definition.check_size(cell_size)?;
        check_capacity(self.group_definitions.len(), Catalog::GroupDefinition)?;
        log::debug!(
            "defining group {} of cell {} with dimensions {:?} and order {:?}",
            name,
            cell,
            dimensions,
            order
        );
        self.group_definitions.insert(name.to_owned(), definition);
        Ok(())
    }

    /// Binds a data-side group name to a group definition. The instance
    /// starts with no storage; the session reserves the slabs of a fixed
    /// group right after.
    pub(crate) fn instantiate_group(
        &mut self,
        instance: &str,
        definition: &str,
    ) -> Result<(), NefisError> {
        codec::encode_name(instance)?;
        check_unique(&self.group_instances, instance, Catalog::GroupInstance)?;
        if !self.group_definitions.contains_key(definition) {
            return Err(NefisError::UnknownGroupDef(definition.to_owned()));
        }
        check_capacity(self.group_instances.len(), Catalog::GroupInstance)?;
        log::debug!("instantiating group {} from {}", instance, definition);
        self.group_instances.insert(
            instance.to_owned(),
            GroupInstance::new(instance.to_owned(), definition.to_owned()),
        );
        Ok(())
    }

    /// Sets a group attribute, replacing any previous value of that name.
    pub fn put_attribute(
        &mut self,
        instance: &str,
        name: &str,
        value: AttributeValue,
    ) -> Result<(), NefisError> {
        codec::encode_name(name)?;
        if let AttributeValue::Text(ref text) = value {
            codec::encode_text(text, ATTRIBUTE_TEXT_LEN, "attribute value")?;
        }
        let group = self
            .group_instances
            .get_mut(instance)
            .ok_or_else(|| not_found(Catalog::GroupInstance, instance))?;
        if !group.attributes.contains_key(name) {
            check_capacity(group.attributes.len(), Catalog::Attribute)?;
        }
        group.attributes.insert(name.to_owned(), value);
        Ok(())
    }

    /// Group attributes of an instance, in insertion order.
    pub fn attributes(
        &self,
        instance: &str,
    ) -> Result<&IndexMap<String, AttributeValue>, NefisError> {
        Ok(self.group_instance(instance)?.attributes())
    }

    pub fn elements(&self) -> impl ExactSizeIterator<Item = &Element> + '_ {
        self.elements.values()
    }

    pub fn cells(&self) -> impl ExactSizeIterator<Item = &Cell> + '_ {
        self.cells.values()
    }

    pub fn group_definitions(&self) -> impl ExactSizeIterator<Item = &GroupDefinition> + '_ {
        self.group_definitions.values()
    }

    pub fn group_instances(&self) -> impl ExactSizeIterator<Item = &GroupInstance> + '_ {
        self.group_instances.values()
    }

    pub fn element(&self, name: &str) -> Result<&Element, NefisError> {
        self.elements
            .get(name)
            .ok_or_else(|| not_found(Catalog::Element, name))
    }

    pub fn cell(&self, name: &str) -> Result<&Cell, NefisError> {
        self.cells.get(name).ok_or_else(|| not_found(Catalog::Cell, name))
    }

    pub fn group_definition(&self, name: &str) -> Result<&GroupDefinition, NefisError> {
        self.group_definitions
            .get(name)
            .ok_or_else(|| not_found(Catalog::GroupDefinition, name))
    }

    pub fn group_instance(&self, name: &str) -> Result<&GroupInstance, NefisError> {
        self.group_instances
            .get(name)
            .ok_or_else(|| not_found(Catalog::GroupInstance, name))
    }

    pub(crate) fn group_instance_mut(
        &mut self,
        name: &str,
    ) -> Result<&mut GroupInstance, NefisError> {
        self.group_instances
            .get_mut(name)
            .ok_or_else(|| not_found(Catalog::GroupInstance, name))
    }

    /// Removes an instance whose storage could not be reserved.
    pub(crate) fn discard_group_instance(&mut self, instance: &str) {
        self.group_instances.shift_remove(instance);
    }

    /// Current extent of the instance along its slab axis: the number of
    /// slabs allocated. That is the number of time steps written for a
    /// growing group and, once instantiated through a session, the declared
    /// extent for a fixed one.
    pub fn max_index(&self, instance: &str) -> Result<usize, NefisError> {
        Ok(self.group_instance(instance)?.max_index())
    }

    /// Returns the definition and cell of a group instance.
    pub(crate) fn resolve_group(
        &self,
        instance: &str,
    ) -> Result<(&GroupInstance, &GroupDefinition, &Cell), NefisError> {
        let group = self.group_instance(instance)?;
        let definition = self.group_definition(&group.definition)?;
        let cell = self.cell(&definition.cell)?;
        Ok((group, definition, cell))
    }

    /// Byte offset of `element` within a record of `cell`.
    pub(crate) fn element_offset(&self, cell: &Cell, element: &str) -> Option<usize> {
        let mut offset = 0;
        for name in &cell.elements {
            if name == element {
                return Some(offset);
            }
            offset += self.elements.get(name)?.size();
        }
        None
    }
}
