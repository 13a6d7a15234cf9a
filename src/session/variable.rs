use crate::data::{Access, DataFile, Transfer};
use crate::directory::{Directory, Element, GroupDefinition, GroupInstance};
use crate::dtype::{Coding, DataType};
use crate::elements;
use crate::error::Catalog;
use crate::index::{self, AxisOrder, IndexRange};
use crate::NefisError;
use indexmap::IndexMap;
use ndarray::ArrayD;
use std::io::{Read, Seek, Write};

/// An element as held by one group instance.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Variable {
    /// Name of the element holding the values.
    pub name: String,
    /// Group instance holding the element.
    pub group: String,
    pub dtype: DataType,
    /// Natural (row-major) shape: group axes, slowest varying first, then
    /// the element's own dimensions. An unbounded axis has its current
    /// `max_index` as extent.
    pub shape: Vec<usize>,
    /// `quantity`, `unit` and `description` of the element.
    pub attributes: IndexMap<String, String>,
}

/// The values of a variable, typed by the element's data type.
#[derive(Clone, Debug, PartialEq)]
pub enum VariableData {
    Real32(ArrayD<f32>),
    Real64(ArrayD<f64>),
    Integer32(ArrayD<i32>),
    Integer64(ArrayD<i64>),
    Character(ArrayD<String>),
}

impl VariableData {
    pub fn shape(&self) -> &[usize] {
        match self {
            VariableData::Real32(a) => a.shape(),
            VariableData::Real64(a) => a.shape(),
            VariableData::Integer32(a) => a.shape(),
            VariableData::Integer64(a) => a.shape(),
            VariableData::Character(a) => a.shape(),
        }
    }
}

fn describe(element: &Element, group: &GroupInstance, definition: &GroupDefinition) -> Variable {
    let mut storage = element.dimensions.clone();
    storage.extend(definition.dimensions.iter().map(|&extent| match extent {
        0 => group.max_index(),
        extent => extent,
    }));
    let mut attributes = IndexMap::new();
    attributes.insert("quantity".to_owned(), element.quantity.clone());
    attributes.insert("unit".to_owned(), element.unit.clone());
    attributes.insert("description".to_owned(), element.description.clone());
    Variable {
        name: element.name.clone(),
        group: group.name.clone(),
        dtype: element.data_type,
        shape: index::natural_shape(&storage),
        attributes,
    }
}

pub(crate) fn collect(directory: &Directory) -> Result<IndexMap<String, Variable>, NefisError> {
    let mut by_element: IndexMap<&str, Vec<Variable>> = IndexMap::new();
    for group in directory.group_instances() {
        let (_, definition, cell) = directory.resolve_group(&group.name)?;
        for name in &cell.elements {
            let element = directory.element(name)?;
            by_element
                .entry(element.name.as_str())
                .or_default()
                .push(describe(element, group, definition));
        }
    }
    let mut variables = IndexMap::new();
    for (_, holders) in by_element {
        let qualify = holders.len() > 1;
        for variable in holders {
            let key = if qualify {
                format!("{}/{}", variable.group, variable.name)
            } else {
                variable.name.clone()
            };
            variables.insert(key, variable);
        }
    }
    Ok(variables)
}

/// Resolves a variable name to its group instance and element.
fn resolve(directory: &Directory, name: &str) -> Result<(String, String), NefisError> {
    let variables = collect(directory)?;
    if let Some(variable) = variables.get(name) {
        return Ok((variable.group.clone(), variable.name.clone()));
    }
    let groups: Vec<String> = variables
        .values()
        .filter(|v| v.name == name)
        .map(|v| v.group.clone())
        .collect();
    if groups.len() > 1 {
        return Err(NefisError::AmbiguousVariable {
            name: name.to_owned(),
            groups,
        });
    }
    if let Some((group, element)) = name.split_once('/') {
        if let Some(v) = variables
            .values()
            .find(|v| v.group == group && v.name == element)
        {
            return Ok((v.group.clone(), v.name.clone()));
        }
    }
    Err(NefisError::NotFound {
        catalog: Catalog::Element,
        name: name.to_owned(),
    })
}

pub(crate) fn read<F: Read + Write + Seek>(
    directory: &Directory,
    file: &mut DataFile<F>,
    coding: Coding,
    name: &str,
    index: usize,
) -> Result<VariableData, NefisError> {
    let (group, element) = resolve(directory, name)?;
    let (_, definition, _) = directory.resolve_group(&group)?;
    let slab_axis = definition.slab_axis();
    let ranges: Vec<IndexRange> = definition
        .dimensions
        .iter()
        .enumerate()
        .map(|(axis, &extent)| {
            if axis == slab_axis {
                IndexRange::single(index)
            } else {
                IndexRange::full(extent)
            }
        })
        .collect();
    let order = AxisOrder::identity(definition.rank());
    let transfer = Transfer::plan(directory, &group, &element, &ranges, &order, Access::Read)?;
    let bytes = transfer.read(directory, file)?;

    let element_rank = directory.element(&element)?.dimensions.len();
    let mut storage = transfer.storage_shape();
    storage.remove(element_rank + slab_axis);
    let shape = index::natural_shape(&storage);

    let data_type = transfer.data_type();
    Ok(match data_type {
        DataType::Real32 => {
            VariableData::Real32(elements::to_array(&bytes, data_type, coding, &shape)?)
        }
        DataType::Real64 => {
            VariableData::Real64(elements::to_array(&bytes, data_type, coding, &shape)?)
        }
        DataType::Integer32 => {
            VariableData::Integer32(elements::to_array(&bytes, data_type, coding, &shape)?)
        }
        DataType::Integer64 => {
            VariableData::Integer64(elements::to_array(&bytes, data_type, coding, &shape)?)
        }
        DataType::Character(_) => {
            VariableData::Character(elements::to_array(&bytes, data_type, coding, &shape)?)
        }
    })
}
