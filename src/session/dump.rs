use super::variable::{self, Variable};
use crate::directory::Directory;
use crate::NefisError;
use indexmap::IndexMap;
use std::fmt;

/// A human-readable listing of every catalog and variable of a pair.
///
/// Obtained from [`crate::Session::dump`] and printed with `{}`.
pub struct Dump<'a> {
    directory: &'a Directory,
    variables: IndexMap<String, Variable>,
}

impl<'a> Dump<'a> {
    pub(crate) fn new(directory: &'a Directory) -> Result<Dump<'a>, NefisError> {
        Ok(Dump {
            directory,
            variables: variable::collect(directory)?,
        })
    }

    pub fn variables(&self) -> &IndexMap<String, Variable> {
        &self.variables
    }
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let dir = self.directory;
        writeln!(f, "GROUPS")?;
        for group in dir.group_instances() {
            writeln!(
                f,
                "  {}: definition {}, max_index {}",
                group.name,
                group.definition,
                group.max_index()
            )?;
            for (name, value) in group.attributes() {
                writeln!(f, "    {} = {}", name, value)?;
            }
        }
        writeln!(f, "GROUP DEFINITIONS")?;
        for definition in dir.group_definitions() {
            writeln!(
                f,
                "  {}: cell {}, dimensions {:?}, order {:?}",
                definition.name, definition.cell, definition.dimensions, definition.order
            )?;
        }
        writeln!(f, "CELLS")?;
        for cell in dir.cells() {
            writeln!(
                f,
                "  {}: {} bytes, elements [{}]",
                cell.name,
                cell.size,
                cell.elements.join(", ")
            )?;
        }
        writeln!(f, "ELEMENTS")?;
        for element in dir.elements() {
            writeln!(
                f,
                "  {}: {} {:?}, quantity {:?}, unit {:?}, description {:?}",
                element.name,
                element.data_type,
                element.dimensions,
                element.quantity,
                element.unit,
                element.description
            )?;
        }
        writeln!(f, "VARIABLES")?;
        for (name, variable) in &self.variables {
            writeln!(
                f,
                "  {}: {} in {}, shape {:?}",
                name, variable.dtype, variable.group, variable.shape
            )?;
            for (key, value) in &variable.attributes {
                writeln!(f, "    {} = {:?}", key, value)?;
            }
        }
        Ok(())
    }
}
