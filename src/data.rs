//! Addressing and transfer of element values within the `.dat` file.
//!
//! A group instance stores its cells in slabs. A slab holds every cell for
//! one index along the group's slowest varying axis, laid out with the other
//! group axes in definition order. Fixed groups allocate all their slabs when
//! they are instantiated; a group with an unbounded axis allocates a slab the
//! first time that index is written.

use crate::directory::{Directory, GroupDefinition};
use crate::dtype::DataType;
use crate::index::{self, AxisOrder, IndexRange, UsrIndex};
use crate::NefisError;
use std::io::{self, Read, Seek, SeekFrom, Write};

/// The `.dat` file, with its current end tracked for allocation.
pub(crate) struct DataFile<F> {
    inner: F,
    end: u64,
}

impl<F: Read + Write + Seek> DataFile<F> {
    pub fn new(inner: F, end: u64) -> DataFile<F> {
        DataFile { inner, end }
    }

    pub fn len(&self) -> u64 {
        self.end
    }

    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.read_exact(buf)
    }

    pub fn write_at(&mut self, offset: u64, buf: &[u8]) -> io::Result<()> {
        self.inner.seek(SeekFrom::Start(offset))?;
        self.inner.write_all(buf)
    }

    /// Appends `len` zero bytes and returns their offset.
    pub fn allocate(&mut self, len: u64) -> io::Result<u64> {
        let offset = self.end;
        self.inner.seek(SeekFrom::Start(offset))?;
        let written = io::copy(&mut io::repeat(0).take(len), &mut self.inner)?;
        self.end += written;
        Ok(offset)
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

fn slab_len(definition: &GroupDefinition, cell_size: usize) -> Result<u64, NefisError> {
    definition.slab_len(cell_size).ok_or_else(|| {
        NefisError::Format(format!("slabs of group definition {} are too large", definition.name))
    })
}

/// Allocates every slab of a fixed group that has none yet.
pub(crate) fn reserve<F: Read + Write + Seek>(
    directory: &mut Directory,
    file: &mut DataFile<F>,
    group: &str,
) -> Result<(), NefisError> {
    let (instance, definition, cell) = directory.resolve_group(group)?;
    if definition.unbounded_axis().is_some() || !instance.slabs.is_empty() {
        return Ok(());
    }
    let count = definition.dimensions[definition.slab_axis()];
    let len = slab_len(definition, cell.size)?;
    let start = file.allocate(len * count as u64)?;
    log::debug!("reserved {} slabs of {} bytes for group {}", count, len, group);
    let instance = directory.group_instance_mut(group)?;
    instance.slabs = (0..count as u64).map(|slab| start + slab * len).collect();
    Ok(())
}

/// Checks that every slab of every group lies within a data file of `len`
/// bytes.
pub(crate) fn check_slabs(directory: &Directory, len: u64) -> Result<(), NefisError> {
    for instance in directory.group_instances() {
        let (_, definition, cell) = directory.resolve_group(&instance.name)?;
        let slab = slab_len(definition, cell.size)?;
        let beyond = |&&offset: &&u64| offset.checked_add(slab).map_or(true, |end| end > len);
        if let Some(&offset) = instance.slabs.iter().find(beyond) {
            return Err(NefisError::Format(format!(
                "slab at offset {} of group {} lies beyond the end of the data file",
                offset, instance.name
            )));
        }
    }
    Ok(())
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Access {
    Read,
    Write,
}

/// A validated request to move one element's values for a selection of
/// cells between a caller's buffer and the data file.
#[derive(Clone, Debug)]
pub(crate) struct Transfer {
    group: String,
    data_type: DataType,
    element_dims: Vec<usize>,
    element_size: usize,
    /// Exact buffer length, checked when planning.
    len_bytes: usize,
    element_offset: usize,
    cell_size: usize,
    slab_len: u64,
    slab_axis: usize,
    /// Group axes in storage order, without the slab axis.
    strides: Vec<(usize, usize)>,
    selection: Vec<UsrIndex>,
    order: Vec<usize>,
    /// Number of slabs the group holds once this transfer completes.
    slabs_needed: usize,
}

impl Transfer {
    pub fn plan(
        directory: &Directory,
        group: &str,
        element: &str,
        ranges: &[IndexRange],
        order: &AxisOrder,
        access: Access,
    ) -> Result<Transfer, NefisError> {
        let (instance, definition, cell) = directory.resolve_group(group)?;
        let elm = directory.element(element)?;
        let element_offset =
            directory
                .element_offset(cell, element)
                .ok_or_else(|| NefisError::ElementNotInGroup {
                    element: element.to_owned(),
                    group: group.to_owned(),
                })?;
        let rank = definition.rank();
        if ranges.len() > rank {
            return Err(NefisError::ShapeMismatch(format!(
                "{} index ranges given for group {} of rank {}",
                ranges.len(),
                group,
                rank
            )));
        }
        if order.rank() != rank {
            return Err(NefisError::ShapeMismatch(format!(
                "axis order {:?} given for group {} of rank {}",
                order.axes(),
                group,
                rank
            )));
        }
        let max_index = instance.max_index();
        let slab_axis = definition.slab_axis();
        let unbounded = definition.unbounded_axis();

        let mut selection = Vec::with_capacity(rank);
        let mut slabs_needed = max_index;
        for axis in 0..rank {
            let extent = if Some(axis) == unbounded {
                max_index
            } else {
                definition.dimensions[axis]
            };
            let range = ranges
                .get(axis)
                .copied()
                .unwrap_or_else(|| IndexRange::full(extent));
            let usr = range.to_usr().ok_or(NefisError::OutOfRange {
                axis,
                index: range.start,
                extent,
            })?;
            if Some(axis) == unbounded && access == Access::Write {
                slabs_needed = check_append(axis, range, max_index)?;
            } else if usr.last_index() >= extent {
                return Err(NefisError::OutOfRange {
                    axis,
                    index: usr.last_index(),
                    extent,
                });
            }
            selection.push(usr);
        }

        let len_bytes = selection
            .iter()
            .try_fold(elm.size(), |n, usr| n.checked_mul(usr.count()))
            .ok_or_else(|| {
                NefisError::ShapeMismatch(format!("selection of group {} is too large", group))
            })?;

        let mut strides = Vec::with_capacity(rank - 1);
        let mut stride = 1;
        for &axis in &definition.order[..rank - 1] {
            strides.push((axis, stride));
            stride *= definition.dimensions[axis];
        }

        Ok(Transfer {
            group: group.to_owned(),
            data_type: elm.data_type,
            element_dims: elm.dimensions.clone(),
            element_size: elm.size(),
            len_bytes,
            element_offset,
            cell_size: cell.size,
            slab_len: slab_len(definition, cell.size)?,
            slab_axis,
            strides,
            selection,
            order: order.axes().to_vec(),
            slabs_needed,
        })
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    /// Buffer shape, fastest varying first: the element's own dimensions,
    /// then the selected count of each group axis in the requested order.
    pub fn storage_shape(&self) -> Vec<usize> {
        let mut shape = self.element_dims.clone();
        shape.extend(self.order.iter().map(|&axis| self.selection[axis].count()));
        shape
    }

    /// Buffer shape in row-major order.
    pub fn natural_shape(&self) -> Vec<usize> {
        index::natural_shape(&self.storage_shape())
    }

    pub fn cell_count(&self) -> usize {
        self.len_bytes / self.element_size
    }

    /// Exact buffer length in bytes.
    pub fn len_bytes(&self) -> usize {
        self.len_bytes
    }

    fn offsets<'a>(&'a self, slabs: &'a [u64]) -> Offsets<'a> {
        Offsets {
            transfer: self,
            slabs,
            position: vec![0; self.selection.len()],
            remaining: self.cell_count(),
        }
    }

    pub fn read<F: Read + Write + Seek>(
        &self,
        directory: &Directory,
        file: &mut DataFile<F>,
    ) -> Result<Vec<u8>, NefisError> {
        let slabs = &directory.group_instance(&self.group)?.slabs;
        let mut buf = vec![0; self.len_bytes()];
        for (chunk, offset) in buf.chunks_exact_mut(self.element_size).zip(self.offsets(slabs)) {
            file.read_at(offset, chunk)?;
        }
        log::trace!("read {} bytes from group {}", buf.len(), self.group);
        Ok(buf)
    }

    /// Writes `bytes`, allocating any slabs the selection appends first.
    pub fn write<F: Read + Write + Seek>(
        &self,
        directory: &mut Directory,
        file: &mut DataFile<F>,
        bytes: &[u8],
    ) -> Result<(), NefisError> {
        if bytes.len() != self.len_bytes() {
            return Err(NefisError::ShapeMismatch(format!(
                "buffer of {} bytes given where {} are required",
                bytes.len(),
                self.len_bytes()
            )));
        }
        let instance = directory.group_instance_mut(&self.group)?;
        let max_index = instance.slabs.len();
        let result = self.append_and_write(&mut instance.slabs, file, bytes);
        if result.is_err() {
            // Slabs only count once their values are on disk.
            instance.slabs.truncate(max_index);
        }
        result
    }

    fn append_and_write<F: Read + Write + Seek>(
        &self,
        slabs: &mut Vec<u64>,
        file: &mut DataFile<F>,
        bytes: &[u8],
    ) -> Result<(), NefisError> {
        while slabs.len() < self.slabs_needed {
            let offset = file.allocate(self.slab_len)?;
            slabs.push(offset);
            log::debug!(
                "appended slab {} of group {} at offset {}",
                slabs.len() - 1,
                self.group,
                offset
            );
        }
        let offsets = self.offsets(slabs.as_slice());
        for (chunk, offset) in bytes.chunks_exact(self.element_size).zip(offsets) {
            file.write_at(offset, chunk)?;
        }
        log::trace!("wrote {} bytes to group {}", bytes.len(), self.group);
        Ok(())
    }
}

/// Validates a write selection along the unbounded axis: indices past
/// `max_index` must extend it contiguously. Returns the resulting number of
/// slabs.
fn check_append(axis: usize, range: IndexRange, max_index: usize) -> Result<usize, NefisError> {
    let last = match range.last() {
        Some(last) => last,
        None => {
            return Err(NefisError::OutOfRange {
                axis,
                index: range.start,
                extent: max_index,
            })
        }
    };
    if last < max_index {
        return Ok(max_index);
    }
    // The smallest selected index at or past `max_index`; it cannot pass
    // `last`, so the arithmetic stays in range.
    let first_new = if range.start >= max_index {
        range.start
    } else {
        let gap = max_index - range.start;
        let steps = gap / range.step + usize::from(gap % range.step != 0);
        range.start + steps * range.step
    };
    if first_new != max_index {
        return Err(NefisError::OutOfRange {
            axis,
            index: first_new,
            extent: max_index,
        });
    }
    if last != first_new && range.step != 1 {
        return Err(NefisError::OutOfRange {
            axis,
            index: first_new.saturating_add(range.step),
            extent: max_index + 1,
        });
    }
    Ok(last + 1)
}

/// File offsets of the selected values, in buffer order.
struct Offsets<'a> {
    transfer: &'a Transfer,
    slabs: &'a [u64],
    position: Vec<usize>,
    remaining: usize,
}

impl<'a> Iterator for Offsets<'a> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;
        let t = self.transfer;
        let index = |axis: usize| t.selection[axis].index(self.position[axis]);
        let cell: usize = t
            .strides
            .iter()
            .map(|&(axis, stride)| index(axis) * stride)
            .sum();
        let slab = self.slabs[index(t.slab_axis)];
        let offset = slab + (cell * t.cell_size + t.element_offset) as u64;

        for &axis in &t.order {
            self.position[axis] += 1;
            if self.position[axis] < t.selection[axis].count() {
                break;
            }
            self.position[axis] = 0;
        }
        Some(offset)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
