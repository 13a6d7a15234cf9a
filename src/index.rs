//! Index ranges, axis orders and the storage/natural shape transposition.
//!
//! # Axis conventions
//!
//! On disk the fastest varying axis comes first: a buffer with storage shape
//! `[d1, d2, ..., dn]` stores `d1` consecutive values, then repeats that
//! `d2` times and so on. Presented to callers (and as an `ndarray` in
//! standard layout) the same buffer has the reversed, natural shape
//! `[dn, ..., d2, d1]`. [`natural_shape`] and [`storage_shape`] are the only
//! places this reversal happens.

use crate::NefisError;
use std::ops::Range;

/// Converts a storage-order shape (fastest varying first) into the natural
/// row-major shape used for arrays handed to callers.
pub fn natural_shape(storage: &[usize]) -> Vec<usize> {
    storage.iter().rev().copied().collect()
}

/// Converts a natural row-major shape back into storage order.
pub fn storage_shape(natural: &[usize]) -> Vec<usize> {
    natural.iter().rev().copied().collect()
}

/// A 0-based, half-open range of indices along one group axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct IndexRange {
    pub start: usize,
    pub stop: usize,
    pub step: usize,
}

impl IndexRange {
    pub fn new(start: usize, stop: usize, step: usize) -> IndexRange {
        IndexRange { start, stop, step }
    }

    /// The single index `index`. `usize::MAX` cannot be selected and gives
    /// an empty range.
    pub fn single(index: usize) -> IndexRange {
        IndexRange::new(index, index.saturating_add(1), 1)
    }

    /// Every index of an axis with extent `extent`.
    pub fn full(extent: usize) -> IndexRange {
        IndexRange::new(0, extent, 1)
    }

    /// Number of indices selected.
    pub fn count(&self) -> usize {
        if self.step == 0 || self.stop <= self.start {
            0
        } else {
            (self.stop - self.start - 1) / self.step + 1
        }
    }

    /// The last index selected, if any.
    pub fn last(&self) -> Option<usize> {
        match self.count() {
            0 => None,
            n => Some(self.start + (n - 1) * self.step),
        }
    }

    /// Translates into the format's 1-based inclusive triple. Returns `None`
    /// for an empty range.
    pub(crate) fn to_usr(self) -> Option<UsrIndex> {
        let last = self.last()?;
        Some(UsrIndex {
            first: self.start.checked_add(1)?,
            last: last.checked_add(1)?,
            step: self.step,
        })
    }
}

impl From<Range<usize>> for IndexRange {
    fn from(range: Range<usize>) -> IndexRange {
        IndexRange::new(range.start, range.end, 1)
    }
}

/// The format's own index triple: 1-based, inclusive bounds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct UsrIndex {
    pub first: usize,
    pub last: usize,
    pub step: usize,
}

impl UsrIndex {
    pub fn count(&self) -> usize {
        (self.last - self.first) / self.step + 1
    }

    /// 0-based position along the axis of the `k`-th selected index.
    pub fn index(&self, k: usize) -> usize {
        self.first - 1 + k * self.step
    }

    /// 0-based last index.
    pub fn last_index(&self) -> usize {
        self.last - 1
    }
}

/// The order of group axes in a transfer buffer, fastest varying first.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct AxisOrder(Vec<usize>);

impl AxisOrder {
    /// Group axis 0 varies fastest, then axis 1 and so on.
    pub fn identity(rank: usize) -> AxisOrder {
        AxisOrder((0..rank).collect())
    }

    /// Builds an order from a permutation of `0..axes.len()`.
    pub fn new(axes: Vec<usize>) -> Result<AxisOrder, NefisError> {
        let mut seen = vec![false; axes.len()];
        for &axis in &axes {
            if axis >= axes.len() || std::mem::replace(&mut seen[axis], true) {
                return Err(NefisError::ShapeMismatch(format!(
                    "axis order {:?} is not a permutation",
                    axes
                )));
            }
        }
        Ok(AxisOrder(axes))
    }

    pub fn rank(&self) -> usize {
        self.0.len()
    }

    pub fn axes(&self) -> &[usize] {
        &self.0
    }
}
