mod borrowed_grid;
mod owning_grid;

pub use borrowed_grid::*;
pub use owning_grid::*;

use crate::{BufferDescriptor, ImageDType};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("Cannot allocate a {rows}x{cols} grid: size is not representable.")]
    Allocation { rows: usize, cols: usize },
    #[error("Row {row} out of bounds for a grid with {rows} rows.")]
    RowOutOfBounds { row: usize, rows: usize },
    #[error("Expected {expected} elements, got {actual}.")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Where an image's elements live. Exactly one of the two, never both.
#[derive(Debug)]
pub enum Storage<'a, T: ImageDType> {
    Borrowed(BorrowedGrid<'a, T>),
    Owned(OwningGrid<T>),
}

impl<'a, T: ImageDType> Storage<'a, T> {
    pub fn height(&self) -> usize {
        match self {
            Storage::Borrowed(b) => b.height(),
            Storage::Owned(o) => o.rows(),
        }
    }

    pub fn width(&self) -> usize {
        match self {
            Storage::Borrowed(b) => b.width(),
            Storage::Owned(o) => o.cols(),
        }
    }

    pub fn is_borrowed(&self) -> bool {
        matches!(self, Storage::Borrowed(_))
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        match self {
            Storage::Borrowed(b) => b.get(row, col),
            Storage::Owned(o) => o.get(row, col),
        }
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        match self {
            Storage::Borrowed(b) => b.get_mut(row, col),
            Storage::Owned(o) => o.get_mut(row, col),
        }
    }

    /// Contiguous row slice. Borrowed grids with a column stride other than one have none.
    pub fn row(&self, row: usize) -> Option<&[T]> {
        match self {
            Storage::Borrowed(b) => b.row(row),
            Storage::Owned(o) => o.row(row).ok(),
        }
    }

    pub fn for_each_mut(&mut self, f: impl FnMut(&mut T)) {
        match self {
            Storage::Borrowed(b) => b.for_each_mut(f),
            Storage::Owned(o) => o.as_mut_slice().iter_mut().for_each(f),
        }
    }

    /// Copies every element, row-major, into a fresh owning grid.
    pub fn deep_clone(&self) -> Result<OwningGrid<T>, StorageError> {
        match self {
            Storage::Owned(o) => Ok(o.clone()),
            Storage::Borrowed(b) => {
                let cols = b.width();
                let mut grid = OwningGrid::zeros(b.height(), cols)?;
                for (idx, dst) in grid.as_mut_slice().iter_mut().enumerate() {
                    if let Some(src) = b.get(idx / cols, idx % cols) {
                        *dst = *src;
                    }
                }
                Ok(grid)
            }
        }
    }

    pub fn descriptor(&self) -> Option<&BufferDescriptor> {
        match self {
            Storage::Borrowed(b) => Some(b.descriptor()),
            Storage::Owned(_) => None,
        }
    }
}
