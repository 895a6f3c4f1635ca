use std::{alloc::Layout, fmt::Debug, marker::PhantomData, ptr::NonNull};

use crate::{storage::StorageError, ImageDType};

/// Contiguous row-major block of `rows * cols` elements, allocated and released by the grid.
///
/// Cloning allocates a fresh block and copies every element. [`OwningGrid::take`] hands the
/// block over in O(1) and leaves the source as the empty grid, so a block is released exactly
/// once whichever handle ends up holding it.
pub struct OwningGrid<T: ImageDType> {
    ptr: NonNull<T>,
    rows: usize,
    cols: usize,
    layout: Layout,
    _marker: PhantomData<T>,
}

unsafe impl<T: ImageDType> Send for OwningGrid<T> {}
unsafe impl<T: ImageDType> Sync for OwningGrid<T> {}

impl<T: ImageDType> OwningGrid<T> {
    /// The 0x0 grid. Holds no allocation.
    pub fn empty() -> Self {
        Self {
            ptr: NonNull::dangling(),
            rows: 0,
            cols: 0,
            layout: Layout::new::<[T; 0]>(),
            _marker: PhantomData,
        }
    }

    pub fn zeros(rows: usize, cols: usize) -> Result<Self, StorageError> {
        let layout = rows
            .checked_mul(cols)
            .and_then(|numel| Layout::array::<T>(numel).ok())
            .ok_or(StorageError::Allocation { rows, cols })?;
        let ptr = if layout.size() == 0 {
            NonNull::dangling()
        } else {
            //T: Zeroable, so zeroed bytes are a valid grid
            let raw = unsafe { std::alloc::alloc_zeroed(layout) } as *mut T;
            match NonNull::new(raw) {
                Some(ptr) => ptr,
                None => std::alloc::handle_alloc_error(layout),
            }
        };
        log::trace!("Allocated {}x{} grid at {:p}", rows, cols, ptr);
        Ok(Self {
            ptr,
            rows,
            cols,
            layout,
            _marker: PhantomData,
        })
    }

    pub fn from_slice(rows: usize, cols: usize, data: &[T]) -> Result<Self, StorageError> {
        let mut grid = Self::zeros(rows, cols)?;
        if data.len() != grid.numel() {
            return Err(StorageError::LengthMismatch {
                expected: grid.numel(),
                actual: data.len(),
            });
        }
        grid.as_mut_slice().copy_from_slice(data);
        Ok(grid)
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn numel(&self) -> usize {
        self.rows * self.cols
    }

    pub fn is_empty(&self) -> bool {
        self.numel() == 0
    }

    pub fn n_bytes(&self) -> usize {
        self.layout.size()
    }

    pub fn as_slice(&self) -> &[T] {
        unsafe { std::slice::from_raw_parts(self.ptr.as_ptr(), self.numel()) }
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { std::slice::from_raw_parts_mut(self.ptr.as_ptr(), self.numel()) }
    }

    pub fn row(&self, row: usize) -> Result<&[T], StorageError> {
        if row >= self.rows {
            return Err(StorageError::RowOutOfBounds {
                row,
                rows: self.rows,
            });
        }
        let start = row * self.cols;
        Ok(&self.as_slice()[start..start + self.cols])
    }

    pub fn row_mut(&mut self, row: usize) -> Result<&mut [T], StorageError> {
        if row >= self.rows {
            return Err(StorageError::RowOutOfBounds {
                row,
                rows: self.rows,
            });
        }
        let (start, cols) = (row * self.cols, self.cols);
        Ok(&mut self.as_mut_slice()[start..start + cols])
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.as_slice().get(row * self.cols + col)
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        let idx = row * self.cols + col;
        self.as_mut_slice().get_mut(idx)
    }

    /// Move-transfer: returns the current block and leaves `self` as the empty grid.
    pub fn take(&mut self) -> Self {
        std::mem::replace(self, Self::empty())
    }
}

impl<T: ImageDType> Default for OwningGrid<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: ImageDType> Clone for OwningGrid<T> {
    fn clone(&self) -> Self {
        let ptr = if self.layout.size() == 0 {
            NonNull::dangling()
        } else {
            let raw = unsafe { std::alloc::alloc(self.layout) } as *mut T;
            let Some(ptr) = NonNull::new(raw) else {
                std::alloc::handle_alloc_error(self.layout)
            };
            unsafe {
                self.ptr
                    .as_ptr()
                    .copy_to_nonoverlapping(ptr.as_ptr(), self.numel())
            };
            ptr
        };
        log::trace!("Cloning: {:p} -> {:p}", self.ptr, ptr);
        Self {
            ptr,
            rows: self.rows,
            cols: self.cols,
            layout: self.layout,
            _marker: PhantomData,
        }
    }
}

impl<T: ImageDType> Drop for OwningGrid<T> {
    fn drop(&mut self) {
        if self.layout.size() > 0 {
            log::trace!("Releasing {}x{} grid at {:p}", self.rows, self.cols, self.ptr);
            unsafe { std::alloc::dealloc(self.ptr.as_ptr() as *mut u8, self.layout) }
        }
    }
}

impl<T: ImageDType> Debug for OwningGrid<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OwningGrid")
            .field("rows", &self.rows)
            .field("cols", &self.cols)
            .field("ptr", &self.ptr)
            .finish()
    }
}

impl<T: ImageDType> PartialEq for OwningGrid<T> {
    fn eq(&self, other: &Self) -> bool {
        self.rows == other.rows && self.cols == other.cols && self.as_slice() == other.as_slice()
    }
}
