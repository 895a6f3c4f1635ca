use std::{fmt::Debug, marker::PhantomData, ptr::NonNull};

use crate::{BufferDescriptor, ImageDType};

/// A rank 2 grid inside memory owned by someone else.
///
/// Elements are addressed as `row * row_stride + col * col_stride` from the handle. Nothing is
/// released on drop. The `'a` lifetime stands for the owner's guarantee that the memory stays
/// valid and unmoved; with a slice-backed view the compiler checks it, with a raw handle the
/// caller promised it when calling the `unsafe` constructor.
pub struct BorrowedGrid<'a, T: ImageDType> {
    ptr: NonNull<T>,
    descriptor: BufferDescriptor,
    height: usize,
    width: usize,
    row_stride: usize,
    col_stride: usize,
    _marker: PhantomData<&'a mut [T]>,
}

impl<'a, T: ImageDType> BorrowedGrid<'a, T> {
    /// # Safety
    ///
    /// `descriptor` must be a validated rank 2 descriptor for `T`, and `ptr` must address at
    /// least `descriptor.span()` elements that stay valid, unmoved and otherwise unaccessed
    /// for `'a`.
    pub(crate) unsafe fn from_raw_parts(ptr: NonNull<T>, descriptor: BufferDescriptor) -> Self {
        let shape = descriptor.shape();
        let strides = descriptor.strides();
        let (height, width) = (shape[0], shape[1]);
        //Strides of extent 1 axes are never used to step and may be zero or negative
        let row_stride = if height > 1 { strides[0] as usize } else { 0 };
        let col_stride = if width > 1 { strides[1] as usize } else { 1 };
        Self {
            ptr,
            descriptor,
            height,
            width,
            row_stride,
            col_stride,
            _marker: PhantomData,
        }
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    pub fn as_ptr(&self) -> *const T {
        self.ptr.as_ptr()
    }

    #[inline]
    fn offset(&self, row: usize, col: usize) -> usize {
        row * self.row_stride + col * self.col_stride
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(unsafe { &*self.ptr.as_ptr().add(self.offset(row, col)) })
    }

    pub fn get_mut(&mut self, row: usize, col: usize) -> Option<&mut T> {
        if row >= self.height || col >= self.width {
            return None;
        }
        Some(unsafe { &mut *self.ptr.as_ptr().add(self.offset(row, col)) })
    }

    /// Row `row` as a slice, only when its elements are adjacent in memory.
    pub fn row(&self, row: usize) -> Option<&[T]> {
        if row >= self.height {
            return None;
        }
        if self.width == 0 {
            return Some(&[]);
        }
        if self.col_stride != 1 {
            return None;
        }
        let start = unsafe { self.ptr.as_ptr().add(self.offset(row, 0)) };
        Some(unsafe { std::slice::from_raw_parts(start, self.width) })
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut T)) {
        for row in 0..self.height {
            for col in 0..self.width {
                let offset = self.offset(row, col);
                f(unsafe { &mut *self.ptr.as_ptr().add(offset) });
            }
        }
    }
}

impl<'a, T: ImageDType> Debug for BorrowedGrid<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BorrowedGrid")
            .field("ptr", &self.ptr)
            .field("descriptor", &self.descriptor)
            .finish()
    }
}
