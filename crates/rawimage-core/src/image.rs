use std::ptr::NonNull;

use num_traits::{NumCast, One, ToPrimitive};

use crate::{
    format::render_grid, shape, BorrowedGrid, BufferDescriptor, DType, DisplayOptions, ElementAdd,
    Enforcer, ImageDType, InvariantError, OwningGrid, Shape, ShapeError, Storage, StorageError,
};

#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("Index ({row}, {col}) out of range for image of shape {shape}.")]
    IndexOutOfBounds { row: usize, col: usize, shape: Shape },
    #[error("Null handle for a non-empty buffer.")]
    NullHandle,
    #[error("Value at ({row}, {col}) is not representable as {to} (from {from}).")]
    Cast {
        row: usize,
        col: usize,
        from: DType,
        to: DType,
    },
    #[error("Adding to the {dt} value at ({row}, {col}) overflows.")]
    Overflow { row: usize, col: usize, dt: DType },
    #[error(transparent)]
    Invariant(#[from] InvariantError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<ShapeError> for ImageError {
    fn from(err: ShapeError) -> Self {
        ImageError::Invariant(InvariantError::Shape(err))
    }
}

/// A 2D grid of `T`, either borrowing memory or owning it.
///
/// Borrowed views never copy and never release: every write goes straight to the owner's
/// buffer and is visible to the owner. Owning views release their storage once, on drop.
/// Elements are addressed as `(row, col)` with `row < height` and `col < width`.
pub struct ImageView<'a, T: ImageDType> {
    storage: Storage<'a, T>,
}

impl<'a, T: ImageDType> ImageView<'a, T> {
    /// Wraps a caller's buffer without copying.
    ///
    /// The descriptor must be rank 2, carry `T`'s tag and address only elements inside
    /// `data`. Sub-windows of a larger buffer are expressed through the strides.
    pub fn borrow(data: &'a mut [T], descriptor: BufferDescriptor) -> Result<Self, ImageError> {
        Self::check_borrow(&descriptor)?;
        Enforcer::check_span(&descriptor, data.len())?;
        let ptr = NonNull::from(data).cast::<T>();
        //SAFETY: descriptor validated, span checked, memory exclusively borrowed for 'a
        Ok(unsafe { Self::wrap(ptr, descriptor) })
    }

    /// Wraps a raw handle without copying.
    ///
    /// # Safety
    ///
    /// `ptr` must address at least `descriptor.span()` elements of `T` that stay valid and
    /// unmoved for all of `'a`, and nothing else may access them while the view writes to them.
    /// Using the view after the owner released the memory is undefined behaviour; the view has
    /// no way to detect it.
    pub unsafe fn borrow_raw(ptr: *mut T, descriptor: BufferDescriptor) -> Result<Self, ImageError> {
        Self::check_borrow(&descriptor)?;
        let ptr = match NonNull::new(ptr) {
            Some(ptr) => ptr,
            None if descriptor.span() == 0 => NonNull::dangling(),
            None => return Err(ImageError::NullHandle),
        };
        Ok(unsafe { Self::wrap(ptr, descriptor) })
    }

    fn check_borrow(descriptor: &BufferDescriptor) -> Result<(), InvariantError> {
        Enforcer::assert_rank(descriptor, 2)?;
        Enforcer::assert_dtype::<T>(descriptor)
    }

    unsafe fn wrap(ptr: NonNull<T>, descriptor: BufferDescriptor) -> Self {
        log::debug!(
            "Borrowing {:?} {} grid at {:p}",
            descriptor.shape(),
            descriptor.dtype(),
            ptr
        );
        Self {
            storage: Storage::Borrowed(unsafe { BorrowedGrid::from_raw_parts(ptr, descriptor) }),
        }
    }

    /// Owning, zero-initialised grid.
    pub fn zeros(height: usize, width: usize) -> Result<Self, ImageError> {
        Ok(OwningGrid::zeros(height, width)?.into())
    }

    /// Owning grid from row-major data.
    pub fn from_vec(height: usize, width: usize, data: Vec<T>) -> Result<Self, ImageError> {
        let expected = height.checked_mul(width).ok_or(StorageError::Allocation {
            rows: height,
            cols: width,
        })?;
        if data.len() != expected {
            return Err(ShapeError::LengthMismatch {
                shape: shape![height, width],
                expected,
                actual: data.len(),
            }
            .into());
        }
        Ok(OwningGrid::from_slice(height, width, &data)?.into())
    }

    /// Owning grid copied from nested rows. Every row must have the same length.
    pub fn from_literal<R: AsRef<[T]>>(rows: &[R]) -> Result<Self, ImageError> {
        let [height, width] = Enforcer::check_rectangular(rows)?;
        let mut grid = OwningGrid::zeros(height, width)?;
        for (r, row) in rows.iter().enumerate() {
            grid.row_mut(r)?.copy_from_slice(row.as_ref());
        }
        Ok(grid.into())
    }

    pub fn storage(&self) -> &Storage<'a, T> {
        &self.storage
    }

    pub fn height(&self) -> usize {
        self.storage.height()
    }

    pub fn width(&self) -> usize {
        self.storage.width()
    }

    pub fn size(&self) -> usize {
        self.height() * self.width()
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// `[height, width]`
    pub fn dims(&self) -> [usize; 2] {
        [self.height(), self.width()]
    }

    pub fn shape(&self) -> Shape {
        self.dims().into()
    }

    pub fn dt(&self) -> DType {
        T::dt()
    }

    pub fn is_borrowed(&self) -> bool {
        self.storage.is_borrowed()
    }

    pub fn is_owning(&self) -> bool {
        !self.is_borrowed()
    }

    /// Layout of the elements: the borrowed descriptor, or the contiguous owning layout.
    pub fn descriptor(&self) -> BufferDescriptor {
        match self.storage.descriptor() {
            Some(descriptor) => descriptor.clone(),
            None => BufferDescriptor::owned::<T>(self.height(), self.width()),
        }
    }

    fn index_error(&self, row: usize, col: usize) -> ImageError {
        ImageError::IndexOutOfBounds {
            row,
            col,
            shape: self.shape(),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> Result<T, ImageError> {
        self.storage
            .get(row, col)
            .copied()
            .ok_or_else(|| self.index_error(row, col))
    }

    pub fn set(&mut self, row: usize, col: usize, value: T) -> Result<(), ImageError> {
        match self.storage.get_mut(row, col) {
            Some(v) => {
                *v = value;
                Ok(())
            }
            None => Err(self.index_error(row, col)),
        }
    }

    /// Reads the pixel at column `x`, row `y`. Anything outside the grid, negative
    /// coordinates included, is `None`.
    pub fn pixel(&self, x: i64, y: i64) -> Option<T> {
        let (col, row) = (usize::try_from(x).ok()?, usize::try_from(y).ok()?);
        self.storage.get(row, col).copied()
    }

    /// Row `row` as a slice, when its elements are adjacent in memory.
    pub fn row(&self, row: usize) -> Option<&[T]> {
        self.storage.row(row)
    }

    /// Copies of every row, top to bottom. Works for any strides.
    pub fn rows(&self) -> Vec<Vec<T>> {
        let storage = &self.storage;
        (0..self.height())
            .map(|r| {
                (0..self.width())
                    .filter_map(|c| storage.get(r, c).copied())
                    .collect()
            })
            .collect()
    }

    /// Row-major element values.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        let (height, width) = (self.height(), self.width());
        let storage = &self.storage;
        (0..height).flat_map(move |r| (0..width).filter_map(move |c| storage.get(r, c).copied()))
    }

    fn map_indexed<U: ImageDType>(
        &self,
        f: impl Fn(usize, usize, T) -> U,
    ) -> Result<ImageView<'static, U>, ImageError> {
        let width = self.width();
        let mut grid = OwningGrid::<U>::zeros(self.height(), width)?;
        for (idx, (dst, v)) in grid.as_mut_slice().iter_mut().zip(self.iter()).enumerate() {
            *dst = f(idx / width, idx % width, v);
        }
        Ok(grid.into())
    }

    /// Elementwise `==` against another view of identical shape.
    pub fn equals(&self, other: &ImageView<'_, T>) -> Result<ImageView<'static, bool>, ImageError> {
        Enforcer::check_broadcast(self.dims(), other.dims())?;
        self.map_indexed(|r, c, v| other.storage.get(r, c).is_some_and(|o| *o == v))
    }

    /// Elementwise `==` against nested rows; the rows' shape must match exactly.
    pub fn equals_literal<R: AsRef<[T]>>(
        &self,
        rows: &[R],
    ) -> Result<ImageView<'static, bool>, ImageError> {
        let dims = Enforcer::check_rectangular(rows)?;
        Enforcer::check_broadcast(self.dims(), dims)?;
        self.map_indexed(|r, c, v| rows[r].as_ref()[c] == v)
    }

    /// Adds `value` to every element in place.
    ///
    /// On a borrowed view this writes through to the borrowed buffer, so the buffer's owner
    /// sees the new values. Integer sums are checked first: if any element would leave the
    /// type's range the call fails with [`ImageError::Overflow`] and no element is written.
    pub fn add_constant(&mut self, value: T) -> Result<&mut Self, ImageError>
    where
        T: ElementAdd,
    {
        let width = self.width();
        if let Some(idx) = self
            .iter()
            .position(|v| v.checked_add_element(value).is_none())
        {
            return Err(ImageError::Overflow {
                row: idx / width,
                col: idx % width,
                dt: T::dt(),
            });
        }
        self.storage.for_each_mut(|v| {
            if let Some(sum) = v.checked_add_element(value) {
                *v = sum;
            }
        });
        Ok(self)
    }

    /// Adds `value` to every element of a new owning copy. `self` is left untouched.
    pub fn add_constant_copy(&self, value: T) -> Result<ImageView<'static, T>, ImageError>
    where
        T: ElementAdd,
    {
        let mut copy = self.deep_clone()?;
        copy.add_constant(value)?;
        Ok(copy)
    }

    pub fn increment(&mut self) -> Result<&mut Self, ImageError>
    where
        T: ElementAdd + One,
    {
        self.add_constant(T::one())
    }

    /// Explicit conversion to another element type, into a new owning view.
    pub fn cast<U>(&self) -> Result<ImageView<'static, U>, ImageError>
    where
        T: ToPrimitive,
        U: ImageDType + NumCast,
    {
        let width = self.width();
        let mut grid = OwningGrid::<U>::zeros(self.height(), width)?;
        for (idx, (dst, v)) in grid.as_mut_slice().iter_mut().zip(self.iter()).enumerate() {
            *dst = <U as NumCast>::from(v).ok_or(ImageError::Cast {
                row: idx / width,
                col: idx % width,
                from: T::dt(),
                to: U::dt(),
            })?;
        }
        Ok(grid.into())
    }

    /// True when every pair satisfies `|a - b| <= atol + rtol * |b|`.
    pub fn all_close(
        &self,
        other: &ImageView<'_, T>,
        atol: f64,
        rtol: f64,
    ) -> Result<bool, ImageError>
    where
        T: ToPrimitive,
    {
        Enforcer::check_broadcast(self.dims(), other.dims())?;
        let close = self.iter().zip(other.iter()).all(|(a, b)| {
            match (a.to_f64(), b.to_f64()) {
                (Some(a), Some(b)) => {
                    (a.is_nan() && b.is_nan())
                        || (a.is_infinite() && b.is_infinite() && a.signum() == b.signum())
                        || (a - b).abs() <= atol + rtol * b.abs()
                }
                _ => false,
            }
        });
        Ok(close)
    }

    /// Deep copy, decoupled from whichever storage this view uses.
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            data: self.iter().collect(),
            descriptor: BufferDescriptor::owned::<T>(self.height(), self.width()),
        }
    }

    /// Owning copy of this view.
    pub fn deep_clone(&self) -> Result<ImageView<'static, T>, ImageError> {
        Ok(self.storage.deep_clone()?.into())
    }

    /// Move-transfer: returns this view's storage and leaves `self` as an empty owning view.
    pub fn take(&mut self) -> ImageView<'a, T> {
        ImageView {
            storage: std::mem::replace(&mut self.storage, Storage::Owned(OwningGrid::empty())),
        }
    }

    pub fn to_display_string(&self) -> String {
        self.to_display_string_with(&DisplayOptions::default())
    }

    pub fn to_display_string_with(&self, options: &DisplayOptions) -> String {
        let storage = &self.storage;
        render_grid(
            self.height(),
            self.width(),
            |r, c| {
                storage
                    .get(r, c)
                    .copied()
                    .unwrap_or_else(<T as bytemuck::Zeroable>::zeroed)
            },
            options,
        )
    }
}

impl<'a, T: ImageDType> From<OwningGrid<T>> for ImageView<'a, T> {
    fn from(grid: OwningGrid<T>) -> Self {
        Self {
            storage: Storage::Owned(grid),
        }
    }
}

impl<'a, T: ImageDType> std::ops::Index<(usize, usize)> for ImageView<'a, T> {
    type Output = T;

    fn index(&self, (row, col): (usize, usize)) -> &Self::Output {
        match self.storage.get(row, col) {
            Some(v) => v,
            None => panic!("{}", self.index_error(row, col)),
        }
    }
}

impl<'a, T: ImageDType> std::ops::IndexMut<(usize, usize)> for ImageView<'a, T> {
    fn index_mut(&mut self, (row, col): (usize, usize)) -> &mut Self::Output {
        let shape = self.shape();
        match self.storage.get_mut(row, col) {
            Some(v) => v,
            None => panic!("{}", ImageError::IndexOutOfBounds { row, col, shape }),
        }
    }
}

impl<'a, T: ImageDType> std::fmt::Display for ImageView<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_display_string())
    }
}

impl<'a, T: ImageDType> std::fmt::Debug for ImageView<'a, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mode = if self.is_borrowed() { "borrowed" } else { "owned" };
        f.debug_struct("ImageView")
            .field("shape", &self.shape())
            .field("dt", &self.dt())
            .field("mode", &mode)
            .field("data", &self.to_display_string())
            .finish()
    }
}

/// A plain, owned, row-major copy of an image plus its contiguous layout.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T: ImageDType> {
    data: Vec<T>,
    descriptor: BufferDescriptor,
}

impl<T: ImageDType> Snapshot<T> {
    pub fn descriptor(&self) -> &BufferDescriptor {
        &self.descriptor
    }

    pub fn height(&self) -> usize {
        self.descriptor.shape()[0]
    }

    pub fn width(&self) -> usize {
        self.descriptor.shape()[1]
    }

    pub fn as_slice(&self) -> &[T] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<T> {
        self.data
    }

    pub fn get(&self, row: usize, col: usize) -> Option<T> {
        if row >= self.height() || col >= self.width() {
            return None;
        }
        self.data.get(row * self.width() + col).copied()
    }

    pub fn to_nested(&self) -> Vec<Vec<T>> {
        let width = self.width();
        if width == 0 {
            return vec![Vec::new(); self.height()];
        }
        self.data.chunks(width).map(|row| row.to_vec()).collect()
    }

    /// Raw bytes in the snapshot's layout.
    pub fn to_bytes(&self) -> Vec<u8>
    where
        T: bytemuck::NoUninit,
    {
        bytemuck::cast_slice(&self.data).to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{image, rvec, Strides};
    use test_strategy::{proptest, Arbitrary};

    #[derive(Arbitrary, Debug)]
    struct ImageProblem {
        #[strategy(1usize..12)]
        height: usize,
        #[strategy(1usize..12)]
        width: usize,
        #[strategy(proptest::collection::vec(-10_000i64..10_000, #height * #width))]
        data: Vec<i64>,
        #[strategy(-1000i64..1000)]
        k: i64,
    }

    #[derive(Arbitrary, Debug)]
    struct MaskProblem {
        #[strategy(1usize..6)]
        height: usize,
        #[strategy(1usize..6)]
        width: usize,
        #[strategy(proptest::collection::vec(proptest::num::u8::ANY, #height * #width))]
        data: Vec<u8>,
        k: u8,
    }

    #[derive(Arbitrary, Debug)]
    struct FloatProblem {
        #[strategy(0usize..8)]
        height: usize,
        #[strategy(0usize..8)]
        width: usize,
        #[strategy(proptest::collection::vec(-1e6f64..1e6, #height * #width))]
        data: Vec<f64>,
        #[strategy(-1e3f64..1e3)]
        k: f64,
    }

    #[derive(Arbitrary, Debug)]
    struct ShapePair {
        #[strategy(0usize..6)]
        h1: usize,
        #[strategy(0usize..6)]
        w1: usize,
        #[strategy(0usize..6)]
        h2: usize,
        #[strategy(0usize..6)]
        w2: usize,
    }

    fn buffer_2x3() -> Vec<i32> {
        vec![1, 2, 3, 4, 5, 6]
    }

    #[test]
    fn test_borrow_indexing() -> anyhow::Result<()> {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut data = buffer_2x3();
        let desc = BufferDescriptor::contiguous(2, 3, DType::I32)?;
        let view = ImageView::borrow(&mut data, desc)?;
        assert!(view.is_borrowed());
        assert_eq!(view.get(0, 0)?, 1);
        assert_eq!(view.get(1, 2)?, 6);
        assert!(matches!(
            view.get(2, 0),
            Err(ImageError::IndexOutOfBounds { row: 2, col: 0, .. })
        ));
        assert!(view.get(0, 3).is_err());
        Ok(())
    }

    #[test]
    fn test_borrow_rejects_wrong_kind() -> anyhow::Result<()> {
        let mut data = vec![0.0f64; 6];
        let desc = BufferDescriptor::contiguous(2, 3, DType::F32)?;
        let err = ImageView::borrow(&mut data, desc).unwrap_err();
        assert_eq!(
            err,
            ImageError::Invariant(InvariantError::DTypeMismatch {
                expected: DType::F64,
                actual: DType::F32
            })
        );
        Ok(())
    }

    #[test]
    fn test_borrow_rejects_rank() -> anyhow::Result<()> {
        let mut data = vec![0u8; 8];
        let desc = BufferDescriptor::new(shape![2, 2, 2], Strides::new(rvec![4, 2, 1]), DType::U8)?;
        let err = ImageView::borrow(&mut data, desc).unwrap_err();
        assert!(matches!(
            err,
            ImageError::Invariant(InvariantError::RankMismatch {
                expected: 2,
                actual: 3
            })
        ));
        Ok(())
    }

    #[test]
    fn test_borrow_rejects_short_buffer() -> anyhow::Result<()> {
        let mut data = vec![0i32; 5];
        let desc = BufferDescriptor::contiguous(2, 3, DType::I32)?;
        let err = ImageView::borrow(&mut data, desc).unwrap_err();
        assert_eq!(
            err,
            ImageError::from(ShapeError::BufferTooSmall {
                required: 6,
                actual: 5
            })
        );
        Ok(())
    }

    #[test]
    fn test_borrow_window() -> anyhow::Result<()> {
        //Top-right 2x2 window of a 3x4 buffer
        let mut data = (0..12).collect::<Vec<i32>>();
        let desc = BufferDescriptor::new(shape![2, 2], Strides::new(rvec![4, 1]), DType::I32)?;
        let mut view = ImageView::borrow(&mut data[2..], desc)?;
        assert_eq!(view.snapshot().to_nested(), vec![vec![2, 3], vec![6, 7]]);
        view.add_constant(100)?;
        drop(view);
        assert_eq!(data[..8], [0, 1, 102, 103, 4, 5, 106, 107]);
        Ok(())
    }

    #[test]
    fn test_borrow_transposed() -> anyhow::Result<()> {
        let mut data = buffer_2x3();
        //Column-major reading of the 2x3 buffer
        let desc = BufferDescriptor::new(shape![3, 2], Strides::new(rvec![1, 3]), DType::I32)?;
        let view = ImageView::borrow(&mut data, desc)?;
        assert_eq!(
            view.snapshot().to_nested(),
            vec![vec![1, 4], vec![2, 5], vec![3, 6]]
        );
        assert!(view.row(0).is_none());
        assert_eq!(view.rows(), vec![vec![1, 4], vec![2, 5], vec![3, 6]]);
        Ok(())
    }

    #[test]
    fn test_borrow_unit_axes() -> anyhow::Result<()> {
        let mut data = vec![1.0f32, 2.0, 3.0];
        let desc = BufferDescriptor::new(shape![1, 3], Strides::new(rvec![0, 1]), DType::F32)?;
        let mut row = ImageView::borrow(&mut data, desc)?;
        assert_eq!(row.row(0), Some(&[1.0, 2.0, 3.0][..]));
        row.add_constant(1.0)?;
        drop(row);
        assert_eq!(data, vec![2.0, 3.0, 4.0]);

        let desc = BufferDescriptor::new(shape![3, 1], Strides::new(rvec![1, -5]), DType::F32)?;
        let column = ImageView::borrow(&mut data, desc)?;
        assert_eq!(column.row(2), Some(&[4.0][..]));
        assert_eq!(column.snapshot().into_vec(), vec![2.0, 3.0, 4.0]);
        Ok(())
    }

    #[test]
    fn test_borrow_raw() -> anyhow::Result<()> {
        let mut data = buffer_2x3();
        let desc = BufferDescriptor::contiguous(2, 3, DType::I32)?;
        let view = unsafe { ImageView::borrow_raw(data.as_mut_ptr(), desc.clone())? };
        assert_eq!(view.get(1, 0)?, 4);
        drop(view);

        let err = unsafe { ImageView::<i32>::borrow_raw(std::ptr::null_mut(), desc) }.unwrap_err();
        assert_eq!(err, ImageError::NullHandle);

        let empty = BufferDescriptor::contiguous(0, 3, DType::I32)?;
        let view = unsafe { ImageView::<i32>::borrow_raw(std::ptr::null_mut(), empty)? };
        assert!(view.is_empty());
        Ok(())
    }

    #[test]
    fn test_in_place_add_is_visible_to_owner() -> anyhow::Result<()> {
        let mut data = buffer_2x3();
        {
            let desc = BufferDescriptor::contiguous(2, 3, DType::I32)?;
            let mut view = ImageView::borrow(&mut data, desc)?;
            view.add_constant(10)?.increment()?;
        }
        assert_eq!(data, vec![12, 13, 14, 15, 16, 17]);
        Ok(())
    }

    #[test]
    fn test_add_copy_leaves_source() -> anyhow::Result<()> {
        let mut data = buffer_2x3();
        let desc = BufferDescriptor::contiguous(2, 3, DType::I32)?;
        let view = ImageView::borrow(&mut data, desc)?;
        let copy = view.add_constant_copy(1)?;
        assert!(copy.is_owning());
        assert_eq!(copy.snapshot().into_vec(), vec![2, 3, 4, 5, 6, 7]);
        assert_eq!(view.snapshot().into_vec(), buffer_2x3());
        Ok(())
    }

    #[test]
    fn test_add_overflow_leaves_grid_untouched() -> anyhow::Result<()> {
        let mut mask = ImageView::<u8>::from_vec(1, 2, vec![250, 1])?;
        let err = mask.add_constant(10).unwrap_err();
        assert_eq!(
            err,
            ImageError::Overflow {
                row: 0,
                col: 0,
                dt: DType::U8
            }
        );
        assert_eq!(mask.snapshot().into_vec(), vec![250, 1]);
        assert_eq!(mask.add_constant(5)?.snapshot().into_vec(), vec![255, 6]);
        assert!(mask.increment().is_err());

        let mut data = vec![0, 1, i32::MAX, 3];
        let desc = BufferDescriptor::contiguous(2, 2, DType::I32)?;
        let view = ImageView::borrow(&mut data, desc)?;
        assert!(matches!(
            view.add_constant_copy(1),
            Err(ImageError::Overflow { row: 1, col: 0, .. })
        ));
        drop(view);
        assert_eq!(data, vec![0, 1, i32::MAX, 3]);
        Ok(())
    }

    #[test]
    fn test_float_add_overflows_to_infinity() -> anyhow::Result<()> {
        let mut img: ImageView<f32> = image![[f32::MAX, 1.0]]?;
        img.add_constant(f32::MAX)?;
        assert_eq!(img.get(0, 0)?, f32::INFINITY);
        Ok(())
    }

    #[test]
    fn test_set_and_index() -> anyhow::Result<()> {
        let mut img: ImageView<f64> = ImageView::zeros(2, 2)?;
        img.set(1, 0, 2.5)?;
        img[(0, 1)] = -1.0;
        assert_eq!(img[(1, 0)], 2.5);
        assert_eq!(img.get(0, 1)?, -1.0);
        assert!(matches!(
            img.set(2, 2, 0.0),
            Err(ImageError::IndexOutOfBounds { .. })
        ));
        Ok(())
    }

    #[test]
    #[should_panic]
    fn test_index_out_of_range_panics() {
        let img: ImageView<u8> = ImageView::zeros(1, 1).unwrap();
        let _ = img[(0, 1)];
    }

    #[test]
    fn test_pixel_out_of_range_is_none() -> anyhow::Result<()> {
        let img: ImageView<f32> = image![[1.0, 2.0], [3.0, 4.0]]?;
        assert_eq!(img.pixel(1, 0), Some(2.0));
        assert_eq!(img.pixel(0, 1), Some(3.0));
        assert_eq!(img.pixel(-1, 0), None);
        assert_eq!(img.pixel(0, 2), None);
        Ok(())
    }

    #[test]
    fn test_ragged_literal() {
        let err = ImageView::from_literal(&[vec![1, 2, 3], vec![4, 5]]).unwrap_err();
        assert_eq!(
            err,
            ImageError::from(ShapeError::RaggedRows {
                row: 1,
                expected: 3,
                actual: 2
            })
        );
    }

    #[test]
    fn test_from_vec_length() {
        let err = ImageView::from_vec(2, 2, vec![1u8, 2, 3]).unwrap_err();
        assert!(matches!(
            err,
            ImageError::Invariant(InvariantError::Shape(ShapeError::LengthMismatch { .. }))
        ));
    }

    #[test]
    fn test_equals_literal() -> anyhow::Result<()> {
        let img: ImageView<i32> = image![[1, 2], [3, 4]]?;
        let eq = img.equals_literal(&[[1, 0], [3, 0]])?;
        assert_eq!(
            eq.snapshot().to_nested(),
            vec![vec![true, false], vec![true, false]]
        );
        let err = img.equals_literal(&[[1, 2, 3]]).unwrap_err();
        assert!(matches!(
            err,
            ImageError::Invariant(InvariantError::Broadcast { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_equals_mixed_storage() -> anyhow::Result<()> {
        let mut data = buffer_2x3();
        let desc = BufferDescriptor::contiguous(2, 3, DType::I32)?;
        let borrowed = ImageView::borrow(&mut data, desc)?;
        let mut owned = borrowed.deep_clone()?;
        owned.set(0, 0, 0)?;
        let eq = borrowed.equals(&owned)?;
        assert_eq!(eq.dt(), DType::Bool);
        assert_eq!(
            eq.snapshot().into_vec(),
            vec![false, true, true, true, true, true]
        );
        Ok(())
    }

    #[test]
    fn test_cast() -> anyhow::Result<()> {
        let img: ImageView<f64> = image![[1.0, 2.5], [-3.0, 4.0]]?;
        let ints = img.cast::<i32>()?;
        assert_eq!(ints.snapshot().into_vec(), vec![1, 2, -3, 4]);
        let err = img.cast::<u8>().unwrap_err();
        assert_eq!(
            err,
            ImageError::Cast {
                row: 1,
                col: 0,
                from: DType::F64,
                to: DType::U8
            }
        );
        let halves = ints.cast::<half::f16>()?;
        assert_eq!(halves.get(1, 1)?, half::f16::from_f32(4.0));
        Ok(())
    }

    #[test]
    fn test_take() -> anyhow::Result<()> {
        let mut data = buffer_2x3();
        let desc = BufferDescriptor::contiguous(2, 3, DType::I32)?;
        let mut source = ImageView::borrow(&mut data, desc)?;
        let dest = source.take();
        assert_eq!(source.dims(), [0, 0]);
        assert!(source.is_owning());
        assert!(dest.is_borrowed());
        assert_eq!(dest.snapshot().into_vec(), buffer_2x3());
        Ok(())
    }

    #[test]
    fn test_zero_sized_is_noop() -> anyhow::Result<()> {
        let mut img: ImageView<i32> = ImageView::zeros(0, 4)?;
        img.add_constant(3)?;
        assert_eq!(img.iter().count(), 0);
        assert!(img.snapshot().as_slice().is_empty());
        let other: ImageView<i32> = ImageView::zeros(0, 4)?;
        assert!(img.equals(&other)?.is_empty());
        assert!(img.add_constant_copy(1)?.is_empty());
        assert_eq!(img.to_display_string(), "[]");
        Ok(())
    }

    #[test]
    fn test_snapshot_descriptor() -> anyhow::Result<()> {
        let mut data = (0..12).collect::<Vec<i32>>();
        let desc = BufferDescriptor::new(shape![2, 2], Strides::new(rvec![4, 1]), DType::I32)?;
        let view = ImageView::borrow(&mut data, desc)?;
        let snap = view.snapshot();
        assert!(snap.descriptor().is_contiguous());
        assert_eq!(snap.descriptor().dims()?, [2, 2]);
        assert_eq!(snap.get(1, 1), Some(5));
        assert_eq!(snap.to_bytes().len(), 16);
        assert!(!view.descriptor().is_contiguous());
        Ok(())
    }

    #[test]
    fn test_display() -> anyhow::Result<()> {
        let img: ImageView<i32> = image![[2, 3, 4], [5, 6, 7]]?;
        assert_eq!(img.to_string(), "[[2, 3, 4],\n [5, 6, 7]]");
        let dbg = format!("{:?}", img);
        assert!(dbg.contains("owned"));
        assert!(dbg.contains("[2x3]"));
        Ok(())
    }

    #[proptest(cases = 64)]
    fn test_equals_self(prob: ImageProblem) {
        let ImageProblem {
            height,
            width,
            data,
            ..
        } = prob;
        let img = ImageView::from_vec(height, width, data).unwrap();
        let eq = img.equals(&img).unwrap();
        assert!(eq.iter().all(|b| b));
        assert_eq!(eq.dims(), img.dims());
    }

    #[proptest(cases = 64)]
    fn test_mismatched_shapes_fail(prob: ShapePair) {
        let ShapePair { h1, w1, h2, w2 } = prob;
        let a = ImageView::<u8>::zeros(h1, w1).unwrap();
        let b = ImageView::<u8>::zeros(h2, w2).unwrap();
        let result = a.equals(&b);
        if (h1, w1) == (h2, w2) {
            assert!(result.is_ok());
        } else {
            assert!(matches!(
                result,
                Err(ImageError::Invariant(InvariantError::Broadcast { .. }))
            ));
        }
    }

    #[proptest(cases = 64)]
    fn test_add_and_subtract_restores(prob: ImageProblem) {
        let ImageProblem {
            height,
            width,
            mut data,
            k,
        } = prob;
        let original = data.clone();
        let desc = BufferDescriptor::contiguous(height, width, DType::I64).unwrap();
        let mut view = ImageView::borrow(&mut data, desc).unwrap();
        view.add_constant(k).unwrap().add_constant(-k).unwrap();
        drop(view);
        assert_eq!(data, original);
    }

    #[proptest(cases = 64)]
    fn test_float_add_and_subtract_restores(prob: FloatProblem) {
        let FloatProblem {
            height,
            width,
            data,
            k,
        } = prob;
        let original = ImageView::from_vec(height, width, data).unwrap();
        let mut shifted = original.deep_clone().unwrap();
        shifted.add_constant(k).unwrap().add_constant(-k).unwrap();
        assert!(shifted.all_close(&original, 1e-6, 1e-9).unwrap());
    }

    #[proptest(cases = 64)]
    fn test_add_zero_copy_is_identity(prob: ImageProblem) {
        let ImageProblem {
            height,
            width,
            data,
            ..
        } = prob;
        let img = ImageView::from_vec(height, width, data.clone()).unwrap();
        let copy = img.add_constant_copy(0).unwrap();
        assert!(copy.equals(&img).unwrap().iter().all(|b| b));
        assert_eq!(img.snapshot().into_vec(), data);
    }

    #[proptest(cases = 128)]
    fn test_mask_add_is_all_or_nothing(prob: MaskProblem) {
        let MaskProblem {
            height,
            width,
            data,
            k,
        } = prob;
        let mut img = ImageView::from_vec(height, width, data.clone()).unwrap();
        let fits = data.iter().all(|v| v.checked_add(k).is_some());
        match img.add_constant(k) {
            Ok(_) => {
                assert!(fits);
                let expected = data.iter().map(|v| v + k).collect::<Vec<_>>();
                assert_eq!(img.snapshot().into_vec(), expected);
            }
            Err(err) => {
                assert!(!fits);
                assert!(matches!(err, ImageError::Overflow { .. }));
                assert_eq!(img.snapshot().into_vec(), data);
            }
        }
    }
}
