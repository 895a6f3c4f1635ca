use ndarray::{Array2, ArrayBase, Data, DataMut, Ix2};

use crate::{BufferDescriptor, ImageDType, ImageError, ImageView, Shape, Snapshot, Strides};

impl<'a, T: ImageDType> ImageView<'a, T> {
    /// Borrows an array's memory, keeping its strides. Arrays with inverted axes have negative
    /// strides and are rejected.
    pub fn borrow_array<S>(array: &'a mut ArrayBase<S, Ix2>) -> Result<Self, ImageError>
    where
        S: DataMut<Elem = T>,
    {
        let shape = Shape::from(array.shape());
        let strides = Strides::new(array.strides().iter().copied().collect());
        let descriptor = BufferDescriptor::new(shape, strides, T::dt())?;
        //SAFETY: the array owns every element its strides reach, and stays mutably borrowed for 'a
        unsafe { Self::borrow_raw(array.as_mut_ptr(), descriptor) }
    }

    /// Owning copy of an array, in logical row-major order.
    pub fn from_array<S>(array: &ArrayBase<S, Ix2>) -> Result<ImageView<'static, T>, ImageError>
    where
        S: Data<Elem = T>,
    {
        let (height, width) = array.dim();
        ImageView::from_vec(height, width, array.iter().copied().collect())
    }
}

impl<T: ImageDType> Snapshot<T> {
    pub fn into_ndarray(self) -> Array2<T> {
        let width = self.width();
        let data = self.as_slice();
        Array2::from_shape_fn((self.height(), width), |(r, c)| data[r * width + c])
    }
}

impl<T: ImageDType> From<Snapshot<T>> for Array2<T> {
    fn from(snapshot: Snapshot<T>) -> Self {
        snapshot.into_ndarray()
    }
}
