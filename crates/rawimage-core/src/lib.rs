mod descriptor;
mod dtype;
mod enforcer;
mod format;
mod image;
mod layered;
#[cfg(feature = "ndarray")]
mod ndarray_ext;
mod shape;
mod storage;
mod strides;

pub use descriptor::*;
pub use dtype::*;
pub use enforcer::*;
pub use format::DisplayOptions;
pub use image::*;
pub use layered::*;
pub use shape::*;
pub use storage::*;
pub use strides::*;

use smallvec::SmallVec;
pub type RVec<T> = SmallVec<[T; 4]>;

//https://github.com/sonos/tract/blob/main/data/src/macros.rs#L2
#[macro_export]
macro_rules! rvec {
    (@one $x:expr) => (1usize);
    ($elem:expr; $n:expr) => ({
        $crate::RVec::from_elem($elem, $n)
    });
    ($($x:expr),*$(,)*) => ({
        let count = 0usize $(+ $crate::rvec![@one $x])*;
        #[allow(unused_mut)]
        let mut vec = $crate::RVec::new();
        if count <= vec.inline_size() {
            $(vec.push($x);)*
            vec
        } else {
            $crate::RVec::from_vec(vec![$($x,)*])
        }
    });
}

#[macro_export]
macro_rules! shape {
    ($($x:expr),*$(,)*) => ({
        use $crate::rvec;
        $crate::Shape::new(rvec![$($x,)*])
    });
}

/// Owning image from nested rows: `image![[1, 2, 3], [4, 5, 6]]`.
///
/// Evaluates to `Result<ImageView<'static, T>, ImageError>`; ragged rows are an error.
#[macro_export]
macro_rules! image {
    ($([$($x:expr),* $(,)*]),* $(,)*) => ({
        $crate::ImageView::from_literal(&[$(::std::vec![$($x),*]),*])
    });
}

pub mod prelude {
    pub use crate::{
        image, rvec, shape, BufferDescriptor, DType, ImageError, ImageView, LayeredImage,
        Snapshot,
    };
}
