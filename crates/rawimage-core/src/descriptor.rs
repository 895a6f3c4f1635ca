use serde::{Deserialize, Serialize};

use crate::{shape, DType, ImageDType, InvariantError, Shape, ShapeError, Strides};

/// Shape and memory layout of a grid living in someone else's buffer.
///
/// Strides are counted in elements. A descriptor is immutable once built, and every
/// constructor validates it, so a descriptor in hand always describes an element count and
/// a span that fit in a `usize`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawDescriptor")]
pub struct BufferDescriptor {
    shape: Shape,
    strides: Strides,
    element_size: usize,
    dtype: DType,
}

impl BufferDescriptor {
    pub fn new(shape: Shape, strides: Strides, dtype: DType) -> Result<Self, ShapeError> {
        let fits = shape
            .checked_numel()
            .and_then(|numel| numel.checked_mul(dtype.size_of()))
            .is_some();
        if !fits {
            return Err(ShapeError::Overflow(
                shape.iter().map(|&d| d as i64).collect(),
            ));
        }
        layout_span(&shape, &strides)?;
        Ok(Self {
            shape,
            strides,
            element_size: dtype.size_of(),
            dtype,
        })
    }

    /// Row-major layout with no padding between rows.
    pub fn contiguous(height: usize, width: usize, dtype: DType) -> Result<Self, ShapeError> {
        let shape = shape![height, width];
        let strides = Strides::from(&shape);
        Self::new(shape, strides, dtype)
    }

    /// Layout of a grid this crate allocated itself.
    pub(crate) fn owned<T: ImageDType>(height: usize, width: usize) -> Self {
        let shape = shape![height, width];
        let strides = Strides::from(&shape);
        Self {
            shape,
            strides,
            element_size: std::mem::size_of::<T>(),
            dtype: T::dt(),
        }
    }

    /// Checks a raw shape/stride description without building a descriptor.
    pub fn validate(shape: &[i64], strides: &[i64], element_size: i64) -> Result<(), ShapeError> {
        if element_size <= 0 {
            return Err(ShapeError::ElementSize(element_size));
        }
        let shape = Shape::try_from(shape)?;
        let strides = Strides::new(strides.iter().map(|&s| s as isize).collect());
        layout_span(&shape, &strides).map(|_| ())
    }

    /// Translates a buffer-protocol style description: byte strides plus a format string.
    pub fn from_raw_parts(
        shape: &[i64],
        byte_strides: &[i64],
        element_size: i64,
        format: &str,
    ) -> Result<Self, InvariantError> {
        if element_size <= 0 {
            return Err(ShapeError::ElementSize(element_size).into());
        }
        let dtype = DType::from_format(format)?;
        if element_size as usize != dtype.size_of() {
            return Err(InvariantError::ElementSizeMismatch {
                dtype,
                expected: dtype.size_of(),
                actual: element_size as usize,
            });
        }
        let strides = Strides::from_bytes(byte_strides, element_size as usize)?;
        let element_strides = strides.iter().map(|&s| s as i64).collect::<Vec<_>>();
        Self::validate(shape, &element_strides, element_size)?;
        Ok(Self::new(Shape::try_from(shape)?, strides, dtype)?)
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn strides(&self) -> &Strides {
        &self.strides
    }

    pub fn element_size(&self) -> usize {
        self.element_size
    }

    pub fn dtype(&self) -> DType {
        self.dtype
    }

    pub fn ndim(&self) -> usize {
        self.shape.rank()
    }

    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    pub fn num_bytes(&self) -> usize {
        self.numel() * self.element_size
    }

    /// Number of elements a backing buffer must hold to cover every addressed element.
    pub fn span(&self) -> usize {
        //Checked at construction
        layout_span(&self.shape, &self.strides).unwrap_or(usize::MAX)
    }

    pub fn is_contiguous(&self) -> bool {
        self.shape.is_degenerate() || self.strides == Strides::from(&self.shape)
    }

    /// `[height, width]` of a rank 2 descriptor.
    pub fn dims(&self) -> Result<[usize; 2], InvariantError> {
        (&self.shape).try_into()
    }
}

/// Wire form of a descriptor. Deserialised descriptors go through the same checks as
/// [`BufferDescriptor::new`].
#[derive(Deserialize)]
struct RawDescriptor {
    shape: Shape,
    strides: Strides,
    element_size: usize,
    dtype: DType,
}

impl TryFrom<RawDescriptor> for BufferDescriptor {
    type Error = InvariantError;

    fn try_from(raw: RawDescriptor) -> Result<Self, Self::Error> {
        let RawDescriptor {
            shape,
            strides,
            element_size,
            dtype,
        } = raw;
        if element_size != dtype.size_of() {
            return Err(InvariantError::ElementSizeMismatch {
                dtype,
                expected: dtype.size_of(),
                actual: element_size,
            });
        }
        Ok(Self::new(shape, strides, dtype)?)
    }
}

fn layout_span(shape: &Shape, strides: &Strides) -> Result<usize, ShapeError> {
    if strides.len() != shape.rank() {
        return Err(ShapeError::StrideRank {
            expected: shape.rank(),
            actual: strides.len(),
        });
    }
    //Nothing is addressed, any stride will do
    if shape.is_degenerate() {
        return Ok(0);
    }
    //An axis of extent 1 never steps, so its stride is free
    let bad_stride = shape
        .iter()
        .zip(strides.iter())
        .enumerate()
        .find(|(_, (dim, stride))| **dim > 1 && **stride <= 0);
    if let Some((axis, (_, &stride))) = bad_stride {
        return Err(ShapeError::NonPositiveStride {
            axis,
            stride: stride as i64,
        });
    }
    let overflow = || ShapeError::Overflow(shape.iter().map(|&d| d as i64).collect());
    shape
        .iter()
        .zip(strides.iter())
        .try_fold(1usize, |span, (&dim, &stride)| {
            if dim == 1 {
                return Some(span);
            }
            (dim - 1)
                .checked_mul(stride as usize)
                .and_then(|reach| span.checked_add(reach))
        })
        .ok_or_else(overflow)
}
