use crate::RVec;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    #[error("Negative extent {dim} on axis {axis}.")]
    NegativeDim { axis: usize, dim: i64 },
    #[error("Element count of shape {0:?} overflows.")]
    Overflow(Vec<i64>),
    #[error("Expected {expected} strides for a rank {expected} shape, got {actual}.")]
    StrideRank { expected: usize, actual: usize },
    #[error("Stride {stride} on axis {axis} must be positive.")]
    NonPositiveStride { axis: usize, stride: i64 },
    #[error("Byte stride {stride} on axis {axis} is not a multiple of the element size {element_size}.")]
    MisalignedStride {
        axis: usize,
        stride: i64,
        element_size: usize,
    },
    #[error("Element size must be positive, got {0}.")]
    ElementSize(i64),
    #[error("Buffer holds {actual} elements, layout needs {required}.")]
    BufferTooSmall { required: usize, actual: usize },
    #[error("Row {row} has {actual} elements, expected {expected}.")]
    RaggedRows {
        row: usize,
        expected: usize,
        actual: usize,
    },
    #[error("Shape {shape:?} needs {expected} elements, got {actual}.")]
    LengthMismatch {
        shape: Shape,
        expected: usize,
        actual: usize,
    },
}

#[derive(Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Shape(RVec<usize>);

impl Shape {
    pub fn new(shape: RVec<usize>) -> Self {
        Self(shape)
    }

    pub fn inner(&self) -> &RVec<usize> {
        &self.0
    }

    pub fn get(&self, index: usize) -> Option<&usize> {
        self.0.get(index)
    }

    /// Element count, saturating at `usize::MAX`. Use [`Shape::checked_numel`] to detect
    /// overflow; shapes held by a descriptor always fit.
    pub fn numel(&self) -> usize {
        self.0
            .iter()
            .fold(1usize, |acc, &dim| acc.saturating_mul(dim))
    }

    /// Element count, `None` when the product does not fit in a `usize`.
    pub fn checked_numel(&self) -> Option<usize> {
        self.0
            .iter()
            .try_fold(1usize, |acc, &dim| acc.checked_mul(dim))
    }

    pub fn to_vec(&self) -> Vec<usize> {
        self.0.to_vec()
    }

    pub fn iter(&self) -> impl Iterator<Item = &usize> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn rank(&self) -> usize {
        self.len()
    }

    /// True when any axis has zero extent.
    pub fn is_degenerate(&self) -> bool {
        self.0.iter().any(|&dim| dim == 0)
    }
}

impl std::fmt::Debug for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut shape = format!("[{}", self.0.first().unwrap_or(&0));
        for dim in self.0.iter().skip(1) {
            shape.push_str(&format!("x{}", dim));
        }
        write!(f, "{}]", shape)
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dims = self
            .0
            .iter()
            .map(|d| d.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        write!(f, "({})", dims)
    }
}

impl std::ops::Index<usize> for Shape {
    type Output = usize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<Vec<usize>> for Shape {
    fn from(shape: Vec<usize>) -> Self {
        Self(shape.into())
    }
}

impl From<&[usize]> for Shape {
    fn from(slice: &[usize]) -> Self {
        Shape(slice.into())
    }
}

impl From<[usize; 2]> for Shape {
    fn from(dims: [usize; 2]) -> Self {
        Shape(dims.into_iter().collect())
    }
}

impl TryFrom<&[i64]> for Shape {
    type Error = ShapeError;

    fn try_from(dims: &[i64]) -> Result<Self, Self::Error> {
        let shape = dims
            .iter()
            .enumerate()
            .map(|(axis, &dim)| {
                usize::try_from(dim).map_err(|_| ShapeError::NegativeDim { axis, dim })
            })
            .collect::<Result<RVec<_>, _>>()?;
        let shape = Shape(shape);
        if shape.checked_numel().is_none() {
            return Err(ShapeError::Overflow(dims.to_vec()));
        }
        Ok(shape)
    }
}

impl TryInto<[usize; 2]> for &Shape {
    type Error = crate::InvariantError;

    fn try_into(self) -> Result<[usize; 2], Self::Error> {
        match self.0.as_slice() {
            &[h, w] => Ok([h, w]),
            _ => Err(crate::InvariantError::RankMismatch {
                expected: 2,
                actual: self.rank(),
            }),
        }
    }
}
