use crate::{rvec, RVec, Shape, ShapeError};
use serde::{Deserialize, Serialize};

/// Per-axis steps, counted in elements rather than bytes.
#[derive(Clone, PartialEq, Eq, Default, Hash, Serialize, Deserialize)]
pub struct Strides(RVec<isize>);

impl Strides {
    pub fn new(strides: RVec<isize>) -> Self {
        Self(strides)
    }

    pub fn to_vec(&self) -> Vec<isize> {
        self.0.to_vec()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &isize> {
        self.0.iter()
    }

    /// Converts byte strides into element strides.
    pub fn from_bytes(byte_strides: &[i64], element_size: usize) -> Result<Self, ShapeError> {
        let strides = byte_strides
            .iter()
            .enumerate()
            .map(|(axis, &stride)| {
                if stride % element_size as i64 != 0 {
                    return Err(ShapeError::MisalignedStride {
                        axis,
                        stride,
                        element_size,
                    });
                }
                Ok((stride / element_size as i64) as isize)
            })
            .collect::<Result<RVec<_>, _>>()?;
        Ok(Self(strides))
    }
}

impl std::fmt::Debug for Strides {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut shape = format!("[{}", self.0.first().unwrap_or(&0));
        for dim in self.0.iter().skip(1) {
            shape.push_str(&format!("x{}", dim));
        }
        write!(f, "{}]", shape)
    }
}

impl std::ops::Index<usize> for Strides {
    type Output = isize;

    fn index(&self, index: usize) -> &Self::Output {
        &self.0[index]
    }
}

impl From<&Shape> for Strides {
    fn from(shape: &Shape) -> Self {
        let mut strides = rvec![];
        let mut stride = 1;
        for size in shape.inner().iter().rev() {
            strides.push(stride);
            stride *= *size as isize;
        }
        strides.reverse();
        Self(strides)
    }
}

impl From<Vec<isize>> for Strides {
    fn from(strides: Vec<isize>) -> Self {
        Self(strides.into())
    }
}
