use crate::{BufferDescriptor, DType, ImageDType, Shape, ShapeError};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantError {
    #[error(transparent)]
    Shape(#[from] ShapeError),
    #[error("Rank mismatch. Expected {expected}, got {actual}.")]
    RankMismatch { expected: usize, actual: usize },
    #[error("DType mismatch, expected {expected:?}, got {actual:?}.")]
    DTypeMismatch { expected: DType, actual: DType },
    #[error("Element size mismatch for {dtype}, expected {expected} bytes, got {actual}.")]
    ElementSizeMismatch {
        dtype: DType,
        expected: usize,
        actual: usize,
    },
    #[error("Unsupported buffer format {0:?}.")]
    UnsupportedFormat(String),
    #[error("Operands could not be broadcast together with shapes {lhs} {rhs}.")]
    Broadcast { lhs: Shape, rhs: Shape },
    #[error("Band {band} has shape {actual}, expected {expected}.")]
    BandShapeMismatch {
        band: &'static str,
        expected: Shape,
        actual: Shape,
    },
}

/// # Enforcer
///
/// Enforcer enforces common invariants on descriptors and grid shapes.
pub struct Enforcer;

impl Enforcer {
    pub fn assert_rank(descriptor: &BufferDescriptor, rank: usize) -> Result<(), InvariantError> {
        let actual = descriptor.ndim();
        if actual != rank {
            return Err(InvariantError::RankMismatch {
                expected: rank,
                actual,
            });
        }
        Ok(())
    }

    /// The descriptor must carry `T`'s tag and `T`'s element size.
    pub fn assert_dtype<T: ImageDType>(descriptor: &BufferDescriptor) -> Result<(), InvariantError> {
        let expected = T::dt();
        let actual = descriptor.dtype();
        if actual != expected {
            return Err(InvariantError::DTypeMismatch { expected, actual });
        }
        let size = std::mem::size_of::<T>();
        if descriptor.element_size() != size {
            return Err(InvariantError::ElementSizeMismatch {
                dtype: expected,
                expected: size,
                actual: descriptor.element_size(),
            });
        }
        Ok(())
    }

    pub fn check_span(descriptor: &BufferDescriptor, available: usize) -> Result<(), ShapeError> {
        let required = descriptor.span();
        if required > available {
            return Err(ShapeError::BufferTooSmall {
                required,
                actual: available,
            });
        }
        Ok(())
    }

    /// Elementwise binary operations need identical `[height, width]`.
    pub fn check_broadcast(lhs: [usize; 2], rhs: [usize; 2]) -> Result<(), InvariantError> {
        if lhs != rhs {
            return Err(InvariantError::Broadcast {
                lhs: lhs.into(),
                rhs: rhs.into(),
            });
        }
        Ok(())
    }

    /// Every band must match the first one.
    pub fn match_band_shapes(
        bands: &[(&'static str, [usize; 2])],
    ) -> Result<[usize; 2], InvariantError> {
        let Some(&(_, expected)) = bands.first() else {
            return Ok([0, 0]);
        };
        for &(band, actual) in bands.iter().skip(1) {
            if actual != expected {
                return Err(InvariantError::BandShapeMismatch {
                    band,
                    expected: expected.into(),
                    actual: actual.into(),
                });
            }
        }
        Ok(expected)
    }

    /// Infers `[height, width]` of a nested literal, rejecting ragged rows.
    pub fn check_rectangular<T, R: AsRef<[T]>>(rows: &[R]) -> Result<[usize; 2], ShapeError> {
        let width = rows.first().map_or(0, |r| r.as_ref().len());
        for (row, r) in rows.iter().enumerate() {
            let actual = r.as_ref().len();
            if actual != width {
                return Err(ShapeError::RaggedRows {
                    row,
                    expected: width,
                    actual,
                });
            }
        }
        Ok([rows.len(), width])
    }
}
