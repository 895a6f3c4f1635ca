use half::{bf16, f16};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::InvariantError;

/// Element kind of an external buffer.
///
/// The tag only describes how the bytes of a buffer are to be read. It is checked once at the
/// boundary, when a view borrows a buffer; arithmetic always dispatches on the static element
/// type of the view.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    Default,
    Hash,
    Serialize,
    Deserialize,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::EnumIter,
    strum_macros::IntoStaticStr,
)]
pub enum DType {
    #[strum(serialize = "bool")]
    #[serde(rename = "bool")]
    Bool,
    #[strum(serialize = "uint8")]
    #[serde(rename = "uint8")]
    U8,
    #[strum(serialize = "int32")]
    #[serde(rename = "int32")]
    I32,
    #[strum(serialize = "uint32")]
    #[serde(rename = "uint32")]
    U32,
    #[strum(serialize = "int64")]
    #[serde(rename = "int64")]
    I64,
    #[strum(serialize = "float16")]
    #[serde(rename = "float16")]
    F16,
    #[strum(serialize = "bfloat16")]
    #[serde(rename = "bfloat16")]
    BF16,
    #[strum(serialize = "float32")]
    #[serde(rename = "float32")]
    F32,
    #[default]
    #[strum(serialize = "float64")]
    #[serde(rename = "float64")]
    F64,
}

impl DType {
    /// Returns the size of the type in bytes.
    pub fn size_of(self) -> usize {
        match self {
            DType::Bool => 1,
            DType::U8 => 1,
            DType::F16 => 2,
            DType::BF16 => 2,
            DType::I32 => 4,
            DType::U32 => 4,
            DType::F32 => 4,
            DType::I64 => 8,
            DType::F64 => 8,
        }
    }

    pub fn is_float(self) -> bool {
        matches!(self, DType::F16 | DType::BF16 | DType::F32 | DType::F64)
    }

    /// Resolves a format string handed over by the boundary.
    ///
    /// Accepts either a dtype name (`"float64"`, `"int32"`, ...) or a single character
    /// buffer-protocol code (`"d"`, `"i"`, ...). Byte-order prefixes (`<`, `=`, `@`) are ignored.
    pub fn from_format(format: &str) -> Result<Self, InvariantError> {
        if let Ok(dt) = DType::from_str(format) {
            return Ok(dt);
        }
        let code = format.trim_start_matches(['<', '=', '@']);
        match code {
            "?" => Ok(DType::Bool),
            "B" => Ok(DType::U8),
            "i" => Ok(DType::I32),
            "I" => Ok(DType::U32),
            //LP64: `l` is 8 bytes wide
            "q" | "l" => Ok(DType::I64),
            "e" => Ok(DType::F16),
            "f" => Ok(DType::F32),
            "d" => Ok(DType::F64),
            _ => Err(InvariantError::UnsupportedFormat(format.to_string())),
        }
    }
}

/// Rust element types that can live inside an image.
///
/// `Zeroable` guarantees that freshly zeroed storage is a valid grid of `Self`.
pub trait ImageDType:
    Copy + std::fmt::Debug + std::fmt::Display + PartialEq + bytemuck::Zeroable + Send + Sync + 'static
{
    fn dt() -> DType;
}

macro_rules! map_type {
    ($t:ty, $v:ident) => {
        impl ImageDType for $t {
            fn dt() -> DType {
                DType::$v
            }
        }
    };
}

map_type!(bool, Bool);
map_type!(u8, U8);
map_type!(i32, I32);
map_type!(u32, U32);
map_type!(i64, I64);
map_type!(f16, F16);
map_type!(bf16, BF16);
map_type!(f32, F32);
map_type!(f64, F64);

/// Adding a constant to every element of an image.
///
/// Integer sums that leave the type's range are `None`; float sums always succeed and follow
/// IEEE rules (`inf`, `NaN`).
pub trait ElementAdd: ImageDType {
    fn checked_add_element(self, rhs: Self) -> Option<Self>;
}

macro_rules! checked_element_add {
    ($($t:ty),*) => {
        $(impl ElementAdd for $t {
            fn checked_add_element(self, rhs: Self) -> Option<Self> {
                num_traits::CheckedAdd::checked_add(&self, &rhs)
            }
        })*
    };
}

macro_rules! float_element_add {
    ($($t:ty),*) => {
        $(impl ElementAdd for $t {
            fn checked_add_element(self, rhs: Self) -> Option<Self> {
                Some(self + rhs)
            }
        })*
    };
}

checked_element_add!(u8, i32, u32, i64);
float_element_add!(f16, bf16, f32, f64);
