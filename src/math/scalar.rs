use std::fmt::Debug;
use std::io::{self, Read, Write};
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use rand::distributions::uniform::SampleUniform;

/// Element-type tag stored in model files so a reader can verify it is
/// instantiating the same numeric type the file was written with.
///
/// Tag values are part of the wire format and must not be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DType {
    Unknown,
    F32,
    F64,
    I32,
}

impl DType {
    pub fn tag(self) -> u32 {
        match self {
            DType::Unknown => 0,
            DType::F32 => 1,
            DType::F64 => 2,
            DType::I32 => 3,
        }
    }

    /// Maps a tag read from a file back to a `DType`. Unassigned tags map to
    /// `Unknown`, which never matches a concrete element type.
    pub fn from_tag(tag: u32) -> DType {
        match tag {
            1 => DType::F32,
            2 => DType::F64,
            3 => DType::I32,
            _ => DType::Unknown,
        }
    }
}

/// Numeric element of a [`Matrix`](crate::math::Matrix): the arithmetic the
/// matrix engine needs, a uniform-sampling bound so one seeded `random()`
/// covers integral and floating element types, and a fixed-width
/// little-endian byte codec used by model persistence.
pub trait Scalar:
    Copy
    + Default
    + Debug
    + PartialOrd
    + Add<Output = Self>
    + Sub<Output = Self>
    + Mul<Output = Self>
    + Div<Output = Self>
    + AddAssign
    + SubAssign
    + MulAssign
    + DivAssign
    + SampleUniform
    + Send
    + Sync
    + 'static
{
    const ZERO: Self;
    const ONE: Self;
    const DTYPE: DType;

    fn to_f64(self) -> f64;

    fn write_le(self, out: &mut dyn Write) -> io::Result<()>;
    fn read_le(input: &mut dyn Read) -> io::Result<Self>;
}

macro_rules! impl_scalar {
    ($ty:ty, $dtype:expr, $width:expr) => {
        impl Scalar for $ty {
            const ZERO: Self = 0 as $ty;
            const ONE: Self = 1 as $ty;
            const DTYPE: DType = $dtype;

            fn to_f64(self) -> f64 {
                self as f64
            }

            fn write_le(self, out: &mut dyn Write) -> io::Result<()> {
                out.write_all(&self.to_le_bytes())
            }

            fn read_le(input: &mut dyn Read) -> io::Result<Self> {
                let mut buf = [0u8; $width];
                input.read_exact(&mut buf)?;
                Ok(<$ty>::from_le_bytes(buf))
            }
        }
    };
}

impl_scalar!(u8, DType::Unknown, 1);
impl_scalar!(i32, DType::I32, 4);
impl_scalar!(f32, DType::F32, 4);
impl_scalar!(f64, DType::F64, 8);

/// Floating-point element, as required by layers and losses.
pub trait Float: Scalar + Neg<Output = Self> {
    fn from_f64(value: f64) -> Self;
    fn exp(self) -> Self;
    fn ln(self) -> Self;
    fn sqrt(self) -> Self;
    fn max(self, other: Self) -> Self;
}

macro_rules! impl_float {
    ($ty:ty) => {
        impl Float for $ty {
            fn from_f64(value: f64) -> Self {
                value as $ty
            }

            fn exp(self) -> Self {
                <$ty>::exp(self)
            }

            fn ln(self) -> Self {
                <$ty>::ln(self)
            }

            fn sqrt(self) -> Self {
                <$ty>::sqrt(self)
            }

            fn max(self, other: Self) -> Self {
                <$ty>::max(self, other)
            }
        }
    };
}

impl_float!(f32);
impl_float!(f64);
