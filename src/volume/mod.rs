//! This module defines the voxel container handed from the source reader to
//! the converter. Voxels are kept raw: no scaling is applied, and the
//! element type is the one declared by the header `datatype` field.

pub mod element;

pub use self::element::DataElement;

use crate::error::{NiizarrError, Result};
use crate::store::ZarrArray;
use crate::typedef::NiftiType;
use byteordered::{ByteOrdered, Endianness};
use ndarray::{Array, ArrayD, Axis, IxDyn, ShapeBuilder};
use std::io::Write;

/// A dynamically dimensioned voxel array of any supported element type,
/// indexed in NIfTI order (x, y, z, t, c...).
#[derive(Debug, Clone, PartialEq)]
pub enum Voxels {
    /// `uint8`
    U8(ArrayD<u8>),
    /// `int8`
    I8(ArrayD<i8>),
    /// `uint16`
    U16(ArrayD<u16>),
    /// `int16`
    I16(ArrayD<i16>),
    /// `uint32`
    U32(ArrayD<u32>),
    /// `int32`
    I32(ArrayD<i32>),
    /// `uint64`
    U64(ArrayD<u64>),
    /// `int64`
    I64(ArrayD<i64>),
    /// `float32`
    F32(ArrayD<f32>),
    /// `float64`
    F64(ArrayD<f64>),
}

/// Apply the same expression to the array held by any variant, and wrap
/// the outcome back into the same variant.
macro_rules! map_voxels {
    ($voxels:expr, $a:ident => $e:expr) => {
        match $voxels {
            Voxels::U8($a) => Voxels::U8($e),
            Voxels::I8($a) => Voxels::I8($e),
            Voxels::U16($a) => Voxels::U16($e),
            Voxels::I16($a) => Voxels::I16($e),
            Voxels::U32($a) => Voxels::U32($e),
            Voxels::I32($a) => Voxels::I32($e),
            Voxels::U64($a) => Voxels::U64($e),
            Voxels::I64($a) => Voxels::I64($e),
            Voxels::F32($a) => Voxels::F32($e),
            Voxels::F64($a) => Voxels::F64($e),
        }
    };
}

/// Apply the same expression to the array held by any variant.
macro_rules! with_voxels {
    ($voxels:expr, $a:ident => $e:expr) => {
        match $voxels {
            Voxels::U8($a) => $e,
            Voxels::I8($a) => $e,
            Voxels::U16($a) => $e,
            Voxels::I16($a) => $e,
            Voxels::U32($a) => $e,
            Voxels::I32($a) => $e,
            Voxels::U64($a) => $e,
            Voxels::I64($a) => $e,
            Voxels::F32($a) => $e,
            Voxels::F64($a) => $e,
        }
    };
}

fn decode<T: DataElement>(
    shape: &[usize],
    bytes: &[u8],
    endianness: Endianness,
) -> Result<ArrayD<T>> {
    let expected: usize = shape.iter().product();
    let data = T::from_raw_vec(bytes, endianness)?;
    if data.len() < expected {
        return Err(NiizarrError::IncompatibleLength(data.len(), expected));
    }
    let mut data = data;
    data.truncate(expected);
    Array::from_shape_vec(IxDyn(shape).f(), data)
        .map_err(|_| NiizarrError::IncompatibleLength(expected, expected))
}

impl Voxels {
    /// Build a voxel array out of the raw volume bytes, which are laid out
    /// in column-major order (x fastest) as NIfTI mandates. Trailing bytes
    /// past the expected volume size are ignored.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::UnsupportedDataType` for complex, RGB and 128-bit
    ///   floating point volumes
    /// - `NiizarrError::IncompatibleLength` if fewer bytes are available than
    ///   the shape requires
    pub fn from_raw(
        datatype: NiftiType,
        shape: &[usize],
        bytes: &[u8],
        endianness: Endianness,
    ) -> Result<Self> {
        let voxels = match datatype {
            NiftiType::Uint8 => Voxels::U8(decode(shape, bytes, endianness)?),
            NiftiType::Int8 => Voxels::I8(decode(shape, bytes, endianness)?),
            NiftiType::Uint16 => Voxels::U16(decode(shape, bytes, endianness)?),
            NiftiType::Int16 => Voxels::I16(decode(shape, bytes, endianness)?),
            NiftiType::Uint32 => Voxels::U32(decode(shape, bytes, endianness)?),
            NiftiType::Int32 => Voxels::I32(decode(shape, bytes, endianness)?),
            NiftiType::Uint64 => Voxels::U64(decode(shape, bytes, endianness)?),
            NiftiType::Int64 => Voxels::I64(decode(shape, bytes, endianness)?),
            NiftiType::Float32 => Voxels::F32(decode(shape, bytes, endianness)?),
            NiftiType::Float64 => Voxels::F64(decode(shape, bytes, endianness)?),
            t => return Err(NiizarrError::UnsupportedDataType(t)),
        };
        Ok(voxels)
    }

    /// Load a whole zarr array, holding elements of the given data type.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::UnsupportedDataType` for types without a voxel
    ///   variant
    /// - `NiizarrError::ArrayAccess` if the stored data type does not match
    pub fn from_zarr(datatype: NiftiType, array: &ZarrArray) -> Result<Self> {
        let voxels = match datatype {
            NiftiType::Uint8 => Voxels::U8(array.read()?),
            NiftiType::Int8 => Voxels::I8(array.read()?),
            NiftiType::Uint16 => Voxels::U16(array.read()?),
            NiftiType::Int16 => Voxels::I16(array.read()?),
            NiftiType::Uint32 => Voxels::U32(array.read()?),
            NiftiType::Int32 => Voxels::I32(array.read()?),
            NiftiType::Uint64 => Voxels::U64(array.read()?),
            NiftiType::Int64 => Voxels::I64(array.read()?),
            NiftiType::Float32 => Voxels::F32(array.read()?),
            NiftiType::Float64 => Voxels::F64(array.read()?),
            t => return Err(NiizarrError::UnsupportedDataType(t)),
        };
        Ok(voxels)
    }

    /// Write every voxel in column-major order (first axis fastest), under
    /// the given byte order.
    pub fn write_to<W: Write>(&self, dst: W, endianness: Endianness) -> Result<()> {
        fn write<T: DataElement, W: Write>(a: &ArrayD<T>, dst: &mut ByteOrdered<W, Endianness>) -> Result<()> {
            for &v in a.t().iter() {
                v.write_to(dst)?;
            }
            Ok(())
        }
        let mut dst = ByteOrdered::runtime(dst, endianness);
        with_voxels!(self, a => write(a, &mut dst))
    }

    /// The element data type.
    pub fn data_type(&self) -> NiftiType {
        fn dt<T: DataElement>(_: &ArrayD<T>) -> NiftiType {
            T::DATA_TYPE
        }
        with_voxels!(self, a => dt(a))
    }

    /// The array shape, in NIfTI order.
    pub fn shape(&self) -> &[usize] {
        with_voxels!(self, a => a.shape())
    }

    /// The number of dimensions.
    pub fn ndim(&self) -> usize {
        self.shape().len()
    }

    /// Insert a singleton axis at the given position.
    pub fn insert_axis(self, axis: usize) -> Self {
        map_voxels!(self, a => a.insert_axis(Axis(axis)))
    }

    /// Reorder the axes, so that new axis `i` is old axis `perm[i]`.
    pub fn permuted_axes(self, perm: &[usize]) -> Self {
        map_voxels!(self, a => a.permuted_axes(IxDyn(perm)))
    }
}

macro_rules! impl_from_array {
    ($t:ty, $v:ident) => {
        impl From<ArrayD<$t>> for Voxels {
            fn from(a: ArrayD<$t>) -> Self {
                Voxels::$v(a)
            }
        }
    };
}

impl_from_array!(u8, U8);
impl_from_array!(i8, I8);
impl_from_array!(u16, U16);
impl_from_array!(i16, I16);
impl_from_array!(u32, U32);
impl_from_array!(i32, I32);
impl_from_array!(u64, U64);
impl_from_array!(i64, I64);
impl_from_array!(f32, F32);
impl_from_array!(f64, F64);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn column_major_layout() {
        let bytes: Vec<u8> = (0..24).collect();
        let voxels = Voxels::from_raw(NiftiType::Uint8, &[2, 3, 4], &bytes, Endianness::Little)
            .unwrap();
        assert_eq!(voxels.shape(), &[2, 3, 4]);
        match voxels {
            Voxels::U8(a) => {
                assert_eq!(a[[1, 0, 0]], 1);
                assert_eq!(a[[0, 1, 0]], 2);
                assert_eq!(a[[0, 0, 1]], 6);
                assert_eq!(a[[1, 2, 3]], 23);
            }
            v => panic!("unexpected variant {:?}", v.data_type()),
        }
    }

    #[test]
    fn widening_and_permutation() {
        let bytes = vec![0u8; 2 * 3 * 4 * 5 * 2];
        let voxels =
            Voxels::from_raw(NiftiType::Int16, &[2, 3, 4, 5], &bytes, Endianness::Big).unwrap();
        let widened = voxels.insert_axis(3);
        assert_eq!(widened.shape(), &[2, 3, 4, 1, 5]);
        let permuted = widened.permuted_axes(&[3, 4, 2, 1, 0]);
        assert_eq!(permuted.shape(), &[1, 5, 4, 3, 2]);
        assert_eq!(permuted.data_type(), NiftiType::Int16);
    }

    #[test]
    fn column_major_output() {
        let bytes = vec![1, 0, 2, 0, 3, 0, 4, 0, 5, 0, 6, 0];
        let voxels = Voxels::from_raw(NiftiType::Uint16, &[3, 2], &bytes, Endianness::Little).unwrap();
        let mut out = Vec::new();
        voxels.write_to(&mut out, Endianness::Little).unwrap();
        assert_eq!(out, bytes);

        // a transposed view is written in its own logical order
        let swapped = voxels.permuted_axes(&[1, 0]);
        let mut out = Vec::new();
        swapped.write_to(&mut out, Endianness::Big).unwrap();
        assert_eq!(out, vec![0, 1, 0, 4, 0, 2, 0, 5, 0, 3, 0, 6]);
    }

    #[test]
    fn rejects_short_or_unsupported() {
        assert!(matches!(
            Voxels::from_raw(NiftiType::Float32, &[4, 4, 4], &[0u8; 100], Endianness::Little),
            Err(NiizarrError::IncompatibleLength(25, 64))
        ));
        assert!(matches!(
            Voxels::from_raw(NiftiType::Rgb24, &[1, 1, 1], &[0u8; 3], Endianness::Little),
            Err(NiizarrError::UnsupportedDataType(NiftiType::Rgb24))
        ));
    }
}
