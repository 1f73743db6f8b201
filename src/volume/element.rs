//! This module defines the data element API, which enables the converter
//! to decode voxels from their source bytes, run them through the pyramid,
//! hand them to the zarr codecs and write them back as NIfTI voxels.
use crate::error::Result;
use crate::typedef::NiftiType;
use byteordered::{ByteOrdered, Endianness};
use num_traits::cast::AsPrimitive;
use serde_json::Value;
use std::fmt::Debug;
use std::io::{Read, Write};
use zarrs::array::ElementOwned;

/// Trait type for characterizing a NIfTI data element, implemented for
/// primitive numeric types which are used by the crate to represent voxel
/// values.
pub trait DataElement:
    'static + Sized + Copy + Debug + Default + PartialEq + PartialOrd + AsPrimitive<f64> + ElementOwned
{
    /// The `datatype` mapped to the type T
    const DATA_TYPE: NiftiType;

    /// Convert from a double precision value with `as` cast semantics
    /// (truncation towards zero, saturation at the type bounds).
    fn from_f64(value: f64) -> Self;

    /// Read a single element from the given byte source.
    fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> Result<Self>;

    /// Write a single element to the given byte sink.
    fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> Result<()>;

    /// The zarr v2 JSON form of this element, as used for fill values.
    fn to_json(self) -> Value;

    /// Transform the given byte vector into a vector of data elements,
    /// reading as many whole elements as the buffer holds.
    fn from_raw_vec(bytes: &[u8], endianness: Endianness) -> Result<Vec<Self>> {
        let n = bytes.len() / Self::DATA_TYPE.size_of();
        let mut src = ByteOrdered::runtime(bytes, endianness);
        (0..n).map(|_| Self::read_from(&mut src)).collect()
    }
}

macro_rules! integer_element {
    ($t:ty, $dt:ident, $read:ident, $write:ident) => {
        impl DataElement for $t {
            const DATA_TYPE: NiftiType = NiftiType::$dt;

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> Result<Self> {
                src.$read().map_err(From::from)
            }

            fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> Result<()> {
                dst.$write(self).map_err(From::from)
            }

            fn to_json(self) -> Value {
                Value::from(self)
            }
        }
    };
}

macro_rules! float_element {
    ($t:ty, $dt:ident, $read:ident, $write:ident) => {
        impl DataElement for $t {
            const DATA_TYPE: NiftiType = NiftiType::$dt;

            fn from_f64(value: f64) -> Self {
                value as $t
            }

            fn read_from<R: Read>(src: &mut ByteOrdered<R, Endianness>) -> Result<Self> {
                src.$read().map_err(From::from)
            }

            fn write_to<W: Write>(self, dst: &mut ByteOrdered<W, Endianness>) -> Result<()> {
                dst.$write(self).map_err(From::from)
            }

            fn to_json(self) -> Value {
                if self.is_nan() {
                    Value::from("NaN")
                } else if self == <$t>::INFINITY {
                    Value::from("Infinity")
                } else if self == <$t>::NEG_INFINITY {
                    Value::from("-Infinity")
                } else {
                    Value::from(f64::from(self))
                }
            }
        }
    };
}

integer_element!(u8, Uint8, read_u8, write_u8);
integer_element!(i8, Int8, read_i8, write_i8);
integer_element!(u16, Uint16, read_u16, write_u16);
integer_element!(i16, Int16, read_i16, write_i16);
integer_element!(u32, Uint32, read_u32, write_u32);
integer_element!(i32, Int32, read_i32, write_i32);
integer_element!(u64, Uint64, read_u64, write_u64);
integer_element!(i64, Int64, read_i64, write_i64);
float_element!(f32, Float32, read_f32, write_f32);
float_element!(f64, Float64, read_f64, write_f64);
