//! This module defines the `RawHeader` type, which holds the exact bytes of
//! a NIfTI-1 or NIfTI-2 header, and the field-level decoding of those bytes.
//!
//! The two header layouts are incompatible: NIfTI-1 headers are 348 bytes
//! long with 16 bit dimensions and single precision floats, while NIfTI-2
//! headers are 540 bytes long with 64 bit dimensions and double precision
//! floats. Both are decoded into the same [`HeaderFields`] record, widening
//! every value, so that the rest of the crate never needs to care about the
//! version it is working with.
//!
//! The raw bytes are never rewritten. Decoding under the opposite byte
//! order is a separate, non-mutating operation ([`RawHeader::decode_as`]).
//!
//! [`HeaderFields`]: ./struct.HeaderFields.html
//! [`RawHeader::decode_as`]: ./struct.RawHeader.html#method.decode_as

use crate::error::{NiizarrError, Result};
use crate::typedef::Unit;
use byteordered::{ByteOrdered, Endian, Endianness};
use std::io::Read;

/// Header size of NIfTI-1 files, in bytes.
pub const NIFTI1_HEADER_SIZE: usize = 348;
/// Header size of NIfTI-2 files, in bytes.
pub const NIFTI2_HEADER_SIZE: usize = 540;

/// Magic code for NIFTI-1 header files (extention ".hdr[.gz]").
pub const MAGIC_CODE_NI1: &[u8; 4] = b"ni1\0";
/// Magic code for full NIFTI-1 files (extention ".nii[.gz]").
pub const MAGIC_CODE_NIP1: &[u8; 4] = b"n+1\0";
/// Magic code for NIFTI-2 header files (extention ".hdr[.gz]").
pub const MAGIC_CODE_NI2: &[u8; 8] = b"ni2\0\r\n\x1a\n";
/// Magic code for full NIFTI-2 files (extention ".nii[.gz]").
pub const MAGIC_CODE_NIP2: &[u8; 8] = b"n+2\0\r\n\x1a\n";

/// The two known header layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NiftiVersion {
    /// 348-byte layout.
    Nifti1,
    /// 540-byte layout.
    Nifti2,
}

impl NiftiVersion {
    /// Select the layout from the declared `sizeof_hdr`: 348 is NIfTI-1,
    /// anything else is taken as NIfTI-2.
    pub fn from_sizeof_hdr(sizeof_hdr: i32) -> Self {
        if sizeof_hdr as usize == NIFTI1_HEADER_SIZE {
            NiftiVersion::Nifti1
        } else {
            NiftiVersion::Nifti2
        }
    }

    /// Header size in bytes for this version.
    pub fn header_size(self) -> usize {
        match self {
            NiftiVersion::Nifti1 => NIFTI1_HEADER_SIZE,
            NiftiVersion::Nifti2 => NIFTI2_HEADER_SIZE,
        }
    }

    /// The major version number (1 or 2).
    pub fn number(self) -> u8 {
        match self {
            NiftiVersion::Nifti1 => 1,
            NiftiVersion::Nifti2 => 2,
        }
    }
}

/// The bit-packed `dim_info` field, split into its three axis selectors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DimInfo {
    /// Frequency encoding axis (1-based, 0 when unknown).
    pub freq: u8,
    /// Phase encoding axis (1-based, 0 when unknown).
    pub phase: u8,
    /// Slice acquisition axis (1-based, 0 when unknown).
    pub slice: u8,
}

impl DimInfo {
    /// Split the raw `dim_info` byte.
    pub fn from_bits(dim_info: u8) -> Self {
        DimInfo {
            freq: dim_info & 0x03,
            phase: (dim_info >> 2) & 0x03,
            slice: (dim_info >> 4) & 0x03,
        }
    }
}

/// The bit-packed `xyzt_units` field, split into its spatial and temporal
/// units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct XyztUnits {
    /// Unit of `pixdim[1..4]`.
    pub space: Unit,
    /// Unit of `pixdim[4]`.
    pub time: Unit,
}

impl XyztUnits {
    /// Split and validate the raw `xyzt_units` code.
    pub fn from_bits(xyzt_units: i32) -> Result<Self> {
        let space = (xyzt_units & 0x07) as u8;
        let time = (xyzt_units & 0x38) as u8;
        Ok(XyztUnits {
            space: Unit::from_code(space)?,
            time: Unit::from_code(time)?,
        })
    }
}

/// Header fields which only exist in the NIfTI-1 layout, inherited from
/// ANALYZE 7.5.
#[derive(Debug, Clone, PartialEq)]
pub struct LegacyFields {
    /// Unused in NIFTI-1
    pub data_type: [u8; 10],
    /// Unused in NIFTI-1
    pub db_name: [u8; 18],
    /// Unused in NIFTI-1
    pub extents: i32,
    /// Unused in NIFTI-1
    pub session_error: i16,
    /// Unused in NIFTI-1
    pub regular: u8,
    /// Unused in NIFTI-1
    pub glmax: i32,
    /// Unused in NIFTI-1
    pub glmin: i32,
}

/// Every field of a NIfTI header, widened to a layout shared by both
/// versions. Field names follow `nifti1.h` / `nifti2.h`.
#[derive(Debug, Clone, PartialEq)]
pub struct HeaderFields {
    /// Header size, 348 or 540
    pub sizeof_hdr: i32,
    /// MRI slice ordering
    pub dim_info: u8,
    /// Data array dimensions
    pub dim: [i64; 8],
    /// Intent parameters
    pub intent_p: [f64; 3],
    /// NIFTI_INTENT_* code
    pub intent_code: i32,
    /// Defines the data type!
    pub datatype: i16,
    /// Number of bits per voxel
    pub bitpix: i16,
    /// First slice index
    pub slice_start: i64,
    /// Grid spacings
    pub pixdim: [f64; 8],
    /// Offset into .nii file to reach the volume
    pub vox_offset: f64,
    /// Data scaling: slope
    pub scl_slope: f64,
    /// Data scaling: offset
    pub scl_inter: f64,
    /// Last slice index
    pub slice_end: i64,
    /// Slice timing order
    pub slice_code: i32,
    /// Units of pixdim[1..4]
    pub xyzt_units: i32,
    /// Max display intensity
    pub cal_max: f64,
    /// Min display intensity
    pub cal_min: f64,
    /// Time for 1 slice
    pub slice_duration: f64,
    /// Time axis shift
    pub toffset: f64,
    /// Any text you like
    pub descrip: [u8; 80],
    /// Auxiliary filename
    pub aux_file: [u8; 24],
    /// NIFTI_XFORM_* code
    pub qform_code: i32,
    /// NIFTI_XFORM_* code
    pub sform_code: i32,
    /// Quaternion b, c, d params
    pub quatern: [f64; 3],
    /// Quaternion x, y, z shift
    pub qoffset: [f64; 3],
    /// Affine transform rows (srow_x, srow_y, srow_z)
    pub srow: [[f64; 4]; 3],
    /// 'name' or meaning of data
    pub intent_name: [u8; 16],
    /// Magic code, zero padded to 8 bytes for NIfTI-1
    pub magic: [u8; 8],
    /// ANALYZE leftovers, only present in NIfTI-1 headers
    pub legacy: Option<LegacyFields>,
}

impl HeaderFields {
    /// The effective number of dimensions (`dim[0]`, clamped to 7).
    pub fn ndim(&self) -> usize {
        self.dim[0].max(0).min(7) as usize
    }

    /// The effective shape (`dim[1..=ndim]`).
    pub fn shape(&self) -> &[i64] {
        &self.dim[1..=self.ndim()]
    }

    /// The effective voxel sizes (`pixdim[1..=ndim]`).
    pub fn voxel_size(&self) -> &[f64] {
        &self.pixdim[1..=self.ndim()]
    }

    /// The `dim_info` field, split.
    pub fn dim_info(&self) -> DimInfo {
        DimInfo::from_bits(self.dim_info)
    }

    /// The `xyzt_units` field, split and validated.
    pub fn xyzt_units(&self) -> Result<XyztUnits> {
        XyztUnits::from_bits(self.xyzt_units)
    }

    /// The magic code without padding and NUL bytes (e.g. `n+1`).
    pub fn magic_str(&self) -> String {
        let end = self.magic.iter().position(|&b| b == 0).unwrap_or(self.magic.len());
        String::from_utf8_lossy(&self.magic[..end]).into_owned()
    }

    /// Whether the magic code announces a separate volume file (`ni1`/`ni2`).
    pub fn is_header_pair(&self) -> bool {
        self.magic[1] == b'i'
    }
}

/// An immutable NIfTI header in binary form, along with the layout and byte
/// order detected from its `sizeof_hdr` field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    bytes: Vec<u8>,
    version: NiftiVersion,
    endianness: Endianness,
}

impl RawHeader {
    /// Take a header buffer, detecting its version and byte order.
    ///
    /// Bytes past the header size (such as the extension flag) are
    /// dropped.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::InvalidHeaderSize` if `sizeof_hdr` is neither 348
    ///   nor 540 in either byte order
    /// - `NiizarrError::TruncatedHeader` if the buffer is shorter than
    ///   the declared layout
    /// - `NiizarrError::InvalidMagic` if the magic code is not a NIfTI one
    pub fn from_bytes<B>(bytes: B) -> Result<Self>
    where
        B: Into<Vec<u8>>,
    {
        let mut bytes = bytes.into();
        if bytes.len() < 4 {
            return Err(NiizarrError::TruncatedHeader(bytes.len()));
        }
        let (version, endianness) = detect_layout([bytes[0], bytes[1], bytes[2], bytes[3]])?;
        let size = version.header_size();
        if bytes.len() < size {
            return Err(NiizarrError::TruncatedHeader(bytes.len()));
        }
        bytes.truncate(size);
        let header = RawHeader {
            bytes,
            version,
            endianness,
        };
        header.validate_magic()?;
        Ok(header)
    }

    /// Read a header from the given byte stream, which must be positioned
    /// at the start of the header. Only the header itself is consumed.
    pub fn from_reader<R>(mut input: R) -> Result<Self>
    where
        R: Read,
    {
        let mut sizeof_hdr = [0u8; 4];
        input.read_exact(&mut sizeof_hdr)?;
        let (version, _) = detect_layout(sizeof_hdr)?;
        let mut bytes = vec![0u8; version.header_size()];
        bytes[..4].copy_from_slice(&sizeof_hdr);
        input.read_exact(&mut bytes[4..])?;
        Self::from_bytes(bytes)
    }

    /// The exact header bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Take the header bytes, consuming the header.
    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    /// The header layout.
    pub fn version(&self) -> NiftiVersion {
        self.version
    }

    /// The byte order the header (and its volume) was written in.
    pub fn endianness(&self) -> Endianness {
        self.endianness
    }

    /// Whether the header byte order differs from this system's.
    pub fn is_byte_swapped(&self) -> bool {
        self.endianness != Endianness::native()
    }

    /// Decode every field under the detected byte order.
    pub fn fields(&self) -> Result<HeaderFields> {
        self.decode_as(self.endianness)
    }

    /// Decode every field as if the header had been written in the given
    /// byte order. The underlying bytes are left untouched, so decoding
    /// under `self.endianness().to_opposite()` yields the byte-swapped
    /// reading of the same buffer.
    pub fn decode_as(&self, endianness: Endianness) -> Result<HeaderFields> {
        let src = ByteOrdered::runtime(self.bytes.as_slice(), endianness);
        let fields = match self.version {
            NiftiVersion::Nifti1 => decode_nifti1(src)?,
            NiftiVersion::Nifti2 => decode_nifti2(src)?,
        };
        Ok(fields)
    }

    fn validate_magic(&self) -> Result<()> {
        let ok = match self.version {
            NiftiVersion::Nifti1 => {
                let magic = &self.bytes[344..348];
                magic == MAGIC_CODE_NI1 || magic == MAGIC_CODE_NIP1
            }
            NiftiVersion::Nifti2 => {
                let magic = &self.bytes[4..12];
                magic == MAGIC_CODE_NI2 || magic == MAGIC_CODE_NIP2
            }
        };
        if ok {
            Ok(())
        } else {
            Err(NiizarrError::InvalidMagic)
        }
    }
}

/// Figure out the layout and byte order from the first four bytes.
fn detect_layout(sizeof_hdr: [u8; 4]) -> Result<(NiftiVersion, Endianness)> {
    let le = i32::from_le_bytes(sizeof_hdr);
    let be = i32::from_be_bytes(sizeof_hdr);
    let known = |size: i32| size as usize == NIFTI1_HEADER_SIZE || size as usize == NIFTI2_HEADER_SIZE;
    if known(le) {
        Ok((NiftiVersion::from_sizeof_hdr(le), Endianness::Little))
    } else if known(be) {
        Ok((NiftiVersion::from_sizeof_hdr(be), Endianness::Big))
    } else {
        Err(NiizarrError::InvalidHeaderSize(le))
    }
}

fn decode_nifti1<R, E>(mut input: ByteOrdered<R, E>) -> Result<HeaderFields>
where
    R: Read,
    E: Endian,
{
    let sizeof_hdr = input.read_i32()?;
    let mut data_type = [0u8; 10];
    input.read_exact(&mut data_type)?;
    let mut db_name = [0u8; 18];
    input.read_exact(&mut db_name)?;
    let extents = input.read_i32()?;
    let session_error = input.read_i16()?;
    let regular = input.read_u8()?;
    let dim_info = input.read_u8()?;
    let mut dim = [0i64; 8];
    for v in &mut dim {
        *v = i64::from(input.read_i16()?);
    }
    let mut intent_p = [0f64; 3];
    for v in &mut intent_p {
        *v = f64::from(input.read_f32()?);
    }
    let intent_code = i32::from(input.read_i16()?);
    let datatype = input.read_i16()?;
    let bitpix = input.read_i16()?;
    let slice_start = i64::from(input.read_i16()?);
    let mut pixdim = [0f64; 8];
    for v in &mut pixdim {
        *v = f64::from(input.read_f32()?);
    }
    let vox_offset = f64::from(input.read_f32()?);
    let scl_slope = f64::from(input.read_f32()?);
    let scl_inter = f64::from(input.read_f32()?);
    let slice_end = i64::from(input.read_i16()?);
    let slice_code = i32::from(input.read_u8()?);
    let xyzt_units = i32::from(input.read_u8()?);
    let cal_max = f64::from(input.read_f32()?);
    let cal_min = f64::from(input.read_f32()?);
    let slice_duration = f64::from(input.read_f32()?);
    let toffset = f64::from(input.read_f32()?);
    let glmax = input.read_i32()?;
    let glmin = input.read_i32()?;
    let mut descrip = [0u8; 80];
    input.read_exact(&mut descrip)?;
    let mut aux_file = [0u8; 24];
    input.read_exact(&mut aux_file)?;
    let qform_code = i32::from(input.read_i16()?);
    let sform_code = i32::from(input.read_i16()?);
    let mut quatern = [0f64; 3];
    for v in &mut quatern {
        *v = f64::from(input.read_f32()?);
    }
    let mut qoffset = [0f64; 3];
    for v in &mut qoffset {
        *v = f64::from(input.read_f32()?);
    }
    let mut srow = [[0f64; 4]; 3];
    for row in &mut srow {
        for v in row.iter_mut() {
            *v = f64::from(input.read_f32()?);
        }
    }
    let mut intent_name = [0u8; 16];
    input.read_exact(&mut intent_name)?;
    let mut magic = [0u8; 8];
    input.read_exact(&mut magic[..4])?;

    Ok(HeaderFields {
        sizeof_hdr,
        dim_info,
        dim,
        intent_p,
        intent_code,
        datatype,
        bitpix,
        slice_start,
        pixdim,
        vox_offset,
        scl_slope,
        scl_inter,
        slice_end,
        slice_code,
        xyzt_units,
        cal_max,
        cal_min,
        slice_duration,
        toffset,
        descrip,
        aux_file,
        qform_code,
        sform_code,
        quatern,
        qoffset,
        srow,
        intent_name,
        magic,
        legacy: Some(LegacyFields {
            data_type,
            db_name,
            extents,
            session_error,
            regular,
            glmax,
            glmin,
        }),
    })
}

fn decode_nifti2<R, E>(mut input: ByteOrdered<R, E>) -> Result<HeaderFields>
where
    R: Read,
    E: Endian,
{
    let sizeof_hdr = input.read_i32()?;
    let mut magic = [0u8; 8];
    input.read_exact(&mut magic)?;
    let datatype = input.read_i16()?;
    let bitpix = input.read_i16()?;
    let mut dim = [0i64; 8];
    for v in &mut dim {
        *v = input.read_i64()?;
    }
    let mut intent_p = [0f64; 3];
    for v in &mut intent_p {
        *v = input.read_f64()?;
    }
    let mut pixdim = [0f64; 8];
    for v in &mut pixdim {
        *v = input.read_f64()?;
    }
    // stored as an integer in NIfTI-2
    let vox_offset = input.read_i64()? as f64;
    let scl_slope = input.read_f64()?;
    let scl_inter = input.read_f64()?;
    let cal_max = input.read_f64()?;
    let cal_min = input.read_f64()?;
    let slice_duration = input.read_f64()?;
    let toffset = input.read_f64()?;
    let slice_start = input.read_i64()?;
    let slice_end = input.read_i64()?;
    let mut descrip = [0u8; 80];
    input.read_exact(&mut descrip)?;
    let mut aux_file = [0u8; 24];
    input.read_exact(&mut aux_file)?;
    let qform_code = input.read_i32()?;
    let sform_code = input.read_i32()?;
    let mut quatern = [0f64; 3];
    for v in &mut quatern {
        *v = input.read_f64()?;
    }
    let mut qoffset = [0f64; 3];
    for v in &mut qoffset {
        *v = input.read_f64()?;
    }
    let mut srow = [[0f64; 4]; 3];
    for row in &mut srow {
        for v in row.iter_mut() {
            *v = input.read_f64()?;
        }
    }
    let slice_code = input.read_i32()?;
    let xyzt_units = input.read_i32()?;
    let intent_code = input.read_i32()?;
    let mut intent_name = [0u8; 16];
    input.read_exact(&mut intent_name)?;
    let dim_info = input.read_u8()?;
    // 15 unused bytes follow

    Ok(HeaderFields {
        sizeof_hdr,
        dim_info,
        dim,
        intent_p,
        intent_code,
        datatype,
        bitpix,
        slice_start,
        pixdim,
        vox_offset,
        scl_slope,
        scl_inter,
        slice_end,
        slice_code,
        xyzt_units,
        cal_max,
        cal_min,
        slice_duration,
        toffset,
        descrip,
        aux_file,
        qform_code,
        sform_code,
        quatern,
        qoffset,
        srow,
        intent_name,
        magic,
        legacy: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_nifti1(endianness: Endianness) -> Vec<u8> {
        let mut bytes = vec![0u8; NIFTI1_HEADER_SIZE];
        let put_i16 = |bytes: &mut Vec<u8>, offset: usize, v: i16| {
            let b = match endianness {
                Endianness::Little => v.to_le_bytes(),
                Endianness::Big => v.to_be_bytes(),
            };
            bytes[offset..offset + 2].copy_from_slice(&b);
        };
        let size = match endianness {
            Endianness::Little => 348i32.to_le_bytes(),
            Endianness::Big => 348i32.to_be_bytes(),
        };
        bytes[0..4].copy_from_slice(&size);
        put_i16(&mut bytes, 40, 3);
        put_i16(&mut bytes, 42, 64);
        put_i16(&mut bytes, 44, 64);
        put_i16(&mut bytes, 46, 10);
        put_i16(&mut bytes, 70, 2);
        put_i16(&mut bytes, 72, 8);
        bytes[39] = 0b0011_1001;
        bytes[123] = 10;
        bytes[344..348].copy_from_slice(MAGIC_CODE_NIP1);
        bytes
    }

    #[test]
    fn detects_version_and_byte_order() {
        let le = RawHeader::from_bytes(minimal_nifti1(Endianness::Little)).unwrap();
        assert_eq!(le.version(), NiftiVersion::Nifti1);
        assert_eq!(le.endianness(), Endianness::Little);

        let be = RawHeader::from_bytes(minimal_nifti1(Endianness::Big)).unwrap();
        assert_eq!(be.endianness(), Endianness::Big);
        assert_eq!(le.fields().unwrap(), be.fields().unwrap());
    }

    #[test]
    fn reinterpret_does_not_touch_bytes() {
        let header = RawHeader::from_bytes(minimal_nifti1(Endianness::Little)).unwrap();
        let before = header.as_bytes().to_vec();
        let swapped = header.decode_as(Endianness::Big).unwrap();
        assert_eq!(header.as_bytes(), before.as_slice());
        assert_eq!(swapped.sizeof_hdr, 348i32.swap_bytes());
        assert_eq!(swapped.dim[1], i64::from(64i16.swap_bytes()));
        assert_eq!(header.fields().unwrap().dim[1], 64);
    }

    #[test]
    fn trailing_bytes_are_dropped() {
        let mut bytes = minimal_nifti1(Endianness::Little);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        let header = RawHeader::from_bytes(bytes).unwrap();
        assert_eq!(header.as_bytes().len(), NIFTI1_HEADER_SIZE);
    }

    #[test]
    fn rejects_malformed_buffers() {
        assert!(matches!(
            RawHeader::from_bytes(vec![0u8; 348]),
            Err(NiizarrError::InvalidHeaderSize(0))
        ));
        let bytes = minimal_nifti1(Endianness::Little);
        assert!(matches!(
            RawHeader::from_bytes(&bytes[..200]),
            Err(NiizarrError::TruncatedHeader(200))
        ));
        let mut bad_magic = bytes;
        bad_magic[344] = b'x';
        assert!(matches!(
            RawHeader::from_bytes(bad_magic),
            Err(NiizarrError::InvalidMagic)
        ));
    }

    #[test]
    fn bit_fields() {
        let header = RawHeader::from_bytes(minimal_nifti1(Endianness::Little)).unwrap();
        let fields = header.fields().unwrap();
        assert_eq!(
            fields.dim_info(),
            DimInfo {
                freq: 1,
                phase: 2,
                slice: 3
            }
        );
        let units = fields.xyzt_units().unwrap();
        assert_eq!(units.space, Unit::Mm);
        assert_eq!(units.time, Unit::Sec);
        assert_eq!(fields.shape(), &[64, 64, 10]);
        assert_eq!(fields.magic_str(), "n+1");
        assert!(!fields.is_header_pair());
    }
}
