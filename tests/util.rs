//! Synthetic NIfTI objects shared by the integration tests.
#![allow(dead_code)]

use byteordered::{ByteOrdered, Endianness};
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// The header fields the tests care about. Everything else is zero.
#[derive(Debug, Clone, PartialEq)]
pub struct TestHeader {
    pub version: u8,
    pub endianness: Endianness,
    pub dim: Vec<i64>,
    pub datatype: i16,
    pub bitpix: i16,
    pub pixdim: Vec<f64>,
    pub intent_code: i16,
    pub xyzt_units: u8,
    pub scl_slope: f64,
    pub scl_inter: f64,
    pub descrip: &'static str,
    /// `n+1`/`n+2` when true, `ni1`/`ni2` otherwise.
    pub single_file: bool,
}

impl TestHeader {
    /// A NIfTI-1 little endian `uint8` volume with 1mm isotropic voxels.
    pub fn new(dim: &[i64]) -> Self {
        TestHeader {
            version: 1,
            endianness: Endianness::Little,
            dim: dim.to_vec(),
            datatype: 2,
            bitpix: 8,
            pixdim: vec![1.; dim.len()],
            intent_code: 0,
            xyzt_units: 2,
            scl_slope: 1.,
            scl_inter: 0.,
            descrip: "synthetic",
            single_file: true,
        }
    }

    pub fn header_size(&self) -> usize {
        if self.version == 1 {
            348
        } else {
            540
        }
    }

    /// Voxel data offset of a single file without extensions.
    pub fn vox_offset(&self) -> usize {
        self.header_size() + 4
    }

    fn dim8(&self) -> [i64; 8] {
        let mut dim = [1i64; 8];
        dim[0] = self.dim.len() as i64;
        dim[1..=self.dim.len()].copy_from_slice(&self.dim);
        dim
    }

    fn pixdim8(&self) -> [f64; 8] {
        let mut pixdim = [0f64; 8];
        pixdim[0] = 1.;
        pixdim[1..=self.pixdim.len()].copy_from_slice(&self.pixdim);
        pixdim
    }

    fn fixed(text: &str, len: usize) -> Vec<u8> {
        let mut bytes = text.as_bytes().to_vec();
        bytes.resize(len, 0);
        bytes
    }

    /// The header bytes, `vox_offset` pointing at `vox_offset`.
    pub fn to_bytes_with_offset(&self, vox_offset: usize) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.header_size());
        {
            let mut w = ByteOrdered::runtime(&mut bytes, self.endianness);
            if self.version == 1 {
                self.write_nifti1(&mut w, vox_offset);
            } else {
                self.write_nifti2(&mut w, vox_offset);
            }
        }
        assert_eq!(bytes.len(), self.header_size());
        bytes
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.to_bytes_with_offset(self.vox_offset())
    }

    fn write_nifti1<W: Write>(&self, w: &mut ByteOrdered<W, Endianness>, vox_offset: usize) {
        w.write_i32(348).unwrap();
        w.write_all(&[0; 10]).unwrap();
        w.write_all(&[0; 18]).unwrap();
        w.write_i32(16384).unwrap();
        w.write_i16(0).unwrap();
        w.write_u8(b'r').unwrap();
        w.write_u8(0).unwrap();
        for &d in &self.dim8() {
            w.write_i16(d as i16).unwrap();
        }
        for _ in 0..3 {
            w.write_f32(0.).unwrap();
        }
        w.write_i16(self.intent_code).unwrap();
        w.write_i16(self.datatype).unwrap();
        w.write_i16(self.bitpix).unwrap();
        w.write_i16(0).unwrap();
        for &p in &self.pixdim8() {
            w.write_f32(p as f32).unwrap();
        }
        w.write_f32(vox_offset as f32).unwrap();
        w.write_f32(self.scl_slope as f32).unwrap();
        w.write_f32(self.scl_inter as f32).unwrap();
        w.write_i16(0).unwrap();
        w.write_u8(0).unwrap();
        w.write_u8(self.xyzt_units).unwrap();
        for _ in 0..4 {
            w.write_f32(0.).unwrap();
        }
        w.write_i32(255).unwrap();
        w.write_i32(0).unwrap();
        w.write_all(&Self::fixed(self.descrip, 80)).unwrap();
        w.write_all(&[0; 24]).unwrap();
        w.write_i16(0).unwrap();
        w.write_i16(1).unwrap();
        for _ in 0..6 {
            w.write_f32(0.).unwrap();
        }
        for row in &self.srow() {
            for &v in row {
                w.write_f32(v as f32).unwrap();
            }
        }
        w.write_all(&[0; 16]).unwrap();
        w.write_all(if self.single_file { b"n+1\0" } else { b"ni1\0" }).unwrap();
    }

    fn write_nifti2<W: Write>(&self, w: &mut ByteOrdered<W, Endianness>, vox_offset: usize) {
        w.write_i32(540).unwrap();
        w.write_all(if self.single_file { b"n+2\0\r\n\x1a\n" } else { b"ni2\0\r\n\x1a\n" })
            .unwrap();
        w.write_i16(self.datatype).unwrap();
        w.write_i16(self.bitpix).unwrap();
        for &d in &self.dim8() {
            w.write_i64(d).unwrap();
        }
        for _ in 0..3 {
            w.write_f64(0.).unwrap();
        }
        for &p in &self.pixdim8() {
            w.write_f64(p).unwrap();
        }
        w.write_i64(vox_offset as i64).unwrap();
        w.write_f64(self.scl_slope).unwrap();
        w.write_f64(self.scl_inter).unwrap();
        for _ in 0..4 {
            w.write_f64(0.).unwrap();
        }
        w.write_i64(0).unwrap();
        w.write_i64(0).unwrap();
        w.write_all(&Self::fixed(self.descrip, 80)).unwrap();
        w.write_all(&[0; 24]).unwrap();
        w.write_i32(0).unwrap();
        w.write_i32(1).unwrap();
        for _ in 0..6 {
            w.write_f64(0.).unwrap();
        }
        for row in &self.srow() {
            for &v in row {
                w.write_f64(v).unwrap();
            }
        }
        w.write_i32(0).unwrap();
        w.write_i32(i32::from(self.xyzt_units)).unwrap();
        w.write_i32(i32::from(self.intent_code)).unwrap();
        w.write_all(&[0; 16]).unwrap();
        w.write_u8(0).unwrap();
        w.write_all(&[0; 15]).unwrap();
    }

    fn srow(&self) -> [[f64; 4]; 3] {
        let p = self.pixdim8();
        [[p[1], 0., 0., 0.], [0., p[2], 0., 0.], [0., 0., p[3], 0.]]
    }

    /// A complete single file: header, extender, extension frames
    /// (`(code, data)`, data padded to a multiple of 16 bytes minus 8) and
    /// voxel data.
    pub fn to_file_bytes(&self, extensions: &[(i32, Vec<u8>)], voxels: &[u8]) -> Vec<u8> {
        let mut frames = Vec::new();
        {
            let mut w = ByteOrdered::runtime(&mut frames, self.endianness);
            for (code, data) in extensions {
                let esize = (data.len() + 8 + 15) / 16 * 16;
                w.write_i32(esize as i32).unwrap();
                w.write_i32(*code).unwrap();
                w.write_all(data).unwrap();
                w.write_all(&vec![0; esize - 8 - data.len()]).unwrap();
            }
        }
        let vox_offset = self.vox_offset() + frames.len();
        let mut out = self.to_bytes_with_offset(vox_offset);
        out.extend_from_slice(&[u8::from(!extensions.is_empty()), 0, 0, 0]);
        out.extend(frames);
        out.extend_from_slice(voxels);
        out
    }

    /// Write a `.nii` (or `.nii.gz`) file holding the given voxel bytes.
    pub fn write_nii<P: AsRef<Path>>(&self, path: P, voxels: &[u8]) -> PathBuf {
        self.write_nii_with_extensions(path, &[], voxels)
    }

    pub fn write_nii_with_extensions<P: AsRef<Path>>(
        &self,
        path: P,
        extensions: &[(i32, Vec<u8>)],
        voxels: &[u8],
    ) -> PathBuf {
        let path = path.as_ref().to_path_buf();
        let bytes = self.to_file_bytes(extensions, voxels);
        if path.extension().map_or(false, |e| e == "gz") {
            let mut encoder = GzEncoder::new(fs::File::create(&path).unwrap(), Compression::fast());
            encoder.write_all(&bytes).unwrap();
            let _ = encoder.finish().unwrap();
        } else {
            fs::write(&path, bytes).unwrap();
        }
        path
    }
}

/// Encode 16 bit integers in the given byte order.
pub fn i16_bytes(values: &[i16], endianness: Endianness) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 2);
    {
        let mut w = ByteOrdered::runtime(&mut out, endianness);
        for &v in values {
            w.write_i16(v).unwrap();
        }
    }
    out
}

/// Encode single precision floats in the given byte order.
pub fn f32_bytes(values: &[f32], endianness: Endianness) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    {
        let mut w = ByteOrdered::runtime(&mut out, endianness);
        for &v in values {
            w.write_f32(v).unwrap();
        }
    }
    out
}

/// A smooth ramp over a volume in NIfTI (x fastest) order.
pub fn ramp(dim: &[usize]) -> Vec<u8> {
    let n: usize = dim.iter().product();
    (0..n).map(|i| (i % 251) as u8).collect()
}
