//! Conversion of nifti-zarr stores back into NIfTI files.
//!
//! The header embedded in the `nifti` array is written back verbatim, along
//! with its extension frames. Extracting a coarser pyramid level rewrites
//! the spatial dimensions, the voxel sizes and both the qform and sform so
//! that they describe the level grid. Output files are always single files
//! (`n+1` or `n+2`), gzip-compressed when the path ends in `.gz`.

use crate::error::{NiizarrError, Result};
use crate::header::{HeaderFields, NiftiVersion, RawHeader};
use crate::layout::AxisLayout;
use crate::ome::{CoordinateTransformation, Dataset, Multiscale};
use crate::store::{read_nifti_header, ZarrGroup, NIFTI_ARRAY};
use crate::typedef::NiftiType;
use crate::util::is_gz_file;
use crate::volume::Voxels;
use byteordered::{ByteOrdered, Endianness};
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Byte offsets of the header fields rewritten on export.
#[derive(Debug, Clone, Copy)]
struct FieldOffsets {
    dim: usize,
    pixdim: usize,
    vox_offset: usize,
    /// `quatern_b`, followed by `quatern_c`, `quatern_d` and the three
    /// `qoffset` values.
    quatern: usize,
    srow: usize,
    magic: usize,
}

const NIFTI1_OFFSETS: FieldOffsets = FieldOffsets {
    dim: 40,
    pixdim: 76,
    vox_offset: 108,
    quatern: 256,
    srow: 280,
    magic: 344,
};

const NIFTI2_OFFSETS: FieldOffsets = FieldOffsets {
    dim: 16,
    pixdim: 104,
    vox_offset: 168,
    quatern: 352,
    srow: 400,
    magic: 4,
};

/// A header under edit, written with the field widths of its version.
struct HeaderPatch {
    bytes: Vec<u8>,
    version: NiftiVersion,
    endianness: Endianness,
    offsets: FieldOffsets,
}

impl HeaderPatch {
    fn new(header: &RawHeader) -> Self {
        let version = header.version();
        HeaderPatch {
            bytes: header.as_bytes().to_vec(),
            version,
            endianness: header.endianness(),
            offsets: match version {
                NiftiVersion::Nifti1 => NIFTI1_OFFSETS,
                NiftiVersion::Nifti2 => NIFTI2_OFFSETS,
            },
        }
    }

    fn float_size(&self) -> usize {
        match self.version {
            NiftiVersion::Nifti1 => 4,
            NiftiVersion::Nifti2 => 8,
        }
    }

    fn sink(&mut self, offset: usize) -> ByteOrdered<&mut [u8], Endianness> {
        ByteOrdered::runtime(&mut self.bytes[offset..], self.endianness)
    }

    fn put_float(&mut self, offset: usize, value: f64) -> Result<()> {
        match self.version {
            NiftiVersion::Nifti1 => self.sink(offset).write_f32(value as f32)?,
            NiftiVersion::Nifti2 => self.sink(offset).write_f64(value)?,
        }
        Ok(())
    }

    fn put_dim(&mut self, axis: usize, value: usize) -> Result<()> {
        let offset = self.offsets.dim;
        match self.version {
            NiftiVersion::Nifti1 => self.sink(offset + axis * 2).write_i16(value as i16)?,
            NiftiVersion::Nifti2 => self.sink(offset + axis * 8).write_i64(value as i64)?,
        }
        Ok(())
    }

    fn put_pixdim(&mut self, axis: usize, value: f64) -> Result<()> {
        let offset = self.offsets.pixdim + axis * self.float_size();
        self.put_float(offset, value)
    }

    fn put_qoffset(&mut self, qoffset: [f64; 3]) -> Result<()> {
        let size = self.float_size();
        let offset = self.offsets.quatern + 3 * size;
        for (i, &v) in qoffset.iter().enumerate() {
            self.put_float(offset + i * size, v)?;
        }
        Ok(())
    }

    fn put_srow(&mut self, srow: [[f64; 4]; 3]) -> Result<()> {
        let size = self.float_size();
        let offset = self.offsets.srow;
        for (r, row) in srow.iter().enumerate() {
            for (c, &v) in row.iter().enumerate() {
                self.put_float(offset + (r * 4 + c) * size, v)?;
            }
        }
        Ok(())
    }

    fn put_vox_offset(&mut self, vox_offset: usize) -> Result<()> {
        let offset = self.offsets.vox_offset;
        match self.version {
            NiftiVersion::Nifti1 => self.sink(offset).write_f32(vox_offset as f32)?,
            NiftiVersion::Nifti2 => self.sink(offset).write_i64(vox_offset as i64)?,
        }
        Ok(())
    }

    /// Mark the header as a single file with its voxels.
    fn put_single_file_magic(&mut self) {
        let magic: &[u8] = match self.version {
            NiftiVersion::Nifti1 => b"n+1\0",
            NiftiVersion::Nifti2 => b"n+2\0\r\n\x1a\n",
        };
        let offset = self.offsets.magic;
        self.bytes[offset..offset + magic.len()].copy_from_slice(magic);
    }
}

/// Spatial scale and translation of a pyramid level, in NIfTI order
/// (x, y, z).
fn spatial_transform(dataset: &Dataset) -> ([f64; 3], [f64; 3]) {
    fn fill(dst: &mut [f64; 3], zyx: &[f64]) {
        let n = zyx.len();
        for (i, v) in dst.iter_mut().enumerate().take(n) {
            *v = zyx[n - 1 - i];
        }
    }
    let mut scale = [1.; 3];
    let mut translation = [0.; 3];
    for t in &dataset.coordinate_transformations {
        match t {
            CoordinateTransformation::Scale { scale: s } => fill(&mut scale, s),
            CoordinateTransformation::Translation { translation: s } => fill(&mut translation, s),
        }
    }
    (scale, translation)
}

/// Rotation part of the qform, from its quaternion.
fn quatern_rotation(quatern: [f64; 3]) -> [[f64; 3]; 3] {
    let [b, c, d] = quatern;
    let a = (1. - (b * b + c * c + d * d)).max(0.).sqrt();
    [
        [a * a + b * b - c * c - d * d, 2. * (b * c - a * d), 2. * (b * d + a * c)],
        [2. * (b * c + a * d), a * a + c * c - b * b - d * d, 2. * (c * d - a * b)],
        [2. * (b * d - a * c), 2. * (c * d + a * b), a * a + d * d - c * c - b * b],
    ]
}

/// The voxel grid of a pyramid level relative to level 0: the voxel size
/// ratio and the position of the first level voxel, in level 0 voxels.
#[derive(Debug, Clone, Copy, PartialEq)]
struct LevelGrid {
    ratio: [f64; 3],
    shift: [f64; 3],
}

impl LevelGrid {
    /// Compare the transformations of two datasets. Axes without a usable
    /// level 0 scale fall back to the ratio of the spatial shapes.
    fn between(base: &Dataset, level: &Dataset, base_shape: &[usize], level_shape: &[usize]) -> Self {
        let (s0, t0) = spatial_transform(base);
        let (s1, t1) = spatial_transform(level);
        let mut grid = LevelGrid {
            ratio: [1.; 3],
            shift: [0.; 3],
        };
        for i in 0..3 {
            if s0[i] != 0. {
                grid.ratio[i] = s1[i] / s0[i];
                grid.shift[i] = (t1[i] - t0[i]) / s0[i];
            } else {
                grid.ratio[i] = base_shape[i] as f64 / level_shape[i] as f64;
                grid.shift[i] = (grid.ratio[i] - 1.) * 0.5;
            }
        }
        grid
    }

    /// Rewrite the spatial fields of a header to describe this grid.
    fn apply(&self, fields: &HeaderFields, shape: &[usize], patch: &mut HeaderPatch) -> Result<()> {
        for (i, &n) in shape.iter().take(3).enumerate() {
            patch.put_dim(i + 1, n)?;
        }
        let spacing = [fields.pixdim[1], fields.pixdim[2], fields.pixdim[3]];
        for i in 0..3 {
            patch.put_pixdim(i + 1, spacing[i] * self.ratio[i])?;
        }

        if fields.qform_code > 0 {
            let rotation = quatern_rotation(fields.quatern);
            let qfac = if fields.pixdim[0] < 0. { -1. } else { 1. };
            let step = [
                spacing[0] * self.shift[0],
                spacing[1] * self.shift[1],
                qfac * spacing[2] * self.shift[2],
            ];
            let mut qoffset = fields.qoffset;
            for (r, row) in rotation.iter().enumerate() {
                qoffset[r] += (0..3).map(|c| row[c] * step[c]).sum::<f64>();
            }
            patch.put_qoffset(qoffset)?;
        }

        if fields.sform_code > 0 {
            let mut srow = fields.srow;
            for (row, old) in srow.iter_mut().zip(&fields.srow) {
                row[3] += (0..3).map(|c| old[c] * self.shift[c]).sum::<f64>();
                for c in 0..3 {
                    row[c] = old[c] * self.ratio[c];
                }
            }
            patch.put_srow(srow)?;
        }
        Ok(())
    }
}

/// Extract pyramid level `level` of the nifti-zarr store at `input` into
/// the NIfTI file at `output`, returning the header written.
///
/// # Errors
///
/// - `NiizarrError::MissingLevel` if the store has no such level
/// - `NiizarrError::InvalidArrayMetadata` without a `multiscales` attribute
/// - `NiizarrError::UnsupportedDataType` for voxel types without a voxel
///   variant
pub fn zarr2nii<P, Q>(input: P, output: Q, level: usize) -> Result<RawHeader>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let group = ZarrGroup::open(input)?;
    let header = read_nifti_header(&group)?;
    let fields = header.fields()?;
    let header_size = header.version().header_size();
    let mut trailer = group.array(NIFTI_ARRAY)?.read_bytes()?.split_off(header_size);
    if trailer.is_empty() {
        trailer = vec![0; 4];
    }

    let multiscale = Multiscale::from_attributes(&group.attributes()?)?
        .into_iter()
        .next()
        .ok_or_else(|| NiizarrError::InvalidArrayMetadata("empty multiscales".to_owned()))?;
    let dataset = multiscale
        .datasets
        .get(level)
        .ok_or(NiizarrError::MissingLevel(level))?;

    let datatype = NiftiType::from_code(i64::from(fields.datatype))?;
    let array = group.array(&dataset.path)?;
    let layout = AxisLayout::for_rank(array.shape().len())?;
    let voxels = Voxels::from_zarr(datatype, &array)?.permuted_axes(&layout.inverse_perm());
    info!("extracting level {} of shape {:?}", level, voxels.shape());

    let mut patch = HeaderPatch::new(&header);
    if level > 0 {
        let base = &multiscale.datasets[0];
        let mut base_shape = group.array(&base.path)?.shape().to_vec();
        base_shape.reverse();
        let grid = LevelGrid::between(base, dataset, &base_shape, voxels.shape());
        debug!("level {} grid: {:?}", level, grid);
        grid.apply(&fields, voxels.shape(), &mut patch)?;
    }

    let needed = header_size + trailer.len();
    let vox_offset = if !fields.is_header_pair() && fields.vox_offset >= needed as f64 {
        fields.vox_offset as usize
    } else {
        (needed + 15) / 16 * 16
    };
    patch.put_vox_offset(vox_offset)?;
    patch.put_single_file_magic();

    let output = output.as_ref();
    let writer = BufWriter::new(File::create(output)?);
    let endianness = header.endianness();
    if is_gz_file(output) {
        let mut e = GzEncoder::new(writer, Compression::default());
        write_file(&mut e, &patch.bytes, &trailer, vox_offset, &voxels, endianness)?;
        let _ = e.finish()?;
    } else {
        let mut writer = writer;
        write_file(&mut writer, &patch.bytes, &trailer, vox_offset, &voxels, endianness)?;
        writer.flush()?;
    }
    RawHeader::from_bytes(patch.bytes)
}

fn write_file<W: Write>(
    dst: &mut W,
    header: &[u8],
    trailer: &[u8],
    vox_offset: usize,
    voxels: &Voxels,
    endianness: Endianness,
) -> Result<()> {
    dst.write_all(header)?;
    dst.write_all(trailer)?;
    let written = header.len() + trailer.len();
    dst.write_all(&vec![0; vox_offset - written])?;
    voxels.write_to(dst, endianness)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn dataset(scale: Vec<f64>, translation: Vec<f64>) -> Dataset {
        Dataset {
            path: "0".to_owned(),
            coordinate_transformations: vec![
                CoordinateTransformation::Scale { scale },
                CoordinateTransformation::Translation { translation },
            ],
        }
    }

    #[test]
    fn field_offsets_match_the_decoder() {
        let mut bytes = vec![0u8; 348];
        bytes[..4].copy_from_slice(&348i32.to_le_bytes());
        bytes[344..348].copy_from_slice(b"ni1\0");
        let header = RawHeader::from_bytes(bytes).unwrap();
        let mut patch = HeaderPatch::new(&header);
        patch.put_dim(2, 17).unwrap();
        patch.put_pixdim(3, 2.5).unwrap();
        patch.put_qoffset([1., 2., 3.]).unwrap();
        patch.put_srow([[1., 0., 0., 4.], [0., 1., 0., 5.], [0., 0., 1., 6.]]).unwrap();
        patch.put_vox_offset(352).unwrap();
        patch.put_single_file_magic();

        let fields = RawHeader::from_bytes(patch.bytes).unwrap().fields().unwrap();
        assert_eq!(fields.dim[2], 17);
        assert_eq!(fields.pixdim[3], 2.5);
        assert_eq!(fields.qoffset, [1., 2., 3.]);
        assert_eq!(fields.srow[1], [0., 1., 0., 5.]);
        assert_eq!(fields.vox_offset, 352.);
        assert!(!fields.is_header_pair());
    }

    #[test]
    fn nifti2_offsets_match_the_decoder() {
        let mut bytes = vec![0u8; 540];
        bytes[..4].copy_from_slice(&540i32.to_be_bytes());
        bytes[4..12].copy_from_slice(b"ni2\0\r\n\x1a\n");
        let header = RawHeader::from_bytes(bytes).unwrap();
        let mut patch = HeaderPatch::new(&header);
        patch.put_dim(3, 9).unwrap();
        patch.put_pixdim(1, 0.75).unwrap();
        patch.put_qoffset([-1., -2., -3.]).unwrap();
        patch.put_srow([[2., 0., 0., 1.], [0., 2., 0., 1.], [0., 0., 2., 1.]]).unwrap();
        patch.put_vox_offset(544).unwrap();
        patch.put_single_file_magic();

        let fields = RawHeader::from_bytes(patch.bytes).unwrap().fields().unwrap();
        assert_eq!(fields.dim[3], 9);
        assert_eq!(fields.pixdim[1], 0.75);
        assert_eq!(fields.qoffset, [-1., -2., -3.]);
        assert_eq!(fields.srow[2], [0., 0., 2., 1.]);
        assert_eq!(fields.vox_offset, 544.);
        assert_eq!(fields.magic_str(), "n+2");
    }

    #[test]
    fn level_grid_from_transforms() {
        // (t, z, y, x) axes, voxel sizes (x, y, z) = (1, 2, 3)
        let base = dataset(vec![1., 3., 2., 1.], vec![0.; 4]);
        let level = dataset(vec![1., 3., 4., 2.], vec![0., 0., 1., 0.5]);
        let grid = LevelGrid::between(&base, &level, &[8, 8, 8], &[4, 4, 8]);
        assert_eq!(grid.ratio, [2., 2., 1.]);
        assert_eq!(grid.shift, [0.5, 0.5, 0.]);

        // zero voxel sizes fall back to the shapes
        let flat = dataset(vec![0.; 3], vec![0.; 3]);
        let grid = LevelGrid::between(&flat, &flat, &[8, 8, 8], &[4, 8, 2]);
        assert_eq!(grid.ratio, [2., 1., 4.]);
        assert_eq!(grid.shift, [0.5, 0., 1.5]);
    }

    #[test]
    fn identity_quaternion() {
        let r = quatern_rotation([0., 0., 0.]);
        for (i, row) in r.iter().enumerate() {
            for (j, &v) in row.iter().enumerate() {
                assert_abs_diff_eq!(v, if i == j { 1. } else { 0. });
            }
        }
        // 180 degrees around z
        let r = quatern_rotation([0., 0., 1.]);
        assert_abs_diff_eq!(r[0][0], -1.);
        assert_abs_diff_eq!(r[1][1], -1.);
        assert_abs_diff_eq!(r[2][2], 1.);
    }
}
