//! Conversion of NIfTI objects into nifti-zarr stores.
//!
//! A converted store is a zarr group holding one array per pyramid level
//! (named `"0"`, `"1"`, ...), an uncompressed byte array named `"nifti"`
//! with the original header bytes and their decoded form as attributes,
//! and an OME-Zarr `multiscales` group attribute.
//!
//! # Example
//!
//! ```no_run
//! use niizarr::{nii2zarr, ConvertOptions};
//! # use niizarr::Result;
//! # fn run() -> Result<()> {
//! let options = ConvertOptions {
//!     levels: Some(3),
//!     ..ConvertOptions::default()
//! };
//! let _store = nii2zarr("T1w.nii.gz", "T1w.nii.zarr", &options)?;
//! # Ok(())
//! # }
//! ```

use crate::chunk::{default_levels, plan_chunks, ChunkSize};
use crate::codec::Compressor;
use crate::error::{NiizarrError, Result};
use crate::json::nii2json;
use crate::layout::AxisLayout;
use crate::object::NiftiSource;
use crate::ome::{Multiscale, MULTISCALES_KEY};
use crate::pyramid::{Pyramid, PyramidOptions};
use crate::store::{ArraySpec, Order, ZarrGroup, NIFTI_ARRAY};
use crate::typedef::NiftiType;
use crate::volume::{DataElement, Voxels};
use log::{debug, info};
use ndarray::ArrayD;
use serde_json::{Map, Value};
use std::path::Path;

pub use crate::pyramid::{PyramidMethod, SpatialAxis};

/// Attribute naming the axes of each level array, for xarray.
pub const ARRAY_DIMENSIONS_KEY: &str = "_ARRAY_DIMENSIONS";

/// Conversion parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOptions {
    /// Chunk extents of the spatial axes, in `(x, y, z)` order, possibly
    /// per level.
    pub chunk: ChunkSize,
    /// Chunk extent of the channel axis, 0 for a single chunk.
    pub chunk_channel: usize,
    /// Chunk extent of the time axis, 0 for a single chunk.
    pub chunk_time: usize,
    /// Number of pyramid levels. `None` builds levels until the coarsest
    /// one fits in a single chunk.
    pub levels: Option<usize>,
    /// Pyramid filter.
    pub method: PyramidMethod,
    /// Whether the volume holds labels. `None` infers it from the intent.
    pub label: Option<bool>,
    /// Interpret the 4th axis as channels rather than time.
    pub no_time: bool,
    /// Spatial axis left untouched by the pyramid.
    pub no_pyramid_axis: Option<SpatialAxis>,
    /// Value of missing chunks.
    pub fill_value: Option<f64>,
    /// Compressor name, `blosc` or `zlib`.
    pub compressor: String,
    /// Compressor keyword options.
    pub compressor_options: Map<String, Value>,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            chunk: ChunkSize::default(),
            chunk_channel: 1,
            chunk_time: 1,
            levels: None,
            method: PyramidMethod::default(),
            label: None,
            no_time: false,
            no_pyramid_axis: None,
            fill_value: None,
            compressor: "blosc".to_string(),
            compressor_options: Map::new(),
        }
    }
}

impl ConvertOptions {
    /// Check the configuration and build the chunk compressor.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::UnknownCompressor` or
    ///   `NiizarrError::InvalidCompressorOption` for a bad compressor
    /// - `NiizarrError::InvalidChunkSize` for a malformed chunk size
    /// - `NiizarrError::InvalidLevelCount` if zero levels are requested
    pub fn validate(&self) -> Result<Compressor> {
        let compressor = Compressor::from_name(&self.compressor, &self.compressor_options)?;
        self.chunk.validate()?;
        if let Some(0) = self.levels {
            return Err(NiizarrError::InvalidLevelCount(0));
        }
        Ok(compressor)
    }
}

/// Convert the NIfTI file at `input` into a nifti-zarr store at `output`.
///
/// Any existing content at `output` is replaced. The options are checked
/// before the source is read and before anything is written.
pub fn nii2zarr<P, Q>(input: P, output: Q, options: &ConvertOptions) -> Result<ZarrGroup>
where
    P: AsRef<Path>,
    Q: AsRef<Path>,
{
    let _ = options.validate()?;
    let source = NiftiSource::from_file(input)?;
    let group = ZarrGroup::create(output, true)?;
    convert_source(source, &group, options)?;
    Ok(group)
}

/// Write a NIfTI object into an existing zarr group.
pub fn convert_source(source: NiftiSource, group: &ZarrGroup, options: &ConvertOptions) -> Result<()> {
    let compressor = options.validate()?;

    let endianness = source.endianness();
    let has_extensions = !source.extensions().is_empty();
    let header = nii2json(source.raw_header(), has_extensions)?;
    info!(
        "NIfTI-{} header, {:?} byte order, {} extension(s)",
        source.raw_header().version().number(),
        endianness,
        source.extensions().len()
    );
    let blob = source.header_blob()?;

    let mut voxels = source.into_voxels();
    if options.no_time && voxels.ndim() > 3 {
        voxels = voxels.insert_axis(3);
    }
    let layout = AxisLayout::for_rank(voxels.ndim())?;
    let batch_chunks = layout.batch_chunks(voxels.shape(), options.chunk_time, options.chunk_channel);
    let voxels = voxels.permuted_axes(&layout.perm);

    let label = options.label.unwrap_or_else(|| header.is_label());
    debug!("intent `{}`, label mode: {}", header.intent, label);

    let levels = match options.levels {
        Some(n) => n,
        None => default_levels(&voxels.shape()[layout.nbatch..], &options.chunk)?,
    };
    info!("building {} level(s) from a {:?} volume", levels, voxels.shape());
    let chunks = plan_chunks(&options.chunk, &batch_chunks, &layout, levels)?;

    let plan = LevelPlan {
        dtype: voxels.data_type().zarr_dtype(endianness),
        chunks,
        compressor,
        fill_value: options.fill_value,
        dimension_names: &layout.dimension_names,
        pyramid: PyramidOptions {
            levels,
            method: options.method,
            label,
            keep_axis: options.no_pyramid_axis,
        },
    };
    let shapes = match &voxels {
        Voxels::U8(a) => plan.write(group, a)?,
        Voxels::I8(a) => plan.write(group, a)?,
        Voxels::U16(a) => plan.write(group, a)?,
        Voxels::I16(a) => plan.write(group, a)?,
        Voxels::U32(a) => plan.write(group, a)?,
        Voxels::I32(a) => plan.write(group, a)?,
        Voxels::U64(a) => plan.write(group, a)?,
        Voxels::I64(a) => plan.write(group, a)?,
        Voxels::F32(a) => plan.write(group, a)?,
        Voxels::F64(a) => plan.write(group, a)?,
    };

    let nifti = group.create_array(
        NIFTI_ARRAY,
        ArraySpec {
            shape: vec![blob.len()],
            chunks: vec![blob.len()],
            dtype: NiftiType::Uint8.zarr_dtype(endianness),
            fill_value: Value::Null,
            compressor: None,
            order: Order::C,
        },
    )?;
    nifti.write_bytes(&blob)?;
    nifti.update_attributes(header.to_json()?)?;
    debug!("embedded a {} byte header", blob.len());

    let multiscale = Multiscale::from_nifti(&header, layout.nbatch, &layout.axes, &shapes);
    let mut attributes = Map::new();
    let _ = attributes.insert(MULTISCALES_KEY.to_string(), multiscale.to_attribute()?);
    group.update_attributes(attributes)
}

/// Storage parameters shared by every level.
struct LevelPlan<'a> {
    dtype: Value,
    chunks: Vec<Vec<usize>>,
    compressor: Compressor,
    fill_value: Option<f64>,
    dimension_names: &'a [&'static str],
    pyramid: PyramidOptions,
}

impl LevelPlan<'_> {
    /// Build the pyramid of `volume` (in array axis order) and write each
    /// level as it is produced. Returns the level shapes.
    fn write<T: DataElement>(&self, group: &ZarrGroup, volume: &ArrayD<T>) -> Result<Vec<Vec<usize>>> {
        let fill_value = match self.fill_value {
            Some(v) => T::from_f64(v).to_json(),
            None => Value::Null,
        };
        let dimension_names: Vec<Value> = self
            .dimension_names
            .iter()
            .map(|&name| Value::from(name))
            .collect();

        let mut shapes = Vec::with_capacity(self.chunks.len());
        let pyramid = Pyramid::new(volume.view(), &self.pyramid)?;
        for (n, (level, chunks)) in pyramid.zip(&self.chunks).enumerate() {
            let array = group.create_array(
                &n.to_string(),
                ArraySpec {
                    shape: level.shape().to_vec(),
                    chunks: chunks.clone(),
                    dtype: self.dtype.clone(),
                    fill_value: fill_value.clone(),
                    compressor: Some(self.compressor.clone()),
                    order: Order::F,
                },
            )?;
            array.write(&level)?;
            let mut attributes = Map::new();
            let _ = attributes.insert(
                ARRAY_DIMENSIONS_KEY.to_string(),
                Value::Array(dimension_names.clone()),
            );
            array.update_attributes(attributes)?;
            debug!("level {}: shape {:?}, chunks {:?}", n, level.shape(), chunks);
            shapes.push(level.shape().to_vec());
        }
        if shapes.len() < self.chunks.len() {
            info!(
                "pyramid stopped after {} of {} level(s)",
                shapes.len(),
                self.chunks.len()
            );
        }
        Ok(shapes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_options() {
        let o = ConvertOptions::default();
        assert_eq!(o.chunk, ChunkSize::Uniform(64));
        assert_eq!((o.chunk_channel, o.chunk_time), (1, 1));
        assert_eq!(o.method, PyramidMethod::Gaussian);
        assert_eq!(o.validate().unwrap(), Compressor::default());
    }

    #[test]
    fn configuration_errors() {
        let o = ConvertOptions {
            compressor: "lzma".to_string(),
            ..ConvertOptions::default()
        };
        assert!(matches!(o.validate(), Err(NiizarrError::UnknownCompressor(_))));

        let o = ConvertOptions {
            levels: Some(0),
            ..ConvertOptions::default()
        };
        assert!(matches!(o.validate(), Err(NiizarrError::InvalidLevelCount(0))));

        let o = ConvertOptions {
            chunk: ChunkSize::PerAxis(vec![]),
            ..ConvertOptions::default()
        };
        assert!(matches!(o.validate(), Err(NiizarrError::InvalidChunkSize)));

        let mut compressor_options = Map::new();
        let _ = compressor_options.insert("level".to_string(), json!(3));
        let o = ConvertOptions {
            compressor_options,
            ..ConvertOptions::default()
        };
        assert!(matches!(o.validate(), Err(NiizarrError::InvalidCompressorOption(_))));
    }
}
