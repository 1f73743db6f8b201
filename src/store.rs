//! Zarr v2 groups and arrays on the local filesystem, backed by `zarrs`.
//!
//! Arrays are described with v2 metadata: chunk keys use `/` as dimension
//! separator, chunks are stored in Fortran order unless requested
//! otherwise, and compressors use the numcodecs configuration layout, so
//! that stores remain readable by the Python zarr stack.

use crate::codec::Compressor;
use crate::error::{NiizarrError, Result};
use crate::header::RawHeader;
use crate::volume::DataElement;
use log::debug;
use ndarray::{ArrayD, IxDyn};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use zarrs::array::{Array, ArrayMetadataOptions, ArrayMetadataV2};
use zarrs::filesystem::FilesystemStore;
use zarrs::group::Group;
use zarrs::metadata::v2::GroupMetadataV2;
use zarrs::metadata::GroupMetadata;
use zarrs::storage::{StorePrefix, WritableStorageTraits};

/// Name of the array holding the embedded NIfTI header.
pub const NIFTI_ARRAY: &str = "nifti";

const ZGROUP: &str = ".zgroup";
const ZARRAY: &str = ".zarray";

/// Memory layout of the elements within a chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Order {
    /// Row-major.
    #[serde(rename = "C")]
    C,
    /// Column-major.
    #[serde(rename = "F")]
    F,
}

/// Contents of a `.zarray` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayMetadata {
    /// Chunk extents.
    pub chunks: Vec<usize>,
    /// numcodecs compressor configuration, if any.
    #[serde(default)]
    pub compressor: Option<Value>,
    /// Separator of chunk key components.
    #[serde(default = "default_separator")]
    pub dimension_separator: String,
    /// numpy type string.
    pub dtype: Value,
    /// Value of missing chunks.
    pub fill_value: Value,
    /// Filters, unused.
    #[serde(default)]
    pub filters: Option<Vec<Value>>,
    /// Element layout within chunks.
    pub order: Order,
    /// Array extents.
    pub shape: Vec<usize>,
    /// Always 2.
    pub zarr_format: u32,
}

fn default_separator() -> String {
    ".".to_string()
}

/// Everything needed to create an array.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySpec {
    /// Array extents.
    pub shape: Vec<usize>,
    /// Chunk extents, one per axis.
    pub chunks: Vec<usize>,
    /// numpy type string, as produced by `NiftiType::zarr_dtype`.
    pub dtype: Value,
    /// Fill value, `null` for none.
    pub fill_value: Value,
    /// Chunk compressor, `None` to store chunks raw.
    pub compressor: Option<Compressor>,
    /// Element layout within chunks.
    pub order: Order,
}

// `_zarrs` provenance attributes stay out of the stored documents
fn metadata_options() -> ArrayMetadataOptions {
    ArrayMetadataOptions::default()
        .with_include_zarrs_metadata(false)
        .with_convert_aliased_extension_names(false)
}

fn node_path(name: &str) -> Result<String> {
    if name.is_empty() {
        return Err(NiizarrError::EmptyArrayName);
    }
    Ok(format!("/{}", name.trim_start_matches('/')))
}

/// A zarr group at the root of a local directory store.
#[derive(Clone)]
pub struct ZarrGroup {
    path: PathBuf,
    store: Arc<FilesystemStore>,
}

impl fmt::Debug for ZarrGroup {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ZarrGroup").field("path", &self.path).finish()
    }
}

impl PartialEq for ZarrGroup {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl ZarrGroup {
    /// Create a group at the given location.
    ///
    /// With `overwrite`, anything already at the location is removed
    /// first. Otherwise an existing group or array is an error.
    pub fn create<P: AsRef<Path>>(path: P, overwrite: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if path.is_file() {
            if !overwrite {
                return Err(already_exists(&path));
            }
            fs::remove_file(&path)?;
        }
        fs::create_dir_all(&path)?;
        let store = Arc::new(FilesystemStore::new(&path)?);
        if overwrite {
            store.erase_prefix(&StorePrefix::root())?;
        } else if path.join(ZGROUP).exists() || path.join(ZARRAY).exists() {
            return Err(already_exists(&path));
        }

        let metadata: GroupMetadataV2 = serde_json::from_value(json!({ "zarr_format": 2 }))?;
        let group = Group::new_with_metadata(store.clone(), "/", GroupMetadata::V2(metadata))?;
        group.store_metadata()?;
        Ok(ZarrGroup { path, store })
    }

    /// Open an existing group.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let store = Arc::new(FilesystemStore::new(&path)?);
        let _ = Group::open(store.clone(), "/")?;
        Ok(ZarrGroup { path, store })
    }

    /// The group location.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The group attributes.
    pub fn attributes(&self) -> Result<Map<String, Value>> {
        Ok(Group::open(self.store.clone(), "/")?.attributes().clone())
    }

    /// Merge the given attributes into the group attributes.
    pub fn update_attributes(&self, attributes: Map<String, Value>) -> Result<()> {
        let mut group = Group::open(self.store.clone(), "/")?;
        group.attributes_mut().extend(attributes);
        group.store_metadata()?;
        Ok(())
    }

    /// Create an array in this group.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::EmptyArrayName` if `name` is empty
    /// - `NiizarrError::InvalidChunkSize` if the chunk extents do not
    ///   match the array rank or hold a zero
    pub fn create_array(&self, name: &str, spec: ArraySpec) -> Result<ZarrArray> {
        let node = node_path(name)?;
        if spec.chunks.len() != spec.shape.len() || spec.chunks.contains(&0) {
            return Err(NiizarrError::InvalidChunkSize);
        }
        let metadata = ArrayMetadata {
            chunks: spec.chunks,
            compressor: spec.compressor.as_ref().map(Compressor::metadata),
            dimension_separator: "/".to_string(),
            dtype: spec.dtype,
            fill_value: spec.fill_value,
            filters: None,
            order: spec.order,
            shape: spec.shape,
            zarr_format: 2,
        };
        let v2: ArrayMetadataV2 = serde_json::from_value(serde_json::to_value(&metadata)?)?;
        let array = Array::new_with_metadata(
            self.store.clone(),
            &node,
            zarrs::array::ArrayMetadata::V2(v2),
        )?;
        array.store_metadata_opt(&metadata_options())?;
        Ok(ZarrArray {
            node,
            metadata,
            store: self.store.clone(),
            array,
        })
    }

    /// Open an array of this group.
    pub fn array(&self, name: &str) -> Result<ZarrArray> {
        let node = node_path(name)?;
        let array = Array::open(self.store.clone(), &node)?;
        let metadata = match array.metadata() {
            zarrs::array::ArrayMetadata::V2(v2) => serde_json::from_value(serde_json::to_value(v2)?)?,
            _ => {
                return Err(NiizarrError::InvalidArrayMetadata(format!(
                    "{} is not a zarr v2 array",
                    node
                )))
            }
        };
        Ok(ZarrArray {
            node,
            metadata,
            store: self.store.clone(),
            array,
        })
    }
}

fn already_exists(path: &Path) -> NiizarrError {
    NiizarrError::Io(io::Error::new(
        io::ErrorKind::AlreadyExists,
        format!("{} already holds a zarr hierarchy", path.display()),
    ))
}

/// A zarr v2 array of a [`ZarrGroup`].
pub struct ZarrArray {
    node: String,
    metadata: ArrayMetadata,
    store: Arc<FilesystemStore>,
    array: Array<FilesystemStore>,
}

impl fmt::Debug for ZarrArray {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("ZarrArray")
            .field("node", &self.node)
            .field("metadata", &self.metadata)
            .finish()
    }
}

impl ZarrArray {
    /// The array metadata.
    pub fn metadata(&self) -> &ArrayMetadata {
        &self.metadata
    }

    /// The array extents.
    pub fn shape(&self) -> &[usize] {
        &self.metadata.shape
    }

    /// The chunk extents.
    pub fn chunks(&self) -> &[usize] {
        &self.metadata.chunks
    }

    /// The chunk compressor, rebuilt from its numcodecs configuration.
    pub fn compressor(&self) -> Result<Option<Compressor>> {
        self.metadata
            .compressor
            .as_ref()
            .map(Compressor::from_metadata)
            .transpose()
    }

    /// The array attributes.
    pub fn attributes(&self) -> Result<Map<String, Value>> {
        Ok(Array::open(self.store.clone(), &self.node)?.attributes().clone())
    }

    /// Merge the given attributes into the array attributes.
    pub fn update_attributes(&self, attributes: Map<String, Value>) -> Result<()> {
        let mut array = Array::open(self.store.clone(), &self.node)?;
        array.attributes_mut().extend(attributes);
        array.store_metadata_opt(&metadata_options())?;
        Ok(())
    }

    /// Write the whole array. Edge chunks are padded with the fill value.
    ///
    /// # Errors
    ///
    /// `NiizarrError::InvalidArrayMetadata` if the data shape does not
    /// match the array, `NiizarrError::ArrayAccess` if the element type
    /// does not match its data type.
    pub fn write<T: DataElement>(&self, data: &ArrayD<T>) -> Result<()> {
        if data.shape() != self.shape() {
            return Err(NiizarrError::InvalidArrayMetadata(format!(
                "data shape {:?} does not match array shape {:?}",
                data.shape(),
                self.shape()
            )));
        }
        // logical (row-major) order, the chunk order is up to the codecs
        let elements: Vec<T> = data.iter().copied().collect();
        self.array
            .store_array_subset_elements(&self.array.subset_all(), &elements)?;
        debug!(
            "wrote {:?} in chunks of {:?} to {}",
            self.shape(),
            self.chunks(),
            self.node
        );
        Ok(())
    }

    /// Write a one-dimensional byte array.
    pub fn write_bytes(&self, data: &[u8]) -> Result<()> {
        self.write(&ArrayD::from_shape_vec(IxDyn(&[data.len()]), data.to_vec())
            .map_err(|e| NiizarrError::InvalidArrayMetadata(e.to_string()))?)
    }

    /// Read the whole array. Missing chunks are filled with the fill value.
    pub fn read<T: DataElement>(&self) -> Result<ArrayD<T>> {
        let elements = self
            .array
            .retrieve_array_subset_elements::<T>(&self.array.subset_all())?;
        ArrayD::from_shape_vec(IxDyn(self.shape()), elements)
            .map_err(|e| NiizarrError::InvalidArrayMetadata(e.to_string()))
    }

    /// Read a one-dimensional byte array.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        Ok(self.read::<u8>()?.iter().copied().collect())
    }
}

/// Reload the NIfTI header embedded in a nifti-zarr group.
pub fn read_nifti_header(group: &ZarrGroup) -> Result<RawHeader> {
    let blob = group.array(NIFTI_ARRAY)?.read_bytes()?;
    RawHeader::from_bytes(blob)
}
