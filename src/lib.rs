//! Conversion of NIfTI-1 and NIfTI-2 volumes into nifti-zarr stores: chunked,
//! multi-resolution zarr groups following the OME-Zarr multiscale
//! convention, which embed the original NIfTI header both verbatim and in
//! its decoded JSON form.
//!
//! The main entry point is [`nii2zarr`], configured through
//! [`ConvertOptions`]. [`zarr2nii`] extracts one pyramid level back into a
//! NIfTI file. The building blocks are exposed as well: the header
//! codec ([`RawHeader`], [`nii2json`]), the pyramid builder ([`Pyramid`]),
//! the chunk planner ([`plan_chunks`]) and a zarr v2 directory store
//! ([`ZarrGroup`]).
//!
//! ```no_run
//! use niizarr::{nii2zarr, read_nifti_header, ConvertOptions, ZarrGroup};
//! # use niizarr::Result;
//! # fn run() -> Result<()> {
//! let _ = nii2zarr("labels.nii.gz", "labels.nii.zarr", &ConvertOptions::default())?;
//!
//! let store = ZarrGroup::open("labels.nii.zarr")?;
//! let header = read_nifti_header(&store)?;
//! println!("NIfTI-{} header", header.version().number());
//! # Ok(())
//! # }
//! ```
#![deny(missing_debug_implementations)]
#![warn(missing_docs, unused_extern_crates, trivial_casts, unused_results)]

pub mod chunk;
pub mod codec;
pub mod convert;
pub mod error;
pub mod extension;
pub mod header;
pub mod json;
pub mod layout;
pub mod object;
pub mod ome;
pub mod pyramid;
pub mod store;
pub mod typedef;
mod util;
pub mod volume;
pub mod writer;

pub use byteordered::Endianness;
pub use crate::chunk::{plan_chunks, ChunkSize};
pub use crate::codec::Compressor;
pub use crate::convert::{convert_source, nii2zarr, ConvertOptions, PyramidMethod, SpatialAxis};
pub use crate::error::{NiizarrError, Result};
pub use crate::header::{HeaderFields, NiftiVersion, RawHeader};
pub use crate::json::{nii2json, DecodedHeader};
pub use crate::object::NiftiSource;
pub use crate::ome::Multiscale;
pub use crate::pyramid::Pyramid;
pub use crate::store::{read_nifti_header, ZarrArray, ZarrGroup};
pub use crate::volume::{DataElement, Voxels};
pub use crate::writer::zarr2nii;
