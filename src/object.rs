//! Module for retrieving complete NIfTI objects (header, extensions and
//! voxel data) from single files, header/volume file pairs or byte
//! streams.
//!
//! This is the only place where NIfTI files are read. Voxel values are
//! kept exactly as stored: the scaling slope and intercept remain in the
//! header and are never applied.

use crate::error::{NiizarrError, Result};
use crate::extension::{Extender, ExtensionSequence};
use crate::header::{HeaderFields, RawHeader};
use crate::typedef::NiftiType;
use crate::util::{into_img_file_gz, is_gz_file};
use crate::volume::Voxels;
use byteordered::{ByteOrdered, Endianness};
use flate2::bufread::GzDecoder;
use log::debug;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

/// A NIfTI object fully loaded in memory, along with the exact header bytes
/// it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiSource {
    header: RawHeader,
    fields: HeaderFields,
    extensions: ExtensionSequence,
    voxels: Voxels,
}

impl NiftiSource {
    /// Retrieve the full contents of a NIfTI object.
    /// The given file system path is used as reference.
    /// If the file only contains the header, this method will
    /// look for the corresponding file with the extension ".img.gz",
    /// or ".img" if the former wasn't found.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = BufReader::new(File::open(&path)?);
        if is_gz_file(&path) {
            Self::from_file_2(path, GzDecoder::new(file))
        } else {
            Self::from_file_2(path, file)
        }
    }

    fn from_file_2<P, S>(path: P, mut stream: S) -> Result<Self>
    where
        P: AsRef<Path>,
        S: Read,
    {
        let header = RawHeader::from_reader(&mut stream)?;
        let fields = header.fields()?;
        if !fields.is_header_pair() {
            return Self::from_stream_body(header, fields, stream);
        }

        let extensions = read_trailing_extensions(&header, stream)?;

        let mut img_path = into_img_file_gz(path.as_ref().to_path_buf());
        let voxels = match read_volume_file(&img_path, &header, &fields) {
            Err(NiizarrError::Io(ref e)) if e.kind() == io::ErrorKind::NotFound => {
                // try .img file instead (remove .gz extension)
                let _ = img_path.set_extension("");
                read_volume_file(&img_path, &header, &fields)
            }
            r => r,
        }
        .map_err(|e| match e {
            NiizarrError::Io(io_e) => NiizarrError::MissingVolumeFile(io_e),
            e => e,
        })?;

        Ok(NiftiSource {
            header,
            fields,
            extensions,
            voxels,
        })
    }

    /// Retrieve a NIfTI object as separate header and volume files.
    /// This method is useful when file names are not conventional for a
    /// NIfTI file pair.
    pub fn from_file_pair<P, Q>(hdr_path: P, vol_path: Q) -> Result<Self>
    where
        P: AsRef<Path>,
        Q: AsRef<Path>,
    {
        let file = BufReader::new(File::open(&hdr_path)?);
        if is_gz_file(&hdr_path) {
            Self::from_file_pair_2(GzDecoder::new(file), vol_path)
        } else {
            Self::from_file_pair_2(file, vol_path)
        }
    }

    fn from_file_pair_2<S, Q>(mut hdr_stream: S, vol_path: Q) -> Result<Self>
    where
        S: Read,
        Q: AsRef<Path>,
    {
        let header = RawHeader::from_reader(&mut hdr_stream)?;
        let fields = header.fields()?;
        let extensions = read_trailing_extensions(&header, hdr_stream)?;
        let voxels = read_volume_file(vol_path, &header, &fields).map_err(|e| match e {
            NiizarrError::Io(io_e) => NiizarrError::MissingVolumeFile(io_e),
            e => e,
        })?;
        Ok(NiftiSource {
            header,
            fields,
            extensions,
            voxels,
        })
    }

    /// Retrieve a NIfTI object from a stream of data, holding the header,
    /// the extensions and the volume in sequence.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::NoVolumeData` if the source only contains (or claims to contain)
    /// a header.
    pub fn from_reader<R: Read>(mut source: R) -> Result<Self> {
        let header = RawHeader::from_reader(&mut source)?;
        let fields = header.fields()?;
        if fields.is_header_pair() {
            return Err(NiizarrError::NoVolumeData);
        }
        Self::from_stream_body(header, fields, source)
    }

    fn from_stream_body<R: Read>(header: RawHeader, fields: HeaderFields, mut source: R) -> Result<Self> {
        let endianness = header.endianness();
        let header_size = header.version().header_size();
        let vox_offset = vox_offset(&fields)?;

        let extender = Extender::from_reader_optional(&mut source)?.unwrap_or_default();
        let len = vox_offset.saturating_sub(header_size + 4);
        let extensions =
            ExtensionSequence::from_reader(extender, ByteOrdered::runtime(&mut source, endianness), len)?;

        let consumed = header_size + 4 + extensions.iter().map(|e| e.size() as usize).sum::<usize>();
        if vox_offset > consumed {
            let skip = (vox_offset - consumed) as u64;
            let _ = io::copy(&mut (&mut source).take(skip), &mut io::sink())?;
        }

        let voxels = read_voxels(source, &fields, endianness)?;
        Ok(NiftiSource {
            header,
            fields,
            extensions,
            voxels,
        })
    }

    /// Assemble a NIfTI object out of already loaded parts.
    pub fn from_parts(
        header: RawHeader,
        extensions: ExtensionSequence,
        voxels: Voxels,
    ) -> Result<Self> {
        let fields = header.fields()?;
        Ok(NiftiSource {
            header,
            fields,
            extensions,
            voxels,
        })
    }

    /// The exact header bytes, as read from the source.
    pub fn raw_header(&self) -> &RawHeader {
        &self.header
    }

    /// The header fields, decoded under the source byte order.
    pub fn fields(&self) -> &HeaderFields {
        &self.fields
    }

    /// The byte order of the source.
    pub fn endianness(&self) -> Endianness {
        self.header.endianness()
    }

    /// Obtain a reference to the object's extensions.
    pub fn extensions(&self) -> &ExtensionSequence {
        &self.extensions
    }

    /// Obtain a reference to the object's voxels.
    pub fn voxels(&self) -> &Voxels {
        &self.voxels
    }

    /// Move the voxels out of the object, discarding the rest.
    pub fn into_voxels(self) -> Voxels {
        self.voxels
    }

    /// The header as it is embedded in a nifti-zarr store: the header
    /// bytes, followed by the extender code and every extension frame
    /// when the object has extensions.
    pub fn header_blob(&self) -> Result<Vec<u8>> {
        let mut blob = self.header.as_bytes().to_vec();
        if !self.extensions.is_empty() {
            self.extensions
                .write(ByteOrdered::runtime(&mut blob, self.header.endianness()))?;
        }
        Ok(blob)
    }
}

fn vox_offset(fields: &HeaderFields) -> Result<usize> {
    if fields.vox_offset.is_finite() && fields.vox_offset >= 0. {
        Ok(fields.vox_offset as usize)
    } else {
        Err(NiizarrError::InvalidCode("vox_offset", fields.vox_offset as i64))
    }
}

/// The volume shape, in NIfTI order.
fn volume_shape(fields: &HeaderFields) -> Result<Vec<usize>> {
    fields
        .shape()
        .iter()
        .map(|&d| {
            if d < 0 {
                Err(NiizarrError::InvalidCode("dim", d))
            } else {
                Ok(d as usize)
            }
        })
        .collect()
}

/// Extensions of a header file live right after the header and run up to
/// the end of the file.
fn read_trailing_extensions<S: Read>(header: &RawHeader, mut stream: S) -> Result<ExtensionSequence> {
    let extender = Extender::from_reader_optional(&mut stream)?.unwrap_or_default();
    if !extender.has_extensions() {
        return Ok(ExtensionSequence::default());
    }
    let mut rest = Vec::new();
    let _ = stream.read_to_end(&mut rest)?;
    ExtensionSequence::from_reader(
        extender,
        ByteOrdered::runtime(rest.as_slice(), header.endianness()),
        rest.len(),
    )
}

fn read_volume_file<P: AsRef<Path>>(
    path: P,
    header: &RawHeader,
    fields: &HeaderFields,
) -> Result<Voxels> {
    let gz = is_gz_file(&path);
    let file = BufReader::new(File::open(&path)?);
    let offset = vox_offset(fields)? as u64;
    if gz {
        let mut stream = GzDecoder::new(file);
        let _ = io::copy(&mut (&mut stream).take(offset), &mut io::sink())?;
        read_voxels(stream, fields, header.endianness())
    } else {
        let mut stream = file;
        let _ = io::copy(&mut (&mut stream).take(offset), &mut io::sink())?;
        read_voxels(stream, fields, header.endianness())
    }
}

fn read_voxels<R: Read>(mut source: R, fields: &HeaderFields, endianness: Endianness) -> Result<Voxels> {
    let datatype = NiftiType::from_code(i64::from(fields.datatype))?;
    let shape = volume_shape(fields)?;
    let mut bytes = Vec::new();
    let _ = source.read_to_end(&mut bytes)?;
    debug!(
        "read {} voxel bytes of type {:?} with shape {:?}",
        bytes.len(),
        datatype,
        shape
    );
    Voxels::from_raw(datatype, &shape, &bytes, endianness)
}
