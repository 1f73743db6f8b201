//! This module contains definitions for the extension and related types.
//! Extensions are optional data frames sitting before the voxel data.
//! When present, an extender frame of 4 bytes is also present at the
//! end of the NIFTI header, with the first byte set to something
//! other than 0.

use crate::error::{NiizarrError, Result};
use byteordered::{ByteOrdered, Endian};
use std::io::{ErrorKind as IoErrorKind, Read, Write};

/// Data type for the extender code.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct Extender([u8; 4]);

impl Extender {
    /// Fetch the extender code from the given source, while expecting it to exist.
    pub fn from_reader<S: Read>(mut source: S) -> Result<Self> {
        let mut extension = [0u8; 4];
        source.read_exact(&mut extension)?;
        Ok(extension.into())
    }

    /// Fetch the extender code from the given source, while
    /// being possible to not be available.
    /// Returns `None` if the source reaches EoF prematurely.
    /// Any other I/O error is delegated to a `NiizarrError`.
    pub fn from_reader_optional<S: Read>(mut source: S) -> Result<Option<Self>> {
        let mut extension = [0u8; 4];
        match source.read_exact(&mut extension) {
            Ok(()) => Ok(Some(extension.into())),
            Err(ref e) if e.kind() == IoErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(NiizarrError::from(e)),
        }
    }

    /// Whether extensions should exist upon this extender code.
    pub fn has_extensions(&self) -> bool {
        self.0[0] != 0
    }

    /// Get the extender's bytes
    pub fn as_bytes(&self) -> &[u8; 4] {
        &self.0
    }
}

impl From<[u8; 4]> for Extender {
    fn from(extender: [u8; 4]) -> Self {
        Extender(extender)
    }
}

/// Data type for the raw contents of an extension.
/// Users of this type have to reinterpret the data
/// to suit their needs.
#[derive(Debug, PartialEq, Clone)]
pub struct Extension {
    esize: i32,
    ecode: i32,
    edata: Vec<u8>,
}

impl Extension {
    /// Create an extension out of its main components.
    ///
    /// # Errors
    ///
    /// `NiizarrError::InvalidCode` if `esize` does not correspond to the
    /// full size of the extension in bytes: `8 + edata.len()`
    pub fn new(esize: i32, ecode: i32, edata: Vec<u8>) -> Result<Self> {
        if esize < 8 || esize as usize != 8 + edata.len() {
            return Err(NiizarrError::InvalidCode("esize", i64::from(esize)));
        }
        Ok(Extension {
            esize,
            ecode,
            edata,
        })
    }

    /// Obtain the claimed extension raw size (`esize` field).
    pub fn size(&self) -> i32 {
        self.esize
    }

    /// Obtain the extension's code (`ecode` field).
    pub fn code(&self) -> i32 {
        self.ecode
    }

    /// Obtain the extension's data (`edata` field).
    pub fn data(&self) -> &[u8] {
        &self.edata
    }
}

/// Data type for aggregating the extender code and
/// all extensions.
#[derive(Debug, Default, PartialEq, Clone)]
pub struct ExtensionSequence {
    extender: Extender,
    extensions: Vec<Extension>,
}

impl<'a> IntoIterator for &'a ExtensionSequence {
    type Item = &'a Extension;
    type IntoIter = ::std::slice::Iter<'a, Extension>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl ExtensionSequence {
    /// Read a sequence of extensions from a source, up until `len` bytes.
    pub fn from_reader<S, E>(
        extender: Extender,
        mut source: ByteOrdered<S, E>,
        len: usize,
    ) -> Result<Self>
    where
        S: Read,
        E: Endian,
    {
        let mut extensions = Vec::new();
        if extender.has_extensions() {
            let mut offset = 0;
            while offset < len {
                let esize = source.read_i32()?;
                let ecode = source.read_i32()?;
                // the frame must fit in what is left before the voxel data
                if esize < 8 || esize as usize > len - offset {
                    return Err(NiizarrError::InvalidCode("esize", i64::from(esize)));
                }
                let mut edata = vec![0u8; esize as usize - 8];
                source.read_exact(&mut edata)?;
                extensions.push(Extension::new(esize, ecode, edata)?);
                offset += esize as usize;
            }
        }

        Ok(ExtensionSequence {
            extender,
            extensions,
        })
    }

    /// Write the extender code followed by every extension frame, in the
    /// given byte order.
    pub fn write<W, E>(&self, mut dest: ByteOrdered<W, E>) -> Result<()>
    where
        W: Write,
        E: Endian,
    {
        dest.write_all(self.extender.as_bytes())?;
        for ext in &self.extensions {
            dest.write_i32(ext.esize)?;
            dest.write_i32(ext.ecode)?;
            dest.write_all(&ext.edata)?;
        }
        Ok(())
    }

    /// Obtain an iterator to the extensions.
    pub fn iter(&self) -> ::std::slice::Iter<Extension> {
        self.extensions.iter()
    }

    /// Whether the sequence of extensions is empty.
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }

    /// Obtain the number of extensions available.
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// Get the extender code from this extension sequence.
    pub fn extender(&self) -> Extender {
        self.extender
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteordered::Endianness;

    #[test]
    fn reads_and_writes_frames() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&16i32.to_be_bytes());
        raw.extend_from_slice(&6i32.to_be_bytes());
        raw.extend_from_slice(b"comment\0");
        let extender = Extender::from([1, 0, 0, 0]);
        let seq = ExtensionSequence::from_reader(
            extender,
            ByteOrdered::runtime(raw.as_slice(), Endianness::Big),
            raw.len(),
        )
        .unwrap();
        assert_eq!(seq.len(), 1);
        let ext = seq.iter().next().unwrap();
        assert_eq!(ext.code(), 6);
        assert_eq!(ext.data(), b"comment\0");

        let mut out = Vec::new();
        seq.write(ByteOrdered::runtime(&mut out, Endianness::Big)).unwrap();
        assert_eq!(&out[..4], &[1, 0, 0, 0]);
        assert_eq!(&out[4..], raw.as_slice());
    }

    #[test]
    fn no_extensions_without_flag() {
        let seq = ExtensionSequence::from_reader(
            Extender::default(),
            ByteOrdered::runtime(&[0u8; 16][..], Endianness::Little),
            16,
        )
        .unwrap();
        assert!(seq.is_empty());
        assert!(!seq.extender().has_extensions());
    }

    #[test]
    fn oversized_frame() {
        let mut raw = Vec::new();
        raw.extend_from_slice(&i32::MAX.to_le_bytes());
        raw.extend_from_slice(&4i32.to_le_bytes());
        raw.extend_from_slice(&[0u8; 8]);
        let res = ExtensionSequence::from_reader(
            Extender::from([1, 0, 0, 0]),
            ByteOrdered::runtime(raw.as_slice(), Endianness::Little),
            raw.len(),
        );
        assert!(matches!(res, Err(NiizarrError::InvalidCode("esize", _))));

        // a frame running one byte past the declared length
        let mut raw = Vec::new();
        raw.extend_from_slice(&24i32.to_le_bytes());
        raw.extend_from_slice(&4i32.to_le_bytes());
        raw.extend_from_slice(&[0u8; 16]);
        let res = ExtensionSequence::from_reader(
            Extender::from([1, 0, 0, 0]),
            ByteOrdered::runtime(raw.as_slice(), Endianness::Little),
            raw.len() - 1,
        );
        assert!(res.is_err());
    }

    #[test]
    fn bad_size() {
        assert!(Extension::new(12, 0, vec![0; 3]).is_err());
        assert!(Extender::from_reader_optional(&[0u8; 2][..]).unwrap().is_none());
    }
}
