//! Types for error handling go here.
//!
//! Errors fall in three groups: input errors (unreadable sources, unsupported
//! shapes, malformed headers), configuration errors (unknown compressors, bad
//! level counts or chunk sizes) and serialization invariant violations. All
//! of them are fatal: nothing in this crate retries.
use crate::typedef::NiftiType;
use quick_error::quick_error;
use std::io::Error as IOError;

quick_error! {
    /// Error type for all error variants originated by this crate.
    #[derive(Debug)]
    #[non_exhaustive]
    pub enum NiizarrError {
        /// The declared header size is neither 348 (NIfTI-1) nor 540
        /// (NIfTI-2) in any byte order.
        InvalidHeaderSize(size: i32) {
            display("Invalid NIfTI header size: {}", size)
        }
        /// The header buffer is shorter than its declared layout.
        TruncatedHeader(len: usize) {
            display("Truncated NIfTI header: got {} bytes", len)
        }
        /// The magic code is not one of the known NIfTI codes.
        InvalidMagic {
            display("Invalid NIfTI magic code")
        }
        /// A header field holds a value outside of its code table.
        InvalidCode(typename: &'static str, code: i64) {
            display("Invalid code `{}` for header field {}", code, typename)
        }
        /// The volume rank is not one of 3, 4 or 5.
        UnsupportedRank(rank: usize) {
            display("Unsupported number of dimensions for conversion to nii.zarr: {}", rank)
        }
        /// The voxel data type cannot be converted.
        UnsupportedDataType(t: NiftiType) {
            display("Unsupported data type {:?}", t)
        }
        /// The header points to a separate volume file which could not be read.
        MissingVolumeFile(err: IOError) {
            source(err)
            display("Volume file not found or not readable: {}", err)
        }
        /// The source only contains a header.
        NoVolumeData {
            display("No volume data available")
        }
        /// The volume data length does not match the header dimensions.
        IncompatibleLength(got: usize, expected: usize) {
            display("Volume has {} elements, but the header dimensions imply {}", got, expected)
        }
        /// The compressor name is not part of the registry.
        UnknownCompressor(name: String) {
            display("Unknown compressor `{}`", name)
        }
        /// A compressor option is unknown or has an invalid value.
        InvalidCompressorOption(key: String) {
            display("Invalid compressor option `{}`", key)
        }
        /// An array was requested with an empty name.
        EmptyArrayName {
            display("Array name must not be empty")
        }
        /// The requested number of pyramid levels is not usable.
        InvalidLevelCount(levels: usize) {
            display("Invalid number of pyramid levels: {}", levels)
        }
        /// The store has no pyramid level with this index.
        MissingLevel(level: usize) {
            display("No pyramid level {} in the store", level)
        }
        /// A chunk extent of zero, or an empty chunk tuple, was requested.
        InvalidChunkSize {
            display("Chunk sizes must be non-empty and strictly positive")
        }
        /// Stored array metadata is missing or inconsistent.
        InvalidArrayMetadata(reason: String) {
            display("Invalid zarr array metadata: {}", reason)
        }
        /// The store could not be opened.
        StoreCreate(err: zarrs::filesystem::FilesystemStoreCreateError) {
            from()
            source(err)
            display("Could not open zarr store: {}", err)
        }
        /// The store rejected a read or write.
        Storage(err: zarrs::storage::StorageError) {
            from()
            source(err)
            display("zarr storage failure: {}", err)
        }
        /// Group metadata could not be created or opened.
        GroupCreate(err: zarrs::group::GroupCreateError) {
            from()
            source(err)
            display("Invalid zarr group: {}", err)
        }
        /// Array metadata could not be created or opened.
        ArrayCreate(err: zarrs::array::ArrayCreateError) {
            from()
            source(err)
            display("Invalid zarr array: {}", err)
        }
        /// Chunk data could not be encoded, decoded or stored.
        ArrayAccess(err: zarrs::array::ArrayError) {
            from()
            source(err)
            display("zarr array access failure: {}", err)
        }
        /// A value that must be JSON-serializable could not be serialized.
        Serialization(err: serde_json::Error) {
            from()
            source(err)
            display("JSON serialization failure: {}", err)
        }
        /// I/O Error
        Io(err: IOError) {
            from()
            source(err)
            display("I/O error: {}", err)
        }
    }
}

/// Alias type for results originated from this crate.
pub type Result<T> = ::std::result::Result<T, NiizarrError>;
