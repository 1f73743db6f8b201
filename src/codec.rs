//! The closed registry of chunk compressors.
//!
//! Compressors are selected by name (`blosc` or `zlib`, case insensitive)
//! with a map of keyword options, and described in `.zarray` files with
//! the numcodecs configuration layout (`{"id": "blosc", ...}`), so that
//! stores remain readable by the Python zarr stack. Encoding itself is
//! left to the `zarrs` codec chain built from that configuration.

use crate::error::{NiizarrError, Result};
use serde_json::{json, Map, Value};

/// Internal compressors blosc was built with.
const BLOSC_CNAMES: &[&str] = &["blosclz", "lz4", "lz4hc", "zlib", "zstd"];

/// Options of the blosc meta-compressor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BloscOptions {
    /// Internal compressor name.
    pub cname: String,
    /// Compression level, 0 to 9.
    pub clevel: u8,
    /// 0 (none), 1 (byte) or 2 (bit).
    pub shuffle: i32,
    /// Block size in bytes, 0 for automatic.
    pub blocksize: usize,
}

impl Default for BloscOptions {
    fn default() -> Self {
        BloscOptions {
            cname: "lz4".to_string(),
            clevel: 5,
            shuffle: 1,
            blocksize: 0,
        }
    }
}

/// A chunk compressor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compressor {
    /// Blosc meta-compressor.
    Blosc(BloscOptions),
    /// zlib stream (RFC 1950).
    Zlib {
        /// Compression level, 0 to 9.
        level: u32,
    },
}

impl Default for Compressor {
    fn default() -> Self {
        Compressor::Blosc(BloscOptions::default())
    }
}

fn option_u64(key: &str, value: &Value, max: u64) -> Result<u64> {
    value
        .as_u64()
        .filter(|&v| v <= max)
        .ok_or_else(|| NiizarrError::InvalidCompressorOption(key.to_string()))
}

impl Compressor {
    /// Look up a compressor by name and configure it.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::UnknownCompressor` if the name is neither `blosc`
    ///   nor `zlib`
    /// - `NiizarrError::InvalidCompressorOption` on unknown keys or
    ///   out-of-range values
    pub fn from_name(name: &str, options: &Map<String, Value>) -> Result<Self> {
        match name.to_lowercase().as_str() {
            "blosc" => {
                let mut blosc = BloscOptions::default();
                for (key, value) in options {
                    match key.as_str() {
                        "cname" => {
                            blosc.cname = value
                                .as_str()
                                .filter(|c| BLOSC_CNAMES.contains(c))
                                .ok_or_else(|| NiizarrError::InvalidCompressorOption(key.clone()))?
                                .to_string();
                        }
                        "clevel" => blosc.clevel = option_u64(key, value, 9)? as u8,
                        "shuffle" => {
                            blosc.shuffle = value
                                .as_i64()
                                .filter(|s| (0..=2).contains(s))
                                .ok_or_else(|| NiizarrError::InvalidCompressorOption(key.clone()))?
                                as i32;
                        }
                        "blocksize" => blosc.blocksize = option_u64(key, value, u64::from(u32::MAX))? as usize,
                        _ => return Err(NiizarrError::InvalidCompressorOption(key.clone())),
                    }
                }
                Ok(Compressor::Blosc(blosc))
            }
            "zlib" => {
                let mut level = 1;
                for (key, value) in options {
                    match key.as_str() {
                        "level" => level = option_u64(key, value, 9)? as u32,
                        _ => return Err(NiizarrError::InvalidCompressorOption(key.clone())),
                    }
                }
                Ok(Compressor::Zlib { level })
            }
            _ => Err(NiizarrError::UnknownCompressor(name.to_string())),
        }
    }

    /// The numcodecs configuration of this compressor.
    pub fn metadata(&self) -> Value {
        match self {
            Compressor::Blosc(o) => json!({
                "blocksize": o.blocksize,
                "clevel": o.clevel,
                "cname": o.cname,
                "id": "blosc",
                "shuffle": o.shuffle,
            }),
            Compressor::Zlib { level } => json!({
                "id": "zlib",
                "level": level,
            }),
        }
    }

    /// Rebuild a compressor from its numcodecs configuration.
    pub fn from_metadata(metadata: &Value) -> Result<Self> {
        let mut options = metadata
            .as_object()
            .cloned()
            .ok_or_else(|| NiizarrError::InvalidArrayMetadata("compressor".to_string()))?;
        let id = match options.remove("id") {
            Some(Value::String(id)) => id,
            _ => return Err(NiizarrError::InvalidArrayMetadata("compressor id".to_string())),
        };
        Compressor::from_name(&id, &options)
    }
}
