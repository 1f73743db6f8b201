//! The JSON form of a NIfTI header, following the JNIfTI naming scheme.
//!
//! The decoded header is attached to the `nifti` array of a nifti-zarr store
//! as its attributes. It is always derived from the binary header, never the
//! other way around: the binary header is stored verbatim next to it.

use crate::error::Result;
use crate::header::{HeaderFields, RawHeader};
use crate::typedef::{Intent, NiftiType, SliceOrder, XForm};
use crate::util::fixed_str;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Split `dim_info` field.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct JsonDimInfo {
    pub freq: u8,
    pub phase: u8,
    pub slice: u8,
}

/// Anatomical direction of each voxel axis.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Orientation {
    pub x: String,
    pub y: String,
    pub z: String,
}

/// Spatial (`L`) and temporal (`T`) unit names.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JsonUnits {
    #[serde(rename = "L")]
    pub length: String,
    #[serde(rename = "T")]
    pub time: String,
}

/// Quaternion parameters of the q-form.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quatern {
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

/// Offset of the q-form.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct QuaternOffset {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

/// A NIfTI header decoded into JNIfTI fields.
///
/// The same schema is used for both header versions: the ANALYZE
/// leftovers (`A75*`) are zero-filled for NIfTI-2 headers.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecodedHeader {
    #[serde(rename = "NIIHeaderSize")]
    pub nii_header_size: i32,
    #[serde(rename = "DimInfo")]
    pub dim_info: JsonDimInfo,
    #[serde(rename = "Dim")]
    pub dim: Vec<i64>,
    #[serde(rename = "Param1")]
    pub param1: Option<f64>,
    #[serde(rename = "Param2")]
    pub param2: Option<f64>,
    #[serde(rename = "Param3")]
    pub param3: Option<f64>,
    #[serde(rename = "Intent")]
    pub intent: String,
    #[serde(rename = "DataType")]
    pub data_type: String,
    #[serde(rename = "BitDepth")]
    pub bit_depth: i16,
    #[serde(rename = "FirstSliceID")]
    pub first_slice_id: i64,
    #[serde(rename = "VoxelSize")]
    pub voxel_size: Vec<f64>,
    #[serde(rename = "Orientation")]
    pub orientation: Orientation,
    #[serde(rename = "NIIByteOffset")]
    pub nii_byte_offset: f64,
    #[serde(rename = "ScaleSlope")]
    pub scale_slope: f64,
    #[serde(rename = "ScaleOffset")]
    pub scale_offset: f64,
    #[serde(rename = "LastSliceID")]
    pub last_slice_id: i64,
    #[serde(rename = "SliceType")]
    pub slice_type: String,
    #[serde(rename = "Unit")]
    pub unit: JsonUnits,
    #[serde(rename = "MaxIntensity")]
    pub max_intensity: f64,
    #[serde(rename = "MinIntensity")]
    pub min_intensity: f64,
    #[serde(rename = "SliceTime")]
    pub slice_time: f64,
    #[serde(rename = "TimeOffset")]
    pub time_offset: f64,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "AuxFile")]
    pub aux_file: String,
    #[serde(rename = "QForm")]
    pub qform: String,
    #[serde(rename = "SForm")]
    pub sform: String,
    #[serde(rename = "Quatern")]
    pub quatern: Quatern,
    #[serde(rename = "QuaternOffset")]
    pub quatern_offset: QuaternOffset,
    #[serde(rename = "Affine")]
    pub affine: Vec<Vec<f64>>,
    #[serde(rename = "Name")]
    pub name: String,
    #[serde(rename = "NIIFormat")]
    pub nii_format: String,
    #[serde(rename = "NIFTIExtension")]
    pub nifti_extension: [u8; 4],
    #[serde(rename = "A75DataTypeName")]
    pub a75_data_type_name: String,
    #[serde(rename = "A75DBName")]
    pub a75_db_name: String,
    #[serde(rename = "A75Extends")]
    pub a75_extends: i32,
    #[serde(rename = "A75SessionError")]
    pub a75_session_error: i16,
    #[serde(rename = "A75Regular")]
    pub a75_regular: u8,
    #[serde(rename = "A75GlobalMax")]
    pub a75_global_max: i32,
    #[serde(rename = "A75GlobalMin")]
    pub a75_global_min: i32,
}

impl DecodedHeader {
    /// Build the JSON form out of decoded header fields.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::InvalidCode` if the intent, data type, slice order,
    ///   unit or xform codes are not part of the standard tables.
    pub fn from_fields(h: &HeaderFields, extensions: bool) -> Result<Self> {
        let intent = Intent::from_code(i64::from(h.intent_code))?;
        let data_type = NiftiType::from_code(i64::from(h.datatype))?;
        let slice_order = SliceOrder::from_code(i64::from(h.slice_code))?;
        let units = h.xyzt_units()?;
        let qform = XForm::from_code("qform", i64::from(h.qform_code))?;
        let sform = XForm::from_code("sform", i64::from(h.sform_code))?;
        let dim_info = h.dim_info();

        let nparams = intent.param_count();
        let param = |i: usize| if i < nparams { Some(h.intent_p[i]) } else { None };
        let finite_or_zero = |v: f64| if v.is_finite() { v } else { 0.0 };

        let legacy = h.legacy.as_ref();
        Ok(DecodedHeader {
            nii_header_size: h.sizeof_hdr,
            dim_info: JsonDimInfo {
                freq: dim_info.freq,
                phase: dim_info.phase,
                slice: dim_info.slice,
            },
            dim: h.shape().to_vec(),
            param1: param(0),
            param2: param(1),
            param3: param(2),
            intent: intent.name().to_owned(),
            data_type: data_type.name().to_owned(),
            bit_depth: h.bitpix,
            first_slice_id: h.slice_start,
            voxel_size: h.voxel_size().to_vec(),
            orientation: Orientation {
                x: (if h.pixdim[0] == 0. { "r" } else { "l" }).to_owned(),
                y: "a".to_owned(),
                z: "s".to_owned(),
            },
            nii_byte_offset: h.vox_offset,
            scale_slope: finite_or_zero(h.scl_slope),
            scale_offset: finite_or_zero(h.scl_inter),
            last_slice_id: h.slice_end,
            slice_type: slice_order.name().to_owned(),
            unit: JsonUnits {
                length: units.space.name().to_owned(),
                time: units.time.name().to_owned(),
            },
            max_intensity: h.cal_max,
            min_intensity: h.cal_min,
            slice_time: h.slice_duration,
            time_offset: h.toffset,
            description: fixed_str(&h.descrip),
            aux_file: fixed_str(&h.aux_file),
            qform: qform.name().to_owned(),
            sform: sform.name().to_owned(),
            quatern: Quatern {
                b: h.quatern[0],
                c: h.quatern[1],
                d: h.quatern[2],
            },
            quatern_offset: QuaternOffset {
                x: h.qoffset[0],
                y: h.qoffset[1],
                z: h.qoffset[2],
            },
            affine: h.srow.iter().map(|row| row.to_vec()).collect(),
            name: fixed_str(&h.intent_name),
            nii_format: h.magic_str(),
            nifti_extension: [u8::from(extensions), 0, 0, 0],
            a75_data_type_name: legacy.map(|l| fixed_str(&l.data_type)).unwrap_or_default(),
            a75_db_name: legacy.map(|l| fixed_str(&l.db_name)).unwrap_or_default(),
            a75_extends: legacy.map(|l| l.extents).unwrap_or(0),
            a75_session_error: legacy.map(|l| l.session_error).unwrap_or(0),
            a75_regular: legacy.map(|l| l.regular).unwrap_or(0),
            a75_global_max: legacy.map(|l| l.glmax).unwrap_or(0),
            a75_global_min: legacy.map(|l| l.glmin).unwrap_or(0),
        })
    }

    /// Whether the intent marks the volume as a segmentation.
    pub fn is_label(&self) -> bool {
        self.intent == Intent::Label.name() || self.intent == Intent::Neuroname.name()
    }

    /// Convert into a JSON object.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::Serialization` if any field cannot be represented
    ///   in JSON, which denotes a defect in the decoder.
    pub fn to_json(&self) -> Result<serde_json::Map<String, Value>> {
        match serde_json::to_value(self)? {
            Value::Object(map) => Ok(map),
            _ => unreachable!("a struct always serializes into a JSON object"),
        }
    }
}

/// Convert a binary NIfTI header into its JSON form.
///
/// `extensions` tells whether header extensions follow the header in the
/// source file. The result is checked to serialize into a JSON object
/// before it is returned.
pub fn nii2json(header: &RawHeader, extensions: bool) -> Result<DecodedHeader> {
    let fields = header.fields()?;
    let decoded = DecodedHeader::from_fields(&fields, extensions)?;
    let _ = serde_json::to_string(&decoded)?;
    Ok(decoded)
}
