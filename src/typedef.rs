//! This module contains the code tables defined by the NIfTI standard,
//! along with their canonical names in the JNIfTI vocabulary (which is
//! what the decoded JSON header reports) and their mapping onto zarr
//! element types and OME-Zarr units.
//!
//! Primitive integer codes can be converted to these types with
//! `FromPrimitive`. Codes outside of a table are reported as
//! `NiizarrError::InvalidCode`.

use crate::error::{NiizarrError, Result};
use byteordered::Endianness;
use num_derive::FromPrimitive;
use num_traits::FromPrimitive;
use serde_json::{json, Value};

/// Data type for representing a NIFTI value type in a volume.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
pub enum NiftiType {
    /// unsigned char.
    // NIFTI_TYPE_UINT8           2
    Uint8 = 2,
    /// signed short.
    // NIFTI_TYPE_INT16           4
    Int16 = 4,
    /// signed int.
    // NIFTI_TYPE_INT32           8
    Int32 = 8,
    /// 32 bit float.
    // NIFTI_TYPE_FLOAT32        16
    Float32 = 16,
    /// 64 bit complex = 2 32 bit floats.
    // NIFTI_TYPE_COMPLEX64      32
    Complex64 = 32,
    /// 64 bit float = double.
    // NIFTI_TYPE_FLOAT64        64
    Float64 = 64,
    /// 3 8 bit bytes.
    // NIFTI_TYPE_RGB24         128
    Rgb24 = 128,
    /// signed char.
    // NIFTI_TYPE_INT8          256
    Int8 = 256,
    /// unsigned short.
    // NIFTI_TYPE_UINT16        512
    Uint16 = 512,
    /// unsigned int.
    // NIFTI_TYPE_UINT32        768
    Uint32 = 768,
    /// signed long long.
    // NIFTI_TYPE_INT64        1024
    Int64 = 1024,
    /// unsigned long long.
    // NIFTI_TYPE_UINT64       1280
    Uint64 = 1280,
    /// 128 bit float = long double.
    // NIFTI_TYPE_FLOAT128     1536
    Float128 = 1536,
    /// 128 bit complex = 2 64 bit floats.
    // NIFTI_TYPE_COMPLEX128   1792
    Complex128 = 1792,
    /// 256 bit complex = 2 128 bit floats
    // NIFTI_TYPE_COMPLEX256   2048
    Complex256 = 2048,
    /// 4 8 bit bytes.
    // NIFTI_TYPE_RGBA32       2304
    Rgba32 = 2304,
}

/// Element layout of a zarr array, as written in `.zarray`.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ZarrDataType {
    /// A primitive numpy type string without byte order prefix, such as `u2`.
    Primitive(&'static str),
    /// A record of named single-byte fields.
    Structured(&'static [(&'static str, &'static str)]),
}

impl NiftiType {
    /// Validate a raw `datatype` code.
    pub fn from_code(code: i64) -> Result<Self> {
        FromPrimitive::from_i64(code).ok_or(NiizarrError::InvalidCode("datatype", code))
    }

    /// Retrieve the size of an element of this data type, in bytes.
    pub fn size_of(self) -> usize {
        use NiftiType::*;
        match self {
            Int8 | Uint8 => 1,
            Int16 | Uint16 => 2,
            Rgb24 => 3,
            Int32 | Uint32 | Float32 | Rgba32 => 4,
            Int64 | Uint64 | Float64 | Complex64 => 8,
            Float128 | Complex128 => 16,
            Complex256 => 32,
        }
    }

    /// The JNIfTI name of this data type.
    pub fn name(self) -> &'static str {
        use NiftiType::*;
        match self {
            Uint8 => "uint8",
            Int16 => "int16",
            Int32 => "int32",
            Float32 => "single",
            Complex64 => "complex64",
            Float64 => "double",
            Rgb24 => "rgb24",
            Int8 => "int8",
            Uint16 => "uint16",
            Uint32 => "uint32",
            Int64 => "int64",
            Uint64 => "uint64",
            Float128 => "double128",
            Complex128 => "complex128",
            Complex256 => "complex256",
            Rgba32 => "rgba32",
        }
    }

    /// Look up a data type by its JNIfTI name.
    pub fn from_name(name: &str) -> Option<Self> {
        use NiftiType::*;
        [
            Uint8, Int16, Int32, Float32, Complex64, Float64, Rgb24, Int8, Uint16, Uint32,
            Int64, Uint64, Float128, Complex128, Complex256, Rgba32,
        ]
        .iter()
        .copied()
        .find(|t| t.name() == name)
    }

    /// The zarr element layout of this data type.
    pub fn zarr_data_type(self) -> ZarrDataType {
        use NiftiType::*;
        use ZarrDataType::*;
        match self {
            Uint8 => Primitive("u1"),
            Int16 => Primitive("i2"),
            Int32 => Primitive("i4"),
            Float32 => Primitive("f4"),
            Complex64 => Primitive("c8"),
            Float64 => Primitive("f8"),
            Rgb24 => Structured(&[("r", "u1"), ("g", "u1"), ("b", "u1")]),
            Int8 => Primitive("i1"),
            Uint16 => Primitive("u2"),
            Uint32 => Primitive("u4"),
            Int64 => Primitive("i8"),
            Uint64 => Primitive("u8"),
            Float128 => Primitive("f16"),
            Complex128 => Primitive("c16"),
            Complex256 => Primitive("c32"),
            Rgba32 => Structured(&[("r", "u1"), ("g", "u1"), ("b", "u1"), ("a", "u1")]),
        }
    }

    /// The `dtype` entry of a zarr v2 array holding elements of this type,
    /// stored in the given byte order.
    ///
    /// Single-byte types and the fields of structured types carry the
    /// "not applicable" prefix `|` instead of a byte order.
    pub fn zarr_dtype(self, endianness: Endianness) -> Value {
        match self.zarr_data_type() {
            ZarrDataType::Structured(fields) => Value::Array(
                fields
                    .iter()
                    .map(|(name, t)| json!([name, format!("|{}", t)]))
                    .collect(),
            ),
            ZarrDataType::Primitive(t) if t.ends_with('1') => Value::String(format!("|{}", t)),
            ZarrDataType::Primitive(t) => {
                let prefix = match endianness {
                    Endianness::Little => '<',
                    Endianness::Big => '>',
                };
                Value::String(format!("{}{}", prefix, t))
            }
        }
    }
}

/// An enum type which represents a unit type.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
pub enum Unit {
    /// NIFTI code for unspecified units.
    Unknown = 0,
    /* Space codes are multiples of 1. */
    /// NIFTI code for meters.
    Meter = 1,
    /// NIFTI code for millimeters.
    Mm = 2,
    /// NIFTI code for micrometers.
    Micron = 3,
    /* Time codes are multiples of 8. */
    /// NIFTI code for seconds.
    Sec = 8,
    /// NIFTI code for milliseconds.
    Msec = 16,
    /// NIFTI code for microseconds.
    Usec = 24,
    /* These units are for spectral data: */
    /// NIFTI code for Hertz.
    Hz = 32,
    /// NIFTI code for ppm.
    Ppm = 40,
    /// NIFTI code for radians per second.
    Rads = 48,
}

impl Unit {
    /// Validate a masked unit code.
    pub fn from_code(code: u8) -> Result<Self> {
        FromPrimitive::from_u8(code).ok_or(NiizarrError::InvalidCode("xyzt_units", i64::from(code)))
    }

    /// The JNIfTI abbreviation of this unit (empty when unknown).
    pub fn name(self) -> &'static str {
        match self {
            Unit::Unknown => "",
            Unit::Meter => "m",
            Unit::Mm => "mm",
            Unit::Micron => "um",
            Unit::Sec => "s",
            Unit::Msec => "ms",
            Unit::Usec => "us",
            Unit::Hz => "hz",
            Unit::Ppm => "ppm",
            Unit::Rads => "rad",
        }
    }

    /// Look up a unit by its JNIfTI abbreviation.
    pub fn from_name(name: &str) -> Option<Self> {
        use Unit::*;
        [Unknown, Meter, Mm, Micron, Sec, Msec, Usec, Hz, Ppm, Rads]
            .iter()
            .copied()
            .find(|u| u.name() == name)
    }

    /// The OME-Zarr unit name, if this unit has one.
    pub fn ome_name(self) -> Option<&'static str> {
        match self {
            Unit::Meter => Some("meter"),
            Unit::Mm => Some("millimeter"),
            Unit::Micron => Some("micrometer"),
            Unit::Sec => Some("second"),
            Unit::Msec => Some("millisecond"),
            Unit::Usec => Some("microsecond"),
            Unit::Unknown | Unit::Hz | Unit::Ppm | Unit::Rads => None,
        }
    }
}

/// An enum type for representing a NIFTI intent code.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
pub enum Intent {
    /// default: no intention is indicated in the header.
    None = 0,
    /// Correlation coefficient R (1 param): p1 = degrees of freedom.
    Correl = 2,
    /// Student t statistic (1 param): p1 = DOF.
    Ttest = 3,
    /// Fisher F statistic (2 params):
    /// p1 = numerator DOF, p2 = denominator DOF.
    Ftest = 4,
    /// Standard normal (0 params): Density = N(0,1).
    Zscore = 5,
    /// Chi-squared (1 param): p1 = DOF.
    Chisq = 6,
    /// Beta distribution (2 params): p1=a, p2=b.
    Beta = 7,
    /// Binomial distribution (2 params):
    /// p1 = number of trials, p2 = probability per trial.
    Binom = 8,
    /// Gamma distribution (2 params): p1 = shape, p2 = scale.
    Gamma = 9,
    /// Poisson distribution (1 param): p1 = mean.
    Poisson = 10,
    /// Normal distribution (2 params): p1 = mean, p2 = standard deviation.
    Normal = 11,
    /// Noncentral F statistic (3 params):
    /// p1 = numerator DOF, p2 = denominator DOF,
    /// p3 = numerator noncentrality parameter.
    FtestNonc = 12,
    /// Noncentral chi-squared statistic (2 params):
    /// p1 = DOF, p2 = noncentrality parameter.
    ChisqNonc = 13,
    /// Logistic distribution (2 params): p1 = location, p2 = scale.
    Logistic = 14,
    /// Laplace distribution (2 params): p1 = location, p2 = scale.
    Laplace = 15,
    /// Uniform distribution: p1 = lower end, p2 = upper end.
    Uniform = 16,
    /// Noncentral t statistic (2 params):
    /// p1 = DOF, p2 = noncentrality parameter.
    TtestNonc = 17,
    /// Weibull distribution (3 params):
    /// p1 = location, p2 = scale, p3 = power.
    Weibull = 18,
    /// Chi distribution (1 param): p1 = DOF.
    Chi = 19,
    /// Inverse Gaussian (2 params): p1 = mu, p2 = lambda
    Invgauss = 20,
    /// Extreme value type I (2 params): p1 = location, p2 = scale
    Extval = 21,
    /// Data is a 'p-value' (no params).
    Pval = 22,
    /// Data is ln(p-value) (no params).
    Logpval = 23,
    /// Data is log10(p-value) (no params).
    Log10pval = 24,
    /* --- these values aren't for statistics --- */
    /// The value at each voxel is an estimate of some parameter.
    Estimate = 1001,
    /// The value at each voxel is an index into some set of labels.
    Label = 1002,
    /// The value at each voxel is an index into the NeuroNames labels set.
    Neuroname = 1003,
    /// An M x N matrix at each voxel.
    Genmatrix = 1004,
    /// An NxN symmetric matrix at each voxel.
    Symmatrix = 1005,
    /// A displacement field or vector.
    Dispvect = 1006,
    /// Any other type of vector.
    Vector = 1007,
    /// A spatial coordinate at each voxel.
    Pointset = 1008,
    /// A triple of indexes into a pointset dataset.
    Triangle = 1009,
    /// A quaternion at each voxel.
    Quaternion = 1010,
    /// Dimensionless value - no params.
    Dimless = 1011,
    /* --- these values apply to GIFTI datasets --- */
    /// The value at each location is from a time series.
    TimeSeries = 2001,
    /// The value at each location is a node index.
    NodeIndex = 2002,
    /// The vector value at each location is an RGB triplet.
    RgbVector = 2003,
    /// The vector value at each location is an RGBA quadruplet.
    RgbaVector = 2004,
    /// The value at each location is a shape value, such as the curvature.
    Shape = 2005,
}

impl Intent {
    /// Validate a raw `intent_code`.
    pub fn from_code(code: i64) -> Result<Self> {
        FromPrimitive::from_i64(code).ok_or(NiizarrError::InvalidCode("intent", code))
    }

    /// Check whether this intent code are used for statistics.
    pub fn is_statcode(self) -> bool {
        self as i16 >= 2 && self as i16 <= 24
    }

    /// Whether the voxel values of this intent are discrete labels.
    pub fn is_label(self) -> bool {
        matches!(self, Intent::Label | Intent::Neuroname)
    }

    /// The JNIfTI name of this intent.
    pub fn name(self) -> &'static str {
        use Intent::*;
        match self {
            None => "",
            Correl => "corr",
            Ttest => "ttest",
            Ftest => "ftest",
            Zscore => "zscore",
            Chisq => "chi2",
            Beta => "beta",
            Binom => "binomial",
            Gamma => "gamma",
            Poisson => "poisson",
            Normal => "normal",
            FtestNonc => "ncftest",
            ChisqNonc => "ncchi2",
            Logistic => "logistic",
            Laplace => "laplace",
            Uniform => "uniform",
            TtestNonc => "ncttest",
            Weibull => "weibull",
            Chi => "chi",
            Invgauss => "invgauss",
            Extval => "extval",
            Pval => "pvalue",
            Logpval => "logpvalue",
            Log10pval => "log10pvalue",
            Estimate => "estimate",
            Label => "label",
            Neuroname => "neuronames",
            Genmatrix => "matrix",
            Symmatrix => "symmatrix",
            Dispvect => "displacement",
            Vector => "vector",
            Pointset => "points",
            Triangle => "triangle",
            Quaternion => "quaternion",
            Dimless => "unitless",
            TimeSeries => "tseries",
            NodeIndex => "elem",
            RgbVector => "rgb",
            RgbaVector => "rgba",
            Shape => "shape",
        }
    }

    /// Number of intent parameters which carry meaning for this intent.
    pub fn param_count(self) -> usize {
        use Intent::*;
        match self {
            Correl | Ttest | Chisq | Poisson | Chi => 1,
            Ftest | Beta | Binom | Gamma | Normal | ChisqNonc | Logistic | Laplace | Uniform
            | TtestNonc | Invgauss | Extval => 2,
            FtestNonc | Weibull => 3,
            _ => 0,
        }
    }
}

/// An enum type for representing a NIFTI XForm.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
pub enum XForm {
    /// Arbitrary coordinates (Method 1).
    Unknown = 0,
    /// Scanner-based anatomical coordinates
    ScannerAnat = 1,
    /// Coordinates aligned to another file's,
    /// or to anatomical "truth".
    AlignedAnat = 2,
    /// Coordinates aligned to Talairach-Tournoux
    /// Atlas; (0,0,0)=AC, etc.
    Talairach = 3,
    /// MNI 152 normalized coordinates.
    Mni152 = 4,
    /// Normalized coordinates of some other template.
    TemplateOther = 5,
}

impl XForm {
    /// Validate a raw `qform_code` or `sform_code`.
    pub fn from_code(field: &'static str, code: i64) -> Result<Self> {
        FromPrimitive::from_i64(code).ok_or(NiizarrError::InvalidCode(field, code))
    }

    /// The JNIfTI name of this coordinate mapping.
    pub fn name(self) -> &'static str {
        match self {
            XForm::Unknown => "",
            XForm::ScannerAnat => "scanner_anat",
            XForm::AlignedAnat => "aligned_anat",
            XForm::Talairach => "talairach",
            XForm::Mni152 => "mni_152",
            XForm::TemplateOther => "template_other",
        }
    }
}

/// An enum type for representing the slice order.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, FromPrimitive)]
pub enum SliceOrder {
    /// NIFTI_SLICE_UNKNOWN
    Unknown = 0,
    /// NIFTI_SLICE_SEQ_INC
    SeqInc = 1,
    /// NIFTI_SLICE_SEQ_DEC
    SeqDec = 2,
    /// NIFTI_SLICE_ALT_INC
    AltInc = 3,
    /// NIFTI_SLICE_ALT_DEC
    AltDec = 4,
    /// NIFTI_SLICE_ALT_INC2
    AltInc2 = 5,
    /// NIFTI_SLICE_ALT_DEC2
    AltDec2 = 6,
}

impl SliceOrder {
    /// Validate a raw `slice_code`.
    pub fn from_code(code: i64) -> Result<Self> {
        FromPrimitive::from_i64(code).ok_or(NiizarrError::InvalidCode("slice order", code))
    }

    /// The JNIfTI name of this slice order.
    pub fn name(self) -> &'static str {
        match self {
            SliceOrder::Unknown => "",
            SliceOrder::SeqInc => "seq+",
            SliceOrder::SeqDec => "seq-",
            SliceOrder::AltInc => "alt+",
            SliceOrder::AltDec => "alt-",
            SliceOrder::AltInc2 => "alt2+",
            SliceOrder::AltDec2 => "alt2-",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zarr_dtype_prefixes() {
        assert_eq!(NiftiType::Uint8.zarr_dtype(Endianness::Big), json!("|u1"));
        assert_eq!(NiftiType::Int8.zarr_dtype(Endianness::Little), json!("|i1"));
        assert_eq!(NiftiType::Int16.zarr_dtype(Endianness::Little), json!("<i2"));
        assert_eq!(NiftiType::Float64.zarr_dtype(Endianness::Big), json!(">f8"));
        assert_eq!(NiftiType::Uint64.zarr_dtype(Endianness::Little), json!("<u8"));
        assert_eq!(
            NiftiType::Rgb24.zarr_dtype(Endianness::Big),
            json!([["r", "|u1"], ["g", "|u1"], ["b", "|u1"]])
        );
    }

    #[test]
    fn intent_tables() {
        assert_eq!(Intent::from_code(1002).unwrap(), Intent::Label);
        assert!(Intent::Label.is_label());
        assert!(Intent::Neuroname.is_label());
        assert!(!Intent::Estimate.is_label());
        assert_eq!(Intent::FtestNonc.param_count(), 3);
        assert_eq!(Intent::Ttest.param_count(), 1);
        assert_eq!(Intent::None.param_count(), 0);
        assert!(Intent::from_code(999).is_err());
    }

    #[test]
    fn unit_names() {
        assert_eq!(Unit::from_code(2).unwrap().name(), "mm");
        assert_eq!(Unit::from_name("ms"), Some(Unit::Msec));
        assert_eq!(Unit::Mm.ome_name(), Some("millimeter"));
        assert_eq!(Unit::Hz.ome_name(), None);
        assert!(Unit::from_code(5).is_err());
    }

    #[test]
    fn datatype_names() {
        for code in &[2, 4, 8, 16, 32, 64, 128, 256, 512, 768, 1024, 1280, 1536, 1792, 2048, 2304] {
            let t = NiftiType::from_code(*code).unwrap();
            assert_eq!(NiftiType::from_name(t.name()), Some(t));
        }
        assert!(NiftiType::from_code(3).is_err());
    }
}
