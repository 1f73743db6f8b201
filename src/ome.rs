//! OME-Zarr (version 0.4) multiscale metadata.
//!
//! A [`Multiscale`] is first laid out from the pyramid alone, as any
//! multiscale writer would (typed axes, shape-ratio scales), and then
//! patched with the physical information held by the NIfTI header: axis
//! units, voxel sizes and the half-voxel shift of grid-aligned resampling.

use crate::error::{NiizarrError, Result};
use crate::json::DecodedHeader;
use crate::typedef::Unit;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Version of the multiscale convention written.
pub const OME_VERSION: &str = "0.4";

/// Name of the group attribute holding the multiscale documents.
pub const MULTISCALES_KEY: &str = "multiscales";

/// Kind of an axis.
#[allow(missing_docs)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisType {
    Space,
    Time,
    Channel,
}

impl AxisType {
    /// The kind of a conventionally named axis.
    pub fn from_axis_name(name: &str) -> Option<Self> {
        match name {
            "t" => Some(AxisType::Time),
            "c" => Some(AxisType::Channel),
            "z" | "y" | "x" => Some(AxisType::Space),
            _ => None,
        }
    }
}

/// One axis of the multiscale image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Axis {
    /// Axis name (`t`, `c`, `z`, `y` or `x`).
    pub name: String,
    /// Axis kind.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub axis_type: Option<AxisType>,
    /// Physical unit, as an OME unit name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Axis {
    fn new(name: &str, axis_type: AxisType, unit: Option<&str>) -> Self {
        Axis {
            name: name.to_owned(),
            axis_type: Some(axis_type),
            unit: unit.map(str::to_owned),
        }
    }
}

/// A coordinate transformation, in array axis order.
#[allow(missing_docs)]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CoordinateTransformation {
    Scale { scale: Vec<f64> },
    Translation { translation: Vec<f64> },
}

/// One pyramid level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    /// Path of the level array inside the group.
    pub path: String,
    /// Transformations from level voxels to physical space.
    #[serde(rename = "coordinateTransformations")]
    pub coordinate_transformations: Vec<CoordinateTransformation>,
}

/// A multiscale image document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Multiscale {
    /// Convention version.
    pub version: String,
    /// Image name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Axes, slowest first.
    pub axes: Vec<Axis>,
    /// Levels, finest first.
    pub datasets: Vec<Dataset>,
    /// Transformations applied after those of each dataset.
    #[serde(
        rename = "coordinateTransformations",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub coordinate_transformations: Option<Vec<CoordinateTransformation>>,
}

impl Multiscale {
    /// Lay out the document of a pyramid from its level shapes (in array
    /// order, batch axes included). Level `n` is stored at path `"n"` and
    /// scaled by the ratio of the level 0 shape to its own along each axis.
    pub fn new(axes: &[&str], shapes: &[Vec<usize>]) -> Self {
        let base = shapes.first().cloned().unwrap_or_default();
        let datasets = shapes
            .iter()
            .enumerate()
            .map(|(n, shape)| Dataset {
                path: n.to_string(),
                coordinate_transformations: vec![CoordinateTransformation::Scale {
                    scale: base
                        .iter()
                        .zip(shape)
                        .map(|(&b, &s)| b as f64 / s as f64)
                        .collect(),
                }],
            })
            .collect();
        Multiscale {
            version: OME_VERSION.to_owned(),
            name: Some("/".to_owned()),
            axes: axes
                .iter()
                .map(|&name| Axis {
                    name: name.to_owned(),
                    axis_type: AxisType::from_axis_name(name),
                    unit: None,
                })
                .collect(),
            datasets,
            coordinate_transformations: None,
        }
    }

    /// Lay out the document of a pyramid converted from a NIfTI volume.
    ///
    /// `nbatch` is the number of leading batch axes (time, then channel).
    pub fn from_nifti(header: &DecodedHeader, nbatch: usize, axes: &[&str], shapes: &[Vec<usize>]) -> Self {
        let mut multiscale = Multiscale::new(axes, shapes);
        multiscale.apply_nifti(header, nbatch, shapes);
        multiscale
    }

    /// Patch units, voxel sizes and half-voxel translations in from the
    /// NIfTI header.
    ///
    /// The z, y and x scales use voxel sizes 2, 1 and 0 respectively.
    /// Level shapes are compared over their last three axes only.
    pub fn apply_nifti(&mut self, header: &DecodedHeader, nbatch: usize, shapes: &[Vec<usize>]) {
        let space_unit = ome_unit(&header.unit.length);
        let mut axes: Vec<Axis> = ["z", "y", "x"]
            .iter()
            .map(|name| Axis::new(name, AxisType::Space, space_unit))
            .collect();
        if nbatch >= 2 {
            axes.insert(0, Axis::new("c", AxisType::Channel, None));
        }
        if nbatch >= 1 {
            axes.insert(0, Axis::new("t", AxisType::Time, ome_unit(&header.unit.time)));
        }
        self.axes = axes;

        let voxel = |i: usize| header.voxel_size.get(i).copied().unwrap_or(1.);
        let zyx_voxel = [voxel(2), voxel(1), voxel(0)];
        let spatial = |shape: &[usize]| -> [f64; 3] {
            let n = shape.len();
            [shape[n - 3] as f64, shape[n - 2] as f64, shape[n - 1] as f64]
        };
        let base = shapes.first().map(|s| spatial(s)).unwrap_or([1.; 3]);
        for (dataset, shape) in self.datasets.iter_mut().zip(shapes) {
            let level = spatial(shape);
            let ratio: Vec<f64> = (0..3).map(|i| base[i] / level[i]).collect();
            let mut scale = vec![1.; nbatch];
            scale.extend((0..3).map(|i| ratio[i] * zyx_voxel[i]));
            let mut translation = vec![0.; nbatch];
            translation.extend((0..3).map(|i| (ratio[i] - 1.) * zyx_voxel[i] * 0.5));

            let transforms = &mut dataset.coordinate_transformations;
            transforms.retain(|t| !matches!(t, CoordinateTransformation::Scale { .. }));
            transforms.insert(0, CoordinateTransformation::Scale { scale });
            transforms.push(CoordinateTransformation::Translation { translation });
        }

        let mut scale = vec![1.; 3];
        if nbatch >= 2 {
            scale.insert(0, 1.);
        }
        if nbatch >= 1 {
            let dt = voxel(3);
            scale.insert(0, if dt == 0. { 1. } else { dt });
        }
        self.coordinate_transformations = Some(vec![CoordinateTransformation::Scale { scale }]);
    }

    /// The value of the group `multiscales` attribute holding this
    /// document alone.
    pub fn to_attribute(&self) -> Result<Value> {
        Ok(Value::Array(vec![serde_json::to_value(self)?]))
    }

    /// Read the multiscale documents listed in group attributes.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::InvalidArrayMetadata` if the attribute is missing
    /// - `NiizarrError::Serialization` if it does not follow the schema
    pub fn from_attributes(attributes: &Map<String, Value>) -> Result<Vec<Self>> {
        let value = attributes
            .get(MULTISCALES_KEY)
            .ok_or_else(|| NiizarrError::InvalidArrayMetadata(MULTISCALES_KEY.to_owned()))?;
        Ok(serde_json::from_value(value.clone())?)
    }
}

/// OME name of a JNIfTI unit abbreviation; none for units OME-Zarr does not
/// list.
fn ome_unit(name: &str) -> Option<&'static str> {
    Unit::from_name(name).and_then(Unit::ome_name)
}
