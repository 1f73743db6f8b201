//! Multi-resolution pyramids of 3-D volumes.
//!
//! Every level halves the spatial axes (rounding up) after smoothing with
//! a Gaussian of `sigma = 2/3`, and resamples linearly on a grid whose
//! voxel centers sit at `(i + 0.5) * in / out - 0.5` in the previous
//! level. Out-of-bounds samples are mirrored. These are the conventions
//! the OME transforms written by the converter rely on, so they must not
//! change independently.
//!
//! Volumes with leading batch axes (time, channel) are processed one 3-D
//! volume at a time and stacked back together; batch axes are never
//! resampled.

use crate::error::{NiizarrError, Result};
use crate::volume::DataElement;
use ndarray::{Array, Array3, ArrayD, ArrayView3, ArrayViewD, Axis, Ix3, IxDyn, Zip};
use num_traits::AsPrimitive;
use std::cmp::Ordering;
use std::fmt;
use std::iter;
use std::str::FromStr;

/// Downsampling factor between consecutive levels.
pub const DOWNSCALE: f64 = 2.;

/// Down-sampling filter used to build value pyramids.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PyramidMethod {
    /// Gaussian-smoothed decimation. Level 0 is the source itself.
    Gaussian,
    /// Band-pass decimation: every level is the difference between the
    /// decimated volume and its smoothed version.
    Laplacian,
}

impl Default for PyramidMethod {
    fn default() -> Self {
        PyramidMethod::Gaussian
    }
}

impl FromStr for PyramidMethod {
    type Err = String;

    fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
        match s.to_lowercase().chars().next() {
            Some('g') => Ok(PyramidMethod::Gaussian),
            Some('l') => Ok(PyramidMethod::Laplacian),
            _ => Err(format!("unknown pyramid method `{}`", s)),
        }
    }
}

/// A spatial axis, named in NIfTI terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialAxis {
    /// First NIfTI axis (fastest varying).
    X,
    /// Second NIfTI axis.
    Y,
    /// Third NIfTI axis.
    Z,
}

impl SpatialAxis {
    /// Position of this axis in a `(z, y, x)` volume.
    pub fn zyx_index(self) -> usize {
        match self {
            SpatialAxis::Z => 0,
            SpatialAxis::Y => 1,
            SpatialAxis::X => 2,
        }
    }
}

impl FromStr for SpatialAxis {
    type Err = String;

    fn from_str(s: &str) -> ::std::result::Result<Self, Self::Err> {
        match s {
            "x" | "X" => Ok(SpatialAxis::X),
            "y" | "Y" => Ok(SpatialAxis::Y),
            "z" | "Z" => Ok(SpatialAxis::Z),
            _ => Err(format!("unknown spatial axis `{}`", s)),
        }
    }
}

/// Parameters shared by every volume of a pyramid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PyramidOptions {
    /// Maximum number of levels, including level 0.
    pub levels: usize,
    /// Down-sampling filter.
    pub method: PyramidMethod,
    /// Whether the volume holds labels rather than intensities.
    pub label: bool,
    /// Axis that is neither smoothed nor resampled.
    pub keep_axis: Option<SpatialAxis>,
}

/// Standard deviation of the smoothing kernel.
fn sigma() -> f64 {
    2. * DOWNSCALE / 6.
}

/// Normalized Gaussian kernel, truncated at 4 standard deviations.
fn gaussian_kernel(sigma: f64) -> Vec<f64> {
    let radius = (4. * sigma + 0.5) as isize;
    let weights: Vec<f64> = (-radius..=radius)
        .map(|x| (-0.5 * (x * x) as f64 / (sigma * sigma)).exp())
        .collect();
    let total: f64 = weights.iter().sum();
    weights.into_iter().map(|w| w / total).collect()
}

/// Half-sample symmetric boundary (`dcb|abcd|cba`).
fn reflect_index(i: isize, n: usize) -> usize {
    let n = n as isize;
    let period = 2 * n;
    let m = i.rem_euclid(period);
    if m < n {
        m as usize
    } else {
        (period - 1 - m) as usize
    }
}

/// Whole-sample symmetric boundary for fractional coordinates
/// (`dcb|abcd|cba` around the sample centers).
fn mirror_coordinate(pos: f64, n: usize) -> f64 {
    if n == 1 {
        return 0.;
    }
    let last = (n - 1) as f64;
    let period = 2. * last;
    let m = pos.rem_euclid(period);
    if m > last {
        period - m
    } else {
        m
    }
}

fn convolve_axis(input: &Array3<f64>, axis: usize, kernel: &[f64]) -> Array3<f64> {
    let radius = (kernel.len() / 2) as isize;
    let mut out = Array3::zeros(input.dim());
    Zip::from(input.lanes(Axis(axis)))
        .and(out.lanes_mut(Axis(axis)))
        .for_each(|src, mut dst| {
            let n = src.len();
            for i in 0..n {
                let mut acc = 0.;
                for (k, w) in kernel.iter().enumerate() {
                    let j = i as isize + k as isize - radius;
                    acc += w * src[reflect_index(j, n)];
                }
                dst[i] = acc;
            }
        });
    out
}

/// Smooth every axis but the kept one.
pub fn smooth(input: &Array3<f64>, keep_axis: Option<usize>) -> Array3<f64> {
    let kernel = gaussian_kernel(sigma());
    let mut out = input.clone();
    for axis in 0..3 {
        if Some(axis) != keep_axis {
            out = convolve_axis(&out, axis, &kernel);
        }
    }
    out
}

fn resize_axis(input: &Array3<f64>, axis: usize, len: usize) -> Array3<f64> {
    let n = input.len_of(Axis(axis));
    let mut dim = input.raw_dim();
    dim[axis] = len;
    let mut out = Array3::zeros(dim);
    if n == 0 {
        return out;
    }
    let zoom = n as f64 / len as f64;
    Zip::from(input.lanes(Axis(axis)))
        .and(out.lanes_mut(Axis(axis)))
        .for_each(|src, mut dst| {
            for o in 0..len {
                let pos = mirror_coordinate((o as f64 + 0.5) * zoom - 0.5, n);
                let i0 = pos.floor() as usize;
                let i1 = (i0 + 1).min(n - 1);
                let f = pos - i0 as f64;
                dst[o] = (1. - f) * src[i0] + f * src[i1];
            }
        });
    out
}

/// Linear resampling to the given shape, with centers aligned on the
/// `(i + 0.5) * in / out - 0.5` grid.
pub fn resize(input: &Array3<f64>, shape: (usize, usize, usize)) -> Array3<f64> {
    let target = [shape.0, shape.1, shape.2];
    let mut out = input.clone();
    for (axis, &len) in target.iter().enumerate() {
        if out.len_of(Axis(axis)) != len {
            out = resize_axis(&out, axis, len);
        }
    }
    out
}

/// The shape of the next level.
pub fn reduced_shape(shape: (usize, usize, usize), keep_axis: Option<usize>) -> (usize, usize, usize) {
    let reduce = |axis: usize, d: usize| {
        if Some(axis) == keep_axis {
            d
        } else {
            (d as f64 / DOWNSCALE).ceil() as usize
        }
    };
    (reduce(0, shape.0), reduce(1, shape.1), reduce(2, shape.2))
}

/// Lazy pyramid of a single floating point volume.
///
/// Iteration stops after `levels` volumes, or as soon as a reduction
/// leaves the shape unchanged.
#[derive(Debug, Clone)]
pub struct ValueLevels {
    method: PyramidMethod,
    keep_axis: Option<usize>,
    max_layer: usize,
    layer: usize,
    started: bool,
    // the last level for Gaussian pyramids, the last smoothed level for
    // Laplacian ones
    current: Option<Array3<f64>>,
}

impl ValueLevels {
    /// Prepare the pyramid of the given volume.
    pub fn new(image: Array3<f64>, levels: usize, method: PyramidMethod, keep_axis: Option<SpatialAxis>) -> Self {
        ValueLevels {
            method,
            keep_axis: keep_axis.map(SpatialAxis::zyx_index),
            max_layer: levels.saturating_sub(1),
            layer: 0,
            started: false,
            current: Some(image),
        }
    }
}

impl Iterator for ValueLevels {
    type Item = Array3<f64>;

    fn next(&mut self) -> Option<Array3<f64>> {
        if !self.started {
            self.started = true;
            let image = self.current.take()?;
            return match self.method {
                PyramidMethod::Gaussian => {
                    self.current = Some(image.clone());
                    Some(image)
                }
                PyramidMethod::Laplacian => {
                    let smoothed = smooth(&image, self.keep_axis);
                    let band = &image - &smoothed;
                    self.current = Some(smoothed);
                    Some(band)
                }
            };
        }
        if self.layer >= self.max_layer {
            return None;
        }
        self.layer += 1;
        let prev = self.current.take()?;
        let shape = reduced_shape(prev.dim(), self.keep_axis);
        if shape == prev.dim() {
            return None;
        }
        match self.method {
            PyramidMethod::Gaussian => {
                let reduced = resize(&smooth(&prev, self.keep_axis), shape);
                self.current = Some(reduced.clone());
                Some(reduced)
            }
            PyramidMethod::Laplacian => {
                let resized = resize(&prev, shape);
                let smoothed = smooth(&resized, self.keep_axis);
                let band = &resized - &smoothed;
                self.current = Some(smoothed);
                Some(band)
            }
        }
    }
}

fn to_f64<T: DataElement>(volume: ArrayView3<T>) -> Array3<f64> {
    volume.mapv(AsPrimitive::<f64>::as_)
}

fn from_f64<T: DataElement>(volume: Array3<f64>) -> Array3<T> {
    volume.mapv(T::from_f64)
}

/// Lazy value pyramid of a typed volume. Levels are cast back to the
/// source element type.
pub fn value_levels<T: DataElement>(
    volume: Array3<T>,
    options: &PyramidOptions,
) -> Box<dyn Iterator<Item = Array3<T>>> {
    let levels = ValueLevels::new(
        to_f64(volume.view()),
        options.levels,
        options.method,
        options.keep_axis,
    );
    match options.method {
        // level 0 is the source, untouched by the round trip through f64
        PyramidMethod::Gaussian => Box::new(iter::once(volume).chain(levels.skip(1).map(from_f64))),
        PyramidMethod::Laplacian => Box::new(levels.map(from_f64)),
    }
}

/// The sorted set of distinct values of a volume.
pub fn unique_labels<T: DataElement>(volume: ArrayView3<T>) -> Vec<T> {
    let mut labels: Vec<T> = volume.iter().copied().collect();
    labels.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    labels.dedup();
    labels
}

/// Label pyramid of a typed volume: at every voxel of every level past
/// the first, the label with the strongest smoothed indicator response.
///
/// Level 0 is the source. Ties go to the smallest label, so every output
/// value is one of the source labels.
pub fn label_levels<T: DataElement>(
    volume: Array3<T>,
    options: &PyramidOptions,
) -> Box<dyn Iterator<Item = Array3<T>>> {
    let labels = unique_labels(volume.view());
    let indicator = |label: T| {
        ValueLevels::new(
            volume.mapv(|v| if v == label { 1. } else { 0. }),
            options.levels,
            options.method,
            options.keep_axis,
        )
        .skip(1)
    };

    let mut winners: Vec<Array3<T>> = Vec::new();
    if let Some((&first, rest)) = labels.split_first() {
        let mut best: Vec<Array3<f64>> = indicator(first).collect();
        winners = best.iter().map(|b| Array3::from_elem(b.dim(), first)).collect();
        for &label in rest {
            for ((winner, top), response) in winners.iter_mut().zip(best.iter_mut()).zip(indicator(label)) {
                Zip::from(winner)
                    .and(top)
                    .and(&response)
                    .for_each(|w, b, &r| {
                        if r > *b {
                            *w = label;
                            *b = r;
                        }
                    });
            }
        }
    }
    Box::new(iter::once(volume).chain(winners))
}

/// Split a `(batch..., z, y, x)` volume into its 3-D volumes, in
/// row-major batch order.
fn split_batch<T: Clone>(volume: ArrayViewD<T>) -> Result<Vec<Array3<T>>> {
    if volume.ndim() == 3 {
        let volume = volume
            .into_dimensionality::<Ix3>()
            .map_err(|_| NiizarrError::UnsupportedRank(3))?;
        return Ok(vec![volume.to_owned()]);
    }
    let mut out = Vec::new();
    for i in 0..volume.len_of(Axis(0)) {
        out.extend(split_batch(volume.clone().index_axis_move(Axis(0), i))?);
    }
    Ok(out)
}

/// Lazy pyramid of a batched volume laid out as `(batch..., z, y, x)`.
///
/// Each item is one level, with the same batch axes as the source.
pub struct Pyramid<T> {
    batch: Vec<usize>,
    volumes: Vec<Box<dyn Iterator<Item = Array3<T>>>>,
}

impl<T> fmt::Debug for Pyramid<T> {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Pyramid")
            .field("batch", &self.batch)
            .field("volumes", &self.volumes.len())
            .finish()
    }
}

impl<T: DataElement> Pyramid<T> {
    /// Prepare the pyramid of a batched volume.
    ///
    /// # Errors
    ///
    /// - `NiizarrError::UnsupportedRank` if the volume has less than 3 axes
    /// - `NiizarrError::InvalidLevelCount` if zero levels are requested
    pub fn new(volume: ArrayViewD<T>, options: &PyramidOptions) -> Result<Self> {
        if volume.ndim() < 3 {
            return Err(NiizarrError::UnsupportedRank(volume.ndim()));
        }
        if options.levels == 0 {
            return Err(NiizarrError::InvalidLevelCount(0));
        }
        let batch = volume.shape()[..volume.ndim() - 3].to_vec();
        let volumes = split_batch(volume)?
            .into_iter()
            .map(|v| {
                if options.label {
                    label_levels(v, options)
                } else {
                    value_levels(v, options)
                }
            })
            .collect();
        Ok(Pyramid { batch, volumes })
    }
}

impl<T: DataElement> Iterator for Pyramid<T> {
    type Item = ArrayD<T>;

    fn next(&mut self) -> Option<ArrayD<T>> {
        let mut data = Vec::new();
        let mut spatial = None;
        for volume in self.volumes.iter_mut() {
            let level = volume.next()?;
            spatial = Some(level.dim());
            data.extend(level.iter().copied());
        }
        let (z, y, x) = spatial?;
        let mut shape = self.batch.clone();
        shape.extend_from_slice(&[z, y, x]);
        Array::from_shape_vec(IxDyn(&shape), data).ok()
    }
}
