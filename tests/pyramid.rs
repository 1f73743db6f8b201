extern crate approx;

use approx::assert_abs_diff_eq;
use ndarray::{Array, ArrayD, Dimension, IxDyn};
use niizarr::pyramid::{PyramidOptions, SpatialAxis};
use niizarr::{Pyramid, PyramidMethod};
use std::collections::BTreeSet;

fn options(levels: usize, method: PyramidMethod, label: bool) -> PyramidOptions {
    PyramidOptions {
        levels,
        method,
        label,
        keep_axis: None,
    }
}

fn batched_ramp(shape: &[usize]) -> ArrayD<f32> {
    Array::from_shape_fn(IxDyn(shape), |ix| {
        let n = ix.ndim();
        (ix[n - 1] + 2 * ix[n - 2] + 3 * ix[n - 3]) as f32 + if n > 3 { 100. * ix[0] as f32 } else { 0. }
    })
}

#[test]
fn shapes_shrink_and_batch_is_kept() {
    let volume = batched_ramp(&[3, 33, 16, 9]);
    let levels: Vec<ArrayD<f32>> = Pyramid::new(volume.view(), &options(4, PyramidMethod::Gaussian, false))
        .unwrap()
        .collect();
    let shapes: Vec<Vec<usize>> = levels.iter().map(|l| l.shape().to_vec()).collect();
    assert_eq!(
        shapes,
        vec![vec![3, 33, 16, 9], vec![3, 17, 8, 5], vec![3, 9, 4, 3], vec![3, 5, 2, 2]]
    );
    for pair in shapes.windows(2) {
        assert_eq!(pair[0][0], pair[1][0]);
        for axis in 1..4 {
            assert!(pair[1][axis] <= pair[0][axis]);
        }
    }
    assert_eq!(levels[0], volume);
}

#[test]
fn batch_volumes_are_processed_independently() {
    let volume = batched_ramp(&[2, 8, 8, 8]);
    let levels: Vec<ArrayD<f32>> = Pyramid::new(volume.view(), &options(2, PyramidMethod::Gaussian, false))
        .unwrap()
        .collect();
    let coarse = &levels[1];
    // the second batch entry is the first one shifted by 100
    for (a, b) in coarse
        .index_axis(ndarray::Axis(0), 0)
        .iter()
        .zip(coarse.index_axis(ndarray::Axis(0), 1).iter())
    {
        assert_abs_diff_eq!(b - a, 100., epsilon = 1e-3);
    }
}

#[test]
fn kept_axis_is_never_resampled() {
    let volume = batched_ramp(&[16, 16, 5]);
    let mut opts = options(3, PyramidMethod::Gaussian, false);
    opts.keep_axis = Some(SpatialAxis::X);
    let shapes: Vec<Vec<usize>> = Pyramid::new(volume.view(), &opts)
        .unwrap()
        .map(|l| l.shape().to_vec())
        .collect();
    assert_eq!(shapes, vec![vec![16, 16, 5], vec![8, 8, 5], vec![4, 4, 5]]);
}

#[test]
fn gaussian_preserves_constant_volumes() {
    let volume = ArrayD::from_elem(IxDyn(&[12, 10, 7]), 42.5f64);
    for level in Pyramid::new(volume.view(), &options(3, PyramidMethod::Gaussian, false)).unwrap() {
        for &v in level.iter() {
            assert_abs_diff_eq!(v, 42.5, epsilon = 1e-9);
        }
    }
}

#[test]
fn laplacian_levels_of_constant_volumes_vanish() {
    let volume = ArrayD::from_elem(IxDyn(&[8, 8, 8]), 7f64);
    let levels: Vec<ArrayD<f64>> = Pyramid::new(volume.view(), &options(3, PyramidMethod::Laplacian, false))
        .unwrap()
        .collect();
    assert_eq!(levels.len(), 3);
    for level in &levels {
        for &v in level.iter() {
            assert_abs_diff_eq!(v, 0., epsilon = 1e-9);
        }
    }
}

#[test]
fn labels_stay_within_the_source_label_set() {
    let volume: ArrayD<i16> = Array::from_shape_fn(IxDyn(&[2, 20, 17, 11]), |ix| {
        let (z, y, x) = (ix[1] as i16, ix[2] as i16, ix[3] as i16);
        match (z / 5 + y / 4 + x / 3 + ix[0] as i16) % 4 {
            0 => 0,
            1 => 3,
            2 => 17,
            _ => -2,
        }
    });
    let source: BTreeSet<i16> = volume.iter().copied().collect();
    let levels: Vec<ArrayD<i16>> = Pyramid::new(volume.view(), &options(4, PyramidMethod::Gaussian, true))
        .unwrap()
        .collect();
    assert_eq!(levels.len(), 4);
    assert_eq!(levels[0], volume);
    for level in &levels[1..] {
        assert_eq!(level.shape()[0], 2);
        for v in level.iter() {
            assert!(source.contains(v), "label {} was not in the source", v);
        }
    }
}

#[test]
fn uniform_label_volume() {
    let volume = ArrayD::from_elem(IxDyn(&[6, 6, 6]), 9u8);
    for level in Pyramid::new(volume.view(), &options(3, PyramidMethod::Gaussian, true)).unwrap() {
        assert!(level.iter().all(|&v| v == 9));
    }
}

#[test]
fn pyramid_stops_once_shape_settles() {
    let volume = ArrayD::from_elem(IxDyn(&[2, 1, 1]), 1f32);
    let count = Pyramid::new(volume.view(), &options(5, PyramidMethod::Gaussian, false))
        .unwrap()
        .count();
    assert_eq!(count, 2);
}

#[test]
fn invalid_pyramids() {
    let flat = ArrayD::from_elem(IxDyn(&[4, 4]), 0u8);
    assert!(Pyramid::new(flat.view(), &options(2, PyramidMethod::Gaussian, false)).is_err());
    let volume = ArrayD::from_elem(IxDyn(&[4, 4, 4]), 0u8);
    assert!(Pyramid::new(volume.view(), &options(0, PyramidMethod::Gaussian, false)).is_err());
}
