#[macro_use]
extern crate pretty_assertions;

use niizarr::chunk::default_levels;
use niizarr::layout::AxisLayout;
use niizarr::{plan_chunks, ChunkSize};

#[test]
fn rank4_plan_has_a_time_chunk() {
    let layout = AxisLayout::for_rank(4).unwrap();
    let nifti_shape = [96, 96, 40, 12];

    let batch = layout.batch_chunks(&nifti_shape, 1, 1);
    let plan = plan_chunks(&ChunkSize::Uniform(32), &batch, &layout, 3).unwrap();
    assert_eq!(plan.len(), 3);
    for tuple in &plan {
        assert_eq!(tuple, &vec![1, 32, 32, 32]);
    }

    // unchunked time axis
    let batch = layout.batch_chunks(&nifti_shape, 0, 1);
    let plan = plan_chunks(&ChunkSize::Uniform(32), &batch, &layout, 1).unwrap();
    assert_eq!(plan, vec![vec![12, 32, 32, 32]]);
}

#[test]
fn rank5_plan_orders_time_before_channel() {
    let layout = AxisLayout::for_rank(5).unwrap();
    let batch = layout.batch_chunks(&[64, 64, 64, 5, 3], 2, 0);
    let spec: ChunkSize = "64,32,16".parse().unwrap();
    let plan = plan_chunks(&spec, &batch, &layout, 2).unwrap();
    assert_eq!(plan, vec![vec![2, 3, 16, 32, 64], vec![2, 3, 16, 32, 64]]);
}

#[test]
fn per_level_tuples_are_padded_and_repeated() {
    let layout = AxisLayout::for_rank(3).unwrap();
    let spec = ChunkSize::PerLevel(vec![vec![128, 64], vec![32]]);
    let plan = plan_chunks(&spec, &[], &layout, 4).unwrap();
    assert_eq!(
        plan,
        vec![
            vec![64, 64, 128],
            vec![32, 32, 32],
            vec![32, 32, 32],
            vec![32, 32, 32],
        ]
    );
}

#[test]
fn default_level_counts() {
    let spec = ChunkSize::Uniform(64);
    assert_eq!(default_levels(&[512, 512, 512], &spec).unwrap(), 4);
    assert_eq!(default_levels(&[128, 128, 128], &spec).unwrap(), 2);
    assert_eq!(default_levels(&[64, 64, 64], &spec).unwrap(), 1);
    assert_eq!(default_levels(&[65, 10, 10], &spec).unwrap(), 2);
}

#[test]
fn default_levels_on_anisotropic_shapes() {
    // (z, y, x) shape of a 64 x 64 x 256 volume
    let shape = [256, 64, 64];
    let per_level = ChunkSize::PerLevel(vec![vec![32, 32, 256]]);
    assert_eq!(default_levels(&shape, &per_level).unwrap(), 4);
    let per_axis = ChunkSize::PerAxis(vec![64, 32]);
    assert_eq!(default_levels(&shape, &per_axis).unwrap(), 3);
    assert_eq!(default_levels(&shape, &ChunkSize::Uniform(256)).unwrap(), 1);
}

#[test]
fn malformed_chunk_sizes() {
    for text in &["", "0", "64,,64", "-1", "8,8,8,8", "8;0"] {
        assert!(text.parse::<ChunkSize>().is_err(), "accepted {:?}", text);
    }
}
