//! Canonical axis layouts of nifti-zarr arrays.
//!
//! NIfTI volumes are indexed `(x, y, z[, t[, c]])` with `x` varying fastest,
//! while nifti-zarr arrays are indexed `([t, [c,]] z, y, x)`.

use crate::error::{NiizarrError, Result};

/// The axis arrangement used for a volume of a given rank.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AxisLayout {
    /// Array axis `i` is NIfTI axis `perm[i]`.
    pub perm: Vec<usize>,
    /// OME axis names, slowest first.
    pub axes: Vec<&'static str>,
    /// xarray dimension names (`_ARRAY_DIMENSIONS`), slowest first.
    pub dimension_names: Vec<&'static str>,
    /// Number of leading batch axes (time and channel).
    pub nbatch: usize,
}

impl AxisLayout {
    /// Pick the layout for a volume of the given rank.
    ///
    /// # Errors
    ///
    /// `NiizarrError::UnsupportedRank` unless the rank is 3, 4 or 5.
    pub fn for_rank(rank: usize) -> Result<Self> {
        let layout = match rank {
            5 => AxisLayout {
                perm: vec![3, 4, 2, 1, 0],
                axes: vec!["t", "c", "z", "y", "x"],
                dimension_names: vec!["time", "channel", "z", "y", "x"],
                nbatch: 2,
            },
            4 => AxisLayout {
                perm: vec![3, 2, 1, 0],
                axes: vec!["t", "z", "y", "x"],
                dimension_names: vec!["time", "z", "y", "x"],
                nbatch: 1,
            },
            3 => AxisLayout {
                perm: vec![2, 1, 0],
                axes: vec!["z", "y", "x"],
                dimension_names: vec!["z", "y", "x"],
                nbatch: 0,
            },
            r => return Err(NiizarrError::UnsupportedRank(r)),
        };
        Ok(layout)
    }

    /// The rank this layout applies to.
    pub fn rank(&self) -> usize {
        self.perm.len()
    }

    /// Chunk extents of the batch axes, in NIfTI order (time, then
    /// channel). A requested size of zero means a single chunk along the
    /// whole axis.
    pub fn batch_chunks(&self, nifti_shape: &[usize], chunk_time: usize, chunk_channel: usize) -> Vec<usize> {
        let pick = |requested: usize, axis: usize| {
            if requested == 0 {
                nifti_shape.get(axis).copied().unwrap_or(1)
            } else {
                requested
            }
        };
        match self.nbatch {
            2 => vec![pick(chunk_time, 3), pick(chunk_channel, 4)],
            1 => vec![pick(chunk_time, 3)],
            _ => Vec::new(),
        }
    }

    /// The permutation taking array axes back to NIfTI order.
    pub fn inverse_perm(&self) -> Vec<usize> {
        let mut inverse = vec![0; self.perm.len()];
        for (i, &p) in self.perm.iter().enumerate() {
            inverse[p] = i;
        }
        inverse
    }

    /// Reorder a NIfTI-ordered tuple into array order.
    pub fn permute<T: Copy>(&self, values: &[T]) -> Vec<T> {
        self.perm.iter().map(|&i| values[i]).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layouts() {
        let l = AxisLayout::for_rank(4).unwrap();
        assert_eq!(l.rank(), 4);
        assert_eq!(l.nbatch, 1);
        assert_eq!(l.permute(&[10, 20, 30, 40]), vec![40, 30, 20, 10]);

        let l = AxisLayout::for_rank(5).unwrap();
        assert_eq!(l.permute(&["x", "y", "z", "t", "c"]), vec!["t", "c", "z", "y", "x"]);
        assert_eq!(l.batch_chunks(&[8, 8, 8, 6, 3], 0, 2), vec![6, 2]);
        assert_eq!(l.batch_chunks(&[8, 8, 8, 6, 3], 1, 0), vec![1, 3]);

        assert_eq!(l.inverse_perm(), vec![4, 3, 2, 0, 1]);

        assert!(AxisLayout::for_rank(3).unwrap().batch_chunks(&[8, 8, 8], 1, 1).is_empty());
        assert_eq!(AxisLayout::for_rank(3).unwrap().inverse_perm(), vec![2, 1, 0]);
    }

    #[test]
    fn unsupported_ranks() {
        for rank in &[0, 1, 2, 6, 7] {
            assert!(matches!(
                AxisLayout::for_rank(*rank),
                Err(NiizarrError::UnsupportedRank(r)) if r == *rank
            ));
        }
    }
}
