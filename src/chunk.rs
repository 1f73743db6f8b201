//! Chunk layout planning.
//!
//! Users describe chunking sparsely: one size for every spatial axis, one
//! size per spatial axis, or a list of per-axis sizes, one per pyramid
//! level. The planner expands that description into one chunk tuple per
//! level, in array axis order, batch axes included.

use crate::error::{NiizarrError, Result};
use crate::layout::AxisLayout;
use std::fmt;
use std::str::FromStr;

/// Default chunk extent along spatial axes.
pub const DEFAULT_CHUNK: usize = 64;

/// A chunk size specification. Spatial sizes are given in NIfTI order
/// (x, y, z).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkSize {
    /// The same extent along every spatial axis, at every level.
    Uniform(usize),
    /// Per spatial axis extents, at every level. Missing trailing axes
    /// repeat the last given extent.
    PerAxis(Vec<usize>),
    /// Per spatial axis extents, per level. Levels past the last entry
    /// reuse it.
    PerLevel(Vec<Vec<usize>>),
}

impl Default for ChunkSize {
    fn default() -> Self {
        ChunkSize::Uniform(DEFAULT_CHUNK)
    }
}

impl From<usize> for ChunkSize {
    fn from(size: usize) -> Self {
        ChunkSize::Uniform(size)
    }
}

impl From<Vec<usize>> for ChunkSize {
    fn from(sizes: Vec<usize>) -> Self {
        ChunkSize::PerAxis(sizes)
    }
}

impl From<Vec<Vec<usize>>> for ChunkSize {
    fn from(sizes: Vec<Vec<usize>>) -> Self {
        ChunkSize::PerLevel(sizes)
    }
}

/// Parses `64`, `64,64,32` or `64,64,32;32` (levels separated by `;`).
impl FromStr for ChunkSize {
    type Err = NiizarrError;

    fn from_str(s: &str) -> Result<Self> {
        let parse_tuple = |t: &str| -> Result<Vec<usize>> {
            t.split(',')
                .map(|v| v.trim().parse::<usize>().map_err(|_| NiizarrError::InvalidChunkSize))
                .collect()
        };
        let mut levels = s
            .split(';')
            .map(parse_tuple)
            .collect::<Result<Vec<_>>>()?;
        let spec = if levels.len() > 1 {
            ChunkSize::PerLevel(levels)
        } else {
            match levels.pop() {
                Some(ref t) if t.len() == 1 => ChunkSize::Uniform(t[0]),
                Some(t) => ChunkSize::PerAxis(t),
                None => return Err(NiizarrError::InvalidChunkSize),
            }
        };
        spec.validate()?;
        Ok(spec)
    }
}

impl fmt::Display for ChunkSize {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let join = |t: &[usize]| t.iter().map(usize::to_string).collect::<Vec<_>>().join(",");
        match self {
            ChunkSize::Uniform(c) => write!(f, "{}", c),
            ChunkSize::PerAxis(t) => f.write_str(&join(t.as_slice())),
            ChunkSize::PerLevel(levels) => {
                let levels: Vec<String> = levels.iter().map(|t| join(t.as_slice())).collect();
                f.write_str(&levels.join(";"))
            }
        }
    }
}

impl ChunkSize {
    /// The specification as a list of per-level spatial tuples.
    pub fn levels(&self) -> Vec<Vec<usize>> {
        match self {
            ChunkSize::Uniform(c) => vec![vec![*c]],
            ChunkSize::PerAxis(t) => vec![t.clone()],
            ChunkSize::PerLevel(levels) => levels.clone(),
        }
    }

    /// Check that every tuple holds between 1 and 3 strictly positive
    /// extents.
    ///
    /// # Errors
    ///
    /// `NiizarrError::InvalidChunkSize` otherwise.
    pub fn validate(&self) -> Result<()> {
        let levels = self.levels();
        let ok = !levels.is_empty()
            && levels
                .iter()
                .all(|t| !t.is_empty() && t.len() <= 3 && t.iter().all(|&c| c > 0));
        if ok {
            Ok(())
        } else {
            Err(NiizarrError::InvalidChunkSize)
        }
    }
}

fn pad_spatial(t: &[usize]) -> [usize; 3] {
    let last = t[t.len() - 1];
    [t[0], *t.get(1).unwrap_or(&last), *t.get(2).unwrap_or(&last)]
}

/// Expand a chunk specification into one chunk tuple per level, in array
/// axis order.
///
/// `batch_chunks` holds the time and channel extents (see
/// [`AxisLayout::batch_chunks`]). Each spatial tuple is padded to 3 axes,
/// extended with the batch extents and permuted; the last tuple is repeated
/// up to `nb_levels` entries.
///
/// [`AxisLayout::batch_chunks`]: ../layout/struct.AxisLayout.html#method.batch_chunks
pub fn plan_chunks(
    spec: &ChunkSize,
    batch_chunks: &[usize],
    layout: &AxisLayout,
    nb_levels: usize,
) -> Result<Vec<Vec<usize>>> {
    spec.validate()?;
    if nb_levels == 0 {
        return Err(NiizarrError::InvalidLevelCount(nb_levels));
    }
    if batch_chunks.len() != layout.nbatch || batch_chunks.contains(&0) {
        return Err(NiizarrError::InvalidChunkSize);
    }
    let mut plan: Vec<Vec<usize>> = spec
        .levels()
        .iter()
        .map(|t| {
            let mut full = pad_spatial(t).to_vec();
            full.extend_from_slice(batch_chunks);
            layout.permute(&full)
        })
        .collect();
    plan.truncate(nb_levels);
    while plan.len() < nb_levels {
        let last = plan[plan.len() - 1].clone();
        plan.push(last);
    }
    Ok(plan)
}

/// The number of levels needed for the largest spatial axis to fit in a
/// single chunk: `ceil(log2(max(extent / chunk))) + 1`, at least 1.
///
/// `spatial_shape` is given in array order `(z, y, x)`. The chunk extents
/// paired with it are `chunk[0]` taken as is: a uniform extent or the first
/// per-axis entry applies to every axis, and the first per-level tuple
/// (padded to 3 entries) is matched element-wise, without reordering.
pub fn default_levels(spatial_shape: &[usize], spec: &ChunkSize) -> Result<usize> {
    spec.validate()?;
    let chunk = match spec {
        ChunkSize::Uniform(c) => [*c; 3],
        ChunkSize::PerAxis(t) => [t[0]; 3],
        ChunkSize::PerLevel(levels) => pad_spatial(&levels[0]),
    };
    let ratio = spatial_shape
        .iter()
        .zip(chunk.iter())
        .map(|(&n, &c)| n as f64 / c as f64)
        .fold(0., f64::max);
    if ratio <= 1. {
        return Ok(1);
    }
    Ok(ratio.log2().ceil() as usize + 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        assert_eq!("64".parse::<ChunkSize>().unwrap(), ChunkSize::Uniform(64));
        assert_eq!(
            "64, 32".parse::<ChunkSize>().unwrap(),
            ChunkSize::PerAxis(vec![64, 32])
        );
        let levels: ChunkSize = "64,64,32;32".parse().unwrap();
        assert_eq!(levels, ChunkSize::PerLevel(vec![vec![64, 64, 32], vec![32]]));
        assert_eq!(levels.to_string(), "64,64,32;32");
        assert!("0".parse::<ChunkSize>().is_err());
        assert!("a,b".parse::<ChunkSize>().is_err());
        assert!("1,2,3,4".parse::<ChunkSize>().is_err());
    }

    #[test]
    fn padding() {
        assert_eq!(pad_spatial(&[8]), [8, 8, 8]);
        assert_eq!(pad_spatial(&[8, 4]), [8, 4, 4]);
        assert!(default_levels(&[8, 8, 8], &ChunkSize::PerLevel(vec![])).is_err());
    }

    #[test]
    fn plan_for_3d() {
        let layout = AxisLayout::for_rank(3).unwrap();
        let plan = plan_chunks(&ChunkSize::PerAxis(vec![16, 32, 64]), &[], &layout, 2).unwrap();
        assert_eq!(plan, vec![vec![64, 32, 16], vec![64, 32, 16]]);
    }

    #[test]
    fn plan_per_level() {
        let layout = AxisLayout::for_rank(5).unwrap();
        let spec = ChunkSize::PerLevel(vec![vec![64, 32], vec![16]]);
        let plan = plan_chunks(&spec, &[1, 3], &layout, 3).unwrap();
        assert_eq!(
            plan,
            vec![vec![1, 3, 32, 32, 64], vec![1, 3, 16, 16, 16], vec![1, 3, 16, 16, 16]]
        );
        let plan = plan_chunks(&spec, &[1, 3], &layout, 1).unwrap();
        assert_eq!(plan.len(), 1);
    }

    #[test]
    fn plan_rejects_mismatched_batch() {
        let layout = AxisLayout::for_rank(4).unwrap();
        assert!(plan_chunks(&ChunkSize::Uniform(64), &[], &layout, 1).is_err());
        assert!(plan_chunks(&ChunkSize::Uniform(64), &[1], &layout, 0).is_err());
    }

    #[test]
    fn level_counts() {
        let spec = ChunkSize::Uniform(64);
        assert_eq!(default_levels(&[512, 512, 512], &spec).unwrap(), 4);
        assert_eq!(default_levels(&[128, 128, 128], &spec).unwrap(), 2);
        assert_eq!(default_levels(&[100, 64, 64], &spec).unwrap(), 2);
        assert_eq!(default_levels(&[32, 16, 1], &spec).unwrap(), 1);
        assert_eq!(default_levels(&[0, 0, 0], &spec).unwrap(), 1);
        // only the first per-axis extent counts
        let spec = ChunkSize::PerAxis(vec![32, 256, 256]);
        assert_eq!(default_levels(&[256, 256, 256], &spec).unwrap(), 4);
        // the first per-level tuple pairs with (z, y, x) as given
        let spec = ChunkSize::PerLevel(vec![vec![256, 32, 32], vec![16]]);
        assert_eq!(default_levels(&[256, 256, 256], &spec).unwrap(), 4);
        assert_eq!(default_levels(&[256, 32, 32], &spec).unwrap(), 1);
    }
}
