//! Sample statistics over elevation windows.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::grid::{Grid, PixelWindow, Sample};

/// Minimum, maximum and mean of the valid samples in a window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeightStats {
    pub min: f32,
    pub max: f32,
    pub mean: f32,
    /// Number of samples that carried data.
    pub valid_count: u64,
}

#[derive(Debug, Clone, Copy)]
struct Accumulator {
    min: f32,
    max: f32,
    sum: f64,
    count: u64,
}

impl Accumulator {
    const EMPTY: Self = Self {
        min: f32::INFINITY,
        max: f32::NEG_INFINITY,
        sum: 0.0,
        count: 0,
    };

    fn push(mut self, value: f32) -> Self {
        if !value.is_nodata() {
            self.min = self.min.min(value);
            self.max = self.max.max(value);
            self.sum += value as f64;
            self.count += 1;
        }
        self
    }

    fn merge(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
            sum: self.sum + other.sum,
            count: self.count + other.count,
        }
    }

    fn finish(self) -> Option<HeightStats> {
        (self.count > 0).then(|| HeightStats {
            min: self.min,
            max: self.max,
            mean: (self.sum / self.count as f64) as f32,
            valid_count: self.count,
        })
    }
}

/// Statistics over all valid samples of a slice.
///
/// Returns `None` when every sample is no-data.
pub fn height_stats(samples: &[f32]) -> Option<HeightStats> {
    samples
        .iter()
        .fold(Accumulator::EMPTY, |acc, v| acc.push(*v))
        .finish()
}

/// Statistics over a window of a grid.
pub fn window_stats(grid: &Grid<f32>, window: PixelWindow) -> Option<HeightStats> {
    (window.y..window.bottom())
        .map(|y| &grid.row(y)[window.x as usize..window.right() as usize])
        .fold(Accumulator::EMPTY, |acc, row| {
            row.iter().fold(acc, |acc, v| acc.push(*v))
        })
        .finish()
}

/// Statistics over a whole grid, computed in parallel row chunks.
pub fn par_grid_stats(grid: &Grid<f32>) -> Option<HeightStats> {
    let chunk = (grid.width() as usize).max(1) * 64;
    grid.as_slice()
        .par_chunks(chunk)
        .map(|part| part.iter().fold(Accumulator::EMPTY, |acc, v| acc.push(*v)))
        .reduce(|| Accumulator::EMPTY, Accumulator::merge)
        .finish()
}
