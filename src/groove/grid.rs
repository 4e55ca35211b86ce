// Beat Grid - tracked beat times and queries over them
// The output of a tracking run, consumed to re-anchor note onsets

use serde::{Deserialize, Serialize};

/// Ascending beat times in seconds
/// An empty grid means beat tracking found no beat
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BeatGrid {
    beats: Vec<f64>,
}

impl BeatGrid {
    /// Build a grid from beat times, sorting them if needed
    pub fn new(mut beats: Vec<f64>) -> Self {
        beats.sort_by(|a, b| a.total_cmp(b));
        BeatGrid { beats }
    }

    pub fn times(&self) -> &[f64] {
        &self.beats
    }

    pub fn into_times(self) -> Vec<f64> {
        self.beats
    }

    pub fn len(&self) -> usize {
        self.beats.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beats.is_empty()
    }

    /// Find the beat nearest to a time
    /// Returns (beat_time, beat_index), or None for an empty grid
    pub fn nearest_beat(&self, time: f64) -> Option<(f64, usize)> {
        if self.beats.is_empty() {
            return None;
        }

        let upper = self.beats.partition_point(|&b| b < time);
        let idx = match (upper.checked_sub(1), self.beats.get(upper)) {
            (Some(below), Some(&above)) => {
                if time - self.beats[below] <= above - time {
                    below
                } else {
                    upper
                }
            }
            (Some(below), None) => below,
            (None, _) => upper,
        };

        Some((self.beats[idx], idx))
    }

    /// Mean beat period (s), if the grid holds at least two beats
    pub fn mean_interval(&self) -> Option<f64> {
        let first = self.beats.first()?;
        let last = self.beats.last()?;
        if self.beats.len() < 2 || last <= first {
            return None;
        }

        Some((last - first) / (self.beats.len() - 1) as f64)
    }

    /// Mean tempo in beats per minute
    pub fn bpm(&self) -> Option<f64> {
        self.mean_interval().map(|interval| 60.0 / interval)
    }
}
