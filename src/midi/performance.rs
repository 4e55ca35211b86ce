// Human performance check
// Decides whether note onsets look played (unaligned) rather than sequenced on a grid

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::events::Chord;

/// Below this share of grid-aligned onsets a file is treated as a human performance
pub const HUMAN_ALIGNMENT_THRESHOLD: f64 = 0.7;

/// Outcome of the human performance check
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PerformanceCheck {
    /// Share of distinct onset ticks lying exactly on a 1/32-note raster [0.0, 1.0]
    pub aligned_fraction: f64,

    /// True when the onsets look unquantized and beat tracking should be used
    pub is_human: bool,
}

/// Check chord onsets against a 1/32-note raster
/// No chords count as fully aligned (not human)
pub fn check_human_performance(chords: &[Chord], ppq: u16) -> PerformanceCheck {
    let raster = (ppq as u64 / 8).max(1);
    let onsets: BTreeSet<u64> = chords.iter().map(|c| c.on_tick).collect();

    if onsets.is_empty() {
        return PerformanceCheck {
            aligned_fraction: 1.0,
            is_human: false,
        };
    }

    let aligned = onsets.iter().filter(|&&tick| tick % raster == 0).count();
    let aligned_fraction = aligned as f64 / onsets.len() as f64;

    PerformanceCheck {
        aligned_fraction,
        is_human: aligned_fraction < HUMAN_ALIGNMENT_THRESHOLD,
    }
}
