// Event types
// Onset events fed to the beat tracker and the chords they are derived from

use serde::{Deserialize, Serialize};

/// A time-stamped, weighted onset
/// Events are immutable values; the tracker only ever copies them
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Event {
    /// Onset time in seconds from the start of the piece
    pub time: f64,

    /// Non-negative weight of the onset
    /// Higher values mark onsets more likely to fall on a beat
    pub salience: f64,
}

impl Event {
    pub fn new(time: f64, salience: f64) -> Self {
        Event { time, salience }
    }
}

/// A single note inside a chord
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChordNote {
    /// MIDI key number (60 = middle C)
    pub pitch: u8,

    /// Note-on velocity [1, 127]
    pub velocity: u8,

    /// Note length in MIDI ticks (note-on to matching note-off)
    pub length_ticks: u32,
}

/// Notes sharing one onset tick
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chord {
    /// Absolute onset time in MIDI ticks
    pub on_tick: u64,

    /// Notes starting at `on_tick`, in file order
    pub notes: Vec<ChordNote>,
}

impl Chord {
    pub fn new(on_tick: u64) -> Self {
        Chord {
            on_tick,
            notes: Vec::new(),
        }
    }

    /// Longest note of the chord, in ticks
    pub fn max_length_ticks(&self) -> u32 {
        self.notes.iter().map(|n| n.length_ticks).max().unwrap_or(0)
    }

    /// Lowest pitch of the chord, if any notes are present
    pub fn lowest_pitch(&self) -> Option<u8> {
        self.notes.iter().map(|n| n.pitch).min()
    }

    /// Sum of note velocities
    pub fn total_velocity(&self) -> u32 {
        self.notes.iter().map(|n| n.velocity as u32).sum()
    }
}
