// Event module
// Onset events and the chord-to-event salience heuristics

pub mod salience;
pub mod types;

pub use salience::{events_from_chords, SalienceHeuristic};
pub use types::{Chord, ChordNote, Event};
