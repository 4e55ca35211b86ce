// MIDI module
// Standard MIDI File import and performance analysis for beat tracking

pub mod import;
pub mod performance;

#[cfg(test)]
pub(crate) mod fixtures;

pub use import::{find_basic_tempo, import_chords, ImportedMidi, MidiImportError, MidiImportOptions};
pub use performance::{check_human_performance, PerformanceCheck};
