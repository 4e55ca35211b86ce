// Beatgrid - Beat tracking for MIDI performances
// Module declarations

pub mod events;
pub mod groove;
pub mod midi;
pub mod pipeline;

pub use events::{events_from_chords, Chord, ChordNote, Event, SalienceHeuristic};
pub use groove::{
    beat_track, track_beats, track_with_tempi, BeatGrid, ConfigError, TrackResult, TrackerParams,
};
pub use midi::{import_chords, ImportedMidi, MidiImportError, MidiImportOptions};
pub use pipeline::{analyze_midi, analyze_midi_file, AnalysisOptions, BeatAnalysis, PipelineError};
