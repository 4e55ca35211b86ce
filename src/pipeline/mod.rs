// Pipeline execution and monitoring module
// Runs MIDI import, performance check and beat tracking as one traced analysis

pub mod analysis;
pub mod trace;

pub use analysis::{analyze_midi, analyze_midi_file, AnalysisOptions, BeatAnalysis, PipelineError};
pub use trace::{read_trace_file, TraceBuilder, TraceEntry, TraceError, TraceStage, TraceWriter};
