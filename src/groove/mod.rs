// Groove Engine - Tempo induction and multi-agent beat tracking
// Infers a beat grid from weighted onset events

pub mod agent;
pub mod config;
pub mod grid;
pub mod induction;
pub mod population;
pub mod tracker;

pub use agent::{Agent, IdAllocator, Verdict};
pub use config::{ConfigError, TrackerParams};
pub use grid::BeatGrid;
pub use induction::{induce_tempi, IoiCluster};
pub use population::AgentList;
pub use tracker::{beat_track, track_beats, track_with_tempi, TrackResult};
