// Beat Tracker - induction, agent tracking, selection and interpolation
// A tracking run is a pure function of (events, params) and owns its whole population

use serde::{Deserialize, Serialize};

use super::config::TrackerParams;
use super::grid::BeatGrid;
use super::induction::induce_tempi;
use super::population::AgentList;
use crate::events::Event;

/// Result of one beat tracking run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TrackResult {
    /// Tracked beats, skipped beats filled in
    pub beats: BeatGrid,

    /// Phase score of the winning agent (0 if tracking failed)
    pub score: f64,

    /// Beats counted by the winning agent
    pub beat_count: u32,

    /// Final beat period of the winning agent (s)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub beat_interval: Option<f64>,

    /// Share of the total event salience explained by the winning agent
    /// Comparable across salience heuristics; 0 if tracking failed
    pub coverage: f64,

    /// Number of tempo hypotheses induced
    pub hypotheses: usize,
}

impl TrackResult {
    /// True when tracking found a beat
    pub fn is_tracked(&self) -> bool {
        !self.beats.is_empty()
    }
}

/// Track beats through a time-sorted event list
///
/// Algorithm:
/// 1. Induce tempo hypotheses from inter-onset intervals
/// 2. Start one agent per hypothesis and run them over the events
/// 3. Pick the agent with the best score
/// 4. Fill in the beats it skipped
///
/// Degenerate inputs (fewer than two events, no hypothesis, no accepted
/// beat) give an empty result rather than an error.
pub fn beat_track(events: &[Event], params: &TrackerParams) -> TrackResult {
    let tempi = induce_tempi(events);
    track_with_tempi(events, &tempi, params)
}

/// Track beats from tempo hypotheses induced beforehand
/// Steps 2 to 4 of `beat_track`; empty tempi give an empty result
pub fn track_with_tempi(events: &[Event], tempi: &[f64], params: &TrackerParams) -> TrackResult {
    if tempi.is_empty() {
        log::debug!("No tempo hypothesis for {} events", events.len());
        return TrackResult::default();
    }

    let mut agents = AgentList::from_tempi(tempi, params);
    agents.beat_track(events, params);

    let Some(best) = agents.best_agent(params.use_average_salience) else {
        log::debug!("Beat tracking failed: no agent accepted a beat");
        return TrackResult {
            hypotheses: tempi.len(),
            ..Default::default()
        };
    };

    let beats: Vec<f64> = best
        .interpolated_beats(None)
        .iter()
        .map(|e| e.time)
        .collect();

    let total_salience: f64 = events.iter().map(|e| e.salience).sum();
    let coverage = if total_salience > 0.0 {
        best.phase_score() / total_salience
    } else {
        0.0
    };

    log::info!(
        "Tracked {} beats at {:.1} BPM (score {:.3}, {} hypotheses)",
        beats.len(),
        60.0 / best.beat_interval(),
        best.phase_score(),
        tempi.len()
    );

    TrackResult {
        beats: BeatGrid::new(beats),
        score: best.phase_score(),
        beat_count: best.beat_count(),
        beat_interval: Some(best.beat_interval()),
        coverage,
        hypotheses: tempi.len(),
    }
}

/// Beat times (s) for a time-sorted event list; empty if tracking fails
pub fn track_beats(events: &[Event], params: &TrackerParams) -> Vec<f64> {
    beat_track(events, params).beats.into_times()
}
