// Chord salience heuristics
// Turns note-onset chords into weighted events for the beat tracker

use serde::{Deserialize, Serialize};

use crate::events::types::{Chord, Event};

/// Pitch used as the reference for the pitch weight of a chord
const PITCH_REFERENCE: f64 = 84.0;

/// Lowest pitches are clamped into this range before weighting
const PITCH_FLOOR: u8 = 48;
const PITCH_CEILING: u8 = 72;

/// Salience heuristic used to weight chords
/// Both are interchangeable; the pipeline may run one tracking per heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SalienceHeuristic {
    /// Long, low, loud chords are the most salient
    /// duration (s) * (84 - clamped lowest pitch) * ln(total velocity)
    DurationPitchVelocity,

    /// Plain sum of note velocities
    SummedVelocity,
}

impl SalienceHeuristic {
    /// All heuristics, in order of preference
    pub const ALL: [SalienceHeuristic; 2] = [
        SalienceHeuristic::DurationPitchVelocity,
        SalienceHeuristic::SummedVelocity,
    ];

    /// Compute the salience of a chord
    pub fn salience(&self, chord: &Chord, ticks_per_second: f64) -> f64 {
        match self {
            SalienceHeuristic::DurationPitchVelocity => {
                let duration_secs = if ticks_per_second > 0.0 {
                    chord.max_length_ticks() as f64 / ticks_per_second
                } else {
                    0.0
                };
                let pitch = chord
                    .lowest_pitch()
                    .unwrap_or(PITCH_CEILING)
                    .clamp(PITCH_FLOOR, PITCH_CEILING);
                let velocity = chord.total_velocity().max(1);

                duration_secs * (PITCH_REFERENCE - pitch as f64) * (velocity as f64).ln()
            }
            SalienceHeuristic::SummedVelocity => chord.total_velocity() as f64,
        }
    }

    pub fn to_string(&self) -> &'static str {
        match self {
            SalienceHeuristic::DurationPitchVelocity => "duration_pitch_velocity",
            SalienceHeuristic::SummedVelocity => "summed_velocity",
        }
    }
}

/// Convert chords into beat-tracker events
/// Output order follows chord order, so time-sorted chords give time-sorted events
pub fn events_from_chords(
    chords: &[Chord],
    ticks_per_second: f64,
    heuristic: SalienceHeuristic,
) -> Vec<Event> {
    if ticks_per_second <= 0.0 {
        return Vec::new();
    }

    chords
        .iter()
        .map(|chord| {
            Event::new(
                chord.on_tick as f64 / ticks_per_second,
                heuristic.salience(chord, ticks_per_second),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::ChordNote;

    fn chord(on_tick: u64, notes: &[(u8, u8, u32)]) -> Chord {
        Chord {
            on_tick,
            notes: notes
                .iter()
                .map(|&(pitch, velocity, length_ticks)| ChordNote {
                    pitch,
                    velocity,
                    length_ticks,
                })
                .collect(),
        }
    }

    #[test]
    fn test_summed_velocity() {
        let c = chord(0, &[(60, 100, 480), (64, 50, 480)]);
        let s = SalienceHeuristic::SummedVelocity.salience(&c, 960.0);

        assert_eq!(s, 150.0);
    }

    #[test]
    fn test_duration_pitch_velocity() {
        // 960 ticks at 960 ticks/s = 1s, lowest pitch 60, velocity 100
        let c = chord(0, &[(60, 100, 960), (72, 0, 480)]);
        let s = SalienceHeuristic::DurationPitchVelocity.salience(&c, 960.0);

        let expected = 1.0 * (84.0 - 60.0) * 100f64.ln();
        assert!((s - expected).abs() < 1e-9);
    }

    #[test]
    fn test_pitch_is_clamped() {
        let low = chord(0, &[(20, 64, 960)]);
        let floor = chord(0, &[(48, 64, 960)]);
        let high = chord(0, &[(100, 64, 960)]);
        let ceiling = chord(0, &[(72, 64, 960)]);

        let h = SalienceHeuristic::DurationPitchVelocity;
        assert_eq!(h.salience(&low, 960.0), h.salience(&floor, 960.0));
        assert_eq!(h.salience(&high, 960.0), h.salience(&ceiling, 960.0));
    }

    #[test]
    fn test_zero_velocity_is_not_negative() {
        let c = chord(0, &[(60, 0, 960)]);
        let s = SalienceHeuristic::DurationPitchVelocity.salience(&c, 960.0);

        // ln(1) = 0
        assert_eq!(s, 0.0);
    }

    #[test]
    fn test_events_from_chords() {
        let chords = vec![
            chord(0, &[(60, 100, 480)]),
            chord(480, &[(62, 80, 480)]),
            chord(1440, &[(64, 90, 480)]),
        ];

        let events = events_from_chords(&chords, 960.0, SalienceHeuristic::SummedVelocity);

        assert_eq!(events.len(), 3);
        assert_eq!(events[0], Event::new(0.0, 100.0));
        assert_eq!(events[1], Event::new(0.5, 80.0));
        assert_eq!(events[2], Event::new(1.5, 90.0));
    }

    #[test]
    fn test_events_from_chords_invalid_rate() {
        let chords = vec![chord(0, &[(60, 100, 480)])];

        assert!(events_from_chords(&chords, 0.0, SalienceHeuristic::SummedVelocity).is_empty());
    }
}
