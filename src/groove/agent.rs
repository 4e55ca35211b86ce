// Beat tracking agent
// One tempo + phase hypothesis followed through the event stream

use super::config::{TrackerParams, CONF_FACTOR, CORRECTION_FACTOR, INNER_MARGIN};
use crate::events::Event;

/// Run-local source of agent identities
/// Each tracking run owns one, so ids never depend on other runs
#[derive(Debug, Default)]
pub struct IdAllocator {
    next: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        IdAllocator::default()
    }

    /// Hand out the next unused id
    pub fn next_id(&mut self) -> u64 {
        let id = self.next;
        self.next += 1;
        id
    }
}

/// Outcome of offering an event to an agent
#[derive(Debug)]
pub enum Verdict {
    /// The event was accepted as a beat
    Accepted,

    /// The event was accepted far from the predicted beat time;
    /// carries a copy of the agent from before the event, which skips it
    Forked(Agent),

    /// The event did not match a predicted beat
    Rejected,

    /// The agent went silent for longer than its expiry time
    Expired,
}

/// A beat tracking hypothesis
/// Holds a tempo, the time of its last beat, and a score of how well
/// its predictions matched the events it accepted
#[derive(Debug, Clone)]
pub struct Agent {
    id: u64,

    /// Current beat period (s)
    /// Stays within max_change of the initial period
    beat_interval: f64,

    /// Beat period the agent was created with (s)
    initial_beat_interval: f64,

    /// Time of the last accepted beat; None until the first one
    pub beat_time: Option<f64>,

    /// Silence (s) after which the agent expires
    pub expiry_time: f64,

    /// Allowed tempo drift, as a fraction of the initial beat period
    pub max_change: f64,

    /// Acceptance window before a predicted beat (s)
    pub pre_margin: f64,

    /// Acceptance window after a predicted beat (s)
    pub post_margin: f64,

    /// Deviation (s) above which an accepted event forks the agent
    pub inner_margin: f64,

    /// Inertia of tempo adaptation
    pub correction_factor: f64,

    phase_score: f64,
    beat_count: u32,
    events: Vec<Event>,
    marked: bool,
}

impl Agent {
    /// Create an unanchored agent for a beat period
    /// Margins are fixed from the initial beat period
    pub fn new(id: u64, beat_interval: f64, params: &TrackerParams) -> Self {
        Agent {
            id,
            beat_interval,
            initial_beat_interval: beat_interval,
            beat_time: None,
            expiry_time: params.expiry_time,
            max_change: params.max_change,
            pre_margin: beat_interval * params.pre_margin_factor,
            post_margin: beat_interval * params.post_margin_factor,
            inner_margin: INNER_MARGIN,
            correction_factor: CORRECTION_FACTOR,
            phase_score: 0.0,
            beat_count: 0,
            events: Vec::new(),
            marked: false,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Current beat period (s)
    pub fn beat_interval(&self) -> f64 {
        self.beat_interval
    }

    pub fn initial_beat_interval(&self) -> f64 {
        self.initial_beat_interval
    }

    /// Salience-weighted sum of the agent's matches
    pub fn phase_score(&self) -> f64 {
        self.phase_score
    }

    /// Beats covered by the agent, including skipped ones
    pub fn beat_count(&self) -> u32 {
        self.beat_count
    }

    /// Events accepted as beats, in time order
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// True once the agent has accepted a beat
    pub fn is_anchored(&self) -> bool {
        self.beat_time.is_some()
    }

    /// Flag the agent for removal at the next compaction
    pub fn mark_for_deletion(&mut self) {
        self.marked = true;
    }

    pub fn is_marked_for_deletion(&self) -> bool {
        self.marked
    }

    /// Copy of the agent under a fresh id
    pub fn fork(&self, id: u64) -> Agent {
        let mut agent = self.clone();
        agent.id = id;
        agent
    }

    /// Offer an event to the agent
    ///
    /// An unanchored agent takes any event as its first beat. Otherwise the
    /// event is accepted when it falls within [-pre_margin, post_margin] of a
    /// predicted beat at least one beat ahead. An accepted event further than
    /// inner_margin from the prediction forks the agent first.
    pub fn consider(&mut self, event: &Event, ids: &mut IdAllocator) -> Verdict {
        let Some(beat_time) = self.beat_time else {
            self.accept_event(event, 0.0, 1);
            return Verdict::Accepted;
        };

        let last_time = self.events.last().map(|e| e.time).unwrap_or(beat_time);
        if event.time - last_time > self.expiry_time {
            self.mark_for_deletion();
            return Verdict::Expired;
        }

        let beats = ((event.time - beat_time) / self.beat_interval).round_ties_even();
        let err = event.time - beat_time - beats * self.beat_interval;

        if beats > 0.0 && -self.pre_margin <= err && err <= self.post_margin {
            let fork = if err.abs() > self.inner_margin {
                Some(self.fork(ids.next_id()))
            } else {
                None
            };

            self.accept_event(event, err, beats as u32);

            return match fork {
                Some(agent) => Verdict::Forked(agent),
                None => Verdict::Accepted,
            };
        }

        Verdict::Rejected
    }

    /// Accept an event as a beat and update tempo and score
    /// `err` is the event time minus the predicted beat time,
    /// `beats` the number of beats since the previous accepted beat
    pub fn accept_event(&mut self, event: &Event, err: f64, beats: u32) {
        self.events.push(*event);
        self.beat_time = Some(event.time);

        // Adapt the tempo unless that would leave the allowed drift
        let correction = err / self.correction_factor;
        if (self.initial_beat_interval - self.beat_interval - correction).abs()
            < self.max_change * self.initial_beat_interval
        {
            self.beat_interval += correction;
        }

        self.beat_count += beats;

        let margin = if err > 0.0 {
            self.post_margin
        } else {
            -self.pre_margin
        };
        let confidence = if margin != 0.0 {
            1.0 - CONF_FACTOR * err / margin
        } else {
            1.0
        };
        self.phase_score += confidence * event.salience;
    }

    /// Beat times of the agent with skipped beats filled in
    ///
    /// Between consecutive accepted beats the number of beats is estimated
    /// as round(gap / beat_interval - 0.01), preferring fewer beats, and the
    /// missing ones are spaced evenly with zero salience. Filled beats before
    /// `start` are left out.
    pub fn interpolated_beats(&self, start: Option<f64>) -> Vec<Event> {
        let mut beats = Vec::with_capacity(self.events.len());

        let Some(first) = self.events.first() else {
            return beats;
        };
        beats.push(*first);

        for pair in self.events.windows(2) {
            let prev_beat = pair[0].time;
            let next_beat = pair[1].time;
            let gap = next_beat - prev_beat;

            let count = (gap / self.beat_interval - 0.01).round_ties_even();
            if count > 1.0 {
                let interval = gap / count;
                for k in 1..count as u32 {
                    let time = prev_beat + k as f64 * interval;
                    if start.map_or(true, |s| time >= s) {
                        beats.push(Event::new(time, 0.0));
                    }
                }
            }

            beats.push(pair[1]);
        }

        beats
    }
}
