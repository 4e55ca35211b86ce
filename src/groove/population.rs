// Agent population
// Drives every tempo hypothesis through the event stream, forking, expiring and pruning agents

use super::agent::{Agent, IdAllocator, Verdict};
use super::config::{TrackerParams, DEFAULT_BI, DEFAULT_BT, LATE_PHASE_WINDOW};
use crate::events::Event;

/// The live agents of one tracking run
/// Kept ordered by (beat_interval, id) between events
#[derive(Debug, Default)]
pub struct AgentList {
    agents: Vec<Agent>,
    ids: IdAllocator,
}

impl AgentList {
    pub fn new() -> Self {
        AgentList::default()
    }

    /// One fresh agent per induced beat period
    pub fn from_tempi(tempi: &[f64], params: &TrackerParams) -> Self {
        let mut list = AgentList::new();
        for &beat_interval in tempi {
            let id = list.ids.next_id();
            list.add(Agent::new(id, beat_interval, params));
        }
        list
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    /// Insert an agent, keeping (beat_interval, id) order
    pub fn add(&mut self, agent: Agent) {
        let pos = self
            .agents
            .partition_point(|a| agent_order(a, &agent).is_lt());
        self.agents.insert(pos, agent);
    }

    /// Track beats through a time-sorted event list
    ///
    /// Each event is offered to every live agent in (beat_interval, id)
    /// order. Forks, and new phases for tempi that missed an early event,
    /// join the population only after the scan. Expired agents and
    /// duplicates are removed before the next event.
    pub fn beat_track(&mut self, events: &[Event], params: &TrackerParams) {
        let phase_given = self.agents.first().is_some_and(Agent::is_anchored);
        let mut pending: Vec<Agent> = Vec::new();
        let mut processed = 0usize;

        for event in events {
            if params.stop_time.is_some_and(|stop| event.time > stop) {
                break;
            }

            let mut created = phase_given;
            let mut prev_beat_interval: Option<f64> = None;

            for idx in 0..self.agents.len() {
                let beat_interval = self.agents[idx].beat_interval();

                if prev_beat_interval != Some(beat_interval) {
                    if let Some(prev) = prev_beat_interval {
                        if !created && event.time < LATE_PHASE_WINDOW {
                            // No agent at the previous tempo took this event: try it as a new phase
                            let mut agent = Agent::new(self.ids.next_id(), prev, params);
                            agent.consider(event, &mut self.ids);
                            pending.push(agent);
                        }
                    }
                    prev_beat_interval = Some(beat_interval);
                    created = phase_given;
                }

                match self.agents[idx].consider(event, &mut self.ids) {
                    Verdict::Accepted => created = true,
                    Verdict::Forked(fork) => {
                        pending.push(fork);
                        created = true;
                    }
                    Verdict::Rejected | Verdict::Expired => {}
                }
            }

            self.agents.append(&mut pending);
            self.prune();
            processed += 1;

            log::trace!(
                "Event at {:.3}s: {} live agents",
                event.time,
                self.agents.len()
            );
        }

        log::debug!(
            "Beat tracking: {} of {} events processed, {} agents remain",
            processed,
            events.len(),
            self.agents.len()
        );
    }

    /// Drop expired agents, restore ordering, then drop duplicates
    fn prune(&mut self) {
        self.agents.retain(|a| !a.is_marked_for_deletion());
        self.sort();
        self.remove_duplicates();
    }

    fn sort(&mut self) {
        self.agents.sort_by(agent_order);
    }

    /// Remove agents that duplicate another agent's tempo and phase
    ///
    /// Two agents are duplicates when their beat periods differ by at most
    /// DEFAULT_BI and their last beats by at most DEFAULT_BT. Of a pair the
    /// one with the higher phase score survives; ties keep the earlier one.
    /// Requires (beat_interval, id) order.
    fn remove_duplicates(&mut self) {
        let len = self.agents.len();

        for i in 0..len {
            if self.agents[i].is_marked_for_deletion() {
                continue;
            }

            for j in i + 1..len {
                if self.agents[j].beat_interval() - self.agents[i].beat_interval() > DEFAULT_BI {
                    break;
                }
                if self.agents[j].is_marked_for_deletion() {
                    continue;
                }
                if !same_phase(&self.agents[i], &self.agents[j]) {
                    continue;
                }

                if self.agents[i].phase_score() < self.agents[j].phase_score() {
                    self.agents[i].mark_for_deletion();
                    break;
                }
                self.agents[j].mark_for_deletion();
            }
        }

        self.agents.retain(|a| !a.is_marked_for_deletion());
    }

    /// The agent with the best score, or None if tracking failed
    ///
    /// Only agents that accepted at least one beat qualify. The score is the
    /// phase score, divided by the beat count in average-salience mode.
    /// Ties keep the earlier agent.
    pub fn best_agent(&self, use_average_salience: bool) -> Option<&Agent> {
        let mut best: Option<(&Agent, f64)> = None;

        for agent in self.agents.iter().filter(|a| !a.events().is_empty()) {
            let score = if use_average_salience {
                agent.phase_score() / agent.beat_count().max(1) as f64
            } else {
                agent.phase_score()
            };

            if best.map_or(true, |(_, top)| score > top) {
                best = Some((agent, score));
            }
        }

        best.map(|(agent, _)| agent)
    }
}

fn agent_order(a: &Agent, b: &Agent) -> std::cmp::Ordering {
    a.beat_interval()
        .total_cmp(&b.beat_interval())
        .then(a.id().cmp(&b.id()))
}

fn same_phase(a: &Agent, b: &Agent) -> bool {
    match (a.beat_time, b.beat_time) {
        (Some(ta), Some(tb)) => (ta - tb).abs() <= DEFAULT_BT,
        (None, None) => true,
        _ => false,
    }
}
