// Test fixtures
// Builds small Standard MIDI Files in memory for import and pipeline tests

use midly::{Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind};

/// A note to write into a fixture file
#[derive(Debug, Clone, Copy)]
pub(crate) struct TestNote {
    pub on_tick: u32,
    pub off_tick: u32,
    pub key: u8,
    pub velocity: u8,
    pub channel: u8,
}

impl TestNote {
    pub fn new(on_tick: u32, off_tick: u32, key: u8, velocity: u8) -> Self {
        TestNote {
            on_tick,
            off_tick,
            key,
            velocity,
            channel: 0,
        }
    }

    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }
}

/// Single-track SMF bytes with an optional tempo event (microseconds per quarter)
pub(crate) fn smf_bytes(ppq: u16, tempo_us: Option<u32>, notes: &[TestNote]) -> Vec<u8> {
    let mut events: Vec<(u32, TrackEventKind)> = Vec::new();

    if let Some(tempo) = tempo_us {
        events.push((0, TrackEventKind::Meta(MetaMessage::Tempo(tempo.into()))));
    }

    for note in notes {
        events.push((
            note.on_tick,
            TrackEventKind::Midi {
                channel: note.channel.into(),
                message: MidiMessage::NoteOn {
                    key: note.key.into(),
                    vel: note.velocity.into(),
                },
            },
        ));
        events.push((
            note.off_tick,
            TrackEventKind::Midi {
                channel: note.channel.into(),
                message: MidiMessage::NoteOff {
                    key: note.key.into(),
                    vel: 0.into(),
                },
            },
        ));
    }

    // Stable: a note-off stays ahead of a note-on written after it at the same tick
    events.sort_by_key(|(tick, _)| *tick);

    let mut track = Track::new();
    let mut last_tick = 0;
    for (tick, kind) in events {
        track.push(TrackEvent {
            delta: (tick - last_tick).into(),
            kind,
        });
        last_tick = tick;
    }
    track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(ppq.into()),
        },
        tracks: vec![track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes).expect("fixture MIDI should serialize");
    bytes
}

/// Notes on a regular grid of `spacing_ticks` starting one spacing in,
/// each shifted by `offsets[i % offsets.len()]` ticks
pub(crate) fn grid_notes(count: u32, spacing_ticks: u32, offsets: &[i32]) -> Vec<TestNote> {
    (0..count)
        .map(|i| {
            let offset = if offsets.is_empty() {
                0
            } else {
                offsets[i as usize % offsets.len()]
            };
            let on_tick = (spacing_ticks as i64 * (i as i64 + 1) + offset as i64) as u32;
            let key = if i % 4 == 0 { 48 } else { 64 };
            TestNote::new(on_tick, on_tick + spacing_ticks / 2, key, 90)
        })
        .collect()
}
