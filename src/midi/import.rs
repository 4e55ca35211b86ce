// MIDI Import - Standard MIDI File to onset chords using midly crate
// Groups simultaneous note-ons into chords and derives the basic tempo

use midly::{MetaMessage, MidiMessage, Smf, Timing, Track, TrackEventKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use thiserror::Error;

use crate::events::{Chord, ChordNote};

/// Channel 10 (0-indexed = 9) is drums
const DRUM_CHANNEL: u8 = 9;

/// Tempo assumed when the file carries no tempo event: 120 BPM
const DEFAULT_BEATS_PER_SECOND: f64 = 2.0;

/// Errors that can occur during MIDI import
#[derive(Debug, Error)]
pub enum MidiImportError {
    #[error("MIDI parse error: {0}")]
    Parse(#[from] midly::Error),

    #[error("Unsupported MIDI timing: only metrical (ticks per quarter note) files are supported")]
    UnsupportedTiming,

    #[error("MIDI file contains no notes")]
    NoNotes,
}

/// MIDI import options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MidiImportOptions {
    /// Include notes on the drum channel
    pub include_drums: bool,
}

/// Chords of a MIDI file with the timing needed to place them in seconds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportedMidi {
    /// Pulses per quarter note
    pub ppq: u16,

    /// Basic tempo in beats per second
    pub beats_per_second: f64,

    /// Ticks per second at the basic tempo
    pub ticks_per_second: f64,

    /// Chords of all tracks, ordered by onset tick
    pub chords: Vec<Chord>,
}

/// Parse a Standard MIDI File and collect its note-onset chords
///
/// Notes of all tracks starting on the same tick form one chord. A note
/// lasts until the matching note-off (or zero-velocity note-on) on the same
/// channel and key; notes left open end with their track.
pub fn import_chords(
    bytes: &[u8],
    options: &MidiImportOptions,
) -> Result<ImportedMidi, MidiImportError> {
    let smf = Smf::parse(bytes)?;

    let ppq = match smf.header.timing {
        Timing::Metrical(ppq) => ppq.as_int(),
        Timing::Timecode(..) => return Err(MidiImportError::UnsupportedTiming),
    };
    if ppq == 0 {
        return Err(MidiImportError::UnsupportedTiming);
    }

    let beats_per_second = find_basic_tempo(&smf.tracks);
    let ticks_per_second = ppq as f64 * beats_per_second;

    let mut notes: Vec<(u64, ChordNote)> = Vec::new();
    for track in &smf.tracks {
        collect_track_notes(track, options, &mut notes);
    }

    if notes.is_empty() {
        return Err(MidiImportError::NoNotes);
    }

    let chords = group_into_chords(notes);

    log::info!(
        "Imported {} chords from {} tracks ({} PPQ, {:.1} BPM)",
        chords.len(),
        smf.tracks.len(),
        ppq,
        beats_per_second * 60.0
    );

    Ok(ImportedMidi {
        ppq,
        beats_per_second,
        ticks_per_second,
        chords,
    })
}

/// Tempo of the first tempo event in the file, in beats per second
pub fn find_basic_tempo(tracks: &[Track]) -> f64 {
    for track in tracks {
        for event in track {
            if let TrackEventKind::Meta(MetaMessage::Tempo(tempo)) = event.kind {
                let us_per_quarter = tempo.as_int();
                if us_per_quarter > 0 {
                    return 1_000_000.0 / us_per_quarter as f64;
                }
            }
        }
    }

    DEFAULT_BEATS_PER_SECOND
}

/// Collect (on_tick, note) pairs of one track, in note-on order
fn collect_track_notes(
    track: &Track,
    options: &MidiImportOptions,
    notes: &mut Vec<(u64, ChordNote)>,
) {
    let mut open: HashMap<(u8, u8), VecDeque<usize>> = HashMap::new();
    let mut tick: u64 = 0;

    for event in track {
        tick += event.delta.as_int() as u64;

        let TrackEventKind::Midi { channel, message } = event.kind else {
            continue;
        };
        let channel = channel.as_int();
        if channel == DRUM_CHANNEL && !options.include_drums {
            continue;
        }

        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                notes.push((
                    tick,
                    ChordNote {
                        pitch: key.as_int(),
                        velocity: vel.as_int(),
                        length_ticks: 0,
                    },
                ));
                open.entry((channel, key.as_int()))
                    .or_default()
                    .push_back(notes.len() - 1);
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                let Some(idx) = open
                    .get_mut(&(channel, key.as_int()))
                    .and_then(|pending| pending.pop_front())
                else {
                    continue;
                };
                let (on_tick, note) = &mut notes[idx];
                note.length_ticks = tick.saturating_sub(*on_tick).min(u32::MAX as u64) as u32;
            }
            _ => {}
        }
    }

    // Notes never switched off last until the end of the track
    for idx in open.into_values().flatten() {
        let (on_tick, note) = &mut notes[idx];
        note.length_ticks = tick.saturating_sub(*on_tick).min(u32::MAX as u64) as u32;
    }
}

/// Merge notes sharing an onset tick into chords ordered by tick
fn group_into_chords(mut notes: Vec<(u64, ChordNote)>) -> Vec<Chord> {
    notes.sort_by_key(|(tick, _)| *tick);

    let mut chords: Vec<Chord> = Vec::new();
    for (tick, note) in notes {
        match chords.last_mut() {
            Some(chord) if chord.on_tick == tick => chord.notes.push(note),
            _ => {
                let mut chord = Chord::new(tick);
                chord.notes.push(note);
                chords.push(chord);
            }
        }
    }

    chords
}
