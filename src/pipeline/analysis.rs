// Beat analysis of a MIDI performance
// Import, human check, one tracking run per salience heuristic, selection

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tokio::task::{JoinError, JoinHandle};
use uuid::Uuid;

use super::trace::{TraceBuilder, TraceEntry, TraceError, TraceStage, TraceWriter};
use crate::events::{events_from_chords, Event, SalienceHeuristic};
use crate::groove::{induce_tempi, track_with_tempi, ConfigError, TrackResult, TrackerParams};
use crate::midi::{
    check_human_performance, import_chords, ImportedMidi, MidiImportError, MidiImportOptions,
    PerformanceCheck,
};

/// Errors that can occur during a beat analysis
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("MIDI import failed: {0}")]
    Import(#[from] MidiImportError),

    #[error("Invalid tracker parameters: {0}")]
    Config(#[from] ConfigError),

    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Tracking task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Options for a beat analysis
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisOptions {
    pub import: MidiImportOptions,

    pub params: TrackerParams,

    /// Track beats even when the onsets look quantized
    pub always_track: bool,
}

/// Outcome of a beat analysis
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BeatAnalysis {
    /// Identifies this analysis in the trace file
    pub run_id: Uuid,

    /// Ticks per second at the basic tempo of the file
    pub ticks_per_second: f64,

    pub performance: PerformanceCheck,

    /// True when a beat grid was found
    pub tracked: bool,

    /// Heuristic of the chosen tracking run
    #[serde(skip_serializing_if = "Option::is_none")]
    pub heuristic: Option<SalienceHeuristic>,

    /// Chosen tracking run; None when tracking was skipped or failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TrackResult>,
}

impl BeatAnalysis {
    /// Beat times (s); empty unless tracked
    pub fn beats(&self) -> &[f64] {
        self.result
            .as_ref()
            .map(|r| r.beats.times())
            .unwrap_or_default()
    }

    /// Beat positions in ticks at the basic tempo
    pub fn beat_ticks(&self) -> Vec<u64> {
        self.beats()
            .iter()
            .map(|&t| (t * self.ticks_per_second).round().max(0.0) as u64)
            .collect()
    }
}

/// Analyze a Standard MIDI File held in memory
///
/// Tracking runs only for human performances unless `always_track` is set.
/// Both salience heuristics are tracked concurrently on the blocking pool;
/// the run explaining the larger share of event salience wins, ties going to
/// the heuristic listed first in `SalienceHeuristic::ALL`.
pub async fn analyze_midi(
    bytes: &[u8],
    options: &AnalysisOptions,
    trace: Option<&TraceWriter>,
) -> Result<BeatAnalysis, PipelineError> {
    options.params.validate()?;

    let run_id = Uuid::new_v4();
    write_trace(trace, TraceBuilder::stage(run_id, TraceStage::Import).start("Importing MIDI"))?;

    let midi = import_chords(bytes, &options.import)?;
    let performance = check_human_performance(&midi.chords, midi.ppq);

    write_trace(
        trace,
        TraceBuilder::stage(run_id, TraceStage::Import)
            .complete(format!("Imported {} chords", midi.chords.len()))
            .with_data(serde_json::json!({
                "chords": midi.chords.len(),
                "ppq": midi.ppq,
                "beats_per_second": midi.beats_per_second,
                "aligned_fraction": performance.aligned_fraction,
                "is_human": performance.is_human,
            })),
    )?;

    let mut analysis = BeatAnalysis {
        run_id,
        ticks_per_second: midi.ticks_per_second,
        performance,
        tracked: false,
        heuristic: None,
        result: None,
    };

    if !performance.is_human && !options.always_track {
        log::info!(
            "{:.0}% of onsets lie on the grid, skipping beat tracking",
            performance.aligned_fraction * 100.0
        );
        write_trace(
            trace,
            TraceBuilder::stage(run_id, TraceStage::Selection)
                .complete("Quantized input, beat tracking skipped"),
        )?;
        return Ok(analysis);
    }

    let induced = induce_heuristics(&midi);
    for (i, run) in induced.iter().enumerate() {
        write_trace(
            trace,
            TraceBuilder::stage(run_id, TraceStage::Induction)
                .progress(
                    (i + 1) as f32 / induced.len() as f32,
                    format!(
                        "{} tempo hypotheses for {}",
                        run.tempi.len(),
                        run.heuristic.to_string()
                    ),
                )
                .with_data(serde_json::json!({
                    "heuristic": run.heuristic,
                    "events": run.events.len(),
                    "tempi": run.tempi,
                })),
        )?;
    }

    write_trace(
        trace,
        TraceBuilder::stage(run_id, TraceStage::Tracking)
            .start(format!("Tracking {} heuristics", induced.len())),
    )?;

    let runs = track_heuristics(induced, &options.params).await?;

    let summaries: Vec<serde_json::Value> = runs
        .iter()
        .map(|(heuristic, result)| {
            serde_json::json!({
                "heuristic": heuristic,
                "beats": result.beats.len(),
                "score": result.score,
                "coverage": result.coverage,
            })
        })
        .collect();
    write_trace(
        trace,
        TraceBuilder::stage(run_id, TraceStage::Tracking)
            .complete("Tracking finished")
            .with_data(serde_json::Value::Array(summaries)),
    )?;

    if let Some((heuristic, result)) = select_run(runs) {
        log::info!(
            "Selected {} run: {} beats, coverage {:.3}",
            heuristic.to_string(),
            result.beats.len(),
            result.coverage
        );
        analysis.tracked = true;
        analysis.heuristic = Some(heuristic);
        analysis.result = Some(result);
    } else {
        log::warn!("Beat tracking found no beat for any heuristic");
    }

    let message = match analysis.heuristic {
        Some(heuristic) => format!("Selected {}", heuristic.to_string()),
        None => "No beat found".to_string(),
    };
    let selection = TraceBuilder::stage(run_id, TraceStage::Selection).complete(message);
    write_trace(
        trace,
        selection.with_data(serde_json::json!({
            "heuristic": analysis.heuristic,
            "beats": analysis.beats().len(),
        })),
    )?;

    Ok(analysis)
}

/// Analyze a Standard MIDI File on disk
pub async fn analyze_midi_file(
    path: &Path,
    options: &AnalysisOptions,
    trace: Option<&TraceWriter>,
) -> Result<BeatAnalysis, PipelineError> {
    let bytes = tokio::fs::read(path).await?;
    analyze_midi(&bytes, options, trace).await
}

/// Events and tempo hypotheses of one salience heuristic
struct InducedRun {
    heuristic: SalienceHeuristic,
    events: Vec<Event>,
    tempi: Vec<f64>,
}

fn induce_heuristics(midi: &ImportedMidi) -> Vec<InducedRun> {
    SalienceHeuristic::ALL
        .into_iter()
        .map(|heuristic| {
            let events = events_from_chords(&midi.chords, midi.ticks_per_second, heuristic);
            let tempi = induce_tempi(&events);
            InducedRun {
                heuristic,
                events,
                tempi,
            }
        })
        .collect()
}

/// Run one beat tracking per heuristic, all in flight at once
async fn track_heuristics(
    induced: Vec<InducedRun>,
    params: &TrackerParams,
) -> Result<Vec<(SalienceHeuristic, TrackResult)>, PipelineError> {
    let handles: Vec<_> = induced
        .into_iter()
        .map(|run| {
            let params = params.clone();
            let handle = tokio::task::spawn_blocking(move || {
                track_with_tempi(&run.events, &run.tempi, &params)
            });
            (run.heuristic, handle)
        })
        .collect();

    join_runs(handles).await.map_err(PipelineError::from)
}

/// Await every run, then report the first failure if any
async fn join_runs<T>(
    handles: Vec<(SalienceHeuristic, JoinHandle<T>)>,
) -> Result<Vec<(SalienceHeuristic, T)>, JoinError> {
    let mut runs = Vec::with_capacity(handles.len());
    let mut failure = None;

    for (heuristic, handle) in handles {
        match handle.await {
            Ok(result) => runs.push((heuristic, result)),
            Err(e) => {
                log::error!("Tracking run for {} failed: {}", heuristic.to_string(), e);
                failure.get_or_insert(e);
            }
        }
    }

    match failure {
        Some(e) => Err(e),
        None => Ok(runs),
    }
}

/// Tracked run with the highest coverage; ties keep the earlier run
fn select_run(
    runs: Vec<(SalienceHeuristic, TrackResult)>,
) -> Option<(SalienceHeuristic, TrackResult)> {
    runs.into_iter()
        .filter(|(_, result)| result.is_tracked())
        .fold(None, |best, candidate| match best {
            Some(best) if best.1.coverage >= candidate.1.coverage => Some(best),
            _ => Some(candidate),
        })
}

fn write_trace(trace: Option<&TraceWriter>, entry: TraceEntry) -> Result<(), TraceError> {
    match trace {
        Some(writer) => writer.write(&entry),
        None => Ok(()),
    }
}
