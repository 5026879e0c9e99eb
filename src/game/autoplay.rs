use log::{debug, info, warn};

use crate::core::clock::{ManualClock, SongClock};
use crate::core::input::{InputEdge, LANE_COUNT, input_channel};
use crate::game::chart::{Chart, ChartError, Note, NoteKind};
use crate::game::gameplay::{NullSink, Session, SessionConfig, SessionPhase, SessionSink};
use crate::game::stage_stats::StageSummary;

pub const DEFAULT_TICK_HZ: f64 = 240.0;
pub const DEFAULT_HIT_OFFSET_S: f64 = 0.0;
// How long a tap stays down when the next note on the lane allows it.
const TAP_HOLD_S: f64 = 0.02;
// Bars simulated past the last one before giving up.
const OVERRUN_BARS: u32 = 3;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AutoplaySettings {
    pub tick_hz: f64,
    pub hit_offset_s: f64,
}

impl Default for AutoplaySettings {
    fn default() -> Self {
        Self {
            tick_hz: DEFAULT_TICK_HZ,
            hit_offset_s: DEFAULT_HIT_OFFSET_S,
        }
    }
}

/// Press/release edges that play every judgeable note at
/// `note.time + hit_offset_s`, sorted by time.
pub fn edge_script(chart: &Chart, hit_offset_s: f64) -> Vec<InputEdge> {
    let mut per_lane: [Vec<Note>; LANE_COUNT] = Default::default();
    for note in chart.playable_notes() {
        per_lane[note.lane.index()].push(*note);
    }

    let mut script = Vec::new();
    for notes in &mut per_lane {
        notes.sort_by(|a, b| a.time.total_cmp(&b.time));
        for (i, note) in notes.iter().enumerate() {
            let t = note.time + hit_offset_s;
            match note.kind {
                NoteKind::Normal => {
                    let release = match notes.get(i + 1) {
                        Some(next) => (t + TAP_HOLD_S).min((note.time + next.time) / 2.0 + hit_offset_s),
                        None => t + TAP_HOLD_S,
                    };
                    script.push(InputEdge::press(note.lane, t));
                    script.push(InputEdge::release(note.lane, release));
                }
                NoteKind::HoldStart => script.push(InputEdge::press(note.lane, t)),
                NoteKind::Holding => {}
                NoteKind::HoldEnd => script.push(InputEdge::release(note.lane, t)),
            }
        }
    }
    script.sort_by(|a, b| a.time.total_cmp(&b.time));
    script
}

/// Plays `chart` start to finish against a simulated clock.
pub fn run_autoplay<S: SessionSink>(
    chart: &Chart,
    settings: SessionConfig,
    autoplay: AutoplaySettings,
    sink: S,
) -> Result<StageSummary, ChartError> {
    let tick_hz = if autoplay.tick_hz.is_finite() && autoplay.tick_hz > 0.0 {
        autoplay.tick_hz
    } else {
        warn!("Invalid autoplay tick rate {}; using {DEFAULT_TICK_HZ}", autoplay.tick_hz);
        DEFAULT_TICK_HZ
    };
    let dt = 1.0 / tick_hz;
    let last_bar = chart.last_bar().unwrap_or(0);
    let limit = f64::from(last_bar.saturating_add(1 + OVERRUN_BARS)) * chart.bar_duration();

    let clock = ManualClock::new(0.0);
    let mut session = Session::new(chart, settings, &clock, sink, NullSink)?;
    let (tx, rx) = input_channel();
    session.attach_input(rx);
    let script = edge_script(chart, autoplay.hit_offset_s);
    debug!("Autoplay script: {} edges", script.len());
    for edge in script {
        tx.send(edge);
    }

    info!("Autoplay start: tick_hz={tick_hz}, offset_s={}", autoplay.hit_offset_s);
    let mut tick: u64 = 0;
    loop {
        // Derive from the tick count; accumulating dt would drift.
        clock.set(tick as f64 * dt);
        tick += 1;
        if session.update() != SessionPhase::Playing {
            break;
        }
        if clock.music_time() > limit {
            warn!("Autoplay ran past {limit:.3}s without clearing; stopping");
            session.stop();
            break;
        }
    }

    Ok(session
        .finished_summary()
        .cloned()
        .unwrap_or_else(|| session.summary()))
}
