use log::{debug, info};

use crate::core::clock::SongClock;
use crate::core::input::{EdgeTransition, InputEdge, InputReceiver, Lane, LaneStates};
use crate::game::chart::{Chart, ChartError};
use crate::game::judgment::{InputKind, JudgeOutcome, Judgment, JudgmentEngine};
use crate::game::note::NoteView;
use crate::game::playfield::Playfield;
use crate::game::pool::{NoteHandle, TimelineHandle};
use crate::game::scheduler::BarScheduler;
use crate::game::scores::{DEFAULT_FAIL_THRESHOLD, ScoreEvent, ScoreState};
use crate::game::stage_stats::StageSummary;
use crate::game::timeline::TimelineView;
use crate::game::timing_windows::TimingWindows;

/// Receives gameplay outcomes. Every method defaults to a no-op.
pub trait SessionSink {
    fn on_judged(&mut self, _judgment: &Judgment, _event: &ScoreEvent) {}
    fn on_missed(&mut self, _judgment: &Judgment, _event: &ScoreEvent) {}
    fn on_game_finished(&mut self, _summary: &StageSummary) {}
}

/// Receives per-tick positions for whatever draws the playfield.
pub trait PresentationSink {
    fn note_moved(&mut self, _handle: NoteHandle, _view: NoteView) {}
    fn note_removed(&mut self, _handle: NoteHandle) {}
    fn timeline_moved(&mut self, _handle: TimelineHandle, _view: TimelineView) {}
    fn timeline_removed(&mut self, _handle: TimelineHandle) {}
}

#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl SessionSink for NullSink {}
impl PresentationSink for NullSink {}

impl<T: SessionSink + ?Sized> SessionSink for &mut T {
    fn on_judged(&mut self, judgment: &Judgment, event: &ScoreEvent) {
        (**self).on_judged(judgment, event);
    }
    fn on_missed(&mut self, judgment: &Judgment, event: &ScoreEvent) {
        (**self).on_missed(judgment, event);
    }
    fn on_game_finished(&mut self, summary: &StageSummary) {
        (**self).on_game_finished(summary);
    }
}

impl<T: PresentationSink + ?Sized> PresentationSink for &mut T {
    fn note_moved(&mut self, handle: NoteHandle, view: NoteView) {
        (**self).note_moved(handle, view);
    }
    fn note_removed(&mut self, handle: NoteHandle) {
        (**self).note_removed(handle);
    }
    fn timeline_moved(&mut self, handle: TimelineHandle, view: TimelineView) {
        (**self).timeline_moved(handle, view);
    }
    fn timeline_removed(&mut self, handle: TimelineHandle) {
        (**self).timeline_removed(handle);
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SessionConfig {
    pub windows: TimingWindows,
    pub playfield: Playfield,
    pub fail_threshold: u32,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            windows: TimingWindows::default(),
            playfield: Playfield::default(),
            fail_threshold: DEFAULT_FAIL_THRESHOLD,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionPhase {
    Playing,
    Finished,
    Stopped,
}

/// One play of one chart. Call [`Session::update`] once per frame; it reads
/// the clock once and advances everything to that time.
pub struct Session<C, S, P> {
    bpm: u32,
    clock: C,
    sink: S,
    presenter: P,
    scheduler: BarScheduler,
    judge: JudgmentEngine,
    score: ScoreState,
    lanes: LaneStates,
    input: Option<InputReceiver>,
    pending_edges: Vec<InputEdge>,
    judgments: Vec<Judgment>,
    phase: SessionPhase,
    summary: Option<StageSummary>,
}

impl<C: SongClock, S: SessionSink, P: PresentationSink> Session<C, S, P> {
    pub fn new(
        chart: &Chart,
        settings: SessionConfig,
        clock: C,
        sink: S,
        presenter: P,
    ) -> Result<Self, ChartError> {
        let scheduler = BarScheduler::init(chart, settings.playfield)?;
        let total_notes = u32::try_from(chart.playable_note_count()).unwrap_or(u32::MAX);
        let score = ScoreState::init(total_notes, settings.fail_threshold)?;
        info!(
            "Session ready: {} notes, windows_ms={:?}, fail_threshold={}",
            total_notes,
            settings.windows.windows_ms(),
            settings.fail_threshold
        );
        Ok(Self {
            bpm: chart.bpm(),
            clock,
            sink,
            presenter,
            scheduler,
            judge: JudgmentEngine::new(settings.windows),
            score,
            lanes: LaneStates::default(),
            input: None,
            pending_edges: Vec::new(),
            judgments: Vec::new(),
            phase: SessionPhase::Playing,
            summary: None,
        })
    }

    /// Edges sent on the matching sender are drained inside `update`.
    pub fn attach_input(&mut self, rx: InputReceiver) {
        self.input = Some(rx);
    }

    pub fn queue_input_edge(&mut self, edge: InputEdge) {
        self.pending_edges.push(edge);
    }

    pub fn update(&mut self) -> SessionPhase {
        if self.phase != SessionPhase::Playing {
            return self.phase;
        }
        let now = self.clock.music_time();

        if let Some(rx) = &self.input {
            self.pending_edges.extend(rx.drain());
        }
        // Stable, so same-time edges keep arrival order.
        self.pending_edges.sort_by(|a, b| a.time.total_cmp(&b.time));
        let due = self.pending_edges.partition_point(|e| e.time <= now);
        let edges: Vec<InputEdge> = self.pending_edges.drain(..due).collect();
        for edge in edges {
            self.advance_to(edge.time);
            self.apply_edge(edge);
        }
        self.advance_to(now);
        self.scheduler.reclaim_resolved();
        self.publish();

        if self.scheduler.is_cleared() {
            self.finish();
        }
        self.phase
    }

    fn advance_to(&mut self, t: f64) {
        self.scheduler.sync_time(t);
        let t = self.scheduler.now();
        for j in self.judge.resolve_holds(&mut self.scheduler, &self.lanes, t) {
            self.record(j);
        }
        for j in self.judge.expire_overdue(&mut self.scheduler, t) {
            self.record(j);
        }
    }

    fn apply_edge(&mut self, edge: InputEdge) {
        let kind = match self.lanes.apply(&edge) {
            EdgeTransition::Pressed => InputKind::Press,
            EdgeTransition::Released => InputKind::Release,
            EdgeTransition::Unchanged => {
                debug!("Ignoring repeated edge on lane {}", edge.lane.number());
                return;
            }
        };
        self.judge_input(edge.lane, kind, edge.time);
    }

    fn judge_input(&mut self, lane: Lane, kind: InputKind, time: f64) {
        match self.judge.try_judge(&mut self.scheduler, lane, kind, time) {
            JudgeOutcome::Judged(j) => self.record(j),
            JudgeOutcome::Ignored(reason) => {
                debug!("{kind:?} on lane {} at {time:.6}s ignored: {reason:?}", lane.number());
            }
        }
    }

    fn record(&mut self, judgment: Judgment) {
        let event = self.score.process_judge(judgment.grade);
        if judgment.is_miss() {
            self.sink.on_missed(&judgment, &event);
        } else {
            self.sink.on_judged(&judgment, &event);
        }
        self.judgments.push(judgment);
    }

    fn publish(&mut self) {
        for h in self.scheduler.take_removed_notes() {
            self.presenter.note_removed(h);
        }
        for h in self.scheduler.take_removed_timelines() {
            self.presenter.timeline_removed(h);
        }
        for (h, view) in self.scheduler.note_views() {
            self.presenter.note_moved(h, view);
        }
        for (h, view) in self.scheduler.timeline_views() {
            self.presenter.timeline_moved(h, view);
        }
    }

    fn finish(&mut self) {
        let summary = self.summary();
        info!(
            "Game finished: final={}, rank={}, max_combo={}, gauge={:.2}%",
            summary.final_score,
            summary.rank.label(),
            summary.max_combo,
            summary.gauge_percent
        );
        self.sink.on_game_finished(&summary);
        self.summary = Some(summary);
        self.phase = SessionPhase::Finished;
    }

    /// Abandons play. The finished callback is not fired.
    pub fn stop(&mut self) {
        if self.phase != SessionPhase::Playing {
            return;
        }
        self.scheduler.stop();
        self.pending_edges.clear();
        self.lanes.release_all();
        self.publish();
        self.phase = SessionPhase::Stopped;
        info!("Session stopped after {} judgments", self.judgments.len());
    }

    /// Results so far; final once the phase is `Finished`.
    pub fn summary(&self) -> StageSummary {
        StageSummary::build(self.bpm, &self.score, &self.judgments)
    }

    pub const fn finished_summary(&self) -> Option<&StageSummary> {
        self.summary.as_ref()
    }

    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub const fn scheduler(&self) -> &BarScheduler {
        &self.scheduler
    }

    pub const fn score(&self) -> &ScoreState {
        &self.score
    }

    pub fn judgments(&self) -> &[Judgment] {
        &self.judgments
    }

    pub const fn lanes(&self) -> &LaneStates {
        &self.lanes
    }

    pub const fn clock(&self) -> &C {
        &self.clock
    }

    pub const fn sink(&self) -> &S {
        &self.sink
    }

    pub const fn presenter(&self) -> &P {
        &self.presenter
    }
}
