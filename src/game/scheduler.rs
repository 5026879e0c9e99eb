use std::collections::VecDeque;
use std::mem;

use log::{debug, info, warn};
use smallvec::SmallVec;

use crate::core::input::{LANE_COUNT, Lane};
use crate::game::chart::{Chart, ChartError, Direction, LaneGroup, LaneSegment, Note};
use crate::game::note::{NoteEntity, NoteOutcome, NoteState, NoteView};
use crate::game::playfield::Playfield;
use crate::game::pool::{NoteHandle, Pool, TimelineHandle};
use crate::game::timeline::{Timeline, TimelinePhase, TimelineView};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SchedulerState {
    Idle,
    BarActive,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct GroupSlot {
    active: Option<TimelineHandle>,
    preloaded: Option<TimelineHandle>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub bars_started: u32,
    pub went_idle: bool,
}

/// Drives bars, lane-group timelines and the per-lane note queues from an
/// externally supplied song time. Owns both pools.
#[derive(Debug)]
pub struct BarScheduler {
    state: SchedulerState,
    playfield: Playfield,
    bar_duration: f64,
    pending: VecDeque<LaneSegment>,

    current_bar: u32,
    current_bar_end: f64,
    next_bar: u32,
    next_present: bool,
    next_groups: [Option<Direction>; 2],

    groups: [GroupSlot; 2],
    retired: Vec<TimelineHandle>,

    notes: Pool<NoteEntity>,
    timelines: Pool<Timeline>,
    // Judgeable notes, time-ordered per lane.
    active_queues: [VecDeque<NoteHandle>; LANE_COUNT],
    // Next bar's Hidden/Ghost notes, promoted at the boundary.
    ghost_queues: [VecDeque<NoteHandle>; LANE_COUNT],

    resolved: Vec<NoteHandle>,
    removed_notes: Vec<NoteHandle>,
    removed_timelines: Vec<TimelineHandle>,
    now: f64,
}

#[inline(always)]
fn insert_by_time(queue: &mut VecDeque<NoteHandle>, pool: &Pool<NoteEntity>, handle: NoteHandle, time: f64) {
    let at = queue.partition_point(|h| pool.get(*h).is_some_and(|n| n.note.time <= time));
    queue.insert(at, handle);
}

impl BarScheduler {
    /// Bar 0 is the lead-in: nothing in it is ever judged.
    pub fn init(chart: &Chart, playfield: Playfield) -> Result<Self, ChartError> {
        chart.validate()?;
        let bar_duration = chart.bar_duration();
        let note_capacity = chart.note_count();

        let mut sched = Self {
            state: SchedulerState::BarActive,
            playfield,
            bar_duration,
            pending: chart.segments().iter().cloned().collect(),
            current_bar: 0,
            current_bar_end: bar_duration,
            next_bar: 1,
            next_present: false,
            next_groups: [None; 2],
            groups: [GroupSlot::default(); 2],
            retired: Vec::new(),
            notes: Pool::with_capacity(note_capacity),
            timelines: Pool::with_capacity(4),
            active_queues: Default::default(),
            ghost_queues: Default::default(),
            resolved: Vec::new(),
            removed_notes: Vec::new(),
            removed_timelines: Vec::new(),
            now: f64::NEG_INFINITY,
        };
        info!(
            "Scheduler init: bpm={}, bar_duration_s={:.6}, segments={}, playable_notes={}",
            chart.bpm(),
            bar_duration,
            sched.pending.len(),
            chart.playable_note_count()
        );
        sched.prepare_next_bar();
        Ok(sched)
    }

    #[inline(always)]
    fn bar_start(&self, bar: u32) -> f64 {
        f64::from(bar) * self.bar_duration
    }

    /// Pulls the following bar out of the pending queue, preloads timelines
    /// for groups that are not already running and spawns its notes.
    fn prepare_next_bar(&mut self) {
        let next = self.current_bar.saturating_add(1);
        self.next_bar = next;
        self.next_groups = [None; 2];

        while let Some(front) = self.pending.front()
            && front.bar < next
        {
            warn!(
                "Discarding segment for bar {} lane {}: bar already passed",
                front.bar,
                front.lane.number()
            );
            self.pending.pop_front();
        }
        // One segment per lane unless the chart repeats a line.
        let mut segments: SmallVec<[LaneSegment; LANE_COUNT]> = SmallVec::new();
        while let Some(front) = self.pending.front()
            && front.bar == next
        {
            if let Some(seg) = self.pending.pop_front() {
                segments.push(seg);
            }
        }
        self.next_present = !segments.is_empty();

        for seg in &segments {
            let slot = &mut self.next_groups[seg.group().index()];
            match *slot {
                None => *slot = Some(seg.direction),
                Some(dir) if dir != seg.direction => warn!(
                    "Bar {next} lane {} wants {:?} but its group already runs {dir:?}",
                    seg.lane.number(),
                    seg.direction
                ),
                Some(_) => {}
            }
        }

        let next_start = self.bar_start(next);
        for group in LaneGroup::ALL {
            let g = group.index();
            let Some(direction) = self.next_groups[g] else {
                continue;
            };
            if self.groups[g].active.is_none() && self.groups[g].preloaded.is_none() {
                let tl = Timeline::preloaded(group, direction, &self.playfield, next_start, self.bar_duration);
                self.groups[g].preloaded = Some(self.timelines.acquire(tl));
            }
        }

        let mut spawned = 0usize;
        for seg in &segments {
            let g = seg.group().index();
            let direction = self.next_groups[g].unwrap_or(seg.direction);
            let tracking = self.groups[g].active;
            let mut anchor_time = next_start;
            for note in &seg.notes {
                let x = self.playfield.note_x(direction, note.index, seg.beat);
                let y = self.playfield.lane_y(note.lane);
                let entity = NoteEntity::spawn(*note, next, x, y, tracking, anchor_time);
                anchor_time = note.time;
                let handle = self.notes.acquire(entity);
                insert_by_time(&mut self.ghost_queues[note.lane.index()], &self.notes, handle, note.time);
                spawned += 1;
            }
        }
        debug!(
            "Prepared bar {next}: {} segments, {spawned} notes, groups={:?}",
            segments.len(),
            self.next_groups
        );
    }

    fn retire_timeline(&mut self, handle: TimelineHandle) {
        if let Some(tl) = self.timelines.get_mut(handle) {
            tl.retire();
            self.retired.push(handle);
        }
    }

    fn advance_bar(&mut self) {
        if !self.next_present && self.pending.is_empty() {
            for g in 0..self.groups.len() {
                if let Some(h) = self.groups[g].active.take() {
                    self.retire_timeline(h);
                }
                if let Some(h) = self.groups[g].preloaded.take()
                    && self.timelines.release(h).is_some()
                {
                    self.removed_timelines.push(h);
                }
            }
            self.state = SchedulerState::Idle;
            info!("Chart finished after bar {}", self.current_bar);
            return;
        }

        let new_bar = self.next_bar;
        let start = self.bar_start(new_bar);
        for group in LaneGroup::ALL {
            let g = group.index();
            let running = self.groups[g].active.filter(|h| self.timelines.contains(*h));
            match (running, self.next_groups[g]) {
                (Some(h), Some(direction)) => {
                    if let Some(tl) = self.timelines.get_mut(h) {
                        tl.restart(direction, &self.playfield, start);
                    }
                }
                (Some(h), None) => {
                    self.groups[g].active = None;
                    self.retire_timeline(h);
                }
                (None, Some(direction)) => {
                    let handle = match self.groups[g].preloaded.take() {
                        Some(h) if self.timelines.contains(h) => h,
                        _ => self.timelines.acquire(Timeline::preloaded(
                            group,
                            direction,
                            &self.playfield,
                            start,
                            self.bar_duration,
                        )),
                    };
                    if let Some(tl) = self.timelines.get_mut(handle) {
                        tl.restart(direction, &self.playfield, start);
                    }
                    self.groups[g].active = Some(handle);
                }
                (None, None) => self.groups[g].active = None,
            }
        }

        for lane in 0..LANE_COUNT {
            while let Some(h) = self.ghost_queues[lane].pop_front() {
                let Some(entity) = self.notes.get_mut(h) else {
                    continue;
                };
                entity.promote();
                let time = entity.note.time;
                insert_by_time(&mut self.active_queues[lane], &self.notes, h, time);
            }
        }

        self.current_bar = new_bar;
        self.current_bar_end = self.bar_start(new_bar.saturating_add(1));
        debug!(
            "Bar {new_bar} started at {start:.6}s, ends {:.6}s",
            self.current_bar_end
        );
        self.prepare_next_bar();
    }

    /// Brings everything up to song time `t`. Time never runs backwards here;
    /// an earlier sample is treated as the latest one seen.
    pub fn sync_time(&mut self, t: f64) -> SyncReport {
        self.reclaim_resolved();
        let t = if t.is_nan() { self.now } else { t.max(self.now) };
        self.now = t;

        let mut report = SyncReport::default();
        while self.state == SchedulerState::BarActive && t >= self.current_bar_end {
            self.advance_bar();
            if self.state == SchedulerState::Idle {
                report.went_idle = true;
            } else {
                report.bars_started += 1;
            }
        }

        self.update_timelines(t);
        self.check_hidden_notes();
        for queue in &self.active_queues {
            for h in queue {
                if let Some(entity) = self.notes.get_mut(*h) {
                    entity.refresh_visual(t);
                }
            }
        }
        report
    }

    fn update_timelines(&mut self, t: f64) {
        for (_, tl) in self.timelines.iter_mut() {
            tl.advance(t);
        }
        let bound = self.playfield.bound_x;
        let timelines = &mut self.timelines;
        let removed = &mut self.removed_timelines;
        self.retired.retain(|h| {
            let Some(tl) = timelines.get(*h) else {
                return false;
            };
            if tl.is_out_of_bounds(t, bound) {
                timelines.release(*h);
                removed.push(*h);
                false
            } else {
                true
            }
        });
    }

    fn check_hidden_notes(&mut self) {
        let clearance = self.playfield.clearance;
        for queue in &self.ghost_queues {
            for h in queue {
                let Some(entity) = self.notes.get_mut(*h) else {
                    continue;
                };
                if entity.state != NoteState::Hidden {
                    continue;
                }
                let passed = entity
                    .tracking
                    .and_then(|th| self.timelines.get(th))
                    .map(|tl| tl.has_passed(entity.x, clearance));
                entity.check_passed(passed);
            }
        }
    }

    /// Returns resolved note slots to the pool.
    pub fn reclaim_resolved(&mut self) {
        for h in self.resolved.drain(..) {
            if self.notes.release(h).is_some() {
                self.removed_notes.push(h);
            }
        }
    }

    /// The earliest unresolved active note of `lane`.
    #[inline(always)]
    pub fn head_note(&self, lane: Lane) -> Option<&NoteEntity> {
        self.active_queues[lane.index()]
            .front()
            .and_then(|h| self.notes.get(*h))
    }

    pub fn resolve_head(&mut self, lane: Lane, outcome: NoteOutcome) -> Option<Note> {
        let h = self.active_queues[lane.index()].pop_front()?;
        let Some(entity) = self.notes.get_mut(h) else {
            warn!("Stale note handle {h:?} at head of lane {}", lane.number());
            return None;
        };
        if !entity.resolve(outcome) {
            return None;
        }
        self.resolved.push(h);
        Some(entity.note)
    }

    /// Pops every active note older than `widest_window` as a miss.
    pub fn expire_overdue(&mut self, t: f64, widest_window: f64) -> Vec<Note> {
        let mut out = Vec::new();
        for lane in Lane::ALL {
            while let Some(head) = self.head_note(lane)
                && head.is_timed_out(t, widest_window)
            {
                if let Some(note) = self.resolve_head(lane, NoteOutcome::Missed) {
                    out.push(note);
                }
            }
        }
        out.sort_by(|a, b| a.time.total_cmp(&b.time));
        out
    }

    pub fn is_cleared(&self) -> bool {
        self.state == SchedulerState::Idle
            && self.active_queues.iter().all(VecDeque::is_empty)
            && self.ghost_queues.iter().all(VecDeque::is_empty)
    }

    /// Drops every note and timeline; the scheduler ends Idle.
    pub fn stop(&mut self) {
        self.removed_notes.extend(self.notes.iter().map(|(h, _)| h));
        self.removed_timelines.extend(self.timelines.iter().map(|(h, _)| h));
        self.notes.clear();
        self.timelines.clear();
        for q in self.active_queues.iter_mut().chain(self.ghost_queues.iter_mut()) {
            q.clear();
        }
        self.pending.clear();
        self.retired.clear();
        self.resolved.clear();
        self.groups = [GroupSlot::default(); 2];
        self.next_present = false;
        self.state = SchedulerState::Idle;
        info!("Scheduler stopped at bar {}", self.current_bar);
    }

    pub fn take_removed_notes(&mut self) -> Vec<NoteHandle> {
        mem::take(&mut self.removed_notes)
    }

    pub fn take_removed_timelines(&mut self) -> Vec<TimelineHandle> {
        mem::take(&mut self.removed_timelines)
    }

    pub fn note_views(&self) -> impl Iterator<Item = (NoteHandle, NoteView)> + '_ {
        self.notes
            .iter()
            .filter(|(_, n)| n.state != NoteState::Resolved)
            .map(|(h, n)| (h, n.view()))
    }

    pub fn timeline_views(&self) -> impl Iterator<Item = (TimelineHandle, TimelineView)> + '_ {
        self.timelines
            .iter()
            .map(|(h, tl)| (h, tl.view(&self.playfield)))
    }

    #[inline(always)]
    pub const fn state(&self) -> SchedulerState {
        self.state
    }

    #[inline(always)]
    pub const fn current_bar(&self) -> u32 {
        self.current_bar
    }

    #[inline(always)]
    pub const fn current_bar_end(&self) -> f64 {
        self.current_bar_end
    }

    #[inline(always)]
    pub const fn bar_duration(&self) -> f64 {
        self.bar_duration
    }

    #[inline(always)]
    pub const fn playfield(&self) -> &Playfield {
        &self.playfield
    }

    #[inline(always)]
    pub const fn now(&self) -> f64 {
        self.now
    }

    /// Timeline sweeping `group` in the current bar, if any.
    #[inline(always)]
    pub fn group_timeline(&self, group: LaneGroup) -> Option<TimelineHandle> {
        self.groups[group.index()].active
    }

    #[inline(always)]
    pub fn preloaded_timeline(&self, group: LaneGroup) -> Option<TimelineHandle> {
        self.groups[group.index()].preloaded
    }

    #[inline(always)]
    pub fn timeline(&self, handle: TimelineHandle) -> Option<&Timeline> {
        self.timelines.get(handle)
    }

    #[inline(always)]
    pub fn note(&self, handle: NoteHandle) -> Option<&NoteEntity> {
        self.notes.get(handle)
    }

    pub fn active_queue(&self, lane: Lane) -> impl Iterator<Item = &NoteEntity> + '_ {
        self.active_queues[lane.index()]
            .iter()
            .filter_map(|h| self.notes.get(*h))
    }

    pub fn ghost_queue(&self, lane: Lane) -> impl Iterator<Item = &NoteEntity> + '_ {
        self.ghost_queues[lane.index()]
            .iter()
            .filter_map(|h| self.notes.get(*h))
    }

    pub fn running_timelines(&self) -> usize {
        self.timelines
            .iter()
            .filter(|(_, tl)| tl.phase == TimelinePhase::Running)
            .count()
    }

    #[inline(always)]
    pub fn live_notes(&self) -> usize {
        self.notes.len()
    }

    #[inline(always)]
    pub fn live_timelines(&self) -> usize {
        self.timelines.len()
    }
}
