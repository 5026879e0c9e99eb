use crate::game::chart::{Direction, LaneGroup};
use crate::game::playfield::Playfield;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimelinePhase {
    /// Spawned one bar early, parked at its start endpoint.
    Preloaded,
    Running,
    /// No longer driving a bar; keeps extrapolating until it leaves the bound.
    Retired,
}

/// Moving judgement line for one lane group.
#[derive(Clone, Debug, PartialEq)]
pub struct Timeline {
    pub group: LaneGroup,
    pub direction: Direction,
    pub start_x: f32,
    pub end_x: f32,
    pub start_time: f64,
    pub duration: f64,
    pub phase: TimelinePhase,
    pub x: f32,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimelineView {
    pub group: LaneGroup,
    pub x: f32,
    pub y: f32,
    pub phase: TimelinePhase,
}

impl Timeline {
    pub fn preloaded(
        group: LaneGroup,
        direction: Direction,
        playfield: &Playfield,
        start_time: f64,
        duration: f64,
    ) -> Self {
        let (start_x, end_x) = playfield.endpoints(direction);
        Self {
            group,
            direction,
            start_x,
            end_x,
            start_time,
            duration,
            phase: TimelinePhase::Preloaded,
            x: start_x,
        }
    }

    /// Re-arms this line for a new bar, possibly in the other direction.
    pub fn restart(&mut self, direction: Direction, playfield: &Playfield, start_time: f64) {
        let (start_x, end_x) = playfield.endpoints(direction);
        self.direction = direction;
        self.start_x = start_x;
        self.end_x = end_x;
        self.start_time = start_time;
        self.phase = TimelinePhase::Running;
        self.x = start_x;
    }

    #[inline(always)]
    pub fn progress(&self, t: f64) -> f64 {
        if self.duration <= 0.0 {
            return 0.0;
        }
        (t - self.start_time) / self.duration
    }

    /// Unclamped: past progress 1 the line keeps going.
    #[inline(always)]
    pub fn position_at(&self, t: f64) -> f32 {
        let p = self.progress(t) as f32;
        self.start_x + (self.end_x - self.start_x) * p
    }

    pub fn advance(&mut self, t: f64) {
        self.x = match self.phase {
            TimelinePhase::Preloaded => self.start_x,
            TimelinePhase::Running | TimelinePhase::Retired => self.position_at(t),
        };
    }

    #[inline(always)]
    pub fn retire(&mut self) {
        self.phase = TimelinePhase::Retired;
    }

    #[inline(always)]
    pub fn is_out_of_bounds(&self, t: f64, bound_x: f32) -> bool {
        self.progress(t) > 1.0 && self.x.abs() > bound_x
    }

    /// Whether the line has swept past `note_x` by at least `clearance`.
    pub fn has_passed(&self, note_x: f32, clearance: f32) -> bool {
        if self.phase == TimelinePhase::Preloaded {
            return false;
        }
        match self.direction {
            Direction::LeftToRight => self.x > note_x + clearance,
            Direction::RightToLeft => self.x < note_x - clearance,
        }
    }

    pub fn view(&self, playfield: &Playfield) -> TimelineView {
        TimelineView {
            group: self.group,
            x: self.x,
            y: playfield.line_y(self.group),
            phase: self.phase,
        }
    }
}
