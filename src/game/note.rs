use crate::game::chart::{Note, NoteKind};
use crate::game::judgment::JudgeGrade;
use crate::game::pool::TimelineHandle;

pub const GHOST_ALPHA: f32 = 0.05;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteState {
    /// Spawned under a bar that is still being swept; invisible.
    Hidden,
    /// Faint preview of the next bar.
    Ghost,
    /// In its lane queue and judgeable.
    Active,
    Resolved,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NoteOutcome {
    Hit(JudgeGrade),
    Missed,
}

/// Per-kind render data. `fill` is 0..=1 progress from the previous note of
/// the segment (or the bar start) up to this one.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum NoteVisual {
    Tap,
    HoldHead,
    HoldBody { fill: f32 },
    HoldTail { fill: f32 },
}

impl NoteVisual {
    pub const fn for_kind(kind: NoteKind) -> Self {
        match kind {
            NoteKind::Normal => Self::Tap,
            NoteKind::HoldStart => Self::HoldHead,
            NoteKind::Holding => Self::HoldBody { fill: 0.0 },
            NoteKind::HoldEnd => Self::HoldTail { fill: 0.0 },
        }
    }

    #[inline(always)]
    pub const fn draws_head(self) -> bool {
        matches!(self, Self::Tap | Self::HoldHead | Self::HoldTail { .. })
    }

    #[inline(always)]
    pub const fn draws_body(self) -> bool {
        matches!(self, Self::HoldBody { .. } | Self::HoldTail { .. })
    }

    #[inline(always)]
    pub const fn fill(self) -> Option<f32> {
        match self {
            Self::HoldBody { fill } | Self::HoldTail { fill } => Some(fill),
            Self::Tap | Self::HoldHead => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NoteView {
    pub note: Note,
    pub x: f32,
    pub y: f32,
    pub alpha: f32,
    pub state: NoteState,
    pub visual: NoteVisual,
}

/// A scheduled note and its lifecycle.
#[derive(Clone, Debug, PartialEq)]
pub struct NoteEntity {
    pub note: Note,
    pub bar: u32,
    pub state: NoteState,
    pub x: f32,
    pub y: f32,
    /// Timeline whose sweep has to clear this note before it turns Ghost.
    pub tracking: Option<TimelineHandle>,
    anchor_time: f64,
    pub visual: NoteVisual,
    pub outcome: Option<NoteOutcome>,
}

impl NoteEntity {
    pub fn spawn(
        note: Note,
        bar: u32,
        x: f32,
        y: f32,
        tracking: Option<TimelineHandle>,
        anchor_time: f64,
    ) -> Self {
        let state = if tracking.is_some() {
            NoteState::Hidden
        } else {
            NoteState::Ghost
        };
        Self {
            note,
            bar,
            state,
            x,
            y,
            tracking,
            anchor_time,
            visual: NoteVisual::for_kind(note.kind),
            outcome: None,
        }
    }

    /// Hidden -> Ghost once the tracked line has cleared this note. `None`
    /// means the tracked timeline is gone. Returns true on transition.
    pub fn check_passed(&mut self, line_passed: Option<bool>) -> bool {
        if self.state != NoteState::Hidden {
            return false;
        }
        match line_passed {
            Some(false) => false,
            Some(true) | None => {
                self.state = NoteState::Ghost;
                self.tracking = None;
                true
            }
        }
    }

    pub fn promote(&mut self) -> bool {
        match self.state {
            NoteState::Hidden | NoteState::Ghost => {
                self.state = NoteState::Active;
                self.tracking = None;
                true
            }
            NoteState::Active | NoteState::Resolved => false,
        }
    }

    #[inline(always)]
    pub fn is_timed_out(&self, t: f64, widest_window: f64) -> bool {
        self.state == NoteState::Active && t - self.note.time > widest_window
    }

    /// Terminal. A second resolve is refused.
    pub fn resolve(&mut self, outcome: NoteOutcome) -> bool {
        if self.state == NoteState::Resolved {
            return false;
        }
        self.state = NoteState::Resolved;
        self.outcome = Some(outcome);
        self.tracking = None;
        true
    }

    pub fn refresh_visual(&mut self, t: f64) {
        if self.state != NoteState::Active {
            return;
        }
        let span = self.note.time - self.anchor_time;
        let fill = if span <= 0.0 {
            1.0
        } else {
            ((t - self.anchor_time) / span).clamp(0.0, 1.0) as f32
        };
        match &mut self.visual {
            NoteVisual::HoldBody { fill: f } | NoteVisual::HoldTail { fill: f } => *f = fill,
            NoteVisual::Tap | NoteVisual::HoldHead => {}
        }
    }

    #[inline(always)]
    pub const fn alpha(&self) -> f32 {
        match self.state {
            NoteState::Hidden | NoteState::Resolved => 0.0,
            NoteState::Ghost => GHOST_ALPHA,
            NoteState::Active => 1.0,
        }
    }

    pub fn view(&self) -> NoteView {
        NoteView {
            note: self.note,
            x: self.x,
            y: self.y,
            alpha: self.alpha(),
            state: self.state,
            visual: self.visual,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::input::Lane;
    use crate::game::pool::Pool;
    use crate::game::timeline::Timeline;

    fn note(kind: NoteKind, time: f64) -> Note {
        Note { index: 2, time, kind, lane: Lane::new(1).unwrap() }
    }

    #[test]
    fn untracked_notes_spawn_as_ghosts() {
        let n = NoteEntity::spawn(note(NoteKind::Normal, 3.0), 1, 0.0, 0.0, None, 2.0);
        assert_eq!(n.state, NoteState::Ghost);
        assert_eq!(n.alpha(), GHOST_ALPHA);
        assert_eq!(n.visual, NoteVisual::Tap);
    }

    #[test]
    fn hidden_note_turns_ghost_when_passed_or_orphaned() {
        let mut timelines: Pool<Timeline> = Pool::new();
        let pf = crate::game::playfield::Playfield::default();
        let h = timelines.acquire(Timeline::preloaded(
            crate::game::chart::LaneGroup::Upper,
            crate::game::chart::Direction::LeftToRight,
            &pf,
            0.0,
            2.0,
        ));
        let mut a = NoteEntity::spawn(note(NoteKind::Normal, 3.0), 1, 0.0, 0.0, Some(h), 2.0);
        assert_eq!(a.state, NoteState::Hidden);
        assert_eq!(a.alpha(), 0.0);
        assert!(!a.check_passed(Some(false)));
        assert!(a.check_passed(Some(true)));
        assert_eq!(a.state, NoteState::Ghost);
        assert!(a.tracking.is_none());

        let mut b = NoteEntity::spawn(note(NoteKind::Normal, 3.0), 1, 0.0, 0.0, Some(h), 2.0);
        assert!(b.check_passed(None));
        assert_eq!(b.state, NoteState::Ghost);
    }

    #[test]
    fn resolve_happens_once() {
        let mut n = NoteEntity::spawn(note(NoteKind::Normal, 3.0), 1, 0.0, 0.0, None, 2.0);
        assert!(n.promote());
        assert!(!n.promote());
        assert!(n.resolve(NoteOutcome::Hit(JudgeGrade::Ideal)));
        assert!(!n.resolve(NoteOutcome::Missed));
        assert_eq!(n.outcome, Some(NoteOutcome::Hit(JudgeGrade::Ideal)));
        assert!(!n.promote());
    }

    #[test]
    fn timeout_only_applies_to_active_notes() {
        let mut n = NoteEntity::spawn(note(NoteKind::Normal, 3.0), 1, 0.0, 0.0, None, 2.0);
        assert!(!n.is_timed_out(10.0, 0.126));
        n.promote();
        assert!(!n.is_timed_out(3.126, 0.126));
        assert!(n.is_timed_out(3.127, 0.126));
    }

    #[test]
    fn hold_fill_tracks_time_since_anchor() {
        let mut n = NoteEntity::spawn(note(NoteKind::HoldEnd, 3.0), 1, 0.0, 0.0, None, 2.0);
        assert!(n.visual.draws_head() && n.visual.draws_body());
        n.refresh_visual(2.5);
        assert_eq!(n.visual.fill(), Some(0.0));
        n.promote();
        n.refresh_visual(2.5);
        assert_eq!(n.visual.fill(), Some(0.5));
        n.refresh_visual(1.0);
        assert_eq!(n.visual.fill(), Some(0.0));
        n.refresh_visual(9.0);
        assert_eq!(n.visual.fill(), Some(1.0));

        let mut tap = NoteEntity::spawn(note(NoteKind::Normal, 3.0), 1, 0.0, 0.0, None, 2.0);
        tap.promote();
        tap.refresh_visual(2.5);
        assert_eq!(tap.visual.fill(), None);
    }
}
