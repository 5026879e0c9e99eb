use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::core::input::{Lane, LaneStates};
use crate::game::chart::NoteKind;
use crate::game::note::NoteOutcome;
use crate::game::scheduler::BarScheduler;
use crate::game::timing_windows::TimingWindows;

#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum JudgeGrade {
    Perfect,
    Master,
    Ideal,
    Kind, // breaks combo
    Uhm,  // breaks combo, also used for timeouts
}

impl JudgeGrade {
    pub const ALL: [JudgeGrade; 5] = [
        JudgeGrade::Perfect,
        JudgeGrade::Master,
        JudgeGrade::Ideal,
        JudgeGrade::Kind,
        JudgeGrade::Uhm,
    ];

    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Self::Perfect => 0,
            Self::Master => 1,
            Self::Ideal => 2,
            Self::Kind => 3,
            Self::Uhm => 4,
        }
    }

    /// Share of a note's score this grade earns.
    #[inline(always)]
    pub const fn multiplier(self) -> f64 {
        match self {
            Self::Perfect | Self::Master => 1.0,
            Self::Ideal => 0.7,
            Self::Kind => 0.5,
            Self::Uhm => 0.0,
        }
    }

    #[inline(always)]
    pub const fn breaks_combo(self) -> bool {
        matches!(self, Self::Kind | Self::Uhm)
    }
}

/// What produced a judgment.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JudgeSource {
    Press,
    Release,
    /// A `Holding` note reached while its lane was held.
    Hold,
    Timeout,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Judgment {
    pub lane: Lane,
    pub note_time: f64,
    pub kind: NoteKind,
    pub grade: JudgeGrade,
    // Signed: negative is early.
    pub time_error_s: f64,
    pub source: JudgeSource,
}

impl Judgment {
    #[inline(always)]
    pub const fn is_miss(&self) -> bool {
        matches!(self.source, JudgeSource::Timeout)
    }

    /// Whether the offset came from a player's edge rather than the tick.
    #[inline(always)]
    pub const fn is_timed_input(&self) -> bool {
        matches!(self.source, JudgeSource::Press | JudgeSource::Release)
    }

    #[inline(always)]
    pub fn time_error_ms(&self) -> f64 {
        self.time_error_s * 1000.0
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum InputKind {
    Press,
    Release,
}

impl InputKind {
    #[inline(always)]
    pub const fn accepts(self, kind: NoteKind) -> bool {
        match self {
            Self::Press => matches!(kind, NoteKind::Normal | NoteKind::HoldStart),
            Self::Release => matches!(kind, NoteKind::HoldEnd),
        }
    }

    #[inline(always)]
    const fn source(self) -> JudgeSource {
        match self {
            Self::Press => JudgeSource::Press,
            Self::Release => JudgeSource::Release,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyLane,
    OutOfRange,
    /// Head note belongs to the other edge family.
    WrongEdge,
}

#[derive(Clone, Debug, PartialEq)]
pub enum JudgeOutcome {
    Judged(Judgment),
    Ignored(IgnoreReason),
}

/// Matches input against the head of a lane's active queue.
#[derive(Clone, Copy, Debug, Default)]
pub struct JudgmentEngine {
    windows: TimingWindows,
}

impl JudgmentEngine {
    pub const fn new(windows: TimingWindows) -> Self {
        Self { windows }
    }

    #[inline(always)]
    pub const fn windows(&self) -> &TimingWindows {
        &self.windows
    }

    /// Only the head note is considered; input outside the widest window
    /// leaves the queue untouched.
    pub fn try_judge(
        &self,
        scheduler: &mut BarScheduler,
        lane: Lane,
        input: InputKind,
        input_time: f64,
    ) -> JudgeOutcome {
        let Some(head) = scheduler.head_note(lane) else {
            return JudgeOutcome::Ignored(IgnoreReason::EmptyLane);
        };
        let note = head.note;
        let time_error_s = input_time - note.time;
        let Some(grade) = self.windows.classify(time_error_s) else {
            debug!(
                "Ignoring {input:?} on lane {}: {:.2}ms from head note",
                lane.number(),
                time_error_s * 1000.0
            );
            return JudgeOutcome::Ignored(IgnoreReason::OutOfRange);
        };
        if !input.accepts(note.kind) {
            return JudgeOutcome::Ignored(IgnoreReason::WrongEdge);
        }

        scheduler.resolve_head(lane, NoteOutcome::Hit(grade));
        info!(
            concat!(
                "TIMING HIT: lane={}, kind={:?}, input={:?}, ",
                "note_time_s={:.6}, input_time_s={:.6}, offset_ms={:.2}, grade={:?}"
            ),
            lane.number(),
            note.kind,
            input,
            note.time,
            input_time,
            time_error_s * 1000.0,
            grade,
        );
        JudgeOutcome::Judged(Judgment {
            lane,
            note_time: note.time,
            kind: note.kind,
            grade,
            time_error_s,
            source: input.source(),
        })
    }

    /// Grades `Holding` heads whose time has come while the lane is down.
    pub fn resolve_holds(
        &self,
        scheduler: &mut BarScheduler,
        lanes: &LaneStates,
        now: f64,
    ) -> Vec<Judgment> {
        let mut out = Vec::new();
        for lane in Lane::ALL {
            if !lanes.is_held(lane) {
                continue;
            }
            while let Some(head) = scheduler.head_note(lane)
                && head.note.kind == NoteKind::Holding
                && now >= head.note.time
            {
                let note = head.note;
                scheduler.resolve_head(lane, NoteOutcome::Hit(JudgeGrade::Perfect));
                debug!("Hold tick on lane {} at {:.6}s", lane.number(), note.time);
                out.push(Judgment {
                    lane,
                    note_time: note.time,
                    kind: note.kind,
                    grade: JudgeGrade::Perfect,
                    time_error_s: 0.0,
                    source: JudgeSource::Hold,
                });
            }
        }
        out
    }

    /// Times out every active note older than the widest window.
    pub fn expire_overdue(&self, scheduler: &mut BarScheduler, now: f64) -> Vec<Judgment> {
        scheduler
            .expire_overdue(now, self.windows.widest())
            .into_iter()
            .map(|note| {
                info!(
                    "TIMING MISS: lane={}, kind={:?}, note_time_s={:.6}, miss_time_s={:.6}",
                    note.lane.number(),
                    note.kind,
                    note.time,
                    now
                );
                Judgment {
                    lane: note.lane,
                    note_time: note.time,
                    kind: note.kind,
                    grade: JudgeGrade::Uhm,
                    time_error_s: now - note.time,
                    source: JudgeSource::Timeout,
                }
            })
            .collect()
    }
}
