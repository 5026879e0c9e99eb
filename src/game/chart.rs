use crate::core::input::Lane;
use std::path::PathBuf;

pub const BEATS_PER_BAR: f64 = 4.0;
pub const SECONDS_PER_MINUTE: f64 = 60.0;

#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("bpm must be positive, got {0}")]
    InvalidBpm(u32),
    #[error("chart has no playable notes after the lead-in bar")]
    NoPlayableNotes,
    #[error("chart file {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Which endpoint the judgement line departs from. Encoded as the chart's
/// channel digit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    LeftToRight,
    RightToLeft,
}

impl Direction {
    #[inline(always)]
    pub const fn from_channel(channel: u8) -> Option<Self> {
        match channel {
            0 => Some(Self::LeftToRight),
            1 => Some(Self::RightToLeft),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn channel(self) -> u8 {
        match self {
            Self::LeftToRight => 0,
            Self::RightToLeft => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NoteKind {
    Normal,
    HoldStart,
    Holding,
    HoldEnd,
}

impl NoteKind {
    /// Sequence digit → kind. `0` (empty) and unknown digits yield `None`.
    #[inline(always)]
    pub const fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::HoldStart),
            3 => Some(Self::Holding),
            4 => Some(Self::HoldEnd),
            _ => None,
        }
    }

    #[inline(always)]
    pub const fn code(self) -> u8 {
        match self {
            Self::Normal => 1,
            Self::HoldStart => 2,
            Self::Holding => 3,
            Self::HoldEnd => 4,
        }
    }
}

/// Lanes 1-2 share the upper judgement line, lanes 3-4 the lower one.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LaneGroup {
    Upper,
    Lower,
}

impl LaneGroup {
    pub const ALL: [LaneGroup; 2] = [LaneGroup::Upper, LaneGroup::Lower];

    #[inline(always)]
    pub const fn of(lane: Lane) -> Self {
        if lane.index() <= 1 { Self::Upper } else { Self::Lower }
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        match self {
            Self::Upper => 0,
            Self::Lower => 1,
        }
    }

    #[inline(always)]
    pub const fn lanes(self) -> [Lane; 2] {
        match self {
            Self::Upper => [Lane::ALL[0], Lane::ALL[1]],
            Self::Lower => [Lane::ALL[2], Lane::ALL[3]],
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Note {
    pub index: usize, // subdivision index within its segment
    pub time: f64,    // absolute judgement time in seconds
    pub kind: NoteKind,
    pub lane: Lane,
}

/// One bar's worth of notes for one lane.
#[derive(Clone, Debug, PartialEq)]
pub struct LaneSegment {
    pub bar: u32,
    pub lane: Lane,
    pub direction: Direction,
    pub beat: usize,
    pub notes: Vec<Note>,
}

impl LaneSegment {
    /// Builds a segment from one slot per subdivision. `slots.len()` is the
    /// beat resolution and must be at least 1.
    pub fn from_slots(
        bar: u32,
        lane: Lane,
        direction: Direction,
        slots: &[Option<NoteKind>],
        bar_duration: f64,
    ) -> Self {
        let beat = slots.len().max(1);
        let bar_start = f64::from(bar) * bar_duration;
        let step = bar_duration / beat as f64;
        let notes = slots
            .iter()
            .enumerate()
            .filter_map(|(index, slot)| {
                slot.map(|kind| Note {
                    index,
                    time: bar_start + index as f64 * step,
                    kind,
                    lane,
                })
            })
            .collect();
        Self { bar, lane, direction, beat, notes }
    }

    #[inline(always)]
    pub const fn group(&self) -> LaneGroup {
        LaneGroup::of(self.lane)
    }

    /// The digit sequence this segment was written as.
    pub fn sequence(&self) -> String {
        let mut digits = vec![b'0'; self.beat];
        for note in &self.notes {
            if let Some(slot) = digits.get_mut(note.index) {
                *slot = b'0' + note.kind.code();
            }
        }
        digits.into_iter().map(char::from).collect()
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Chart {
    bpm: u32,
    lanes: Vec<LaneSegment>,
}

#[inline(always)]
pub fn bar_duration_for(bpm: u32) -> f64 {
    SECONDS_PER_MINUTE / f64::from(bpm) * BEATS_PER_BAR
}

impl Chart {
    pub const fn new(bpm: u32) -> Self {
        Self { bpm, lanes: Vec::new() }
    }

    /// Inserts a segment keeping `(bar, lane)` order; equal keys keep
    /// insertion order.
    pub fn push_segment(&mut self, segment: LaneSegment) {
        let key = (segment.bar, segment.lane);
        let at = self.lanes.partition_point(|s| (s.bar, s.lane) <= key);
        self.lanes.insert(at, segment);
    }

    #[inline(always)]
    pub const fn bpm(&self) -> u32 {
        self.bpm
    }

    #[inline(always)]
    pub fn segments(&self) -> &[LaneSegment] {
        &self.lanes
    }

    #[inline(always)]
    pub fn bar_duration(&self) -> f64 {
        bar_duration_for(self.bpm)
    }

    pub fn note_count(&self) -> usize {
        self.lanes.iter().map(|s| s.notes.len()).sum()
    }

    /// Notes after the lead-in bar; bar 0 never produces judgeable notes.
    pub fn playable_note_count(&self) -> usize {
        self.lanes
            .iter()
            .filter(|s| s.bar >= 1)
            .map(|s| s.notes.len())
            .sum()
    }

    pub fn last_bar(&self) -> Option<u32> {
        self.lanes.last().map(|s| s.bar)
    }

    pub fn playable_notes(&self) -> impl Iterator<Item = &Note> {
        self.lanes
            .iter()
            .filter(|s| s.bar >= 1)
            .flat_map(|s| s.notes.iter())
    }

    pub fn validate(&self) -> Result<(), ChartError> {
        if self.bpm == 0 {
            return Err(ChartError::InvalidBpm(self.bpm));
        }
        if self.playable_note_count() == 0 {
            return Err(ChartError::NoPlayableNotes);
        }
        Ok(())
    }
}
