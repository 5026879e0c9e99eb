use log::{debug, warn};
use rustc_hash::FxHashMap;
use std::fmt::Write as _;

use crate::core::input::{LANE_COUNT, Lane};
use crate::game::chart::{Chart, Direction, LaneGroup, LaneSegment, NoteKind, bar_duration_for};
use crate::game::parsing::chart_text::{LineError, chart_line_body, parse_line_body, split_lines};

pub const DEFAULT_BEAT: usize = 4;

/// One bar of the authoring grid: a beat resolution shared by all four lanes,
/// an optional direction per lane and one slot per subdivision.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SheetBar {
    pub number: u32,
    beat: usize,
    directions: [Option<Direction>; LANE_COUNT],
    slots: [Vec<Option<NoteKind>>; LANE_COUNT],
}

impl SheetBar {
    pub fn new(number: u32, beat: usize) -> Self {
        let beat = beat.max(1);
        Self {
            number,
            beat,
            directions: [None; LANE_COUNT],
            slots: std::array::from_fn(|_| vec![None; beat]),
        }
    }

    #[inline(always)]
    pub const fn beat(&self) -> usize {
        self.beat
    }

    /// Changes the resolution. When one resolution divides the other, notes
    /// keep their position in the bar; otherwise slots are copied by index
    /// and anything past the new end is dropped.
    pub fn set_beat(&mut self, new_beat: usize) {
        let new_beat = new_beat.max(1);
        if new_beat == self.beat {
            return;
        }
        let old_beat = self.beat;
        for slots in &mut self.slots {
            let mut resized = vec![None; new_beat];
            for (i, slot) in slots.iter().enumerate() {
                let Some(kind) = slot else { continue };
                let target = if new_beat % old_beat == 0 {
                    Some(i * (new_beat / old_beat))
                } else if old_beat % new_beat == 0 {
                    let step = old_beat / new_beat;
                    (i % step == 0).then_some(i / step)
                } else {
                    Some(i)
                };
                if let Some(t) = target.filter(|t| *t < new_beat) {
                    resized[t] = Some(*kind);
                }
            }
            *slots = resized;
        }
        self.beat = new_beat;
    }

    #[inline(always)]
    pub const fn direction(&self, lane: Lane) -> Option<Direction> {
        self.directions[lane.index()]
    }

    /// Sets the lane's direction. Both lanes of a group share one line, so a
    /// partner lane that already has a direction follows along.
    pub fn set_direction(&mut self, lane: Lane, direction: Direction) {
        self.directions[lane.index()] = Some(direction);
        for other in LaneGroup::of(lane).lanes() {
            if other != lane && self.directions[other.index()].is_some() {
                self.directions[other.index()] = Some(direction);
            }
        }
    }

    /// Takes the lane out of the chart. Its notes stay in the grid.
    pub fn clear_direction(&mut self, lane: Lane) {
        self.directions[lane.index()] = None;
    }

    #[inline(always)]
    pub fn note(&self, lane: Lane, index: usize) -> Option<NoteKind> {
        self.slots[lane.index()].get(index).copied().flatten()
    }

    /// Returns false when `index` is outside the bar.
    pub fn set_note(&mut self, lane: Lane, index: usize, kind: Option<NoteKind>) -> bool {
        match self.slots[lane.index()].get_mut(index) {
            Some(slot) => {
                *slot = kind;
                true
            }
            None => false,
        }
    }

    pub fn sequence(&self, lane: Lane) -> String {
        self.slots[lane.index()]
            .iter()
            .map(|s| char::from(b'0' + s.map_or(0, NoteKind::code)))
            .collect()
    }

    fn is_blank(&self) -> bool {
        self.directions.iter().all(Option::is_none)
            && self.slots.iter().flatten().all(Option::is_none)
    }

    fn absorb(&mut self, seg: &LaneSegment) {
        if self.is_blank() || seg.beat > self.beat {
            self.set_beat(seg.beat);
        }
        self.set_direction(seg.lane, seg.direction);
        let scale = if self.beat % seg.beat == 0 { self.beat / seg.beat } else { 1 };
        for note in &seg.notes {
            self.set_note(seg.lane, note.index * scale, Some(note.kind));
        }
    }
}

/// Editable, randomly addressable chart. Bar 0 always exists.
#[derive(Clone, Debug, PartialEq)]
pub struct Sheet {
    pub bpm: u32,
    bars: FxHashMap<u32, SheetBar>,
}

impl Sheet {
    pub fn new(bpm: u32) -> Self {
        let mut bars = FxHashMap::default();
        bars.insert(0, SheetBar::new(0, DEFAULT_BEAT));
        Self { bpm, bars }
    }

    #[inline(always)]
    pub fn bar_duration(&self) -> f64 {
        bar_duration_for(self.bpm)
    }

    pub fn bar(&self, number: u32) -> Option<&SheetBar> {
        self.bars.get(&number)
    }

    pub fn bar_mut(&mut self, number: u32) -> &mut SheetBar {
        self.bars
            .entry(number)
            .or_insert_with(|| SheetBar::new(number, DEFAULT_BEAT))
    }

    pub fn bar_numbers(&self) -> Vec<u32> {
        let mut numbers: Vec<u32> = self.bars.keys().copied().collect();
        numbers.sort_unstable();
        numbers
    }

    pub fn last_bar(&self) -> u32 {
        self.bars.keys().copied().max().unwrap_or(0)
    }

    pub fn clear(&mut self) {
        self.bars.clear();
        self.bars.insert(0, SheetBar::new(0, DEFAULT_BEAT));
    }

    /// Loads chart text into the grid. A bar takes the resolution of its
    /// first line and grows to the largest any later line uses.
    pub fn from_text(text: &str, bpm: u32) -> (Self, Vec<LineError>) {
        let mut sheet = Self::new(bpm);
        let mut errors = Vec::new();
        let bar_duration = sheet.bar_duration();
        for (i, line) in split_lines(text).into_iter().enumerate() {
            let Some(body) = chart_line_body(line) else {
                continue;
            };
            match parse_line_body(body, bar_duration) {
                Ok(seg) => sheet.bar_mut(seg.bar).absorb(&seg),
                Err(error) => {
                    let err = LineError {
                        line_number: i + 1,
                        line: line.trim().to_string(),
                        error,
                    };
                    warn!("Sheet parse error at {err}");
                    errors.push(err);
                }
            }
        }
        debug!("Sheet loaded: {} bars, {} bad lines", sheet.bars.len(), errors.len());
        (sheet, errors)
    }

    /// Lanes without a direction are left out.
    pub fn to_text(&self) -> String {
        let mut out = String::new();
        for number in self.bar_numbers() {
            let bar = &self.bars[&number];
            for lane in Lane::ALL {
                let Some(direction) = bar.direction(lane) else {
                    continue;
                };
                let _ = writeln!(
                    out,
                    "#{:03}:{}{}:{};",
                    number,
                    direction.channel(),
                    lane.number(),
                    bar.sequence(lane)
                );
            }
        }
        out
    }

    pub fn to_chart(&self) -> Chart {
        self.to_chart_range(0, self.last_bar())
    }

    /// Bars `start_bar..=end_bar` only, keeping their absolute bar numbers.
    pub fn to_chart_range(&self, start_bar: u32, end_bar: u32) -> Chart {
        let mut chart = Chart::new(self.bpm);
        let bar_duration = self.bar_duration();
        for number in self.bar_numbers() {
            if number < start_bar || number > end_bar {
                continue;
            }
            let bar = &self.bars[&number];
            for lane in Lane::ALL {
                let Some(direction) = bar.direction(lane) else {
                    continue;
                };
                chart.push_segment(LaneSegment::from_slots(
                    number,
                    lane,
                    direction,
                    &bar.slots[lane.index()],
                    bar_duration,
                ));
            }
        }
        chart
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::parsing::chart_text::{parse_chart, serialize_chart};

    fn lane(n: u8) -> Lane {
        Lane::new(n).unwrap()
    }

    #[test]
    fn new_sheet_has_an_empty_lead_in_bar() {
        let sheet = Sheet::new(120);
        assert_eq!(sheet.bar_numbers(), vec![0]);
        assert_eq!(sheet.to_text(), "");
        assert_eq!(sheet.to_chart().segments().len(), 0);
    }

    #[test]
    fn finer_line_resamples_the_whole_bar() {
        let (sheet, errors) = Sheet::from_text("#001:01:1010;\n#001:02:01000001;", 120);
        assert!(errors.is_empty());
        let bar = sheet.bar(1).unwrap();
        assert_eq!(bar.beat(), 8);
        assert_eq!(bar.sequence(lane(1)), "10001000");
        assert_eq!(bar.sequence(lane(2)), "01000001");
    }

    #[test]
    fn loaded_bar_keeps_the_line_resolution() {
        let (sheet, _) = Sheet::from_text("#000:01:1;\n#001:02:10;\n#001:01:01;", 120);
        assert_eq!(sheet.bar(0).unwrap().beat(), 1);
        assert_eq!(sheet.bar(1).unwrap().beat(), 2);
        assert_eq!(sheet.to_text(), "#000:01:1;\n#001:01:01;\n#001:02:10;\n");
    }

    #[test]
    fn coarser_resolution_keeps_aligned_notes_only() {
        let mut bar = SheetBar::new(1, 8);
        bar.set_note(lane(1), 0, Some(NoteKind::Normal));
        bar.set_note(lane(1), 3, Some(NoteKind::Normal));
        bar.set_note(lane(1), 4, Some(NoteKind::HoldStart));
        bar.set_beat(4);
        assert_eq!(bar.sequence(lane(1)), "1020");
        bar.set_beat(3);
        assert_eq!(bar.sequence(lane(1)), "102");
        assert!(!bar.set_note(lane(1), 3, Some(NoteKind::Normal)));
    }

    #[test]
    fn direction_follows_an_already_set_partner() {
        let mut bar = SheetBar::new(2, 4);
        bar.set_direction(lane(1), Direction::LeftToRight);
        assert_eq!(bar.direction(lane(2)), None);
        bar.set_direction(lane(2), Direction::RightToLeft);
        assert_eq!(bar.direction(lane(1)), Some(Direction::RightToLeft));
        assert_eq!(bar.direction(lane(3)), None);
    }

    #[test]
    fn directed_lanes_without_notes_are_still_written() {
        let mut sheet = Sheet::new(120);
        let bar = sheet.bar_mut(3);
        bar.set_direction(lane(4), Direction::RightToLeft);
        bar.set_note(lane(1), 0, Some(NoteKind::Normal));
        assert_eq!(sheet.to_text(), "#003:14:0000;\n");
    }

    #[test]
    fn cleared_lane_drops_out_and_comes_back_with_its_notes() {
        let (mut sheet, _) = Sheet::from_text("#001:01:1000;\n#001:12:0100;", 120);
        sheet.bar_mut(1).clear_direction(lane(1));
        assert_eq!(sheet.to_text(), "#001:12:0100;\n");
        assert_eq!(sheet.to_chart().playable_note_count(), 1);
        sheet.bar_mut(1).set_direction(lane(1), Direction::LeftToRight);
        assert_eq!(sheet.bar(1).unwrap().direction(lane(2)), Some(Direction::LeftToRight));
        assert_eq!(sheet.to_text(), "#001:01:1000;\n#001:02:0100;\n");
    }

    #[test]
    fn bad_lines_are_returned_with_their_line_numbers() {
        let (sheet, errors) = Sheet::from_text("#001:01:1000;\n#1:01:1;\n#001:09:1;", 120);
        let lines: Vec<usize> = errors.iter().map(|e| e.line_number).collect();
        assert_eq!(lines, vec![2, 3]);
        assert_eq!(sheet.to_text(), "#001:01:1000;\n");
    }

    #[test]
    fn sheet_text_matches_the_chart_serializer() {
        let text = "#000:01:1000;\n#001:01:1020;\n#001:13:00000000;\n#002:12:2344;\n";
        let (sheet, _) = Sheet::from_text(text, 150);
        assert_eq!(sheet.to_text(), text);
        let chart = parse_chart(text, 150).chart;
        assert_eq!(sheet.to_chart(), chart);
        assert_eq!(serialize_chart(&sheet.to_chart()), text);
    }

    #[test]
    fn range_export_keeps_absolute_bar_numbers() {
        let (sheet, _) = Sheet::from_text("#001:01:1000;\n#002:01:0100;\n#003:01:0010;", 120);
        let chart = sheet.to_chart_range(2, 3);
        let bars: Vec<u32> = chart.segments().iter().map(|s| s.bar).collect();
        assert_eq!(bars, vec![2, 3]);
        assert_eq!(chart.segments()[0].notes[0].time, 5.0);
    }
}
