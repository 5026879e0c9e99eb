use crate::core::input::Lane;
use crate::game::chart::{Direction, LaneGroup};

pub const DEFAULT_LEFT_X: f32 = -760.0;
pub const DEFAULT_RIGHT_X: f32 = 760.0;
pub const DEFAULT_SCREEN_WIDTH: f32 = 1920.0;
pub const DEFAULT_BOUND_MARGIN: f32 = 100.0;
pub const DEFAULT_CLEARANCE: f32 = 150.0;
pub const DEFAULT_LINE_Y: [f32; 2] = [200.0, -200.0];
pub const DEFAULT_LANE_Y: [f32; 4] = [280.0, 120.0, -120.0, -280.0];

/// Screen-space layout shared by timelines and notes. Origin is the screen
/// centre; x grows to the right.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Playfield {
    pub left_x: f32,
    pub right_x: f32,
    /// A released timeline is one whose |x| has gone past this.
    pub bound_x: f32,
    /// How far a timeline must travel past a note before it turns Ghost.
    pub clearance: f32,
    pub line_y: [f32; 2],
    pub lane_y: [f32; 4],
}

impl Default for Playfield {
    fn default() -> Self {
        Self {
            left_x: DEFAULT_LEFT_X,
            right_x: DEFAULT_RIGHT_X,
            bound_x: DEFAULT_SCREEN_WIDTH / 2.0 + DEFAULT_BOUND_MARGIN,
            clearance: DEFAULT_CLEARANCE,
            line_y: DEFAULT_LINE_Y,
            lane_y: DEFAULT_LANE_Y,
        }
    }
}

impl Playfield {
    /// `(start_x, end_x)` of a sweep in `direction`.
    #[inline(always)]
    pub const fn endpoints(&self, direction: Direction) -> (f32, f32) {
        match direction {
            Direction::LeftToRight => (self.left_x, self.right_x),
            Direction::RightToLeft => (self.right_x, self.left_x),
        }
    }

    #[inline(always)]
    pub fn span(&self) -> f32 {
        self.right_x - self.left_x
    }

    /// Fixed x of the note at subdivision `index` of a `beat`-wide bar.
    pub fn note_x(&self, direction: Direction, index: usize, beat: usize) -> f32 {
        let step = self.span() / beat.max(1) as f32;
        let offset = step * index as f32;
        match direction {
            Direction::LeftToRight => self.left_x + offset,
            Direction::RightToLeft => self.right_x - offset,
        }
    }

    #[inline(always)]
    pub const fn lane_y(&self, lane: Lane) -> f32 {
        self.lane_y[lane.index()]
    }

    #[inline(always)]
    pub const fn line_y(&self, group: LaneGroup) -> f32 {
        self.line_y[group.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_positions_split_the_span_evenly() {
        let pf = Playfield::default();
        let ltr: Vec<f32> = (0..4).map(|i| pf.note_x(Direction::LeftToRight, i, 4)).collect();
        assert_eq!(ltr, vec![-760.0, -380.0, 0.0, 380.0]);
        let rtl: Vec<f32> = (0..4).map(|i| pf.note_x(Direction::RightToLeft, i, 4)).collect();
        assert_eq!(rtl, vec![760.0, 380.0, 0.0, -380.0]);
    }

    #[test]
    fn default_bound_sits_outside_the_screen() {
        let pf = Playfield::default();
        assert_eq!(pf.bound_x, 1060.0);
        assert_eq!(pf.endpoints(Direction::RightToLeft), (760.0, -760.0));
    }
}
