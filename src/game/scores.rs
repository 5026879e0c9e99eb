use log::debug;
use serde::{Deserialize, Serialize};

use crate::game::chart::ChartError;
use crate::game::judgment::JudgeGrade;

pub const MAX_SCORE: u32 = 1_000_000;
pub const EX_BONUS_RATIO: f64 = 0.2;
pub const DEFAULT_FAIL_THRESHOLD: u32 = 700_000;

// --- Clear Rank ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ClearRank {
    Fail,
    Clear,
    FullCombo,
    OverMillion,
    AllPerfect,
}

impl ClearRank {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Fail => "FAIL",
            Self::Clear => "CLEAR",
            Self::FullCombo => "FULL COMBO",
            Self::OverMillion => "OVER MILLION",
            Self::AllPerfect => "ALL PERFECT",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeCounts {
    pub perfect: u32,
    pub master: u32,
    pub ideal: u32,
    pub kind: u32,
    pub uhm: u32,
}

impl GradeCounts {
    #[inline(always)]
    pub const fn get(&self, grade: JudgeGrade) -> u32 {
        match grade {
            JudgeGrade::Perfect => self.perfect,
            JudgeGrade::Master => self.master,
            JudgeGrade::Ideal => self.ideal,
            JudgeGrade::Kind => self.kind,
            JudgeGrade::Uhm => self.uhm,
        }
    }

    pub fn increment(&mut self, grade: JudgeGrade) {
        let slot = match grade {
            JudgeGrade::Perfect => &mut self.perfect,
            JudgeGrade::Master => &mut self.master,
            JudgeGrade::Ideal => &mut self.ideal,
            JudgeGrade::Kind => &mut self.kind,
            JudgeGrade::Uhm => &mut self.uhm,
        };
        *slot = slot.saturating_add(1);
    }

    #[inline(always)]
    pub const fn total(&self) -> u32 {
        self.perfect + self.master + self.ideal + self.kind + self.uhm
    }
}

/// Live snapshot for score/combo/gauge displays.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoreEvent {
    pub score: u32,
    pub combo: u32,
    pub gauge: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoreState {
    score_per_note: f64,
    score: f64,
    ex_score: f64,
    theoretical_score: f64,
    combo: u32,
    max_combo: u32,
    counts: GradeCounts,
    total_notes: u32,
    fail_threshold: u32,
}

impl ScoreState {
    pub fn init(total_notes: u32, fail_threshold: u32) -> Result<Self, ChartError> {
        if total_notes == 0 {
            return Err(ChartError::NoPlayableNotes);
        }
        // Whole points per note; any remainder is never awarded.
        let score_per_note = f64::from(MAX_SCORE / total_notes);
        debug!("Score init: {total_notes} notes, {score_per_note} per note");
        Ok(Self {
            score_per_note,
            score: 0.0,
            ex_score: 0.0,
            theoretical_score: 0.0,
            combo: 0,
            max_combo: 0,
            counts: GradeCounts::default(),
            total_notes,
            fail_threshold,
        })
    }

    pub fn process_judge(&mut self, grade: JudgeGrade) -> ScoreEvent {
        // Multiply before dividing so whole-point notes stay exact.
        self.score += self.score_per_note * (grade.multiplier() * 10.0).round() / 10.0;
        if grade == JudgeGrade::Perfect {
            self.ex_score += self.score_per_note * (EX_BONUS_RATIO * 10.0).round() / 10.0;
        }
        self.theoretical_score += self.score_per_note;

        if grade.breaks_combo() {
            self.combo = 0;
        } else {
            self.combo += 1;
            self.max_combo = self.max_combo.max(self.combo);
        }
        self.counts.increment(grade);
        self.snapshot()
    }

    pub fn snapshot(&self) -> ScoreEvent {
        ScoreEvent {
            score: self.score as u32,
            combo: self.combo,
            gauge: self.display_gauge(),
        }
    }

    /// Score over what a flawless run would have by now, as a percentage.
    pub fn gauge(&self) -> f64 {
        if self.theoretical_score > 0.0 {
            self.score / self.theoretical_score * 100.0
        } else {
            100.0
        }
    }

    #[inline(always)]
    pub fn display_gauge(&self) -> f64 {
        self.gauge().clamp(0.0, 100.0)
    }

    #[inline(always)]
    fn is_all_master_or_better(&self) -> bool {
        self.counts.perfect + self.counts.master == self.total_notes
    }

    pub fn final_score(&self) -> u32 {
        if self.is_all_master_or_better() {
            debug!("Over Million bonus applied: +{:.0}", self.ex_score);
            (f64::from(MAX_SCORE) + self.ex_score) as u32
        } else {
            self.score as u32
        }
    }

    pub fn clear_rank(&self) -> ClearRank {
        if self.final_score() < self.fail_threshold {
            ClearRank::Fail
        } else if self.counts.perfect == self.total_notes {
            ClearRank::AllPerfect
        } else if self.is_all_master_or_better() {
            ClearRank::OverMillion
        } else if self.counts.kind + self.counts.uhm == 0 {
            ClearRank::FullCombo
        } else {
            ClearRank::Clear
        }
    }

    #[inline(always)]
    pub const fn combo(&self) -> u32 {
        self.combo
    }

    #[inline(always)]
    pub const fn max_combo(&self) -> u32 {
        self.max_combo
    }

    #[inline(always)]
    pub const fn counts(&self) -> &GradeCounts {
        &self.counts
    }

    #[inline(always)]
    pub const fn total_notes(&self) -> u32 {
        self.total_notes
    }

    #[inline(always)]
    pub fn score(&self) -> u32 {
        self.score as u32
    }

    #[inline(always)]
    pub fn ex_score(&self) -> u32 {
        self.ex_score as u32
    }

    #[inline(always)]
    pub fn theoretical_score(&self) -> u32 {
        self.theoretical_score as u32
    }
}
