use serde::{Deserialize, Serialize};

use crate::game::judgment::Judgment;
use crate::game::scores::{self, ClearRank, GradeCounts};
use crate::game::timing_stats::{self, TimingStats};

/// Results of one finished (or stopped) play.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StageSummary {
    pub bpm: u32,
    pub total_notes: u32,
    pub final_score: u32,
    pub score: u32,
    pub ex_score: u32,
    pub rank: ClearRank,
    pub gauge_percent: f64,
    pub max_combo: u32,
    pub counts: GradeCounts,
    /// Timeouts; also counted under `counts.uhm`.
    pub misses: u32,
    pub timing: TimingStats,
}

impl StageSummary {
    pub fn build(bpm: u32, score: &scores::ScoreState, judgments: &[Judgment]) -> Self {
        Self {
            bpm,
            total_notes: score.total_notes(),
            final_score: score.final_score(),
            score: score.score(),
            ex_score: score.ex_score(),
            rank: score.clear_rank(),
            gauge_percent: score.display_gauge(),
            max_combo: score.max_combo(),
            counts: *score.counts(),
            misses: judgments.iter().filter(|j| j.is_miss()).count() as u32,
            timing: timing_stats::compute_timing_stats(judgments),
        }
    }

    /// Every note got a judgment.
    #[inline(always)]
    pub const fn is_complete(&self) -> bool {
        self.counts.total() == self.total_notes
    }
}
