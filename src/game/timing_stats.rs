use serde::{Deserialize, Serialize};

use crate::game::judgment::{JudgeGrade, Judgment};
use crate::game::timing_windows::TimingWindows;

#[derive(Copy, Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct TimingStats {
    pub mean_abs_ms: f64,
    pub mean_ms: f64,
    pub stddev_ms: f64,
    pub max_abs_ms: f64,
    pub count: usize,
}

/// Offsets of player-timed judgments only; misses and automatic hold ticks
/// carry no meaningful offset.
#[inline(always)]
fn timed_offsets_ms(judgments: &[Judgment]) -> impl Iterator<Item = f64> + '_ {
    judgments
        .iter()
        .filter(|j| j.is_timed_input())
        .map(Judgment::time_error_ms)
}

#[inline(always)]
pub fn compute_timing_stats(judgments: &[Judgment]) -> TimingStats {
    // First pass: sums and maxima
    let mut sum_abs = 0.0_f64;
    let mut sum_signed = 0.0_f64;
    let mut max_abs = 0.0_f64;
    let mut count: usize = 0;

    for e in timed_offsets_ms(judgments) {
        let a = e.abs();
        sum_abs += a;
        sum_signed += e;
        if a > max_abs {
            max_abs = a;
        }
        count += 1;
    }

    if count == 0 {
        return TimingStats::default();
    }

    let mean_ms = sum_signed / (count as f64);
    let mean_abs_ms = sum_abs / (count as f64);

    // Second pass: sample standard deviation of signed offsets
    let stddev_ms = if count > 1 {
        let sum_diff_sq: f64 = timed_offsets_ms(judgments)
            .map(|e| (e - mean_ms) * (e - mean_ms))
            .sum();
        (sum_diff_sq / ((count as f64) - 1.0)).sqrt()
    } else {
        0.0
    };

    TimingStats { mean_abs_ms, mean_ms, stddev_ms, max_abs_ms: max_abs, count }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct HistogramMs {
    pub bins: Vec<(i32, u32)>, // (bin_ms, count), sorted by bin
    pub max_count: u32,
    pub worst_window_ms: f64, // for scaling (-worst..+worst)
}

const HIST_BIN_MS: f64 = 1.0;

#[inline(always)]
fn bin_index_ms(v_ms: f64) -> i32 {
    // Floor, so negative offsets go more negative
    (v_ms / HIST_BIN_MS).floor() as i32
}

/// 1ms-bin offset histogram. The scale is at least the Ideal window and
/// widens to the worst grade seen.
pub fn build_histogram_ms(judgments: &[Judgment], windows: &TimingWindows) -> HistogramMs {
    let mut counts: rustc_hash::FxHashMap<i32, u32> = rustc_hash::FxHashMap::default();
    let mut max_count: u32 = 0;
    let mut worst = JudgeGrade::Ideal;

    for j in judgments.iter().filter(|j| j.is_timed_input()) {
        let c = counts.entry(bin_index_ms(j.time_error_ms())).or_insert(0);
        *c = c.saturating_add(1);
        max_count = max_count.max(*c);
        worst = worst.max(j.grade);
    }

    let mut bins: Vec<(i32, u32)> = counts.into_iter().collect();
    bins.sort_unstable_by_key(|(bin, _)| *bin);

    HistogramMs {
        bins,
        max_count,
        worst_window_ms: windows.window(worst) * 1000.0,
    }
}
