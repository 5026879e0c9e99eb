// Judgement windows shared by the judge, the timeout sweep and the config.

use crate::game::judgment::JudgeGrade;

// All base windows are half-widths in seconds.
pub const BASE_PERFECT_S: f64 = 0.021;
pub const BASE_MASTER_S: f64 = 0.042;
pub const BASE_IDEAL_S: f64 = 0.084;
pub const BASE_KIND_S: f64 = 0.105;
pub const BASE_UHM_S: f64 = 0.126;

pub const BASE_WINDOWS_S: [f64; 5] = [
    BASE_PERFECT_S,
    BASE_MASTER_S,
    BASE_IDEAL_S,
    BASE_KIND_S,
    BASE_UHM_S,
];

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WindowError {
    #[error("{grade:?} window must be positive, got {value}s")]
    NotPositive { grade: JudgeGrade, value: f64 },
    #[error("{grade:?} window ({value}s) must be wider than the one before it ({previous}s)")]
    NotIncreasing {
        grade: JudgeGrade,
        value: f64,
        previous: f64,
    },
}

/// Five graded half-widths, best to worst.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TimingWindows {
    windows_s: [f64; 5],
}

impl Default for TimingWindows {
    fn default() -> Self {
        Self { windows_s: BASE_WINDOWS_S }
    }
}

impl TimingWindows {
    pub fn new(windows_s: [f64; 5]) -> Result<Self, WindowError> {
        let mut previous = 0.0;
        for (grade, value) in JudgeGrade::ALL.into_iter().zip(windows_s) {
            if value.is_nan() || value <= 0.0 {
                return Err(WindowError::NotPositive { grade, value });
            }
            if value <= previous {
                return Err(WindowError::NotIncreasing { grade, value, previous });
            }
            previous = value;
        }
        Ok(Self { windows_s })
    }

    #[inline(always)]
    pub const fn windows_s(&self) -> [f64; 5] {
        self.windows_s
    }

    #[inline(always)]
    pub fn windows_ms(&self) -> [f64; 5] {
        self.windows_s.map(|s| s * 1000.0)
    }

    #[inline(always)]
    pub const fn widest(&self) -> f64 {
        self.windows_s[4]
    }

    #[inline(always)]
    pub const fn window(&self, grade: JudgeGrade) -> f64 {
        self.windows_s[grade.index()]
    }

    /// Smallest window containing `|offset_s|`, or `None` outside the widest.
    #[inline(always)]
    pub fn classify(&self, offset_s: f64) -> Option<JudgeGrade> {
        let abs = offset_s.abs();
        JudgeGrade::ALL
            .into_iter()
            .zip(self.windows_s)
            .find(|&(_, w)| abs <= w)
            .map(|(grade, _)| grade)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_map_to_the_tightest_window() {
        let w = TimingWindows::default();
        assert_eq!(w.classify(0.0), Some(JudgeGrade::Perfect));
        assert_eq!(w.classify(-0.021), Some(JudgeGrade::Perfect));
        assert_eq!(w.classify(0.03), Some(JudgeGrade::Master));
        assert_eq!(w.classify(-0.06), Some(JudgeGrade::Ideal));
        assert_eq!(w.classify(0.1), Some(JudgeGrade::Kind));
        assert_eq!(w.classify(0.12), Some(JudgeGrade::Uhm));
        assert_eq!(w.classify(0.127), None);
        assert_eq!(w.classify(-0.5), None);
    }

    #[test]
    fn windows_must_grow_strictly() {
        assert!(matches!(
            TimingWindows::new([0.02, 0.02, 0.08, 0.1, 0.12]),
            Err(WindowError::NotIncreasing { grade: JudgeGrade::Master, .. })
        ));
        assert!(matches!(
            TimingWindows::new([0.0, 0.04, 0.08, 0.1, 0.12]),
            Err(WindowError::NotPositive { grade: JudgeGrade::Perfect, .. })
        ));
        assert!(matches!(
            TimingWindows::new([0.01, 0.04, f64::NAN, 0.1, 0.12]),
            Err(WindowError::NotPositive { grade: JudgeGrade::Ideal, .. })
        ));
        let w = TimingWindows::new([0.01, 0.02, 0.03, 0.04, 0.05]).unwrap();
        assert_eq!(w.widest(), 0.05);
        assert_eq!(w.window(JudgeGrade::Ideal), 0.03);
    }
}
