pub mod autoplay;
pub mod chart;
pub mod gameplay;
pub mod judgment;
pub mod note;
pub mod parsing;
pub mod playfield;
pub mod pool;
pub mod scheduler;
pub mod scores;
pub mod stage_stats;
pub mod timeline;
pub mod timing_stats;
pub mod timing_windows;
