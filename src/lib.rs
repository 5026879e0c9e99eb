//! Timing and judgement core for a four-lane, bar-scheduled rhythm game.
//!
//! Charts are parsed from the `#BBB:CL:SEQUENCE;` text format, scheduled one
//! bar ahead of playback, swept by a moving judgement line per lane group and
//! judged against a drift-free audio clock.

pub mod config;
pub mod core;
pub mod game;
