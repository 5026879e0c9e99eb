pub mod chart_text;
pub mod sheet;
