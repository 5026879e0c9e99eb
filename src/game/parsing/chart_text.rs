use crate::core::input::Lane;
use crate::game::chart::{Chart, ChartError, Direction, LaneSegment, NoteKind, bar_duration_for};
use log::{debug, info, warn};
use std::fmt;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("expected `#BAR:CHANNELLANE:SEQUENCE;`, found {0} field(s)")]
    FieldCount(usize),
    #[error("bar number `{0}` must be exactly three digits")]
    InvalidBar(String),
    #[error("channel/lane field `{0}` must be exactly two digits")]
    InvalidChannelLane(String),
    #[error("channel `{0}` must be 0 (start left) or 1 (start right)")]
    InvalidChannel(char),
    #[error("lane `{0}` must be 1-4")]
    InvalidLane(char),
    #[error("note sequence is empty")]
    EmptySequence,
    #[error("note code `{code}` at subdivision {index} must be 0-4")]
    InvalidNote { code: char, index: usize },
}

/// A chart line that looked like data but could not be read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineError {
    pub line_number: usize, // 1-based
    pub line: String,
    pub error: ParseError,
}

impl fmt::Display for LineError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "line {} `{}`: {}", self.line_number, self.line, self.error)
    }
}

#[derive(Debug, Clone)]
pub struct ParsedChart {
    pub chart: Chart,
    pub errors: Vec<LineError>,
}

/// Splits on `\r\n`, `\r` or `\n`, keeping line numbers stable.
pub(crate) fn split_lines(text: &str) -> Vec<&str> {
    let bytes = text.as_bytes();
    let mut out = Vec::new();
    let mut start = 0;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'\n' => {
                out.push(&text[start..i]);
                i += 1;
                start = i;
            }
            b'\r' => {
                out.push(&text[start..i]);
                i += if bytes.get(i + 1) == Some(&b'\n') { 2 } else { 1 };
                start = i;
            }
            _ => i += 1,
        }
    }
    if start < text.len() {
        out.push(&text[start..]);
    }
    out
}

/// `Some(body)` for lines of the form `#...;`, with the markers stripped.
#[inline(always)]
pub(crate) fn chart_line_body(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.len() < 2 || !trimmed.starts_with('#') || !trimmed.ends_with(';') {
        return None;
    }
    Some(&trimmed[1..trimmed.len() - 1])
}

/// Parses the body of one `#BBB:CL:SEQUENCE;` line.
pub fn parse_line_body(body: &str, bar_duration: f64) -> Result<LaneSegment, ParseError> {
    let parts: Vec<&str> = body.split(':').collect();
    if parts.len() != 3 {
        return Err(ParseError::FieldCount(parts.len()));
    }

    let bar_str = parts[0];
    if bar_str.len() != 3 || !bar_str.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ParseError::InvalidBar(bar_str.to_string()));
    }
    let bar = bar_str
        .parse::<u32>()
        .map_err(|_| ParseError::InvalidBar(bar_str.to_string()))?;

    let channel_lane: Vec<char> = parts[1].chars().collect();
    let [channel_ch, lane_ch] = channel_lane[..] else {
        return Err(ParseError::InvalidChannelLane(parts[1].to_string()));
    };
    let direction = channel_ch
        .to_digit(10)
        .and_then(|d| Direction::from_channel(d as u8))
        .ok_or(ParseError::InvalidChannel(channel_ch))?;
    let lane = lane_ch
        .to_digit(10)
        .and_then(|d| Lane::new(d as u8))
        .ok_or(ParseError::InvalidLane(lane_ch))?;

    let sequence = parts[2];
    if sequence.is_empty() {
        return Err(ParseError::EmptySequence);
    }
    let mut slots = Vec::with_capacity(sequence.len());
    for (index, code) in sequence.chars().enumerate() {
        match code {
            '0' => slots.push(None),
            '1'..='4' => slots.push(NoteKind::from_code(code as u8 - b'0')),
            _ => return Err(ParseError::InvalidNote { code, index }),
        }
    }

    Ok(LaneSegment::from_slots(bar, lane, direction, &slots, bar_duration))
}

/// Parses chart text. Malformed data lines are skipped and reported; every
/// other line that is not `#...;` is ignored.
pub fn parse_chart(text: &str, bpm: u32) -> ParsedChart {
    let mut chart = Chart::new(bpm);
    let mut errors = Vec::new();
    let bar_duration = bar_duration_for(bpm);

    for (i, line) in split_lines(text).into_iter().enumerate() {
        let Some(body) = chart_line_body(line) else {
            continue;
        };
        match parse_line_body(body, bar_duration) {
            Ok(segment) => chart.push_segment(segment),
            Err(error) => {
                let err = LineError {
                    line_number: i + 1,
                    line: line.trim().to_string(),
                    error,
                };
                warn!("Chart parse error at {err}");
                errors.push(err);
            }
        }
    }

    debug!(
        "Chart parsed: {} lane segments, {} notes, {} skipped lines",
        chart.segments().len(),
        chart.note_count(),
        errors.len()
    );
    ParsedChart { chart, errors }
}

/// Writes a chart back out, one line per segment in `(bar, lane)` order.
/// Segments without notes still get an all-zero line so their judgement line
/// keeps moving.
pub fn serialize_chart(chart: &Chart) -> String {
    let mut out = String::new();
    for seg in chart.segments() {
        out.push_str(&format!(
            "#{:03}:{}{}:{};\n",
            seg.bar,
            seg.direction.channel(),
            seg.lane.number(),
            seg.sequence()
        ));
    }
    out
}

pub fn load_chart_file<P: AsRef<Path>>(path: P, bpm: u32) -> Result<ParsedChart, ChartError> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    info!("Chart loaded from: {}", path.display());
    Ok(parse_chart(&text, bpm))
}

pub fn save_chart_file<P: AsRef<Path>>(path: P, chart: &Chart) -> Result<(), ChartError> {
    let path = path.as_ref();
    let io_err = |source| ChartError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent()
        && !dir.as_os_str().is_empty()
        && !dir.exists()
    {
        fs::create_dir_all(dir).map_err(io_err)?;
    }
    fs::write(path, serialize_chart(chart)).map_err(io_err)?;
    info!("Chart saved to: {}", path.display());
    Ok(())
}
