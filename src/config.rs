use crate::game::autoplay::{AutoplaySettings, DEFAULT_HIT_OFFSET_S, DEFAULT_TICK_HZ};
use crate::game::gameplay::SessionConfig;
use crate::game::playfield::{
    DEFAULT_BOUND_MARGIN, DEFAULT_CLEARANCE, DEFAULT_LANE_Y, DEFAULT_LEFT_X, DEFAULT_LINE_Y,
    DEFAULT_RIGHT_X, DEFAULT_SCREEN_WIDTH, Playfield,
};
use crate::game::scores::DEFAULT_FAIL_THRESHOLD;
use crate::game::timing_windows::{BASE_WINDOWS_S, TimingWindows};
use ini::Ini;
use log::{info, warn};
use std::path::Path;
use std::str::FromStr;
use std::sync::{LazyLock, Mutex, PoisonError};

pub const CONFIG_PATH: &str = "barsync.ini";

const WINDOW_KEYS: [&str; 5] = [
    "PerfectWindow",
    "MasterWindow",
    "IdealWindow",
    "KindWindow",
    "UhmWindow",
];
const LANE_Y_KEYS: [&str; 4] = ["Lane1Y", "Lane2Y", "Lane3Y", "Lane4Y"];
const LINE_Y_KEYS: [&str; 2] = ["UpperLineY", "LowerLineY"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Error => "Error",
            Self::Warn => "Warn",
            Self::Info => "Info",
            Self::Debug => "Debug",
            Self::Trace => "Trace",
        }
    }

    pub const fn as_level_filter(&self) -> log::LevelFilter {
        match self {
            Self::Off => log::LevelFilter::Off,
            Self::Error => log::LevelFilter::Error,
            Self::Warn => log::LevelFilter::Warn,
            Self::Info => log::LevelFilter::Info,
            Self::Debug => log::LevelFilter::Debug,
            Self::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "off" => Ok(Self::Off),
            "error" => Ok(Self::Error),
            "warn" | "warning" => Ok(Self::Warn),
            "info" => Ok(Self::Info),
            "debug" => Ok(Self::Debug),
            "trace" => Ok(Self::Trace),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Config {
    pub log_level: LogLevel,
    /// Perfect..Uhm half-widths in seconds. Validated when turned into
    /// [`TimingWindows`].
    pub judge_windows_s: [f64; 5],
    pub fail_threshold: u32,
    pub left_x: f32,
    pub right_x: f32,
    pub screen_width: f32,
    pub bound_margin: f32,
    pub clearance: f32,
    pub line_y: [f32; 2],
    pub lane_y: [f32; 4],
    pub autoplay_tick_hz: f64,
    // Positive = late.
    pub autoplay_hit_offset_s: f64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Warn,
            judge_windows_s: BASE_WINDOWS_S,
            fail_threshold: DEFAULT_FAIL_THRESHOLD,
            left_x: DEFAULT_LEFT_X,
            right_x: DEFAULT_RIGHT_X,
            screen_width: DEFAULT_SCREEN_WIDTH,
            bound_margin: DEFAULT_BOUND_MARGIN,
            clearance: DEFAULT_CLEARANCE,
            line_y: DEFAULT_LINE_Y,
            lane_y: DEFAULT_LANE_Y,
            autoplay_tick_hz: DEFAULT_TICK_HZ,
            autoplay_hit_offset_s: DEFAULT_HIT_OFFSET_S,
        }
    }
}

impl Config {
    pub fn playfield(&self) -> Playfield {
        Playfield {
            left_x: self.left_x,
            right_x: self.right_x,
            bound_x: self.screen_width / 2.0 + self.bound_margin,
            clearance: self.clearance,
            line_y: self.line_y,
            lane_y: self.lane_y,
        }
    }

    /// Falls back to the stock windows when the configured ones are unusable.
    pub fn timing_windows(&self) -> TimingWindows {
        TimingWindows::new(self.judge_windows_s).unwrap_or_else(|e| {
            warn!("Ignoring configured judge windows: {e}");
            TimingWindows::default()
        })
    }

    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            windows: self.timing_windows(),
            playfield: self.playfield(),
            fail_threshold: self.fail_threshold,
        }
    }

    pub const fn autoplay_settings(&self) -> AutoplaySettings {
        AutoplaySettings {
            tick_hz: self.autoplay_tick_hz,
            hit_offset_s: self.autoplay_hit_offset_s,
        }
    }
}

// Global, mutable configuration instance.
static CONFIG: LazyLock<Mutex<Config>> = LazyLock::new(|| Mutex::new(Config::default()));

// --- File I/O ---

fn get_parsed<T: FromStr>(conf: &Ini, section: &str, key: &str) -> Option<T> {
    let raw = conf.get_from(Some(section), key)?;
    let parsed = raw.trim().parse::<T>().ok();
    if parsed.is_none() {
        warn!("Invalid value for [{section}] {key}: '{raw}'");
    }
    parsed
}

/// Reads every known key, keeping the default for anything missing or
/// malformed.
pub fn parse_ini(conf: &Ini) -> Config {
    let default = Config::default();
    let mut cfg = default;

    cfg.log_level = conf
        .get_from(Some("Options"), "LogLevel")
        .and_then(|v| LogLevel::from_str(v).ok())
        .unwrap_or(default.log_level);

    for (i, key) in WINDOW_KEYS.iter().enumerate() {
        cfg.judge_windows_s[i] =
            get_parsed::<f64>(conf, "Judge", key).unwrap_or(default.judge_windows_s[i]);
    }
    cfg.fail_threshold =
        get_parsed::<u32>(conf, "Judge", "FailThreshold").unwrap_or(default.fail_threshold);

    cfg.left_x = get_parsed(conf, "Playfield", "LeftX").unwrap_or(default.left_x);
    cfg.right_x = get_parsed(conf, "Playfield", "RightX").unwrap_or(default.right_x);
    if cfg.right_x <= cfg.left_x {
        warn!(
            "Playfield RightX ({}) must exceed LeftX ({}); using defaults",
            cfg.right_x, cfg.left_x
        );
        cfg.left_x = default.left_x;
        cfg.right_x = default.right_x;
    }
    cfg.screen_width =
        get_parsed(conf, "Playfield", "ScreenWidth").unwrap_or(default.screen_width);
    cfg.bound_margin =
        get_parsed(conf, "Playfield", "BoundMargin").unwrap_or(default.bound_margin);
    cfg.clearance =
        get_parsed(conf, "Playfield", "ClearanceMargin").unwrap_or(default.clearance);
    for (i, key) in LINE_Y_KEYS.iter().enumerate() {
        cfg.line_y[i] = get_parsed(conf, "Playfield", key).unwrap_or(default.line_y[i]);
    }
    for (i, key) in LANE_Y_KEYS.iter().enumerate() {
        cfg.lane_y[i] = get_parsed(conf, "Playfield", key).unwrap_or(default.lane_y[i]);
    }

    cfg.autoplay_tick_hz =
        get_parsed(conf, "Autoplay", "TickRateHz").unwrap_or(default.autoplay_tick_hz);
    cfg.autoplay_hit_offset_s = get_parsed(conf, "Autoplay", "HitOffsetSeconds")
        .unwrap_or(default.autoplay_hit_offset_s);

    cfg
}

pub fn to_ini(cfg: &Config) -> Ini {
    let mut conf = Ini::new();
    let mut put = |section: &str, key: &str, value: String| {
        conf.set_to(Some(section), key.to_string(), value);
    };

    put("Options", "LogLevel", cfg.log_level.as_str().to_string());

    for (key, value) in WINDOW_KEYS.iter().zip(cfg.judge_windows_s) {
        put("Judge", key, value.to_string());
    }
    put("Judge", "FailThreshold", cfg.fail_threshold.to_string());

    put("Playfield", "LeftX", cfg.left_x.to_string());
    put("Playfield", "RightX", cfg.right_x.to_string());
    put("Playfield", "ScreenWidth", cfg.screen_width.to_string());
    put("Playfield", "BoundMargin", cfg.bound_margin.to_string());
    put("Playfield", "ClearanceMargin", cfg.clearance.to_string());
    for (key, value) in LINE_Y_KEYS.iter().zip(cfg.line_y) {
        put("Playfield", key, value.to_string());
    }
    for (key, value) in LANE_Y_KEYS.iter().zip(cfg.lane_y) {
        put("Playfield", key, value.to_string());
    }

    put("Autoplay", "TickRateHz", cfg.autoplay_tick_hz.to_string());
    put("Autoplay", "HitOffsetSeconds", cfg.autoplay_hit_offset_s.to_string());
    conf
}

fn create_default_config_file(path: &Path) -> Result<(), std::io::Error> {
    info!("'{}' not found, creating with default values.", path.display());
    to_ini(&Config::default()).write_to_file(path)
}

pub fn load() {
    load_from(Path::new(CONFIG_PATH));
}

/// Loads `path` into the global config. A missing file is created with
/// defaults; an unreadable one leaves the defaults in place.
pub fn load_from(path: &Path) {
    if !path.exists()
        && let Err(e) = create_default_config_file(path)
    {
        warn!("Failed to create default config file: {e}");
    }

    match Ini::load_from_file(path) {
        Ok(conf) => {
            let cfg = parse_ini(&conf);
            *CONFIG.lock().unwrap_or_else(PoisonError::into_inner) = cfg;
            info!("Configuration loaded from '{}'.", path.display());
        }
        Err(e) => {
            warn!(
                "Failed to load '{}': {e}. Using default values.",
                path.display()
            );
        }
    }
}

pub fn get() -> Config {
    *CONFIG.lock().unwrap_or_else(PoisonError::into_inner)
}
