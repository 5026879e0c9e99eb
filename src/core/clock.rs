use std::cell::Cell;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Source of elapsed song time in seconds.
///
/// Implementations must be monotonic and independent of frame rate; the
/// gameplay core never reads a wall clock itself.
pub trait SongClock {
    fn music_time(&self) -> f64;
}

impl<T: SongClock + ?Sized> SongClock for &T {
    fn music_time(&self) -> f64 {
        (**self).music_time()
    }
}

impl<T: SongClock + ?Sized> SongClock for Box<T> {
    fn music_time(&self) -> f64 {
        (**self).music_time()
    }
}

impl<T: SongClock + ?Sized> SongClock for Rc<T> {
    fn music_time(&self) -> f64 {
        (**self).music_time()
    }
}

/// Clock that only moves when told to. Used by autoplay and tests.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<f64>,
}

impl ManualClock {
    pub fn new(start: f64) -> Self {
        Self { now: Cell::new(start) }
    }

    pub fn set(&self, seconds: f64) {
        self.now.set(seconds);
    }

    pub fn advance(&self, delta: f64) {
        self.now.set(self.now.get() + delta);
    }
}

impl SongClock for ManualClock {
    fn music_time(&self) -> f64 {
        self.now.get()
    }
}

/// Song time derived from the audio device sample clock.
///
/// The output callback bumps `frames` by the number of frames it rendered;
/// the session reads them back on its own thread. Nothing here depends on
/// when frames are drawn.
#[derive(Clone, Debug)]
pub struct StreamClock {
    frames: Arc<AtomicU64>,
    sample_rate: u32,
    lead_in_seconds: f64,
    global_offset_seconds: f64,
}

impl StreamClock {
    pub fn new(sample_rate: u32, lead_in_seconds: f64, global_offset_seconds: f64) -> Self {
        Self {
            frames: Arc::new(AtomicU64::new(0)),
            sample_rate: sample_rate.max(1),
            lead_in_seconds: lead_in_seconds.max(0.0),
            global_offset_seconds,
        }
    }

    /// Handle for the audio callback.
    pub fn frames_handle(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.frames)
    }

    #[inline(always)]
    pub fn stream_position_seconds(&self) -> f64 {
        self.frames.load(Ordering::Acquire) as f64 / f64::from(self.sample_rate)
    }
}

impl SongClock for StreamClock {
    fn music_time(&self) -> f64 {
        self.stream_position_seconds() - self.lead_in_seconds + self.global_offset_seconds
    }
}

/// Pause/resume wrapper with a start offset, for previewing a chart from an
/// arbitrary bar.
#[derive(Debug)]
pub struct PreviewClock<C> {
    source: C,
    started_at: f64,
    paused_elapsed: f64,
    offset: f64,
    playing: bool,
    paused: bool,
}

impl<C: SongClock> PreviewClock<C> {
    pub fn new(source: C) -> Self {
        Self {
            source,
            started_at: 0.0,
            paused_elapsed: 0.0,
            offset: 0.0,
            playing: false,
            paused: false,
        }
    }

    pub fn start(&mut self, offset: f64) {
        self.offset = offset;
        self.started_at = self.source.music_time();
        self.paused_elapsed = 0.0;
        self.playing = true;
        self.paused = false;
    }

    pub fn pause(&mut self) {
        if !self.playing || self.paused {
            return;
        }
        self.paused_elapsed = self.source.music_time() - self.started_at;
        self.paused = true;
    }

    pub fn resume(&mut self) {
        if !self.playing || !self.paused {
            return;
        }
        // Shift the anchor so elapsed time continues from where it stopped.
        self.started_at = self.source.music_time() - self.paused_elapsed;
        self.paused = false;
    }

    pub fn stop(&mut self) {
        self.playing = false;
        self.paused = false;
    }

    pub const fn is_playing(&self) -> bool {
        self.playing
    }

    pub const fn is_paused(&self) -> bool {
        self.paused
    }
}

impl<C: SongClock> SongClock for PreviewClock<C> {
    fn music_time(&self) -> f64 {
        if !self.playing {
            return 0.0;
        }
        if self.paused {
            return self.offset + self.paused_elapsed;
        }
        self.offset + (self.source.music_time() - self.started_at)
    }
}
