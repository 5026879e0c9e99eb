use log::warn;
use std::sync::mpsc::{self, Receiver, Sender};

pub const LANE_COUNT: usize = 4;

/// One of the four physical input lanes, numbered 1..=4 as in chart files.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lane(u8);

impl Lane {
    pub const ALL: [Lane; LANE_COUNT] = [Lane(1), Lane(2), Lane(3), Lane(4)];

    #[inline(always)]
    pub const fn new(number: u8) -> Option<Self> {
        if number >= 1 && number as usize <= LANE_COUNT {
            Some(Self(number))
        } else {
            None
        }
    }

    #[inline(always)]
    pub const fn number(self) -> u8 {
        self.0
    }

    #[inline(always)]
    pub const fn index(self) -> usize {
        (self.0 - 1) as usize
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InputEdge {
    pub lane: Lane,
    pub pressed: bool,
    // Music time (seconds) at which this edge occurred, sampled from the same
    // clock that drives the session so judgments are not tied to frame timing.
    pub time: f64,
}

impl InputEdge {
    pub const fn press(lane: Lane, time: f64) -> Self {
        Self { lane, pressed: true, time }
    }

    pub const fn release(lane: Lane, time: f64) -> Self {
        Self { lane, pressed: false, time }
    }
}

/// What an edge meant for a lane once the previous held state is known.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EdgeTransition {
    Pressed,
    Released,
    // Press while already down, or release while already up.
    Unchanged,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LaneStates {
    held: [bool; LANE_COUNT],
}

impl LaneStates {
    #[inline(always)]
    pub const fn is_held(&self, lane: Lane) -> bool {
        self.held[lane.index()]
    }

    pub fn apply(&mut self, edge: &InputEdge) -> EdgeTransition {
        let slot = &mut self.held[edge.lane.index()];
        let was_down = *slot;
        *slot = edge.pressed;
        match (was_down, edge.pressed) {
            (false, true) => EdgeTransition::Pressed,
            (true, false) => EdgeTransition::Released,
            _ => EdgeTransition::Unchanged,
        }
    }

    pub fn release_all(&mut self) {
        self.held = [false; LANE_COUNT];
    }
}

/// Producer half of the input funnel. Cloneable so a polling thread can own
/// one while the session drains the other end inside its tick.
#[derive(Clone, Debug)]
pub struct InputSender {
    tx: Sender<InputEdge>,
}

impl InputSender {
    /// Returns false once the session side has been dropped.
    pub fn send(&self, edge: InputEdge) -> bool {
        self.tx.send(edge).is_ok()
    }

    pub fn lane_pressed(&self, lane_number: u8, time: f64) -> bool {
        self.send_raw(lane_number, true, time)
    }

    pub fn lane_released(&self, lane_number: u8, time: f64) -> bool {
        self.send_raw(lane_number, false, time)
    }

    fn send_raw(&self, lane_number: u8, pressed: bool, time: f64) -> bool {
        let Some(lane) = Lane::new(lane_number) else {
            warn!("Dropping input edge for unknown lane {lane_number}");
            return true;
        };
        self.send(InputEdge { lane, pressed, time })
    }
}

#[derive(Debug)]
pub struct InputReceiver {
    rx: Receiver<InputEdge>,
}

impl InputReceiver {
    /// Everything queued so far, without blocking.
    pub fn drain(&self) -> impl Iterator<Item = InputEdge> + '_ {
        self.rx.try_iter()
    }
}

pub fn input_channel() -> (InputSender, InputReceiver) {
    let (tx, rx) = mpsc::channel();
    (InputSender { tx }, InputReceiver { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn lane_numbers_outside_one_to_four_are_rejected() {
        assert!(Lane::new(0).is_none());
        assert!(Lane::new(5).is_none());
        let lane = Lane::new(3).expect("lane 3 is valid");
        assert_eq!(lane.number(), 3);
        assert_eq!(lane.index(), 2);
    }

    #[test]
    fn lane_state_reports_edges_not_levels() {
        let lane = Lane::new(1).unwrap();
        let mut states = LaneStates::default();
        assert_eq!(states.apply(&InputEdge::press(lane, 0.0)), EdgeTransition::Pressed);
        assert_eq!(states.apply(&InputEdge::press(lane, 0.1)), EdgeTransition::Unchanged);
        assert!(states.is_held(lane));
        assert_eq!(states.apply(&InputEdge::release(lane, 0.2)), EdgeTransition::Released);
        assert_eq!(states.apply(&InputEdge::release(lane, 0.3)), EdgeTransition::Unchanged);
        assert!(!states.is_held(lane));
    }

    #[test]
    fn edges_sent_from_another_thread_arrive_in_order() {
        let (tx, rx) = input_channel();
        let producer = thread::spawn(move || {
            for i in 0..8 {
                assert!(tx.lane_pressed(1 + (i % 4) as u8, i as f64 * 0.01));
            }
        });
        producer.join().unwrap();
        let times: Vec<f64> = rx.drain().map(|e| e.time).collect();
        assert_eq!(times.len(), 8);
        assert!(times.windows(2).all(|w| w[0] <= w[1]));
    }

    #[test]
    fn unknown_lane_is_dropped_without_closing_the_channel() {
        let (tx, rx) = input_channel();
        assert!(tx.lane_pressed(9, 0.0));
        assert!(tx.lane_released(2, 0.5));
        let edges: Vec<InputEdge> = rx.drain().collect();
        assert_eq!(edges, vec![InputEdge::release(Lane::new(2).unwrap(), 0.5)]);
    }
}
