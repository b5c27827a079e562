//! Turning noisy wheel/touch/key input into discrete single steps.

use crate::core::Direction;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    Other,
}

/// Arrow down steps forward, arrow up steps backward.
pub fn key_direction(key: Key) -> Option<Direction> {
    match key {
        Key::ArrowDown => Some(Direction::Forward),
        Key::ArrowUp => Some(Direction::Backward),
        Key::ArrowLeft | Key::ArrowRight | Key::Other => None,
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WheelSettings {
    pub idle_gap_ms: f64,
    pub debounce_ms: f64,
    pub threshold: f64,
}

impl Default for WheelSettings {
    fn default() -> Self {
        Self {
            idle_gap_ms: 150.0,
            debounce_ms: 30.0,
            threshold: 50.0,
        }
    }
}

/// Time-windowed sum of `|delta_y|`.
///
/// Every wheel event (re)arms a trailing deadline `debounce_ms` out. When the deadline passes
/// with no newer event, the window commits one step in the direction of the latest delta if the
/// sum crossed `threshold`, and resets either way. A gap longer than `idle_gap_ms` between two
/// events starts a fresh window.
#[derive(Clone, Debug)]
pub struct WheelAccumulator {
    settings: WheelSettings,
    accumulated: f64,
    last_event_ms: Option<f64>,
    last_direction: Option<Direction>,
    deadline_ms: Option<f64>,
}

impl WheelAccumulator {
    pub fn new(settings: WheelSettings) -> Self {
        Self {
            settings,
            accumulated: 0.0,
            last_event_ms: None,
            last_direction: None,
            deadline_ms: None,
        }
    }

    /// Records one wheel event; returns the new commit deadline.
    pub fn on_wheel(&mut self, now_ms: f64, delta_y: f64) -> f64 {
        if let Some(last) = self.last_event_ms
            && now_ms - last > self.settings.idle_gap_ms
        {
            self.accumulated = 0.0;
        }
        if delta_y.is_finite() {
            self.accumulated += delta_y.abs();
            if let Some(d) = Direction::from_delta(delta_y) {
                self.last_direction = Some(d);
            }
        }
        self.last_event_ms = Some(now_ms);
        let deadline = now_ms + self.settings.debounce_ms;
        self.deadline_ms = Some(deadline);
        deadline
    }

    /// Resolves the pending window if its deadline has passed. Stale deadlines (superseded by
    /// a newer event) return `None` and leave the window open.
    pub fn on_deadline(&mut self, now_ms: f64) -> Option<Direction> {
        let deadline = self.deadline_ms?;
        if now_ms < deadline {
            return None;
        }
        let commit = if self.accumulated > self.settings.threshold {
            self.last_direction
        } else {
            None
        };
        self.reset();
        commit
    }

    pub fn reset(&mut self) {
        self.accumulated = 0.0;
        self.last_direction = None;
        self.deadline_ms = None;
    }

    pub fn accumulated(&self) -> f64 {
        self.accumulated
    }

    pub fn deadline(&self) -> Option<f64> {
        self.deadline_ms
    }
}

/// Horizontal swipe detector for touch input.
#[derive(Clone, Debug)]
pub struct SwipeDetector {
    min_distance: f64,
    start_x: Option<f64>,
}

impl SwipeDetector {
    pub fn new(min_distance: f64) -> Self {
        Self {
            min_distance,
            start_x: None,
        }
    }

    pub fn start(&mut self, x: f64) {
        self.start_x = Some(x);
    }

    /// A swipe to the left (finger moves toward smaller x) steps forward.
    pub fn end(&mut self, x: f64) -> Option<Direction> {
        let start = self.start_x.take()?;
        let diff = start - x;
        if diff.abs() <= self.min_distance {
            return None;
        }
        Direction::from_delta(diff)
    }

    pub fn cancel(&mut self) {
        self.start_x = None;
    }
}
