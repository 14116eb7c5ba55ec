use crate::timers::{Scheduler, TimerId, TimerTask};
use std::time::Duration;

const FALLBACK_CELL_SIZE: CellSize = CellSize { width: 8.0, height: 16.0 };

/// The size of a terminal cell in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct CellSize {
    pub(crate) width: f64,
    pub(crate) height: f64,
}

impl CellSize {
    /// Computes the cell size out of the terminal's window size.
    ///
    /// Terminals that don't report their size in pixels get a fallback size.
    pub(crate) fn detect() -> Self {
        match crossterm::terminal::window_size() {
            Ok(size) => Self::from_window(size.columns, size.rows, size.width, size.height),
            Err(_) => FALLBACK_CELL_SIZE,
        }
    }

    fn from_window(columns: u16, rows: u16, width: u16, height: u16) -> Self {
        if columns == 0 || rows == 0 || width == 0 || height == 0 {
            return FALLBACK_CELL_SIZE;
        }
        Self { width: width as f64 / columns as f64, height: height as f64 / rows as f64 }
    }

    /// The position, in pixels, of the center of a cell.
    pub(crate) fn to_pixels(&self, column: u16, row: u16) -> (f64, f64) {
        ((column as f64 + 0.5) * self.width, (row as f64 + 0.5) * self.height)
    }
}

impl Default for CellSize {
    fn default() -> Self {
        FALLBACK_CELL_SIZE
    }
}

/// The direction the presentation moves in after a gesture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Direction {
    Forward,
    Backward,
}

/// Detects horizontal swipes out of press/release pairs.
#[derive(Debug)]
pub(crate) struct SwipeTracker {
    start: Option<(f64, f64)>,
    threshold: f64,
}

impl SwipeTracker {
    pub(crate) fn new(threshold: f64) -> Self {
        Self { start: None, threshold }
    }

    pub(crate) fn press(&mut self, x: f64, y: f64) {
        self.start = Some((x, y));
    }

    /// Finishes a drag, returning the direction to move in if it was a swipe.
    ///
    /// Dragging to the left moves forward. The drag needs to be mostly horizontal and longer than
    /// the threshold.
    pub(crate) fn release(&mut self, x: f64, y: f64) -> Option<Direction> {
        let (start_x, start_y) = self.start.take()?;
        let diff_x = start_x - x;
        let diff_y = start_y - y;
        if diff_x.abs() > diff_y.abs() && diff_x.abs() > self.threshold {
            if diff_x > 0.0 { Some(Direction::Forward) } else { Some(Direction::Backward) }
        } else {
            None
        }
    }
}

/// Collapses a burst of scroll events into a single one.
#[derive(Debug)]
pub(crate) struct WheelDebouncer {
    pending: Option<TimerId>,
    delay: Duration,
}

impl WheelDebouncer {
    pub(crate) fn new(delay: Duration) -> Self {
        Self { pending: None, delay }
    }

    /// Registers a scroll event, replacing any one that's still pending.
    pub(crate) fn scroll(&mut self, timers: &mut Scheduler, now: Duration, forward: bool) {
        if let Some(id) = self.pending.take() {
            timers.cancel(id);
        }
        self.pending = Some(timers.once(now, self.delay, TimerTask::WheelSettled { forward }));
    }

    /// Acknowledges that the pending scroll fired, returning the direction to move in.
    pub(crate) fn settled(&mut self, forward: bool) -> Direction {
        self.pending = None;
        if forward { Direction::Forward } else { Direction::Backward }
    }
}
