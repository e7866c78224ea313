// THEORY:
// Fire detection is deliberately simple: a frame is anomalous when any reading is
// strictly above a fixed threshold. The check is stateless and recomputed for every
// frame in the window on every cycle, since window contents rotate and the cost is
// tiny next to rendering.

use crate::core_modules::frame::Frame;

pub const DEFAULT_FIRE_THRESHOLD: f64 = 60.0;

/// True iff the hottest reading in `frame` exceeds `threshold`.
pub fn is_anomalous(frame: &Frame, threshold: f64) -> bool {
    frame.cells().iter().any(|&value| value > threshold)
}

/// Per-frame fire flags for the current window, oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WindowAnomalies {
    pub flags: Vec<bool>,
    /// Logical OR over `flags`.
    pub any_anomalous: bool,
}

impl WindowAnomalies {
    pub fn assess<'a>(frames: impl IntoIterator<Item = &'a Frame>, threshold: f64) -> Self {
        let flags: Vec<bool> = frames
            .into_iter()
            .map(|frame| is_anomalous(frame, threshold))
            .collect();
        let any_anomalous = flags.iter().any(|&flag| flag);
        Self {
            flags,
            any_anomalous,
        }
    }

    pub fn count(&self) -> usize {
        self.flags.iter().filter(|&&flag| flag).count()
    }
}
