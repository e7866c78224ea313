// THEORY:
// The `WindowBuffer` is the short-term memory of the monitor. It holds the most
// recent N admitted frames, oldest first, and is the only thing that decides
// which frame falls out when a new one arrives.
//
// Key architectural principles:
// 1.  **Strict FIFO**: `advance` pushes the new frame to the back and, if that makes
//     the buffer longer than its capacity, pops exactly one frame from the front.
//     The length is therefore always `min(capacity, frames admitted)`.
// 2.  **All or Nothing**: The incoming record is validated before anything is
//     touched. A malformed record returns `InvalidFrame` and leaves the window
//     exactly as it was.
// 3.  **No Decimation Here**: Which records reach the buffer is the cycle driver's
//     business. The buffer admits whatever it is given.

use crate::core_modules::frame::{Frame, FrameError};
use crate::core_modules::frame_source::FrameRecord;
use std::collections::VecDeque;

pub const DEFAULT_WINDOW_CAPACITY: usize = 10;

/// Fixed-capacity sliding window of the most recent frames.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    frames: VecDeque<Frame>,
    capacity: usize,
    /// Total frames ever admitted, including evicted ones.
    admitted: u64,
}

impl WindowBuffer {
    /// Creates an empty window. A capacity of zero is clamped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            frames: VecDeque::with_capacity(capacity + 1),
            capacity,
            admitted: 0,
        }
    }

    /// Validates `record` and admits it, evicting the oldest frame when full.
    pub fn advance(&mut self, record: &FrameRecord) -> Result<&VecDeque<Frame>, FrameError> {
        let frame = record.decode()?;
        Ok(self.push(frame))
    }

    /// Admits an already-validated frame.
    pub fn push(&mut self, frame: Frame) -> &VecDeque<Frame> {
        self.frames.push_back(frame);
        if self.frames.len() > self.capacity {
            self.frames.pop_front();
        }
        self.admitted += 1;
        &self.frames
    }

    pub fn frames(&self) -> &VecDeque<Frame> {
        &self.frames
    }

    pub fn newest(&self) -> Option<&Frame> {
        self.frames.back()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.frames.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn admitted(&self) -> u64 {
        self.admitted
    }
}

impl Default for WindowBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(sequence: u64, value: f64) -> FrameRecord {
        FrameRecord::from_image(sequence, json!([[value, 0.0], [0.0, 0.0]]))
    }

    fn sequences(window: &WindowBuffer) -> Vec<u64> {
        window.frames().iter().map(Frame::sequence).collect()
    }

    #[test]
    fn length_tracks_min_of_capacity_and_admitted() {
        let mut window = WindowBuffer::new(4);
        for i in 0..10u64 {
            window.advance(&record(i, i as f64)).unwrap();
            assert_eq!(window.len(), (i as usize + 1).min(4));
        }
        assert_eq!(window.admitted(), 10);
        assert!(window.is_full());
    }

    #[test]
    fn keeps_most_recent_frames_in_order() {
        let mut window = WindowBuffer::new(3);
        for i in 0..7u64 {
            window.advance(&record(i, 1.0)).unwrap();
        }
        assert_eq!(sequences(&window), vec![4, 5, 6]);
        assert_eq!(window.newest().map(Frame::sequence), Some(6));
    }

    #[test]
    fn invalid_record_leaves_window_untouched() {
        let mut window = WindowBuffer::new(2);
        window.advance(&record(0, 1.0)).unwrap();
        window.advance(&record(1, 2.0)).unwrap();

        let bad = FrameRecord::from_image(2, json!("not a grid"));
        assert!(window.advance(&bad).is_err());
        assert_eq!(sequences(&window), vec![0, 1]);
        assert_eq!(window.admitted(), 2);
    }

    #[test]
    fn zero_capacity_is_clamped() {
        let mut window = WindowBuffer::new(0);
        window.advance(&record(0, 1.0)).unwrap();
        window.advance(&record(1, 1.0)).unwrap();
        assert_eq!(window.capacity(), 1);
        assert_eq!(sequences(&window), vec![1]);
    }
}
