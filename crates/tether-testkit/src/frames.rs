//! Frame schedulers for tests

use parking_lot::Mutex;
use std::collections::VecDeque;
use tether_core::{FrameCallback, FrameScheduler};

/// Queues frame callbacks until the test runs them.
#[derive(Default)]
pub struct ManualFrames {
    queue: Mutex<VecDeque<FrameCallback>>,
}

impl ManualFrames {
    /// Create an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Callbacks waiting for the next frame
    pub fn pending(&self) -> usize {
        self.queue.lock().len()
    }

    /// Run one frame: every callback queued before the call, and nothing
    /// those callbacks request. Returns how many ran.
    pub fn tick(&self) -> usize {
        let batch: Vec<_> = self.queue.lock().drain(..).collect();
        let ran = batch.len();
        for callback in batch {
            callback();
        }
        ran
    }

    /// Run frames until the queue is empty. Returns the number of frames.
    pub fn flush(&self) -> usize {
        let mut frames = 0;
        while self.tick() > 0 {
            frames += 1;
        }
        frames
    }
}

impl std::fmt::Debug for ManualFrames {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManualFrames")
            .field("pending", &self.pending())
            .finish()
    }
}

impl FrameScheduler for ManualFrames {
    fn request_frame(&self, callback: FrameCallback) {
        self.queue.lock().push_back(callback);
    }
}

/// Runs every frame callback as soon as it is requested.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImmediateFrames;

impl FrameScheduler for ImmediateFrames {
    fn request_frame(&self, callback: FrameCallback) {
        callback();
    }
}
