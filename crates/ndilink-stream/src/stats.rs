//! Frame rate statistics of a stream worker.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use parking_lot::RwLock;

use ndilink_ipc::FpsSnapshot;

#[derive(Debug, Default)]
struct Timing {
    first_frame: Option<Instant>,
    last_frame: Option<Instant>,
    current: f32,
}

/// Collects frame rate statistics. Written by the capture thread, read by the host.
#[derive(Debug)]
pub struct FrameStats {
    timing: RwLock<Timing>,
    frame_count: AtomicU64,
    expected: RwLock<f32>,
}

impl FrameStats {
    /// Create a collector pacing towards `expected` frames per second.
    pub fn new(expected: f32) -> Self {
        Self {
            timing: RwLock::new(Timing::default()),
            frame_count: AtomicU64::new(0),
            expected: RwLock::new(expected),
        }
    }

    /// Record a frame delivered at `now`.
    pub fn record_frame(&self, now: Instant) {
        let mut timing = self.timing.write();

        if let Some(last) = timing.last_frame {
            let interval = now.duration_since(last).as_secs_f32();
            if interval > 0.0 {
                timing.current = 1.0 / interval;
            }
        }
        timing.first_frame.get_or_insert(now);
        timing.last_frame = Some(now);

        self.frame_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Update the pacing target.
    pub fn set_expected(&self, fps: f32) {
        *self.expected.write() = fps;
    }

    /// Number of frames delivered so far.
    pub fn frames(&self) -> u64 {
        self.frame_count.load(Ordering::Relaxed)
    }

    /// Get current statistics snapshot.
    pub fn snapshot(&self) -> FpsSnapshot {
        let timing = self.timing.read();
        let frames = self.frames();

        let average = match (timing.first_frame, timing.last_frame) {
            (Some(first), Some(last)) => {
                let span = last.duration_since(first).as_secs_f32();
                if span > 0.0 {
                    Some(frames.saturating_sub(1) as f32 / span)
                } else {
                    Some(0.0)
                }
            }
            _ => None,
        };

        FpsSnapshot {
            current: timing.current,
            average,
            expected: *self.expected.read(),
        }
    }
}
