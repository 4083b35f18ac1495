//! Captured frame types.

use bytes::BytesMut;

/// Bytes per pixel of BGRX/BGRA frames.
pub const BGRA_CHANNELS: u32 = 4;

/// Frame rate as a rational number.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRate {
    /// Numerator, e.g. 30000.
    pub numerator: u32,

    /// Denominator, e.g. 1001.
    pub denominator: u32,
}

impl FrameRate {
    /// Create a new frame rate.
    pub const fn new(numerator: u32, denominator: u32) -> Self {
        Self {
            numerator,
            denominator,
        }
    }

    /// Frames per second, or `None` when the rate is not usable.
    pub fn as_fps(&self) -> Option<f32> {
        if self.denominator == 0 || self.numerator == 0 {
            return None;
        }
        Some(self.numerator as f32 / self.denominator as f32)
    }
}

/// A received video frame. Dropping it hands the buffer back.
#[derive(Debug)]
pub struct VideoFrame {
    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Rate declared by the sender.
    pub frame_rate: FrameRate,

    /// Tightly packed BGRA pixel data.
    pub data: BytesMut,
}

impl VideoFrame {
    /// Calculate expected buffer size for given dimensions.
    pub fn buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * BGRA_CHANNELS as usize
    }

    /// Validate that the frame data matches its dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::buffer_size(self.width, self.height)
    }
}

/// Result of a single capture call.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// A video frame arrived.
    Video(VideoFrame),

    /// Nothing arrived before the timeout.
    None,

    /// Audio, metadata or a status change arrived.
    Other,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_rate_as_fps() {
        assert_eq!(FrameRate::new(30, 1).as_fps(), Some(30.0));
        assert!((FrameRate::new(30000, 1001).as_fps().unwrap() - 29.97).abs() < 0.01);
        assert_eq!(FrameRate::new(30, 0).as_fps(), None);
        assert_eq!(FrameRate::new(0, 1).as_fps(), None);
    }

    #[test]
    fn test_frame_validity() {
        let frame = VideoFrame {
            width: 2,
            height: 2,
            frame_rate: FrameRate::new(30, 1),
            data: BytesMut::zeroed(16),
        };
        assert!(frame.is_valid());

        let short = VideoFrame {
            data: BytesMut::zeroed(15),
            ..frame
        };
        assert!(!short.is_valid());
    }
}
