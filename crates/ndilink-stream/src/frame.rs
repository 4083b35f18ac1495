//! Frames handed to texture sinks.

use bytes::Bytes;

/// Bytes per pixel of every frame pushed to a sink.
pub const RGBA_CHANNELS: u32 = 4;

/// A frame in RGBA order, ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// RGBA pixel data.
    pub data: Bytes,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// Bytes per pixel.
    pub channels: u32,

    /// Monotonically increasing sequence number.
    pub sequence: u64,
}

impl Frame {
    /// Create a new RGBA frame.
    pub fn new(data: Bytes, width: u32, height: u32, sequence: u64) -> Self {
        Self {
            data,
            width,
            height,
            channels: RGBA_CHANNELS,
            sequence,
        }
    }

    /// A frame filled with a single colour.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        let data: Vec<u8> = rgba
            .iter()
            .copied()
            .cycle()
            .take(Self::buffer_size(width, height))
            .collect();
        Self::new(Bytes::from(data), width, height, 0)
    }

    /// The same pixels with another sequence number.
    pub fn with_sequence(&self, sequence: u64) -> Self {
        Self {
            sequence,
            ..self.clone()
        }
    }

    /// Calculate expected buffer size for given dimensions.
    pub fn buffer_size(width: u32, height: u32) -> usize {
        width as usize * height as usize * RGBA_CHANNELS as usize
    }

    /// Validate that the frame data matches expected dimensions.
    pub fn is_valid(&self) -> bool {
        self.data.len() == Self::buffer_size(self.width, self.height)
    }

    /// RGBA value of the pixel at `(x, y)`.
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * RGBA_CHANNELS as usize;
        let px = self.data.get(offset..offset + 4)?;
        Some([px[0], px[1], px[2], px[3]])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solid_frame() {
        let frame = Frame::solid(3, 2, [255, 0, 0, 255]);
        assert!(frame.is_valid());
        assert_eq!(frame.channels, 4);
        assert_eq!(frame.pixel(2, 1), Some([255, 0, 0, 255]));
        assert_eq!(frame.pixel(3, 0), None);
    }

    #[test]
    fn test_with_sequence_shares_pixels() {
        let frame = Frame::solid(1, 1, [1, 2, 3, 4]);
        let next = frame.with_sequence(7);
        assert_eq!(next.sequence, 7);
        assert_eq!(next.data, frame.data);
    }
}
