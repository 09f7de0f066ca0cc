//! Frame and detection geometry.
//!
//! - `Frame`: Immutable RGB pixel buffer with a monotonic sequence number.
//! - `DetectionBox`: Pixel-coordinate box, clamped to frame bounds on
//!   construction. Degenerate boxes (empty after clamping) are rejected.
//! - `Detection`: A box plus the detector's confidence for it.
//!
//! Frames are produced by an ingest source, consumed by exactly one pipeline
//! pass, then dropped. The crop operation copies the sub-image out so the
//! recognizer never borrows the parent frame.

use anyhow::{anyhow, Result};

/// One captured frame. Pixels are tightly packed RGB, row-major.
#[derive(Clone)]
pub struct Frame {
    data: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Monotonically increasing capture sequence number.
    pub seq: u64,
}

const BYTES_PER_PIXEL: usize = 3;

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, seq: u64) -> Result<Self> {
        let expected = width as usize * height as usize * BYTES_PER_PIXEL;
        if data.len() != expected {
            return Err(anyhow!(
                "frame {}: buffer is {} bytes, expected {} for {}x{} rgb",
                seq,
                data.len(),
                expected,
                width,
                height
            ));
        }
        Ok(Self {
            data,
            width,
            height,
            seq,
        })
    }

    pub fn pixels(&self) -> &[u8] {
        &self.data
    }

    /// Copy the sub-image under `bbox` into a standalone frame.
    ///
    /// The box has already been clamped at construction, so this cannot read
    /// out of bounds. The crop keeps the parent's sequence number.
    pub fn crop(&self, bbox: &DetectionBox) -> Frame {
        let w = (bbox.x2 - bbox.x1) as usize;
        let h = (bbox.y2 - bbox.y1) as usize;
        let stride = self.width as usize * BYTES_PER_PIXEL;

        let mut data = Vec::with_capacity(w * h * BYTES_PER_PIXEL);
        for row in bbox.y1 as usize..bbox.y2 as usize {
            let start = row * stride + bbox.x1 as usize * BYTES_PER_PIXEL;
            data.extend_from_slice(&self.data[start..start + w * BYTES_PER_PIXEL]);
        }

        Frame {
            data,
            width: w as u32,
            height: h as u32,
            seq: self.seq,
        }
    }
}

// ----------------------------------------------------------------------------
// DetectionBox
// ----------------------------------------------------------------------------

/// A detector bounding box in pixel coordinates, `x1 < x2` and `y1 < y2`
/// guaranteed after clamping.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DetectionBox {
    pub x1: u32,
    pub y1: u32,
    pub x2: u32,
    pub y2: u32,
}

impl DetectionBox {
    /// Clamp raw (possibly negative, possibly oversized) detector output to
    /// the frame. Returns `None` when the clamped box is empty.
    pub fn clamped(
        x1: i64,
        y1: i64,
        x2: i64,
        y2: i64,
        frame_width: u32,
        frame_height: u32,
    ) -> Option<Self> {
        let cx1 = x1.clamp(0, frame_width.saturating_sub(1) as i64) as u32;
        let cx2 = x2.clamp(0, frame_width as i64) as u32;
        let cy1 = y1.clamp(0, frame_height.saturating_sub(1) as i64) as u32;
        let cy2 = y2.clamp(0, frame_height as i64) as u32;

        if cx2 <= cx1 || cy2 <= cy1 {
            return None;
        }
        Some(Self {
            x1: cx1,
            y1: cy1,
            x2: cx2,
            y2: cy2,
        })
    }

    pub fn width(&self) -> u32 {
        self.x2 - self.x1
    }

    pub fn height(&self) -> u32 {
        self.y2 - self.y1
    }
}

/// A detection: clamped box plus detector confidence in `[0, 1]`.
#[derive(Clone, Copy, Debug)]
pub struct Detection {
    pub bbox: DetectionBox,
    pub confidence: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_frame(width: u32, height: u32, seq: u64) -> Frame {
        let data = vec![7u8; (width * height * 3) as usize];
        Frame::new(data, width, height, seq).unwrap()
    }

    #[test]
    fn frame_rejects_wrong_buffer_size() {
        assert!(Frame::new(vec![0u8; 10], 4, 4, 0).is_err());
    }

    #[test]
    fn box_clamps_to_frame_bounds() {
        let b = DetectionBox::clamped(-5, -5, 700, 500, 640, 480).unwrap();
        assert_eq!(
            b,
            DetectionBox {
                x1: 0,
                y1: 0,
                x2: 640,
                y2: 480
            }
        );
    }

    #[test]
    fn degenerate_box_is_rejected() {
        // Entirely off-frame to the right: clamps to an empty box.
        assert!(DetectionBox::clamped(700, 10, 720, 20, 640, 480).is_none());
        // Inverted coordinates.
        assert!(DetectionBox::clamped(50, 50, 40, 60, 640, 480).is_none());
    }

    #[test]
    fn crop_copies_expected_region() {
        let frame = solid_frame(8, 8, 3);
        let bbox = DetectionBox::clamped(2, 2, 6, 5, 8, 8).unwrap();
        let crop = frame.crop(&bbox);
        assert_eq!(crop.width, 4);
        assert_eq!(crop.height, 3);
        assert_eq!(crop.pixels().len(), 4 * 3 * 3);
        assert_eq!(crop.seq, 3);
    }
}
