use std::sync::Arc;

use smallvec::SmallVec;

use crate::foundation::{
    core::{Canvas, FrameIndex},
    error::{BitseqError, BitseqResult},
};

/// Encoded image bytes placed at an offset inside the sequence canvas.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BitmapRect {
    /// Left edge in canvas pixels.
    pub x: u32,
    /// Top edge in canvas pixels.
    pub y: u32,
    /// Declared width of the patch.
    pub width: u32,
    /// Declared height of the patch.
    pub height: u32,
    /// Encoded image bytes; empty for a deliberately blank patch.
    pub bytes: Arc<[u8]>,
}

impl BitmapRect {
    /// Construct a patch at `(x, y)`.
    pub fn new(x: u32, y: u32, width: u32, height: u32, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            x,
            y,
            width,
            height,
            bytes: bytes.into(),
        }
    }

    /// Return `true` when the patch carries no encoded bytes.
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

/// Patches that turn the previous frame (or a cleared canvas, for keyframes) into this frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BitmapFrame {
    /// Whether this frame is a safe restart point.
    pub is_keyframe: bool,
    /// Patches in application order.
    pub patches: SmallVec<[BitmapRect; 1]>,
}

impl BitmapFrame {
    /// Keyframe with the given patches.
    pub fn keyframe(patches: impl IntoIterator<Item = BitmapRect>) -> Self {
        Self {
            is_keyframe: true,
            patches: patches.into_iter().collect(),
        }
    }

    /// Delta frame with the given patches.
    pub fn delta(patches: impl IntoIterator<Item = BitmapRect>) -> Self {
        Self {
            is_keyframe: false,
            patches: patches.into_iter().collect(),
        }
    }
}

/// Immutable description of an animated bitmap sequence.
///
/// Shared between readers behind an [`Arc`]; nothing here changes after construction.
#[derive(Clone, Debug, PartialEq)]
pub struct BitmapSequence {
    canvas: Canvas,
    static_content: bool,
    frame_rate: f32,
    frames: Vec<BitmapFrame>,
}

impl BitmapSequence {
    /// Validate and build a sequence.
    ///
    /// Every patch must lie inside the canvas and the first frame must be a keyframe.
    pub fn new(
        canvas: Canvas,
        static_content: bool,
        frame_rate: f32,
        frames: Vec<BitmapFrame>,
    ) -> BitseqResult<Self> {
        Canvas::new(canvas.width, canvas.height)?;
        if !frame_rate.is_finite() || frame_rate <= 0.0 {
            return Err(BitseqError::validation(format!(
                "frame_rate must be finite and > 0, got {frame_rate}"
            )));
        }
        if let Some(first) = frames.first()
            && !first.is_keyframe
        {
            return Err(BitseqError::validation("frame 0 must be a keyframe"));
        }
        for (fi, frame) in frames.iter().enumerate() {
            for (pi, p) in frame.patches.iter().enumerate() {
                if !canvas.contains_rect(p.x, p.y, p.width, p.height) {
                    return Err(BitseqError::validation(format!(
                        "frame {fi} patch {pi}: {}x{} at ({}, {}) exceeds {}x{} canvas",
                        p.width, p.height, p.x, p.y, canvas.width, canvas.height
                    )));
                }
            }
        }
        Ok(Self {
            canvas,
            static_content,
            frame_rate,
            frames,
        })
    }

    /// Canvas dimensions.
    pub fn canvas(&self) -> Canvas {
        self.canvas
    }

    /// Canvas width in pixels.
    pub fn width(&self) -> u32 {
        self.canvas.width
    }

    /// Canvas height in pixels.
    pub fn height(&self) -> u32 {
        self.canvas.height
    }

    /// Whether the owning composition never changes once decoded.
    pub fn static_content(&self) -> bool {
        self.static_content
    }

    /// Playback rate in frames per second.
    pub fn frame_rate(&self) -> f32 {
        self.frame_rate
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    /// Return `true` when the sequence has no frames.
    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// All frames in order.
    pub fn frames(&self) -> &[BitmapFrame] {
        &self.frames
    }

    /// Frame at `index`, if in range.
    pub fn frame(&self, index: FrameIndex) -> Option<&BitmapFrame> {
        self.frames.get(usize::try_from(index.0).ok()?)
    }

    /// Nearest keyframe at or before `index`.
    pub fn keyframe_at_or_before(&self, index: FrameIndex) -> Option<FrameIndex> {
        let end = usize::try_from(index.0).ok()?.min(self.frames.len().checked_sub(1)?);
        self.frames[..=end]
            .iter()
            .rposition(|f| f.is_keyframe)
            .map(|i| FrameIndex(i as u64))
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/model.rs"]
mod tests;
