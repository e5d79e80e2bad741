use std::sync::Arc;

use crate::{
    foundation::{core::Canvas, error::BitseqResult},
    sequence::model::{BitmapFrame, BitmapRect, BitmapSequence},
};

/// Fluent builder for [`BitmapSequence`].
pub struct SequenceBuilder {
    canvas: Canvas,
    static_content: bool,
    frame_rate: f32,
    frames: Vec<BitmapFrame>,
}

impl SequenceBuilder {
    /// Start a sequence on a `width x height` canvas at 30 fps.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            canvas: Canvas { width, height },
            static_content: false,
            frame_rate: 30.0,
            frames: Vec::new(),
        }
    }

    /// Mark the owning composition as static.
    pub fn static_content(mut self, static_content: bool) -> Self {
        self.static_content = static_content;
        self
    }

    /// Playback rate in frames per second.
    pub fn frame_rate(mut self, fps: f32) -> Self {
        self.frame_rate = fps;
        self
    }

    /// Append a finished frame.
    pub fn frame(mut self, frame: BitmapFrame) -> Self {
        self.frames.push(frame);
        self
    }

    /// Append a keyframe built by `f`.
    pub fn keyframe(self, f: impl FnOnce(FrameBuilder) -> FrameBuilder) -> Self {
        let frame = f(FrameBuilder::new(true)).build();
        self.frame(frame)
    }

    /// Append a delta frame built by `f`.
    pub fn delta(self, f: impl FnOnce(FrameBuilder) -> FrameBuilder) -> Self {
        let frame = f(FrameBuilder::new(false)).build();
        self.frame(frame)
    }

    /// Append a delta frame with no patches.
    pub fn empty_delta(self) -> Self {
        self.frame(BitmapFrame::default())
    }

    /// Validate and return the shared sequence.
    pub fn build(self) -> BitseqResult<Arc<BitmapSequence>> {
        BitmapSequence::new(
            self.canvas,
            self.static_content,
            self.frame_rate,
            self.frames,
        )
        .map(Arc::new)
    }
}

/// Builder for one [`BitmapFrame`].
pub struct FrameBuilder {
    frame: BitmapFrame,
}

impl FrameBuilder {
    fn new(is_keyframe: bool) -> Self {
        Self {
            frame: BitmapFrame {
                is_keyframe,
                patches: Default::default(),
            },
        }
    }

    /// Add an encoded patch at `(x, y)` with declared size `width x height`.
    pub fn patch(
        mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
        bytes: impl Into<Arc<[u8]>>,
    ) -> Self {
        self.frame
            .patches
            .push(BitmapRect::new(x, y, width, height, bytes));
        self
    }

    /// Add a patch with no encoded bytes.
    pub fn blank(self, x: u32, y: u32) -> Self {
        self.patch(x, y, 0, 0, Vec::<u8>::new())
    }

    /// Finish the frame.
    pub fn build(self) -> BitmapFrame {
        self.frame
    }
}

#[cfg(test)]
#[path = "../../tests/unit/sequence/dsl.rs"]
mod tests;
