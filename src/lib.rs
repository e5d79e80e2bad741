//! bitseq reconstructs the frames of an animated bitmap sequence from keyframe-anchored patches.
//!
//! A sequence is a canvas plus an ordered list of frames. Each frame carries encoded image patches
//! placed at offsets inside the canvas; keyframes re-establish the whole canvas, delta frames only
//! touch what changed since the previous frame.
//!
//! # Pipeline overview
//!
//! 1. **Describe**: build a [`BitmapSequence`] with [`SequenceBuilder`] or load it from a JSON
//!    manifest with [`load_manifest`]. The sequence is immutable and shared behind an `Arc`.
//! 2. **Read**: a [`SequenceReader`] owns one canvas-sized [`PixelBuffer`] and remembers which
//!    frame it holds. [`SequenceReader::get_frame`] applies the fewest patches needed to reach the
//!    requested frame, restarting from a keyframe on seeks.
//! 3. **Decode**: patches are decoded by a [`PatchCodec`] directly into the buffer at their
//!    offset. [`ImagePatchCodec`] handles the formats supported by the `image` crate.
//! 4. **Upload** (outside this crate): the returned [`FrameGuard`] derefs to the buffer; copy it
//!    out with [`PixelBuffer::to_frame`] or hand out a zero-copy [`PixelBuffer::share`] for static
//!    content.
//!
//! Key constraints:
//!
//! - **No unsafe**: `unsafe` is forbidden in this crate.
//! - **Never a half-built frame**: a reader only reports a frame as composited once every patch
//!   from its start frame through the target succeeded; failures force a keyframe rebuild.
//! - **Premultiplied RGBA8** end-to-end.
#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod codec;
mod foundation;
mod perf;
mod pixels;
mod sequence;

pub use codec::image_codec::ImagePatchCodec;
pub use codec::{PatchCodec, PatchDecoder};
pub use foundation::core::{Canvas, FrameIndex, Rgba8Premul};
pub use foundation::error::{BitseqError, BitseqResult};
pub use perf::{NoopPerf, PerfSink, PerfStats, Performance};
pub use pixels::buffer::{FrameRGBA, PixelBuffer};
pub use pixels::pixmap::{ColorType, ImageInfo, PixmapMut};
pub use sequence::dsl::{FrameBuilder, SequenceBuilder};
pub use sequence::manifest::{
    ManifestFrame, ManifestPatch, SequenceManifest, load_manifest, normalize_rel_path,
};
pub use sequence::model::{BitmapFrame, BitmapRect, BitmapSequence};
pub use sequence::reader::{FrameGuard, ReaderOpts, SequenceReader};
