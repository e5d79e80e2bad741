//! Patch decoding boundary.
//!
//! A [`PatchCodec`] turns the encoded bytes of one patch into a [`PatchDecoder`], which then writes
//! pixels straight into caller-owned memory. Codecs are shared between reader threads, so they must
//! be `Send + Sync`; decoders are short-lived and used by one thread.

pub(crate) mod image_codec;

use crate::pixels::pixmap::PixmapMut;

/// Factory for per-patch decoders.
pub trait PatchCodec: Send + Sync {
    /// Open `bytes` for decoding.
    ///
    /// Returns `Ok(None)` for an intentionally empty patch. Returns an error when the bytes are
    /// present but not recognizable as an image.
    fn open<'a>(&'a self, bytes: &'a [u8]) -> anyhow::Result<Option<Box<dyn PatchDecoder + 'a>>>;
}

/// Decoder for a single opened patch.
pub trait PatchDecoder {
    /// Decoded width in pixels.
    fn width(&self) -> u32;

    /// Decoded height in pixels.
    fn height(&self) -> u32;

    /// Decode into `dst`, which is exactly `width() x height()` pixels with its own stride.
    ///
    /// Destination pixels are replaced, not blended.
    ///
    /// An error means the encoded data is corrupt or unsupported; `dst` may be partially written.
    fn read_into(&mut self, dst: &mut PixmapMut<'_>) -> anyhow::Result<()>;
}
