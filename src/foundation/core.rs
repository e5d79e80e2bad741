use crate::foundation::{
    error::{BitseqError, BitseqResult},
    math::mul_div255_u8,
};

/// Absolute 0-based frame index into a bitmap sequence.
#[derive(
    Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct FrameIndex(pub u64);

impl FrameIndex {
    /// Convert to a `usize` suitable for indexing frame tables.
    pub fn as_usize(self) -> BitseqResult<usize> {
        usize::try_from(self.0)
            .map_err(|_| BitseqError::validation(format!("frame {} exceeds usize", self.0)))
    }

    /// The frame immediately after this one, saturating at `u64::MAX`.
    pub fn next(self) -> Self {
        Self(self.0.saturating_add(1))
    }
}

impl From<u64> for FrameIndex {
    fn from(v: u64) -> Self {
        Self(v)
    }
}

impl std::fmt::Display for FrameIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Sequence canvas dimensions in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Canvas {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Canvas {
    /// Create a canvas, rejecting zero-sized dimensions.
    pub fn new(width: u32, height: u32) -> BitseqResult<Self> {
        if width == 0 || height == 0 {
            return Err(BitseqError::validation(format!(
                "canvas must be non-empty, got {width}x{height}"
            )));
        }
        Ok(Self { width, height })
    }

    /// Return `true` when a `width x height` rect at `(x, y)` lies fully inside the canvas.
    pub fn contains_rect(self, x: u32, y: u32, width: u32, height: u32) -> bool {
        let right = u64::from(x) + u64::from(width);
        let bottom = u64::from(y) + u64::from(height);
        right <= u64::from(self.width) && bottom <= u64::from(self.height)
    }
}

/// Premultiplied RGBA8 (r,g,b already multiplied by a).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub struct Rgba8Premul {
    /// Red channel premultiplied by alpha.
    pub r: u8,
    /// Green channel premultiplied by alpha.
    pub g: u8,
    /// Blue channel premultiplied by alpha.
    pub b: u8,
    /// Alpha channel.
    pub a: u8,
}

impl Rgba8Premul {
    /// Fully transparent black.
    pub fn transparent() -> Self {
        Self {
            r: 0,
            g: 0,
            b: 0,
            a: 0,
        }
    }

    /// Convert straight-alpha RGBA8 into premultiplied RGBA8.
    pub fn from_straight_rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        let a16 = u16::from(a);
        Self {
            r: mul_div255_u8(u16::from(r), a16),
            g: mul_div255_u8(u16::from(g), a16),
            b: mul_div255_u8(u16::from(b), a16),
            a,
        }
    }

    /// Byte layout as stored in an RGBA8888 raster.
    pub fn to_bytes(self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Read a pixel from the first four bytes of `px`.
    pub fn from_bytes(px: &[u8]) -> Option<Self> {
        match *px {
            [r, g, b, a, ..] => Some(Self { r, g, b, a }),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/foundation/core.rs"]
mod tests;
