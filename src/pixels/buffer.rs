use std::sync::Arc;

use crate::{
    foundation::{
        core::Rgba8Premul,
        error::{BitseqError, BitseqResult},
        math::unpremultiply_rgba8_in_place,
    },
    pixels::pixmap::{ColorType, ImageInfo, PixmapMut},
};

/// Tightly packed frame pixels handed across the upload boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrameRGBA {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Row-major RGBA8 bytes, `width * 4` per row.
    pub data: Vec<u8>,
    /// Whether color channels are premultiplied by alpha.
    pub premultiplied: bool,
}

impl FrameRGBA {
    /// Pixel bytes with straight (non-premultiplied) alpha, as image files expect.
    pub fn to_straight_rgba8(&self) -> Vec<u8> {
        let mut out = self.data.clone();
        if self.premultiplied {
            unpremultiply_rgba8_in_place(&mut out);
        }
        out
    }
}

enum Storage {
    /// Private raster; never handed out.
    Exclusive(Vec<u8>),
    /// Reference-counted raster; writes are copy-on-write while shares are alive.
    Shared(Arc<Vec<u8>>),
}

impl Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Self::Exclusive(v) => v.as_slice(),
            Self::Shared(v) => v.as_slice(),
        }
    }

    fn bytes_mut(&mut self) -> &mut Vec<u8> {
        match self {
            Self::Exclusive(v) => v,
            Self::Shared(v) => Arc::make_mut(v),
        }
    }
}

/// Owned rectangular raster with a fixed size and stride.
pub struct PixelBuffer {
    info: ImageInfo,
    storage: Storage,
}

impl std::fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("info", &self.info)
            .field("shared", &self.is_shared())
            .field("len", &self.storage.bytes().len())
            .finish()
    }
}

impl PixelBuffer {
    /// Allocate a zero-filled buffer.
    ///
    /// `alpha_only` selects [`ColorType::Alpha8`] instead of premultiplied RGBA8888.
    /// `force_exclusive` demands private memory; otherwise the buffer is reference counted and
    /// can be handed out through [`PixelBuffer::share`].
    pub fn make(
        width: u32,
        height: u32,
        alpha_only: bool,
        force_exclusive: bool,
    ) -> BitseqResult<Self> {
        if width == 0 || height == 0 {
            return Err(BitseqError::allocation(format!(
                "pixel buffer must be non-empty, got {width}x{height}"
            )));
        }
        let color_type = if alpha_only {
            ColorType::Alpha8
        } else {
            ColorType::Rgba8888Premul
        };
        let info = ImageInfo::packed(width, height, color_type)?;
        let len = info
            .byte_size()
            .ok_or_else(|| BitseqError::allocation(format!("{width}x{height} raster overflows")))?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|e| BitseqError::allocation(format!("{width}x{height} raster: {e}")))?;
        pixels.resize(len, 0);

        let storage = if force_exclusive {
            Storage::Exclusive(pixels)
        } else {
            Storage::Shared(Arc::new(pixels))
        };
        Ok(Self { info, storage })
    }

    /// Layout of the raster.
    pub fn info(&self) -> ImageInfo {
        self.info
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.info.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.info.height
    }

    /// Row stride in bytes.
    pub fn row_bytes(&self) -> usize {
        self.info.row_bytes
    }

    /// Return `true` when the raster is reference counted rather than private.
    pub fn is_shared(&self) -> bool {
        matches!(self.storage, Storage::Shared(_))
    }

    /// Read-only pixel memory.
    pub fn pixels(&self) -> &[u8] {
        self.storage.bytes()
    }

    /// Clear the whole raster to fully transparent.
    pub fn erase_all(&mut self) {
        self.storage.bytes_mut().fill(0);
    }

    /// Writable view over the whole raster.
    pub fn pixmap_mut(&mut self) -> PixmapMut<'_> {
        PixmapMut::from_buffer(self.info, self.storage.bytes_mut().as_mut_slice())
    }

    /// Zero-copy handle to the current pixels, available only for shared allocations.
    ///
    /// Later writes to this buffer never show through an outstanding handle.
    pub fn share(&self) -> Option<Arc<Vec<u8>>> {
        match &self.storage {
            Storage::Shared(v) => Some(Arc::clone(v)),
            Storage::Exclusive(_) => None,
        }
    }

    /// Premultiplied pixel at `(x, y)`; alpha-only buffers report black with that coverage.
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba8Premul> {
        if x >= self.info.width || y >= self.info.height {
            return None;
        }
        let bpp = self.info.color_type.bytes_per_pixel();
        let at = y as usize * self.info.row_bytes + x as usize * bpp;
        let bytes = self.pixels().get(at..at + bpp)?;
        match self.info.color_type {
            ColorType::Rgba8888Premul => Rgba8Premul::from_bytes(bytes),
            ColorType::Alpha8 => Some(Rgba8Premul {
                a: bytes[0],
                ..Rgba8Premul::transparent()
            }),
        }
    }

    /// Iterate the pixel bytes of each row, without stride padding.
    pub fn rows(&self) -> impl Iterator<Item = &[u8]> + '_ {
        let width_bytes = self.info.min_row_bytes();
        let row_bytes = self.info.row_bytes;
        let pixels = self.pixels();
        (0..self.info.height as usize).map(move |y| {
            let start = y * row_bytes;
            &pixels[start..start + width_bytes]
        })
    }

    /// Stable 64-bit hash of dimensions, layout, and visible pixels.
    pub fn content_hash(&self) -> u64 {
        let mut h = xxhash_rust::xxh3::Xxh3::new();
        h.update(&self.info.width.to_le_bytes());
        h.update(&self.info.height.to_le_bytes());
        h.update(&[self.info.color_type.bytes_per_pixel() as u8]);
        for row in self.rows() {
            h.update(row);
        }
        h.digest()
    }

    /// Copy out a tightly packed premultiplied RGBA8 frame.
    pub fn to_frame(&self) -> FrameRGBA {
        let px_count = self.info.width as usize * self.info.height as usize;
        let mut data = Vec::with_capacity(px_count * 4);
        for row in self.rows() {
            match self.info.color_type {
                ColorType::Rgba8888Premul => data.extend_from_slice(row),
                ColorType::Alpha8 => {
                    for &a in row {
                        data.extend_from_slice(&[0, 0, 0, a]);
                    }
                }
            }
        }
        FrameRGBA {
            width: self.info.width,
            height: self.info.height,
            data,
            premultiplied: true,
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pixels/buffer.rs"]
mod tests;
