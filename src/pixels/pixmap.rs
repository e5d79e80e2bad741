use crate::foundation::{
    error::{BitseqError, BitseqResult},
    math::strided_len,
};

/// Pixel layout of a raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ColorType {
    /// Four bytes per pixel, `r, g, b, a`, color premultiplied by alpha.
    Rgba8888Premul,
    /// One coverage byte per pixel.
    Alpha8,
}

impl ColorType {
    /// Bytes occupied by one pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8888Premul => 4,
            Self::Alpha8 => 1,
        }
    }
}

/// Geometry and layout of a strided raster.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ImageInfo {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Pixel layout.
    pub color_type: ColorType,
    /// Distance in bytes between the starts of two consecutive rows.
    pub row_bytes: usize,
}

impl ImageInfo {
    /// Tightly packed info (`row_bytes == width * bytes_per_pixel`).
    pub fn packed(width: u32, height: u32, color_type: ColorType) -> BitseqResult<Self> {
        let row_bytes = (width as usize)
            .checked_mul(color_type.bytes_per_pixel())
            .ok_or_else(|| BitseqError::allocation(format!("row of {width} pixels overflows")))?;
        Ok(Self {
            width,
            height,
            color_type,
            row_bytes,
        })
    }

    /// Bytes covered by pixel data within one row.
    pub fn min_row_bytes(&self) -> usize {
        self.width as usize * self.color_type.bytes_per_pixel()
    }

    /// Bytes a pixel slice must span to hold this raster; the last row carries no padding.
    pub fn byte_size(&self) -> Option<usize> {
        strided_len(self.height, self.row_bytes, self.min_row_bytes())
    }

    /// Return `true` when the raster holds no pixels.
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Writable, strided view over caller-owned pixel memory.
///
/// Decoders write through this view; a [`PixmapMut::subview`] addresses a rectangle at a byte
/// offset of the parent while keeping the parent's stride, so patches land directly in place.
#[derive(Debug)]
pub struct PixmapMut<'a> {
    info: ImageInfo,
    pixels: &'a mut [u8],
}

impl<'a> PixmapMut<'a> {
    /// Wrap `pixels` as a raster described by `info`.
    pub fn new(info: ImageInfo, pixels: &'a mut [u8]) -> BitseqResult<Self> {
        if info.row_bytes < info.min_row_bytes() {
            return Err(BitseqError::validation(format!(
                "row_bytes {} smaller than row width {}",
                info.row_bytes,
                info.min_row_bytes()
            )));
        }
        let need = info
            .byte_size()
            .ok_or_else(|| BitseqError::validation("pixmap byte size overflows"))?;
        if pixels.len() < need {
            return Err(BitseqError::validation(format!(
                "pixmap needs {need} bytes, got {}",
                pixels.len()
            )));
        }
        Ok(Self { info, pixels })
    }

    /// Wrap memory already sized from `info` by its owning buffer.
    pub(crate) fn from_buffer(info: ImageInfo, pixels: &'a mut [u8]) -> Self {
        debug_assert!(info.byte_size().is_some_and(|n| n <= pixels.len()));
        Self { info, pixels }
    }

    /// Layout of this view.
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

    /// Raw pixel memory starting at the view origin.
    pub fn writable_pixels(&mut self) -> &mut [u8] {
        &mut *self.pixels
    }

    /// Pixel bytes of row `y`, excluding stride padding.
    pub fn row_mut(&mut self, y: u32) -> Option<&mut [u8]> {
        if y >= self.info.height {
            return None;
        }
        let start = y as usize * self.info.row_bytes;
        let end = start + self.info.min_row_bytes();
        self.pixels.get_mut(start..end)
    }

    /// Clear every pixel in the view to fully transparent.
    pub fn erase_all(&mut self) {
        let width_bytes = self.info.min_row_bytes();
        if self.info.row_bytes == width_bytes {
            let len = self.info.byte_size().unwrap_or(0);
            self.pixels[..len].fill(0);
            return;
        }
        for y in 0..self.info.height {
            if let Some(row) = self.row_mut(y) {
                row.fill(0);
            }
        }
    }

    /// Borrow the `width x height` rectangle at `(x, y)` as its own view.
    pub fn subview(
        &mut self,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> BitseqResult<PixmapMut<'_>> {
        let right = u64::from(x) + u64::from(width);
        let bottom = u64::from(y) + u64::from(height);
        if right > u64::from(self.info.width) || bottom > u64::from(self.info.height) {
            return Err(BitseqError::validation(format!(
                "rect {width}x{height} at ({x}, {y}) exceeds {}x{} pixmap",
                self.info.width, self.info.height
            )));
        }

        let info = ImageInfo {
            width,
            height,
            color_type: self.info.color_type,
            row_bytes: self.info.row_bytes,
        };
        if info.is_empty() {
            return Ok(PixmapMut {
                info,
                pixels: Default::default(),
            });
        }
        let offset =
            self.info.row_bytes * y as usize + x as usize * info.color_type.bytes_per_pixel();
        let len = info
            .byte_size()
            .ok_or_else(|| BitseqError::validation("subview byte size overflows"))?;
        let pixels = self
            .pixels
            .get_mut(offset..offset + len)
            .ok_or_else(|| BitseqError::validation("subview outside pixel memory"))?;
        Ok(PixmapMut { info, pixels })
    }
}

#[cfg(test)]
#[path = "../../tests/unit/pixels/pixmap.rs"]
mod tests;
