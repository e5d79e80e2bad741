use std::io::Cursor;

use anyhow::{Context, bail};

use crate::{
    codec::{PatchCodec, PatchDecoder},
    foundation::math::premultiply_rgba8_in_place,
    pixels::pixmap::{ColorType, PixmapMut},
};

/// [`PatchCodec`] backed by the `image` crate (PNG, JPEG, WebP, ... as enabled there).
///
/// Dimensions come from the image header when the patch is opened; pixel data is only decoded by
/// [`PatchDecoder::read_into`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ImagePatchCodec;

impl PatchCodec for ImagePatchCodec {
    fn open<'a>(&'a self, bytes: &'a [u8]) -> anyhow::Result<Option<Box<dyn PatchDecoder + 'a>>> {
        if bytes.is_empty() {
            return Ok(None);
        }
        let (width, height) = image::ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .context("sniff patch image format")?
            .into_dimensions()
            .context("read patch image header")?;
        Ok(Some(Box::new(ImagePatchDecoder {
            bytes,
            width,
            height,
        })))
    }
}

struct ImagePatchDecoder<'a> {
    bytes: &'a [u8],
    width: u32,
    height: u32,
}

impl PatchDecoder for ImagePatchDecoder<'_> {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    fn read_into(&mut self, dst: &mut PixmapMut<'_>) -> anyhow::Result<()> {
        if dst.width() != self.width || dst.height() != self.height {
            bail!(
                "destination is {}x{}, patch decodes to {}x{}",
                dst.width(),
                dst.height(),
                self.width,
                self.height
            );
        }

        let rgba = image::load_from_memory(self.bytes)
            .context("decode patch image")?
            .to_rgba8();
        if rgba.dimensions() != (self.width, self.height) {
            bail!("patch header and pixel data disagree on dimensions");
        }

        let src_row = self.width as usize * 4;
        let color_type = dst.info().color_type;
        for (y, src) in rgba.as_raw().chunks_exact(src_row).enumerate() {
            let Some(row) = dst.row_mut(y as u32) else {
                bail!("destination row {y} missing");
            };
            match color_type {
                ColorType::Rgba8888Premul => {
                    row.copy_from_slice(src);
                    premultiply_rgba8_in_place(row);
                }
                ColorType::Alpha8 => {
                    for (d, px) in row.iter_mut().zip(src.chunks_exact(4)) {
                        *d = px[3];
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "../../tests/unit/codec/image_codec.rs"]
mod tests;
