//! Raster packetizing: 1-bit images into `DRAW_BITMAP` frames.
//!
//! Input images are `GrayImage`s holding only 0 (black) and 255 (white).
//! Converting arbitrary images is the caller's job; [`to_mono`] is a plain
//! threshold for callers that have nothing better.

use image::{DynamicImage, GrayImage, Luma};

use crate::protocol::{self, Command};
use crate::{CatPrintError, LINE_BYTES, PRINT_WIDTH, Result};

const BLACK: u8 = 0;
const WHITE: u8 = 255;

/// Check that `image` is 384 px wide and strictly black and white.
pub fn validate(image: &GrayImage) -> Result<()> {
    if image.width() != PRINT_WIDTH {
        return Err(CatPrintError::invalid_image(format!(
            "expected width {PRINT_WIDTH}, got {}",
            image.width()
        )));
    }
    if let Some((x, y, Luma([v]))) = image
        .enumerate_pixels()
        .find(|(_, _, Luma([v]))| *v != BLACK && *v != WHITE)
    {
        return Err(CatPrintError::invalid_image(format!(
            "not a 1-bit image: gray level {v} at ({x}, {y})"
        )));
    }
    Ok(())
}

/// Pack one row of pixels into the printer's line format.
///
/// Black pixels become set bits, the row is mirrored, packed MSB-first and
/// the resulting bytes are reversed.
pub fn pack_row(row: &[u8]) -> [u8; LINE_BYTES] {
    debug_assert_eq!(row.len(), PRINT_WIDTH as usize);

    let mut line = [0u8; LINE_BYTES];
    for (i, &px) in row.iter().rev().enumerate() {
        if px == BLACK {
            line[i / 8] |= 0x80 >> (i % 8);
        }
    }
    line.reverse();
    line
}

/// Lazily yields one encoded `DRAW_BITMAP` frame per image row, top to bottom.
#[derive(Debug, Clone)]
pub struct Packetizer<'a> {
    image: &'a GrayImage,
    next_row: u32,
}

impl Iterator for Packetizer<'_> {
    type Item = Vec<u8>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next_row >= self.image.height() {
            return None;
        }
        let width = self.image.width() as usize;
        let start = self.next_row as usize * width;
        let row = &self.image.as_raw()[start..start + width];
        self.next_row += 1;
        Some(protocol::encode(Command::DrawBitmap, &pack_row(row)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let left = self.image.height().saturating_sub(self.next_row) as usize;
        (left, Some(left))
    }
}

impl ExactSizeIterator for Packetizer<'_> {}

/// Validate `image` and return its bitmap frames.
pub fn packetize(image: &GrayImage) -> Result<Packetizer<'_>> {
    validate(image)?;
    Ok(Packetizer {
        image,
        next_row: 0,
    })
}

/// Threshold any image to pure black and white.
///
/// `black_point` is in 0.0..=1.0; pixels with luma below
/// `black_point * 255` print black. The image is not resized.
pub fn to_mono(image: &DynamicImage, black_point: f32) -> GrayImage {
    let threshold = (black_point.clamp(0.0, 1.0) * 255.0).round() as u16;
    let mut gray = image.to_luma8();
    for Luma([v]) in gray.pixels_mut() {
        *v = if u16::from(*v) < threshold { BLACK } else { WHITE };
    }
    gray
}

/// Rotate 180 degrees for printers mounted upside down.
pub fn rotate_180(image: &GrayImage) -> GrayImage {
    image::imageops::rotate180(image)
}
