//! Monochrome framebuffer.
use std::fmt::{self, Write};

use crate::constants::*;

/// Screen buffer that is drawn to.
///
/// Pixels are stored row major, with the origin in the top left corner.
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer {
    pixels: Box<[bool; DISPLAY_BUFFER_SIZE]>,
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self {
            pixels: Box::new([false; DISPLAY_BUFFER_SIZE]),
        }
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Turn all pixels off.
    pub fn clear(&mut self) {
        self.pixels.fill(false);
    }

    /// State of the pixel at the given coordinate, wrapped to the screen size.
    #[inline]
    pub fn get(&self, x: usize, y: usize) -> bool {
        self.pixels[Self::index(x, y)]
    }

    /// Toggle the pixel at the given coordinate, wrapping around the edges.
    ///
    /// Returns `true` when the pixel was erased.
    #[inline]
    pub fn toggle(&mut self, x: usize, y: usize) -> bool {
        let px = &mut self.pixels[Self::index(x, y)];
        let erased = *px;
        *px = !*px;
        erased
    }

    /// XOR a sprite onto the buffer.
    ///
    /// Each byte is one row of 8 pixels, most significant bit first.
    /// Returns `true` if any pixel was turned off, which is used
    /// by programs for collision detection.
    pub fn blit(&mut self, x: usize, y: usize, sprite: &[u8]) -> bool {
        let mut is_erased = false;

        for (r, row) in sprite.iter().enumerate() {
            for c in 0..8 {
                if (row >> (7 - c)) & 1 == 1 {
                    is_erased |= self.toggle(x + c, y + r);
                }
            }
        }

        is_erased
    }

    #[inline(always)]
    fn index(x: usize, y: usize) -> usize {
        (x % DISPLAY_WIDTH) + (y % DISPLAY_HEIGHT) * DISPLAY_WIDTH
    }

    pub fn pixels(&self) -> &[bool; DISPLAY_BUFFER_SIZE] {
        &self.pixels
    }

    /// Iterate the rows of the buffer, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &[bool]> {
        self.pixels.chunks(DISPLAY_WIDTH)
    }

    /// Number of pixels that are turned on.
    pub fn count_lit(&self) -> usize {
        self.pixels.iter().filter(|px| **px).count()
    }

    /// Render the buffer as text, `#` for lit pixels and `.` for dark.
    pub fn dump(&self) -> Result<String, fmt::Error> {
        let mut buf = String::with_capacity((DISPLAY_WIDTH + 1) * DISPLAY_HEIGHT);

        for row in self.rows() {
            for px in row {
                buf.write_char(if *px { '#' } else { '.' })?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

impl fmt::Debug for Framebuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Framebuffer")
            .field("lit", &self.count_lit())
            .finish()
    }
}
