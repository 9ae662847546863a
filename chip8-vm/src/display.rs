//! Display buffer and sprite drawing.
use std::fmt::{self, Write};

use crate::constants::*;

/// Monochrome 64x32 display with one byte per cell.
///
/// A cell is either 0 (off) or 1 (on).
#[derive(Clone, PartialEq, Eq)]
pub struct Framebuffer(Box<DisplayBuffer>);

impl Default for Framebuffer {
    fn default() -> Self {
        Self(Box::new([0; DISPLAY_BUFFER_SIZE]))
    }
}

impl Framebuffer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Turn all cells off.
    pub fn clear(&mut self) {
        self.0.fill(0);
    }

    pub fn cells(&self) -> &DisplayBuffer {
        &self.0
    }

    /// Cell value at the given coordinate, wrapped to the display size.
    pub fn get(&self, x: usize, y: usize) -> u8 {
        self.0[index(x, y)]
    }

    /// Number of cells that are on.
    pub fn lit(&self) -> usize {
        self.0.iter().filter(|cell| **cell != 0).count()
    }

    /// XOR a sprite onto the display.
    ///
    /// Each row is 8 bits representing 8 pixels, most significant bit on the left.
    /// Pixels that fall outside of the display area are wrapped around to the other side.
    ///
    /// Returns `true` when any cell was turned from on to off, which is used for
    /// collision detection.
    pub fn draw_sprite(&mut self, x: usize, y: usize, rows: impl IntoIterator<Item = u8>) -> bool {
        let mut is_erased = false;

        for (r, row) in rows.into_iter().enumerate() {
            for c in 0..8 {
                if (row >> (7 - c)) & 1 == 0 {
                    continue;
                }

                let d = index(x + c, y + r);

                // XOR erases a pixel when both the old and new values are both 1.
                is_erased |= self.0[d] == 1;
                self.0[d] ^= 1;
            }
        }

        is_erased
    }

    /// Render the display as text, `#` for on and `.` for off.
    pub fn dump(&self) -> Result<String, fmt::Error> {
        let mut buf = String::with_capacity((DISPLAY_WIDTH + 1) * DISPLAY_HEIGHT);

        for row in self.0.chunks(DISPLAY_WIDTH) {
            for cell in row {
                buf.write_char(if *cell != 0 { '#' } else { '.' })?;
            }
            writeln!(buf)?;
        }

        Ok(buf)
    }
}

#[inline(always)]
fn index(x: usize, y: usize) -> usize {
    (x % DISPLAY_WIDTH) + (y % DISPLAY_HEIGHT) * DISPLAY_WIDTH
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_draw_and_erase() {
        let mut fb = Framebuffer::new();

        assert!(!fb.draw_sprite(0, 0, [0xFF, 0xFF]));
        assert_eq!(fb.lit(), 16);
        assert_eq!(fb.get(7, 1), 1);
        assert_eq!(fb.get(8, 1), 0);

        assert!(fb.draw_sprite(0, 0, [0xFF, 0xFF]));
        assert_eq!(fb.lit(), 0);
    }

    #[test]
    fn test_clear() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(10, 10, [0xFF; 4]);
        assert_eq!(fb.lit(), 32);

        fb.clear();
        assert_eq!(fb.lit(), 0);
        assert!(fb.cells().iter().all(|cell| *cell == 0));
        assert!(fb == Framebuffer::new());
    }

    #[test]
    fn test_zero_bits_do_not_erase() {
        let mut fb = Framebuffer::new();

        // ____####
        assert!(!fb.draw_sprite(4, 0, [0b1111_0000]));
        // ########
        assert!(!fb.draw_sprite(0, 0, [0b1111_0000]));

        assert_eq!(fb.lit(), 8);
    }

    #[test]
    fn test_wraps_around_edges() {
        let mut fb = Framebuffer::new();

        fb.draw_sprite(60, 31, [0xFF, 0x80]);

        // First row straddles the right edge.
        assert_eq!(fb.get(60, 31), 1);
        assert_eq!(fb.get(63, 31), 1);
        assert_eq!(fb.get(0, 31), 1);
        assert_eq!(fb.get(3, 31), 1);
        assert_eq!(fb.get(4, 31), 0);
        // Second row wraps to the top.
        assert_eq!(fb.get(60, 0), 1);
        assert_eq!(fb.lit(), 9);

        // Start coordinates past the edge wrap as well.
        let mut other = Framebuffer::new();
        other.draw_sprite(60 + 64, 31 + 32, [0xFF, 0x80]);
        assert!(fb == other);
    }

    #[test]
    fn test_dump() {
        let mut fb = Framebuffer::new();
        fb.draw_sprite(0, 0, [0b1010_0000]);
        let text = fb.dump().unwrap();
        let first = text.lines().next().unwrap();
        assert!(first.starts_with("#.#."));
        assert_eq!(first.len(), DISPLAY_WIDTH);
        assert_eq!(text.lines().count(), DISPLAY_HEIGHT);
    }
}
