use bitvec::{BitArr, array::BitArray};

pub const DISPLAY_WIDTH: usize = 64;
pub const DISPLAY_HEIGHT: usize = 32;

/// Built-in glyphs for the hex digits 0-F, five rows each.
pub const FONT_SET: [u8; 80] = [
    0xF0, 0x90, 0x90, 0x90, 0xF0, // 0
    0x20, 0x60, 0x20, 0x20, 0x70, // 1
    0xF0, 0x10, 0xF0, 0x80, 0xF0, // 2
    0xF0, 0x10, 0xF0, 0x10, 0xF0, // 3
    0x90, 0x90, 0xF0, 0x10, 0x10, // 4
    0xF0, 0x80, 0xF0, 0x10, 0xF0, // 5
    0xF0, 0x80, 0xF0, 0x90, 0xF0, // 6
    0xF0, 0x10, 0x20, 0x40, 0x40, // 7
    0xF0, 0x90, 0xF0, 0x90, 0xF0, // 8
    0xF0, 0x90, 0xF0, 0x10, 0xF0, // 9
    0xF0, 0x90, 0xF0, 0x90, 0x90, // A
    0xE0, 0x90, 0xE0, 0x90, 0xE0, // B
    0xF0, 0x80, 0x80, 0x80, 0xF0, // C
    0xE0, 0x90, 0x90, 0x90, 0xE0, // D
    0xF0, 0x80, 0xF0, 0x80, 0xF0, // E
    0xF0, 0x80, 0xF0, 0x80, 0x80, // F
];

/// The 64x32 monochrome screen.
///
/// Pixels are only ever changed by [`Framebuffer::clear`] and by XOR-ing
/// sprites in with [`Framebuffer::draw`]. Coordinates wrap on both axes.
pub struct Framebuffer {
    pixels: BitArr!(for DISPLAY_WIDTH * DISPLAY_HEIGHT),
    dirty: bool,
}

impl Framebuffer {
    pub fn new() -> Self {
        Framebuffer {
            pixels: BitArray::ZERO,
            dirty: true,
        }
    }

    pub fn clear(&mut self) {
        self.pixels.fill(false);
        self.dirty = true;
    }

    /// XORs `sprite` onto the screen with its top-left corner at `(x, y)`.
    ///
    /// Each byte is one row, most significant bit leftmost. Returns true if
    /// any lit pixel was turned off by this call.
    pub fn draw(&mut self, sprite: &[u8], x: usize, y: usize) -> bool {
        let mut collision = false;

        for (row, &byte) in sprite.iter().enumerate() {
            let pixel_y = (y + row) % DISPLAY_HEIGHT;
            for bit in 0..8 {
                if (byte >> (7 - bit)) & 1 == 0 {
                    continue;
                }
                let pixel_x = (x + bit) % DISPLAY_WIDTH;
                let index = pixel_y * DISPLAY_WIDTH + pixel_x;

                let was_lit = self.pixels[index];
                collision |= was_lit;
                self.pixels.set(index, !was_lit);
            }
        }

        if !sprite.is_empty() {
            self.dirty = true;
        }
        collision
    }

    pub fn pixel(&self, x: usize, y: usize) -> bool {
        self.pixels[(y % DISPLAY_HEIGHT) * DISPLAY_WIDTH + (x % DISPLAY_WIDTH)]
    }

    /// Iterates over the screen one row of pixels at a time, top to bottom.
    pub fn rows(&self) -> impl Iterator<Item = &bitvec::slice::BitSlice<usize>> {
        self.pixels[..DISPLAY_WIDTH * DISPLAY_HEIGHT].chunks(DISPLAY_WIDTH)
    }

    pub fn lit_count(&self) -> usize {
        self.pixels[..DISPLAY_WIDTH * DISPLAY_HEIGHT].count_ones()
    }

    /// Returns whether the screen changed since the last call and resets the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }
}

impl Default for Framebuffer {
    fn default() -> Self {
        Self::new()
    }
}
