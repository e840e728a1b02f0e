use crate::framebuffer::Framebuffer;
use crate::pack_argb;

/// Pointer bitmap plus where the display server says it currently is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorImage {
    pub width: u32,
    pub height: u32,
    /// Hotspot offset inside the bitmap.
    pub xhot: i32,
    pub yhot: i32,
    /// Screen position of the hotspot.
    pub x: i32,
    pub y: i32,
    /// Row-major `0xAARRGGBB`, `width * height` entries.
    pub pixels: Vec<u32>,
}

impl CursorImage {
    fn pixel(&self, col: u32, row: u32) -> Option<u32> {
        self.pixels
            .get(row as usize * self.width as usize + col as usize)
            .copied()
    }
}

/// Supplies the current pointer image, or `None` when no pointer is visible.
pub trait PointerSource {
    fn cursor(&mut self) -> Option<CursorImage>;
}

/// Overlays `cursor` onto `framebuffer` with a straight "over" blend.
///
/// Transparent and out-of-bounds pixels are skipped. Written pixels are fully
/// opaque. Returns how many framebuffer pixels were touched.
pub fn blend_cursor(framebuffer: &mut Framebuffer, cursor: &CursorImage) -> usize {
    let (fb_width, fb_height) = framebuffer.size();
    let origin_x = i64::from(cursor.x) - i64::from(cursor.xhot);
    let origin_y = i64::from(cursor.y) - i64::from(cursor.yhot);
    let pixels = framebuffer.pixels_mut();
    let mut written = 0;

    for row in 0..cursor.height {
        let dest_y = origin_y + i64::from(row);
        if dest_y < 0 || dest_y >= i64::from(fb_height) {
            continue;
        }
        for col in 0..cursor.width {
            let dest_x = origin_x + i64::from(col);
            if dest_x < 0 || dest_x >= i64::from(fb_width) {
                continue;
            }
            let Some(src) = cursor.pixel(col, row) else {
                continue;
            };
            let alpha = (src >> 24) as u8;
            if alpha == 0 {
                continue;
            }

            let index = dest_y as usize * fb_width as usize + dest_x as usize;
            if let Some(dst) = pixels.get_mut(index) {
                *dst = over(src, *dst, alpha);
                written += 1;
            }
        }
    }

    written
}

fn over(src: u32, dst: u32, alpha: u8) -> u32 {
    let a = f32::from(alpha) / 255.0;
    let channel = |shift: u32| {
        let s = f32::from((src >> shift) as u8);
        let d = f32::from((dst >> shift) as u8);
        (s * a + d * (1.0 - a)) as u8
    };
    pack_argb(0xff, channel(16), channel(8), channel(0))
}

const ARROW_WIDTH: u32 = 11;
const ARROW_HEIGHT: u32 = 17;
const ARROW_OUTLINE: u32 = 0xff00_0000;
const ARROW_FILL: u32 = 0xffff_ffff;

/// Built-in arrow that sweeps a figure-eight across the virtual screen.
pub struct SyntheticPointer {
    bounds: (u32, u32),
    phase: f32,
    step: f32,
    bitmap: Vec<u32>,
}

impl SyntheticPointer {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            bounds: (width, height),
            phase: 0.0,
            step: 0.01,
            bitmap: arrow_bitmap(),
        }
    }

    pub fn set_bounds(&mut self, width: u32, height: u32) {
        self.bounds = (width, height);
    }

    fn position(&self) -> (i32, i32) {
        let (width, height) = (self.bounds.0 as f32, self.bounds.1 as f32);
        let x = width * 0.5 + width * 0.4 * self.phase.sin();
        let y = height * 0.5 + height * 0.3 * (2.0 * self.phase).sin();
        (x as i32, y as i32)
    }
}

impl PointerSource for SyntheticPointer {
    fn cursor(&mut self) -> Option<CursorImage> {
        if self.bounds.0 == 0 || self.bounds.1 == 0 {
            return None;
        }
        self.phase = (self.phase + self.step) % std::f32::consts::TAU;
        let (x, y) = self.position();
        Some(CursorImage {
            width: ARROW_WIDTH,
            height: ARROW_HEIGHT,
            xhot: 0,
            yhot: 0,
            x,
            y,
            pixels: self.bitmap.clone(),
        })
    }
}

fn arrow_bitmap() -> Vec<u32> {
    let mut pixels = vec![0u32; (ARROW_WIDTH * ARROW_HEIGHT) as usize];
    for y in 0..ARROW_HEIGHT {
        for x in 0..ARROW_WIDTH {
            let value = if y <= 12 {
                // head: right edge runs at a 2:3 slope down to the base row
                let edge = y * 2 / 3;
                if x > edge {
                    0
                } else if x == 0 || x == edge || y == 12 {
                    ARROW_OUTLINE
                } else {
                    ARROW_FILL
                }
            } else if (3..=5).contains(&x) {
                if x == 4 && y < ARROW_HEIGHT - 1 {
                    ARROW_FILL
                } else {
                    ARROW_OUTLINE
                }
            } else {
                0
            };
            pixels[(y * ARROW_WIDTH + x) as usize] = value;
        }
    }
    pixels
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor_at(x: i32, y: i32, width: u32, height: u32, color: u32) -> CursorImage {
        CursorImage {
            width,
            height,
            xhot: 0,
            yhot: 0,
            x,
            y,
            pixels: vec![color; (width * height) as usize],
        }
    }

    #[test]
    fn transparent_pixels_leave_destination_untouched() {
        let mut framebuffer = Framebuffer::filled(4, 4, 0xff12_3456).unwrap();
        let written = blend_cursor(&mut framebuffer, &cursor_at(1, 1, 2, 2, 0x00ff_ffff));
        assert_eq!(written, 0);
        assert!(framebuffer.pixels().iter().all(|&p| p == 0xff12_3456));
    }

    #[test]
    fn opaque_pixels_copy_source_exactly() {
        let mut framebuffer = Framebuffer::filled(4, 4, 0x8001_0203).unwrap();
        let written = blend_cursor(&mut framebuffer, &cursor_at(1, 1, 2, 2, 0xffab_cdef));
        assert_eq!(written, 4);
        assert_eq!(framebuffer.pixel(1, 1), Some(0xffab_cdef));
        assert_eq!(framebuffer.pixel(2, 2), Some(0xffab_cdef));
        assert_eq!(framebuffer.pixel(0, 0), Some(0x8001_0203));
        assert_eq!(framebuffer.pixel(3, 3), Some(0x8001_0203));
    }

    #[test]
    fn half_alpha_mixes_and_forces_opaque() {
        let mut framebuffer = Framebuffer::filled(1, 1, 0x0000_0000).unwrap();
        blend_cursor(&mut framebuffer, &cursor_at(0, 0, 1, 1, 0x80ff_ffff));
        let (a, r, g, b) = crate::unpack_argb(framebuffer.pixel(0, 0).unwrap());
        assert_eq!(a, 0xff);
        assert_eq!((r, g, b), (128, 128, 128));
    }

    #[test]
    fn hotspot_shifts_destination() {
        let mut framebuffer = Framebuffer::filled(4, 4, 0).unwrap();
        let mut cursor = cursor_at(2, 2, 1, 1, 0xff00_ff00);
        cursor.xhot = 1;
        cursor.yhot = 2;
        blend_cursor(&mut framebuffer, &cursor);
        assert_eq!(framebuffer.pixel(1, 0), Some(0xff00_ff00));
    }

    #[test]
    fn never_writes_outside_bounds() {
        let positions = [
            (-10, -10),
            (-2, 1),
            (3, 3),
            (2, -3),
            (100, 100),
            (i32::MIN, i32::MAX),
            (i32::MAX, 0),
        ];
        for (x, y) in positions {
            let mut framebuffer = Framebuffer::filled(4, 4, 0).unwrap();
            let cursor = cursor_at(x, y, 3, 3, 0xffff_ffff);
            let written = blend_cursor(&mut framebuffer, &cursor);

            let expected = framebuffer
                .pixels()
                .iter()
                .filter(|&&p| p == 0xffff_ffff)
                .count();
            assert_eq!(written, expected, "position ({x}, {y})");
            assert_eq!(framebuffer.pixels().len(), 16);
            for py in 0..4i64 {
                for px in 0..4i64 {
                    let inside = px >= i64::from(x)
                        && px < i64::from(x) + 3
                        && py >= i64::from(y)
                        && py < i64::from(y) + 3;
                    let value = framebuffer.pixel(px as u32, py as u32).unwrap();
                    assert_eq!(value == 0xffff_ffff, inside, "pixel ({px}, {py}) for ({x}, {y})");
                }
            }
        }
    }

    #[test]
    fn synthetic_pointer_stays_on_screen() {
        let mut pointer = SyntheticPointer::new(640, 480);
        for _ in 0..1000 {
            let cursor = pointer.cursor().unwrap();
            assert!((0..640).contains(&cursor.x));
            assert!((0..480).contains(&cursor.y));
            assert_eq!(cursor.pixels.len(), (cursor.width * cursor.height) as usize);
        }
    }

    #[test]
    fn synthetic_pointer_hides_without_bounds() {
        let mut pointer = SyntheticPointer::new(0, 0);
        assert!(pointer.cursor().is_none());
    }
}
