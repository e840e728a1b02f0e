use tracing::debug;

use crate::framebuffer::{CaptureError, DisplayServer};
use crate::monitors::{virtual_screen_size, PhysicalOutput};
use crate::pack_argb;

const BACKGROUND: u32 = 0xff10_1010;
const GRID_SPACING: u32 = 64;

// Base tint per output, cycled when there are more outputs than entries.
const PALETTE: [(u8, u8, u8); 6] = [
    (0x2e, 0x5c, 0x8a),
    (0x8a, 0x3b, 0x2e),
    (0x3b, 0x7a, 0x3b),
    (0x7a, 0x6a, 0x2e),
    (0x5c, 0x3b, 0x7a),
    (0x2e, 0x7a, 0x7a),
];

/// Paints an animated test pattern per output instead of grabbing real pixels.
pub struct SyntheticDisplay {
    outputs: Vec<PhysicalOutput>,
    size: (u32, u32),
    frame: u64,
    attached: bool,
}

impl SyntheticDisplay {
    pub fn new(outputs: Vec<PhysicalOutput>) -> Self {
        let size = virtual_screen_size(&outputs);
        Self {
            outputs,
            size,
            frame: 0,
            attached: false,
        }
    }

    /// Simulates a desktop resolution change.
    pub fn set_screen_size(&mut self, width: u32, height: u32) {
        debug!(width, height, "synthetic display resized");
        self.size = (width, height);
    }

    pub fn outputs(&self) -> &[PhysicalOutput] {
        &self.outputs
    }

    fn paint_output(&self, pixels: &mut [u32], width: u32, height: u32, slot: usize) {
        let output = &self.outputs[slot];
        let (r, g, b) = PALETTE[slot % PALETTE.len()];
        let x0 = output.x.max(0) as u32;
        let y0 = output.y.max(0) as u32;
        let x1 = (i64::from(output.x) + i64::from(output.width)).clamp(0, i64::from(width)) as u32;
        let y1 =
            (i64::from(output.y) + i64::from(output.height)).clamp(0, i64::from(height)) as u32;
        if x0 >= x1 || y0 >= y1 {
            return;
        }

        let span = x1 - x0;
        let sweep = x0 + (self.frame % u64::from(span)) as u32;
        let fill = pack_argb(0xff, r, g, b);
        let grid = pack_argb(0xff, r / 2, g / 2, b / 2);
        let bar = pack_argb(0xff, 0xf0, 0xf0, 0xf0);

        for y in y0..y1 {
            let row = y as usize * width as usize;
            for x in x0..x1 {
                let local_x = x - x0;
                let local_y = y - y0;
                let value = if x.abs_diff(sweep) < 4 {
                    bar
                } else if local_x % GRID_SPACING == 0 || local_y % GRID_SPACING == 0 {
                    grid
                } else {
                    fill
                };
                pixels[row + x as usize] = value;
            }
        }
    }
}

impl DisplayServer for SyntheticDisplay {
    fn screen_size(&self) -> (u32, u32) {
        self.size
    }

    fn attach(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        if width == 0 || height == 0 {
            return Err(CaptureError::Attach(format!(
                "synthetic display cannot attach a {width}x{height} buffer"
            )));
        }
        self.attached = true;
        Ok(())
    }

    fn release(&mut self) {
        self.attached = false;
    }

    fn grab(&mut self, pixels: &mut [u32], width: u32, height: u32) -> Result<(), CaptureError> {
        if !self.attached {
            return Err(CaptureError::Grab("synthetic display is not attached".into()));
        }
        if pixels.len() != width as usize * height as usize {
            return Err(CaptureError::Grab(format!(
                "buffer holds {} pixels, expected {width}x{height}",
                pixels.len()
            )));
        }

        pixels.fill(BACKGROUND);
        for slot in 0..self.outputs.len() {
            self.paint_output(pixels, width, height, slot);
        }
        self.frame = self.frame.wrapping_add(1);
        Ok(())
    }
}
