//! Desktop pixel acquisition for the virtual desktop.
//!
//! The crate owns the CPU side of every frame:
//! - `framebuffer` holds the capture-sized pixel buffer and the [`FrameSource`]
//!   that keeps it in step with the virtual screen size.
//! - `cursor` overlays the pointer image onto a captured buffer.
//! - `monitors` turns enumerated physical outputs into the dense
//!   [`MonitorRegistry`] the compositor lays out.
//! - `x11` grabs the real desktop and pointer; `synthetic` and `still` are
//!   stand-in [`DisplayServer`] backends for desk testing.
//!
//! Pixels are packed `0xAARRGGBB` in a `u32`, which on little-endian hosts is
//! BGRA byte order and uploads as-is into a `Bgra8Unorm` texture.

mod cursor;
mod framebuffer;
mod monitors;
mod still;
mod synthetic;
mod x11;

pub use cursor::{blend_cursor, CursorImage, PointerSource, SyntheticPointer};
pub use framebuffer::{CaptureError, DisplayServer, FrameSource, Framebuffer};
pub use monitors::{virtual_screen_size, MonitorDescriptor, MonitorRegistry, PhysicalOutput};
pub use still::ImageDisplay;
pub use synthetic::SyntheticDisplay;
pub use x11::{X11Display, X11Pointer};

/// Packs 8-bit channels into the `0xAARRGGBB` layout used by [`Framebuffer`].
#[inline]
pub fn pack_argb(a: u8, r: u8, g: u8, b: u8) -> u32 {
    (u32::from(a) << 24) | (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Splits a packed pixel into `(a, r, g, b)`.
#[inline]
pub fn unpack_argb(pixel: u32) -> (u8, u8, u8, u8) {
    (
        (pixel >> 24) as u8,
        (pixel >> 16) as u8,
        (pixel >> 8) as u8,
        pixel as u8,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pack_and_unpack_agree() {
        let pixel = pack_argb(0x80, 0x11, 0x22, 0x33);
        assert_eq!(pixel, 0x8011_2233);
        assert_eq!(unpack_argb(pixel), (0x80, 0x11, 0x22, 0x33));
    }
}
