//! Native X11 capture: the root window through core `GetImage`, the pointer
//! through XFixes. Both share one connection.

use std::rc::Rc;

use tracing::{debug, info, warn};
use x11rb::connection::Connection;
use x11rb::errors::ReplyError;
use x11rb::protocol::xfixes::ConnectionExt as _;
use x11rb::protocol::xproto::{ConnectionExt as _, ImageFormat, ImageOrder, Screen, Window};
use x11rb::rust_connection::RustConnection;

use crate::cursor::{CursorImage, PointerSource};
use crate::framebuffer::{CaptureError, DisplayServer};

const OPAQUE: u32 = 0xff00_0000;
const ALL_PLANES: u32 = !0;
const XRGB_MASKS: (u32, u32, u32) = (0x00ff_0000, 0x0000_ff00, 0x0000_00ff);

/// Grabs the whole root window of an X screen.
pub struct X11Display {
    conn: Rc<RustConnection>,
    root: Window,
    byte_order: ImageOrder,
    fallback_size: (u32, u32),
    attached: Option<(u16, u16)>,
}

impl X11Display {
    /// Connects to `display_name`, or to `$DISPLAY` when `None`.
    pub fn connect(display_name: Option<&str>) -> Result<Self, CaptureError> {
        let (conn, screen_num) =
            x11rb::connect(display_name).map_err(|err| CaptureError::Connect(err.to_string()))?;
        let setup = conn.setup();
        let screen = setup
            .roots
            .get(screen_num)
            .ok_or_else(|| CaptureError::Connect(format!("X server has no screen {screen_num}")))?;

        let bits_per_pixel = setup
            .pixmap_formats
            .iter()
            .find(|format| format.depth == screen.root_depth)
            .map(|format| format.bits_per_pixel);
        check_pixel_layout(screen.root_depth, bits_per_pixel, root_visual_masks(screen))?;

        let root = screen.root;
        let fallback_size = (
            u32::from(screen.width_in_pixels),
            u32::from(screen.height_in_pixels),
        );
        let byte_order = setup.image_byte_order;
        info!(
            screen = screen_num,
            width = fallback_size.0,
            height = fallback_size.1,
            "connected to X server"
        );
        Ok(Self {
            conn: Rc::new(conn),
            root,
            byte_order,
            fallback_size,
            attached: None,
        })
    }

    /// Pointer source on the same connection, or `None` when XFixes is missing.
    pub fn pointer(&self) -> Option<X11Pointer> {
        match query_xfixes(&self.conn) {
            Ok((major, minor)) => {
                debug!(major, minor, "XFixes available");
                Some(X11Pointer {
                    conn: Rc::clone(&self.conn),
                })
            }
            Err(err) => {
                warn!(error = %err, "XFixes unavailable; the pointer will not be drawn");
                None
            }
        }
    }
}

impl DisplayServer for X11Display {
    fn screen_size(&self) -> (u32, u32) {
        match root_geometry(&self.conn, self.root) {
            Ok(size) => size,
            Err(err) => {
                warn!(error = %err, "root geometry query failed; keeping the connect-time size");
                self.fallback_size
            }
        }
    }

    fn attach(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        let extent = u16::try_from(width)
            .ok()
            .zip(u16::try_from(height).ok())
            .filter(|&(w, h)| w > 0 && h > 0)
            .ok_or_else(|| {
                CaptureError::Attach(format!("{width}x{height} is not a grabbable X11 area"))
            })?;
        self.attached = Some(extent);
        Ok(())
    }

    fn release(&mut self) {
        self.attached = None;
    }

    fn grab(&mut self, pixels: &mut [u32], width: u32, height: u32) -> Result<(), CaptureError> {
        let (w, h) = self
            .attached
            .ok_or_else(|| CaptureError::Grab("grab before attach".into()))?;
        if (u32::from(w), u32::from(h)) != (width, height) {
            return Err(CaptureError::Grab(format!(
                "attached for {w}x{h}, asked for {width}x{height}"
            )));
        }
        let data = root_image(&self.conn, self.root, w, h)
            .map_err(|err| CaptureError::Grab(err.to_string()))?;
        copy_zpixmap(&data, self.byte_order, pixels)
    }
}

/// The pointer image as XFixes reports it.
pub struct X11Pointer {
    conn: Rc<RustConnection>,
}

impl PointerSource for X11Pointer {
    fn cursor(&mut self) -> Option<CursorImage> {
        let reply = match self.conn.xfixes_get_cursor_image() {
            Ok(cookie) => cookie.reply(),
            Err(err) => Err(err.into()),
        };
        match reply {
            Ok(reply) => cursor_image(
                (reply.x, reply.y),
                (reply.width, reply.height),
                (reply.xhot, reply.yhot),
                reply.cursor_image,
            ),
            Err(err) => {
                warn!(error = %err, "cursor image query failed");
                None
            }
        }
    }
}

fn query_xfixes(conn: &RustConnection) -> Result<(u32, u32), ReplyError> {
    let reply = conn.xfixes_query_version(4, 0)?.reply()?;
    Ok((reply.major_version, reply.minor_version))
}

fn root_geometry(conn: &RustConnection, root: Window) -> Result<(u32, u32), ReplyError> {
    let reply = conn.get_geometry(root)?.reply()?;
    Ok((u32::from(reply.width), u32::from(reply.height)))
}

fn root_image(
    conn: &RustConnection,
    root: Window,
    width: u16,
    height: u16,
) -> Result<Vec<u8>, ReplyError> {
    let reply = conn
        .get_image(ImageFormat::Z_PIXMAP, root, 0, 0, width, height, ALL_PLANES)?
        .reply()?;
    Ok(reply.data)
}

fn root_visual_masks(screen: &Screen) -> Option<(u32, u32, u32)> {
    screen
        .allowed_depths
        .iter()
        .flat_map(|depth| depth.visuals.iter())
        .find(|visual| visual.visual_id == screen.root_visual)
        .map(|visual| (visual.red_mask, visual.green_mask, visual.blue_mask))
}

/// Only 24- or 32-bit TrueColor roots stored as 32-bit `xRGB` pixels are grabbed.
fn check_pixel_layout(
    depth: u8,
    bits_per_pixel: Option<u8>,
    masks: Option<(u32, u32, u32)>,
) -> Result<(), CaptureError> {
    if !matches!(depth, 24 | 32) || bits_per_pixel != Some(32) {
        return Err(CaptureError::Connect(format!(
            "root depth {depth} with {bits_per_pixel:?} bits per pixel is not supported"
        )));
    }
    if masks != Some(XRGB_MASKS) {
        return Err(CaptureError::Connect(format!(
            "root visual masks {masks:x?} are not xRGB"
        )));
    }
    Ok(())
}

/// Converts a 32-bit `ZPixmap` into opaque packed pixels.
fn copy_zpixmap(data: &[u8], order: ImageOrder, pixels: &mut [u32]) -> Result<(), CaptureError> {
    let needed = pixels.len() * 4;
    if data.len() < needed {
        return Err(CaptureError::Grab(format!(
            "X server returned {} bytes, expected {needed}",
            data.len()
        )));
    }
    for (pixel, chunk) in pixels.iter_mut().zip(data.chunks_exact(4)) {
        let bytes = [chunk[0], chunk[1], chunk[2], chunk[3]];
        let value = if order == ImageOrder::MSB_FIRST {
            u32::from_be_bytes(bytes)
        } else {
            u32::from_le_bytes(bytes)
        };
        *pixel = value | OPAQUE;
    }
    Ok(())
}

/// XFixes reports cursor pixels as `0xAARRGGBB` words.
fn cursor_image(
    (x, y): (i16, i16),
    (width, height): (u16, u16),
    (xhot, yhot): (u16, u16),
    pixels: Vec<u32>,
) -> Option<CursorImage> {
    if width == 0 || height == 0 || pixels.len() != usize::from(width) * usize::from(height) {
        return None;
    }
    Some(CursorImage {
        width: u32::from(width),
        height: u32::from(height),
        xhot: i32::from(xhot),
        yhot: i32::from(yhot),
        x: i32::from(x),
        y: i32::from(y),
        pixels,
    })
}
