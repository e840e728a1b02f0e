use std::path::{Path, PathBuf};

use tracing::info;

use crate::framebuffer::{CaptureError, DisplayServer};
use crate::pack_argb;

/// Serves a decoded image file as the whole desktop.
pub struct ImageDisplay {
    path: PathBuf,
    pixels: Vec<u32>,
    width: u32,
    height: u32,
}

impl ImageDisplay {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CaptureError> {
        let path = path.as_ref().to_path_buf();
        let decoded = image::open(&path)
            .map_err(|source| CaptureError::Image {
                path: path.clone(),
                source,
            })?
            .to_rgba8();
        let (width, height) = decoded.dimensions();
        let pixels = decoded
            .pixels()
            .map(|p| pack_argb(p[3], p[0], p[1], p[2]))
            .collect();
        info!(path = %path.display(), width, height, "loaded desktop image");
        Ok(Self {
            path,
            pixels,
            width,
            height,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DisplayServer for ImageDisplay {
    fn screen_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn attach(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        if (width, height) != (self.width, self.height) {
            return Err(CaptureError::Attach(format!(
                "image is {}x{}, buffer requested {width}x{height}",
                self.width, self.height
            )));
        }
        Ok(())
    }

    fn release(&mut self) {}

    fn grab(&mut self, pixels: &mut [u32], _width: u32, _height: u32) -> Result<(), CaptureError> {
        if pixels.len() != self.pixels.len() {
            return Err(CaptureError::Grab(format!(
                "buffer holds {} pixels, image has {}",
                pixels.len(),
                self.pixels.len()
            )));
        }
        pixels.copy_from_slice(&self.pixels);
        Ok(())
    }
}
