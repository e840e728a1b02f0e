use std::path::PathBuf;

use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    #[error("failed to allocate a {width}x{height} capture buffer")]
    Allocate { width: u32, height: u32 },
    #[error("failed to connect to the display server: {0}")]
    Connect(String),
    #[error("failed to attach capture resource: {0}")]
    Attach(String),
    #[error("failed to grab desktop pixels: {0}")]
    Grab(String),
    #[error("failed to load desktop image at {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

/// The display collaborator a [`FrameSource`] copies desktop pixels from.
pub trait DisplayServer {
    /// Current virtual-screen dimensions in pixels.
    fn screen_size(&self) -> (u32, u32);

    /// Prepares the capture resource for a buffer of the given size.
    fn attach(&mut self, width: u32, height: u32) -> Result<(), CaptureError>;

    /// Tears down whatever `attach` set up. Called before every re-attach.
    fn release(&mut self);

    /// Copies the whole virtual desktop into `pixels` (row-major, `width * height`).
    fn grab(&mut self, pixels: &mut [u32], width: u32, height: u32) -> Result<(), CaptureError>;
}

impl<D: DisplayServer + ?Sized> DisplayServer for Box<D> {
    fn screen_size(&self) -> (u32, u32) {
        (**self).screen_size()
    }

    fn attach(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        (**self).attach(width, height)
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn grab(&mut self, pixels: &mut [u32], width: u32, height: u32) -> Result<(), CaptureError> {
        (**self).grab(pixels, width, height)
    }
}

/// Capture-sized pixel buffer handed from capture through blending to upload.
#[derive(Debug, Clone, Default)]
pub struct Framebuffer {
    pixels: Vec<u32>,
    width: u32,
    height: u32,
    generation: u64,
}

impl Framebuffer {
    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Bumped every time the buffer is reallocated; GPU textures key off it.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn pixels(&self) -> &[u32] {
        &self.pixels
    }

    pub fn pixels_mut(&mut self) -> &mut [u32] {
        &mut self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        self.pixels
            .get(y as usize * self.width as usize + x as usize)
            .copied()
    }

    pub fn fill(&mut self, value: u32) {
        self.pixels.fill(value);
    }

    /// Builds a buffer of the given size filled with `value`.
    pub fn filled(width: u32, height: u32, value: u32) -> Result<Self, CaptureError> {
        let mut framebuffer = Self::default();
        framebuffer.reallocate(width, height)?;
        framebuffer.fill(value);
        Ok(framebuffer)
    }

    fn reallocate(&mut self, width: u32, height: u32) -> Result<(), CaptureError> {
        let len = (width as usize)
            .checked_mul(height as usize)
            .filter(|&len| len > 0)
            .ok_or(CaptureError::Allocate { width, height })?;

        let mut pixels = Vec::new();
        pixels
            .try_reserve_exact(len)
            .map_err(|_| CaptureError::Allocate { width, height })?;
        pixels.resize(len, 0);

        self.pixels = pixels;
        self.width = width;
        self.height = height;
        self.generation = self.generation.wrapping_add(1);
        Ok(())
    }
}

/// Keeps a [`Framebuffer`] sized to the virtual screen and refills it each tick.
pub struct FrameSource<D: DisplayServer> {
    display: D,
    framebuffer: Framebuffer,
    attached: bool,
}

impl<D: DisplayServer> FrameSource<D> {
    pub fn new(display: D) -> Self {
        Self {
            display,
            framebuffer: Framebuffer::default(),
            attached: false,
        }
    }

    pub fn display(&self) -> &D {
        &self.display
    }

    pub fn display_mut(&mut self) -> &mut D {
        &mut self.display
    }

    pub fn framebuffer(&self) -> &Framebuffer {
        &self.framebuffer
    }

    /// Copies the current desktop into the framebuffer, reallocating first when
    /// the screen size changed. Errors here are fatal for the caller.
    pub fn capture(&mut self) -> Result<&mut Framebuffer, CaptureError> {
        let (width, height) = self.display.screen_size();
        if !self.attached || self.framebuffer.size() != (width, height) {
            if self.attached {
                self.display.release();
                self.attached = false;
            }
            self.framebuffer.reallocate(width, height)?;
            self.display.attach(width, height)?;
            self.attached = true;
            debug!(
                width,
                height,
                generation = self.framebuffer.generation(),
                "allocated capture framebuffer"
            );
        }

        self.display
            .grab(&mut self.framebuffer.pixels, width, height)?;
        Ok(&mut self.framebuffer)
    }
}

impl<D: DisplayServer> Drop for FrameSource<D> {
    fn drop(&mut self) {
        if self.attached {
            self.display.release();
        }
    }
}
