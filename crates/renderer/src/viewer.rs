use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use capture::{Framebuffer, PhysicalOutput};
use tracing::{info, warn};
use winit::event::{ElementState, Event, WindowEvent};
use winit::event_loop::EventLoop;
use winit::keyboard::{Key, NamedKey};
use winit::platform::pump_events::{EventLoopExtPumpEvents, PumpStatus};
use winit::window::{Fullscreen, Window, WindowBuilder};

use crate::camera::CameraTransform;
use crate::gpu::GpuState;
use crate::layout::SceneLayout;
use crate::types::{RendererConfig, WindowMode};

/// Keys the viewer forwards to the frame loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerKey {
    Char(char),
    ArrowUp,
    ArrowDown,
    ArrowLeft,
    ArrowRight,
    PageUp,
    PageDown,
    Escape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerEvent {
    Key(ViewerKey),
    CloseRequested,
}

/// Connection to the window system, used to enumerate outputs before the
/// viewer window exists.
pub struct WindowSystem {
    event_loop: EventLoop<()>,
}

impl WindowSystem {
    pub fn connect() -> Result<Self> {
        let event_loop =
            EventLoop::new().map_err(|err| anyhow!("failed to connect to the display: {err}"))?;
        Ok(Self { event_loop })
    }

    /// Physical outputs in enumeration order.
    pub fn outputs(&self) -> Vec<PhysicalOutput> {
        self.event_loop
            .available_monitors()
            .map(|monitor| {
                let position = monitor.position();
                let size = monitor.size();
                PhysicalOutput {
                    name: monitor.name(),
                    x: position.x,
                    y: position.y,
                    width: size.width,
                    height: size.height,
                }
            })
            .collect()
    }

    pub fn open_viewer(self, config: &RendererConfig) -> Result<Viewer> {
        let mut builder = WindowBuilder::new()
            .with_title(config.title.clone())
            .with_inner_size(winit::dpi::PhysicalSize::new(
                config.surface_size.0,
                config.surface_size.1,
            ));
        if let WindowMode::Fullscreen { output } = config.window_mode {
            let monitor = output.and_then(|index| self.event_loop.available_monitors().nth(index));
            if output.is_some() && monitor.is_none() {
                warn!(?output, "fullscreen output not found; using the current output");
            }
            builder = builder.with_fullscreen(Some(Fullscreen::Borderless(monitor)));
        }

        let window = builder
            .build(&self.event_loop)
            .map_err(|err| anyhow!("failed to create viewer window: {err}"))?;
        let window = Arc::new(window);
        let gpu = GpuState::new(window.as_ref(), window.inner_size(), config.vsync)
            .map_err(|err| anyhow!("failed to initialise renderer: {err:#}"))?;
        info!(
            width = gpu.size().width,
            height = gpu.size().height,
            mode = ?config.window_mode,
            "viewer window ready"
        );

        Ok(Viewer {
            gpu,
            window,
            event_loop: self.event_loop,
        })
    }
}

/// The viewer window plus its GPU state. Field order keeps the surface dropped
/// before the window it renders into.
pub struct Viewer {
    gpu: GpuState,
    window: Arc<Window>,
    event_loop: EventLoop<()>,
}

impl Viewer {
    /// Drains pending window events without blocking.
    pub fn pump(&mut self) -> Vec<ViewerEvent> {
        let mut events = Vec::new();
        let window_id = self.window.id();
        let gpu = &mut self.gpu;

        let status = self
            .event_loop
            .pump_events(Some(Duration::ZERO), |event, _elwt| {
                let Event::WindowEvent { window_id: id, event } = event else {
                    return;
                };
                if id != window_id {
                    return;
                }
                match event {
                    WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                        events.push(ViewerEvent::CloseRequested);
                    }
                    WindowEvent::Resized(size) => gpu.resize(size),
                    WindowEvent::KeyboardInput { event, .. }
                        if event.state == ElementState::Pressed =>
                    {
                        if let Some(key) = viewer_key(&event.logical_key) {
                            events.push(ViewerEvent::Key(key));
                        }
                    }
                    _ => {}
                }
            });

        if let PumpStatus::Exit(code) = status {
            tracing::debug!(code, "event loop exited");
            events.push(ViewerEvent::CloseRequested);
        }
        events
    }

    pub fn aspect(&self) -> f32 {
        let size = self.gpu.size();
        size.width.max(1) as f32 / size.height.max(1) as f32
    }

    pub fn upload(&mut self, framebuffer: &Framebuffer) -> Result<()> {
        self.gpu.upload(framebuffer)
    }

    /// Presents one frame. Lost or outdated surfaces are reconfigured and the
    /// frame is skipped; running out of memory is fatal.
    pub fn draw(&mut self, scene: &SceneLayout, camera: &CameraTransform) -> Result<()> {
        match self.gpu.render(scene, camera.view_projection()) {
            Ok(()) => Ok(()),
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                let size = self.gpu.size();
                self.gpu.resize(size);
                Ok(())
            }
            Err(wgpu::SurfaceError::OutOfMemory) => Err(anyhow!("surface out of memory")),
            Err(wgpu::SurfaceError::Timeout) => {
                warn!("surface timeout; skipping frame");
                Ok(())
            }
            Err(other) => {
                warn!(error = ?other, "surface error; skipping frame");
                Ok(())
            }
        }
    }
}

fn viewer_key(key: &Key) -> Option<ViewerKey> {
    match key {
        Key::Character(value) => {
            let mut chars = value.chars();
            let ch = chars.next()?;
            if chars.next().is_some() {
                return None;
            }
            Some(ViewerKey::Char(ch))
        }
        Key::Named(NamedKey::ArrowUp) => Some(ViewerKey::ArrowUp),
        Key::Named(NamedKey::ArrowDown) => Some(ViewerKey::ArrowDown),
        Key::Named(NamedKey::ArrowLeft) => Some(ViewerKey::ArrowLeft),
        Key::Named(NamedKey::ArrowRight) => Some(ViewerKey::ArrowRight),
        Key::Named(NamedKey::PageUp) => Some(ViewerKey::PageUp),
        Key::Named(NamedKey::PageDown) => Some(ViewerKey::PageDown),
        Key::Named(NamedKey::Escape) => Some(ViewerKey::Escape),
        _ => None,
    }
}
