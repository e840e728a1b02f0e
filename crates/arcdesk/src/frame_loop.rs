use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use capture::{blend_cursor, DisplayServer, FrameSource, Framebuffer, MonitorRegistry, PointerSource};
use deskconfig::DeskConfig;
use glam::Vec3;
use renderer::{
    first_hit, CameraTransform, CenterMarker, LayoutParams, SceneLayout, Viewer, ViewerEvent,
    ViewerKey,
};
use tracing::{debug, info, trace};

use crate::commands::{key_command, CommandChannel, CommandRegistry};
use crate::context::AppContext;
use crate::sensor::OrientationSource;

/// Where a tick's frame goes: the window in production, a recorder in tests.
pub trait FrameSink {
    fn pump(&mut self) -> Vec<ViewerEvent>;
    fn aspect(&self) -> f32;
    fn upload(&mut self, framebuffer: &Framebuffer) -> Result<()>;
    fn draw(&mut self, scene: &SceneLayout, camera: &CameraTransform) -> Result<()>;
}

impl FrameSink for Viewer {
    fn pump(&mut self) -> Vec<ViewerEvent> {
        Viewer::pump(self)
    }

    fn aspect(&self) -> f32 {
        Viewer::aspect(self)
    }

    fn upload(&mut self, framebuffer: &Framebuffer) -> Result<()> {
        Viewer::upload(self, framebuffer)
    }

    fn draw(&mut self, scene: &SceneLayout, camera: &CameraTransform) -> Result<()> {
        Viewer::draw(self, scene, camera)
    }
}

/// Sleeps away whatever is left of the frame budget. Overruns are not caught up.
#[derive(Debug)]
pub struct FramePacer {
    interval: Duration,
    started: Instant,
}

impl FramePacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            started: Instant::now(),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn begin(&mut self) {
        self.started = Instant::now();
    }

    /// Returns the time spent since `begin`, sleeping first if under budget.
    pub fn finish(&mut self) -> Duration {
        let elapsed = self.started.elapsed();
        if let Some(remaining) = self.interval.checked_sub(elapsed) {
            if !remaining.is_zero() {
                std::thread::sleep(remaining);
            }
        }
        elapsed
    }
}

#[derive(Debug, Default)]
struct FrameStats {
    ticks: u64,
    warmup: u64,
    highest: Duration,
}

impl FrameStats {
    fn new(warmup: u64) -> Self {
        Self {
            warmup,
            ..Self::default()
        }
    }

    fn record(&mut self, elapsed: Duration) -> bool {
        self.ticks += 1;
        if self.ticks <= self.warmup || elapsed <= self.highest {
            return false;
        }
        self.highest = elapsed;
        debug!(
            tick = self.ticks,
            micros = elapsed.as_micros() as u64,
            "new highest frame time"
        );
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    Continue,
    Exit,
}

/// One capture → blend → upload → command → orientation → gaze → layout → draw
/// pass per tick, single-threaded.
pub struct FrameLoop<D: DisplayServer> {
    source: FrameSource<D>,
    pointer: Option<Box<dyn PointerSource>>,
    sensor: Box<dyn OrientationSource>,
    commands: CommandRegistry,
    channel: Option<CommandChannel>,
    registry: MonitorRegistry,
    layout: LayoutParams,
    eye: Vec3,
    marker_half_size: f32,
    context: AppContext,
    aligned: bool,
    pacer: FramePacer,
    stats: FrameStats,
}

impl<D: DisplayServer> FrameLoop<D> {
    pub fn new(
        config: &DeskConfig,
        source: FrameSource<D>,
        registry: MonitorRegistry,
        sensor: Box<dyn OrientationSource>,
    ) -> Self {
        Self {
            source,
            pointer: None,
            sensor,
            commands: CommandRegistry::with_defaults(&config.view),
            channel: None,
            registry,
            layout: layout_params(config),
            eye: Vec3::from_array(config.view.eye_offset),
            marker_half_size: config.view.center_dot_half_size,
            context: AppContext::from_config(config),
            aligned: false,
            pacer: FramePacer::new(config.frame_interval()),
            stats: FrameStats::new(config.frame.warmup_frames),
        }
    }

    pub fn with_pointer(mut self, pointer: Box<dyn PointerSource>) -> Self {
        self.pointer = Some(pointer);
        self
    }

    pub fn with_channel(mut self, channel: Option<CommandChannel>) -> Self {
        self.channel = channel;
        self
    }

    /// Runs ticks until the sink asks to close, then tears down.
    pub fn run<S: FrameSink>(&mut self, sink: &mut S) -> Result<()> {
        info!(
            monitors = self.registry.len(),
            interval_us = self.pacer.interval().as_micros() as u64,
            "entering frame loop"
        );
        let result = loop {
            self.pacer.begin();
            match self.tick(sink) {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Exit) => break Ok(()),
                Err(err) => break Err(err),
            }
            let elapsed = self.pacer.finish();
            self.stats.record(elapsed);
        };
        self.shutdown();
        result
    }

    pub fn tick<S: FrameSink>(&mut self, sink: &mut S) -> Result<TickOutcome> {
        let mut keys = Vec::new();
        for event in sink.pump() {
            match event {
                ViewerEvent::CloseRequested | ViewerEvent::Key(ViewerKey::Escape) => {
                    return Ok(TickOutcome::Exit);
                }
                ViewerEvent::Key(key) => keys.push(key),
            }
        }

        let framebuffer = self.source.capture().context("desktop capture failed")?;
        if let Some(cursor) = self.pointer.as_mut().and_then(|pointer| pointer.cursor()) {
            let written = blend_cursor(framebuffer, &cursor);
            trace!(written, x = cursor.x, y = cursor.y, "blended cursor");
        }
        sink.upload(framebuffer)
            .context("failed to upload desktop texture")?;
        let framebuffer_size = framebuffer.size();

        let mut command_keys = Vec::new();
        for key in keys {
            if !self.sensor.on_key(key) {
                command_keys.push(key);
            }
        }

        if let Some(pose) = self.sensor.read() {
            self.context.orientation.update(pose);
            if !self.aligned {
                self.context.orientation.align();
                self.aligned = true;
                info!(
                    roll = pose.roll,
                    pitch = pose.pitch,
                    yaw = pose.yaw,
                    "aligned to first head pose"
                );
            }
        }

        if let Some(channel) = &self.channel {
            for text in channel.poll() {
                self.commands.dispatch(&text, &mut self.context);
            }
        }
        for key in command_keys {
            if let Some(name) = key_command(key) {
                self.commands.dispatch(name, &mut self.context);
            }
        }

        let camera = CameraTransform::compute(&self.context.orientation, self.eye, sink.aspect());
        let targets = self.layout.thumbnail_targets(&self.registry);
        let hit = first_hit(&targets, &camera.gaze_ray());
        if let Some(monitor) = self.context.gaze.evaluate(hit) {
            self.context.focus.select(monitor);
            info!(%monitor, slots = self.context.focus.len(), "gaze selected monitor");
        }

        let marker = self
            .context
            .center_dot
            .then(|| CenterMarker::new(self.marker_half_size));
        let scene = self.layout.layout(
            &self.context.focus,
            &self.registry,
            framebuffer_size,
            self.context.screen_angle_offset,
            marker,
        );
        sink.draw(&scene, &camera)?;
        Ok(TickOutcome::Continue)
    }

    /// Removes the command socket and forgets focus state.
    pub fn shutdown(&mut self) {
        if let Some(channel) = self.channel.take() {
            debug!(path = %channel.path().display(), "closing command socket");
        }
        self.context.focus.clear();
        self.context.gaze.reset();
        info!(ticks = self.stats.ticks, "frame loop stopped");
    }
}

fn layout_params(config: &DeskConfig) -> LayoutParams {
    LayoutParams {
        panel_width: config.view.panel_width,
        arc_step_degrees: config.view.arc_step_degrees,
        thumbnail_height: config.thumbnails.height,
        thumbnail_spacing: config.thumbnails.spacing,
        thumbnail_size: config.thumbnails.size,
    }
}
