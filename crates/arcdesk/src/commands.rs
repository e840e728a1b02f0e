use std::collections::HashMap;
use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use deskconfig::ViewConfig;
use renderer::ViewerKey;
use tracing::{debug, trace, warn};

use crate::context::AppContext;

pub const ALIGN: &str = "align";
pub const PUSH: &str = "push";
pub const POP: &str = "pop";
pub const ZOOM_IN: &str = "zoom_in";
pub const ZOOM_OUT: &str = "zoom_out";
pub const SHIFT_LEFT: &str = "shift_left";
pub const SHIFT_RIGHT: &str = "shift_right";
pub const CENTER_DOT_TOGGLE: &str = "center_dot_toggle";

/// Datagrams consumed per poll; anything beyond waits for the next tick.
const MAX_COMMANDS_PER_POLL: usize = 32;
const MAX_DATAGRAM_LEN: usize = 256;

/// A named action applied to the application context between capture and layout.
pub trait CommandHandler {
    fn execute(&self, context: &mut AppContext);
}

struct Align;

impl CommandHandler for Align {
    fn execute(&self, context: &mut AppContext) {
        context.orientation.align();
    }
}

struct Push;

impl CommandHandler for Push {
    fn execute(&self, context: &mut AppContext) {
        context.focus.push();
    }
}

struct Pop;

impl CommandHandler for Pop {
    fn execute(&self, context: &mut AppContext) {
        context.focus.pop();
    }
}

struct Zoom {
    factor: f32,
}

impl CommandHandler for Zoom {
    fn execute(&self, context: &mut AppContext) {
        context.orientation.zoom(self.factor);
    }
}

struct Shift {
    degrees: f32,
}

impl CommandHandler for Shift {
    fn execute(&self, context: &mut AppContext) {
        context.screen_angle_offset += self.degrees;
    }
}

struct ToggleCenterDot;

impl CommandHandler for ToggleCenterDot {
    fn execute(&self, context: &mut AppContext) {
        context.center_dot = !context.center_dot;
    }
}

/// Maps command names to their handlers.
#[derive(Default)]
pub struct CommandRegistry {
    handlers: HashMap<&'static str, Box<dyn CommandHandler>>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, name: &'static str, handler: Box<dyn CommandHandler>) {
        if self.handlers.insert(name, handler).is_some() {
            debug!(command = name, "replaced command handler");
        }
    }

    /// Registers the built-in commands with factors and steps from `view`.
    pub fn with_defaults(view: &ViewConfig) -> Self {
        let mut registry = Self::new();
        registry.register(ALIGN, Box::new(Align));
        registry.register(PUSH, Box::new(Push));
        registry.register(POP, Box::new(Pop));
        registry.register(
            ZOOM_IN,
            Box::new(Zoom {
                factor: view.zoom_in_factor,
            }),
        );
        registry.register(
            ZOOM_OUT,
            Box::new(Zoom {
                factor: view.zoom_out_factor,
            }),
        );
        registry.register(
            SHIFT_LEFT,
            Box::new(Shift {
                degrees: view.shift_step_degrees,
            }),
        );
        registry.register(
            SHIFT_RIGHT,
            Box::new(Shift {
                degrees: -view.shift_step_degrees,
            }),
        );
        registry.register(CENTER_DOT_TOGGLE, Box::new(ToggleCenterDot));
        registry
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    /// Runs the handler registered for `text`. Unknown commands are ignored.
    pub fn dispatch(&self, text: &str, context: &mut AppContext) -> bool {
        let name = text.trim();
        match self.handlers.get(name) {
            Some(handler) => {
                debug!(command = name, "applying command");
                handler.execute(context);
                true
            }
            None => {
                trace!(command = name, "ignoring unknown command");
                false
            }
        }
    }
}

/// Command name bound to a viewer key, if any.
pub fn key_command(key: ViewerKey) -> Option<&'static str> {
    match key {
        ViewerKey::Char('a') => Some(ALIGN),
        ViewerKey::PageUp => Some(PUSH),
        ViewerKey::PageDown => Some(POP),
        ViewerKey::Char('+' | '=') => Some(ZOOM_IN),
        ViewerKey::Char('-') => Some(ZOOM_OUT),
        ViewerKey::Char(',') => Some(SHIFT_LEFT),
        ViewerKey::Char('.') => Some(SHIFT_RIGHT),
        ViewerKey::Char('c') => Some(CENTER_DOT_TOGGLE),
        _ => None,
    }
}

/// Non-blocking Unix datagram endpoint receiving command names.
///
/// The socket file is removed before binding and again on drop.
#[derive(Debug)]
pub struct CommandChannel {
    socket: UnixDatagram,
    path: PathBuf,
    max_per_poll: usize,
}

impl CommandChannel {
    pub fn bind(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        remove_stale_socket(&path);
        let socket = UnixDatagram::bind(&path)
            .with_context(|| format!("failed to bind command socket {}", path.display()))?;
        socket
            .set_nonblocking(true)
            .context("failed to make command socket non-blocking")?;
        debug!(path = %path.display(), "command socket ready");
        Ok(Self {
            socket,
            path,
            max_per_poll: MAX_COMMANDS_PER_POLL,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns pending command texts without blocking. Every datagram read,
    /// empty or undecodable ones included, counts toward the per-poll cap.
    pub fn poll(&self) -> Vec<String> {
        let mut commands = Vec::new();
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        for _ in 0..self.max_per_poll {
            match self.socket.recv(&mut buf) {
                Ok(0) => trace!("dropping empty command datagram"),
                Ok(len) => match std::str::from_utf8(&buf[..len]) {
                    Ok(text) => commands.push(text.to_string()),
                    Err(_) => trace!(len, "dropping non-UTF-8 command datagram"),
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %err, "command socket receive failed");
                    break;
                }
            }
        }
        commands
    }
}

impl Drop for CommandChannel {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove command socket");
            }
        }
    }
}

pub(crate) fn remove_stale_socket(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => debug!(path = %path.display(), "removed stale socket"),
        Err(err) if err.kind() == ErrorKind::NotFound => {}
        Err(err) => warn!(path = %path.display(), error = %err, "failed to remove stale socket"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deskconfig::DeskConfig;
    use focus::MonitorId;
    use renderer::RawPose;
    use tempfile::TempDir;

    fn context() -> (AppContext, CommandRegistry) {
        let config = DeskConfig::default();
        (
            AppContext::from_config(&config),
            CommandRegistry::with_defaults(&config.view),
        )
    }

    #[test]
    fn registers_every_builtin_command() {
        let (_, registry) = context();
        for name in [
            ALIGN,
            PUSH,
            POP,
            ZOOM_IN,
            ZOOM_OUT,
            SHIFT_LEFT,
            SHIFT_RIGHT,
            CENTER_DOT_TOGGLE,
        ] {
            assert!(registry.contains(name), "{name} missing");
        }
    }

    #[test]
    fn unknown_commands_are_ignored() {
        let (mut ctx, registry) = context();
        assert!(!registry.dispatch("explode", &mut ctx));
        assert!(!registry.dispatch("", &mut ctx));
        assert!(ctx.focus.is_empty());
    }

    #[test]
    fn surrounding_whitespace_is_trimmed() {
        let (mut ctx, registry) = context();
        assert!(registry.dispatch("push\n", &mut ctx));
        assert_eq!(ctx.focus.len(), 1);
    }

    #[test]
    fn push_and_pop_mutate_focus() {
        let (mut ctx, registry) = context();
        ctx.focus.select(MonitorId(1));
        registry.dispatch(PUSH, &mut ctx);
        assert_eq!(ctx.focus.len(), 2);
        assert_eq!(ctx.focus.head(), None);
        registry.dispatch(POP, &mut ctx);
        assert_eq!(ctx.focus.head(), Some(MonitorId(1)));
        registry.dispatch(POP, &mut ctx);
        registry.dispatch(POP, &mut ctx);
        assert!(ctx.focus.is_empty());
    }

    #[test]
    fn zoom_composes_multiplicatively() {
        let (mut ctx, registry) = context();
        ctx.orientation = renderer::OrientationState::new(45.0);
        for _ in 0..10 {
            registry.dispatch(ZOOM_IN, &mut ctx);
        }
        for _ in 0..10 {
            registry.dispatch(ZOOM_OUT, &mut ctx);
        }
        let mut expected = 45.0_f32;
        for _ in 0..10 {
            expected *= 0.99;
        }
        for _ in 0..10 {
            expected *= 1.01;
        }
        assert!((ctx.orientation.fov() - expected).abs() < 1e-4);
        assert!((ctx.orientation.fov() - 45.0).abs() > 1e-4);
    }

    #[test]
    fn shift_moves_screen_offset_by_step() {
        let (mut ctx, registry) = context();
        registry.dispatch(SHIFT_LEFT, &mut ctx);
        registry.dispatch(SHIFT_LEFT, &mut ctx);
        assert_eq!(ctx.screen_angle_offset, 10.0);
        registry.dispatch(SHIFT_RIGHT, &mut ctx);
        assert_eq!(ctx.screen_angle_offset, 5.0);
    }

    #[test]
    fn align_zeroes_current_pose() {
        let (mut ctx, registry) = context();
        ctx.orientation.update(RawPose::new(3.0, -12.5, 40.0));
        registry.dispatch(ALIGN, &mut ctx);
        let effective = ctx.orientation.effective();
        assert!(effective.roll.abs() < 1e-6);
        assert!(effective.pitch.abs() < 1e-6);
        assert!(effective.yaw.abs() < 1e-6);
    }

    #[test]
    fn center_dot_toggles() {
        let (mut ctx, registry) = context();
        let initial = ctx.center_dot;
        registry.dispatch(CENTER_DOT_TOGGLE, &mut ctx);
        assert_eq!(ctx.center_dot, !initial);
        registry.dispatch(CENTER_DOT_TOGGLE, &mut ctx);
        assert_eq!(ctx.center_dot, initial);
    }

    #[test]
    fn keys_map_to_command_names() {
        assert_eq!(key_command(ViewerKey::Char('a')), Some(ALIGN));
        assert_eq!(key_command(ViewerKey::PageUp), Some(PUSH));
        assert_eq!(key_command(ViewerKey::PageDown), Some(POP));
        assert_eq!(key_command(ViewerKey::Char('=')), Some(ZOOM_IN));
        assert_eq!(key_command(ViewerKey::Char('.')), Some(SHIFT_RIGHT));
        assert_eq!(key_command(ViewerKey::ArrowLeft), None);
        assert_eq!(key_command(ViewerKey::Escape), None);
    }

    #[test]
    fn channel_receives_datagrams_and_cleans_up() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("commands.sock");
        std::fs::write(&path, b"stale").unwrap();

        let channel = CommandChannel::bind(&path).unwrap();
        assert!(channel.poll().is_empty());

        let client = UnixDatagram::unbound().unwrap();
        client.send_to(b"push", &path).unwrap();
        client.send_to(b"zoom_in", &path).unwrap();
        assert_eq!(channel.poll(), vec!["push".to_string(), "zoom_in".to_string()]);
        assert!(channel.poll().is_empty());

        drop(channel);
        assert!(!path.exists());
    }

    #[test]
    fn poll_is_bounded_per_call() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("burst.sock");
        let mut channel = CommandChannel::bind(&path).unwrap();
        assert_eq!(channel.max_per_poll, MAX_COMMANDS_PER_POLL);
        channel.max_per_poll = 3;
        let client = UnixDatagram::unbound().unwrap();
        for _ in 0..5 {
            client.send_to(b"pop", &path).unwrap();
        }
        assert_eq!(channel.poll().len(), 3);
        assert_eq!(channel.poll().len(), 2);
        assert!(channel.poll().is_empty());
    }

    #[test]
    fn empty_and_undecodable_datagrams_count_toward_the_cap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("noise.sock");
        let mut channel = CommandChannel::bind(&path).unwrap();
        channel.max_per_poll = 3;
        let client = UnixDatagram::unbound().unwrap();
        client.send_to(b"", &path).unwrap();
        client.send_to(&[0xff, 0xfe], &path).unwrap();
        client.send_to(b"", &path).unwrap();
        client.send_to(b"push", &path).unwrap();

        assert!(channel.poll().is_empty());
        assert_eq!(channel.poll(), vec!["push".to_string()]);
    }
}
