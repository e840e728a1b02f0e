use std::io::ErrorKind;
use std::os::unix::net::UnixDatagram;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use deskconfig::{SensorConfig, SensorKind};
use renderer::{RawPose, ViewerKey};
use tracing::{debug, info, trace, warn};

use crate::commands::remove_stale_socket;

const KEY_STEP_DEGREES: f32 = 1.0;
const MAX_DATAGRAM_LEN: usize = 128;
const MAX_POSES_PER_READ: usize = 64;

/// Supplies raw head orientation once per tick.
pub trait OrientationSource {
    /// Latest pose, or `None` when nothing has been observed yet.
    fn read(&mut self) -> Option<RawPose>;

    /// Offers a viewer key to the source. Returns true when consumed.
    fn on_key(&mut self, _key: ViewerKey) -> bool {
        false
    }
}

/// Reads `"roll pitch yaw"` datagrams (degrees) from a Unix socket fed by the
/// glasses' sensor driver.
#[derive(Debug)]
pub struct DatagramSensor {
    socket: UnixDatagram,
    path: PathBuf,
    last: Option<RawPose>,
    last_seen: Instant,
    stale_after: Duration,
    stale_reported: bool,
    max_per_read: usize,
}

impl DatagramSensor {
    pub fn bind(path: impl AsRef<Path>, stale_after: Duration) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        remove_stale_socket(&path);
        let socket = UnixDatagram::bind(&path)
            .with_context(|| format!("failed to bind pose socket {}", path.display()))?;
        socket
            .set_nonblocking(true)
            .context("failed to make pose socket non-blocking")?;
        debug!(path = %path.display(), "pose socket ready");
        Ok(Self {
            socket,
            path,
            last: None,
            last_seen: Instant::now(),
            stale_after,
            stale_reported: false,
            max_per_read: MAX_POSES_PER_READ,
        })
    }

    /// Reads at most `max_per_read` queued datagrams; the rest wait for the next read.
    fn drain(&mut self) -> bool {
        let mut received = false;
        let mut buf = [0u8; MAX_DATAGRAM_LEN];
        for _ in 0..self.max_per_read {
            match self.socket.recv(&mut buf) {
                Ok(len) => match parse_pose(&buf[..len]) {
                    Some(pose) => {
                        self.last = Some(pose);
                        received = true;
                    }
                    None => trace!(len, "ignoring malformed pose datagram"),
                },
                Err(err) if err.kind() == ErrorKind::WouldBlock => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => {
                    warn!(error = %err, "pose socket receive failed");
                    break;
                }
            }
        }
        received
    }
}

impl OrientationSource for DatagramSensor {
    fn read(&mut self) -> Option<RawPose> {
        let now = Instant::now();
        if self.drain() {
            if self.stale_reported {
                info!("pose stream resumed");
            }
            self.last_seen = now;
            self.stale_reported = false;
        } else if !self.stale_reported && now.duration_since(self.last_seen) >= self.stale_after {
            warn!(
                path = %self.path.display(),
                stale_ms = self.stale_after.as_millis() as u64,
                "no head pose received; holding last pose"
            );
            self.stale_reported = true;
        }
        self.last
    }
}

impl Drop for DatagramSensor {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != ErrorKind::NotFound {
                warn!(path = %self.path.display(), error = %err, "failed to remove pose socket");
            }
        }
    }
}

/// Parses a `"roll pitch yaw"` datagram. Extra or missing fields are rejected.
pub fn parse_pose(bytes: &[u8]) -> Option<RawPose> {
    let text = std::str::from_utf8(bytes).ok()?;
    let mut fields = text.split_whitespace().map(str::parse::<f32>);
    let roll = fields.next()?.ok()?;
    let pitch = fields.next()?.ok()?;
    let yaw = fields.next()?.ok()?;
    if fields.next().is_some() {
        return None;
    }
    if !(roll.is_finite() && pitch.is_finite() && yaw.is_finite()) {
        return None;
    }
    Some(RawPose::new(roll, pitch, yaw))
}

/// Desk-mode pose driven by the viewer window's arrow and bracket keys.
#[derive(Debug, Default)]
pub struct KeyboardSensor {
    pose: RawPose,
}

impl KeyboardSensor {
    pub fn new() -> Self {
        Self::default()
    }
}

impl OrientationSource for KeyboardSensor {
    fn read(&mut self) -> Option<RawPose> {
        Some(self.pose)
    }

    fn on_key(&mut self, key: ViewerKey) -> bool {
        match key {
            ViewerKey::ArrowLeft => self.pose.yaw += KEY_STEP_DEGREES,
            ViewerKey::ArrowRight => self.pose.yaw -= KEY_STEP_DEGREES,
            ViewerKey::ArrowUp => self.pose.pitch -= KEY_STEP_DEGREES,
            ViewerKey::ArrowDown => self.pose.pitch += KEY_STEP_DEGREES,
            ViewerKey::Char('[') => self.pose.roll -= KEY_STEP_DEGREES,
            ViewerKey::Char(']') => self.pose.roll += KEY_STEP_DEGREES,
            _ => return false,
        }
        true
    }
}

/// Holds the neutral pose.
#[derive(Debug, Default)]
pub struct NoSensor;

impl OrientationSource for NoSensor {
    fn read(&mut self) -> Option<RawPose> {
        Some(RawPose::default())
    }
}

/// Builds the configured orientation source. A datagram socket that cannot be
/// bound degrades to keyboard control.
pub fn build_sensor(config: &SensorConfig) -> Box<dyn OrientationSource> {
    match config.kind {
        SensorKind::Datagram => match DatagramSensor::bind(&config.socket, config.stale_after) {
            Ok(sensor) => {
                info!(path = %config.socket.display(), "listening for head pose");
                Box::new(sensor)
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "pose socket unavailable; using keyboard control");
                Box::new(KeyboardSensor::new())
            }
        },
        SensorKind::Keyboard => {
            info!("head pose from arrow and bracket keys");
            Box::new(KeyboardSensor::new())
        }
        SensorKind::None => Box::new(NoSensor),
    }
}
