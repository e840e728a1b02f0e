use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const DEFAULT_COMMAND_SOCKET: &str = "/tmp/viture_ar.sock";
pub const DEFAULT_POSE_SOCKET: &str = "/tmp/viture_ar_pose.sock";

const MAX_FOCUS_SLOTS: usize = 16;
const MIN_FPS: f32 = 1.0;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("failed to read configuration at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DeskConfig {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub frame: FrameConfig,
    #[serde(default)]
    pub view: ViewConfig,
    #[serde(default)]
    pub thumbnails: ThumbnailConfig,
    #[serde(default)]
    pub focus: FocusConfig,
    #[serde(default)]
    pub commands: CommandConfig,
    #[serde(default)]
    pub sensor: SensorConfig,
    #[serde(default)]
    pub outputs: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FrameConfig {
    pub fps: f32,
    pub warmup_frames: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ViewConfig {
    pub fov: f32,
    pub zoom_in_factor: f32,
    pub zoom_out_factor: f32,
    pub shift_step_degrees: f32,
    pub arc_step_degrees: f32,
    pub panel_width: f32,
    pub center_dot: bool,
    pub center_dot_half_size: f32,
    pub eye_offset: [f32; 3],
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    pub height: f32,
    pub spacing: f32,
    pub size: f32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct FocusConfig {
    pub hold_frames: u32,
    pub max_slots: usize,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CommandConfig {
    pub enabled: bool,
    pub socket: PathBuf,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorKind {
    Datagram,
    Keyboard,
    None,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct SensorConfig {
    pub kind: SensorKind,
    pub socket: PathBuf,
    #[serde(
        deserialize_with = "deserialize_duration",
        serialize_with = "serialize_duration"
    )]
    pub stale_after: Duration,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    pub glasses: Vec<String>,
}

fn default_version() -> u32 {
    1
}

fn default_stale_after() -> Duration {
    Duration::from_millis(500)
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            frame: FrameConfig::default(),
            view: ViewConfig::default(),
            thumbnails: ThumbnailConfig::default(),
            focus: FocusConfig::default(),
            commands: CommandConfig::default(),
            sensor: SensorConfig::default(),
            outputs: OutputConfig::default(),
        }
    }
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            fps: 120.0,
            warmup_frames: 1000,
        }
    }
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            fov: 45.0,
            zoom_in_factor: 0.99,
            zoom_out_factor: 1.01,
            shift_step_degrees: 5.0,
            arc_step_degrees: 20.0,
            panel_width: 3.0,
            center_dot: true,
            center_dot_half_size: 4.0,
            eye_offset: [0.0; 3],
        }
    }
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            height: 1.2,
            spacing: 0.6,
            size: 0.55,
        }
    }
}

impl Default for FocusConfig {
    fn default() -> Self {
        Self {
            hold_frames: 20,
            max_slots: 7,
        }
    }
}

impl Default for CommandConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            socket: PathBuf::from(DEFAULT_COMMAND_SOCKET),
        }
    }
}

impl Default for SensorConfig {
    fn default() -> Self {
        Self {
            kind: SensorKind::Datagram,
            socket: PathBuf::from(DEFAULT_POSE_SOCKET),
            stale_after: default_stale_after(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            glasses: vec!["DP-1".to_string(), "DP-2".to_string()],
        }
    }
}

fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    struct Visitor;
    impl<'de> de::Visitor<'de> for Visitor {
        type Value = Duration;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("a duration as number of seconds or human-readable string")
        }

        fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            humantime::parse_duration(v)
                .map_err(|err| E::custom(format!("invalid duration '{v}': {err}")))
        }

        fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            Ok(Duration::from_secs(v))
        }

        fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v < 0 {
                return Err(E::custom("duration must be non-negative"));
            }
            Ok(Duration::from_secs(v as u64))
        }

        fn visit_f64<E>(self, v: f64) -> Result<Self::Value, E>
        where
            E: de::Error,
        {
            if v.is_nan() || v.is_sign_negative() {
                return Err(E::custom("duration must be non-negative"));
            }
            Duration::try_from_secs_f64(v)
                .map_err(|err| E::custom(format!("invalid duration {v}: {err}")))
        }
    }

    deserializer.deserialize_any(Visitor)
}

fn serialize_duration<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&humantime::format_duration(*value).to_string())
}

impl DeskConfig {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: DeskConfig = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    /// Loads `path` when it exists, otherwise falls back to the built-in defaults.
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self)
            .map_err(|err| ConfigError::Invalid(format!("failed to serialise configuration: {err}")))
    }

    /// Target interval between frame starts. Rates outside what `validate`
    /// accepts are clamped to it.
    pub fn frame_interval(&self) -> Duration {
        let fps = f64::from(self.frame.fps.max(MIN_FPS));
        Duration::try_from_secs_f64(1.0 / fps).unwrap_or(Duration::from_secs(1))
    }

    pub fn is_glasses_output(&self, name: &str) -> bool {
        self.outputs.glasses.iter().any(|candidate| candidate == name)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.version != 1 {
            return Err(ConfigError::Invalid(format!(
                "unsupported config version {}; expected 1",
                self.version
            )));
        }

        if !(self.frame.fps >= MIN_FPS) || !self.frame.fps.is_finite() {
            return Err(ConfigError::Invalid(format!(
                "frame.fps must be finite and at least {MIN_FPS}; got {}",
                self.frame.fps
            )));
        }

        let view = &self.view;
        if !(view.fov > 0.0) || !view.fov.is_finite() {
            return Err(ConfigError::Invalid(
                "view.fov must be positive and finite".into(),
            ));
        }
        for (name, factor) in [
            ("zoom_in_factor", view.zoom_in_factor),
            ("zoom_out_factor", view.zoom_out_factor),
        ] {
            if !(factor > 0.0) || !factor.is_finite() {
                return Err(ConfigError::Invalid(format!(
                    "view.{name} must be positive and finite; got {factor}"
                )));
            }
        }
        if !(view.arc_step_degrees > 0.0 && view.arc_step_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "view.arc_step_degrees must be within (0, 180); got {}",
                view.arc_step_degrees
            )));
        }
        if !(view.panel_width > 0.0) || !view.panel_width.is_finite() {
            return Err(ConfigError::Invalid(
                "view.panel_width must be positive".into(),
            ));
        }
        if view.center_dot_half_size < 0.0 {
            return Err(ConfigError::Invalid(
                "view.center_dot_half_size must be >= 0".into(),
            ));
        }

        if !(self.thumbnails.size > 0.0) || !self.thumbnails.size.is_finite() {
            return Err(ConfigError::Invalid(
                "thumbnails.size must be positive".into(),
            ));
        }

        if self.focus.hold_frames == 0 {
            return Err(ConfigError::Invalid(
                "focus.hold_frames must be at least 1".into(),
            ));
        }
        if self.focus.max_slots == 0 || self.focus.max_slots > MAX_FOCUS_SLOTS {
            return Err(ConfigError::Invalid(format!(
                "focus.max_slots must be within 1..={MAX_FOCUS_SLOTS}; got {}",
                self.focus.max_slots
            )));
        }

        if self.commands.enabled && self.commands.socket.as_os_str().is_empty() {
            return Err(ConfigError::Invalid(
                "commands.socket may not be empty".into(),
            ));
        }
        if self.sensor.kind == SensorKind::Datagram && self.sensor.socket.as_os_str().is_empty() {
            return Err(ConfigError::Invalid("sensor.socket may not be empty".into()));
        }

        for name in &self.outputs.glasses {
            if name.trim().is_empty() {
                return Err(ConfigError::Invalid(
                    "outputs.glasses contains an empty output name".into(),
                ));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
version = 1

[frame]
fps = 90

[view]
fov = 50.0
arc_step_degrees = 30
center_dot = false

[focus]
hold_frames = 12
max_slots = 6

[commands]
socket = "/run/user/1000/arcdesk.sock"

[sensor]
kind = "keyboard"
stale_after = "1s 250ms"

[outputs]
glasses = ["HDMI-A-1"]
"#;

    #[test]
    fn parses_sample_config() {
        let config = DeskConfig::from_toml_str(SAMPLE).expect("parse config");
        assert_eq!(config.frame.fps, 90.0);
        assert_eq!(config.frame.warmup_frames, 1000);
        assert_eq!(config.view.fov, 50.0);
        assert_eq!(config.view.arc_step_degrees, 30.0);
        assert!(!config.view.center_dot);
        assert_eq!(config.view.zoom_in_factor, 0.99);
        assert_eq!(config.focus.hold_frames, 12);
        assert_eq!(config.focus.max_slots, 6);
        assert_eq!(
            config.commands.socket,
            PathBuf::from("/run/user/1000/arcdesk.sock")
        );
        assert_eq!(config.sensor.kind, SensorKind::Keyboard);
        assert_eq!(config.sensor.stale_after, Duration::from_millis(1250));
        assert!(config.is_glasses_output("HDMI-A-1"));
        assert!(!config.is_glasses_output("DP-1"));
    }

    #[test]
    fn empty_document_uses_defaults() {
        let config = DeskConfig::from_toml_str("").expect("parse empty");
        assert_eq!(config, DeskConfig::default());
        assert_eq!(config.focus.hold_frames, 20);
        assert_eq!(
            config.commands.socket,
            PathBuf::from(DEFAULT_COMMAND_SOCKET)
        );
        assert!(config.is_glasses_output("DP-2"));
    }

    #[test]
    fn frame_interval_follows_fps() {
        let config = DeskConfig::default();
        let interval = config.frame_interval();
        assert!((interval.as_secs_f64() - 1.0 / 120.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_unknown_version() {
        let err = DeskConfig::from_toml_str("version = 2").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn rejects_out_of_range_values() {
        for doc in [
            "[frame]\nfps = 0",
            "[frame]\nfps = 1e-30",
            "[frame]\nfps = inf",
            "[view]\nfov = -1.0",
            "[view]\nfov = inf",
            "[view]\nzoom_in_factor = inf",
            "[view]\nzoom_out_factor = inf",
            "[view]\nzoom_out_factor = nan",
            "[view]\npanel_width = inf",
            "[view]\narc_step_degrees = 180",
            "[focus]\nhold_frames = 0",
            "[focus]\nmax_slots = 0",
            "[focus]\nmax_slots = 64",
            "[outputs]\nglasses = [\" \"]",
        ] {
            let err = DeskConfig::from_toml_str(doc).unwrap_err();
            assert!(matches!(err, ConfigError::Invalid(_)), "{doc} should fail");
        }
    }

    #[test]
    fn rejects_negative_duration() {
        let err = DeskConfig::from_toml_str("[sensor]\nstale_after = -3").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_unrepresentable_durations() {
        for doc in [
            "[sensor]\nstale_after = inf",
            "[sensor]\nstale_after = 1e300",
        ] {
            let err = DeskConfig::from_toml_str(doc).unwrap_err();
            assert!(matches!(err, ConfigError::Parse(_)), "{doc} should fail");
        }
        let config = DeskConfig::from_toml_str("[sensor]\nstale_after = 0.25").unwrap();
        assert_eq!(config.sensor.stale_after, Duration::from_millis(250));
    }

    #[test]
    fn slowest_accepted_rate_has_finite_interval() {
        let mut config = DeskConfig::from_toml_str("[frame]\nfps = 1.0").unwrap();
        assert_eq!(config.frame_interval(), Duration::from_secs(1));
        config.frame.fps = 1e-30;
        assert_eq!(config.frame_interval(), Duration::from_secs(1));
    }

    #[test]
    fn serialised_config_parses_back() {
        let config = DeskConfig::from_toml_str(SAMPLE).unwrap();
        let rendered = config.to_toml_string().expect("serialise");
        assert!(rendered.contains("stale_after = \"1s 250ms\""));
        let reparsed = DeskConfig::from_toml_str(&rendered).expect("reparse");
        assert_eq!(reparsed, config);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let config =
            DeskConfig::load_or_default(Path::new("/nonexistent/arcdesk/config.toml")).unwrap();
        assert_eq!(config, DeskConfig::default());
    }
}
