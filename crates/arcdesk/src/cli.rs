use std::path::PathBuf;

use clap::{Parser, Subcommand};
use deskconfig::SensorKind;

#[derive(Parser, Debug)]
#[command(
    name = "arcdesk",
    author,
    version,
    about = "Head-tracked multi-monitor virtual desktop for AR glasses",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Index of the physical output to exclude from the virtual desktop
    /// (usually the glasses). Without it, outputs are listed and the program
    /// exits unless one of them is a known glasses output.
    #[arg(value_name = "EXCLUDE")]
    pub exclude: Option<usize>,

    /// Configuration file to load instead of `<config dir>/config.toml`.
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Target frame rate for the render loop.
    #[arg(long, value_name = "FPS")]
    pub fps: Option<f32>,

    /// Initial vertical field of view in degrees.
    #[arg(long, value_name = "DEGREES")]
    pub fov: Option<f32>,

    /// Desktop pixel source: `x11` (or `x11:DISPLAY`), `synthetic` test
    /// patterns, or `image:PATH`.
    #[arg(
        long,
        value_name = "SOURCE",
        value_parser = parse_display_source,
        default_value = "x11"
    )]
    pub display: DisplaySource,

    /// Head orientation source: `datagram`, `keyboard`, or `none`.
    #[arg(long, value_name = "KIND", value_parser = parse_sensor_kind)]
    pub sensor: Option<SensorKind>,

    /// Window size used with `--windowed` (e.g. `1920x1080`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = renderer::parse_surface_size)]
    pub window_size: Option<(u32, u32)>,

    /// Open a regular window instead of going fullscreen on the excluded output.
    #[arg(long)]
    pub windowed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplaySource {
    /// The X server named by the argument, or `$DISPLAY`.
    X11(Option<String>),
    Synthetic,
    Image(PathBuf),
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Inspect the effective configuration without opening a display.
    Config(ConfigCommand),
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show {
        /// Configuration file to load instead of the discovered one.
        #[arg(long, value_name = "FILE")]
        config: Option<PathBuf>,
    },
    /// Print the resolved configuration directory and file.
    Where,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_display_source(value: &str) -> Result<DisplaySource, String> {
    let trimmed = value.trim();
    if trimmed.eq_ignore_ascii_case("x11") {
        return Ok(DisplaySource::X11(None));
    }
    if let Some(name) = trimmed.strip_prefix("x11:") {
        if name.is_empty() {
            return Err("x11: needs a display name, e.g. x11::0".into());
        }
        return Ok(DisplaySource::X11(Some(name.to_string())));
    }
    if trimmed.eq_ignore_ascii_case("synthetic") {
        return Ok(DisplaySource::Synthetic);
    }
    if let Some(path) = trimmed.strip_prefix("image:") {
        if path.is_empty() {
            return Err("image source needs a path (image:PATH)".to_string());
        }
        return Ok(DisplaySource::Image(PathBuf::from(path)));
    }
    Err(format!(
        "unknown display source '{value}'; expected 'x11', 'x11:DISPLAY', 'synthetic' or 'image:PATH'"
    ))
}

pub fn parse_sensor_kind(value: &str) -> Result<SensorKind, String> {
    match value.trim().to_ascii_lowercase().as_str() {
        "datagram" => Ok(SensorKind::Datagram),
        "keyboard" => Ok(SensorKind::Keyboard),
        "none" => Ok(SensorKind::None),
        other => Err(format!(
            "unknown sensor '{other}'; expected 'datagram', 'keyboard', or 'none'"
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_display_sources() {
        assert_eq!(
            parse_display_source("synthetic"),
            Ok(DisplaySource::Synthetic)
        );
        assert_eq!(
            parse_display_source("image:/tmp/desk.png"),
            Ok(DisplaySource::Image(PathBuf::from("/tmp/desk.png")))
        );
        assert!(parse_display_source("image:").is_err());
        assert_eq!(parse_display_source("x11"), Ok(DisplaySource::X11(None)));
        assert_eq!(
            parse_display_source("x11::1"),
            Ok(DisplaySource::X11(Some(":1".into())))
        );
        assert!(parse_display_source("x11:").is_err());
        assert!(parse_display_source("wayland").is_err());
    }

    #[test]
    fn parses_sensor_kinds() {
        assert_eq!(parse_sensor_kind("Keyboard"), Ok(SensorKind::Keyboard));
        assert_eq!(parse_sensor_kind("none"), Ok(SensorKind::None));
        assert!(parse_sensor_kind("imu").is_err());
    }

    #[test]
    fn positional_exclude_and_flags() {
        let cli = Cli::try_parse_from(["arcdesk", "2", "--fps", "90", "--windowed"]).unwrap();
        assert_eq!(cli.run.exclude, Some(2));
        assert_eq!(cli.run.fps, Some(90.0));
        assert!(cli.run.windowed);
        assert_eq!(cli.run.display, DisplaySource::X11(None));
        assert!(cli.command.is_none());
    }

    #[test]
    fn config_subcommand_parses() {
        let cli = Cli::try_parse_from(["arcdesk", "config", "where"]).unwrap();
        assert!(matches!(
            cli.command,
            Some(Command::Config(ConfigCommand {
                action: ConfigAction::Where
            }))
        ));
    }

    #[test]
    fn rejects_non_numeric_exclude() {
        assert!(Cli::try_parse_from(["arcdesk", "left"]).is_err());
    }
}
