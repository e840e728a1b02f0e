use std::path::Path;

use anyhow::{bail, Context, Result};
use capture::{
    DisplayServer, FrameSource, ImageDisplay, MonitorRegistry, PhysicalOutput, PointerSource,
    SyntheticDisplay, SyntheticPointer, X11Display,
};
use deskconfig::DeskConfig;
use renderer::{RendererConfig, WindowMode, WindowSystem};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{ConfigAction, DisplaySource, RunArgs};
use crate::commands::CommandChannel;
use crate::frame_loop::FrameLoop;
use crate::paths::AppPaths;
use crate::sensor::build_sensor;

const DEFAULT_FILTER: &str = "warn,arcdesk=info,renderer=info,capture=info,focus=info,deskconfig=info,wgpu=error,wgpu_core=error,wgpu_hal=error,naga=error,winit=error";

pub fn run(args: RunArgs) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    let mut config = load_config(&paths, args.config.as_deref())?;
    apply_overrides(&mut config, &args)?;

    let window_system = WindowSystem::connect()?;
    let outputs = window_system.outputs();
    print_outputs(&outputs);

    let exclude = match plan_launch(&outputs, args.exclude, &config)? {
        Launch::ListOnly => return Ok(()),
        Launch::Run {
            exclude,
            detected: true,
        } => {
            println!(
                "Monitor {exclude} {} looks like the AR glasses; excluding it",
                outputs[exclude]
            );
            exclude
        }
        Launch::Run { exclude, .. } => exclude,
    };

    let registry = MonitorRegistry::from_outputs(&outputs, Some(exclude));
    if registry.is_empty() {
        warn!("every output is excluded; only the background will be visible");
    }
    info!(
        outputs = outputs.len(),
        monitors = registry.len(),
        exclude,
        "monitor registry ready"
    );

    let backend = open_display(&args.display, &outputs)?;
    let source = FrameSource::new(backend.display);

    let renderer_config = renderer_config(&args, exclude);
    let mut viewer = window_system.open_viewer(&renderer_config)?;

    let channel = if config.commands.enabled {
        match CommandChannel::bind(&config.commands.socket) {
            Ok(channel) => {
                info!(path = %channel.path().display(), "listening for commands");
                Some(channel)
            }
            Err(err) => {
                warn!(error = %format!("{err:#}"), "command socket unavailable; continuing without remote control");
                None
            }
        }
    } else {
        info!("command socket disabled by configuration");
        None
    };

    let sensor = build_sensor(&config.sensor);
    let mut frame_loop = FrameLoop::new(&config, source, registry, sensor).with_channel(channel);
    if let Some(pointer) = backend.pointer {
        frame_loop = frame_loop.with_pointer(pointer);
    }
    frame_loop.run(&mut viewer)
}

/// Handles `arcdesk config ...` without touching the display.
pub fn config_command(action: ConfigAction, args: &RunArgs) -> Result<()> {
    let paths = AppPaths::discover()?;
    match action {
        ConfigAction::Show { config } => {
            let explicit = config.as_deref().or(args.config.as_deref());
            let mut config = load_config(&paths, explicit)?;
            apply_overrides(&mut config, args)?;
            print!("{}", config.to_toml_string()?);
        }
        ConfigAction::Where => {
            println!("config dir: {}", paths.config_dir().display());
            println!("config file: {}", paths.config_file().display());
        }
    }
    Ok(())
}

fn initialise_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn load_config(paths: &AppPaths, explicit: Option<&Path>) -> Result<DeskConfig> {
    match explicit {
        Some(path) => {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            DeskConfig::from_toml_str(&contents)
                .with_context(|| format!("invalid config {}", path.display()))
        }
        None => {
            let path = paths.config_file();
            DeskConfig::load_or_default(&path)
                .with_context(|| format!("invalid config {}", path.display()))
        }
    }
}

fn apply_overrides(config: &mut DeskConfig, args: &RunArgs) -> Result<()> {
    if let Some(fps) = args.fps {
        config.frame.fps = fps;
    }
    if let Some(fov) = args.fov {
        config.view.fov = fov;
    }
    if let Some(kind) = args.sensor {
        config.sensor.kind = kind;
    }
    config
        .validate()
        .context("invalid command-line override")?;
    Ok(())
}

fn print_outputs(outputs: &[PhysicalOutput]) {
    println!("Detected monitors:");
    for (index, output) in outputs.iter().enumerate() {
        println!("Monitor {index} {output}");
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Launch {
    /// Nothing to exclude; the listing was all that was asked for.
    ListOnly,
    /// Run with `exclude` removed from the registry. `detected` is set when
    /// the output was picked by name rather than by argument.
    Run { exclude: usize, detected: bool },
}

pub fn plan_launch(
    outputs: &[PhysicalOutput],
    requested: Option<usize>,
    config: &DeskConfig,
) -> Result<Launch> {
    if outputs.is_empty() {
        bail!("no physical outputs detected");
    }

    if let Some(index) = requested {
        if index >= outputs.len() {
            bail!(
                "invalid exclude monitor index {index} (0 to {} allowed)",
                outputs.len() - 1
            );
        }
        return Ok(Launch::Run {
            exclude: index,
            detected: false,
        });
    }

    let glasses = outputs.iter().position(|output| {
        output
            .name
            .as_deref()
            .is_some_and(|name| config.is_glasses_output(name))
    });
    Ok(match glasses {
        Some(exclude) => Launch::Run {
            exclude,
            detected: true,
        },
        None => Launch::ListOnly,
    })
}

/// A desktop pixel source and the pointer drawn over it, if it has one.
struct DesktopBackend {
    display: Box<dyn DisplayServer>,
    pointer: Option<Box<dyn PointerSource>>,
}

fn open_display(source: &DisplaySource, outputs: &[PhysicalOutput]) -> Result<DesktopBackend> {
    match source {
        DisplaySource::X11(name) => {
            let display = X11Display::connect(name.as_deref())
                .context("failed to open the X11 desktop; try --display synthetic")?;
            let pointer = display
                .pointer()
                .map(|pointer| Box::new(pointer) as Box<dyn PointerSource>);
            info!(pointer = pointer.is_some(), "capturing the X11 root window");
            Ok(DesktopBackend {
                display: Box::new(display),
                pointer,
            })
        }
        DisplaySource::Synthetic => {
            info!("capturing synthetic test patterns");
            let display = SyntheticDisplay::new(outputs.to_vec());
            let (width, height) = display.screen_size();
            Ok(DesktopBackend {
                display: Box::new(display),
                pointer: Some(Box::new(SyntheticPointer::new(width, height))),
            })
        }
        DisplaySource::Image(path) => {
            let display = ImageDisplay::open(path).context("failed to open desktop image")?;
            info!(path = %path.display(), "capturing still image");
            Ok(DesktopBackend {
                display: Box::new(display),
                pointer: None,
            })
        }
    }
}

fn renderer_config(args: &RunArgs, exclude: usize) -> RendererConfig {
    let mut config = RendererConfig::default();
    if let Some(size) = args.window_size {
        config.surface_size = size;
    }
    config.window_mode = if args.windowed {
        WindowMode::Windowed
    } else {
        WindowMode::Fullscreen {
            output: Some(exclude),
        }
    };
    config
}
