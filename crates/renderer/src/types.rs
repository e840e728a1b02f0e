/// Where the viewer window goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowMode {
    /// A regular decorated window of `RendererConfig::surface_size`.
    #[default]
    Windowed,
    /// Borderless fullscreen on the output at this enumeration index, or on
    /// the current output when `None`.
    Fullscreen { output: Option<usize> },
}

/// `RendererConfig` mirrors CLI flags and tells the viewer how large the
/// surface should be and where to put it.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Window size in physical pixels when windowed.
    pub surface_size: (u32, u32),
    pub window_mode: WindowMode,
    pub title: String,
    /// Present with vsync (FIFO). The frame loop paces itself either way.
    pub vsync: bool,
}

impl Default for RendererConfig {
    /// Provides a 1080p windowed configuration.
    fn default() -> Self {
        Self {
            surface_size: (1920, 1080),
            window_mode: WindowMode::default(),
            title: "arcdesk".to_string(),
            vsync: false,
        }
    }
}

/// Parses `WIDTHxHEIGHT` into a pixel size.
pub fn parse_surface_size(value: &str) -> Result<(u32, u32), String> {
    let (width, height) = value
        .split_once(['x', 'X'])
        .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{value}'"))?;
    let width: u32 = width
        .trim()
        .parse()
        .map_err(|err| format!("invalid width '{width}': {err}"))?;
    let height: u32 = height
        .trim()
        .parse()
        .map_err(|err| format!("invalid height '{height}': {err}"))?;
    if width == 0 || height == 0 {
        return Err(format!("surface size must be non-zero, got {width}x{height}"));
    }
    Ok((width, height))
}
