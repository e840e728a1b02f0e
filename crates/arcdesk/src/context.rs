use deskconfig::DeskConfig;
use focus::{FocusStack, GazeSelector};
use renderer::OrientationState;

/// Everything a tick, a command handler, or a gaze selection may mutate.
///
/// Only the frame-loop thread touches it; socket commands and gaze commits
/// both land here between capture and layout.
#[derive(Debug)]
pub struct AppContext {
    pub orientation: OrientationState,
    pub focus: FocusStack,
    pub gaze: GazeSelector,
    /// Degrees added to every fan slot's rotation. Unbounded.
    pub screen_angle_offset: f32,
    pub center_dot: bool,
}

impl AppContext {
    pub fn from_config(config: &DeskConfig) -> Self {
        Self {
            orientation: OrientationState::new(config.view.fov),
            focus: FocusStack::from_config(&config.focus),
            gaze: GazeSelector::from_config(&config.focus),
            screen_angle_offset: 0.0,
            center_dot: config.view.center_dot,
        }
    }
}
