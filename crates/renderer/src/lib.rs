//! Renderer crate for arcdesk.
//!
//! The crate turns head orientation and focus state into a drawn frame:
//!
//! ```text
//!   RawPose ──▶ OrientationState ──▶ CameraTransform ──┐
//!                                                      ▼
//!   FocusStack + MonitorRegistry ──▶ LayoutParams::layout ──▶ SceneLayout ──▶ Viewer::draw
//!                                          │
//!                                          └─▶ thumbnail GazeTargets (gaze ray tests)
//! ```
//!
//! `camera` and `layout` are pure math and carry most of the tests. `Viewer`
//! owns the winit window and the wgpu state; the frame loop pumps it
//! non-blockingly so pacing stays under the caller's control.

pub mod camera;
mod gpu;
pub mod layout;
mod types;
mod viewer;

pub use camera::{CameraTransform, OrientationState, RawPose, Ray};
pub use layout::{
    arc_radius, first_hit, CenterMarker, GazeTarget, LayoutParams, PanelRole, Quad, SceneLayout,
    UvWindow,
};
pub use types::{parse_surface_size, RendererConfig, WindowMode};
pub use viewer::{Viewer, ViewerEvent, ViewerKey, WindowSystem};
