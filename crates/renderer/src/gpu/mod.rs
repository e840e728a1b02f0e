//! GPU side of the viewer.
//!
//! - `context` owns wgpu instance/device/surface wiring plus the depth target,
//!   and rebuilds swapchain state when the window resizes.
//! - `pipeline` builds the instanced quad pipelines (depth-tested scene and
//!   screen-space overlay) from `quad.wgsl`.
//! - `state` keeps the desktop texture in sync with the captured framebuffer
//!   and encodes one frame from a `SceneLayout`.

mod context;
mod pipeline;
mod state;

pub(crate) use state::GpuState;
