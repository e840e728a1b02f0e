//! Scene layout: where focused monitors and thumbnails sit in 3D.
//!
//! Every panel is a unit quad centred on the origin in the XY plane, scaled and
//! placed by its model matrix. The layout is recomputed from scratch each tick
//! from the focus stack, the registry and the screen angle offset.

use capture::{MonitorDescriptor, MonitorRegistry};
use focus::{FocusSlot, FocusStack, MonitorId};
use glam::{Mat4, Vec3};

use crate::camera::Ray;

/// Normalised texture window of a monitor inside the captured desktop.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UvWindow {
    pub u0: f32,
    pub v0: f32,
    pub u1: f32,
    pub v1: f32,
}

impl UvWindow {
    pub const FULL: Self = Self {
        u0: 0.0,
        v0: 0.0,
        u1: 1.0,
        v1: 1.0,
    };

    pub fn for_monitor(monitor: &MonitorDescriptor, fb_width: u32, fb_height: u32) -> Self {
        let width = fb_width.max(1) as f32;
        let height = fb_height.max(1) as f32;
        Self {
            u0: monitor.x as f32 / width,
            v0: monitor.y as f32 / height,
            u1: (monitor.x as f32 + monitor.width as f32) / width,
            v1: (monitor.y as f32 + monitor.height as f32) / height,
        }
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.u0, self.v0, self.u1, self.v1]
    }
}

/// Geometry knobs for the arc and the thumbnail strip, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutParams {
    pub panel_width: f32,
    pub arc_step_degrees: f32,
    pub thumbnail_height: f32,
    pub thumbnail_spacing: f32,
    pub thumbnail_size: f32,
}

impl Default for LayoutParams {
    fn default() -> Self {
        Self {
            panel_width: 3.0,
            arc_step_degrees: 20.0,
            thumbnail_height: 1.2,
            thumbnail_spacing: 0.6,
            thumbnail_size: 0.55,
        }
    }
}

/// Inscribed radius of the regular polygon whose edges are panels spaced
/// `step_degrees` apart: `(w / 2) * cot(pi / (360 / step))`.
pub fn arc_radius(panel_width: f32, step_degrees: f32) -> f32 {
    let sides = 360.0 / step_degrees;
    let half_angle = std::f32::consts::PI / sides;
    (panel_width / 2.0) * (half_angle.cos() / half_angle.sin())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelRole {
    Lap,
    Fan(usize),
    Thumbnail,
}

/// One textured panel ready for drawing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quad {
    pub monitor: MonitorId,
    pub role: PanelRole,
    pub model: Mat4,
    pub uv: UvWindow,
}

/// A thumbnail the gaze ray can select.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GazeTarget {
    pub monitor: MonitorId,
    pub center: Vec3,
    pub width: f32,
    pub height: f32,
}

impl GazeTarget {
    /// Ray/plane test against the target's constant-Z plane and half-extent box.
    /// Rays parallel to the plane or pointing away from it never hit.
    pub fn hit_by(&self, ray: &Ray) -> bool {
        if ray.direction.z.abs() < 1e-5 {
            return false;
        }
        let t = (self.center.z - ray.origin.z) / ray.direction.z;
        if t < 0.0 {
            return false;
        }
        let ix = ray.origin.x + ray.direction.x * t;
        let iy = ray.origin.y + ray.direction.y * t;
        let half_w = self.width / 2.0;
        let half_h = self.height / 2.0;
        ix >= self.center.x - half_w
            && ix <= self.center.x + half_w
            && iy >= self.center.y - half_h
            && iy <= self.center.y + half_h
    }
}

/// First target in strip order the ray lands on.
pub fn first_hit(targets: &[GazeTarget], ray: &Ray) -> Option<MonitorId> {
    targets
        .iter()
        .find(|target| target.hit_by(ray))
        .map(|target| target.monitor)
}

/// Screen-space crosshair drawn over the scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CenterMarker {
    pub half_size: f32,
    pub color: [f32; 4],
}

impl CenterMarker {
    pub fn new(half_size: f32) -> Self {
        Self {
            half_size,
            color: [1.0, 0.0, 0.0, 1.0],
        }
    }

    /// Maps the unit quad to a pixel-sized square at the surface centre,
    /// using its own orthographic projection.
    pub fn transform(&self, surface_width: u32, surface_height: u32) -> Mat4 {
        let width = surface_width.max(1) as f32;
        let height = surface_height.max(1) as f32;
        let ortho = Mat4::orthographic_rh(0.0, width, 0.0, height, -1.0, 1.0);
        ortho
            * Mat4::from_translation(Vec3::new(width / 2.0, height / 2.0, 0.0))
            * Mat4::from_scale(Vec3::new(self.half_size * 2.0, self.half_size * 2.0, 1.0))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SceneLayout {
    pub quads: Vec<Quad>,
    pub center_marker: Option<CenterMarker>,
}

impl LayoutParams {
    pub fn arc_radius(&self) -> f32 {
        arc_radius(self.panel_width, self.arc_step_degrees)
    }

    /// Depth shared by the lap panel, the fan, and the thumbnail strip.
    pub fn base_depth(&self) -> f32 {
        -self.arc_radius()
    }

    /// Thumbnail centres for every registered monitor, evenly spaced and
    /// centred horizontally above the main view.
    pub fn thumbnail_targets(&self, registry: &MonitorRegistry) -> Vec<GazeTarget> {
        let count = registry.len() as f32;
        let z = self.base_depth();
        registry
            .iter()
            .map(|monitor| {
                let x = (monitor.index as f32 - (count - 1.0) / 2.0) * self.thumbnail_spacing;
                GazeTarget {
                    monitor: MonitorId(monitor.index),
                    center: Vec3::new(x, self.thumbnail_height, z),
                    width: self.thumbnail_size,
                    height: self.thumbnail_size,
                }
            })
            .collect()
    }

    /// Lays out the fan, the lap panel, and the thumbnail strip.
    pub fn layout(
        &self,
        stack: &FocusStack,
        registry: &MonitorRegistry,
        framebuffer_size: (u32, u32),
        screen_angle_offset: f32,
        center_marker: Option<CenterMarker>,
    ) -> SceneLayout {
        let (fb_width, fb_height) = framebuffer_size;
        let base = Mat4::from_translation(Vec3::new(0.0, 0.0, self.base_depth()));
        let mut quads = Vec::with_capacity(stack.len() + registry.len());

        for (position, slot) in stack.fan() {
            let Some(monitor) = resolve(slot, registry) else {
                continue;
            };
            let angle = -(position as f32) * self.arc_step_degrees + screen_angle_offset;
            quads.push(Quad {
                monitor: MonitorId(monitor.index),
                role: PanelRole::Fan(position),
                model: Mat4::from_rotation_y(angle.to_radians()) * base * self.panel_scale(monitor),
                uv: UvWindow::for_monitor(monitor, fb_width, fb_height),
            });
        }

        if let Some(monitor) = stack.slots().first().and_then(|slot| resolve(*slot, registry)) {
            let tilt = -self.arc_step_degrees * aspect(monitor);
            quads.push(Quad {
                monitor: MonitorId(monitor.index),
                role: PanelRole::Lap,
                model: Mat4::from_rotation_x(tilt.to_radians()) * base * self.panel_scale(monitor),
                uv: UvWindow::for_monitor(monitor, fb_width, fb_height),
            });
        }

        for target in self.thumbnail_targets(registry) {
            let Some(monitor) = registry.get(target.monitor.0) else {
                continue;
            };
            quads.push(Quad {
                monitor: target.monitor,
                role: PanelRole::Thumbnail,
                model: Mat4::from_translation(target.center)
                    * Mat4::from_scale(Vec3::new(target.width, target.height, 1.0)),
                uv: UvWindow::for_monitor(monitor, fb_width, fb_height),
            });
        }

        SceneLayout {
            quads,
            center_marker,
        }
    }

    fn panel_scale(&self, monitor: &MonitorDescriptor) -> Mat4 {
        Mat4::from_scale(Vec3::new(
            self.panel_width,
            self.panel_width * aspect(monitor),
            1.0,
        ))
    }
}

fn aspect(monitor: &MonitorDescriptor) -> f32 {
    monitor.height as f32 / monitor.width.max(1) as f32
}

fn resolve(slot: FocusSlot, registry: &MonitorRegistry) -> Option<&MonitorDescriptor> {
    let id = slot.monitor()?;
    let monitor = registry.get(id.0);
    if monitor.is_none() {
        tracing::trace!(monitor = %id, "focus slot references unknown monitor");
    }
    monitor
}

#[cfg(test)]
mod tests {
    use super::*;
    use capture::PhysicalOutput;

    const EPS: f32 = 1e-4;

    fn registry(count: usize) -> MonitorRegistry {
        let outputs: Vec<_> = (0..count)
            .map(|i| PhysicalOutput {
                name: None,
                x: i as i32 * 1920,
                y: 0,
                width: 1920,
                height: 1080,
            })
            .collect();
        MonitorRegistry::from_outputs(&outputs, None)
    }

    #[test]
    fn full_monitor_maps_to_unit_window() {
        let monitor = MonitorDescriptor {
            x: 0,
            y: 0,
            width: 1920,
            height: 1080,
            index: 0,
        };
        assert_eq!(UvWindow::for_monitor(&monitor, 1920, 1080), UvWindow::FULL);
    }

    #[test]
    fn side_by_side_monitor_maps_to_right_half() {
        let monitor = MonitorDescriptor {
            x: 1920,
            y: 0,
            width: 1920,
            height: 1080,
            index: 1,
        };
        let uv = UvWindow::for_monitor(&monitor, 3840, 1080);
        assert!((uv.u0 - 0.5).abs() < EPS);
        assert!((uv.u1 - 1.0).abs() < EPS);
        assert!((uv.v1 - 1.0).abs() < EPS);
    }

    #[test]
    fn arc_radius_matches_inscribed_polygon() {
        let expected = 1.5 / (std::f32::consts::PI / 18.0).tan();
        assert!((arc_radius(3.0, 20.0) - expected).abs() < EPS);
        // a hexagon's inscribed radius is sqrt(3)/2 * side
        assert!((arc_radius(3.0, 60.0) - 3.0f32.sqrt() / 2.0 * 3.0).abs() < EPS);
        assert!((LayoutParams::default().base_depth() + expected).abs() < EPS);
    }

    #[test]
    fn thumbnails_are_centred_above_view() {
        let params = LayoutParams::default();
        let targets = params.thumbnail_targets(&registry(3));
        let xs: Vec<f32> = targets.iter().map(|t| t.center.x).collect();
        assert!((xs[0] + 0.6).abs() < EPS);
        assert!(xs[1].abs() < EPS);
        assert!((xs[2] - 0.6).abs() < EPS);
        assert!(targets.iter().all(|t| (t.center.y - 1.2).abs() < EPS));
        assert!(targets
            .iter()
            .all(|t| (t.center.z - params.base_depth()).abs() < EPS));
    }

    #[test]
    fn ray_hits_thumbnail_in_front() {
        let target = GazeTarget {
            monitor: MonitorId(0),
            center: Vec3::new(0.0, 1.2, -8.5),
            width: 0.55,
            height: 0.55,
        };
        let ray = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::new(0.0, 1.2, -8.5).normalize(),
        };
        assert!(target.hit_by(&ray));

        let off = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::NEG_Z,
        };
        assert!(!target.hit_by(&off));
    }

    #[test]
    fn ray_behind_or_parallel_never_hits() {
        let target = GazeTarget {
            monitor: MonitorId(0),
            center: Vec3::new(0.0, 0.0, -5.0),
            width: 100.0,
            height: 100.0,
        };
        let behind = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::Z,
        };
        let parallel = Ray {
            origin: Vec3::ZERO,
            direction: Vec3::X,
        };
        assert!(!target.hit_by(&behind));
        assert!(!target.hit_by(&parallel));
    }

    #[test]
    fn first_hit_prefers_strip_order() {
        let params = LayoutParams {
            thumbnail_spacing: 0.0,
            ..LayoutParams::default()
        };
        let targets = params.thumbnail_targets(&registry(2));
        let ray = Ray {
            origin: Vec3::ZERO,
            direction: (targets[0].center).normalize(),
        };
        assert_eq!(first_hit(&targets, &ray), Some(MonitorId(0)));
    }

    #[test]
    fn layout_places_lap_fan_and_strip() {
        let params = LayoutParams::default();
        let registry = registry(3);
        let mut stack = FocusStack::new(7);
        stack.select(MonitorId(2));
        stack.push();
        stack.select(MonitorId(1));
        stack.push();

        let scene = params.layout(&stack, &registry, (5760, 1080), 0.0, None);
        let roles: Vec<_> = scene.quads.iter().map(|q| q.role).collect();
        // slot 0 is empty, so no lap panel is drawn
        assert_eq!(
            roles,
            vec![
                PanelRole::Fan(0),
                PanelRole::Fan(1),
                PanelRole::Thumbnail,
                PanelRole::Thumbnail,
                PanelRole::Thumbnail,
            ]
        );
        assert_eq!(scene.quads[0].monitor, MonitorId(1));
        assert_eq!(scene.quads[1].monitor, MonitorId(2));
    }

    #[test]
    fn fan_angle_includes_screen_offset() {
        let params = LayoutParams::default();
        let registry = registry(2);
        let mut stack = FocusStack::new(7);
        stack.select(MonitorId(0));
        stack.push();
        stack.select(MonitorId(1));
        stack.push();
        stack.select(MonitorId(1));
        // fan holds slot 1 (monitor 1) at position 0 and slot 2 (monitor 0) at position 1

        let scene = params.layout(&stack, &registry, (3840, 1080), 15.0, None);
        let fan1 = scene
            .quads
            .iter()
            .find(|q| q.role == PanelRole::Fan(1))
            .unwrap();
        let centre = fan1.model.transform_point3(Vec3::ZERO);
        let expected_angle = (-20.0f32 + 15.0).to_radians();
        let radius = params.arc_radius();
        assert!((centre.x - (-radius) * expected_angle.sin()).abs() < EPS);
        assert!((centre.z - (-radius) * expected_angle.cos()).abs() < EPS);
    }

    #[test]
    fn lap_panel_tilts_by_aspect() {
        let params = LayoutParams::default();
        let registry = registry(1);
        let mut stack = FocusStack::new(7);
        stack.select(MonitorId(0));
        let scene = params.layout(&stack, &registry, (1920, 1080), 0.0, None);
        let lap = scene.quads.iter().find(|q| q.role == PanelRole::Lap).unwrap();
        let centre = lap.model.transform_point3(Vec3::ZERO);
        let tilt = (-20.0f32 * 1080.0 / 1920.0).to_radians();
        let radius = params.arc_radius();
        // rotation about X moves the centre below the horizon
        assert!((centre.y - radius * tilt.sin()).abs() < EPS);
        assert!(centre.y < 0.0);
        let corner = lap.model.transform_point3(Vec3::new(0.5, 0.5, 0.0));
        assert!((corner.x - 1.5).abs() < EPS);
    }

    #[test]
    fn center_marker_covers_surface_centre() {
        let marker = CenterMarker::new(4.0);
        let transform = marker.transform(1920, 1080);
        let centre = transform.transform_point3(Vec3::ZERO);
        assert!(centre.x.abs() < EPS);
        assert!(centre.y.abs() < EPS);
        let corner = transform.transform_point3(Vec3::new(0.5, 0.5, 0.0));
        assert!((corner.x - 8.0 / 1920.0).abs() < EPS);
    }
}
