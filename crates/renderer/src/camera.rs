//! Head orientation bookkeeping and the per-frame camera transform.
//!
//! Angles are degrees everywhere outside this module's trigonometry. Raw
//! angles come straight from the sensor; `align` stores their negation as an
//! offset so the aligning pose reads as zero afterwards.

use glam::{Mat4, Vec3};

pub const NEAR_PLANE: f32 = 0.1;
pub const FAR_PLANE: f32 = 100.0;

/// Sensor-reported head angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RawPose {
    pub roll: f32,
    pub pitch: f32,
    pub yaw: f32,
}

impl RawPose {
    pub fn new(roll: f32, pitch: f32, yaw: f32) -> Self {
        Self { roll, pitch, yaw }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrientationState {
    raw: RawPose,
    offset: RawPose,
    fov: f32,
}

impl OrientationState {
    pub fn new(fov: f32) -> Self {
        Self {
            raw: RawPose::default(),
            offset: RawPose::default(),
            fov,
        }
    }

    pub fn update(&mut self, pose: RawPose) {
        self.raw = pose;
    }

    pub fn raw(&self) -> RawPose {
        self.raw
    }

    pub fn offset(&self) -> RawPose {
        self.offset
    }

    /// Makes the current raw pose the neutral orientation.
    pub fn align(&mut self) {
        self.offset = RawPose {
            roll: -self.raw.roll,
            pitch: -self.raw.pitch,
            yaw: -self.raw.yaw,
        };
    }

    pub fn effective(&self) -> RawPose {
        RawPose {
            roll: self.raw.roll + self.offset.roll,
            pitch: self.raw.pitch + self.offset.pitch,
            yaw: self.raw.yaw + self.offset.yaw,
        }
    }

    pub fn fov(&self) -> f32 {
        self.fov
    }

    /// Scales the vertical field of view. No clamping is applied.
    pub fn zoom(&mut self, factor: f32) {
        self.fov *= factor;
    }

    /// Unit view direction from effective pitch and yaw. Roll does not
    /// contribute; it only rolls the rendered scene.
    pub fn look_vector(&self) -> Vec3 {
        let pose = self.effective();
        let pitch = pose.pitch.to_radians();
        let yaw = pose.yaw.to_radians();
        Vec3::new(
            yaw.sin() * -pitch.cos(),
            -pitch.sin(),
            -yaw.cos() * pitch.cos(),
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

/// View and projection for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraTransform {
    pub eye: Vec3,
    pub look: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl CameraTransform {
    pub fn compute(orientation: &OrientationState, eye: Vec3, aspect: f32) -> Self {
        let look = orientation.look_vector();
        let roll = orientation.effective().roll.to_radians();
        let view = Mat4::look_at_rh(eye, eye + look, Vec3::Y) * Mat4::from_rotation_z(roll);
        let projection = Mat4::perspective_rh(
            orientation.fov().to_radians(),
            aspect.max(f32::EPSILON),
            NEAR_PLANE,
            FAR_PLANE,
        );
        Self {
            eye,
            look,
            view,
            projection,
        }
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }

    pub fn gaze_ray(&self) -> Ray {
        Ray {
            origin: self.eye,
            direction: self.look,
        }
    }
}
