// rig.rs — 相机支架 (第三人称轨道 / 第一人称环视)

use glam::{Mat4, Vec3};

use crate::config::{CameraConfig, RigLimits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RigProfile {
    ThirdPerson,
    FirstPerson,
}

/// What the tour needs from a camera controller. The rig owns damping and
/// user input limits; the tour only orchestrates.
pub trait CameraRig {
    fn position(&self) -> Vec3;
    fn target(&self) -> Vec3;
    fn set_look_at(&mut self, eye: Vec3, target: Vec3);
    /// Moves the camera to `position` keeping the current look direction.
    fn move_to(&mut self, position: Vec3);
    fn set_third_person(&mut self, limits: &RigLimits);
    fn set_first_person(&mut self, limits: &RigLimits);
    fn zoom_to(&mut self, zoom: f32);
    fn set_enabled(&mut self, enabled: bool);
}

/// A rig the tour can also look through and steer from pointer input.
pub trait ViewRig: CameraRig {
    fn view_proj(&self) -> Mat4;
    fn fov(&self) -> f32;
    fn resize(&mut self, width: f32, height: f32, camera: &CameraConfig);
    fn rotate(&mut self, d_azimuth: f32, d_polar: f32);
    fn zoom_by(&mut self, delta: f32);
}

/// Minimum eye-target distance used to keep a look direction well defined.
const MIN_LOOK_DISTANCE: f32 = 1.0e-4;

#[derive(Debug, Clone)]
pub struct OrbitRig {
    eye: Vec3,
    target: Vec3,
    zoom: f32,
    profile: RigProfile,
    limits: RigLimits,
    enabled: bool,
    fov_deg: f32,
    aspect: f32,
    far: f32,
}

impl OrbitRig {
    pub fn new(camera: &CameraConfig, limits: &RigLimits) -> Self {
        Self {
            eye: Vec3::new(0.0, 0.42, 12.0),
            target: Vec3::ZERO,
            zoom: limits.default_zoom,
            profile: RigProfile::ThirdPerson,
            limits: limits.clone(),
            enabled: true,
            fov_deg: camera.fov,
            aspect: 16.0 / 9.0,
            far: camera.far,
        }
    }

    pub fn profile(&self) -> RigProfile {
        self.profile
    }

    pub fn zoom(&self) -> f32 {
        self.zoom
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn fov(&self) -> f32 {
        self.fov_deg
    }

    pub fn resize(&mut self, width: f32, height: f32, camera: &CameraConfig) {
        if width > 0.0 && height > 0.0 {
            self.aspect = width / height;
            self.fov_deg = camera.fov_for_viewport(width, height);
        }
    }

    fn look_direction(&self) -> Vec3 {
        (self.target - self.eye).normalize_or(Vec3::X)
    }

    /// Effective vertical fov after zoom, in radians.
    pub fn effective_fov(&self) -> f32 {
        let half = (self.fov_deg.to_radians() / 2.0).tan() / self.zoom.max(1.0e-3);
        2.0 * half.atan()
    }

    pub fn view(&self) -> Mat4 {
        let dir = self.look_direction();
        let up = if dir.dot(Vec3::Y).abs() > 0.9999 { Vec3::Z } else { Vec3::Y };
        Mat4::look_to_rh(self.eye, dir, up)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh_gl(self.effective_fov(), self.aspect, self.limits.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        self.projection() * self.view()
    }

    /// Drag rotation in radians. Third person orbits the eye around the
    /// target; first person turns the view around the eye.
    pub fn rotate(&mut self, d_azimuth: f32, d_polar: f32) {
        if !self.enabled {
            return;
        }
        let d_azimuth = d_azimuth * self.limits.azimuth_rotate_speed;
        let d_polar = d_polar * self.limits.polar_rotate_speed;
        match self.profile {
            RigProfile::ThirdPerson => {
                let offset = self.eye - self.target;
                let rotated = self.rotate_offset(offset, d_azimuth, d_polar);
                self.eye = self.target + rotated;
            }
            RigProfile::FirstPerson => {
                let offset = self.target - self.eye;
                let rotated = self.rotate_offset(offset, d_azimuth, d_polar);
                self.target = self.eye + rotated;
            }
        }
    }

    fn rotate_offset(&self, offset: Vec3, d_azimuth: f32, d_polar: f32) -> Vec3 {
        let radius = offset.length().max(MIN_LOOK_DISTANCE);
        let polar = (offset.y / radius).clamp(-1.0, 1.0).acos();
        let azimuth = offset.x.atan2(offset.z);
        let polar = self.limits.clamp_polar(polar + d_polar);
        let azimuth = self.limits.clamp_azimuth(azimuth + d_azimuth);
        Vec3::new(
            radius * polar.sin() * azimuth.sin(),
            radius * polar.cos(),
            radius * polar.sin() * azimuth.cos(),
        )
    }

    pub fn zoom_by(&mut self, delta: f32) {
        if self.enabled {
            self.zoom = self.limits.clamp_zoom(self.zoom + delta);
        }
    }
}

impl CameraRig for OrbitRig {
    fn position(&self) -> Vec3 {
        self.eye
    }

    fn target(&self) -> Vec3 {
        self.target
    }

    fn set_look_at(&mut self, eye: Vec3, target: Vec3) {
        self.eye = eye;
        self.target = if eye.distance(target) < MIN_LOOK_DISTANCE {
            eye + Vec3::X * MIN_LOOK_DISTANCE
        } else {
            target
        };
    }

    fn move_to(&mut self, position: Vec3) {
        let offset = self.target - self.eye;
        self.eye = position;
        self.target = position + offset;
    }

    fn set_third_person(&mut self, limits: &RigLimits) {
        self.profile = RigProfile::ThirdPerson;
        self.limits = limits.clone();
        self.zoom = limits.clamp_zoom(self.zoom);
    }

    fn set_first_person(&mut self, limits: &RigLimits) {
        self.profile = RigProfile::FirstPerson;
        self.limits = limits.clone();
        self.zoom = limits.clamp_zoom(self.zoom);
    }

    fn zoom_to(&mut self, zoom: f32) {
        self.zoom = self.limits.clamp_zoom(zoom);
    }

    fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }
}

impl ViewRig for OrbitRig {
    fn view_proj(&self) -> Mat4 {
        OrbitRig::view_proj(self)
    }

    fn fov(&self) -> f32 {
        OrbitRig::fov(self)
    }

    fn resize(&mut self, width: f32, height: f32, camera: &CameraConfig) {
        OrbitRig::resize(self, width, height, camera)
    }

    fn rotate(&mut self, d_azimuth: f32, d_polar: f32) {
        OrbitRig::rotate(self, d_azimuth, d_polar)
    }

    fn zoom_by(&mut self, delta: f32) {
        OrbitRig::zoom_by(self, delta)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rig() -> OrbitRig {
        OrbitRig::new(&CameraConfig::default(), &RigLimits::third_person())
    }

    #[test]
    fn move_to_keeps_look_direction() {
        let mut rig = rig();
        rig.set_look_at(Vec3::new(1.0, 1.0, 1.0), Vec3::new(2.0, 1.0, 1.0));
        rig.move_to(Vec3::new(5.0, 0.0, -3.0));
        assert_eq!(rig.position(), Vec3::new(5.0, 0.0, -3.0));
        assert_eq!(rig.target(), Vec3::new(6.0, 0.0, -3.0));
    }

    #[test]
    fn degenerate_look_at_gets_a_direction() {
        let mut rig = rig();
        rig.set_look_at(Vec3::ONE, Vec3::ONE);
        assert!(rig.target().distance(rig.position()) > 0.0);
        assert!(rig.view().is_finite());
    }

    #[test]
    fn zoom_respects_active_profile() {
        let mut rig = rig();
        rig.set_first_person(&RigLimits::first_person());
        assert_eq!(rig.profile(), RigProfile::FirstPerson);
        rig.zoom_to(3.0);
        assert_eq!(rig.zoom(), 0.8);
        rig.set_third_person(&RigLimits::third_person());
        assert_eq!(rig.zoom(), 2.25);
    }

    #[test]
    fn orbit_keeps_distance_and_clamps_polar() {
        let mut rig = rig();
        rig.set_look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        rig.rotate(0.5, -3.0);
        assert!((rig.position().length() - 10.0).abs() < 1e-3);
        // 88° max polar from +Y, rotating "up" clamps at 0°
        assert!(rig.position().y > 9.9);
    }

    #[test]
    fn first_person_turns_target_around_eye() {
        let mut rig = rig();
        rig.set_first_person(&RigLimits::first_person());
        rig.set_look_at(Vec3::new(1.0, 1.6, 0.0), Vec3::new(2.0, 1.6, 0.0));
        rig.rotate(std::f32::consts::FRAC_PI_2, 0.0);
        assert_eq!(rig.position(), Vec3::new(1.0, 1.6, 0.0));
        assert!((rig.target().distance(rig.position()) - 1.0).abs() < 1e-4);
        assert!(rig.target().x < 1.5);
    }

    #[test]
    fn disabled_rig_ignores_input() {
        let mut rig = rig();
        rig.set_look_at(Vec3::new(0.0, 0.0, 10.0), Vec3::ZERO);
        rig.set_enabled(false);
        rig.rotate(1.0, 0.0);
        rig.zoom_by(5.0);
        assert_eq!(rig.position(), Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(rig.zoom(), 2.5);
    }
}
