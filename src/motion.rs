// motion.rs — 相机运动插值
//
// The controller only knows how to place the camera for a given progress.
// Time lives in the shared `Timeline` owned by the view state machine.

use glam::Vec3;

use crate::rig::CameraRig;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionProfile {
    /// Eye and target interpolated independently; orientation is re-derived
    /// from the pair each tick (dolly + pan).
    LookAtBlend {
        from_eye: Vec3,
        from_target: Vec3,
        to_eye: Vec3,
        to_target: Vec3,
    },
    /// Position only; the rig keeps its own look direction.
    Glide { from: Vec3, to: Vec3 },
}

impl MotionProfile {
    pub fn look_at_blend(rig: &dyn CameraRig, to_eye: Vec3, to_target: Vec3) -> Self {
        MotionProfile::LookAtBlend {
            from_eye: rig.position(),
            from_target: rig.target(),
            to_eye,
            to_target,
        }
    }

    pub fn glide(rig: &dyn CameraRig, to: Vec3) -> Self {
        MotionProfile::Glide {
            from: rig.position(),
            to,
        }
    }

    /// Lateral move inside a room: framing height stays where it is.
    pub fn planar_glide(rig: &dyn CameraRig, x: f32, z: f32) -> Self {
        let from = rig.position();
        MotionProfile::Glide {
            from,
            to: Vec3::new(x, from.y, z),
        }
    }

    pub fn apply(&self, t: f32, rig: &mut dyn CameraRig) {
        let t = t.clamp(0.0, 1.0);
        match *self {
            MotionProfile::LookAtBlend {
                from_eye,
                from_target,
                to_eye,
                to_target,
            } => rig.set_look_at(from_eye.lerp(to_eye, t), from_target.lerp(to_target, t)),
            MotionProfile::Glide { from, to } => rig.move_to(from.lerp(to, t)),
        }
    }
}

#[derive(Debug, Default)]
pub struct MotionController {
    motion: Option<MotionProfile>,
    progress: f32,
}

impl MotionController {
    /// Rejected while another motion is in flight.
    pub fn start(&mut self, profile: MotionProfile) -> bool {
        if self.motion.is_some() {
            return false;
        }
        self.motion = Some(profile);
        self.progress = 0.0;
        true
    }

    pub fn update(&mut self, eased: f32, rig: &mut dyn CameraRig) {
        if let Some(motion) = &self.motion {
            self.progress = eased.clamp(0.0, 1.0);
            motion.apply(self.progress, rig);
        }
    }

    /// Lands the camera on the destination and returns to idle. Returns
    /// `false` when there was nothing to finish.
    pub fn finish(&mut self, rig: &mut dyn CameraRig) -> bool {
        let Some(motion) = self.motion.take() else {
            self.progress = 0.0;
            return false;
        };
        motion.apply(1.0, rig);
        self.progress = 0.0;
        true
    }

    pub fn is_active(&self) -> bool {
        self.motion.is_some()
    }

    pub fn progress(&self) -> f32 {
        self.progress
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{CameraConfig, RigLimits};
    use crate::rig::OrbitRig;

    fn rig_at(eye: Vec3, target: Vec3) -> OrbitRig {
        let mut rig = OrbitRig::new(&CameraConfig::default(), &RigLimits::third_person());
        rig.set_look_at(eye, target);
        rig
    }

    #[test]
    fn look_at_blend_interpolates_eye_and_target_separately() {
        let mut rig = rig_at(Vec3::ZERO, Vec3::X);
        let profile = MotionProfile::look_at_blend(&rig, Vec3::new(10.0, 0.0, 0.0), Vec3::new(10.0, 0.0, 5.0));
        profile.apply(0.5, &mut rig);
        assert_eq!(rig.position(), Vec3::new(5.0, 0.0, 0.0));
        assert_eq!(rig.target(), Vec3::new(5.5, 0.0, 2.5));
    }

    #[test]
    fn planar_glide_keeps_height_and_direction() {
        let mut rig = rig_at(Vec3::new(0.0, 1.6, 0.0), Vec3::new(1.0, 1.6, 0.0));
        let profile = MotionProfile::planar_glide(&rig, 4.0, -2.0);
        profile.apply(1.0, &mut rig);
        assert_eq!(rig.position(), Vec3::new(4.0, 1.6, -2.0));
        assert_eq!(rig.target(), Vec3::new(5.0, 1.6, -2.0));
    }

    #[test]
    fn progress_is_clamped() {
        let mut rig = rig_at(Vec3::ZERO, Vec3::X);
        let mut controller = MotionController::default();
        assert!(controller.start(MotionProfile::glide(&rig, Vec3::new(2.0, 0.0, 0.0))));
        controller.update(3.0, &mut rig);
        assert_eq!(controller.progress(), 1.0);
        assert_eq!(rig.position(), Vec3::new(2.0, 0.0, 0.0));
        controller.update(-1.0, &mut rig);
        assert_eq!(rig.position(), Vec3::ZERO);
    }

    #[test]
    fn second_start_is_rejected_and_finish_runs_once() {
        let mut rig = rig_at(Vec3::ZERO, Vec3::X);
        let mut controller = MotionController::default();
        assert!(controller.start(MotionProfile::glide(&rig, Vec3::new(2.0, 0.0, 0.0))));
        assert!(!controller.start(MotionProfile::glide(&rig, Vec3::new(-9.0, 0.0, 0.0))));
        controller.update(0.25, &mut rig);
        assert!(controller.finish(&mut rig));
        assert_eq!(rig.position(), Vec3::new(2.0, 0.0, 0.0));
        assert_eq!(controller.progress(), 0.0);
        assert!(!controller.finish(&mut rig));
        assert!(!controller.is_active());
    }
}
