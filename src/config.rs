// config.rs — 运行时配置 (相机限制 / 热点 / 光标 / 过渡)
//
// Built once at startup and handed to each component by reference. JSON keys
// are camelCase; every field has a default so partial files are fine.

use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::error::{Result, TourError};
use crate::transition::TransitionKind;
use crate::tween::Ease;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TourConfig {
    pub controls: ControlsConfig,
    pub hotspot: HotspotConfig,
    pub cursor: CursorConfig,
    pub infospot: InfospotConfig,
    pub transition: TransitionConfig,
    pub animation: AnimationConfig,
    pub camera: CameraConfig,
    pub pointer: PointerConfig,
    pub render: RenderConfig,
    pub panorama: PanoramaConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlsConfig {
    pub third_person: RigLimits,
    pub first_person: RigLimits,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            third_person: RigLimits::third_person(),
            first_person: RigLimits::first_person(),
        }
    }
}

/// Angles in degrees. `None` azimuth bounds mean unbounded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RigLimits {
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub min_azimuth_angle: Option<f32>,
    pub max_azimuth_angle: Option<f32>,
    pub min_zoom: f32,
    pub max_zoom: f32,
    pub default_zoom: f32,
    pub near: f32,
    pub polar_rotate_speed: f32,
    pub azimuth_rotate_speed: f32,
}

impl RigLimits {
    pub fn third_person() -> Self {
        Self {
            min_polar_angle: 0.0,
            max_polar_angle: 88.0,
            min_azimuth_angle: None,
            max_azimuth_angle: None,
            min_zoom: 2.25,
            max_zoom: 10.0,
            default_zoom: 2.5,
            near: 0.5,
            polar_rotate_speed: 1.0,
            azimuth_rotate_speed: 1.0,
        }
    }

    pub fn first_person() -> Self {
        Self {
            min_polar_angle: 50.0,
            max_polar_angle: 120.0,
            min_azimuth_angle: None,
            max_azimuth_angle: None,
            min_zoom: 0.35,
            max_zoom: 0.8,
            default_zoom: 0.45,
            near: 0.01,
            polar_rotate_speed: 1.0,
            azimuth_rotate_speed: 1.0,
        }
    }

    pub fn clamp_zoom(&self, zoom: f32) -> f32 {
        zoom.clamp(self.min_zoom, self.max_zoom.max(self.min_zoom))
    }

    pub fn clamp_polar(&self, polar_rad: f32) -> f32 {
        let lo = self.min_polar_angle.to_radians();
        let hi = self.max_polar_angle.to_radians().max(lo);
        polar_rad.clamp(lo, hi)
    }

    pub fn clamp_azimuth(&self, azimuth_rad: f32) -> f32 {
        let lo = self.min_azimuth_angle.map_or(f32::NEG_INFINITY, f32::to_radians);
        let hi = self.max_azimuth_angle.map_or(f32::INFINITY, f32::to_radians);
        azimuth_rad.clamp(lo, hi.max(lo))
    }
}

impl Default for RigLimits {
    fn default() -> Self {
        Self::first_person()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HotspotConfig {
    pub opacity: f32,
    pub hover_opacity: f32,
    /// Seconds.
    pub hover_transition_time: f32,
    pub size: f32,
    pub scale: f32,
    /// Marker height above the lowest surface of the model.
    pub height_offset: f32,
}

impl Default for HotspotConfig {
    fn default() -> Self {
        Self {
            opacity: 0.5,
            hover_opacity: 1.0,
            hover_transition_time: 0.3,
            size: 0.4,
            scale: 3.25,
            height_offset: 0.6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CursorConfig {
    pub size: f32,
    /// Hex RGB without `#`, e.g. `"ffffff"`.
    pub color: String,
    pub lerp_factor: f32,
}

impl CursorConfig {
    pub fn rgb(&self) -> [u8; 3] {
        let hex = self.color.trim_start_matches('#');
        match u32::from_str_radix(hex, 16) {
            Ok(v) if hex.len() == 6 => [(v >> 16) as u8, (v >> 8) as u8, v as u8],
            _ => [255, 255, 255],
        }
    }
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            size: 0.1,
            color: "ffffff".to_string(),
            lerp_factor: 0.2,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct InfospotConfig {
    /// Projected depth above which an infospot is treated as occluded.
    pub depth_cutoff: f32,
}

impl Default for InfospotConfig {
    fn default() -> Self {
        Self {
            depth_cutoff: 0.995,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TransitionConfig {
    #[serde(rename = "type")]
    pub kind: TransitionKind,
    /// Milliseconds.
    pub speed: f32,
}

impl TransitionConfig {
    pub fn duration_secs(&self) -> f32 {
        (self.speed / 1000.0).max(0.0)
    }
}

impl Default for TransitionConfig {
    fn default() -> Self {
        Self {
            kind: TransitionKind::None,
            speed: 1000.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnimationConfig {
    pub move_ease: Ease,
    /// Seconds for exterior / floor-plan / interior camera moves.
    pub view_duration: f32,
    /// Seconds for a planar glide inside one room.
    pub glide_duration: f32,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            move_ease: Ease::Power3Out,
            view_duration: 0.3,
            glide_duration: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CameraConfig {
    /// Vertical field of view in degrees.
    pub fov: f32,
    pub far: f32,
    pub portrait_aspect: f32,
    pub landscape_aspect: f32,
}

impl CameraConfig {
    /// Widens the vertical fov when the viewport is narrower than the
    /// reference aspect so horizontal framing is kept.
    pub fn fov_for_viewport(&self, width: f32, height: f32) -> f32 {
        if width <= 0.0 || height <= 0.0 {
            return self.fov;
        }
        let aspect = width / height;
        let reference = if width < height {
            self.portrait_aspect
        } else {
            self.landscape_aspect
        };
        if aspect > reference {
            self.fov
        } else {
            let half_height = (self.fov.to_radians() / 2.0).tan();
            let ratio = aspect / reference;
            ((half_height / ratio).atan() * 2.0).to_degrees()
        }
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: 45.0,
            far: 100.0,
            portrait_aspect: 3.5 / 4.0,
            landscape_aspect: 4.0 / 3.5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PointerConfig {
    /// Pixels a press may travel before it stops counting as a click.
    pub drag_threshold: f32,
    /// Seconds.
    pub double_click_window: f32,
    pub pick_opacity_threshold: f32,
    /// Degrees of rotation per pixel of drag.
    pub rotate_sensitivity: f32,
}

impl Default for PointerConfig {
    fn default() -> Self {
        Self {
            drag_threshold: 5.0,
            double_click_window: 0.25,
            pick_opacity_threshold: 0.2,
            rotate_sensitivity: 0.25,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RenderConfig {
    /// Seconds without activity before redraws stop.
    pub idle_timeout: f32,
    pub ambient_intensity: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            idle_timeout: 3.0,
            ambient_intensity: std::f32::consts::PI,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PanoramaConfig {
    /// Offset from a panorama's position used as its look-at target when the
    /// manifest gives none. Only the direction matters (roughly local +X).
    pub look_offset: [f32; 3],
    pub sphere_radius: f32,
}

impl PanoramaConfig {
    pub fn look_offset(&self) -> Vec3 {
        Vec3::from_array(self.look_offset)
    }
}

impl Default for PanoramaConfig {
    fn default() -> Self {
        Self {
            look_offset: [1.5e-3, 1.0e-8, -1.0e-4],
            sphere_radius: 30.0,
        }
    }
}

/// Override blocks carried in the manifest's `config` object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConfigOverrides {
    pub controls: Option<ControlsOverride>,
    pub hotspot: Option<HotspotConfig>,
    pub cursor: Option<CursorConfig>,
    pub infospot: Option<InfospotConfig>,
    pub transition: Option<TransitionConfig>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControlsOverride {
    pub third_person: Option<RigLimits>,
    pub first_person: Option<RigLimits>,
}

impl TourConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| TourError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| TourError::Json {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Each present block replaces the whole section.
    pub fn apply(&mut self, overrides: &ConfigOverrides) {
        if let Some(controls) = &overrides.controls {
            if let Some(third) = &controls.third_person {
                self.controls.third_person = third.clone();
            }
            if let Some(first) = &controls.first_person {
                self.controls.first_person = first.clone();
            }
        }
        if let Some(hotspot) = &overrides.hotspot {
            self.hotspot = hotspot.clone();
        }
        if let Some(cursor) = &overrides.cursor {
            self.cursor = cursor.clone();
        }
        if let Some(infospot) = &overrides.infospot {
            self.infospot = infospot.clone();
        }
        if let Some(transition) = &overrides.transition {
            self.transition = transition.clone();
        }
    }
}
