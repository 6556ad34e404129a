// manifest.rs — 全景清单 (panoItems.json)

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::config::ConfigOverrides;
use crate::error::{Result, TourError};

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3Def {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Point3Def> for Vec3 {
    fn from(p: Point3Def) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

impl From<Vec3> for Point3Def {
    fn from(v: Vec3) -> Self {
        Self { x: v.x, y: v.y, z: v.z }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PanoramaEntry {
    pub name: String,
    pub texture_map: String,
    #[serde(default)]
    pub depth_map: Option<String>,
    #[serde(default)]
    pub visible_hotspots: Vec<String>,
    #[serde(default)]
    pub visible_infospots: Vec<String>,
    #[serde(default)]
    pub position: Option<Point3Def>,
    #[serde(default)]
    pub target: Option<Point3Def>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InfospotEntry {
    pub name: String,
    pub position: Point3Def,
    #[serde(default)]
    pub bubble_text: String,
}

/// Stand-in for a model node: only its name and world position matter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    pub position: Point3Def,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurfaceEntry {
    pub name: String,
    pub vertices: Vec<[f32; 3]>,
    pub indices: Vec<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Point3Def,
    pub target: Point3Def,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InteriorEntry {
    pub position: Point3Def,
    pub target: Point3Def,
    /// Optional backdrop shown as soon as the view is entered.
    #[serde(default)]
    pub texture_map: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Views {
    pub outside: CameraPose,
    pub floor_plan: CameraPose,
    // BTreeMap keeps the menu order stable
    pub interiors: std::collections::BTreeMap<String, InteriorEntry>,
}

impl Default for Views {
    fn default() -> Self {
        Self {
            outside: CameraPose {
                position: Vec3::new(0.0, 0.4189, 12.0).into(),
                target: Point3Def::default(),
            },
            floor_plan: CameraPose {
                position: Vec3::new(0.0315, 12.007, 1.0e-6).into(),
                target: Point3Def::default(),
            },
            interiors: Default::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextureEntry {
    pub texture_map: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    #[serde(default)]
    pub model: Option<String>,
    pub start_point: String,
    #[serde(default)]
    pub hotspots: Vec<PanoramaEntry>,
    #[serde(default)]
    pub infospots: Vec<InfospotEntry>,
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub surfaces: Vec<SurfaceEntry>,
    #[serde(default)]
    pub views: Views,
    #[serde(default)]
    pub textures: Vec<TextureEntry>,
    #[serde(default)]
    pub config: ConfigOverrides,
}

pub const OUTSIDE_VIEW: &str = "outside";
pub const FLOOR_PLAN_VIEW: &str = "floorPlan";

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|source| TourError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let manifest: Manifest = serde_json::from_str(&text).map_err(|source| TourError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        manifest.validate()?;
        log::info!(
            "manifest {}: {} panoramas, {} infospots, start {}",
            path.display(),
            manifest.hotspots.len(),
            manifest.infospots.len(),
            manifest.start_point
        );
        Ok(manifest)
    }

    /// Parses and validates an in-memory manifest.
    pub fn parse(text: &str) -> Result<Self> {
        let manifest: Manifest =
            serde_json::from_str(text).map_err(|e| TourError::Manifest(e.to_string()))?;
        manifest.validate()?;
        Ok(manifest)
    }

    pub fn panorama(&self, name: &str) -> Option<&PanoramaEntry> {
        self.hotspots.iter().find(|p| p.name == name)
    }

    pub fn is_view_name(&self, name: &str) -> bool {
        name == OUTSIDE_VIEW
            || name == FLOOR_PLAN_VIEW
            || self.views.interiors.contains_key(name)
            || self.panorama(name).is_some()
    }

    pub fn validate(&self) -> Result<()> {
        let mut names = HashSet::new();
        for pano in &self.hotspots {
            if !names.insert(pano.name.as_str()) {
                return Err(TourError::Manifest(format!(
                    "duplicate panorama {:?}",
                    pano.name
                )));
            }
        }
        let infospots: HashSet<&str> = self.infospots.iter().map(|i| i.name.as_str()).collect();
        let nodes: HashSet<&str> = self.nodes.iter().map(|n| n.name.as_str()).collect();

        if self.start_point.is_empty() {
            return Err(TourError::Manifest("missing startPoint".into()));
        }
        if !self.is_view_name(&self.start_point) {
            return Err(TourError::Manifest(format!(
                "startPoint {:?} names no panorama or view",
                self.start_point
            )));
        }
        for pano in &self.hotspots {
            if pano.position.is_none() && !nodes.contains(pano.name.as_str()) {
                return Err(TourError::Manifest(format!(
                    "panorama {:?} has no position and no matching node",
                    pano.name
                )));
            }
            if let Some(bad) = pano.visible_hotspots.iter().find(|h| !names.contains(h.as_str())) {
                return Err(TourError::Manifest(format!(
                    "panorama {:?} lists unknown hotspot {:?}",
                    pano.name, bad
                )));
            }
            if let Some(bad) = pano
                .visible_infospots
                .iter()
                .find(|i| !infospots.contains(i.as_str()))
            {
                return Err(TourError::Manifest(format!(
                    "panorama {:?} lists unknown infospot {:?}",
                    pano.name, bad
                )));
            }
        }
        for surface in &self.surfaces {
            let n = surface.vertices.len() as u32;
            if surface.indices.len() % 3 != 0 || surface.indices.iter().any(|&i| i >= n) {
                return Err(TourError::Manifest(format!(
                    "surface {:?} has malformed indices",
                    surface.name
                )));
            }
        }
        Ok(())
    }

    /// Every image the tour may ask the cache for, in load order.
    pub fn texture_names(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let panoramas = self.hotspots.iter().flat_map(|p| {
            std::iter::once(p.texture_map.as_str()).chain(p.depth_map.as_deref())
        });
        let interiors = self
            .views
            .interiors
            .values()
            .filter_map(|v| v.texture_map.as_deref());
        let extras = self.textures.iter().map(|t| t.texture_map.as_str());
        panoramas
            .chain(interiors)
            .chain(extras)
            .filter(|name| !name.is_empty() && seen.insert(*name))
            .collect()
    }
}
