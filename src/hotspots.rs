// hotspots.rs — 全景点 / 热点 / 信息点
//
// Panorama items are built once from the manifest. Each one owns a
// `Hotspot_<name>` marker on the floor under it; infospots become
// `Infospot_<name>` nodes. Visibility of both follows the current panorama.

use std::collections::HashMap;

use glam::{Mat4, Vec2, Vec3};

use crate::config::TourConfig;
use crate::manifest::Manifest;
use crate::scene::{Mesh, NodeKind, SceneDirectory, SceneNode, HOTSPOT_PREFIX, INFOSPOT_PREFIX};

#[derive(Debug, Clone, PartialEq)]
pub struct PanoramaItem {
    pub name: String,
    pub texture: String,
    pub depth_texture: Option<String>,
    pub visible_hotspots: Vec<String>,
    pub visible_infospots: Vec<String>,
    position: Option<Vec3>,
    target: Option<Vec3>,
}

impl PanoramaItem {
    /// Explicit position, else the scene node of the same name.
    pub fn resolve_position(&self, scene: &SceneDirectory) -> Option<Vec3> {
        self.position
            .or_else(|| scene.by_name(&self.name).map(|n| n.position))
    }

    pub fn resolve_target(&self, scene: &SceneDirectory, look_offset: Vec3) -> Option<Vec3> {
        match self.target {
            Some(t) => Some(t),
            None => self.resolve_position(scene).map(|p| p + look_offset),
        }
    }
}

pub fn hotspot_node_name(panorama: &str) -> String {
    format!("{HOTSPOT_PREFIX}{panorama}")
}

pub fn infospot_node_name(infospot: &str) -> String {
    format!("{INFOSPOT_PREFIX}{infospot}")
}

#[derive(Debug, Clone, PartialEq)]
pub struct InfospotLabel {
    pub name: String,
    pub text: String,
    pub screen: Vec2,
    pub depth: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HotspotMarker {
    pub panorama: String,
    pub screen: Vec2,
    pub opacity: f32,
    /// Rough on-screen radius in pixels.
    pub radius: f32,
}

#[derive(Debug, Default)]
pub struct PanoramaSet {
    items: Vec<PanoramaItem>,
    index: HashMap<String, usize>,
}

impl PanoramaSet {
    /// Adds anchors, surfaces, hotspot markers and infospots to `scene`.
    /// Everything marker-like starts hidden; the first view change decides.
    pub fn build(manifest: &Manifest, scene: &mut SceneDirectory, config: &TourConfig) -> Self {
        for node in &manifest.nodes {
            scene.insert(SceneNode::new(&node.name, NodeKind::Anchor, node.position.into()));
        }
        for surface in &manifest.surfaces {
            let mesh = Mesh {
                vertices: surface.vertices.iter().map(|v| Vec3::from_array(*v)).collect(),
                indices: surface.indices.clone(),
            };
            scene.insert(SceneNode::new(&surface.name, NodeKind::Surface, Vec3::ZERO).with_mesh(mesh));
        }

        let mut set = PanoramaSet::default();
        for entry in &manifest.hotspots {
            let item = PanoramaItem {
                name: entry.name.clone(),
                texture: entry.texture_map.clone(),
                depth_texture: entry.depth_map.clone(),
                visible_hotspots: entry.visible_hotspots.clone(),
                visible_infospots: entry.visible_infospots.clone(),
                position: entry.position.map(Vec3::from),
                target: entry.target.map(Vec3::from),
            };
            set.index.insert(item.name.clone(), set.items.len());
            set.items.push(item);
        }

        let floor = scene.floor_level().unwrap_or(0.0);
        let half_extent = config.hotspot.size * config.hotspot.scale / 2.0;
        for item in &set.items {
            let Some(pos) = item.resolve_position(scene) else {
                log::warn!("panorama {} has no position; no hotspot marker", item.name);
                continue;
            };
            let center = Vec3::new(pos.x, floor + config.hotspot.height_offset, pos.z);
            let mut node = SceneNode::new(
                hotspot_node_name(&item.name),
                NodeKind::Hotspot {
                    panorama: item.name.clone(),
                },
                center,
            )
            .with_mesh(Mesh::quad(center, half_extent, Vec3::Y))
            .with_opacity(config.hotspot.opacity);
            node.visible = false;
            scene.insert(node);
        }

        for info in &manifest.infospots {
            let mut node = SceneNode::new(
                infospot_node_name(&info.name),
                NodeKind::Infospot {
                    bubble_text: info.bubble_text.clone(),
                },
                info.position.into(),
            );
            node.visible = false;
            scene.insert(node);
        }

        log::debug!(
            "built {} panoramas, {} infospots, floor at {:.3}",
            set.items.len(),
            manifest.infospots.len(),
            floor
        );
        set
    }

    pub fn get(&self, name: &str) -> Option<&PanoramaItem> {
        self.index.get(name).map(|&i| &self.items[i])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(|p| p.name.as_str())
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn hide_all(scene: &mut SceneDirectory) {
        scene.traverse_mut(|_, node| {
            if node.is_hotspot() || node.is_infospot() {
                node.visible = false;
            }
        });
    }

    /// Hide every hotspot and infospot, then show the lists of `panorama`.
    /// Unknown names leave everything hidden.
    pub fn apply_visibility(&self, scene: &mut SceneDirectory, panorama: &str) {
        Self::hide_all(scene);
        let Some(item) = self.get(panorama) else {
            return;
        };
        for name in &item.visible_hotspots {
            if let Some(id) = scene.id(&hotspot_node_name(name)) {
                if let Some(node) = scene.get_mut(id) {
                    node.visible = true;
                }
            }
        }
        for name in &item.visible_infospots {
            if let Some(id) = scene.id(&infospot_node_name(name)) {
                if let Some(node) = scene.get_mut(id) {
                    node.visible = true;
                }
            }
        }
    }
}

/// World point to pixel coordinates plus NDC depth in `[-1, 1]`.
pub fn project_to_screen(view_proj: Mat4, point: Vec3, viewport: Vec2) -> Option<(Vec2, f32)> {
    let clip = view_proj * point.extend(1.0);
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate() / clip.w;
    let screen = Vec2::new(
        (ndc.x * 0.5 + 0.5) * viewport.x,
        (-ndc.y * 0.5 + 0.5) * viewport.y,
    );
    Some((screen, ndc.z))
}

/// Visible infospots in front of the camera, nearest first.
pub fn project_infospots(
    scene: &SceneDirectory,
    view_proj: Mat4,
    viewport: Vec2,
    depth_cutoff: f32,
) -> Vec<InfospotLabel> {
    let mut labels: Vec<InfospotLabel> = scene
        .iter()
        .filter(|(_, n)| n.visible)
        .filter_map(|(_, node)| {
            let NodeKind::Infospot { bubble_text } = &node.kind else {
                return None;
            };
            let (screen, depth) = project_to_screen(view_proj, node.position, viewport)?;
            if depth >= depth_cutoff {
                return None;
            }
            Some(InfospotLabel {
                name: node
                    .name
                    .strip_prefix(INFOSPOT_PREFIX)
                    .unwrap_or(&node.name)
                    .to_string(),
                text: bubble_text.clone(),
                screen,
                depth,
            })
        })
        .collect();
    labels.sort_by(|a, b| a.depth.total_cmp(&b.depth));
    labels
}

pub fn project_hotspots(
    scene: &SceneDirectory,
    view_proj: Mat4,
    viewport: Vec2,
) -> Vec<HotspotMarker> {
    scene
        .hotspots()
        .filter(|(_, n)| n.visible)
        .filter_map(|(_, node)| {
            let panorama = node.hotspot_panorama()?.to_string();
            let (screen, depth) = project_to_screen(view_proj, node.position, viewport)?;
            if !(-1.0..=1.0).contains(&depth) {
                return None;
            }
            // radius from the projected edge of the marker quad
            let edge = node
                .mesh
                .as_ref()
                .and_then(|m| m.vertices.first().copied())
                .and_then(|v| project_to_screen(view_proj, v, viewport))
                .map_or(8.0, |(s, _)| s.distance(screen));
            Some(HotspotMarker {
                panorama,
                screen,
                opacity: node.opacity,
                radius: edge,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn three_room_manifest() -> Manifest {
        Manifest::parse(
            r#"{
            "startPoint": "a",
            "hotspots": [
                { "name": "a", "textureMap": "a.jpg", "visibleHotspots": ["b", "c"],
                  "visibleInfospots": ["sofa"], "position": {"x": 0, "y": 1.6, "z": 0} },
                { "name": "b", "textureMap": "b.jpg", "visibleHotspots": ["a"],
                  "visibleInfospots": ["sofa", "lamp"], "position": {"x": 4, "y": 1.6, "z": 0} },
                { "name": "c", "textureMap": "c.jpg", "visibleHotspots": [],
                  "visibleInfospots": [] }
            ],
            "nodes": [ { "name": "c", "position": {"x": 0, "y": 1.6, "z": -5} } ],
            "infospots": [
                { "name": "sofa", "position": {"x": 1, "y": 0.5, "z": 1}, "bubbleText": "Sofa" },
                { "name": "lamp", "position": {"x": 3, "y": 1.5, "z": 1}, "bubbleText": "Lamp" }
            ],
            "surfaces": [ { "name": "Floor", "vertices": [[-9,0.1,-9],[9,0.1,-9],[9,0.1,9],[-9,0.1,9]],
                            "indices": [0,1,2,0,2,3] } ]
        }"#,
        )
        .unwrap()
    }

    fn visible_names(scene: &SceneDirectory) -> Vec<String> {
        let mut names: Vec<String> = scene
            .iter()
            .filter(|(_, n)| n.visible && (n.is_hotspot() || n.is_infospot()))
            .map(|(_, n)| n.name.clone())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn markers_sit_above_the_floor() {
        let mut scene = SceneDirectory::new();
        let cfg = TourConfig::default();
        let set = PanoramaSet::build(&three_room_manifest(), &mut scene, &cfg);
        assert_eq!(set.len(), 3);
        let marker = scene.by_name("Hotspot_b").unwrap();
        assert!((marker.position.y - 0.7).abs() < 1e-5);
        assert_eq!(marker.position.x, 4.0);
        assert_eq!(marker.opacity, 0.5);
        assert!(!marker.visible);
        // node-derived position
        assert_eq!(scene.by_name("Hotspot_c").unwrap().position.z, -5.0);
    }

    #[test]
    fn visibility_partitions_per_panorama() {
        let mut scene = SceneDirectory::new();
        let set = PanoramaSet::build(&three_room_manifest(), &mut scene, &TourConfig::default());

        set.apply_visibility(&mut scene, "a");
        assert_eq!(
            visible_names(&scene),
            vec!["Hotspot_b", "Hotspot_c", "Infospot_sofa"]
        );
        set.apply_visibility(&mut scene, "b");
        assert_eq!(
            visible_names(&scene),
            vec!["Hotspot_a", "Infospot_lamp", "Infospot_sofa"]
        );
        set.apply_visibility(&mut scene, "c");
        assert!(visible_names(&scene).is_empty());
        set.apply_visibility(&mut scene, "a");
        set.apply_visibility(&mut scene, "nowhere");
        assert!(visible_names(&scene).is_empty());
    }

    #[test]
    fn target_defaults_to_offset_from_position() {
        let mut scene = SceneDirectory::new();
        let set = PanoramaSet::build(&three_room_manifest(), &mut scene, &TourConfig::default());
        let offset = Vec3::new(0.01, 0.0, 0.0);
        let c = set.get("c").unwrap();
        assert_eq!(c.resolve_target(&scene, offset), Some(Vec3::new(0.01, 1.6, -5.0)));
    }

    #[test]
    fn infospots_behind_or_too_deep_are_dropped() {
        let mut scene = SceneDirectory::new();
        let set = PanoramaSet::build(&three_room_manifest(), &mut scene, &TourConfig::default());
        set.apply_visibility(&mut scene, "b");
        let view = Mat4::look_at_rh(Vec3::new(2.0, 1.0, 10.0), Vec3::new(2.0, 1.0, 0.0), Vec3::Y);
        let proj = Mat4::perspective_rh_gl(45f32.to_radians(), 1.0, 0.1, 100.0);
        let viewport = Vec2::new(800.0, 800.0);
        let labels = project_infospots(&scene, proj * view, viewport, 0.995);
        assert_eq!(labels.len(), 2);
        assert!(labels.iter().all(|l| l.screen.x > 0.0 && l.screen.x < 800.0));
        assert_eq!(labels[0].text, "Sofa");

        let behind = Mat4::look_at_rh(Vec3::new(2.0, 1.0, 10.0), Vec3::new(2.0, 1.0, 20.0), Vec3::Y);
        assert!(project_infospots(&scene, proj * behind, viewport, 0.995).is_empty());
        // tight cutoff rejects everything at this distance
        assert!(project_infospots(&scene, proj * view, viewport, 0.5).is_empty());
    }
}
