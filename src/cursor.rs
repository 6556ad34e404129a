// cursor.rs — 光标 / 热点交互
//
// Pointer moves hover hotspots or place the floor reticle; clicks pick a
// panorama. A click is only resolved once the double-click window has passed,
// so single and double clicks never both fire.

use glam::{Quat, Vec2, Vec3};

use crate::config::TourConfig;
use crate::pick::{intersect, surface_orientation, Hit, Ray};
use crate::scene::{NodeId, SceneDirectory};
use crate::tween::{Ease, Step, Tween};

/// Container rectangle in client pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    pub fn size(&self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    pub fn to_ndc(&self, client: Vec2) -> Vec2 {
        let w = self.width.max(1.0);
        let h = self.height.max(1.0);
        Vec2::new(
            (client.x - self.left) / w * 2.0 - 1.0,
            -((client.y - self.top) / h) * 2.0 + 1.0,
        )
    }
}

/// Press/move/release bookkeeping that tells clicks from drags.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClickTracker {
    down_at: Option<Vec2>,
    last: Option<Vec2>,
    dragging: bool,
}

impl ClickTracker {
    pub fn press(&mut self, pos: Vec2) {
        self.down_at = Some(pos);
        self.last = Some(pos);
        self.dragging = false;
    }

    /// Returns the movement since the previous event while the button is
    /// held and the press has turned into a drag.
    pub fn moved(&mut self, pos: Vec2, threshold: f32) -> Option<Vec2> {
        let down = self.down_at?;
        let last = self.last.replace(pos).unwrap_or(pos);
        if !self.dragging && down.distance(pos) > threshold {
            self.dragging = true;
        }
        self.dragging.then(|| pos - last)
    }

    /// True when the release counts as a click.
    pub fn release(&mut self, pos: Vec2, threshold: f32) -> bool {
        let Some(down) = self.down_at.take() else {
            return false;
        };
        self.last = None;
        let click = !self.dragging && down.distance(pos) <= threshold;
        self.dragging = false;
        click
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PointerAffordance {
    #[default]
    Default,
    Clickable,
}

/// Floor marker that follows the pointer over room geometry.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reticle {
    pub position: Vec3,
    pub rotation: Quat,
    target_rotation: Quat,
    pub visible: bool,
}

impl Default for Reticle {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            target_rotation: Quat::IDENTITY,
            visible: false,
        }
    }
}

impl Reticle {
    fn place(&mut self, hit: &Hit) {
        self.position = hit.point;
        self.target_rotation = surface_orientation(hit.normal);
        if !self.visible {
            self.rotation = self.target_rotation;
        }
        self.visible = true;
    }

    pub fn update(&mut self, lerp_factor: f32) {
        self.rotation = self
            .rotation
            .slerp(self.target_rotation, lerp_factor.clamp(0.0, 1.0))
            .normalize();
    }
}

#[derive(Debug, Clone, Copy)]
struct OpacityFade {
    node: NodeId,
    from: f32,
    to: f32,
    tween: Tween,
}

#[derive(Debug, Clone, Copy)]
struct PendingClick {
    point: Vec3,
    remaining: f32,
}

#[derive(Debug, Default)]
pub struct CursorController {
    hovered: Option<NodeId>,
    fades: Vec<OpacityFade>,
    reticle: Reticle,
    affordance: PointerAffordance,
    pending: Option<PendingClick>,
}

/// Nearest pickable hit with hotspots ahead of everything else.
pub fn first_pick(scene: &SceneDirectory, ray: &Ray, min_opacity: f32) -> Option<Hit> {
    let mut hits = intersect(scene, ray, min_opacity);
    // stable: distance order survives inside each group
    hits.sort_by_key(|h| !scene.get(h.node).is_some_and(|n| n.is_hotspot()));
    hits.into_iter().next()
}

/// Panorama of the visible hotspot closest to `point`.
pub fn closest_hotspot(scene: &SceneDirectory, point: Vec3) -> Option<String> {
    scene
        .hotspots()
        .filter(|(_, n)| n.visible)
        .min_by(|(_, a), (_, b)| {
            a.position
                .distance_squared(point)
                .total_cmp(&b.position.distance_squared(point))
        })
        .and_then(|(_, n)| n.hotspot_panorama().map(str::to_string))
}

/// Panorama of the hotspot furthest from `point`, hidden ones included.
pub fn furthest_hotspot(scene: &SceneDirectory, point: Vec3) -> Option<String> {
    scene
        .hotspots()
        .max_by(|(_, a), (_, b)| {
            a.position
                .distance_squared(point)
                .total_cmp(&b.position.distance_squared(point))
        })
        .and_then(|(_, n)| n.hotspot_panorama().map(str::to_string))
}

impl CursorController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn affordance(&self) -> PointerAffordance {
        self.affordance
    }

    pub fn reticle(&self) -> &Reticle {
        &self.reticle
    }

    pub fn hovered(&self) -> Option<NodeId> {
        self.hovered
    }

    pub fn has_pending_click(&self) -> bool {
        self.pending.is_some()
    }

    pub fn is_animating(&self) -> bool {
        !self.fades.is_empty() || self.pending.is_some()
    }

    fn fade(&mut self, scene: &SceneDirectory, node: NodeId, to: f32, config: &TourConfig) {
        let from = scene.get(node).map_or(to, |n| n.opacity);
        self.fades.retain(|f| f.node != node);
        self.fades.push(OpacityFade {
            node,
            from,
            to,
            tween: Tween::new(config.hotspot.hover_transition_time, Ease::Power2Out),
        });
    }

    fn unhover(&mut self, scene: &SceneDirectory, config: &TourConfig) {
        if let Some(prev) = self.hovered.take() {
            self.fade(scene, prev, config.hotspot.opacity, config);
        }
    }

    pub fn pointer_move(&mut self, ray: &Ray, scene: &SceneDirectory, config: &TourConfig) {
        let Some(hit) = first_pick(scene, ray, config.pointer.pick_opacity_threshold) else {
            self.reticle.visible = false;
            self.affordance = PointerAffordance::Default;
            self.unhover(scene, config);
            return;
        };
        let is_hotspot = scene
            .get(hit.node)
            .is_some_and(|n| n.is_hotspot() && n.visible);
        if is_hotspot {
            self.reticle.visible = false;
            self.affordance = PointerAffordance::Clickable;
            if self.hovered != Some(hit.node) {
                self.unhover(scene, config);
                self.fade(scene, hit.node, config.hotspot.hover_opacity, config);
                self.hovered = Some(hit.node);
            }
        } else {
            self.reticle.place(&hit);
            self.affordance = PointerAffordance::Default;
            self.unhover(scene, config);
        }
    }

    /// Registers a click. A second click inside the window cancels the
    /// pending one and resolves right away to the furthest hotspot.
    pub fn click(&mut self, ray: &Ray, scene: &SceneDirectory, config: &TourConfig) -> Option<String> {
        let hit = first_pick(scene, ray, config.pointer.pick_opacity_threshold);
        if self.pending.take().is_some() {
            let target = hit.and_then(|h| furthest_hotspot(scene, h.point));
            log::debug!("double click -> {:?}", target);
            return target;
        }
        self.pending = Some(PendingClick {
            point: hit.map_or(Vec3::NAN, |h| h.point),
            remaining: config.pointer.double_click_window,
        });
        None
    }

    /// Advances hover fades and the reticle; returns a panorama when a
    /// single click resolves.
    pub fn update(&mut self, dt: f32, scene: &mut SceneDirectory, config: &TourConfig) -> Option<String> {
        self.fades.retain_mut(|fade| {
            let step = fade.tween.advance(dt);
            let t = fade.tween.eased();
            if let Some(node) = scene.get_mut(fade.node) {
                node.opacity = fade.from + (fade.to - fade.from) * t;
            }
            step == Step::InProgress
        });
        if self.reticle.visible {
            self.reticle.update(config.cursor.lerp_factor);
        }

        let pending = self.pending.as_mut()?;
        pending.remaining -= dt.max(0.0);
        if pending.remaining > 0.0 {
            return None;
        }
        let point = pending.point;
        self.pending = None;
        if !point.is_finite() {
            return None;
        }
        let target = closest_hotspot(scene, point);
        log::debug!("single click -> {:?}", target);
        target
    }

    /// Drops hover state and any pending click (mode changes).
    pub fn reset(&mut self, scene: &SceneDirectory, config: &TourConfig) {
        self.pending = None;
        self.reticle.visible = false;
        self.affordance = PointerAffordance::Default;
        self.unhover(scene, config);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{Mesh, NodeKind, SceneNode};

    fn hotspot(scene: &mut SceneDirectory, name: &str, at: Vec3, visible: bool) -> NodeId {
        let mut node = SceneNode::new(
            format!("Hotspot_{name}"),
            NodeKind::Hotspot {
                panorama: name.to_string(),
            },
            at,
        )
        .with_mesh(Mesh::quad(at, 0.1, Vec3::Y))
        .with_opacity(0.5);
        node.visible = visible;
        scene.insert(node)
    }

    fn abc_scene() -> SceneDirectory {
        let mut scene = SceneDirectory::new();
        scene.insert(
            SceneNode::new("Floor", NodeKind::Surface, Vec3::ZERO)
                .with_mesh(Mesh::quad(Vec3::new(0.0, -0.01, 0.0), 20.0, Vec3::Y)),
        );
        hotspot(&mut scene, "A", Vec3::new(0.0, 0.0, 0.0), true);
        hotspot(&mut scene, "B", Vec3::new(1.0, 0.0, 0.0), true);
        hotspot(&mut scene, "C", Vec3::new(5.0, 0.0, 0.0), false);
        scene
    }

    fn ray_down(x: f32, z: f32) -> Ray {
        Ray {
            origin: Vec3::new(x, 5.0, z),
            direction: Vec3::NEG_Y,
        }
    }

    #[test]
    fn single_click_picks_closest_visible() {
        let mut scene = abc_scene();
        let cfg = TourConfig::default();
        let mut cursor = CursorController::new();
        assert_eq!(cursor.click(&ray_down(0.2, 0.0), &scene, &cfg), None);
        assert_eq!(cursor.update(0.1, &mut scene, &cfg), None);
        assert_eq!(cursor.update(0.2, &mut scene, &cfg), Some("A".to_string()));
        assert!(!cursor.has_pending_click());
    }

    #[test]
    fn double_click_picks_furthest_of_all() {
        let mut scene = abc_scene();
        let cfg = TourConfig::default();
        let mut cursor = CursorController::new();
        assert_eq!(cursor.click(&ray_down(0.2, 0.0), &scene, &cfg), None);
        cursor.update(0.1, &mut scene, &cfg);
        assert_eq!(
            cursor.click(&ray_down(0.2, 0.0), &scene, &cfg),
            Some("C".to_string())
        );
        // the first click never resolves on its own
        assert_eq!(cursor.update(1.0, &mut scene, &cfg), None);
    }

    #[test]
    fn click_on_nothing_is_silent() {
        let mut scene = abc_scene();
        let cfg = TourConfig::default();
        let mut cursor = CursorController::new();
        cursor.click(&ray_down(100.0, 0.0), &scene, &cfg);
        assert_eq!(cursor.update(1.0, &mut scene, &cfg), None);
    }

    #[test]
    fn hover_fades_in_and_back_out() {
        let mut scene = abc_scene();
        let cfg = TourConfig::default();
        let mut cursor = CursorController::new();
        let a = scene.id("Hotspot_A").unwrap();

        cursor.pointer_move(&ray_down(0.0, 0.0), &scene, &cfg);
        assert_eq!(cursor.affordance(), PointerAffordance::Clickable);
        assert_eq!(cursor.hovered(), Some(a));
        assert!(!cursor.reticle().visible);
        cursor.update(0.15, &mut scene, &cfg);
        let mid = scene.get(a).unwrap().opacity;
        assert!(mid > 0.5 && mid < 1.0);
        cursor.update(0.2, &mut scene, &cfg);
        assert_eq!(scene.get(a).unwrap().opacity, 1.0);

        cursor.pointer_move(&ray_down(3.0, 3.0), &scene, &cfg);
        assert_eq!(cursor.affordance(), PointerAffordance::Default);
        assert!(cursor.reticle().visible);
        assert!((cursor.reticle().position - Vec3::new(3.0, -0.01, 3.0)).length() < 1e-4);
        cursor.update(0.5, &mut scene, &cfg);
        assert_eq!(scene.get(a).unwrap().opacity, 0.5);
        assert!(!cursor.is_animating());
    }

    #[test]
    fn hidden_hotspots_are_not_hovered() {
        let mut scene = abc_scene();
        let cfg = TourConfig::default();
        let mut cursor = CursorController::new();
        cursor.pointer_move(&ray_down(5.0, 0.0), &scene, &cfg);
        assert_eq!(cursor.hovered(), None);
        assert!(cursor.reticle().visible);
        cursor.update(0.1, &mut scene, &cfg);
    }

    #[test]
    fn tracker_tells_clicks_from_drags() {
        let mut tracker = ClickTracker::default();
        tracker.press(Vec2::new(10.0, 10.0));
        assert_eq!(tracker.moved(Vec2::new(12.0, 10.0), 5.0), None);
        assert!(tracker.release(Vec2::new(12.0, 10.0), 5.0));

        tracker.press(Vec2::new(10.0, 10.0));
        assert_eq!(tracker.moved(Vec2::new(20.0, 10.0), 5.0), Some(Vec2::new(10.0, 0.0)));
        assert_eq!(tracker.moved(Vec2::new(22.0, 11.0), 5.0), Some(Vec2::new(2.0, 1.0)));
        assert!(!tracker.release(Vec2::new(10.0, 10.0), 5.0));
        assert_eq!(tracker.moved(Vec2::new(30.0, 10.0), 5.0), None);
    }

    #[test]
    fn ndc_maps_corners() {
        let rect = ViewportRect {
            left: 100.0,
            top: 50.0,
            width: 200.0,
            height: 100.0,
        };
        assert_eq!(rect.to_ndc(Vec2::new(100.0, 50.0)), Vec2::new(-1.0, 1.0));
        assert_eq!(rect.to_ndc(Vec2::new(300.0, 150.0)), Vec2::new(1.0, -1.0));
        assert_eq!(rect.to_ndc(Vec2::new(200.0, 100.0)), Vec2::ZERO);
    }
}
