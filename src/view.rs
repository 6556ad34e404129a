// view.rs — 视图状态机 (外景 / 平面图 / 室内 / 全景)
//
// One mode is current at a time. A change configures the rig and the scene
// flags for the new mode up front, then runs at most one timeline that drives
// both the camera motion and the panorama cross-fade. The guard stays taken
// until that timeline completes.

use std::collections::BTreeMap;

use glam::Vec3;

use crate::config::{RigLimits, TourConfig};
use crate::guard::TransitionGuard;
use crate::hotspots::PanoramaSet;
use crate::manifest::{Manifest, FLOOR_PLAN_VIEW, OUTSIDE_VIEW};
use crate::motion::{MotionController, MotionProfile};
use crate::rig::{CameraRig, RigProfile};
use crate::scene::SceneDirectory;
use crate::textures::{ResourceCache, TextureHandle};
use crate::transition::{Phase, TransitionEngine, TransitionKind, TransitionState};
use crate::tween::{Ease, Step, Timeline};

/// Per-axis distance under which a look-at move is skipped.
const SAME_POSITION_DEVIATION: f32 = 0.05;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewKind {
    Exterior,
    FloorPlan,
    Interior,
    Panorama,
}

impl ViewKind {
    pub fn rig_profile(self) -> RigProfile {
        match self {
            ViewKind::Exterior | ViewKind::FloorPlan => RigProfile::ThirdPerson,
            ViewKind::Interior | ViewKind::Panorama => RigProfile::FirstPerson,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewMode {
    Outside,
    FloorPlan,
    Interior(String),
    Panorama(String),
}

impl ViewMode {
    pub fn name(&self) -> &str {
        match self {
            ViewMode::Outside => OUTSIDE_VIEW,
            ViewMode::FloorPlan => FLOOR_PLAN_VIEW,
            ViewMode::Interior(name) | ViewMode::Panorama(name) => name,
        }
    }

    pub fn kind(&self) -> ViewKind {
        match self {
            ViewMode::Outside => ViewKind::Exterior,
            ViewMode::FloorPlan => ViewKind::FloorPlan,
            ViewMode::Interior(_) => ViewKind::Interior,
            ViewMode::Panorama(_) => ViewKind::Panorama,
        }
    }

    pub fn allows_picking(&self) -> bool {
        matches!(self, ViewMode::Interior(_) | ViewMode::Panorama(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewTarget {
    pub name: String,
    pub position: Vec3,
    pub look_at: Vec3,
    pub kind: ViewKind,
    pub texture: Option<String>,
}

impl ViewTarget {
    fn mode(&self) -> ViewMode {
        match self.kind {
            ViewKind::Exterior => ViewMode::Outside,
            ViewKind::FloorPlan => ViewMode::FloorPlan,
            ViewKind::Interior => ViewMode::Interior(self.name.clone()),
            ViewKind::Panorama => ViewMode::Panorama(self.name.clone()),
        }
    }
}

/// What the renderer and overlay show in a mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneFlags {
    pub hotspot_markers: bool,
    pub reticle: bool,
    pub floor_plan_cut: bool,
    pub ambient_intensity: f32,
    pub post_processing: bool,
    pub panorama_sphere: bool,
    pub room_labels: bool,
    pub controls_enabled: bool,
}

impl Default for SceneFlags {
    fn default() -> Self {
        ModeProfile::for_kind(ViewKind::Exterior, &TourConfig::default()).flags
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModeProfile {
    pub rig: RigProfile,
    pub flags: SceneFlags,
}

impl ModeProfile {
    pub fn for_kind(kind: ViewKind, config: &TourConfig) -> Self {
        let ambient = config.render.ambient_intensity;
        let flags = match kind {
            ViewKind::Exterior => SceneFlags {
                hotspot_markers: false,
                reticle: false,
                floor_plan_cut: false,
                ambient_intensity: ambient,
                post_processing: false,
                panorama_sphere: false,
                room_labels: false,
                controls_enabled: true,
            },
            ViewKind::FloorPlan => SceneFlags {
                hotspot_markers: false,
                reticle: false,
                floor_plan_cut: true,
                ambient_intensity: ambient,
                post_processing: false,
                panorama_sphere: false,
                room_labels: true,
                controls_enabled: false,
            },
            ViewKind::Interior | ViewKind::Panorama => SceneFlags {
                hotspot_markers: true,
                reticle: true,
                floor_plan_cut: false,
                // the sphere shader is lit at unit intensity
                ambient_intensity: 1.0,
                post_processing: true,
                panorama_sphere: true,
                room_labels: false,
                controls_enabled: true,
            },
        };
        Self {
            rig: kind.rig_profile(),
            flags,
        }
    }

    fn limits<'a>(&self, config: &'a TourConfig) -> &'a RigLimits {
        match self.rig {
            RigProfile::ThirdPerson => &config.controls.third_person,
            RigProfile::FirstPerson => &config.controls.first_person,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TourEvent {
    ModeChanged(ViewMode),
    /// `true` while something is animating; `false` once settled.
    Rendering(bool),
    ResourceMissing { view: String, texture: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeOutcome {
    /// A timeline is running; the guard is held until it completes.
    Started,
    /// Applied immediately.
    Snapped,
    /// Already there.
    Unchanged,
    /// Another change is in flight.
    Busy,
    Unknown,
    /// A required resource was missing; nothing changed.
    Failed,
}

impl ChangeOutcome {
    pub fn accepted(self) -> bool {
        matches!(self, ChangeOutcome::Started | ChangeOutcome::Snapped)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChangeOptions {
    pub animate: bool,
}

impl Default for ChangeOptions {
    fn default() -> Self {
        Self { animate: true }
    }
}

/// Named camera poses from the manifest. Panoramas resolve through the
/// `PanoramaSet` at point of use.
#[derive(Debug, Clone)]
pub struct ViewCatalog {
    outside: ViewTarget,
    floor_plan: ViewTarget,
    interiors: BTreeMap<String, ViewTarget>,
}

impl ViewCatalog {
    pub fn from_manifest(manifest: &Manifest) -> Self {
        let views = &manifest.views;
        let interiors = views
            .interiors
            .iter()
            .map(|(name, entry)| {
                let target = ViewTarget {
                    name: name.clone(),
                    position: entry.position.into(),
                    look_at: entry.target.into(),
                    kind: ViewKind::Interior,
                    texture: entry.texture_map.clone(),
                };
                (name.clone(), target)
            })
            .collect();
        Self {
            outside: ViewTarget {
                name: OUTSIDE_VIEW.to_string(),
                position: views.outside.position.into(),
                look_at: views.outside.target.into(),
                kind: ViewKind::Exterior,
                texture: None,
            },
            floor_plan: ViewTarget {
                name: FLOOR_PLAN_VIEW.to_string(),
                position: views.floor_plan.position.into(),
                look_at: views.floor_plan.target.into(),
                kind: ViewKind::FloorPlan,
                texture: None,
            },
            interiors,
        }
    }

    pub fn interior_names(&self) -> impl Iterator<Item = &str> {
        self.interiors.keys().map(String::as_str)
    }

    pub fn resolve(
        &self,
        name: &str,
        panoramas: &PanoramaSet,
        scene: &SceneDirectory,
        config: &TourConfig,
    ) -> Option<ViewTarget> {
        match name {
            OUTSIDE_VIEW => return Some(self.outside.clone()),
            FLOOR_PLAN_VIEW => return Some(self.floor_plan.clone()),
            _ => {}
        }
        if let Some(interior) = self.interiors.get(name) {
            return Some(interior.clone());
        }
        let item = panoramas.get(name)?;
        let position = item.resolve_position(scene)?;
        let look_at = item.resolve_target(scene, config.panorama.look_offset())?;
        Some(ViewTarget {
            name: item.name.clone(),
            position,
            look_at,
            kind: ViewKind::Panorama,
            texture: Some(item.texture.clone()),
        })
    }
}

/// Everything a view change reads or writes besides its own state.
pub struct ViewContext<'a> {
    pub rig: &'a mut dyn CameraRig,
    pub scene: &'a mut SceneDirectory,
    pub panoramas: &'a PanoramaSet,
    pub textures: &'a dyn ResourceCache,
    pub config: &'a TourConfig,
}

#[derive(Debug)]
pub struct ViewStateMachine {
    mode: Option<ViewMode>,
    catalog: ViewCatalog,
    guard: TransitionGuard,
    timeline: Timeline,
    motion: MotionController,
    transition: TransitionEngine,
    flags: SceneFlags,
    sphere_center: Vec3,
    events: Vec<TourEvent>,
}

impl ViewStateMachine {
    pub fn new(catalog: ViewCatalog, kind: TransitionKind) -> Self {
        Self {
            mode: None,
            catalog,
            guard: TransitionGuard::default(),
            timeline: Timeline::default(),
            motion: MotionController::default(),
            transition: TransitionEngine::new(kind),
            flags: SceneFlags::default(),
            sphere_center: Vec3::ZERO,
            events: Vec::new(),
        }
    }

    pub fn mode(&self) -> Option<&ViewMode> {
        self.mode.as_ref()
    }

    pub fn current_panorama(&self) -> Option<&str> {
        match &self.mode {
            Some(ViewMode::Panorama(name)) => Some(name),
            _ => None,
        }
    }

    pub fn catalog(&self) -> &ViewCatalog {
        &self.catalog
    }

    pub fn flags(&self) -> &SceneFlags {
        &self.flags
    }

    pub fn transition_state(&self) -> &TransitionState {
        self.transition.state()
    }

    pub fn transition_phase(&self) -> Phase {
        self.transition.phase()
    }

    pub fn transition_kind(&self) -> TransitionKind {
        self.transition.kind()
    }

    pub fn set_transition_kind(&mut self, kind: TransitionKind) -> bool {
        self.transition.set_kind(kind)
    }

    pub fn sphere_center(&self) -> Vec3 {
        self.sphere_center
    }

    pub fn is_busy(&self) -> bool {
        self.guard.is_active()
    }

    /// Linear progress of the running change, 0 when idle.
    pub fn progress(&self) -> f32 {
        self.timeline.progress()
    }

    pub fn drain_events(&mut self) -> Vec<TourEvent> {
        std::mem::take(&mut self.events)
    }

    /// Enters the start point without animation.
    pub fn start(&mut self, name: &str, ctx: &mut ViewContext<'_>) -> ChangeOutcome {
        self.change(name, ChangeOptions { animate: false }, true, ctx)
    }

    pub fn change_view(
        &mut self,
        name: &str,
        opts: ChangeOptions,
        ctx: &mut ViewContext<'_>,
    ) -> ChangeOutcome {
        self.change(name, opts, false, ctx)
    }

    fn change(
        &mut self,
        name: &str,
        opts: ChangeOptions,
        first_init: bool,
        ctx: &mut ViewContext<'_>,
    ) -> ChangeOutcome {
        if self.guard.is_active() {
            log::debug!("view change to {} rejected: transition in flight", name);
            return ChangeOutcome::Busy;
        }
        let Some(target) = self
            .catalog
            .resolve(name, ctx.panoramas, ctx.scene, ctx.config)
        else {
            log::warn!("unknown view {:?}", name);
            return ChangeOutcome::Unknown;
        };
        let next_mode = target.mode();
        if self.mode.as_ref() == Some(&next_mode) {
            return ChangeOutcome::Unchanged;
        }

        // resolve before touching anything so a miss leaves no trace
        let texture = match &target.texture {
            Some(texture_name) => match ctx.textures.texture(texture_name) {
                Some(handle) => Some(handle),
                None => {
                    log::error!("view {}: texture {} not in cache", target.name, texture_name);
                    self.events.push(TourEvent::ResourceMissing {
                        view: target.name.clone(),
                        texture: texture_name.clone(),
                    });
                    return ChangeOutcome::Failed;
                }
            },
            None => None,
        };

        if !self.guard.try_begin() {
            return ChangeOutcome::Busy;
        }

        let previous = self.mode.as_ref().map(ViewMode::kind);
        let profile = ModeProfile::for_kind(target.kind, ctx.config);
        let limits = profile.limits(ctx.config);
        match profile.rig {
            RigProfile::ThirdPerson => ctx.rig.set_third_person(limits),
            RigProfile::FirstPerson => ctx.rig.set_first_person(limits),
        }
        if previous.map(ViewKind::rig_profile) != Some(profile.rig) {
            ctx.rig.zoom_to(limits.default_zoom);
        }
        self.flags = profile.flags;
        // an interior without its own panorama falls back to the room background
        if target.kind == ViewKind::Interior && texture.is_none() {
            self.flags.panorama_sphere = false;
        }

        let outcome = match target.kind {
            ViewKind::Panorama => {
                self.enter_panorama(&target, texture, previous, opts, first_init, ctx)
            }
            _ => self.enter_view(&target, texture, opts, first_init, ctx),
        };

        log::info!("view -> {} ({:?})", next_mode.name(), outcome);
        self.mode = Some(next_mode.clone());
        self.events.push(TourEvent::ModeChanged(next_mode));
        self.events.push(TourEvent::Rendering(true));
        if outcome == ChangeOutcome::Snapped {
            self.guard.end();
            ctx.rig.set_enabled(self.flags.controls_enabled);
            self.events.push(TourEvent::Rendering(false));
        }
        outcome
    }

    fn enter_panorama(
        &mut self,
        target: &ViewTarget,
        texture: Option<TextureHandle>,
        previous: Option<ViewKind>,
        opts: ChangeOptions,
        first_init: bool,
        ctx: &mut ViewContext<'_>,
    ) -> ChangeOutcome {
        self.sphere_center = target.position;
        if first_init || !opts.animate {
            if let Some(handle) = texture {
                self.transition.snap(handle);
            }
            ctx.panoramas.apply_visibility(ctx.scene, &target.name);
            ctx.rig.set_look_at(target.position, target.look_at);
            return ChangeOutcome::Snapped;
        }

        if !self.transition.begin(texture) {
            log::warn!("view {}: cross-fade did not start", target.name);
        }
        ctx.panoramas.apply_visibility(ctx.scene, &target.name);

        // hopping between panoramas keeps the user's look direction
        let from = ctx.rig.position();
        let (motion, duration) = match previous {
            Some(ViewKind::Panorama)
                if (from.y - target.position.y).abs() <= SAME_POSITION_DEVIATION =>
            {
                let glide =
                    MotionProfile::planar_glide(&*ctx.rig, target.position.x, target.position.z);
                (glide, ctx.config.animation.glide_duration)
            }
            Some(ViewKind::Panorama) => (
                MotionProfile::glide(&*ctx.rig, target.position),
                ctx.config.transition.duration_secs(),
            ),
            _ => (
                MotionProfile::look_at_blend(&*ctx.rig, target.position, target.look_at),
                ctx.config.transition.duration_secs(),
            ),
        };
        self.run(motion, duration, ctx.config.animation.move_ease, ctx)
    }

    fn enter_view(
        &mut self,
        target: &ViewTarget,
        texture: Option<TextureHandle>,
        opts: ChangeOptions,
        first_init: bool,
        ctx: &mut ViewContext<'_>,
    ) -> ChangeOutcome {
        PanoramaSet::hide_all(ctx.scene);
        if let Some(handle) = texture {
            self.transition.snap(handle);
            self.sphere_center = target.position;
        }
        if first_init || !opts.animate {
            ctx.rig.set_look_at(target.position, target.look_at);
            return ChangeOutcome::Snapped;
        }
        let from = ctx.rig.position();
        if (from - target.position)
            .abs()
            .cmple(Vec3::splat(SAME_POSITION_DEVIATION))
            .all()
        {
            log::debug!("view {}: already in place", target.name);
            return ChangeOutcome::Snapped;
        }
        let motion = MotionProfile::look_at_blend(&*ctx.rig, target.position, target.look_at);
        self.run(
            motion,
            ctx.config.animation.view_duration,
            ctx.config.animation.move_ease,
            ctx,
        )
    }

    fn run(
        &mut self,
        motion: MotionProfile,
        duration: f32,
        ease: Ease,
        ctx: &mut ViewContext<'_>,
    ) -> ChangeOutcome {
        self.motion.start(motion);
        self.timeline.start(duration, ease);
        ctx.rig.set_enabled(false);
        ChangeOutcome::Started
    }

    /// Advances the running change. Returns `true` while animating.
    pub fn tick(&mut self, dt: f32, ctx: &mut ViewContext<'_>) -> bool {
        if !self.timeline.is_active() {
            return false;
        }
        let step = self.timeline.advance(dt);
        self.motion.update(self.timeline.eased(), ctx.rig);
        self.transition.update(self.timeline.progress());
        if step == Step::InProgress {
            return true;
        }

        self.motion.finish(ctx.rig);
        self.transition.complete();
        self.timeline.clear();
        self.guard.end();
        ctx.rig.set_enabled(self.flags.controls_enabled);
        self.events.push(TourEvent::Rendering(false));
        log::debug!(
            "view {} settled",
            self.mode.as_ref().map_or("-", ViewMode::name)
        );
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[derive(Debug, Clone, PartialEq)]
    enum Call {
        LookAt(Vec3, Vec3),
        MoveTo(Vec3),
        ThirdPerson,
        FirstPerson,
        Zoom(f32),
        Enabled(bool),
    }

    #[derive(Default)]
    struct RecordingRig {
        eye: Vec3,
        target: Vec3,
        calls: Vec<Call>,
    }

    impl RecordingRig {
        fn profile_calls(&self) -> usize {
            self.calls
                .iter()
                .filter(|c| matches!(c, Call::ThirdPerson | Call::FirstPerson))
                .count()
        }
    }

    impl CameraRig for RecordingRig {
        fn position(&self) -> Vec3 {
            self.eye
        }
        fn target(&self) -> Vec3 {
            self.target
        }
        fn set_look_at(&mut self, eye: Vec3, target: Vec3) {
            self.eye = eye;
            self.target = target;
            self.calls.push(Call::LookAt(eye, target));
        }
        fn move_to(&mut self, position: Vec3) {
            self.target += position - self.eye;
            self.eye = position;
            self.calls.push(Call::MoveTo(position));
        }
        fn set_third_person(&mut self, _: &RigLimits) {
            self.calls.push(Call::ThirdPerson);
        }
        fn set_first_person(&mut self, _: &RigLimits) {
            self.calls.push(Call::FirstPerson);
        }
        fn zoom_to(&mut self, zoom: f32) {
            self.calls.push(Call::Zoom(zoom));
        }
        fn set_enabled(&mut self, enabled: bool) {
            self.calls.push(Call::Enabled(enabled));
        }
    }

    struct MapCache(HashMap<String, TextureHandle>);

    impl ResourceCache for MapCache {
        fn texture(&self, name: &str) -> Option<TextureHandle> {
            self.0.get(name).copied()
        }
    }

    struct Fixture {
        rig: RecordingRig,
        scene: SceneDirectory,
        panoramas: PanoramaSet,
        cache: MapCache,
        config: TourConfig,
        views: ViewStateMachine,
    }

    impl Fixture {
        fn new() -> Self {
            let manifest = Manifest::parse(
                r#"{
                "startPoint": "outside",
                "hotspots": [
                    { "name": "hall", "textureMap": "hall.jpg", "visibleHotspots": ["den"],
                      "position": {"x": 0, "y": 1.6, "z": 0} },
                    { "name": "den", "textureMap": "den.jpg", "visibleHotspots": ["hall"],
                      "position": {"x": 4, "y": 1.6, "z": 0} },
                    { "name": "attic", "textureMap": "attic.jpg",
                      "position": {"x": 0, "y": 4, "z": 0} }
                ],
                "views": { "interiors": { "kitchen": {
                    "position": {"x": 2, "y": 1.6, "z": 3}, "target": {"x": 2, "y": 1.6, "z": 0} } } }
            }"#,
            )
            .unwrap();
            let config = TourConfig::default();
            let mut scene = SceneDirectory::new();
            let panoramas = PanoramaSet::build(&manifest, &mut scene, &config);
            let cache = MapCache(HashMap::from([
                ("hall.jpg".to_string(), TextureHandle(0)),
                ("den.jpg".to_string(), TextureHandle(1)),
            ]));
            let views = ViewStateMachine::new(ViewCatalog::from_manifest(&manifest), TransitionKind::None);
            Self {
                rig: RecordingRig::default(),
                scene,
                panoramas,
                cache,
                config,
                views,
            }
        }

        fn change(&mut self, name: &str) -> ChangeOutcome {
            let mut ctx = ViewContext {
                rig: &mut self.rig,
                scene: &mut self.scene,
                panoramas: &self.panoramas,
                textures: &self.cache,
                config: &self.config,
            };
            self.views.change_view(name, ChangeOptions::default(), &mut ctx)
        }

        fn start(&mut self, name: &str) -> ChangeOutcome {
            let mut ctx = ViewContext {
                rig: &mut self.rig,
                scene: &mut self.scene,
                panoramas: &self.panoramas,
                textures: &self.cache,
                config: &self.config,
            };
            self.views.start(name, &mut ctx)
        }

        fn tick(&mut self, dt: f32) -> bool {
            let mut ctx = ViewContext {
                rig: &mut self.rig,
                scene: &mut self.scene,
                panoramas: &self.panoramas,
                textures: &self.cache,
                config: &self.config,
            };
            self.views.tick(dt, &mut ctx)
        }

        fn settle(&mut self) {
            for _ in 0..1000 {
                if !self.tick(1.0 / 60.0) {
                    return;
                }
            }
            panic!("transition never settled");
        }

        fn visible_hotspots(&self) -> Vec<String> {
            self.scene
                .hotspots()
                .filter(|(_, n)| n.visible)
                .map(|(_, n)| n.name.clone())
                .collect()
        }
    }

    #[test]
    fn first_init_snaps() {
        let mut fx = Fixture::new();
        assert_eq!(fx.start("hall"), ChangeOutcome::Snapped);
        assert_eq!(fx.views.mode(), Some(&ViewMode::Panorama("hall".into())));
        assert!(!fx.views.is_busy());
        assert_eq!(fx.rig.eye, Vec3::new(0.0, 1.6, 0.0));
        let state = fx.views.transition_state();
        assert_eq!(state.from, Some(TextureHandle(0)));
        assert_eq!(state.to, Some(TextureHandle(0)));
        assert_eq!(fx.visible_hotspots(), vec!["Hotspot_den"]);
        assert!(!fx.tick(0.1));
    }

    #[test]
    fn overlapping_changes_start_once() {
        let mut fx = Fixture::new();
        fx.start("hall");
        assert_eq!(fx.change("den"), ChangeOutcome::Started);
        // markers switch before the first blended frame
        assert_eq!(fx.visible_hotspots(), vec!["Hotspot_hall"]);
        let calls = fx.rig.calls.len();
        let state = *fx.views.transition_state();
        let visible = fx.visible_hotspots();

        assert_eq!(fx.change("outside"), ChangeOutcome::Busy);
        assert_eq!(fx.change("hall"), ChangeOutcome::Busy);
        assert_eq!(fx.rig.calls.len(), calls);
        assert_eq!(*fx.views.transition_state(), state);
        assert_eq!(fx.visible_hotspots(), visible);
        assert_eq!(fx.views.mode(), Some(&ViewMode::Panorama("den".into())));

        fx.settle();
        assert_eq!(fx.change("outside"), ChangeOutcome::Started);
    }

    #[test]
    fn completion_lands_on_target_texture() {
        let mut fx = Fixture::new();
        fx.start("hall");
        fx.change("den");
        assert_eq!(fx.views.transition_phase(), Phase::Blending);
        fx.tick(0.5);
        let mid = fx.views.transition_state().blend_factor;
        assert!(mid > 0.0 && mid < 0.01);
        fx.settle();
        let state = fx.views.transition_state();
        assert_eq!(state.blend_factor, 0.0);
        assert_eq!(state.aux, 0.0);
        assert_eq!(state.from, Some(TextureHandle(1)));
        assert_eq!(state.from, state.to);
        assert_eq!(fx.views.sphere_center(), Vec3::new(4.0, 1.6, 0.0));
        assert_eq!(fx.rig.eye, Vec3::new(4.0, 1.6, 0.0));
    }

    #[test]
    fn look_at_moves_ease_out() {
        let mut fx = Fixture::new();
        fx.start("hall");
        let from = fx.rig.eye;
        assert_eq!(fx.change("outside"), ChangeOutcome::Started);
        fx.tick(fx.config.animation.view_duration / 2.0);
        assert!((fx.views.progress() - 0.5).abs() < 1e-4);
        let mid = fx.rig.eye;
        fx.settle();
        let to = fx.rig.eye;
        assert!((mid - from).length() > 0.75 * (to - from).length());
    }

    #[test]
    fn interior_without_panorama_hides_the_sphere() {
        let mut fx = Fixture::new();
        fx.start("hall");
        assert!(fx.views.flags().panorama_sphere);
        fx.change("outside");
        fx.settle();
        assert_eq!(fx.change("kitchen"), ChangeOutcome::Started);
        assert!(!fx.views.flags().panorama_sphere);
        assert!(fx.views.flags().hotspot_markers);
        fx.settle();
        assert!(!fx.views.flags().panorama_sphere);
    }

    #[test]
    fn same_floor_hop_glides_at_eye_height() {
        let mut fx = Fixture::new();
        fx.start("hall");
        fx.rig.set_look_at(Vec3::new(0.0, 1.62, 0.0), Vec3::new(1.0, 1.62, 0.0));
        assert_eq!(fx.change("den"), ChangeOutcome::Started);
        fx.tick(fx.config.animation.glide_duration / 2.0);
        assert!(fx.views.is_busy());
        fx.settle();
        assert_eq!(fx.rig.eye, Vec3::new(4.0, 1.62, 0.0));
        assert_eq!(fx.views.sphere_center(), Vec3::new(4.0, 1.6, 0.0));
    }

    #[test]
    fn hop_to_another_level_glides_in_3d() {
        let mut fx = Fixture::new();
        fx.cache.0.insert("attic.jpg".to_string(), TextureHandle(2));
        fx.start("hall");
        assert_eq!(fx.change("attic"), ChangeOutcome::Started);
        fx.settle();
        assert!((fx.rig.eye - Vec3::new(0.0, 4.0, 0.0)).length() < 1e-5);
    }

    #[test]
    fn floor_plan_has_one_name() {
        let mut fx = Fixture::new();
        fx.start("outside");
        assert_eq!(fx.change("floor plan"), ChangeOutcome::Unknown);
        assert!(fx.change(FLOOR_PLAN_VIEW).accepted());
    }

    #[test]
    fn panorama_hop_keeps_look_direction() {
        let mut fx = Fixture::new();
        fx.start("hall");
        let dir = fx.rig.target - fx.rig.eye;
        fx.change("den");
        fx.settle();
        assert!(fx.rig.calls.iter().any(|c| matches!(c, Call::MoveTo(_))));
        assert!(((fx.rig.target - fx.rig.eye) - dir).length() < 1e-5);
    }

    #[test]
    fn one_profile_call_per_change() {
        let mut fx = Fixture::new();
        fx.start("outside");
        assert_eq!(fx.rig.profile_calls(), 1);
        for name in ["hall", "den", "kitchen", "floorPlan"] {
            fx.rig.calls.clear();
            assert!(fx.change(name).accepted(), "{name}");
            assert_eq!(fx.rig.profile_calls(), 1, "{name}");
            fx.settle();
            assert_eq!(fx.rig.profile_calls(), 1, "{name}");
        }
        assert_eq!(fx.views.mode(), Some(&ViewMode::FloorPlan));
        assert!(fx.views.flags().floor_plan_cut);
        assert!(!fx.views.flags().controls_enabled);
        assert_eq!(fx.rig.calls.last(), Some(&Call::Enabled(false)));
    }

    #[test]
    fn same_target_is_a_no_op() {
        let mut fx = Fixture::new();
        fx.start("hall");
        let calls = fx.rig.calls.len();
        let events = fx.views.drain_events();
        assert!(!events.is_empty());
        assert_eq!(fx.change("hall"), ChangeOutcome::Unchanged);
        assert_eq!(fx.rig.calls.len(), calls);
        assert!(!fx.views.is_busy());
        assert!(fx.views.drain_events().is_empty());

        fx.change("kitchen");
        fx.settle();
        let calls = fx.rig.calls.len();
        assert_eq!(fx.change("kitchen"), ChangeOutcome::Unchanged);
        assert_eq!(fx.rig.calls.len(), calls);
    }

    #[test]
    fn missing_texture_fails_closed() {
        let mut fx = Fixture::new();
        fx.start("hall");
        fx.views.drain_events();
        let calls = fx.rig.calls.len();
        assert_eq!(fx.change("attic"), ChangeOutcome::Failed);
        assert!(!fx.views.is_busy());
        assert_eq!(fx.rig.calls.len(), calls);
        assert_eq!(fx.views.transition_phase(), Phase::Idle);
        assert_eq!(fx.views.mode(), Some(&ViewMode::Panorama("hall".into())));
        assert_eq!(fx.visible_hotspots(), vec!["Hotspot_den"]);
        assert_eq!(
            fx.views.drain_events(),
            vec![TourEvent::ResourceMissing {
                view: "attic".into(),
                texture: "attic.jpg".into()
            }]
        );
    }

    #[test]
    fn unknown_view_is_rejected() {
        let mut fx = Fixture::new();
        fx.start("outside");
        assert_eq!(fx.change("garage"), ChangeOutcome::Unknown);
        assert_eq!(fx.views.mode(), Some(&ViewMode::Outside));
    }

    #[test]
    fn nearby_look_at_move_is_skipped() {
        let mut fx = Fixture::new();
        fx.start("kitchen");
        fx.rig.set_look_at(Vec3::new(0.0, 0.44, 12.0), Vec3::ZERO);
        assert_eq!(fx.change("outside"), ChangeOutcome::Snapped);
        assert!(!fx.views.is_busy());
        assert_eq!(fx.rig.eye, Vec3::new(0.0, 0.44, 12.0));
    }

    #[test]
    fn events_announce_mode_and_settle() {
        let mut fx = Fixture::new();
        fx.start("hall");
        fx.views.drain_events();
        fx.change("den");
        assert_eq!(
            fx.views.drain_events(),
            vec![
                TourEvent::ModeChanged(ViewMode::Panorama("den".into())),
                TourEvent::Rendering(true)
            ]
        );
        fx.settle();
        assert_eq!(fx.views.drain_events(), vec![TourEvent::Rendering(false)]);
    }
}
