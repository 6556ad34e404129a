// tour.rs — 漫游会话 (场景 + 相机 + 视图 + 光标)
//
// `Tour` is what the window loop talks to. It owns every core component,
// turns pointer events into rig motion or hotspot clicks, and tells the loop
// whether another frame is needed.

use glam::{Mat4, Quat, Vec2, Vec3};

use crate::config::TourConfig;
use crate::cursor::{ClickTracker, CursorController, PointerAffordance, ViewportRect};
use crate::error::{Result, TourError};
use crate::hotspots::{
    project_hotspots, project_infospots, project_to_screen, HotspotMarker, InfospotLabel,
    PanoramaSet,
};
use crate::manifest::Manifest;
use crate::pick::Ray;
use crate::rig::{OrbitRig, RigProfile, ViewRig};
use crate::scene::SceneDirectory;
use crate::textures::{ResourceCache, TextureCatalog, TextureHandle};
use crate::transition::{TransitionKind, TransitionState};
use crate::view::{
    ChangeOptions, ChangeOutcome, SceneFlags, TourEvent, ViewCatalog, ViewContext, ViewMode,
    ViewStateMachine,
};

pub const CONTEXT_LOST_MESSAGE: &str = "Restoring context, please wait.";

/// The one user-visible error slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorBanner {
    pub visible: bool,
    pub message: String,
}

impl ErrorBanner {
    pub fn raise(&mut self, message: impl Into<String>) {
        self.visible = true;
        self.message = message.into();
    }

    pub fn clear(&mut self) {
        self.visible = false;
        self.message.clear();
    }
}

/// Decides whether the loop should keep drawing.
#[derive(Debug, Clone)]
pub struct RenderActivity {
    idle_for: f32,
    timeout: f32,
    suspended: bool,
}

impl RenderActivity {
    pub fn new(timeout: f32) -> Self {
        Self {
            idle_for: 0.0,
            timeout,
            suspended: false,
        }
    }

    pub fn poke(&mut self) {
        self.idle_for = 0.0;
    }

    /// `busy` counts as activity for this frame.
    pub fn tick(&mut self, dt: f32, busy: bool) -> bool {
        if self.suspended {
            return false;
        }
        if busy {
            self.idle_for = 0.0;
        } else {
            self.idle_for += dt.max(0.0);
        }
        self.idle_for < self.timeout
    }

    pub fn suspend(&mut self) {
        self.suspended = true;
    }

    pub fn resume(&mut self) {
        self.suspended = false;
        self.idle_for = 0.0;
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn is_active(&self) -> bool {
        !self.suspended && self.idle_for < self.timeout
    }
}

/// Floor reticle as the overlay draws it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReticleOverlay {
    pub screen: Vec2,
    pub radius: f32,
    pub rotation: Quat,
    pub color: [u8; 3],
}

/// Everything the panorama pass needs for one frame.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameParams {
    pub inv_view_proj: Mat4,
    pub eye: Vec3,
    pub sphere_center: Vec3,
    pub sphere_radius: f32,
    pub transition: TransitionState,
    pub show_sphere: bool,
    pub ambient: f32,
}

pub struct Tour<R: ViewRig, C: ResourceCache> {
    config: TourConfig,
    scene: SceneDirectory,
    panoramas: PanoramaSet,
    rig: R,
    cache: C,
    views: ViewStateMachine,
    cursor: CursorController,
    clicks: ClickTracker,
    viewport: ViewportRect,
    pointer: Option<Vec2>,
    banner: ErrorBanner,
    activity: RenderActivity,
    rebind_requested: bool,
    events: Vec<TourEvent>,
}

pub type HouseTour = Tour<OrbitRig, TextureCatalog>;

impl HouseTour {
    /// Applies the manifest's config overrides and builds an orbit rig.
    pub fn open(manifest: &Manifest, mut config: TourConfig, cache: TextureCatalog) -> Result<Self> {
        config.apply(&manifest.config);
        let rig = OrbitRig::new(&config.camera, &config.controls.third_person);
        Tour::new(manifest, config, rig, cache)
    }
}

impl<R: ViewRig, C: ResourceCache> Tour<R, C> {
    /// `config` is used as given; apply manifest overrides beforehand.
    pub fn new(manifest: &Manifest, config: TourConfig, rig: R, cache: C) -> Result<Self> {
        manifest.validate()?;
        let mut scene = SceneDirectory::new();
        let panoramas = PanoramaSet::build(manifest, &mut scene, &config);
        let views = ViewStateMachine::new(
            ViewCatalog::from_manifest(manifest),
            config.transition.kind,
        );
        let mut tour = Self {
            activity: RenderActivity::new(config.render.idle_timeout),
            config,
            scene,
            panoramas,
            rig,
            cache,
            views,
            cursor: CursorController::new(),
            clicks: ClickTracker::default(),
            viewport: ViewportRect::new(1280.0, 720.0),
            pointer: None,
            banner: ErrorBanner::default(),
            rebind_requested: false,
            events: Vec::new(),
        };

        let start = manifest.start_point.clone();
        let outcome = {
            let (mut ctx, views) = tour.ctx();
            views.start(&start, &mut ctx)
        };
        match outcome {
            ChangeOutcome::Snapped => {}
            ChangeOutcome::Failed => {
                return Err(TourError::MissingResource(format!("start point {start}")));
            }
            other => {
                return Err(TourError::UnknownView(format!("{start} ({other:?})")));
            }
        }
        tour.pump_events();
        Ok(tour)
    }

    fn ctx(&mut self) -> (ViewContext<'_>, &mut ViewStateMachine) {
        (
            ViewContext {
                rig: &mut self.rig,
                scene: &mut self.scene,
                panoramas: &self.panoramas,
                textures: &self.cache,
                config: &self.config,
            },
            &mut self.views,
        )
    }

    pub fn change_view(&mut self, name: &str, opts: ChangeOptions) -> ChangeOutcome {
        let outcome = {
            let (mut ctx, views) = self.ctx();
            views.change_view(name, opts, &mut ctx)
        };
        self.pump_events();
        outcome
    }

    pub fn set_transition_kind(&mut self, kind: TransitionKind) -> bool {
        let changed = self.views.set_transition_kind(kind);
        if changed {
            self.config.transition.kind = kind;
            log::info!("transition style: {}", kind.label());
        }
        changed
    }

    fn pump_events(&mut self) {
        for event in self.views.drain_events() {
            match &event {
                TourEvent::ModeChanged(_) => {
                    self.cursor.reset(&self.scene, &self.config);
                    self.activity.poke();
                }
                TourEvent::Rendering(true) => self.activity.poke(),
                TourEvent::Rendering(false) => {}
                TourEvent::ResourceMissing { view, texture } => {
                    log::warn!("{view}: missing texture {texture}");
                }
            }
            self.events.push(event);
        }
    }

    /// Events since the last call, for the shell's status line.
    pub fn take_events(&mut self) -> Vec<TourEvent> {
        std::mem::take(&mut self.events)
    }

    /// Advances animations. Returns whether a frame should be drawn.
    pub fn tick(&mut self, dt: f32) -> bool {
        if self.activity.is_suspended() {
            return false;
        }
        let animating = {
            let (mut ctx, views) = self.ctx();
            views.tick(dt, &mut ctx)
        };
        let picked = self.cursor.update(dt, &mut self.scene, &self.config);
        self.pump_events();
        if let Some(panorama) = picked {
            self.request_panorama(&panorama);
        }
        let busy = animating || self.views.is_busy() || self.cursor.is_animating();
        self.activity.tick(dt, busy)
    }

    fn request_panorama(&mut self, panorama: &str) {
        let outcome = self.change_view(panorama, ChangeOptions::default());
        log::debug!("hotspot {} -> {:?}", panorama, outcome);
    }

    pub fn resize(&mut self, width: f32, height: f32) {
        if width <= 0.0 || height <= 0.0 {
            return;
        }
        self.viewport.width = width;
        self.viewport.height = height;
        self.rig.resize(width, height, &self.config.camera);
        self.activity.poke();
    }

    fn ray_at(&self, pos: Vec2) -> Ray {
        let ndc = self.viewport.to_ndc(pos);
        Ray::from_ndc(ndc, self.rig.view_proj().inverse())
    }

    fn picking_allowed(&self) -> bool {
        self.views.mode().is_some_and(ViewMode::allows_picking) && !self.views.is_busy()
    }

    pub fn pointer_down(&mut self, pos: Vec2) {
        self.clicks.press(pos);
        self.activity.poke();
    }

    pub fn pointer_move(&mut self, pos: Vec2) {
        self.pointer = Some(pos);
        self.activity.poke();
        if let Some(delta) = self.clicks.moved(pos, self.config.pointer.drag_threshold) {
            let k = self.config.pointer.rotate_sensitivity.to_radians();
            self.rig.rotate(-delta.x * k, -delta.y * k);
            return;
        }
        if self.picking_allowed() {
            let ray = self.ray_at(pos);
            self.cursor.pointer_move(&ray, &self.scene, &self.config);
        }
    }

    pub fn pointer_up(&mut self, pos: Vec2) {
        self.activity.poke();
        if !self.clicks.release(pos, self.config.pointer.drag_threshold) {
            return;
        }
        if !self.picking_allowed() {
            return;
        }
        let ray = self.ray_at(pos);
        if let Some(panorama) = self.cursor.click(&ray, &self.scene, &self.config) {
            self.request_panorama(&panorama);
        }
    }

    pub fn pointer_left(&mut self) {
        self.pointer = None;
        self.cursor.reset(&self.scene, &self.config);
    }

    /// Positive `steps` zoom in.
    pub fn wheel(&mut self, steps: f32) {
        let first_person = self
            .views
            .mode()
            .is_some_and(|m| m.kind().rig_profile() == RigProfile::FirstPerson);
        let limits = if first_person {
            &self.config.controls.first_person
        } else {
            &self.config.controls.third_person
        };
        let step = (limits.max_zoom - limits.min_zoom) / 20.0;
        self.rig.zoom_by(steps * step);
        self.activity.poke();
    }

    pub fn suspend(&mut self) {
        log::debug!("rendering suspended");
        self.activity.suspend();
    }

    pub fn resume(&mut self) {
        log::debug!("rendering resumed");
        self.activity.resume();
    }

    pub fn on_context_lost(&mut self) {
        log::warn!("rendering context lost");
        self.banner.raise(CONTEXT_LOST_MESSAGE);
        self.activity.suspend();
    }

    pub fn on_context_restored(&mut self) {
        log::info!("rendering context restored; rebinding textures");
        self.rebind_requested = true;
        if self.banner.message == CONTEXT_LOST_MESSAGE {
            self.banner.clear();
        }
        self.activity.resume();
    }

    /// True once after a context restore.
    pub fn take_rebind_request(&mut self) -> bool {
        std::mem::take(&mut self.rebind_requested)
    }

    pub fn frame(&self) -> FrameParams {
        let flags = self.views.flags();
        FrameParams {
            inv_view_proj: self.rig.view_proj().inverse(),
            eye: self.rig.position(),
            sphere_center: self.views.sphere_center(),
            sphere_radius: self.config.panorama.sphere_radius,
            transition: *self.views.transition_state(),
            show_sphere: flags.panorama_sphere,
            ambient: flags.ambient_intensity,
        }
    }

    pub fn infospot_labels(&self) -> Vec<InfospotLabel> {
        if self.views.current_panorama().is_none() {
            return Vec::new();
        }
        project_infospots(
            &self.scene,
            self.rig.view_proj(),
            self.viewport.size(),
            self.config.infospot.depth_cutoff,
        )
    }

    pub fn hotspot_markers(&self) -> Vec<HotspotMarker> {
        if !self.views.flags().hotspot_markers {
            return Vec::new();
        }
        project_hotspots(&self.scene, self.rig.view_proj(), self.viewport.size())
    }

    pub fn reticle(&self) -> Option<ReticleOverlay> {
        let reticle = self.cursor.reticle();
        if !reticle.visible || !self.views.flags().reticle {
            return None;
        }
        let view_proj = self.rig.view_proj();
        let viewport = self.viewport.size();
        let (screen, _) = project_to_screen(view_proj, reticle.position, viewport)?;
        let edge = reticle.position + reticle.rotation * Vec3::X * self.config.cursor.size;
        let radius = project_to_screen(view_proj, edge, viewport)
            .map_or(6.0, |(s, _)| s.distance(screen).max(2.0));
        Some(ReticleOverlay {
            screen,
            radius,
            rotation: reticle.rotation,
            color: self.config.cursor.rgb(),
        })
    }

    pub fn affordance(&self) -> PointerAffordance {
        self.cursor.affordance()
    }

    pub fn mode(&self) -> Option<&ViewMode> {
        self.views.mode()
    }

    pub fn flags(&self) -> &SceneFlags {
        self.views.flags()
    }

    pub fn is_transitioning(&self) -> bool {
        self.views.is_busy()
    }

    pub fn progress(&self) -> f32 {
        self.views.progress()
    }

    pub fn transition_kind(&self) -> TransitionKind {
        self.views.transition_kind()
    }

    pub fn transition_state(&self) -> &TransitionState {
        self.views.transition_state()
    }

    pub fn current_texture(&self) -> Option<TextureHandle> {
        self.views.transition_state().from
    }

    pub fn panorama_names(&self) -> impl Iterator<Item = &str> {
        self.panoramas.names()
    }

    pub fn interior_names(&self) -> impl Iterator<Item = &str> {
        self.views.catalog().interior_names()
    }

    pub fn banner(&self) -> &ErrorBanner {
        &self.banner
    }

    pub fn banner_mut(&mut self) -> &mut ErrorBanner {
        &mut self.banner
    }

    pub fn is_render_active(&self) -> bool {
        self.activity.is_active()
    }

    pub fn rig(&self) -> &R {
        &self.rig
    }

    pub fn rig_mut(&mut self) -> &mut R {
        &mut self.rig
    }

    pub fn scene(&self) -> &SceneDirectory {
        &self.scene
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }

    pub fn config(&self) -> &TourConfig {
        &self.config
    }

    pub fn viewport(&self) -> ViewportRect {
        self.viewport
    }

    pub fn pointer(&self) -> Option<Vec2> {
        self.pointer
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn activity_times_out_and_wakes() {
        let mut activity = RenderActivity::new(3.0);
        assert!(activity.tick(1.0, false));
        assert!(activity.tick(1.5, false));
        assert!(!activity.tick(1.0, false));
        assert!(activity.tick(0.1, true));
        activity.tick(5.0, false);
        activity.poke();
        assert!(activity.is_active());
    }

    #[test]
    fn suspended_activity_never_renders() {
        let mut activity = RenderActivity::new(3.0);
        activity.suspend();
        assert!(!activity.tick(0.016, true));
        activity.resume();
        assert!(activity.tick(0.016, false));
    }

    #[test]
    fn banner_raise_and_clear() {
        let mut banner = ErrorBanner::default();
        banner.raise("boom");
        assert!(banner.visible);
        banner.clear();
        assert_eq!(banner, ErrorBanner::default());
    }
}
