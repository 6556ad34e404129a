// transition.rs — 全景图交叉淡化
//
// Two textures are bound to the panorama sphere: `from` (outgoing) and `to`
// (incoming). The shader mixes them by `blend_factor`; styles may drive one
// extra parameter (`aux`: blur for warp, stretch amount for stretch).

use std::f32::consts::PI;

use serde::{Deserialize, Serialize};

use crate::textures::TextureHandle;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionKind {
    #[default]
    None,
    Warp,
    Stretch,
}

impl TransitionKind {
    pub const ALL: [TransitionKind; 3] =
        [TransitionKind::None, TransitionKind::Warp, TransitionKind::Stretch];

    pub fn label(self) -> &'static str {
        match self {
            TransitionKind::None => "none",
            TransitionKind::Warp => "warp",
            TransitionKind::Stretch => "stretch",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TransitionState {
    pub from: Option<TextureHandle>,
    pub to: Option<TextureHandle>,
    pub blend_factor: f32,
    pub aux: f32,
    pub kind: TransitionKind,
}

impl TransitionState {
    fn idle(kind: TransitionKind) -> Self {
        Self {
            from: None,
            to: None,
            blend_factor: 0.0,
            aux: 0.0,
            kind,
        }
    }

    pub fn is_settled(&self) -> bool {
        self.blend_factor == 0.0 && self.aux == 0.0 && self.from == self.to
    }
}

/// Steep curve that holds the old room until late in the move:
/// `(p^15)^2`.
pub fn default_blend(progress: f32) -> f32 {
    let p = progress.clamp(0.0, 1.0).powi(15);
    p * p
}

/// Per-kind hooks around the shared cross-fade driver.
pub trait TransitionStyle: std::fmt::Debug {
    fn kind(&self) -> TransitionKind;

    fn on_start(&mut self, state: &mut TransitionState) {
        state.blend_factor = 0.0;
        state.aux = 0.0;
    }

    fn on_update(&mut self, progress: f32, state: &mut TransitionState);

    fn on_complete(&mut self, state: &mut TransitionState) {
        state.blend_factor = 0.0;
        state.aux = 0.0;
    }
}

#[derive(Debug, Default)]
pub struct CrossFade;

impl TransitionStyle for CrossFade {
    fn kind(&self) -> TransitionKind {
        TransitionKind::None
    }

    fn on_update(&mut self, progress: f32, state: &mut TransitionState) {
        state.blend_factor = default_blend(progress);
    }
}

/// Cross-fade over a blurred sphere; the blur clears as the move lands.
#[derive(Debug, Default)]
pub struct Warp;

impl TransitionStyle for Warp {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Warp
    }

    fn on_start(&mut self, state: &mut TransitionState) {
        state.blend_factor = 0.0;
        state.aux = 1.0;
    }

    fn on_update(&mut self, progress: f32, state: &mut TransitionState) {
        let p = progress.clamp(0.0, 1.0);
        state.blend_factor = default_blend(p);
        state.aux = 1.0 - p * p;
    }
}

/// Cross-fade with the UVs stretched out and back.
#[derive(Debug, Default)]
pub struct Stretch;

impl TransitionStyle for Stretch {
    fn kind(&self) -> TransitionKind {
        TransitionKind::Stretch
    }

    fn on_update(&mut self, progress: f32, state: &mut TransitionState) {
        let p = progress.clamp(0.0, 1.0);
        state.blend_factor = default_blend(p);
        state.aux = 0.25 * (PI * p).sin();
    }
}

pub fn style_for(kind: TransitionKind) -> Box<dyn TransitionStyle> {
    match kind {
        TransitionKind::None => Box::new(CrossFade),
        TransitionKind::Warp => Box::new(Warp),
        TransitionKind::Stretch => Box::new(Stretch),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Blending,
}

#[derive(Debug)]
pub struct TransitionEngine {
    phase: Phase,
    state: TransitionState,
    style: Box<dyn TransitionStyle>,
}

impl TransitionEngine {
    pub fn new(kind: TransitionKind) -> Self {
        Self {
            phase: Phase::Idle,
            state: TransitionState::idle(kind),
            style: style_for(kind),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn state(&self) -> &TransitionState {
        &self.state
    }

    pub fn current(&self) -> Option<TextureHandle> {
        self.state.from
    }

    pub fn kind(&self) -> TransitionKind {
        self.style.kind()
    }

    /// Only switches while idle.
    pub fn set_kind(&mut self, kind: TransitionKind) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.style = style_for(kind);
        self.state.kind = kind;
        true
    }

    /// Shows `texture` at once (first init, interior backdrops).
    pub fn snap(&mut self, texture: TextureHandle) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        self.state.from = Some(texture);
        self.state.to = Some(texture);
        self.state.blend_factor = 0.0;
        self.state.aux = 0.0;
        true
    }

    /// Fails closed: an unresolved target or a running blend leaves the
    /// engine untouched.
    pub fn begin(&mut self, target: Option<TextureHandle>) -> bool {
        if self.phase != Phase::Idle {
            return false;
        }
        let Some(target) = target else {
            return false;
        };
        self.state.to = Some(target);
        if self.state.from.is_none() {
            self.state.from = Some(target);
        }
        self.style.on_start(&mut self.state);
        self.phase = Phase::Blending;
        true
    }

    pub fn update(&mut self, progress: f32) {
        if self.phase == Phase::Blending {
            self.style.on_update(progress, &mut self.state);
        }
    }

    /// Swaps incoming into current and resets every parameter. Safe to call
    /// when idle; returns whether a blend was actually running.
    pub fn complete(&mut self) -> bool {
        let was_blending = self.phase == Phase::Blending;
        self.style.on_complete(&mut self.state);
        if self.state.to.is_some() {
            self.state.from = self.state.to;
        }
        self.state.blend_factor = 0.0;
        self.state.aux = 0.0;
        self.phase = Phase::Idle;
        was_blending
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const A: TextureHandle = TextureHandle(1);
    const B: TextureHandle = TextureHandle(2);

    #[test]
    fn default_curve_is_monotonic_with_fixed_endpoints() {
        assert_eq!(default_blend(0.0), 0.0);
        assert_eq!(default_blend(1.0), 1.0);
        let mut last = 0.0;
        for i in 0..=1000 {
            let b = default_blend(i as f32 / 1000.0);
            assert!(b >= last);
            last = b;
        }
        // most of the fade lands in the last stretch of the move
        assert!(default_blend(0.9) < 0.05);
    }

    #[test]
    fn unresolved_target_stays_idle() {
        let mut engine = TransitionEngine::new(TransitionKind::None);
        engine.snap(A);
        assert!(!engine.begin(None));
        assert_eq!(engine.phase(), Phase::Idle);
        assert_eq!(engine.current(), Some(A));
        assert!(engine.state().is_settled());
    }

    #[test]
    fn blend_swaps_and_resets_on_complete() {
        let mut engine = TransitionEngine::new(TransitionKind::None);
        engine.snap(A);
        assert!(engine.begin(Some(B)));
        assert!(!engine.begin(Some(A)));
        assert_eq!(engine.state().from, Some(A));
        assert_eq!(engine.state().to, Some(B));
        engine.update(0.99);
        assert!(engine.state().blend_factor > 0.0);
        assert!(engine.complete());
        assert_eq!(engine.state().from, Some(B));
        assert!(engine.state().is_settled());
        assert!(!engine.complete());
        assert!(engine.state().is_settled());
    }

    #[test]
    fn styles_drive_and_reset_aux() {
        for kind in [TransitionKind::Warp, TransitionKind::Stretch] {
            let mut engine = TransitionEngine::new(kind);
            engine.snap(A);
            engine.begin(Some(B));
            engine.update(0.5);
            assert!(engine.state().aux > 0.0, "{kind:?}");
            engine.complete();
            assert_eq!(engine.state().aux, 0.0);
            assert_eq!(engine.state().blend_factor, 0.0);
        }
    }

    #[test]
    fn kind_changes_only_when_idle() {
        let mut engine = TransitionEngine::new(TransitionKind::None);
        engine.snap(A);
        engine.begin(Some(B));
        assert!(!engine.set_kind(TransitionKind::Warp));
        engine.complete();
        assert!(engine.set_kind(TransitionKind::Warp));
        assert_eq!(engine.kind(), TransitionKind::Warp);
        assert_eq!(engine.state().kind, TransitionKind::Warp);
    }

    #[test]
    fn kind_parses_lowercase() {
        let kind: TransitionKind = serde_json::from_str("\"stretch\"").unwrap();
        assert_eq!(kind, TransitionKind::Stretch);
    }
}
