// tween.rs — 缓动曲线与时间线
//
// Animations are plain state machines polled by the frame tick: `advance(dt)`
// returns `Step::Done` exactly once, on the tick that crosses the duration.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ease {
    #[serde(rename = "linear")]
    Linear,
    /// Cubic ease-out (`1 - (1-t)^3`).
    #[serde(rename = "power2.out")]
    Power2Out,
    /// Quartic ease-out (`1 - (1-t)^4`).
    #[default]
    #[serde(rename = "power3.out")]
    Power3Out,
    /// Quintic ease-out (`1 - (1-t)^5`).
    #[serde(rename = "power4.out")]
    Power4Out,
}

impl Ease {
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Ease::Linear => t,
            Ease::Power2Out => 1.0 - (1.0 - t).powi(3),
            Ease::Power3Out => 1.0 - (1.0 - t).powi(4),
            Ease::Power4Out => 1.0 - (1.0 - t).powi(5),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tween {
    duration: f32,
    elapsed: f32,
    ease: Ease,
    finished: bool,
}

impl Tween {
    pub fn new(duration: f32, ease: Ease) -> Self {
        Self {
            duration: duration.max(0.0),
            elapsed: 0.0,
            ease,
            finished: false,
        }
    }

    pub fn advance(&mut self, dt: f32) -> Step {
        if self.finished {
            return Step::Done;
        }
        // 负的 dt (时钟回拨) 视为 0
        self.elapsed += dt.max(0.0);
        if self.elapsed >= self.duration {
            self.elapsed = self.duration;
            self.finished = true;
            Step::Done
        } else {
            Step::InProgress
        }
    }

    /// Linear time fraction in `[0, 1]`.
    pub fn progress(&self) -> f32 {
        if self.duration <= f32::EPSILON {
            return if self.finished { 1.0 } else { 0.0 };
        }
        (self.elapsed / self.duration).clamp(0.0, 1.0)
    }

    pub fn eased(&self) -> f32 {
        self.ease.apply(self.progress())
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// One shared timeline. Starting while a tween is running is rejected.
#[derive(Debug, Default)]
pub struct Timeline {
    tween: Option<Tween>,
}

impl Timeline {
    pub fn start(&mut self, duration: f32, ease: Ease) -> bool {
        if self.tween.is_some() {
            return false;
        }
        self.tween = Some(Tween::new(duration, ease));
        true
    }

    pub fn advance(&mut self, dt: f32) -> Step {
        match self.tween.as_mut() {
            Some(tween) => tween.advance(dt),
            None => Step::Done,
        }
    }

    pub fn progress(&self) -> f32 {
        self.tween.map_or(0.0, |t| t.progress())
    }

    pub fn eased(&self) -> f32 {
        self.tween.map_or(0.0, |t| t.eased())
    }

    pub fn is_active(&self) -> bool {
        self.tween.is_some()
    }

    pub fn clear(&mut self) {
        self.tween = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eases_hit_endpoints() {
        for ease in [Ease::Linear, Ease::Power2Out, Ease::Power3Out, Ease::Power4Out] {
            assert_eq!(ease.apply(0.0), 0.0);
            assert_eq!(ease.apply(1.0), 1.0);
            assert_eq!(ease.apply(-3.0), 0.0);
            assert_eq!(ease.apply(7.0), 1.0);
        }
    }

    #[test]
    fn ease_out_front_loads_motion() {
        assert!(Ease::Power3Out.apply(0.5) > Ease::Power2Out.apply(0.5));
        assert!(Ease::Power2Out.apply(0.5) > Ease::Linear.apply(0.5));
    }

    #[test]
    fn tween_reports_done_once_and_clamps() {
        let mut tween = Tween::new(1.0, Ease::Linear);
        assert_eq!(tween.advance(0.4), Step::InProgress);
        assert!((tween.progress() - 0.4).abs() < 1e-6);
        assert_eq!(tween.advance(5.0), Step::Done);
        assert_eq!(tween.progress(), 1.0);
        assert!(tween.is_finished());
    }

    #[test]
    fn zero_duration_finishes_on_first_advance() {
        let mut tween = Tween::new(0.0, Ease::Power3Out);
        assert_eq!(tween.progress(), 0.0);
        assert_eq!(tween.advance(0.0), Step::Done);
        assert_eq!(tween.progress(), 1.0);
    }

    #[test]
    fn negative_dt_does_not_rewind() {
        let mut tween = Tween::new(1.0, Ease::Linear);
        tween.advance(0.5);
        tween.advance(-0.25);
        assert!((tween.progress() - 0.5).abs() < 1e-6);
    }

    #[test]
    fn timeline_rejects_overlapping_start() {
        let mut timeline = Timeline::default();
        assert!(timeline.start(1.0, Ease::Linear));
        assert!(!timeline.start(2.0, Ease::Linear));
        timeline.advance(0.5);
        assert!((timeline.progress() - 0.5).abs() < 1e-6);
        timeline.clear();
        assert!(!timeline.is_active());
        assert_eq!(timeline.progress(), 0.0);
        assert!(timeline.start(2.0, Ease::Linear));
    }
}
