// guard.rs — 单飞保护 (同一时间只允许一个过渡)

/// Gate shared by camera motion and the panorama cross-fade. A request that
/// finds the guard taken is dropped, never queued.
#[derive(Debug, Default)]
pub struct TransitionGuard {
    active: bool,
}

impl TransitionGuard {
    pub fn try_begin(&mut self) -> bool {
        if self.active {
            return false;
        }
        self.active = true;
        true
    }

    /// Releasing an idle guard is allowed.
    pub fn end(&mut self) {
        self.active = false;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }
}
