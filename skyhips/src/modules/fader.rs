//! Linear fade toward an on/off target.

/// Default duration of a full fade in seconds.
pub const DEFAULT_FADE_DURATION_SECS: f64 = 1.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Fader {
    pub target: bool,
    value: f64,
    duration: f64,
}

impl Fader {
    /// Fader resting at `on`.
    pub fn new(on: bool) -> Self {
        Self {
            target: on,
            value: if on { 1.0 } else { 0.0 },
            duration: DEFAULT_FADE_DURATION_SECS,
        }
    }

    pub fn with_duration(mut self, secs: f64) -> Self {
        self.duration = secs;
        self
    }

    /// Current value in `[0, 1]`.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Step toward the target. Returns true if the value changed.
    pub fn update(&mut self, dt: f64) -> bool {
        let goal = if self.target { 1.0 } else { 0.0 };
        if self.value == goal {
            return false;
        }
        let step = if self.duration > 0.0 {
            dt / self.duration
        } else {
            1.0
        };
        self.value = if goal > self.value {
            (self.value + step).min(goal)
        } else {
            (self.value - step).max(goal)
        };
        true
    }
}

impl Default for Fader {
    fn default() -> Self {
        Self::new(true)
    }
}

/// Hermite interpolation between `edge0` and `edge1`.
pub fn smoothstep(edge0: f64, edge1: f64, x: f64) -> f64 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}
