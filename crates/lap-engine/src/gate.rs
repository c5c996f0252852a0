//! Frame-rate gate

/// Default processing rate (frames per second)
pub const DEFAULT_FPS: u32 = 30;

/// Drops frames arriving sooner than the minimum interval after the last
/// accepted one.
#[derive(Debug, Clone)]
pub struct FrameGate {
    min_interval_ms: u64,
    last_accepted_ms: Option<u64>,
}

impl FrameGate {
    pub fn new(min_interval_ms: u64) -> Self {
        Self {
            min_interval_ms,
            last_accepted_ms: None,
        }
    }

    /// Gate for `fps` frames per second (at least 1)
    pub fn from_fps(fps: u32) -> Self {
        Self::new(1000 / u64::from(fps.max(1)))
    }

    pub fn min_interval_ms(&self) -> u64 {
        self.min_interval_ms
    }

    /// Whether the frame at `now_ms` should be processed
    pub fn accept(&mut self, now_ms: u64) -> bool {
        match self.last_accepted_ms {
            Some(last) if now_ms.saturating_sub(last) < self.min_interval_ms => false,
            _ => {
                self.last_accepted_ms = Some(now_ms);
                true
            }
        }
    }

    pub fn reset(&mut self) {
        self.last_accepted_ms = None;
    }
}

impl Default for FrameGate {
    fn default() -> Self {
        Self::from_fps(DEFAULT_FPS)
    }
}
