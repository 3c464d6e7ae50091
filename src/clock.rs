use std::time::Instant;

/// Millisecond tick counter, wrapping at `u32::MAX` like an MCU `millis()`.
pub trait Clock {
    fn millis(&self) -> u32;
}

pub struct SystemClock {
    start: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        SystemClock { start: Instant::now() }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u32 {
        // truncation is the wrap
        self.start.elapsed().as_millis() as u32
    }
}
