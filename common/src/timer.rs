/// One-shot countdown measured against the caller's monotonic clock.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountdownTimer {
    start_ms: Option<u64>,
    duration_ms: u64,
}

impl CountdownTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn start(&mut self, duration_ms: u64, now_ms: u64) {
        self.start_ms = Some(now_ms);
        self.duration_ms = duration_ms;
    }

    pub fn cancel(&mut self) {
        self.start_ms = None;
    }

    pub fn is_running(&self) -> bool {
        self.start_ms.is_some()
    }

    /// A timer that was never started is not elapsed.
    pub fn is_elapsed(&self, now_ms: u64) -> bool {
        match self.start_ms {
            Some(start) => now_ms.saturating_sub(start) >= self.duration_ms,
            None => false,
        }
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        match self.start_ms {
            Some(start) => {
                let elapsed = now_ms.saturating_sub(start);
                self.duration_ms.saturating_sub(elapsed)
            }
            None => 0,
        }
    }
}
