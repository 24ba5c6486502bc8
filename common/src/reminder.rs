use crate::timer::CountdownTimer;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReminderOutcome {
    Waiting,
    /// Wait timer elapsed; the cue should be replayed. Carries the new count.
    Remind(u8),
    /// Budget spent. The count has already been reset.
    Exhausted,
}

/// Bounded nagging for phases that wait on the user.
#[derive(Debug, Clone)]
pub struct ReminderPolicy {
    count: u8,
    max_reminders: u8,
    interval_ms: u64,
    wait_timer: CountdownTimer,
}

impl ReminderPolicy {
    pub fn new(max_reminders: u8, interval_ms: u64) -> Self {
        Self {
            count: 0,
            max_reminders,
            interval_ms,
            wait_timer: CountdownTimer::new(),
        }
    }

    pub fn count(&self) -> u8 {
        self.count
    }

    pub fn max_reminders(&self) -> u8 {
        self.max_reminders
    }

    pub fn remaining_ms(&self, now_ms: u64) -> u64 {
        self.wait_timer.remaining_ms(now_ms)
    }

    /// Reset the count and start waiting from `now_ms`.
    pub fn arm(&mut self, now_ms: u64) {
        self.count = 0;
        self.wait_timer.start(self.interval_ms, now_ms);
    }

    pub fn reset(&mut self) {
        self.count = 0;
        self.wait_timer.cancel();
    }

    pub fn poll(&mut self, now_ms: u64) -> ReminderOutcome {
        if !self.wait_timer.is_elapsed(now_ms) {
            return ReminderOutcome::Waiting;
        }

        if self.count < self.max_reminders {
            self.count += 1;
            self.wait_timer.start(self.interval_ms, now_ms);
            ReminderOutcome::Remind(self.count)
        } else {
            self.reset();
            ReminderOutcome::Exhausted
        }
    }
}
