/// Uncommitted increments for one player.
///
/// `amount > 0` exactly when `started_at_ms` is set; the engine keeps a scheduler
/// deadline armed for the same interval.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PendingBuffer {
    amount: u32,
    started_at_ms: Option<u64>,
}

impl PendingBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn amount(&self) -> u32 {
        self.amount
    }

    pub fn is_pending(&self) -> bool {
        self.amount > 0
    }

    pub fn started_at_ms(&self) -> Option<u64> {
        self.started_at_ms
    }

    /// Adds `value` to the buffer. Returns `true` when this started a new buffer.
    pub fn propose(&mut self, value: u32, now_ms: u64) -> bool {
        if value == 0 {
            return false;
        }
        let started = self.amount == 0;
        if started {
            self.started_at_ms = Some(now_ms);
        }
        self.amount = self.amount.saturating_add(value);
        started
    }

    /// Drops the buffer, returning the amount that was discarded.
    pub fn cancel(&mut self) -> u32 {
        let dropped = self.amount;
        *self = Self::default();
        dropped
    }

    /// Empties the buffer for commitment.
    pub fn take(&mut self) -> Option<u32> {
        if self.amount == 0 {
            return None;
        }
        let amount = self.amount;
        *self = Self::default();
        Some(amount)
    }
}
