use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Deadline {
    armed_at_ms: u64,
    due_at_ms: u64,
}

/// One deferred commit per player index. Arming an index replaces its previous deadline.
#[derive(Clone, Debug)]
pub struct CommitScheduler {
    delay_ms: u64,
    deadlines: BTreeMap<usize, Deadline>,
}

impl CommitScheduler {
    pub fn new(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            deadlines: BTreeMap::new(),
        }
    }

    pub fn delay_ms(&self) -> u64 {
        self.delay_ms
    }

    pub fn arm(&mut self, player: usize, now_ms: u64) {
        self.deadlines.insert(
            player,
            Deadline {
                armed_at_ms: now_ms,
                due_at_ms: now_ms.saturating_add(self.delay_ms),
            },
        );
    }

    pub fn disarm(&mut self, player: usize) -> bool {
        self.deadlines.remove(&player).is_some()
    }

    pub fn disarm_all(&mut self) {
        self.deadlines.clear();
    }

    pub fn is_armed(&self, player: usize) -> bool {
        self.deadlines.contains_key(&player)
    }

    pub fn due_at(&self, player: usize) -> Option<u64> {
        self.deadlines.get(&player).map(|deadline| deadline.due_at_ms)
    }

    /// Fraction of the countdown that has elapsed, `0.0` when nothing is armed.
    pub fn progress(&self, player: usize, now_ms: u64) -> f32 {
        let Some(deadline) = self.deadlines.get(&player) else {
            return 0.0;
        };
        if self.delay_ms == 0 {
            return 1.0;
        }
        let elapsed = now_ms.saturating_sub(deadline.armed_at_ms);
        (elapsed as f64 / self.delay_ms as f64).min(1.0) as f32
    }

    /// Removes and returns every player whose deadline is at or before `now_ms`.
    pub fn take_expired(&mut self, now_ms: u64) -> Vec<usize> {
        let expired: Vec<usize> = self
            .deadlines
            .iter()
            .filter(|(_, deadline)| deadline.due_at_ms <= now_ms)
            .map(|(player, _)| *player)
            .collect();
        for player in &expired {
            self.deadlines.remove(player);
        }
        expired
    }
}
