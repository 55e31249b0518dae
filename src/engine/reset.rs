use crate::ledger::PlayerLedger;
use crate::types::ResetState;

/// Committed state captured by a reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(super) struct ResetSnapshot {
    pub ledgers: Vec<PlayerLedger>,
    pub winner: Option<usize>,
}

/// Two-state reset button. The snapshot outlives a return to `Reset` caused by new play;
/// only undoing the reset, a later reset, or a player-count change drops it.
#[derive(Clone, Debug, Default)]
pub(super) struct ResetToggle {
    state: ResetState,
    snapshot: Option<ResetSnapshot>,
}

impl ResetToggle {
    pub fn state(&self) -> ResetState {
        self.state
    }

    pub fn has_snapshot(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn hold(&mut self, snapshot: ResetSnapshot) {
        self.snapshot = Some(snapshot);
        self.state = ResetState::Undo;
    }

    pub fn take_for_restore(&mut self) -> Option<ResetSnapshot> {
        self.state = ResetState::Reset;
        self.snapshot.take()
    }

    /// New play abandons the undo opportunity without touching the snapshot.
    pub fn abandon_undo(&mut self) -> bool {
        if self.state == ResetState::Undo {
            self.state = ResetState::Reset;
            return true;
        }
        false
    }

    pub fn clear(&mut self) {
        self.state = ResetState::Reset;
        self.snapshot = None;
    }
}
