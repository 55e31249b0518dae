use crate::constants::MAX_SCORE;
use crate::types::{Batch, PlayerRecord};

/// Outcome of committing an increment into a ledger.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LedgerCommit {
    pub batch: Option<Batch>,
    pub reached_max: bool,
}

/// Committed score for one player plus the batches that produced it.
///
/// Batch values record the amount actually applied, so `score` always equals the sum of
/// the batch values even when the final increment is clamped at [`MAX_SCORE`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PlayerLedger {
    score: u32,
    batches: Vec<Batch>,
}

impl PlayerLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from persisted batches. Returns the index of the first batch that
    /// does not replay cleanly.
    pub fn from_batches(batches: Vec<Batch>) -> Result<Self, usize> {
        let mut score = 0u32;
        for (index, batch) in batches.iter().enumerate() {
            if batch.value == 0 {
                return Err(index);
            }
            let next = score.saturating_add(batch.value);
            if next > MAX_SCORE || next != batch.score_after {
                return Err(index);
            }
            score = next;
        }
        Ok(Self { score, batches })
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn batches(&self) -> &[Batch] {
        &self.batches
    }

    pub fn is_finished(&self) -> bool {
        self.score >= MAX_SCORE
    }

    pub fn commit(&mut self, value: u32) -> LedgerCommit {
        debug_assert!(value > 0, "ledger commits must be positive");
        let new_score = self.score.saturating_add(value).min(MAX_SCORE);
        let applied = new_score - self.score;
        let batch = if applied > 0 {
            let batch = Batch {
                value: applied,
                score_after: new_score,
            };
            self.batches.push(batch);
            self.score = new_score;
            Some(batch)
        } else {
            None
        };
        LedgerCommit {
            batch,
            reached_max: new_score == MAX_SCORE,
        }
    }

    pub fn undo_last(&mut self) -> Option<Batch> {
        let removed = self.batches.pop()?;
        self.score = self.score.saturating_sub(removed.value);
        Some(removed)
    }

    pub fn to_record(&self) -> PlayerRecord {
        PlayerRecord {
            score: self.score,
            batches: self.batches.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_appends_batch_with_running_score() {
        let mut ledger = PlayerLedger::new();
        ledger.commit(8);
        ledger.commit(5);
        assert_eq!(ledger.score(), 13);
        assert_eq!(
            ledger.batches(),
            &[
                Batch {
                    value: 8,
                    score_after: 8
                },
                Batch {
                    value: 5,
                    score_after: 13
                }
            ]
        );
    }

    #[test]
    fn commit_clamps_at_max_and_signals_win() {
        let mut ledger = PlayerLedger::from_batches(vec![Batch {
            value: 119,
            score_after: 119,
        }])
        .expect("valid history");
        let outcome = ledger.commit(5);
        assert!(outcome.reached_max);
        assert_eq!(ledger.score(), MAX_SCORE);
        assert_eq!(
            outcome.batch,
            Some(Batch {
                value: 2,
                score_after: MAX_SCORE
            })
        );
        let sum: u32 = ledger.batches().iter().map(|batch| batch.value).sum();
        assert_eq!(sum, ledger.score());
    }

    #[test]
    fn commit_at_max_appends_nothing() {
        let mut ledger = PlayerLedger::new();
        ledger.commit(200);
        assert_eq!(ledger.batches().len(), 1);
        let outcome = ledger.commit(1);
        assert!(outcome.reached_max);
        assert_eq!(outcome.batch, None);
        assert_eq!(ledger.batches().len(), 1);
    }

    #[test]
    fn undo_last_restores_clamped_score_exactly() {
        let mut ledger = PlayerLedger::new();
        ledger.commit(119);
        ledger.commit(5);
        let removed = ledger.undo_last().expect("batch removed");
        assert_eq!(removed.value, 2);
        assert_eq!(ledger.score(), 119);
        assert_eq!(ledger.batches().len(), 1);
    }

    #[test]
    fn undo_last_on_empty_ledger_is_noop() {
        let mut ledger = PlayerLedger::new();
        assert_eq!(ledger.undo_last(), None);
        assert_eq!(ledger.score(), 0);
    }

    #[test]
    fn from_batches_rejects_inconsistent_history() {
        assert_eq!(
            PlayerLedger::from_batches(vec![Batch {
                value: 0,
                score_after: 0
            }]),
            Err(0)
        );
        assert_eq!(
            PlayerLedger::from_batches(vec![
                Batch {
                    value: 3,
                    score_after: 3
                },
                Batch {
                    value: 2,
                    score_after: 6
                }
            ]),
            Err(1)
        );
        assert_eq!(
            PlayerLedger::from_batches(vec![Batch {
                value: 122,
                score_after: 122
            }]),
            Err(0)
        );
    }
}
