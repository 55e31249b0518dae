use tracing::{debug, info, warn};

use crate::constants::{is_supported_player_count, COMMIT_DELAY_MS, DEFAULT_PLAYER_COUNT, MAX_SCORE};
use crate::error::{CommandRejected, RecordError};
use crate::ledger::PlayerLedger;
use crate::pending::PendingBuffer;
use crate::scheduler::CommitScheduler;
use crate::types::{CommitCause, GameRecord, PlayerView, ResetState, ScoreEvent, Snapshot};

mod reset;
mod utils;

use self::reset::{ResetSnapshot, ResetToggle};
pub use self::utils::MonotonicClock;

#[derive(Clone, Copy, Debug)]
pub struct GameEngineOptions {
    pub commit_delay_ms: u64,
    pub player_count: usize,
}

impl Default for GameEngineOptions {
    fn default() -> Self {
        Self {
            commit_delay_ms: COMMIT_DELAY_MS,
            player_count: DEFAULT_PLAYER_COUNT,
        }
    }
}

#[derive(Clone, Debug, Default)]
struct PlayerSlot {
    ledger: PlayerLedger,
    buffer: PendingBuffer,
}

impl PlayerSlot {
    fn from_ledger(ledger: PlayerLedger) -> Self {
        Self {
            ledger,
            buffer: PendingBuffer::new(),
        }
    }
}

/// Scoreboard state machine. Every mutation goes through the command methods below;
/// time is passed in by the caller and deferred commits fire from [`GameEngine::step`].
#[derive(Clone, Debug)]
pub struct GameEngine {
    players: Vec<PlayerSlot>,
    winner: Option<usize>,
    scheduler: CommitScheduler,
    reset: ResetToggle,
    events: Vec<ScoreEvent>,
}

impl GameEngine {
    pub fn new(options: GameEngineOptions) -> Self {
        let player_count = if is_supported_player_count(options.player_count) {
            options.player_count
        } else {
            DEFAULT_PLAYER_COUNT
        };
        Self {
            players: fresh_players(player_count),
            winner: None,
            scheduler: CommitScheduler::new(options.commit_delay_ms),
            reset: ResetToggle::default(),
            events: Vec::new(),
        }
    }

    pub fn from_record(record: GameRecord, options: GameEngineOptions) -> Result<Self, RecordError> {
        if !is_supported_player_count(record.player_count) {
            return Err(RecordError::PlayerCount(record.player_count));
        }
        if record.players.len() != record.player_count {
            return Err(RecordError::PlayerMismatch {
                expected: record.player_count,
                found: record.players.len(),
            });
        }

        let mut players = Vec::with_capacity(record.player_count);
        for (index, player) in record.players.into_iter().enumerate() {
            let ledger = PlayerLedger::from_batches(player.batches).map_err(|batch| {
                RecordError::Batch {
                    player: index,
                    batch,
                }
            })?;
            if ledger.score() != player.score {
                return Err(RecordError::Score {
                    player: index,
                    score: player.score,
                });
            }
            players.push(PlayerSlot::from_ledger(ledger));
        }
        if let Some(winner) = record.winner {
            let finished = players
                .get(winner)
                .is_some_and(|slot| slot.ledger.is_finished());
            if !finished {
                return Err(RecordError::Winner(winner));
            }
        }

        let mut engine = Self::new(options);
        engine.players = players;
        engine.winner = record.winner;
        Ok(engine)
    }

    /// Starts from a saved record when it is usable, otherwise from a fresh game.
    pub fn restore(record: Option<GameRecord>, options: GameEngineOptions) -> Self {
        let Some(record) = record else {
            return Self::new(options);
        };
        match Self::from_record(record, options) {
            Ok(engine) => {
                info!(
                    player_count = engine.player_count(),
                    winner = ?engine.winner,
                    "restored saved game"
                );
                engine
            }
            Err(error) => {
                warn!(%error, "discarding saved game");
                Self::new(options)
            }
        }
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn winner(&self) -> Option<usize> {
        self.winner
    }

    pub fn reset_state(&self) -> ResetState {
        self.reset.state()
    }

    pub fn commit_delay_ms(&self) -> u64 {
        self.scheduler.delay_ms()
    }

    pub fn ledger(&self, player: usize) -> Option<&PlayerLedger> {
        self.players.get(player).map(|slot| &slot.ledger)
    }

    pub fn buffer(&self, player: usize) -> Option<&PendingBuffer> {
        self.players.get(player).map(|slot| &slot.buffer)
    }

    pub fn pending_player(&self) -> Option<usize> {
        self.players
            .iter()
            .position(|slot| slot.buffer.is_pending())
    }

    pub fn commit_due_at(&self, player: usize) -> Option<u64> {
        self.scheduler.due_at(player)
    }

    pub fn countdown_progress(&self, player: usize, now_ms: u64) -> f32 {
        self.scheduler.progress(player, now_ms)
    }

    pub fn advance(&mut self, player: usize, value: u32, now_ms: u64) -> Result<(), CommandRejected> {
        if let Some(winner) = self.winner {
            return Err(CommandRejected::GameOver { winner });
        }
        self.check_player(player)?;
        if value == 0 {
            return Err(CommandRejected::InvalidValue);
        }

        for other in 0..self.players.len() {
            if other != player && self.players[other].buffer.is_pending() {
                self.commit_buffer(other, CommitCause::Settlement);
            }
        }
        if self.reset.abandon_undo() {
            debug!(player, "new play abandoned reset undo");
        }
        if let Some(winner) = self.winner {
            debug!(player, winner, "settlement finished the game, increment discarded");
            return Ok(());
        }

        let slot = &mut self.players[player];
        slot.buffer.propose(value, now_ms);
        let buffer = slot.buffer.amount();
        self.scheduler.arm(player, now_ms);
        self.events.push(ScoreEvent::BufferProposed {
            player,
            value,
            buffer,
        });
        Ok(())
    }

    pub fn commit_now(&mut self, player: usize) -> Result<(), CommandRejected> {
        self.check_player(player)?;
        self.commit_buffer(player, CommitCause::Explicit);
        Ok(())
    }

    pub fn undo(&mut self, player: usize) -> Result<(), CommandRejected> {
        self.check_player(player)?;
        let slot = &mut self.players[player];
        if slot.buffer.is_pending() {
            let value = slot.buffer.cancel();
            self.scheduler.disarm(player);
            self.events.push(ScoreEvent::BufferCancelled { player, value });
        } else if let Some(batch) = slot.ledger.undo_last() {
            self.events.push(ScoreEvent::BatchUndone {
                player,
                value: batch.value,
                score: slot.ledger.score(),
            });
        }
        // Any undo reopens the game, not only one targeting the winner.
        self.winner = None;
        Ok(())
    }

    pub fn set_player_count(&mut self, count: usize) -> Result<(), CommandRejected> {
        if !is_supported_player_count(count) {
            return Err(CommandRejected::InvalidPlayerCount { requested: count });
        }
        for removed in count..self.players.len() {
            self.scheduler.disarm(removed);
        }
        self.players.resize_with(count, PlayerSlot::default);
        self.winner = None;
        self.reset.clear();
        self.events.push(ScoreEvent::PlayerCountChanged { count });
        info!(count, "player count changed");
        Ok(())
    }

    /// Flips the reset toggle and returns its new state.
    pub fn reset(&mut self) -> ResetState {
        self.cancel_all_buffers();
        match self.reset.state() {
            ResetState::Reset => {
                let ledgers = self.players.iter().map(|slot| slot.ledger.clone()).collect();
                let winner = self.winner.take();
                self.reset.hold(ResetSnapshot { ledgers, winner });
                self.players = fresh_players(self.players.len());
                self.events.push(ScoreEvent::GameReset);
                info!(player_count = self.players.len(), "game reset");
            }
            ResetState::Undo => {
                if let Some(snapshot) = self.reset.take_for_restore() {
                    self.players = snapshot
                        .ledgers
                        .into_iter()
                        .map(PlayerSlot::from_ledger)
                        .collect();
                    self.winner = snapshot.winner;
                }
                self.events.push(ScoreEvent::ResetUndone);
                info!(player_count = self.players.len(), "game reset undone");
            }
        }
        self.reset.state()
    }

    /// Commits every buffer whose countdown has run out. Returns the committed players.
    pub fn step(&mut self, now_ms: u64) -> Vec<usize> {
        self.scheduler
            .take_expired(now_ms)
            .into_iter()
            .filter(|player| self.commit_buffer(*player, CommitCause::Timer))
            .collect()
    }

    pub fn player_view(&self, player: usize, now_ms: u64) -> Option<PlayerView> {
        let slot = self.players.get(player)?;
        let score = slot.ledger.score();
        let buffer = slot.buffer.amount();
        Some(PlayerView {
            index: player,
            score,
            batches: slot.ledger.batches().to_vec(),
            buffer,
            pending: slot.buffer.is_pending(),
            display_score: score.saturating_add(buffer).min(MAX_SCORE),
            buffer_started_at_ms: slot.buffer.started_at_ms(),
            commit_due_at_ms: self.scheduler.due_at(player),
            countdown_progress: self.scheduler.progress(player, now_ms),
        })
    }

    pub fn build_snapshot(&mut self, now_ms: u64, include_events: bool) -> Snapshot {
        let players = (0..self.players.len())
            .filter_map(|player| self.player_view(player, now_ms))
            .collect();
        let events = if include_events {
            std::mem::take(&mut self.events)
        } else {
            Vec::new()
        };
        let reset_state = self.reset.state();
        Snapshot {
            now_ms,
            max_score: MAX_SCORE,
            commit_delay_ms: self.scheduler.delay_ms(),
            player_count: self.players.len(),
            players,
            winner: self.winner,
            reset_state,
            reset_label: reset_state.label(),
            events,
        }
    }

    pub fn to_record(&self) -> GameRecord {
        GameRecord {
            player_count: self.players.len(),
            players: self
                .players
                .iter()
                .map(|slot| slot.ledger.to_record())
                .collect(),
            winner: self.winner,
        }
    }

    fn check_player(&self, player: usize) -> Result<(), CommandRejected> {
        if player >= self.players.len() {
            return Err(CommandRejected::UnknownPlayer {
                index: player,
                count: self.players.len(),
            });
        }
        Ok(())
    }

    fn commit_buffer(&mut self, player: usize, cause: CommitCause) -> bool {
        self.scheduler.disarm(player);
        let Some(slot) = self.players.get_mut(player) else {
            return false;
        };
        let Some(amount) = slot.buffer.take() else {
            return false;
        };

        let outcome = slot.ledger.commit(amount);
        let score = slot.ledger.score();
        if let Some(batch) = outcome.batch {
            self.events.push(ScoreEvent::BatchCommitted {
                player,
                batch_index: slot.ledger.batches().len() - 1,
                value: batch.value,
                score,
                cause,
            });
        }
        debug!(player, amount, score, ?cause, "buffer committed");

        if outcome.reached_max && self.winner.is_none() {
            self.winner = Some(player);
            self.events.push(ScoreEvent::PlayerWon { player });
            info!(player, "player reached the finish");
        }
        true
    }

    fn cancel_all_buffers(&mut self) {
        self.scheduler.disarm_all();
        for (player, slot) in self.players.iter_mut().enumerate() {
            let value = slot.buffer.cancel();
            if value > 0 {
                self.events.push(ScoreEvent::BufferCancelled { player, value });
            }
        }
    }
}

fn fresh_players(count: usize) -> Vec<PlayerSlot> {
    (0..count).map(|_| PlayerSlot::default()).collect()
}
