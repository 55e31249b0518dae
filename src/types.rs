use serde::{Deserialize, Serialize};

/// One committed increment, with the score it left the player at.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Batch {
    pub value: u32,
    #[serde(rename = "scoreAfter", alias = "score_after", alias = "at")]
    pub score_after: u32,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResetState {
    #[default]
    Reset,
    Undo,
}

impl ResetState {
    pub fn label(self) -> &'static str {
        match self {
            Self::Reset => "Reset",
            Self::Undo => "Undo Reset",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CommitCause {
    Timer,
    Explicit,
    Settlement,
}

#[derive(Clone, Debug, Serialize)]
pub struct PlayerView {
    pub index: usize,
    pub score: u32,
    pub batches: Vec<Batch>,
    pub buffer: u32,
    pub pending: bool,
    #[serde(rename = "displayScore")]
    pub display_score: u32,
    #[serde(rename = "bufferStartedAtMs")]
    pub buffer_started_at_ms: Option<u64>,
    #[serde(rename = "commitDueAtMs")]
    pub commit_due_at_ms: Option<u64>,
    #[serde(rename = "countdownProgress")]
    pub countdown_progress: f32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScoreEvent {
    BufferProposed {
        player: usize,
        value: u32,
        buffer: u32,
    },
    BufferCancelled {
        player: usize,
        value: u32,
    },
    BatchCommitted {
        player: usize,
        #[serde(rename = "batchIndex")]
        batch_index: usize,
        value: u32,
        score: u32,
        cause: CommitCause,
    },
    BatchUndone {
        player: usize,
        value: u32,
        score: u32,
    },
    PlayerWon {
        player: usize,
    },
    GameReset,
    ResetUndone,
    PlayerCountChanged {
        count: usize,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct Snapshot {
    #[serde(rename = "nowMs")]
    pub now_ms: u64,
    #[serde(rename = "maxScore")]
    pub max_score: u32,
    #[serde(rename = "commitDelayMs")]
    pub commit_delay_ms: u64,
    #[serde(rename = "playerCount")]
    pub player_count: usize,
    pub players: Vec<PlayerView>,
    pub winner: Option<usize>,
    #[serde(rename = "resetState")]
    pub reset_state: ResetState,
    #[serde(rename = "resetLabel")]
    pub reset_label: &'static str,
    pub events: Vec<ScoreEvent>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerRecord {
    pub score: u32,
    pub batches: Vec<Batch>,
}

/// Committed game state as it is persisted. Pending buffers are never part of it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameRecord {
    #[serde(rename = "playerCount", alias = "player_count")]
    pub player_count: usize,
    pub players: Vec<PlayerRecord>,
    pub winner: Option<usize>,
}
