pub const MAX_SCORE: u32 = 121;
pub const ADVANCE_OPTIONS: [u32; 3] = [1, 2, 5];
pub const COMMIT_DELAY_MS: u64 = 2_000;

pub const MIN_PLAYERS: usize = 2;
pub const MAX_PLAYERS: usize = 3;
pub const DEFAULT_PLAYER_COUNT: usize = MIN_PLAYERS;

pub const TICK_RATE: u32 = 20;
pub const TICK_MS: u64 = 1000 / TICK_RATE as u64;

pub const STATE_FILE_VERSION: u8 = 1;
pub const DEFAULT_STATE_PATH: &str = ".data/scoreboard.json";

pub fn is_supported_player_count(count: usize) -> bool {
    (MIN_PLAYERS..=MAX_PLAYERS).contains(&count)
}

pub fn is_advance_option(value: u32) -> bool {
    ADVANCE_OPTIONS.contains(&value)
}
