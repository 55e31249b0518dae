use std::fs;
use std::path::{Path, PathBuf};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::constants::STATE_FILE_VERSION;
use crate::error::StoreError;
use crate::types::GameRecord;

#[derive(Clone, Debug, Serialize)]
struct GameStoreFile<'a> {
    version: u8,
    #[serde(rename = "savedAtIso")]
    saved_at_iso: String,
    game: &'a GameRecord,
}

#[derive(Clone, Debug, Deserialize)]
struct GameStoreFileRaw {
    version: u8,
    game: serde_json::Value,
}

/// Best-effort JSON file holding the committed game. Reads never fail the caller; a
/// missing or unusable file reads as "nothing saved".
#[derive(Clone, Debug)]
pub struct FileGameStore {
    file_path: PathBuf,
}

impl FileGameStore {
    pub fn new(file_path: PathBuf) -> Self {
        Self { file_path }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn load(&self) -> Option<GameRecord> {
        load_record(&self.file_path)
    }

    pub fn save(&self, record: &GameRecord) -> Result<(), StoreError> {
        if let Some(parent) = self.file_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        let payload = GameStoreFile {
            version: STATE_FILE_VERSION,
            saved_at_iso: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            game: record,
        };
        let text = serde_json::to_string_pretty(&payload)?;
        fs::write(&self.file_path, text).map_err(|source| StoreError::Write {
            path: self.file_path.clone(),
            source,
        })?;
        debug!(path = %self.file_path.display(), "game state saved");
        Ok(())
    }
}

fn load_record(path: &Path) -> Option<GameRecord> {
    let text = match fs::read_to_string(path) {
        Ok(value) => value,
        Err(error) => {
            if error.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), %error, "failed to read saved game");
            }
            return None;
        }
    };
    let parsed = match serde_json::from_str::<GameStoreFileRaw>(&text) {
        Ok(value) if value.version == STATE_FILE_VERSION => value,
        Ok(value) => {
            warn!(
                path = %path.display(),
                version = value.version,
                "unsupported saved game version"
            );
            return None;
        }
        Err(error) => {
            warn!(path = %path.display(), %error, "failed to parse saved game");
            return None;
        }
    };

    match serde_json::from_value::<GameRecord>(parsed.game) {
        Ok(record) => Some(record),
        Err(error) => {
            warn!(path = %path.display(), %error, "saved game does not match schema");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Batch, PlayerRecord};

    fn temp_file(name: &str) -> PathBuf {
        let unique = format!(
            "{}-{}-{}",
            name,
            std::process::id(),
            rand::random::<u64>()
        );
        std::env::temp_dir().join(unique).join("scoreboard.json")
    }

    fn sample_record() -> GameRecord {
        GameRecord {
            player_count: 2,
            players: vec![
                PlayerRecord {
                    score: 8,
                    batches: vec![Batch {
                        value: 8,
                        score_after: 8,
                    }],
                },
                PlayerRecord {
                    score: 0,
                    batches: Vec::new(),
                },
            ],
            winner: None,
        }
    }

    fn cleanup(path: &Path) {
        let _ = fs::remove_file(path);
        if let Some(parent) = path.parent() {
            let _ = fs::remove_dir_all(parent);
        }
    }

    #[test]
    fn save_then_load_returns_same_record() {
        let path = temp_file("game-store-save");
        let store = FileGameStore::new(path.clone());
        store.save(&sample_record()).expect("save succeeds");
        assert_eq!(store.load(), Some(sample_record()));
        cleanup(&path);
    }

    #[test]
    fn missing_file_loads_nothing() {
        let path = temp_file("game-store-missing");
        assert_eq!(FileGameStore::new(path).load(), None);
    }

    #[test]
    fn corrupt_file_loads_nothing() {
        let path = temp_file("game-store-corrupt");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        fs::write(&path, "{ not json").expect("write file");
        assert_eq!(FileGameStore::new(path.clone()).load(), None);
        cleanup(&path);
    }

    #[test]
    fn unsupported_version_loads_nothing() {
        let path = temp_file("game-store-version");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        let raw = r#"{
  "version": 9,
  "game": { "playerCount": 2, "players": [], "winner": null }
}"#;
        fs::write(&path, raw).expect("write file");
        assert_eq!(FileGameStore::new(path.clone()).load(), None);
        cleanup(&path);
    }

    #[test]
    fn schema_mismatch_loads_nothing() {
        let path = temp_file("game-store-schema");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        let raw = r#"{
  "version": 1,
  "game": { "playerCount": "two", "players": {} }
}"#;
        fs::write(&path, raw).expect("write file");
        assert_eq!(FileGameStore::new(path.clone()).load(), None);
        cleanup(&path);
    }

    #[test]
    fn load_accepts_legacy_batch_fields() {
        let path = temp_file("game-store-legacy");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        let raw = r#"{
  "version": 1,
  "game": {
    "player_count": 2,
    "players": [
      { "score": 3, "batches": [ { "value": 3, "at": 3 } ] },
      { "score": 0, "batches": [] }
    ],
    "winner": null
  }
}"#;
        fs::write(&path, raw).expect("write file");
        let record = FileGameStore::new(path.clone())
            .load()
            .expect("record loads");
        assert_eq!(record.players[0].batches[0].score_after, 3);
        cleanup(&path);
    }

    #[test]
    fn save_reports_unwritable_target() {
        let path = temp_file("game-store-blocked");
        let parent = path.parent().expect("parent exists").to_path_buf();
        fs::create_dir_all(&parent).expect("create dir");
        fs::create_dir_all(&path).expect("directory in place of file");
        let result = FileGameStore::new(path.clone()).save(&sample_record());
        assert!(matches!(result, Err(StoreError::Write { .. })));
        let _ = fs::remove_dir_all(&parent);
    }
}
