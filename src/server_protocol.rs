use serde_json::{Map, Value};

use crate::constants::is_advance_option;
use crate::error::ProtocolError;

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedClientMessage {
    Advance { player: usize, value: u32 },
    Undo { player: usize },
    Commit { player: usize },
    SetPlayerCount { count: usize },
    Reset,
    Ping { t: f64 },
}

pub fn parse_client_message(raw: &str) -> Result<ParsedClientMessage, ProtocolError> {
    let value: Value = serde_json::from_str(raw).map_err(|_| ProtocolError::NotAnObject)?;
    let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;
    let message_type = object
        .get("type")
        .and_then(Value::as_str)
        .ok_or(ProtocolError::Field("type"))?;

    match message_type {
        "advance" => {
            let player = parse_index(object, "player")?;
            let value = object
                .get("value")
                .and_then(Value::as_u64)
                .ok_or(ProtocolError::Field("value"))?;
            let value = u32::try_from(value)
                .ok()
                .filter(|candidate| is_advance_option(*candidate))
                .ok_or(ProtocolError::AdvanceValue(value))?;
            Ok(ParsedClientMessage::Advance { player, value })
        }
        "undo" => Ok(ParsedClientMessage::Undo {
            player: parse_index(object, "player")?,
        }),
        "commit" => Ok(ParsedClientMessage::Commit {
            player: parse_index(object, "player")?,
        }),
        "set_player_count" => Ok(ParsedClientMessage::SetPlayerCount {
            count: parse_index(object, "count")?,
        }),
        "reset" => Ok(ParsedClientMessage::Reset),
        "ping" => {
            let t = object
                .get("t")
                .and_then(Value::as_f64)
                .filter(|t| t.is_finite())
                .ok_or(ProtocolError::Field("t"))?;
            Ok(ParsedClientMessage::Ping { t })
        }
        other => Err(ProtocolError::UnknownType(other.to_string())),
    }
}

fn parse_index(object: &Map<String, Value>, field: &'static str) -> Result<usize, ProtocolError> {
    object
        .get(field)
        .and_then(Value::as_u64)
        .and_then(|value| usize::try_from(value).ok())
        .ok_or(ProtocolError::Field(field))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_advance_message() {
        let parsed = parse_client_message(r#"{"type":"advance","player":1,"value":5}"#)
            .expect("advance message should parse");
        assert_eq!(
            parsed,
            ParsedClientMessage::Advance {
                player: 1,
                value: 5
            }
        );
    }

    #[test]
    fn parse_advance_rejects_values_outside_buttons() {
        assert_eq!(
            parse_client_message(r#"{"type":"advance","player":0,"value":3}"#),
            Err(ProtocolError::AdvanceValue(3))
        );
        assert_eq!(
            parse_client_message(r#"{"type":"advance","player":0,"value":0}"#),
            Err(ProtocolError::AdvanceValue(0))
        );
        assert_eq!(
            parse_client_message(r#"{"type":"advance","player":0,"value":-1}"#),
            Err(ProtocolError::Field("value"))
        );
        assert_eq!(
            parse_client_message(r#"{"type":"advance","player":0,"value":1.5}"#),
            Err(ProtocolError::Field("value"))
        );
    }

    #[test]
    fn parse_player_commands() {
        assert_eq!(
            parse_client_message(r#"{"type":"undo","player":2}"#),
            Ok(ParsedClientMessage::Undo { player: 2 })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"commit","player":0}"#),
            Ok(ParsedClientMessage::Commit { player: 0 })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"undo"}"#),
            Err(ProtocolError::Field("player"))
        );
    }

    #[test]
    fn parse_game_commands() {
        assert_eq!(
            parse_client_message(r#"{"type":"set_player_count","count":3}"#),
            Ok(ParsedClientMessage::SetPlayerCount { count: 3 })
        );
        assert_eq!(
            parse_client_message(r#"{"type":"reset"}"#),
            Ok(ParsedClientMessage::Reset)
        );
    }

    #[test]
    fn parse_ping_requires_finite_number() {
        assert!(matches!(
            parse_client_message(r#"{"type":"ping","t":12.5}"#),
            Ok(ParsedClientMessage::Ping { .. })
        ));
        assert_eq!(
            parse_client_message(r#"{"type":"ping","t":"soon"}"#),
            Err(ProtocolError::Field("t"))
        );
    }

    #[test]
    fn parse_rejects_malformed_messages() {
        assert_eq!(
            parse_client_message("not json"),
            Err(ProtocolError::NotAnObject)
        );
        assert_eq!(parse_client_message("[1,2]"), Err(ProtocolError::NotAnObject));
        assert_eq!(
            parse_client_message(r#"{"kind":"reset"}"#),
            Err(ProtocolError::Field("type"))
        );
        assert_eq!(
            parse_client_message(r#"{"type":"hello"}"#),
            Err(ProtocolError::UnknownType("hello".to_string()))
        );
    }
}
