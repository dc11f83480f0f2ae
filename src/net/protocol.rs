//! Wire types for the Ender backend API
//! The JSON contract uses camelCase keys throughout

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::geom::Vector2;

fn default_speed() -> i32 {
    2
}

/// Server-reported hero state. Authoritative: the client only derives local
/// shadow state from it, never writes it back field-by-field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroSnapshot {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub position: Vector2,
    /// Movement speed in world units per tick
    #[serde(default = "default_speed")]
    pub speed: i32,
    /// Cosmetic trail/body color, e.g. "#22d3ee"
    #[serde(default)]
    pub color: Option<String>,
    /// Cosmetic mask sprite index
    #[serde(default)]
    pub mask: Option<i32>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub kills: i64,
    #[serde(default)]
    pub created: Option<DateTime<Utc>>,
}

/// The slice of local hero state the client reports on every poll
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeroState {
    pub id: i64,
    pub position: Vector2,
    pub level: String,
}

/// Request body for the world-delta fetch
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub hero: HeroState,
    /// Locally created trail cells not yet acknowledged by the server
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pending_walls: Option<Vec<Vector2>>,
    /// Highest trail wall id this client has already processed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since_wall_id: Option<i64>,
}

/// One trail wall as reported by the server
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallSnapshot {
    pub id: i64,
    pub hero_id: i64,
    pub position: Vector2,
}

/// Chat and game events, id-stamped so redelivery can be detected
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub id: i64,
    #[serde(flatten)]
    pub event: RemoteEvent,
}

/// Event payloads the client understands. Anything else deserializes to
/// `Unknown` and is dropped without failing the whole delta.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum RemoteEvent {
    /// A hero said something
    Chat {
        hero_id: Option<i64>,
        #[serde(default)]
        text: String,
        #[serde(default)]
        sent_at: Option<u64>,
    },

    /// A hero died, possibly at another hero's hands
    HeroDeath {
        hero_id: Option<i64>,
        #[serde(default)]
        by_hero_id: Option<i64>,
    },

    #[serde(other)]
    Unknown,
}

/// Response body of the world-delta fetch
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorldDelta {
    /// Other heroes on this level
    #[serde(default)]
    pub heroes: Vec<HeroSnapshot>,
    /// The live trail walls the server knows about
    #[serde(default)]
    pub recent_walls: Vec<WallSnapshot>,
    #[serde(default)]
    pub events: Vec<EventEnvelope>,
    #[serde(default)]
    pub time_on_level_seconds: u64,
    #[serde(default)]
    pub current_score: i64,
    #[serde(default)]
    pub walls_placed_for_run: i64,
    #[serde(default)]
    pub hero_kills: i64,
    #[serde(default)]
    pub current_level: Option<String>,
}

/// Final run stats reported when the local hero dies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeathReport {
    pub hero_id: i64,
    pub score: i64,
    pub time_on_level_seconds: u64,
    pub walls_placed: i64,
    pub level: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_full_delta() {
        let payload = json!({
            "heroes": [
                {"id": 12, "name": "neon", "position": {"x": 32, "y": 48}, "speed": 2, "color": "#22d3ee", "level": "grid-1", "kills": 3}
            ],
            "recentWalls": [
                {"id": 900, "heroId": 12, "position": {"x": 16, "y": 48}}
            ],
            "events": [
                {"id": 41, "type": "chat", "heroId": 12, "text": "gg", "sentAt": 1700000000000u64},
                {"id": 42, "type": "heroDeath", "heroId": 9, "byHeroId": 12}
            ],
            "timeOnLevelSeconds": 75,
            "currentScore": 120,
            "wallsPlacedForRun": 14,
            "heroKills": 1,
            "currentLevel": "grid-1"
        });

        let delta: WorldDelta = serde_json::from_value(payload).unwrap();
        assert_eq!(delta.heroes.len(), 1);
        assert_eq!(delta.heroes[0].position, Vector2::new(32, 48));
        assert_eq!(delta.recent_walls[0].hero_id, 12);
        assert_eq!(delta.time_on_level_seconds, 75);
        assert!(matches!(
            delta.events[0].event,
            RemoteEvent::Chat { hero_id: Some(12), .. }
        ));
        assert!(matches!(
            delta.events[1].event,
            RemoteEvent::HeroDeath { hero_id: Some(9), by_hero_id: Some(12) }
        ));
    }

    #[test]
    fn missing_fields_fall_back_to_defaults() {
        let delta: WorldDelta = serde_json::from_value(json!({})).unwrap();
        assert!(delta.heroes.is_empty());
        assert!(delta.recent_walls.is_empty());
        assert_eq!(delta.current_score, 0);
        assert_eq!(delta.current_level, None);
    }

    #[test]
    fn unknown_event_type_is_tolerated() {
        let delta: WorldDelta = serde_json::from_value(json!({
            "events": [
                {"id": 1, "type": "meteorShower", "intensity": 9},
                {"id": 2, "type": "chat", "heroId": 3, "text": "hi"}
            ]
        }))
        .unwrap();
        assert!(matches!(delta.events[0].event, RemoteEvent::Unknown));
        assert!(matches!(delta.events[1].event, RemoteEvent::Chat { .. }));
    }

    #[test]
    fn request_keys_are_camel_case() {
        let request = UpdateRequest {
            hero: HeroState {
                id: 5,
                position: Vector2::new(64, 80),
                level: "grid-1".into(),
            },
            pending_walls: Some(vec![Vector2::new(48, 80)]),
            since_wall_id: Some(900),
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["hero"]["position"]["x"], 64);
        assert_eq!(value["pendingWalls"][0]["y"], 80);
        assert_eq!(value["sinceWallId"], 900);
    }

    #[test]
    fn empty_batch_is_omitted_from_request() {
        let request = UpdateRequest {
            hero: HeroState {
                id: 5,
                position: Vector2::ZERO,
                level: "grid-1".into(),
            },
            pending_walls: None,
            since_wall_id: None,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert!(value.get("pendingWalls").is_none());
        assert!(value.get("sinceWallId").is_none());
    }
}
