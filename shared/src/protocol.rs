//! JSON messages exchanged over a client connection.
//!
//! Every message after the handshake is an object tagged by its `type`
//! field. Field names are camelCase on the wire.

use crate::chunk::Chunk;
use crate::vehicle::VehicleType;
use crate::Vec3;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// The first frame a client sends. Every field is optional.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    #[serde(default)]
    pub player_id: Option<String>,
    #[serde(default)]
    pub player_name: Option<String>,
    #[serde(default)]
    pub vehicle_type: Option<String>,
}

impl Handshake {
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        Ok(serde_json::from_value(value)?)
    }

    pub fn vehicle(&self) -> VehicleType {
        self.vehicle_type
            .as_deref()
            .map(VehicleType::from_name)
            .unwrap_or_default()
    }
}

/// Client -> server.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientMessage {
    /// Absent fields leave the previous value untouched.
    Position {
        #[serde(default)]
        position: Option<Vec3>,
        #[serde(default)]
        rotation: Option<Vec3>,
        #[serde(default)]
        velocity: Option<Vec3>,
    },
    Chat {
        #[serde(default)]
        message: String,
    },
    Ping {
        #[serde(default)]
        timestamp: Option<f64>,
    },
    Checkpoint {
        checkpoint_id: u32,
    },
    RequestChunk {
        chunk_x: i32,
        chunk_z: i32,
    },
    /// Any object without a recognised `type`.
    #[serde(other)]
    Unknown,
}

impl ClientMessage {
    /// Decodes one frame. Objects with a missing or unrecognised `type`
    /// decode to [`ClientMessage::Unknown`]; anything that is not a JSON
    /// object, or a known type with ill-typed fields, is an error.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(ProtocolError::NotAnObject);
        }
        if !value.get("type").map_or(false, serde_json::Value::is_string) {
            return Ok(ClientMessage::Unknown);
        }
        Ok(serde_json::from_value(value)?)
    }
}

/// Server -> client.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerMessage {
    Init {
        player_id: String,
        game_state: PublicState,
        world_seed: u32,
    },
    PlayerJoined {
        player_id: String,
        player_name: String,
        vehicle_type: VehicleType,
        position: Vec3,
        rotation: Vec3,
    },
    PlayerPosition {
        player_id: String,
        position: Vec3,
        rotation: Vec3,
        velocity: Vec3,
    },
    Chat {
        player_id: String,
        player_name: String,
        message: String,
    },
    Pong {
        timestamp: Option<f64>,
    },
    PlayerLeft {
        player_id: String,
    },
    LapCompleted {
        player_id: String,
        lap_time: f64,
        best_lap_time: f64,
    },
    Chunk {
        chunk_x: i32,
        chunk_z: i32,
        chunk: Chunk,
    },
}

impl ServerMessage {
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Snapshot of the session safe to hand to clients.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicState {
    pub players: HashMap<String, PublicPlayer>,
    /// Seconds since the session started.
    pub time: f64,
    pub player_count: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PublicPlayer {
    pub id: String,
    pub name: String,
    pub position: Vec3,
    pub rotation: Vec3,
    pub vehicle_type: VehicleType,
}

#[derive(Debug)]
pub enum ProtocolError {
    Json(serde_json::Error),
    NotAnObject,
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::Json(e) => write!(f, "malformed message: {}", e),
            ProtocolError::NotAnObject => write!(f, "malformed message: expected a JSON object"),
        }
    }
}

impl std::error::Error for ProtocolError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProtocolError::Json(e) => Some(e),
            ProtocolError::NotAnObject => None,
        }
    }
}

impl From<serde_json::Error> for ProtocolError {
    fn from(e: serde_json::Error) -> Self {
        ProtocolError::Json(e)
    }
}
