//! Types and world generation shared between the server and its clients.
//!
//! Every client rebuilds the same terrain from the world seed it receives in
//! the `init` message, so the generator in [`terrain`] must stay a pure
//! function of the seed and the chunk coordinates.

pub mod chunk;
pub mod noise;
pub mod protocol;
pub mod random;
pub mod roads;
pub mod terrain;
pub mod vehicle;

use serde::{Deserialize, Serialize};

pub use chunk::{BuildingType, Chunk, ChunkCoord, SceneryKind, SceneryObject, TreeType, Uv, Vertex};
pub use protocol::{ClientMessage, Handshake, ProtocolError, PublicPlayer, PublicState, ServerMessage};
pub use roads::{Point2, RoadNetwork, RoadSegment};
pub use terrain::TerrainGenerator;
pub use vehicle::{VehicleStats, VehicleType};

pub const WORLD_SIZE: f32 = 10_000.0;
pub const CHUNK_SIZE: f32 = 500.0;
pub const CHUNK_RESOLUTION: u32 = 16;
pub const TERRAIN_SCALE: f32 = 0.02;
pub const TERRAIN_HEIGHT: f32 = 100.0;
pub const ROAD_WIDTH: f32 = 15.0;

/// A position, rotation or velocity on the wire: `{x, y, z}`.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance ignoring height.
    pub fn planar_distance(&self, other: &Vec3) -> f32 {
        let dx = self.x - other.x;
        let dz = self.z - other.z;
        (dx * dx + dz * dz).sqrt()
    }

    pub fn midpoint(&self, other: &Vec3) -> Vec3 {
        Vec3 {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
        }
    }
}
