use crate::roads::{Point2, RoadSegment};
use crate::Vec3;
use serde::{Deserialize, Serialize};

/// Integer address of a terrain tile. Any pair is valid, including negatives.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub z: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, z: i32) -> Self {
        Self { x, z }
    }

    /// Seed for the chunk's own scenery RNG. Mixes the world seed with the
    /// coordinates through splitmix64 so neighbouring chunks get unrelated
    /// streams.
    pub fn scenery_seed(&self, world_seed: u32) -> u64 {
        let mut h = u64::from(world_seed);
        h = splitmix64(h ^ (self.x as u32 as u64));
        h = splitmix64(h ^ ((self.z as u32 as u64) << 32));
        h
    }
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E37_79B9_7F4A_7C15);
    x = (x ^ (x >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    x = (x ^ (x >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    x ^ (x >> 31)
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Uv {
    pub u: f32,
    pub v: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub uv: Uv,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum TreeType {
    Pine,
    Oak,
    Palm,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BuildingType {
    House,
    Shop,
    Garage,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum SceneryKind {
    Tree(TreeType),
    Building(BuildingType),
}

/// A tree or building placed on the terrain.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SceneryObject {
    pub kind: SceneryKind,
    pub position: Vec3,
    /// Rotation about the vertical axis, in degrees.
    pub rotation_y: f32,
    pub scale: f32,
}

/// One generated terrain tile.
///
/// `heightmap` is `(resolution + 1)` rows of `(resolution + 1)` samples,
/// row-major by z. `vertices` follows the same ordering and `indices` holds
/// two triangles per grid cell.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    pub coord: ChunkCoord,
    /// World-space corner with the smallest x and z.
    pub position: Point2,
    pub size: f32,
    pub resolution: u32,
    pub heightmap: Vec<Vec<f32>>,
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    pub roads: Vec<RoadSegment>,
    pub objects: Vec<SceneryObject>,
}

impl Chunk {
    /// Compact binary encoding handed to the asset layer.
    pub fn to_bytes(&self) -> Result<Vec<u8>, bincode::Error> {
        bincode::serialize(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, bincode::Error> {
        bincode::deserialize(bytes)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}
