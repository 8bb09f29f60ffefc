//! Deterministic terrain and chunk generation.
//!
//! Heights come from a fractal noise field offset by the world seed, pulled
//! down towards a smoother road bed wherever a road passes within
//! [`ROAD_WIDTH`]. Scenery in each chunk is drawn from an RNG seeded by the
//! world seed and the chunk coordinates, never from the road RNG.

use crate::chunk::{BuildingType, Chunk, ChunkCoord, SceneryKind, SceneryObject, TreeType, Uv, Vertex};
use crate::noise::{NoiseParams, PerlinNoise};
use crate::random::WorldRng;
use crate::roads::{Point2, RoadNetwork};
use crate::{Vec3, CHUNK_RESOLUTION, CHUNK_SIZE, ROAD_WIDTH, TERRAIN_HEIGHT, TERRAIN_SCALE, WORLD_SIZE};

const ROAD_BED_SCALE: f32 = 0.2;
const ROAD_BED_HEIGHT_FRACTION: f32 = 0.2;

const TREE_MIN_ROAD_FACTOR: f32 = 0.9;
const BUILDING_MIN_ROAD_FACTOR: f32 = 0.5;
const BUILDING_MAX_ROAD_FACTOR: f32 = 0.9;

const TREE_TYPES: [TreeType; 3] = [TreeType::Pine, TreeType::Oak, TreeType::Palm];
const BUILDING_TYPES: [BuildingType; 3] = [BuildingType::House, BuildingType::Shop, BuildingType::Garage];

#[derive(Debug, Clone)]
pub struct TerrainGenerator {
    seed: u32,
    noise: PerlinNoise,
    roads: RoadNetwork,
}

impl TerrainGenerator {
    pub fn new(seed: u32) -> Self {
        Self {
            seed,
            noise: PerlinNoise::new(seed),
            roads: RoadNetwork::generate(seed, WORLD_SIZE),
        }
    }

    pub fn seed(&self) -> u32 {
        self.seed
    }

    pub fn roads(&self) -> &RoadNetwork {
        &self.roads
    }

    /// Final ground height at a world position, in `[0, TERRAIN_HEIGHT]`.
    pub fn terrain_height(&self, x: f32, z: f32) -> f32 {
        let height = self.noise_height(x, z);
        let factor = self.road_factor(x, z);
        if factor < 1.0 {
            height * factor + self.road_bed_height(x, z) * (1.0 - factor)
        } else {
            height
        }
    }

    /// Unblended noise terrain, ignoring roads.
    pub fn noise_height(&self, x: f32, z: f32) -> f32 {
        let n = self
            .noise
            .fbm(x * TERRAIN_SCALE, z * TERRAIN_SCALE, &NoiseParams::TERRAIN);
        (n + 1.0) * 0.5 * TERRAIN_HEIGHT
    }

    /// Low-frequency bed the terrain is flattened towards under a road.
    pub fn road_bed_height(&self, x: f32, z: f32) -> f32 {
        let scale = TERRAIN_SCALE * ROAD_BED_SCALE;
        let n = self.noise.fbm(x * scale, z * scale, &NoiseParams::ROAD_BED);
        (n + 1.0) * 0.5 * TERRAIN_HEIGHT * ROAD_BED_HEIGHT_FRACTION
    }

    /// 0 on a road centreline, rising linearly to 1 at [`ROAD_WIDTH`] away.
    pub fn road_factor(&self, x: f32, z: f32) -> f32 {
        (self.roads.distance_to_nearest(x, z) / ROAD_WIDTH).min(1.0)
    }

    pub fn generate_chunk(&self, coord: ChunkCoord) -> Chunk {
        let resolution = CHUNK_RESOLUTION;
        let size = CHUNK_SIZE;
        let origin = Point2::new(coord.x as f32 * size, coord.z as f32 * size);
        let side = (resolution + 1) as usize;
        let step = |i: usize| (i as f32 / resolution as f32) * size;

        let heightmap: Vec<Vec<f32>> = (0..side)
            .map(|row| {
                (0..side)
                    .map(|col| self.terrain_height(origin.x + step(col), origin.z + step(row)))
                    .collect()
            })
            .collect();

        let mut vertices = Vec::with_capacity(side * side);
        for row in 0..side {
            for col in 0..side {
                vertices.push(Vertex {
                    position: Vec3::new(origin.x + step(col), heightmap[row][col], origin.z + step(row)),
                    normal: grid_normal(&heightmap, col, row),
                    uv: Uv {
                        u: col as f32 / resolution as f32,
                        v: row as f32 / resolution as f32,
                    },
                });
            }
        }

        let cells = resolution as usize;
        let mut indices = Vec::with_capacity(cells * cells * 6);
        for row in 0..cells {
            for col in 0..cells {
                let i0 = (row * side + col) as u32;
                let i1 = i0 + 1;
                let i2 = ((row + 1) * side + col) as u32;
                let i3 = i2 + 1;
                indices.extend_from_slice(&[i0, i2, i1, i1, i2, i3]);
            }
        }

        let max = Point2::new(origin.x + size, origin.z + size);
        let roads = self.roads.segments_in_rect(origin, max);
        let objects = self.generate_objects(coord, origin, size);

        Chunk {
            coord,
            position: origin,
            size,
            resolution,
            heightmap,
            vertices,
            indices,
            roads,
            objects,
        }
    }

    fn generate_objects(&self, coord: ChunkCoord, origin: Point2, size: f32) -> Vec<SceneryObject> {
        let mut rng = WorldRng::new(coord.scenery_seed(self.seed));
        let mut objects = Vec::new();

        let tree_count = rng.range_inclusive(5, 20);
        let building_count = rng.range_inclusive(0, 2);

        for _ in 0..tree_count {
            let x = origin.x + rng.next_f32() * size;
            let z = origin.z + rng.next_f32() * size;
            if self.road_factor(x, z) < TREE_MIN_ROAD_FACTOR {
                continue;
            }

            let tree_type = TREE_TYPES[rng.index(TREE_TYPES.len())];
            let scale = 0.8 + rng.next_f32() * 0.4;
            let rotation_y = rng.next_f32() * 360.0;
            objects.push(SceneryObject {
                kind: SceneryKind::Tree(tree_type),
                position: Vec3::new(x, self.terrain_height(x, z), z),
                rotation_y,
                scale,
            });
        }

        for _ in 0..building_count {
            let x = origin.x + rng.next_f32() * size;
            let z = origin.z + rng.next_f32() * size;
            let factor = self.road_factor(x, z);
            if !(BUILDING_MIN_ROAD_FACTOR..=BUILDING_MAX_ROAD_FACTOR).contains(&factor) {
                continue;
            }

            let building_type = BUILDING_TYPES[rng.index(BUILDING_TYPES.len())];
            let scale = 1.0 + rng.next_f32() * 0.5;
            let rotation_y = rng.range_inclusive(0, 3) as f32 * 90.0;
            objects.push(SceneryObject {
                kind: SceneryKind::Building(building_type),
                position: Vec3::new(x, self.terrain_height(x, z), z),
                rotation_y,
                scale,
            });
        }

        objects
    }
}

/// Central-difference normal at grid sample `(col, row)`. Samples on the
/// border reuse themselves in place of the missing neighbour.
fn grid_normal(heightmap: &[Vec<f32>], col: usize, row: usize) -> Vec3 {
    let last = heightmap.len() - 1;
    let left = heightmap[row][col.saturating_sub(1)];
    let right = heightmap[row][(col + 1).min(last)];
    let up = heightmap[row.saturating_sub(1)][col];
    let down = heightmap[(row + 1).min(last)][col];

    let nx = left - right;
    let nz = up - down;
    let length = (nx * nx + 4.0 + nz * nz).sqrt();
    Vec3::new(nx / length, 2.0 / length, nz / length)
}
