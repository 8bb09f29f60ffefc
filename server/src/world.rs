//! Process-wide chunk cache in front of the terrain generator.

use log::debug;
use shared::{Chunk, ChunkCoord, TerrainGenerator};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Generated chunks for one world seed. Entries are never evicted.
///
/// Lookups take a shared lock. A miss generates outside the lock and then
/// inserts with `entry().or_insert`, so two racing requests for the same
/// chunk both end up with whichever copy landed first.
#[derive(Debug)]
pub struct World {
    generator: TerrainGenerator,
    chunks: RwLock<HashMap<ChunkCoord, Arc<Chunk>>>,
}

impl World {
    pub fn new(seed: u32) -> Self {
        Self {
            generator: TerrainGenerator::new(seed),
            chunks: RwLock::new(HashMap::new()),
        }
    }

    pub fn seed(&self) -> u32 {
        self.generator.seed()
    }

    pub fn terrain_height(&self, x: f32, z: f32) -> f32 {
        self.generator.terrain_height(x, z)
    }

    pub fn get_chunk(&self, chunk_x: i32, chunk_z: i32) -> Arc<Chunk> {
        let coord = ChunkCoord::new(chunk_x, chunk_z);

        if let Some(chunk) = self
            .chunks
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&coord)
        {
            return Arc::clone(chunk);
        }

        debug!("Generating chunk ({}, {})", chunk_x, chunk_z);
        let generated = Arc::new(self.generator.generate_chunk(coord));

        let mut chunks = self.chunks.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(chunks.entry(coord).or_insert(generated))
    }

    pub fn cached_chunks(&self) -> usize {
        self.chunks.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}
