//! Per-connection player record owned by the game state.

use shared::{PublicPlayer, Vec3, VehicleStats, VehicleType};
use std::time::{Duration, Instant};

/// Checkpoint id of the start/finish line.
pub const FINISH_LINE: u32 = 0;

/// A connected player's kinematic and race state
///
/// Created when a handshake succeeds and dropped on disconnect or timeout.
/// A reconnecting client always gets a fresh `Player`.
#[derive(Debug, Clone)]
pub struct Player {
    pub id: String,
    pub name: String,
    pub vehicle_type: VehicleType,
    pub vehicle_stats: VehicleStats,

    pub position: Vec3,
    pub rotation: Vec3,
    pub velocity: Vec3,
    /// Ground distance covered through position updates.
    pub distance_traveled: f32,

    /// Distinct checkpoints passed on the current lap, in order.
    pub checkpoints_passed: Vec<u32>,
    pub current_checkpoint: u32,
    /// Seconds.
    pub best_lap_time: Option<f64>,
    /// Session time the current lap started at, in seconds.
    pub current_lap_start: Option<f64>,

    /// Last time anything was received from this player.
    pub last_update: Instant,
}

impl Player {
    pub fn new(id: String, name: String, vehicle_type: VehicleType) -> Self {
        Self {
            id,
            name,
            vehicle_type,
            vehicle_stats: vehicle_type.stats(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            velocity: Vec3::ZERO,
            distance_traveled: 0.0,
            checkpoints_passed: Vec::new(),
            current_checkpoint: FINISH_LINE,
            best_lap_time: None,
            current_lap_start: None,
            last_update: Instant::now(),
        }
    }

    pub fn touch(&mut self, now: Instant) {
        self.last_update = now;
    }

    pub fn is_timed_out(&self, now: Instant, timeout: Duration) -> bool {
        now.saturating_duration_since(self.last_update) > timeout
    }

    /// Overwrites the reported transform. `None` keeps the previous value.
    pub fn apply_position(
        &mut self,
        position: Option<Vec3>,
        rotation: Option<Vec3>,
        velocity: Option<Vec3>,
    ) {
        if let Some(position) = position {
            self.distance_traveled += self.position.planar_distance(&position);
            self.position = position;
        }
        if let Some(rotation) = rotation {
            self.rotation = rotation;
        }
        if let Some(velocity) = velocity {
            self.velocity = velocity;
        }
    }

    /// Called when the player crosses the finish line. The first crossing
    /// starts the clock; later ones close the lap and return its duration.
    pub fn update_lap_time(&mut self, now: f64) -> Option<f64> {
        let completed = self.current_lap_start.map(|start| now - start);
        if let Some(lap_time) = completed {
            if self.best_lap_time.map_or(true, |best| lap_time < best) {
                self.best_lap_time = Some(lap_time);
            }
        }
        self.current_lap_start = Some(now);
        completed
    }

    pub fn reset_checkpoints(&mut self) {
        self.checkpoints_passed.clear();
        self.current_checkpoint = FINISH_LINE;
    }

    /// Records a checkpoint. Returns the lap time when this crossing of the
    /// finish line completes a lap.
    ///
    /// Checkpoints already passed this lap are ignored. Crossing the finish
    /// line again only counts once another checkpoint has been passed.
    pub fn pass_checkpoint(&mut self, checkpoint_id: u32, now: f64) -> Option<f64> {
        if self.checkpoints_passed.contains(&checkpoint_id) {
            let lap_done = checkpoint_id == FINISH_LINE && self.checkpoints_passed.len() > 1;
            if !lap_done {
                return None;
            }
        }

        if checkpoint_id == FINISH_LINE {
            let lap_time = self.update_lap_time(now);
            self.reset_checkpoints();
            self.checkpoints_passed.push(FINISH_LINE);
            return lap_time;
        }

        self.checkpoints_passed.push(checkpoint_id);
        self.current_checkpoint = checkpoint_id;
        None
    }

    pub fn to_public(&self) -> PublicPlayer {
        PublicPlayer {
            id: self.id.clone(),
            name: self.name.clone(),
            position: self.position,
            rotation: self.rotation,
            vehicle_type: self.vehicle_type,
        }
    }
}
