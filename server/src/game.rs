//! Authoritative session state and the per-tick update.

use crate::player::Player;
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use shared::{PublicState, Vec3, CHUNK_SIZE, WORLD_SIZE};
use std::collections::{HashMap, VecDeque};
use std::f32::consts::TAU;
use std::time::{Duration, Instant};

pub const SPAWN_RADIUS: f32 = 20.0;
pub const SPAWN_HEIGHT: f32 = 0.5;
/// Two vehicles of radius ~1 closer than this are reported as colliding.
pub const COLLISION_DISTANCE: f32 = 2.0;
/// Oldest collision events are dropped beyond this many.
pub const MAX_EVENTS: usize = 1024;
const STATUS_LOG_INTERVAL: u64 = 100;

/// Tunables for a game session.
#[derive(Debug, Clone, PartialEq)]
pub struct GameConfig {
    pub max_players: usize,
    pub world_size: f32,
    pub chunk_size: f32,
    /// Ticks per second.
    pub tick_rate: u32,
    /// Inactivity after which a player is evicted.
    pub player_timeout: Duration,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            max_players: 50,
            world_size: WORLD_SIZE,
            chunk_size: CHUNK_SIZE,
            tick_rate: 20,
            player_timeout: Duration::from_secs(30),
        }
    }
}

impl GameConfig {
    pub fn tick_duration(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.tick_rate.max(1)))
    }
}

/// Two players found within [`COLLISION_DISTANCE`] of each other.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    /// Session time in seconds.
    pub time: f64,
    /// Ordered so the smaller id comes first.
    pub players: (String, String),
    pub position: Vec3,
}

/// What a call to [`GameState::update`] changed.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TickReport {
    pub tick: u64,
    /// Players removed for inactivity this tick.
    pub evicted: Vec<String>,
    pub collisions: usize,
}

/// Where a newly added player was placed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spawn {
    pub position: Vec3,
    pub rotation: Vec3,
}

#[derive(Debug)]
pub struct GameState {
    pub tick: u64,
    pub world_seed: u32,
    pub config: GameConfig,
    start_time: Instant,
    current_time: Instant,
    players: HashMap<String, Player>,
    events: VecDeque<CollisionEvent>,
    rng: StdRng,
}

impl GameState {
    pub fn new(config: GameConfig, world_seed: u32) -> Self {
        let now = Instant::now();
        info!("Game state initialized with world seed {}", world_seed);
        Self {
            tick: 0,
            world_seed,
            config,
            start_time: now,
            current_time: now,
            players: HashMap::new(),
            events: VecDeque::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Adds a player at a random point on the spawn circle, facing outward.
    /// A player with the same id is replaced.
    pub fn add_player(&mut self, mut player: Player) -> Spawn {
        let angle = self.rng.gen::<f32>() * TAU;
        let spawn = Spawn {
            position: Vec3::new(angle.cos() * SPAWN_RADIUS, SPAWN_HEIGHT, angle.sin() * SPAWN_RADIUS),
            rotation: Vec3::new(0.0, angle, 0.0),
        };
        player.position = spawn.position;
        player.rotation = spawn.rotation;

        info!("Player {} added to game", player.id);
        self.players.insert(player.id.clone(), player);
        spawn
    }

    pub fn remove_player(&mut self, player_id: &str) -> Option<Player> {
        let removed = self.players.remove(player_id);
        if removed.is_some() {
            info!("Player {} removed from game", player_id);
        }
        removed
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.get(player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.get_mut(player_id)
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn is_full(&self) -> bool {
        self.players.len() >= self.config.max_players
    }

    /// Seconds since the session started, as of the last tick.
    pub fn elapsed(&self) -> f64 {
        self.current_time
            .saturating_duration_since(self.start_time)
            .as_secs_f64()
    }

    /// Seconds since the session started, right now.
    pub fn session_time(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    pub fn events(&self) -> impl Iterator<Item = &CollisionEvent> {
        self.events.iter()
    }

    pub fn update(&mut self) -> TickReport {
        self.update_at(Instant::now())
    }

    /// Runs one tick as if the clock read `now`: evicts inactive players,
    /// then records a collision event for every close pair.
    pub fn update_at(&mut self, now: Instant) -> TickReport {
        self.current_time = now;
        self.tick += 1;

        let evicted = self.cleanup_inactive_players();
        let collisions = self.detect_collisions();

        if self.tick % STATUS_LOG_INTERVAL == 0 {
            info!(
                "Game running for {}s, {} players connected",
                self.elapsed() as u64,
                self.players.len()
            );
        }

        TickReport {
            tick: self.tick,
            evicted,
            collisions,
        }
    }

    pub fn get_public_state(&self) -> PublicState {
        PublicState {
            players: self
                .players
                .iter()
                .map(|(id, player)| (id.clone(), player.to_public()))
                .collect(),
            time: self.elapsed(),
            player_count: self.players.len(),
        }
    }

    fn cleanup_inactive_players(&mut self) -> Vec<String> {
        let now = self.current_time;
        let timeout = self.config.player_timeout;
        let inactive: Vec<String> = self
            .players
            .values()
            .filter(|player| player.is_timed_out(now, timeout))
            .map(|player| player.id.clone())
            .collect();

        for player_id in &inactive {
            info!("Removing inactive player {}", player_id);
            self.remove_player(player_id);
        }
        inactive
    }

    /// Proximity check over every unordered pair. Detection only; no
    /// response is applied to the vehicles.
    fn detect_collisions(&mut self) -> usize {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by(|a, b| a.id.cmp(&b.id));

        let time = self.elapsed();
        let mut found = Vec::new();
        for i in 0..players.len() {
            for j in (i + 1)..players.len() {
                let (a, b) = (players[i], players[j]);
                if a.position.distance(&b.position) < COLLISION_DISTANCE {
                    found.push(CollisionEvent {
                        time,
                        players: (a.id.clone(), b.id.clone()),
                        position: a.position.midpoint(&b.position),
                    });
                }
            }
        }

        let count = found.len();
        for event in found {
            if self.events.len() == MAX_EVENTS {
                self.events.pop_front();
            }
            self.events.push_back(event);
        }
        count
    }
}
