//! # Road Rally Server Library
//!
//! This library provides the authoritative server for the multiplayer driving
//! world. It owns the player map, streams every client's reported transform
//! to the others, and hands out deterministic terrain chunks generated from a
//! single world seed.
//!
//! ## Core Responsibilities
//!
//! ### Session Coordination
//! The server keeps the canonical set of connected players together with
//! their vehicle, kinematic and race state. A fixed-rate tick evicts players
//! that stopped talking and records proximity events between vehicles.
//!
//! ### Client Management
//! Handles the complete lifecycle of client connections including:
//! - The join handshake and placeholder identity assignment
//! - Routing of position, chat, ping, checkpoint and chunk messages
//! - Exactly-once teardown on disconnect, eviction or session replacement
//!
//! ### World Streaming
//! Terrain is never stored up front. Chunks are generated on first request
//! from the world seed, cached for the process lifetime, and are
//! bit-identical for every server started with the same seed.
//!
//! ## Architecture Design
//!
//! ### Shared State, Concurrent Connections
//! Every connection runs its own reader loop and writer task. All of them,
//! plus the tick task, share one `GameState` and one `ClientManager` behind
//! async read-write locks, always acquired in that order.
//!
//! ### WebSocket Communication
//! Clients speak JSON over WebSocket text frames. Outbound messages are
//! serialized once and pushed onto bounded per-connection queues, so a
//! slow client never stalls the tick or other recipients.
//!
//! ## Module Organization
//!
//! ### Player Module (`player`)
//! The per-connection player record: vehicle preset, transform, distance
//! travelled, checkpoint and lap bookkeeping, liveness timestamp.
//!
//! ### Game Module (`game`)
//! The coordinator: configuration, spawn placement, the tick with eviction
//! and pairwise proximity detection, and the public state snapshot.
//!
//! ### Client Manager Module (`client_manager`)
//! The connection table: outbound queues keyed by player id, connection
//! generations, and broadcast with per-recipient failure isolation.
//!
//! ### World Module (`world`)
//! The chunk cache in front of the shared terrain generator.
//!
//! ### Gateway Module (`gateway`)
//! Transport-independent join, message routing, disconnect and tick
//! fan-out. Tests drive it with in-memory channels.
//!
//! ### Network Module (`network`)
//! The WebSocket listener, per-connection tasks and the tick loop.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::game::{GameConfig, GameState};
//! use server::gateway::Gateway;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = GameConfig::default();
//!     let tick_duration = config.tick_duration();
//!     let gateway = Gateway::new(GameState::new(config, 42));
//!
//!     // Accepts WebSocket clients and runs the 20Hz tick until the
//!     // listener fails.
//!     let server = Server::bind("127.0.0.1:8000", gateway, tick_duration).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod client_manager;
pub mod game;
pub mod gateway;
pub mod network;
pub mod player;
pub mod world;
