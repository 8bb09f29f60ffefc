//! Routing between connections and the game state
//!
//! The gateway is transport-agnostic: a connection is represented only by
//! the [`Outbound`] queue it registered at join time, so tests can drive it
//! with in-memory channels. Lock order is always game state first, then the
//! client table.

use crate::client_manager::{ClientManager, Outbound};
use crate::game::{GameState, TickReport};
use crate::player::Player;
use crate::world::World;
use log::{error, info, warn};
use shared::{Chunk, ClientMessage, Handshake, ServerMessage};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

/// Why a handshake was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JoinError {
    ServerFull { max_players: usize },
}

impl fmt::Display for JoinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinError::ServerFull { max_players } => {
                write!(f, "server full ({} players)", max_players)
            }
        }
    }
}

impl std::error::Error for JoinError {}

/// A successfully joined connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub player_id: String,
    pub connection_id: u64,
}

#[derive(Clone)]
pub struct Gateway {
    state: Arc<RwLock<GameState>>,
    clients: Arc<RwLock<ClientManager>>,
    world: Arc<World>,
}

impl Gateway {
    pub fn new(state: GameState) -> Self {
        let world = Arc::new(World::new(state.world_seed));
        Self {
            state: Arc::new(RwLock::new(state)),
            clients: Arc::new(RwLock::new(ClientManager::new())),
            world,
        }
    }

    pub fn state(&self) -> &Arc<RwLock<GameState>> {
        &self.state
    }

    pub fn clients(&self) -> &Arc<RwLock<ClientManager>> {
        &self.clients
    }

    pub fn world(&self) -> &Arc<World> {
        &self.world
    }

    /// Creates a player for a new connection
    ///
    /// Missing handshake fields are filled with `player_N` / `Player N` and
    /// the default vehicle. An id that is already connected replaces the
    /// older session. The new player receives `init`; everyone else
    /// receives `playerJoined`.
    pub async fn join(&self, handshake: Handshake, sender: Outbound) -> Result<Session, JoinError> {
        let mut state = self.state.write().await;
        let mut clients = self.clients.write().await;

        if let Some(existing) = handshake.player_id.as_deref() {
            if clients.remove_client(existing) {
                info!("Player {} reconnected, replacing previous session", existing);
                state.remove_player(existing);
                Self::broadcast_locked(
                    &clients,
                    &ServerMessage::PlayerLeft {
                        player_id: existing.to_string(),
                    },
                    None,
                );
            }
        }

        if state.is_full() {
            return Err(JoinError::ServerFull {
                max_players: state.config.max_players,
            });
        }

        let vehicle_type = handshake.vehicle();
        let (player_id, player_name) = match (handshake.player_id, handshake.player_name) {
            (Some(id), Some(name)) => (id, name),
            (id, name) => {
                let number = clients.allocate_player_number();
                (
                    id.unwrap_or_else(|| format!("player_{}", number)),
                    name.unwrap_or_else(|| format!("Player {}", number)),
                )
            }
        };

        let spawn = state.add_player(Player::new(player_id.clone(), player_name.clone(), vehicle_type));
        let connection_id = clients.allocate_connection_id();
        clients.add_client(player_id.clone(), connection_id, sender);

        let init = ServerMessage::Init {
            player_id: player_id.clone(),
            game_state: state.get_public_state(),
            world_seed: state.world_seed,
        };
        if let Some(frame) = encode(&init) {
            clients.send_to(&player_id, frame);
        }

        Self::broadcast_locked(
            &clients,
            &ServerMessage::PlayerJoined {
                player_id: player_id.clone(),
                player_name: player_name.clone(),
                vehicle_type,
                position: spawn.position,
                rotation: spawn.rotation,
            },
            Some(&player_id),
        );

        info!("Player {} ({}) connected", player_id, player_name);
        Ok(Session {
            player_id,
            connection_id,
        })
    }

    /// Applies one inbound message from a joined connection
    ///
    /// Messages from a session that has since been replaced or evicted are
    /// dropped.
    pub async fn handle_message(&self, session: &Session, message: ClientMessage) {
        let now = Instant::now();
        let outcome = {
            let mut state = self.state.write().await;
            let session_time = state.session_time();
            let current = self
                .clients
                .read()
                .await
                .is_current(&session.player_id, session.connection_id);
            let player = match state.player_mut(&session.player_id) {
                Some(player) if current => player,
                _ => return,
            };
            player.touch(now);

            match message {
                ClientMessage::Position {
                    position,
                    rotation,
                    velocity,
                } => {
                    player.apply_position(position, rotation, velocity);
                    Outcome::Broadcast {
                        message: ServerMessage::PlayerPosition {
                            player_id: player.id.clone(),
                            position: player.position,
                            rotation: player.rotation,
                            velocity: player.velocity,
                        },
                        include_sender: false,
                    }
                }
                ClientMessage::Chat { message } => Outcome::Broadcast {
                    message: ServerMessage::Chat {
                        player_id: player.id.clone(),
                        player_name: player.name.clone(),
                        message,
                    },
                    include_sender: true,
                },
                ClientMessage::Ping { timestamp } => Outcome::Reply(ServerMessage::Pong { timestamp }),
                ClientMessage::Checkpoint { checkpoint_id } => {
                    match player.pass_checkpoint(checkpoint_id, session_time) {
                        Some(lap_time) => Outcome::Broadcast {
                            message: ServerMessage::LapCompleted {
                                player_id: player.id.clone(),
                                lap_time,
                                best_lap_time: player.best_lap_time.unwrap_or(lap_time),
                            },
                            include_sender: true,
                        },
                        None => Outcome::Nothing,
                    }
                }
                ClientMessage::RequestChunk { chunk_x, chunk_z } => {
                    Outcome::Chunk { chunk_x, chunk_z }
                }
                ClientMessage::Unknown => Outcome::Nothing,
            }
        };

        match outcome {
            Outcome::Broadcast {
                message,
                include_sender,
            } => {
                let exclude = (!include_sender).then_some(session.player_id.as_str());
                Self::broadcast_locked(&*self.clients.read().await, &message, exclude);
            }
            Outcome::Reply(message) => self.reply(session, &message).await,
            Outcome::Chunk { chunk_x, chunk_z } => {
                if let Some(chunk) = self.chunk(chunk_x, chunk_z).await {
                    let message = ServerMessage::Chunk {
                        chunk_x,
                        chunk_z,
                        chunk: (*chunk).clone(),
                    };
                    self.reply(session, &message).await;
                }
            }
            Outcome::Nothing => {}
        }
    }

    /// Tears down a session after its transport closed
    ///
    /// Only the first call for a session has any effect, and none at all if
    /// the session was already replaced or evicted.
    pub async fn disconnect(&self, session: &Session) {
        let mut state = self.state.write().await;
        let mut clients = self.clients.write().await;

        if !clients.remove_connection(&session.player_id, session.connection_id) {
            return;
        }
        state.remove_player(&session.player_id);
        info!("Player {} disconnected", session.player_id);

        Self::broadcast_locked(
            &clients,
            &ServerMessage::PlayerLeft {
                player_id: session.player_id.clone(),
            },
            None,
        );
    }

    /// Runs one game tick and notifies everyone about evicted players.
    /// Evicted connections are dropped, which closes their sockets.
    pub async fn tick(&self) -> TickReport {
        self.tick_at(Instant::now()).await
    }

    pub async fn tick_at(&self, now: Instant) -> TickReport {
        let mut state = self.state.write().await;
        let report = state.update_at(now);

        if !report.evicted.is_empty() {
            let mut clients = self.clients.write().await;
            for player_id in &report.evicted {
                clients.remove_client(player_id);
                Self::broadcast_locked(
                    &clients,
                    &ServerMessage::PlayerLeft {
                        player_id: player_id.clone(),
                    },
                    None,
                );
            }
        }
        report
    }

    /// Fetches a chunk through the cache, generating it off the async
    /// workers on a miss.
    pub async fn chunk(&self, chunk_x: i32, chunk_z: i32) -> Option<Arc<Chunk>> {
        let world = Arc::clone(&self.world);
        match tokio::task::spawn_blocking(move || world.get_chunk(chunk_x, chunk_z)).await {
            Ok(chunk) => Some(chunk),
            Err(e) => {
                error!("Chunk ({}, {}) generation failed: {}", chunk_x, chunk_z, e);
                None
            }
        }
    }

    async fn reply(&self, session: &Session, message: &ServerMessage) {
        if let Some(frame) = encode(message) {
            let clients = self.clients.read().await;
            if clients.is_current(&session.player_id, session.connection_id) {
                clients.send_to(&session.player_id, frame);
            }
        }
    }

    fn broadcast_locked(clients: &ClientManager, message: &ServerMessage, exclude: Option<&str>) {
        if let Some(frame) = encode(message) {
            clients.broadcast(&frame, exclude);
        }
    }
}

enum Outcome {
    Broadcast {
        message: ServerMessage,
        include_sender: bool,
    },
    Reply(ServerMessage),
    Chunk {
        chunk_x: i32,
        chunk_z: i32,
    },
    Nothing,
}

/// Serializes once so a broadcast shares one buffer across recipients.
fn encode(message: &ServerMessage) -> Option<Arc<str>> {
    match message.to_json() {
        Ok(json) => Some(Arc::from(json)),
        Err(e) => {
            warn!("Failed to serialize outbound message: {}", e);
            None
        }
    }
}
