//! Server network layer handling WebSocket connections and the tick loop

use crate::client_manager::OUTBOUND_CAPACITY;
use crate::gateway::{Gateway, Session};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ClientMessage, Handshake, ProtocolError};
use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, timeout, MissedTickBehavior};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{accept_async, WebSocketStream};

/// Pause after a failed accept, e.g. when out of file descriptors.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(10);
/// Time a new socket gets to finish the WebSocket upgrade and send its
/// handshake frame.
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

type Reader = SplitStream<WebSocketStream<TcpStream>>;
type Writer = SplitSink<WebSocketStream<TcpStream>, Message>;

/// What the reader loop made of one inbound frame.
enum Frame {
    Text(String),
    Skip,
    Closed,
    Malformed(String),
}

/// Main server coordinating connections and the game tick
pub struct Server {
    listener: TcpListener,
    gateway: Gateway,
    tick_duration: Duration,
    handshake_timeout: Duration,
}

impl Server {
    pub async fn bind(
        addr: &str,
        gateway: Gateway,
        tick_duration: Duration,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let listener = TcpListener::bind(addr).await?;
        info!("Server listening on {}", listener.local_addr()?);

        Ok(Server {
            listener,
            gateway,
            tick_duration,
            handshake_timeout: HANDSHAKE_TIMEOUT,
        })
    }

    pub fn with_handshake_timeout(mut self, handshake_timeout: Duration) -> Self {
        self.handshake_timeout = handshake_timeout;
        self
    }

    pub fn local_addr(&self) -> Result<SocketAddr, Box<dyn std::error::Error>> {
        Ok(self.listener.local_addr()?)
    }

    /// Starts the tick loop and accepts connections for as long as the
    /// future is polled. Accept failures are logged and retried.
    pub async fn run(self) -> Result<(), Box<dyn std::error::Error>> {
        let tick_handle = tokio::spawn(run_game_loop(self.gateway.clone(), self.tick_duration));

        let listener = &self.listener;
        let gateway = &self.gateway;
        let handshake_timeout = self.handshake_timeout;
        accept_loop(
            move || listener.accept(),
            move |stream, addr| {
                debug!("Accepted TCP connection from {}", addr);
                tokio::spawn(handle_connection(stream, addr, gateway.clone(), handshake_timeout));
            },
        )
        .await;

        tick_handle.abort();
        Ok(())
    }
}

/// Hands every accepted connection to `on_connection`. Errors never end
/// the loop; each one is followed by [`ACCEPT_BACKOFF`].
async fn accept_loop<S, A, F, H>(mut accept: A, mut on_connection: H)
where
    A: FnMut() -> F,
    F: Future<Output = io::Result<(S, SocketAddr)>>,
    H: FnMut(S, SocketAddr),
{
    loop {
        match accept().await {
            Ok((stream, addr)) => on_connection(stream, addr),
            Err(e) => {
                error!("Failed to accept connection: {}", e);
                sleep(ACCEPT_BACKOFF).await;
            }
        }
    }
}

/// Fixed-period tick, independent of connection handling
async fn run_game_loop(gateway: Gateway, tick_duration: Duration) {
    let mut interval_timer = interval(tick_duration);
    interval_timer.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Skip the first tick since it fires immediately
    interval_timer.tick().await;

    loop {
        interval_timer.tick().await;
        let report = gateway.tick().await;
        for player_id in &report.evicted {
            info!("Player {} timed out", player_id);
        }
    }
}

async fn handle_connection(stream: TcpStream, addr: SocketAddr, gateway: Gateway, handshake_timeout: Duration) {
    let opened = match timeout(handshake_timeout, open_connection(stream, addr)).await {
        Ok(opened) => opened,
        Err(_) => {
            warn!("Dropping {}: no handshake within {:?}", addr, handshake_timeout);
            return;
        }
    };
    let (mut write, mut read, handshake) = match opened {
        Some(opened) => opened,
        None => return,
    };

    let handshake = match handshake {
        Ok(handshake) => handshake,
        Err(e) => {
            warn!("Malformed handshake from {}: {}", addr, e);
            let _ = write.send(Message::Close(None)).await;
            return;
        }
    };

    let (tx, mut rx) = mpsc::channel::<Arc<str>>(OUTBOUND_CAPACITY);
    let session = match gateway.join(handshake, tx).await {
        Ok(session) => session,
        Err(e) => {
            warn!("Rejected {}: {}", addr, e);
            let _ = write.send(Message::Close(None)).await;
            return;
        }
    };

    // Ends when the client entry (and its sender) is dropped, which closes
    // the socket for evicted or replaced sessions.
    let mut send_task = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write.send(Message::Text(frame.to_string())).await.is_err() {
                break;
            }
        }
        let _ = write.send(Message::Close(None)).await;
    });

    loop {
        tokio::select! {
            frame = next_frame(&mut read) => {
                match frame {
                    Frame::Text(text) => {
                        if !route(&gateway, &session, &text).await {
                            break;
                        }
                    }
                    Frame::Skip => {}
                    Frame::Closed => break,
                    Frame::Malformed(reason) => {
                        warn!("Closing connection of {}: {}", session.player_id, reason);
                        break;
                    }
                }
            }
            _ = &mut send_task => break,
        }
    }

    send_task.abort();
    gateway.disconnect(&session).await;
}

/// Upgrades the socket and reads the first application frame. `None` when
/// the peer went away or sent garbage before joining.
async fn open_connection(
    stream: TcpStream,
    addr: SocketAddr,
) -> Option<(Writer, Reader, Result<Handshake, ProtocolError>)> {
    let ws_stream = match accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!("WebSocket handshake with {} failed: {}", addr, e);
            return None;
        }
    };

    let (write, mut read) = ws_stream.split();
    loop {
        match next_frame(&mut read).await {
            Frame::Text(text) => return Some((write, read, Handshake::parse(&text))),
            Frame::Skip => continue,
            Frame::Closed => return None,
            Frame::Malformed(reason) => {
                warn!("Dropping {} before join: {}", addr, reason);
                return None;
            }
        }
    }
}

/// Parses and applies one application message. Returns false when the
/// frame was malformed and the connection must be dropped.
async fn route(gateway: &Gateway, session: &Session, text: &str) -> bool {
    match ClientMessage::parse(text) {
        Ok(message) => {
            gateway.handle_message(session, message).await;
            true
        }
        Err(e) => {
            log_malformed(session, &e);
            false
        }
    }
}

fn log_malformed(session: &Session, error: &ProtocolError) {
    warn!("Malformed message from {}: {}", session.player_id, error);
}

async fn next_frame(read: &mut Reader) -> Frame {
    match read.next().await {
        Some(Ok(Message::Text(text))) => Frame::Text(text),
        Some(Ok(Message::Binary(bytes))) => match String::from_utf8(bytes) {
            Ok(text) => Frame::Text(text),
            Err(_) => Frame::Malformed("binary frame is not UTF-8".to_string()),
        },
        Some(Ok(Message::Close(_))) | None => Frame::Closed,
        Some(Ok(_)) => Frame::Skip,
        Some(Err(e)) => Frame::Malformed(e.to_string()),
    }
}
