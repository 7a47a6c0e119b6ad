//! Server network layer handling UDP transport and task coordination
//!
//! The server splits into five tasks around two shared structures, the
//! session registry and the world:
//! - a receiver that decodes datagrams into [`ServerMessage`]s
//! - a sender that drains the outgoing queue, serializing each broadcast
//!   once and fanning the same bytes out to every session
//! - a timeout checker that reaps quiet sessions
//! - the simulation stepper on its fixed tick interval
//! - the snapshot publisher on its own, slower interval
//!
//! The dispatch loop in [`Server::run`] is the only writer of session
//! membership, so connects, disconnects and timeouts are applied one at a
//! time between simulation ticks. Locks are always taken one at a time and
//! released before the next one, never nested.

use crate::session::SessionRegistry;
use crate::sim;
use crate::terrain::OccupancyGrid;
use crate::world::World;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{
    timestamp_ms, InputIntent, Packet, PlayerId, BROADCAST_INTERVAL, PROTOCOL_VERSION,
    TICK_INTERVAL,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tokio::time::MissedTickBehavior;

/// Messages sent from network tasks to the dispatch loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived {
        packet: Packet,
        addr: SocketAddr,
    },
    SessionTimeout {
        session_id: PlayerId,
    },
    #[allow(dead_code)]
    Shutdown,
}

/// Messages queued for the send task
#[derive(Debug)]
pub enum SendMessage {
    Unicast { packet: Packet, addr: SocketAddr },
    Broadcast { packet: Packet },
}

/// Main server owning the socket, the shared state and the task handles
pub struct Server {
    socket: Arc<UdpSocket>,
    sessions: Arc<RwLock<SessionRegistry>>,
    world: Arc<RwLock<World>>,
    grid: Arc<OccupancyGrid>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    send_tx: mpsc::UnboundedSender<SendMessage>,
    send_rx: mpsc::UnboundedReceiver<SendMessage>,
}

impl Server {
    /// Binds the UDP socket and wires up the channels. The terrain grid is
    /// built by the caller and injected here; the server never reloads it.
    pub async fn new(
        addr: &str,
        max_sessions: usize,
        grid: Arc<OccupancyGrid>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (send_tx, send_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            sessions: Arc::new(RwLock::new(SessionRegistry::new(max_sessions))),
            world: Arc::new(RwLock::new(World::new())),
            grid,
            server_tx,
            server_rx,
            send_tx,
            send_rx,
        })
    }

    /// Address the socket actually bound to, useful after binding port 0.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to dispatch loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes the outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let sessions = Arc::clone(&self.sessions);
        let mut send_rx = std::mem::replace(&mut self.send_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = send_rx.recv().await {
                match message {
                    SendMessage::Unicast { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    SendMessage::Broadcast { packet } => {
                        // Serialize once; every session receives the same bytes.
                        let data = match serialize(&packet) {
                            Ok(data) => data,
                            Err(e) => {
                                error!("Failed to serialize broadcast packet: {}", e);
                                continue;
                            }
                        };

                        let session_addrs = {
                            let sessions = sessions.read().await;
                            sessions.addrs()
                        };

                        for (session_id, addr) in session_addrs {
                            if let Err(e) = socket.send_to(&data, addr).await {
                                error!("Failed to send to session {}: {}", session_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors session timeouts
    async fn spawn_timeout_checker(&self) {
        let sessions = Arc::clone(&self.sessions);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut sessions = sessions.write().await;
                    sessions.check_timeouts()
                };

                for session_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::SessionTimeout { session_id }) {
                        error!("Failed to send timeout message: {}", e);
                        break;
                    }
                }
            }
        });
    }

    /// Spawns the fixed-rate simulation task.
    ///
    /// Every step advances by exactly one fixed timestep. When the runtime
    /// falls behind, missed ticks are skipped rather than bunched up, so
    /// the simulation slows down instead of stepping with a huge backlog.
    async fn spawn_stepper(&self) {
        let world = Arc::clone(&self.world);
        let grid = Arc::clone(&self.grid);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(TICK_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            // Skip the first tick since it fires immediately
            interval.tick().await;

            loop {
                interval.tick().await;
                let mut world = world.write().await;
                sim::step(&mut world, &grid);
            }
        });
    }

    /// Spawns the snapshot broadcast task on its own interval, slower than
    /// and independent of the simulation tick.
    async fn spawn_publisher(&self) {
        let world = Arc::clone(&self.world);
        let sessions = Arc::clone(&self.sessions);
        let send_tx = self.send_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(BROADCAST_INTERVAL);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            interval.tick().await;

            loop {
                interval.tick().await;
                Self::publish_once(&world, &sessions, &send_tx).await;
            }
        });
    }

    /// Takes one consistent world snapshot and queues it for broadcast.
    /// Returns false without reading the world when nobody is connected.
    async fn publish_once(
        world: &RwLock<World>,
        sessions: &RwLock<SessionRegistry>,
        send_tx: &mpsc::UnboundedSender<SendMessage>,
    ) -> bool {
        let session_count = {
            let sessions = sessions.read().await;
            sessions.len()
        };

        if session_count == 0 {
            return false;
        }

        let (tick, snapshot) = {
            let world = world.read().await;
            (world.tick, world.snapshot())
        };

        let packet = Packet::Snapshot {
            tick,
            timestamp: timestamp_ms(),
            world: snapshot,
        };

        if let Err(e) = send_tx.send(SendMessage::Broadcast { packet }) {
            error!("Failed to queue snapshot broadcast: {}", e);
            return false;
        }

        true
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    async fn send_packet(&self, packet: &Packet, addr: SocketAddr) {
        if let Err(e) = self.send_tx.send(SendMessage::Unicast {
            packet: packet.clone(),
            addr,
        }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Processes one incoming packet against the registry and the world
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        match packet {
            Packet::Connect { client_version } => {
                info!(
                    "Client connecting from {} (version: {})",
                    addr, client_version
                );
                if client_version != PROTOCOL_VERSION {
                    warn!(
                        "Client at {} speaks protocol version {}, server speaks {}",
                        addr, client_version, PROTOCOL_VERSION
                    );
                }

                // A reconnect from the same address replaces the old session
                let existing = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(existing_id) = existing {
                    info!("Replacing existing session {} from {}", existing_id, addr);
                    {
                        let mut sessions = self.sessions.write().await;
                        sessions.remove(existing_id);
                    }
                    let mut world = self.world.write().await;
                    world.remove_player(existing_id);
                }

                let session_id = {
                    let mut sessions = self.sessions.write().await;
                    sessions.add(addr)
                };

                if let Some(session_id) = session_id {
                    {
                        let mut world = self.world.write().await;
                        world.add_player(session_id);
                    }
                    let response = Packet::Connected {
                        client_id: session_id,
                    };
                    self.send_packet(&response, addr).await;
                } else {
                    warn!("Rejecting client at {}: server full", addr);
                    let response = Packet::Disconnected {
                        reason: "Server full".to_string(),
                    };
                    self.send_packet(&response, addr).await;
                }
            }

            Packet::Input {
                up,
                down,
                left,
                right,
            } => {
                let session_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                // Input from an address without a session is dropped; the
                // sender either never connected or already timed out.
                if let Some(session_id) = session_id {
                    {
                        let mut sessions = self.sessions.write().await;
                        sessions.touch(session_id);
                    }

                    let intent = InputIntent {
                        up,
                        down,
                        left,
                        right,
                    };
                    let mut world = self.world.write().await;
                    world.apply_intent(session_id, &intent);
                }
            }

            Packet::Heartbeat { timestamp: _ } => {
                let session_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(session_id) = session_id {
                    let mut sessions = self.sessions.write().await;
                    sessions.touch(session_id);
                } else {
                    debug!("Heartbeat from unknown address {}", addr);
                }
            }

            Packet::Disconnect => {
                let session_id = {
                    let sessions = self.sessions.read().await;
                    sessions.find_by_addr(addr)
                };

                if let Some(session_id) = session_id {
                    {
                        let mut sessions = self.sessions.write().await;
                        sessions.remove(session_id);
                    }
                    let mut world = self.world.write().await;
                    world.remove_player(session_id);
                }
            }

            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    /// Main dispatch loop coordinating all operations
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;
        self.spawn_stepper().await;
        self.spawn_publisher().await;

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::SessionTimeout { session_id } => {
                    let mut world = self.world.write().await;
                    world.remove_player(session_id);
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
