//! # Terrace Game Server Library
//!
//! This library provides the authoritative server for a small multiplayer
//! platformer. It holds the canonical world state, advances a fixed-timestep
//! physics simulation against image-derived terrain, and broadcasts full
//! world snapshots to every connected client.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Simulation
//! The server runs the only real version of the game. Clients send raw
//! directional intent and receive back positions; nothing a client sends can
//! move a player except through the simulation step. The step itself always
//! advances by exactly one fixed timestep, so a given input sequence
//! replays to the same trajectory regardless of host load.
//!
//! ### Terrain Collision
//! The level is an ordinary image decoded once at startup into an immutable
//! occupancy grid, one cell per pixel, where dark opaque pixels are ground.
//! Players land by snapping to the first open row above the solid run they
//! fell into. There is no dynamic terrain and the grid is shared by every
//! tick without locking.
//!
//! ### Session Management
//! Connections are UDP-based and identified by source address. The registry
//! assigns ids, enforces the capacity limit, and drops sessions that go
//! quiet for too long. Idle clients stay connected by sending heartbeats.
//!
//! ### State Broadcasting
//! A publisher task runs on its own interval, slower than the simulation
//! tick, and sends the identical full-state snapshot to every session. No
//! per-client differencing or interest management is attempted.
//!
//! ## Architecture Design
//!
//! ### Task Layout
//! Five tokio tasks cooperate around two shared structures, the session
//! registry and the world, each behind its own `RwLock`:
//! - **Network Receiver**: decodes datagrams and forwards them to dispatch
//! - **Network Sender**: drains the outgoing queue and fans out broadcasts
//! - **Timeout Checker**: reaps sessions with no traffic for five seconds
//! - **Simulation Stepper**: advances the world at a fixed tick rate
//! - **Snapshot Publisher**: broadcasts the world at the slower frame rate
//!
//! The dispatch loop applies connects, disconnects and input writes one
//! message at a time. Locks are taken one at a time and never nested, and
//! the stepper holds the world write lock for its whole pass, so a
//! disconnect can race a tick without ever observing half a tick.
//!
//! ### Two Clocks
//! Simulation runs at 100 Hz for stable contact resolution; snapshots go
//! out at roughly 60 Hz. The two rates are deliberately independent, so
//! several simulation ticks usually land between consecutive snapshots and
//! a slow network consumer never stalls physics.
//!
//! ## Module Organization
//!
//! ### Terrain Module (`terrain`)
//! Occupancy grid construction and queries:
//! - Image decoding and dark-and-opaque pixel classification
//! - Point solidity lookup, fail-open outside the map bounds
//! - Surface scan that finds the row a falling player rests at
//!
//! ### World Module (`world`)
//! The shared entity store:
//! - Player records keyed by session id, plus the tick counter
//! - Last-write-wins input application from the network path
//! - Whole-map snapshot cloning for broadcast
//!
//! ### Simulation Module (`sim`)
//! The fixed-timestep integrator:
//! - Jump consumption, force accumulation, semi-implicit Euler integration
//! - Ground contact resolution and the grounded invariant
//! - Speed clamps and the respawn rule for players that fall out
//!
//! ### Session Module (`session`)
//! Connection lifecycle:
//! - Id assignment, capacity enforcement and address resolution
//! - Liveness tracking and timeout cleanup
//!
//! ### Network Module (`network`)
//! UDP transport and task coordination:
//! - Packet decode, dispatch and response routing
//! - Broadcast serialization and fan-out
//! - The stepper and publisher timers
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::network::Server;
//! use server::terrain::OccupancyGrid;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Decode the level image into the immutable collision grid
//!     let grid = Arc::new(OccupancyGrid::load("terrain.png")?);
//!
//!     // Bind the socket and start the server with room for 64 players.
//!     // run() spawns the network, simulation and broadcast tasks and
//!     // then dispatches packets until shutdown.
//!     let mut server = Server::new("127.0.0.1:8080", 64, grid).await?;
//!     server.run().await?;
//!
//!     Ok(())
//! }
//! ```

pub mod network;
pub mod session;
pub mod sim;
pub mod terrain;
pub mod world;
