use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

pub const PROTOCOL_VERSION: u32 = 1;

// Simulation runs at a fixed 10 ms step; broadcasts go out at ~60 Hz on an
// independent clock, so several ticks usually land between two snapshots.
pub const TICK_DT: f32 = 0.010;
pub const TICK_INTERVAL: Duration = Duration::from_millis(10);
pub const BROADCAST_INTERVAL: Duration = Duration::from_micros(16_667);

// World units are terrain pixels; y grows downward, so gravity is positive
// and a jump impulse is negative.
pub const GRAVITY: f32 = 2000.0;
pub const GROUNDED_ACCEL: f32 = 2400.0;
pub const AIR_ACCEL: f32 = 1200.0;
pub const FRICTION: f32 = 1000.0;
pub const JUMP_IMPULSE: f32 = -600.0;
// MIN_VX equals one tick of friction, which kills the sign flip-flop a
// decaying velocity would otherwise go through at rest.
pub const MIN_VX: f32 = 10.0;
pub const MAX_VX: f32 = 280.0;
pub const TERMINAL_VY: f32 = 900.0;

pub const SPAWN_X: f32 = 100.0;
pub const SPAWN_Y: f32 = 100.0;
pub const RESPAWN_Y: f32 = 2000.0;

pub type PlayerId = u32;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub enum Packet {
    Connect {
        client_version: u32,
    },
    Input {
        up: bool,
        down: bool,
        left: bool,
        right: bool,
    },
    Heartbeat {
        timestamp: u64,
    },
    Disconnect,

    Connected {
        client_id: PlayerId,
    },
    Snapshot {
        tick: u64,
        timestamp: u64,
        world: HashMap<PlayerId, PlayerState>,
    },
    Disconnected {
        reason: String,
    },
}

/// Kinematic record for one connected player. The whole record is broadcast
/// as-is in every snapshot.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct PlayerState {
    pub x: f32,
    pub y: f32,
    pub vx: f32,
    pub vy: f32,
    /// Sign of the last nonzero horizontal input, -1 or +1.
    pub facing: i8,
    /// Pending horizontal input, -1/0/+1. A level: persists until the client
    /// sends a different value.
    pub axis: i8,
    /// Pending jump request. An edge: OR'd in on input arrival, consumed
    /// exactly once by the stepper.
    pub jump_pending: bool,
    pub grounded: bool,
}

impl PlayerState {
    /// A fresh spawn record. Built by value on every call so connect and
    /// respawn can never alias a shared template.
    pub fn spawn() -> Self {
        Self {
            x: SPAWN_X,
            y: SPAWN_Y,
            vx: 0.0,
            vy: 0.0,
            facing: 1,
            axis: 0,
            jump_pending: false,
            grounded: false,
        }
    }
}

/// One input message as sent by a client: a fixed-shape record of four
/// levels with explicit `false` defaults. `down` is carried for protocol
/// symmetry and currently has no effect (gravity owns the vertical axis).
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq)]
pub struct InputIntent {
    pub up: bool,
    pub down: bool,
    pub left: bool,
    pub right: bool,
}

/// Wall-clock milliseconds since the Unix epoch.
pub fn timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::from_secs(0))
        .as_millis() as u64
}
