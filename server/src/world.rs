//! Authoritative world state shared by the input, simulation and broadcast paths
//!
//! The world is a flat map from session id to [`PlayerState`] plus a tick
//! counter. It is the single source of truth: the network path writes only
//! the pending input fields, the stepper rewrites kinematics once per tick,
//! and the publisher clones the whole map for each snapshot. Callers wrap it
//! in a lock; nothing in here synchronizes on its own.

use log::info;
use shared::{InputIntent, PlayerId, PlayerState};
use std::collections::HashMap;

pub struct World {
    /// Completed simulation ticks since startup.
    pub tick: u64,
    players: HashMap<PlayerId, PlayerState>,
}

impl World {
    pub fn new() -> Self {
        Self {
            tick: 0,
            players: HashMap::new(),
        }
    }

    /// Inserts a fresh spawn record for a newly connected session. Rejoining
    /// with an existing id simply resets that player to spawn.
    pub fn add_player(&mut self, id: PlayerId) {
        let player = PlayerState::spawn();
        info!("Added player {} at ({}, {})", id, player.x, player.y);
        self.players.insert(id, player);
    }

    /// Removes a player, reporting whether they were present. Removing an
    /// already gone id is a no-op so disconnect and timeout can race.
    pub fn remove_player(&mut self, id: PlayerId) -> bool {
        if self.players.remove(&id).is_some() {
            info!("Removed player {}", id);
            true
        } else {
            false
        }
    }

    /// Overwrites a player's pending input from one client message.
    ///
    /// The horizontal axis is assigned absolutely on every message: a message
    /// with neither left nor right held zeroes it, and right wins when both
    /// are held. The jump flag is only ever OR'd in here; clearing it is the
    /// stepper's job, so a press survives until a tick has looked at it.
    /// Input for an unknown id (disconnect racing the packet) is dropped.
    pub fn apply_intent(&mut self, id: PlayerId, intent: &InputIntent) {
        if let Some(player) = self.players.get_mut(&id) {
            let mut axis: i8 = 0;
            if intent.left {
                axis = -1;
            }
            if intent.right {
                axis = 1;
            }
            player.axis = axis;

            if intent.up {
                player.jump_pending = true;
            }
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerState> {
        self.players.get(&id)
    }

    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut PlayerState> {
        self.players.get_mut(&id)
    }

    /// Mutable pass over every player, used by the simulation step.
    pub fn players_mut(&mut self) -> impl Iterator<Item = &mut PlayerState> {
        self.players.values_mut()
    }

    /// Clones the full player map for broadcast.
    pub fn snapshot(&self) -> HashMap<PlayerId, PlayerState> {
        self.players.clone()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}

impl Default for World {
    fn default() -> Self {
        Self::new()
    }
}
