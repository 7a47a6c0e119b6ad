//! Session registry for connected clients
//!
//! This module owns the server side of the connection lifecycle:
//! - Identity assignment on connect and capacity enforcement
//! - Address-to-session resolution for incoming datagrams
//! - Liveness tracking and automatic timeout cleanup
//! - The address list the broadcast fan-out sends to
//!
//! Gameplay state lives in the world, not here. The registry only knows who
//! is connected, from where, and when they were last heard from.

use log::info;
use shared::PlayerId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::{Duration, Instant};

/// A session with no packets for this long is considered gone.
pub const SESSION_TIMEOUT: Duration = Duration::from_secs(5);

/// One connected client.
#[derive(Debug)]
pub struct Session {
    /// Unique identifier assigned by the server, shared with the world map.
    pub id: PlayerId,
    /// Network address for sending responses.
    pub addr: SocketAddr,
    /// Last time any packet arrived from this address.
    pub last_seen: Instant,
}

impl Session {
    pub fn new(id: PlayerId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
        }
    }

    /// Marks the session as alive right now. Any packet counts, including
    /// heartbeats from an idle client.
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// True if nothing has arrived from this session within `timeout`.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// All connected sessions, indexed by id.
///
/// Enforces the capacity limit and assigns monotonically increasing ids so
/// a recycled address can never be mistaken for its previous occupant.
pub struct SessionRegistry {
    sessions: HashMap<PlayerId, Session>,
    next_id: PlayerId,
    max_sessions: usize,
}

impl SessionRegistry {
    /// Creates an empty registry holding at most `max_sessions` clients.
    /// Ids start at 1 and increment per connection.
    pub fn new(max_sessions: usize) -> Self {
        Self {
            sessions: HashMap::new(),
            next_id: 1,
            max_sessions,
        }
    }

    /// Registers a new session for `addr`.
    ///
    /// Returns the assigned id, or None when the server is full. The caller
    /// decides what to tell the rejected client.
    pub fn add(&mut self, addr: SocketAddr) -> Option<PlayerId> {
        if self.sessions.len() >= self.max_sessions {
            return None;
        }

        let id = self.next_id;
        self.next_id += 1;

        self.sessions.insert(id, Session::new(id, addr));
        info!(
            "Session {} connected from {} ({} online)",
            id,
            addr,
            self.sessions.len()
        );

        Some(id)
    }

    /// Removes a session, reporting whether it existed. Covers both explicit
    /// disconnects and timeout cleanup, which may race each other.
    pub fn remove(&mut self, id: PlayerId) -> bool {
        if self.sessions.remove(&id).is_some() {
            info!("Session {} disconnected ({} online)", id, self.sessions.len());
            true
        } else {
            false
        }
    }

    /// Resolves the session id behind a source address, if any. This is how
    /// every incoming datagram is attributed.
    pub fn find_by_addr(&self, addr: SocketAddr) -> Option<PlayerId> {
        self.sessions
            .iter()
            .find(|(_, session)| session.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Refreshes the liveness timestamp for `id`. Returns false for a stale
    /// id so the caller can ignore packets from sessions already dropped.
    pub fn touch(&mut self, id: PlayerId) -> bool {
        if let Some(session) = self.sessions.get_mut(&id) {
            session.touch();
            true
        } else {
            false
        }
    }

    /// Drops every session that has gone quiet and returns their ids so the
    /// caller can clean up the matching world entries.
    pub fn check_timeouts(&mut self) -> Vec<PlayerId> {
        let timed_out: Vec<PlayerId> = self
            .sessions
            .iter()
            .filter(|(_, session)| session.is_timed_out(SESSION_TIMEOUT))
            .map(|(id, _)| *id)
            .collect();

        for id in &timed_out {
            self.remove(*id);
        }

        timed_out
    }

    /// Ids and addresses of every connected session, for broadcast fan-out.
    pub fn addrs(&self) -> Vec<(PlayerId, SocketAddr)> {
        self.sessions
            .iter()
            .map(|(id, session)| (*id, session.addr))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
