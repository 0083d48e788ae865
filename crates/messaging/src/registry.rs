//! In-memory registry of live sessions and the rooms they belong to.
//!
//! A session is one realtime connection. It may sit in one personal room
//! (keyed by phone number, shared by every device of that user) and any
//! number of conversation rooms. Nothing here survives a restart.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info};

use crate::events::ServerEvent;

/// Opaque handle for one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// An addressable group of sessions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Room {
    /// Every session of one participant.
    Personal(String),
    /// Every session currently viewing one conversation.
    Conversation(String),
}

impl fmt::Display for Room {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Room::Personal(phone) => write!(f, "user:{}", phone),
            Room::Conversation(chat_id) => write!(f, "chat:{}", chat_id),
        }
    }
}

/// Receiving side of a registered session.
#[derive(Debug)]
pub struct SessionHandle {
    pub id: SessionId,
    /// Events addressed to this session, in broadcast order.
    pub events: mpsc::UnboundedReceiver<ServerEvent>,
}

struct SessionEntry {
    outbound: mpsc::UnboundedSender<ServerEvent>,
    phone_number: Option<String>,
    rooms: HashSet<Room>,
}

#[derive(Default)]
struct RegistryState {
    sessions: HashMap<SessionId, SessionEntry>,
    rooms: HashMap<Room, HashSet<SessionId>>,
}

impl RegistryState {
    fn join(&mut self, session: SessionId, room: Room) -> bool {
        let Some(entry) = self.sessions.get_mut(&session) else {
            return false;
        };
        if entry.rooms.insert(room.clone()) {
            self.rooms.entry(room).or_default().insert(session);
        }
        true
    }

    fn deliver(&self, room: &Room, event: &ServerEvent, except: Option<SessionId>) -> usize {
        let Some(members) = self.rooms.get(room) else {
            return 0;
        };

        let mut delivered = 0;
        for id in members {
            if Some(*id) == except {
                continue;
            }
            if let Some(entry) = self.sessions.get(id) {
                if entry.outbound.send(event.clone()).is_ok() {
                    delivered += 1;
                } else {
                    debug!(session = %id, room = %room, "Outbound queue closed, skipping");
                }
            }
        }
        delivered
    }
}

/// Process-wide session registry. Share it behind an `Arc`.
#[derive(Default)]
pub struct SessionRegistry {
    state: RwLock<RegistryState>,
    next_id: AtomicU64,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new connection and return its handle.
    pub async fn register(&self) -> SessionHandle {
        let id = SessionId(self.next_id.fetch_add(1, Ordering::Relaxed) + 1);
        let (outbound, events) = mpsc::unbounded_channel();

        self.state.write().await.sessions.insert(
            id,
            SessionEntry {
                outbound,
                phone_number: None,
                rooms: HashSet::new(),
            },
        );

        debug!(session = %id, "Registered session");
        SessionHandle { id, events }
    }

    /// Put a session in the personal room of `phone_number`.
    ///
    /// Returns false if the session is not registered.
    pub async fn join_personal(&self, session: SessionId, phone_number: &str) -> bool {
        let mut state = self.state.write().await;
        if let Some(entry) = state.sessions.get_mut(&session) {
            entry.phone_number = Some(phone_number.to_string());
        }
        let joined = state.join(session, Room::Personal(phone_number.to_string()));
        if joined {
            debug!(session = %session, phone = %phone_number, "Joined personal room");
        }
        joined
    }

    /// Put a session in a conversation room. Membership is additive.
    ///
    /// Returns false if the session is not registered.
    pub async fn join_conversation(&self, session: SessionId, chat_id: &str) -> bool {
        let joined = self
            .state
            .write()
            .await
            .join(session, Room::Conversation(chat_id.to_string()));
        if joined {
            debug!(session = %session, chat_id = %chat_id, "Joined conversation room");
        }
        joined
    }

    /// Phone number the session announced on connect, if any.
    pub async fn phone_number(&self, session: SessionId) -> Option<String> {
        self.state
            .read()
            .await
            .sessions
            .get(&session)
            .and_then(|entry| entry.phone_number.clone())
    }

    /// Deliver `event` to every session in a conversation room, optionally
    /// skipping one session. Returns the number of sessions reached.
    pub async fn broadcast_to_conversation(
        &self,
        chat_id: &str,
        event: &ServerEvent,
        except: Option<SessionId>,
    ) -> usize {
        self.state
            .read()
            .await
            .deliver(&Room::Conversation(chat_id.to_string()), event, except)
    }

    /// Deliver `event` to every session of one participant.
    pub async fn broadcast_to_personal(&self, phone_number: &str, event: &ServerEvent) -> usize {
        self.state
            .read()
            .await
            .deliver(&Room::Personal(phone_number.to_string()), event, None)
    }

    /// Deliver `event` to a single session.
    pub async fn send_to(&self, session: SessionId, event: ServerEvent) -> bool {
        match self.state.read().await.sessions.get(&session) {
            Some(entry) => entry.outbound.send(event).is_ok(),
            None => false,
        }
    }

    /// Remove a session from every room it belongs to.
    ///
    /// All memberships go under a single write lock, so no broadcast can
    /// observe a partially dropped session.
    pub async fn drop_session(&self, session: SessionId) {
        let mut state = self.state.write().await;
        let Some(entry) = state.sessions.remove(&session) else {
            return;
        };

        for room in &entry.rooms {
            if let Some(members) = state.rooms.get_mut(room) {
                members.remove(&session);
                if members.is_empty() {
                    state.rooms.remove(room);
                }
            }
        }

        info!(
            session = %session,
            rooms = entry.rooms.len(),
            "Dropped session"
        );
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.len()
    }

    /// Sessions currently in a room, sorted.
    pub async fn members(&self, room: &Room) -> Vec<SessionId> {
        let state = self.state.read().await;
        let mut members: Vec<SessionId> = state
            .rooms
            .get(room)
            .map(|m| m.iter().copied().collect())
            .unwrap_or_default();
        members.sort();
        members
    }

    /// Rooms a session belongs to.
    pub async fn rooms_of(&self, session: SessionId) -> HashSet<Room> {
        self.state
            .read()
            .await
            .sessions
            .get(&session)
            .map(|entry| entry.rooms.clone())
            .unwrap_or_default()
    }
}
