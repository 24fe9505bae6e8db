//! Session storage
//!
//! In-flight workflow sessions keyed by an opaque token. Storage is
//! memory-only: a session lives for the lifetime of the process that
//! created it, is removed on reset or completion, and is never written
//! to disk.

use crate::workflow::WorkflowSession;
use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;
use uuid::Uuid;

/// Opaque handle to one in-flight workflow session.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionToken(String);

impl SessionToken {
    /// Mint a fresh unguessable token.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Backing store for in-flight sessions.
///
/// The lone implementation is in-memory. The trait seam exists so a server
/// frontend can swap in shared storage without touching the engine; any
/// implementation must keep sessions out of durable storage.
pub trait SessionStore {
    /// Store or replace the session behind `token`.
    fn put(&self, token: &SessionToken, session: WorkflowSession);

    /// Snapshot the session behind `token`, if any.
    fn get(&self, token: &SessionToken) -> Option<WorkflowSession>;

    /// Drop the session behind `token`, returning it if it existed.
    fn remove(&self, token: &SessionToken) -> Option<WorkflowSession>;
}

/// Process-local session store.
#[derive(Default)]
pub struct MemorySessionStore {
    sessions: Mutex<HashMap<SessionToken, WorkflowSession>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mint a token and store the session behind it.
    pub fn open(&self, session: WorkflowSession) -> SessionToken {
        let token = SessionToken::new();
        self.put(&token, session);
        token
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().expect("session store lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SessionStore for MemorySessionStore {
    fn put(&self, token: &SessionToken, session: WorkflowSession) {
        self.sessions
            .lock()
            .expect("session store lock poisoned")
            .insert(token.clone(), session);
    }

    fn get(&self, token: &SessionToken) -> Option<WorkflowSession> {
        self.sessions
            .lock()
            .expect("session store lock poisoned")
            .get(token)
            .cloned()
    }

    fn remove(&self, token: &SessionToken) -> Option<WorkflowSession> {
        self.sessions
            .lock()
            .expect("session store lock poisoned")
            .remove(token)
    }
}
