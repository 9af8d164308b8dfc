//! Session table for HTTP session affinity.
//!
//! Ids are issued on `initialize` and expire after an idle period. The table
//! holds at most `capacity` live ids; issuing past that evicts the one seen
//! least recently.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use tracing::debug;

use super::HttpConfig;
use crate::core::context::SessionId;

/// Issued session ids with their last-seen time.
pub struct SessionTable {
    ttl: Duration,
    capacity: usize,
    sessions: Mutex<HashMap<SessionId, Instant>>,
}

impl SessionTable {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            ttl,
            capacity: capacity.max(1),
            sessions: Mutex::new(HashMap::new()),
        }
    }

    /// Table sized from the HTTP transport settings.
    pub fn from_config(config: &HttpConfig) -> Self {
        Self::new(config.session_ttl(), config.max_sessions)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<SessionId, Instant>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Issue a fresh id, dropping expired ids and, at capacity, the id seen
    /// least recently.
    pub fn issue(&self) -> SessionId {
        let now = Instant::now();
        let mut sessions = self.lock();
        sessions.retain(|_, seen| now.duration_since(*seen) < self.ttl);

        if sessions.len() >= self.capacity {
            let oldest = sessions
                .iter()
                .min_by_key(|(_, seen)| **seen)
                .map(|(id, _)| id.clone());
            if let Some(id) = oldest {
                debug!("Session table full, evicting {}", id);
                sessions.remove(&id);
            }
        }

        let id = SessionId::generate();
        sessions.insert(id.clone(), now);
        id
    }

    /// Whether `id` is live. A live id has its idle timer reset; an expired
    /// one is dropped.
    pub fn touch(&self, id: &SessionId) -> bool {
        let now = Instant::now();
        let mut sessions = self.lock();
        match sessions.get_mut(id) {
            Some(seen) if now.duration_since(*seen) < self.ttl => {
                *seen = now;
                true
            }
            Some(_) => {
                sessions.remove(id);
                false
            }
            None => false,
        }
    }

    /// End a session. Returns false when the id was not live.
    pub fn remove(&self, id: &SessionId) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_issue_and_touch() {
        let table = SessionTable::new(Duration::from_secs(60), 8);
        let id = table.issue();
        assert!(table.touch(&id));
        assert!(!table.touch(&SessionId::from("bogus")));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_capacity_evicts_least_recently_seen() {
        let table = SessionTable::new(Duration::from_secs(60), 2);
        let first = table.issue();
        sleep(Duration::from_millis(5));
        let second = table.issue();
        sleep(Duration::from_millis(5));
        assert!(table.touch(&first));
        sleep(Duration::from_millis(5));

        let third = table.issue();
        assert_eq!(table.len(), 2);
        assert!(table.touch(&first));
        assert!(!table.touch(&second));
        assert!(table.touch(&third));
    }

    #[test]
    fn test_idle_sessions_expire() {
        let table = SessionTable::new(Duration::from_millis(50), 8);
        let stale = table.issue();
        sleep(Duration::from_millis(80));
        assert!(!table.touch(&stale));
        assert!(table.is_empty());

        let idle = table.issue();
        sleep(Duration::from_millis(80));
        let _fresh = table.issue();
        assert_eq!(table.len(), 1, "issuing prunes expired ids");
        assert!(!table.touch(&idle));
    }

    #[test]
    fn test_remove() {
        let table = SessionTable::new(Duration::from_secs(60), 8);
        let id = table.issue();
        assert!(table.remove(&id));
        assert!(!table.remove(&id));
        assert!(!table.touch(&id));
    }
}
