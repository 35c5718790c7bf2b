//! Per-host session pool.

use super::exposed::HostKey;
use crate::config::ConnectionDefaults;
use crate::connection::{ConnectionParams, Connector, Session};
use crate::models::TargetKey;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

/// Lazily created sessions, one per host of each watched target.
///
/// The map lock is only held to look up or insert a session, never while a
/// session is in use.
pub struct SessionPool {
    connector: Arc<dyn Connector>,
    defaults: ConnectionDefaults,
    sessions: RwLock<HashMap<HostKey, Arc<Session>>>,
}

impl SessionPool {
    /// Creates an empty pool.
    #[must_use]
    pub fn new(connector: Arc<dyn Connector>, defaults: ConnectionDefaults) -> Self {
        Self {
            connector,
            defaults,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the session for a host, creating a disconnected one if needed.
    pub fn session(&self, target: &TargetKey, address: &str) -> Arc<Session> {
        let key = (target.clone(), address.to_string());

        if let Some(session) = self
            .sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Arc::clone(session);
        }

        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let session = sessions.entry(key).or_insert_with(|| {
            tracing::debug!(target_key = %target, address, "Creating session");
            Arc::new(Session::new(
                ConnectionParams::from_address(address, &self.defaults),
                Arc::clone(&self.connector),
            ))
        });
        Arc::clone(session)
    }

    /// Drops the sessions of hosts not in `live`.
    ///
    /// A session still in use by a pass stays alive until that pass releases
    /// it; it is simply no longer handed out.
    pub fn retain(&self, live: &HashSet<HostKey>) {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let before = sessions.len();
        sessions.retain(|key, _| live.contains(key));

        let dropped = before - sessions.len();
        if dropped > 0 {
            tracing::debug!(dropped, remaining = sessions.len(), "Pruned sessions");
        }
    }

    /// Number of sessions in the pool.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Returns `true` if the pool holds no session.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for SessionPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionPool")
            .field("connector", &self.connector)
            .field("sessions", &self.len())
            .finish_non_exhaustive()
    }
}
