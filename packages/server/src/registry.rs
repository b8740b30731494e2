//! Sessions by id

use std::collections::HashMap;
use std::sync::Arc;

use dynaser_protocol::ServerMessage;
use parking_lot::RwLock;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info};
use uuid::Uuid;

use crate::app::Application;
use crate::error::ServerResult;
use crate::session::{Session, SessionId};

const MAX_SESSION_ID_LEN: usize = 64;

/// Ids supplied by clients must be short and URL-safe
pub fn is_valid_session_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_SESSION_ID_LEN
        && id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

pub fn new_session_id() -> SessionId {
    Uuid::new_v4().to_string()
}

fn resolve_id(requested: Option<&str>) -> SessionId {
    match requested {
        Some(id) if is_valid_session_id(id) => id.to_string(),
        Some(id) => {
            debug!(requested = id, "ignoring invalid session id");
            new_session_id()
        }
        None => new_session_id(),
    }
}

pub struct SessionRegistry {
    sessions: RwLock<HashMap<SessionId, Arc<Session>>>,
    app: Arc<dyn Application>,
    keep_sessions: bool,
}

impl SessionRegistry {
    pub fn new(app: Arc<dyn Application>, keep_sessions: bool) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            app,
            keep_sessions,
        }
    }

    /// Find or create the session and attach a connection to it, replacing
    /// any connection it had. Invalid or missing ids get a fresh one.
    ///
    /// Runs under the write lock, so a concurrent [`release`](Self::release)
    /// cannot discard the session between the lookup and the attach.
    pub fn connect(
        &self,
        requested: Option<&str>,
    ) -> ServerResult<(Arc<Session>, u64, UnboundedReceiver<ServerMessage>)> {
        let id = resolve_id(requested);
        let mut sessions = self.sessions.write();
        let session = self.entry(&mut sessions, id)?;
        let (generation, rx) = session.connect();
        Ok((session, generation, rx))
    }

    fn entry(
        &self,
        sessions: &mut HashMap<SessionId, Arc<Session>>,
        id: SessionId,
    ) -> ServerResult<Arc<Session>> {
        if let Some(session) = sessions.get(&id) {
            return Ok(session.clone());
        }
        let session = Arc::new(Session::new(id.clone(), self.app.as_ref())?);
        sessions.insert(id, session.clone());
        Ok(session)
    }

    pub fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().get(id).cloned()
    }

    /// Called when a connection ends. Drops the session's document unless
    /// sessions are kept or another connection took over.
    pub fn release(&self, session: &Session, generation: u64) {
        let mut sessions = self.sessions.write();
        session.disconnect(generation);
        if self.keep_sessions {
            return;
        }
        if !session.is_connected() && sessions.remove(session.id()).is_some() {
            info!(session = session.id(), "session discarded");
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
