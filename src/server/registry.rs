use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, warn};

use crate::{common::types::ClientId, server::session::Session};

/// Live sessions by client id. At most one per client.
#[derive(Default)]
pub struct SessionRegistry {
  sessions: DashMap<ClientId, Arc<Session>>,
}

impl SessionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Binds `session` to its client id, replacing any previous binding. The
  /// replaced session is returned untouched; it is torn down when its own
  /// channel closes.
  pub fn register(&self, session: Arc<Session>) -> Option<Arc<Session>> {
    let client_id = session.client_id.clone();
    let previous = self.sessions.insert(client_id.clone(), session);
    match &previous {
      Some(old) => warn!(
        "client {} registered again, replacing session {} ({} subscription(s) left to its channel)",
        client_id,
        old.session_id,
        old.subscription_count()
      ),
      None => info!("client {} registered", client_id),
    }
    previous
  }

  pub fn get(&self, client_id: &ClientId) -> Option<Arc<Session>> {
    self.sessions.get(client_id).map(|s| s.value().clone())
  }

  /// Closes `session` and unbinds it, unless its client id was rebound to a
  /// newer session meanwhile. Safe to call more than once.
  pub fn on_channel_close(&self, session: &Arc<Session>) -> usize {
    let destroyed = session.close();
    self
      .sessions
      .remove_if(&session.client_id, |_, current| Arc::ptr_eq(current, session));
    destroyed
  }

  pub fn len(&self) -> usize {
    self.sessions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.sessions.is_empty()
  }
}
