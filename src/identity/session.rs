use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};

use super::profile::{Tokens, UserProfile};
use crate::storage::{load_typed, save_typed, SharedStorage, AUTH_STORAGE_KEY};

const EVENT_CAPACITY: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuthState {
    Anonymous,
    Authenticated,
}

/// Emitted on login and logout. Token refreshes are not transitions and emit nothing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionChanged {
    pub from: AuthState,
    pub to: AuthState,
    /// Id of the user the session now belongs to, if any.
    pub user_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Identity {
    user: UserProfile,
    tokens: Tokens,
}

/// Current identity and credentials. User and tokens are present together or not at all,
/// so `is_authenticated()` cannot disagree with them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    identity: Option<Identity>,
}

impl Session {
    pub fn user(&self) -> Option<&UserProfile> { self.identity.as_ref().map(|i| &i.user) }
    pub fn tokens(&self) -> Option<&Tokens> { self.identity.as_ref().map(|i| &i.tokens) }
    pub fn is_authenticated(&self) -> bool { self.identity.is_some() }

    pub fn state(&self) -> AuthState {
        if self.is_authenticated() { AuthState::Authenticated } else { AuthState::Anonymous }
    }
}

/// On-disk shape of `auth-storage`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersistedSession {
    #[serde(default)]
    user: Option<UserProfile>,
    #[serde(default)]
    tokens: Option<Tokens>,
    #[serde(default)]
    is_authenticated: bool,
}

impl From<&Session> for PersistedSession {
    fn from(s: &Session) -> Self {
        Self { user: s.user().cloned(), tokens: s.tokens().cloned(), is_authenticated: s.is_authenticated() }
    }
}

impl PersistedSession {
    fn into_session(self) -> Option<Session> {
        match (self.user, self.tokens, self.is_authenticated) {
            (Some(user), Some(tokens), true) => Some(Session { identity: Some(Identity { user, tokens }) }),
            (None, None, false) => Some(Session::default()),
            _ => None,
        }
    }
}

/// Owns the session. Constructed explicitly and shared by `Arc`; all mutation goes
/// through `login`, `logout` and `set_tokens`.
pub struct SessionManager {
    state: RwLock<Session>,
    storage: SharedStorage,
    events: broadcast::Sender<SessionChanged>,
}

impl SessionManager {
    /// Empty session; nothing is read from storage.
    pub fn new(storage: SharedStorage) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { state: RwLock::new(Session::default()), storage, events }
    }

    /// Session restored from `auth-storage`. Missing, unreadable, or inconsistent
    /// documents yield an empty session.
    pub fn restore(storage: SharedStorage) -> Self {
        let restored = match load_typed::<PersistedSession>(storage.as_ref(), AUTH_STORAGE_KEY) {
            Ok(Some(p)) => match p.into_session() {
                Some(s) => s,
                None => {
                    warn!(target: "velovis::session", "persisted session is inconsistent; starting anonymous");
                    Session::default()
                }
            },
            Ok(None) => Session::default(),
            Err(e) => {
                warn!(target: "velovis::session", "cannot read persisted session: {}", e);
                Session::default()
            }
        };
        if let Some(u) = restored.user() {
            info!(target: "velovis::session", "session.restore user={}", u.id);
        }
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self { state: RwLock::new(restored), storage, events }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionChanged> {
        self.events.subscribe()
    }

    pub fn snapshot(&self) -> Session { self.state.read().clone() }
    pub fn tokens(&self) -> Option<Tokens> { self.state.read().tokens().cloned() }
    pub fn user(&self) -> Option<UserProfile> { self.state.read().user().cloned() }
    pub fn is_authenticated(&self) -> bool { self.state.read().is_authenticated() }

    /// Accept caller-supplied credentials and identity. The backend response is the trust boundary.
    pub fn login(&self, tokens: Tokens, user: UserProfile) {
        let user_id = user.id.clone();
        let mut st = self.state.write();
        let from = st.state();
        st.identity = Some(Identity { user, tokens });
        self.persist(&st);
        info!(target: "velovis::session", "session.login user={}", user_id);
        // sent under the write guard so events reach subscribers in state order
        self.emit(SessionChanged { from, to: AuthState::Authenticated, user_id: Some(user_id) });
    }

    /// Clear user and tokens. Does not call the backend; invalidating the refresh token
    /// server-side is the caller's job.
    pub fn logout(&self) {
        let mut st = self.state.write();
        let from = st.state();
        st.identity = None;
        self.persist(&st);
        if from == AuthState::Authenticated {
            info!(target: "velovis::session", "session.logout");
            self.emit(SessionChanged { from, to: AuthState::Anonymous, user_id: None });
        }
    }

    /// Replace tokens after a silent refresh. Ignored (returns false) when nobody is logged in.
    pub fn set_tokens(&self, tokens: Tokens) -> bool {
        let mut st = self.state.write();
        match st.identity.as_mut() {
            Some(identity) => {
                identity.tokens = tokens;
                self.persist(&st);
                true
            }
            None => {
                warn!(target: "velovis::session", "set_tokens ignored: no active session");
                false
            }
        }
    }

    fn persist(&self, session: &Session) {
        if let Err(e) = save_typed(self.storage.as_ref(), AUTH_STORAGE_KEY, &PersistedSession::from(session)) {
            warn!(target: "velovis::session", "cannot persist session: {}", e);
        }
    }

    fn emit(&self, ev: SessionChanged) {
        // no receivers is fine
        let _ = self.events.send(ev);
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod session_tests;
