//! Session and identity lifecycle.
//!
//! ```text
//! Uninitialized ──mount──▶ Guest ◀──sign-out── Authenticated
//!       │                    └──sign-in──▶        ▲   │
//!       └────────mount (existing session)─────────┘   └─token refresh─┐
//!                                                     ▲               │
//!                                                     └───────────────┘
//! ```
//!
//! The state lives in a [`SessionHandle`] that is passed explicitly to the
//! components that need it. Only [`SessionManager`] writes to it.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};
use tracing::{debug, info, warn};

use alumnet_shared::error::ValidationError;
use alumnet_shared::types::{Identity, Role};
use alumnet_store::{AuthEvent, AuthSession, Backend, Row};

use crate::error::ClientError;
use crate::fetchers::profiles;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    /// The first session check has not resolved yet. Nothing user-scoped is
    /// fetched in this state.
    Uninitialized,
    Guest(Identity),
    Authenticated {
        identity: Identity,
        session: AuthSession,
    },
}

impl SessionState {
    pub fn viewer(&self) -> Option<Viewer> {
        match self {
            SessionState::Uninitialized => None,
            SessionState::Guest(identity) => Some(Viewer::Guest(identity.clone())),
            SessionState::Authenticated { identity, .. } => {
                Some(Viewer::Authenticated(identity.clone()))
            }
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated { .. })
    }
}

/// Who a fetch is made for. Fetchers match on this instead of checking
/// flags.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Viewer {
    Authenticated(Identity),
    Guest(Identity),
}

impl Viewer {
    pub fn identity(&self) -> &Identity {
        match self {
            Viewer::Authenticated(identity) | Viewer::Guest(identity) => identity,
        }
    }

    /// The authenticated identity, or `NotAuthenticated` for guests.
    pub fn require_user(&self) -> Result<&Identity, ValidationError> {
        match self {
            Viewer::Authenticated(identity) => Ok(identity),
            Viewer::Guest(_) => Err(ValidationError::NotAuthenticated),
        }
    }
}

/// Shared, read-only view of the session state.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    tx: Arc<watch::Sender<SessionState>>,
}

impl SessionHandle {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(SessionState::Uninitialized);
        Self { tx: Arc::new(tx) }
    }

    pub fn current(&self) -> SessionState {
        self.tx.borrow().clone()
    }

    pub fn viewer(&self) -> Option<Viewer> {
        self.tx.borrow().viewer()
    }

    /// Watch for state changes.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.tx.subscribe()
    }

    fn replace(&self, state: SessionState) {
        self.tx.send_replace(state);
    }
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Drives the session state machine against the backend's auth.
#[derive(Clone)]
pub struct SessionManager {
    backend: Arc<dyn Backend>,
    handle: SessionHandle,
}

impl SessionManager {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            handle: SessionHandle::new(),
        }
    }

    pub fn handle(&self) -> &SessionHandle {
        &self.handle
    }

    /// Resolve the initial state from any persisted session. Backend
    /// failures degrade to a guest session.
    pub async fn mount(&self) -> SessionState {
        match self.backend.current_session().await {
            Ok(Some(session)) => {
                if let Err(e) = self.install(session).await {
                    warn!(error = %e, "Could not load identity for stored session, continuing as guest");
                    self.handle.replace(guest());
                }
            }
            Ok(None) => self.handle.replace(guest()),
            Err(e) => {
                warn!(error = %e, "Session check failed, continuing as guest");
                self.handle.replace(guest());
            }
        }
        let state = self.handle.current();
        info!(authenticated = state.is_authenticated(), "Session mounted");
        state
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, ClientError> {
        if email.trim().is_empty() {
            return Err(ValidationError::MissingField("email").into());
        }
        if password.is_empty() {
            return Err(ValidationError::MissingField("password").into());
        }
        let session = self.backend.sign_in(email, password).await?;
        self.install(session).await
    }

    pub async fn sign_up(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<Identity, ClientError> {
        let display_name = display_name.trim();
        if display_name.is_empty() {
            return Err(ValidationError::MissingField("display_name").into());
        }
        if role == Role::Guest {
            return Err(ValidationError::RoleNotAllowed(role).into());
        }

        let mut profile = Row::new();
        profile.insert("display_name".into(), display_name.into());
        profile.insert("role".into(), role.as_str().into());

        let session = self.backend.sign_up(email, password, profile).await?;
        self.install(session).await
    }

    /// Sign out and continue as a fresh guest. On failure the current
    /// session is kept.
    pub async fn sign_out(&self) -> Result<(), ClientError> {
        self.backend.sign_out().await?;
        self.handle.replace(guest());
        Ok(())
    }

    /// Apply an auth event pushed by the backend.
    pub async fn handle_auth_event(&self, event: AuthEvent) {
        match event {
            AuthEvent::SignedIn(session) | AuthEvent::TokenRefreshed(session) => {
                if let SessionState::Authenticated { session: current, .. } = self.handle.current() {
                    if current == session {
                        debug!("Auth event matches current session");
                        return;
                    }
                }
                if let Err(e) = self.install(session).await {
                    warn!(error = %e, "Could not reload identity after auth event");
                }
            }
            AuthEvent::SignedOut => {
                if self.handle.current().is_authenticated() {
                    self.handle.replace(guest());
                }
            }
        }
    }

    /// Follow the backend's auth events until the stream closes.
    pub async fn follow_auth_events(&self) {
        let mut events = self.backend.auth_events();
        loop {
            match events.recv().await {
                Ok(event) => self.handle_auth_event(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Auth events lagged, re-checking session");
                    self.mount().await;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }

    async fn install(&self, session: AuthSession) -> Result<Identity, ClientError> {
        let identity = profiles::load_identity(self.backend.as_ref(), session.user_id).await?;
        info!(user = %identity.id, role = %identity.role, "Session authenticated");
        self.handle.replace(SessionState::Authenticated {
            identity: identity.clone(),
            session,
        });
        Ok(identity)
    }
}

fn guest() -> SessionState {
    SessionState::Guest(Identity::guest())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uninitialized_has_no_viewer() {
        assert!(SessionState::Uninitialized.viewer().is_none());
        let guest = Identity::guest();
        assert_eq!(
            SessionState::Guest(guest.clone()).viewer(),
            Some(Viewer::Guest(guest))
        );
    }

    #[test]
    fn guests_cannot_act_as_users() {
        let viewer = Viewer::Guest(Identity::guest());
        assert_eq!(viewer.require_user(), Err(ValidationError::NotAuthenticated));
    }

    #[tokio::test]
    async fn handle_broadcasts_replacements() {
        let handle = SessionHandle::new();
        let mut rx = handle.subscribe();
        assert_eq!(handle.current(), SessionState::Uninitialized);

        handle.replace(guest());
        rx.changed().await.unwrap();
        assert!(matches!(&*rx.borrow(), SessionState::Guest(_)));
    }
}
