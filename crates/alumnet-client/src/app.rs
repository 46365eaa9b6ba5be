//! Top-level client wiring: backend, session, toasts and the sync bridge of
//! the signed-in user.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{info, warn};

use alumnet_shared::types::{Identity, Role};
use alumnet_store::{AuthEvent, Backend};

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::events::{Toast, ToastSink};
use crate::session::{SessionHandle, SessionManager, Viewer};
use crate::sync::{BridgeHandle, SyncBridge};

pub struct App {
    backend: Arc<dyn Backend>,
    session: SessionManager,
    toasts: ToastSink,
    config: ClientConfig,
    bridge: Option<BridgeHandle>,
}

impl App {
    pub fn new(backend: Arc<dyn Backend>, config: ClientConfig) -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (toasts, rx) = ToastSink::channel();
        let app = Self {
            session: SessionManager::new(backend.clone()),
            backend,
            toasts,
            config,
            bridge: None,
        };
        (app, rx)
    }

    pub fn backend(&self) -> &Arc<dyn Backend> {
        &self.backend
    }

    pub fn session(&self) -> &SessionHandle {
        self.session.handle()
    }

    pub fn viewer(&self) -> Option<Viewer> {
        self.session.handle().viewer()
    }

    pub fn toasts(&self) -> &ToastSink {
        &self.toasts
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// The running bridge, present only while a user is signed in.
    pub fn bridge(&self) -> Option<&BridgeHandle> {
        self.bridge.as_ref()
    }

    /// Resolve the initial session and start syncing if it is
    /// authenticated.
    pub async fn mount(&mut self) {
        self.session.mount().await;
        self.sync_bridge().await;
    }

    pub async fn sign_in(&mut self, email: &str, password: &str) -> Result<Identity, ClientError> {
        let result = self.session.sign_in(email, password).await;
        self.after_auth("Sign-in failed", result).await
    }

    pub async fn sign_up(
        &mut self,
        email: &str,
        password: &str,
        display_name: &str,
        role: Role,
    ) -> Result<Identity, ClientError> {
        let result = self.session.sign_up(email, password, display_name, role).await;
        self.after_auth("Sign-up failed", result).await
    }

    /// Stop syncing and fall back to a guest session. On failure the
    /// bridge is restarted for the session that is still in place.
    pub async fn sign_out(&mut self) -> Result<(), ClientError> {
        self.stop_bridge().await;
        let result = self.session.sign_out().await;
        if let Err(e) = &result {
            warn!(error = %e, "Sign-out failed");
            self.toasts.error("Sign-out failed", e);
        }
        self.sync_bridge().await;
        result
    }

    /// Apply an auth event from the backend and bring the bridge in line
    /// with the resulting session.
    pub async fn on_auth_event(&mut self, event: AuthEvent) {
        self.session.handle_auth_event(event).await;
        self.sync_bridge().await;
    }

    async fn after_auth(
        &mut self,
        title: &str,
        result: Result<Identity, ClientError>,
    ) -> Result<Identity, ClientError> {
        match &result {
            Ok(identity) => info!(user = %identity.id, "Signed in"),
            Err(e) if e.is_validation() => {}
            Err(e) => {
                warn!(error = %e, "{}", title);
                self.toasts.error(title, e);
            }
        }
        self.sync_bridge().await;
        result
    }

    /// Start, keep or stop the bridge so it matches the current viewer.
    async fn sync_bridge(&mut self) {
        let viewer = match self.viewer() {
            Some(viewer @ Viewer::Authenticated(_)) => viewer,
            _ => {
                self.stop_bridge().await;
                return;
            }
        };

        let me = viewer.identity().id;
        if self.bridge.as_ref().map(BridgeHandle::user) == Some(me) {
            return;
        }
        self.stop_bridge().await;

        match SyncBridge::start(self.backend.clone(), viewer, self.toasts.clone(), &self.config).await {
            Ok(handle) => self.bridge = Some(handle),
            Err(e) => {
                warn!(error = %e, "Failed to start sync");
                self.toasts.error("Live updates unavailable", &e);
            }
        }
    }

    async fn stop_bridge(&mut self) {
        if let Some(bridge) = self.bridge.take() {
            bridge.shutdown().await;
        }
    }
}
