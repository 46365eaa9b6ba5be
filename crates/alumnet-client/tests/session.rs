mod common;

use alumnet_client::session::{SessionManager, SessionState, Viewer};
use alumnet_client::ClientError;
use alumnet_shared::error::ValidationError;
use alumnet_shared::types::Role;
use alumnet_store::{AuthEvent, Backend};

use common::World;

#[tokio::test]
async fn starts_uninitialized_and_mounts_as_guest() {
    let world = World::new();
    let manager = SessionManager::new(world.dyn_backend());
    assert_eq!(manager.handle().current(), SessionState::Uninitialized);
    assert!(manager.handle().viewer().is_none());

    let state = manager.mount().await;
    let SessionState::Guest(identity) = state else {
        panic!("expected a guest session");
    };
    assert!(identity.is_guest());
    assert_eq!(identity.role, Role::Guest);
}

#[tokio::test]
async fn sign_up_sign_out_sign_in() {
    let world = World::new();
    let manager = SessionManager::new(world.dyn_backend());
    let mut watcher = manager.handle().subscribe();
    manager.mount().await;

    let identity = manager
        .sign_up("Mei@Example.org", "graduation", "Mei", Role::Alumni)
        .await
        .unwrap();
    assert_eq!(identity.display_name, "Mei");
    assert_eq!(manager.handle().viewer(), Some(Viewer::Authenticated(identity.clone())));
    assert!(watcher.has_changed().unwrap());
    watcher.borrow_and_update();

    manager.sign_out().await.unwrap();
    assert!(matches!(manager.handle().current(), SessionState::Guest(_)));
    assert!(watcher.has_changed().unwrap());

    let again = manager.sign_in("mei@example.org", "graduation").await.unwrap();
    assert_eq!(again, identity);
}

#[tokio::test]
async fn sign_up_validates_before_the_backend() {
    let world = World::new();
    let manager = SessionManager::new(world.dyn_backend());

    let err = manager.sign_up("x@example.org", "password1", "  ", Role::Student).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::MissingField("display_name"))));

    let err = manager.sign_up("x@example.org", "password1", "X", Role::Guest).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::RoleNotAllowed(Role::Guest))));

    let err = manager.sign_in("", "password1").await.unwrap_err();
    assert!(err.is_validation());
    assert!(world.backend.calls().is_empty());
}

#[tokio::test]
async fn refresh_keeps_the_identity() {
    let world = World::new();
    let alice = world.user("Alice", Role::Faculty).await;
    let manager = SessionManager::new(world.dyn_backend());
    manager.mount().await;

    let refreshed = world.backend.refresh_session().await.unwrap();
    manager.handle_auth_event(AuthEvent::TokenRefreshed(refreshed.clone())).await;

    match manager.handle().current() {
        SessionState::Authenticated { identity, session } => {
            assert_eq!(&identity, alice.identity());
            assert_eq!(session, refreshed);
        }
        other => panic!("unexpected state {other:?}"),
    }

    manager.handle_auth_event(AuthEvent::SignedOut).await;
    assert!(matches!(manager.handle().current(), SessionState::Guest(_)));
}
