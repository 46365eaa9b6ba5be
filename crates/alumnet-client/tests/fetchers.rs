mod common;

use std::collections::BTreeSet;

use bytes::Bytes;
use chrono::{Duration, Utc};

use alumnet_client::fetchers::campus_events::{self, EventDraft};
use alumnet_client::fetchers::{connections, dashboard, mentorships, messages, notifications, profiles};
use alumnet_client::ClientError;
use alumnet_shared::constants::{KIND_CONNECTION_REQUEST, KIND_MENTORSHIP_REQUEST};
use alumnet_shared::error::ValidationError;
use alumnet_shared::models::{ConnectionStatus, MentorshipStatus, ProfileUpdate};
use alumnet_shared::types::{Role, UserId};
use alumnet_store::Table;

use common::{guest, user_id, World};

fn draft(title: &str, in_days: i64) -> EventDraft {
    EventDraft {
        title: title.to_string(),
        description: Some("  ".into()),
        location: Some("Main hall".into()),
        starts_at: Utc::now() + Duration::days(in_days),
    }
}

#[tokio::test]
async fn connection_request_lifecycle() {
    let world = World::new();
    let bob = world.user("Bob", Role::Alumni).await;
    let alice = world.user("Alice", Role::Student).await;
    let backend = world.backend.as_ref();

    let err = connections::send_request(backend, &alice, user_id(&alice)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::SelfTarget)));

    let request = connections::send_request(backend, &alice, user_id(&bob)).await.unwrap();
    assert_eq!(request.status, ConnectionStatus::Pending);
    let err = connections::send_request(backend, &bob, user_id(&alice)).await.unwrap_err();
    assert!(err.is_validation());

    let inbox = notifications::recent_notifications(backend, &bob, 10).await.unwrap();
    assert_eq!(inbox.len(), 1);
    assert_eq!(inbox[0].kind, KIND_CONNECTION_REQUEST);

    let pending = connections::pending_requests(backend, &bob).await.unwrap();
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].requester.as_ref().unwrap().display_name, "Alice");
    assert!(connections::pending_requests(backend, &alice).await.unwrap().is_empty());

    // Only the addressee can answer.
    let err = connections::respond_to_request(backend, &alice, request.id, true).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));

    let accepted = connections::respond_to_request(backend, &bob, request.id, true).await.unwrap();
    assert_eq!(accepted.status, ConnectionStatus::Accepted);

    let peers = connections::list_connections(backend, &alice).await.unwrap();
    assert_eq!(peers.len(), 1);
    assert_eq!(peers[0].profile.id, user_id(&bob));
    assert_eq!(notifications::unread_notification_count(backend, &alice).await.unwrap(), 1);
}

#[tokio::test]
async fn rejected_request_can_be_sent_again_but_only_once_connected() {
    let world = World::new();
    let bob = world.user("Bob", Role::Alumni).await;
    let alice = world.user("Alice", Role::Student).await;
    let backend = world.backend.as_ref();

    let request = connections::send_request(backend, &alice, user_id(&bob)).await.unwrap();
    connections::respond_to_request(backend, &bob, request.id, false).await.unwrap();

    let retry = connections::send_request(backend, &alice, user_id(&bob)).await.unwrap();
    let err = connections::send_request(backend, &alice, user_id(&bob)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::Invalid(_))));

    connections::respond_to_request(backend, &bob, retry.id, true).await.unwrap();
    let current = connections::connection_with(backend, &alice, user_id(&bob)).await.unwrap().unwrap();
    assert_eq!(current.id, retry.id);
    assert_eq!(current.status, ConnectionStatus::Accepted);

    // Neither side can open a second connection over the old rejected row.
    let err = connections::send_request(backend, &alice, user_id(&bob)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::Invalid(_))));
    let err = connections::send_request(backend, &bob, user_id(&alice)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::Invalid(_))));

    assert_eq!(connections::list_connections(backend, &alice).await.unwrap().len(), 1);
    let stats = dashboard::dashboard_stats(backend, &alice, Utc::now()).await.unwrap();
    assert_eq!(stats.connections, 1);
}

#[tokio::test]
async fn directory_lists_other_members_by_role() {
    let world = World::new();
    let bob = world.user("Bob", Role::Alumni).await;
    let carol = world.user("Carol", Role::Faculty).await;
    let alice = world.user("Alice", Role::Student).await;
    let backend = world.backend.as_ref();

    let everyone = profiles::directory(backend, &alice, None).await.unwrap();
    let ids: Vec<UserId> = everyone.iter().map(|p| p.id).collect();
    assert_eq!(ids, [user_id(&carol), user_id(&bob)]);

    let faculty = profiles::directory(backend, &alice, Some(Role::Faculty)).await.unwrap();
    assert_eq!(faculty.len(), 1);
    assert_eq!(faculty[0].display_name, "Carol");

    // Guests browse the whole directory.
    assert_eq!(profiles::directory(backend, &guest(), None).await.unwrap().len(), 3);
}

#[tokio::test]
async fn guests_read_nothing_and_write_nothing() {
    let world = World::new();
    let bob = world.user("Bob", Role::Alumni).await;
    let backend = world.backend.as_ref();
    let guest = guest();
    world.backend.clear();

    assert!(connections::list_connections(backend, &guest).await.unwrap().is_empty());
    assert!(messages::conversation_history(backend, &guest, user_id(&bob)).await.unwrap().is_empty());
    assert!(notifications::recent_notifications(backend, &guest, 10).await.unwrap().is_empty());
    assert_eq!(messages::unread_count_from(backend, &guest, user_id(&bob)).await.unwrap(), 0);
    assert!(mentorships::mentorships_for(backend, &guest).await.unwrap().is_empty());
    assert!(world.backend.calls().is_empty());

    let err = connections::send_request(backend, &guest, user_id(&bob)).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::NotAuthenticated)));
    let err = profiles::update_profile(backend, &guest, ProfileUpdate::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::NotAuthenticated)));
    assert!(world.backend.calls().is_empty());
}

#[tokio::test]
async fn mark_read_with_nothing_to_mark_makes_no_call() {
    let world = World::new();
    let alice = world.user("Alice", Role::Student).await;
    world.backend.clear();

    let updated = messages::mark_read(world.backend.as_ref(), &alice, &BTreeSet::new()).await.unwrap();
    assert!(updated.is_empty());
    let updated = notifications::mark_notifications_read(world.backend.as_ref(), &alice, &BTreeSet::new())
        .await
        .unwrap();
    assert!(updated.is_empty());
    assert!(world.backend.calls().is_empty());
}

#[tokio::test]
async fn message_helpers_agree_with_each_other() {
    let world = World::new();
    let bob = world.user("Bob", Role::Alumni).await;
    let alice = world.user("Alice", Role::Student).await;
    let backend = world.backend.as_ref();

    world.message(&bob, &alice, "one").await;
    let last = world.message(&bob, &alice, "two").await;

    assert_eq!(messages::unread_count_from(backend, &alice, user_id(&bob)).await.unwrap(), 2);
    assert_eq!(messages::unread_ids_from(backend, &alice, user_id(&bob)).await.unwrap().len(), 2);
    assert_eq!(messages::unread_message_count(backend, &alice).await.unwrap(), 2);
    assert_eq!(
        messages::last_message_with(backend, &alice, user_id(&bob)).await.unwrap().map(|m| m.id),
        Some(last.id)
    );
    // Bob has nothing unread from Alice.
    assert_eq!(messages::unread_count_from(backend, &bob, user_id(&alice)).await.unwrap(), 0);

    let err = messages::send_message(backend, &alice, user_id(&bob), &"x".repeat(4_001))
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::MessageTooLong { .. })));
}

#[tokio::test]
async fn profile_updates_and_uploads() {
    let world = World::new();
    let alice = world.user("Alice", Role::Alumni).await;
    let backend = world.backend.as_ref();

    let update = ProfileUpdate {
        headline: Some("Engineer at Initech".into()),
        graduation_year: Some(2012),
        ..Default::default()
    };
    let profile = profiles::update_profile(backend, &alice, update).await.unwrap();
    assert_eq!(profile.headline.as_deref(), Some("Engineer at Initech"));
    assert_eq!(profile.graduation_year, Some(2012));
    assert_eq!(profile.display_name, "Alice");

    let err = profiles::update_profile(backend, &alice, ProfileUpdate::default()).await.unwrap_err();
    assert!(err.is_validation());

    let profile = profiles::upload_avatar(backend, &alice, "me.PNG", Bytes::from_static(b"\x89PNG"))
        .await
        .unwrap();
    let url = profile.avatar_url.unwrap();
    assert!(url.starts_with(&format!("http://127.0.0.1:8080/storage/avatars/{}/", user_id(&alice))));
    assert!(url.ends_with(".png"));

    let profile = profiles::upload_cover(backend, &alice, "cover.jpg", Bytes::from_static(b"jpg"))
        .await
        .unwrap();
    assert!(profile.cover_url.unwrap().contains("/storage/covers/"));

    assert!(profiles::get_profile(backend, UserId::new()).await.unwrap().is_none());
}

#[tokio::test]
async fn events_are_hosted_by_allowed_roles_only() {
    let world = World::new();
    let student = world.user("Sam", Role::Student).await;
    let host = world.user("Fay", Role::Faculty).await;
    let backend = world.backend.as_ref();
    let now = Utc::now();

    let err = campus_events::create_event(backend, &student, draft("Hackathon", 3), now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::RoleNotAllowed(Role::Student))));

    let err = campus_events::create_event(backend, &host, draft("Yesterday", -1), now)
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let later = campus_events::create_event(backend, &host, draft("Gala", 10), now).await.unwrap();
    let sooner = campus_events::create_event(backend, &host, draft("Homecoming", 2), now).await.unwrap();
    assert_eq!(later.description, None);
    assert_eq!(later.organizer_id, user_id(&host));

    let upcoming = campus_events::upcoming_events(backend, now, 5).await.unwrap();
    let titles: Vec<_> = upcoming.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(titles, ["Homecoming", "Gala"]);
    assert_eq!(campus_events::upcoming_events(backend, now, 1).await.unwrap()[0].id, sooner.id);

    let first = campus_events::register_for_event(backend, &student, sooner.id).await.unwrap();
    let again = campus_events::register_for_event(backend, &student, sooner.id).await.unwrap();
    assert_eq!(first.id, again.id);
    assert_eq!(campus_events::attendee_count(backend, sooner.id).await.unwrap(), 1);

    let err = campus_events::register_for_event(backend, &student, uuid::Uuid::new_v4())
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test]
async fn mentorship_requests() {
    let world = World::new();
    let mentor = world.user("Maya", Role::Alumni).await;
    let peer = world.user("Pat", Role::Student).await;
    let mentee = world.user("Lee", Role::Student).await;
    let backend = world.backend.as_ref();

    let err = mentorships::request_mentorship(backend, &mentee, user_id(&peer), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::Validation(ValidationError::RoleNotAllowed(Role::Student))));

    let err = mentorships::request_mentorship(backend, &mentee, UserId::new(), None)
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));

    let request = mentorships::request_mentorship(backend, &mentee, user_id(&mentor), Some("Career advice?".into()))
        .await
        .unwrap();
    assert_eq!(request.status, MentorshipStatus::Pending);
    assert!(mentorships::request_mentorship(backend, &mentee, user_id(&mentor), None)
        .await
        .unwrap_err()
        .is_validation());

    let inbox = notifications::recent_notifications(backend, &mentor, 10).await.unwrap();
    assert_eq!(inbox[0].kind, KIND_MENTORSHIP_REQUEST);
    assert_eq!(mentorships::pending_mentorship_count(backend, &mentor).await.unwrap(), 1);

    let accepted = mentorships::respond_to_mentorship(backend, &mentor, request.id, true).await.unwrap();
    assert_eq!(accepted.status, MentorshipStatus::Accepted);
    assert_eq!(mentorships::mentorships_for(backend, &mentee).await.unwrap().len(), 1);
    assert_eq!(mentorships::pending_mentorship_count(backend, &mentor).await.unwrap(), 0);
}

#[tokio::test]
async fn dashboard_counts() {
    let world = World::new();
    let bob = world.user("Bob", Role::Faculty).await;
    let alice = world.user("Alice", Role::Alumni).await;
    let backend = world.backend.as_ref();
    let now = Utc::now();

    world.connect(&alice, &bob).await;
    world.message(&bob, &alice, "hello").await;
    campus_events::create_event(backend, &bob, draft("Reunion", 7), now).await.unwrap();
    notifications::create_notification(
        backend,
        &bob,
        alumnet_shared::models::NewNotification {
            user_id: user_id(&alice),
            kind: "event".into(),
            content: "Reunion next week".into(),
            is_read: false,
            link_to: None,
        },
    )
    .await
    .unwrap();

    let stats = dashboard::dashboard_stats(backend, &alice, now).await.unwrap();
    assert_eq!(stats.connections, 1);
    assert_eq!(stats.unread_messages, 1);
    assert_eq!(stats.unread_notifications, 1);
    assert_eq!(stats.upcoming_events, 1);
    assert_eq!(stats.pending_mentorships, 0);

    let stats = dashboard::dashboard_stats(backend, &guest(), now).await.unwrap();
    assert_eq!(stats.upcoming_events, 1);
    assert_eq!(stats.connections, 0);
    assert_eq!(world.backend.count_calls("count", Table::Connections), 1);
}
