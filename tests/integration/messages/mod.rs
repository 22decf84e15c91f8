//! Message endpoint integration tests
//!
//! Appends over HTTP, concurrent senders, and store stalls.

use std::sync::Arc;

use axum::http::{Method, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use staybook_conversations::{ConversationStore, InMemoryConversationStore, UnreadLedger};
use uuid::Uuid;

use crate::common::{StalledStore, TestApp, UserFixture};

/// Helper: create a conversation and return its id
async fn create_conversation(app: &TestApp, guest: &UserFixture, host: &UserFixture) -> Uuid {
    let listing = app.create_listing("Harbour Flat", host).await;
    let (status, body) = app
        .request(
            Method::POST,
            "/conversations",
            Some(guest),
            Some(json!({
                "toUserId": host.id(),
                "message": "Hello",
                "listingId": listing.id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().parse().unwrap()
}

async fn send(app: &TestApp, id: Uuid, sender: &UserFixture, text: &str) -> (StatusCode, Value) {
    app.request(
        Method::POST,
        &format!("/conversations/{}/messages", id),
        Some(sender),
        Some(json!({ "message": text })),
    )
    .await
}

mod test_send_message {
    use super::*;

    #[tokio::test]
    async fn test_send_returns_201_with_updated_conversation() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;

        let (status, body) = send(&app, id, &host, "  Welcome!  ").await;

        assert_eq!(status, StatusCode::CREATED);
        let messages = body["messages"].as_array().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1]["content"], "Welcome!");
        assert_eq!(messages[1]["senderId"], host.id().to_string());
        assert_eq!(messages[1]["senderName"], "Host");
        assert!(messages[1]["id"].as_str().is_some());
        assert_eq!(body["lastMessageAt"], messages[1]["createdAt"]);
        assert_eq!(body["updatedAt"], messages[1]["createdAt"]);
    }

    #[tokio::test]
    async fn test_created_at_strictly_increases() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;

        for i in 0..5 {
            send(&app, id, &guest, &format!("message {}", i)).await;
        }
        let (_, body) = send(&app, id, &host, "last").await;

        let stamps: Vec<DateTime<Utc>> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["createdAt"].as_str().unwrap().parse().unwrap())
            .collect();
        assert_eq!(stamps.len(), 7);
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_send_by_stranger_returns_403_and_changes_nothing() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let stranger = app.create_user("Stranger").await;
        let id = create_conversation(&app, &guest, &host).await;

        let (status, body) = send(&app, id, &stranger, "Let me in").await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "AUTHORIZATION_ERROR");

        let conversation = app
            .state
            .messenger
            .service()
            .get_for_participant(id, guest.id())
            .await
            .unwrap();
        assert_eq!(conversation.messages.len(), 1);
    }

    #[tokio::test]
    async fn test_send_to_missing_conversation_returns_404() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;

        let (status, _) = send(&app, Uuid::new_v4(), &guest, "Anyone?").await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_send_empty_or_blank_returns_400() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;

        for text in ["", "   \n\t"] {
            let (status, body) = send(&app, id, &guest, text).await;
            assert_eq!(status, StatusCode::BAD_REQUEST, "content {:?}", text);
            assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
        }
    }

    #[tokio::test]
    async fn test_send_exactly_max_length_is_accepted() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;

        let (status, _) = send(&app, id, &guest, &"é".repeat(1000)).await;
        assert_eq!(status, StatusCode::CREATED);

        let (status, _) = send(&app, id, &guest, &"é".repeat(1001)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_each_send_notifies_the_recipient() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;

        send(&app, id, &host, "Reply").await;
        app.wait_for_notifications(2).await;

        assert_eq!(app.notifications.for_user(host.id()).len(), 1);
        assert_eq!(app.notifications.for_user(guest.id()).len(), 1);
    }

    #[tokio::test]
    async fn test_failing_notification_store_does_not_fail_send() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;
        app.notifications.set_failing(true);

        let (status, body) = send(&app, id, &host, "Reply").await;

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["messages"].as_array().unwrap().len(), 2);
    }
}

mod test_concurrency {
    use super::*;

    #[test_log::test(tokio::test(flavor = "multi_thread", worker_threads = 4))]
    async fn test_concurrent_alternating_senders_lose_no_updates() {
        let app = Arc::new(TestApp::new().await);
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;

        const N: usize = 40;
        let mut tasks = Vec::new();
        for i in 0..N {
            let app = app.clone();
            let sender = if i % 2 == 0 { guest.clone() } else { host.clone() };
            tasks.push(tokio::spawn(async move {
                let (status, _) = send(&app, id, &sender, &format!("msg {}", i)).await;
                status
            }));
        }
        for task in tasks {
            assert_eq!(task.await.unwrap(), StatusCode::CREATED);
        }

        let conversation = app
            .state
            .messenger
            .service()
            .get_for_participant(id, guest.id())
            .await
            .unwrap();

        // The opening message plus every concurrent append
        assert_eq!(conversation.messages.len(), N + 1);
        assert_eq!(conversation.unread_for(host.id()) as usize, N / 2 + 1);
        assert_eq!(conversation.unread_for(guest.id()) as usize, N / 2);
        assert!(conversation
            .unread_counts
            .is_consistent_with(&conversation.participant_ids(), &conversation.messages));
        assert!(conversation
            .messages
            .windows(2)
            .all(|w| w[0].created_at < w[1].created_at));
        assert!(app.state.messenger.service().locks().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_contact_creates_one_conversation() {
        let app = Arc::new(TestApp::new().await);
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let listing = app.create_listing("Chalet", &host).await;

        let mut tasks = Vec::new();
        for (from, to) in [(&guest, &host), (&host, &guest), (&guest, &host), (&host, &guest)] {
            let app = app.clone();
            let (from, to) = (from.clone(), to.clone());
            tasks.push(tokio::spawn(async move {
                let (status, body) = app
                    .request(
                        Method::POST,
                        "/conversations",
                        Some(&from),
                        Some(json!({
                            "toUserId": to.id(),
                            "message": "Hi",
                            "listingId": listing.id,
                        })),
                    )
                    .await;
                assert_eq!(status, StatusCode::CREATED);
                body["id"].as_str().unwrap().to_string()
            }));
        }

        let mut ids = Vec::new();
        for task in tasks {
            ids.push(task.await.unwrap());
        }
        ids.dedup();
        assert_eq!(ids.len(), 1);

        let (_, list) = app
            .request(Method::GET, "/conversations", Some(&guest), None)
            .await;
        assert_eq!(list.as_array().unwrap().len(), 1);

        let id: Uuid = ids[0].parse().unwrap();
        let conversation = app
            .state
            .messenger
            .service()
            .get_for_participant(id, guest.id())
            .await
            .unwrap();
        assert_eq!(conversation.messages.len(), 4);
        assert_eq!(
            conversation.unread_counts,
            UnreadLedger::expected(&conversation.participant_ids(), &conversation.messages)
        );
    }

    #[tokio::test]
    async fn test_repeated_mark_read_is_idempotent() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;
        let messenger = &app.state.messenger;

        let first = messenger.mark_read(id, host.id()).await.unwrap();
        let second = messenger.mark_read(id, host.id()).await.unwrap();

        assert!(first.changed);
        assert!(!second.changed);
        assert_eq!(first.conversation.unread_for(host.id()), 0);
        assert_eq!(second.conversation.unread_for(host.id()), 0);
        assert_eq!(
            first.conversation.updated_at,
            second.conversation.updated_at
        );
    }
}

mod test_store_stall {
    use super::*;

    #[tokio::test]
    async fn test_stalled_store_surfaces_transient_error() {
        let config = staybook_common::Config::from_lookup(|key| match key {
            "STORE_TIMEOUT_MS" => Some("50".to_string()),
            "CONVERSATION_LOCK_TIMEOUT_MS" => Some("50".to_string()),
            _ => None,
        })
        .unwrap();
        let inner = InMemoryConversationStore::new();
        let app = TestApp::with_store(Arc::new(StalledStore::new(inner.clone())), config).await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;

        // Creation only inserts, which the stalled store still allows
        let id = create_conversation(&app, &guest, &host).await;

        let (status, body) = send(&app, id, &host, "Reply").await;

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "TRANSIENT_ERROR");
        let stored = inner.find(id).await.unwrap().unwrap();
        assert_eq!(stored.messages.len(), 1);
        assert!(app.state.messenger.service().locks().is_empty());
    }

    #[tokio::test]
    async fn test_request_timeout_answers_408() {
        let config = staybook_common::Config::from_lookup(|key| match key {
            "REQUEST_TIMEOUT_MS" => Some("50".to_string()),
            "STORE_TIMEOUT_MS" => Some("5000".to_string()),
            _ => None,
        })
        .unwrap();
        let inner = InMemoryConversationStore::new();
        let app = TestApp::with_store(Arc::new(StalledStore::new(inner.clone())), config).await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let id = create_conversation(&app, &guest, &host).await;

        let (status, _) = send(&app, id, &host, "Reply").await;

        assert_eq!(status, StatusCode::REQUEST_TIMEOUT);
        assert_eq!(inner.find(id).await.unwrap().unwrap().messages.len(), 1);
    }
}
