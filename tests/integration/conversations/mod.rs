//! Conversation endpoint integration tests
//!
//! Create, list, fetch and unread-count over HTTP, plus the walkthrough
//! scenarios for a guest and host talking about one listing.

use axum::http::{Method, StatusCode};
use serde_json::{json, Value};
use staybook_conversations::{ClientEvent, RealtimeGateway, ServerEvent};
use uuid::Uuid;

use crate::common::{drain, TestApp, UserFixture};

/// Helper: guest opens a conversation with host about a fresh listing
async fn start(app: &TestApp, guest: &UserFixture, host: &UserFixture, text: &str) -> Value {
    let listing = app.create_listing("Lakeside Cabin", host).await;
    let (status, body) = app
        .request(
            Method::POST,
            "/conversations",
            Some(guest),
            Some(json!({
                "toUserId": host.id(),
                "message": text,
                "listingId": listing.id,
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "body: {}", body);
    body
}

fn unread(body: &Value, user: &UserFixture) -> u64 {
    body["unreadCounts"][user.id().to_string()]
        .as_u64()
        .unwrap_or(0)
}

mod test_create_conversation {
    use super::*;

    #[tokio::test]
    async fn test_create_conversation_returns_full_aggregate() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;

        let body = start(&app, &guest, &host, "Is this available?").await;

        assert_eq!(body["listingName"], "Lakeside Cabin");
        assert_eq!(body["participants"].as_array().unwrap().len(), 2);
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["senderId"], guest.id().to_string());
        assert_eq!(body["messages"][0]["content"], "Is this available?");
        assert_eq!(body["messages"][0]["read"], false);
        assert_eq!(body["lastMessage"], "Is this available?");
        assert_eq!(unread(&body, &host), 1);
        assert_eq!(unread(&body, &guest), 0);
    }

    #[tokio::test]
    async fn test_second_create_reuses_conversation() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let listing = app.create_listing("Loft", &host).await;

        let mut ids = Vec::new();
        for (from, to, text) in [(&guest, &host, "Hi"), (&host, &guest, "Hello back")] {
            let (status, body) = app
                .request(
                    Method::POST,
                    "/conversations",
                    Some(from),
                    Some(json!({
                        "toUserId": to.id(),
                        "message": text,
                        "listingId": listing.id,
                    })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            ids.push(body["id"].as_str().unwrap().to_string());
        }

        assert_eq!(ids[0], ids[1]);

        let (_, list) = app
            .request(Method::GET, "/conversations", Some(&guest), None)
            .await;
        assert_eq!(list.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_create_unknown_listing_returns_404() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;

        let (status, body) = app
            .request(
                Method::POST,
                "/conversations",
                Some(&guest),
                Some(json!({
                    "toUserId": host.id(),
                    "message": "Hello",
                    "listingId": Uuid::new_v4(),
                })),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_create_unknown_recipient_returns_404() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let listing = app.create_listing("Loft", &host).await;

        let (status, _) = app
            .request(
                Method::POST,
                "/conversations",
                Some(&guest),
                Some(json!({
                    "toUserId": Uuid::new_v4(),
                    "message": "Hello",
                    "listingId": listing.id,
                })),
            )
            .await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_create_with_self_returns_400() {
        let app = TestApp::new().await;
        let host = app.create_user("Host").await;
        let listing = app.create_listing("Loft", &host).await;

        let (status, body) = app
            .request(
                Method::POST,
                "/conversations",
                Some(&host),
                Some(json!({
                    "toUserId": host.id(),
                    "message": "Note to self",
                    "listingId": listing.id,
                })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_create_missing_fields_returns_400() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;

        let (status, _) = app
            .request(
                Method::POST,
                "/conversations",
                Some(&guest),
                Some(json!({ "message": "Hello" })),
            )
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_create_without_identity_returns_401() {
        let app = TestApp::new().await;
        let (status, _) = app
            .request(
                Method::POST,
                "/conversations",
                None,
                Some(json!({
                    "toUserId": Uuid::new_v4(),
                    "message": "Hello",
                    "listingId": Uuid::new_v4(),
                })),
            )
            .await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_create_records_notification_for_recipient() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;

        let body = start(&app, &guest, &host, "Is this available?").await;
        app.wait_for_notifications(1).await;

        let records = app.notifications.for_user(host.id());
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, "new_message");
        assert_eq!(records[0].conversation_id.to_string(), body["id"]);
        assert_eq!(records[0].message, "New message about Lakeside Cabin");
        assert!(app.notifications.for_user(guest.id()).is_empty());
    }
}

mod test_read_surface {
    use super::*;

    #[tokio::test]
    async fn test_list_is_sorted_by_recent_activity() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;

        let first = start(&app, &guest, &host, "First listing").await;
        let second = start(&app, &guest, &host, "Second listing").await;

        let (_, list) = app
            .request(Method::GET, "/conversations", Some(&guest), None)
            .await;
        let ids: Vec<&str> = list
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec![second["id"].as_str().unwrap(), first["id"].as_str().unwrap()]);

        // A reply on the older conversation moves it to the top
        let uri = format!("/conversations/{}/messages", first["id"].as_str().unwrap());
        let (status, _) = app
            .request(Method::POST, &uri, Some(&host), Some(json!({ "message": "Reply" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let (_, list) = app
            .request(Method::GET, "/conversations", Some(&guest), None)
            .await;
        assert_eq!(list[0]["id"], first["id"]);
    }

    #[tokio::test]
    async fn test_list_summaries_carry_callers_unread_count() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        start(&app, &guest, &host, "Is this available?").await;

        let (_, host_list) = app
            .request(Method::GET, "/conversations", Some(&host), None)
            .await;
        let (_, guest_list) = app
            .request(Method::GET, "/conversations", Some(&guest), None)
            .await;

        assert_eq!(host_list[0]["unreadCount"], 1);
        assert_eq!(guest_list[0]["unreadCount"], 0);
        assert!(host_list[0].get("messages").is_none());
    }

    #[tokio::test]
    async fn test_list_excludes_other_users_conversations() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let stranger = app.create_user("Stranger").await;
        start(&app, &guest, &host, "Hello").await;

        let (status, list) = app
            .request(Method::GET, "/conversations", Some(&stranger), None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn test_unread_count_sums_across_conversations() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let other_guest = app.create_user("Other").await;

        start(&app, &guest, &host, "One").await;
        let second = start(&app, &other_guest, &host, "Two").await;
        let uri = format!("/conversations/{}/messages", second["id"].as_str().unwrap());
        app.request(Method::POST, &uri, Some(&other_guest), Some(json!({ "message": "Three" })))
            .await;

        let (status, body) = app
            .request(Method::GET, "/conversations/unread-count", Some(&host), None)
            .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({ "unreadCount": 3 }));
    }

    #[tokio::test]
    async fn test_get_marks_counterpart_messages_read() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let created = start(&app, &guest, &host, "Is this available?").await;
        let uri = format!("/conversations/{}", created["id"].as_str().unwrap());

        let (status, body) = app.request(Method::GET, &uri, Some(&host), None).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(unread(&body, &host), 0);
        assert_eq!(body["messages"][0]["read"], true);

        let (_, count) = app
            .request(Method::GET, "/conversations/unread-count", Some(&host), None)
            .await;
        assert_eq!(count["unreadCount"], 0);
    }

    #[tokio::test]
    async fn test_get_by_sender_leaves_own_messages_unread() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let created = start(&app, &guest, &host, "Is this available?").await;
        let uri = format!("/conversations/{}", created["id"].as_str().unwrap());

        let (_, body) = app.request(Method::GET, &uri, Some(&guest), None).await;

        assert_eq!(body["messages"][0]["read"], false);
        assert_eq!(unread(&body, &host), 1);
        assert_eq!(body["updatedAt"], created["updatedAt"]);
    }

    #[tokio::test]
    async fn test_get_by_stranger_returns_403() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let stranger = app.create_user("Stranger").await;
        let created = start(&app, &guest, &host, "Hello").await;
        let uri = format!("/conversations/{}", created["id"].as_str().unwrap());

        let (status, body) = app.request(Method::GET, &uri, Some(&stranger), None).await;

        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["error"]["code"], "AUTHORIZATION_ERROR");
    }

    #[tokio::test]
    async fn test_get_missing_conversation_returns_404() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let uri = format!("/conversations/{}", Uuid::new_v4());

        let (status, _) = app.request(Method::GET, &uri, Some(&guest), None).await;

        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_get_with_malformed_id_returns_400() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;

        let (status, _) = app
            .request(Method::GET, "/conversations/not-a-uuid", Some(&guest), None)
            .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_broadcasts_messages_read_only_when_something_changed() {
        let app = TestApp::new().await;
        let guest = app.create_user("Guest").await;
        let host = app.create_user("Host").await;
        let created = start(&app, &guest, &host, "Hello").await;
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

        let (session, mut outbound) = app.connect(&guest);
        session
            .handle_event(ClientEvent::JoinConversation(id))
            .await
            .unwrap();

        let uri = format!("/conversations/{}", id);
        app.request(Method::GET, &uri, Some(&host), None).await;
        app.request(Method::GET, &uri, Some(&host), None).await;

        let reads: Vec<_> = drain(&mut outbound)
            .into_iter()
            .filter_map(|event| match event {
                ServerEvent::MessagesRead(read) => Some(read),
                _ => None,
            })
            .collect();

        assert_eq!(reads.len(), 1);
        assert_eq!(reads[0].user_id, host.id());
        assert_eq!(reads[0].unread_counts.get(host.id()), 0);
    }
}

mod test_scenarios {
    use super::*;

    #[tokio::test]
    async fn test_guest_and_host_walkthrough() {
        let app = TestApp::new().await;
        let a = app.create_user("Alice").await;
        let b = app.create_user("Bob").await;

        // 1. A asks B about the listing
        let created = start(&app, &a, &b, "Is this available?").await;
        let id = created["id"].as_str().unwrap().to_string();
        assert_eq!(created["messages"].as_array().unwrap().len(), 1);
        assert_eq!(unread(&created, &b), 1);
        assert_eq!(created["lastMessage"], "Is this available?");

        // 2. B opens the thread, then replies
        let (status, opened) = app
            .request(Method::GET, &format!("/conversations/{}", id), Some(&b), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(unread(&opened, &b), 0);

        let messages_uri = format!("/conversations/{}/messages", id);
        let (status, replied) = app
            .request(
                Method::POST,
                &messages_uri,
                Some(&b),
                Some(json!({ "message": "Yes, available" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(replied["messages"].as_array().unwrap().len(), 2);
        assert_eq!(unread(&replied, &a), 1);
        assert_eq!(unread(&replied, &b), 0);
        assert_eq!(replied["lastMessage"], "Yes, available");

        // 3. An oversized message is rejected and changes nothing
        let (status, body) = app
            .request(
                Method::POST,
                &messages_uri,
                Some(&a),
                Some(json!({ "message": "x".repeat(1001) })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (_, listed) = app
            .request(Method::GET, "/conversations", Some(&a), None)
            .await;
        assert_eq!(listed[0]["lastMessage"], "Yes, available");
        assert_eq!(listed[0]["updatedAt"], replied["updatedAt"]);

        // 4. B reads; A's own counter is untouched
        let (_, read) = app
            .request(Method::GET, &format!("/conversations/{}", id), Some(&b), None)
            .await;
        assert_eq!(unread(&read, &a), 1);
        assert_eq!(unread(&read, &b), 0);
        for message in read["messages"].as_array().unwrap() {
            if message["senderId"] == a.id().to_string() {
                assert_eq!(message["read"], true);
            } else {
                assert_eq!(message["read"], false);
            }
        }
    }

    #[tokio::test]
    async fn test_offline_recipient_sees_authoritative_state_after_reconnect() {
        let app = TestApp::new().await;
        let a = app.create_user("Alice").await;
        let b = app.create_user("Bob").await;
        let created = start(&app, &a, &b, "Is this available?").await;
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

        // B is online, then drops
        let (b_session, _b_outbound) = app.connect(&b);
        b_session
            .handle_event(ClientEvent::JoinConversation(id))
            .await
            .unwrap();
        app.gateway.disconnect(b_session.connection_id());
        assert_eq!(app.gateway.room_size(id), 0);

        // A keeps talking while B is away
        let uri = format!("/conversations/{}/messages", id);
        let (status, _) = app
            .request(Method::POST, &uri, Some(&a), Some(json!({ "message": "Still there?" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        // B reconnects; the list and the fetch reflect everything
        let (_, listed) = app
            .request(Method::GET, "/conversations", Some(&b), None)
            .await;
        assert_eq!(listed[0]["unreadCount"], 2);
        assert_eq!(listed[0]["lastMessage"], "Still there?");

        let (_, fetched) = app
            .request(Method::GET, &format!("/conversations/{}", id), Some(&b), None)
            .await;
        let contents: Vec<&str> = fetched["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["content"].as_str().unwrap())
            .collect();
        assert_eq!(contents, vec!["Is this available?", "Still there?"]);
        assert_eq!(unread(&fetched, &b), 0);
    }

    #[tokio::test]
    async fn test_long_message_preview_is_truncated() {
        let app = TestApp::new().await;
        let a = app.create_user("Alice").await;
        let b = app.create_user("Bob").await;
        let text = "a".repeat(80);

        let created = start(&app, &a, &b, &text).await;

        assert_eq!(created["lastMessage"], format!("{}...", "a".repeat(50)));
        assert_eq!(created["messages"][0]["content"], text);
    }
}
