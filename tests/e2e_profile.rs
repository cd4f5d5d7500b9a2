//! E2E tests for profile sightings, lookups and renames

mod common;

use common::TestServer;
use serde_json::json;

#[tokio::test]
async fn test_first_sighting_returns_profile() {
    let server = TestServer::new().await;

    let profile = server
        .sighting(&[
            ("user_id", "42"),
            ("username", "alice"),
            ("first_name", "Alice"),
            ("lang", "en"),
        ])
        .await;

    assert_eq!(profile["user_id"], 42);
    assert_eq!(profile["username"], "alice");
    assert_eq!(profile["original_username"], "alice");
    assert_eq!(profile["custom_username"], serde_json::Value::Null);
    assert_eq!(profile["first_name"], "Alice");
    assert_eq!(profile["last_name"], "");
    assert_eq!(profile["language_code"], "en");
    assert_eq!(profile["avatar_url"], serde_json::Value::Null);
}

#[tokio::test]
async fn test_sighting_defaults_language() {
    let server = TestServer::new().await;

    let profile = server
        .sighting(&[("user_id", "7"), ("username", "bob")])
        .await;

    assert_eq!(profile["language_code"], "ru");
    assert_eq!(profile["first_name"], "");
}

#[tokio::test]
async fn test_sighting_requires_numeric_user_id() {
    let server = TestServer::new().await;

    let missing = server
        .client
        .get(server.url("/api/profile?username=alice"))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 400);

    let invalid = server
        .client
        .get(server.url("/api/profile?user_id=abc"))
        .send()
        .await
        .unwrap();
    assert_eq!(invalid.status(), 400);
    let body: serde_json::Value = invalid.json().await.unwrap();
    assert_eq!(body["error"], "Invalid user_id");
}

#[tokio::test]
async fn test_rename_then_identity_update_keeps_custom_username() {
    let server = TestServer::new().await;

    server
        .sighting(&[
            ("user_id", "42"),
            ("username", "alice"),
            ("first_name", "Alice"),
            ("lang", "en"),
        ])
        .await;

    let renamed = server
        .rename(json!({"user_id": 42, "username": "cool_alice"}))
        .await;
    assert_eq!(renamed, json!({"ok": true, "username": "cool_alice"}));

    let stored: serde_json::Value = server
        .client
        .get(server.url("/api/user/42"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["username"], "cool_alice");
    assert_eq!(stored["original_username"], "alice");

    let profile = server
        .sighting(&[
            ("user_id", "42"),
            ("username", "alice2"),
            ("first_name", "Alice"),
            ("lang", "en"),
        ])
        .await;
    assert_eq!(profile["original_username"], "alice2");
    assert_eq!(profile["username"], "cool_alice");
}

#[tokio::test]
async fn test_rename_accepts_string_user_id_for_new_user() {
    let server = TestServer::new().await;

    let renamed = server
        .rename(json!({"user_id": "99", "username": "newcomer"}))
        .await;
    assert_eq!(renamed, json!({"ok": true, "username": "newcomer"}));

    let username: serde_json::Value = server
        .client
        .get(server.url("/api/user/99/username"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(username, json!({"username": "newcomer"}));
}

#[tokio::test]
async fn test_rename_reports_missing_fields() {
    let server = TestServer::new().await;

    let without_id = server.rename(json!({"username": "cool_alice"})).await;
    assert_eq!(
        without_id,
        json!({"ok": false, "error": "Missing user_id or username"})
    );

    let without_name = server.rename(json!({"user_id": 42})).await;
    assert_eq!(
        without_name,
        json!({"ok": false, "error": "Missing user_id or username"})
    );

    let blank_name = server
        .rename(json!({"user_id": 42, "username": "  "}))
        .await;
    assert_eq!(blank_name["ok"], false);
}

#[tokio::test]
async fn test_rename_reports_invalid_user_id() {
    let server = TestServer::new().await;

    let answer = server
        .rename(json!({"user_id": "not-a-number", "username": "cool_alice"}))
        .await;
    assert_eq!(answer, json!({"ok": false, "error": "Invalid user_id"}));
}

#[tokio::test]
async fn test_lookups_for_unknown_user_are_null() {
    let server = TestServer::new().await;

    let username: serde_json::Value = server
        .client
        .get(server.url("/api/user/1234/username"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(username, json!({"username": null}));

    let avatar: serde_json::Value = server
        .client
        .get(server.url("/api/user/1234/avatar"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(avatar, json!({"avatar_url": null}));

    let profile: serde_json::Value = server
        .client
        .get(server.url("/api/user/1234"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(profile, serde_json::Value::Null);
}

#[tokio::test]
async fn test_avatar_lookup_returns_stored_url() {
    let server = TestServer::new().await;

    server
        .sighting(&[("user_id", "42"), ("username", "alice")])
        .await;
    server
        .state
        .db
        .set_avatar_url(42, "https://cdn.example.com/a.jpg")
        .await
        .unwrap();

    let avatar: serde_json::Value = server
        .client
        .get(server.url("/api/user/42/avatar"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(avatar, json!({"avatar_url": "https://cdn.example.com/a.jpg"}));
}

#[tokio::test]
async fn test_storage_failures_return_structured_answers() {
    let server = TestServer::new().await;
    let database_errors = miniapp_profile::metrics::ERRORS_TOTAL.with_label_values(&["database"]);
    let errors_before = database_errors.get();

    // Every query after this fails with PoolClosed.
    server.state.db.close().await;

    let sighting = server
        .client
        .get(server.url("/api/profile"))
        .query(&[("user_id", "77"), ("username", "carol")])
        .send()
        .await
        .unwrap();
    assert_eq!(sighting.status(), 200);
    let sighting: serde_json::Value = sighting.json().await.unwrap();
    assert_eq!(sighting, serde_json::Value::Null);

    for (path, expected) in [
        ("/api/user/77", serde_json::Value::Null),
        ("/api/user/77/username", json!({"username": null})),
        ("/api/user/77/avatar", json!({"avatar_url": null})),
    ] {
        let response = server.client.get(server.url(path)).send().await.unwrap();
        assert_eq!(response.status(), 200, "{path}");
        let body: serde_json::Value = response.json().await.unwrap();
        assert_eq!(body, expected, "{path}");
    }

    let renamed = server
        .rename(json!({"user_id": 77, "username": "cool_carol"}))
        .await;
    assert_eq!(
        renamed,
        json!({"ok": false, "error": "Internal server error"})
    );

    assert!(database_errors.get() >= errors_before + 5);
}

#[tokio::test]
async fn test_empty_lang_and_username_fall_back() {
    let server = TestServer::new().await;

    let profile = server
        .sighting(&[("user_id", "8"), ("username", ""), ("lang", "")])
        .await;
    assert_eq!(profile["language_code"], "ru");
    assert_eq!(profile["username"], serde_json::Value::Null);

    let username: serde_json::Value = server
        .client
        .get(server.url("/api/user/8/username"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(username, json!({"username": null}));
}
