#![allow(clippy::unwrap_used)]
// Integration tests for `SessionManager` and the command endpoints using wiremock.

use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use kevo_api::{
    BoltState, ClientConfig, Credentials, Error, ErrorKind, KevoClient, LockId, SessionState,
    StaleSessionPolicy,
};

// ── Helpers ─────────────────────────────────────────────────────────

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html><body>
  <form class="new_user" action="/signin" method="post">
    <input name="utf8" type="hidden" value="&#x2713;" />
    <input type="hidden" name="authenticity_token" value="tok123" />
    <input type="email" name="user[username]" />
    <input type="password" name="user[password]" />
  </form>
</body></html>"#;

const SESSION_COOKIE: &str = "_kevo_session=abc";

fn client_for(server: &MockServer, policy: StaleSessionPolicy) -> KevoClient {
    let credentials = Credentials::new("alice@example.com", SecretString::from("s3cret"));
    let config = ClientConfig::new(credentials)
        .with_base_url(Url::parse(&server.uri()).unwrap())
        .with_stale_session_policy(policy);
    KevoClient::new(config)
}

async fn setup() -> (MockServer, KevoClient) {
    let server = MockServer::start().await;
    let client = client_for(&server, StaleSessionPolicy::default());
    (server, client)
}

/// Mount `/login` + `/signin`, expecting exactly `logins` login round trips.
async fn mount_login(server: &MockServer, logins: u64) {
    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .expect(logins)
        .mount(server)
        .await;

    Mock::given(method("POST"))
        .and(path("/signin"))
        .and(body_string_contains("authenticity_token=tok123"))
        .and(body_string_contains("user%5Busername%5D=alice%40example.com"))
        .and(body_string_contains("user%5Bpassword%5D=s3cret"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "_kevo_session=abc; Path=/")
                .set_body_string("<html>welcome</html>"),
        )
        .expect(logins)
        .mount(server)
        .await;
}

fn lock_json() -> serde_json::Value {
    json!({
        "id": 42,
        "name": "Front Door",
        "bolt_state": 1,
        "brand": "Kwikset",
        "firmware_version": "1.0"
    })
}

// ── Login tests ─────────────────────────────────────────────────────

#[tokio::test]
async fn test_login_creates_session() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    assert_eq!(client.session().state(), SessionState::Absent);
    client.session().login().await.unwrap();

    assert!(client.session().has_session());
    assert_eq!(client.session().state(), SessionState::Active);
    assert_eq!(client.session().session_generation(), Some(1));
}

#[tokio::test]
async fn test_login_without_token_fails() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/signin"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let result = client.session().login().await;

    assert!(
        matches!(result, Err(Error::TokenNotFound)),
        "expected TokenNotFound, got: {result:?}"
    );
    assert!(!client.session().has_session());
}

#[tokio::test]
async fn test_login_transport_failure_is_auth_error() {
    // Nothing listens on port 1.
    let credentials = Credentials::new("alice", SecretString::from("pw"));
    let client = KevoClient::new(
        ClientConfig::new(credentials).with_base_url(Url::parse("http://127.0.0.1:1").unwrap()),
    );

    let err = client.session().login().await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Auth, "got: {err:?}");
}

#[tokio::test]
async fn test_login_ignores_signin_response_status() {
    let (server, client) = setup().await;

    Mock::given(method("GET"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_string(LOGIN_PAGE))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/signin"))
        .respond_with(ResponseTemplate::new(422).set_body_string("invalid"))
        .mount(&server)
        .await;

    client.session().login().await.unwrap();
    assert!(client.session().has_session());
}

// ── authenticated_get tests ─────────────────────────────────────────

#[tokio::test]
async fn test_first_request_logs_in_exactly_once() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/remote_locks/command/lock.json"))
        .and(query_param("arguments", "42"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(lock_json()))
        .expect(2)
        .mount(&server)
        .await;

    let id = LockId::from("42");
    client.get_lock(&id).await.unwrap();
    client.get_lock(&id).await.unwrap();
}

#[tokio::test]
async fn test_authenticated_get_round_trips_json() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    let value = client.session().authenticated_get(url).await.unwrap();

    assert_eq!(value, json!({ "id": 1 }));
}

#[tokio::test]
async fn test_500_on_fresh_session_is_terminal() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .expect(1)
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    let err = client.session().authenticated_get(url).await.unwrap_err();

    match err {
        Error::Api { status, body } => {
            assert_eq!(status, 500);
            assert_eq!(body, "boom");
        }
        other => panic!("expected Api error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_500_on_existing_session_relogs_and_returns_stale_body() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 1 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "expired" })))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .and(header("cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "id": 2 })))
        .expect(1)
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    client.session().authenticated_get(url.clone()).await.unwrap();
    assert_eq!(client.session().session_generation(), Some(1));

    let value = client.session().authenticated_get(url).await.unwrap();

    assert_eq!(value, json!({ "error": "expired" }));
    assert_eq!(client.session().session_generation(), Some(2));
}

#[tokio::test]
async fn test_stale_html_body_is_deserialization_error() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html>error</html>"))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    client.session().authenticated_get(url.clone()).await.unwrap();
    let err = client.session().authenticated_get(url).await.unwrap_err();

    assert!(
        matches!(err, Error::Deserialization { ref body, .. } if body == "<html>error</html>"),
        "got: {err:?}"
    );
}

#[tokio::test]
async fn test_retry_after_login_policy_reissues_request() {
    let server = MockServer::start().await;
    let client = client_for(&server, StaleSessionPolicy::RetryAfterLogin);
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "n": 1 })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "expired" })))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "n": 2 })))
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    client.session().authenticated_get(url.clone()).await.unwrap();
    let value = client.session().authenticated_get(url).await.unwrap();

    assert_eq!(value, json!({ "n": 2 }));
}

#[tokio::test]
async fn test_second_500_after_relogin_is_api_error() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "down" })))
        .expect(2)
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    client.session().authenticated_get(url.clone()).await.unwrap();
    let err = client.session().authenticated_get(url).await.unwrap_err();

    assert_eq!(err.status(), Some(500));
    assert_eq!(client.session().session_generation(), Some(2));
}

#[tokio::test]
async fn test_concurrent_expiry_triggers_single_relogin() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({ "error": "expired" })))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    client.session().authenticated_get(url.clone()).await.unwrap();

    let (a, b) = tokio::join!(
        client.session().authenticated_get(url.clone()),
        client.session().authenticated_get(url),
    );

    assert_eq!(a.unwrap(), json!({ "error": "expired" }));
    assert_eq!(b.unwrap(), json!({ "error": "expired" }));
    assert_eq!(client.session().session_generation(), Some(2));
}

#[tokio::test]
async fn test_non_success_status_is_api_error() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    client.session().authenticated_get(url.clone()).await.unwrap();
    let err = client.session().authenticated_get(url).await.unwrap_err();

    assert_eq!(err.status(), Some(404));
    assert_eq!(err.kind(), ErrorKind::Client);
}

#[tokio::test]
async fn test_invalidate_forces_new_login() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;

    Mock::given(method("GET"))
        .and(path("/anything.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(2)
        .mount(&server)
        .await;

    let url = client.session().url("anything.json").unwrap();
    client.session().authenticated_get(url.clone()).await.unwrap();
    client.session().invalidate();
    client.session().authenticated_get(url).await.unwrap();

    assert_eq!(client.session().session_generation(), Some(2));
}

// ── Command tests ───────────────────────────────────────────────────

#[tokio::test]
async fn test_get_lock() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/remote_locks/command/lock.json"))
        .and(query_param("arguments", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lock_json()))
        .mount(&server)
        .await;

    let lock = client.get_lock(&LockId::from("42")).await.unwrap();

    assert_eq!(lock.id, LockId::from("42"));
    assert_eq!(lock.name, "Front Door");
    assert_eq!(lock.bolt_state, BoltState::Locked);
    assert!(lock.is_locked());
    assert_eq!(lock.brand.as_deref(), Some("Kwikset"));
    assert_eq!(lock.firmware_version.as_deref(), Some("1.0"));
}

#[tokio::test]
async fn test_get_lock_with_unexpected_shape() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/remote_locks/command/lock.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "unexpected": true })))
        .mount(&server)
        .await;

    let err = client.get_lock(&LockId::from("42")).await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_lock_twice_succeeds() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/remote_locks/command/remote_lock.json"))
        .and(query_param("arguments", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(2)
        .mount(&server)
        .await;

    let id = LockId::from("42");
    client.lock(&id).await.unwrap();
    client.lock(&id).await.unwrap();
}

#[tokio::test]
async fn test_unlock() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/remote_locks/command/remote_unlock.json"))
        .and(query_param("arguments", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    client.unlock(&LockId::from("42")).await.unwrap();
}

/// Mount `show.json` for lock 42 so a session is established before a command.
async fn mount_show(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/user/remote_locks/command/lock.json"))
        .and(query_param("arguments", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(lock_json()))
        .mount(server)
        .await;
}

/// First call on the stale session gets a 500, the re-sent one succeeds.
async fn mount_expiring_command(server: &MockServer, endpoint: &str) {
    let route = format!("/user/remote_locks/command/{endpoint}");
    Mock::given(method("GET"))
        .and(path(route.as_str()))
        .and(query_param("arguments", "42"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "session expired" })),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(route.as_str()))
        .and(query_param("arguments", "42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": "ok" })))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_lock_on_expired_session_is_resent() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;
    mount_show(&server).await;
    mount_expiring_command(&server, "remote_lock.json").await;

    let id = LockId::from("42");
    client.get_lock(&id).await.unwrap();
    client.lock(&id).await.unwrap();

    assert_eq!(client.session().session_generation(), Some(2));
}

#[tokio::test]
async fn test_unlock_on_expired_session_is_resent() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;
    mount_show(&server).await;
    mount_expiring_command(&server, "remote_unlock.json").await;

    let id = LockId::from("42");
    client.get_lock(&id).await.unwrap();
    client.unlock(&id).await.unwrap();

    assert_eq!(client.session().session_generation(), Some(2));
}

#[tokio::test]
async fn test_lock_fails_when_resent_command_fails() {
    let (server, client) = setup().await;
    mount_login(&server, 2).await;
    mount_show(&server).await;

    Mock::given(method("GET"))
        .and(path("/user/remote_locks/command/remote_lock.json"))
        .respond_with(
            ResponseTemplate::new(500).set_body_json(json!({ "error": "session expired" })),
        )
        .expect(2)
        .mount(&server)
        .await;

    let id = LockId::from("42");
    client.get_lock(&id).await.unwrap();
    let err = client.lock(&id).await.unwrap_err();

    assert!(matches!(err, Error::Api { status: 500, .. }), "got: {err:?}");
}

#[tokio::test]
async fn test_websocket_url_discovery() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/remote_locks/auth/show.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "socket_location": "wss://push.mykevo.com/socket?token=xyz",
            "user_id": 7
        })))
        .mount(&server)
        .await;

    let url = client.websocket_url().await.unwrap();
    assert_eq!(url.as_str(), "wss://push.mykevo.com/socket?token=xyz");
}

#[tokio::test]
async fn test_websocket_url_missing_field() {
    let (server, client) = setup().await;
    mount_login(&server, 1).await;

    Mock::given(method("GET"))
        .and(path("/user/remote_locks/auth/show.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "user_id": 7 })))
        .mount(&server)
        .await;

    let err = client.websocket_url().await.unwrap_err();
    assert!(matches!(err, Error::Deserialization { .. }), "got: {err:?}");
}
