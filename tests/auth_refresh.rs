//! Token lifecycle: reuse, refresh, and the no-token error path.
use chrono::{Duration, Utc};
use gsync::client::auth::{Authenticator, ClientSecrets, StoredToken};
use gsync::context::{SharedContext, TestContext};
use serial_test::serial;
use std::sync::Arc;

fn make_auth(ctx: &Arc<TestContext>, server_url: &str) -> Authenticator {
    let secrets = ClientSecrets {
        client_id: "client-id".to_string(),
        client_secret: "client-secret".to_string(),
        token_uri: Some(format!("{}/token", server_url)),
    };
    let shared: SharedContext = ctx.clone();
    Authenticator::new(shared, secrets, server_url).unwrap()
}

#[tokio::test]
#[serial]
async fn test_expired_token_is_refreshed_and_persisted() {
    let ctx = Arc::new(TestContext::new());
    StoredToken {
        access_token: "stale".to_string(),
        refresh_token: Some("refresh-1".to_string()),
        expiry: Utc::now() - Duration::hours(1),
    }
    .save(ctx.as_ref())
    .unwrap();

    let mut server = mockito::Server::new_async().await;
    let url = server.url();

    let token_mock = server
        .mock("POST", "/token")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_header("authorization", mockito::Matcher::Regex("^Basic ".to_string()))
        .match_body(mockito::Matcher::AllOf(vec![
            mockito::Matcher::UrlEncoded("grant_type".into(), "refresh_token".into()),
            mockito::Matcher::UrlEncoded("refresh_token".into(), "refresh-1".into()),
        ]))
        .with_header("content-type", "application/json")
        .with_body(r#"{"access_token":"fresh","expires_in":3600}"#)
        .create_async()
        .await;

    let auth = make_auth(&ctx, &url);

    let access = auth.ensure_token().await.unwrap();
    assert_eq!(access, "fresh");

    // A second call must reuse the in-memory token, not refresh again
    // (token_mock expects exactly one hit).
    let access_again = auth.ensure_token().await.unwrap();
    assert_eq!(access_again, "fresh");

    let stored = StoredToken::load(ctx.as_ref()).expect("token persisted");
    assert_eq!(stored.access_token, "fresh");
    assert_eq!(
        stored.refresh_token.as_deref(),
        Some("refresh-1"),
        "refresh token survives a response that omits it"
    );
    assert!(!stored.is_expired(Utc::now()));

    token_mock.assert_async().await;
}

#[tokio::test]
#[serial]
async fn test_valid_token_is_used_without_network() {
    let ctx = Arc::new(TestContext::new());
    StoredToken {
        access_token: "still-good".to_string(),
        refresh_token: None,
        expiry: Utc::now() + Duration::hours(2),
    }
    .save(ctx.as_ref())
    .unwrap();

    // No token endpoint at all: any network attempt would fail loudly.
    let auth = make_auth(&ctx, "http://127.0.0.1:9");

    let access = auth.ensure_token().await.unwrap();
    assert_eq!(access, "still-good");
}

#[tokio::test]
#[serial]
async fn test_missing_token_points_at_auth_command() {
    let ctx = Arc::new(TestContext::new());
    let auth = make_auth(&ctx, "http://127.0.0.1:9");

    let err = auth.ensure_token().await.unwrap_err();
    assert!(err.to_string().contains("gsync auth"), "{}", err);
}

#[tokio::test]
#[serial]
async fn test_expired_token_without_refresh_token_fails() {
    let ctx = Arc::new(TestContext::new());
    StoredToken {
        access_token: "stale".to_string(),
        refresh_token: None,
        expiry: Utc::now() - Duration::hours(1),
    }
    .save(ctx.as_ref())
    .unwrap();

    let auth = make_auth(&ctx, "http://127.0.0.1:9");
    let err = auth.ensure_token().await.unwrap_err();
    assert!(err.to_string().contains("gsync auth"), "{}", err);
}

#[test]
fn test_expiry_skew_margin() {
    let now = Utc::now();
    let token = StoredToken {
        access_token: "x".to_string(),
        refresh_token: None,
        expiry: now + Duration::seconds(30),
    };
    // 30 seconds left is inside the one minute margin.
    assert!(token.is_expired(now));

    let token = StoredToken {
        expiry: now + Duration::seconds(120),
        ..token
    };
    assert!(!token.is_expired(now));
}
