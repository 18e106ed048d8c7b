//! Token exchange against a mock OAuth2 endpoint.

mod common;

use std::sync::Arc;
use std::time::Duration;

use gcloud_client::auth::{Authenticator, CLOUD_PLATFORM_SCOPE};
use gcloud_client::error::AuthError;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::{TOKEN_PATH, credentials_for, mount_token_endpoint, requests_for};

#[tokio::test]
async fn token_is_fetched_and_cached() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "ya29.cached", 3600).await;

    let auth = Authenticator::new(credentials_for(&server)).unwrap();
    let first = auth.token(&[CLOUD_PLATFORM_SCOPE]).await.unwrap();
    let second = auth.token(&[CLOUD_PLATFORM_SCOPE]).await.unwrap();

    first
        .with_token(|t| assert_eq!(t, "ya29.cached"))
        .unwrap();
    assert!(!first.is_expired());
    assert_eq!(second.authorization_value().unwrap(), "Bearer ya29.cached");
    assert_eq!(requests_for(&server, TOKEN_PATH).await, 1);
}

#[tokio::test]
async fn exchange_uses_the_jwt_bearer_grant() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.grant",
            "token_type": "Bearer",
            "expires_in": 3600,
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(credentials_for(&server)).unwrap();
    auth.token(&[CLOUD_PLATFORM_SCOPE]).await.unwrap();
}

#[tokio::test]
async fn ten_concurrent_callers_cause_one_refresh() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_delay(Duration::from_millis(100))
                .set_body_json(serde_json::json!({
                    "access_token": "ya29.shared",
                    "token_type": "Bearer",
                    "expires_in": 3600,
                })),
        )
        .mount(&server)
        .await;

    let auth = Arc::new(Authenticator::new(credentials_for(&server)).unwrap());

    let callers = (0..10).map(|_| {
        let auth = Arc::clone(&auth);
        async move { auth.token(&[CLOUD_PLATFORM_SCOPE]).await }
    });
    for result in futures::future::join_all(callers).await {
        let token = result.unwrap();
        token.with_token(|t| assert_eq!(t, "ya29.shared")).unwrap();
    }
    assert_eq!(requests_for(&server, TOKEN_PATH).await, 1);
    assert!(!auth.refresh_in_flight(&[CLOUD_PLATFORM_SCOPE]));
}

#[tokio::test]
async fn distinct_scopes_get_distinct_tokens() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "ya29.scoped", 3600).await;

    let auth = Authenticator::new(credentials_for(&server)).unwrap();
    auth.token(&[CLOUD_PLATFORM_SCOPE]).await.unwrap();
    auth.token(&["https://www.googleapis.com/auth/devstorage.read_only"])
        .await
        .unwrap();

    assert_eq!(requests_for(&server, TOKEN_PATH).await, 2);
}

#[tokio::test]
async fn token_close_to_expiry_is_refreshed_ahead() {
    let server = MockServer::start().await;
    // Expires 61 s out: valid on arrival, inside the 60 s skew about a second
    // later.
    mount_token_endpoint(&server, "ya29.shortlived", 61).await;

    let auth = Authenticator::new(credentials_for(&server)).unwrap();
    auth.token(&[CLOUD_PLATFORM_SCOPE]).await.unwrap();
    tokio::time::sleep(Duration::from_millis(1200)).await;
    auth.token(&[CLOUD_PLATFORM_SCOPE]).await.unwrap();

    assert_eq!(requests_for(&server, TOKEN_PATH).await, 2);
}

#[tokio::test]
async fn non_2xx_exchange_fails_with_status_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(TOKEN_PATH))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_string(r#"{"error":"invalid_grant","error_description":"bad signature"}"#),
        )
        .mount(&server)
        .await;

    let auth = Authenticator::new(credentials_for(&server)).unwrap();
    match auth.token(&[CLOUD_PLATFORM_SCOPE]).await.unwrap_err() {
        AuthError::TokenRequestFailed { status, body } => {
            assert_eq!(status, 400);
            assert!(body.contains("invalid_grant"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn close_wipes_cached_tokens() {
    let server = MockServer::start().await;
    mount_token_endpoint(&server, "ya29.wiped", 3600).await;

    let auth = Authenticator::new(credentials_for(&server)).unwrap();
    let token = auth.token(&[CLOUD_PLATFORM_SCOPE]).await.unwrap();
    auth.close();

    // The clone shares storage with the cache; it is wiped too.
    assert!(token.authorization_value().is_err());
}
