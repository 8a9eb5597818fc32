//! HTTP tests for the CSRF and login routes

use std::sync::Arc;

use axum::{
    Router,
    body::{Body, to_bytes},
    http::{
        Request, Response, StatusCode,
        header::{
            ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS,
            ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, COOKIE, SET_COOKIE,
        },
    },
};
use chrono::Duration;
use halo::{
    Halo, HaloBuilder, InMemoryLoginAttemptRepository, ManualClock, StaticAccount,
    StaticCredentialVerifier,
};
use axum_extra::extract::cookie::Cookie;
use halo_axum::{AuthenticatedUser, CookieConfig, routes};
use serde_json::{Value, json};
use tower::ServiceExt;

const SECRET: &str = "router-test-secret-at-least-32-bytes";

type TestHalo = Halo<InMemoryLoginAttemptRepository, StaticCredentialVerifier>;

fn setup() -> (Router, Arc<TestHalo>) {
    setup_with_clock(Arc::new(ManualClock::starting_now()))
}

fn setup_with_clock(clock: Arc<ManualClock>) -> (Router, Arc<TestHalo>) {
    let verifier = StaticCredentialVerifier::new([StaticAccount::new(
        "uid-grace",
        "grace@example.com",
        "abc123",
    )
    .with_display_name("Grace")]);

    let halo = Arc::new(
        HaloBuilder::new()
            .with_csrf_secret(SECRET)
            .with_clock(clock)
            .with_verifier(verifier)
            .build()
            .expect("Failed to build Halo"),
    );

    let app = routes(halo.clone())
        .with_cookie_config(CookieConfig::development())
        .build();
    (app, halo)
}

fn set_cookies(response: &Response<Body>) -> Vec<String> {
    response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .map(str::to_string)
        .collect()
}

fn cookie_value(cookies: &[String], name: &str) -> Option<String> {
    cookies.iter().find_map(|c| {
        let cookie = Cookie::parse_encoded(c.as_str()).ok()?;
        (cookie.name() == name).then(|| cookie.value().to_string())
    })
}

async fn json_body(response: Response<Body>) -> Value {
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

/// Fetch a token anonymously; returns (token, session id).
async fn fetch_token(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri("/csrf").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let cookies = set_cookies(&response);
    let session = cookie_value(&cookies, "session-id").expect("session cookie");
    let body = json_body(response).await;
    (body["csrfToken"].as_str().unwrap().to_string(), session)
}

fn login(token: Option<&str>, session: &str, password: &str) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/login")
        .header(CONTENT_TYPE, "application/json")
        .header("x-forwarded-for", "1.2.3.4")
        .header(COOKIE, format!("session-id={session}"));
    if let Some(token) = token {
        builder = builder.header("x-csrf-token", token);
    }
    builder
        .body(Body::from(
            json!({ "email": "grace@example.com", "password": password }).to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_csrf_endpoint_sets_cookies() {
    let (app, halo) = setup();

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/csrf").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let cookies = set_cookies(&response);
    let csrf_cookie = cookies
        .iter()
        .find(|c| c.starts_with("csrf-token="))
        .expect("csrf cookie");
    assert!(csrf_cookie.contains("HttpOnly"));
    assert!(csrf_cookie.contains("SameSite=Strict"));
    assert!(csrf_cookie.contains("Max-Age=1800"));

    let session = cookie_value(&cookies, "session-id").expect("session cookie");
    let body = json_body(response).await;
    let token = body["csrfToken"].as_str().unwrap();
    assert_eq!(cookie_value(&cookies, "csrf-token").as_deref(), Some(token));
    assert!(halo.csrf().validate_token(token, &session));
}

#[tokio::test]
async fn test_csrf_endpoint_reuses_session_cookie() {
    let (app, halo) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/csrf")
                .header(COOKIE, "session-id=existing-session")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let cookies = set_cookies(&response);
    assert!(cookie_value(&cookies, "session-id").is_none());
    let body = json_body(response).await;
    assert!(
        halo.csrf()
            .validate_token(body["csrfToken"].as_str().unwrap(), "existing-session")
    );
}

#[tokio::test]
async fn test_csrf_endpoint_binds_authenticated_user() {
    let (app, halo) = setup();

    let response = app
        .oneshot(
            Request::builder()
                .uri("/csrf")
                .extension(AuthenticatedUser("uid-grace".to_string()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    let body = json_body(response).await;
    assert!(
        halo.csrf()
            .validate_token(body["csrfToken"].as_str().unwrap(), "uid-grace")
    );
}

#[tokio::test]
async fn test_preflight() {
    let (app, _) = setup();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/login")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_METHODS],
        "POST, OPTIONS"
    );
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_HEADERS],
        "Content-Type, Authorization, X-CSRF-Token"
    );

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/csrf")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(
        response.headers()[ACCESS_CONTROL_ALLOW_METHODS],
        "GET, OPTIONS"
    );
}

#[tokio::test]
async fn test_login_success() {
    let (app, halo) = setup();
    let (token, session) = fetch_token(&app).await;

    let response = app
        .oneshot(login(Some(&token), &session, "abc123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");

    let cookies = set_cookies(&response);
    let rotated = cookie_value(&cookies, "csrf-token").expect("rotated csrf cookie");

    let body = json_body(response).await;
    assert_eq!(body["uid"], "uid-grace");
    assert_eq!(body["email"], "grace@example.com");
    assert_eq!(body["displayName"], "Grace");
    assert_eq!(body["emailVerified"], false);
    assert_eq!(body["success"], true);
    assert_eq!(body["csrfToken"], rotated.as_str());
    assert!(halo.csrf().validate_token(&rotated, "uid-grace"));
}

#[tokio::test]
async fn test_login_without_token_is_forbidden() {
    let (app, _) = setup();
    let (_, session) = fetch_token(&app).await;

    let response = app.oneshot(login(None, &session, "abc123")).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        json_body(response).await,
        json!({ "error": "CSRF token missing" })
    );
}

#[tokio::test]
async fn test_login_with_foreign_session_token_is_forbidden() {
    let (app, _) = setup();
    let (token, _) = fetch_token(&app).await;

    let response = app
        .oneshot(login(Some(&token), "another-session", "abc123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Invalid CSRF token" })
    );
}

#[tokio::test]
async fn test_login_missing_fields() {
    let (app, _) = setup();
    let (token, session) = fetch_token(&app).await;

    let request = Request::builder()
        .method("POST")
        .uri("/login")
        .header(CONTENT_TYPE, "application/json")
        .header(COOKIE, format!("session-id={session}"))
        .header("x-csrf-token", token)
        .body(Body::from(r#"{"email":"grace@example.com"}"#))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert_eq!(
        json_body(response).await,
        json!({ "error": "Email and password are required" })
    );
}

#[tokio::test]
async fn test_lockout_sequence() {
    let (app, _) = setup();
    let (token, session) = fetch_token(&app).await;

    let mut statuses = Vec::new();
    let mut bodies = Vec::new();
    for _ in 0..5 {
        let response = app
            .clone()
            .oneshot(login(Some(&token), &session, "wrong1"))
            .await
            .unwrap();
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        statuses.push(response.status().as_u16());
        bodies.push(json_body(response).await);
    }
    assert_eq!(statuses, vec![401, 401, 401, 401, 429]);

    assert_eq!(
        bodies[0]["error"],
        "Invalid email or password (4 attempts remaining)"
    );
    assert_eq!(bodies[0]["remainingAttempts"], 4);
    assert_eq!(bodies[0]["isLocked"], false);
    assert_eq!(bodies[0]["lockedUntil"], Value::Null);

    let locked = &bodies[4];
    assert_eq!(
        locked["error"],
        "Too many failed login attempts. Please try again in 15 minutes."
    );
    assert_eq!(locked["isLocked"], true);
    assert_eq!(locked["remainingAttempts"], 0);
    let locked_until = locked["lockedUntil"].as_i64().expect("millis timestamp");
    let expected = chrono::Utc::now().timestamp_millis() + 15 * 60 * 1000;
    assert!((locked_until - expected).abs() < 60_000);

    // Correct password is still refused
    let response = app
        .oneshot(login(Some(&token), &session, "abc123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    assert!(response.headers().contains_key("retry-after"));
    let body = json_body(response).await;
    assert_eq!(body["isLocked"], true);
}

#[tokio::test]
async fn test_retry_after_follows_halo_clock() {
    let clock = Arc::new(ManualClock::starting_now());
    let (app, _) = setup_with_clock(clock.clone());
    let (token, session) = fetch_token(&app).await;

    for _ in 0..5 {
        app.clone()
            .oneshot(login(Some(&token), &session, "wrong1"))
            .await
            .unwrap();
    }

    clock.advance(Duration::minutes(14));
    let response = app
        .oneshot(login(Some(&token), &session, "abc123"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()["retry-after"], "60");
    let body = json_body(response).await;
    assert_eq!(
        body["error"],
        "Too many failed login attempts. Please try again in 1 minutes."
    );
}
