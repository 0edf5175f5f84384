use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{DateTime, Duration};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use skillshare::{FixedClock, JwtConfig, SkillShare, SkillShareBuilder, SqliteRepositoryProvider};
use skillshare_axum::{CookieConfig, routes};
use tower::ServiceExt;

const EMAIL: &str = "learner@example.com";
const PASSWORD: &str = "correct-horse";

struct TestApp {
    router: Router,
    skillshare: Arc<SkillShare<SqliteRepositoryProvider>>,
    clock: FixedClock,
}

async fn setup() -> TestApp {
    let clock = FixedClock::new(DateTime::from_timestamp(1_750_000_000, 0).unwrap());
    let skillshare = SkillShareBuilder::new()
        .with_sqlite("sqlite::memory:")
        .await
        .unwrap()
        .with_jwt(JwtConfig::new_hs256("http-test-secret-at-least-32-bytes").unwrap())
        .with_clock(Arc::new(clock.clone()))
        .apply_migrations(true)
        .build()
        .await
        .unwrap();
    let skillshare = Arc::new(skillshare);

    skillshare
        .register_user(EMAIL, PASSWORD, "Learner")
        .await
        .unwrap();

    let router = routes(skillshare.clone())
        .with_cookie_config(CookieConfig::development())
        .build();

    TestApp {
        router,
        skillshare,
        clock,
    }
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn with_bearer(mut request: Request<Body>, token: &str) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    request
}

async fn send(app: &TestApp, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, body)
}

async fn login(app: &TestApp, password: &str) -> (StatusCode, Value) {
    send(
        app,
        json_request(
            "POST",
            "/login",
            json!({ "email": EMAIL, "password": password }),
        ),
    )
    .await
}

fn admin_token(app: &TestApp) -> String {
    app.skillshare
        .issue_admin_token("ops@example.com", Duration::hours(1))
        .unwrap()
        .token
}

#[tokio::test]
async fn test_health() {
    let app = setup().await;
    let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_register_statuses() {
    let app = setup().await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/register",
            json!({ "email": "new@example.com", "password": "secret-pw", "name": "New" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["user"]["email"], "new@example.com");
    assert_eq!(body["user"]["loginAttempts"], 0);
    assert!(body["user"].get("passwordHash").is_none());

    let (status, _) = send(
        &app,
        json_request(
            "POST",
            "/register",
            json!({ "email": EMAIL, "password": "secret-pw", "name": "Dup" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/register",
            json!({ "email": "not-an-email", "password": "secret-pw", "name": "Bad" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], 400);
}

#[tokio::test]
async fn test_login_returns_token_and_cookie() {
    let app = setup().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            json!({ "email": EMAIL, "password": PASSWORD }),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(cookie.starts_with("skillshare_session="));
    assert!(cookie.contains("HttpOnly"));

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    let token = body["token"].as_str().unwrap();

    let session = Request::builder()
        .uri("/session")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, with_bearer(session, token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["email"], EMAIL);
    assert_eq!(body["session"]["role"], "user");
}

#[tokio::test]
async fn test_session_requires_token() {
    let app = setup().await;
    let request = Request::builder()
        .uri("/session")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let app = setup().await;
    let response = app
        .router
        .clone()
        .oneshot(json_request(
            "POST",
            "/login",
            json!({ "email": EMAIL, "password": PASSWORD }),
        ))
        .await
        .unwrap();
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    let pair = set_cookie.split(';').next().unwrap().to_string();

    let request = Request::builder()
        .uri("/session")
        .header(header::COOKIE, pair)
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["session"]["email"], EMAIL);
}

#[tokio::test]
async fn test_invalid_session_cookie_is_ignored() {
    let app = setup().await;
    let request = Request::builder()
        .uri("/session")
        .header(header::COOKIE, "skillshare_session=not-a-jwt")
        .body(Body::empty())
        .unwrap();

    let (status, _) = send(&app, request).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_session_cookie() {
    let app = setup().await;
    let (_, body) = login(&app, PASSWORD).await;
    let token = body["token"].as_str().unwrap();

    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .header(header::COOKIE, format!("skillshare_session={token}"))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .unwrap()
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("skillshare_session=;"));
    assert!(cookie.contains("Max-Age=0"));
}

#[tokio::test]
async fn test_logout_without_session_succeeds() {
    let app = setup().await;
    let request = Request::builder()
        .method("POST")
        .uri("/logout")
        .body(Body::empty())
        .unwrap();

    let (status, body) = send(&app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Successfully logged out");
}

#[tokio::test]
async fn test_lockout_returns_423_with_remaining_minutes() {
    let app = setup().await;

    for _ in 0..4 {
        let (status, body) = login(&app, "wrong-password").await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "Invalid credentials");
    }

    let (status, body) = login(&app, "wrong-password").await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["remainingMinutes"], 120);
    assert_eq!(
        body["error"],
        "Account locked after multiple failed login attempts. Please try again in 120 minutes."
    );

    app.clock.advance(Duration::minutes(30));
    let (status, body) = login(&app, PASSWORD).await;
    assert_eq!(status, StatusCode::LOCKED);
    assert_eq!(body["remainingMinutes"], 90);
}

#[tokio::test]
async fn test_unknown_email_gets_generic_401() {
    let app = setup().await;

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/login",
            json!({ "email": "nobody@example.com", "password": PASSWORD }),
        ),
    )
    .await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Invalid credentials");
}

#[tokio::test]
async fn test_admin_routes_require_admin_token() {
    let app = setup().await;
    let uri = format!("/admin/account-lockout?email={EMAIL}");

    let anonymous = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let (status, _) = send(&app, anonymous).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let garbage = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let (status, _) = send(&app, with_bearer(garbage, "not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (_, body) = login(&app, PASSWORD).await;
    let user_token = body["token"].as_str().unwrap().to_string();
    let as_user = Request::builder().uri(&uri).body(Body::empty()).unwrap();
    let (status, body) = send(&app, with_bearer(as_user, &user_token)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], 403);
}

#[tokio::test]
async fn test_admin_status_unlock_and_reset() {
    let app = setup().await;
    let token = admin_token(&app);
    for _ in 0..5 {
        login(&app, "wrong-password").await;
    }

    let status_request = Request::builder()
        .uri(format!("/admin/account-lockout?email={EMAIL}"))
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, with_bearer(status_request, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["email"], EMAIL);
    assert_eq!(body["loginAttempts"], 5);
    assert_eq!(body["totalFailedAttempts"], 5);
    assert_eq!(body["lockoutInfo"]["isLocked"], true);
    assert_eq!(body["lockoutInfo"]["remainingTime"], 120);
    assert_eq!(
        body["lockoutConfig"],
        json!({
            "maxAttempts": 5,
            "lockoutDuration": 120,
            "escalationAttempts": 10,
            "extendedLockoutDuration": 24,
        })
    );

    let unlock = json_request(
        "POST",
        "/admin/account-lockout",
        json!({ "email": EMAIL, "action": "unlock" }),
    );
    let (status, body) = send(&app, with_bearer(unlock, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({
            "success": true,
            "message": "Account has been unlocked successfully",
            "email": EMAIL,
        })
    );

    let (status, _) = login(&app, PASSWORD).await;
    assert_eq!(status, StatusCode::OK);

    let reset = json_request("PUT", "/admin/account-lockout", json!({ "email": EMAIL }));
    let (status, body) = send(&app, with_bearer(reset, &token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Login attempts have been reset successfully");

    let account = app.skillshare.lockout_status(EMAIL).await.unwrap();
    assert_eq!(account.total_failed_attempts, 0);
}

#[tokio::test]
async fn test_admin_request_validation() {
    let app = setup().await;
    let token = admin_token(&app);

    let missing = Request::builder()
        .uri("/admin/account-lockout")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, with_bearer(missing, &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Email parameter is required");

    let unknown = Request::builder()
        .uri("/admin/account-lockout?email=ghost@example.com")
        .body(Body::empty())
        .unwrap();
    let (status, body) = send(&app, with_bearer(unknown, &token)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "User not found");

    let bad_action = json_request(
        "POST",
        "/admin/account-lockout",
        json!({ "email": EMAIL, "action": "delete" }),
    );
    let (status, body) = send(&app, with_bearer(bad_action, &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid action. Use 'unlock'");

    let no_email = json_request("PUT", "/admin/account-lockout", json!({}));
    let (status, _) = send(&app, with_bearer(no_email, &token)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_password_reset_request_is_neutral() {
    let app = setup().await;

    for email in [EMAIL, "nobody@example.com"] {
        let (status, body) = send(
            &app,
            json_request("POST", "/password/reset/request", json!({ "email": email })),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["message"],
            "If a user with that email exists, a password reset link has been sent."
        );
    }

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/password/reset/verify",
            json!({ "token": "not-a-real-token" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);

    let (status, body) = send(
        &app,
        json_request(
            "POST",
            "/password/reset/confirm",
            json!({ "token": "not-a-real-token", "password": "brand-new-pw" }),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Invalid or expired reset token");
}
