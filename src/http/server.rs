use std::any::Any;

use anyhow::{Context, Result};
use axum::http::StatusCode;
use axum::middleware;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tracing::{error, info};

use super::{request_log, routes, AppState};

/// Assembles the full application router. Split from [`run`] so integration
/// tests can drive it with `tower::ServiceExt::oneshot` instead of a socket.
pub fn build_router(state: AppState) -> Router {
    // Wide-open CORS: the demo is meant to be attacked from anywhere.
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    Router::new()
        .route("/", get(routes::home))
        .route("/search", get(routes::search))
        .route("/login", get(routes::login_page).post(routes::login))
        .route("/payment", get(routes::payment_page))
        .route("/comment", post(routes::add_comment))
        .route("/comments", get(routes::list_comments))
        .route("/health", get(routes::health))
        .route("/api/users", get(routes::list_users))
        .route("/api/user-profile", get(routes::user_profile))
        .route("/api/login-attempt", post(routes::login_attempt))
        .route("/api/transaction", post(routes::process_transaction))
        .route("/api/bot-challenge", get(routes::bot_challenge))
        .route("/api/behavioral-analysis", post(routes::behavioral_analysis))
        .route("/api/analytics", get(routes::analytics))
        .fallback(routes::not_found)
        .layer(middleware::from_fn(request_log::log_request))
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .with_state(state)
}

/// Turns a handler panic into a JSON 500 instead of tearing the demo down.
/// The panic message goes into the response body, in keeping with the rest
/// of the leak-everything error surface.
fn handle_panic(err: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = err.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = err.downcast_ref::<&str>() {
        (*s).to_string()
    } else {
        "unknown panic".to_string()
    };
    error!("handler panicked: {}", detail);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "error": "Internal server error",
            "message": detail,
        })),
    )
        .into_response()
}

/// Binds the configured address and serves until ctrl-c.
pub async fn run(state: AppState) -> Result<()> {
    let addr = format!(
        "{}:{}",
        state.settings.server.bind, state.settings.server.port
    );
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(
        "lurebox listening on {} (backend: {})",
        addr,
        state.store.backend_name()
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::settings::Settings;
    use crate::models::audit::{LoginAttempt, TransactionRecord};
    use crate::scoring::oracle::FixedOracle;
    use crate::storage::memory::MemoryStore;
    use crate::storage::Store;
    use axum::body::Body;
    use axum::http::{header, Request};
    use chrono::Utc;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;

    fn app_with_store() -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        store.seed().unwrap();
        let state = AppState::new(
            store.clone(),
            Arc::new(FixedOracle(0.0)),
            Arc::new(Settings::default()),
        );
        (build_router(state), store)
    }

    fn app() -> Router {
        app_with_store().0
    }

    fn app_with_oracle(sample: f64) -> Router {
        let store = Arc::new(MemoryStore::new());
        store.seed().unwrap();
        let state = AppState::new(
            store,
            Arc::new(FixedOracle(sample)),
            Arc::new(Settings::default()),
        );
        build_router(state)
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        send(app, request).await
    }

    async fn post_json(app: Router, uri: &str, body: Value) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        send(app, request).await
    }

    fn login_row(ip: &str) -> LoginAttempt {
        LoginAttempt {
            username: "admin".to_string(),
            ip: ip.to_string(),
            user_agent: "test".to_string(),
            device_fingerprint: "fp".to_string(),
            success: false,
            timestamp: Utc::now(),
            risk_score: 0.1,
        }
    }

    fn transaction_row(amount: f64, ip: &str) -> TransactionRecord {
        TransactionRecord {
            user_id: 1,
            amount,
            currency: "USD".to_string(),
            merchant: "shop".to_string(),
            ip: ip.to_string(),
            device_fingerprint: "fp".to_string(),
            timestamp: Utc::now(),
            fraud_score: 0.0,
            status: "approved".to_string(),
        }
    }

    // -- SQL injection surfaces ---------------------------------------------

    #[tokio::test]
    async fn test_search_normal_match() {
        let (status, body) = get_json(app(), "/search?q=Laptop").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
        assert_eq!(body["results"][0]["name"], "Laptop");
    }

    #[tokio::test]
    async fn test_search_bypass_returns_all_products() {
        let (status, body) = get_json(app(), "/search?q=%27%20OR%20%271%27%3D%271").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body["vulnerability"],
            "SQL Injection - bypassed WHERE clause"
        );
        assert_eq!(body["results"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_search_destructive_leaves_products_intact() {
        let app = app();
        let (status, body) =
            get_json(app.clone(), "/search?q=%3B%20DROP%20TABLE%20products").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["vulnerability"], "SQL Injection");

        // The "destroyed" table still answers the next query.
        let (status, body) = get_json(app, "/search?q=Laptop").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["count"], 1);
    }

    #[tokio::test]
    async fn test_users_listing_redacts_passwords() {
        let (status, body) = get_json(app(), "/api/users").await;
        assert_eq!(status, StatusCode::OK);
        let users = body["users"].as_array().unwrap();
        assert_eq!(users.len(), 3);
        assert!(users[0].get("password").is_none());
    }

    #[tokio::test]
    async fn test_users_breach_and_destructive_filters() {
        let app = app();
        let (status, body) =
            get_json(app.clone(), "/api/users?filter=%27%20OR%20%271%27%3D%271").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vulnerability"], "SQL Injection - data breach");
        assert_eq!(body["users"][0]["password"], "***EXPOSED***");

        let (status, body) = get_json(app, "/api/users?filter=DROP%20TABLE%20users").await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "CRITICAL: Database destroyed!");
    }

    #[tokio::test]
    async fn test_user_profile_lookup_and_misses() {
        let app = app();
        let (status, body) = get_json(app.clone(), "/api/user-profile?id=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["profile"]["username"], "admin");
        assert!(body["profile"].get("password").is_none());

        let (status, _) = get_json(app.clone(), "/api/user-profile?id=999").await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = get_json(app, "/api/user-profile").await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "User ID required");
    }

    #[tokio::test]
    async fn test_user_profile_union_probe_exposes_passwords() {
        let (status, body) = get_json(
            app(),
            "/api/user-profile?id=1%20UNION%20SELECT%20password%20FROM%20users",
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vulnerability"], "SQL Injection - UNION attack");
        let passwords = body["exposed_data"]["admin_passwords"].as_array().unwrap();
        assert!(passwords
            .iter()
            .any(|p| p["username"] == "admin" && p["password"] == "admin123"));
    }

    // -- Stored XSS ---------------------------------------------------------

    #[tokio::test]
    async fn test_comment_xss_stored_verbatim() {
        let app = app();
        let payload = "<script>alert('xss')</script>";
        let (status, body) =
            post_json(app.clone(), "/comment", json!({ "content": payload })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vulnerability"], "Stored XSS");

        let (status, body) = get_json(app, "/comments").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["comments"][0]["content"], payload);
        assert_eq!(body["comments"][0]["author"], "anonymous");
    }

    #[tokio::test]
    async fn test_comment_alias_key_carries_the_payload() {
        let app = app();
        let payload = "<script>alert(1)</script>";
        let (status, body) =
            post_json(app.clone(), "/comment", json!({ "comment": payload })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["vulnerability"], "Stored XSS");
        assert_eq!(body["comment"]["content"], payload);

        let (_, body) = get_json(app, "/comments").await;
        assert_eq!(body["comments"][0]["content"], payload);
    }

    #[tokio::test]
    async fn test_comment_accepts_form_posts() {
        let request = Request::builder()
            .method("POST")
            .uri("/comment")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from("content=hello&author=joe"))
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Comment added successfully");
        assert_eq!(body["comment"]["author"], "joe");
    }

    #[tokio::test]
    async fn test_comment_requires_content() {
        let (status, body) = post_json(app(), "/comment", json!({ "author": "joe" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Comment required");
    }

    // -- Brute force target -------------------------------------------------

    #[tokio::test]
    async fn test_login_success_and_failure() {
        let (app, store) = app_with_store();
        let (status, body) = post_json(
            app.clone(),
            "/login",
            json!({ "username": "admin", "password": "admin123" }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["user"]["username"], "admin");
        assert!(body["user"].get("password").is_none());

        let (status, body) = post_json(
            app,
            "/login",
            json!({ "username": "admin", "password": "wrong" }),
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        // The echo that makes brute force attempts legible in traffic.
        assert_eq!(body["attempt"], "admin:wrong");

        // Both attempts were recorded.
        let summary = store.audit_summary().unwrap();
        assert_eq!(summary.login_attempts.total, 2);
    }

    // -- Risk-scored login --------------------------------------------------

    #[tokio::test]
    async fn test_login_attempt_allowed_with_clean_signals() {
        let request = Request::builder()
            .method("POST")
            .uri("/api/login-attempt")
            .header(header::CONTENT_TYPE, "application/json")
            .header("user-agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")
            .body(Body::from(
                json!({ "username": "admin", "password": "admin123" }).to_string(),
            ))
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["riskScore"], 0.0);
    }

    #[tokio::test]
    async fn test_login_attempt_challenged() {
        // 0.3 for the bot user agent plus 0.2 for the weak password: 0.5,
        // above the 0.4 challenge threshold but not the 0.7 block threshold.
        let request = Request::builder()
            .method("POST")
            .uri("/api/login-attempt")
            .header(header::CONTENT_TYPE, "application/json")
            .header("user-agent", "EvilBot/1.0")
            .body(Body::from(
                json!({ "username": "admin", "password": "123" }).to_string(),
            ))
            .unwrap();
        let (status, body) = send(app(), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["challengeType"], "captcha");
        assert_eq!(body["challengeRequired"], true);
    }

    #[tokio::test]
    async fn test_login_attempt_blocked_after_burst() {
        let (app, store) = app_with_store();
        for _ in 0..6 {
            store.insert_login_attempt(&login_row("10.9.9.9")).unwrap();
        }

        // 0.4 velocity + 0.3 bot user agent + 0.2 weak password = 0.9.
        let request = Request::builder()
            .method("POST")
            .uri("/api/login-attempt")
            .header(header::CONTENT_TYPE, "application/json")
            .header("user-agent", "EvilBot/1.0")
            .header("x-forwarded-for", "10.9.9.9")
            .body(Body::from(
                json!({ "username": "admin", "password": "123" }).to_string(),
            ))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["challengeRequired"], true);
        assert!(body["riskScore"].as_f64().unwrap() > 0.7);
    }

    // -- Fraud-scored transactions ------------------------------------------

    #[tokio::test]
    async fn test_transaction_approved() {
        let (status, body) = post_json(app(), "/api/transaction", json!({ "amount": 100 })).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "approved");
        let id = body["transactionId"].as_str().unwrap();
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_transaction_challenge_at_strict_boundary() {
        let (app, store) = app_with_store();
        for _ in 0..6 {
            store
                .insert_transaction(&transaction_row(10.0, "10.1.2.3"))
                .unwrap();
        }

        // 0.5 from the amount tiers plus 0.3 velocity lands exactly on the
        // 0.8 block threshold; strict `>` keeps it in the challenge tier.
        let request = Request::builder()
            .method("POST")
            .uri("/api/transaction")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "10.1.2.3")
            .body(Body::from(json!({ "amount": 6000 }).to_string()))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "pending_verification");
        assert_eq!(body["verificationRequired"], true);
    }

    #[tokio::test]
    async fn test_transaction_blocked() {
        let (app, store) = app_with_store();
        for _ in 0..6 {
            store
                .insert_transaction(&transaction_row(2000.0, "10.1.2.3"))
                .unwrap();
        }

        let request = Request::builder()
            .method("POST")
            .uri("/api/transaction")
            .header(header::CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", "10.1.2.3")
            .body(Body::from(json!({ "amount": 6000 }).to_string()))
            .unwrap();
        let (status, body) = send(app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["blocked"], true);
    }

    #[tokio::test]
    async fn test_transaction_requires_amount() {
        let (status, body) = post_json(app(), "/api/transaction", json!({})).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Amount required");
    }

    // -- Bot detection ------------------------------------------------------

    #[tokio::test]
    async fn test_bot_challenge_tiers() {
        let browser = Request::builder()
            .uri("/api/bot-challenge")
            .header("user-agent", "Mozilla/5.0 (X11; Linux x86_64) Firefox/128.0")
            .header("accept", "text/html,application/xhtml+xml")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(), browser).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "Human traffic detected");

        let curl = Request::builder()
            .uri("/api/bot-challenge")
            .header("user-agent", "curl/8.0")
            .header("accept", "*/*")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(), curl).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["challenge"], "JavaScript challenge required");

        let bot = Request::builder()
            .uri("/api/bot-challenge")
            .header("user-agent", "googlebot-crawler/1.0")
            .header("accept", "*/*")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(app(), bot).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert_eq!(body["blocked"], true);
    }

    #[tokio::test]
    async fn test_bot_challenge_records_activity() {
        let (app, store) = app_with_store();
        let request = Request::builder()
            .uri("/api/bot-challenge")
            .header("user-agent", "curl/8.0")
            .header("accept", "*/*")
            .body(Body::empty())
            .unwrap();
        send(app, request).await;
        assert_eq!(store.audit_summary().unwrap().bot_activity.total, 1);
    }

    // -- Behavioral analysis ------------------------------------------------

    #[tokio::test]
    async fn test_behavioral_analysis_flags_no_interaction() {
        let (status, body) = post_json(
            app(),
            "/api/behavioral-analysis",
            json!({ "mouseMovements": [], "keystrokes": 0, "timeOnPage": 0 }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!((body["humanScore"].as_f64().unwrap() - 0.2).abs() < 1e-9);
        assert!((body["botScore"].as_f64().unwrap() - 0.8).abs() < 1e-9);
        assert_eq!(body["recommendation"], "challenge");
    }

    #[tokio::test]
    async fn test_behavioral_bot_score_complements_the_raw_score() {
        // Full ML term on a fully human session: the raw score is 1.2, the
        // reported human score clamps to 1.0, and the bot score is the
        // complement of the raw value, below zero.
        let (status, body) = post_json(
            app_with_oracle(1.0),
            "/api/behavioral-analysis",
            json!({
                "mouseMovements": [1, 2, 3, 4, 5, 6],
                "keystrokes": 40,
                "timeOnPage": 15000
            }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["humanScore"].as_f64().unwrap(), 1.0);
        assert!((body["botScore"].as_f64().unwrap() + 0.2).abs() < 1e-9);
        assert_eq!(body["recommendation"], "allow");
    }

    // -- Analytics and health -----------------------------------------------

    #[tokio::test]
    async fn test_analytics_aggregates() {
        let (app, store) = app_with_store();
        let mut row = login_row("10.0.0.1");
        row.risk_score = 0.2;
        store.insert_login_attempt(&row).unwrap();
        row.risk_score = 0.4;
        store.insert_login_attempt(&row).unwrap();

        let (status, body) = get_json(app, "/api/analytics").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["analytics"]["loginAttempts"]["total"], 2);
        let avg = body["analytics"]["loginAttempts"]["avg_risk"]
            .as_f64()
            .unwrap();
        assert!((avg - 0.3).abs() < 1e-9);
        // FixedOracle(0.0) pins the simulated model readout.
        assert_eq!(body["mlInsights"]["threatLevel"], "normal");
        assert!((body["mlInsights"]["adaptiveThreshold"].as_f64().unwrap() - 0.6).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["backend"], "memory");
    }

    #[tokio::test]
    async fn test_fallback_lists_endpoints() {
        let (status, body) = get_json(app(), "/nope").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["endpoints"].as_array().unwrap().len() > 10);
    }
}
