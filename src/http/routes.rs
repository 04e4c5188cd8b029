use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::info;

use crate::models::audit::{BotActivityRecord, LoginAttempt, TransactionRecord};
use crate::models::catalog::PublicUser;
use crate::scoring::behavioral::InteractionMetrics;
use crate::scoring::{classify, Tier};
use crate::storage::{has_union_probe, SearchOutcome, UserListOutcome};

use super::error::ApiError;
use super::{client_ip, fingerprint_from, header_str, AppState, JsonOrForm};

// ---------------------------------------------------------------------------
// Demo pages
// ---------------------------------------------------------------------------

const HOME_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Vulnerable Demo Application</title></head>
<body>
  <h1>Vulnerable Demo Application</h1>
  <p><strong>WARNING:</strong> This application is intentionally insecure.
  It exists to generate attack traffic for WAF testing. Never deploy it
  anywhere reachable from the internet.</p>
  <h2>Attack surfaces</h2>
  <ul>
    <li><code>GET /search?q=...</code> - SQL injection (product search)</li>
    <li><code>POST /login</code> - brute force target</li>
    <li><code>POST /comment</code> - stored XSS</li>
    <li><code>GET /api/users?filter=...</code> - SQL injection (user listing)</li>
    <li><code>GET /api/user-profile?id=...</code> - UNION-based SQL injection</li>
    <li><code>POST /api/login-attempt</code> - risk-scored login</li>
    <li><code>POST /api/transaction</code> - fraud-scored payment</li>
    <li><code>GET /api/bot-challenge</code> - bot detection</li>
    <li><code>POST /api/behavioral-analysis</code> - behavioral scoring</li>
    <li><code>GET /api/analytics</code> - audit aggregates</li>
  </ul>
  <h2>Try it</h2>
  <form action="/search" method="get">
    <input name="q" placeholder="Search products...">
    <button type="submit">Search</button>
  </form>
  <form action="/comment" method="post">
    <input name="content" placeholder="Leave a comment...">
    <input name="author" placeholder="Your name">
    <button type="submit">Comment</button>
  </form>
  <p><a href="/login">Login page</a> | <a href="/payment">Payment page</a></p>
</body>
</html>"#;

const LOGIN_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Login - Vulnerable Demo</title></head>
<body>
  <h1>Login</h1>
  <p>Seeded accounts: admin/admin123, user1/password, john/john123</p>
  <form action="/login" method="post">
    <input name="username" placeholder="Username"><br>
    <input name="password" type="password" placeholder="Password"><br>
    <button type="submit">Login</button>
  </form>
</body>
</html>"#;

const PAYMENT_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>Payment - Vulnerable Demo</title></head>
<body>
  <h1>Payment</h1>
  <p>Transactions are scored for fraud; large amounts and rapid repeats
  raise the score.</p>
  <form action="/api/transaction" method="post">
    <input name="amount" placeholder="Amount"><br>
    <input name="card_number" placeholder="Card number"><br>
    <input name="merchant" placeholder="Merchant"><br>
    <button type="submit">Pay</button>
  </form>
</body>
</html>"#;

pub async fn home() -> Html<&'static str> {
    Html(HOME_PAGE)
}

pub async fn login_page() -> Html<&'static str> {
    Html(LOGIN_PAGE)
}

pub async fn payment_page() -> Html<&'static str> {
    Html(PAYMENT_PAGE)
}

// ---------------------------------------------------------------------------
// SQL injection surfaces
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// `GET /search?q=...` - product search over an injectable query.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Response, ApiError> {
    let Some(query) = params.q.filter(|q| !q.is_empty()) else {
        return Ok(Json(json!({ "error": "No search query provided" })).into_response());
    };

    let response = match state.store.search_products(&query)? {
        SearchOutcome::Destructive => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "CRITICAL: Database operation executed!",
                "query": query,
                "message": "In a real app, this would have damaged your database!",
                "vulnerability": "SQL Injection",
            })),
        )
            .into_response(),
        SearchOutcome::Bypass(results) => Json(json!({
            "message": "SQL Injection detected! Returning all products...",
            "query": query,
            "results": results,
            "vulnerability": "SQL Injection - bypassed WHERE clause",
        }))
        .into_response(),
        SearchOutcome::Results(results) => {
            let count = results.len();
            Json(json!({
                "query": query,
                "results": results,
                "count": count,
            }))
            .into_response()
        }
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct UsersParams {
    pub filter: Option<String>,
}

/// `GET /api/users?filter=...` - user listing with an injectable filter.
pub async fn list_users(
    State(state): State<AppState>,
    Query(params): Query<UsersParams>,
) -> Result<Response, ApiError> {
    let filter = params.filter.unwrap_or_default();

    let response = match state.store.users_filtered(&filter)? {
        UserListOutcome::Destructive => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({
                "error": "CRITICAL: Database destroyed!",
                "filter": filter,
                "vulnerability": "SQL Injection",
            })),
        )
            .into_response(),
        UserListOutcome::Breach(users) => {
            let exposed: Vec<_> = users
                .iter()
                .map(|u| {
                    json!({
                        "id": u.id,
                        "username": u.username,
                        "email": u.email,
                        "password": "***EXPOSED***",
                    })
                })
                .collect();
            Json(json!({
                "message": "SQL Injection! Exposing all user data...",
                "users": exposed,
                "vulnerability": "SQL Injection - data breach",
            }))
            .into_response()
        }
        UserListOutcome::Listing(users) => Json(json!({ "users": users })).into_response(),
    };
    Ok(response)
}

#[derive(Debug, Deserialize)]
pub struct ProfileParams {
    pub id: Option<String>,
}

/// `GET /api/user-profile?id=...` - profile lookup open to UNION probes.
pub async fn user_profile(
    State(state): State<AppState>,
    Query(params): Query<ProfileParams>,
) -> Result<Response, ApiError> {
    let Some(id) = params.id.filter(|id| !id.is_empty()) else {
        return Err(ApiError::MissingField("User ID required"));
    };

    if has_union_probe(&id) {
        let users = state.store.users()?;
        let admin_passwords: Vec<_> = users
            .iter()
            .map(|u| json!({ "username": u.username, "password": u.password }))
            .collect();
        return Ok(Json(json!({
            "message": "SQL Injection detected! Exposing sensitive data...",
            "query": id,
            "exposed_data": {
                "admin_passwords": admin_passwords,
                "system_info": "Database version: SQLite 3, Admin privileges: YES",
            },
            "vulnerability": "SQL Injection - UNION attack",
        }))
        .into_response());
    }

    let Ok(numeric_id) = id.parse::<i64>() else {
        return Err(ApiError::NotFound("User not found"));
    };
    match state.store.user_by_id(numeric_id)? {
        Some(user) => Ok(Json(json!({ "profile": PublicUser::from(&user) })).into_response()),
        None => Err(ApiError::NotFound("User not found")),
    }
}

// ---------------------------------------------------------------------------
// Stored XSS surface
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct CommentBody {
    #[serde(default)]
    pub content: Option<String>,
    /// Alias kept for older clients that post `comment` instead of `content`.
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
}

/// `POST /comment` - stores the content verbatim, scripts and all.
pub async fn add_comment(
    State(state): State<AppState>,
    JsonOrForm(body): JsonOrForm<CommentBody>,
) -> Result<Response, ApiError> {
    let Some(content) = body.content.or(body.comment).filter(|c| !c.is_empty()) else {
        return Err(ApiError::MissingField("Comment required"));
    };
    let author = body.author.unwrap_or_else(|| "anonymous".to_string());

    let stored = state.store.insert_comment(&content, &author)?;

    let response = if content.contains("<script>") || content.contains("javascript:") {
        Json(json!({
            "message": "XSS payload detected and stored!",
            "comment": stored,
            "vulnerability": "Stored XSS",
            "warning": "In a real app, this script would execute for all users!",
        }))
    } else {
        Json(json!({
            "message": "Comment added successfully",
            "comment": stored,
        }))
    };
    Ok(response.into_response())
}

/// `GET /comments` - returns every stored comment unescaped.
pub async fn list_comments(State(state): State<AppState>) -> Result<Response, ApiError> {
    let comments = state.store.comments()?;
    Ok(Json(json!({ "comments": comments })).into_response())
}

// ---------------------------------------------------------------------------
// Brute force target
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct Credentials {
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

/// `POST /login` - plain credential check with no lockout and a response
/// that echoes the failed attempt. Deliberately brute-forceable.
pub async fn login(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(creds): JsonOrForm<Credentials>,
) -> Result<Response, ApiError> {
    let username = creds.username.unwrap_or_default();
    let password = creds.password.unwrap_or_default();

    // Fixed delay so rapid-fire attempts form a recognisable timing pattern.
    tokio::time::sleep(Duration::from_millis(state.settings.server.login_delay_ms)).await;

    let user = state.store.user_by_credentials(&username, &password)?;

    let attempt = LoginAttempt {
        username: username.clone(),
        ip: client_ip(&headers),
        user_agent: header_str(&headers, "user-agent").to_string(),
        device_fingerprint: fingerprint_from(&headers),
        success: user.is_some(),
        timestamp: Utc::now(),
        risk_score: 0.0,
    };
    state.store.insert_login_attempt(&attempt)?;

    let response = match user {
        Some(user) => Json(json!({
            "success": true,
            "message": "Login successful!",
            "user": PublicUser::from(&user),
        }))
        .into_response(),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({
                "success": false,
                "error": "Invalid credentials",
                "attempt": format!("{}:{}", username, password),
            })),
        )
            .into_response(),
    };
    Ok(response)
}

/// `POST /api/login-attempt` - the risk-scored login. The score gates the
/// credential check entirely: blocked and challenged attempts never reach it.
pub async fn login_attempt(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(creds): JsonOrForm<Credentials>,
) -> Result<Response, ApiError> {
    let username = creds.username.unwrap_or_default();
    let password = creds.password.unwrap_or_default();
    let ip = client_ip(&headers);
    let user_agent = header_str(&headers, "user-agent").to_string();

    let risk_score = state.login_risk.assess(&password, &ip, &user_agent)?;
    let tier = classify(
        risk_score,
        state.settings.scoring.login_challenge_threshold,
        state.settings.scoring.login_block_threshold,
    );

    let mut attempt = LoginAttempt {
        username,
        ip,
        user_agent,
        device_fingerprint: fingerprint_from(&headers),
        success: false,
        timestamp: Utc::now(),
        risk_score,
    };

    let response = match tier {
        Tier::Block => {
            state.store.insert_login_attempt(&attempt)?;
            info!(risk_score = risk_score, "login blocked");
            (
                StatusCode::FORBIDDEN,
                Json(json!({
                    "error": "Login blocked by risk assessment",
                    "riskScore": risk_score,
                    "reason": "High-risk login pattern detected",
                    "challengeRequired": true,
                })),
            )
                .into_response()
        }
        Tier::Challenge => {
            state.store.insert_login_attempt(&attempt)?;
            Json(json!({
                "message": "Additional verification required",
                "riskScore": risk_score,
                "challengeType": "captcha",
                "challengeRequired": true,
            }))
            .into_response()
        }
        Tier::Allow => {
            let user = state
                .store
                .user_by_credentials(&attempt.username, &password)?;
            attempt.success = user.is_some();
            state.store.insert_login_attempt(&attempt)?;
            match user {
                Some(user) => Json(json!({
                    "success": true,
                    "user": PublicUser::from(&user),
                    "riskScore": risk_score,
                    "message": "Login successful",
                }))
                .into_response(),
                None => (
                    StatusCode::UNAUTHORIZED,
                    Json(json!({
                        "error": "Invalid credentials",
                        "riskScore": risk_score,
                    })),
                )
                    .into_response(),
            }
        }
    };
    Ok(response)
}

// ---------------------------------------------------------------------------
// Fraud-scored transactions
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct TransactionBody {
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub merchant: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
}

/// `POST /api/transaction` - fraud-scored payment. Every attempt is recorded
/// with its tier so velocity builds up across calls.
pub async fn process_transaction(
    State(state): State<AppState>,
    headers: HeaderMap,
    JsonOrForm(body): JsonOrForm<TransactionBody>,
) -> Result<Response, ApiError> {
    let Some(amount) = body.amount else {
        return Err(ApiError::MissingField("Amount required"));
    };

    let ip = client_ip(&headers);
    let fingerprint = fingerprint_from(&headers);
    let fraud_score = state.fraud.assess(amount, &ip, &fingerprint)?;
    let tier = classify(
        fraud_score,
        state.settings.scoring.transaction_challenge_threshold,
        state.settings.scoring.transaction_block_threshold,
    );

    let status = match tier {
        Tier::Block => "blocked",
        Tier::Challenge => "pending_verification",
        Tier::Allow => "approved",
    };
    let record = TransactionRecord {
        user_id: 1,
        amount,
        currency: body.currency.unwrap_or_else(|| "USD".to_string()),
        merchant: body.merchant.unwrap_or_default(),
        ip,
        device_fingerprint: fingerprint,
        timestamp: Utc::now(),
        fraud_score,
        status: status.to_string(),
    };
    state.store.insert_transaction(&record)?;

    let response = match tier {
        Tier::Block => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Transaction blocked by fraud detection",
                "fraudScore": fraud_score,
                "reason": "High fraud risk detected",
                "blocked": true,
            })),
        )
            .into_response(),
        Tier::Challenge => Json(json!({
            "message": "Transaction requires additional verification",
            "fraudScore": fraud_score,
            "status": "pending_verification",
            "verificationRequired": true,
        }))
        .into_response(),
        Tier::Allow => Json(json!({
            "success": true,
            "transactionId": format!("{:032x}", rand::random::<u128>()),
            "fraudScore": fraud_score,
            "status": "approved",
        }))
        .into_response(),
    };
    Ok(response)
}

// ---------------------------------------------------------------------------
// Bot detection
// ---------------------------------------------------------------------------

/// `GET /api/bot-challenge` - scores the caller on headers alone.
pub async fn bot_challenge(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let user_agent = header_str(&headers, "user-agent");
    let accept = header_str(&headers, "accept");
    let bot_score = state.bot.assess(user_agent, accept);

    state.store.insert_bot_activity(&BotActivityRecord {
        ip: client_ip(&headers),
        user_agent: user_agent.to_string(),
        request_pattern: accept.to_string(),
        bot_score,
        timestamp: Utc::now(),
    })?;

    let tier = classify(
        bot_score,
        state.settings.scoring.bot_challenge_threshold,
        state.settings.scoring.bot_block_threshold,
    );
    let response = match tier {
        Tier::Block => (
            StatusCode::FORBIDDEN,
            Json(json!({
                "error": "Bot detected",
                "botScore": bot_score,
                "challenge": "Please solve: What is 2 + 2?",
                "blocked": true,
            })),
        )
            .into_response(),
        Tier::Challenge => Json(json!({
            "message": "Suspicious activity detected",
            "botScore": bot_score,
            "challenge": "JavaScript challenge required",
            "challengeRequired": true,
        }))
        .into_response(),
        Tier::Allow => Json(json!({
            "success": true,
            "botScore": bot_score,
            "message": "Human traffic detected",
        }))
        .into_response(),
    };
    Ok(response)
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BehavioralBody {
    pub mouse_movements: Vec<serde_json::Value>,
    pub keystrokes: u64,
    pub time_on_page: u64,
}

/// `POST /api/behavioral-analysis` - scores self-reported interaction data.
pub async fn behavioral_analysis(
    State(state): State<AppState>,
    Json(body): Json<BehavioralBody>,
) -> Response {
    let metrics = InteractionMetrics {
        mouse_movements: body.mouse_movements.len() as u64,
        keystrokes: body.keystrokes,
        time_on_page_ms: body.time_on_page,
    };
    let raw_score = state.behavioral.assess(&metrics);

    Json(json!({
        "humanScore": raw_score.clamp(0.0, 1.0),
        // Complement of the raw score, not the clamped one: a strong ML term
        // on a clean session reports a negative bot score.
        "botScore": 1.0 - raw_score,
        "analysis": {
            "mouseMovements": metrics.mouse_movements,
            "keystrokes": metrics.keystrokes,
            "timeOnPage": metrics.time_on_page_ms,
        },
        "recommendation": state.behavioral.recommendation(raw_score),
    }))
    .into_response()
}

// ---------------------------------------------------------------------------
// Analytics and health
// ---------------------------------------------------------------------------

/// `GET /api/analytics` - audit aggregates plus a simulated model readout.
pub async fn analytics(State(state): State<AppState>) -> Result<Response, ApiError> {
    let summary = state.store.audit_summary()?;

    let threat_level = if state.oracle.sample() > 0.5 {
        "elevated"
    } else {
        "normal"
    };
    Ok(Json(json!({
        "timestamp": Utc::now().to_rfc3339(),
        "analytics": {
            "loginAttempts": {
                "total": summary.login_attempts.total,
                "avg_risk": summary.login_attempts.average_score,
            },
            "transactions": {
                "total": summary.transactions.total,
                "avg_fraud": summary.transactions.average_score,
            },
            "botActivity": {
                "total": summary.bot_activity.total,
                "avg_bot_score": summary.bot_activity.average_score,
            },
        },
        "mlInsights": {
            "threatLevel": threat_level,
            "adaptiveThreshold": 0.6 + state.oracle.sample() * 0.2,
            "learningStatus": "active",
        },
    }))
    .into_response())
}

pub async fn health(State(state): State<AppState>) -> Response {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "uptimeSecs": state.start_time.elapsed().as_secs(),
        "backend": state.store.backend_name(),
    }))
    .into_response()
}

pub async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({
            "error": "Not found",
            "endpoints": [
                "GET /",
                "GET /search?q=",
                "GET /login",
                "POST /login",
                "GET /payment",
                "POST /comment",
                "GET /comments",
                "GET /health",
                "GET /api/users?filter=",
                "GET /api/user-profile?id=",
                "POST /api/login-attempt",
                "POST /api/transaction",
                "GET /api/bot-challenge",
                "POST /api/behavioral-analysis",
                "GET /api/analytics",
            ],
        })),
    )
        .into_response()
}
