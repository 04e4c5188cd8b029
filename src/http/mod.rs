pub mod error;
pub mod request_log;
pub mod routes;
pub mod server;

use std::sync::Arc;
use std::time::Instant;

use axum::extract::{FromRequest, Request};
use axum::http::header::CONTENT_TYPE;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::{Form, Json};
use serde::de::DeserializeOwned;

use crate::config::settings::Settings;
use crate::fingerprint::device_fingerprint;
use crate::scoring::behavioral::BehavioralScorer;
use crate::scoring::bot::BotScorer;
use crate::scoring::login::LoginRiskScorer;
use crate::scoring::oracle::MlOracle;
use crate::scoring::transaction::TransactionFraudScorer;
use crate::storage::Store;

/// Shared application state, constructed once at startup and injected into
/// every handler. The store and oracle are trait objects so backends and the
/// random source can be swapped without touching the route layer.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub oracle: Arc<dyn MlOracle>,
    pub settings: Arc<Settings>,
    pub login_risk: Arc<LoginRiskScorer>,
    pub fraud: Arc<TransactionFraudScorer>,
    pub bot: Arc<BotScorer>,
    pub behavioral: Arc<BehavioralScorer>,
    pub start_time: Instant,
}

impl AppState {
    pub fn new(store: Arc<dyn Store>, oracle: Arc<dyn MlOracle>, settings: Arc<Settings>) -> Self {
        let scoring = &settings.scoring;
        Self {
            login_risk: Arc::new(LoginRiskScorer::new(store.clone(), oracle.clone(), scoring)),
            fraud: Arc::new(TransactionFraudScorer::new(
                store.clone(),
                oracle.clone(),
                scoring,
            )),
            bot: Arc::new(BotScorer::new(oracle.clone(), scoring)),
            behavioral: Arc::new(BehavioralScorer::new(oracle.clone(), scoring)),
            store,
            oracle,
            settings,
            start_time: Instant::now(),
        }
    }
}

/// Header value as a string, empty when absent or not valid UTF-8.
pub fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> &'a str {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
}

/// Best-effort client IP. The demo usually sits behind the proxy under test,
/// so forwarding headers win; otherwise a fixed loopback sentinel keeps the
/// fingerprint and history queries stable.
pub fn client_ip(headers: &HeaderMap) -> String {
    let forwarded = header_str(headers, "x-forwarded-for");
    if !forwarded.is_empty() {
        if let Some(first) = forwarded.split(',').next() {
            return first.trim().to_string();
        }
    }
    let real_ip = header_str(headers, "x-real-ip");
    if !real_ip.is_empty() {
        return real_ip.to_string();
    }
    "127.0.0.1".to_string()
}

/// Device fingerprint for the current request, derived from headers and IP.
pub fn fingerprint_from(headers: &HeaderMap) -> String {
    device_fingerprint(
        header_str(headers, "user-agent"),
        header_str(headers, "accept-language"),
        header_str(headers, "accept-encoding"),
        &client_ip(headers),
    )
}

/// Body extractor accepting either JSON or form-urlencoded payloads.
/// The demo HTML forms post urlencoded while API clients post JSON;
/// both reach the same handlers.
pub struct JsonOrForm<T>(pub T);

impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = Response;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let content_type = req
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("");

        if content_type.starts_with("application/x-www-form-urlencoded") {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(IntoResponse::into_response)?;
            return Ok(Self(value));
        }

        let Json(value) = Json::<T>::from_request(req, state)
            .await
            .map_err(IntoResponse::into_response)?;
        Ok(Self(value))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_client_ip_prefers_forwarded_for() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static("203.0.113.7, 10.0.0.1"),
        );
        headers.insert("x-real-ip", HeaderValue::from_static("198.51.100.2"));
        assert_eq!(client_ip(&headers), "203.0.113.7");
    }

    #[test]
    fn test_client_ip_falls_back_to_sentinel() {
        assert_eq!(client_ip(&HeaderMap::new()), "127.0.0.1");
    }
}
