use axum::body::{Body, Bytes};
use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use super::{client_ip, fingerprint_from, header_str};

/// Logs every request as one JSON line before it reaches a handler. This is
/// the audit feed an external WAF trains on, so the whole surface goes in:
/// headers, body, fingerprint, session id.
///
/// Infallible. The body is buffered so it can be logged and then replayed
/// for the handler; if buffering fails the request continues with an empty
/// body rather than turning a logging problem into a request failure.
pub async fn log_request(request: Request, next: Next) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .unwrap_or_else(|_| Bytes::new());

    let mut header_map = serde_json::Map::new();
    for (name, value) in parts.headers.iter() {
        header_map.insert(
            name.as_str().to_string(),
            json!(String::from_utf8_lossy(value.as_bytes())),
        );
    }

    let session_id = match header_str(&parts.headers, "x-session-id") {
        "" => "none",
        id => id,
    };

    let entry = json!({
        "timestamp": Utc::now().to_rfc3339(),
        "ip": client_ip(&parts.headers),
        "method": parts.method.as_str(),
        "url": parts.uri.to_string(),
        "userAgent": header_str(&parts.headers, "user-agent"),
        "deviceFingerprint": fingerprint_from(&parts.headers),
        "headers": header_map,
        "body": String::from_utf8_lossy(&bytes),
        "sessionId": session_id,
    });
    info!(target: "lurebox::audit", "{}", entry);

    let request = Request::from_parts(parts, Body::from(bytes));
    next.run(request).await
}
