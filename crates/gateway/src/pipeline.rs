//! Governance and audit capture around the proxied route group.

use axum::{
    body::{Body, Bytes},
    extract::{Request, State},
    http::{header::CONTENT_LENGTH, HeaderValue, Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use http_body_util::{BodyExt, LengthLimitError, Limited};
use serde::Serialize;
use std::sync::Arc;

use vantage_audit::{AuditSender, CaptureBody, PendingInteraction, USER_ID_HEADER};
use vantage_governance::FilterDecision;

use crate::server::AppState;

/// Methods whose bodies are screened by the governance filter.
fn is_state_changing(method: &Method) -> bool {
    [Method::POST, Method::PUT, Method::PATCH].contains(method)
}

/// JSON body returned when the request body cannot be buffered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BodyRefusal {
    #[serde(skip)]
    pub status: StatusCode,
    pub error: &'static str,
    pub code: &'static str,
}

impl BodyRefusal {
    pub const fn too_large() -> Self {
        Self {
            status: StatusCode::PAYLOAD_TOO_LARGE,
            error: "Payload Too Large",
            code: "PAYLOAD_TOO_LARGE",
        }
    }

    pub const fn unreadable() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            error: "Unreadable Request Body",
            code: "BAD_REQUEST",
        }
    }
}

impl IntoResponse for BodyRefusal {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// Buffer the request body up to `limit` bytes.
async fn read_body(body: Body, limit: usize) -> Result<Bytes, BodyRefusal> {
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.is::<LengthLimitError>() => {
            tracing::warn!(limit, "Request body over limit");
            Err(BodyRefusal::too_large())
        }
        Err(e) => {
            tracing::warn!(error = %e, "Unreadable request body");
            Err(BodyRefusal::unreadable())
        }
    }
}

/// Middleware for the governed group.
///
/// Screens the body, answers policy violations with 403, forwards everything
/// else with the (possibly redacted) body, and tees the response into the
/// audit queue. The filter decision travels to the capture stage directly.
/// A body that cannot be buffered is refused and never forwarded.
pub async fn intercept(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    let (mut parts, body) = request.into_parts();

    let user_id = parts.headers.get(USER_ID_HEADER).and_then(|v| v.to_str().ok());
    let pending = PendingInteraction::start(user_id, parts.method.as_str(), parts.uri.path());

    let raw = match read_body(body, state.body_limit).await {
        Ok(raw) => raw,
        Err(refusal) => {
            let pending = pending.with_request(Bytes::new(), false, false);
            return capture(refusal.into_response(), pending, state.audit.clone());
        }
    };
    let decision = if is_state_changing(&parts.method) && !raw.is_empty() {
        state.filter.evaluate(raw)
    } else {
        FilterDecision::admit(raw)
    };

    let pending = pending.with_request(decision.body.clone(), decision.is_blocked(), decision.redacted);

    let response = match decision.rejection {
        Some(rejection) => {
            tracing::info!(
                keyword = %rejection.keyword,
                path = %parts.uri.path(),
                "Request refused by governance policy"
            );
            (StatusCode::FORBIDDEN, Json(rejection.payload)).into_response()
        }
        None => {
            if decision.redacted {
                parts.headers.insert(CONTENT_LENGTH, HeaderValue::from(decision.body.len()));
            }
            next.run(Request::from_parts(parts, Body::from(decision.body))).await
        }
    };

    capture(response, pending, state.audit.clone())
}

/// Wrap the response body so the interaction is enqueued once it is relayed.
fn capture(response: Response, pending: PendingInteraction, audit: AuditSender) -> Response {
    let (parts, body) = response.into_parts();
    let pending = pending.with_status(parts.status.as_u16());
    let body = CaptureBody::new(body.into_data_stream(), pending, audit);
    Response::from_parts(parts, Body::from_stream(body))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_changing_methods() {
        assert!(is_state_changing(&Method::POST));
        assert!(is_state_changing(&Method::PUT));
        assert!(is_state_changing(&Method::PATCH));
        assert!(!is_state_changing(&Method::GET));
        assert!(!is_state_changing(&Method::DELETE));
    }

    #[tokio::test]
    async fn test_oversized_body_is_refused() {
        let body = Body::from(vec![b'x'; 64]);
        let refusal = read_body(body, 16).await.unwrap_err();
        assert_eq!(refusal, BodyRefusal::too_large());
        assert_eq!(refusal.into_response().status(), StatusCode::PAYLOAD_TOO_LARGE);
    }

    #[tokio::test]
    async fn test_body_within_limit_is_read() {
        let body = Body::from(vec![b'x'; 16]);
        assert_eq!(read_body(body, 16).await.unwrap().len(), 16);
    }
}
