use crate::relay::{FormKind, Relay, RelayError, RelayRequest, RelayResponse, Submission};
use axum::{
    body::to_bytes,
    extract::{Extension, Request},
    http::{header::CONTENT_LENGTH, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Json, Response},
};
use http_body_util::LengthLimitError;
use std::{error::Error as _, sync::Arc};
use tracing::{debug, error, info, instrument, warn};

/// Largest accepted request body.
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

#[utoipa::path(
    post,
    path= "/send-contact-form",
    request_body = RelayRequest,
    responses (
        (status = 200, description = "Handled; `success` tells whether the email went out", body = RelayResponse),
        (status = 400, description = "Missing form data or recipient", body = RelayResponse),
        (status = 413, description = "Body larger than 1 MiB", body = RelayResponse),
        (status = 405, description = "Only POST is accepted", body = RelayResponse),
        (status = 500, description = "Neither saved nor emailed", body = RelayResponse)
    ),
    tag= "relay"
)]
pub async fn send_contact_form(relay_state: Extension<Arc<Relay>>, request: Request) -> Response {
    relay(relay_state, forward(request, FormKind::Contact)).await
}

#[utoipa::path(
    post,
    path= "/send-membership-form",
    request_body = RelayRequest,
    responses (
        (status = 200, description = "Handled; `success` tells whether the email went out", body = RelayResponse),
        (status = 400, description = "Missing form data or recipient", body = RelayResponse),
        (status = 413, description = "Body larger than 1 MiB", body = RelayResponse),
        (status = 405, description = "Only POST is accepted", body = RelayResponse),
        (status = 500, description = "Neither saved nor emailed", body = RelayResponse)
    ),
    tag= "relay"
)]
pub async fn send_membership_form(
    relay_state: Extension<Arc<Relay>>,
    request: Request,
) -> Response {
    relay(relay_state, forward(request, FormKind::Membership)).await
}

/// Point the request at the shared handler's path for `kind`.
fn forward(mut request: Request, kind: FormKind) -> Request {
    let path = format!("/api/{}", kind.endpoint());
    let rewritten = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };

    match rewritten.parse::<Uri>() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(err) => error!("Failed to rewrite form uri: {err}"),
    }

    request
}

/// Shared relay handler; the form kind comes from the last path segment.
#[instrument(skip_all, fields(method = %request.method(), path = %request.uri().path()))]
pub async fn relay(relay_state: Extension<Arc<Relay>>, request: Request) -> Response {
    let Extension(relay) = relay_state;
    let (parts, body) = request.into_parts();

    debug!("request headers: {:?}", parts.headers);

    // Behind `api::router` the CORS layer answers OPTIONS before this point.
    if parts.method == Method::OPTIONS {
        return StatusCode::OK.into_response();
    }

    if parts.method != Method::POST {
        return reply_error(RelayError::MethodNotAllowed(parts.method.to_string()));
    }

    let Some(kind) = FormKind::from_path(parts.uri.path()) else {
        return reply_error(RelayError::UnknownForm(parts.uri.path().to_string()));
    };

    if let Some(err) = reject_large_body(&parts.headers) {
        return reply_error(err);
    }

    let body = match to_bytes(body, MAX_BODY_BYTES).await {
        Ok(body) => body,
        Err(err) if exceeds_limit(&err) => {
            return reply_error(RelayError::PayloadTooLarge(MAX_BODY_BYTES));
        }
        Err(err) => {
            warn!("failed to read request body: {err}");
            return reply_error(RelayError::MissingFields);
        }
    };

    debug!("request body: {}", String::from_utf8_lossy(&body));

    let submission = match Submission::from_body(&body) {
        Ok(submission) => submission,
        Err(err) => return reply_error(err),
    };

    match relay.submit(kind, &submission).await {
        Ok(outcome) => {
            let response = outcome.response();
            info!(success = response.success, "{kind} handled");
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => reply_error(err),
    }
}

fn reject_large_body(headers: &HeaderMap) -> Option<RelayError> {
    let length = headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse::<usize>().ok())?;
    (length > MAX_BODY_BYTES).then_some(RelayError::PayloadTooLarge(MAX_BODY_BYTES))
}

// Bodies without a declared length only hit the limit while buffering.
fn exceeds_limit(err: &axum::Error) -> bool {
    let mut source = err.source();
    while let Some(cause) = source {
        if cause.is::<LengthLimitError>() {
            return true;
        }
        source = cause.source();
    }
    false
}

fn reply_error(err: RelayError) -> Response {
    if err.status().is_server_error() {
        error!("relay failed: {err}");
    } else {
        warn!("relay rejected: {err}");
    }
    err.into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_forward_rewrites_path() -> anyhow::Result<()> {
        let request = axum::http::Request::builder()
            .uri("/send-membership-form?kaynak=web")
            .body(Body::empty())?;

        let request = forward(request, FormKind::Membership);

        assert_eq!(request.uri().path(), "/api/send-membership-form");
        assert_eq!(request.uri().query(), Some("kaynak=web"));
        assert_eq!(
            FormKind::from_path(request.uri().path()),
            Some(FormKind::Membership)
        );
        Ok(())
    }

    #[test]
    fn test_reject_large_body() {
        let mut headers = HeaderMap::new();
        assert!(reject_large_body(&headers).is_none());

        headers.insert(CONTENT_LENGTH, MAX_BODY_BYTES.into());
        assert!(reject_large_body(&headers).is_none());

        headers.insert(CONTENT_LENGTH, (MAX_BODY_BYTES + 1).into());
        assert!(matches!(
            reject_large_body(&headers),
            Some(RelayError::PayloadTooLarge(MAX_BODY_BYTES))
        ));
    }

    #[tokio::test]
    async fn test_buffer_limit_is_detected() {
        let body = Body::from(vec![b'a'; MAX_BODY_BYTES + 1]);
        let result = to_bytes(body, MAX_BODY_BYTES).await;
        assert!(matches!(result, Err(ref err) if exceeds_limit(err)));
    }

    #[test]
    fn test_forward_contact() -> anyhow::Result<()> {
        let request = axum::http::Request::builder()
            .uri("/send-contact-form")
            .body(Body::empty())?;

        let request = forward(request, FormKind::Contact);

        assert_eq!(request.uri().path(), "/api/send-contact-form");
        Ok(())
    }
}
