//! Suspends the calling task on one engine call and rebuilds its response.
//!
//! # Design
//! [`execute`] hands the engine a callback that owns the sending half of a
//! one-shot channel, then awaits the receiving half. That await is the only
//! suspension point: the calling task yields to the scheduler and is woken
//! exactly once, after the callback has finished normalizing the result and
//! running the header and data hooks. The callback runs on the engine's task
//! and touches nothing but its own result, so requests in flight at the same
//! time never see each other's headers or bodies.

use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::oneshot;
use tracing::{debug, debug_span, warn, Instrument};
use uuid::Uuid;

use crate::engine::{
    AsyncCallArgs, AsyncEngine, AsyncResult, HTTP_VERSION, ORIG_REASON, ORIG_STATUS, REASON,
    REDIRECT, SENTINEL_STATUS, STATUS, STATUS_OTHER_FAILURE, URL,
};
use crate::headers::{split_joined, Headers};
use crate::hooks::Hooks;
use crate::http::InboundResponse;

/// Header added to responses synthesized from engine failures.
pub const CLIENT_WARNING: &str = "Client-Warning";

/// Body of a response remapped from an engine timeout.
pub const READ_TIMEOUT_BODY: &str = "500 read timeout";

/// Issue one engine call and wait for its response.
///
/// Never fails: transport problems come back as 5xx responses.
pub async fn execute<E>(engine: &E, hooks: Arc<Hooks>, args: AsyncCallArgs) -> InboundResponse
where
    E: AsyncEngine + ?Sized,
{
    let span = debug_span!("engine_call", id = %Uuid::new_v4(), method = %args.method, uri = %args.uri);
    let callback_span = span.clone();
    let (done, completion) = oneshot::channel::<InboundResponse>();

    async move {
        debug!("dispatching request");
        engine.request(
            args,
            Box::new(move |result: AsyncResult| {
                let _entered = callback_span.enter();
                let response = complete(result, &hooks);
                if done.send(response).is_err() {
                    debug!("caller went away before the response arrived");
                }
            }),
        );

        match completion.await {
            Ok(response) => {
                debug!(status = response.status, "request completed");
                response
            }
            Err(_) => {
                warn!("engine dropped the completion callback without calling it");
                normalize(AsyncResult::new(
                    STATUS_OTHER_FAILURE,
                    "engine dropped the request without a result",
                ))
            }
        }
    }
    .instrument(span)
    .await
}

/// Callback body: normalize, then run the header and data hooks.
fn complete(result: AsyncResult, hooks: &Hooks) -> InboundResponse {
    let mut response = normalize(result);
    hooks.run_response_header(&mut response);
    let body = response.body.clone();
    if !body.is_empty() {
        hooks.data_delivery().deliver(&response, &body);
    }
    response
}

/// Rebuild a response from an engine result.
///
/// Pseudo-headers are stripped, comma-joined values are split back into
/// separate occurrences (see [`split_joined`]), and sentinel statuses are
/// remapped: a 599 timeout becomes `500` with body `"500 read timeout"`, any
/// other sentinel gets the error text as its body when the body is blank.
///
/// A result without a `Status` pseudo-header breaks the engine contract; it
/// is read as a 599.
pub fn normalize(result: AsyncResult) -> InboundResponse {
    let AsyncResult { data, mut headers } = result;

    let status = headers.remove(STATUS).and_then(|s| s.trim().parse::<u16>().ok());
    let mut message = headers.remove(REASON).unwrap_or_default();
    let mut code = match status {
        Some(code) => code,
        None => {
            warn!("engine result carried no usable Status");
            if message.is_empty() {
                message = "engine result carried no status".to_string();
            }
            STATUS_OTHER_FAILURE
        }
    };
    for name in [HTTP_VERSION, ORIG_STATUS, ORIG_REASON, REDIRECT, URL] {
        headers.remove(name);
    }

    let mut rebuilt = Headers::new();
    for (name, value) in &headers {
        for token in split_joined(value) {
            rebuilt.append(name.as_str(), token);
        }
    }

    let mut body = data.unwrap_or_default();
    if SENTINEL_STATUS.contains(&code) {
        if code == STATUS_OTHER_FAILURE && mentions_timeout(&message) {
            warn!(code, message = %message, "engine timeout reported as read timeout");
            code = 500;
            body = Bytes::from_static(READ_TIMEOUT_BODY.as_bytes());
        } else {
            warn!(code, message = %message, "engine transport failure");
            if body.iter().all(u8::is_ascii_whitespace) {
                body = Bytes::from(message.clone());
            }
        }
        rebuilt.append(CLIENT_WARNING, "Internal response");
    }

    InboundResponse::new(code, message, rebuilt, body)
}

fn mentions_timeout(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("timed out") || message.contains("timeout")
}
