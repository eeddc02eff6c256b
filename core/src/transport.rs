//! Reference engine: one tokio task and one HTTP/1 connection per call.
//!
//! # Design
//! `HyperEngine::request` spawns the exchange and returns at once; the
//! completion callback is invoked from the spawned task. Every connection
//! carries a single request with `Connection: close`, so there is no pooling
//! and no keep-alive. The result follows the engine contract exactly:
//! lower-case header names, repeated headers joined with `", "`, metadata in
//! pseudo-headers, and transport failures as 595/596/597/599 results.

use std::collections::BTreeMap;
use std::convert::Infallible;

use bytes::Bytes;
use http::{header, Request, Uri, Version};
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Empty, Full, StreamBody};
use hyper::body::Frame;
use hyper::client::conn::http1;
use hyper::ext::ReasonPhrase;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tracing::debug;

use crate::engine::{
    AsyncCallArgs, AsyncEngine, AsyncResult, Completion, HTTP_VERSION, ORIG_REASON, ORIG_STATUS,
    REASON, REDIRECT, STATUS_BODY_FAILED, STATUS_CONNECT_FAILED, STATUS_OTHER_FAILURE,
    STATUS_REQUEST_FAILED, URL,
};
use crate::http::{resolve_uri, Body, Method};

type OutgoingBody = UnsyncBoxBody<Bytes, Infallible>;

/// Callback-driven HTTP/1 engine on top of tokio and hyper.
#[derive(Debug, Clone, Default)]
pub struct HyperEngine {
    handle: Option<Handle>,
}

impl HyperEngine {
    /// Spawn exchanges on the runtime current at the time of each call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn exchanges on a specific runtime.
    pub fn with_handle(handle: Handle) -> Self {
        Self {
            handle: Some(handle),
        }
    }
}

impl AsyncEngine for HyperEngine {
    fn request(&self, args: AsyncCallArgs, on_complete: Completion) {
        let handle = match self.handle.clone() {
            Some(handle) => handle,
            None => match Handle::try_current() {
                Ok(handle) => handle,
                Err(err) => {
                    let uri = args.uri;
                    on_complete(failure(STATUS_OTHER_FAILURE, format!("no async runtime: {err}"), &uri));
                    return;
                }
            },
        };
        handle.spawn(async move {
            let result = run(args).await;
            on_complete(result);
        });
    }
}

async fn run(args: AsyncCallArgs) -> AsyncResult {
    let timeout = args.timeout;
    let uri = args.uri.clone();
    if timeout.is_zero() {
        return follow(args).await;
    }
    match tokio::time::timeout(timeout, follow(args)).await {
        Ok(result) => result,
        Err(_) => {
            debug!(uri = %uri, ?timeout, "request timed out");
            failure(STATUS_OTHER_FAILURE, "Connection timed out", &uri)
        }
    }
}

/// Perform the exchange, following up to `recurse` redirects for GET/HEAD.
async fn follow(args: AsyncCallArgs) -> AsyncResult {
    let AsyncCallArgs {
        method,
        mut uri,
        headers,
        body,
        mut recurse,
        ..
    } = args;

    let mut result = exchange(&method, &uri, &headers, body).await;
    let mut original: Option<(String, String)> = None;

    while recurse > 0 && matches!(method, Method::Get | Method::Head) {
        let status = result.status().unwrap_or(STATUS_OTHER_FAILURE);
        if !matches!(status, 301 | 302 | 303 | 307 | 308) {
            break;
        }
        let Some(next) = result.headers.get("location").and_then(|l| resolve_uri(&uri, l)) else {
            break;
        };
        if original.is_none() {
            original = Some((
                status.to_string(),
                result.headers.get(REASON).cloned().unwrap_or_default(),
            ));
        }
        recurse -= 1;
        let from = std::mem::replace(&mut uri, next);
        debug!(from = %from, to = %uri, "engine following redirect");
        result = exchange(&method, &uri, &headers, Body::Empty).await;
        result.headers.insert(REDIRECT.to_string(), from);
    }

    if let Some((status, reason)) = original {
        result.headers.insert(ORIG_STATUS.to_string(), status);
        result.headers.insert(ORIG_REASON.to_string(), reason);
    }
    result
}

async fn exchange(
    method: &Method,
    uri: &str,
    headers: &BTreeMap<String, String>,
    body: Body,
) -> AsyncResult {
    let target: Uri = match uri.parse() {
        Ok(target) => target,
        Err(err) => return failure(STATUS_OTHER_FAILURE, format!("invalid URL: {err}"), uri),
    };
    if target.scheme_str() != Some("http") {
        return failure(STATUS_OTHER_FAILURE, format!("unsupported URL scheme: {uri}"), uri);
    }
    let Some(host) = target.host() else {
        return failure(STATUS_OTHER_FAILURE, format!("URL has no host: {uri}"), uri);
    };
    let host = host.trim_start_matches('[').trim_end_matches(']');
    let port = target.port_u16().unwrap_or(80);
    let authority = target
        .authority()
        .map_or_else(|| host.to_string(), |a| a.as_str().to_string());

    let stream = match TcpStream::connect((host, port)).await {
        Ok(stream) => stream,
        Err(err) => return failure(STATUS_CONNECT_FAILED, err.to_string(), uri),
    };
    let (mut sender, connection) = match http1::handshake::<_, OutgoingBody>(TokioIo::new(stream)).await {
        Ok(pair) => pair,
        Err(err) => return failure(STATUS_REQUEST_FAILED, err.to_string(), uri),
    };
    tokio::spawn(async move {
        if let Err(err) = connection.await {
            debug!(error = %err, "connection ended with an error");
        }
    });

    let path = target.path_and_query().map_or("/", |p| p.as_str());
    let request = match build_request(method, path, &authority, headers, body) {
        Ok(request) => request,
        Err(err) => return failure(STATUS_REQUEST_FAILED, format!("invalid request: {err}"), uri),
    };

    let response = match sender.send_request(request).await {
        Ok(response) => response,
        Err(err) => return failure(STATUS_REQUEST_FAILED, err.to_string(), uri),
    };
    let (parts, incoming) = response.into_parts();
    let data = match incoming.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return failure(STATUS_BODY_FAILED, err.to_string(), uri),
    };

    let reason = match parts.extensions.get::<ReasonPhrase>() {
        Some(phrase) => String::from_utf8_lossy(phrase.as_bytes()).into_owned(),
        None => parts.status.canonical_reason().unwrap_or_default().to_string(),
    };
    let mut result = AsyncResult::new(parts.status.as_u16(), reason).with_data(data);
    for name in parts.headers.keys() {
        let joined = parts
            .headers
            .get_all(name)
            .iter()
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .collect::<Vec<_>>()
            .join(", ");
        result.headers.insert(name.as_str().to_string(), joined);
    }
    result
        .with_header(HTTP_VERSION, version_text(parts.version))
        .with_header(URL, uri)
}

/// Caller headers plus `Host` and `Connection: close` defaults, each added
/// only when the caller did not set it.
fn build_request(
    method: &Method,
    path: &str,
    authority: &str,
    headers: &BTreeMap<String, String>,
    body: Body,
) -> Result<Request<OutgoingBody>, http::Error> {
    let mut builder = Request::builder().method(method.as_str()).uri(path);
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    if !headers.contains_key("host") {
        builder = builder.header(header::HOST, authority);
    }
    if !headers.contains_key("connection") {
        builder = builder.header(header::CONNECTION, "close");
    }
    builder.body(outgoing(body))
}

fn outgoing(body: Body) -> OutgoingBody {
    match body {
        Body::Empty => Empty::<Bytes>::new().boxed_unsync(),
        Body::Bytes(bytes) => Full::new(bytes).boxed_unsync(),
        Body::Stream(chunks) => {
            let frames = chunks.map(|chunk| Ok::<_, Infallible>(Frame::data(chunk)));
            StreamBody::new(futures_lite::stream::iter(frames)).boxed_unsync()
        }
    }
}

fn version_text(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

fn failure(status: u16, reason: impl Into<String>, uri: &str) -> AsyncResult {
    debug_assert!(status >= 590);
    AsyncResult::new(status, reason).with_header(URL, uri)
}
