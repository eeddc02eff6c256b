//! Request and response types seen by callers of the blocking-style client.
//!
//! # Design
//! `OutboundRequest` is what a caller builds; it is split into a
//! `RequestHead` (method, URI, headers) and a `Body` when it is translated for
//! the engine, because a streaming body can only be consumed once. The head is
//! what an `InboundResponse` points back to.
//!
//! Bodies use `bytes::Bytes` so handing them across the engine boundary never
//! copies.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use bytes::Bytes;
use http::Uri;

use crate::error::Error;
use crate::headers::Headers;

/// HTTP method for a request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Delete,
    Patch,
    Options,
    /// Any other valid method token, e.g. `PROPFIND`.
    Extension(String),
}

impl Method {
    pub fn as_str(&self) -> &str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
            Method::Patch => "PATCH",
            Method::Options => "OPTIONS",
            Method::Extension(token) => token.as_str(),
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = Error;

    /// Methods are case-sensitive; `"get"` is an extension method, not `GET`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = match s {
            "GET" => Method::Get,
            "HEAD" => Method::Head,
            "POST" => Method::Post,
            "PUT" => Method::Put,
            "DELETE" => Method::Delete,
            "PATCH" => Method::Patch,
            "OPTIONS" => Method::Options,
            other if is_token(other) => Method::Extension(other.to_string()),
            other => return Err(Error::InvalidMethod(other.to_string())),
        };
        Ok(method)
    }
}

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.bytes()
            .all(|b| b.is_ascii_alphanumeric() || b"!#$%&'*+-.^_`|~".contains(&b))
}

/// Lazily produced request body chunks.
pub type ChunkSource = Box<dyn Iterator<Item = Bytes> + Send>;

/// A request body: nothing, a buffer, or a lazy chunk supplier.
#[derive(Default)]
pub enum Body {
    #[default]
    Empty,
    Bytes(Bytes),
    /// Pulled chunk by chunk while the request is being written.
    Stream(ChunkSource),
}

impl Body {
    /// Build a streaming body from chunks.
    ///
    /// The stream ends at the first empty chunk, so a supplier may signal the
    /// end either by running out or by yielding `""`.
    pub fn from_chunks<I>(chunks: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<Bytes>,
        I::IntoIter: Send + 'static,
    {
        Body::Stream(Box::new(
            chunks
                .into_iter()
                .map(|chunk| -> Bytes { chunk.into() })
                .take_while(|chunk: &Bytes| !chunk.is_empty()),
        ))
    }

    /// The buffered contents, if this body is not a stream.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Empty => Some(b"".as_slice()),
            Body::Bytes(bytes) => Some(&bytes[..]),
            Body::Stream(_) => None,
        }
    }

    pub fn is_stream(&self) -> bool {
        matches!(self, Body::Stream(_))
    }
}

impl fmt::Debug for Body {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Body::Empty => f.write_str("Empty"),
            Body::Bytes(bytes) => f.debug_tuple("Bytes").field(bytes).finish(),
            Body::Stream(_) => f.write_str("Stream(..)"),
        }
    }
}

impl From<Bytes> for Body {
    fn from(bytes: Bytes) -> Self {
        Body::Bytes(bytes)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Body::Bytes(bytes.into())
    }
}

impl From<String> for Body {
    fn from(text: String) -> Self {
        Body::Bytes(text.into())
    }
}

impl From<&'static str> for Body {
    fn from(text: &'static str) -> Self {
        Body::Bytes(Bytes::from_static(text.as_bytes()))
    }
}

/// Method, URI and headers of a request, without its body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHead {
    pub method: Method,
    pub uri: String,
    pub headers: Headers,
}

/// A request as built by a caller of the blocking-style client.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub uri: String,
    pub headers: Headers,
    pub body: Body,
}

impl OutboundRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            headers: Headers::new(),
            body: Body::Empty,
        }
    }

    /// Append a header, keeping earlier values for the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<Body>) -> Self {
        self.body = body.into();
        self
    }

    pub fn into_parts(self) -> (RequestHead, Body) {
        let head = RequestHead {
            method: self.method,
            uri: self.uri,
            headers: self.headers,
        };
        (head, self.body)
    }

    pub fn from_parts(head: RequestHead, body: Body) -> Self {
        Self {
            method: head.method,
            uri: head.uri,
            headers: head.headers,
            body,
        }
    }
}

/// A response as returned by the blocking-style client.
///
/// Transport failures are represented as responses too, with a 5xx status
/// and a diagnostic body; see [`crate::bridge::normalize`].
#[derive(Debug, Clone)]
pub struct InboundResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Headers,
    pub body: Bytes,
    request: Option<Arc<RequestHead>>,
    previous: Option<Box<InboundResponse>>,
}

impl InboundResponse {
    pub fn new(status: u16, reason: impl Into<String>, headers: Headers, body: Bytes) -> Self {
        Self {
            status,
            reason: reason.into(),
            headers,
            body,
            request: None,
            previous: None,
        }
    }

    /// The request this response answers, once the client has attached it.
    pub fn request(&self) -> Option<&Arc<RequestHead>> {
        self.request.as_ref()
    }

    pub fn set_request(&mut self, request: Arc<RequestHead>) {
        self.request = Some(request);
    }

    /// The response that redirected to this one, if any.
    pub fn previous(&self) -> Option<&InboundResponse> {
        self.previous.as_deref()
    }

    pub fn set_previous(&mut self, previous: InboundResponse) {
        self.previous = Some(Box::new(previous));
    }

    /// Number of responses in the redirect chain ending here, this one included.
    pub fn chain_len(&self) -> usize {
        std::iter::successors(Some(self), |r| r.previous()).count()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_redirect(&self) -> bool {
        (300..400).contains(&self.status)
    }

    pub fn is_error(&self) -> bool {
        self.status >= 400
    }

    /// `"<code> <reason>"`, e.g. `"404 Not Found"`.
    pub fn status_line(&self) -> String {
        if self.reason.is_empty() {
            self.status.to_string()
        } else {
            format!("{} {}", self.status, self.reason)
        }
    }

    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

/// Resolve `reference` (typically a `Location` value) against `base`.
///
/// Absolute URIs are returned unchanged. Dot segments are not normalized.
pub fn resolve_uri(base: &str, reference: &str) -> Option<String> {
    let reference = reference.trim();
    if reference.is_empty() {
        return None;
    }
    if let Ok(uri) = reference.parse::<Uri>() {
        if uri.scheme().is_some() {
            return Some(reference.to_string());
        }
    }

    let base: Uri = base.parse().ok()?;
    let scheme = base.scheme_str()?;
    let authority = base.authority()?.as_str();
    let path = base.path();

    let resolved = if let Some(rest) = reference.strip_prefix("//") {
        format!("{scheme}://{rest}")
    } else if reference.starts_with('/') {
        format!("{scheme}://{authority}{reference}")
    } else if reference.starts_with('?') {
        format!("{scheme}://{authority}{path}{reference}")
    } else {
        let dir = path.rfind('/').map_or("/", |i| &path[..=i]);
        format!("{scheme}://{authority}{dir}{reference}")
    };
    Some(resolved)
}
