//! Contract of the callback-driven engine that performs the actual I/O.
//!
//! # Design
//! The engine is consumed only through [`AsyncEngine::request`]: it receives
//! the call arguments and a completion callback, returns immediately, and
//! invokes the callback exactly once from its own task. Everything about the
//! response travels in [`AsyncResult`]: the body, and a single-valued header
//! map in which repeated headers are comma-joined and engine metadata rides
//! along as capitalized pseudo-headers.

use std::collections::BTreeMap;
use std::ops::RangeInclusive;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::http::{Body, Method};

/// Pseudo-header carrying the numeric status code.
pub const STATUS: &str = "Status";
/// Pseudo-header carrying the reason phrase or transport error text.
pub const REASON: &str = "Reason";
/// Pseudo-header carrying the protocol version of the response.
pub const HTTP_VERSION: &str = "HTTPVersion";
/// Pseudo-header carrying the status of the first response in a redirect chain.
pub const ORIG_STATUS: &str = "OrigStatus";
/// Pseudo-header carrying the reason of the first response in a redirect chain.
pub const ORIG_REASON: &str = "OrigReason";
/// Pseudo-header carrying the URL that redirected to this response.
pub const REDIRECT: &str = "Redirect";
/// Pseudo-header carrying the final URL.
pub const URL: &str = "URL";

/// Every pseudo-header the engine may inject. None of them is a real header.
pub const PSEUDO_HEADERS: [&str; 7] = [
    STATUS,
    REASON,
    HTTP_VERSION,
    ORIG_STATUS,
    ORIG_REASON,
    REDIRECT,
    URL,
];

/// Status codes the engine reserves for its own transport failures.
pub const SENTINEL_STATUS: RangeInclusive<u16> = 590..=599;

/// Connection could not be established.
pub const STATUS_CONNECT_FAILED: u16 = 595;
/// Request could not be sent or response headers could not be read.
pub const STATUS_REQUEST_FAILED: u16 = 596;
/// Response body could not be read.
pub const STATUS_BODY_FAILED: u16 = 597;
/// Anything else: bad URL, timeout, no runtime.
pub const STATUS_OTHER_FAILURE: u16 = 599;

/// Arguments of a single engine call.
#[derive(Debug)]
pub struct AsyncCallArgs {
    pub method: Method,
    pub uri: String,
    /// Single-valued; names are lower-case.
    pub headers: BTreeMap<String, String>,
    pub body: Body,
    /// How many redirects the engine may follow on its own.
    pub recurse: u32,
    /// Zero means no timeout.
    pub timeout: Duration,
}

/// What the engine hands to the completion callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AsyncResult {
    /// Response body, or nothing at all when the request failed early.
    pub data: Option<Bytes>,
    pub headers: BTreeMap<String, String>,
}

impl AsyncResult {
    /// A result carrying only the `Status` and `Reason` pseudo-headers.
    pub fn new(status: u16, reason: impl Into<String>) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert(STATUS.to_string(), status.to_string());
        headers.insert(REASON.to_string(), reason.into());
        Self { data: None, headers }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_data(mut self, data: impl Into<Bytes>) -> Self {
        self.data = Some(data.into());
        self
    }

    pub fn status(&self) -> Option<u16> {
        self.headers.get(STATUS).and_then(|s| s.trim().parse().ok())
    }
}

/// Completion callback passed to the engine. Called exactly once.
pub type Completion = Box<dyn FnOnce(AsyncResult) + Send + 'static>;

/// A non-blocking HTTP engine.
///
/// Implementations must return without waiting for the response and must
/// invoke `on_complete` exactly once, from whatever task or thread they use
/// for I/O. Transport failures are reported through the callback with a
/// status in [`SENTINEL_STATUS`], never by panicking or dropping it.
pub trait AsyncEngine: Send + Sync + 'static {
    fn request(&self, args: AsyncCallArgs, on_complete: Completion);
}

impl<E: AsyncEngine + ?Sized> AsyncEngine for Arc<E> {
    fn request(&self, args: AsyncCallArgs, on_complete: Completion) {
        (**self).request(args, on_complete)
    }
}
