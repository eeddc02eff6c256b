//! Blocking-style HTTP client over a callback-driven engine.
//!
//! # Overview
//! Code written against a classic blocking client (`request` returns a
//! response, transport errors are 5xx responses) runs unchanged as tasks on a
//! cooperative runtime. Each call parks only its own task until the engine's
//! completion callback fires.
//!
//! # Design
//! - `translate` turns an `OutboundRequest` plus `ClientConfig` into engine
//!   arguments; configuration is threaded per call, never set globally.
//! - `bridge` dispatches the call, awaits a one-shot completion and rebuilds
//!   the response: pseudo-headers stripped, comma-joined headers split back,
//!   sentinel statuses (590-599) remapped.
//! - `client` exposes the `HttpClient` surface and follows redirects by
//!   re-running the whole cycle per hop.
//! - `transport::HyperEngine` is the bundled engine; anything implementing
//!   `AsyncEngine` can replace it.

pub mod blocking;
pub mod bridge;
pub mod client;
pub mod config;
pub mod cookies;
pub mod engine;
pub mod error;
pub mod headers;
pub mod hooks;
pub mod http;
pub mod transport;
pub mod translate;

pub use client::{CoopClient, HttpClient};
pub use config::{ClientConfig, ClientSettings};
pub use cookies::{CookieJar, MemoryCookieJar};
pub use engine::{AsyncCallArgs, AsyncEngine, AsyncResult, Completion};
pub use error::Error;
pub use headers::Headers;
pub use crate::http::{Body, InboundResponse, Method, OutboundRequest, RequestHead};
pub use transport::HyperEngine;
