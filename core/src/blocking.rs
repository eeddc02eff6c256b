//! Thread-blocking front end for callers outside any async runtime.
//!
//! # Design
//! `Client` owns a current-thread tokio runtime and drives a [`CoopClient`]
//! on it with `block_on`, so the engine's tasks run on the calling thread for
//! the duration of each call. Calling it from inside a runtime is not
//! supported (tokio refuses to nest `block_on`); code already running as a
//! task should use [`CoopClient`] directly.

use std::sync::Arc;
use std::time::Duration;

use tokio::runtime::{Builder, Runtime};

use crate::client::{CoopClient, HttpClient};
use crate::config::ClientConfig;
use crate::cookies::CookieJar;
use crate::engine::AsyncEngine;
use crate::error::Error;
use crate::headers::Headers;
use crate::http::{Body, InboundResponse, OutboundRequest};

pub struct Client<E> {
    runtime: Runtime,
    inner: CoopClient<E>,
}

impl<E: AsyncEngine> Client<E> {
    pub fn new(engine: E) -> Result<Self, Error> {
        Self::with_config(engine, ClientConfig::default())
    }

    pub fn with_config(engine: E, config: ClientConfig) -> Result<Self, Error> {
        let runtime = Builder::new_current_thread().enable_all().build()?;
        Ok(Self {
            runtime,
            inner: CoopClient::with_config(engine, config),
        })
    }

    pub fn request(&self, request: OutboundRequest) -> InboundResponse {
        self.runtime.block_on(self.inner.request(request))
    }

    pub fn get(&self, uri: &str) -> InboundResponse {
        self.runtime.block_on(self.inner.get(uri))
    }

    pub fn post(&self, uri: &str, headers: Headers, body: impl Into<Body>) -> InboundResponse {
        self.runtime.block_on(self.inner.post(uri, headers, body))
    }

    pub fn timeout(&self) -> Duration {
        self.inner.timeout()
    }

    pub fn agent(&self) -> &str {
        self.inner.agent()
    }

    pub fn cookie_jar(&self) -> Option<&Arc<dyn CookieJar>> {
        self.inner.cookie_jar()
    }

    pub fn max_redirects(&self) -> u32 {
        self.inner.max_redirects()
    }

    pub fn inner(&self) -> &CoopClient<E> {
        &self.inner
    }

    /// For configuration changes and hook registration.
    pub fn inner_mut(&mut self) -> &mut CoopClient<E> {
        &mut self.inner
    }
}
