//! The blocking-style client surface.
//!
//! # Design
//! `HttpClient` is the capability set code written against a classic blocking
//! client relies on: `request` always hands back a response, convenience verbs
//! build a request and call it, and configuration is reachable through
//! accessors. From the caller's point of view each call is sequential; under
//! the hood the calling task is parked on the engine's completion callback
//! while other tasks on the same scheduler keep running.
//!
//! `CoopClient::simple_request` is one translate/dispatch/normalize cycle.
//! `request` layers the usual blocking-client redirect handling on top,
//! re-running the whole cycle for each hop.

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use crate::bridge::{self, CLIENT_WARNING};
use crate::config::ClientConfig;
use crate::cookies::CookieJar;
use crate::engine::AsyncEngine;
use crate::headers::Headers;
use crate::hooks::Hooks;
use crate::http::{resolve_uri, Body, InboundResponse, Method, OutboundRequest};
use crate::translate::translate;

/// Operations shared by every blocking-style client.
#[allow(async_fn_in_trait)]
pub trait HttpClient {
    /// Send `request`, following redirects, and return the final response.
    async fn request(&self, request: OutboundRequest) -> InboundResponse;

    async fn get(&self, uri: &str) -> InboundResponse {
        self.request(OutboundRequest::new(Method::Get, uri)).await
    }

    async fn head(&self, uri: &str) -> InboundResponse {
        self.request(OutboundRequest::new(Method::Head, uri)).await
    }

    async fn post(&self, uri: &str, headers: Headers, body: impl Into<Body>) -> InboundResponse {
        let mut request = OutboundRequest::new(Method::Post, uri).with_body(body);
        request.headers = headers;
        self.request(request).await
    }

    async fn put(&self, uri: &str, headers: Headers, body: impl Into<Body>) -> InboundResponse {
        let mut request = OutboundRequest::new(Method::Put, uri).with_body(body);
        request.headers = headers;
        self.request(request).await
    }

    async fn delete(&self, uri: &str) -> InboundResponse {
        self.request(OutboundRequest::new(Method::Delete, uri)).await
    }

    fn timeout(&self) -> Duration;

    fn agent(&self) -> &str;

    fn cookie_jar(&self) -> Option<&Arc<dyn CookieJar>>;

    fn max_redirects(&self) -> u32;
}

/// Blocking-style client backed by a callback-driven engine.
pub struct CoopClient<E> {
    engine: E,
    config: ClientConfig,
    hooks: Arc<Hooks>,
}

impl<E: AsyncEngine> CoopClient<E> {
    pub fn new(engine: E) -> Self {
        Self::with_config(engine, ClientConfig::default())
    }

    pub fn with_config(engine: E, config: ClientConfig) -> Self {
        Self {
            engine,
            config,
            hooks: Arc::new(Hooks::new()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.config.set_timeout(timeout);
    }

    pub fn set_agent(&mut self, agent: impl Into<String>) {
        self.config.set_user_agent(agent);
    }

    pub fn set_cookie_jar(&mut self, jar: Option<Arc<dyn CookieJar>>) {
        self.config.set_cookie_jar(jar);
    }

    pub fn set_max_redirects(&mut self, max: u32) {
        self.config.set_max_redirects(max);
    }

    pub fn add_response_header_hook(
        &mut self,
        hook: impl Fn(&mut InboundResponse) + Send + Sync + 'static,
    ) {
        Arc::make_mut(&mut self.hooks).on_response_header(hook);
    }

    /// Register a body observer; returning `false` stops delivery to it for
    /// the rest of the current response.
    pub fn add_response_data_hook(
        &mut self,
        hook: impl Fn(&InboundResponse, &[u8]) -> bool + Send + Sync + 'static,
    ) {
        Arc::make_mut(&mut self.hooks).on_response_data(hook);
    }

    /// Register an observer of complete responses. These run only when a
    /// cookie jar is configured, right after the jar has seen the response.
    pub fn add_response_done_hook(
        &mut self,
        hook: impl Fn(&mut InboundResponse) + Send + Sync + 'static,
    ) {
        Arc::make_mut(&mut self.hooks).on_response_done(hook);
    }

    /// One engine round trip, without redirect handling.
    pub async fn simple_request(&self, request: OutboundRequest) -> InboundResponse {
        let (head, args) = translate(request, &self.config);
        let mut response = bridge::execute(&self.engine, Arc::clone(&self.hooks), args).await;
        response.set_request(Arc::new(head));

        if let Some(jar) = self.config.cookie_jar() {
            jar.extract_cookies(&response);
            self.hooks.run_response_done(&mut response);
        }
        response
    }
}

impl<E: AsyncEngine> HttpClient for CoopClient<E> {
    async fn request(&self, request: OutboundRequest) -> InboundResponse {
        let mut response = self.simple_request(request).await;
        let mut hops = 0;
        while let Some(next) = redirect_request(&response) {
            let max = self.config.max_redirects();
            if hops >= max {
                debug!(max, "redirect limit reached");
                response
                    .headers
                    .append(CLIENT_WARNING, format!("Redirect loop detected (max_redirect = {max})"));
                break;
            }
            hops += 1;
            debug!(hop = hops, uri = %next.uri, "following redirect");
            let mut followed = self.simple_request(next).await;
            followed.set_previous(response);
            response = followed;
        }
        response
    }

    fn timeout(&self) -> Duration {
        self.config.timeout()
    }

    fn agent(&self) -> &str {
        self.config.user_agent()
    }

    fn cookie_jar(&self) -> Option<&Arc<dyn CookieJar>> {
        self.config.cookie_jar()
    }

    fn max_redirects(&self) -> u32 {
        self.config.max_redirects()
    }
}

/// The request to issue next if `response` is a followable redirect.
///
/// Only `GET` and `HEAD` are redirected; a `303 See Other` turns any other
/// method into a bodiless `GET` first.
fn redirect_request(response: &InboundResponse) -> Option<OutboundRequest> {
    if !matches!(response.status, 301 | 302 | 303 | 307 | 308) {
        return None;
    }
    let previous = response.request()?;
    let location = response.header("Location")?;
    let uri = resolve_uri(&previous.uri, location)?;

    let method = match (&previous.method, response.status) {
        (Method::Head, _) => Method::Head,
        (_, 303) => Method::Get,
        (method, _) => method.clone(),
    };
    if !matches!(method, Method::Get | Method::Head) {
        return None;
    }

    let mut headers = previous.headers.clone();
    for name in ["Cookie", "Host", "Content-Length", "Content-Type"] {
        headers.remove(name);
    }
    Some(OutboundRequest {
        method,
        uri,
        headers,
        body: Body::Empty,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use bytes::Bytes;
    use parking_lot::Mutex;

    use super::*;
    use crate::cookies::MemoryCookieJar;
    use crate::engine::{AsyncCallArgs, AsyncResult, Completion};
    use crate::http::RequestHead;

    /// Replies with queued results in order and records every call.
    #[derive(Default)]
    struct Scripted {
        replies: Mutex<VecDeque<AsyncResult>>,
        calls: Mutex<Vec<(Method, String, u32)>>,
    }

    impl Scripted {
        fn new(replies: Vec<AsyncResult>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(replies.into()),
                calls: Mutex::default(),
            })
        }
    }

    impl AsyncEngine for Scripted {
        fn request(&self, args: AsyncCallArgs, on_complete: Completion) {
            self.calls.lock().push((args.method, args.uri, args.recurse));
            let reply = self
                .replies
                .lock()
                .pop_front()
                .unwrap_or_else(|| AsyncResult::new(599, "script exhausted"));
            tokio::spawn(async move { on_complete(reply) });
        }
    }

    fn found(location: &str) -> AsyncResult {
        AsyncResult::new(302, "Found").with_header("location", location)
    }

    #[tokio::test]
    async fn response_points_back_to_request() {
        let engine = Scripted::new(vec![AsyncResult::new(200, "OK").with_data("hi")]);
        let client = CoopClient::new(Arc::clone(&engine));
        let response = client.get("http://h/a").await;
        let request = response.request().expect("request attached");
        assert_eq!(request.uri, "http://h/a");
        assert_eq!(request.method, Method::Get);
    }

    #[tokio::test]
    async fn follows_relative_redirects() {
        let engine = Scripted::new(vec![
            found("/b"),
            found("c"),
            AsyncResult::new(200, "OK").with_data("done"),
        ]);
        let client = CoopClient::new(Arc::clone(&engine));
        let response = client.get("http://h/a").await;

        assert_eq!(response.status, 200);
        assert_eq!(response.chain_len(), 3);
        let uris: Vec<String> = engine.calls.lock().iter().map(|c| c.1.clone()).collect();
        assert_eq!(uris, vec!["http://h/a", "http://h/b", "http://h/c"]);
        assert!(engine.calls.lock().iter().all(|c| c.2 == 0));
    }

    #[tokio::test]
    async fn stops_at_redirect_limit() {
        let engine = Scripted::new(vec![found("/1"), found("/2"), found("/3")]);
        let config = ClientConfig::new().with_max_redirects(2);
        let client = CoopClient::with_config(Arc::clone(&engine), config);
        let response = client.get("http://h/0").await;

        assert_eq!(response.status, 302);
        assert_eq!(response.chain_len(), 3);
        assert_eq!(
            response.header(CLIENT_WARNING),
            Some("Redirect loop detected (max_redirect = 2)")
        );
    }

    #[tokio::test]
    async fn post_is_not_redirected_on_302() {
        let engine = Scripted::new(vec![found("/next")]);
        let client = CoopClient::new(Arc::clone(&engine));
        let response = client.post("http://h/form", Headers::new(), "a=1").await;
        assert_eq!(response.status, 302);
        assert_eq!(engine.calls.lock().len(), 1);
    }

    #[tokio::test]
    async fn see_other_turns_post_into_get() {
        let engine = Scripted::new(vec![
            AsyncResult::new(303, "See Other").with_header("location", "/result"),
            AsyncResult::new(200, "OK"),
        ]);
        let client = CoopClient::new(Arc::clone(&engine));
        let response = client.post("http://h/form", Headers::new(), "a=1").await;
        assert_eq!(response.status, 200);
        let calls = engine.calls.lock();
        assert_eq!(calls[1].0, Method::Get);
        assert_eq!(calls[1].1, "http://h/result");
    }

    #[tokio::test]
    async fn accessors_reflect_config() {
        let mut client = CoopClient::new(Scripted::new(Vec::new()));
        client.set_agent("probe/2");
        client.set_timeout(Duration::from_secs(3));
        client.set_max_redirects(1);
        assert_eq!(client.agent(), "probe/2");
        assert_eq!(client.timeout(), Duration::from_secs(3));
        assert_eq!(client.max_redirects(), 1);
        assert!(client.cookie_jar().is_none());
    }

    #[tokio::test]
    async fn done_hooks_run_only_with_cookie_jar() {
        let engine = Scripted::new(vec![AsyncResult::new(200, "OK"), AsyncResult::new(200, "OK")]);
        let mut client = CoopClient::new(Arc::clone(&engine));
        client.add_response_done_hook(|r| r.headers.append("X-Done", "1"));

        let without = client.get("http://h/").await;
        assert!(!without.headers.contains("x-done"));

        client.set_cookie_jar(Some(Arc::new(MemoryCookieJar::new())));
        let with = client.get("http://h/").await;
        assert_eq!(with.header("x-done"), Some("1"));
    }

    #[tokio::test]
    async fn cookie_from_response_is_sent_on_next_request() {
        let jar = Arc::new(MemoryCookieJar::new());
        let engine = Scripted::new(vec![
            AsyncResult::new(200, "OK").with_header("set-cookie", "sid=7; Path=/"),
            AsyncResult::new(200, "OK"),
        ]);
        let config = ClientConfig::new().with_cookie_jar(jar.clone());
        let client = CoopClient::with_config(Arc::clone(&engine), config);

        client.get("http://h/login").await;
        let second = client.get("http://h/home").await;
        let sent = second.request().map(|r| r.headers.get("cookie").map(str::to_string));
        assert_eq!(sent, Some(Some("sid=7".to_string())));
        assert!(jar.serialize().contains("sid=7"));
    }

    #[test]
    fn redirect_request_drops_entity_headers() {
        let headers: Headers = [("Content-Type", "text/plain"), ("X-Keep", "1"), ("Cookie", "a=1")]
            .into_iter()
            .collect();
        let mut response = InboundResponse::new(
            307,
            "Temporary Redirect",
            [("location", "/there")].into_iter().collect(),
            Bytes::new(),
        );
        response.set_request(Arc::new(RequestHead {
            method: Method::Get,
            uri: "http://h/here".into(),
            headers,
        }));
        let next = redirect_request(&response).expect("redirectable");
        assert_eq!(next.uri, "http://h/there");
        assert_eq!(next.headers.get("x-keep"), Some("1"));
        assert!(!next.headers.contains("content-type"));
        assert!(!next.headers.contains("cookie"));
    }
}
