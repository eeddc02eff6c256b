//! Turns a caller's request into the argument shape of an engine call.

use std::collections::BTreeMap;

use crate::config::ClientConfig;
use crate::engine::AsyncCallArgs;
use crate::headers::Headers;
use crate::http::{OutboundRequest, RequestHead};

/// Build the engine arguments for `request` under `config`.
///
/// The cookie jar, when configured, adds its `Cookie` header first; the
/// returned head reflects that. Headers are flattened (last value wins) and
/// `User-Agent` is then forced to the configured agent. The engine is never
/// allowed to follow redirects itself: the client re-runs the whole cycle per
/// hop instead.
pub fn translate(mut request: OutboundRequest, config: &ClientConfig) -> (RequestHead, AsyncCallArgs) {
    if let Some(jar) = config.cookie_jar() {
        jar.add_cookie_header(&mut request);
    }
    let (head, body) = request.into_parts();

    let mut headers = flatten(&head.headers);
    headers.remove("user-agent");
    if !config.user_agent().is_empty() {
        headers.insert("user-agent".to_string(), config.user_agent().to_string());
    }

    let args = AsyncCallArgs {
        method: head.method.clone(),
        uri: head.uri.clone(),
        headers,
        body,
        recurse: 0,
        timeout: config.timeout(),
    };
    (head, args)
}

/// Collapse a multimap into one value per lower-cased name; the last
/// occurrence wins.
pub fn flatten(headers: &Headers) -> BTreeMap<String, String> {
    headers
        .iter()
        .map(|(name, value)| (name.to_ascii_lowercase(), value.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;

    use super::*;
    use crate::cookies::{CookieJar, MemoryCookieJar};
    use crate::http::{Body, InboundResponse, Method};

    fn config() -> ClientConfig {
        ClientConfig::new()
            .with_user_agent("bridge-test/1.0")
            .with_timeout(Duration::from_secs(5))
    }

    #[test]
    fn user_agent_is_always_overridden() {
        let request = OutboundRequest::new(Method::Get, "http://h/")
            .with_header("User-Agent", "caller/9")
            .with_header("user-agent", "caller/10");
        let (_, args) = translate(request, &config());
        assert_eq!(args.headers.get("user-agent").map(String::as_str), Some("bridge-test/1.0"));
        assert_eq!(args.headers.len(), 1);
    }

    #[test]
    fn empty_agent_sends_no_user_agent() {
        let request = OutboundRequest::new(Method::Get, "http://h/").with_header("User-Agent", "caller/9");
        let (_, args) = translate(request, &config().with_user_agent(""));
        assert!(!args.headers.contains_key("user-agent"));
    }

    #[test]
    fn repeated_headers_last_write_wins() {
        let request = OutboundRequest::new(Method::Get, "http://h/")
            .with_header("Accept", "text/plain")
            .with_header("ACCEPT", "application/json");
        let (head, args) = translate(request, &config());
        assert_eq!(args.headers.get("accept").map(String::as_str), Some("application/json"));
        assert_eq!(head.headers.get_all("accept").count(), 2);
    }

    #[test]
    fn recurse_is_zero_whatever_the_redirect_limit() {
        for max in [0, 1, 7, 100] {
            let request = OutboundRequest::new(Method::Get, "http://h/");
            let (_, args) = translate(request, &config().with_max_redirects(max));
            assert_eq!(args.recurse, 0);
        }
    }

    #[test]
    fn timeout_and_target_are_copied() {
        let request = OutboundRequest::new(Method::Delete, "http://h/item/1");
        let (_, args) = translate(request, &config());
        assert_eq!(args.timeout, Duration::from_secs(5));
        assert_eq!(args.method, Method::Delete);
        assert_eq!(args.uri, "http://h/item/1");
    }

    #[test]
    fn body_is_moved_verbatim() {
        let request = OutboundRequest::new(Method::Post, "http://h/").with_body("abc");
        let (_, args) = translate(request, &config());
        assert_eq!(args.body.as_bytes(), Some(&b"abc"[..]));

        let request = OutboundRequest::new(Method::Put, "http://h/")
            .with_body(Body::from_chunks(vec![Bytes::from_static(b"x")]));
        let (_, args) = translate(request, &config());
        assert!(args.body.is_stream());
    }

    #[test]
    fn cookie_header_added_before_flattening() {
        let jar = Arc::new(MemoryCookieJar::new());
        let mut seed = InboundResponse::new(
            200,
            "OK",
            [("set-cookie", "sid=1; Path=/")].into_iter().collect(),
            Bytes::new(),
        );
        seed.set_request(Arc::new(RequestHead {
            method: Method::Get,
            uri: "http://h/".into(),
            headers: Headers::new(),
        }));
        jar.extract_cookies(&seed);

        let request = OutboundRequest::new(Method::Get, "http://h/page");
        let (head, args) = translate(request, &config().with_cookie_jar(jar));
        assert_eq!(args.headers.get("cookie").map(String::as_str), Some("sid=1"));
        assert_eq!(head.headers.get("cookie"), Some("sid=1"));
    }
}
