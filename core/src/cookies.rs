//! Cookie jar contract and an in-memory implementation.
//!
//! # Design
//! The client only talks to a jar through [`CookieJar`]: it asks the jar to
//! add a `Cookie` header before a request is translated and to extract
//! `Set-Cookie` values once the response is complete. `MemoryCookieJar` keeps
//! session cookies in a map behind a mutex; the lock is only ever held for the
//! duration of one of those calls, never across a suspension point.

use std::collections::BTreeMap;

use http::Uri;
use parking_lot::Mutex;
use tracing::debug;

use crate::http::{InboundResponse, OutboundRequest};

/// Storage for cookies shared by every request of a client.
pub trait CookieJar: Send + Sync {
    /// Add a `Cookie` header for every stored cookie matching the request URI.
    fn add_cookie_header(&self, request: &mut OutboundRequest);

    /// Store the cookies set by `response`, resolved against the request it
    /// points back to.
    fn extract_cookies(&self, response: &InboundResponse);

    /// One line per stored cookie.
    fn serialize(&self) -> String;
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Cookie {
    name: String,
    value: String,
    domain: String,
    path: String,
    host_only: bool,
    secure: bool,
}

impl Cookie {
    fn matches(&self, host: &str, path: &str, secure_channel: bool) -> bool {
        let domain_ok = if self.host_only {
            host == self.domain
        } else {
            domain_match(host, &self.domain)
        };
        domain_ok && path_match(path, &self.path) && (!self.secure || secure_channel)
    }
}

type CookieKey = (String, String, String);

/// Session cookie store keyed by domain, path and name.
#[derive(Debug, Default)]
pub struct MemoryCookieJar {
    cookies: Mutex<BTreeMap<CookieKey, Cookie>>,
}

impl MemoryCookieJar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.lock().is_empty()
    }

    pub fn clear(&self) {
        self.cookies.lock().clear();
    }

    /// Value of the cookie `name` that would be sent to `uri`.
    pub fn get(&self, uri: &str, name: &str) -> Option<String> {
        let target = Target::parse(uri)?;
        self.cookies
            .lock()
            .values()
            .find(|c| c.name == name && c.matches(&target.host, &target.path, target.secure))
            .map(|c| c.value.clone())
    }
}

impl CookieJar for MemoryCookieJar {
    fn add_cookie_header(&self, request: &mut OutboundRequest) {
        let Some(target) = Target::parse(&request.uri) else {
            return;
        };
        let cookies = self.cookies.lock();
        let mut matching: Vec<&Cookie> = cookies
            .values()
            .filter(|c| c.matches(&target.host, &target.path, target.secure))
            .collect();
        if matching.is_empty() {
            return;
        }
        // More specific paths first.
        matching.sort_by(|a, b| b.path.len().cmp(&a.path.len()));
        let jar_cookies = matching
            .iter()
            .map(|c| format!("{}={}", c.name, c.value))
            .collect::<Vec<_>>()
            .join("; ");
        // Caller-supplied cookies go first, in the same header.
        let header = match request.headers.remove("Cookie").join("; ") {
            old if old.trim().is_empty() => jar_cookies,
            old => format!("{old}; {jar_cookies}"),
        };
        request.headers.insert("Cookie", header);
    }

    fn extract_cookies(&self, response: &InboundResponse) {
        let Some(request) = response.request() else {
            return;
        };
        let Some(target) = Target::parse(&request.uri) else {
            return;
        };
        let mut cookies = self.cookies.lock();
        for line in response.headers.get_all("set-cookie") {
            let Some((cookie, expired)) = parse_set_cookie(line, &target) else {
                debug!(value = line, "ignoring unusable Set-Cookie value");
                continue;
            };
            let key = (cookie.domain.clone(), cookie.path.clone(), cookie.name.clone());
            if expired {
                cookies.remove(&key);
            } else {
                cookies.insert(key, cookie);
            }
        }
    }

    fn serialize(&self) -> String {
        let cookies = self.cookies.lock();
        let mut out = String::new();
        for cookie in cookies.values() {
            let domain = if cookie.host_only {
                cookie.domain.clone()
            } else {
                format!(".{}", cookie.domain)
            };
            out.push_str(&format!(
                "Set-Cookie3: {}={}; path=\"{}\"; domain={}; path_spec; ",
                cookie.name, cookie.value, cookie.path, domain
            ));
            if cookie.secure {
                out.push_str("secure; ");
            }
            out.push_str("discard; version=0\n");
        }
        out
    }
}

/// Host, path and channel security of a request URI.
struct Target {
    host: String,
    path: String,
    secure: bool,
}

impl Target {
    fn parse(uri: &str) -> Option<Self> {
        let uri: Uri = uri.parse().ok()?;
        let host = uri.host()?.to_ascii_lowercase();
        let path = match uri.path() {
            "" => "/".to_string(),
            p => p.to_string(),
        };
        Some(Self {
            host,
            path,
            secure: uri.scheme_str() == Some("https"),
        })
    }

    /// Directory of the request path, used when `Set-Cookie` has no `Path`.
    fn default_path(&self) -> String {
        match self.path.rfind('/') {
            Some(0) | None => "/".to_string(),
            Some(i) => self.path[..i].to_string(),
        }
    }
}

/// Returns the cookie and whether it asks to be deleted.
fn parse_set_cookie(line: &str, target: &Target) -> Option<(Cookie, bool)> {
    let mut parts = line.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.trim().to_string(),
        domain: target.host.clone(),
        path: target.default_path(),
        host_only: true,
        secure: false,
    };
    let mut expired = false;

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "domain" => {
                let domain = val.trim_start_matches('.').to_ascii_lowercase();
                if domain.is_empty() {
                    continue;
                }
                if !domain_match(&target.host, &domain) {
                    return None;
                }
                cookie.domain = domain;
                cookie.host_only = false;
            }
            "max-age" => {
                if val.parse::<i64>().is_ok_and(|secs| secs <= 0) {
                    expired = true;
                }
            }
            "secure" => cookie.secure = true,
            _ => {}
        }
    }
    Some((cookie, expired))
}

fn domain_match(host: &str, domain: &str) -> bool {
    host == domain
        || (host.len() > domain.len()
            && host.ends_with(domain)
            && host.as_bytes()[host.len() - domain.len() - 1] == b'.'
            && host.parse::<std::net::IpAddr>().is_err())
}

fn path_match(request_path: &str, cookie_path: &str) -> bool {
    request_path == cookie_path
        || (request_path.starts_with(cookie_path)
            && (cookie_path.ends_with('/')
                || request_path.as_bytes().get(cookie_path.len()) == Some(&b'/')))
}
