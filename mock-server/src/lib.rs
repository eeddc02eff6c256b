use std::time::Duration;

use axum::{
    body::Bytes,
    extract::Path,
    http::{header, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// Cookie handed out by `GET /cookie`.
pub const SESSION_COOKIE: &str = "session=abc123; Path=/";

/// What `GET /whoami` reports about the request it received.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Whoami {
    pub method: String,
    pub user_agent: Option<String>,
    pub cookie: Option<String>,
}

pub fn app() -> Router {
    Router::new()
        .route("/", post(echo).put(echo))
        .route("/cookie", get(set_cookie))
        .route("/whoami", get(whoami))
        .route("/multi", get(multi))
        .route("/slow/{ms}", get(slow))
        .route("/redirect/{hops}", get(redirect))
        .route("/tag/{tag}", get(tag))
        .route("/status/{code}", get(status))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(body: Bytes) -> Bytes {
    body
}

async fn set_cookie() -> impl IntoResponse {
    ([(header::SET_COOKIE, SESSION_COOKIE)], "cookie set")
}

async fn whoami(method: Method, headers: HeaderMap) -> Json<Whoami> {
    let text = |name: header::HeaderName| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
    };
    Json(Whoami {
        method: method.to_string(),
        user_agent: text(header::USER_AGENT),
        cookie: text(header::COOKIE),
    })
}

async fn multi() -> Response {
    let mut headers = HeaderMap::new();
    headers.append("x-multi", HeaderValue::from_static("a"));
    headers.append("x-multi", HeaderValue::from_static("b"));
    headers.insert("x-single", HeaderValue::from_static("solo"));
    (headers, "multi").into_response()
}

async fn slow(Path(ms): Path<u64>) -> &'static str {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    "finally"
}

async fn redirect(Path(hops): Path<u32>) -> Response {
    if hops == 0 {
        return "arrived".into_response();
    }
    let location = format!("/redirect/{}", hops - 1);
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}

/// Echoes `tag` in the body and in `X-Tag`, after a tag-dependent delay so
/// concurrent requests complete out of order.
async fn tag(Path(tag): Path<String>) -> impl IntoResponse {
    let delay = (tag.bytes().map(u64::from).sum::<u64>() % 7) * 5;
    tokio::time::sleep(Duration::from_millis(delay)).await;
    ([("x-tag", tag.clone())], tag)
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(status) => status.into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}
