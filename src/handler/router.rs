//! Request routing dispatch module
//!
//! Entry point for HTTP request processing: route matching, body limits,
//! the relay call, CORS headers and access logging.

use crate::config::{AppState, RoutesConfig};
use crate::handler::static_files;
use crate::http::{self, cors};
use crate::logger::{self, AccessLogEntry};
use crate::relay::{self, RelayError};
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderMap, HeaderValue, ALLOW, CONTENT_LENGTH, IF_NONE_MATCH, REFERER, USER_AGENT,
};
use hyper::http::request::Parts;
use hyper::{Method, Request, Response, StatusCode, Version};
use std::convert::Infallible;
use std::error::Error;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

type BoxError = Box<dyn Error + Send + Sync>;

const CHAT_METHODS: &str = "POST, OPTIONS";

/// Per-request data needed by the static file handler
pub struct RequestContext<'a> {
    pub path: &'a str,
    pub is_head: bool,
    pub if_none_match: Option<String>,
}

/// Main entry point for HTTP request handling
pub async fn handle_request<B>(
    req: Request<B>,
    peer_addr: SocketAddr,
    state: Arc<AppState>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let started = Instant::now();
    let (parts, body) = req.into_parts();

    logger::log_headers_count(parts.headers.len(), state.config.logging.show_headers);

    let mut response = dispatch(&parts, body, &state).await;

    if state.config.http.enable_cors {
        cors::apply(&mut response);
        if parts.method == Method::OPTIONS {
            cors::apply_preflight(&mut response, &parts.headers);
        }
    }

    if state.config.logging.access_log {
        log_access(&parts, &response, peer_addr, started, &state);
    }

    Ok(response)
}

/// Route request based on path and method
async fn dispatch<B>(parts: &Parts, body: B, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let routes: &RoutesConfig = &state.config.routes;
    let path = parts.uri.path();

    if path == routes.chat_path {
        return match parts.method {
            Method::OPTIONS => http::build_status_ok_response(),
            Method::POST => handle_chat(parts, body, state).await,
            _ => {
                let mut resp = relay_failure(&RelayError::MethodNotAllowed(parts.method.clone()));
                resp.headers_mut().insert(ALLOW, HeaderValue::from_static(CHAT_METHODS));
                resp
            }
        };
    }

    if path == routes.health_path {
        return match parts.method {
            Method::GET | Method::HEAD => http::build_status_ok_response(),
            Method::OPTIONS => http::build_204_response(),
            _ => http::build_405_response("GET, HEAD, OPTIONS"),
        };
    }

    match (&parts.method, routes.static_dir.as_deref()) {
        (&Method::OPTIONS, _) => http::build_204_response(),
        (&Method::GET | &Method::HEAD, Some(root)) => {
            let ctx = RequestContext {
                path,
                is_head: parts.method == Method::HEAD,
                if_none_match: header_string(&parts.headers, IF_NONE_MATCH),
            };
            static_files::serve_directory(&ctx, root, &routes.index_files).await
        }
        (_, Some(_)) => http::build_405_response("GET, HEAD, OPTIONS"),
        (_, None) => http::build_404_response(),
    }
}

/// Relay a chat request and map the outcome onto the response
async fn handle_chat<B>(parts: &Parts, body: B, state: &AppState) -> Response<Full<Bytes>>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    match relay_chat(parts, body, state).await {
        Ok(json) => http::raw_json_response(StatusCode::OK, json),
        Err(err) => relay_failure(&err),
    }
}

async fn relay_chat<B>(parts: &Parts, body: B, state: &AppState) -> Result<Bytes, RelayError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let max_body_size = state.config.http.max_body_size;
    check_body_size(&parts.headers, max_body_size)?;
    let bytes = read_body(body, max_body_size).await?;
    relay::relay(state, &bytes).await
}

/// Every failure on the chat path answers with the JSON error envelope
fn relay_failure(err: &RelayError) -> Response<Full<Bytes>> {
    let status = err.status();
    logger::log_relay_failure(status.as_u16(), err);
    http::json_response(status, &err.envelope())
}

/// Buffer the inbound body, enforcing `max_body_size` even without `Content-Length`
async fn read_body<B>(body: B, max_body_size: u64) -> Result<Bytes, RelayError>
where
    B: Body,
    B::Error: Into<BoxError>,
{
    let limit = usize::try_from(max_body_size).unwrap_or(usize::MAX);
    match Limited::new(body, limit).collect().await {
        Ok(collected) => Ok(collected.to_bytes()),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            Err(RelayError::PayloadTooLarge { limit: max_body_size })
        }
        Err(e) => Err(RelayError::MalformedLocalRequest(e.to_string())),
    }
}

/// Reject a declared `Content-Length` above the limit before reading the body
fn check_body_size(headers: &HeaderMap, max_body_size: u64) -> Result<(), RelayError> {
    let Some(content_length) = headers.get(CONTENT_LENGTH) else {
        return Ok(());
    };
    let Ok(size_str) = content_length.to_str() else {
        logger::log_warning("Content-Length header contains non-ASCII characters");
        return Ok(());
    };
    match size_str.parse::<u64>() {
        Ok(size) if size > max_body_size => {
            Err(RelayError::PayloadTooLarge { limit: max_body_size })
        }
        Ok(_) => Ok(()),
        Err(_) => {
            logger::log_warning(&format!(
                "Invalid Content-Length value: '{size_str}', skipping size check"
            ));
            Ok(())
        }
    }
}

fn header_string(headers: &HeaderMap, name: hyper::header::HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

const fn version_label(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "0.9",
        Version::HTTP_10 => "1.0",
        Version::HTTP_2 => "2",
        Version::HTTP_3 => "3",
        _ => "1.1",
    }
}

fn log_access(
    parts: &Parts,
    response: &Response<Full<Bytes>>,
    peer_addr: SocketAddr,
    started: Instant,
    state: &AppState,
) {
    let mut entry = AccessLogEntry::new(
        peer_addr.ip().to_string(),
        parts.method.to_string(),
        parts.uri.path().to_string(),
    );
    entry.query = parts.uri.query().map(ToString::to_string);
    entry.http_version = version_label(parts.version).to_string();
    entry.status = response.status().as_u16();
    entry.body_bytes = response.body().size_hint().exact().unwrap_or(0);
    entry.referer = header_string(&parts.headers, REFERER);
    entry.user_agent = header_string(&parts.headers, USER_AGENT);
    entry.request_time_us = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);

    logger::log_access(&entry, &state.config.logging.access_log_format);
}
