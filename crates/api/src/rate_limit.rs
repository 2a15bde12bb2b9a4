use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use bizpulse_core::guard::fingerprint::{client_fingerprint, client_ip};
use bizpulse_core::guard::{RateDecision, RateLimiter, RateLimits, RejectReason};
use serde_json::json;
use std::net::SocketAddr;
use std::time::Duration;

/// One limiter bound to a route group; counters are keyed per group.
#[derive(Clone)]
pub struct RouteLimiter {
    pub limiter: RateLimiter,
    pub endpoint: &'static str,
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

pub fn fingerprint(headers: &HeaderMap, peer: Option<SocketAddr>) -> String {
    let peer_ip = peer.map(|p| p.ip().to_string());
    let ip = client_ip(
        header(headers, "x-real-ip"),
        header(headers, "x-forwarded-for"),
        peer_ip.as_deref(),
    );
    client_fingerprint(ip, header(headers, "user-agent"))
}

pub async fn enforce(State(route): State<RouteLimiter>, req: Request, next: Next) -> Response {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let client = fingerprint(req.headers(), peer);

    match route.limiter.check(&client, route.endpoint).await {
        RateDecision::Allowed => next.run(req).await,
        RateDecision::Rejected {
            reason,
            retry_after,
        } => too_many_requests(reason, retry_after, route.limiter.limits()),
    }
}

pub fn too_many_requests(reason: RejectReason, retry_after: Duration, limits: &RateLimits) -> Response {
    let secs = retry_after.as_secs();
    let mut res = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(json!({
            "detail": reason.message(limits),
            "retry_after": secs,
        })),
    )
        .into_response();
    res.headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from(secs));
    res
}
