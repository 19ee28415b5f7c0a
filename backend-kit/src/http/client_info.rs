//! Caller details from an incoming request.

use axum::extract::ConnectInfo;
use axum::http::request::Parts;
use axum::http::{HeaderMap, Request, header};
use serde::Serialize;
use std::net::SocketAddr;

use super::request_log::{REQUEST_ID_HEADER, RequestId};

/// Who sent a request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientInfo {
    /// Client address: first `x-forwarded-for` entry, else the peer address
    pub ip: Option<String>,
    /// `user-agent`, empty when absent
    pub ua: String,
    /// `x-request-id` header, else the id assigned by [`RequestLogLayer`]
    ///
    /// [`RequestLogLayer`]: super::RequestLogLayer
    pub request_id: Option<String>,
}

impl ClientInfo {
    /// Extract from request parts.
    #[must_use]
    pub fn from_parts(parts: &Parts) -> Self {
        Self::extract(&parts.headers, &parts.extensions)
    }

    /// Extract from a full request.
    #[must_use]
    pub fn from_request<B>(req: &Request<B>) -> Self {
        Self::extract(req.headers(), req.extensions())
    }

    fn extract(headers: &HeaderMap, extensions: &axum::http::Extensions) -> Self {
        let text = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Self {
            ip: client_ip(headers, extensions),
            ua: text(header::USER_AGENT.as_str()).unwrap_or_default(),
            request_id: text(REQUEST_ID_HEADER)
                .or_else(|| extensions.get::<RequestId>().map(|id| id.0.clone())),
        }
    }
}

pub(crate) fn client_ip(headers: &HeaderMap, extensions: &axum::http::Extensions) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .or_else(|| {
            extensions
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
}
