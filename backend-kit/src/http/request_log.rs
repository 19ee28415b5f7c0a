//! Request/response logging middleware.
//!
//! Every request gets an id (propagated from `x-request-id` or freshly
//! generated), stored as a [`RequestId`] extension and echoed on the
//! response. One `REQUEST` line is logged on the way in and one `RESPONSE`
//! line on the way out.

use axum::body::Body;
use axum::extract::OriginalUri;
use axum::http::{HeaderMap, HeaderValue, Request, header};
use axum::response::{IntoResponse, Response};
use futures::future::BoxFuture;
use serde_json::{Map, Value, json};
use std::task::{Context, Poll};
use std::time::{Duration, Instant};
use tower::{Layer, Service};
use uuid::Uuid;

use super::client_info::client_ip;
use crate::logging::{LogParams, Logger};
use crate::response::HttpError;

/// Header carrying the request id.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Headers logged when `include_headers` is on.
pub const HEADER_ALLOW_LIST: [&str; 4] = ["user-agent", "accept", "content-type", "x-forwarded-for"];

const MAX_STRING_CHARS: usize = 500;
const MAX_COLLECTION_ITEMS: usize = 50;

/// Request id assigned by [`RequestLogLayer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

impl RequestId {
    /// The id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// What the middleware logs.
#[derive(Debug, Clone)]
pub struct RequestLogOptions {
    /// Log allow-listed request headers
    pub include_headers: bool,
    /// Log decoded query parameters
    pub include_query: bool,
    /// Log the (shrunk) JSON body
    pub include_body: bool,
    /// Responses at least this slow are flagged `slow`
    pub slow_threshold: Duration,
    /// Bodies with a larger `content-length` are not buffered
    pub max_body_bytes: usize,
}

impl Default for RequestLogOptions {
    fn default() -> Self {
        Self {
            include_headers: false,
            include_query: true,
            include_body: true,
            slow_threshold: Duration::from_millis(1000),
            max_body_bytes: 64 * 1024,
        }
    }
}

impl RequestLogOptions {
    /// Toggle header logging.
    #[must_use]
    pub const fn with_headers(mut self, enabled: bool) -> Self {
        self.include_headers = enabled;
        self
    }

    /// Toggle query logging.
    #[must_use]
    pub const fn with_query(mut self, enabled: bool) -> Self {
        self.include_query = enabled;
        self
    }

    /// Toggle body logging.
    #[must_use]
    pub const fn with_body(mut self, enabled: bool) -> Self {
        self.include_body = enabled;
        self
    }

    /// Set the slow-response threshold.
    #[must_use]
    pub const fn with_slow_threshold(mut self, threshold: Duration) -> Self {
        self.slow_threshold = threshold;
        self
    }
}

/// Shrink a JSON body for logging.
///
/// Only top-level fields of an object are touched: long strings are cut to
/// 500 characters, and arrays or objects with more than 50 entries are
/// replaced by a summary. A top-level array over the limit is summarized
/// the same way.
///
/// ```
/// use backend_kit::http::shrink_body;
/// use serde_json::json;
///
/// let body = json!({"ids": (0..60).collect::<Vec<_>>(), "name": "ana"});
/// assert_eq!(shrink_body(&body), json!({"ids": "[Array length=60]", "name": "ana"}));
/// ```
#[must_use]
pub fn shrink_body(body: &Value) -> Value {
    let map = match body {
        Value::Object(map) => map,
        Value::Array(items) if items.len() > MAX_COLLECTION_ITEMS => {
            return Value::String(format!("[Array length={}]", items.len()));
        }
        other => return other.clone(),
    };

    let shrunk = map
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) if s.chars().count() > MAX_STRING_CHARS => {
                    let head: String = s.chars().take(MAX_STRING_CHARS).collect();
                    Value::String(format!("{head}...<truncated>"))
                }
                Value::Array(items) if items.len() > MAX_COLLECTION_ITEMS => {
                    Value::String(format!("[Array length={}]", items.len()))
                }
                Value::Object(fields) if fields.len() > MAX_COLLECTION_ITEMS => {
                    Value::String(format!("{{Object keys={}}}", fields.len()))
                }
                other => other.clone(),
            };
            (key.clone(), value)
        })
        .collect();
    Value::Object(shrunk)
}

/// Keep only allow-listed headers.
#[must_use]
pub fn shrink_headers(headers: &HeaderMap) -> Map<String, Value> {
    HEADER_ALLOW_LIST
        .iter()
        .filter_map(|name| {
            let value = headers.get(*name)?.to_str().ok()?;
            (!value.is_empty()).then(|| ((*name).to_string(), Value::String(value.to_string())))
        })
        .collect()
}

fn query_metadata(query: &str) -> Map<String, Value> {
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
        .collect()
}

fn is_json(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"))
}

fn declared_length(headers: &HeaderMap) -> Option<usize> {
    headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Tower layer that logs each request and response.
#[derive(Debug, Clone, Default)]
pub struct RequestLogLayer {
    options: RequestLogOptions,
    logger: Logger,
}

impl RequestLogLayer {
    /// Layer with default options.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Layer with custom options.
    #[must_use]
    pub fn with_options(options: RequestLogOptions) -> Self {
        Self {
            options,
            logger: Logger::new(),
        }
    }
}

impl<S> Layer<S> for RequestLogLayer {
    type Service = RequestLogService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestLogService {
            inner,
            options: self.options.clone(),
            logger: self.logger,
        }
    }
}

/// Service produced by [`RequestLogLayer`].
#[derive(Debug, Clone)]
pub struct RequestLogService<S> {
    inner: S,
    options: RequestLogOptions,
    logger: Logger,
}

impl<S> Service<Request<Body>> for RequestLogService<S>
where
    S: Service<Request<Body>, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: Send + 'static,
{
    type Response = Response;
    type Error = S::Error;
    type Future = BoxFuture<'static, Result<Response, S::Error>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: Request<Body>) -> Self::Future {
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let options = self.options.clone();
        let logger = self.logger;

        Box::pin(async move {
            let start = Instant::now();
            let (mut parts, body) = req.into_parts();

            let request_id = parts
                .headers
                .get(REQUEST_ID_HEADER)
                .and_then(|v| v.to_str().ok())
                .filter(|v| !v.is_empty())
                .map_or_else(|| Uuid::new_v4().to_string(), str::to_string);
            parts.extensions.insert(RequestId(request_id.clone()));

            let method = parts.method.clone();
            let uri = parts
                .extensions
                .get::<OriginalUri>()
                .map_or_else(|| parts.uri.to_string(), |original| original.0.to_string());

            let mut meta_in = Map::new();
            if options.include_query {
                let query = parts.uri.query().map(query_metadata).unwrap_or_default();
                if !query.is_empty() {
                    meta_in.insert("query".to_string(), Value::Object(query));
                }
            }

            let wants_body = options.include_body
                && is_json(&parts.headers)
                && declared_length(&parts.headers).is_some_and(|len| len <= options.max_body_bytes);
            let body = if wants_body {
                let bytes = match axum::body::to_bytes(body, options.max_body_bytes).await {
                    Ok(bytes) => bytes,
                    Err(err) => {
                        return Ok(HttpError::bad_request(format!("unreadable body: {err}")).into_response());
                    }
                };
                match serde_json::from_slice::<Value>(&bytes) {
                    Ok(Value::Object(map)) if !map.is_empty() => {
                        meta_in.insert("body".to_string(), shrink_body(&Value::Object(map)));
                    }
                    Ok(Value::Array(items)) if !items.is_empty() => {
                        meta_in.insert("body".to_string(), shrink_body(&Value::Array(items)));
                    }
                    _ => {}
                }
                Body::from(bytes)
            } else {
                body
            };

            if options.include_headers {
                meta_in.insert("headers".to_string(), Value::Object(shrink_headers(&parts.headers)));
            }
            meta_in.insert(
                "ip".to_string(),
                client_ip(&parts.headers, &parts.extensions).map_or(Value::Null, Value::String),
            );

            logger.info(
                &format!("Incoming {method} {uri}"),
                LogParams::new("REQUEST")
                    .with_request_id(request_id.clone())
                    .with_metadata(Value::Object(meta_in)),
            );

            let mut response = inner.call(Request::from_parts(parts, body)).await?;

            let duration = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
            let status = response.status();
            let mut meta_out = json!({ "status": status.as_u16(), "duration": duration });
            if duration >= u64::try_from(options.slow_threshold.as_millis()).unwrap_or(u64::MAX) {
                meta_out["slow"] = Value::Bool(true);
            }
            if let Some(length) = response
                .headers()
                .get(header::CONTENT_LENGTH)
                .and_then(|v| v.to_str().ok())
            {
                meta_out["length"] = Value::String(length.to_string());
            }

            logger.info(
                &format!("Response {method} {uri} {} {duration}ms", status.as_u16()),
                LogParams::new("RESPONSE")
                    .with_request_id(request_id.clone())
                    .with_metadata(meta_out),
            );

            if let Ok(value) = HeaderValue::from_str(&request_id) {
                response.headers_mut().insert(REQUEST_ID_HEADER, value);
            }
            Ok(response)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::FileFormat;
    use crate::logging::test_support::Capture;
    use axum::Router;
    use axum::routing::{get, post};
    use tower::ServiceExt;

    async fn echo(req: Request<Body>) -> String {
        let id = req
            .extensions()
            .get::<RequestId>()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default();
        let body = axum::body::to_bytes(req.into_body(), usize::MAX).await.unwrap();
        format!("{id}|{}", String::from_utf8_lossy(&body))
    }

    async fn sized() -> impl IntoResponse {
        ([(header::CONTENT_LENGTH, "2")], "ok")
    }

    fn app(options: RequestLogOptions) -> Router {
        Router::new()
            .route("/users", post(echo))
            .route("/sized", get(sized))
            .layer(RequestLogLayer::with_options(options))
    }

    #[test]
    fn test_shrink_body_rules() {
        let long = "x".repeat(501);
        let many_keys: Map<String, Value> = (0..51).map(|i| (format!("k{i}"), json!(i))).collect();
        let body = json!({
            "note": long,
            "tags": vec![1; 51],
            "profile": many_keys,
            "short": "ok",
            "few": [1, 2, 3],
        });

        let shrunk = shrink_body(&body);
        assert_eq!(shrunk["note"], json!(format!("{}...<truncated>", "x".repeat(500))));
        assert_eq!(shrunk["tags"], json!("[Array length=51]"));
        assert_eq!(shrunk["profile"], json!("{Object keys=51}"));
        assert_eq!(shrunk["short"], json!("ok"));
        assert_eq!(shrunk["few"], json!([1, 2, 3]));
    }

    #[test]
    fn test_shrink_body_limits_are_inclusive() {
        let body = json!({ "note": "y".repeat(500), "tags": vec![0; 50] });
        assert_eq!(shrink_body(&body), body);
        assert_eq!(shrink_body(&json!("scalar")), json!("scalar"));
    }

    #[test]
    fn test_shrink_body_top_level_array() {
        assert_eq!(shrink_body(&json!(vec![0; 51])), json!("[Array length=51]"));
        assert_eq!(shrink_body(&json!([1, 2])), json!([1, 2]));
    }

    #[test]
    fn test_shrink_headers_allow_list() {
        let mut headers = HeaderMap::new();
        headers.insert("user-agent", HeaderValue::from_static("curl"));
        headers.insert("authorization", HeaderValue::from_static("Bearer x"));
        let kept = shrink_headers(&headers);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept["user-agent"], json!("curl"));
    }

    #[tokio::test]
    async fn test_propagates_request_id() {
        let response = app(RequestLogOptions::default())
            .oneshot(
                Request::post("/users")
                    .header("x-request-id", "req-42")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.headers()[REQUEST_ID_HEADER], "req-42");
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&body[..], b"req-42|");
    }

    #[tokio::test]
    async fn test_generates_request_id() {
        let response = app(RequestLogOptions::default())
            .oneshot(Request::post("/users").body(Body::empty()).unwrap())
            .await
            .unwrap();

        let id = response.headers()[REQUEST_ID_HEADER].to_str().unwrap();
        assert!(Uuid::parse_str(id).is_ok());
    }

    #[tokio::test]
    async fn test_body_is_still_readable_by_handler() {
        let payload = r#"{"name":"ana","password":"secret"}"#;
        let response = app(RequestLogOptions::default())
            .oneshot(
                Request::post("/users")
                    .header("x-request-id", "r")
                    .header("content-type", "application/json")
                    .header("content-length", payload.len())
                    .body(Body::from(payload))
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(String::from_utf8_lossy(&body), format!("r|{payload}"));
    }

    #[test]
    fn test_logs_request_and_response_lines() {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(capture.clone())
            .event_format(FileFormat)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        runtime.block_on(async {
            app(RequestLogOptions::default().with_headers(true))
                .oneshot(
                    Request::post("/users?page=2")
                        .header("x-request-id", "r-9")
                        .header("user-agent", "test")
                        .body(Body::empty())
                        .unwrap(),
                )
                .await
                .unwrap();
        });

        let out = capture.contents();
        assert!(out.contains("::INFO::REQUEST::r-9::Incoming POST /users?page=2::"), "{out}");
        assert!(out.contains(r#""query":{"page":"2"}"#), "{out}");
        assert!(out.contains(r#""headers":{"user-agent":"test"}"#), "{out}");
        assert!(out.contains("::INFO::RESPONSE::r-9::Response POST /users?page=2 200 "), "{out}");
        assert!(out.contains(r#""status":200"#), "{out}");
    }

    fn captured<F: std::future::Future<Output = ()>>(run: F) -> String {
        let capture = Capture::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_writer(capture.clone())
            .event_format(FileFormat)
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap()
            .block_on(run);
        capture.contents()
    }

    #[test]
    fn test_response_line_flags_slow_and_length() {
        let out = captured(async {
            app(RequestLogOptions::default().with_slow_threshold(Duration::ZERO))
                .oneshot(Request::get("/sized").body(Body::empty()).unwrap())
                .await
                .unwrap();
        });

        assert!(out.contains("::INFO::RESPONSE::"), "{out}");
        assert!(out.contains(r#""slow":true"#), "{out}");
        assert!(out.contains(r#""length":"2""#), "{out}");
    }

    #[test]
    fn test_fast_response_is_not_slow() {
        let out = captured(async {
            app(RequestLogOptions::default().with_slow_threshold(Duration::from_secs(60)))
                .oneshot(Request::get("/sized").body(Body::empty()).unwrap())
                .await
                .unwrap();
        });

        assert!(out.contains("Response GET /sized 200 "), "{out}");
        assert!(!out.contains(r#""slow""#), "{out}");
    }

    #[test]
    fn test_large_array_body_is_summarized() {
        let payload = serde_json::to_string(&vec![7; 60]).unwrap();
        let out = captured(async move {
            app(RequestLogOptions::default())
                .oneshot(
                    Request::post("/users")
                        .header("content-type", "application/json")
                        .header("content-length", payload.len())
                        .body(Body::from(payload))
                        .unwrap(),
                )
                .await
                .unwrap();
        });

        assert!(out.contains(r#""body":"[Array length=60]""#), "{out}");
    }
}
