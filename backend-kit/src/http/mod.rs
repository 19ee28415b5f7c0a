//! HTTP middleware for axum services.

pub mod client_info;
pub mod request_log;
pub mod validated;

pub use client_info::ClientInfo;
pub use request_log::{
    HEADER_ALLOW_LIST, REQUEST_ID_HEADER, RequestId, RequestLogLayer, RequestLogOptions,
    RequestLogService, shrink_body, shrink_headers,
};
pub use validated::{Validate, ValidatedJson};
