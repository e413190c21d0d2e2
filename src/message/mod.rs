//! HTTP message model.
//!
//! This module provides:
//! - Ordered, case-sensitive header lists ([`HeaderMap`])
//! - Acceptable status code ranges ([`StatusCodeRange`], [`AcceptancePolicy`])
//! - The request builder and its body sources ([`Request`], [`RequestContent`])
//! - Response metadata with progress accounting ([`Response`])

mod headers;
mod request;
mod response;
mod status;

#[cfg(test)]
mod headers_tests;
#[cfg(test)]
mod request_tests;

pub use headers::HeaderMap;
pub use request::{DEFAULT_METHOD, Request, RequestContent, RequestContentHandler};
pub use response::{Response, SinkKind};
pub use status::{AcceptancePolicy, StatusCodeRange};
