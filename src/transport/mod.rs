//! Transport layer: per-operation request context and the HTTP client

pub mod context;
pub mod http;

pub use context::{RequestContext, dispatch, user_agent};
pub use http::HttpTransport;
