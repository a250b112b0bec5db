//! Adapters for the quorum client.

pub mod http;

pub use http::HttpTransport;
