//! Registry protocol: the client trait the pusher consumes and its
//! Docker Registry HTTP API v2 implementation.

pub mod client;
pub mod http;

pub use client::Client;
pub use http::HttpClient;
