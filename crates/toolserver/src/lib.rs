//! Best-effort tool server client for Palaver.
//!
//! A tool server may enhance a draft response; every call is bounded by a
//! timeout and the turn pipeline tolerates any failure from here.

pub mod client;
pub mod http;
pub mod socket;

pub use client::ToolAugmentationClient;
pub use http::HttpTransport;
pub use socket::SocketRpcTransport;
