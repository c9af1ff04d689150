//! Backend forwarding and request correlation.

pub mod forwarder;
pub mod request_id;

pub use forwarder::{Forwarder, HttpForwarder};
