//! Immutable request/response values passed between pipeline stages.

pub mod headers;
pub mod request;
pub mod response;

pub use headers::{Headers, RawHeaders};
pub use request::{InternalRequest, RequestError};
pub use response::InternalResponse;
