//! Boundary mappers between axum's wire types and the internal model.

pub mod request;
pub mod response;

pub use request::{IngressError, RequestMapper};
pub use response::{Emitter, ResponseMapper};
