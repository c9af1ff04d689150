//! Ingress admission: path allowlist and the middleware that enforces it.

pub mod admission;
pub mod trie;

pub use admission::{admission_guard, AdmissionGuard};
