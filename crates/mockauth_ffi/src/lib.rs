//! Flutter bridge crate for the mock authentication backend.
//!
//! All exported functions live in `api`; FRB codegen scans that module.

pub mod api;
