//! Shared vocabulary between the WAL and its two external collaborators:
//! the request producer (query engine) and the apply stage (storage
//! engine).
//!
//! This crate defines the `Request` contract the WAL treats as an opaque,
//! byte-serializable payload with one mutable field it owns: `request_num`.
//! Everything else about a request's shape is the caller's business.

#![warn(missing_docs)]

mod error;
mod request;

pub use error::WalCoreError;
pub use request::Request;
