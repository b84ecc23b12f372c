//! Transactional domain-registration gateway.
//!
//! The crate is laid out hexagonally: `domain` holds transport-free types,
//! ports, and services; `outbound` holds the Diesel persistence adapters and
//! the registrar HTTP drivers; `inbound` holds the actix-web surface. The
//! `server` module wires configuration into a running listener.

#[cfg(debug_assertions)]
pub mod doc;
pub mod domain;
pub mod inbound;
pub mod middleware;
pub mod outbound;
pub mod server;
pub mod test_support;

pub use middleware::trace::Trace;
