//! Idempotency primitives for exactly-once purchase semantics.
//!
//! - [`ClientKey`]: validated UUID supplied by the client per purchase
//!   attempt.
//! - [`PurchaseKey`]: durable ledger key `buy:{domain}:{client-uuid}`.
//! - [`RequestDigest`]: SHA-256 over the canonicalized purchase parameters,
//!   used to detect key reuse with different intent.
//! - [`IdemRecord`]: stored row linking a key to its digest and the response
//!   body that must be replayed verbatim.
//! - [`IdempotencyConfig`]: TTL configuration for stored responses.
//!
//! # Digest canonicalization
//!
//! Semantically equal requests must hash identically regardless of key order
//! or whitespace, so the digest input is canonicalized first:
//!
//! 1. JSON object keys are sorted recursively.
//! 2. The value is serialized compactly (no whitespace).
//! 3. SHA-256 is computed over the resulting bytes.

mod config;
mod digest;
mod key;
mod record;

pub use config::{IDEMPOTENCY_TTL_SECS_ENV, IdempotencyConfig, IdempotencyEnv, ProcessEnv};
pub use digest::{DigestError, RequestDigest, canonicalize_and_hash};
pub use key::{ClientKey, ClientKeyValidationError, PurchaseKey};
pub use record::{BeginOutcome, IdemRecord};
