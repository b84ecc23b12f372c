//! Registrar driver adapters.
//!
//! Two concrete drivers implement the `RegistrarDriver` port: Porkbun
//! (JSON over POST) and Namecheap (XML over GET). Both share the retry
//! policy and the per-TLD pricing cache.

mod namecheap;
mod porkbun;
mod pricing_cache;
mod retry;

pub use namecheap::{
    DRY_RUN_ORDER_PREFIX as NAMECHEAP_DRY_RUN_ORDER_PREFIX, NamecheapCredentials, NamecheapDriver,
};
pub use porkbun::{
    DRY_RUN_ORDER_PREFIX as PORKBUN_DRY_RUN_ORDER_PREFIX, PorkbunCredentials, PorkbunDriver,
};
