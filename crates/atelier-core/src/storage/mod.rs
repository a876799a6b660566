//! Durable client-side state
//!
//! A small key-per-file side-store under the data directory. It holds
//! the last successfully reconciled artwork list (a paint-before-fetch
//! cache, never authoritative after first load) and the last check-in
//! date.

mod mirror;

pub use mirror::SideStore;
