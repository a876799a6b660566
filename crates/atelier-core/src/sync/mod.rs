//! Artwork synchronization engine
//!
//! Keeps the local artwork cache consistent with the authoritative
//! remote service under concurrent mutations and multiple refresh
//! triggers.
//!
//! ## Protocol
//!
//! 1. Passive triggers (storage events, auth changes, untagged change
//!    notifications) funnel into a debounced, guarded refresh
//! 2. Mutations call the remote service, apply an optimistic local
//!    update, then force a reconciliation
//! 3. Reconciliation replaces the cache wholesale with the server list
//! 4. Change notifications are republished tagged `skip_refresh` so
//!    listeners never loop back into another refresh
//!
//! ## Usage
//!
//! ```ignore
//! let engine = SyncEngine::new(api, mirror, bus);
//! engine.spawn_event_loop();
//! engine.refresh(true).await?;
//! ```

mod engine;
mod error;
mod state;

pub use engine::{SyncEngine, SyncOptions};
pub use error::SyncError;
pub use state::{AuthState, RefreshPhase};
