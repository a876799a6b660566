//! Atelier Core Library
//!
//! This crate provides the synchronization core for Atelier, an
//! art-journaling application: it keeps a locally cached gallery of
//! artwork records consistent with the authoritative remote service
//! under concurrent mutations, multiple invalidation signals, and
//! network failure.
//!
//! # Architecture
//!
//! - **Remote service**: the authoritative CRUD store, consumed through
//!   the [`ArtworkApi`] trait
//! - **Local cache**: an in-memory ordered collection owned by the
//!   [`SyncEngine`], mirrored to disk only as a paint-before-fetch cache
//! - **Event bus**: typed pub/sub carrying change, storage, and auth
//!   signals between components
//!
//! # Quick Start
//!
//! ```text
//! let api = Arc::new(HttpArtworkApi::new(&config.api_url).with_token(token));
//! let engine = SyncEngine::new(api, SideStore::new(config.data_dir.clone()), EventBus::new());
//!
//! engine.hydrate().await;          // fast first paint from the mirror
//! engine.refresh(true).await?;     // authoritative reconciliation
//! let artworks = engine.artworks().await;
//! ```
//!
//! # Modules
//!
//! - `sync`: the synchronization engine (main entry point)
//! - `api`: remote artwork service client and error taxonomy
//! - `models`: artwork records and mutation payloads
//! - `events`: typed in-process event bus
//! - `storage`: durable side-store (mirror, check-in date)
//! - `config`: application configuration

pub mod api;
pub mod config;
pub mod events;
pub mod models;
pub mod storage;
pub mod sync;

pub use api::{ApiError, ArtworkApi, HttpArtworkApi};
pub use config::Config;
pub use events::{AppEvent, EventBus, ARTWORK_STORAGE_KEY};
pub use models::{ArtworkPatch, ArtworkRecord, NewArtwork, UploadQuota};
pub use storage::SideStore;
pub use sync::{SyncEngine, SyncError, SyncOptions};
