//! Remote artwork service client
//!
//! The authoritative store is an opaque CRUD HTTP service. The engine
//! consumes it through the [`ArtworkApi`] trait so tests can substitute
//! a mock; [`HttpArtworkApi`] is the production binding.
//!
//! ## Operations
//!
//! - list (with response-cache hints), create, update, delete
//! - upload quota check, consulted before every create

mod error;
mod http;

pub use error::{ApiError, ApiResult, FieldError};
pub use http::HttpArtworkApi;

use async_trait::async_trait;

use crate::models::{ArtworkPatch, ArtworkRecord, NewArtwork, UploadQuota};

/// The remote artwork service, as consumed by the sync engine
#[async_trait]
pub trait ArtworkApi: Send + Sync {
    /// Fetch the authoritative artwork list for the current user.
    ///
    /// `use_cache` permits an opaque response-cache layer outside this
    /// core to answer; `force_refresh` must bypass any such cache.
    async fn list_artworks(
        &self,
        use_cache: bool,
        force_refresh: bool,
    ) -> ApiResult<Vec<ArtworkRecord>>;

    /// Create an artwork and return the server's record for it
    async fn create_artwork(&self, payload: &NewArtwork) -> ApiResult<ArtworkRecord>;

    /// Update an artwork and return the server's record for it
    async fn update_artwork(&self, id: i64, payload: &ArtworkPatch) -> ApiResult<ArtworkRecord>;

    /// Delete an artwork
    async fn delete_artwork(&self, id: i64) -> ApiResult<()>;

    /// Check whether another upload is currently allowed
    async fn check_upload_quota(&self) -> ApiResult<UploadQuota>;
}
