//! Storage abstraction for treevite.
//!
//! Backend crates (e.g., treevite-store-sqlite) implement the [`Store`] trait
//! so treevite-core doesn't depend on any specific database engine or schema
//! details. The invitation tree lives entirely in the backing store: waves,
//! their invite codes, the participants those codes admitted, and each
//! participant's reusable login credential.

use thiserror::Error;

mod store;
mod types;

pub use store::Store;
pub use types::*;

/// Uniform error type for all storage backends.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("not found")]
    NotFound,
    #[error("already exists")]
    AlreadyExists,
    #[error("conflict")]
    Conflict,
    #[error("backend error: {0}")]
    Backend(String),
}
