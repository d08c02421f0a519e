//! Interface to the remote document store

use async_trait::async_trait;

use crate::document::{FetchedDocument, ListingEntry, Submission};
use crate::error::Result;

/// Remote service persisting named documents.
///
/// Implementations map transport failures to `FolioError::Network`,
/// unparsable payloads to `FolioError::MalformedResponse` and refused
/// writes to `FolioError::WriteRejected`.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document's content together with its version listing
    async fn fetch(&self, filename: &str) -> Result<FetchedDocument>;

    /// Fetch the full document listing
    async fn list(&self) -> Result<Vec<ListingEntry>>;

    /// Write a document in a single request
    async fn publish(&self, submission: &Submission) -> Result<()>;
}
