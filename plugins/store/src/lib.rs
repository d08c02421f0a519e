//! HTTP client for the Folio document store
//!
//! Speaks the store's editing API:
//!
//! - `GET /edit/v/{filename}` returns `{ content, listing }`
//! - `GET /edit/list` returns `{ listing }`
//! - `POST /edit/html` takes a multipart form with `filename`, `comment`
//!   and `body`
//! - `GET /edit/git/status/{filename}` returns a plain-text status word

use std::time::Duration;

use async_trait::async_trait;
use folio_core::{
    DocumentStore, DocumentVersion, FetchedDocument, FolioError, ListingEntry, Result,
    StoreConfig, Submission,
};
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct VersionsResponse {
    content: String,
    #[serde(default)]
    listing: Option<Vec<DocumentVersion>>,
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    #[serde(default)]
    listing: Option<Vec<ListingEntry>>,
}

#[derive(Debug, Deserialize)]
struct PublishAnswer {
    status: String,
}

/// [`DocumentStore`] backed by the store's HTTP API
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: Url,
}

impl HttpStore {
    /// Build a client from the store configuration
    pub fn new(config: &StoreConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim()).map_err(|e| {
            FolioError::config(format!("Invalid store URL '{}': {}", config.base_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(FolioError::config(format!(
                "Store URL cannot be used as an API base: {}",
                config.base_url
            )));
        }

        let mut builder = Client::builder().user_agent(config.user_agent.clone());
        if let Some(secs) = config.request_timeout_secs {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let client = builder
            .build()
            .map_err(|e| FolioError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// Convenience constructor with default settings for `base_url`
    pub fn with_base_url(base_url: &str) -> Result<Self> {
        Self::new(&StoreConfig {
            base_url: base_url.to_string(),
            ..StoreConfig::default()
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Revision-control status of a document, e.g. `Current` or `WtModified`
    pub async fn status(&self, filename: &str) -> Result<String> {
        let url = self.document_url(&["edit", "git", "status"], filename)?;
        let body = self.get_text(url).await?;
        Ok(body.trim().to_string())
    }

    fn api_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url.path_segments_mut().map_err(|_| {
                FolioError::config("Store URL cannot be used as an API base")
            })?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }

    fn document_url(&self, prefix: &[&str], filename: &str) -> Result<Url> {
        let filename = folio_core::normalize_filename(filename)?;
        let mut segments: Vec<&str> = prefix.to_vec();
        segments.extend(filename.split('/'));
        self.api_url(&segments)
    }

    async fn get_text(&self, url: Url) -> Result<String> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url, e))?;

        if !status.is_success() {
            return Err(FolioError::request_failed(
                status.as_u16(),
                error_message_for_response(status, &body),
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl DocumentStore for HttpStore {
    async fn fetch(&self, filename: &str) -> Result<FetchedDocument> {
        let normalized = folio_core::normalize_filename(filename)?;
        let url = self.document_url(&["edit", "v"], &normalized)?;
        let body = self.get_text(url).await?;

        let parsed: VersionsResponse = serde_json::from_str(&body).map_err(|e| {
            FolioError::malformed(format!("Document {} response: {}", normalized, e))
        })?;

        Ok(FetchedDocument {
            filename: normalized,
            content: parsed.content,
            versions: parsed.listing.unwrap_or_default(),
        })
    }

    async fn list(&self) -> Result<Vec<ListingEntry>> {
        let url = self.api_url(&["edit", "list"])?;
        let body = self.get_text(url).await?;

        let parsed: ListingResponse = serde_json::from_str(&body)
            .map_err(|e| FolioError::malformed(format!("Listing response: {}", e)))?;
        Ok(parsed.listing.unwrap_or_default())
    }

    async fn publish(&self, submission: &Submission) -> Result<()> {
        let url = self.api_url(&["edit", "html"])?;
        let form = reqwest::multipart::Form::new()
            .text("filename", submission.filename.clone())
            .text("comment", submission.comment.clone())
            .text("body", submission.body.clone());

        tracing::debug!(
            "POST {} ({} bytes of {})",
            url,
            submission.body.len(),
            submission.filename
        );
        let response = self
            .client
            .post(url.clone())
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| transport_error(&url, e))?;

        if !status.is_success() {
            return Err(FolioError::write_rejected(format!(
                "{} ({})",
                error_message_for_response(status, &body),
                status.as_u16()
            )));
        }

        match serde_json::from_str::<PublishAnswer>(body.trim()) {
            Ok(answer) if answer.status == "failed" => Err(FolioError::write_rejected(format!(
                "Store failed to write {}",
                submission.filename
            ))),
            Ok(_) => Ok(()),
            Err(_) => {
                tracing::debug!("Ignoring publish response body: {:?}", body.trim());
                Ok(())
            }
        }
    }
}

fn transport_error(url: &Url, error: reqwest::Error) -> FolioError {
    if error.is_timeout() {
        FolioError::network(format!("Request to {} timed out", url))
    } else {
        FolioError::network(format!("Request to {} failed: {}", url, error))
    }
}

fn error_message_for_response(status: StatusCode, body: &str) -> String {
    let body = body.trim();
    if body.is_empty() {
        return status
            .canonical_reason()
            .unwrap_or("Request failed")
            .to_string();
    }
    body.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_appends_to_base_path() {
        let store = HttpStore::with_base_url("http://example.com/site/").unwrap();
        let url = store.api_url(&["edit", "list"]).unwrap();
        assert_eq!(url.as_str(), "http://example.com/site/edit/list");
    }

    #[test]
    fn test_document_url_keeps_directories_and_encodes_names() {
        let store = HttpStore::with_base_url("http://example.com").unwrap();
        let url = store
            .document_url(&["edit", "v"], "/blog/my post.html")
            .unwrap();
        assert_eq!(url.as_str(), "http://example.com/edit/v/blog/my%20post.html");
    }

    #[test]
    fn test_document_url_rejects_escapes() {
        let store = HttpStore::with_base_url("http://example.com").unwrap();
        assert!(matches!(
            store.document_url(&["edit", "v"], "../secret"),
            Err(FolioError::InvalidFilename(_))
        ));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(matches!(
            HttpStore::with_base_url("not a url"),
            Err(FolioError::Config(_))
        ));
        assert!(matches!(
            HttpStore::with_base_url("mailto:someone@example.com"),
            Err(FolioError::Config(_))
        ));
    }

    #[test]
    fn test_error_message_for_empty_body() {
        assert_eq!(
            error_message_for_response(StatusCode::NOT_FOUND, "  "),
            "Not Found"
        );
        assert_eq!(
            error_message_for_response(StatusCode::BAD_REQUEST, "Error trying to process upload\n"),
            "Error trying to process upload"
        );
    }
}
