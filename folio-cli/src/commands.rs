//! One-shot commands that talk to the store without an edit session

use anyhow::Context;
use folio_core::{
    normalize_filename, Config, ConfigMetadata, DocumentStore, Submission, ValidationStatus,
};
use folio_store::HttpStore;
use std::path::Path;
use tokio::io::AsyncReadExt;
use tracing::info;

use crate::surface::{format_history, format_listing};

pub async fn list(store: &HttpStore) -> anyhow::Result<()> {
    let entries = store.list().await?;
    print!("{}", format_listing(&entries));
    Ok(())
}

/// Print the stored markup of `name`
pub async fn show(store: &HttpStore, name: &str) -> anyhow::Result<()> {
    let document = store.fetch(name).await?;
    print!("{}", document.content);
    if !document.content.ends_with('\n') {
        println!();
    }
    Ok(())
}

pub async fn history(store: &HttpStore, name: &str) -> anyhow::Result<()> {
    let document = store.fetch(name).await?;
    print!("{}", format_history(&document.filename, &document.versions));
    Ok(())
}

pub async fn status(store: &HttpStore, name: &str) -> anyhow::Result<()> {
    let status = store.status(name).await?;
    println!("{}: {}", normalize_filename(name)?, status);
    Ok(())
}

/// Read a document body from `file`, or from stdin when no file is given
pub async fn read_body(file: Option<&Path>) -> anyhow::Result<String> {
    match file {
        Some(path) => tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display())),
        None => {
            let mut body = String::new();
            tokio::io::stdin()
                .read_to_string(&mut body)
                .await
                .context("Failed to read document body from stdin")?;
            Ok(body)
        }
    }
}

/// Build the submission sent by `folio publish`
pub fn submission(name: &str, comment: Option<&str>, body: String) -> anyhow::Result<Submission> {
    Ok(Submission {
        filename: normalize_filename(name)?,
        comment: comment.unwrap_or_default().to_string(),
        body,
    })
}

pub async fn publish(
    store: &HttpStore,
    name: &str,
    file: Option<&Path>,
    comment: Option<&str>,
) -> anyhow::Result<()> {
    let body = read_body(file).await?;
    let submission = submission(name, comment, body)?;
    info!(
        "Publishing {} ({} bytes)",
        submission.filename,
        submission.body.len()
    );
    store.publish(&submission).await?;
    println!("Published {}", submission.filename);
    Ok(())
}

/// Print the effective configuration and every validation finding.
///
/// Returns false when the configuration has errors.
pub fn validate_config(config: &Config, metadata: &ConfigMetadata) -> anyhow::Result<bool> {
    if metadata.source_files.is_empty() {
        println!("Configuration: defaults (no file found)");
    } else {
        for file in &metadata.source_files {
            println!("Configuration file: {}", file.display());
        }
    }

    println!("\nEffective configuration:");
    println!("{}", serde_json::to_string_pretty(config)?);

    for issue in &metadata.validation.errors {
        println!("error: {}: {}", issue.field_path, issue.message);
    }
    for issue in &metadata.validation.warnings {
        println!("warning: {}: {}", issue.field_path, issue.message);
    }

    let valid = metadata.validation_status != ValidationStatus::Invalid;
    match metadata.validation_status {
        ValidationStatus::Valid => println!("\nConfiguration is valid"),
        ValidationStatus::ValidWithWarnings => println!("\nConfiguration is valid with warnings"),
        ValidationStatus::Invalid => println!("\nConfiguration is invalid"),
    }
    Ok(valid)
}
