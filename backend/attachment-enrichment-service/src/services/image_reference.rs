//! Attachment path to provider image reference
use crate::models::ImageReference;
use crate::storage::{FileSource, StorageError};
use once_cell::sync::Lazy;
use regex::Regex;

static S3_URI: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^s3://(?P<bucket>[^/]+)/(?P<key>.*)$").expect("valid regex"));

/// Split `s3://bucket/key` into bucket and key
pub fn parse_s3_uri(path: &str) -> Option<(String, String)> {
    let captures = S3_URI.captures(path)?;
    Some((
        captures["bucket"].to_string(),
        captures["key"].to_string(),
    ))
}

/// Remote objects are referenced in place, anything else is read inline
pub async fn resolve_image_reference(
    path: &str,
    files: &dyn FileSource,
) -> Result<ImageReference, StorageError> {
    if let Some((bucket, name)) = parse_s3_uri(path) {
        return Ok(ImageReference::S3Object { bucket, name });
    }

    let bytes = files.read_all(path).await?;
    Ok(ImageReference::Bytes(bytes))
}
