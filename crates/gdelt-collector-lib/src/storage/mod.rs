mod s3;

pub use s3::S3ObjectStore;

use crate::error::CollectorError;
use async_trait::async_trait;
use std::path::Path;

/// Object storage for extracted archive members, one object per member,
/// keyed by member basename in a single bucket.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Uploads a local file and returns its public URL.
    async fn upload(&self, object_name: &str, local_path: &Path)
    -> Result<String, CollectorError>;

    async fn delete(&self, object_name: &str) -> Result<(), CollectorError>;

    fn url(&self, object_name: &str) -> String;
}

/// Public URL of an object: `{endpoint}/{bucket}/{objectName}` with a single
/// slash separator.
pub fn object_url(endpoint: &str, bucket: &str, object_name: &str) -> String {
    format!("{}/{}/{}", endpoint.trim_end_matches('/'), bucket, object_name)
}

/// Content type by file extension, defaulting to `application/octet-stream`.
pub fn content_type_for(object_name: &str) -> &'static str {
    let extension = object_name.rsplit_once('.').map(|(_, ext)| ext);
    match extension {
        Some("csv") | Some("CSV") => "text/csv",
        Some("json") => "application/json",
        Some("txt") => "text/plain",
        Some("zip") => "application/zip",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_url_trims_trailing_endpoint_slash() {
        assert_eq!(
            object_url("http://minio:9000/", "gdelt", "a.csv"),
            "http://minio:9000/gdelt/a.csv"
        );
        assert_eq!(
            object_url("http://minio:9000", "gdelt", "a.csv"),
            "http://minio:9000/gdelt/a.csv"
        );
    }

    #[test]
    fn test_content_type_detection() {
        assert_eq!(content_type_for("data.csv"), "text/csv");
        assert_eq!(content_type_for("20250323151500.translation.export.CSV"), "text/csv");
        assert_eq!(content_type_for("payload.json"), "application/json");
        assert_eq!(content_type_for("archive.zip"), "application/zip");
        assert_eq!(content_type_for("mystery"), "application/octet-stream");
        assert_eq!(content_type_for("mystery.bin"), "application/octet-stream");
    }
}
