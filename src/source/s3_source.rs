//! S3-backed object source.

use async_trait::async_trait;
use aws_sdk_s3::Client;

use crate::error::IoError;
use crate::io::S3RangeReader;

use super::ObjectSource;

/// Creates [`S3RangeReader`]s for objects in one bucket.
///
/// Keys are resolved under an optional prefix, so a store rooted at
/// `s3://bucket/rasters/` reads `dem/raster.json` from
/// `s3://bucket/rasters/dem/raster.json`.
#[derive(Clone)]
pub struct S3ObjectSource {
    client: Client,
    bucket: String,
    prefix: Option<String>,
}

impl S3ObjectSource {
    pub fn new(client: Client, bucket: String, prefix: Option<String>) -> Self {
        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());
        Self {
            client,
            bucket,
            prefix,
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Full object key for a store-relative key.
    pub fn object_key(&self, key: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}", prefix, key),
            None => key.to_string(),
        }
    }
}

#[async_trait]
impl ObjectSource for S3ObjectSource {
    type Reader = S3RangeReader;

    async fn create_reader(&self, key: &str) -> Result<Self::Reader, IoError> {
        S3RangeReader::new(self.client.clone(), self.bucket.clone(), self.object_key(key)).await
    }
}
