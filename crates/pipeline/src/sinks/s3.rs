//! S3 (or S3-compatible) artifact sink.
//!
//! Uploads with `PutObject` and answers with a presigned `GetObject` URL, so
//! the bucket itself can stay private.

use std::time::Duration;

use async_trait::async_trait;
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;

use super::object_key;
use crate::artifact::Artifact;
use crate::publish::{content_type_for, ArtifactSink, SinkError};

/// Default lifetime of the presigned download URL (1 hour).
pub const DEFAULT_PRESIGN_EXPIRY: Duration = Duration::from_secs(3600);

pub struct S3Sink {
    name: String,
    client: aws_sdk_s3::Client,
    bucket: String,
    presign_expiry: Duration,
}

impl S3Sink {
    pub fn new(name: impl Into<String>, client: aws_sdk_s3::Client, bucket: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            client,
            bucket: bucket.into(),
            presign_expiry: DEFAULT_PRESIGN_EXPIRY,
        }
    }

    pub fn with_presign_expiry(mut self, expiry: Duration) -> Self {
        self.presign_expiry = expiry;
        self
    }
}

#[async_trait]
impl ArtifactSink for S3Sink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, artifact: &Artifact, folder: &str) -> Result<String, SinkError> {
        if !artifact.path().is_file() {
            return Err(SinkError::NotFound(artifact.display()));
        }

        let key = object_key(folder, &artifact.dotted_extension());
        let body = ByteStream::from(tokio::fs::read(artifact.path()).await?);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(content_type_for(artifact))
            .body(body)
            .send()
            .await
            .map_err(|e| SinkError::Backend(format!("PutObject {key}: {}", DisplayErrorContext(&e))))?;

        let presigning = PresigningConfig::expires_in(self.presign_expiry)
            .map_err(|e| SinkError::Backend(format!("invalid presign expiry: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .presigned(presigning)
            .await
            .map_err(|e| SinkError::Backend(format!("presign {key}: {}", DisplayErrorContext(&e))))?;

        tracing::debug!(sink = %self.name, bucket = %self.bucket, key = %key, "Artifact uploaded");
        Ok(presigned.uri().to_string())
    }
}
