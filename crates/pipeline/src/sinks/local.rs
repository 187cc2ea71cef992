use std::path::PathBuf;

use async_trait::async_trait;

use super::object_key;
use crate::artifact::Artifact;
use crate::publish::{ArtifactSink, SinkError};

/// Copies artifacts into a directory served at `base_url`.
pub struct LocalSink {
    name: String,
    root: PathBuf,
    base_url: String,
}

impl LocalSink {
    pub fn new(name: impl Into<String>, root: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            root: root.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl ArtifactSink for LocalSink {
    fn name(&self) -> &str {
        &self.name
    }

    async fn upload(&self, artifact: &Artifact, folder: &str) -> Result<String, SinkError> {
        if !artifact.path().is_file() {
            return Err(SinkError::NotFound(artifact.display()));
        }

        let key = object_key(folder, &artifact.dotted_extension());
        let destination = self.root.join(&key);
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(artifact.path(), &destination).await?;

        tracing::debug!(sink = %self.name, key = %key, "Artifact stored");
        Ok(format!("{}/{key}", self.base_url))
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[tokio::test]
    async fn copies_file_and_returns_url() {
        let src_dir = tempfile::tempdir().unwrap();
        let root = tempfile::tempdir().unwrap();
        let src = src_dir.path().join("resume.pdf");
        std::fs::write(&src, b"%PDF-1.5").unwrap();

        let sink = LocalSink::new("local", root.path(), "http://files.local/");
        let url = sink.upload(&Artifact::new(&src), "pdf").await.unwrap();

        let key = url.strip_prefix("http://files.local/").unwrap();
        assert!(key.starts_with("pdf/") && key.ends_with(".pdf"));
        assert_eq!(std::fs::read(root.path().join(key)).unwrap(), b"%PDF-1.5");
    }

    #[tokio::test]
    async fn missing_artifact_is_not_found() {
        let root = tempfile::tempdir().unwrap();
        let sink = LocalSink::new("local", root.path(), "http://files.local");
        let result = sink.upload(&Artifact::new("/nope/resume.pdf"), "pdf").await;
        assert_matches!(result, Err(SinkError::NotFound(_)));
    }
}
