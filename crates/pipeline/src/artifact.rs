use std::path::{Path, PathBuf};

/// Handle to a file produced or consumed by a stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    path: PathBuf,
}

impl Artifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// File extension including the leading dot (`".pdf"`), or empty.
    pub fn dotted_extension(&self) -> String {
        self.path
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default()
    }

    pub fn display(&self) -> String {
        self.path.display().to_string()
    }
}
