//! Storage sink implementations.

pub mod local;
pub mod s3;

pub use local::LocalSink;
pub use s3::S3Sink;

/// Object name for an upload: `{folder}/{uuid}{ext}`, unique per call.
pub(crate) fn object_key(folder: &str, extension: &str) -> String {
    let folder = folder.trim_matches('/');
    let name = format!("{}{extension}", uuid::Uuid::new_v4());
    if folder.is_empty() {
        name
    } else {
        format!("{folder}/{name}")
    }
}
