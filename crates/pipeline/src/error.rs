/// Everything that can end a job in `failed`.
///
/// The `Display` text is what clients see in the failed record's payload,
/// so it must stay free of internal detail beyond the collaborator's own
/// message.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The content collaborator reported an error or produced no artifact.
    #[error("Agent error: {0}")]
    ContentGeneration(String),

    /// The compiler could not be run or exited unsuccessfully.
    #[error("Compilation failed: {0}")]
    CompilationProcess(String),

    /// The compiler claimed success but the output file is not there.
    #[error("Compilation output missing: {0}")]
    CompilationOutputMissing(String),

    /// One of the storage sinks rejected its upload.
    #[error("Upload to {sink} failed: {message}")]
    Publication { sink: String, message: String },

    /// The job ran past its wall-clock budget.
    #[error("Job exceeded its execution budget of {secs}s")]
    Timeout { secs: u64 },
}

impl PipelineError {
    /// Stable machine-readable category, stored next to the message.
    pub fn reason(&self) -> &'static str {
        match self {
            Self::ContentGeneration(_) => "content_generation_error",
            Self::CompilationProcess(_) => "compilation_process_error",
            Self::CompilationOutputMissing(_) => "compilation_output_missing",
            Self::Publication { .. } => "publication_error",
            Self::Timeout { .. } => "timeout_error",
        }
    }
}
