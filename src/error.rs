use thiserror::Error;

/// Failure classes of an export run. Each maps to its own process exit code.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("{0:#}")]
    Config(eyre::Report),
    #[error("{0:#}")]
    Archive(eyre::Report),
    #[error("{0:#}")]
    Parse(eyre::Report),
    /// Some conversations could not be traversed and were left out.
    #[error("{skipped} conversation(s) skipped because their message tree is broken")]
    Traversal { skipped: usize },
    #[error("{0:#}")]
    Output(eyre::Report),
    /// Some pages could not be written and were left out of the index.
    #[error("{failed} page(s) could not be written")]
    PartialOutput { failed: usize },
}

impl ExportError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(_) => 7,
            Self::Archive(_) => 3,
            Self::Parse(_) => 4,
            Self::Traversal { .. } => 5,
            Self::Output(_) | Self::PartialOutput { .. } => 6,
        }
    }
}
