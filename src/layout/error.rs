#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayoutError {
    #[error("malformed record at index {index}: {reason}")]
    MalformedRecord { index: usize, reason: String },
    #[error("pedigree graph is disconnected: {reason}")]
    DisconnectedGraph { reason: String },
    #[error("no route for edge {edge} after {attempts} attempts")]
    UnroutableGraph { edge: String, attempts: usize },
    #[error("layout cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, LayoutError>;

impl LayoutError {
    pub(crate) fn malformed(index: usize, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            index,
            reason: reason.into(),
        }
    }

    pub(crate) fn disconnected(reason: impl Into<String>) -> Self {
        Self::DisconnectedGraph {
            reason: reason.into(),
        }
    }
}
