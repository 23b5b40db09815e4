use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("model failed verification: {0}")]
    InvalidFlatbuffer(#[from] flatbuffers::InvalidFlatbuffer),
    #[error("model does not carry the '{expected}' file identifier")]
    Identifier { expected: &'static str },
    #[error("unsupported schema version {found}, expected {expected}")]
    SchemaVersion { found: u32, expected: u32 },
    #[error("malformed model: {0}")]
    Malformed(String),
    #[error("operator {operator}: builtin code {code} is not supported")]
    UnsupportedOperator { operator: usize, code: i32 },
    #[error("{what} is not supported: {reason}")]
    Unsupported { what: String, reason: String },
    #[error("{op}: {message}")]
    Prepare { op: &'static str, message: String },
    #[error("failed to allocate {bytes} bytes for tensor {tensor}")]
    Allocation { tensor: usize, bytes: usize },
    #[error("tensors must be allocated before invoke")]
    NotAllocated,
    #[error("tensor {0} buffer lock poisoned")]
    Poisoned(usize),
}

impl EngineError {
    pub(crate) fn prepare(op: &'static str, message: impl Into<String>) -> Self {
        EngineError::Prepare {
            op,
            message: message.into(),
        }
    }

    pub(crate) fn malformed(message: impl Into<String>) -> Self {
        EngineError::Malformed(message.into())
    }

    pub(crate) fn unsupported(what: impl Into<String>, reason: impl Into<String>) -> Self {
        EngineError::Unsupported {
            what: what.into(),
            reason: reason.into(),
        }
    }

    /// Allocation failures are resource problems rather than model problems.
    pub fn is_allocation(&self) -> bool {
        matches!(self, EngineError::Allocation { .. })
    }
}

pub type EngineResult<T> = Result<T, EngineError>;
