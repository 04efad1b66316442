use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SymbolicError {
    #[error("Parse error at token {position}: {message}")]
    Parse { message: String, position: usize },
    #[error("Unknown symbol: {0}")]
    UnknownSymbol(String),
    #[error("Expression still depends on time through {0}")]
    TimeDependent(String),
    #[error("Evaluation stack underflow")]
    StackUnderflow,
    #[error("Expected {expected} values, got {got}")]
    ArityMismatch { expected: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, SymbolicError>;

impl SymbolicError {
    pub(crate) fn parse(message: impl Into<String>, position: usize) -> Self {
        Self::Parse {
            message: message.into(),
            position,
        }
    }
}
