use derive_more::From;
use orion_error::{ErrorCode, StructError, UvsReason};

#[derive(Debug, Clone, PartialEq, thiserror::Error, From)]
pub enum GraphReason {
    #[error("invalid state")]
    InvalidState,
    #[error("invalid argument")]
    InvalidArgument,
    #[error("schema mismatch")]
    SchemaMismatch,
    #[error("already connected")]
    AlreadyConnected,
    #[error("duplicate name")]
    DuplicateName,
    #[error("compile check failure")]
    CheckFailure,
    #[error("{0}")]
    Uvs(UvsReason),
}

impl ErrorCode for GraphReason {
    fn error_code(&self) -> i32 {
        match self {
            Self::InvalidState => 1001,
            Self::InvalidArgument => 1002,
            Self::SchemaMismatch => 1003,
            Self::AlreadyConnected => 1004,
            Self::DuplicateName => 1005,
            Self::CheckFailure => 1006,
            Self::Uvs(u) => u.error_code(),
        }
    }
}

pub type GraphError = StructError<GraphReason>;
pub type GraphResult<T> = Result<T, GraphError>;
