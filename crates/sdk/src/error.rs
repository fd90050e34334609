//! SDK Error Types

use jsonrpsee::core::ClientError;
use thiserror::Error;
use verba_api_rpc::error::code;

pub type Result<T> = std::result::Result<T, SdkError>;

#[derive(Debug, Error)]
pub enum SdkError {
    /// Daemon unreachable or the connection dropped
    #[error("Connection error: {0}")]
    Connection(String),

    /// The daemon answered with a JSON-RPC error
    #[error("RPC error ({code}): {message}")]
    Rpc { code: i32, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("{0}")]
    Other(String),
}

impl SdkError {
    /// Server-side error code, if the call reached the daemon
    pub fn code(&self) -> Option<i32> {
        match self {
            SdkError::Rpc { code, .. } => Some(*code),
            _ => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.code() == Some(code::NOT_FOUND)
    }

    /// Pool was full; the job exists but is FAILED with kind REJECTED
    pub fn is_rejected(&self) -> bool {
        self.code() == Some(code::REJECTED)
    }

    pub fn is_validation(&self) -> bool {
        self.code() == Some(code::VALIDATION_ERROR)
    }
}

impl From<ClientError> for SdkError {
    fn from(e: ClientError) -> Self {
        match e {
            ClientError::Call(call) => SdkError::Rpc {
                code: call.code(),
                message: call.message().to_string(),
            },
            ClientError::Transport(e) => SdkError::Transport(e.to_string()),
            ClientError::RestartNeeded(_) => {
                SdkError::Connection("Connection to daemon lost".to_string())
            }
            ClientError::ParseError(e) => SdkError::Serialization(e),
            other => SdkError::Other(other.to_string()),
        }
    }
}
