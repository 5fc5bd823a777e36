use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Decode request rejected for {source_id}: {reason}")]
    DecodeRejected { source_id: String, reason: String },
}

pub type Result<T> = std::result::Result<T, BridgeError>;
