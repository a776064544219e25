use crate::domain::account::{Credits, UserId};
use crate::domain::payment::SessionRef;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum UpscaleError {
    #[error("account {0} not found")]
    AccountNotFound(UserId),
    #[error("insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        required: Credits,
        available: Credits,
    },
    #[error("invalid tier: {0}")]
    InvalidTier(u8),
    #[error("compute failed: {0}")]
    ComputeFailed(String),
    #[error("payment session {0} not completed")]
    PaymentNotCompleted(SessionRef),
    #[error("invalid product configuration: {0}")]
    InvalidProductConfiguration(String),
    #[error("payment provider unavailable: {0}")]
    ProviderUnavailable(String),
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("malformed operation: {0}")]
    MalformedOperation(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, UpscaleError>;
