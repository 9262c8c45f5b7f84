//! Persistence for co-signed transactions and registered users using fjall

pub mod persistence;
pub mod users;

pub use persistence::{Database, StoredTransaction, TransactionStore, STATUS_AUTHORIZED};
pub use users::{virtual_account_id, NewUser, RegisteredUser, UserRegistry};

use thiserror::Error;

/// Error types for store operations
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    Storage(#[from] fjall::Error),
    #[error("Corrupt record: {0}")]
    Corrupt(#[from] serde_json::Error),
    #[error("Transaction {0} already exists")]
    Duplicate(String),
    #[error("Transaction {0} does not carry valid signatures")]
    InvalidSignatures(String),
    #[error("Unknown user: {0}")]
    UnknownUser(String),
    #[error("Client key is not the key registered for {0}")]
    KeyMismatch(String),
    #[error("A user with this {0} is already registered")]
    DuplicateUser(&'static str),
    #[error("Invalid phone number")]
    InvalidPhone,
    #[error("Invalid user field: {0}")]
    InvalidField(&'static str),
    #[error("Invalid public key")]
    InvalidPublicKey,
    #[error("Clock error")]
    Clock,
}

pub(crate) fn unix_now() -> Result<u64, StoreError> {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .map_err(|_| StoreError::Clock)
}
