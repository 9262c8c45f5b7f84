//! Core functionality for SecureCipher co-signed transactions
//! Contains the P-384 coordinate codec, key validation, ECDSA/SHA-384 verification,
//! server key issuance and the transaction authorizer that ties them together.

pub mod traits;
pub mod types;
pub mod codec;
pub mod impls;
pub mod issuer;
pub mod authorizer;


pub use traits::*;
pub use types::*;
pub use impls::*;
pub use issuer::{export_interchange, issue_keypair, issue_keypair_with, Keypair};
pub use authorizer::{
    AuthorizationOutcome, AuthorizationState, PendingTransaction, Rejection, RejectionReason,
    TransactionAuthorizer,
};
