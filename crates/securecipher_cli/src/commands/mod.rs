pub mod account;
pub mod key;
pub mod keypair;
pub mod transaction;
