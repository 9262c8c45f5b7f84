use crate::read_json_arg;
use anyhow::Result;
use clap::Args;
use securecipher_core::{EncodedPublicKey, KeyValidator, P384KeyValidator};

#[derive(Args, Debug)]
#[command(about = "Check that a client public key is a valid P-384 point")]
pub struct ValidateKeyArgs {
    /// Public key JSON, inline or as a file path
    pub public_key: String,
}

pub fn handle_validate_key_command(args: ValidateKeyArgs) -> Result<String> {
    let json = read_json_arg(&args.public_key)?;
    let valid = match EncodedPublicKey::from_json(&json) {
        Ok(key) => P384KeyValidator.validate(&key),
        Err(e) => {
            tracing::debug!(error = %e, "public key is not valid JSON");
            false
        }
    };
    Ok(if valid { "valid" } else { "invalid" }.to_string())
}
