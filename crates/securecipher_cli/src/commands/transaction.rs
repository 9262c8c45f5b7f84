use crate::config::AppConfig;
use crate::read_json_arg;
use anyhow::{Context, Result};
use clap::Args;
use securecipher_core::{
    EcdsaP384Verifier, EncodedPublicKey, EncodedSignature, Keypair, PendingTransaction,
    SignatureVerifier, TransactionAuthorizer, TransactionFields, TransactionPayload,
};
use securecipher_store::Database;
use std::fs;
use std::path::Path;

/// Fields that make up the signed payload
#[derive(Args, Debug, Clone)]
pub struct PayloadArgs {
    /// Amount with up to two decimal places
    #[arg(long)]
    pub amount: String,
    /// Recipient virtual account
    #[arg(long)]
    pub recipient: String,
    /// Optional client reference
    #[arg(long)]
    pub reference: Option<String>,
}

impl PayloadArgs {
    pub fn to_payload(&self) -> Result<TransactionPayload> {
        let mut fields = TransactionFields::new(self.amount.parse()?, self.recipient.clone());
        if let Some(reference) = &self.reference {
            fields = fields.with_reference(reference.clone());
        }
        Ok(TransactionPayload::from_fields(&fields)?)
    }
}

#[derive(Args, Debug)]
#[command(about = "Sign a transaction payload (reference client)")]
pub struct SignArgs {
    /// PKCS#8 PEM private key
    #[arg(long)]
    pub key: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
#[command(about = "Verify a client signature over a transaction payload")]
pub struct VerifyArgs {
    /// Public key JSON, inline or as a file path
    #[arg(long)]
    pub key: String,
    /// Base64 DER signature
    #[arg(long)]
    pub signature: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

#[derive(Args, Debug)]
#[command(about = "Verify the client signature, counter-sign and store the transaction")]
pub struct AuthorizeArgs {
    /// Registered sender; the signature is checked against their registered key
    #[arg(long)]
    pub username: String,
    /// Client base64 DER signature
    #[arg(long)]
    pub signature: String,
    #[command(flatten)]
    pub payload: PayloadArgs,
}

pub fn load_keypair(path: &Path) -> Result<Keypair> {
    let pem = fs::read_to_string(path)
        .with_context(|| format!("Failed to read key {}", path.display()))?;
    Ok(Keypair::from_pkcs8_pem(&pem)?)
}

pub fn handle_sign_command(args: SignArgs) -> Result<String> {
    let keypair = load_keypair(Path::new(&args.key))?;
    let payload = args.payload.to_payload()?;
    let signature = keypair.sign(payload.as_bytes())?;
    Ok(signature.to_string())
}

pub fn handle_verify_command(args: VerifyArgs) -> Result<String> {
    let payload = args.payload.to_payload()?;
    let valid = match EncodedPublicKey::from_json(&read_json_arg(&args.key)?) {
        Ok(key) => EcdsaP384Verifier.verify(
            &EncodedSignature::new(args.signature),
            payload.as_bytes(),
            &key,
        ),
        Err(e) => {
            tracing::debug!(error = %e, "public key is not valid JSON");
            false
        }
    };
    Ok(if valid { "valid" } else { "invalid" }.to_string())
}

pub fn handle_authorize_command(args: AuthorizeArgs, config: &AppConfig) -> Result<String> {
    let payload = args.payload.to_payload()?;
    let db = Database::open(&config.store.path)?;
    let Some(sender) = db.users().get_by_username(&args.username)? else {
        // Same outward message as a failed signature check
        tracing::debug!(username = %args.username, "sender is not registered");
        anyhow::bail!("transaction rejected");
    };
    let server = load_keypair(&config.server_key.private_key_path)?;

    let pending = PendingTransaction::new(
        payload,
        sender.public_key,
        EncodedSignature::new(args.signature),
    );
    let record = TransactionAuthorizer::new()
        .authorize(pending, &server)
        .into_result()?;
    drop(server);

    let stored = db.record_transaction(&sender.username, &record)?;
    Ok(serde_json::to_string_pretty(&stored)?)
}

pub fn handle_show_command(id: &str, config: &AppConfig) -> Result<String> {
    let db = Database::open(&config.store.path)?;
    match db.transactions().get(id)? {
        Some(stored) => Ok(serde_json::to_string_pretty(&stored)?),
        None => anyhow::bail!("No transaction with id {}", id),
    }
}

pub fn handle_list_command(config: &AppConfig) -> Result<String> {
    let db = Database::open(&config.store.path)?;
    let records = db.transactions().list()?;
    Ok(serde_json::to_string_pretty(&records)?)
}
