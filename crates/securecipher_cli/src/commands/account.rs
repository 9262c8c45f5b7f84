use crate::config::AppConfig;
use crate::read_json_arg;
use anyhow::Result;
use clap::Args;
use securecipher_core::EncodedPublicKey;
use securecipher_store::{Database, NewUser};

#[derive(Args, Debug)]
#[command(about = "Register a user and assign a virtual account number")]
pub struct RegisterArgs {
    #[arg(long)]
    pub username: String,
    #[arg(long)]
    pub full_name: String,
    #[arg(long)]
    pub email: String,
    #[arg(long)]
    pub phone: String,
    /// 11-digit Bank Verification Number
    #[arg(long)]
    pub bvn: String,
    /// 11-digit National Identification Number
    #[arg(long)]
    pub nin: String,
    /// Public key JSON, inline or as a file path
    #[arg(long)]
    pub public_key: String,
}

pub fn handle_register_command(args: RegisterArgs, config: &AppConfig) -> Result<String> {
    let public_key = EncodedPublicKey::from_json(&read_json_arg(&args.public_key)?)?;
    let db = Database::open(&config.store.path)?;
    let user = db.users().register(NewUser {
        username: args.username,
        full_name: args.full_name,
        email: args.email,
        phone_number: args.phone,
        bvn: args.bvn,
        nin: args.nin,
        public_key,
    })?;
    Ok(serde_json::to_string_pretty(&user)?)
}

pub fn handle_account_command(account_id: &str, config: &AppConfig) -> Result<String> {
    let db = Database::open(&config.store.path)?;
    match db.users().get_by_account(account_id)? {
        Some(user) => Ok(serde_json::to_string_pretty(&user)?),
        None => anyhow::bail!("No user with account {}", account_id),
    }
}
