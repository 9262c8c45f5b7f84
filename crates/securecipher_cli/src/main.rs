use anyhow::Result;
use clap::{Parser, Subcommand};
use securecipher_cli::commands::{account, key, keypair, transaction};
use securecipher_cli::{init_tracing, AppConfig};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "securecipher")]
#[command(about = "SecureCipher co-signing CLI")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Issue a server co-signing keypair
    Keygen(keypair::KeygenArgs),
    /// Check a client public key
    ValidateKey(key::ValidateKeyArgs),
    /// Sign a payload with a PEM private key
    Sign(transaction::SignArgs),
    /// Verify a client signature
    Verify(transaction::VerifyArgs),
    /// Co-sign and store a client transaction
    Authorize(transaction::AuthorizeArgs),
    /// Show a stored transaction
    Show { id: String },
    /// List stored transactions
    List,
    /// Register a user
    Register(account::RegisterArgs),
    /// Look up a user by virtual account number
    Account { account_id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, config_error) = match &cli.config {
        Some(path) => (AppConfig::from_file(path)?, None),
        None => match AppConfig::load() {
            Ok(config) => (config, None),
            Err(e) => (AppConfig::default(), Some(e)),
        },
    };

    init_tracing(&config.logging.filter);
    if let Some(e) = config_error {
        tracing::warn!("Failed to load configuration: {}", e);
        tracing::info!("Using default configuration...");
    }

    let output = match cli.command {
        Commands::Keygen(args) => keypair::handle_keygen_command(args),
        Commands::ValidateKey(args) => key::handle_validate_key_command(args),
        Commands::Sign(args) => transaction::handle_sign_command(args),
        Commands::Verify(args) => transaction::handle_verify_command(args),
        Commands::Authorize(args) => transaction::handle_authorize_command(args, &config),
        Commands::Show { id } => transaction::handle_show_command(&id, &config),
        Commands::List => transaction::handle_list_command(&config),
        Commands::Register(args) => account::handle_register_command(args, &config),
        Commands::Account { account_id } => account::handle_account_command(&account_id, &config),
    }?;

    println!("{}", output);
    Ok(())
}
