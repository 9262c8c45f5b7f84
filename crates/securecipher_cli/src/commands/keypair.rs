use anyhow::{Context, Result};
use clap::Args;
use securecipher_core::{export_interchange, issue_keypair};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub const PRIVATE_KEY_FILE: &str = "server_private.pem";
pub const PUBLIC_KEY_FILE: &str = "server_public.pem";
pub const PUBLIC_JWK_FILE: &str = "server_public.json";

#[derive(Args, Debug)]
#[command(about = "Issue a new P-384 server co-signing keypair")]
pub struct KeygenArgs {
    /// Directory to write the key files into
    #[arg(long, default_value = "keys")]
    pub out: PathBuf,
    /// Replace an existing private key
    #[arg(long)]
    pub force: bool,
}

pub fn handle_keygen_command(args: KeygenArgs) -> Result<String> {
    let private_path = args.out.join(PRIVATE_KEY_FILE);
    if private_path.exists() && !args.force {
        anyhow::bail!(
            "{} already exists; pass --force to replace it",
            private_path.display()
        );
    }

    let (keypair, public_key) = issue_keypair()?;
    let (private_pem, public_pem) = export_interchange(&keypair)?;

    fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create {}", args.out.display()))?;
    write_private(&private_path, private_pem.as_bytes())?;
    fs::write(args.out.join(PUBLIC_KEY_FILE), public_pem)?;
    fs::write(
        args.out.join(PUBLIC_JWK_FILE),
        serde_json::to_string_pretty(&public_key)?,
    )?;

    tracing::info!(dir = %args.out.display(), "wrote server keypair");
    Ok(format!(
        "Keypair generated successfully!\nPublic Key (JSON): {}\nPrivate key written to {}",
        public_key.to_json()?,
        private_path.display()
    ))
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    // `mode` only applies on creation; an existing file keeps its old bits
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    Ok(())
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    let mut file = fs::File::create(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(contents)?;
    Ok(())
}
