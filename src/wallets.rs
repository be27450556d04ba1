use crate::signing::Ed25519Keypair;
use color_eyre::eyre::{
    Result,
    WrapErr,
    eyre,
};
use eth_keystore::decrypt_key;
use rpassword::prompt_password;
use std::{
    fs,
    path::{
        Path,
        PathBuf,
    },
};

pub const SECRET_KEY_ENV: &str = "ZOMBIE_HOUSE_SECRET_KEY";

#[derive(Clone, Debug)]
pub struct WalletDescriptor {
    pub name: String,
    pub path: PathBuf,
}

impl WalletDescriptor {
    pub fn new(name: impl Into<String>, path: PathBuf) -> Self {
        Self {
            name: name.into(),
            path,
        }
    }
}

pub fn default_wallet_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").wrap_err("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".zombie-house").join("wallets"))
}

pub fn resolve_wallet_dir(dir: Option<&str>) -> Result<PathBuf> {
    match dir {
        Some(raw) => {
            let expanded = shellexpand::tilde(raw);
            Ok(PathBuf::from(expanded.into_owned()))
        }
        None => default_wallet_dir(),
    }
}

pub fn list_wallets(dir: &Path) -> Result<Vec<WalletDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }
    let mut wallets = Vec::new();
    for entry in fs::read_dir(dir).wrap_err("Failed to read wallet directory")? {
        let entry = entry.wrap_err("Failed to read wallet entry")?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        if path.extension().and_then(|ext| ext.to_str()) != Some("wallet") {
            continue;
        }
        let name = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .ok_or_else(|| eyre!("Invalid wallet filename {:?}", path))?
            .to_owned();
        wallets.push(WalletDescriptor::new(name, path));
    }
    wallets.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(wallets)
}

pub fn find_wallet(dir: &Path, name: &str) -> Result<WalletDescriptor> {
    let wallets = list_wallets(dir)?;
    wallets
        .into_iter()
        .find(|w| w.name == name)
        .ok_or_else(|| eyre!("Wallet '{name}' not found in {}", dir.to_string_lossy()))
}

/// Prompts for the password on the terminal.
pub fn unlock_wallet(descriptor: &WalletDescriptor) -> Result<Ed25519Keypair> {
    let prompt = format!("Enter password for wallet '{}': ", descriptor.name);
    let password = prompt_password(prompt).wrap_err("Failed to read wallet password")?;
    decrypt_wallet(descriptor, &password)
}

pub fn decrypt_wallet(descriptor: &WalletDescriptor, password: &str) -> Result<Ed25519Keypair> {
    let secret = decrypt_key(&descriptor.path, password.as_bytes())
        .map_err(|_| eyre!("Invalid password for wallet '{}'", descriptor.name))?;

    Ed25519Keypair::from_secret_bytes(&secret).map_err(|e| {
        eyre!(
            "Wallet '{}' contained unsupported key material: {e}",
            descriptor.name
        )
    })
}

/// Hex secret from the environment, for non-interactive runs.
pub fn keypair_from_env(
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<Option<Ed25519Keypair>> {
    let Some(secret) = lookup(SECRET_KEY_ENV) else {
        return Ok(None);
    };
    let keypair = Ed25519Keypair::from_hex(&secret)
        .map_err(|e| eyre!(e))
        .wrap_err_with(|| format!("invalid {SECRET_KEY_ENV}"))?;
    Ok(Some(keypair))
}
