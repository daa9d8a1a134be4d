//! Host identity key store
//!
//! The SSH host key is generated once, persisted, and reused verbatim on
//! every later start, so the fingerprint clients see never changes.

use anyhow::{Context, Result};
use rand::rngs::OsRng;
use rand::RngCore;
use russh::keys::ssh_key::private::Ed25519Keypair;
use russh::keys::ssh_key::LineEnding;
use russh::keys::{decode_secret_key, HashAlg, PrivateKey};
use std::fs;
use std::path::Path;
use tracing::info;

pub fn load_or_generate(path: &Path) -> Result<PrivateKey> {
    if path.exists() {
        let pem = fs::read_to_string(path)
            .with_context(|| format!("Failed to read host key {}", path.display()))?;
        let key = decode_secret_key(&pem, None)
            .with_context(|| format!("Failed to decode host key {}", path.display()))?;
        info!("Loaded host key {} ({})", path.display(), fingerprint(&key));
        return Ok(key);
    }

    let mut seed = [0u8; 32];
    OsRng.fill_bytes(&mut seed);
    let key = PrivateKey::from(Ed25519Keypair::from_seed(&seed));

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create key directory {}", parent.display())
            })?;
        }
    }
    let pem = key.to_openssh(LineEnding::LF)?;
    fs::write(path, pem.as_bytes())
        .with_context(|| format!("Failed to write host key {}", path.display()))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to restrict host key {}", path.display()))?;
    }
    info!("Generated host key {} ({})", path.display(), fingerprint(&key));
    Ok(key)
}

/// SHA-256 fingerprint of the public half, as shown to connecting clients
pub fn fingerprint(key: &PrivateKey) -> String {
    key.public_key().fingerprint(HashAlg::Sha256).to_string()
}
