//! Ed25519 key files: 32-byte secrets stored as a single hex line.

use anyhow::{Context, Result, bail};
use ezballot_core::{Identity, SigningKey};
use rand::rngs::OsRng;
use std::path::Path;
use tracing::info;

/// Generate a fresh key at `path`. Never overwrites an existing file.
pub fn generate_key(path: &Path) -> Result<SigningKey> {
    if path.exists() {
        bail!("Key file already exists at {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let key = SigningKey::generate(&mut OsRng);
    std::fs::write(path, format!("{}\n", hex::encode(key.to_bytes())))
        .with_context(|| format!("Failed to write key file {}", path.display()))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600))?;
    }

    info!(
        "Generated key {} at {}",
        Identity::from(&key),
        path.display()
    );
    Ok(key)
}

pub fn load_key(path: &Path) -> Result<SigningKey> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read key file {}", path.display()))?;
    let mut secret = [0u8; 32];
    hex::decode_to_slice(content.trim(), &mut secret)
        .with_context(|| format!("Malformed key file {}", path.display()))?;
    Ok(SigningKey::from_bytes(&secret))
}
