//! Secrets management: account passwords and vehicle security PINs.
//!
//! Resolution order:
//! 1. System keyring (if `keyring` feature enabled)
//! 2. Environment variable
//! 3. Config file (with warning)
//!
//! Keyring entries are stored as service="carlink", user="<account>_password"
//! or "<vehicle>_pin".

use crate::{AccountConfig, ConfigError, Result, VehicleConfig};

/// Keyring service name.
const SERVICE_NAME: &str = "carlink";

/// Result of secret resolution with provenance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedSecret {
    /// The secret value.
    pub value: String,
    /// Where the secret was found.
    pub source: SecretSource,
}

/// Where a secret was resolved from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretSource {
    /// OS keyring.
    Keyring,
    /// Environment variable.
    EnvVar(String),
    /// Config file (plaintext, not recommended).
    ConfigFile,
}

impl std::fmt::Display for SecretSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SecretSource::Keyring => write!(f, "system keyring"),
            SecretSource::EnvVar(var) => write!(f, "env var {}", var),
            SecretSource::ConfigFile => write!(f, "config file (plaintext)"),
        }
    }
}

/// Environment variable holding the password of an account.
pub fn password_env_var(account_name: &str) -> String {
    format!("CARLINK_{}_PASSWORD", env_key(account_name))
}

/// Environment variable holding the security PIN of a vehicle.
pub fn pin_env_var(vehicle_name: &str) -> String {
    format!("CARLINK_{}_PIN", env_key(vehicle_name))
}

fn env_key(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Resolve the password of an account, failing if none is available.
pub fn resolve_password(account_name: &str, account: &AccountConfig) -> Result<ResolvedSecret> {
    let env_var = password_env_var(account_name);
    resolve(
        &format!("{}_password", account_name),
        &env_var,
        account.password.as_deref(),
    )
    .ok_or(ConfigError::PasswordNotFound {
        account: account_name.to_string(),
        env_var,
    })
}

/// Resolve the security PIN of a vehicle, if one is configured anywhere.
pub fn resolve_pin(vehicle_name: &str, vehicle: &VehicleConfig) -> Option<ResolvedSecret> {
    resolve(
        &format!("{}_pin", vehicle_name),
        &pin_env_var(vehicle_name),
        vehicle.pin.as_deref(),
    )
}

fn resolve(keyring_user: &str, env_var: &str, config_value: Option<&str>) -> Option<ResolvedSecret> {
    if let Some(secret) = get_from_keyring(keyring_user) {
        return Some(secret);
    }

    if let Ok(value) = std::env::var(env_var)
        && !value.is_empty()
    {
        return Some(ResolvedSecret {
            value,
            source: SecretSource::EnvVar(env_var.to_string()),
        });
    }

    config_value.filter(|v| !v.is_empty()).map(|v| ResolvedSecret {
        value: v.to_string(),
        source: SecretSource::ConfigFile,
    })
}

/// Store an account password in the system keyring.
pub fn store_password(account_name: &str, password: &str) -> std::result::Result<(), String> {
    store_keyring_entry(SERVICE_NAME, &format!("{}_password", account_name), password)
}

/// Store a vehicle PIN in the system keyring.
pub fn store_pin(vehicle_name: &str, pin: &str) -> std::result::Result<(), String> {
    store_keyring_entry(SERVICE_NAME, &format!("{}_pin", vehicle_name), pin)
}

// ─────────────────────────────────────────────────────────────────────────────
// Keyring implementation (feature-gated)
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(feature = "keyring")]
fn get_from_keyring(user: &str) -> Option<ResolvedSecret> {
    // Keep tests isolated from the local keychain.
    if cfg!(test) {
        return None;
    }

    let entry = keyring::Entry::new(SERVICE_NAME, user).ok()?;
    let value = entry.get_password().ok()?;
    if value.is_empty() {
        return None;
    }
    Some(ResolvedSecret {
        value,
        source: SecretSource::Keyring,
    })
}

#[cfg(feature = "keyring")]
fn store_keyring_entry(service: &str, user: &str, secret: &str) -> std::result::Result<(), String> {
    if cfg!(test) {
        return Err("keyring access disabled in tests".to_string());
    }
    let entry = keyring::Entry::new(service, user).map_err(|e| format!("keyring error: {}", e))?;
    entry
        .set_password(secret)
        .map_err(|e| format!("failed to store in keyring: {}", e))
}

// ─────────────────────────────────────────────────────────────────────────────
// No-op stubs when keyring feature is disabled
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "keyring"))]
fn get_from_keyring(_user: &str) -> Option<ResolvedSecret> {
    None
}

#[cfg(not(feature = "keyring"))]
fn store_keyring_entry(
    _service: &str,
    _user: &str,
    _secret: &str,
) -> std::result::Result<(), String> {
    Err("keyring support not compiled in (enable the 'keyring' feature)".to_string())
}
