//! CLI command handlers.

pub mod actions;
pub mod auth;
pub mod config;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context as _, Result, bail};
use carlink_config::{CarlinkConfig, LoadedConfig, VehicleConfig};
use carlink_oauth::{ApiContext, Credentials, IdentityManager, WebLoginAuthenticator};

/// Shared context for all commands.
#[derive(Debug, Clone)]
pub struct Context {
    /// Config directory override.
    pub config_dir: Option<PathBuf>,
    /// Output as JSON for scripting.
    pub json_output: bool,
    /// Verbose output enabled.
    pub verbose: bool,
}

impl Context {
    /// Load the layered configuration and print its warnings.
    pub fn load_config(&self) -> Result<LoadedConfig> {
        let loaded = carlink_config::load_config_from(None, self.config_dir.as_deref())
            .context("Failed to load configuration")?;
        for warning in &loaded.warnings {
            eprintln!("{} {}", console::style("warning:").yellow().bold(), warning);
        }
        Ok(loaded)
    }

    /// Path of the user config file.
    pub fn config_path(&self) -> Option<PathBuf> {
        match &self.config_dir {
            Some(dir) => Some(dir.join("config.toml")),
            None => carlink_config::user_config_path(),
        }
    }
}

/// An authenticated session for one account, optionally bound to a vehicle.
pub struct Session {
    pub identity: Arc<IdentityManager>,
    pub api: ApiContext,
    pub account: String,
}

/// Pick the vehicle named on the command line, or the only configured one.
pub fn select_vehicle<'a>(
    config: &'a CarlinkConfig,
    name: Option<&'a str>,
) -> Result<(&'a str, &'a VehicleConfig)> {
    if let Some(name) = name {
        let (vehicle, _) = config.vehicle(name)?;
        return Ok((name, vehicle));
    }
    let mut vehicles = config.vehicle.iter();
    match (vehicles.next(), vehicles.next()) {
        (Some((name, vehicle)), None) => Ok((name.as_str(), vehicle)),
        (None, _) => bail!("No vehicles configured. Add a [vehicle.<name>] section to the config."),
        _ => bail!("Several vehicles configured; choose one with --vehicle"),
    }
}

/// Pick the account named on the command line, the vehicle's, or the only one.
pub fn select_account<'a>(
    config: &'a CarlinkConfig,
    account: Option<&'a str>,
    vehicle: Option<&'a str>,
) -> Result<&'a str> {
    if let Some(name) = account {
        config.account(name)?;
        return Ok(name);
    }
    if let Some(vehicle) = vehicle {
        let (v, _) = config.vehicle(vehicle)?;
        return Ok(v.account.as_str());
    }
    config
        .default_account()
        .ok_or_else(|| anyhow::anyhow!("Several or no accounts configured; choose one with --account"))
}

/// Build the identity context for `account`, bound to `vehicle` when given.
pub fn open_session(
    config: &CarlinkConfig,
    account: &str,
    vehicle: Option<(&str, &VehicleConfig)>,
) -> Result<Session> {
    let account_config = config.account(account)?;
    let password = carlink_config::secrets::resolve_password(account, account_config)?;
    tracing::debug!(account, source = %password.source, "resolved password");

    let pin = vehicle
        .and_then(|(name, v)| carlink_config::secrets::resolve_pin(name, v))
        .map(|s| s.value);

    let identity = Arc::new(
        IdentityManager::new().with_http_timeout(Duration::from_secs(config.http().timeout_secs)),
    );
    let group = identity.generate_session_group()?;
    let profile = config.brand_profile(account_config.brand);

    let mut api = ApiContext::new(
        group,
        Credentials::new(&account_config.username, password.value).with_pin(pin),
        Arc::new(profile.clone()),
    )
    .with_authenticator(WebLoginAuthenticator::shared(profile))
    .with_country(&account_config.country)
    .with_default_validity(config.tokens().default_validity_secs);
    if let Some((_, v)) = vehicle {
        api = api.with_vin(&v.vin);
    }

    Ok(Session {
        identity,
        api,
        account: account.to_string(),
    })
}
