//! Configuration system for carlink.
//!
//! Provides TOML-based configuration with:
//! - Named accounts (`[account.<name>]`) holding brand, country and login user
//! - Vehicles (`[vehicle.<name>]`) bound to an account by name
//! - Transport, token and pending-action tuning (`[http]`, `[tokens]`, `[actions]`)
//! - Built-in brand profiles with per-brand overrides (`[brand.<code>]`)
//! - Config file layering (XDG user config + project-local overrides)
//! - Password/PIN resolution (keyring → env var → config file)

pub mod brand;
pub mod discovery;
pub mod error;
pub mod secrets;
pub mod types;

pub use brand::{Brand, BrandOverride, BrandProfile, ClimateBodyFormat, TokenExchange};
pub use discovery::{
    LoadedConfig, load_config, load_config_file, load_config_from, save_config,
    user_config_dir, user_config_path,
};
pub use error::{ConfigError, Result};
pub use types::*;
