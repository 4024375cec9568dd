//! Config command - configuration management.

use anyhow::{Result, bail};
use clap::{Args, Subcommand};

use carlink_config::secrets::{password_env_var, pin_env_var, store_password, store_pin};

use super::Context;

/// Arguments for the config command.
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Show resolved configuration (secrets redacted)
    Show,

    /// Show configuration file path
    Path,

    /// Initialize a config file with a commented template
    Init,

    /// Store an account password in the system keyring
    SetPassword {
        /// Account name
        account: String,
    },

    /// Store a vehicle security PIN in the system keyring
    SetPin {
        /// Vehicle name
        vehicle: String,
    },
}

/// Run the config command.
pub async fn run(args: ConfigArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ConfigCommand::Show => cmd_show(ctx),
        ConfigCommand::Path => cmd_path(ctx),
        ConfigCommand::Init => cmd_init(ctx),
        ConfigCommand::SetPassword { account } => {
            let value = read_secret(&format!("Password for account '{}'", account))?;
            report_store(store_password(&account, &value), &password_env_var(&account))
        }
        ConfigCommand::SetPin { vehicle } => {
            let value = read_secret(&format!("S-PIN for vehicle '{}'", vehicle))?;
            report_store(store_pin(&vehicle, &value), &pin_env_var(&vehicle))
        }
    }
}

fn cmd_show(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let mut config = loaded.config.clone();
    for account in config.account.values_mut() {
        if account.password.is_some() {
            account.password = Some("***".to_string());
        }
    }
    for vehicle in config.vehicle.values_mut() {
        if vehicle.pin.is_some() {
            vehicle.pin = Some("***".to_string());
        }
    }

    if ctx.json_output {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("# carlink Configuration\n");

    let sources = loaded.loaded_paths();
    if sources.is_empty() {
        println!("No config files loaded (using defaults)\n");
    } else {
        println!("Config files:");
        for source in &sources {
            println!("  {}", source.display());
        }
        println!();
    }

    let mut accounts: Vec<_> = config.account.iter().collect();
    accounts.sort_by(|a, b| a.0.cmp(b.0));
    if !accounts.is_empty() {
        println!("Accounts:");
        for (name, account) in accounts {
            println!(
                "  {:<12} {} / {} ({})",
                name, account.brand, account.username, account.country
            );
            for (vname, vehicle) in config.vehicles_of(name) {
                println!("    {:<10} {}", vname, vehicle.vin);
            }
        }
        println!();
    }

    let http = config.http();
    let tokens = config.tokens();
    let actions = config.actions();
    println!("HTTP timeout:      {}s", http.timeout_secs);
    println!("Token validity:    {}s (refresh every {}s)", tokens.default_validity_secs, tokens.refresh_interval_secs);
    println!("Action timeout:    {}s (poll every {}s)", actions.default_timeout_secs, actions.poll_interval_secs);
    for (service, secs) in &actions.timeouts {
        println!("  {:<18} {}s", service, secs);
    }
    if let Some(dir) = &actions.offline_dir {
        println!("Offline responses: {}", dir.display());
    }

    if ctx.verbose {
        println!("---\nRaw config:\n");
        if let Ok(toml_str) = config.to_toml() {
            println!("{}", toml_str);
        }
    }

    Ok(())
}

fn cmd_path(ctx: &Context) -> Result<()> {
    match ctx.config_path() {
        Some(path) => {
            println!("{}", path.display());
            Ok(())
        }
        None => bail!("Could not determine config directory"),
    }
}

fn cmd_init(ctx: &Context) -> Result<()> {
    let Some(path) = ctx.config_path() else {
        bail!("Could not determine config directory");
    };
    if path.exists() {
        println!("Config file already exists: {}", path.display());
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, TEMPLATE)?;
    println!("Created {}", path.display());
    Ok(())
}

const TEMPLATE: &str = r#"# carlink configuration

# [account.home]
# brand = "volkswagen"
# username = "me@example.com"
# country = "DE"
# Password: `carlink config set-password home` or CARLINK_HOME_PASSWORD

# [vehicle.golf]
# account = "home"
# vin = "WVWZZZ1KZAW000001"
# S-PIN: `carlink config set-pin golf` or CARLINK_GOLF_PIN

# [http]
# timeout_secs = 30

# [actions]
# default_timeout_secs = 60
# poll_interval_secs = 5
"#;

fn read_secret(prompt: &str) -> Result<String> {
    println!("{} (read from stdin):", prompt);
    let mut value = String::new();
    std::io::stdin().read_line(&mut value)?;
    let value = value.trim().to_string();
    if value.is_empty() {
        bail!("No value provided");
    }
    Ok(value)
}

fn report_store(result: std::result::Result<(), String>, env_var: &str) -> Result<()> {
    match result {
        Ok(()) => {
            println!("Stored in system keyring.");
            Ok(())
        }
        Err(e) => {
            eprintln!("Failed to store in keyring: {}", e);
            eprintln!("Fallback: set the {} environment variable instead.", env_var);
            Ok(())
        }
    }
}
