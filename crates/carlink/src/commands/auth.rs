//! Auth command - login and token management.

use anyhow::{Context as _, Result};
use clap::{Args, Subcommand};
use console::style;

use carlink_config::secrets::{resolve_password, resolve_pin};
use carlink_oauth::TokenInfo;

use super::{Context, Session, open_session, select_account, select_vehicle};

/// Arguments for the auth command.
#[derive(Args, Debug)]
pub struct AuthArgs {
    #[command(subcommand)]
    pub command: AuthCommand,
}

#[derive(Subcommand, Debug)]
pub enum AuthCommand {
    /// Log in to the brand identity provider
    Login {
        /// Account name from the config
        #[arg(long)]
        account: Option<String>,
    },

    /// Show configured accounts and where their secrets come from
    Status,

    /// Log in, then renew all tokens once
    Refresh {
        /// Account name from the config
        #[arg(long)]
        account: Option<String>,
    },

    /// Exchange the security PIN for a security token
    Spin {
        /// Vehicle name from the config
        #[arg(long)]
        vehicle: Option<String>,

        /// Service id, e.g. rlu_v1
        #[arg(long, default_value = "rlu_v1")]
        service: String,

        /// Operation, e.g. LOCK
        #[arg(long, default_value = "LOCK")]
        action: String,
    },
}

/// Run the auth command.
pub async fn run(args: AuthArgs, ctx: &Context) -> Result<()> {
    match args.command {
        AuthCommand::Login { account } => cmd_login(account.as_deref(), ctx).await,
        AuthCommand::Status => cmd_status(ctx).await,
        AuthCommand::Refresh { account } => cmd_refresh(account.as_deref(), ctx).await,
        AuthCommand::Spin {
            vehicle,
            service,
            action,
        } => cmd_spin(vehicle.as_deref(), &service, &action, ctx).await,
    }
}

async fn login(account: Option<&str>, ctx: &Context) -> Result<Session> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;
    let account = select_account(config, account, None)?;
    let session = open_session(config, account, None)?;

    if !ctx.json_output {
        println!("Logging in to {} as {}...", session.api.profile.brand, session.api.credentials.username);
    }
    session
        .identity
        .create_access_token(&session.api)
        .await
        .context("Login failed")?;
    Ok(session)
}

async fn cmd_login(account: Option<&str>, ctx: &Context) -> Result<()> {
    let session = login(account, ctx).await?;
    let user = session.identity.user_identity(&session.api).await?;

    if ctx.json_output {
        let tokens = session.identity.token_info(&session.api.group_id)?;
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "account": session.account,
                "user_id": user,
                "tokens": tokens,
            }))?
        );
        return Ok(());
    }

    println!("{}", style("Login successful").green().bold());
    println!("  Account: {}", session.account);
    println!("  User id: {}", user);
    print_tokens(&session.identity.token_info(&session.api.group_id)?);
    Ok(())
}

async fn cmd_status(ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;

    let mut accounts: Vec<_> = config.account.iter().collect();
    accounts.sort_by(|a, b| a.0.cmp(b.0));

    if ctx.json_output {
        let out: Vec<_> = accounts
            .iter()
            .map(|(name, account)| {
                let vehicles: Vec<_> = config
                    .vehicles_of(name)
                    .into_iter()
                    .map(|(vname, v)| {
                        serde_json::json!({
                            "name": vname,
                            "vin": v.vin,
                            "pin": resolve_pin(vname, v).map(|s| s.source.to_string()),
                        })
                    })
                    .collect();
                serde_json::json!({
                    "name": name,
                    "brand": account.brand,
                    "username": account.username,
                    "password": resolve_password(name, account).ok().map(|s| s.source.to_string()),
                    "vehicles": vehicles,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("Authentication Status");
    println!("---------------------");
    if accounts.is_empty() {
        println!("No accounts configured.");
        return Ok(());
    }

    for (name, account) in accounts {
        println!();
        println!("{} ({}, {})", style(name).bold(), account.brand, account.username);
        match resolve_password(name, account) {
            Ok(secret) => println!("  Password: {}", secret.source),
            Err(e) => println!("  Password: {} ({})", style("missing").red(), e),
        }
        for (vname, vehicle) in config.vehicles_of(name) {
            let pin = resolve_pin(vname, vehicle)
                .map(|s| s.source.to_string())
                .unwrap_or_else(|| "not configured".to_string());
            println!("  Vehicle {}: {} (S-PIN: {})", vname, vehicle.vin, pin);
        }
    }
    Ok(())
}

async fn cmd_refresh(account: Option<&str>, ctx: &Context) -> Result<()> {
    let session = login(account, ctx).await?;
    let changed = session.identity.refresh_tokens(&session.api).await;
    let tokens = session.identity.token_info(&session.api.group_id)?;

    if ctx.json_output {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "refreshed": changed,
                "tokens": tokens,
            }))?
        );
        return Ok(());
    }

    if changed {
        println!("{}", style("Tokens refreshed").green());
    } else {
        println!("No token needed a refresh.");
    }
    print_tokens(&tokens);
    Ok(())
}

async fn cmd_spin(vehicle: Option<&str>, service: &str, action: &str, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;
    let (vname, v) = select_vehicle(config, vehicle)?;
    let account = select_account(config, None, Some(vname))?;
    let session = open_session(config, account, Some((vname, v)))?;

    session
        .identity
        .create_security_token(&session.api, service, action)
        .await
        .with_context(|| format!("Security PIN exchange for {}.{} failed", service, action))?;

    if ctx.json_output {
        let tokens = session.identity.token_info(&session.api.group_id)?;
        println!("{}", serde_json::to_string_pretty(&tokens)?);
    } else {
        println!(
            "{} for {}.{} on {}",
            style("Security PIN accepted").green().bold(),
            service,
            action,
            vname
        );
    }
    Ok(())
}

fn print_tokens(tokens: &[TokenInfo]) {
    println!();
    for info in tokens {
        let label = match &info.service {
            Some(service) => format!("{} ({})", info.kind, service),
            None => info.kind.clone(),
        };
        let refresh = if info.has_refresh_token { ", refreshable" } else { "" };
        println!("  {:<24} {}{}", label, info.expires_in_display(), refresh);
    }
}
