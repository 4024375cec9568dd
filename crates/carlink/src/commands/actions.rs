//! Actions command - remote vehicle actions.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::{Args, Subcommand, ValueEnum};
use console::style;

use carlink_api::{
    ActionListener, ActionStatus, DirectoryFallback, HEATER_SOURCE_ELECTRIC, VehicleApi,
};

use super::{Context, open_session, select_account, select_vehicle};

/// Arguments for the actions command.
#[derive(Args, Debug)]
pub struct ActionsArgs {
    #[command(subcommand)]
    pub command: ActionsCommand,
}

#[derive(Subcommand, Debug)]
pub enum ActionsCommand {
    /// Send an action and report its first status
    Send(ActionArgs),

    /// Send an action and poll until it finishes
    Watch {
        #[command(flatten)]
        action: ActionArgs,

        /// Poll interval in seconds (default: actions.poll_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },
}

/// Remote action to perform.
#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum Action {
    Lock,
    Unlock,
    ClimateStart,
    ClimateStop,
    ChargeStart,
    ChargeStop,
    WindowHeatingStart,
    WindowHeatingStop,
    /// Auxiliary heater, needs the S-PIN
    HeatingStart,
    HeatingStop,
    /// Ventilation through the auxiliary heater, needs the S-PIN
    VentilationStart,
    VentilationStop,
    /// Set the climatisation target temperature (--temperature)
    SetTemperature,
    /// Limit the charging current (--current)
    SetMaxCurrent,
    /// Set the target state of charge (--level)
    SetTargetLevel,
    Honk,
    Flash,
    /// Ask the vehicle to report fresh status data
    Refresh,
}

#[derive(Args, Debug)]
pub struct ActionArgs {
    /// Action to perform
    #[arg(value_enum)]
    pub action: Action,

    /// Vehicle name from the config
    #[arg(long)]
    pub vehicle: Option<String>,

    /// Heater source for climate-start (electric, auxiliary)
    #[arg(long, default_value = HEATER_SOURCE_ELECTRIC)]
    pub heater_source: String,

    /// Latitude of your position for honk/flash
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub latitude: f64,

    /// Longitude of your position for honk/flash
    #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
    pub longitude: f64,

    /// Honk/flash duration in seconds
    #[arg(long, default_value_t = 10)]
    pub duration: u32,

    /// Heating or ventilation run time in minutes
    #[arg(long, default_value_t = 30)]
    pub minutes: u32,

    /// Target temperature in degrees Celsius
    #[arg(long, required_if_eq("action", "set-temperature"), allow_negative_numbers = true)]
    pub temperature: Option<f64>,

    /// Maximum charging current in amperes
    #[arg(long, required_if_eq("action", "set-max-current"))]
    pub current: Option<u32>,

    /// Target state of charge in percent
    #[arg(long, required_if_eq("action", "set-target-level"), value_parser = clap::value_parser!(u8).range(0..=100))]
    pub level: Option<u8>,
}

/// Run the actions command.
pub async fn run(args: ActionsArgs, ctx: &Context) -> Result<()> {
    match args.command {
        ActionsCommand::Send(action) => cmd_send(action, None, false, ctx).await,
        ActionsCommand::Watch { action, interval } => cmd_send(action, interval, true, ctx).await,
    }
}

async fn cmd_send(args: ActionArgs, interval: Option<u64>, watch: bool, ctx: &Context) -> Result<()> {
    let loaded = ctx.load_config()?;
    let config = &loaded.config;
    let (vname, vehicle) = select_vehicle(config, args.vehicle.as_deref())?;
    let account = select_account(config, None, Some(vname))?;
    let session = open_session(config, account, Some((vname, vehicle)))?;

    let actions = config.actions();
    let listener: Arc<dyn ActionListener> = Arc::new(ConsoleListener {
        json: ctx.json_output,
    });
    let mut api = VehicleApi::new(session.identity.clone(), session.api, listener, &actions);
    if let Some(dir) = &actions.offline_dir {
        api = api.with_fallback(Arc::new(DirectoryFallback::new(dir)));
    }

    let mut status = dispatch(&api, &args).await?;
    if !watch || !api.queue().are_requests_pending() {
        return finish(status);
    }

    let interval = Duration::from_secs(interval.unwrap_or(actions.poll_interval_secs).max(1));
    while api.queue().are_requests_pending() {
        tokio::time::sleep(interval).await;
        for request in api.queue().pending() {
            status = match api.queue().get_request_status(&request.request_id, "").await {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!(request_id = %request.request_id, error = %e, "status check failed");
                    continue;
                }
            };
        }
    }
    finish(status)
}

async fn dispatch(api: &VehicleApi, args: &ActionArgs) -> Result<ActionStatus> {
    let status = match args.action {
        Action::Lock => api.control_lock(true).await,
        Action::Unlock => api.control_lock(false).await,
        Action::ClimateStart => api.control_climater(true, &args.heater_source).await,
        Action::ClimateStop => api.control_climater(false, &args.heater_source).await,
        Action::ChargeStart => api.control_charger(true).await,
        Action::ChargeStop => api.control_charger(false).await,
        Action::WindowHeatingStart => api.control_window_heating(true).await,
        Action::WindowHeatingStop => api.control_window_heating(false).await,
        Action::HeatingStart => api.control_pre_heating(true, args.minutes).await,
        Action::HeatingStop => api.control_pre_heating(false, args.minutes).await,
        Action::VentilationStart => api.control_ventilation(true, args.minutes).await,
        Action::VentilationStop => api.control_ventilation(false, args.minutes).await,
        Action::SetTemperature => {
            let temp = args
                .temperature
                .ok_or_else(|| anyhow::anyhow!("--temperature is required"))?;
            api.control_climater_temp(temp, &args.heater_source).await
        }
        Action::SetMaxCurrent => {
            let current = args
                .current
                .ok_or_else(|| anyhow::anyhow!("--current is required"))?;
            api.control_max_charge(current).await
        }
        Action::SetTargetLevel => {
            let level = args
                .level
                .ok_or_else(|| anyhow::anyhow!("--level is required"))?;
            api.control_target_charge_level(level).await
        }
        Action::Honk | Action::Flash => {
            api.control_honk_flash(
                args.action == Action::Honk,
                args.latitude,
                args.longitude,
                args.duration,
            )
            .await
        }
        Action::Refresh => api.refresh_vehicle_status().await,
    };
    Ok(status)
}

fn finish(status: ActionStatus) -> Result<()> {
    match status {
        ActionStatus::Successful | ActionStatus::InProgress | ActionStatus::Unknown(_) => Ok(()),
        other => anyhow::bail!("Action finished with status {}", other),
    }
}

/// Prints action events as they happen.
struct ConsoleListener {
    json: bool,
}

impl ConsoleListener {
    fn emit(&self, event: serde_json::Value, line: String) {
        if self.json {
            println!("{}", event);
        } else {
            println!("{}", line);
        }
    }
}

impl ActionListener for ConsoleListener {
    fn on_action_sent(&self, service: &str, action: &str, request_id: &str) {
        self.emit(
            serde_json::json!({"event": "sent", "service": service, "action": action, "request_id": request_id}),
            format!("{} {}.{} (request {})", style("sent").cyan(), service, action, request_id),
        );
    }

    fn on_action_timeout(&self, service: &str, action: &str, request_id: &str) {
        self.emit(
            serde_json::json!({"event": "timeout", "service": service, "action": action, "request_id": request_id}),
            format!("{} {}.{} (request {})", style("timeout").yellow(), service, action, request_id),
        );
    }

    fn on_action_result(
        &self,
        service: &str,
        action: &str,
        request_id: &str,
        status: &str,
        raw_status: &str,
    ) {
        let styled = if status == ActionStatus::Successful.as_str() {
            style(status).green()
        } else {
            style(status).red()
        };
        self.emit(
            serde_json::json!({
                "event": "result",
                "service": service,
                "action": action,
                "request_id": request_id,
                "status": status,
                "raw_status": raw_status,
                "at": chrono::Utc::now(),
            }),
            format!("{} {}.{} (request {}, {})", styled, service, action, request_id, raw_status),
        );
    }

    fn on_action_notification(&self, service: &str, action: &str, message: &str) {
        self.emit(
            serde_json::json!({"event": "rejected", "service": service, "action": action, "message": message}),
            format!("{} {}.{}: {}", style("rejected").red().bold(), service, action, message),
        );
    }

    fn on_rate_limit(&self, remaining: u32) {
        tracing::debug!(remaining, "API calls remaining");
    }
}
