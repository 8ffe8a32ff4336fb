//! hrdesk - command-line client for the HR management backend.
//!
//! Signs in to the admin console or the employee portal, keeps the session
//! between runs and reads or updates the signed-in employee's records.

use std::io::{self, Write};
use std::path::Path;
use std::process::ExitCode;

use anyhow::Result;
use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::{info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use hrdesk_core::api::PortalClient;
use hrdesk_core::auth::{AuthError, AuthStatus, LoginStatus, SessionManager, SessionSnapshot};
use hrdesk_core::config::{Config, Portal};
use hrdesk_core::models::{LeaveApplication, LeaveType, NewLeaveApplication};

/// Prefix of the daily rolling log file
const LOG_FILE_PREFIX: &str = "hrdesk.log";

#[derive(Parser)]
#[command(name = "hrdesk", version, about = "HR management and employee portal client")]
struct Cli {
    /// Backend base URL, e.g. http://127.0.0.1:8000/api
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Portal to sign in to (admin or employee)
    #[arg(long, global = true)]
    portal: Option<Portal>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in with username and password
    Login {
        #[arg(short, long)]
        username: Option<String>,
    },
    /// Finish a two-factor sign-in with the emailed code
    Verify {
        #[arg(short, long)]
        username: Option<String>,
        code: Option<String>,
    },
    /// Show the current session
    Status,
    /// Sign out and forget the stored token
    Logout,
    /// Request a password reset code by email
    ForgotPassword {
        #[arg(short, long)]
        email: Option<String>,
    },
    /// Set a new password using a reset code
    ResetPassword {
        #[arg(short, long)]
        email: Option<String>,
        #[arg(long)]
        code: Option<String>,
    },
    /// Change the password of the signed-in user
    ChangePassword,
    /// Show personal and department details
    Me,
    /// Show the portal home screen
    Dashboard,
    /// Leave applications
    Leave {
        #[command(subcommand)]
        action: LeaveAction,
    },
    /// List public holidays
    Holidays,
    /// Show attendance history
    History,
}

#[derive(Subcommand)]
enum LeaveAction {
    /// List your applications
    List,
    /// File a new application
    Apply {
        /// normal, student, illness or marriage
        #[arg(long = "type", default_value = "normal")]
        leave_type: LeaveType,
        /// First day of leave (YYYY-MM-DD)
        #[arg(long)]
        from: NaiveDate,
        /// Last day of leave (YYYY-MM-DD)
        #[arg(long)]
        to: NaiveDate,
        #[arg(long)]
        reason: Option<String>,
    },
    /// Withdraw an application
    Withdraw { id: String },
}

/// Initialize the tracing subscriber for logging.
///
/// Logs go to stderr; with a log directory configured they are also written
/// to a daily rolling file. The returned guard flushes that file on drop.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let stderr = fmt::layer().with_writer(io::stderr);

    match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::registry()
                .with(stderr)
                .with(fmt::layer().with_ansi(false).with_writer(writer))
                .with(filter)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::registry().with(stderr).with(filter).init();
            None
        }
    }
}

fn load_config(cli: &Cli) -> Result<Config> {
    let mut config = Config::load()?;
    config.apply_env()?;
    if let Some(ref url) = cli.api_url {
        config.base_url = url.clone();
    }
    if let Some(portal) = cli.portal {
        config.portal = portal;
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return ExitCode::FAILURE;
        }
    };

    let _guard = init_tracing(config.log_dir.as_deref());
    info!(portal = ?config.portal, base_url = %config.base_url, "hrdesk starting");

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            match err.downcast_ref::<AuthError>() {
                Some(auth) => eprintln!("Error: {}", auth.user_message()),
                None => eprintln!("Error: {:#}", err),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    let (manager, portal) = hrdesk_core::connect(&config)?;
    if let Err(e) = manager.check_auth() {
        warn!(error = %e, "Could not restore the saved session");
    }

    match cli.command {
        Command::Login { username } => login(&manager, &config, username).await,
        Command::Verify { username, code } => {
            let username = resolve_username(username, &config)?;
            let code = match code {
                Some(code) => code,
                None => prompt_line("OTP code")?,
            };
            manager.verify_otp(&username, &code).await?;
            print_status(&manager.snapshot(), cli.json)
        }
        Command::Status => print_status(&manager.snapshot(), cli.json),
        Command::Logout => {
            manager.logout().await?;
            println!("Logged out");
            Ok(())
        }
        Command::ForgotPassword { email } => {
            let email = required_arg(email, "Email")?;
            let message = manager.forgot_password(&email).await?;
            println!("{}", message);
            Ok(())
        }
        Command::ResetPassword { email, code } => {
            let email = required_arg(email, "Email")?;
            let code = match code {
                Some(code) => code,
                None => prompt_line("Reset code")?,
            };
            let new_password = rpassword::prompt_password("New password: ")?;
            let confirm = rpassword::prompt_password("Confirm new password: ")?;
            let message = manager.reset_password(&email, &code, &new_password, &confirm).await?;
            println!("{}", message);
            Ok(())
        }
        Command::ChangePassword => {
            let current = rpassword::prompt_password("Current password: ")?;
            let new_password = rpassword::prompt_password("New password: ")?;
            let confirm = rpassword::prompt_password("Confirm new password: ")?;
            portal.change_password(&current, &new_password, &confirm).await?;
            println!("Password changed");
            Ok(())
        }
        Command::Me => show_me(&portal, cli.json).await,
        Command::Dashboard => show_dashboard(&portal, cli.json).await,
        Command::Leave { action } => leave(&portal, action, cli.json).await,
        Command::Holidays => {
            let holidays = portal.holidays().await?;
            if cli.json {
                return print_json(&holidays);
            }
            for holiday in holidays {
                println!("{}  {}", holiday.holiday_date, holiday.holiday_name);
            }
            Ok(())
        }
        Command::History => {
            let days = portal.working_history().await?;
            if cli.json {
                return print_json(&days);
            }
            for day in days {
                let date = day.day.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
                let worked = day
                    .hours_worked()
                    .map(|d| format!("{}h{:02}m", d.num_hours(), d.num_minutes() % 60))
                    .unwrap_or_else(|| "open".to_string());
                println!("{}  {}", date, worked);
            }
            Ok(())
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

async fn login(manager: &SessionManager, config: &Config, username: Option<String>) -> Result<()> {
    let username = resolve_username(username, config)?;
    let password = rpassword::prompt_password("Password: ")?;
    let status = manager.login(&username, &password).await?;
    remember_username(&username);

    if status == LoginStatus::OtpRequired {
        if let Some(message) = manager.snapshot().feedback.message {
            println!("{}", message);
        }
        let code = prompt_line("OTP code (empty to enter it later)")?;
        if code.is_empty() {
            println!("Run `hrdesk verify` with the code to finish signing in.");
            return Ok(());
        }
        manager.verify_otp(&username, &code).await?;
    }
    print_status(&manager.snapshot(), false)
}

async fn show_me(portal: &PortalClient, json: bool) -> Result<()> {
    let (info, department) = tokio::try_join!(portal.personal_info(), portal.department())?;
    if json {
        return print_json(&serde_json::json!({ "personal_info": info, "department": department }));
    }

    println!("{}", info.fullname);
    if let Some(ref email) = info.email {
        println!("  Email:      {}", email);
    }
    if let Some(ref phone) = info.phone {
        println!("  Phone:      {}", phone);
    }
    if let Some(address) = info.formatted_address() {
        println!("  Address:    {}", address);
    }
    println!("  Department: {}", department.department_name);
    if let Some(ref location) = department.location {
        println!("  Location:   {}", location);
    }
    Ok(())
}

async fn show_dashboard(portal: &PortalClient, json: bool) -> Result<()> {
    let dashboard = portal.dashboard().await?;
    if json {
        return print_json(&dashboard);
    }

    let role = if dashboard.is_manager() { "Manager" } else { "Employee" };
    println!("{} ({})", dashboard.personal_info.fullname, role);
    println!("Department: {}", dashboard.department.department_name);

    let today = Local::now().date_naive();
    let today_events: Vec<&str> = dashboard
        .events
        .iter()
        .filter(|e| e.occurs_on(today))
        .map(|e| e.event_title.as_str())
        .collect();
    if today_events.is_empty() {
        println!("No events today");
    } else {
        println!("Today: {}", today_events.join(", "));
    }
    println!(
        "Leave applications: {} ({} pending)",
        dashboard.applications.len(),
        dashboard.pending_applications()
    );
    Ok(())
}

async fn leave(portal: &PortalClient, action: LeaveAction, json: bool) -> Result<()> {
    match action {
        LeaveAction::List => {
            let applications = portal.applications().await?;
            if json {
                return print_json(&applications);
            }
            if applications.is_empty() {
                println!("No leave applications");
            }
            for app in &applications {
                print_application(app);
            }
            Ok(())
        }
        LeaveAction::Apply {
            leave_type,
            from,
            to,
            reason,
        } => {
            let mut request = NewLeaveApplication::new(leave_type, from, to);
            if let Some(reason) = reason {
                request = request.with_reason(reason);
            }
            let created = portal.submit_application(&request).await?;
            if json {
                return print_json(&created);
            }
            println!("Submitted:");
            print_application(&created);
            Ok(())
        }
        LeaveAction::Withdraw { id } => {
            portal.withdraw_application(&id).await?;
            println!("Withdrew application {}", id);
            Ok(())
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn prompt_line(label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}

/// Value from the argument, else prompted for
fn required_arg(arg: Option<String>, label: &str) -> Result<String> {
    match arg.filter(|v| !v.trim().is_empty()) {
        Some(value) => Ok(value),
        None => prompt_line(label),
    }
}

/// Username from the argument, else prompt with the last one used as default
fn resolve_username(arg: Option<String>, config: &Config) -> Result<String> {
    if let Some(username) = arg.filter(|u| !u.trim().is_empty()) {
        return Ok(username);
    }
    match config.last_username.as_deref() {
        Some(last) => {
            let input = prompt_line(&format!("Username [{}]", last))?;
            Ok(if input.is_empty() { last.to_string() } else { input })
        }
        None => prompt_line("Username"),
    }
}

/// Save the username for next time without persisting one-off overrides
fn remember_username(username: &str) {
    let result = Config::load().and_then(|mut stored| {
        stored.last_username = Some(username.to_string());
        stored.save()
    });
    if let Err(e) = result {
        warn!(error = %e, "Failed to save username to config");
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_status(snapshot: &SessionSnapshot, json: bool) -> Result<()> {
    if json {
        return print_json(snapshot);
    }
    match snapshot.status {
        AuthStatus::Authenticated => {
            let user = snapshot.username.as_deref().unwrap_or("unknown user");
            match snapshot.expires_at {
                Some(expires_at) => println!(
                    "Logged in as {} until {} ({} minutes left)",
                    user,
                    expires_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
                    snapshot.minutes_until_expiry.unwrap_or_default()
                ),
                None => println!("Logged in as {}", user),
            }
        }
        AuthStatus::PendingOtp => println!(
            "Waiting for the OTP code for {}",
            snapshot.pending_identifier.as_deref().unwrap_or("-")
        ),
        AuthStatus::Unauthenticated => {
            println!("Not logged in");
            if let Some(ref error) = snapshot.feedback.error {
                println!("{}", error);
            }
        }
    }
    Ok(())
}

fn print_application(app: &LeaveApplication) {
    let kind = app.leave_type.map(|t| t.to_string()).unwrap_or_else(|| "-".to_string());
    let status = app.status.map(|s| s.to_string()).unwrap_or_else(|| "-".to_string());
    let range = match (app.start_date, app.end_date) {
        (Some(start), Some(end)) => format!("{} to {}", start, end),
        _ => "dates not set".to_string(),
    };
    println!("  [{}] {} leave, {} ({})", app.application_id, kind, range, status);
    if let Some(ref reason) = app.reason {
        println!("      {}", reason);
    }
}
