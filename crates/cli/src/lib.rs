pub mod commands;

use clap::{Parser, Subcommand};
use linekeeper_core::config::{AppConfig, LoadOptions, LogFormat};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use crate::commands::dashboard::DashboardArgs;
use crate::commands::line::{LineListArgs, SeatArgs};

#[derive(Debug, Parser)]
#[command(
    name = "linekeeper",
    about = "Linekeeper operator CLI",
    long_about = "Allocate phone lines to teams and keep facility, team and vendor counters exact.",
    after_help = concat!(
        "Examples:\n",
        "  linekeeper migrate\n",
        "  linekeeper seed\n",
        "  linekeeper --as user-admin dashboard --facility fac-building-a\n",
        "  linekeeper --as user-support line allocate line-nw-05 \\\n",
        "    --team team-sales --facility fac-building-b --floor floor-b-2\n\n",
        "Exit codes: 2 config or usage, 3 runtime, 4 database, 5 migration,\n",
        "6 seed verification, 7 request refused, 8 storage unavailable, 9 counter drift"
    )
)]
pub struct Cli {
    #[arg(long = "as", global = true, value_name = "USER_ID", help = "User acting on the data")]
    actor: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    #[command(about = "Apply pending database migrations and return structured status output")]
    Migrate,
    #[command(about = "Load the demo facilities, teams, vendors, users and lines (idempotent)")]
    Seed,
    #[command(about = "Inspect effective configuration values with source attribution")]
    Config,
    #[command(about = "Recompute stored counters from phone line rows and report drift")]
    Verify,
    #[command(about = "Team allocation cards and vendor capacity")]
    Dashboard(DashboardArgs),
    #[command(about = "Assign or revoke user roles")]
    Role {
        #[command(subcommand)]
        command: RoleCommand,
    },
    #[command(about = "Provision, allocate and move phone lines through their lifecycle")]
    Line {
        #[command(subcommand)]
        command: LineCommand,
    },
}

#[derive(Debug, Subcommand)]
enum RoleCommand {
    #[command(about = "Give a user their single role")]
    Assign {
        user_id: String,
        #[arg(help = "super_admin or support_executive")]
        role: String,
    },
    #[command(about = "Remove every role row for a user")]
    Revoke { user_id: String },
}

#[derive(Debug, Subcommand)]
enum LineCommand {
    #[command(about = "Register a new line against a vendor's capacity")]
    Provision {
        #[arg(long, value_name = "VENDOR_ID")]
        vendor: String,
        #[arg(long, value_name = "DID")]
        did: String,
        #[arg(long, value_name = "SERIAL")]
        serial: String,
    },
    #[command(about = "Allocate an available line to a team seat")]
    Allocate {
        line_id: String,
        #[command(flatten)]
        seat: SeatArgs,
    },
    #[command(about = "Move an allocated line to another team seat")]
    Transfer {
        line_id: String,
        #[command(flatten)]
        seat: SeatArgs,
    },
    #[command(about = "Return an allocated line to the available pool")]
    Deallocate { line_id: String },
    #[command(about = "Take an allocated line out of service for maintenance")]
    Maintenance { line_id: String },
    #[command(about = "Bring a line back from maintenance")]
    Restore { line_id: String },
    #[command(about = "Retire an available line for good")]
    Retire { line_id: String },
    #[command(about = "Show one phone line")]
    Show { line_id: String },
    #[command(about = "List phone lines")]
    List(LineListArgs),
}

/// Logs go to stderr so stdout carries only the command payload.
fn init_logging(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));
    let builder = tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    // A second init (tests driving `run` twice) is harmless.
    let _ = match config.logging.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Pretty => builder.pretty().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    if let Ok(config) = AppConfig::load(LoadOptions::default()) {
        init_logging(&config);
    }

    let actor = cli.actor.as_deref();
    let result = match cli.command {
        Command::Migrate => commands::migrate::run(),
        Command::Seed => commands::seed::run(),
        Command::Config => commands::config::run(),
        Command::Verify => commands::verify::run(actor),
        Command::Dashboard(args) => commands::dashboard::run(actor, &args),
        Command::Role { command } => match command {
            RoleCommand::Assign { user_id, role } => {
                commands::role::assign(actor, &user_id, &role)
            }
            RoleCommand::Revoke { user_id } => commands::role::revoke(actor, &user_id),
        },
        Command::Line { command } => match command {
            LineCommand::Provision { vendor, did, serial } => {
                commands::line::provision(actor, &vendor, &did, &serial)
            }
            LineCommand::Allocate { line_id, seat } => {
                commands::line::allocate(actor, &line_id, &seat)
            }
            LineCommand::Transfer { line_id, seat } => {
                commands::line::transfer(actor, &line_id, &seat)
            }
            LineCommand::Deallocate { line_id } => commands::line::deallocate(actor, &line_id),
            LineCommand::Maintenance { line_id } => commands::line::maintenance(actor, &line_id),
            LineCommand::Restore { line_id } => commands::line::restore(actor, &line_id),
            LineCommand::Retire { line_id } => commands::line::retire(actor, &line_id),
            LineCommand::Show { line_id } => commands::line::show(actor, &line_id),
            LineCommand::List(args) => commands::line::list(actor, &args),
        },
    };

    tracing::debug!(event_name = "cli.command.finished", exit_code = result.exit_code);
    println!("{}", result.output);
    ExitCode::from(result.exit_code)
}
