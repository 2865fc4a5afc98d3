pub mod config;
pub mod dashboard;
pub mod line;
pub mod migrate;
pub mod role;
pub mod seed;
pub mod verify;

use std::future::Future;

use linekeeper_core::config::{AppConfig, LoadOptions};
use linekeeper_core::domain::identity::Session;
use linekeeper_core::errors::{ApplicationError, InterfaceError};
use linekeeper_db::{connect_with_config, migrations, LineDesk, OperationError};
use serde::Serialize;
use serde_json::Value;
use tokio::runtime::Runtime;

/// The request reached the desk and was refused (role, state or input).
pub const EXIT_REJECTED: u8 = 7;
/// Storage failed underneath an otherwise valid request.
pub const EXIT_UNAVAILABLE: u8 = 8;
/// `verify` found stored counters that disagree with the line rows.
pub const EXIT_COUNTER_DRIFT: u8 = 9;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        Self::ok(command, message.into(), None)
    }

    pub fn success_with_data(
        command: &str,
        message: impl Into<String>,
        data: impl Serialize,
    ) -> Self {
        Self::ok(command, message.into(), serde_json::to_value(data).ok())
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        Self::error(command, error_class, message.into(), exit_code, None)
    }

    pub fn failure_with_data(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
        data: impl Serialize,
    ) -> Self {
        let data = serde_json::to_value(data).ok();
        Self::error(command, error_class, message.into(), exit_code, data)
    }

    fn ok(command: &str, message: String, data: Option<Value>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message,
            data,
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    fn error(
        command: &str,
        error_class: &str,
        message: String,
        exit_code: u8,
        data: Option<Value>,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message,
            data,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// A migrated database behind a [`LineDesk`], plus the runtime that drives it.
pub(crate) struct Workspace {
    runtime: Runtime,
    pub desk: LineDesk,
}

impl Workspace {
    pub(crate) fn open(command: &str) -> Result<Self, CommandResult> {
        let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
            CommandResult::failure(
                command,
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            )
        })?;

        let runtime =
            tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
                CommandResult::failure(
                    command,
                    "runtime_init",
                    format!("failed to initialize async runtime: {error}"),
                    3,
                )
            })?;

        let desk = runtime
            .block_on(async {
                let pool = connect_with_config(&config.database)
                    .await
                    .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
                migrations::run_pending(&pool)
                    .await
                    .map_err(|error| ("migration", error.to_string(), 5u8))?;
                Ok::<LineDesk, (&'static str, String, u8)>(
                    LineDesk::new(pool).with_thresholds(config.dashboard.thresholds()),
                )
            })
            .map_err(|(error_class, message, exit_code)| {
                CommandResult::failure(command, error_class, message, exit_code)
            })?;

        Ok(Self { runtime, desk })
    }

    pub(crate) fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    pub(crate) fn close(self) {
        self.runtime.block_on(self.desk.pool().close());
    }
}

/// Commands that act on data need to know who is acting.
pub(crate) fn require_session(
    command: &str,
    actor: Option<&str>,
) -> Result<Session, CommandResult> {
    match actor.map(str::trim) {
        Some(user_id) if !user_id.is_empty() => Ok(Session::new(user_id)),
        _ => Err(CommandResult::failure(
            command,
            "missing_actor",
            "pass --as <USER_ID> to say who is performing this command",
            2,
        )),
    }
}

pub(crate) fn operation_failure(command: &str, error: OperationError) -> CommandResult {
    let detail = error.to_string();
    let interface = ApplicationError::from(error).into_interface(format!("cli-{command}"));
    let exit_code = match interface {
        InterfaceError::BadRequest { .. } => EXIT_REJECTED,
        InterfaceError::ServiceUnavailable { .. } | InterfaceError::Internal { .. } => {
            EXIT_UNAVAILABLE
        }
    };
    CommandResult::failure(
        command,
        interface.kind().as_str(),
        format!("{} ({detail})", interface.user_message()),
        exit_code,
    )
}
