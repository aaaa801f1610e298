pub mod auth;
pub mod config;
pub mod doctor;
pub mod requests;
pub mod types;

use std::sync::Arc;

use opsdesk_client::{ClientError, WorkflowApi};
use opsdesk_core::errors::ErrorKind;
use serde::Serialize;
use serde_json::Value;

use crate::WorkflowCommand;

pub const EXIT_CONFIG: u8 = 2;

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

    pub fn success_with(command: &str, message: impl Into<String>, data: &impl Serialize) -> Self {
        match serde_json::to_value(data) {
            Ok(data) => Self::ok(command, message.into(), Some(data)),
            Err(error) => Self::failure(command, "serialization", error.to_string(), 1),
        }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// One outcome per client failure; validation failures carry the offending field.
    pub fn client_failure(command: &str, error: &ClientError) -> Self {
        let kind = error.kind();
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(kind.as_str().to_string()),
            message: error.to_string(),
            data: error.field().map(|field| serde_json::json!({ "field": field })),
        };
        Self { exit_code: exit_code_for(kind), output: serialize_payload(payload) }
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
}

pub fn exit_code_for(kind: ErrorKind) -> u8 {
    match kind {
        ErrorKind::Validation => 3,
        ErrorKind::Authorization => 4,
        ErrorKind::NotFound => 5,
        ErrorKind::Unauthenticated => 6,
        ErrorKind::Transport => 7,
    }
}

/// Runs a remote workflow command against any [`WorkflowApi`] implementation.
pub async fn dispatch(api: Arc<dyn WorkflowApi>, command: WorkflowCommand) -> CommandResult {
    match command {
        WorkflowCommand::Login { email, password } => {
            auth::login(api.as_ref(), &email, &password).await
        }
        WorkflowCommand::Logout => auth::logout(api.as_ref()).await,
        WorkflowCommand::Whoami => auth::whoami(api.as_ref()).await,
        WorkflowCommand::Register { email, password, role, manager_id } => {
            auth::register(api.as_ref(), email, password, role, manager_id).await
        }
        WorkflowCommand::Requests(command) => requests::run(api, command).await,
        WorkflowCommand::Types(command) => types::run(api.as_ref(), command).await,
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
