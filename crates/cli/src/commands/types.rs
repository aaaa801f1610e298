use opsdesk_client::WorkflowApi;
use opsdesk_core::domain::request_type::{NewRequestType, RequestTypeId, RequestTypePatch};

use crate::commands::CommandResult;
use crate::TypesCommand;

pub async fn run(api: &dyn WorkflowApi, command: TypesCommand) -> CommandResult {
    match command {
        TypesCommand::List => match api.list_request_types().await {
            Ok(types) => CommandResult::success_with(
                "types.list",
                format!("{} request type(s)", types.len()),
                &types,
            ),
            Err(error) => CommandResult::client_failure("types.list", &error),
        },
        TypesCommand::Create { code, name } => {
            match api.create_request_type(&NewRequestType { code, name }).await {
                Ok(created) => CommandResult::success_with(
                    "types.create",
                    format!("created request type {} ({})", created.code, created.id),
                    &created,
                ),
                Err(error) => CommandResult::client_failure("types.create", &error),
            }
        }
        TypesCommand::Update { id, code, name, active } => {
            let patch = RequestTypePatch { code, name, active };
            match api.update_request_type(RequestTypeId(id), &patch).await {
                Ok(updated) => CommandResult::success_with(
                    "types.update",
                    format!("updated request type {}", updated.code),
                    &updated,
                ),
                Err(error) => CommandResult::client_failure("types.update", &error),
            }
        }
    }
}
