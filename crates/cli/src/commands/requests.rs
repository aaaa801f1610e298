use std::sync::Arc;

use opsdesk_client::{ActionOutcome, ActionRequest, DetailController, WorkflowApi};
use opsdesk_core::domain::request::{NewRequest, RequestFilters, RequestId, RequestPatch};
use opsdesk_core::domain::request_type::RequestTypeId;

use crate::commands::CommandResult;
use crate::RequestsCommand;

pub async fn run(api: Arc<dyn WorkflowApi>, command: RequestsCommand) -> CommandResult {
    match command {
        RequestsCommand::List { status, type_id, priority } => {
            let filters = RequestFilters { status, type_id: type_id.map(RequestTypeId), priority };
            list(api.as_ref(), &filters).await
        }
        RequestsCommand::Show { id } => show(api.as_ref(), RequestId(id)).await,
        RequestsCommand::Create { type_id, title, description, amount, priority } => {
            let input = NewRequest {
                type_id: RequestTypeId(type_id),
                title,
                description: description.unwrap_or_default(),
                amount,
                priority,
            };
            create(api.as_ref(), &input).await
        }
        RequestsCommand::Edit { id, title, description, amount, priority } => {
            let patch = RequestPatch { title, description, amount, priority };
            perform(api, "requests.edit", RequestId(id), ActionRequest::Edit(patch)).await
        }
        RequestsCommand::Cancel { id } => {
            perform(api, "requests.cancel", RequestId(id), ActionRequest::Cancel).await
        }
        RequestsCommand::Approve { id, comment } => {
            let action = ActionRequest::Approve { comment };
            perform(api, "requests.approve", RequestId(id), action).await
        }
        RequestsCommand::Reject { id, comment } => {
            let action = ActionRequest::Reject { comment };
            perform(api, "requests.reject", RequestId(id), action).await
        }
        RequestsCommand::Status { id, to, note } => {
            let action = ActionRequest::ChangeStatus { status: to, note };
            perform(api, "requests.status", RequestId(id), action).await
        }
        RequestsCommand::Comment { id, text } => {
            perform(api, "requests.comment", RequestId(id), ActionRequest::Comment { text }).await
        }
        RequestsCommand::Actions { id } => actions(api, RequestId(id)).await,
    }
}

async fn list(api: &dyn WorkflowApi, filters: &RequestFilters) -> CommandResult {
    match api.list_requests(filters).await {
        Ok(requests) => CommandResult::success_with(
            "requests.list",
            format!("{} request(s)", requests.len()),
            &requests,
        ),
        Err(error) => CommandResult::client_failure("requests.list", &error),
    }
}

async fn show(api: &dyn WorkflowApi, id: RequestId) -> CommandResult {
    match api.fetch_request(id).await {
        Ok(detail) => CommandResult::success_with(
            "requests.show",
            format!("request {id} is {}", detail.request.status),
            &detail,
        ),
        Err(error) => CommandResult::client_failure("requests.show", &error),
    }
}

async fn create(api: &dyn WorkflowApi, input: &NewRequest) -> CommandResult {
    match api.create_request(input).await {
        Ok(request) => CommandResult::success_with(
            "requests.create",
            format!("created request {} ({})", request.id, request.status),
            &request,
        ),
        Err(error) => CommandResult::client_failure("requests.create", &error),
    }
}

/// Loads the request as the signed-in user, then runs the action through the detail controller so
/// the CLI refuses exactly what the detail view would hide.
async fn perform(
    api: Arc<dyn WorkflowApi>,
    command: &str,
    id: RequestId,
    action: ActionRequest,
) -> CommandResult {
    let controller = match open(api, id).await {
        Ok(controller) => controller,
        Err(error) => return CommandResult::client_failure(command, &error),
    };

    match controller.perform(action).await {
        ActionOutcome::Completed => {
            let state = controller.state();
            let message = state
                .banner
                .map(|banner| banner.message)
                .unwrap_or_else(|| format!("request {id} updated"));
            match state.detail {
                Some(detail) => CommandResult::success_with(command, message, &detail),
                None => CommandResult::success(command, message),
            }
        }
        ActionOutcome::Skipped => CommandResult::failure(
            command,
            "in_flight",
            format!("another action on request {id} is still running"),
            4,
        ),
        ActionOutcome::Failed(error) => CommandResult::client_failure(command, &error),
    }
}

async fn actions(api: Arc<dyn WorkflowApi>, id: RequestId) -> CommandResult {
    let controller = match open(api, id).await {
        Ok(controller) => controller,
        Err(error) => return CommandResult::client_failure("requests.actions", &error),
    };

    let controls: Vec<String> =
        controller.controls().iter().map(|action| action.to_string()).collect();
    CommandResult::success_with("requests.actions", controls.join(", "), &controls)
}

async fn open(
    api: Arc<dyn WorkflowApi>,
    id: RequestId,
) -> Result<DetailController, opsdesk_client::ClientError> {
    let viewer = api.current_user().await?;
    let controller = DetailController::new(api, viewer, id);
    controller.load().await?;
    Ok(controller)
}
