use opsdesk_client::WorkflowApi;
use opsdesk_core::domain::user::{Registration, Role, UserId};

use crate::commands::CommandResult;

pub async fn login(api: &dyn WorkflowApi, email: &str, password: &str) -> CommandResult {
    match api.login(email, password).await {
        Ok(user) => CommandResult::success_with(
            "login",
            format!("signed in as {} ({})", user.email, user.role),
            &user,
        ),
        Err(error) => CommandResult::client_failure("login", &error),
    }
}

pub async fn logout(api: &dyn WorkflowApi) -> CommandResult {
    match api.logout().await {
        Ok(()) => CommandResult::success("logout", "signed out"),
        Err(error) => CommandResult::client_failure("logout", &error),
    }
}

pub async fn whoami(api: &dyn WorkflowApi) -> CommandResult {
    match api.current_user().await {
        Ok(user) => CommandResult::success_with(
            "whoami",
            format!("{} ({})", user.email, user.role),
            &user,
        ),
        Err(error) => CommandResult::client_failure("whoami", &error),
    }
}

pub async fn register(
    api: &dyn WorkflowApi,
    email: String,
    password: String,
    role: Role,
    manager_id: Option<i64>,
) -> CommandResult {
    let registration = Registration { email, password, role, manager_id: manager_id.map(UserId) };
    match api.register(&registration).await {
        Ok(user) => CommandResult::success_with(
            "register",
            format!("registered {} as {}", user.email, user.role),
            &user,
        ),
        Err(error) => CommandResult::client_failure("register", &error),
    }
}
