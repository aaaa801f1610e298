use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{info, warn};
use uuid::Uuid;

use opsdesk_core::config::AppConfig;
use opsdesk_core::domain::comment::Comment;
use opsdesk_core::domain::request::{
    NewRequest, Request, RequestDetail, RequestFilters, RequestId, RequestPatch, RequestStatus,
};
use opsdesk_core::domain::request_type::{
    NewRequestType, RequestType, RequestTypeId, RequestTypePatch,
};
use opsdesk_core::domain::user::{AuthGrant, Registration, User};
use opsdesk_core::errors::DomainError;
use opsdesk_core::lifecycle::LifecycleCommand;
use opsdesk_core::session::{CredentialStore, Session};

use crate::api::{precheck_command, precheck_comment, ClientError, WorkflowApi};
use crate::wire::{CommentBody, ErrorBody, LoginBody, StatusBody};

pub const CORRELATION_HEADER: &str = "X-Correlation-Id";

/// REST implementation of [`WorkflowApi`].
#[derive(Clone)]
pub struct HttpWorkflowClient {
    http: Client,
    base_url: String,
    credentials: Arc<dyn CredentialStore>,
}

impl HttpWorkflowClient {
    pub fn new(
        base_url: impl Into<String>,
        timeout: Duration,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| ClientError::Transport(error.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, credentials })
    }

    pub fn from_config(
        config: &AppConfig,
        credentials: Arc<dyn CredentialStore>,
    ) -> Result<Self, ClientError> {
        Self::new(config.api_base(), Duration::from_secs(config.api.timeout_secs), credentials)
    }

    fn bearer(&self) -> Result<String, ClientError> {
        self.credentials
            .read()?
            .map(|session| session.bearer().to_string())
            .ok_or(ClientError::Unauthenticated)
    }

    async fn dispatch(
        &self,
        operation: &'static str,
        method: Method,
        path: &str,
        authenticated: bool,
        build: impl FnOnce(RequestBuilder) -> RequestBuilder + Send,
    ) -> Result<Response, ClientError> {
        let token = if authenticated { Some(self.bearer()?) } else { None };
        let correlation_id = Uuid::new_v4().to_string();

        let mut request = self
            .http
            .request(method.clone(), format!("{}{path}", self.base_url))
            .header(CORRELATION_HEADER, &correlation_id);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }

        let started = Instant::now();
        let response = build(request).send().await.map_err(|error| {
            warn!(
                event_name = "client.http.transport_error",
                correlation_id = %correlation_id,
                operation,
                method = %method,
                path,
                error = %error,
                "api call failed before a response was received"
            );
            ClientError::Transport(error.to_string())
        })?;

        let status = response.status();
        info!(
            event_name = "client.http.response",
            correlation_id = %correlation_id,
            operation,
            method = %method,
            path,
            status = status.as_u16(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "api call completed"
        );

        if status.is_success() {
            return Ok(response);
        }
        Err(self.failure(status, response, &correlation_id).await)
    }

    async fn failure(
        &self,
        status: StatusCode,
        response: Response,
        correlation_id: &str,
    ) -> ClientError {
        let raw = response.text().await.unwrap_or_default();
        let body = ErrorBody::parse(&raw);
        let message = body.message.unwrap_or_else(|| status.to_string());

        match status {
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                ClientError::Validation { field: body.field, message }
            }
            StatusCode::UNAUTHORIZED => {
                if let Err(error) = self.credentials.teardown() {
                    warn!(
                        event_name = "client.session.teardown_failed",
                        correlation_id = %correlation_id,
                        error = %error,
                        "could not clear rejected session"
                    );
                }
                info!(
                    event_name = "client.session.expired",
                    correlation_id = %correlation_id,
                    "server rejected the session; credentials cleared"
                );
                ClientError::Unauthenticated
            }
            StatusCode::FORBIDDEN | StatusCode::CONFLICT => ClientError::Authorization(message),
            StatusCode::NOT_FOUND => ClientError::NotFound(message),
            _ => ClientError::Transport(message),
        }
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ClientError> {
        response.json::<T>().await.map_err(|error| ClientError::Transport(error.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        operation: &'static str,
        path: &str,
    ) -> Result<T, ClientError> {
        let response = self.dispatch(operation, Method::GET, path, true, |request| request).await?;
        Self::decode(response).await
    }

    async fn lifecycle(
        &self,
        operation: &'static str,
        id: RequestId,
        command: LifecycleCommand,
    ) -> Result<(), ClientError> {
        precheck_command(&command)?;

        let (path, body) = match &command {
            LifecycleCommand::Approve { comment } => {
                (format!("/requests/{id}/approve"), serde_json::to_value(CommentBody { comment }))
            }
            LifecycleCommand::Reject { comment } => {
                (format!("/requests/{id}/reject"), serde_json::to_value(CommentBody { comment }))
            }
            LifecycleCommand::Cancel => {
                (format!("/requests/{id}/cancel"), Ok(serde_json::Value::Null))
            }
            LifecycleCommand::ChangeStatus { status, note } => (
                format!("/requests/{id}/status"),
                serde_json::to_value(StatusBody { status: *status, note: note.as_deref() }),
            ),
        };
        let body = body.map_err(|error| ClientError::Transport(error.to_string()))?;

        self.dispatch(operation, Method::POST, &path, true, move |request| {
            if body.is_null() {
                request
            } else {
                request.json(&body)
            }
        })
        .await?;

        info!(
            event_name = "client.request.transitioned",
            request_id = %id,
            action = %command.action(),
            "request lifecycle command accepted"
        );
        Ok(())
    }

    fn store_grant(&self, grant: AuthGrant) -> Result<User, ClientError> {
        let user = grant.user.clone();
        self.credentials.init(Session::new(grant.token, grant.user))?;
        Ok(user)
    }
}

fn filter_query(filters: &RequestFilters) -> Vec<(&'static str, String)> {
    let mut query = Vec::new();
    if let Some(status) = filters.status {
        query.push(("status", status.to_string()));
    }
    if let Some(type_id) = filters.type_id {
        query.push(("typeId", type_id.to_string()));
    }
    if let Some(priority) = filters.priority {
        query.push(("priority", priority.to_string()));
    }
    query
}

#[async_trait]
impl WorkflowApi for HttpWorkflowClient {
    async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let body = LoginBody { email, password };
        let response = self
            .dispatch("auth.login", Method::POST, "/auth/login", false, |request| {
                request.json(&body)
            })
            .await?;
        let grant: AuthGrant = Self::decode(response).await?;
        self.store_grant(grant)
    }

    async fn register(&self, registration: &Registration) -> Result<User, ClientError> {
        let response = self
            .dispatch("auth.register", Method::POST, "/auth/register", false, |request| {
                request.json(registration)
            })
            .await?;
        let grant: AuthGrant = Self::decode(response).await?;
        self.store_grant(grant)
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        let user: User = self.get_json("auth.me", "/auth/me").await?;
        if let Some(session) = self.credentials.read()? {
            self.credentials.init(Session { user: Some(user.clone()), ..session })?;
        }
        Ok(user)
    }

    async fn logout(&self) -> Result<(), ClientError> {
        self.credentials.teardown()?;
        info!(event_name = "client.session.logout", "credentials cleared");
        Ok(())
    }

    async fn list_requests(&self, filters: &RequestFilters) -> Result<Vec<Request>, ClientError> {
        let query = filter_query(filters);
        let response = self
            .dispatch("requests.list", Method::GET, "/requests", true, |request| {
                request.query(&query)
            })
            .await?;
        Self::decode(response).await
    }

    async fn fetch_request(&self, id: RequestId) -> Result<RequestDetail, ClientError> {
        self.get_json("requests.fetch", &format!("/requests/{id}")).await
    }

    async fn create_request(&self, input: &NewRequest) -> Result<Request, ClientError> {
        input.validate()?;
        let response = self
            .dispatch("requests.create", Method::POST, "/requests", true, |request| {
                request.json(input)
            })
            .await?;
        let created: Request = Self::decode(response).await?;
        info!(event_name = "client.request.created", request_id = %created.id, "request submitted");
        Ok(created)
    }

    async fn update_request(
        &self,
        id: RequestId,
        patch: &RequestPatch,
    ) -> Result<Request, ClientError> {
        patch.validate()?;
        let response = self
            .dispatch("requests.update", Method::PUT, &format!("/requests/{id}"), true, |request| {
                request.json(patch)
            })
            .await?;
        Self::decode(response).await
    }

    async fn approve(&self, id: RequestId, comment: &str) -> Result<(), ClientError> {
        let command = LifecycleCommand::Approve { comment: comment.to_string() };
        self.lifecycle("requests.approve", id, command).await
    }

    async fn reject(&self, id: RequestId, comment: &str) -> Result<(), ClientError> {
        let command = LifecycleCommand::Reject { comment: comment.to_string() };
        self.lifecycle("requests.reject", id, command).await
    }

    async fn cancel(&self, id: RequestId) -> Result<(), ClientError> {
        self.lifecycle("requests.cancel", id, LifecycleCommand::Cancel).await
    }

    async fn change_status(
        &self,
        id: RequestId,
        status: RequestStatus,
        note: Option<&str>,
    ) -> Result<(), ClientError> {
        let command = LifecycleCommand::ChangeStatus { status, note: note.map(str::to_string) };
        self.lifecycle("requests.change_status", id, command).await
    }

    async fn add_comment(&self, id: RequestId, text: &str) -> Result<Comment, ClientError> {
        precheck_comment(text)?;
        let body = CommentBody { comment: text };
        let path = format!("/requests/{id}/comments");
        let response = self
            .dispatch("requests.comment", Method::POST, &path, true, |request| request.json(&body))
            .await?;
        Self::decode(response).await
    }

    async fn list_request_types(&self) -> Result<Vec<RequestType>, ClientError> {
        self.get_json("request_types.list", "/request-types").await
    }

    async fn create_request_type(
        &self,
        input: &NewRequestType,
    ) -> Result<RequestType, ClientError> {
        if input.code.trim().is_empty() || input.name.trim().is_empty() {
            let field = if input.code.trim().is_empty() { "code" } else { "name" };
            return Err(DomainError::validation(field, format!("{field} is required")).into());
        }
        let response = self
            .dispatch("request_types.create", Method::POST, "/request-types", true, |request| {
                request.json(input)
            })
            .await?;
        Self::decode(response).await
    }

    async fn update_request_type(
        &self,
        id: RequestTypeId,
        patch: &RequestTypePatch,
    ) -> Result<RequestType, ClientError> {
        if patch.is_empty() {
            return Err(ClientError::validation("requestType", "at least one field must change"));
        }
        let path = format!("/request-types/{id}");
        let response = self
            .dispatch("request_types.update", Method::PUT, &path, true, |request| {
                request.json(patch)
            })
            .await?;
        Self::decode(response).await
    }
}
