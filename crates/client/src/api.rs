use async_trait::async_trait;
use thiserror::Error;

use opsdesk_core::domain::comment::Comment;
use opsdesk_core::domain::request::{
    NewRequest, Request, RequestDetail, RequestFilters, RequestId, RequestPatch, RequestStatus,
};
use opsdesk_core::domain::request_type::{
    NewRequestType, RequestType, RequestTypeId, RequestTypePatch,
};
use opsdesk_core::domain::user::{Registration, User};
use opsdesk_core::errors::{DomainError, ErrorKind};
use opsdesk_core::lifecycle::{LifecycleCommand, LifecycleEngine};
use opsdesk_core::session::SessionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ClientError {
    #[error("{message}")]
    Validation { field: Option<String>, message: String },
    #[error("not allowed: {0}")]
    Authorization(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("transport failure: {0}")]
    Transport(String),
}

impl ClientError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        Self::Validation { field: Some(field.to_string()), message: message.into() }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Authorization(_) => ErrorKind::Authorization,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Transport(_) => ErrorKind::Transport,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Validation { field, .. } => field.as_deref(),
            _ => None,
        }
    }
}

impl From<DomainError> for ClientError {
    fn from(error: DomainError) -> Self {
        match error.kind() {
            ErrorKind::Validation => Self::Validation {
                field: error.field().map(str::to_string),
                message: error.to_string(),
            },
            ErrorKind::Authorization => Self::Authorization(error.to_string()),
            ErrorKind::NotFound => Self::NotFound(error.to_string()),
            ErrorKind::Unauthenticated => Self::Unauthenticated,
            ErrorKind::Transport => Self::Transport(error.to_string()),
        }
    }
}

impl From<SessionError> for ClientError {
    fn from(error: SessionError) -> Self {
        Self::Transport(error.to_string())
    }
}

/// Operation surface of the request workflow server.
///
/// Implementations attach the stored session to every call except `login` and `register`, fail
/// with [`ClientError::Unauthenticated`] before sending when no session exists, and tear the
/// session down when the server rejects it.
#[async_trait]
pub trait WorkflowApi: Send + Sync {
    /// Signs in and stores the session in the credential store.
    async fn login(&self, email: &str, password: &str) -> Result<User, ClientError>;
    async fn register(&self, registration: &Registration) -> Result<User, ClientError>;
    async fn current_user(&self) -> Result<User, ClientError>;
    async fn logout(&self) -> Result<(), ClientError>;

    async fn list_requests(&self, filters: &RequestFilters) -> Result<Vec<Request>, ClientError>;
    async fn fetch_request(&self, id: RequestId) -> Result<RequestDetail, ClientError>;
    async fn create_request(&self, input: &NewRequest) -> Result<Request, ClientError>;
    async fn update_request(
        &self,
        id: RequestId,
        patch: &RequestPatch,
    ) -> Result<Request, ClientError>;

    async fn approve(&self, id: RequestId, comment: &str) -> Result<(), ClientError>;
    async fn reject(&self, id: RequestId, comment: &str) -> Result<(), ClientError>;
    async fn cancel(&self, id: RequestId) -> Result<(), ClientError>;
    async fn change_status(
        &self,
        id: RequestId,
        status: RequestStatus,
        note: Option<&str>,
    ) -> Result<(), ClientError>;
    async fn add_comment(&self, id: RequestId, text: &str) -> Result<Comment, ClientError>;

    async fn list_request_types(&self) -> Result<Vec<RequestType>, ClientError>;
    async fn create_request_type(
        &self,
        input: &NewRequestType,
    ) -> Result<RequestType, ClientError>;
    async fn update_request_type(
        &self,
        id: RequestTypeId,
        patch: &RequestTypePatch,
    ) -> Result<RequestType, ClientError>;
}

/// Input checks that never need the server: mandatory comments and status-change targets.
pub fn precheck_command(command: &LifecycleCommand) -> Result<(), ClientError> {
    LifecycleEngine::new().validate(command).map_err(|error| DomainError::from(error).into())
}

pub fn precheck_comment(text: &str) -> Result<(), ClientError> {
    if text.trim().is_empty() {
        return Err(ClientError::validation("comment", "comment text is required"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use opsdesk_core::domain::request::RequestStatus;
    use opsdesk_core::errors::{DomainError, ErrorKind};
    use opsdesk_core::lifecycle::LifecycleCommand;

    use super::{precheck_command, precheck_comment, ClientError};

    #[test]
    fn domain_errors_keep_kind_and_field() {
        let error = ClientError::from(DomainError::validation("title", "title is required"));
        assert_eq!(error.kind(), ErrorKind::Validation);
        assert_eq!(error.field(), Some("title"));

        let error = ClientError::from(DomainError::not_found("request", 4));
        assert_eq!(error, ClientError::NotFound("request 4 not found".to_string()));
    }

    #[test]
    fn prechecks_reject_blank_comments_and_foreign_targets() {
        let blank = LifecycleCommand::Approve { comment: " ".to_string() };
        assert_eq!(precheck_command(&blank).expect_err("blank").field(), Some("comment"));

        let target = LifecycleCommand::ChangeStatus { status: RequestStatus::Rejected, note: None };
        assert_eq!(precheck_command(&target).expect_err("target").field(), Some("status"));

        assert!(precheck_command(&LifecycleCommand::Cancel).is_ok());
        assert!(precheck_comment("\t").is_err());
    }
}
