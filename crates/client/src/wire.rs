//! Request and error bodies of the REST contract that have no domain counterpart.

use serde::{Deserialize, Serialize};

use opsdesk_core::domain::request::RequestStatus;

#[derive(Debug, Serialize)]
pub(crate) struct LoginBody<'a> {
    pub email: &'a str,
    pub password: &'a str,
}

/// Shared by approve, reject, and add-comment.
#[derive(Debug, Serialize)]
pub(crate) struct CommentBody<'a> {
    pub comment: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct StatusBody<'a> {
    pub status: RequestStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<&'a str>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
}

impl ErrorBody {
    pub fn parse(raw: &str) -> Self {
        serde_json::from_str(raw).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use opsdesk_core::domain::request::RequestStatus;

    use super::{ErrorBody, StatusBody};

    #[test]
    fn status_body_omits_missing_note() {
        let status = StatusBody { status: RequestStatus::InProgress, note: None };
        let body = serde_json::to_value(status).expect("encode");
        assert_eq!(body, serde_json::json!({"status": "IN_PROGRESS"}));
    }

    #[test]
    fn error_body_tolerates_non_json() {
        assert!(ErrorBody::parse("<html>bad gateway</html>").message.is_none());
        let body = ErrorBody::parse(r#"{"message":"Title is required","field":"title"}"#);
        assert_eq!(body.message.as_deref(), Some("Title is required"));
        assert_eq!(body.field.as_deref(), Some("title"));
    }
}
