use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::request::RequestStatus;
use crate::domain::user::User;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AuditEventId(pub i64);

impl fmt::Display for AuditEventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Kind of entry in a request's audit log.
///
/// The lifecycle engine only produces the four transition kinds. `Created` and `CommentAdded`
/// exist because some servers log them; they are decoded for display and never emitted here.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AuditEventType {
    #[serde(rename = "APPROVE", alias = "APPROVED")]
    Approve,
    #[serde(rename = "REJECT", alias = "REJECTED")]
    Reject,
    #[serde(rename = "CANCEL", alias = "CANCELLED")]
    Cancel,
    #[serde(rename = "STATUS_CHANGE", alias = "STATUS_CHANGED")]
    StatusChange,
    #[serde(rename = "CREATED")]
    Created,
    #[serde(rename = "COMMENT_ADDED")]
    CommentAdded,
}

impl AuditEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Approve => "APPROVE",
            Self::Reject => "REJECT",
            Self::Cancel => "CANCEL",
            Self::StatusChange => "STATUS_CHANGE",
            Self::Created => "CREATED",
            Self::CommentAdded => "COMMENT_ADDED",
        }
    }
}

impl fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub id: AuditEventId,
    pub actor: User,
    pub event_type: AuditEventType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_status: Option<RequestStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(with = "crate::domain::timestamp")]
    pub created_at: DateTime<Utc>,
}

impl AuditEvent {
    pub fn transition(
        id: AuditEventId,
        actor: User,
        event_type: AuditEventType,
        from: RequestStatus,
        to: RequestStatus,
        note: Option<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            actor,
            event_type,
            from_status: Some(from),
            to_status: Some(to),
            note,
            created_at,
        }
    }
}
