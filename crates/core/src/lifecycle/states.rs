use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::audit::AuditEventType;
use crate::domain::request::{Request, RequestStatus};
use crate::domain::user::User;

/// Everything a user can do on a request detail, whether or not it changes status.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "status", rename_all = "snake_case")]
pub enum RequestAction {
    Approve,
    Reject,
    Cancel,
    ChangeStatus(RequestStatus),
    Edit,
    Comment,
}

impl RequestAction {
    /// Every control the detail view can show, in display order.
    pub const CONTROLS: [RequestAction; 7] = [
        RequestAction::Approve,
        RequestAction::Reject,
        RequestAction::Cancel,
        RequestAction::ChangeStatus(RequestStatus::InProgress),
        RequestAction::ChangeStatus(RequestStatus::Done),
        RequestAction::Edit,
        RequestAction::Comment,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Reject => "reject",
            Self::Cancel => "cancel",
            Self::ChangeStatus(_) => "change_status",
            Self::Edit => "edit",
            Self::Comment => "comment",
        }
    }
}

impl fmt::Display for RequestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ChangeStatus(status) => write!(f, "change_status({status})"),
            other => f.write_str(other.label()),
        }
    }
}

/// How the acting user relates to the request under consideration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActorRelation {
    pub is_requester: bool,
    pub is_assigned_manager: bool,
}

impl ActorRelation {
    pub fn of(actor: &User, request: &Request) -> Self {
        Self {
            is_requester: request.requester_id() == actor.id,
            is_assigned_manager: request.manager_id() == Some(actor.id),
        }
    }
}

/// A status-changing command with its payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum LifecycleCommand {
    Approve { comment: String },
    Reject { comment: String },
    Cancel,
    ChangeStatus { status: RequestStatus, note: Option<String> },
}

impl LifecycleCommand {
    pub fn action(&self) -> RequestAction {
        match self {
            Self::Approve { .. } => RequestAction::Approve,
            Self::Reject { .. } => RequestAction::Reject,
            Self::Cancel => RequestAction::Cancel,
            Self::ChangeStatus { status, .. } => RequestAction::ChangeStatus(*status),
        }
    }

    pub fn note(&self) -> Option<&str> {
        match self {
            Self::Approve { comment } | Self::Reject { comment } => Some(comment.as_str()),
            Self::Cancel => None,
            Self::ChangeStatus { note, .. } => note.as_deref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub action: RequestAction,
    pub event_type: AuditEventType,
}
