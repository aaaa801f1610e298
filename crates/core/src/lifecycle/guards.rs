use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::audit::AuditEventType;
use crate::domain::request::{Request, RequestStatus};
use crate::domain::user::{Role, User};
use crate::lifecycle::states::{ActorRelation, RequestAction};

/// Who may fire a transition.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Requirement {
    AssignedManager,
    Requester,
    Admin,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionRule {
    pub from: RequestStatus,
    pub to: RequestStatus,
    pub action: RequestAction,
    pub requirement: Requirement,
    pub event_type: AuditEventType,
}

const TRANSITIONS: [TransitionRule; 5] = [
    TransitionRule {
        from: RequestStatus::Submitted,
        to: RequestStatus::Approved,
        action: RequestAction::Approve,
        requirement: Requirement::AssignedManager,
        event_type: AuditEventType::Approve,
    },
    TransitionRule {
        from: RequestStatus::Submitted,
        to: RequestStatus::Rejected,
        action: RequestAction::Reject,
        requirement: Requirement::AssignedManager,
        event_type: AuditEventType::Reject,
    },
    TransitionRule {
        from: RequestStatus::Submitted,
        to: RequestStatus::Cancelled,
        action: RequestAction::Cancel,
        requirement: Requirement::Requester,
        event_type: AuditEventType::Cancel,
    },
    TransitionRule {
        from: RequestStatus::Approved,
        to: RequestStatus::InProgress,
        action: RequestAction::ChangeStatus(RequestStatus::InProgress),
        requirement: Requirement::Admin,
        event_type: AuditEventType::StatusChange,
    },
    TransitionRule {
        from: RequestStatus::InProgress,
        to: RequestStatus::Done,
        action: RequestAction::ChangeStatus(RequestStatus::Done),
        requirement: Requirement::Admin,
        event_type: AuditEventType::StatusChange,
    },
];

#[derive(Clone, Debug, Error, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GuardViolation {
    #[error("role {required} is required, caller is {actual}")]
    RoleRequired { required: Role, actual: Role },
    #[error("caller is not the manager assigned to this request")]
    NotAssignedManager,
    #[error("only the requester may do this")]
    NotRequester,
    #[error("request must be {required}, it is {actual}")]
    StatusMismatch { required: RequestStatus, actual: RequestStatus },
    #[error("no transition exists for {action}")]
    NoTransition { action: RequestAction },
}

/// The single source of truth for who may do what to a request in which status.
///
/// Control visibility on the client and enforcement in [`crate::workflow::WorkflowService`] both
/// read this table, so the two cannot drift apart.
#[derive(Clone, Copy, Debug, Default)]
pub struct GuardTable;

impl GuardTable {
    pub fn transitions(&self) -> &'static [TransitionRule] {
        &TRANSITIONS
    }

    pub fn rule_for(&self, action: RequestAction) -> Option<&'static TransitionRule> {
        TRANSITIONS.iter().find(|rule| rule.action == action)
    }

    pub fn check(
        &self,
        actor: &User,
        request: &Request,
        action: RequestAction,
    ) -> Result<(), GuardViolation> {
        self.decide(actor.role, request.status, ActorRelation::of(actor, request), action)
    }

    pub fn allowed_actions(&self, actor: &User, request: &Request) -> Vec<RequestAction> {
        let relation = ActorRelation::of(actor, request);
        RequestAction::CONTROLS
            .into_iter()
            .filter(|action| self.decide(actor.role, request.status, relation, *action).is_ok())
            .collect()
    }

    /// Pure decision over `(role, status, relation)`; no request or user data is needed.
    pub fn decide(
        &self,
        role: Role,
        status: RequestStatus,
        relation: ActorRelation,
        action: RequestAction,
    ) -> Result<(), GuardViolation> {
        match action {
            RequestAction::Comment => Ok(()),
            RequestAction::Edit => {
                satisfies(Requirement::Requester, role, relation)?;
                require_status(RequestStatus::Submitted, status)
            }
            _ => {
                let rule = self.rule_for(action).ok_or(GuardViolation::NoTransition { action })?;
                satisfies(rule.requirement, role, relation)?;
                require_status(rule.from, status)
            }
        }
    }
}

fn satisfies(
    requirement: Requirement,
    role: Role,
    relation: ActorRelation,
) -> Result<(), GuardViolation> {
    match requirement {
        Requirement::AssignedManager => {
            if role != Role::Manager {
                return Err(GuardViolation::RoleRequired { required: Role::Manager, actual: role });
            }
            if !relation.is_assigned_manager {
                return Err(GuardViolation::NotAssignedManager);
            }
            Ok(())
        }
        Requirement::Requester => {
            relation.is_requester.then_some(()).ok_or(GuardViolation::NotRequester)
        }
        Requirement::Admin => {
            if role != Role::Admin {
                return Err(GuardViolation::RoleRequired { required: Role::Admin, actual: role });
            }
            Ok(())
        }
    }
}

fn require_status(required: RequestStatus, actual: RequestStatus) -> Result<(), GuardViolation> {
    if required != actual {
        return Err(GuardViolation::StatusMismatch { required, actual });
    }
    Ok(())
}
