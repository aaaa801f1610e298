use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::audit::{AuditEvent, AuditEventId};
use crate::domain::request::{Request, RequestDetail, RequestStatus};
use crate::domain::user::User;
use crate::errors::ErrorKind;
use crate::lifecycle::guards::{GuardTable, GuardViolation};
use crate::lifecycle::states::{LifecycleCommand, RequestAction, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LifecycleError {
    #[error("{action} requires a non-empty comment")]
    MissingComment { action: RequestAction },
    #[error("status {to} cannot be set through a status change")]
    UnsupportedTarget { to: RequestStatus },
    #[error("{action} is not allowed while the request is {status}: {violation}")]
    Forbidden { action: RequestAction, status: RequestStatus, violation: GuardViolation },
}

impl LifecycleError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MissingComment { .. } | Self::UnsupportedTarget { .. } => ErrorKind::Validation,
            Self::Forbidden { .. } => ErrorKind::Authorization,
        }
    }

    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingComment { .. } => Some("comment"),
            Self::UnsupportedTarget { .. } => Some("status"),
            Self::Forbidden { .. } => None,
        }
    }
}

/// Applies lifecycle commands to a request, enforcing the [`GuardTable`].
#[derive(Clone, Copy, Debug, Default)]
pub struct LifecycleEngine {
    guards: GuardTable,
}

impl LifecycleEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guards(&self) -> &GuardTable {
        &self.guards
    }

    pub fn initial_status(&self) -> RequestStatus {
        RequestStatus::Submitted
    }

    /// Input checks that do not depend on the request: mandatory comments and the set of
    /// statuses reachable through a status change.
    pub fn validate(&self, command: &LifecycleCommand) -> Result<(), LifecycleError> {
        match command {
            LifecycleCommand::Approve { comment } | LifecycleCommand::Reject { comment }
                if comment.trim().is_empty() =>
            {
                Err(LifecycleError::MissingComment { action: command.action() })
            }
            LifecycleCommand::ChangeStatus { status, .. }
                if self.guards.rule_for(RequestAction::ChangeStatus(*status)).is_none() =>
            {
                Err(LifecycleError::UnsupportedTarget { to: *status })
            }
            _ => Ok(()),
        }
    }

    pub fn plan(
        &self,
        request: &Request,
        actor: &User,
        command: &LifecycleCommand,
    ) -> Result<TransitionOutcome, LifecycleError> {
        self.validate(command)?;

        let action = command.action();
        self.guards.check(actor, request, action).map_err(|violation| {
            LifecycleError::Forbidden { action, status: request.status, violation }
        })?;

        let rule = self.guards.rule_for(action).ok_or(LifecycleError::Forbidden {
            action,
            status: request.status,
            violation: GuardViolation::NoTransition { action },
        })?;

        Ok(TransitionOutcome {
            from: request.status,
            to: rule.to,
            action,
            event_type: rule.event_type,
        })
    }

    /// Plans the command and, on success, moves the request to the new status and appends
    /// exactly one audit event. The detail is left untouched on error.
    pub fn apply(
        &self,
        detail: &mut RequestDetail,
        actor: &User,
        command: &LifecycleCommand,
        event_id: AuditEventId,
        now: DateTime<Utc>,
    ) -> Result<TransitionOutcome, LifecycleError> {
        let outcome = self.plan(&detail.request, actor, command)?;

        detail.request.status = outcome.to;
        detail.request.updated_at = now;
        detail.audit_events.push(AuditEvent::transition(
            event_id,
            actor.clone(),
            outcome.event_type,
            outcome.from,
            outcome.to,
            command.note().map(str::trim).filter(|note| !note.is_empty()).map(str::to_string),
            now,
        ));

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use crate::domain::audit::{AuditEventId, AuditEventType};
    use crate::domain::request::{Priority, Request, RequestDetail, RequestId, RequestStatus};
    use crate::domain::request_type::{RequestType, RequestTypeId};
    use crate::domain::user::{Role, User, UserId};
    use crate::errors::ErrorKind;
    use crate::lifecycle::engine::{LifecycleEngine, LifecycleError};
    use crate::lifecycle::guards::GuardViolation;
    use crate::lifecycle::states::LifecycleCommand;

    fn user(id: i64, role: Role) -> User {
        User {
            id: UserId(id),
            email: format!("user{id}@corp.test"),
            role,
            manager_id: None,
            active: true,
        }
    }

    fn detail(status: RequestStatus) -> RequestDetail {
        let created = Utc.with_ymd_and_hms(2026, 1, 5, 9, 0, 0).unwrap();
        RequestDetail::new(Request {
            id: RequestId(1),
            requester: User { manager_id: Some(UserId(2)), ..user(1, Role::Employee) },
            manager: Some(user(2, Role::Manager)),
            request_type: RequestType {
                id: RequestTypeId(3),
                code: "HW".to_string(),
                name: "Hardware".to_string(),
                active: true,
            },
            title: "Laptop".to_string(),
            description: String::new(),
            amount: None,
            priority: Priority::Medium,
            status,
            created_at: created,
            updated_at: created,
        })
    }

    fn approve(comment: &str) -> LifecycleCommand {
        LifecycleCommand::Approve { comment: comment.to_string() }
    }

    fn change_status(status: RequestStatus) -> LifecycleCommand {
        LifecycleCommand::ChangeStatus { status, note: None }
    }

    #[test]
    fn assigned_manager_approval_appends_one_event() {
        let engine = LifecycleEngine::new();
        let mut detail = detail(RequestStatus::Submitted);
        let now = detail.request.created_at + Duration::minutes(5);

        let outcome = engine
            .apply(&mut detail, &user(2, Role::Manager), &approve("ok"), AuditEventId(1), now)
            .expect("assigned manager may approve");

        assert_eq!(outcome.from, RequestStatus::Submitted);
        assert_eq!(outcome.to, RequestStatus::Approved);
        assert_eq!(detail.request.status, RequestStatus::Approved);
        assert_eq!(detail.request.updated_at, now);
        assert_eq!(detail.audit_events.len(), 1);

        let event = &detail.audit_events[0];
        assert_eq!(event.event_type, AuditEventType::Approve);
        assert_eq!(event.from_status, Some(RequestStatus::Submitted));
        assert_eq!(event.to_status, Some(RequestStatus::Approved));
        assert_eq!(event.note.as_deref(), Some("ok"));
        assert_eq!(event.actor.id, UserId(2));
    }

    #[test]
    fn empty_comment_is_validation_regardless_of_role() {
        let engine = LifecycleEngine::new();
        for actor in [user(2, Role::Manager), user(9, Role::Admin), user(1, Role::Employee)] {
            for command in
                [approve("  "), LifecycleCommand::Reject { comment: String::new() }]
            {
                let mut detail = detail(RequestStatus::Submitted);
                let error = engine
                    .apply(&mut detail, &actor, &command, AuditEventId(1), Utc::now())
                    .expect_err("empty comment must fail");
                assert_eq!(error.kind(), ErrorKind::Validation);
                assert!(matches!(error, LifecycleError::MissingComment { .. }));
                assert!(detail.audit_events.is_empty());
            }
        }
    }

    #[test]
    fn other_manager_is_rejected_and_status_is_unchanged() {
        let engine = LifecycleEngine::new();
        let mut detail = detail(RequestStatus::Submitted);

        let other_manager = user(5, Role::Manager);
        let error = engine
            .apply(&mut detail, &other_manager, &approve("ok"), AuditEventId(1), Utc::now())
            .expect_err("unassigned manager cannot approve");

        assert_eq!(error.kind(), ErrorKind::Authorization);
        assert!(matches!(
            error,
            LifecycleError::Forbidden { violation: GuardViolation::NotAssignedManager, .. }
        ));
        assert_eq!(detail.request.status, RequestStatus::Submitted);
        assert!(detail.audit_events.is_empty());
    }

    #[test]
    fn cancel_twice_is_rejected_the_second_time() {
        let engine = LifecycleEngine::new();
        let requester = detail(RequestStatus::Submitted).request.requester;
        let mut detail = detail(RequestStatus::Submitted);

        engine
            .apply(&mut detail, &requester, &LifecycleCommand::Cancel, AuditEventId(1), Utc::now())
            .expect("first cancel succeeds");
        assert_eq!(detail.request.status, RequestStatus::Cancelled);
        assert_eq!(detail.audit_events[0].event_type, AuditEventType::Cancel);
        assert_eq!(detail.audit_events[0].note, None);

        let error = engine
            .apply(&mut detail, &requester, &LifecycleCommand::Cancel, AuditEventId(2), Utc::now())
            .expect_err("second cancel fails");
        assert_eq!(error.kind(), ErrorKind::Authorization);
        assert_eq!(detail.audit_events.len(), 1);
    }

    #[test]
    fn admin_moves_work_to_done_and_cannot_go_back() {
        let engine = LifecycleEngine::new();
        let admin = user(9, Role::Admin);
        let mut detail = detail(RequestStatus::Approved);

        let in_progress = change_status(RequestStatus::InProgress);
        let done = change_status(RequestStatus::Done);

        engine
            .apply(&mut detail, &admin, &in_progress, AuditEventId(1), Utc::now())
            .expect("approved -> in progress");
        let error = engine
            .apply(&mut detail, &admin, &in_progress, AuditEventId(2), Utc::now())
            .expect_err("second in-progress must fail");
        assert_eq!(error.kind(), ErrorKind::Authorization);

        engine
            .apply(&mut detail, &admin, &done, AuditEventId(3), Utc::now())
            .expect("in progress -> done");
        assert_eq!(detail.request.status, RequestStatus::Done);

        let error = engine
            .apply(&mut detail, &admin, &in_progress, AuditEventId(4), Utc::now())
            .expect_err("done is terminal");
        assert!(matches!(
            error,
            LifecycleError::Forbidden {
                status: RequestStatus::Done,
                violation: GuardViolation::StatusMismatch { required: RequestStatus::Approved, .. },
                ..
            }
        ));

        let transitions: Vec<_> = detail
            .audit_events
            .iter()
            .map(|event| (event.event_type, event.from_status, event.to_status))
            .collect();
        assert_eq!(
            transitions,
            vec![
                (
                    AuditEventType::StatusChange,
                    Some(RequestStatus::Approved),
                    Some(RequestStatus::InProgress)
                ),
                (
                    AuditEventType::StatusChange,
                    Some(RequestStatus::InProgress),
                    Some(RequestStatus::Done)
                ),
            ]
        );
    }

    #[test]
    fn status_change_to_unlisted_target_is_validation() {
        let engine = LifecycleEngine::new();
        let error = engine
            .plan(
                &detail(RequestStatus::Submitted).request,
                &user(9, Role::Admin),
                &change_status(RequestStatus::Cancelled),
            )
            .expect_err("cancelled is not a status-change target");

        assert_eq!(error, LifecycleError::UnsupportedTarget { to: RequestStatus::Cancelled });
        assert_eq!(error.kind(), ErrorKind::Validation);
    }

    #[test]
    fn replay_is_deterministic_and_never_leaves_the_status_set() {
        let engine = LifecycleEngine::new();
        let admin = user(9, Role::Admin);
        let manager = user(2, Role::Manager);
        let commands = [
            (manager.clone(), approve("ok")),
            (admin.clone(), change_status(RequestStatus::InProgress)),
            (admin.clone(), change_status(RequestStatus::Done)),
            (admin.clone(), change_status(RequestStatus::InProgress)),
            (manager.clone(), LifecycleCommand::Reject { comment: "late".to_string() }),
        ];

        let run = || {
            let mut detail = detail(RequestStatus::Submitted);
            let mut results = Vec::new();
            for (index, (actor, command)) in commands.iter().enumerate() {
                let event_id = AuditEventId(index as i64);
                let result = engine.apply(&mut detail, actor, command, event_id, Utc::now());
                assert!(RequestStatus::ALL.contains(&detail.request.status));
                results.push(result.is_ok());
            }
            (detail.request.status, results, detail.audit_events.len())
        };

        let first = run();
        assert_eq!(first, run());
        assert_eq!(first.0, RequestStatus::Done);
        assert_eq!(first.1, vec![true, true, true, false, false]);
        assert_eq!(first.2, 3);
    }
}
