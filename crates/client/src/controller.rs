//! Request detail view without rendering: which controls to show, how a mutation is issued,
//! and what the user is told afterwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{info, warn};

use opsdesk_core::domain::request::{RequestDetail, RequestId, RequestPatch, RequestStatus};
use opsdesk_core::domain::user::User;
use opsdesk_core::errors::{ErrorKind, Presentation};
use opsdesk_core::lifecycle::{GuardTable, RequestAction};

use crate::api::{ClientError, WorkflowApi};

/// A user-triggered action with its payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionRequest {
    Approve { comment: String },
    Reject { comment: String },
    Cancel,
    ChangeStatus { status: RequestStatus, note: Option<String> },
    Edit(RequestPatch),
    Comment { text: String },
}

impl ActionRequest {
    pub fn action(&self) -> RequestAction {
        match self {
            Self::Approve { .. } => RequestAction::Approve,
            Self::Reject { .. } => RequestAction::Reject,
            Self::Cancel => RequestAction::Cancel,
            Self::ChangeStatus { status, .. } => RequestAction::ChangeStatus(*status),
            Self::Edit(_) => RequestAction::Edit,
            Self::Comment { .. } => RequestAction::Comment,
        }
    }

    fn success_message(&self) -> String {
        match self {
            Self::Approve { .. } => "Request approved".to_string(),
            Self::Reject { .. } => "Request rejected".to_string(),
            Self::Cancel => "Request cancelled".to_string(),
            Self::ChangeStatus { status, .. } => format!("Status changed to {status}"),
            Self::Edit(_) => "Request updated".to_string(),
            Self::Comment { .. } => "Comment added".to_string(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BannerTone {
    Success,
    Failure,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Banner {
    pub tone: BannerTone,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl Banner {
    fn success(message: String) -> Self {
        Self { tone: BannerTone::Success, message, kind: None, field: None }
    }

    fn failure(error: &ClientError) -> Self {
        let kind = error.kind();
        let (message, field) = match (kind.presentation(), error) {
            (Presentation::InlineField, ClientError::Validation { field, message }) => {
                (message.clone(), field.clone())
            }
            _ => (kind.user_message().to_string(), None),
        };
        Self { tone: BannerTone::Failure, message, kind: Some(kind), field }
    }
}

#[derive(Clone, Debug, Default)]
pub struct DetailState {
    pub detail: Option<RequestDetail>,
    pub not_found: bool,
    pub banner: Option<Banner>,
    pub sign_in_required: bool,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ActionOutcome {
    Completed,
    /// Another mutation was already in flight; nothing was sent.
    Skipped,
    Failed(ClientError),
}

struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire).ok()?;
        Some(Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

pub struct DetailController {
    api: Arc<dyn WorkflowApi>,
    viewer: User,
    request_id: RequestId,
    guards: GuardTable,
    state: Mutex<DetailState>,
    in_flight: AtomicBool,
}

impl DetailController {
    pub fn new(api: Arc<dyn WorkflowApi>, viewer: User, request_id: RequestId) -> Self {
        Self {
            api,
            viewer,
            request_id,
            guards: GuardTable,
            state: Mutex::new(DetailState::default()),
            in_flight: AtomicBool::new(false),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, DetailState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn state(&self) -> DetailState {
        self.lock_state().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    pub async fn load(&self) -> Result<(), ClientError> {
        match self.api.fetch_request(self.request_id).await {
            Ok(detail) => {
                let mut state = self.lock_state();
                state.detail = Some(detail);
                state.not_found = false;
                Ok(())
            }
            Err(error) => {
                self.record_failure(&error).await;
                Err(error)
            }
        }
    }

    /// Controls the viewer may use right now. Empty while a mutation is in flight.
    pub fn controls(&self) -> Vec<RequestAction> {
        if self.is_busy() {
            return Vec::new();
        }
        self.lock_state()
            .detail
            .as_ref()
            .map(|detail| self.guards.allowed_actions(&self.viewer, &detail.request))
            .unwrap_or_default()
    }

    pub async fn perform(&self, input: ActionRequest) -> ActionOutcome {
        let action = input.action();
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            return ActionOutcome::Skipped;
        };

        // Read under the flag so the guard sees the detail the last mutation re-fetched.
        let current = self.lock_state().detail.clone();
        let Some(detail) = current else {
            let error = ClientError::NotFound(format!("request {} is not loaded", self.request_id));
            return ActionOutcome::Failed(error);
        };

        if let Err(violation) = self.guards.check(&self.viewer, &detail.request, action) {
            let error = ClientError::Authorization(violation.to_string());
            self.lock_state().banner = Some(Banner::failure(&error));
            return ActionOutcome::Failed(error);
        }

        match self.dispatch(&input).await {
            Ok(()) => {
                info!(
                    event_name = "client.detail.action_completed",
                    request_id = %self.request_id,
                    action = %action,
                    "detail action completed"
                );
                let refreshed = self.load().await;
                if refreshed.is_ok() {
                    self.lock_state().banner = Some(Banner::success(input.success_message()));
                }
                ActionOutcome::Completed
            }
            Err(error) => {
                warn!(
                    event_name = "client.detail.action_failed",
                    request_id = %self.request_id,
                    action = %action,
                    error_class = error.kind().as_str(),
                    "detail action failed"
                );
                self.record_failure(&error).await;
                ActionOutcome::Failed(error)
            }
        }
    }

    async fn dispatch(&self, input: &ActionRequest) -> Result<(), ClientError> {
        let id = self.request_id;
        match input {
            ActionRequest::Approve { comment } => self.api.approve(id, comment).await,
            ActionRequest::Reject { comment } => self.api.reject(id, comment).await,
            ActionRequest::Cancel => self.api.cancel(id).await,
            ActionRequest::ChangeStatus { status, note } => {
                self.api.change_status(id, *status, note.as_deref()).await
            }
            ActionRequest::Edit(patch) => self.api.update_request(id, patch).await.map(|_| ()),
            ActionRequest::Comment { text } => self.api.add_comment(id, text).await.map(|_| ()),
        }
    }

    async fn record_failure(&self, error: &ClientError) {
        let presentation = error.kind().presentation();
        if presentation == Presentation::SignIn {
            if let Err(teardown) = self.api.logout().await {
                warn!(
                    event_name = "client.session.teardown_failed",
                    error = %teardown,
                    "could not clear session after authentication failure"
                );
            }
        }

        let mut state = self.lock_state();
        match presentation {
            Presentation::NotFoundState if state.detail.is_none() => state.not_found = true,
            Presentation::SignIn => state.sign_in_required = true,
            _ => {}
        }
        state.banner = Some(Banner::failure(error));
    }
}
