//! In-memory reference implementation of the request workflow server contract.
//!
//! Every mutation goes through the same [`LifecycleEngine`] and
//! [`GuardTable`](crate::lifecycle::GuardTable) the client uses for control visibility, so
//! offline runs and test fixtures enforce exactly the rules a real server would. Users, request
//! types, and requests are held behind one `RwLock`; request reads re-materialise the requester,
//! manager, and type snapshots from the current tables.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{info, warn};
use uuid::Uuid;

use crate::catalog;
use crate::domain::audit::AuditEventId;
use crate::domain::comment::{Comment, CommentId};
use crate::domain::request::{
    NewRequest, Request, RequestDetail, RequestFilters, RequestId, RequestPatch, RequestStatus,
};
use crate::domain::request_type::{NewRequestType, RequestType, RequestTypeId, RequestTypePatch};
use crate::domain::user::{AuthGrant, Registration, Role, User, UserId};
use crate::errors::DomainError;
use crate::lifecycle::{LifecycleCommand, LifecycleEngine, RequestAction, TransitionOutcome};

pub const MIN_PASSWORD_LEN: usize = 6;

struct StoredUser {
    user: User,
    password_digest: String,
}

#[derive(Default)]
struct WorkflowState {
    users: BTreeMap<UserId, StoredUser>,
    tokens: HashMap<String, UserId>,
    request_types: BTreeMap<RequestTypeId, RequestType>,
    requests: BTreeMap<RequestId, RequestDetail>,
    next_user_id: i64,
    next_request_type_id: i64,
    next_request_id: i64,
    next_comment_id: i64,
    next_audit_event_id: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

impl WorkflowState {
    fn user(&self, id: UserId) -> Option<&User> {
        self.users.get(&id).map(|stored| &stored.user)
    }

    /// Resolves the caller against the current user table so role or activation changes take
    /// effect immediately.
    fn actor(&self, caller: &User) -> Result<User, DomainError> {
        match self.user(caller.id) {
            Some(user) if user.active => Ok(user.clone()),
            _ => Err(DomainError::Unauthenticated),
        }
    }

    fn require_admin(&self, caller: &User) -> Result<User, DomainError> {
        let actor = self.actor(caller)?;
        if actor.role != Role::Admin {
            return Err(DomainError::AccessDenied("only admins can manage request types".into()));
        }
        Ok(actor)
    }

    fn materialize(&self, detail: &RequestDetail) -> RequestDetail {
        let mut detail = detail.clone();
        if let Some(requester) = self.user(detail.request.requester.id) {
            detail.request.requester = requester.clone();
        }
        if let Some(manager) = detail.request.manager_id().and_then(|id| self.user(id)) {
            detail.request.manager = Some(manager.clone());
        }
        if let Some(request_type) = self.request_types.get(&detail.request.request_type.id) {
            detail.request.request_type = request_type.clone();
        }
        detail
    }

    fn stored_request(&self, id: RequestId) -> Result<&RequestDetail, DomainError> {
        self.requests.get(&id).ok_or_else(|| DomainError::not_found("request", id))
    }

    fn stored_request_mut(&mut self, id: RequestId) -> Result<&mut RequestDetail, DomainError> {
        self.requests.get_mut(&id).ok_or_else(|| DomainError::not_found("request", id))
    }
}

/// Admins see everything, managers what is assigned to them, everyone their own requests.
pub fn can_view(actor: &User, request: &Request) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Manager => {
            request.manager_id() == Some(actor.id) || request.requester_id() == actor.id
        }
        Role::Employee => request.requester_id() == actor.id,
    }
}

fn listed_for(actor: &User, request: &Request, filters: &RequestFilters) -> bool {
    let visible = match actor.role {
        Role::Admin => true,
        // The approval queue: without an explicit status filter a manager sees pending work.
        Role::Manager => {
            request.manager_id() == Some(actor.id)
                && (filters.status.is_some() || request.status == RequestStatus::Submitted)
        }
        Role::Employee => request.requester_id() == actor.id,
    };
    visible && filters.matches(request)
}

fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    format!("{:x}", hasher.finalize())
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

#[derive(Default)]
pub struct WorkflowService {
    state: RwLock<WorkflowState>,
    engine: LifecycleEngine,
}

impl WorkflowService {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> RwLockReadGuard<'_, WorkflowState> {
        match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, WorkflowState> {
        match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn register(&self, registration: Registration) -> Result<AuthGrant, DomainError> {
        let email = normalize_email(&registration.email);
        if email.is_empty() || !email.contains('@') {
            return Err(DomainError::validation("email", "a valid email address is required"));
        }
        if registration.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(DomainError::validation(
                "password",
                format!("password must be at least {MIN_PASSWORD_LEN} characters"),
            ));
        }

        let mut state = self.write_state();
        if state.users.values().any(|stored| stored.user.email == email) {
            return Err(DomainError::validation("email", "email already exists"));
        }
        if let Some(manager_id) = registration.manager_id {
            if state.user(manager_id).is_none() {
                return Err(DomainError::validation("managerId", "manager does not exist"));
            }
        }

        let user = User {
            id: UserId(next_id(&mut state.next_user_id)),
            email,
            role: registration.role,
            manager_id: registration.manager_id,
            active: true,
        };
        let digest = password_digest(&registration.password);
        state.users.insert(user.id, StoredUser { user: user.clone(), password_digest: digest });

        let token = Uuid::new_v4().simple().to_string();
        state.tokens.insert(token.clone(), user.id);
        info!(
            event_name = "workflow.user.registered",
            user_id = %user.id,
            role = %user.role,
            "user registered"
        );
        Ok(AuthGrant { token, user })
    }

    pub fn login(&self, email: &str, password: &str) -> Result<AuthGrant, DomainError> {
        let email = normalize_email(email);
        let digest = password_digest(password);

        let mut state = self.write_state();
        let user = state
            .users
            .values()
            .find(|stored| stored.user.email == email && stored.password_digest == digest)
            .filter(|stored| stored.user.active)
            .map(|stored| stored.user.clone());
        let Some(user) = user else {
            warn!(event_name = "workflow.auth.login_rejected", "login rejected");
            return Err(DomainError::Unauthenticated);
        };

        let token = Uuid::new_v4().simple().to_string();
        state.tokens.insert(token.clone(), user.id);
        Ok(AuthGrant { token, user })
    }

    pub fn authenticate(&self, token: &str) -> Result<User, DomainError> {
        let state = self.read_state();
        let user_id = state.tokens.get(token.trim()).copied().ok_or(DomainError::Unauthenticated)?;
        match state.user(user_id) {
            Some(user) if user.active => Ok(user.clone()),
            _ => Err(DomainError::Unauthenticated),
        }
    }

    pub fn revoke(&self, token: &str) {
        self.write_state().tokens.remove(token.trim());
    }

    /// Admin-only activation toggle. Deactivated users keep their history but cannot sign in.
    pub fn set_user_active(
        &self,
        caller: &User,
        user_id: UserId,
        active: bool,
    ) -> Result<User, DomainError> {
        let mut state = self.write_state();
        let actor = state.actor(caller)?;
        if actor.role != Role::Admin {
            return Err(DomainError::AccessDenied("only admins can change user activation".into()));
        }
        let stored =
            state.users.get_mut(&user_id).ok_or_else(|| DomainError::not_found("user", user_id))?;
        stored.user.active = active;
        Ok(stored.user.clone())
    }

    pub fn list_requests(
        &self,
        caller: &User,
        filters: &RequestFilters,
    ) -> Result<Vec<Request>, DomainError> {
        let state = self.read_state();
        let actor = state.actor(caller)?;
        Ok(state
            .requests
            .values()
            .map(|detail| state.materialize(detail).request)
            .filter(|request| listed_for(&actor, request, filters))
            .collect())
    }

    pub fn fetch_request(
        &self,
        caller: &User,
        id: RequestId,
    ) -> Result<RequestDetail, DomainError> {
        let state = self.read_state();
        let actor = state.actor(caller)?;
        let detail = state.materialize(state.stored_request(id)?);
        if !can_view(&actor, &detail.request) {
            return Err(DomainError::AccessDenied(format!("request {id} is not visible to you")));
        }
        Ok(detail)
    }

    pub fn create_request(&self, caller: &User, input: NewRequest) -> Result<Request, DomainError> {
        input.validate()?;

        let mut state = self.write_state();
        let actor = state.actor(caller)?;
        let request_type = state
            .request_types
            .get(&input.type_id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("request type", input.type_id))?;
        catalog::ensure_selectable(&request_type)?;

        let manager = actor.manager_id.and_then(|id| state.user(id)).cloned();
        let now = Utc::now();
        let request = Request {
            id: RequestId(next_id(&mut state.next_request_id)),
            requester: actor,
            manager,
            request_type,
            title: input.title.trim().to_string(),
            description: input.description,
            amount: input.amount,
            priority: input.priority,
            status: self.engine.initial_status(),
            created_at: now,
            updated_at: now,
        };
        state.requests.insert(request.id, RequestDetail::new(request.clone()));
        info!(
            event_name = "workflow.request.created",
            request_id = %request.id,
            requester_id = %request.requester.id,
            request_type = %request.request_type.code,
            "request submitted"
        );
        Ok(request)
    }

    pub fn update_request(
        &self,
        caller: &User,
        id: RequestId,
        patch: RequestPatch,
    ) -> Result<Request, DomainError> {
        patch.validate()?;

        let mut state = self.write_state();
        let actor = state.actor(caller)?;
        let guards = *self.engine.guards();
        let detail = state.stored_request_mut(id)?;
        guards.check(&actor, &detail.request, RequestAction::Edit).map_err(|violation| {
            DomainError::AccessDenied(format!("edit is not allowed: {violation}"))
        })?;

        patch.apply_to(&mut detail.request);
        detail.request.updated_at = Utc::now();
        let snapshot = detail.clone();
        info!(event_name = "workflow.request.updated", request_id = %id, "request edited");
        Ok(state.materialize(&snapshot).request)
    }

    /// Runs a status-changing command. Approve and reject also post their comment to the
    /// request's thread.
    pub fn transition(
        &self,
        caller: &User,
        id: RequestId,
        command: LifecycleCommand,
    ) -> Result<TransitionOutcome, DomainError> {
        let mut state = self.write_state();
        let actor = state.actor(caller)?;
        let event_id = AuditEventId(state.next_audit_event_id + 1);
        let now = Utc::now();
        let detail = state.stored_request_mut(id)?;
        let outcome = self.engine.apply(detail, &actor, &command, event_id, now)?;
        state.next_audit_event_id = event_id.0;

        if let LifecycleCommand::Approve { comment } | LifecycleCommand::Reject { comment } =
            &command
        {
            let comment_id = CommentId(next_id(&mut state.next_comment_id));
            let detail = state.stored_request_mut(id)?;
            detail.comments.push(Comment {
                id: comment_id,
                author: actor,
                body: comment.trim().to_string(),
                created_at: now,
            });
        }
        info!(
            event_name = "workflow.request.transitioned",
            request_id = %id,
            action = %outcome.action,
            from = %outcome.from,
            to = %outcome.to,
            "request status changed"
        );
        Ok(outcome)
    }

    pub fn approve(
        &self,
        caller: &User,
        id: RequestId,
        comment: &str,
    ) -> Result<TransitionOutcome, DomainError> {
        self.transition(caller, id, LifecycleCommand::Approve { comment: comment.to_string() })
    }

    pub fn reject(
        &self,
        caller: &User,
        id: RequestId,
        comment: &str,
    ) -> Result<TransitionOutcome, DomainError> {
        self.transition(caller, id, LifecycleCommand::Reject { comment: comment.to_string() })
    }

    pub fn cancel(&self, caller: &User, id: RequestId) -> Result<TransitionOutcome, DomainError> {
        self.transition(caller, id, LifecycleCommand::Cancel)
    }

    pub fn change_status(
        &self,
        caller: &User,
        id: RequestId,
        status: RequestStatus,
        note: Option<&str>,
    ) -> Result<TransitionOutcome, DomainError> {
        self.transition(
            caller,
            id,
            LifecycleCommand::ChangeStatus { status, note: note.map(str::to_string) },
        )
    }

    pub fn add_comment(
        &self,
        caller: &User,
        id: RequestId,
        text: &str,
    ) -> Result<Comment, DomainError> {
        let body = text.trim();
        if body.is_empty() {
            return Err(DomainError::validation("comment", "comment text is required"));
        }

        let mut state = self.write_state();
        let actor = state.actor(caller)?;
        let request = state.stored_request(id)?;
        if !can_view(&actor, &request.request) {
            return Err(DomainError::AccessDenied(format!("request {id} is not visible to you")));
        }

        let comment = Comment {
            id: CommentId(next_id(&mut state.next_comment_id)),
            author: actor,
            body: body.to_string(),
            created_at: Utc::now(),
        };
        state.stored_request_mut(id)?.comments.push(comment.clone());
        info!(event_name = "workflow.request.commented", request_id = %id, "comment added");
        Ok(comment)
    }

    pub fn list_request_types(&self, caller: &User) -> Result<Vec<RequestType>, DomainError> {
        let state = self.read_state();
        let actor = state.actor(caller)?;
        Ok(catalog::visible_to(actor.role, state.request_types.values()))
    }

    pub fn create_request_type(
        &self,
        caller: &User,
        input: NewRequestType,
    ) -> Result<RequestType, DomainError> {
        let mut state = self.write_state();
        state.require_admin(caller)?;
        let accepted = catalog::validate_new(&input, state.request_types.values())?;

        let request_type = RequestType {
            id: RequestTypeId(next_id(&mut state.next_request_type_id)),
            code: accepted.code,
            name: accepted.name,
            active: true,
        };
        state.request_types.insert(request_type.id, request_type.clone());
        info!(
            event_name = "workflow.request_type.created",
            request_type_id = %request_type.id,
            code = %request_type.code,
            "request type created"
        );
        Ok(request_type)
    }

    pub fn update_request_type(
        &self,
        caller: &User,
        id: RequestTypeId,
        patch: RequestTypePatch,
    ) -> Result<RequestType, DomainError> {
        if patch.is_empty() {
            return Err(DomainError::validation("requestType", "at least one field must change"));
        }

        let mut state = self.write_state();
        state.require_admin(caller)?;
        let mut updated = state
            .request_types
            .get(&id)
            .cloned()
            .ok_or_else(|| DomainError::not_found("request type", id))?;
        catalog::apply_patch(&mut updated, &patch, state.request_types.values())?;
        state.request_types.insert(id, updated.clone());
        Ok(updated)
    }
}
