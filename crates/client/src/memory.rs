use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use opsdesk_core::domain::comment::Comment;
use opsdesk_core::domain::request::{
    NewRequest, Request, RequestDetail, RequestFilters, RequestId, RequestPatch, RequestStatus,
};
use opsdesk_core::domain::request_type::{
    NewRequestType, RequestType, RequestTypeId, RequestTypePatch,
};
use opsdesk_core::domain::user::{AuthGrant, Registration, User};
use opsdesk_core::errors::DomainError;
use opsdesk_core::session::{CredentialStore, InMemoryCredentialStore, Session};
use opsdesk_core::workflow::WorkflowService;

use crate::api::{ClientError, WorkflowApi};

/// [`WorkflowApi`] over an in-process [`WorkflowService`], with the same session rules as the
/// HTTP client: no session fails before the call, a rejected session is torn down.
#[derive(Clone)]
pub struct InMemoryWorkflowApi {
    service: Arc<WorkflowService>,
    credentials: Arc<dyn CredentialStore>,
}

impl InMemoryWorkflowApi {
    pub fn new(service: Arc<WorkflowService>, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { service, credentials }
    }

    /// A fresh service with its own in-memory credential store.
    pub fn standalone() -> Self {
        Self::new(Arc::new(WorkflowService::new()), Arc::new(InMemoryCredentialStore::new()))
    }

    pub fn credentials(&self) -> &Arc<dyn CredentialStore> {
        &self.credentials
    }

    /// Same backing service, separate session. Lets tests act as several users at once.
    pub fn with_credentials(&self, credentials: Arc<dyn CredentialStore>) -> Self {
        Self { service: Arc::clone(&self.service), credentials }
    }

    fn caller(&self) -> Result<User, ClientError> {
        let session = self.credentials.read()?.ok_or(ClientError::Unauthenticated)?;
        match self.service.authenticate(session.bearer()) {
            Ok(user) => Ok(user),
            Err(DomainError::Unauthenticated) => {
                self.credentials.teardown()?;
                Err(ClientError::Unauthenticated)
            }
            Err(error) => Err(error.into()),
        }
    }

    fn store_grant(&self, grant: AuthGrant) -> Result<User, ClientError> {
        let user = grant.user.clone();
        self.credentials.init(Session::new(grant.token, grant.user))?;
        Ok(user)
    }
}

#[async_trait]
impl WorkflowApi for InMemoryWorkflowApi {
    async fn login(&self, email: &str, password: &str) -> Result<User, ClientError> {
        let grant = self.service.login(email, password)?;
        self.store_grant(grant)
    }

    async fn register(&self, registration: &Registration) -> Result<User, ClientError> {
        let grant = self.service.register(registration.clone())?;
        self.store_grant(grant)
    }

    async fn current_user(&self) -> Result<User, ClientError> {
        self.caller()
    }

    async fn logout(&self) -> Result<(), ClientError> {
        if let Some(session) = self.credentials.read()? {
            self.service.revoke(session.bearer());
        }
        self.credentials.teardown()?;
        info!(event_name = "client.session.logout", "credentials cleared");
        Ok(())
    }

    async fn list_requests(&self, filters: &RequestFilters) -> Result<Vec<Request>, ClientError> {
        let caller = self.caller()?;
        Ok(self.service.list_requests(&caller, filters)?)
    }

    async fn fetch_request(&self, id: RequestId) -> Result<RequestDetail, ClientError> {
        let caller = self.caller()?;
        Ok(self.service.fetch_request(&caller, id)?)
    }

    async fn create_request(&self, input: &NewRequest) -> Result<Request, ClientError> {
        let caller = self.caller()?;
        Ok(self.service.create_request(&caller, input.clone())?)
    }

    async fn update_request(
        &self,
        id: RequestId,
        patch: &RequestPatch,
    ) -> Result<Request, ClientError> {
        let caller = self.caller()?;
        Ok(self.service.update_request(&caller, id, patch.clone())?)
    }

    async fn approve(&self, id: RequestId, comment: &str) -> Result<(), ClientError> {
        let caller = self.caller()?;
        self.service.approve(&caller, id, comment)?;
        Ok(())
    }

    async fn reject(&self, id: RequestId, comment: &str) -> Result<(), ClientError> {
        let caller = self.caller()?;
        self.service.reject(&caller, id, comment)?;
        Ok(())
    }

    async fn cancel(&self, id: RequestId) -> Result<(), ClientError> {
        let caller = self.caller()?;
        self.service.cancel(&caller, id)?;
        Ok(())
    }

    async fn change_status(
        &self,
        id: RequestId,
        status: RequestStatus,
        note: Option<&str>,
    ) -> Result<(), ClientError> {
        let caller = self.caller()?;
        self.service.change_status(&caller, id, status, note)?;
        Ok(())
    }

    async fn add_comment(&self, id: RequestId, text: &str) -> Result<Comment, ClientError> {
        let caller = self.caller()?;
        Ok(self.service.add_comment(&caller, id, text)?)
    }

    async fn list_request_types(&self) -> Result<Vec<RequestType>, ClientError> {
        let caller = self.caller()?;
        Ok(self.service.list_request_types(&caller)?)
    }

    async fn create_request_type(
        &self,
        input: &NewRequestType,
    ) -> Result<RequestType, ClientError> {
        let caller = self.caller()?;
        Ok(self.service.create_request_type(&caller, input.clone())?)
    }

    async fn update_request_type(
        &self,
        id: RequestTypeId,
        patch: &RequestTypePatch,
    ) -> Result<RequestType, ClientError> {
        let caller = self.caller()?;
        Ok(self.service.update_request_type(&caller, id, patch.clone())?)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use opsdesk_core::domain::user::{Registration, Role};
    use opsdesk_core::session::InMemoryCredentialStore;

    use super::InMemoryWorkflowApi;
    use crate::api::{ClientError, WorkflowApi};

    fn registration(email: &str, role: Role) -> Registration {
        Registration {
            email: email.to_string(),
            password: "secret-pass".to_string(),
            role,
            manager_id: None,
        }
    }

    #[tokio::test]
    async fn calls_without_session_fail_unauthenticated() {
        let api = InMemoryWorkflowApi::standalone();
        assert_eq!(api.list_request_types().await, Err(ClientError::Unauthenticated));
    }

    #[tokio::test]
    async fn register_stores_session_and_logout_revokes_it() {
        let api = InMemoryWorkflowApi::standalone();
        let user =
            api.register(&registration("admin@corp.test", Role::Admin)).await.expect("register");
        assert_eq!(api.current_user().await.expect("me").id, user.id);

        let stale = api.credentials().read().expect("read").expect("session");
        api.logout().await.expect("logout");
        assert!(api.credentials().read().expect("read").is_none());

        let replay = api.with_credentials(Arc::new(InMemoryCredentialStore::with_session(stale)));
        assert_eq!(replay.current_user().await, Err(ClientError::Unauthenticated));
        assert!(replay.credentials().read().expect("read").is_none());
    }
}
