pub mod catalog;
pub mod config;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod session;
pub mod workflow;

pub use catalog::CatalogError;
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};
pub use domain::{
    AuditEvent, AuditEventId, AuditEventType, AuthGrant, Comment, CommentId, NewRequest,
    NewRequestType, Priority, Registration, Request, RequestDetail, RequestFilters, RequestId,
    RequestPatch, RequestStatus, RequestType, RequestTypeId, RequestTypePatch, Role, User, UserId,
};
pub use errors::{DomainError, ErrorKind, Presentation};
pub use lifecycle::{
    ActorRelation, GuardTable, GuardViolation, LifecycleCommand, LifecycleEngine, LifecycleError,
    RequestAction, TransitionOutcome,
};
pub use session::{
    CredentialStore, FileCredentialStore, InMemoryCredentialStore, Session, SessionError,
};
pub use workflow::WorkflowService;
