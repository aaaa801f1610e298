pub mod audit;
pub mod comment;
pub mod request;
pub mod request_type;
pub mod timestamp;
pub mod user;

pub use audit::{AuditEvent, AuditEventId, AuditEventType};
pub use comment::{Comment, CommentId};
pub use request::{
    NewRequest, Priority, Request, RequestDetail, RequestFilters, RequestId, RequestPatch,
    RequestStatus,
};
pub use request_type::{NewRequestType, RequestType, RequestTypeId, RequestTypePatch};
pub use user::{AuthGrant, Registration, Role, User, UserId};
