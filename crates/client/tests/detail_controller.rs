use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use opsdesk_client::{
    ActionOutcome, ActionRequest, BannerTone, ClientError, DetailController, HttpWorkflowClient,
    InMemoryWorkflowApi, WorkflowApi,
};
use opsdesk_core::domain::request::{NewRequest, Priority, RequestId, RequestStatus};
use opsdesk_core::domain::request_type::NewRequestType;
use opsdesk_core::domain::user::{Registration, Role, User, UserId};
use opsdesk_core::errors::ErrorKind;
use opsdesk_core::lifecycle::RequestAction;
use opsdesk_core::session::{CredentialStore, InMemoryCredentialStore, Session};

fn user(id: i64, role: Role) -> User {
    User {
        id: UserId(id),
        email: format!("user{id}@corp.test"),
        role,
        manager_id: None,
        active: true,
    }
}

fn detail_json(status: &str) -> serde_json::Value {
    json!({
        "id": 41,
        "requester": {"id": 7, "email": "emp@corp.test", "role": "EMPLOYEE", "managerId": 2, "active": true},
        "manager": {"id": 2, "email": "mgr@corp.test", "role": "MANAGER", "active": true},
        "type": {"id": 3, "code": "HW", "name": "Hardware", "active": true},
        "title": "Laptop",
        "priority": "MEDIUM",
        "status": status,
        "createdAt": "2026-02-10T09:00:00",
        "updatedAt": "2026-02-10T09:00:00"
    })
}

async fn http_controller(
    server: &MockServer,
    viewer: User,
) -> (DetailController, Arc<InMemoryCredentialStore>) {
    let session = Session::new("tok-1", viewer.clone());
    let store = Arc::new(InMemoryCredentialStore::with_session(session));
    let api = HttpWorkflowClient::new(server.uri(), Duration::from_secs(5), store.clone())
        .expect("client builds");
    let controller = DetailController::new(Arc::new(api), viewer, RequestId(41));
    (controller, store)
}

#[tokio::test]
async fn missing_request_sets_not_found_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/requests/41"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let (controller, _) = http_controller(&server, user(7, Role::Employee)).await;
    let error = controller.load().await.expect_err("missing");

    assert_eq!(error.kind(), ErrorKind::NotFound);
    let state = controller.state();
    assert!(state.not_found);
    assert!(controller.controls().is_empty());
}

#[tokio::test]
async fn denied_action_is_never_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/requests/41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json("SUBMITTED")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/requests/41/approve"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let other_manager = user(5, Role::Manager);
    let (controller, _) = http_controller(&server, other_manager).await;
    controller.load().await.expect("load");

    assert_eq!(controller.controls(), vec![RequestAction::Comment]);
    let outcome = controller.perform(ActionRequest::Approve { comment: "ok".to_string() }).await;

    assert!(matches!(outcome, ActionOutcome::Failed(ClientError::Authorization(_))));
    let banner = controller.state().banner.expect("failure banner");
    assert_eq!(banner.tone, BannerTone::Failure);
    assert_eq!(banner.kind, Some(ErrorKind::Authorization));
}

#[tokio::test]
async fn concurrent_submission_is_skipped_and_flag_resets_after_failure() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/requests/41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json("SUBMITTED")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/requests/41/cancel"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"message": "already cancelled"}))
                .set_delay(Duration::from_millis(300)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let mut requester = user(7, Role::Employee);
    requester.manager_id = Some(UserId(2));
    let (controller, _) = http_controller(&server, requester).await;
    controller.load().await.expect("load");

    let slow = controller.perform(ActionRequest::Cancel);
    let eager = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(controller.is_busy());
        assert!(controller.controls().is_empty());
        controller.perform(ActionRequest::Cancel).await
    };
    let (first, second) = tokio::join!(slow, eager);

    assert!(matches!(first, ActionOutcome::Failed(ClientError::Authorization(_))));
    assert_eq!(second, ActionOutcome::Skipped);
    assert!(!controller.is_busy());
    assert!(controller.controls().contains(&RequestAction::Cancel));
}

#[tokio::test]
async fn second_action_is_checked_against_the_refetched_detail() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/requests/41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json("SUBMITTED")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/requests/41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json("CANCELLED")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/requests/41/cancel"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let mut requester = user(7, Role::Employee);
    requester.manager_id = Some(UserId(2));
    let (controller, _) = http_controller(&server, requester).await;
    controller.load().await.expect("load");

    assert_eq!(controller.perform(ActionRequest::Cancel).await, ActionOutcome::Completed);
    let again = controller.perform(ActionRequest::Cancel).await;

    assert!(matches!(again, ActionOutcome::Failed(ClientError::Authorization(_))));
    assert!(!controller.is_busy());
    assert_eq!(controller.controls(), vec![RequestAction::Comment]);
}

#[tokio::test]
async fn server_failure_shows_generic_banner_without_field() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/requests/41"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detail_json("SUBMITTED")))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/requests/41/approve"))
        .respond_with(
            ResponseTemplate::new(502)
                .set_body_json(json!({"message": "upstream down", "field": "comment"})),
        )
        .expect(1)
        .mount(&server)
        .await;

    let (controller, _) = http_controller(&server, user(2, Role::Manager)).await;
    controller.load().await.expect("load");
    let outcome = controller.perform(ActionRequest::Approve { comment: "ok".to_string() }).await;

    assert!(matches!(outcome, ActionOutcome::Failed(ClientError::Transport(_))));
    let state = controller.state();
    let banner = state.banner.expect("failure banner");
    assert_eq!(banner.kind, Some(ErrorKind::Transport));
    assert_eq!(banner.message, ErrorKind::Transport.user_message());
    assert_eq!(banner.field, None);
    assert!(!state.not_found);
    assert!(!state.sign_in_required);
    assert!(state.detail.is_some());
}

#[tokio::test]
async fn expired_session_requires_sign_in() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/requests/41"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let (controller, store) = http_controller(&server, user(7, Role::Employee)).await;
    let error = controller.load().await.expect_err("expired");

    assert_eq!(error, ClientError::Unauthenticated);
    assert!(controller.state().sign_in_required);
    assert!(store.read().expect("read").is_none());
}

async fn register(
    api: &InMemoryWorkflowApi,
    email: &str,
    role: Role,
    manager: Option<UserId>,
) -> User {
    api.register(&Registration {
        email: email.to_string(),
        password: "secret-pass".to_string(),
        role,
        manager_id: manager,
    })
    .await
    .expect("register")
}

#[tokio::test]
async fn approval_flow_refetches_after_each_mutation() {
    let admin_api = InMemoryWorkflowApi::standalone();
    let admin = register(&admin_api, "admin@corp.test", Role::Admin, None).await;
    for code in ["HW", "TRAVEL", "SW"] {
        admin_api
            .create_request_type(&NewRequestType { code: code.to_string(), name: code.to_string() })
            .await
            .expect("seed type");
    }

    let manager_api = admin_api.with_credentials(Arc::new(InMemoryCredentialStore::new()));
    let manager = register(&manager_api, "mgr@corp.test", Role::Manager, None).await;
    let employee_api = admin_api.with_credentials(Arc::new(InMemoryCredentialStore::new()));
    let employee = register(&employee_api, "emp@corp.test", Role::Employee, Some(manager.id)).await;

    let created = employee_api
        .create_request(&NewRequest {
            type_id: opsdesk_core::domain::request_type::RequestTypeId(3),
            title: "Laptop".to_string(),
            description: String::new(),
            amount: Some(Decimal::new(1299, 0)),
            priority: Priority::Medium,
        })
        .await
        .expect("create");

    let requester_view =
        DetailController::new(Arc::new(employee_api.clone()), employee, created.id);
    requester_view.load().await.expect("load");
    assert_eq!(
        requester_view.controls(),
        vec![RequestAction::Cancel, RequestAction::Edit, RequestAction::Comment]
    );

    let manager_view = DetailController::new(Arc::new(manager_api), manager, created.id);
    manager_view.load().await.expect("load");
    let blank = manager_view.perform(ActionRequest::Approve { comment: " ".to_string() }).await;
    match blank {
        ActionOutcome::Failed(error) => assert_eq!(error.field(), Some("comment")),
        other => panic!("expected validation failure, got {other:?}"),
    }
    assert_eq!(
        manager_view.state().banner.and_then(|banner| banner.field),
        Some("comment".to_string())
    );

    let outcome = manager_view.perform(ActionRequest::Approve { comment: "ok".to_string() }).await;
    assert_eq!(outcome, ActionOutcome::Completed);
    let state = manager_view.state();
    let detail = state.detail.expect("re-fetched detail");
    assert_eq!(detail.request.status, RequestStatus::Approved);
    assert_eq!(detail.audit_events.len(), 1);
    assert_eq!(state.banner.map(|banner| banner.tone), Some(BannerTone::Success));
    assert_eq!(manager_view.controls(), vec![RequestAction::Comment]);

    let admin_view = DetailController::new(Arc::new(admin_api), admin, created.id);
    admin_view.load().await.expect("load");
    assert_eq!(
        admin_view.controls(),
        vec![RequestAction::ChangeStatus(RequestStatus::InProgress), RequestAction::Comment]
    );
    let outcome = admin_view
        .perform(ActionRequest::ChangeStatus { status: RequestStatus::InProgress, note: None })
        .await;
    assert_eq!(outcome, ActionOutcome::Completed);

    requester_view.load().await.expect("reload");
    assert_eq!(requester_view.controls(), vec![RequestAction::Comment]);
    let outcome =
        requester_view.perform(ActionRequest::Comment { text: "thanks".to_string() }).await;
    assert_eq!(outcome, ActionOutcome::Completed);
    let detail = requester_view.state().detail.expect("detail");
    assert_eq!(detail.comments.len(), 2);
    assert_eq!(detail.audit_events.len(), 2);
}
