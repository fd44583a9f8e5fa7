//! Integration tests for the sign-up flow, driven through the machine
//! runtime against mock collaborators.

use authflow_flows::config::FlowConfig;
use authflow_flows::environment::FlowEnvironment;
use authflow_flows::events::{SignUpEvent, VerificationEvent};
use authflow_flows::form::FormStore;
use authflow_flows::mocks::{
    FixedClock, MockPlatform, MockResourceClient, MockRouter, MockSessions,
};
use authflow_flows::reducers::SignUpReducer;
use authflow_flows::resource::{SignUpResource, SignUpStatus, Verification};
use authflow_flows::routes::SignUpRoute;
use authflow_flows::state::{SignUpState, VerificationStage};
use authflow_flows::strategy::Strategy;
use authflow_runtime::MachineHandle;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;

type TestEnv = FlowEnvironment<MockResourceClient, MockSessions, MockRouter, MockPlatform>;

fn test_env(client: MockResourceClient, router: MockRouter, sessions: MockSessions) -> TestEnv {
    FlowEnvironment::new(
        client,
        sessions,
        router,
        MockPlatform::without_passkeys(),
        FormStore::new(),
        Arc::new(FixedClock::at(Utc::now())),
        FlowConfig::default(),
    )
}

async fn wait_for<S, A, P>(handle: &MachineHandle<S, A>, predicate: P) -> bool
where
    S: Clone + Send + Sync + 'static,
    A: Clone + Send + 'static,
    P: Fn(&S) -> bool,
{
    let mut watcher = handle.watch_state();
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if predicate(&watcher.borrow().clone()) {
                return;
            }
            if watcher.changed().await.is_err() {
                return;
            }
        }
    })
    .await
    .is_ok()
}

fn unverified_email_resource() -> SignUpResource {
    SignUpResource {
        status: SignUpStatus::MissingRequirements,
        unverified_fields: vec!["emailAddress".to_string()],
        verifications: vec![Verification::pending(Strategy::EmailCode)],
        ..SignUpResource::default()
    }
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn email_verification_sign_up_end_to_end() {
    let client = MockResourceClient::new();
    client.expect_create_sign_up(Ok(unverified_email_resource()));
    client.expect_attempt_verification(Ok(SignUpResource {
        status: SignUpStatus::Complete,
        created_session_id: Some("sess_3".to_string()),
        ..SignUpResource::default()
    }));

    let router = MockRouter::at("/sign-up");
    let sessions = MockSessions::new();
    let env = test_env(client.clone(), router.clone(), sessions.clone());
    let form = env.form.clone();

    let sign_up = authflow_runtime::spawn(
        SignUpReducer::new(),
        SignUpState::default(),
        env,
    );

    sign_up.send(SignUpEvent::Init { transfer: false }).unwrap();
    form.set_field("emailAddress", "new@example.com").unwrap();
    form.set_field("password", "correct horse battery").unwrap();
    sign_up.send(SignUpEvent::Submit).unwrap();

    // Routed to verification with an email-code child; the pending
    // verification means the code was already sent.
    assert!(
        wait_for(&sign_up, |s| {
            s.route == SignUpRoute::Verification && s.verification.is_some()
        })
        .await
    );

    let child = sign_up.state().verification.unwrap().handle;
    assert!(wait_for(&child, |s| s.stage == VerificationStage::Pending).await);
    assert!(child.state().already_prepared);

    child
        .send(VerificationEvent::Submit {
            code: "424242".to_string(),
        })
        .unwrap();

    assert!(
        wait_for(&sign_up, |s| {
            s.activated_session.as_deref() == Some("sess_3") && !s.loading
        })
        .await
    );
    assert_eq!(sessions.activated(), vec!["sess_3".to_string()]);

    sign_up.stop();
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn password_gap_routes_to_continue_and_completes() {
    let client = MockResourceClient::new();
    client.expect_create_sign_up(Ok(SignUpResource {
        status: SignUpStatus::MissingRequirements,
        missing_fields: vec!["password".to_string()],
        ..SignUpResource::default()
    }));
    client.expect_update_sign_up(Ok(SignUpResource {
        status: SignUpStatus::Complete,
        created_session_id: Some("sess_4".to_string()),
        ..SignUpResource::default()
    }));

    let router = MockRouter::at("/sign-up");
    let sessions = MockSessions::new();
    let env = test_env(client.clone(), router.clone(), sessions.clone());
    let form = env.form.clone();

    let sign_up = authflow_runtime::spawn(
        SignUpReducer::new(),
        SignUpState::default(),
        env,
    );

    sign_up.send(SignUpEvent::Init { transfer: false }).unwrap();
    form.set_field("emailAddress", "new@example.com").unwrap();
    sign_up.send(SignUpEvent::Submit).unwrap();

    assert!(wait_for(&sign_up, |s| s.route == SignUpRoute::Continue).await);

    // The continue step collects the password and updates the attempt.
    form.set_field("password", "correct horse battery").unwrap();
    sign_up.send(SignUpEvent::Submit).unwrap();

    assert!(
        wait_for(&sign_up, |s| {
            s.activated_session.as_deref() == Some("sess_4")
        })
        .await
    );
    assert_eq!(sessions.activated(), vec!["sess_4".to_string()]);

    let calls = client.calls();
    assert!(calls.iter().any(|call| call.starts_with("sign_up.update")));

    sign_up.stop();
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn field_error_surfaces_inline_and_keeps_the_machine_alive() {
    let client = MockResourceClient::new();
    client.expect_create_sign_up(Err(authflow_flows::FlowError::from(
        authflow_flows::ApiError::single(
            authflow_flows::ApiErrorDetail::new("form_password_pwned", "Password compromised")
                .with_param("password"),
        ),
    )));

    let router = MockRouter::at("/sign-up");
    let env = test_env(client, router, MockSessions::new());

    let sign_up = authflow_runtime::spawn(
        SignUpReducer::new(),
        SignUpState::default(),
        env,
    );

    sign_up.send(SignUpEvent::Init { transfer: false }).unwrap();
    sign_up.send(SignUpEvent::Submit).unwrap();

    assert!(
        wait_for(&sign_up, |s| s.errors.field("password").is_some()).await
    );

    let state = sign_up.state();
    // Field-level errors stay inline: no global banner, no error route.
    assert!(state.errors.global().is_none());
    assert_eq!(state.route, SignUpRoute::Start);
    assert!(sign_up.is_alive());

    sign_up.stop();
}
