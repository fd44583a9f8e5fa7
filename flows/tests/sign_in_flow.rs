//! Integration tests for the sign-in flow, driven through the machine
//! runtime against mock collaborators.

use authflow_flows::config::FlowConfig;
use authflow_flows::environment::FlowEnvironment;
use authflow_flows::events::{SignInEvent, VerificationEvent};
use authflow_flows::form::FormStore;
use authflow_flows::handoff::link_transfer;
use authflow_flows::mocks::{
    FixedClock, MockPlatform, MockResourceClient, MockRouter, MockSessions,
};
use authflow_flows::reducers::{SignInReducer, SignUpReducer};
use authflow_flows::resource::{
    Factor, SignInResource, SignInStatus, SignUpResource, SignUpStatus, Verification,
    VerificationStatus,
};
use authflow_flows::routes::SignInRoute;
use authflow_flows::state::{SignInState, SignUpState, VerificationStage};
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

fn email_code_resource() -> SignInResource {
    SignInResource {
        status: SignInStatus::NeedsFirstFactor,
        identifier: Some("test@example.com".to_string()),
        first_factors: vec![
            Factor::new(Strategy::EmailCode).with_safe_identifier("test@example.com"),
        ],
        ..SignInResource::default()
    }
}

fn pending_email_code_resource() -> SignInResource {
    SignInResource {
        first_factor_verification: Some(Verification::pending(Strategy::EmailCode)),
        ..email_code_resource()
    }
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn email_code_sign_in_end_to_end() {
    let client = MockResourceClient::new();
    client.expect_create_sign_in(Ok(email_code_resource()));
    client.expect_prepare_first_factor(Ok(pending_email_code_resource()));
    client.expect_attempt_first_factor(Ok(SignInResource {
        status: SignInStatus::Complete,
        created_session_id: Some("sess_1".to_string()),
        ..SignInResource::default()
    }));

    let router = MockRouter::at("/sign-in");
    let sessions = MockSessions::new();
    let env = test_env(client.clone(), router.clone(), sessions.clone());
    let form = env.form.clone();

    let sign_in = authflow_runtime::spawn(
        SignInReducer::new(),
        SignInState::default(),
        env,
    );

    sign_in.send(SignInEvent::Init).unwrap();
    form.set_field("identifier", "test@example.com").unwrap();
    sign_in.send(SignInEvent::Submit).unwrap();

    // The machine routes to the first factor and mounts a verification
    // child for the email code.
    assert!(
        wait_for(&sign_in, |s| {
            s.route == SignInRoute::FirstFactor && s.verification.is_some()
        })
        .await
    );

    let child = sign_in.state().verification.unwrap().handle;
    assert!(wait_for(&child, |s| s.stage == VerificationStage::Pending).await);

    child
        .send(VerificationEvent::Submit {
            code: "424242".to_string(),
        })
        .unwrap();

    // Attempt completes, the outcome is forwarded upward, and the session
    // is handed off exactly once.
    assert!(
        wait_for(&sign_in, |s| {
            s.activated_session.as_deref() == Some("sess_1") && !s.loading
        })
        .await
    );
    assert_eq!(sessions.activated(), vec!["sess_1".to_string()]);

    // Completion navigated to the after-sign-in destination.
    let history = router.history();
    assert_eq!(history.last().map(|(_, path)| path.as_str()), Some("/"));

    sign_in.stop();
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn init_at_base_path_performs_no_navigation() {
    let client = MockResourceClient::new();
    let router = MockRouter::at("/sign-in");
    let env = test_env(client, router.clone(), MockSessions::new());

    let sign_in = authflow_runtime::spawn(
        SignInReducer::new(),
        SignInState::default(),
        env,
    );

    sign_in.send(SignInEvent::Init).unwrap();
    assert!(wait_for(&sign_in, |s| s.route == SignInRoute::Start).await);

    // Already at the flow root: the replace is guarded away.
    assert_eq!(router.navigation_count(), 0);

    sign_in.stop();
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn reprocessing_the_same_snapshot_does_not_stack_navigation() {
    let client = MockResourceClient::new();
    let router = MockRouter::at("/sign-in");
    let env = test_env(client, router.clone(), MockSessions::new());

    let sign_in = authflow_runtime::spawn(
        SignInReducer::new(),
        SignInState::default(),
        env,
    );

    sign_in.send(SignInEvent::Init).unwrap();
    sign_in
        .send(SignInEvent::Next {
            resource: pending_email_code_resource(),
        })
        .unwrap();

    assert!(
        wait_for(&sign_in, |s| {
            s.route == SignInRoute::FirstFactor && s.verification.is_some()
        })
        .await
    );
    let navigations = router.navigation_count();

    sign_in
        .send(SignInEvent::Next {
            resource: pending_email_code_resource(),
        })
        .unwrap();

    // Drain: send an unrelated event and wait for it to be processed.
    sign_in.send(SignInEvent::Prev).unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(router.navigation_count(), navigations + 1); // only Prev navigated
    sign_in.stop();
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn stale_email_link_poll_reports_expiry() {
    let client = MockResourceClient::new();

    let link_factor = Factor::new(Strategy::EmailLink).with_safe_identifier("test@example.com");
    let link_resource = SignInResource {
        status: SignInStatus::NeedsFirstFactor,
        identifier: Some("test@example.com".to_string()),
        first_factors: vec![link_factor],
        ..SignInResource::default()
    };

    client.expect_prepare_first_factor(Ok(SignInResource {
        first_factor_verification: Some(Verification::pending(Strategy::EmailLink)),
        ..link_resource.clone()
    }));
    client.expect_reload_sign_in(Ok(SignInResource {
        first_factor_verification: Some(Verification {
            status: VerificationStatus::Expired,
            strategy: Some(Strategy::EmailLink),
            external_verification_redirect_url: None,
        }),
        ..link_resource.clone()
    }));

    let router = MockRouter::at("/sign-in");
    let config = FlowConfig::default()
        .with_email_link_poll_interval(Duration::from_millis(50))
        .with_poll_jitter(0.0);

    let env = FlowEnvironment::new(
        client,
        MockSessions::new(),
        router,
        MockPlatform::without_passkeys(),
        FormStore::new(),
        Arc::new(FixedClock::at(Utc::now())),
        config,
    );

    let sign_in = authflow_runtime::spawn(
        SignInReducer::new(),
        SignInState::default(),
        env,
    );

    sign_in.send(SignInEvent::Init).unwrap();
    sign_in
        .send(SignInEvent::Next {
            resource: link_resource,
        })
        .unwrap();

    assert!(wait_for(&sign_in, |s| s.verification.is_some()).await);
    let child = sign_in.state().verification.unwrap().handle;

    // The staleness poll fires and the backend-reported expiry maps to
    // the dedicated terminal stage.
    assert!(wait_for(&child, |s| s.stage == VerificationStage::Expired).await);
    assert!(!child.state().polling);

    sign_in.stop();
}

#[tokio::test]
#[allow(clippy::unwrap_used)]
async fn transferable_sign_in_hands_off_to_sign_up() {
    let client = MockResourceClient::new();
    client.expect_create_sign_up(Ok(SignUpResource {
        status: SignUpStatus::Complete,
        created_session_id: Some("sess_2".to_string()),
        ..SignUpResource::default()
    }));

    let sessions = MockSessions::new();
    let sign_in_env = test_env(
        client.clone(),
        MockRouter::at("/sign-in"),
        sessions.clone(),
    );
    let sign_up_env = test_env(client.clone(), MockRouter::at("/sign-up"), sessions.clone());

    let sign_in = authflow_runtime::spawn(
        SignInReducer::new(),
        SignInState::default(),
        sign_in_env,
    );
    let sign_up = authflow_runtime::spawn(
        SignUpReducer::<MockResourceClient, MockSessions, MockRouter, MockPlatform>::new(),
        SignUpState::default(),
        sign_up_env,
    );

    let _link = link_transfer(&sign_in, &sign_up);

    sign_in.send(SignInEvent::Init).unwrap();
    sign_in
        .send(SignInEvent::Next {
            resource: SignInResource::with_status(SignInStatus::Transferable),
        })
        .unwrap();

    // The sign-up machine picks the flow up with transfer semantics and
    // completes without re-collecting fields.
    assert!(wait_for(&sign_up, |s| s.transfer).await);
    assert!(
        wait_for(&sign_up, |s| {
            s.activated_session.as_deref() == Some("sess_2")
        })
        .await
    );
    assert_eq!(sessions.activated(), vec!["sess_2".to_string()]);

    let calls = client.calls();
    assert!(calls.iter().any(|call| call.starts_with("sign_up.create")));

    sign_in.stop();
    sign_up.stop();
}
