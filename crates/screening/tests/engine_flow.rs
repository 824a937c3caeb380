//! End-to-end call flows through the engine with simulated collaborators

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use callguard_config::ScreeningConfig;
use callguard_core::{
    AlertKind, AlertSettings, CallAction, CallControl, CallControlError, CallEvent, CallEventKind,
    Classification, DirectoryError, EndReason, GatherStatus, Line, LineDirectory, PhoneNumber,
    Stage,
};
use callguard_screening::{
    AlertDispatcher, IgnoreReason, OutcomeStatus, RegistryConfig, ScreeningEngine, SessionRegistry,
    StaticLineDirectory,
};
use callguard_telephony::{DryRunCallControl, DryRunNotifier};

const LINE: &str = "+18135550100";
const OWNER: &str = "+17545550000";
const TRUSTED: &str = "+17545551234";
const STRANGER: &str = "+13055550123";
const UNCONFIGURED: &str = "+18135550001";

fn num(s: &str) -> PhoneNumber {
    PhoneNumber::parse(s).unwrap()
}

fn default_line() -> Line {
    Line::new(num(LINE), num(OWNER)).with_trusted(num(TRUSTED))
}

struct Harness {
    engine: ScreeningEngine,
    calls: Arc<DryRunCallControl>,
    notifier: Arc<DryRunNotifier>,
}

impl Harness {
    fn new() -> Self {
        Self::with_lines(vec![default_line()])
    }

    fn with_lines(lines: Vec<Line>) -> Self {
        let calls = Arc::new(DryRunCallControl::new());
        let notifier = Arc::new(DryRunNotifier::new());
        let engine = build_engine(
            Arc::new(StaticLineDirectory::new(lines).unwrap()),
            calls.clone(),
            notifier.clone(),
        );
        Self {
            engine,
            calls,
            notifier,
        }
    }

    async fn sent_alerts(&self) -> Vec<String> {
        self.engine.alerts().drain().await;
        self.notifier.messages().into_iter().map(|m| m.text).collect()
    }
}

fn build_engine(
    directory: Arc<dyn LineDirectory>,
    calls: Arc<dyn CallControl>,
    notifier: Arc<DryRunNotifier>,
) -> ScreeningEngine {
    ScreeningEngine::new(
        directory,
        calls,
        Arc::new(AlertDispatcher::new(notifier, None)),
        Arc::new(SessionRegistry::new(RegistryConfig::default())),
        &ScreeningConfig::default(),
    )
}

fn initiated(call_id: &str, from: &str, to: &str) -> CallEvent {
    CallEvent::new(CallEventKind::Initiated, call_id).with_parties(PhoneNumber::parse(from), PhoneNumber::parse(to))
}

fn answered(call_id: &str, from: &str, to: &str, name: &str) -> CallEvent {
    CallEvent::new(CallEventKind::Answered, call_id)
        .with_parties(PhoneNumber::parse(from), PhoneNumber::parse(to))
        .with_display_name(name)
}

fn gather(call_id: &str, digits: &str) -> CallEvent {
    CallEvent::new(CallEventKind::GatherEnded, call_id)
        .with_digits(digits)
        .with_gather_status(GatherStatus::Valid)
}

fn transfers(actions: &[CallAction]) -> usize {
    actions
        .iter()
        .filter(|a| matches!(a, CallAction::Transfer { .. }))
        .count()
}

#[tokio::test]
async fn test_unconfigured_number_answers_then_stops() {
    let h = Harness::new();

    let first = h.engine.handle(&initiated("c1", STRANGER, UNCONFIGURED)).await;
    assert_eq!(first.status, OutcomeStatus::Answered);

    let second = h.engine.handle(&answered("c1", STRANGER, UNCONFIGURED, "Jane")).await;
    assert_eq!(second.status, OutcomeStatus::NoConfig);
    assert_eq!(second.stage, Some(Stage::Ended));

    assert_eq!(h.calls.actions_for("c1"), vec![CallAction::Answer]);
    assert!(h.sent_alerts().await.is_empty());
}

#[tokio::test]
async fn test_no_config_issues_no_action_on_answered() {
    let h = Harness::new();
    let outcome = h.engine.handle(&answered("c1", STRANGER, UNCONFIGURED, "")).await;
    assert_eq!(outcome.status, OutcomeStatus::NoConfig);
    assert_eq!(h.calls.count(), 0);
}

#[tokio::test]
async fn test_trusted_caller_forwarded_once() {
    let h = Harness::new();
    h.engine.handle(&initiated("c2", TRUSTED, LINE)).await;
    let outcome = h.engine.handle(&answered("c2", TRUSTED, LINE, "Mom")).await;

    assert_eq!(outcome.status, OutcomeStatus::TrustedForwarded);
    assert_eq!(outcome.classification, Some(Classification::Trusted));
    assert_eq!(
        h.calls.actions_for("c2"),
        vec![CallAction::Answer, CallAction::Transfer { to: num(OWNER) }]
    );

    let alerts = h.sent_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("Mom"));
}

#[tokio::test]
async fn test_spam_blocked_even_when_trusted() {
    let h = Harness::new();
    let outcome = h.engine.handle(&answered("c3", TRUSTED, LINE, "Scam Likely")).await;

    assert_eq!(outcome.status, OutcomeStatus::SpamBlocked);
    let actions = h.calls.actions_for("c3");
    assert_eq!(actions, vec![CallAction::Hangup]);
    assert_eq!(transfers(&actions), 0);
    assert_eq!(h.sent_alerts().await.len(), 1);
}

#[tokio::test]
async fn test_spam_not_blocked_without_auto_block() {
    let h = Harness::with_lines(vec![default_line().with_spam_auto_block(false)]);
    let outcome = h.engine.handle(&answered("c3", STRANGER, LINE, "Scam Likely")).await;
    assert_eq!(outcome.status, OutcomeStatus::ScreeningStarted);
}

#[tokio::test]
async fn test_unknown_caller_screened_then_medical_transfer() {
    let h = Harness::new();
    h.engine.handle(&initiated("c4", STRANGER, LINE)).await;

    let started = h.engine.handle(&answered("c4", STRANGER, LINE, "Dr Office")).await;
    assert_eq!(started.status, OutcomeStatus::ScreeningStarted);
    assert_eq!(started.stage, Some(Stage::Screening));

    let done = h.engine.handle(&gather("c4", "1")).await;
    assert_eq!(done.status, OutcomeStatus::MedicalTransferred);

    let actions = h.calls.actions_for("c4");
    assert_eq!(actions.len(), 4);
    assert!(matches!(actions[1], CallAction::GatherWithPrompt(ref g) if g.digit_count == 1 && g.valid_digits == "123"));
    assert!(matches!(actions[2], CallAction::Speak { .. }));
    assert_eq!(actions[3], CallAction::Transfer { to: num(OWNER) });
    assert_eq!(transfers(&actions), 1);
    assert_eq!(h.sent_alerts().await.len(), 1);
}

#[tokio::test]
async fn test_gather_routing() {
    for (digits, expected, transferred) in [
        ("1", OutcomeStatus::MedicalTransferred, true),
        ("2", OutcomeStatus::FamilyTransferred, true),
        ("3", OutcomeStatus::Rejected, false),
        ("9", OutcomeStatus::Rejected, false),
        ("", OutcomeStatus::Rejected, false),
    ] {
        let h = Harness::new();
        h.engine.handle(&answered("g", STRANGER, LINE, "")).await;
        let outcome = h.engine.handle(&gather("g", digits)).await;
        assert_eq!(outcome.status, expected, "digits {:?}", digits);

        let actions = h.calls.actions_for("g");
        let last = actions.last().unwrap();
        if transferred {
            assert!(matches!(last, CallAction::Transfer { .. }));
        } else {
            assert_eq!(last, &CallAction::Hangup);
        }
    }
}

#[tokio::test]
async fn test_gather_timeout_rejects() {
    let h = Harness::new();
    h.engine.handle(&answered("c5", STRANGER, LINE, "")).await;
    let timeout = CallEvent::new(CallEventKind::GatherEnded, "c5").with_gather_status(GatherStatus::Timeout);
    let outcome = h.engine.handle(&timeout).await;
    assert_eq!(outcome.status, OutcomeStatus::Rejected);
    assert_eq!(h.calls.actions_for("c5").last(), Some(&CallAction::Hangup));
}

#[tokio::test]
async fn test_gather_call_hangup_ends_without_actions() {
    let h = Harness::new();
    h.engine.handle(&answered("c6", STRANGER, LINE, "")).await;
    let before = h.calls.count();

    let ev = CallEvent::new(CallEventKind::GatherEnded, "c6").with_gather_status(GatherStatus::CallHangup);
    let outcome = h.engine.handle(&ev).await;
    assert_eq!(outcome.status, OutcomeStatus::CallEnded);
    assert_eq!(h.calls.count(), before);

    let session = h.engine.registry().snapshot_one("c6").await.unwrap();
    assert_eq!(session.end_reason, Some(EndReason::Hangup));
}

#[tokio::test]
async fn test_duplicate_answered_is_ignored() {
    let h = Harness::new();
    let ev = answered("c7", STRANGER, LINE, "Jane");

    assert_eq!(h.engine.handle(&ev).await.status, OutcomeStatus::ScreeningStarted);
    let replay = h.engine.handle(&ev).await;
    assert_eq!(replay.status, OutcomeStatus::Ignored);
    assert_eq!(replay.reason, Some(IgnoreReason::Duplicate));

    assert_eq!(h.calls.actions_for("c7").len(), 1);
    assert_eq!(h.sent_alerts().await.len(), 1);
}

#[tokio::test]
async fn test_replays_after_end_are_no_ops() {
    let h = Harness::new();
    let ev = answered("c8", STRANGER, LINE, "Robocall Center");
    h.engine.handle(&ev).await;

    for replay in [
        initiated("c8", STRANGER, LINE),
        ev.clone(),
        gather("c8", "1"),
        CallEvent::new(CallEventKind::Hangup, "c8"),
    ] {
        let outcome = h.engine.handle(&replay).await;
        assert_eq!(outcome.reason, Some(IgnoreReason::AfterEnd));
    }
    assert_eq!(h.calls.actions_for("c8"), vec![CallAction::Hangup]);
    assert_eq!(h.sent_alerts().await.len(), 1);
}

#[tokio::test]
async fn test_out_of_order_and_unknown_events() {
    let h = Harness::new();
    h.engine.handle(&initiated("c9", STRANGER, LINE)).await;

    let early = h.engine.handle(&gather("c9", "1")).await;
    assert_eq!(early.reason, Some(IgnoreReason::OutOfOrder));

    let stray = h.engine.handle(&gather("never-seen", "1")).await;
    assert_eq!(stray.reason, Some(IgnoreReason::UnknownCall));
    assert!(h.engine.registry().get("never-seen").is_none());

    let other = CallEvent::new(CallEventKind::Other("call.speak.ended".to_string()), "c9");
    let outcome = h.engine.handle(&other).await;
    assert_eq!(outcome.reason, Some(IgnoreReason::UnsupportedEvent));

    let session = h.engine.registry().snapshot_one("c9").await.unwrap();
    assert_eq!(session.stage, Stage::Answered);
}

#[tokio::test]
async fn test_hangup_ends_session_from_any_stage() {
    let h = Harness::new();
    h.engine.handle(&answered("c10", STRANGER, LINE, "")).await;
    let outcome = h.engine.handle(&CallEvent::new(CallEventKind::Hangup, "c10")).await;
    assert_eq!(outcome.status, OutcomeStatus::CallEnded);

    let late = h.engine.handle(&gather("c10", "1")).await;
    assert_eq!(late.reason, Some(IgnoreReason::AfterEnd));
    assert_eq!(transfers(&h.calls.actions_for("c10")), 0);
}

#[tokio::test]
async fn test_missing_call_id_is_invalid() {
    let h = Harness::new();
    let outcome = h.engine.handle(&answered("  ", STRANGER, LINE, "")).await;
    assert_eq!(outcome.status, OutcomeStatus::InvalidPayload);
    assert!(h.engine.registry().is_empty());
}

#[tokio::test]
async fn test_disabled_alerts_are_not_sent() {
    let line = default_line().with_alerts(AlertSettings {
        enabled: true,
        on_spam: false,
        on_unknown: false,
    });
    let h = Harness::with_lines(vec![line]);
    h.engine.handle(&answered("a1", STRANGER, LINE, "Scam")).await;
    h.engine.handle(&answered("a2", STRANGER, LINE, "Jane")).await;
    h.engine.handle(&answered("a3", TRUSTED, LINE, "Mom")).await;

    let alerts = h.sent_alerts().await;
    assert_eq!(alerts.len(), 1);
    assert!(alerts[0].contains("Mom"));

    let session = h.engine.registry().snapshot_one("a3").await.unwrap();
    assert!(session.alerts_sent.contains(&AlertKind::TrustedCall));
}

/// Call control that rejects chosen verbs
struct Rejecting {
    inner: DryRunCallControl,
    reject: Vec<&'static str>,
    attempts: Mutex<Vec<&'static str>>,
}

impl Rejecting {
    fn new(reject: &[&'static str]) -> Self {
        Self {
            inner: DryRunCallControl::new(),
            reject: reject.to_vec(),
            attempts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl CallControl for Rejecting {
    async fn execute(&self, call_id: &str, action: &CallAction) -> Result<(), CallControlError> {
        self.attempts.lock().push(action.name());
        if self.reject.contains(&action.name()) {
            return Err(CallControlError::Provider {
                status: 422,
                body: "call already ended".to_string(),
            });
        }
        self.inner.execute(call_id, action).await
    }
}

#[tokio::test]
async fn test_transfer_failure_reported_without_retry() {
    let calls = Arc::new(Rejecting::new(&["transfer"]));
    let notifier = Arc::new(DryRunNotifier::new());
    let engine = build_engine(
        Arc::new(StaticLineDirectory::new(vec![default_line()]).unwrap()),
        calls.clone(),
        notifier.clone(),
    );

    let outcome = engine.handle(&answered("f1", TRUSTED, LINE, "Mom")).await;
    assert_eq!(outcome.status, OutcomeStatus::TrustedForwarded);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(outcome.failures[0].action, "transfer");
    assert_eq!(outcome.failures[0].reason, "provider_rejected");
    assert_eq!(outcome.failures[0].status_code, Some(422));
    assert_eq!(*calls.attempts.lock(), vec!["transfer"]);

    engine.alerts().drain().await;
    assert_eq!(notifier.count(), 1);
}

#[tokio::test]
async fn test_speak_failure_still_transfers() {
    let calls = Arc::new(Rejecting::new(&["speak"]));
    let engine = build_engine(
        Arc::new(StaticLineDirectory::new(vec![default_line()]).unwrap()),
        calls.clone(),
        Arc::new(DryRunNotifier::new()),
    );
    engine.handle(&answered("f2", STRANGER, LINE, "")).await;
    let outcome = engine.handle(&gather("f2", "2")).await;

    assert_eq!(outcome.status, OutcomeStatus::FamilyTransferred);
    assert_eq!(outcome.failures.len(), 1);
    assert_eq!(*calls.attempts.lock(), vec!["gather", "speak", "transfer"]);
}

#[tokio::test]
async fn test_gather_failure_hangs_up() {
    let calls = Arc::new(Rejecting::new(&["gather"]));
    let engine = build_engine(
        Arc::new(StaticLineDirectory::new(vec![default_line()]).unwrap()),
        calls.clone(),
        Arc::new(DryRunNotifier::new()),
    );
    let outcome = engine.handle(&answered("f3", STRANGER, LINE, "")).await;

    assert_eq!(outcome.status, OutcomeStatus::Rejected);
    assert_eq!(outcome.stage, Some(Stage::Ended));
    assert_eq!(*calls.attempts.lock(), vec!["gather", "hangup"]);
}

struct Broken;

#[async_trait]
impl LineDirectory for Broken {
    async fn resolve(&self, _: &PhoneNumber) -> Result<Option<Line>, DirectoryError> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }

    fn kind(&self) -> &'static str {
        "broken"
    }
}

#[tokio::test]
async fn test_directory_error_is_no_config() {
    let calls = Arc::new(DryRunCallControl::new());
    let engine = build_engine(Arc::new(Broken), calls.clone(), Arc::new(DryRunNotifier::new()));
    let outcome = engine.handle(&answered("d1", STRANGER, LINE, "")).await;
    assert_eq!(outcome.status, OutcomeStatus::NoConfig);
    assert_eq!(calls.count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_calls_and_duplicates() {
    let h = Arc::new(Harness::new());

    let mut tasks = Vec::new();
    for i in 0..20 {
        for _ in 0..3 {
            let h = Arc::clone(&h);
            tasks.push(tokio::spawn(async move {
                let call_id = format!("call-{}", i);
                h.engine.handle(&answered(&call_id, STRANGER, LINE, "Jane")).await
            }));
        }
    }

    let mut started = 0;
    let mut ignored = 0;
    for task in tasks {
        match task.await.unwrap().status {
            OutcomeStatus::ScreeningStarted => started += 1,
            OutcomeStatus::Ignored => ignored += 1,
            other => panic!("unexpected status {:?}", other),
        }
    }
    assert_eq!(started, 20);
    assert_eq!(ignored, 40);

    for i in 0..20 {
        assert_eq!(h.calls.actions_for(&format!("call-{}", i)).len(), 1);
    }
    assert_eq!(h.sent_alerts().await.len(), 20);
    assert_eq!(h.engine.registry().len(), 20);
}

#[tokio::test(start_paused = true)]
async fn test_ended_retention_counts_from_last_event() {
    let calls = Arc::new(DryRunCallControl::new());
    let engine = ScreeningEngine::new(
        Arc::new(StaticLineDirectory::new(vec![default_line()]).unwrap()),
        calls.clone(),
        Arc::new(AlertDispatcher::new(Arc::new(DryRunNotifier::new()), None)),
        Arc::new(SessionRegistry::new(RegistryConfig {
            idle_timeout: Duration::from_secs(600),
            ended_retention: Duration::from_secs(300),
            sweep_interval: Duration::from_secs(60),
        })),
        &ScreeningConfig::default(),
    );

    let outcome = engine.handle(&answered("c1", STRANGER, LINE, "Jane")).await;
    assert_eq!(outcome.status, OutcomeStatus::ScreeningStarted);

    tokio::time::advance(Duration::from_secs(500)).await;
    let outcome = engine.handle(&gather("c1", "1")).await;
    assert_eq!(outcome.status, OutcomeStatus::MedicalTransferred);

    // 700s after the session was created, 200s after it ended
    tokio::time::advance(Duration::from_secs(200)).await;
    let replay = engine.handle(&gather("c1", "1")).await;
    assert_eq!(replay.reason, Some(IgnoreReason::AfterEnd));
    assert_eq!(transfers(&calls.actions_for("c1")), 1);

    tokio::time::advance(Duration::from_secs(101)).await;
    let late = engine.handle(&gather("c1", "1")).await;
    assert_eq!(late.reason, Some(IgnoreReason::UnknownCall));
    assert!(engine.registry().is_empty());
}
