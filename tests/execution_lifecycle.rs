use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;
use tokio::sync::{mpsc, Notify};

use natpy::editor::{ChangeListener, Cursor, EditorBuffer, EditorSurface};
use natpy::execution::{
    ExecutionError, ExecutionRequest, ExecutionSession, ExecutionTransport, LifecycleEvent,
    ProgressSettings, RawResponse, RunState, SourceText, SubmitOutcome,
};
use natpy::output::{OutputContent, OutputPanel, IN_PROGRESS_TEXT};

enum Reply {
    Respond { status: u16, body: String },
    Fail(&'static str),
    Panic,
}

/// Fake service: fixed reply, optional gate, records every request it sees.
struct ScriptedTransport {
    reply: Reply,
    gate: Option<Arc<Notify>>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<String>>>,
}

impl ScriptedTransport {
    fn responding(status: u16, body: serde_json::Value) -> Self {
        Self::new(Reply::Respond {
            status,
            body: body.to_string(),
        })
    }

    fn new(reply: Reply) -> Self {
        Self {
            reply,
            gate: None,
            calls: Arc::new(AtomicUsize::new(0)),
            seen: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn gated(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }
}

#[async_trait]
impl ExecutionTransport for ScriptedTransport {
    async fn execute(&self, request: &ExecutionRequest) -> Result<RawResponse, ExecutionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .expect("seen lock")
            .push(request.code.clone());
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        match &self.reply {
            Reply::Respond { status, body } => Ok(RawResponse {
                status: *status,
                body: body.clone().into_bytes(),
            }),
            Reply::Fail(reason) => Err(ExecutionError::transport(*reason)),
            Reply::Panic => panic!("transport blew up"),
        }
    }

    fn endpoint(&self) -> &str {
        "scripted://execute"
    }
}

struct Fixture {
    session: ExecutionSession<ScriptedTransport, OutputPanel>,
    events: mpsc::UnboundedReceiver<LifecycleEvent>,
    calls: Arc<AtomicUsize>,
    seen: Arc<Mutex<Vec<String>>>,
}

fn fixture(transport: ScriptedTransport) -> Fixture {
    let calls = Arc::clone(&transport.calls);
    let seen = Arc::clone(&transport.seen);
    let (tx, rx) = mpsc::unbounded_channel();
    let session = ExecutionSession::new(
        transport,
        OutputPanel::default(),
        ProgressSettings::default(),
        tx,
    );
    Fixture {
        session,
        events: rx,
        calls,
        seen,
    }
}

/// Editor surface that counts how often its text is read.
struct CountingEditor {
    text: String,
    reads: Cell<usize>,
}

impl EditorSurface for CountingEditor {
    fn text(&self) -> String {
        self.reads.set(self.reads.get() + 1);
        self.text.clone()
    }

    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
    }

    fn cursor(&self) -> Cursor {
        Cursor::default()
    }

    fn subscribe(&mut self, _listener: ChangeListener) {}
}

#[tokio::test]
async fn successful_run_shows_output_verbatim() {
    let mut f = fixture(ScriptedTransport::responding(200, json!({ "output": "hi\n" })));
    let editor = EditorBuffer::new("print(\"hi\")");

    assert_eq!(f.session.state(), RunState::Idle);
    assert_eq!(f.session.trigger(&editor), SubmitOutcome::Started(1));
    assert_eq!(f.session.state(), RunState::Running);

    f.session.run_until_idle(&mut f.events, |_| {}).await;

    assert_eq!(f.session.sink().content(), &OutputContent::Success("hi\n".into()));
    assert_eq!(f.session.state(), RunState::Idle);
    assert_eq!(f.session.progress().value(), 100);
    assert_eq!(*f.seen.lock().unwrap(), vec!["print(\"hi\")".to_string()]);
}

#[tokio::test]
async fn rejected_empty_input_shows_detail() {
    let mut f = fixture(ScriptedTransport::responding(
        400,
        json!({ "detail": "SyntaxError: empty input" }),
    ));

    f.session.submit(SourceText::new(""));
    f.session.run_until_idle(&mut f.events, |_| {}).await;

    assert_eq!(
        f.session.sink().content(),
        &OutputContent::Failure("SyntaxError: empty input".into())
    );
    assert_eq!(f.session.state(), RunState::Idle);
    assert_eq!(*f.seen.lock().unwrap(), vec![String::new()]);
}

#[tokio::test]
async fn transport_fault_is_described_and_returns_to_idle() {
    let mut f = fixture(ScriptedTransport::new(Reply::Fail("connection refused")));

    f.session.submit(SourceText::new("Print x"));
    f.session.run_until_idle(&mut f.events, |_| {}).await;

    assert_eq!(
        f.session.sink().content(),
        &OutputContent::Failure("Error: connection refused".into())
    );
    assert_eq!(f.session.state(), RunState::Idle);
    assert_eq!(f.session.progress().value(), 100);
}

#[tokio::test]
async fn double_trigger_in_same_tick_makes_one_call() {
    let mut f = fixture(ScriptedTransport::responding(200, json!({ "output": "ok" })));
    let editor = EditorBuffer::new("Print x");

    assert_eq!(f.session.trigger(&editor), SubmitOutcome::Started(1));
    assert_eq!(f.session.trigger(&editor), SubmitOutcome::AlreadyRunning);

    let mut finished = 0;
    f.session
        .run_until_idle(&mut f.events, |s| {
            if !s.is_running() {
                finished += 1;
            }
        })
        .await;

    assert_eq!(finished, 1);
    assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.session.sink().content(), &OutputContent::Success("ok".into()));
}

#[tokio::test]
async fn panicking_transport_still_finishes_the_run() {
    let mut f = fixture(ScriptedTransport::new(Reply::Panic));

    f.session.submit(SourceText::new("Print x"));
    f.session.run_until_idle(&mut f.events, |_| {}).await;

    let OutputContent::Failure(message) = f.session.sink().content() else {
        panic!("expected failure, got {:?}", f.session.sink().content());
    };
    assert!(message.starts_with("Error: execution task failed"), "{message}");
    assert_eq!(f.session.state(), RunState::Idle);
}

#[tokio::test]
async fn error_field_on_success_status_is_a_failure() {
    let mut f = fixture(ScriptedTransport::responding(
        200,
        json!({ "output": "partial", "error": "NameError: x" }),
    ));

    f.session.submit(SourceText::new("Print x"));
    f.session.run_until_idle(&mut f.events, |_| {}).await;

    assert_eq!(
        f.session.sink().content(),
        &OutputContent::Failure("NameError: x".into())
    );
}

#[tokio::test(start_paused = true)]
async fn trigger_while_running_changes_nothing() {
    let gate = Arc::new(Notify::new());
    let mut f = fixture(
        ScriptedTransport::responding(200, json!({ "output": "done" })).gated(Arc::clone(&gate)),
    );
    let editor = CountingEditor {
        text: "Print x".into(),
        reads: Cell::new(0),
    };

    assert_eq!(f.session.trigger(&editor), SubmitOutcome::Started(1));
    assert_eq!(editor.reads.get(), 1);
    assert_eq!(f.session.sink().text(), IN_PROGRESS_TEXT);

    // Let some ticks land, then try again mid-flight.
    for _ in 0..3 {
        let ev = f.events.recv().await.expect("tick");
        f.session.handle(ev);
    }
    let progress_before = f.session.progress().value();
    assert_eq!(f.session.trigger(&editor), SubmitOutcome::AlreadyRunning);
    assert_eq!(editor.reads.get(), 1);
    assert_eq!(f.session.state(), RunState::Running);
    assert_eq!(f.session.progress().value(), progress_before);
    assert_eq!(f.session.sink().text(), IN_PROGRESS_TEXT);

    gate.notify_one();
    f.session.run_until_idle(&mut f.events, |_| {}).await;
    assert_eq!(f.calls.load(Ordering::SeqCst), 1);
    assert_eq!(f.session.sink().content(), &OutputContent::Success("done".into()));
}

#[tokio::test(start_paused = true)]
async fn progress_climbs_to_cap_then_jumps_to_complete() {
    let gate = Arc::new(Notify::new());
    let mut f = fixture(
        ScriptedTransport::responding(200, json!({ "output": "" })).gated(Arc::clone(&gate)),
    );
    let cap = ProgressSettings::default().cap;

    f.session.submit(SourceText::new("Print x"));
    assert_eq!(f.session.progress().value(), 0);

    let mut last = 0;
    while f.session.progress().value() < cap {
        let ev = f.events.recv().await.expect("tick");
        f.session.handle(ev);
        let value = f.session.progress().value();
        assert!(value >= last, "progress went backwards: {last} -> {value}");
        assert!(value < 100);
        last = value;
    }

    // Well past the point the cap was reached; the value must stay put.
    tokio::time::sleep(Duration::from_secs(5)).await;
    while let Ok(ev) = f.events.try_recv() {
        f.session.handle(ev);
    }
    assert_eq!(f.session.progress().value(), cap);
    assert!(f.session.is_running());

    gate.notify_one();
    f.session.run_until_idle(&mut f.events, |_| {}).await;
    assert_eq!(f.session.progress().value(), 100);
    assert!(!f.session.progress().is_ticking());
}

#[tokio::test]
async fn state_goes_idle_running_idle_once_per_run() {
    let mut f = fixture(ScriptedTransport::responding(200, json!({ "output": "1" })));

    let mut states = vec![f.session.state()];
    f.session.submit(SourceText::new("Print 1"));
    states.push(f.session.state());
    f.session
        .run_until_idle(&mut f.events, |s| {
            if states.last() != Some(&s.state()) {
                states.push(s.state());
            }
        })
        .await;

    assert_eq!(states, vec![RunState::Idle, RunState::Running, RunState::Idle]);
}

#[tokio::test]
async fn next_run_resets_progress_and_supersedes_output() {
    let mut f = fixture(ScriptedTransport::responding(200, json!({ "output": "again" })));

    f.session.submit(SourceText::new("Print 1"));
    f.session.run_until_idle(&mut f.events, |_| {}).await;
    assert_eq!(f.session.progress().value(), 100);

    assert_eq!(f.session.submit(SourceText::new("Print 2")), SubmitOutcome::Started(2));
    assert_eq!(f.session.progress().value(), 0);
    assert_eq!(f.session.sink().content(), &OutputContent::InProgress);

    f.session.run_until_idle(&mut f.events, |_| {}).await;
    assert_eq!(f.session.sink().content(), &OutputContent::Success("again".into()));
    assert_eq!(f.calls.load(Ordering::SeqCst), 2);
}
