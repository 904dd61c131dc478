//! Run lifecycle for one editor session.
//!
//! All state here is owned by the single event loop that feeds `handle()`.
//! The network call runs in a spawned task and reports back with a
//! `LifecycleEvent::Finished`; the progress cadence reports with
//! `LifecycleEvent::ProgressTick`. At most one run is in flight.

use std::sync::Arc;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};

use super::{
    normalize_response, ExecutionError, ExecutionRequest, ExecutionResult, ExecutionTransport,
    LifecycleEvent, ProgressPresenter, ProgressSettings, RunId, RunState, SourceText,
    SubmitOutcome,
};
use crate::editor::EditorSurface;
use crate::output::OutputSink;

pub struct ExecutionSession<T, S> {
    transport: Arc<T>,
    sink: S,
    progress: ProgressPresenter,
    state: RunState,
    last_run: RunId,
    current_run: Option<RunId>,
    events: UnboundedSender<LifecycleEvent>,
}

impl<T, S> ExecutionSession<T, S>
where
    T: ExecutionTransport,
    S: OutputSink,
{
    /// `events` must feed back into the loop that calls [`Self::handle`].
    pub fn new(
        transport: T,
        sink: S,
        settings: ProgressSettings,
        events: UnboundedSender<LifecycleEvent>,
    ) -> Self {
        Self {
            transport: Arc::new(transport),
            sink,
            progress: ProgressPresenter::new(settings),
            state: RunState::Idle,
            last_run: 0,
            current_run: None,
            events,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == RunState::Running
    }

    pub fn progress(&self) -> &ProgressPresenter {
        &self.progress
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn endpoint(&self) -> &str {
        self.transport.endpoint()
    }

    /// Run whatever the editor currently holds. The text is only read when the
    /// run is accepted.
    pub fn trigger(&mut self, editor: &dyn EditorSurface) -> SubmitOutcome {
        if self.is_running() {
            return self.reject();
        }
        self.submit(SourceText::new(editor.text()))
    }

    /// Start a run for `source`, or do nothing if one is already in flight.
    pub fn submit(&mut self, source: SourceText) -> SubmitOutcome {
        if self.is_running() {
            return self.reject();
        }

        self.last_run += 1;
        let run = self.last_run;
        self.state = RunState::Running;
        self.current_run = Some(run);

        self.sink.begin_run();
        self.progress.start(run, self.events.clone());

        let request = ExecutionRequest::new(&source);
        tracing::info!(
            run,
            bytes = request.code.len(),
            endpoint = self.transport.endpoint(),
            "execution started"
        );
        spawn_request(Arc::clone(&self.transport), request, run, self.events.clone());

        SubmitOutcome::Started(run)
    }

    /// Feed one lifecycle event. Returns `true` when the event finished the
    /// current run.
    pub fn handle(&mut self, event: LifecycleEvent) -> bool {
        match event {
            LifecycleEvent::ProgressTick { run } => {
                self.progress.advance(run);
                false
            }
            LifecycleEvent::Finished { run, result } => self.finish(run, result),
        }
    }

    /// Process events from `events` until the current run (if any) has been
    /// delivered. `on_update` gets the session after every event.
    pub async fn run_until_idle<F>(
        &mut self,
        events: &mut UnboundedReceiver<LifecycleEvent>,
        mut on_update: F,
    ) where
        F: FnMut(&mut Self),
    {
        while self.is_running() {
            let Some(event) = events.recv().await else {
                break;
            };
            self.handle(event);
            on_update(self);
        }
    }

    /// Consume the session, keeping only the sink.
    pub fn into_sink(self) -> S {
        self.sink
    }

    fn reject(&self) -> SubmitOutcome {
        tracing::debug!(run = ?self.current_run, "run ignored: execution already in progress");
        SubmitOutcome::AlreadyRunning
    }

    fn finish(&mut self, run: RunId, result: ExecutionResult) -> bool {
        if self.current_run != Some(run) {
            tracing::warn!(run, current = ?self.current_run, "dropping result for stale run");
            return false;
        }

        self.progress.complete();
        self.sink.render(&result);
        self.current_run = None;
        self.state = RunState::Idle;

        if result.is_success() {
            tracing::info!(run, bytes = result.text().len(), "execution succeeded");
        } else {
            tracing::info!(run, message = result.text(), "execution failed");
        }
        true
    }
}

/// Issue the request on a worker task. The outer task always reports a
/// result, even if the inner one panics.
fn spawn_request<T: ExecutionTransport>(
    transport: Arc<T>,
    request: ExecutionRequest,
    run: RunId,
    events: UnboundedSender<LifecycleEvent>,
) {
    let worker = tokio::spawn(async move {
        match transport.execute(&request).await {
            Ok(raw) => {
                tracing::debug!(run, status = raw.status, "response received");
                normalize_response(&raw)
            }
            Err(err) => {
                tracing::warn!(run, error = %err, "transport failure");
                err.into()
            }
        }
    });

    tokio::spawn(async move {
        let result = match worker.await {
            Ok(result) => result,
            Err(join_err) => {
                tracing::error!(run, error = %join_err, "execution task failed");
                ExecutionError::transport(format!("execution task failed: {join_err}")).into()
            }
        };
        // Receiver gone means the shell is shutting down.
        let _ = events.send(LifecycleEvent::Finished { run, result });
    });
}
