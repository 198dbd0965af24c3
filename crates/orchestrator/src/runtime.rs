//! In-process durable-task runtime: the workflow registry and the schedule
//! worker that fires reminder tasks.
//!
//! Orchestrators are tokio tasks registered by workflow id. Signals to one
//! orchestrator are delivered in order through its mailbox and handled one
//! at a time. Schedules live in the database and are drained by a polling
//! worker, so they survive restarts; [`Runtime::resume`] relaunches the
//! orchestrators of events that are not over yet.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Utc;
use tokio::sync::{mpsc, Mutex};

use crate::context::AppContext;
use crate::error::OrchestratorError;
use crate::reminder::run_reminder_task;
use crate::signal::Signal;
use crate::workflow::{completion_deadline, run_orchestrator};

const SIGNAL_MAILBOX_CAPACITY: usize = 64;
const DUE_BATCH_LIMIT: i64 = 100;

#[derive(Clone)]
pub struct Runtime {
    inner: Arc<RuntimeInner>,
}

struct RuntimeInner {
    ctx: Arc<AppContext>,
    workflows: Mutex<HashMap<String, mpsc::Sender<Signal>>>,
}

impl Runtime {
    pub fn new(ctx: Arc<AppContext>) -> Self {
        Self {
            inner: Arc::new(RuntimeInner {
                ctx,
                workflows: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn context(&self) -> &Arc<AppContext> {
        &self.inner.ctx
    }

    /// Launch the orchestrator for an event. At most one live orchestrator
    /// exists per event: a second start is a no-op, and an event whose
    /// completion deadline has passed is never relaunched. Returns whether a
    /// new orchestrator was started.
    pub async fn start_workflow(&self, event_id: &str) -> Result<bool, OrchestratorError> {
        let ctx = &self.inner.ctx;
        let event = ctx
            .store
            .event_by_id(event_id)
            .await?
            .ok_or_else(|| OrchestratorError::EventNotFound(event_id.to_string()))?;

        if completion_deadline(&event, ctx.completion_grace) <= Utc::now() {
            tracing::warn!(
                event_id,
                workflow_id = %event.workflow_id,
                "event already over, orchestrator not started"
            );
            return Ok(false);
        }

        let mut workflows = self.inner.workflows.lock().await;
        if workflows.contains_key(&event.workflow_id) {
            tracing::debug!(workflow_id = %event.workflow_id, "orchestrator already live");
            return Ok(false);
        }

        let (sender, receiver) = mpsc::channel(SIGNAL_MAILBOX_CAPACITY);
        workflows.insert(event.workflow_id.clone(), sender);
        drop(workflows);

        let inner = Arc::clone(&self.inner);
        let workflow_id = event.workflow_id.clone();
        let event_id = event.id.clone();
        tokio::spawn(async move {
            run_orchestrator(
                Arc::clone(&inner.ctx),
                event_id,
                workflow_id.clone(),
                receiver,
            )
            .await;
            inner.workflows.lock().await.remove(&workflow_id);
        });
        Ok(true)
    }

    /// Deliver a raw `(name, payload)` signal. A payload failing the shape
    /// check is logged and dropped, not an error; signaling a workflow that
    /// is not live is.
    pub async fn signal(
        &self,
        workflow_id: &str,
        name: &str,
        payload: serde_json::Value,
    ) -> Result<(), OrchestratorError> {
        match Signal::parse(name, payload) {
            Ok(signal) => self.send_signal(workflow_id, signal).await,
            Err(err) => {
                tracing::warn!(workflow_id, err = %err, "malformed signal dropped");
                Ok(())
            }
        }
    }

    pub async fn send_signal(
        &self,
        workflow_id: &str,
        signal: Signal,
    ) -> Result<(), OrchestratorError> {
        let sender = {
            let workflows = self.inner.workflows.lock().await;
            workflows.get(workflow_id).cloned()
        };
        let Some(sender) = sender else {
            return Err(OrchestratorError::WorkflowNotRunning(workflow_id.to_string()));
        };

        tracing::debug!(workflow_id, signal = signal.name(), "signal enqueued");
        if sender.send(signal).await.is_err() {
            // The orchestrator completed between lookup and send.
            self.inner.workflows.lock().await.remove(workflow_id);
            return Err(OrchestratorError::WorkflowNotRunning(workflow_id.to_string()));
        }
        Ok(())
    }

    pub async fn is_running(&self, workflow_id: &str) -> bool {
        self.inner.workflows.lock().await.contains_key(workflow_id)
    }

    /// Relaunch orchestrators for events that are not over. Called once at
    /// startup; the at-most-one invariant makes it safe to call again.
    pub async fn resume(&self) -> Result<usize, OrchestratorError> {
        let ctx = &self.inner.ctx;
        let mut scope = ctx.store.scope().await?;
        let events = scope
            .events_pending_completion(Utc::now(), ctx.completion_grace)
            .await?;
        scope.commit().await?;

        let mut started = 0;
        for event in &events {
            if self.start_workflow(&event.id).await? {
                started += 1;
            }
        }
        if started > 0 {
            tracing::info!(started, "orchestrators resumed");
        }
        Ok(started)
    }

    /// Drop every mailbox. Live orchestrators observe the closed channel
    /// and detach without deleting their schedules, which is what a process
    /// shutdown wants.
    pub async fn shutdown(&self) {
        self.inner.workflows.lock().await.clear();
    }

    /// Await until the given workflow is no longer live. Test support for
    /// observing termination.
    pub async fn wait_until_stopped(&self, workflow_id: &str) {
        loop {
            if !self.is_running(workflow_id).await {
                return;
            }
            tokio::time::sleep(StdDuration::from_millis(10)).await;
        }
    }
}

/// Background worker draining due schedule rows, in the same shape as a
/// notification poll loop: tick, claim the due batch, fire each, remove.
///
/// A row is deleted only after its reminder task ran, so a crash between
/// firing and deletion re-fires after restart (at-least-once).
pub struct ScheduleWorker {
    ctx: Arc<AppContext>,
    poll_interval: StdDuration,
}

impl ScheduleWorker {
    pub fn new(ctx: Arc<AppContext>, poll_interval: StdDuration) -> Self {
        Self { ctx, poll_interval }
    }

    /// Run until the task is dropped.
    pub async fn run(self) {
        let mut tick = tokio::time::interval(self.poll_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tracing::info!(
            poll_interval_secs = self.poll_interval.as_secs(),
            "schedule worker started"
        );
        loop {
            tick.tick().await;
            if let Err(err) = self.process_due().await {
                tracing::error!(err = %err, "schedule poll failed");
            }
        }
    }

    /// Fire every schedule due now. Public so tests (and a drain-once CLI
    /// path) can step the worker deterministically.
    pub async fn process_due(&self) -> Result<usize, OrchestratorError> {
        let mut scope = self.ctx.store.scope().await?;
        let due = scope.due_schedules(Utc::now(), DUE_BATCH_LIMIT).await?;
        scope.commit().await?;

        if due.is_empty() {
            return Ok(0);
        }
        tracing::info!(count = due.len(), "schedules due");

        for row in &due {
            match run_reminder_task(
                &self.ctx,
                &row.event_id,
                &row.subscription_id,
                row.offset_seconds,
            )
            .await
            {
                Ok(outcome) => tracing::info!(
                    schedule_id = %row.id,
                    delivered = outcome.delivered,
                    pending = outcome.pending,
                    failed = outcome.failed,
                    "reminder fired"
                ),
                Err(err) => {
                    // Retries are exhausted at this point; dropping the row
                    // keeps one bad reminder from wedging the queue.
                    tracing::error!(schedule_id = %row.id, err = %err, "reminder task failed")
                }
            }

            let mut scope = self.ctx.store.scope().await?;
            scope.delete_schedule(&row.id).await?;
            scope.commit().await?;
        }
        Ok(due.len())
    }
}
