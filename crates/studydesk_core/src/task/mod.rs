//! Background execution of long-latency calls.
//!
//! # Responsibility
//! - Run each submitted job on its own worker thread.
//! - Deliver each job's single outcome back to the owning thread.
//!
//! # Invariants
//! - Every submitted job produces exactly one completion: its result, or a
//!   failure when the job panics or its worker cannot be started.
//! - A completion is only sent after the job has returned.
//! - At most one task per kind is listened to; a newer submission supersedes
//!   the older one, whose late result is dropped on delivery.
//! - Cancellation stops listening; it does not interrupt a running job.

use log::{error, info, warn};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use uuid::Uuid;

pub type TaskId = Uuid;

/// Kind of background work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Query,
    GenerateExercise,
}

impl TaskKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::GenerateExercise => "generate_exercise",
        }
    }
}

/// Shared flag telling the runner to ignore a task's result.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Caller-side handle for one submitted task.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    pub id: TaskId,
    pub kind: TaskKind,
    token: CancellationToken,
}

impl TaskHandle {
    /// Stops listening for this task's result.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }
}

/// The single outcome of one task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskCompletion<T> {
    pub id: TaskId,
    pub kind: TaskKind,
    /// `Err` carries a human-readable failure description.
    pub outcome: Result<T, String>,
}

struct InFlight {
    kind: TaskKind,
    token: CancellationToken,
    submitted_at: Instant,
}

/// Thread-per-task runner owned by the interactive thread.
pub struct TaskRunner<T> {
    sender: Sender<TaskCompletion<T>>,
    receiver: Receiver<TaskCompletion<T>>,
    in_flight: HashMap<TaskId, InFlight>,
    latest: HashMap<TaskKind, TaskId>,
}

impl<T: Send + 'static> Default for TaskRunner<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send + 'static> TaskRunner<T> {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            sender,
            receiver,
            in_flight: HashMap::new(),
            latest: HashMap::new(),
        }
    }

    /// Starts `job` on a new worker thread without blocking.
    pub fn submit<F>(&mut self, kind: TaskKind, job: F) -> TaskHandle
    where
        F: FnOnce() -> Result<T, String> + Send + 'static,
    {
        let id = Uuid::new_v4();
        let token = CancellationToken::new();

        if let Some(previous) = self.latest.insert(kind, id) {
            if let Some(entry) = self.in_flight.get(&previous) {
                entry.token.cancel();
                info!(
                    "event=task_supersede module=task status=ok kind={} superseded={}",
                    kind.as_str(),
                    previous
                );
            }
        }
        self.in_flight.insert(
            id,
            InFlight {
                kind,
                token: token.clone(),
                submitted_at: Instant::now(),
            },
        );

        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("studydesk-{}", kind.as_str()))
            .spawn(move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(job))
                    .unwrap_or_else(|payload| Err(panic_message(payload.as_ref())));
                let _ = sender.send(TaskCompletion { id, kind, outcome });
            });

        match spawned {
            Ok(_) => info!(
                "event=task_submit module=task status=ok kind={} task_id={}",
                kind.as_str(),
                id
            ),
            Err(err) => {
                error!(
                    "event=task_submit module=task status=error kind={} task_id={} error_code=spawn_failed",
                    kind.as_str(),
                    id
                );
                let _ = self.sender.send(TaskCompletion {
                    id,
                    kind,
                    outcome: Err(format!("could not start background worker: {err}")),
                });
            }
        }

        TaskHandle { id, kind, token }
    }

    /// Drains every completion that is ready, without blocking.
    pub fn poll(&mut self) -> Vec<TaskCompletion<T>> {
        let mut ready = Vec::new();
        while let Ok(completion) = self.receiver.try_recv() {
            if let Some(completion) = self.accept(completion) {
                ready.push(completion);
            }
        }
        ready
    }

    /// Blocks up to `timeout` for the next deliverable completion.
    pub fn wait_next(&mut self, timeout: Duration) -> Option<TaskCompletion<T>> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match self.receiver.recv_timeout(remaining) {
                Ok(completion) => {
                    if let Some(completion) = self.accept(completion) {
                        return Some(completion);
                    }
                }
                Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                    return None
                }
            }
        }
    }

    /// Whether a listened-to task of `kind` is still running.
    pub fn in_flight(&self, kind: TaskKind) -> bool {
        self.latest
            .get(&kind)
            .and_then(|id| self.in_flight.get(id))
            .is_some_and(|entry| !entry.token.is_cancelled())
    }

    /// Number of tasks whose completion has not arrived yet.
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    fn accept(&mut self, completion: TaskCompletion<T>) -> Option<TaskCompletion<T>> {
        let Some(entry) = self.in_flight.remove(&completion.id) else {
            warn!(
                "event=task_drop module=task status=ok reason=unknown_task task_id={}",
                completion.id
            );
            return None;
        };
        if self.latest.get(&entry.kind) == Some(&completion.id) {
            self.latest.remove(&entry.kind);
        }

        if entry.token.is_cancelled() {
            info!(
                "event=task_drop module=task status=ok reason=cancelled kind={} task_id={}",
                entry.kind.as_str(),
                completion.id
            );
            return None;
        }

        info!(
            "event=task_complete module=task status={} kind={} task_id={} duration_ms={}",
            if completion.outcome.is_ok() { "ok" } else { "error" },
            entry.kind.as_str(),
            completion.id,
            entry.submitted_at.elapsed().as_millis()
        );
        Some(completion)
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    let message = if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    };
    format!("background task panicked: {message}")
}

#[cfg(test)]
mod tests {
    use super::{TaskKind, TaskRunner};
    use std::sync::mpsc;
    use std::time::Duration;

    const WAIT: Duration = Duration::from_secs(5);

    #[test]
    fn completion_is_delivered_once_after_the_job_returns() {
        let mut runner = TaskRunner::<u32>::new();
        let (release, gate) = mpsc::channel::<()>();
        let handle = runner.submit(TaskKind::Query, move || {
            gate.recv().map_err(|err| err.to_string())?;
            Ok(7)
        });

        assert!(runner.poll().is_empty());
        assert!(runner.in_flight(TaskKind::Query));

        release.send(()).expect("release job");
        let completion = runner.wait_next(WAIT).expect("completion");
        assert_eq!(completion.id, handle.id);
        assert_eq!(completion.outcome, Ok(7));
        assert!(!runner.in_flight(TaskKind::Query));
        assert!(runner.wait_next(Duration::from_millis(50)).is_none());
        assert_eq!(runner.pending(), 0);
    }

    #[test]
    fn panicking_job_becomes_a_failure() {
        let mut runner = TaskRunner::<u32>::new();
        runner.submit(TaskKind::GenerateExercise, || panic!("boom"));
        let completion = runner.wait_next(WAIT).expect("completion");
        let message = completion.outcome.expect_err("failure expected");
        assert!(message.contains("boom"));
    }

    #[test]
    fn superseded_result_is_dropped() {
        let mut runner = TaskRunner::<&'static str>::new();
        let (release, gate) = mpsc::channel::<()>();
        let first = runner.submit(TaskKind::Query, move || {
            let _ = gate.recv();
            Ok("old")
        });
        let second = runner.submit(TaskKind::Query, || Ok("new"));
        assert!(first.is_cancelled());

        let completion = runner.wait_next(WAIT).expect("completion");
        assert_eq!(completion.id, second.id);
        assert_eq!(completion.outcome, Ok("new"));

        release.send(()).expect("release old job");
        assert!(runner.wait_next(Duration::from_secs(1)).is_none());
        assert_eq!(runner.pending(), 0);
    }

    #[test]
    fn kinds_do_not_supersede_each_other() {
        let mut runner = TaskRunner::<&'static str>::new();
        runner.submit(TaskKind::Query, || Ok("answer"));
        runner.submit(TaskKind::GenerateExercise, || Ok("sheet"));

        let mut outcomes = vec![
            runner.wait_next(WAIT).expect("first").outcome,
            runner.wait_next(WAIT).expect("second").outcome,
        ];
        outcomes.sort();
        assert_eq!(outcomes, vec![Ok("answer"), Ok("sheet")]);
    }

    #[test]
    fn cancelled_handle_is_not_delivered() {
        let mut runner = TaskRunner::<u32>::new();
        let handle = runner.submit(TaskKind::Query, || Ok(1));
        handle.cancel();
        assert!(!runner.in_flight(TaskKind::Query));
        assert!(runner.wait_next(Duration::from_millis(300)).is_none());
    }
}
