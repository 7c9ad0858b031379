//! Out-painting task lifecycle: status state machine, the [`TaskApi`] seam,
//! and the polling loop.
//!
//! A task moves `PENDING → RUNNING → SUSPENDED → {SUCCEEDED | FAILED}`;
//! `SUSPENDED` may go back to `RUNNING`. `UNKNOWN` means "keep polling".
//! Only `SUCCEEDED` and `FAILED` are terminal.
//!
//! The backend offers no push channel, so completion is detected by
//! repeated [`TaskApi::query`] calls. [`poll_task`] runs that loop against
//! any `TaskApi`, so a different transport only needs a new impl.

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::time::Instant;

use crate::error::{ClientError, Result};
use crate::types::{ImageParameters, TaskDetailOutput, TaskMetrics};

/// Lower bound on the spacing between two queries.
pub const MIN_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Remote task status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum TaskStatus {
    Pending,
    Running,
    Suspended,
    Succeeded,
    Failed,
    #[default]
    Unknown,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Pending => "PENDING",
            TaskStatus::Running => "RUNNING",
            TaskStatus::Suspended => "SUSPENDED",
            TaskStatus::Succeeded => "SUCCEEDED",
            TaskStatus::Failed => "FAILED",
            TaskStatus::Unknown => "UNKNOWN",
        }
    }

    /// Parse a wire status. Anything unrecognised is `Unknown`.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => TaskStatus::Pending,
            "RUNNING" => TaskStatus::Running,
            "SUSPENDED" => TaskStatus::Suspended,
            "SUCCEEDED" => TaskStatus::Succeeded,
            "FAILED" => TaskStatus::Failed,
            _ => TaskStatus::Unknown,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Succeeded | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(TaskStatus::parse).unwrap_or_default())
    }
}

/// Client-side view of a remote out-painting task.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OutpaintingTask {
    pub task_id: String,
    pub status: TaskStatus,
    pub output_image_url: Option<String>,
    pub error_code: Option<String>,
    pub error_message: Option<String>,
    pub submit_time: Option<String>,
    pub scheduled_time: Option<String>,
    pub end_time: Option<String>,
    pub metrics: Option<TaskMetrics>,
}

impl OutpaintingTask {
    /// A task known only by id and status.
    pub fn new(task_id: impl Into<String>, status: TaskStatus) -> Self {
        Self {
            task_id: task_id.into(),
            status,
            output_image_url: None,
            error_code: None,
            error_message: None,
            submit_time: None,
            scheduled_time: None,
            end_time: None,
            metrics: None,
        }
    }

    /// Build from a query response. `task_id` is used when the server
    /// leaves the id out.
    pub fn from_detail(task_id: &str, detail: TaskDetailOutput) -> Self {
        Self {
            task_id: detail
                .task_id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| task_id.to_string()),
            status: detail.task_status,
            output_image_url: detail.output_image_url.filter(|u| !u.is_empty()),
            error_code: detail.code.filter(|c| !c.is_empty()),
            error_message: detail.message.filter(|m| !m.is_empty()),
            submit_time: detail.submit_time,
            scheduled_time: detail.scheduled_time,
            end_time: detail.end_time,
            metrics: detail.task_metrics,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Remote operations the task lifecycle needs.
///
/// [`PictureClient`](crate::PictureClient) implements this over HTTP.
pub trait TaskApi {
    /// Create a task. Each call creates a new, independent task.
    fn submit(
        &self,
        parameters: &ImageParameters,
        picture_id: &str,
    ) -> impl Future<Output = Result<String>> + Send;

    /// Fetch the current state of a task. Side-effect free.
    fn query(&self, task_id: &str) -> impl Future<Output = Result<OutpaintingTask>> + Send;
}

/// Polling policy for [`poll_task`].
#[derive(Debug, Clone)]
pub struct PollOptions {
    /// Wait before the second query. Clamped to [`MIN_POLL_INTERVAL`].
    pub interval: Duration,
    /// Upper bound for the wait after backoff.
    pub max_interval: Duration,
    /// Factor applied to the wait after every query (1.0 = fixed interval).
    pub backoff: f64,
    /// Total wall-clock budget for the whole wait.
    pub timeout: Duration,
    /// Consecutive transport failures tolerated before giving up.
    pub max_transport_retries: u32,
    /// Set to `true` to stop polling.
    pub cancellation: Option<Arc<AtomicBool>>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_interval: Duration::from_secs(10),
            backoff: 1.5,
            timeout: Duration::from_secs(300),
            max_transport_retries: 3,
            cancellation: None,
        }
    }
}

impl PollOptions {
    /// Poll at a fixed interval with no backoff.
    pub fn fixed(interval: Duration, timeout: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff: 1.0,
            timeout,
            ..Default::default()
        }
    }

    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_max_interval(mut self, max: Duration) -> Self {
        self.max_interval = max;
        self
    }

    pub fn with_backoff(mut self, factor: f64) -> Self {
        self.backoff = factor;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_transport_retries(mut self, retries: u32) -> Self {
        self.max_transport_retries = retries;
        self
    }

    /// Attach a flag the caller can set to abort the wait.
    pub fn with_cancellation(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancellation = Some(flag);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    fn first_delay(&self) -> Duration {
        self.interval.max(MIN_POLL_INTERVAL)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        let ceiling = self.max_interval.max(self.first_delay());
        let factor = if self.backoff.is_finite() && self.backoff > 1.0 {
            self.backoff
        } else {
            1.0
        };
        let current = current.min(ceiling);
        Duration::try_from_secs_f64(current.as_secs_f64() * factor)
            .unwrap_or(ceiling)
            .min(ceiling)
    }
}

/// Query `task_id` until it reaches a terminal status.
///
/// - `SUCCEEDED`: returns the final task.
/// - `FAILED`: [`ClientError::TaskFailed`] with the server's code/message.
/// - budget exhausted: [`ClientError::PollTimeout`]; no query follows.
/// - cancellation flag set: [`ClientError::Cancelled`], checked before
///   every query and again before the budget is checked, so a cancel
///   never surfaces as a timeout.
///
/// A single query may run past the budget by at most [`MIN_POLL_INTERVAL`].
/// Transport errors are retried up to `max_transport_retries` times in a
/// row. Any other error ends the loop at once. `on_progress` sees every
/// successfully fetched state.
pub async fn poll_task<A, F>(
    api: &A,
    task_id: &str,
    options: &PollOptions,
    mut on_progress: F,
) -> Result<OutpaintingTask>
where
    A: TaskApi + ?Sized,
    F: FnMut(&OutpaintingTask),
{
    let start = Instant::now();
    let mut delay = options.first_delay();
    let mut failures: u32 = 0;
    let mut last_status = TaskStatus::Unknown;

    loop {
        if options.is_cancelled() {
            return Err(cancelled(task_id));
        }

        let remaining = options.timeout.saturating_sub(start.elapsed());
        let reply =
            match tokio::time::timeout(remaining.max(MIN_POLL_INTERVAL), api.query(task_id)).await
            {
                Ok(reply) => reply,
                Err(_) if options.is_cancelled() => return Err(cancelled(task_id)),
                Err(_) => return Err(timed_out(task_id, last_status, start.elapsed())),
            };

        match reply {
            Ok(task) => {
                failures = 0;
                last_status = task.status;
                tracing::debug!(task_id, status = %task.status, "polled task");
                on_progress(&task);

                match task.status {
                    TaskStatus::Succeeded => {
                        tracing::info!(task_id, elapsed = ?start.elapsed(), "task succeeded");
                        return Ok(task);
                    }
                    TaskStatus::Failed => {
                        tracing::warn!(
                            task_id,
                            code = task.error_code.as_deref().unwrap_or(""),
                            "task failed"
                        );
                        return Err(ClientError::TaskFailed {
                            task_id: task.task_id,
                            code: task.error_code,
                            message: task.error_message,
                        });
                    }
                    _ => {}
                }
            }
            Err(e) if e.is_transient() && failures < options.max_transport_retries => {
                failures += 1;
                tracing::warn!(
                    task_id,
                    attempt = failures,
                    max = options.max_transport_retries,
                    "transient error while polling: {}",
                    e
                );
            }
            Err(e) => return Err(e),
        }

        if options.is_cancelled() {
            return Err(cancelled(task_id));
        }

        let elapsed = start.elapsed();
        if elapsed >= options.timeout {
            return Err(timed_out(task_id, last_status, elapsed));
        }

        tokio::time::sleep(delay.min(options.timeout - elapsed)).await;
        delay = options.next_delay(delay);
    }
}

fn cancelled(task_id: &str) -> ClientError {
    tracing::info!(task_id, "polling cancelled");
    ClientError::Cancelled
}

fn timed_out(task_id: &str, last_status: TaskStatus, elapsed: Duration) -> ClientError {
    tracing::warn!(task_id, status = %last_status, ?elapsed, "gave up waiting for task");
    ClientError::PollTimeout {
        task_id: task_id.to_string(),
        last_status,
        elapsed,
    }
}

/// Submit a task and wait for it. A rejected submission issues no query.
pub async fn submit_and_wait<A, F>(
    api: &A,
    parameters: &ImageParameters,
    picture_id: &str,
    options: &PollOptions,
    on_progress: F,
) -> Result<OutpaintingTask>
where
    A: TaskApi + ?Sized,
    F: FnMut(&OutpaintingTask),
{
    let task_id = api.submit(parameters, picture_id).await?;
    tracing::info!(task_id = %task_id, picture_id, "out-painting task submitted");
    poll_task(api, &task_id, options, on_progress).await
}
