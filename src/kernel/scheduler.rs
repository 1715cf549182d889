use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Deferred work handed to a [`Scheduler`].
pub type TimerAction = Box<dyn FnOnce() + Send + 'static>;

/// One-shot timer backstop. Every delayed action in the crate (ringer restore,
/// redial countdown ticks) goes through this seam so tests can swap in
/// [`super::ManualTime`].
pub trait Scheduler: Send + Sync {
    fn schedule(&self, after: Duration, action: TimerAction) -> TimerHandle;
}

/// Cancels the pending action when asked. Dropping the handle does NOT cancel.
#[derive(Debug, Clone, Default)]
pub struct TimerHandle {
    token: CancellationToken,
}

impl TimerHandle {
    pub fn new() -> Self {
        Self { token: CancellationToken::new() }
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub(crate) fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Runs each timer as a sleeping tokio task. Must be used from inside a runtime.
#[derive(Debug, Clone)]
pub struct TokioScheduler {
    runtime: tokio::runtime::Handle,
}

impl TokioScheduler {
    pub fn new(runtime: tokio::runtime::Handle) -> Self {
        Self { runtime }
    }

    /// Binds to the runtime of the calling task.
    pub fn current() -> Self {
        Self::new(tokio::runtime::Handle::current())
    }

    pub fn shared(self) -> Arc<dyn Scheduler> {
        Arc::new(self)
    }
}

impl Scheduler for TokioScheduler {
    fn schedule(&self, after: Duration, action: TimerAction) -> TimerHandle {
        let handle = TimerHandle::new();
        let token = handle.token().clone();

        self.runtime.spawn(async move {
            tokio::select! {
                _ = token.cancelled() => {
                    debug!("Timer cancelled before firing ({:?})", after);
                }
                _ = tokio::time::sleep(after) => {
                    action();
                }
            }
        });

        handle
    }
}
