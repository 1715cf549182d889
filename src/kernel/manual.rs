use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

use super::scheduler::{Scheduler, TimerAction, TimerHandle};
use super::time::{Clock, Timestamp};

struct PendingTimer {
    deadline: Timestamp,
    seq: u64,
    handle: TimerHandle,
    action: TimerAction,
}

#[derive(Default)]
struct Timeline {
    now: Timestamp,
    next_seq: u64,
    timers: Vec<PendingTimer>,
}

/// Deterministic clock + scheduler. Time only moves through [`ManualTime::advance`],
/// which fires due timers in deadline order (ties in scheduling order).
///
/// Actions run with the internal lock released, so they may schedule further
/// timers; those fire in the same `advance` call if they fall inside the window.
#[derive(Clone, Default)]
pub struct ManualTime {
    inner: Arc<Mutex<Timeline>>,
}

impl ManualTime {
    pub fn new(start: Timestamp) -> Self {
        let timeline = Timeline { now: start, ..Timeline::default() };
        Self { inner: Arc::new(Mutex::new(timeline)) }
    }

    pub fn advance(&self, by: Duration) {
        let target = self.inner.lock().now.add(by);

        loop {
            let due = {
                let mut tl = self.inner.lock();
                let next = tl
                    .timers
                    .iter()
                    .enumerate()
                    .filter(|(_, t)| t.deadline <= target)
                    .min_by_key(|(_, t)| (t.deadline, t.seq))
                    .map(|(i, _)| i);

                match next {
                    Some(i) => {
                        let timer = tl.timers.remove(i);
                        if timer.deadline > tl.now {
                            tl.now = timer.deadline;
                        }
                        Some(timer)
                    }
                    None => None,
                }
            };

            match due {
                Some(timer) if !timer.handle.is_cancelled() => (timer.action)(),
                Some(_) => continue,
                None => break,
            }
        }

        self.inner.lock().now = target;
    }

    /// Timers still waiting to fire (cancelled ones excluded).
    pub fn pending(&self) -> usize {
        self.inner
            .lock()
            .timers
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .count()
    }

    pub fn as_clock(&self) -> Arc<dyn Clock> {
        Arc::new(self.clone())
    }

    pub fn as_scheduler(&self) -> Arc<dyn Scheduler> {
        Arc::new(self.clone())
    }
}

impl Clock for ManualTime {
    fn now(&self) -> Timestamp {
        self.inner.lock().now
    }
}

impl Scheduler for ManualTime {
    fn schedule(&self, after: Duration, action: TimerAction) -> TimerHandle {
        let handle = TimerHandle::new();
        let mut tl = self.inner.lock();
        let deadline = tl.now.add(after);
        let seq = tl.next_seq;
        tl.next_seq += 1;
        tl.timers.push(PendingTimer { deadline, seq, handle: handle.clone(), action });
        handle
    }
}
