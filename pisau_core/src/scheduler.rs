//! Cooperative periodic tasks on a single thread.
//!
//! Each task has its own period and next-due instant. Cancelled tasks are
//! skipped (and do not count toward the next deadline) until resumed.

use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Motor,
    Status,
    Vision,
}

/// Cancel/resume switch for one periodic task. Both operations are idempotent.
#[derive(Debug, Clone, Default)]
pub struct TaskHandle(Rc<Cell<bool>>);

impl TaskHandle {
    pub fn cancel(&self) {
        self.0.set(true);
    }
    pub fn resume(&self) {
        self.0.set(false);
    }
    pub fn is_cancelled(&self) -> bool {
        self.0.get()
    }
}

#[derive(Debug)]
struct PeriodicTask {
    kind: TaskKind,
    period: Duration,
    next_due: Instant,
    handle: TaskHandle,
}

#[derive(Debug, Default)]
pub struct Scheduler {
    tasks: Vec<PeriodicTask>,
    deadline_misses: u64,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a task, first due at `start`. Tasks run in registration order.
    pub fn add(&mut self, kind: TaskKind, period: Duration, start: Instant) -> TaskHandle {
        let handle = TaskHandle::default();
        self.tasks.push(PeriodicTask {
            kind,
            period: period.max(Duration::from_millis(1)),
            next_due: start,
            handle: handle.clone(),
        });
        handle
    }

    pub fn handle(&self, kind: TaskKind) -> Option<TaskHandle> {
        self.tasks
            .iter()
            .find(|t| t.kind == kind)
            .map(|t| t.handle.clone())
    }

    pub fn is_cancelled(&self, kind: TaskKind) -> bool {
        self.tasks
            .iter()
            .any(|t| t.kind == kind && t.handle.is_cancelled())
    }

    /// Tasks due at `now`, advancing each one's next-due instant.
    ///
    /// A task that fell more than a full period behind is realigned to
    /// `now + period` instead of running the missed ticks back to back.
    pub fn due(&mut self, now: Instant) -> Vec<TaskKind> {
        let mut out = Vec::new();
        for t in &mut self.tasks {
            if t.handle.is_cancelled() || now < t.next_due {
                continue;
            }
            t.next_due += t.period;
            if t.next_due <= now {
                self.deadline_misses += 1;
                tracing::trace!(task = ?t.kind, "deadline missed; realigning");
                t.next_due = now + t.period;
            }
            out.push(t.kind);
        }
        out
    }

    /// Earliest next-due instant among active tasks.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.tasks
            .iter()
            .filter(|t| !t.handle.is_cancelled())
            .map(|t| t.next_due)
            .min()
    }

    pub fn deadline_misses(&self) -> u64 {
        self.deadline_misses
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tasks_fire_on_their_own_periods() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        s.add(TaskKind::Motor, Duration::from_millis(500), t0);
        s.add(TaskKind::Vision, Duration::from_millis(100), t0);
        assert_eq!(s.due(t0), vec![TaskKind::Motor, TaskKind::Vision]);
        assert!(s.due(t0 + Duration::from_millis(50)).is_empty());
        assert_eq!(s.due(t0 + Duration::from_millis(100)), vec![TaskKind::Vision]);
        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_millis(200)));
    }

    #[test]
    fn cancelled_task_is_skipped_until_resumed() {
        let t0 = Instant::now();
        let mut s = Scheduler::new();
        let h = s.add(TaskKind::Status, Duration::from_secs(1), t0);
        h.cancel();
        h.cancel();
        assert!(s.due(t0).is_empty());
        assert_eq!(s.next_deadline(), None);
        h.resume();
        assert_eq!(s.due(t0 + Duration::from_secs(5)), vec![TaskKind::Status]);
        assert_eq!(s.deadline_misses(), 1);
        assert_eq!(s.next_deadline(), Some(t0 + Duration::from_secs(6)));
    }
}
