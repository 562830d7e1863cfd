//! Scheduled tasks with cancellation handles.
//!
//! A pure timer wheel: callers schedule tasks at instants, poll with the
//! current time, and receive the tasks that came due. Nothing fires on its own
//! and nothing sleeps, so a cancelled task simply never comes out of
//! [`Scheduler::drain_due`].

use std::{
    collections::{BTreeMap, HashMap},
    ops::Add,
    time::Duration,
};

/// Smallest period accepted for repeating tasks.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Handle identifying one scheduled task. Used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskHandle(u64);

#[derive(Debug, Clone)]
struct Scheduled<T> {
    task: T,
    period: Option<Duration>,
}

/// Timer queue generic over the instant type and the task payload.
///
/// Tasks due at the same instant come out in scheduling order.
#[derive(Debug, Clone)]
pub struct Scheduler<I, T> {
    queue: BTreeMap<(I, TaskHandle), Scheduled<T>>,
    due_by_handle: HashMap<TaskHandle, I>,
    next_handle: u64,
}

impl<I, T> Default for Scheduler<I, T>
where
    I: Copy + Ord + Add<Duration, Output = I>,
    T: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<I, T> Scheduler<I, T>
where
    I: Copy + Ord + Add<Duration, Output = I>,
    T: Clone,
{
    /// Create an empty scheduler.
    pub fn new() -> Self {
        Self { queue: BTreeMap::new(), due_by_handle: HashMap::new(), next_handle: 0 }
    }

    /// Schedule `task` to come due once at `at`.
    pub fn schedule_at(&mut self, at: I, task: T) -> TaskHandle {
        self.insert(at, Scheduled { task, period: None })
    }

    /// Schedule `task` to come due at `first` and every `period` after.
    pub fn schedule_every(&mut self, first: I, period: Duration, task: T) -> TaskHandle {
        let period = period.max(MIN_PERIOD);
        self.insert(first, Scheduled { task, period: Some(period) })
    }

    /// Cancel a task. Returns false if it already fired (one-shot) or was
    /// cancelled before.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        match self.due_by_handle.remove(&handle) {
            Some(due) => self.queue.remove(&(due, handle)).is_some(),
            None => false,
        }
    }

    /// Returns true if `handle` is still scheduled.
    pub fn is_scheduled(&self, handle: TaskHandle) -> bool {
        self.due_by_handle.contains_key(&handle)
    }

    /// Remove and return every task due at or before `now`, in due order.
    ///
    /// Repeating tasks are re-armed at their next period boundary after
    /// `now`; missed periods are skipped rather than replayed.
    pub fn drain_due(&mut self, now: I) -> Vec<(TaskHandle, T)> {
        let mut fired = Vec::new();

        while let Some(entry) = self.queue.first_entry() {
            let (due, handle) = *entry.key();
            if due > now {
                break;
            }

            let scheduled = entry.remove();
            self.due_by_handle.remove(&handle);
            fired.push((handle, scheduled.task.clone()));

            if let Some(period) = scheduled.period {
                let mut next = due + period;
                while next <= now {
                    next = next + period;
                }
                self.queue.insert((next, handle), scheduled);
                self.due_by_handle.insert(handle, next);
            }
        }

        fired
    }

    /// Earliest pending due instant. `None` if nothing is scheduled.
    pub fn next_due(&self) -> Option<I> {
        self.queue.keys().next().map(|(due, _)| *due)
    }

    /// Number of pending tasks.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    /// Returns true if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Cancel everything.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.due_by_handle.clear();
    }

    fn insert(&mut self, at: I, scheduled: Scheduled<T>) -> TaskHandle {
        let handle = TaskHandle(self.next_handle);
        self.next_handle += 1;

        self.queue.insert((at, handle), scheduled);
        self.due_by_handle.insert(handle, at);
        handle
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;

    #[allow(clippy::disallowed_methods)]
    fn origin() -> Instant {
        Instant::now()
    }

    #[test]
    fn one_shot_fires_once() {
        let t0 = origin();
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(t0 + Duration::from_millis(10), "a");

        assert!(scheduler.drain_due(t0).is_empty());
        let fired = scheduler.drain_due(t0 + Duration::from_millis(10));
        assert_eq!(fired.len(), 1);
        assert_eq!(fired[0].1, "a");
        assert!(scheduler.drain_due(t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn fires_in_due_order() {
        let t0 = origin();
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(t0 + Duration::from_millis(30), 3);
        scheduler.schedule_at(t0 + Duration::from_millis(10), 1);
        scheduler.schedule_at(t0 + Duration::from_millis(20), 2);

        let fired: Vec<_> =
            scheduler.drain_due(t0 + Duration::from_millis(30)).into_iter().map(|(_, t)| t).collect();
        assert_eq!(fired, vec![1, 2, 3]);
    }

    #[test]
    fn cancelled_task_never_fires() {
        let t0 = origin();
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_at(t0, "gone");

        assert!(scheduler.cancel(handle));
        assert!(!scheduler.cancel(handle));
        assert!(scheduler.drain_due(t0 + Duration::from_secs(1)).is_empty());
    }

    #[test]
    fn repeating_task_rearms_and_skips_missed_periods() {
        let t0 = origin();
        let period = Duration::from_secs(60);
        let mut scheduler = Scheduler::new();
        let handle = scheduler.schedule_every(t0 + period, period, "poll");

        assert_eq!(scheduler.drain_due(t0 + period).len(), 1);
        assert_eq!(scheduler.next_due(), Some(t0 + period * 2));

        // Asleep for five periods: fires once, next due after now
        assert_eq!(scheduler.drain_due(t0 + period * 6).len(), 1);
        assert_eq!(scheduler.next_due(), Some(t0 + period * 7));

        assert!(scheduler.cancel(handle));
        assert!(scheduler.is_empty());
    }

    #[test]
    fn clear_cancels_everything() {
        let t0 = origin();
        let mut scheduler = Scheduler::new();
        scheduler.schedule_at(t0, 1);
        scheduler.schedule_every(t0, Duration::from_secs(1), 2);

        scheduler.clear();
        assert!(scheduler.is_empty());
        assert!(scheduler.drain_due(t0 + Duration::from_secs(10)).is_empty());
    }
}
