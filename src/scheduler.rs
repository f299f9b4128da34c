use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::runtime::Handle;
use tokio::task::AbortHandle;

use crate::clock::{delay_until, Clock};
use crate::models::Timestamp;
use crate::notify::{Notifier, ReminderNotice};

/// A pending one-shot wake-up for one task.
#[derive(Debug)]
struct Registration {
    fire_at: Timestamp,
    generation: u64,
    handle: AbortHandle,
}

/// Per-task one-shot reminder timers.
///
/// At most one registration exists per task id. A registration is consumed when it fires,
/// and removed (with its timer aborted) on cancel or reschedule.
#[derive(Clone)]
pub struct ReminderScheduler {
    inner: Arc<SchedulerInner>,
}

struct SchedulerInner {
    clock: Arc<dyn Clock>,
    notifier: Arc<dyn Notifier>,
    runtime: Handle,
    registrations: Mutex<HashMap<String, Registration>>,
    next_generation: AtomicU64,
}

impl ReminderScheduler {
    pub fn new(clock: Arc<dyn Clock>, notifier: Arc<dyn Notifier>, runtime: Handle) -> Self {
        Self {
            inner: Arc::new(SchedulerInner {
                clock,
                notifier,
                runtime,
                registrations: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Arms (or re-arms) the reminder for `task_id`. A past `fire_at` fires immediately.
    pub fn schedule(&self, task_id: &str, fire_at: Timestamp, payload_text: &str) {
        let now = self.inner.clock.now_ms();
        let delay = delay_until(fire_at, now);
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let notice = ReminderNotice::for_task(task_id, payload_text);

        // The lock is held across spawn + insert so the timer task can never observe the map
        // before its own registration is in place.
        let mut guard = self.inner.registrations.lock().expect("scheduler poisoned");
        if let Some(previous) = guard.remove(task_id) {
            previous.handle.abort();
            log::debug!(
                "reminder replaced task_id={task_id} previous_fire_at={}",
                previous.fire_at
            );
        }

        let inner = Arc::clone(&self.inner);
        let id = task_id.to_string();
        let join = self.inner.runtime.spawn(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            inner.fire(&id, generation, &notice);
        });

        guard.insert(
            task_id.to_string(),
            Registration {
                fire_at,
                generation,
                handle: join.abort_handle(),
            },
        );
        log::debug!(
            "reminder scheduled task_id={task_id} fire_at={fire_at} delay_ms={}",
            delay.as_millis()
        );
    }

    /// Returns whether a live registration was cancelled.
    pub fn cancel(&self, task_id: &str) -> bool {
        let mut guard = self.inner.registrations.lock().expect("scheduler poisoned");
        match guard.remove(task_id) {
            Some(registration) => {
                registration.handle.abort();
                log::debug!("reminder cancelled task_id={task_id}");
                true
            }
            None => false,
        }
    }

    /// Cancels every live registration and returns how many there were.
    pub fn cancel_all(&self) -> usize {
        let mut guard = self.inner.registrations.lock().expect("scheduler poisoned");
        let count = guard.len();
        for (_, registration) in guard.drain() {
            registration.handle.abort();
        }
        if count > 0 {
            log::debug!("reminders cancelled count={count}");
        }
        count
    }

    pub fn pending_fire_at(&self, task_id: &str) -> Option<Timestamp> {
        let guard = self.inner.registrations.lock().expect("scheduler poisoned");
        guard.get(task_id).map(|registration| registration.fire_at)
    }

    pub fn is_scheduled(&self, task_id: &str) -> bool {
        self.pending_fire_at(task_id).is_some()
    }

    pub fn len(&self) -> usize {
        let guard = self.inner.registrations.lock().expect("scheduler poisoned");
        guard.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SchedulerInner {
    fn fire(&self, task_id: &str, generation: u64, notice: &ReminderNotice) {
        {
            let mut guard = self.registrations.lock().expect("scheduler poisoned");
            match guard.get(task_id) {
                Some(registration) if registration.generation == generation => {
                    guard.remove(task_id);
                }
                // Cancelled or superseded after the timer already elapsed.
                _ => return,
            }
        }

        log::info!("reminder fired task_id={task_id}");
        if let Err(err) = self.notifier.notify(notice) {
            log::warn!("reminder notification dropped task_id={task_id}: {err}");
        }
    }
}
