use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use tokio::runtime::Handle;
use uuid::Uuid;

use crate::clock::Clock;
use crate::countdown::countdowns;
use crate::error::{StoreError, TodoError, ValidationError};
use crate::identity::IdentityProvider;
use crate::models::{FilterMode, Identity, Task, TaskStats, MINUTE_MS};
use crate::notify::Notifier;
use crate::scheduler::ReminderScheduler;
use crate::session::{SessionGate, SessionState, Transition};
use crate::store::{validate_text, TaskStore};
use crate::sync::{DocumentStore, PersistenceSync, SyncListener};

/// External capabilities the application is wired with.
pub struct Services {
    pub identity: Arc<dyn IdentityProvider>,
    pub documents: Arc<dyn DocumentStore>,
    pub notifier: Arc<dyn Notifier>,
    pub clock: Arc<dyn Clock>,
    pub runtime: Handle,
    pub sync_listener: Option<SyncListener>,
}

/// Outcome of a session becoming authenticated. A failed pull leaves the list empty.
#[derive(Debug)]
pub struct SignInReport {
    pub identity: Identity,
    pub pull_error: Option<StoreError>,
}

/// The session context: task list, reminders and sync for whoever is signed in.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppData>,
}

struct AppData {
    store: TaskStore,
    session: SessionGate,
    scheduler: ReminderScheduler,
    sync: PersistenceSync,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    runtime: Handle,
    /// Set while the session's remote document could not be decoded.
    pushes_blocked: AtomicBool,
}

impl AppState {
    pub fn new(services: Services) -> Self {
        let Services {
            identity,
            documents,
            notifier,
            clock,
            runtime,
            sync_listener,
        } = services;

        let inner = Arc::new_cyclic(|weak: &Weak<AppData>| {
            let weak = weak.clone();
            let listener: SyncListener = Arc::new(move |identity: &Identity, err: &StoreError| {
                let Some(inner) = weak.upgrade() else {
                    return;
                };
                let state = AppState { inner };
                // A late failure from an earlier session never touches the current one.
                if !state.is_current(identity) {
                    log::debug!("ignoring push failure of ended session uid={}", identity.uid);
                    return;
                }
                if matches!(err, StoreError::Unauthorized) {
                    state.expire_session();
                }
                if let Some(listener) = &sync_listener {
                    listener(identity, err);
                }
            });
            let sync = PersistenceSync::new(documents, runtime.clone()).with_listener(listener);
            let scheduler = ReminderScheduler::new(clock.clone(), notifier, runtime.clone());

            AppData {
                store: TaskStore::default(),
                session: SessionGate::default(),
                scheduler,
                sync,
                identity,
                clock,
                runtime,
                pushes_blocked: AtomicBool::new(false),
            }
        });

        Self { inner }
    }

    pub fn session(&self) -> SessionState {
        self.inner.session.state()
    }

    pub fn scheduler(&self) -> &ReminderScheduler {
        &self.inner.scheduler
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.inner.store.tasks()
    }

    pub fn filtered_view(&self, search: &str, mode: FilterMode) -> Vec<Task> {
        self.inner.store.filtered_view(search, mode)
    }

    pub fn stats(&self) -> TaskStats {
        self.inner.store.stats()
    }

    /// Remaining time (`HH:MM:SS`) for every task whose reminder is still ahead.
    pub fn countdowns(&self) -> BTreeMap<String, String> {
        countdowns(&self.inner.store.tasks(), self.inner.clock.now_ms())
    }

    /// Startup: asks the provider for a resumable identity and resolves the session.
    pub async fn resolve_session(&self) -> Option<SignInReport> {
        let restored = self.inner.identity.restore().await;
        self.on_identity_change(restored).await
    }

    pub async fn on_identity_change(&self, identity: Option<Identity>) -> Option<SignInReport> {
        match self.inner.session.apply(identity) {
            Transition::Unchanged => None,
            Transition::SignedOut(previous) => {
                self.teardown(&previous);
                None
            }
            Transition::SignedIn { identity, replaced } => {
                if let Some(previous) = replaced {
                    self.teardown(&previous);
                }
                Some(self.activate(identity).await)
            }
        }
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<SignInReport, TodoError> {
        let identity = self
            .inner
            .identity
            .sign_in(email, password)
            .await
            .inspect_err(|err| log::warn!("sign in failed: {err}"))?;
        Ok(self.enter(identity).await)
    }

    /// Creates the account and its empty remote document, then signs in.
    pub async fn sign_up(&self, email: &str, password: &str) -> Result<SignInReport, TodoError> {
        let identity = self
            .inner
            .identity
            .sign_up(email, password)
            .await
            .inspect_err(|err| log::warn!("sign up failed: {err}"))?;
        let init_error = self
            .inner
            .sync
            .push_now(&identity, Vec::new())
            .await
            .inspect_err(|err| {
                log::error!("initializing document failed uid={}: {err}", identity.uid)
            })
            .err();

        let mut report = self.enter(identity).await;
        if report.pull_error.is_none() {
            report.pull_error = init_error;
        }
        Ok(report)
    }

    /// Returns whether a session was active.
    pub async fn sign_out(&self) -> bool {
        let Some(identity) = self.inner.session.identity() else {
            return false;
        };
        self.inner.identity.sign_out(&identity).await;
        self.on_identity_change(None).await;
        true
    }

    /// Ends the session after the document store rejected its credentials. The provider's
    /// sign-out runs in the background. Returns whether a session was active.
    pub fn expire_session(&self) -> bool {
        let Transition::SignedOut(previous) = self.inner.session.apply(None) else {
            return false;
        };
        log::warn!("session expired uid={}", previous.uid);
        self.teardown(&previous);
        let identity = Arc::clone(&self.inner.identity);
        self.inner.runtime.spawn(async move {
            identity.sign_out(&previous).await;
        });
        true
    }

    pub fn add_task(&self, text: &str, reminder_minutes: Option<u32>) -> Result<Task, TodoError> {
        let identity = self.require_identity()?;
        let text = validate_text(text)?;
        let now = self.inner.clock.now_ms();
        let reminder_at = match reminder_minutes {
            Some(0) => return Err(ValidationError::ZeroMinutes.into()),
            Some(minutes) => Some(now + i64::from(minutes) * MINUTE_MS),
            None => None,
        };

        let task = Task {
            id: Uuid::new_v4().to_string(),
            text,
            completed: false,
            reminder_at,
        };
        self.inner.store.insert_front(task.clone())?;
        if let Some(at) = reminder_at {
            self.inner.scheduler.schedule(&task.id, at, &task.text);
        }
        log::info!("task added id={} reminder_at={:?}", task.id, task.reminder_at);
        self.push(identity);
        Ok(task)
    }

    /// Completing cancels the pending reminder; reopening re-arms it if still ahead.
    pub fn toggle_complete(&self, task_id: &str) -> Result<Task, TodoError> {
        let identity = self.require_identity()?;
        let task = self
            .inner
            .store
            .toggle_complete(task_id)
            .ok_or_else(|| TodoError::TaskNotFound(task_id.to_string()))?;
        self.sync_reminder(&task);
        self.push(identity);
        Ok(task)
    }

    pub fn edit_task(&self, task_id: &str, text: &str) -> Result<Task, TodoError> {
        let identity = self.require_identity()?;
        let text = validate_text(text)?;
        let task = self
            .inner
            .store
            .set_text(task_id, text)
            .ok_or_else(|| TodoError::TaskNotFound(task_id.to_string()))?;
        // Same instant, current wording.
        if let (true, Some(at)) = (self.inner.scheduler.is_scheduled(&task.id), task.reminder_at)
        {
            self.inner.scheduler.schedule(&task.id, at, &task.text);
        }
        self.push(identity);
        Ok(task)
    }

    pub fn remove_task(&self, task_id: &str) -> Result<Task, TodoError> {
        let identity = self.require_identity()?;
        let task = self
            .inner
            .store
            .remove(task_id)
            .ok_or_else(|| TodoError::TaskNotFound(task_id.to_string()))?;
        self.inner.scheduler.cancel(task_id);
        log::info!("task removed id={task_id}");
        self.push(identity);
        Ok(task)
    }

    pub fn remove_all(&self) -> Result<usize, TodoError> {
        let identity = self.require_identity()?;
        self.inner.scheduler.cancel_all();
        let removed = self.inner.store.clear().len();
        log::info!("all tasks removed count={removed}");
        self.push(identity);
        Ok(removed)
    }

    pub fn reorder(&self, from: usize, to: usize) -> Result<(), TodoError> {
        let identity = self.require_identity()?;
        self.inner.store.move_item(from, to)?;
        self.push(identity);
        Ok(())
    }

    /// Drag-and-drop: moves `active_id` to the position currently held by `over_id`.
    /// Both ids are resolved against the full list, never a filtered view.
    pub fn move_task(&self, active_id: &str, over_id: &str) -> Result<(), TodoError> {
        let identity = self.require_identity()?;
        if active_id == over_id {
            return Ok(());
        }
        let from = self.index_of(active_id)?;
        let to = self.index_of(over_id)?;
        self.inner.store.move_item(from, to)?;
        self.push(identity);
        Ok(())
    }

    pub fn reschedule_reminder(&self, task_id: &str, minutes: u32) -> Result<Task, TodoError> {
        let identity = self.require_identity()?;
        if minutes == 0 {
            return Err(ValidationError::ZeroMinutes.into());
        }
        let reminder_at = self.inner.clock.now_ms() + i64::from(minutes) * MINUTE_MS;
        let task = self
            .inner
            .store
            .set_reminder(task_id, Some(reminder_at))
            .ok_or_else(|| TodoError::TaskNotFound(task_id.to_string()))?;
        self.sync_reminder(&task);
        log::info!("reminder rescheduled id={task_id} reminder_at={reminder_at}");
        self.push(identity);
        Ok(task)
    }

    async fn enter(&self, identity: Identity) -> SignInReport {
        let fallback = identity.clone();
        self.on_identity_change(Some(identity))
            .await
            .unwrap_or(SignInReport {
                identity: fallback,
                pull_error: None,
            })
    }

    async fn activate(&self, identity: Identity) -> SignInReport {
        log::info!("session started uid={}", identity.uid);
        let pulled = self.inner.sync.pull(&identity).await;

        // The session may have ended or switched while the pull was in flight.
        if !self.is_current(&identity) {
            log::debug!("discarding stale pull uid={}", identity.uid);
            return SignInReport {
                identity,
                pull_error: pulled.err(),
            };
        }

        match pulled {
            Ok(tasks) => {
                self.inner.pushes_blocked.store(false, Ordering::SeqCst);
                self.inner.store.replace(tasks);
                let now = self.inner.clock.now_ms();
                for task in self.inner.store.tasks() {
                    if let (true, Some(at)) = (task.has_pending_reminder(now), task.reminder_at) {
                        self.inner.scheduler.schedule(&task.id, at, &task.text);
                    }
                }
                SignInReport {
                    identity,
                    pull_error: None,
                }
            }
            Err(StoreError::Unauthorized) => {
                log::error!("loading tasks rejected credentials uid={}", identity.uid);
                self.expire_session();
                SignInReport {
                    identity,
                    pull_error: Some(StoreError::Unauthorized),
                }
            }
            Err(err @ (StoreError::Decode(_) | StoreError::Json(_))) => {
                // Writing now would replace a document that is still there but unreadable.
                log::error!(
                    "remote document unreadable uid={}, saving disabled for this session: {err}",
                    identity.uid
                );
                self.inner.pushes_blocked.store(true, Ordering::SeqCst);
                self.inner.store.clear();
                SignInReport {
                    identity,
                    pull_error: Some(err),
                }
            }
            Err(err) => {
                log::error!("loading tasks failed uid={}: {err}", identity.uid);
                self.inner.store.clear();
                SignInReport {
                    identity,
                    pull_error: Some(err),
                }
            }
        }
    }

    fn teardown(&self, previous: &Identity) {
        self.inner.pushes_blocked.store(false, Ordering::SeqCst);
        let cancelled = self.inner.scheduler.cancel_all();
        let cleared = self.inner.store.clear().len();
        log::info!(
            "session ended uid={} cleared_tasks={cleared} cancelled_reminders={cancelled}",
            previous.uid
        );
    }

    fn sync_reminder(&self, task: &Task) {
        let now = self.inner.clock.now_ms();
        match task.reminder_at {
            Some(at) if task.has_pending_reminder(now) => {
                self.inner.scheduler.schedule(&task.id, at, &task.text)
            }
            _ => {
                self.inner.scheduler.cancel(&task.id);
            }
        }
    }

    fn index_of(&self, task_id: &str) -> Result<usize, TodoError> {
        self.inner
            .store
            .index_of(task_id)
            .ok_or_else(|| TodoError::TaskNotFound(task_id.to_string()))
    }

    fn require_identity(&self) -> Result<Identity, TodoError> {
        self.inner
            .session
            .identity()
            .ok_or(TodoError::NotAuthenticated)
    }

    fn is_current(&self, identity: &Identity) -> bool {
        self.inner
            .session
            .identity()
            .is_some_and(|current| current.uid == identity.uid)
    }

    fn push(&self, identity: Identity) {
        if self.inner.pushes_blocked.load(Ordering::SeqCst) {
            log::warn!("not saving tasks uid={}: remote document unreadable", identity.uid);
            return;
        }
        self.inner.sync.push(identity, self.inner.store.tasks());
    }
}
