use serde::Serialize;

use crate::countdown::reminder_label;
use crate::error::TodoError;
use crate::events::{StatePayload, SyncFailedPayload};
use crate::models::{FilterMode, Task, TaskStats, ADD_REMINDER_MINUTES, RESCHEDULE_MINUTES};
use crate::session::SessionPayload;
use crate::state::{AppState, SignInReport};

#[cfg(all(feature = "app", not(test)))]
use crate::events::{EVENT_SESSION_CHANGED, EVENT_STATE_UPDATED, EVENT_SYNC_FAILED};
#[cfg(all(feature = "app", not(test)))]
use tauri::{AppHandle, Emitter, Manager, Runtime, State};

#[derive(Debug, Serialize)]
pub struct CommandResult<T> {
    pub ok: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// A task as the list shows it, with its countdown label.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskRow {
    #[serde(flatten)]
    pub task: Task,
    pub reminder_label: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TaskListView {
    pub tasks: Vec<TaskRow>,
    pub stats: TaskStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ReminderOptions {
    pub add_minutes: Vec<u32>,
    pub reschedule_minutes: Vec<u32>,
}

trait CommandCtx {
    fn emit_state_updated(&self, payload: StatePayload);
    fn emit_session_changed(&self, payload: SessionPayload);
    fn emit_sync_failed(&self, payload: SyncFailedPayload);
}

fn ok<T>(data: T) -> CommandResult<T> {
    CommandResult {
        ok: true,
        data: Some(data),
        error: None,
    }
}

fn err<T>(message: &str) -> CommandResult<T> {
    CommandResult {
        ok: false,
        data: None,
        error: Some(message.to_string()),
    }
}

fn state_payload(state: &AppState) -> StatePayload {
    StatePayload {
        tasks: state.tasks(),
        stats: state.stats(),
    }
}

fn publish_state(ctx: &impl CommandCtx, state: &AppState) {
    ctx.emit_state_updated(state_payload(state));
}

fn publish_session(ctx: &impl CommandCtx, state: &AppState) -> SessionPayload {
    let payload = SessionPayload::from(&state.session());
    ctx.emit_session_changed(payload.clone());
    payload
}

/// Runs a mutation and broadcasts the new list on success.
fn mutate<T>(
    ctx: &impl CommandCtx,
    state: &AppState,
    action: impl FnOnce(&AppState) -> Result<T, TodoError>,
) -> CommandResult<T> {
    match action(state) {
        Ok(data) => {
            publish_state(ctx, state);
            ok(data)
        }
        Err(error) => err(&error.to_string()),
    }
}

fn entered(
    ctx: &impl CommandCtx,
    state: &AppState,
    result: Result<SignInReport, TodoError>,
) -> CommandResult<SessionPayload> {
    let report = match result {
        Ok(report) => report,
        Err(error) => return err(&error.to_string()),
    };
    let payload = publish_session(ctx, state);
    publish_state(ctx, state);
    if let Some(error) = report.pull_error {
        ctx.emit_sync_failed(SyncFailedPayload {
            message: format!("could not load tasks: {error}"),
        });
    }
    ok(payload)
}

fn get_session_impl(state: &AppState) -> CommandResult<SessionPayload> {
    ok(SessionPayload::from(&state.session()))
}

async fn sign_in_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    email: &str,
    password: &str,
) -> CommandResult<SessionPayload> {
    let result = state.sign_in(email, password).await;
    entered(ctx, state, result)
}

async fn sign_up_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    email: &str,
    password: &str,
) -> CommandResult<SessionPayload> {
    let result = state.sign_up(email, password).await;
    entered(ctx, state, result)
}

async fn sign_out_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<bool> {
    let was_signed_in = state.sign_out().await;
    if was_signed_in {
        publish_session(ctx, state);
        publish_state(ctx, state);
    }
    ok(was_signed_in)
}

fn load_tasks_impl(state: &AppState, search: &str, filter: FilterMode) -> CommandResult<TaskListView> {
    let remaining = state.countdowns();
    let tasks = state
        .filtered_view(search, filter)
        .into_iter()
        .map(|task| TaskRow {
            reminder_label: reminder_label(&task, &remaining),
            task,
        })
        .collect();
    ok(TaskListView {
        tasks,
        stats: state.stats(),
    })
}

fn add_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    text: &str,
    reminder_minutes: Option<u32>,
) -> CommandResult<Task> {
    mutate(ctx, state, |state| state.add_task(text, reminder_minutes))
}

fn toggle_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: &str) -> CommandResult<Task> {
    mutate(ctx, state, |state| state.toggle_complete(task_id))
}

fn edit_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: &str,
    text: &str,
) -> CommandResult<Task> {
    mutate(ctx, state, |state| state.edit_task(task_id, text))
}

fn delete_task_impl(ctx: &impl CommandCtx, state: &AppState, task_id: &str) -> CommandResult<Task> {
    mutate(ctx, state, |state| state.remove_task(task_id))
}

fn delete_all_tasks_impl(ctx: &impl CommandCtx, state: &AppState) -> CommandResult<usize> {
    mutate(ctx, state, AppState::remove_all)
}

fn reorder_tasks_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    from: usize,
    to: usize,
) -> CommandResult<bool> {
    mutate(ctx, state, |state| state.reorder(from, to).map(|_| true))
}

fn move_task_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    active_id: &str,
    over_id: &str,
) -> CommandResult<bool> {
    mutate(ctx, state, |state| {
        state.move_task(active_id, over_id).map(|_| true)
    })
}

fn reschedule_reminder_impl(
    ctx: &impl CommandCtx,
    state: &AppState,
    task_id: &str,
    minutes: u32,
) -> CommandResult<Task> {
    mutate(ctx, state, |state| state.reschedule_reminder(task_id, minutes))
}

fn reminder_options_impl() -> CommandResult<ReminderOptions> {
    ok(ReminderOptions {
        add_minutes: ADD_REMINDER_MINUTES.to_vec(),
        reschedule_minutes: RESCHEDULE_MINUTES.to_vec(),
    })
}

#[cfg(all(feature = "app", not(test)))]
struct TauriCommandCtx<'a, R: Runtime> {
    app: &'a AppHandle<R>,
}

#[cfg(all(feature = "app", not(test)))]
impl<R: Runtime> CommandCtx for TauriCommandCtx<'_, R> {
    fn emit_state_updated(&self, payload: StatePayload) {
        let _ = self.app.emit(EVENT_STATE_UPDATED, payload);
    }

    fn emit_session_changed(&self, payload: SessionPayload) {
        let _ = self.app.emit(EVENT_SESSION_CHANGED, payload);
    }

    fn emit_sync_failed(&self, payload: SyncFailedPayload) {
        let _ = self.app.emit(EVENT_SYNC_FAILED, payload);
    }
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn get_session(state: State<AppState>) -> CommandResult<SessionPayload> {
    get_session_impl(state.inner())
}

// Async commands take an owned handle; `AppState` is a cheap `Arc` clone.
#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn sign_in(
    app: AppHandle,
    email: String,
    password: String,
) -> CommandResult<SessionPayload> {
    let state = app.state::<AppState>().inner().clone();
    let ctx = TauriCommandCtx { app: &app };
    sign_in_impl(&ctx, &state, &email, &password).await
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn sign_up(
    app: AppHandle,
    email: String,
    password: String,
) -> CommandResult<SessionPayload> {
    let state = app.state::<AppState>().inner().clone();
    let ctx = TauriCommandCtx { app: &app };
    sign_up_impl(&ctx, &state, &email, &password).await
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub async fn sign_out(app: AppHandle) -> CommandResult<bool> {
    let state = app.state::<AppState>().inner().clone();
    let ctx = TauriCommandCtx { app: &app };
    sign_out_impl(&ctx, &state).await
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn load_tasks(
    state: State<AppState>,
    search: Option<String>,
    filter: Option<FilterMode>,
) -> CommandResult<TaskListView> {
    load_tasks_impl(
        state.inner(),
        search.as_deref().unwrap_or_default(),
        filter.unwrap_or_default(),
    )
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn add_task(
    app: AppHandle,
    state: State<AppState>,
    text: String,
    reminder_minutes: Option<u32>,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    add_task_impl(&ctx, state.inner(), &text, reminder_minutes)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn toggle_task(app: AppHandle, state: State<AppState>, task_id: String) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    toggle_task_impl(&ctx, state.inner(), &task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn edit_task(
    app: AppHandle,
    state: State<AppState>,
    task_id: String,
    text: String,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    edit_task_impl(&ctx, state.inner(), &task_id, &text)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn delete_task(app: AppHandle, state: State<AppState>, task_id: String) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    delete_task_impl(&ctx, state.inner(), &task_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn delete_all_tasks(app: AppHandle, state: State<AppState>) -> CommandResult<usize> {
    let ctx = TauriCommandCtx { app: &app };
    delete_all_tasks_impl(&ctx, state.inner())
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn reorder_tasks(
    app: AppHandle,
    state: State<AppState>,
    from: usize,
    to: usize,
) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    reorder_tasks_impl(&ctx, state.inner(), from, to)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn move_task(
    app: AppHandle,
    state: State<AppState>,
    active_id: String,
    over_id: String,
) -> CommandResult<bool> {
    let ctx = TauriCommandCtx { app: &app };
    move_task_impl(&ctx, state.inner(), &active_id, &over_id)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn reschedule_reminder(
    app: AppHandle,
    state: State<AppState>,
    task_id: String,
    minutes: u32,
) -> CommandResult<Task> {
    let ctx = TauriCommandCtx { app: &app };
    reschedule_reminder_impl(&ctx, state.inner(), &task_id, minutes)
}

#[cfg(all(feature = "app", not(test)))]
#[tauri::command]
pub fn reminder_options() -> CommandResult<ReminderOptions> {
    reminder_options_impl()
}
