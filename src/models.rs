use serde::{Deserialize, Serialize};

/// Milliseconds since the Unix epoch.
pub type Timestamp = i64;

pub const MINUTE_MS: Timestamp = 60 * 1000;

/// Offsets offered when a task is created.
pub const ADD_REMINDER_MINUTES: [u32; 5] = [1, 5, 15, 30, 60];
/// Offsets offered by the per-task reminder menu.
pub const RESCHEDULE_MINUTES: [u32; 4] = [10, 15, 30, 60];

/// One entry of the persisted task list. Field names follow the remote document layout.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub reminder_at: Option<Timestamp>,
}

impl Task {
    pub fn has_pending_reminder(&self, now: Timestamp) -> bool {
        !self.completed && self.reminder_at.is_some_and(|at| at > now)
    }
}

/// The per-user remote document: `{ tasks: [...] }`, array order is the visible order.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct TasksDocument {
    #[serde(default)]
    pub tasks: Vec<Task>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Finished,
}

impl FilterMode {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !task.completed,
            FilterMode::Finished => task.completed,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub active: usize,
    pub finished: usize,
}

/// Provider tokens attached to an identity. Never sent to the view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Credentials {
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: Timestamp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct Identity {
    pub uid: String,
    pub email: String,
    #[serde(default)]
    pub credentials: Option<Credentials>,
}

impl Identity {
    /// The part of the email before `@`, used by the welcome line.
    pub fn display_name(&self) -> &str {
        self.email.split('@').next().unwrap_or_default()
    }
}
