use serde::Serialize;

use crate::models::{Task, TaskStats};

pub const EVENT_STATE_UPDATED: &str = "state_updated";
pub const EVENT_SESSION_CHANGED: &str = "session_changed";
pub const EVENT_REMINDER: &str = "reminder_fired";
pub const EVENT_COUNTDOWN: &str = "countdown_tick";
pub const EVENT_SYNC_FAILED: &str = "sync_failed";

/// The full list in display order plus the footer counts.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatePayload {
    pub tasks: Vec<Task>,
    pub stats: TaskStats,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct SyncFailedPayload {
    pub message: String,
}
