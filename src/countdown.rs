use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::models::{Task, Timestamp};
use crate::session::SessionState;
use crate::state::AppState;

pub const TICK: Duration = Duration::from_secs(1);
pub const EXPIRED_LABEL: &str = "00:00:00";

#[derive(Debug, Clone, Serialize, PartialEq, Default)]
#[serde(rename_all = "snake_case")]
pub struct CountdownPayload {
    pub remaining: BTreeMap<String, String>,
}

/// `HH:MM:SS`; hours are not wrapped at 24.
pub fn format_remaining(diff_ms: Timestamp) -> String {
    let diff_ms = diff_ms.max(0);
    let total_minutes = diff_ms / 60_000;
    let seconds = (diff_ms % 60_000) / 1000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;
    format!("{hours:02}:{minutes:02}:{seconds:02}")
}

/// Remaining time keyed by task id, for every task whose reminder is still ahead.
pub fn countdowns(tasks: &[Task], now: Timestamp) -> BTreeMap<String, String> {
    tasks
        .iter()
        .filter_map(|task| {
            let at = task.reminder_at.filter(|at| *at > now)?;
            Some((task.id.clone(), format_remaining(at - now)))
        })
        .collect()
}

/// The label a task row shows: nothing for completed or reminder-less tasks.
pub fn reminder_label(task: &Task, remaining: &BTreeMap<String, String>) -> Option<String> {
    if task.completed || task.reminder_at.is_none() {
        return None;
    }
    Some(
        remaining
            .get(&task.id)
            .cloned()
            .unwrap_or_else(|| EXPIRED_LABEL.to_string()),
    )
}

/// Display-only ticker. Reminders fire from their own timers; this only reports time left.
pub fn start_countdown_ticker<F>(state: AppState, runtime: &Handle, emit: F) -> JoinHandle<()>
where
    F: Fn(CountdownPayload) + Send + 'static,
{
    runtime.spawn(async move {
        let mut interval = tokio::time::interval(TICK);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut last_empty = true;
        loop {
            interval.tick().await;
            let remaining = match state.session() {
                SessionState::Authenticated(_) => state.countdowns(),
                _ => BTreeMap::new(),
            };
            // One empty payload clears the view; after that stay quiet until something is pending.
            if remaining.is_empty() && last_empty {
                continue;
            }
            last_empty = remaining.is_empty();
            emit(CountdownPayload { remaining });
        }
    })
}
