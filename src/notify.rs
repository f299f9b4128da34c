use serde::Serialize;

use crate::error::NotifyError;

pub const REMINDER_TITLE: &str = "Task Reminder";
pub const SPEECH_LANG: &str = "en-US";

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    Granted,
    Denied,
    Prompt,
}

/// What a fired reminder shows and speaks.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub struct ReminderNotice {
    pub task_id: String,
    pub title: String,
    pub body: String,
    pub speech: String,
    pub speech_lang: String,
}

impl ReminderNotice {
    pub fn for_task(task_id: &str, text: &str) -> Self {
        Self {
            task_id: task_id.to_string(),
            title: REMINDER_TITLE.to_string(),
            body: text.to_string(),
            speech: format!("Hi, don't forget to: {text}"),
            speech_lang: SPEECH_LANG.to_string(),
        }
    }
}

/// Best-effort delivery; callers log failures and never retry.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &ReminderNotice) -> Result<(), NotifyError>;
    fn request_permission(&self) -> Permission;
}

/// Used when no desktop shell is attached: the reminder only reaches the log.
#[derive(Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, notice: &ReminderNotice) -> Result<(), NotifyError> {
        log::info!(
            "reminder task_id={} title={:?} body={:?}",
            notice.task_id,
            notice.title,
            notice.body
        );
        Ok(())
    }

    fn request_permission(&self) -> Permission {
        Permission::Granted
    }
}

#[cfg(all(feature = "app", not(test)))]
pub use desktop::TauriNotifier;

#[cfg(all(feature = "app", not(test)))]
mod desktop {
    use tauri::{AppHandle, Emitter, Runtime};
    use tauri_plugin_notification::{NotificationExt, PermissionState};

    use super::{Notifier, Permission, ReminderNotice};
    use crate::error::NotifyError;
    use crate::events::EVENT_REMINDER;

    /// Shows a system notification and hands the spoken line to the webview.
    pub struct TauriNotifier<R: Runtime> {
        app: AppHandle<R>,
    }

    impl<R: Runtime> TauriNotifier<R> {
        pub fn new(app: AppHandle<R>) -> Self {
            Self { app }
        }

        fn permission_state(&self) -> Permission {
            match self.app.notification().permission_state() {
                Ok(PermissionState::Granted) => Permission::Granted,
                Ok(PermissionState::Denied) => Permission::Denied,
                Ok(_) => Permission::Prompt,
                Err(err) => {
                    log::warn!("notification permission query failed: {err}");
                    Permission::Denied
                }
            }
        }
    }

    impl<R: Runtime> Notifier for TauriNotifier<R> {
        fn notify(&self, notice: &ReminderNotice) -> Result<(), NotifyError> {
            // Speech happens in the webview regardless of notification permission.
            let _ = self.app.emit(EVENT_REMINDER, notice.clone());

            let permission = match self.permission_state() {
                Permission::Prompt => self.request_permission(),
                other => other,
            };
            if permission != Permission::Granted {
                return Err(NotifyError::PermissionDenied);
            }
            self.app
                .notification()
                .builder()
                .title(&notice.title)
                .body(&notice.body)
                .show()
                .map_err(|err| NotifyError::Unavailable(err.to_string()))
        }

        fn request_permission(&self) -> Permission {
            if self.permission_state() == Permission::Granted {
                return Permission::Granted;
            }
            match self.app.notification().request_permission() {
                Ok(PermissionState::Granted) => Permission::Granted,
                Ok(PermissionState::Denied) => Permission::Denied,
                Ok(_) => Permission::Prompt,
                Err(err) => {
                    log::warn!("notification permission request failed: {err}");
                    Permission::Denied
                }
            }
        }
    }
}
