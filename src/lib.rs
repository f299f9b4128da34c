pub mod clock;
#[cfg_attr(not(feature = "app"), allow(dead_code))]
mod commands;
pub mod config;
pub mod countdown;
pub mod error;
pub mod events;
pub mod firebase;
pub mod firestore;
pub mod identity;
pub mod logging;
pub mod models;
pub mod notify;
pub mod scheduler;
pub mod session;
pub mod state;
pub mod storage;
pub mod store;
pub mod sync;
#[cfg(test)]
mod testing;

#[cfg(all(feature = "app", not(test)))]
use std::sync::Arc;

#[cfg(all(feature = "app", not(test)))]
use tauri::{Emitter, Manager};

#[cfg(all(feature = "app", not(test)))]
use crate::clock::{Clock, SystemClock};
#[cfg(all(feature = "app", not(test)))]
use crate::commands::*;
#[cfg(all(feature = "app", not(test)))]
use crate::config::DocumentStoreKind;
#[cfg(all(feature = "app", not(test)))]
use crate::countdown::start_countdown_ticker;
#[cfg(all(feature = "app", not(test)))]
use crate::error::StoreError;
#[cfg(all(feature = "app", not(test)))]
use crate::events::{
    StatePayload, SyncFailedPayload, EVENT_COUNTDOWN, EVENT_SESSION_CHANGED, EVENT_STATE_UPDATED,
    EVENT_SYNC_FAILED,
};
#[cfg(all(feature = "app", not(test)))]
use crate::firebase::{FirebaseAuth, FirestoreDocuments};
#[cfg(all(feature = "app", not(test)))]
use crate::logging::init_logging;
#[cfg(all(feature = "app", not(test)))]
use crate::models::Identity;
#[cfg(all(feature = "app", not(test)))]
use crate::notify::{LogNotifier, Notifier, TauriNotifier};
#[cfg(all(feature = "app", not(test)))]
use crate::session::SessionPayload;
#[cfg(all(feature = "app", not(test)))]
use crate::state::{AppState, Services};
#[cfg(all(feature = "app", not(test)))]
use crate::storage::{FileDocumentStore, Storage};
#[cfg(all(feature = "app", not(test)))]
use crate::sync::{DocumentStore, SyncListener};

#[cfg_attr(mobile, tauri::mobile_entry_point)]
#[cfg(all(feature = "app", not(test)))]
pub fn run() {
    tauri::Builder::default()
        .plugin(tauri_plugin_notification::init())
        .setup(|app| {
            let storage = Storage::new(app.path().app_data_dir()?);
            storage.ensure_dirs()?;
            if let Err(err) = init_logging(storage.root()) {
                eprintln!("failed to initialize logging: {err}");
            }

            let mut config = storage.load_config()?;
            config.apply_env();
            config.validate()?;
            log::info!(
                "config loaded document_store={:?} notifications={}",
                config.document_store,
                config.notifications
            );

            let runtime =
                tauri::async_runtime::block_on(async { tokio::runtime::Handle::current() });
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);

            let auth = Arc::new(FirebaseAuth::new(
                &config.firebase,
                clock.clone(),
                Some(storage.session_cache()),
            )?);
            let documents: Arc<dyn DocumentStore> = match config.document_store {
                DocumentStoreKind::Firestore => {
                    Arc::new(FirestoreDocuments::new(&config.firebase, auth.clone())?)
                }
                DocumentStoreKind::Local => {
                    Arc::new(FileDocumentStore::new(storage.documents_dir()))
                }
            };
            let notifier: Arc<dyn Notifier> = if config.notifications {
                Arc::new(TauriNotifier::new(app.handle().clone()))
            } else {
                Arc::new(LogNotifier)
            };
            let permission = notifier.request_permission();
            log::info!("notification permission={permission:?}");

            let sync_app = app.handle().clone();
            let sync_listener: SyncListener = Arc::new(move |_identity: &Identity, err: &StoreError| {
                let _ = sync_app.emit(
                    EVENT_SYNC_FAILED,
                    SyncFailedPayload {
                        message: format!("could not save tasks: {err}"),
                    },
                );
                // Only the current session's failures arrive here; an expired one is already ended.
                if matches!(err, StoreError::Unauthorized) {
                    if let Some(state) = sync_app.try_state::<AppState>() {
                        emit_session(&sync_app, state.inner());
                    }
                }
            });

            let state = AppState::new(Services {
                identity: auth,
                documents,
                notifier,
                clock,
                runtime: runtime.clone(),
                sync_listener: Some(sync_listener),
            });
            app.manage(state.clone());

            let ticker_app = app.handle().clone();
            start_countdown_ticker(state.clone(), &runtime, move |payload| {
                let _ = ticker_app.emit(EVENT_COUNTDOWN, payload);
            });

            let app_handle = app.handle().clone();
            tauri::async_runtime::spawn(async move {
                let report = state.resolve_session().await;
                emit_session(&app_handle, &state);
                if let Some(err) = report.and_then(|report| report.pull_error) {
                    let _ = app_handle.emit(
                        EVENT_SYNC_FAILED,
                        SyncFailedPayload {
                            message: format!("could not load tasks: {err}"),
                        },
                    );
                }
            });

            Ok(())
        })
        .invoke_handler(tauri::generate_handler![
            get_session,
            sign_in,
            sign_up,
            sign_out,
            load_tasks,
            add_task,
            toggle_task,
            edit_task,
            delete_task,
            delete_all_tasks,
            reorder_tasks,
            move_task,
            reschedule_reminder,
            reminder_options,
        ])
        .run(tauri::generate_context!())
        .expect("error while running tauri application");
}

#[cfg(all(feature = "app", not(test)))]
fn emit_session<R: tauri::Runtime>(app: &tauri::AppHandle<R>, state: &AppState) {
    let _ = app.emit(EVENT_SESSION_CHANGED, SessionPayload::from(&state.session()));
    let _ = app.emit(
        EVENT_STATE_UPDATED,
        StatePayload {
            tasks: state.tasks(),
            stats: state.stats(),
        },
    );
}
