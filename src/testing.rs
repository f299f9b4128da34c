//! In-memory collaborators shared by unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AuthError, NotifyError, StoreError};
use crate::firestore::{decode_document, encode_document};
use crate::identity::{normalize_credentials, IdentityProvider};
use crate::models::{Identity, TasksDocument};
use crate::notify::{Notifier, Permission, ReminderNotice};
use crate::sync::DocumentStore;

pub fn make_identity(uid: &str) -> Identity {
    Identity {
        uid: uid.to_string(),
        email: format!("{uid}@example.com"),
        credentials: None,
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<ReminderNotice>>,
    attempts: AtomicUsize,
    fail: bool,
}

impl RecordingNotifier {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn notices(&self) -> Vec<ReminderNotice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &ReminderNotice) -> Result<(), NotifyError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            return Err(NotifyError::PermissionDenied);
        }
        self.notices.lock().unwrap().push(notice.clone());
        Ok(())
    }

    fn request_permission(&self) -> Permission {
        if self.fail {
            Permission::Denied
        } else {
            Permission::Granted
        }
    }
}

#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<String, TasksDocument>>,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    reject_credentials: AtomicBool,
    corrupt_reads: AtomicBool,
    rejected_writer: Mutex<Option<String>>,
    write_delay: Mutex<Option<Duration>>,
}

impl MemoryDocumentStore {
    pub fn seed(&self, uid: &str, document: TasksDocument) {
        self.documents
            .lock()
            .unwrap()
            .insert(uid.to_string(), document);
    }

    pub fn document(&self, uid: &str) -> Option<TasksDocument> {
        self.documents.lock().unwrap().get(uid).cloned()
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Every read and write answers `Unauthorized`.
    pub fn reject_credentials(&self, reject: bool) {
        self.reject_credentials.store(reject, Ordering::SeqCst);
    }

    /// Only writes for `uid` answer `Unauthorized`.
    pub fn reject_writes_for(&self, uid: Option<&str>) {
        *self.rejected_writer.lock().unwrap() = uid.map(str::to_string);
    }

    /// Reads answer `Decode`, as for a document that exists but cannot be parsed.
    pub fn corrupt_reads(&self, corrupt: bool) {
        self.corrupt_reads.store(corrupt, Ordering::SeqCst);
    }

    /// Writes started from now on wait this long (on the tokio clock) before landing.
    pub fn delay_writes(&self, delay: Option<Duration>) {
        *self.write_delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn read(&self, identity: &Identity) -> Result<Option<TasksDocument>, StoreError> {
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(StoreError::Unauthorized);
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("offline".to_string()));
        }
        if self.corrupt_reads.load(Ordering::SeqCst) {
            return Err(StoreError::Decode("tasks is not an array".to_string()));
        }
        Ok(self.document(&identity.uid))
    }

    async fn write(&self, identity: &Identity, document: &TasksDocument) -> Result<(), StoreError> {
        if self.reject_credentials.load(Ordering::SeqCst) {
            return Err(StoreError::Unauthorized);
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StoreError::Transport("offline".to_string()));
        }
        let delay = *self.write_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let rejected = self.rejected_writer.lock().unwrap().clone();
        if rejected.as_deref() == Some(identity.uid.as_str()) {
            return Err(StoreError::Unauthorized);
        }
        self.seed(&identity.uid, document.clone());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Keeps Firestore REST bodies and goes through the same codec as the real client.
#[derive(Default)]
pub struct FirestoreJsonStore {
    bodies: Mutex<HashMap<String, Value>>,
}

impl FirestoreJsonStore {
    pub fn seed(&self, uid: &str, body: Value) {
        self.bodies.lock().unwrap().insert(uid.to_string(), body);
    }

    pub fn body(&self, uid: &str) -> Option<Value> {
        self.bodies.lock().unwrap().get(uid).cloned()
    }
}

#[async_trait]
impl DocumentStore for FirestoreJsonStore {
    async fn read(&self, identity: &Identity) -> Result<Option<TasksDocument>, StoreError> {
        match self.body(&identity.uid) {
            Some(body) => decode_document(&body).map(Some),
            None => Ok(None),
        }
    }

    async fn write(&self, identity: &Identity, document: &TasksDocument) -> Result<(), StoreError> {
        self.seed(&identity.uid, encode_document(document));
        Ok(())
    }
}

/// Accounts keyed by email; uids are `uid-<n>` in creation order.
#[derive(Default)]
pub struct MemoryIdentityProvider {
    accounts: Mutex<HashMap<String, (String, String)>>,
    restored: Mutex<Option<Identity>>,
    sign_outs: AtomicUsize,
}

impl MemoryIdentityProvider {
    pub fn with_account(email: &str, password: &str, uid: &str) -> Self {
        let provider = Self::default();
        provider.accounts.lock().unwrap().insert(
            email.to_string(),
            (password.to_string(), uid.to_string()),
        );
        provider
    }

    pub fn set_restored(&self, identity: Option<Identity>) {
        *self.restored.lock().unwrap() = identity;
    }

    pub fn sign_outs(&self) -> usize {
        self.sign_outs.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IdentityProvider for MemoryIdentityProvider {
    async fn sign_up(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_credentials(email, password)?;
        if password.len() < 6 {
            return Err(AuthError::WeakPassword(String::new()));
        }
        let mut accounts = self.accounts.lock().unwrap();
        if accounts.contains_key(&email) {
            return Err(AuthError::EmailInUse);
        }
        let uid = format!("uid-{}", accounts.len() + 1);
        accounts.insert(email.clone(), (password.to_string(), uid.clone()));
        Ok(Identity {
            uid,
            email,
            credentials: None,
        })
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Identity, AuthError> {
        let email = normalize_credentials(email, password)?;
        let accounts = self.accounts.lock().unwrap();
        match accounts.get(&email) {
            Some((stored, uid)) if stored == password => Ok(Identity {
                uid: uid.clone(),
                email,
                credentials: None,
            }),
            _ => Err(AuthError::InvalidCredentials),
        }
    }

    async fn sign_out(&self, _identity: &Identity) {
        self.sign_outs.fetch_add(1, Ordering::SeqCst);
        *self.restored.lock().unwrap() = None;
    }

    async fn restore(&self) -> Option<Identity> {
        self.restored.lock().unwrap().clone()
    }
}
