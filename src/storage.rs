use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::AppConfig;
use crate::error::StoreError;
use crate::models::{Identity, TasksDocument};
use crate::sync::DocumentStore;

const CONFIG_FILE: &str = "config.json";
const SESSION_FILE: &str = "session.json";
const DOCUMENTS_DIR: &str = "documents";

/// Files under the app data directory.
#[derive(Debug, Clone)]
pub struct Storage {
    root: PathBuf,
}

impl Storage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ensure_dirs(&self) -> Result<(), StoreError> {
        fs::create_dir_all(self.documents_dir())?;
        Ok(())
    }

    pub fn documents_dir(&self) -> PathBuf {
        self.root.join(DOCUMENTS_DIR)
    }

    /// A missing config file yields the defaults.
    pub fn load_config(&self) -> Result<AppConfig, StoreError> {
        let path = self.root.join(CONFIG_FILE);
        if !path.exists() {
            return Ok(AppConfig::default());
        }
        load_json(&path)
    }

    pub fn save_config(&self, config: &AppConfig) -> Result<(), StoreError> {
        write_atomic(&self.root.join(CONFIG_FILE), config)
    }

    pub fn session_cache(&self) -> SessionCache {
        SessionCache {
            path: self.root.join(SESSION_FILE),
        }
    }
}

/// The last signed-in identity, so a restart can resume the session.
#[derive(Debug, Clone)]
pub struct SessionCache {
    path: PathBuf,
}

impl SessionCache {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Option<Identity> {
        if !self.path.exists() {
            return None;
        }
        match load_json(&self.path) {
            Ok(identity) => Some(identity),
            Err(err) => {
                log::warn!("ignoring unreadable session cache: {err}");
                None
            }
        }
    }

    pub fn save(&self, identity: &Identity) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        write_atomic(&self.path, identity)
    }

    pub fn clear(&self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to remove session cache: {err}");
            }
        }
    }
}

/// One JSON document per user under `documents/<uid>.json`.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn document_path(&self, uid: &str) -> Result<PathBuf, StoreError> {
        let valid = !uid.is_empty()
            && uid
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("invalid uid for file store: {uid:?}"),
            )));
        }
        Ok(self.dir.join(format!("{uid}.json")))
    }
}

#[async_trait]
impl DocumentStore for FileDocumentStore {
    async fn read(&self, identity: &Identity) -> Result<Option<TasksDocument>, StoreError> {
        let path = self.document_path(&identity.uid)?;
        if !path.exists() {
            return Ok(None);
        }
        load_json(&path).map(Some)
    }

    async fn write(&self, identity: &Identity, document: &TasksDocument) -> Result<(), StoreError> {
        let path = self.document_path(&identity.uid)?;
        fs::create_dir_all(&self.dir)?;
        write_atomic(&path, document)
    }
}

fn load_json<T: DeserializeOwned>(path: &Path) -> Result<T, StoreError> {
    let mut file = File::open(path)?;
    let mut buf = String::new();
    file.read_to_string(&mut buf)?;
    Ok(serde_json::from_str(&buf)?)
}

fn write_atomic<T: Serialize>(path: &Path, data: &T) -> Result<(), StoreError> {
    let temp_path = path.with_extension("tmp");
    let json = serde_json::to_vec_pretty(data)?;
    {
        let mut file = File::create(&temp_path)?;
        file.write_all(&json)?;
        file.sync_all()?;
    }
    fs::rename(temp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DocumentStoreKind;
    use crate::models::{Credentials, Task};
    use crate::testing::make_identity;

    fn make_task(id: &str) -> Task {
        Task {
            id: id.to_string(),
            text: format!("task-{id}"),
            completed: false,
            reminder_at: Some(10),
        }
    }

    #[test]
    fn ensure_dirs_creates_documents_dir() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(root.path().to_path_buf());
        storage.ensure_dirs().unwrap();
        assert!(root.path().join("documents").is_dir());
    }

    #[test]
    fn config_defaults_when_missing_and_round_trips() {
        let root = tempfile::tempdir().unwrap();
        let storage = Storage::new(root.path().to_path_buf());
        let config = storage.load_config().unwrap();
        assert!(config.firebase.api_key.is_empty());

        let mut config = AppConfig::default();
        config.firebase.project_id = "demo".to_string();
        config.document_store = DocumentStoreKind::Local;
        storage.save_config(&config).unwrap();
        let loaded = storage.load_config().unwrap();
        assert_eq!(loaded.firebase.project_id, "demo");
        assert_eq!(loaded.document_store, DocumentStoreKind::Local);
    }

    #[test]
    fn invalid_config_is_an_error() {
        let root = tempfile::tempdir().unwrap();
        fs::write(root.path().join("config.json"), "{ not json").unwrap();
        let storage = Storage::new(root.path().to_path_buf());
        assert!(matches!(storage.load_config(), Err(StoreError::Json(_))));
    }

    #[test]
    fn session_cache_save_load_clear() {
        let root = tempfile::tempdir().unwrap();
        let cache = Storage::new(root.path().to_path_buf()).session_cache();
        assert!(cache.load().is_none());

        let mut identity = make_identity("u1");
        identity.credentials = Some(Credentials {
            id_token: "id".to_string(),
            refresh_token: "refresh".to_string(),
            expires_at: 99,
        });
        cache.save(&identity).unwrap();
        assert_eq!(cache.load(), Some(identity));

        cache.clear();
        assert!(cache.load().is_none());
        // Clearing twice is fine.
        cache.clear();
    }

    #[test]
    fn corrupt_session_cache_is_ignored() {
        let root = tempfile::tempdir().unwrap();
        let path = root.path().join("session.json");
        fs::write(&path, "garbage").unwrap();
        assert!(SessionCache::new(path).load().is_none());
    }

    #[tokio::test]
    async fn file_store_round_trips_per_user_documents() {
        let root = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(root.path().join("documents"));
        let alice = make_identity("alice");
        assert_eq!(store.read(&alice).await.unwrap(), None);

        let doc = TasksDocument {
            tasks: vec![make_task("b"), make_task("a")],
        };
        store.write(&alice, &doc).await.unwrap();
        assert_eq!(store.read(&alice).await.unwrap(), Some(doc));
        assert_eq!(store.read(&make_identity("bob")).await.unwrap(), None);

        let raw = fs::read_to_string(root.path().join("documents/alice.json")).unwrap();
        assert!(raw.contains("\"reminderAt\": 10"));
        assert!(!root.path().join("documents/alice.tmp").exists());
    }

    #[tokio::test]
    async fn file_store_rejects_path_like_uids() {
        let root = tempfile::tempdir().unwrap();
        let store = FileDocumentStore::new(root.path().to_path_buf());
        let err = store.read(&make_identity("../escape")).await.unwrap_err();
        assert!(matches!(err, StoreError::Io(_)));
    }
}
