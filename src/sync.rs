use std::sync::Arc;

use async_trait::async_trait;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;

use crate::error::StoreError;
use crate::models::{Identity, Task, TasksDocument};

/// Remote per-user document storage.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// `Ok(None)` when the user has no document yet.
    async fn read(&self, identity: &Identity) -> Result<Option<TasksDocument>, StoreError>;
    async fn write(&self, identity: &Identity, document: &TasksDocument) -> Result<(), StoreError>;
}

/// Called with the identity of every push that failed. Pushes are never retried.
pub type SyncListener = Arc<dyn Fn(&Identity, &StoreError) + Send + Sync>;

/// Whole-document pull on session start, fire-and-forget push on every mutation.
#[derive(Clone)]
pub struct PersistenceSync {
    documents: Arc<dyn DocumentStore>,
    runtime: Handle,
    listener: Option<SyncListener>,
}

impl PersistenceSync {
    pub fn new(documents: Arc<dyn DocumentStore>, runtime: Handle) -> Self {
        Self {
            documents,
            runtime,
            listener: None,
        }
    }

    pub fn with_listener(mut self, listener: SyncListener) -> Self {
        self.listener = Some(listener);
        self
    }

    pub async fn pull(&self, identity: &Identity) -> Result<Vec<Task>, StoreError> {
        let document = self.documents.read(identity).await?;
        let tasks = document.map(|doc| doc.tasks).unwrap_or_default();
        log::info!("pulled tasks uid={} count={}", identity.uid, tasks.len());
        Ok(tasks)
    }

    /// Awaited whole-list write.
    pub async fn push_now(&self, identity: &Identity, tasks: Vec<Task>) -> Result<(), StoreError> {
        let count = tasks.len();
        self.documents
            .write(identity, &TasksDocument { tasks })
            .await?;
        log::debug!("pushed tasks uid={} count={count}", identity.uid);
        Ok(())
    }

    /// Spawns a whole-list write. Concurrent pushes are not ordered; the last one to land wins.
    pub fn push(&self, identity: Identity, tasks: Vec<Task>) -> JoinHandle<()> {
        let sync = self.clone();
        self.runtime.spawn(async move {
            if let Err(err) = sync.push_now(&identity, tasks).await {
                log::error!("error saving tasks uid={}: {err}", identity.uid);
                if let Some(listener) = &sync.listener {
                    listener(&identity, &err);
                }
            }
        })
    }
}
