//! One JSON document per session in a directory.
//!
//! Files are named `<session id>.json`. Every write goes to a sibling
//! `.tmp` file first and is renamed into place, so readers never observe a
//! half-written session.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::sync::Mutex;
use uuid::Uuid;

use adaptest_core::model::DiagnosticSession;
use adaptest_core::store::SessionStore;

/// Directory-backed session store.
pub struct JsonDirSessionStore {
    root: PathBuf,
    // Existence checks and writes for create/save happen under this lock.
    write_lock: Mutex<()>,
}

impl JsonDirSessionStore {
    /// Open (and create if needed) a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)
            .with_context(|| format!("failed to create session directory: {}", root.display()))?;
        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn session_path(&self, id: Uuid) -> PathBuf {
        self.root.join(format!("{id}.json"))
    }

    async fn write_atomic(&self, session: &DiagnosticSession) -> Result<()> {
        let path = self.session_path(session.id);
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(session).context("failed to serialize session")?;

        tokio::fs::write(&tmp, json)
            .await
            .with_context(|| format!("failed to write {}", tmp.display()))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .with_context(|| format!("failed to move session into place: {}", path.display()))?;
        Ok(())
    }

    async fn read(path: &Path) -> Result<DiagnosticSession> {
        let content = tokio::fs::read(path)
            .await
            .with_context(|| format!("failed to read session file: {}", path.display()))?;
        serde_json::from_slice(&content)
            .with_context(|| format!("failed to parse session file: {}", path.display()))
    }
}

#[async_trait]
impl SessionStore for JsonDirSessionStore {
    fn name(&self) -> &str {
        "json_dir"
    }

    async fn create(&self, session: &DiagnosticSession) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if tokio::fs::try_exists(self.session_path(session.id)).await? {
            anyhow::bail!("session already exists: {}", session.id);
        }
        self.write_atomic(session).await?;
        tracing::debug!(session_id = %session.id, root = %self.root.display(), "session created");
        Ok(())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<DiagnosticSession>> {
        let path = self.session_path(id);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Self::read(&path).await.map(Some)
    }

    async fn save(&self, session: &DiagnosticSession) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        if !tokio::fs::try_exists(self.session_path(session.id)).await? {
            anyhow::bail!("cannot save unknown session: {}", session.id);
        }
        self.write_atomic(session).await
    }

    async fn find_active_for_user(&self, user_id: &str) -> Result<Option<DiagnosticSession>> {
        let mut entries = tokio::fs::read_dir(&self.root)
            .await
            .with_context(|| format!("failed to list {}", self.root.display()))?;

        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            match Self::read(&path).await {
                Ok(session) if session.user_id == user_id && session.is_active() => {
                    return Ok(Some(session));
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("skipping {}: {e:#}", path.display());
                }
            }
        }
        Ok(None)
    }
}
