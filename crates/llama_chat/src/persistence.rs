//! On-disk state: one binary history file per chat plus a JSON index of chats.
//!
//! Layout under the data directory:
//!
//! ```text
//! chats/index.json      Vec<SessionMeta>, newest first
//! chats/<id>.bin        bincode encoded Vec<Message>
//! ```

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::session::{Session, SessionMeta};
use crate::types::Message;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to encode chat history: {0}")]
    Encode(#[source] bincode::Error),
    #[error("failed to decode chat history {path}: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("session index {path} is corrupt: {source}")]
    Index {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("no chat with id {0}")]
    UnknownSession(String),
}

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> StoreError + '_ {
    move |source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Write `bytes` next to `path` and rename into place.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    let mut file = std::fs::File::create(&tmp).map_err(io_err(&tmp))?;
    file.write_all(bytes).map_err(io_err(&tmp))?;
    file.sync_all().map_err(io_err(&tmp))?;
    std::fs::rename(&tmp, path).map_err(io_err(path))
}

pub trait HistoryStore {
    /// Messages saved for `session_id`; a chat that was never saved has an
    /// empty history.
    fn load_history(&self, session_id: &str) -> Result<Vec<Message>, StoreError>;
    fn save_history(&self, session_id: &str, messages: &[Message]) -> Result<(), StoreError>;
    fn delete_history(&self, session_id: &str) -> Result<(), StoreError>;
}

#[derive(Debug, Clone)]
pub struct FileHistoryStore {
    dir: PathBuf,
}

impl FileHistoryStore {
    pub fn new(chats_dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = chats_dir.into();
        std::fs::create_dir_all(&dir).map_err(io_err(&dir))?;
        Ok(Self { dir })
    }

    pub fn path_for(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.bin"))
    }
}

impl HistoryStore for FileHistoryStore {
    fn load_history(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let path = self.path_for(session_id);
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No history file for {session_id}, starting empty");
                return Ok(Vec::new());
            }
            Err(e) => return Err(io_err(&path)(e)),
        };
        if bytes.is_empty() {
            return Ok(Vec::new());
        }
        let messages: Vec<Message> =
            bincode::deserialize(&bytes).map_err(|source| StoreError::Decode {
                path: path.clone(),
                source,
            })?;
        debug!("Loaded {} messages from {}", messages.len(), path.display());
        Ok(messages)
    }

    fn save_history(&self, session_id: &str, messages: &[Message]) -> Result<(), StoreError> {
        let path = self.path_for(session_id);
        let bytes = bincode::serialize(messages).map_err(StoreError::Encode)?;
        write_atomic(&path, &bytes)?;
        info!("Saved {} messages to {}", messages.len(), path.display());
        Ok(())
    }

    fn delete_history(&self, session_id: &str) -> Result<(), StoreError> {
        let path = self.path_for(session_id);
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(io_err(&path)(e)),
        }
    }
}

/// List of known chats, kept sorted by `updated_at`, newest first.
#[derive(Debug, Clone)]
pub struct SessionIndex {
    path: PathBuf,
    sessions: Vec<SessionMeta>,
}

impl SessionIndex {
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let sessions = match std::fs::read_to_string(&path) {
            Ok(content) if content.trim().is_empty() => Vec::new(),
            Ok(content) => serde_json::from_str(&content).map_err(|source| StoreError::Index {
                path: path.clone(),
                source,
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(io_err(&path)(e)),
        };
        let mut index = Self { path, sessions };
        index.sort();
        Ok(index)
    }

    pub fn save(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err(parent))?;
        }
        let json = serde_json::to_vec_pretty(&self.sessions).map_err(|source| {
            StoreError::Index {
                path: self.path.clone(),
                source,
            }
        })?;
        write_atomic(&self.path, &json)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.sessions.iter().any(|meta| meta.id == id)
    }

    pub fn get(&self, id: &str) -> Option<&SessionMeta> {
        self.sessions.iter().find(|meta| meta.id == id)
    }

    pub fn list(&self) -> &[SessionMeta] {
        &self.sessions
    }

    pub fn upsert(&mut self, meta: SessionMeta) {
        match self.sessions.iter_mut().find(|existing| existing.id == meta.id) {
            Some(existing) => *existing = meta,
            None => self.sessions.push(meta),
        }
        self.sort();
    }

    pub fn remove(&mut self, id: &str) -> Option<SessionMeta> {
        let pos = self.sessions.iter().position(|meta| meta.id == id)?;
        Some(self.sessions.remove(pos))
    }

    fn sort(&mut self) {
        self.sessions.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    }
}

/// Index and history files rooted at one data directory.
pub struct ChatStorage<S: HistoryStore = FileHistoryStore> {
    pub index: SessionIndex,
    pub store: S,
}

impl ChatStorage<FileHistoryStore> {
    pub fn open(data_dir: &Path) -> Result<Self, StoreError> {
        let chats_dir = data_dir.join("chats");
        let store = FileHistoryStore::new(&chats_dir)?;
        let index = SessionIndex::load(chats_dir.join("index.json"))?;
        Ok(Self { index, store })
    }
}

impl<S: HistoryStore> ChatStorage<S> {
    /// Load a saved session with its history.
    pub fn load_session(&self, id: &str) -> Result<Session, StoreError> {
        let meta = self
            .index
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::UnknownSession(id.to_string()))?;
        let history = self.store.load_history(id)?;
        Ok(Session { meta, history })
    }

    /// Persist a finished session. Anonymous sessions are never written.
    pub fn save_session(&mut self, session: &Session) -> Result<(), StoreError> {
        if session.is_anonymous() {
            debug!("Skipping save for anonymous session");
            return Ok(());
        }
        self.store.save_history(session.id(), &session.history)?;
        let mut meta = session.meta.clone();
        meta.updated_at = chrono::Utc::now();
        self.index.upsert(meta);
        self.index.save()
    }

    pub fn delete_session(&mut self, id: &str) -> Result<(), StoreError> {
        self.store.delete_history(id)?;
        if self.index.remove(id).is_some() {
            self.index.save()?;
        }
        Ok(())
    }
}
