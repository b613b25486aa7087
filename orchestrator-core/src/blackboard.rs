//! Scoped, versioned markdown documents with a fixed permission matrix and
//! advisory file locks. See `spec.md` §4.4.

use crate::error::{KernelError, KernelResult};
use crate::ids::AgentId;
use chrono::Utc;
use lru::LruCache;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, instrument};

/// Requester's layer, needed to evaluate the permission matrix. Distinct
/// from `crate::agent::Layer` so the blackboard stays agent-graph-agnostic;
/// callers (the agent runtime) supply the facts it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequesterLayer {
    Top,
    Mid,
    Bottom,
}

#[derive(Debug, Clone)]
pub struct Requester {
    pub id: AgentId,
    pub layer: RequesterLayer,
    /// Only meaningful for bottom-layer requesters: the id of their
    /// supervising mid-layer agent, needed for the `bottom -> mid:X` read
    /// rule.
    pub supervisor: Option<AgentId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Scope {
    Global,
    Top,
    Mid(AgentId),
    Bottom(AgentId),
}

impl Scope {
    fn path_key(&self) -> String {
        match self {
            Scope::Global => "global".to_string(),
            Scope::Top => "top".to_string(),
            Scope::Mid(owner) => format!("mid:{owner}"),
            Scope::Bottom(owner) => format!("bottom:{owner}"),
        }
    }

    /// Relative path under the workspace directory, per `spec.md` §6.
    fn relative_file_path(&self) -> PathBuf {
        match self {
            Scope::Global => PathBuf::from("global-whiteboard.md"),
            Scope::Top => PathBuf::from("whiteboards/top-layer.md"),
            Scope::Mid(owner) => PathBuf::from(format!("whiteboards/mid-layer-{owner}.md")),
            Scope::Bottom(owner) => PathBuf::from(format!("whiteboards/bottom-layer-{owner}.md")),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Permission {
    pub read: bool,
    pub write: bool,
    pub append: bool,
}

/// Fixed permission matrix from `spec.md` §4.4.
fn permission_for(scope: &Scope, requester: &Requester) -> Permission {
    use RequesterLayer::*;
    match (scope, requester.layer) {
        // global: top R+W+A; mid R+A; bottom R
        (Scope::Global, Top) => Permission { read: true, write: true, append: true },
        (Scope::Global, Mid) => Permission { read: true, write: false, append: true },
        (Scope::Global, Bottom) => Permission { read: true, write: false, append: false },

        // top: top R+W; mid R; bottom none
        (Scope::Top, Top) => Permission { read: true, write: true, append: false },
        (Scope::Top, Mid) => Permission { read: true, write: false, append: false },
        (Scope::Top, Bottom) => Permission { read: false, write: false, append: false },

        // mid:X: top R; mid R-for-all/W-if-owner; bottom R-if-supervisor-is-owner
        (Scope::Mid(_), Top) => Permission { read: true, write: false, append: false },
        (Scope::Mid(owner), Mid) => Permission {
            read: true,
            write: requester.id == *owner,
            append: false,
        },
        (Scope::Mid(owner), Bottom) => Permission {
            read: requester.supervisor == Some(*owner),
            write: false,
            append: false,
        },

        // bottom:X: top R; mid R; bottom R+W-if-owner
        (Scope::Bottom(_), Top) => Permission { read: true, write: false, append: false },
        (Scope::Bottom(_), Mid) => Permission { read: true, write: false, append: false },
        (Scope::Bottom(owner), Bottom) => {
            let owned = requester.id == *owner;
            Permission { read: true, write: owned, append: false }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub version: u64,
    pub last_modified_by: Option<AgentId>,
}

impl Document {
    fn template(scope: &Scope) -> Self {
        Self {
            content: format!("# {}\n\n_(empty)_\n", scope.path_key()),
            version: 0,
            last_modified_by: None,
        }
    }
}

#[derive(Debug)]
struct LockState {
    holder: AgentId,
    acquired_at: Instant,
}

const LOCK_TTL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone)]
pub enum BlackboardEvent {
    Updated { scope_key: String, version: u64, by: AgentId },
}

pub struct Blackboard {
    documents: Mutex<HashMap<String, Document>>,
    locks: Mutex<HashMap<String, LockState>>,
    cache: Mutex<LruCache<String, (u64, String)>>,
    workspace_dir: Option<PathBuf>,
    events: Option<mpsc::UnboundedSender<BlackboardEvent>>,
}

impl Blackboard {
    pub fn new(workspace_dir: Option<PathBuf>, events: Option<mpsc::UnboundedSender<BlackboardEvent>>) -> Self {
        Self {
            documents: Mutex::new(HashMap::new()),
            locks: Mutex::new(HashMap::new()),
            cache: Mutex::new(LruCache::new(NonZeroUsize::new(256).unwrap())),
            workspace_dir,
            events,
        }
    }

    #[instrument(skip(self))]
    pub async fn read(&self, scope: Scope, requester: &Requester) -> KernelResult<Document> {
        let perm = permission_for(&scope, requester);
        if !perm.read {
            return Err(KernelError::PermissionDenied(format!(
                "{:?} cannot read {}",
                requester.layer,
                scope.path_key()
            )));
        }
        let key = scope.path_key();
        if let Some((version, content)) = self.cache.lock().await.get(&key).cloned() {
            let docs = self.documents.lock().await;
            if docs.get(&key).map(|d| d.version) == Some(version) {
                return Ok(Document {
                    content,
                    version,
                    last_modified_by: docs.get(&key).and_then(|d| d.last_modified_by),
                });
            }
        }
        let mut docs = self.documents.lock().await;
        let doc = docs.entry(key.clone()).or_insert_with(|| Document::template(&scope)).clone();
        self.cache.lock().await.put(key, (doc.version, doc.content.clone()));
        Ok(doc)
    }

    /// Acquire, check version, write, release, in one call — the advisory
    /// lock never needs to be exposed separately in a single-process kernel.
    #[instrument(skip(self, content))]
    pub async fn write(
        &self,
        scope: Scope,
        requester: &Requester,
        content: String,
        expected_version: u64,
    ) -> KernelResult<u64> {
        self.write_internal(scope, requester, content, expected_version, false).await
    }

    #[instrument(skip(self, content))]
    pub async fn append(
        &self,
        scope: Scope,
        requester: &Requester,
        content: String,
        expected_version: u64,
    ) -> KernelResult<u64> {
        let suffix = format!(
            "### Update - {}\n**By**: {}\n\n{}",
            Utc::now().to_rfc3339(),
            requester.id,
            content
        );
        self.write_internal(scope, requester, suffix, expected_version, true).await
    }

    async fn write_internal(
        &self,
        scope: Scope,
        requester: &Requester,
        payload: String,
        expected_version: u64,
        append: bool,
    ) -> KernelResult<u64> {
        let perm = permission_for(&scope, requester);
        let allowed = if append { perm.append } else { perm.write };
        if !allowed {
            return Err(KernelError::PermissionDenied(format!(
                "{:?} cannot {} {}",
                requester.layer,
                if append { "append to" } else { "write" },
                scope.path_key()
            )));
        }

        let key = scope.path_key();
        {
            let mut locks = self.locks.lock().await;
            match locks.get(&key) {
                Some(state) if state.holder != requester.id && state.acquired_at.elapsed() < LOCK_TTL => {
                    return Err(KernelError::LockedByOther);
                }
                _ => {
                    locks.insert(
                        key.clone(),
                        LockState { holder: requester.id, acquired_at: Instant::now() },
                    );
                }
            }
        }

        let new_version = {
            let mut docs = self.documents.lock().await;
            let doc = docs.entry(key.clone()).or_insert_with(|| Document::template(&scope));
            if expected_version < doc.version {
                self.locks.lock().await.remove(&key);
                return Err(KernelError::VersionConflict { observed: expected_version, stored: doc.version });
            }
            doc.content = if append {
                format!("{}\n\n{}", doc.content, payload)
            } else {
                payload
            };
            doc.version += 1;
            doc.last_modified_by = Some(requester.id);
            doc.version
        };

        self.cache.lock().await.pop(&key);
        self.locks.lock().await.remove(&key);
        self.persist_to_disk(&scope).await;

        if let Some(tx) = &self.events {
            let _ = tx.send(BlackboardEvent::Updated { scope_key: key, version: new_version, by: requester.id });
        }
        info!(scope = %scope.path_key(), version = new_version, "blackboard document updated");
        Ok(new_version)
    }

    async fn persist_to_disk(&self, scope: &Scope) {
        let Some(root) = &self.workspace_dir else { return };
        let key = scope.path_key();
        let Some(doc) = self.documents.lock().await.get(&key).cloned() else { return };
        let path = root.join(scope.relative_file_path());
        if let Some(parent) = path.parent() {
            let _ = tokio::fs::create_dir_all(parent).await;
        }
        if let Err(e) = tokio::fs::write(&path, doc.content).await {
            tracing::error!(path = %path.display(), error = %e, "failed to persist blackboard document");
        }
    }
}
