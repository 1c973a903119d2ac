use domain::{
    protocol::KeyChord, AttachmentRef, Comment, CommentError, CommentId, Emoji, NodeId, Reaction,
    SessionId, SessionKind, ThreadEvent, UploadFile, UserId,
};
use serde::Serialize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use storage::{Db, ReactionSummary, ThreadEntry, ThreadStore};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::binder::{AttachmentBinder, AttachmentBinding, Completion, Settlement};
use crate::session::{FormSessions, PublishRequest, SessionSnapshot};
use crate::traits::Uploader;

type Result<T> = std::result::Result<T, CommentError>;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub event_capacity: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            event_capacity: 256,
        }
    }
}

/// What happened to a session's attachment when it was published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "file", rename_all = "snake_case")]
pub enum AttachmentStatus {
    None,
    Linked(AttachmentRef),
    /// Upload still running; linked when it lands, dropped if it fails.
    Pending,
    /// The comment was kept, the file was not.
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishOutcome {
    pub comment: Comment,
    pub attachment: AttachmentStatus,
}

// Sessions and their bindings change together under one lock.
#[derive(Default)]
struct Forms {
    sessions: FormSessions,
    binder: AttachmentBinder,
}

struct Inner {
    store: ThreadStore,
    forms: Mutex<Forms>,
    uploader: Arc<dyn Uploader>,
    db: Option<Db>,
    events: broadcast::Sender<ThreadEvent>,
}

/// Entry point for every comment operation. Cheap to clone.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(uploader: Arc<dyn Uploader>, config: EngineConfig) -> Self {
        Self::build(uploader, config, None)
    }

    /// Restores threads from the SQLite mirror and keeps writing through to it.
    pub async fn open(
        uploader: Arc<dyn Uploader>,
        config: EngineConfig,
        db: Db,
    ) -> anyhow::Result<Self> {
        let comments = db.load_comments().await?;
        let reactions = db.load_reactions().await?;
        info!(
            "Restoring {} comments and {} reactions",
            comments.len(),
            reactions.len()
        );
        let engine = Self::build(uploader, config, Some(db));
        engine.inner.store.restore(comments, reactions);
        Ok(engine)
    }

    fn build(uploader: Arc<dyn Uploader>, config: EngineConfig, db: Option<Db>) -> Self {
        let (events, _) = broadcast::channel(config.event_capacity.max(1));
        Self {
            inner: Arc::new(Inner {
                store: ThreadStore::new(),
                forms: Mutex::new(Forms::default()),
                uploader,
                db,
                events,
            }),
        }
    }

    fn forms(&self) -> MutexGuard<'_, Forms> {
        self.inner
            .forms
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ThreadEvent> {
        self.inner.events.subscribe()
    }

    fn emit(&self, event: ThreadEvent) {
        // No subscribers is fine.
        let _ = self.inner.events.send(event);
    }

    async fn persist(&self, comment: &Comment) {
        if let Some(db) = &self.inner.db {
            if let Err(e) = db.upsert_comment(comment).await {
                error!("Failed to persist comment {}: {:?}", comment.id, e);
            }
        }
    }

    // --- threads ---

    pub async fn create_comment(
        &self,
        node_id: NodeId,
        author_id: UserId,
        body: impl Into<String>,
        parent_id: Option<CommentId>,
    ) -> Result<Comment> {
        let comment = self
            .inner
            .store
            .create_comment(node_id, author_id, body, parent_id)?;
        info!("Comment {} created on node {}", comment.id, node_id);
        self.persist(&comment).await;
        self.emit(ThreadEvent::CommentCreated {
            node_id,
            comment: comment.clone(),
        });
        Ok(comment)
    }

    pub async fn edit_comment(
        &self,
        comment_id: CommentId,
        body: impl Into<String>,
        expected_version: u64,
    ) -> Result<Comment> {
        let comment = self
            .inner
            .store
            .edit_comment(comment_id, body, expected_version)?;
        info!("Comment {} now at version {}", comment.id, comment.version);
        self.persist(&comment).await;
        self.emit(ThreadEvent::CommentUpdated {
            node_id: comment.node_id,
            comment: comment.clone(),
        });
        Ok(comment)
    }

    pub async fn delete_comment(&self, comment_id: CommentId) -> Result<()> {
        let tombstone = self.inner.store.delete_comment(comment_id)?;
        info!("Comment {} deleted", comment_id);
        self.persist(&tombstone).await;
        if let Some(db) = &self.inner.db {
            if let Err(e) = db.clear_reactions(comment_id).await {
                error!("Failed to clear reactions of {}: {:?}", comment_id, e);
            }
        }
        self.emit(ThreadEvent::CommentDeleted {
            node_id: tombstone.node_id,
            comment_id,
        });
        Ok(())
    }

    pub fn list_thread(&self, node_id: NodeId) -> Vec<Comment> {
        self.inner.store.list_thread(node_id)
    }

    pub fn thread_view(&self, node_id: NodeId) -> Vec<ThreadEntry> {
        self.inner.store.thread_view(node_id)
    }

    pub fn comment(&self, comment_id: CommentId) -> Result<Comment> {
        self.inner.store.comment(comment_id)
    }

    pub async fn react(&self, comment_id: CommentId, user_id: UserId, emoji: Emoji) -> Result<bool> {
        let present = self.inner.store.react(comment_id, user_id, emoji)?;
        if let Some(db) = &self.inner.db {
            let reaction = Reaction {
                comment_id,
                user_id,
                emoji,
            };
            if let Err(e) = db.set_reaction(&reaction, present).await {
                error!("Failed to persist reaction on {}: {:?}", comment_id, e);
            }
        }
        if let Some(node_id) = self.inner.store.node_of(comment_id) {
            self.emit(ThreadEvent::ReactionToggled {
                node_id,
                comment_id,
                user_id,
                emoji,
                present,
            });
        }
        Ok(present)
    }

    pub fn reactions(&self, comment_id: CommentId) -> Result<Vec<ReactionSummary>> {
        self.inner.store.reactions(comment_id)
    }

    // --- form sessions ---

    pub fn open_session(
        &self,
        node_id: NodeId,
        author_id: UserId,
        kind: SessionKind,
    ) -> Result<SessionSnapshot> {
        let id = match kind {
            SessionKind::New => self.forms().sessions.open(node_id, author_id, kind),
            SessionKind::Reply(parent) => {
                let on_node = self
                    .inner
                    .store
                    .comment(parent)
                    .is_ok_and(|c| c.node_id == node_id);
                if !on_node {
                    return Err(CommentError::InvalidParent {
                        node: node_id,
                        parent,
                    });
                }
                self.forms().sessions.open(node_id, author_id, kind)
            }
            SessionKind::Edit(target) => {
                let comment = self
                    .inner
                    .store
                    .comment(target)
                    .ok()
                    .filter(|c| c.node_id == node_id)
                    .ok_or(CommentError::NotFound(target))?;
                self.forms()
                    .sessions
                    .open_edit(node_id, author_id, target, comment.body, comment.version)
            }
        };
        self.session(id)
    }

    pub fn session(&self, session_id: SessionId) -> Result<SessionSnapshot> {
        let forms = self.forms();
        let session = forms.sessions.get(session_id)?;
        let mut snapshot = session.snapshot(forms.binder.resolve_for_preview(session_id));
        snapshot.uploading = forms.binder.is_uploading(session_id);
        Ok(snapshot)
    }

    pub fn type_text(&self, session_id: SessionId, text: impl Into<String>) -> Result<SessionSnapshot> {
        self.forms().sessions.get_mut(session_id)?.type_text(text)?;
        self.session(session_id)
    }

    /// Returns whether this session's preview is now visible.
    pub fn toggle_preview(&self, session_id: SessionId) -> Result<bool> {
        self.forms().sessions.get_mut(session_id)?.toggle_preview()
    }

    /// After a version conflict: adopt the comment's current version and keep
    /// the draft. Nothing is merged.
    pub fn refresh_edit_base(&self, session_id: SessionId) -> Result<SessionSnapshot> {
        let kind = self.forms().sessions.get(session_id)?.kind();
        let SessionKind::Edit(target) = kind else {
            let forms = self.forms();
            let session = forms.sessions.get(session_id)?;
            return Err(CommentError::InvalidTransition {
                session: session_id,
                action: "refresh edit base",
                state: session.state(),
            });
        };
        let current = self.inner.store.comment(target)?;
        self.forms()
            .sessions
            .get_mut(session_id)?
            .rebase(current.version);
        self.session(session_id)
    }

    pub fn cancel(&self, session_id: SessionId) -> bool {
        let mut forms = self.forms();
        forms.binder.detach(session_id);
        let closed = forms.sessions.close(session_id).is_some();
        if closed {
            info!("Session {} cancelled", session_id);
        }
        closed
    }

    // --- attachments ---

    /// Uploads a file into one session. A failed upload leaves the session's
    /// attachment as it was, and the file never surfaces in any other session.
    pub async fn attach(&self, session_id: SessionId, file: UploadFile) -> Result<AttachmentBinding> {
        let binding_id = {
            let mut forms = self.forms();
            if !forms.sessions.get(session_id)?.accepts_attachments() {
                return Err(CommentError::SessionClosed(session_id));
            }
            forms.binder.begin(session_id)
        };

        let file_name = file.file_name.clone();
        let stored = match self.inner.uploader.upload(file).await {
            Ok(stored) => stored,
            Err(e) => {
                warn!("Upload of {} for session {} failed: {:?}", file_name, session_id, e);
                let fallback = self.forms().binder.fail(session_id, binding_id);
                // 已发布的评论改挂上传前的那张图
                if let Some((comment_id, previous)) = fallback {
                    self.link_late(comment_id, previous).await;
                }
                return Err(CommentError::UploadFailed(e.to_string()));
            }
        };

        let completion = self.forms().binder.complete(session_id, binding_id, stored);
        match completion {
            Completion::Bound(binding) => Ok(binding),
            Completion::Claimed {
                comment_id,
                binding,
            } => {
                self.link_late(comment_id, binding.file.clone()).await;
                Ok(binding)
            }
            Completion::Superseded => Err(CommentError::AttachmentSuperseded(session_id)),
            Completion::Released => {
                info!("Dropping upload {} for closed session {}", file_name, session_id);
                Err(CommentError::SessionClosed(session_id))
            }
        }
    }

    async fn link_late(&self, comment_id: CommentId, file: AttachmentRef) {
        match self.inner.store.link_attachment(comment_id, file) {
            Ok(comment) => {
                self.persist(&comment).await;
                self.emit(ThreadEvent::CommentUpdated {
                    node_id: comment.node_id,
                    comment,
                });
            }
            Err(e) => warn!("Late attachment for {} dropped: {}", comment_id, e),
        }
    }

    pub fn resolve_for_preview(&self, session_id: SessionId) -> Option<AttachmentRef> {
        self.forms().binder.resolve_for_preview(session_id).cloned()
    }

    pub fn detach(&self, session_id: SessionId) -> Result<Option<AttachmentRef>> {
        let mut forms = self.forms();
        forms.sessions.get(session_id)?;
        Ok(forms.binder.detach(session_id))
    }

    // --- publishing ---

    pub async fn publish(&self, session_id: SessionId) -> Result<PublishOutcome> {
        let request = self.forms().sessions.get_mut(session_id)?.begin_publish()?;

        let (result, created) = match request {
            PublishRequest::Create {
                node_id,
                author_id,
                parent_id,
                body,
            } => (
                self.inner
                    .store
                    .create_comment(node_id, author_id, body, parent_id),
                true,
            ),
            PublishRequest::Edit {
                comment_id,
                body,
                expected_version,
            } => (
                self.inner
                    .store
                    .edit_comment(comment_id, body, expected_version),
                false,
            ),
        };

        let comment = match result {
            Ok(comment) => comment,
            Err(e) => {
                if let Ok(session) = self.forms().sessions.get_mut(session_id) {
                    session.abort_publish();
                }
                return Err(e);
            }
        };

        let settlement = {
            let mut forms = self.forms();
            forms.sessions.close(session_id);
            forms.binder.settle(session_id, comment.id)
        };

        let (comment, attachment) = match settlement {
            Settlement::Ready(file) => {
                match self.inner.store.link_attachment(comment.id, file.clone()) {
                    Ok(linked) => (linked, AttachmentStatus::Linked(file)),
                    Err(e) => {
                        warn!("Comment {} kept without attachment: {}", comment.id, e);
                        (comment, AttachmentStatus::Dropped)
                    }
                }
            }
            Settlement::Pending(_) => (comment, AttachmentStatus::Pending),
            Settlement::Empty => (comment, AttachmentStatus::None),
        };

        info!(
            "Session {} published as comment {} (v{})",
            session_id, comment.id, comment.version
        );
        self.persist(&comment).await;
        let node_id = comment.node_id;
        self.emit(if created {
            ThreadEvent::CommentCreated {
                node_id,
                comment: comment.clone(),
            }
        } else {
            ThreadEvent::CommentUpdated {
                node_id,
                comment: comment.clone(),
            }
        });

        Ok(PublishOutcome {
            comment,
            attachment,
        })
    }

    /// Ctrl/Cmd+Enter publishes; any other chord is ignored.
    pub async fn key_press(
        &self,
        session_id: SessionId,
        chord: KeyChord,
    ) -> Result<Option<PublishOutcome>> {
        self.forms().sessions.get(session_id)?;
        if !chord.is_publish_shortcut() {
            return Ok(None);
        }
        self.publish(session_id).await.map(Some)
    }
}
