use chrono::Utc;
use domain::{AttachmentRef, Comment, CommentError, CommentId, Emoji, NodeId, Reaction, UserId};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use crate::reactions::{ReactionLedger, ReactionSummary};
use crate::view::{build_view, ThreadEntry};

type Result<T> = std::result::Result<T, CommentError>;

#[derive(Default)]
struct NodeThread {
    // CommentId 顺序即创建顺序
    comments: BTreeMap<CommentId, Comment>,
}

/// Authoritative owner of every comment, sharded by content node.
///
/// Mutations lock only the node they touch; the ledger lock is always taken
/// after a node lock, never before.
pub struct ThreadStore {
    next_id: AtomicU64,
    nodes: RwLock<HashMap<NodeId, Arc<Mutex<NodeThread>>>>,
    owners: RwLock<HashMap<CommentId, NodeId>>,
    reactions: ReactionLedger,
}

impl Default for ThreadStore {
    fn default() -> Self {
        Self::new()
    }
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ThreadStore {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            nodes: RwLock::new(HashMap::new()),
            owners: RwLock::new(HashMap::new()),
            reactions: ReactionLedger::new(),
        }
    }

    fn thread(&self, node_id: NodeId) -> Arc<Mutex<NodeThread>> {
        if let Some(t) = self
            .nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&node_id)
        {
            return Arc::clone(t);
        }
        let mut nodes = self.nodes.write().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(nodes.entry(node_id).or_default())
    }

    fn existing_thread(&self, node_id: NodeId) -> Option<Arc<Mutex<NodeThread>>> {
        self.nodes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&node_id)
            .cloned()
    }

    pub fn node_of(&self, id: CommentId) -> Option<NodeId> {
        self.owners
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .copied()
    }

    fn thread_of(&self, id: CommentId) -> Result<Arc<Mutex<NodeThread>>> {
        let node_id = self.node_of(id).ok_or(CommentError::NotFound(id))?;
        self.existing_thread(node_id)
            .ok_or(CommentError::NotFound(id))
    }

    pub fn create_comment(
        &self,
        node_id: NodeId,
        author_id: UserId,
        body: impl Into<String>,
        parent_id: Option<CommentId>,
    ) -> Result<Comment> {
        let body = body.into();
        if body.trim().is_empty() {
            return Err(CommentError::EmptyBody);
        }

        // 回复只能挂在已有节点上，拒绝的请求不留下空分片
        let thread = match parent_id {
            Some(parent) => self
                .existing_thread(node_id)
                .ok_or(CommentError::InvalidParent {
                    node: node_id,
                    parent,
                })?,
            None => self.thread(node_id),
        };
        let mut thread = lock(&thread);

        if let Some(parent) = parent_id {
            let live = thread
                .comments
                .get(&parent)
                .is_some_and(|p| !p.is_deleted);
            if !live {
                return Err(CommentError::InvalidParent {
                    node: node_id,
                    parent,
                });
            }
        }

        let id = CommentId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let comment = Comment::new(
            id,
            node_id,
            parent_id,
            author_id,
            body,
            Utc::now().naive_utc(),
        );
        thread.comments.insert(id, comment.clone());
        self.owners
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, node_id);

        Ok(comment)
    }

    pub fn edit_comment(
        &self,
        id: CommentId,
        new_body: impl Into<String>,
        expected_version: u64,
    ) -> Result<Comment> {
        let new_body = new_body.into();
        let thread = self.thread_of(id)?;
        let mut thread = lock(&thread);

        let comment = thread
            .comments
            .get_mut(&id)
            .filter(|c| !c.is_deleted)
            .ok_or(CommentError::NotFound(id))?;

        if comment.version != expected_version {
            return Err(CommentError::VersionConflict {
                id,
                expected: expected_version,
                current: comment.version,
            });
        }
        if new_body.trim().is_empty() {
            return Err(CommentError::EmptyBody);
        }

        comment.body = new_body;
        comment.version += 1;
        comment.updated_at = Some(Utc::now().naive_utc());
        Ok(comment.clone())
    }

    /// Tombstones the comment. Replies stay anchored to the stub.
    pub fn delete_comment(&self, id: CommentId) -> Result<Comment> {
        let thread = self.thread_of(id)?;
        let mut thread = lock(&thread);

        let comment = thread
            .comments
            .get_mut(&id)
            .filter(|c| !c.is_deleted)
            .ok_or(CommentError::NotFound(id))?;

        comment.is_deleted = true;
        comment.body.clear();
        comment.attachments.clear();
        comment.updated_at = Some(Utc::now().naive_utc());
        let tombstone = comment.clone();

        self.reactions.clear_comment(id);
        Ok(tombstone)
    }

    /// Live comments of a node in creation order.
    pub fn list_thread(&self, node_id: NodeId) -> Vec<Comment> {
        let Some(thread) = self.existing_thread(node_id) else {
            return Vec::new();
        };
        let thread = lock(&thread);
        thread
            .comments
            .values()
            .filter(|c| !c.is_deleted)
            .cloned()
            .collect()
    }

    pub fn thread_view(&self, node_id: NodeId) -> Vec<ThreadEntry> {
        let Some(thread) = self.existing_thread(node_id) else {
            return Vec::new();
        };
        let thread = lock(&thread);
        build_view(thread.comments.values())
    }

    /// A live comment.
    pub fn comment(&self, id: CommentId) -> Result<Comment> {
        let thread = self.thread_of(id)?;
        let thread = lock(&thread);
        thread
            .comments
            .get(&id)
            .filter(|c| !c.is_deleted)
            .cloned()
            .ok_or(CommentError::NotFound(id))
    }

    /// Appends an attachment. The version is left alone: it guards body
    /// edits, and an open edit form must not conflict with a late upload.
    pub fn link_attachment(&self, id: CommentId, attachment: AttachmentRef) -> Result<Comment> {
        let thread = self.thread_of(id)?;
        let mut thread = lock(&thread);
        let comment = thread
            .comments
            .get_mut(&id)
            .filter(|c| !c.is_deleted)
            .ok_or(CommentError::NotFound(id))?;
        comment.attachments.push(attachment);
        comment.updated_at = Some(Utc::now().naive_utc());
        Ok(comment.clone())
    }

    pub fn react(&self, comment_id: CommentId, user_id: UserId, emoji: Emoji) -> Result<bool> {
        let thread = self.thread_of(comment_id)?;
        let thread = lock(&thread);
        if !thread
            .comments
            .get(&comment_id)
            .is_some_and(|c| !c.is_deleted)
        {
            return Err(CommentError::NotFound(comment_id));
        }
        Ok(self.reactions.toggle(comment_id, user_id, emoji))
    }

    pub fn reactions(&self, comment_id: CommentId) -> Result<Vec<ReactionSummary>> {
        self.comment(comment_id)?;
        Ok(self.reactions.summary(comment_id))
    }

    /// Rebuilds state from persisted rows. Ids continue after the highest one.
    pub fn restore(
        &self,
        comments: impl IntoIterator<Item = Comment>,
        reactions: impl IntoIterator<Item = Reaction>,
    ) {
        let mut max_id = 0;
        for comment in comments {
            max_id = max_id.max(comment.id.get());
            let thread = self.thread(comment.node_id);
            self.owners
                .write()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(comment.id, comment.node_id);
            lock(&thread).comments.insert(comment.id, comment);
        }
        self.next_id.fetch_max(max_id + 1, Ordering::SeqCst);
        self.reactions.restore(reactions);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NODE: NodeId = NodeId::new(11);
    const OTHER_NODE: NodeId = NodeId::new(12);
    const JEFF: UserId = UserId::new(2);

    #[test]
    fn fresh_thread_gets_one_comment() {
        let store = ThreadStore::new();
        let c = store.create_comment(NODE, JEFF, "woot woot", None).unwrap();

        let thread = store.list_thread(NODE);
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].body, "woot woot");
        assert_eq!(c.version, 1);
        assert_eq!(c.parent_id, None);
    }

    #[test]
    fn rejected_reply_leaves_no_empty_node_behind() {
        let store = ThreadStore::new();
        let stranger = NodeId::new(404);
        let err = store
            .create_comment(stranger, JEFF, "hello?", Some(CommentId::new(1)))
            .unwrap_err();
        assert_eq!(
            err,
            CommentError::InvalidParent {
                node: stranger,
                parent: CommentId::new(1)
            }
        );
        assert!(!store.nodes.read().unwrap().contains_key(&stranger));
        assert!(store.list_thread(stranger).is_empty());
    }

    #[test]
    fn reply_keeps_its_parent() {
        let store = ThreadStore::new();
        let parent = store.create_comment(NODE, JEFF, "woot woot", None).unwrap();
        let reply = store
            .create_comment(NODE, JEFF, "no you can't", Some(parent.id))
            .unwrap();
        assert_eq!(reply.parent_id, Some(parent.id));
        assert!(reply.id > parent.id);
    }

    #[test]
    fn parent_from_another_node_is_rejected() {
        let store = ThreadStore::new();
        let foreign = store.create_comment(OTHER_NODE, JEFF, "elsewhere", None).unwrap();
        let err = store
            .create_comment(NODE, JEFF, "cross", Some(foreign.id))
            .unwrap_err();
        assert_eq!(
            err,
            CommentError::InvalidParent {
                node: NODE,
                parent: foreign.id
            }
        );
        let missing = store
            .create_comment(NODE, JEFF, "cross", Some(CommentId::new(999)))
            .unwrap_err();
        assert!(matches!(missing, CommentError::InvalidParent { .. }));
        assert!(store.list_thread(NODE).is_empty());
    }

    #[test]
    fn blank_body_is_rejected() {
        let store = ThreadStore::new();
        assert_eq!(
            store.create_comment(NODE, JEFF, "  \n", None).unwrap_err(),
            CommentError::EmptyBody
        );
    }

    #[test]
    fn stale_edit_conflicts_and_current_edit_bumps_version_once() {
        let store = ThreadStore::new();
        let c = store.create_comment(NODE, JEFF, "woot woot", None).unwrap();

        let edited = store.edit_comment(c.id, "Updated comment.", 1).unwrap();
        assert_eq!(edited.version, 2);
        assert_eq!(edited.body, "Updated comment.");
        assert!(edited.updated_at.is_some());

        let err = store.edit_comment(c.id, "clobber", 1).unwrap_err();
        assert_eq!(
            err,
            CommentError::VersionConflict {
                id: c.id,
                expected: 1,
                current: 2
            }
        );
        assert_eq!(store.comment(c.id).unwrap().body, "Updated comment.");
    }

    #[test]
    fn delete_shrinks_thread_by_one_even_with_replies() {
        let store = ThreadStore::new();
        let parent = store.create_comment(NODE, JEFF, "parent", None).unwrap();
        let reply = store
            .create_comment(NODE, JEFF, "child", Some(parent.id))
            .unwrap();
        store.create_comment(NODE, JEFF, "other", None).unwrap();
        assert_eq!(store.list_thread(NODE).len(), 3);

        let tombstone = store.delete_comment(parent.id).unwrap();
        assert!(tombstone.is_deleted);
        assert!(tombstone.body.is_empty());

        let thread = store.list_thread(NODE);
        assert_eq!(thread.len(), 2);
        assert!(thread.iter().any(|c| c.id == reply.id));
        assert_eq!(
            store.delete_comment(parent.id).unwrap_err(),
            CommentError::NotFound(parent.id)
        );
        assert!(matches!(
            store.create_comment(NODE, JEFF, "late", Some(parent.id)),
            Err(CommentError::InvalidParent { .. })
        ));
    }

    #[test]
    fn unknown_comment_is_not_found() {
        let store = ThreadStore::new();
        let id = CommentId::new(77);
        assert_eq!(store.delete_comment(id).unwrap_err(), CommentError::NotFound(id));
        assert_eq!(
            store.edit_comment(id, "x", 1).unwrap_err(),
            CommentError::NotFound(id)
        );
        assert_eq!(
            store.react(id, JEFF, Emoji::Heart).unwrap_err(),
            CommentError::NotFound(id)
        );
    }

    #[test]
    fn react_toggles_and_delete_drops_reactions() {
        let store = ThreadStore::new();
        let c = store.create_comment(NODE, JEFF, "woot", None).unwrap();
        assert!(store.react(c.id, JEFF, Emoji::ThumbsUp).unwrap());
        assert_eq!(store.reactions(c.id).unwrap()[0].users, vec![JEFF]);
        assert!(!store.react(c.id, JEFF, Emoji::ThumbsUp).unwrap());
        assert!(store.react(c.id, JEFF, Emoji::ThumbsUp).unwrap());

        store.delete_comment(c.id).unwrap();
        assert!(store.reactions.summary(c.id).is_empty());
    }

    #[test]
    fn attachments_do_not_bump_version() {
        let store = ThreadStore::new();
        let c = store.create_comment(NODE, JEFF, "with image", None).unwrap();
        let file = AttachmentRef {
            file_name: "pl.png".into(),
            url: "/uploads/pl.png".into(),
        };
        let linked = store.link_attachment(c.id, file.clone()).unwrap();
        assert_eq!(linked.attachments, vec![file]);
        assert_eq!(linked.version, 1);
        assert!(store.edit_comment(c.id, "still editable", 1).is_ok());
    }

    #[test]
    fn restore_resumes_id_sequence() {
        let original = ThreadStore::new();
        let a = original.create_comment(NODE, JEFF, "a", None).unwrap();
        let b = original.create_comment(NODE, JEFF, "b", Some(a.id)).unwrap();
        original.react(b.id, JEFF, Emoji::Laugh).unwrap();

        let restored = ThreadStore::new();
        restored.restore(
            original.list_thread(NODE),
            [Reaction {
                comment_id: b.id,
                user_id: JEFF,
                emoji: Emoji::Laugh,
            }],
        );
        assert_eq!(restored.list_thread(NODE), original.list_thread(NODE));
        let c = restored.create_comment(NODE, JEFF, "c", None).unwrap();
        assert!(c.id > b.id);
        assert_eq!(restored.reactions(b.id).unwrap()[0].emoji, Emoji::Laugh);
    }
}
