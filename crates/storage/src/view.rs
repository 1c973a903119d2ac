use domain::{Comment, CommentId};
use serde::Serialize;
use std::collections::HashMap;

/// One comment with its replies, for rendering nested threads.
#[derive(Debug, Clone, Serialize)]
pub struct ThreadEntry {
    pub comment: Comment,
    pub replies: Vec<ThreadEntry>,
}

impl ThreadEntry {
    /// Number of live comments in this subtree.
    pub fn live_count(&self) -> usize {
        let own = usize::from(!self.comment.is_deleted);
        own + self.replies.iter().map(ThreadEntry::live_count).sum::<usize>()
    }
}

/// Nests comments by parent id. Tombstones are kept as stubs only while some
/// reply below them is still live. Input must be in creation order.
pub(crate) fn build_view<'a>(comments: impl IntoIterator<Item = &'a Comment>) -> Vec<ThreadEntry> {
    let mut roots = Vec::new();
    let mut children: HashMap<CommentId, Vec<&Comment>> = HashMap::new();
    for c in comments {
        match c.parent_id {
            Some(parent) => children.entry(parent).or_default().push(c),
            None => roots.push(c),
        }
    }
    roots
        .into_iter()
        .filter_map(|c| nest(c, &children))
        .collect()
}

fn nest(comment: &Comment, children: &HashMap<CommentId, Vec<&Comment>>) -> Option<ThreadEntry> {
    let replies: Vec<ThreadEntry> = children
        .get(&comment.id)
        .map(|kids| kids.iter().filter_map(|k| nest(k, children)).collect())
        .unwrap_or_default();

    if comment.is_deleted && replies.is_empty() {
        return None;
    }
    Some(ThreadEntry {
        comment: comment.clone(),
        replies,
    })
}

#[cfg(test)]
mod tests {
    use crate::ThreadStore;
    use domain::{NodeId, UserId};

    const NODE: NodeId = NodeId::new(3);
    const JEFF: UserId = UserId::new(2);

    #[test]
    fn replies_nest_under_their_parents() {
        let store = ThreadStore::new();
        let a = store.create_comment(NODE, JEFF, "a", None).unwrap();
        let b = store.create_comment(NODE, JEFF, "b", None).unwrap();
        store.create_comment(NODE, JEFF, "a1", Some(a.id)).unwrap();
        let a2 = store.create_comment(NODE, JEFF, "a2", Some(a.id)).unwrap();
        store.create_comment(NODE, JEFF, "a2x", Some(a2.id)).unwrap();

        let view = store.thread_view(NODE);
        assert_eq!(view.len(), 2);
        assert_eq!(view[0].comment.id, a.id);
        assert_eq!(view[0].replies.len(), 2);
        assert_eq!(view[0].replies[1].replies[0].comment.body, "a2x");
        assert_eq!(view[1].comment.id, b.id);
        assert_eq!(view.iter().map(|e| e.live_count()).sum::<usize>(), 5);
    }

    #[test]
    fn tombstone_stays_only_while_it_anchors_replies() {
        let store = ThreadStore::new();
        let parent = store.create_comment(NODE, JEFF, "parent", None).unwrap();
        let reply = store
            .create_comment(NODE, JEFF, "reply", Some(parent.id))
            .unwrap();
        let lonely = store.create_comment(NODE, JEFF, "lonely", None).unwrap();

        store.delete_comment(parent.id).unwrap();
        store.delete_comment(lonely.id).unwrap();

        let view = store.thread_view(NODE);
        assert_eq!(view.len(), 1);
        assert!(view[0].comment.is_deleted);
        assert_eq!(view[0].replies[0].comment.id, reply.id);

        store.delete_comment(reply.id).unwrap();
        assert!(store.thread_view(NODE).is_empty());
    }
}
