use domain::{CommentId, Emoji, Reaction, UserId};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Who reacted with one emoji on one comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReactionSummary {
    pub emoji: Emoji,
    /// Tooltip text, e.g. "thumbs up".
    pub label: &'static str,
    pub users: Vec<UserId>,
}

/// Presence set of (comment, user, emoji) triples.
///
/// Every toggle runs under a single lock, so two racing toggles on the same
/// triple always leave exactly one of the two possible states behind.
#[derive(Default)]
pub struct ReactionLedger {
    entries: Mutex<BTreeSet<Reaction>>,
}

impl ReactionLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, BTreeSet<Reaction>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds the reaction if absent, removes it if present. Returns whether it
    /// is present afterwards.
    pub fn toggle(&self, comment_id: CommentId, user_id: UserId, emoji: Emoji) -> bool {
        let reaction = Reaction {
            comment_id,
            user_id,
            emoji,
        };
        let mut entries = self.entries();
        if entries.remove(&reaction) {
            false
        } else {
            entries.insert(reaction);
            true
        }
    }

    pub fn summary(&self, comment_id: CommentId) -> Vec<ReactionSummary> {
        let mut grouped: BTreeMap<Emoji, Vec<UserId>> = BTreeMap::new();
        for r in self.entries().iter().filter(|r| r.comment_id == comment_id) {
            grouped.entry(r.emoji).or_default().push(r.user_id);
        }
        grouped
            .into_iter()
            .map(|(emoji, users)| ReactionSummary {
                emoji,
                label: emoji.label(),
                users,
            })
            .collect()
    }

    /// Drops every reaction of a comment, returning how many were removed.
    pub fn clear_comment(&self, comment_id: CommentId) -> usize {
        let mut entries = self.entries();
        let before = entries.len();
        entries.retain(|r| r.comment_id != comment_id);
        before - entries.len()
    }

    pub fn restore(&self, reactions: impl IntoIterator<Item = Reaction>) {
        self.entries().extend(reactions);
    }
}
