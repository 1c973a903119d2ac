use domain::{AttachmentRef, CommentId, SessionId};
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct BindingId(u64);

/// An uploaded file bound to exactly one form session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentBinding {
    pub session_id: SessionId,
    pub binding_id: BindingId,
    pub file: AttachmentRef,
}

#[derive(Debug, Clone)]
enum Slot {
    /// `previous` is the binding that was ready before this upload started.
    Uploading {
        id: BindingId,
        previous: Option<AttachmentBinding>,
    },
    Ready(AttachmentBinding),
}

impl Slot {
    fn binding_id(&self) -> BindingId {
        match self {
            Slot::Uploading { id, .. } => *id,
            Slot::Ready(b) => b.binding_id,
        }
    }

    fn ready(&self) -> Option<&AttachmentBinding> {
        match self {
            Slot::Uploading { previous, .. } => previous.as_ref(),
            Slot::Ready(b) => Some(b),
        }
    }

    fn into_ready(self) -> Option<AttachmentBinding> {
        match self {
            Slot::Uploading { previous, .. } => previous,
            Slot::Ready(b) => Some(b),
        }
    }
}

/// Outcome of an upload finishing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Completion {
    /// Still the session's current attachment.
    Bound(AttachmentBinding),
    /// The session was published meanwhile; link the file to this comment.
    Claimed {
        comment_id: CommentId,
        binding: AttachmentBinding,
    },
    /// A newer attach on the same session replaced it.
    Superseded,
    /// The session was cancelled or detached. Drop the file.
    Released,
}

/// What publishing found in the session's slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Settlement {
    Ready(AttachmentRef),
    /// Upload still running; it was claimed for the published comment.
    Pending(BindingId),
    Empty,
}

#[derive(Debug, Clone)]
struct Claim {
    comment_id: CommentId,
    fallback: Option<AttachmentRef>,
}

/// Pending attachments keyed strictly by session id.
///
/// There is no notion of a "current" or "latest" upload: every lookup goes
/// through the session id, and a completion is only accepted for the exact
/// binding id that was handed out by [`AttachmentBinder::begin`]. A failed
/// upload puts back whatever the session had before it started.
#[derive(Debug, Default)]
pub struct AttachmentBinder {
    next_id: u64,
    slots: HashMap<SessionId, Slot>,
    claims: HashMap<BindingId, Claim>,
}

impl AttachmentBinder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves the session's slot for a new upload. The ready binding, if
    /// any, is kept aside until the upload settles.
    pub fn begin(&mut self, session_id: SessionId) -> BindingId {
        self.next_id += 1;
        let id = BindingId(self.next_id);
        let previous = self.slots.remove(&session_id).and_then(Slot::into_ready);
        self.slots
            .insert(session_id, Slot::Uploading { id, previous });
        id
    }

    pub fn complete(
        &mut self,
        session_id: SessionId,
        binding_id: BindingId,
        file: AttachmentRef,
    ) -> Completion {
        let binding = AttachmentBinding {
            session_id,
            binding_id,
            file,
        };
        if let Some(claim) = self.claims.remove(&binding_id) {
            return Completion::Claimed {
                comment_id: claim.comment_id,
                binding,
            };
        }
        match self.slots.get(&session_id).map(Slot::binding_id) {
            Some(current) if current == binding_id => {
                self.slots
                    .insert(session_id, Slot::Ready(binding.clone()));
                Completion::Bound(binding)
            }
            Some(_) => Completion::Superseded,
            None => Completion::Released,
        }
    }

    /// Drops a failed upload and restores the session's previous binding.
    ///
    /// When the upload had been claimed by a publish, the previous file (if
    /// any) is returned with the comment it now belongs to.
    pub fn fail(
        &mut self,
        session_id: SessionId,
        binding_id: BindingId,
    ) -> Option<(CommentId, AttachmentRef)> {
        if let Some(claim) = self.claims.remove(&binding_id) {
            return claim.fallback.map(|file| (claim.comment_id, file));
        }
        let current = self.slots.get(&session_id).map(Slot::binding_id);
        if current == Some(binding_id) {
            if let Some(previous) = self.slots.remove(&session_id).and_then(Slot::into_ready) {
                self.slots.insert(session_id, Slot::Ready(previous));
            }
        }
        None
    }

    /// While an upload runs the preview keeps showing the previous file.
    pub fn resolve_for_preview(&self, session_id: SessionId) -> Option<&AttachmentRef> {
        self.slots
            .get(&session_id)
            .and_then(Slot::ready)
            .map(|b| &b.file)
    }

    pub fn is_uploading(&self, session_id: SessionId) -> bool {
        matches!(self.slots.get(&session_id), Some(Slot::Uploading { .. }))
    }

    /// Clears the session's slot. An upload still in flight becomes stale.
    pub fn detach(&mut self, session_id: SessionId) -> Option<AttachmentRef> {
        self.slots
            .remove(&session_id)
            .and_then(Slot::into_ready)
            .map(|b| b.file)
    }

    /// Empties the slot of a session that was just published as `comment_id`.
    pub fn settle(&mut self, session_id: SessionId, comment_id: CommentId) -> Settlement {
        match self.slots.remove(&session_id) {
            Some(Slot::Ready(b)) => Settlement::Ready(b.file),
            Some(Slot::Uploading { id, previous }) => {
                self.claims.insert(
                    id,
                    Claim {
                        comment_id,
                        fallback: previous.map(|b| b.file),
                    },
                );
                Settlement::Pending(id)
            }
            None => Settlement::Empty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn file(tag: &str) -> AttachmentRef {
        AttachmentRef {
            file_name: format!("{}.png", tag),
            url: format!("/uploads/{}.png", tag),
        }
    }

    fn ready(binder: &mut AttachmentBinder, session_id: SessionId, tag: &str) {
        let id = binder.begin(session_id);
        assert!(matches!(binder.complete(session_id, id, file(tag)), Completion::Bound(_)));
    }

    const MAIN: SessionId = SessionId::new(1);
    const EDIT: SessionId = SessionId::new(2);

    #[test]
    fn edit_upload_is_not_visible_in_main_form() {
        let mut binder = AttachmentBinder::new();
        let m = binder.begin(MAIN);
        let e = binder.begin(EDIT);
        // finish out of order
        assert!(matches!(binder.complete(EDIT, e, file("edit")), Completion::Bound(_)));
        assert_eq!(binder.resolve_for_preview(MAIN), None);
        assert!(binder.is_uploading(MAIN));
        assert!(matches!(binder.complete(MAIN, m, file("main")), Completion::Bound(_)));

        assert_eq!(binder.resolve_for_preview(MAIN), Some(&file("main")));
        assert_eq!(binder.resolve_for_preview(EDIT), Some(&file("edit")));
    }

    #[test]
    fn newer_attach_supersedes_older_upload() {
        let mut binder = AttachmentBinder::new();
        let first = binder.begin(MAIN);
        let second = binder.begin(MAIN);
        assert!(matches!(binder.complete(MAIN, second, file("b")), Completion::Bound(_)));
        assert_eq!(binder.complete(MAIN, first, file("a")), Completion::Superseded);
        assert_eq!(binder.resolve_for_preview(MAIN), Some(&file("b")));
    }

    #[test]
    fn upload_after_detach_is_released() {
        let mut binder = AttachmentBinder::new();
        let id = binder.begin(MAIN);
        assert_eq!(binder.detach(MAIN), None);
        assert_eq!(binder.complete(MAIN, id, file("late")), Completion::Released);
        assert_eq!(binder.resolve_for_preview(MAIN), None);
    }

    #[test]
    fn failed_upload_restores_the_previous_file() {
        let mut binder = AttachmentBinder::new();
        ready(&mut binder, EDIT, "kept");
        ready(&mut binder, MAIN, "good");

        let id = binder.begin(MAIN);
        assert!(binder.is_uploading(MAIN));
        assert_eq!(binder.resolve_for_preview(MAIN), Some(&file("good")));
        assert_eq!(binder.fail(MAIN, id), None);

        assert!(!binder.is_uploading(MAIN));
        assert_eq!(binder.resolve_for_preview(MAIN), Some(&file("good")));
        assert_eq!(binder.resolve_for_preview(EDIT), Some(&file("kept")));
    }

    #[test]
    fn failed_first_upload_leaves_nothing() {
        let mut binder = AttachmentBinder::new();
        let id = binder.begin(MAIN);
        binder.fail(MAIN, id);
        assert_eq!(binder.resolve_for_preview(MAIN), None);
        assert!(!binder.is_uploading(MAIN));
    }

    #[test]
    fn settle_claims_in_flight_upload_for_the_comment() {
        let mut binder = AttachmentBinder::new();
        let comment = CommentId::new(40);
        let id = binder.begin(MAIN);
        assert_eq!(binder.settle(MAIN, comment), Settlement::Pending(id));
        match binder.complete(MAIN, id, file("late")) {
            Completion::Claimed { comment_id, binding } => {
                assert_eq!(comment_id, comment);
                assert_eq!(binding.file, file("late"));
            }
            other => panic!("unexpected {:?}", other),
        }
        ready(&mut binder, EDIT, "ready");
        assert_eq!(binder.settle(EDIT, comment), Settlement::Ready(file("ready")));
        assert_eq!(binder.settle(EDIT, comment), Settlement::Empty);
    }

    #[test]
    fn failed_claimed_upload_falls_back_to_the_previous_file() {
        let mut binder = AttachmentBinder::new();
        let comment = CommentId::new(1);
        ready(&mut binder, MAIN, "good");
        let id = binder.begin(MAIN);
        binder.settle(MAIN, comment);
        assert_eq!(binder.fail(MAIN, id), Some((comment, file("good"))));
        assert_eq!(binder.complete(MAIN, id, file("zombie")), Completion::Released);

        let id = binder.begin(EDIT);
        binder.settle(EDIT, comment);
        assert_eq!(binder.fail(EDIT, id), None);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Begin(usize),
        Finish(usize),
        Fail(usize),
        Detach(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0..4usize).prop_map(Op::Begin),
            (0..4usize).prop_map(Op::Finish),
            (0..4usize).prop_map(Op::Fail),
            (0..4usize).prop_map(Op::Detach),
        ]
    }

    proptest! {
        // Whatever the interleaving, a session only ever resolves a file
        // that was uploaded for that same session.
        #[test]
        fn previews_never_cross_wire(ops in proptest::collection::vec(op(), 1..80)) {
            let mut binder = AttachmentBinder::new();
            let sessions: Vec<SessionId> = (1..=4).map(SessionId::new).collect();
            // uploads in flight per session, oldest first
            let mut in_flight: Vec<Vec<BindingId>> = vec![Vec::new(); 4];
            let mut current: Vec<Option<BindingId>> = vec![None; 4];
            let mut expected: Vec<Option<AttachmentRef>> = vec![None; 4];

            for (step, op) in ops.into_iter().enumerate() {
                match op {
                    Op::Begin(s) => {
                        let id = binder.begin(sessions[s]);
                        in_flight[s].push(id);
                        current[s] = Some(id);
                    }
                    Op::Finish(s) => {
                        if let Some(id) = in_flight[s].pop() {
                            let f = file(&format!("s{}-{}", s, step));
                            if let Completion::Bound(b) = binder.complete(sessions[s], id, f.clone()) {
                                prop_assert_eq!(b.session_id, sessions[s]);
                            }
                            if current[s] == Some(id) {
                                expected[s] = Some(f);
                                current[s] = None;
                            }
                        }
                    }
                    Op::Fail(s) => {
                        if let Some(id) = in_flight[s].pop() {
                            binder.fail(sessions[s], id);
                            if current[s] == Some(id) {
                                current[s] = None;
                            }
                        }
                    }
                    Op::Detach(s) => {
                        binder.detach(sessions[s]);
                        expected[s] = None;
                        current[s] = None;
                    }
                }

                for (i, sid) in sessions.iter().enumerate() {
                    let resolved = binder.resolve_for_preview(*sid);
                    if let Some(f) = resolved {
                        let prefix = format!("s{}-", i);
                        prop_assert!(f.file_name.starts_with(&prefix));
                    }
                    prop_assert_eq!(resolved, expected[i].as_ref());
                    prop_assert_eq!(binder.is_uploading(*sid), current[i].is_some());
                }
            }
        }
    }
}
