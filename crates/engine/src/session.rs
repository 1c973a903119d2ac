use domain::{
    protocol, AttachmentRef, CommentError, CommentId, NodeId, SessionId, SessionKind,
    SessionState, UserId,
};
use serde::Serialize;
use std::collections::HashMap;

type Result<T> = std::result::Result<T, CommentError>;

/// What a session turns into when published.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishRequest {
    Create {
        node_id: NodeId,
        author_id: UserId,
        parent_id: Option<CommentId>,
        body: String,
    },
    Edit {
        comment_id: CommentId,
        body: String,
        expected_version: u64,
    },
}

/// Read-only view of a session for the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub id: SessionId,
    pub node_id: NodeId,
    pub author_id: UserId,
    pub kind: SessionKind,
    pub state: SessionState,
    pub draft: String,
    pub preview_visible: bool,
    /// Body of the edited comment when the form opened.
    pub original_body: Option<String>,
    pub expected_version: Option<u64>,
    pub attachment: Option<AttachmentRef>,
    /// An upload for this form is still running.
    pub uploading: bool,
    /// Markdown source for the preview pane, present only while previewing.
    pub preview: Option<String>,
}

/// One open comment form: main, reply or edit-in-place.
#[derive(Debug, Clone)]
pub struct CommentFormSession {
    id: SessionId,
    node_id: NodeId,
    author_id: UserId,
    kind: SessionKind,
    state: SessionState,
    draft: String,
    typed: bool,
    publishing: bool,
    original_body: Option<String>,
    expected_version: Option<u64>,
}

impl CommentFormSession {
    fn new(id: SessionId, node_id: NodeId, author_id: UserId, kind: SessionKind) -> Self {
        Self {
            id,
            node_id,
            author_id,
            kind,
            state: SessionState::OpenEmpty,
            draft: String::new(),
            typed: false,
            publishing: false,
            original_body: None,
            expected_version: None,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn kind(&self) -> SessionKind {
        self.kind
    }

    pub fn node_id(&self) -> NodeId {
        self.node_id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn draft(&self) -> &str {
        &self.draft
    }

    pub fn preview_visible(&self) -> bool {
        self.state == SessionState::Previewing
    }

    fn invalid(&self, action: &'static str) -> CommentError {
        CommentError::InvalidTransition {
            session: self.id,
            action,
            state: self.state,
        }
    }

    pub fn type_text(&mut self, text: impl Into<String>) -> Result<()> {
        match self.state {
            SessionState::OpenEmpty | SessionState::OpenDrafting => {
                self.draft = text.into();
                self.typed = true;
                self.state = SessionState::OpenDrafting;
                Ok(())
            }
            _ => Err(self.invalid("type")),
        }
    }

    /// Flips this session's preview only. Returns whether preview is visible.
    pub fn toggle_preview(&mut self) -> Result<bool> {
        self.state = match self.state {
            SessionState::OpenEmpty | SessionState::OpenDrafting => SessionState::Previewing,
            SessionState::Previewing if self.typed => SessionState::OpenDrafting,
            SessionState::Previewing => SessionState::OpenEmpty,
            SessionState::Closed => return Err(self.invalid("toggle preview")),
        };
        Ok(self.preview_visible())
    }

    /// Files can be picked once the form has text or is previewing.
    pub fn accepts_attachments(&self) -> bool {
        matches!(self.state, SessionState::OpenDrafting | SessionState::Previewing)
    }

    /// Marks a publish as in flight and describes the store call to make.
    pub fn begin_publish(&mut self) -> Result<PublishRequest> {
        if self.publishing {
            return Err(self.invalid("publish twice"));
        }
        if self.state == SessionState::Closed {
            return Err(CommentError::SessionClosed(self.id));
        }
        if self.draft.trim().is_empty() {
            return Err(CommentError::EmptyBody);
        }
        let body = self.draft.clone();
        let request = match self.kind {
            SessionKind::New => PublishRequest::Create {
                node_id: self.node_id,
                author_id: self.author_id,
                parent_id: None,
                body,
            },
            SessionKind::Reply(parent) => PublishRequest::Create {
                node_id: self.node_id,
                author_id: self.author_id,
                parent_id: Some(parent),
                body,
            },
            SessionKind::Edit(comment_id) => PublishRequest::Edit {
                comment_id,
                body,
                expected_version: self
                    .expected_version
                    .ok_or(CommentError::NotFound(comment_id))?,
            },
        };
        self.publishing = true;
        Ok(request)
    }

    /// A failed publish leaves the form open for another try.
    pub fn abort_publish(&mut self) {
        self.publishing = false;
    }

    pub fn rebase(&mut self, version: u64) {
        self.expected_version = Some(version);
    }

    pub fn snapshot(&self, attachment: Option<&AttachmentRef>) -> SessionSnapshot {
        let preview_visible = self.preview_visible();
        SessionSnapshot {
            id: self.id,
            node_id: self.node_id,
            author_id: self.author_id,
            kind: self.kind,
            state: self.state,
            draft: self.draft.clone(),
            preview_visible,
            original_body: self.original_body.clone(),
            expected_version: self.expected_version,
            attachment: attachment.cloned(),
            uploading: false,
            preview: preview_visible.then(|| protocol::preview_source(&self.draft, attachment)),
        }
    }
}

/// Arena of open sessions keyed by id. Closing removes the entry, so a closed
/// session is indistinguishable from one that never existed.
#[derive(Debug, Default)]
pub struct FormSessions {
    next_id: u64,
    open: HashMap<SessionId, CommentFormSession>,
}

impl FormSessions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open(&mut self, node_id: NodeId, author_id: UserId, kind: SessionKind) -> SessionId {
        self.next_id += 1;
        let id = SessionId::new(self.next_id);
        self.open
            .insert(id, CommentFormSession::new(id, node_id, author_id, kind));
        id
    }

    /// Opens an edit form bound to the version the author is looking at,
    /// prefilled with the comment's body.
    pub fn open_edit(
        &mut self,
        node_id: NodeId,
        author_id: UserId,
        comment_id: CommentId,
        original_body: String,
        version: u64,
    ) -> SessionId {
        let id = self.open(node_id, author_id, SessionKind::Edit(comment_id));
        if let Some(s) = self.open.get_mut(&id) {
            s.draft = original_body.clone();
            s.typed = true;
            s.state = SessionState::OpenDrafting;
            s.original_body = Some(original_body);
            s.expected_version = Some(version);
        }
        id
    }

    pub fn get(&self, id: SessionId) -> Result<&CommentFormSession> {
        self.open.get(&id).ok_or(CommentError::SessionClosed(id))
    }

    pub fn get_mut(&mut self, id: SessionId) -> Result<&mut CommentFormSession> {
        self.open.get_mut(&id).ok_or(CommentError::SessionClosed(id))
    }

    pub fn close(&mut self, id: SessionId) -> Option<CommentFormSession> {
        self.open.remove(&id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const NODE: NodeId = NodeId::new(1);
    const JEFF: UserId = UserId::new(2);

    #[test]
    fn typing_moves_to_drafting() {
        let mut sessions = FormSessions::new();
        let id = sessions.open(NODE, JEFF, SessionKind::New);
        let s = sessions.get_mut(id).unwrap();
        assert_eq!(s.state(), SessionState::OpenEmpty);
        s.type_text("woot woot").unwrap();
        assert_eq!(s.state(), SessionState::OpenDrafting);
        assert_eq!(s.draft(), "woot woot");
    }

    #[test]
    fn typing_while_previewing_is_rejected() {
        let mut sessions = FormSessions::new();
        let id = sessions.open(NODE, JEFF, SessionKind::New);
        let s = sessions.get_mut(id).unwrap();
        s.type_text("draft").unwrap();
        assert!(s.toggle_preview().unwrap());
        assert!(matches!(
            s.type_text("more"),
            Err(CommentError::InvalidTransition { action: "type", .. })
        ));
        assert!(!s.toggle_preview().unwrap());
        assert_eq!(s.state(), SessionState::OpenDrafting);
    }

    #[test]
    fn empty_form_can_preview_and_come_back_empty() {
        let mut sessions = FormSessions::new();
        let id = sessions.open(NODE, JEFF, SessionKind::Reply(CommentId::new(4)));
        let s = sessions.get_mut(id).unwrap();
        assert!(s.toggle_preview().unwrap());
        assert!(!s.toggle_preview().unwrap());
        assert_eq!(s.state(), SessionState::OpenEmpty);
    }

    #[test]
    fn blank_draft_does_not_publish() {
        let mut sessions = FormSessions::new();
        let id = sessions.open(NODE, JEFF, SessionKind::New);
        let s = sessions.get_mut(id).unwrap();
        assert_eq!(s.begin_publish().unwrap_err(), CommentError::EmptyBody);
        s.type_text("   ").unwrap();
        assert_eq!(s.begin_publish().unwrap_err(), CommentError::EmptyBody);
    }

    #[test]
    fn publish_request_follows_kind() {
        let mut sessions = FormSessions::new();
        let reply = sessions.open(NODE, JEFF, SessionKind::Reply(CommentId::new(9)));
        let s = sessions.get_mut(reply).unwrap();
        s.type_text("no you can't").unwrap();
        assert_eq!(
            s.begin_publish().unwrap(),
            PublishRequest::Create {
                node_id: NODE,
                author_id: JEFF,
                parent_id: Some(CommentId::new(9)),
                body: "no you can't".into(),
            }
        );
        assert!(matches!(
            s.begin_publish(),
            Err(CommentError::InvalidTransition { .. })
        ));
        s.abort_publish();
        assert!(s.begin_publish().is_ok());

        let edit = sessions.open_edit(NODE, JEFF, CommentId::new(9), "old".into(), 3);
        let s = sessions.get_mut(edit).unwrap();
        s.type_text("Updated comment.").unwrap();
        assert_eq!(
            s.begin_publish().unwrap(),
            PublishRequest::Edit {
                comment_id: CommentId::new(9),
                body: "Updated comment.".into(),
                expected_version: 3,
            }
        );
    }

    #[test]
    fn closed_session_is_gone() {
        let mut sessions = FormSessions::new();
        let id = sessions.open(NODE, JEFF, SessionKind::New);
        assert!(sessions.close(id).is_some());
        assert_eq!(sessions.get(id).unwrap_err(), CommentError::SessionClosed(id));
        assert!(sessions.close(id).is_none());
    }

    #[test]
    fn only_drafting_or_previewing_forms_take_files() {
        let mut sessions = FormSessions::new();
        let id = sessions.open(NODE, JEFF, SessionKind::New);
        let s = sessions.get_mut(id).unwrap();
        assert!(!s.accepts_attachments());
        s.toggle_preview().unwrap();
        assert!(s.accepts_attachments());
        s.toggle_preview().unwrap();
        s.type_text("caption").unwrap();
        assert!(s.accepts_attachments());
    }

    #[test]
    fn edit_session_opens_with_the_current_body() {
        let mut sessions = FormSessions::new();
        let id = sessions.open_edit(NODE, JEFF, CommentId::new(5), "woot woot".into(), 2);
        let s = sessions.get_mut(id).unwrap();
        assert_eq!(s.state(), SessionState::OpenDrafting);
        assert!(s.accepts_attachments());
        assert_eq!(
            s.begin_publish().unwrap(),
            PublishRequest::Edit {
                comment_id: CommentId::new(5),
                body: "woot woot".into(),
                expected_version: 2,
            }
        );
    }

    #[test]
    fn snapshot_shows_preview_only_while_previewing() {
        let mut sessions = FormSessions::new();
        let id = sessions.open(NODE, JEFF, SessionKind::New);
        let s = sessions.get_mut(id).unwrap();
        s.type_text("look").unwrap();
        let file = AttachmentRef {
            file_name: "pl.png".into(),
            url: "/u/pl.png".into(),
        };
        assert_eq!(s.snapshot(Some(&file)).preview, None);
        s.toggle_preview().unwrap();
        let snap = s.snapshot(Some(&file));
        assert_eq!(snap.preview.as_deref(), Some("look\n\n![pl.png](/u/pl.png)"));
        assert!(snap.preview_visible);
    }

    proptest! {
        // Toggling one form's preview never moves another form's preview.
        #[test]
        fn preview_toggles_are_independent(toggles in proptest::collection::vec(0..4usize, 0..40)) {
            let mut sessions = FormSessions::new();
            let ids: Vec<SessionId> = (0..4)
                .map(|i| sessions.open(NODE, JEFF, SessionKind::Reply(CommentId::new(i))))
                .collect();
            let mut expected = [false; 4];

            for pick in toggles {
                let visible = sessions.get_mut(ids[pick]).unwrap().toggle_preview().unwrap();
                expected[pick] = !expected[pick];
                prop_assert_eq!(visible, expected[pick]);
                for (i, id) in ids.iter().enumerate() {
                    prop_assert_eq!(sessions.get(*id).unwrap().preview_visible(), expected[i]);
                }
            }
        }
    }
}
