use crate::models::AttachmentRef;
use serde::{Deserialize, Serialize};

const KEY_ENTER: u32 = 13;
// Ctrl+Enter arrives as a line feed in some browsers.
const KEY_LINE_FEED: u32 = 10;

/// A key press inside a comment textarea.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyChord {
    pub key_code: u32,
    #[serde(default)]
    pub ctrl: bool,
    #[serde(default)]
    pub meta: bool,
    #[serde(default)]
    pub shift: bool,
    #[serde(default)]
    pub alt: bool,
}

impl KeyChord {
    pub fn ctrl_enter() -> Self {
        Self {
            key_code: KEY_ENTER,
            ctrl: true,
            ..Self::default()
        }
    }

    /// Ctrl+Enter or Cmd+Enter.
    pub fn is_publish_shortcut(&self) -> bool {
        (self.ctrl || self.meta)
            && !self.alt
            && matches!(self.key_code, KEY_ENTER | KEY_LINE_FEED)
    }
}

pub fn image_markdown(attachment: &AttachmentRef) -> String {
    let alt = attachment.file_name.replace(['[', ']'], "");
    format!("![{}]({})", alt, attachment.url)
}

/// Markdown source shown in a session's preview pane: the draft followed by
/// the session's own bound image, if any.
pub fn preview_source(draft: &str, attachment: Option<&AttachmentRef>) -> String {
    match attachment {
        Some(a) if draft.trim().is_empty() => image_markdown(a),
        Some(a) => format!("{}\n\n{}", draft.trim_end(), image_markdown(a)),
        None => draft.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pl_png() -> AttachmentRef {
        AttachmentRef {
            file_name: "pl.png".into(),
            url: "/uploads/ab12.png".into(),
        }
    }

    #[test]
    fn ctrl_or_cmd_enter_publishes() {
        assert!(KeyChord::ctrl_enter().is_publish_shortcut());
        let line_feed = KeyChord {
            key_code: 10,
            ctrl: true,
            ..KeyChord::default()
        };
        assert!(line_feed.is_publish_shortcut());
        let cmd = KeyChord {
            key_code: 13,
            meta: true,
            ..KeyChord::default()
        };
        assert!(cmd.is_publish_shortcut());
    }

    #[test]
    fn plain_enter_is_just_a_newline() {
        let enter = KeyChord {
            key_code: 13,
            ..KeyChord::default()
        };
        assert!(!enter.is_publish_shortcut());
        let ctrl_a = KeyChord {
            key_code: 65,
            ctrl: true,
            ..KeyChord::default()
        };
        assert!(!ctrl_a.is_publish_shortcut());
    }

    #[test]
    fn preview_appends_only_the_given_attachment() {
        assert_eq!(preview_source("woot woot", None), "woot woot");
        assert_eq!(
            preview_source("woot woot\n", Some(&pl_png())),
            "woot woot\n\n![pl.png](/uploads/ab12.png)"
        );
        assert_eq!(
            preview_source("  ", Some(&pl_png())),
            "![pl.png](/uploads/ab12.png)"
        );
    }
}
