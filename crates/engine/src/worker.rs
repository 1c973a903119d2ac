use domain::{AppCommand, AttachmentRef, Comment, CommentError};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::binder::AttachmentBinding;
use crate::service::{Engine, PublishOutcome};
use crate::session::SessionSnapshot;
use crate::CommandEnvelope;

#[derive(Debug)]
pub enum CommandReply {
    Comment(Comment),
    Deleted,
    Reaction(bool),
    Session(SessionSnapshot),
    Binding(AttachmentBinding),
    Detached(Option<AttachmentRef>),
    Published(PublishOutcome),
    Closed(bool),
    /// A key press that was not a publish shortcut.
    Ignored,
}

pub async fn execute(engine: &Engine, cmd: AppCommand) -> Result<CommandReply, CommentError> {
    let reply = match cmd {
        AppCommand::CreateComment {
            node_id,
            author_id,
            body,
            parent_id,
        } => CommandReply::Comment(
            engine
                .create_comment(node_id, author_id, body, parent_id)
                .await?,
        ),
        AppCommand::EditComment {
            comment_id,
            body,
            expected_version,
        } => CommandReply::Comment(
            engine
                .edit_comment(comment_id, body, expected_version)
                .await?,
        ),
        AppCommand::DeleteComment { comment_id } => {
            engine.delete_comment(comment_id).await?;
            CommandReply::Deleted
        }
        AppCommand::ToggleReaction {
            comment_id,
            user_id,
            emoji,
        } => CommandReply::Reaction(engine.react(comment_id, user_id, emoji).await?),
        AppCommand::OpenSession {
            node_id,
            author_id,
            kind,
        } => CommandReply::Session(engine.open_session(node_id, author_id, kind)?),
        AppCommand::TypeText { session_id, text } => {
            CommandReply::Session(engine.type_text(session_id, text)?)
        }
        AppCommand::TogglePreview { session_id } => {
            engine.toggle_preview(session_id)?;
            CommandReply::Session(engine.session(session_id)?)
        }
        AppCommand::RefreshEditBase { session_id } => {
            CommandReply::Session(engine.refresh_edit_base(session_id)?)
        }
        AppCommand::Attach { session_id, file } => {
            CommandReply::Binding(engine.attach(session_id, file).await?)
        }
        AppCommand::Detach { session_id } => CommandReply::Detached(engine.detach(session_id)?),
        AppCommand::KeyPress { session_id, chord } => {
            match engine.key_press(session_id, chord).await? {
                Some(outcome) => CommandReply::Published(outcome),
                None => CommandReply::Ignored,
            }
        }
        AppCommand::Publish { session_id } => {
            CommandReply::Published(engine.publish(session_id).await?)
        }
        AppCommand::Cancel { session_id } => CommandReply::Closed(engine.cancel(session_id)),
    };
    Ok(reply)
}

fn reply(
    resp: oneshot::Sender<Result<CommandReply, CommentError>>,
    result: Result<CommandReply, CommentError>,
) {
    if let Err(e) = &result {
        debug!("Command rejected: {}", e);
    }
    if resp.send(result).is_err() {
        warn!("Command caller went away before the reply");
    }
}

/// Runs commands in arrival order. Uploads are spawned so a slow file never
/// holds up typing or publishing in other forms.
pub(crate) async fn run(
    engine: Engine,
    mut rx: mpsc::Receiver<CommandEnvelope>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            envelope = rx.recv() => {
                let Some(CommandEnvelope { cmd, resp }) = envelope else {
                    info!("Command channel closed");
                    break;
                };
                if cmd.is_upload() {
                    let engine = engine.clone();
                    tokio::spawn(async move {
                        let result = execute(&engine, cmd).await;
                        reply(resp, result);
                    });
                } else {
                    let result = execute(&engine, cmd).await;
                    reply(resp, result);
                }
            }
            _ = cancel_token.cancelled() => {
                info!("Shutdown requested, stopping command loop");
                break;
            }
        }
    }
}
