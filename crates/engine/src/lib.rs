mod binder;
mod service;
mod session;
mod traits;
mod upload;
mod worker;

pub use binder::{AttachmentBinder, AttachmentBinding, BindingId, Completion, Settlement};
pub use service::{AttachmentStatus, Engine, EngineConfig, PublishOutcome};
pub use session::{CommentFormSession, FormSessions, PublishRequest, SessionSnapshot};
pub use traits::Uploader;
pub use upload::{LocalUploader, MemoryUploader};
pub use worker::{execute, CommandReply};

use domain::{AppCommand, CommentError};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::info;

// --- 信封模式：命令 + 结果回传通道 ---
pub struct CommandEnvelope {
    pub cmd: AppCommand,
    pub resp: oneshot::Sender<Result<CommandReply, CommentError>>,
}

pub async fn start_with_cancel_token(
    engine: Engine,
    rx: mpsc::Receiver<CommandEnvelope>,
    cancel_token: CancellationToken,
) -> anyhow::Result<()> {
    info!("Starting comment engine worker...");
    worker::run(engine, rx, cancel_token).await;
    info!("Comment engine worker stopped");
    Ok(())
}
