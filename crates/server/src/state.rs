use domain::{AppCommand, CommentError};
use engine::{CommandEnvelope, CommandReply, Engine};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

#[derive(Clone)]
pub struct AppState {
    /// Read paths go straight to the engine.
    pub engine: Engine,
    // 写操作：发送信封给 Worker
    pub sender: mpsc::Sender<CommandEnvelope>,
    pub command_timeout: Duration,
}

#[derive(Debug)]
pub enum DispatchError {
    Rejected(CommentError),
    WorkerClosed,
    Timeout,
}

impl From<CommentError> for DispatchError {
    fn from(e: CommentError) -> Self {
        DispatchError::Rejected(e)
    }
}

impl AppState {
    pub async fn dispatch(&self, cmd: AppCommand) -> Result<CommandReply, DispatchError> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(CommandEnvelope { cmd, resp: tx })
            .await
            .map_err(|_| DispatchError::WorkerClosed)?;

        match tokio::time::timeout(self.command_timeout, rx).await {
            Ok(Ok(result)) => Ok(result?),
            Ok(Err(_)) => Err(DispatchError::WorkerClosed),
            Err(_) => Err(DispatchError::Timeout),
        }
    }
}
