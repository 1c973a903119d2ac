use anyhow::Result;
use async_trait::async_trait;
use domain::{AttachmentRef, UploadFile};

/// Upload collaborator: stores a file and hands back an opaque reference.
#[async_trait]
pub trait Uploader: Send + Sync {
    async fn upload(&self, file: UploadFile) -> Result<AttachmentRef>;
}
