use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use domain::{AttachmentRef, UploadFile};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::fs;
use tracing::info;

use crate::traits::Uploader;

/// Content-addressed uploads on local disk: identical bytes share one file.
pub struct LocalUploader {
    root: PathBuf,
    url_prefix: String,
    max_bytes: usize,
}

impl LocalUploader {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stored_name(file: &UploadFile) -> String {
        let hash = hex::encode(Sha256::digest(&file.bytes));
        match extension(&file.file_name) {
            Some(ext) => format!("{}.{}", hash, ext),
            None => hash,
        }
    }
}

fn extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?;
    ext.chars()
        .all(|c| c.is_ascii_alphanumeric())
        .then(|| ext.to_ascii_lowercase())
}

fn check_file(file: &UploadFile, max_bytes: usize) -> Result<()> {
    if file.bytes.is_empty() {
        bail!("{} is empty", file.file_name);
    }
    if file.bytes.len() > max_bytes {
        bail!(
            "{} is {} bytes, limit is {}",
            file.file_name,
            file.bytes.len(),
            max_bytes
        );
    }
    Ok(())
}

#[async_trait]
impl Uploader for LocalUploader {
    async fn upload(&self, file: UploadFile) -> Result<AttachmentRef> {
        check_file(&file, self.max_bytes)?;

        let name = Self::stored_name(&file);
        let target = self.root.join(&name);
        fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Cannot create upload dir {}", self.root.display()))?;
        if fs::metadata(&target).await.is_err() {
            fs::write(&target, &file.bytes)
                .await
                .with_context(|| format!("Cannot write {}", target.display()))?;
            info!("Stored upload {} as {}", file.file_name, name);
        }

        Ok(AttachmentRef {
            file_name: file.file_name,
            url: format!("{}/{}", self.url_prefix, name),
        })
    }
}

/// Keeps uploads in process memory. For tests and ephemeral deployments.
pub struct MemoryUploader {
    files: Mutex<HashMap<String, Vec<u8>>>,
    max_bytes: usize,
}

impl MemoryUploader {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            files: Mutex::new(HashMap::new()),
            max_bytes,
        }
    }

    pub fn get(&self, url: &str) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(url)
            .cloned()
    }
}

impl Default for MemoryUploader {
    fn default() -> Self {
        Self::new(usize::MAX)
    }
}

#[async_trait]
impl Uploader for MemoryUploader {
    async fn upload(&self, file: UploadFile) -> Result<AttachmentRef> {
        check_file(&file, self.max_bytes)?;
        let url = format!("memory://{}", LocalUploader::stored_name(&file));
        self.files
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(url.clone(), file.bytes);
        Ok(AttachmentRef {
            file_name: file.file_name,
            url,
        })
    }
}
