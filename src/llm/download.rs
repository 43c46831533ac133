//! Fetches GGUF files from a Hugging Face style model repository.
//!
//! A file is stored under the target directory with its own name. The body
//! streams into `<name>.part` and is renamed into place once complete (and,
//! when a digest is configured, verified).

use std::path::{Path, PathBuf};

use reqwest::Client;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;

use super::error::LlmError;

/// One file in a remote model repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteModel {
    /// Repository host, e.g. `https://huggingface.co`.
    pub endpoint: String,
    /// `owner/name` of the repository.
    pub repo: String,
    /// File name inside the repository.
    pub file: String,
    pub revision: String,
    /// Expected SHA-256 of the file, hex encoded.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl RemoteModel {
    pub fn url(&self) -> String {
        let revision = Some(self.revision.trim())
            .filter(|value| !value.is_empty())
            .unwrap_or("main");
        format!(
            "{}/{}/resolve/{}/{}?download=true",
            self.endpoint.trim_end_matches('/'),
            self.repo,
            urlencoding::encode(revision),
            self.file
        )
    }
}

#[derive(Clone, Default)]
pub struct ModelDownloader {
    client: Client,
}

impl ModelDownloader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make sure `model` exists in `dir`, downloading it if needed.
    pub async fn fetch(&self, model: &RemoteModel, dir: &Path) -> Result<PathBuf, LlmError> {
        let file_name = sanitize_model_filename(&model.file)
            .ok_or_else(|| LlmError::Download(format!("invalid model file name '{}'", model.file)))?;
        let target = dir.join(file_name);
        if target.is_file() {
            return Ok(target);
        }
        fs::create_dir_all(dir).await?;

        let url = model.url();
        tracing::info!("Downloading {} into {}", url, dir.display());
        let mut response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|err| LlmError::Download(format!("GET {}: {}", url, err)))?;
        let status = response.status();
        if !status.is_success() {
            return Err(LlmError::Download(format!("GET {} returned {}", url, status)));
        }

        let partial = dir.join(format!("{}.part", file_name));
        let mut file = fs::File::create(&partial).await?;
        let mut hasher = Sha256::new();
        let mut downloaded: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|err| LlmError::Download(format!("reading {}: {}", url, err)))?
        {
            file.write_all(&chunk).await?;
            hasher.update(&chunk);
            downloaded += chunk.len() as u64;
        }
        file.flush().await?;
        drop(file);

        let actual = hex::encode(hasher.finalize());
        if let Some(expected) = model.sha256.as_deref().and_then(normalize_sha256) {
            if actual != expected {
                let _ = fs::remove_file(&partial).await;
                return Err(LlmError::Checksum { expected, actual });
            }
        }

        fs::rename(&partial, &target).await?;
        tracing::info!(
            "Downloaded {} ({} bytes, sha256 {})",
            target.display(),
            downloaded,
            actual
        );
        Ok(target)
    }
}

/// Only a bare file name is accepted; anything with a directory part is rejected.
pub fn sanitize_model_filename(filename: &str) -> Option<&str> {
    if filename.is_empty() {
        return None;
    }
    let base = Path::new(filename).file_name().and_then(|n| n.to_str())?;
    (base == filename).then_some(base)
}

pub fn normalize_sha256(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.len() != 64 || !trimmed.chars().all(|ch| ch.is_ascii_hexdigit()) {
        return None;
    }
    Some(trimmed.to_ascii_lowercase())
}
