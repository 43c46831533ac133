use std::path::PathBuf;

use thiserror::Error;

/// Failures talking to, or managing, a `llama-server` process.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("llama-server binary not found (set llama.server_path or LLAMA_SERVER_PATH)")]
    BinaryNotFound,
    #[error("model file not found: {}", .0.display())]
    ModelNotFound(PathBuf),
    #[error("failed to spawn llama-server: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("llama-server exited before becoming healthy: {0}")]
    ProcessExited(String),
    #[error("llama-server failed health check after {0}s")]
    HealthCheck(u64),
    #[error("request to llama-server failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("llama-server returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("invalid response from llama-server: {0}")]
    InvalidResponse(String),
    #[error("model download failed: {0}")]
    Download(String),
    #[error("downloaded model checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
