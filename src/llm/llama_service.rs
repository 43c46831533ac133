use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde_json::Value;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use super::error::LlmError;
use crate::core::config::AppPaths;

const HEALTH_RETRY_MILLIS: u64 = 500;

/// How one `llama-server` process is started.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelRuntimeConfig {
    /// Key the process is tracked under ("llm", "embedding").
    pub model_key: String,
    pub model_path: PathBuf,
    /// 0 picks a free port.
    pub port: u16,
    pub n_ctx: u32,
    pub n_gpu_layers: i32,
    pub enable_embedding: bool,
}

/// Starts, reuses, and stops `llama-server` child processes, one per model key.
#[derive(Clone)]
pub struct LlamaService {
    inner: Arc<Mutex<LlamaManager>>,
    client: Client,
    health_timeout: Duration,
}

struct LlamaManager {
    binary_path: Option<PathBuf>,
    logs_dir: PathBuf,
    processes: HashMap<String, Child>,
    ports: HashMap<String, u16>,
}

impl LlamaService {
    pub fn new(paths: &AppPaths, configured_binary: Option<&Path>, health_timeout: Duration) -> Self {
        let binary_path = resolve_llama_binary(paths, configured_binary);
        match &binary_path {
            Some(path) => tracing::info!("Using llama-server at {}", path.display()),
            None => tracing::warn!("llama-server binary not found"),
        }

        let logs_dir = paths.log_dir.clone();
        let _ = fs::create_dir_all(&logs_dir);

        LlamaService {
            inner: Arc::new(Mutex::new(LlamaManager {
                binary_path,
                logs_dir,
                processes: HashMap::new(),
                ports: HashMap::new(),
            })),
            client: Client::new(),
            health_timeout,
        }
    }

    /// POST `body` to `endpoint` on the server for `config`, starting it if needed.
    pub async fn post_json(
        &self,
        config: &ModelRuntimeConfig,
        endpoint: &str,
        body: &Value,
    ) -> Result<Value, LlmError> {
        let port = self.ensure_running(config).await?;
        let url = format!("http://127.0.0.1:{}{}", port, endpoint);

        let response = self.client.post(url).json(body).send().await?;
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(LlmError::Status { status, body });
        }

        Ok(response.json::<Value>().await?)
    }

    /// Start the server for `config` unless one is already running, and return its port.
    pub async fn ensure_running(&self, config: &ModelRuntimeConfig) -> Result<u16, LlmError> {
        if !config.model_path.is_file() {
            return Err(LlmError::ModelNotFound(config.model_path.clone()));
        }

        let mut guard = self.inner.lock().await;
        let binary_path = guard.binary_path.clone().ok_or(LlmError::BinaryNotFound)?;
        if let Some(port) = guard.get_running_port(&config.model_key) {
            return Ok(port);
        }

        let port = if config.port > 0 {
            config.port
        } else {
            find_free_port()?
        };
        let log_file = guard.build_log_file(&config.model_key)?;

        let mut command = Command::new(&binary_path);
        command
            .arg("-m")
            .arg(&config.model_path)
            .arg("--port")
            .arg(port.to_string())
            .arg("-c")
            .arg(config.n_ctx.to_string())
            .arg("--n-gpu-layers")
            .arg(config.n_gpu_layers.to_string())
            .stdout(Stdio::null())
            .stderr(Stdio::from(log_file));

        if config.enable_embedding {
            command.arg("--embedding");
        }

        tracing::info!(
            "Starting llama-server for '{}' ({}) on port {}",
            config.model_key,
            config.model_path.display(),
            port
        );
        let child = command.spawn().map_err(LlmError::Spawn)?;
        guard.processes.insert(config.model_key.clone(), child);
        guard.ports.insert(config.model_key.clone(), port);
        drop(guard);

        if let Err(err) = self.perform_health_check(&config.model_key, port).await {
            self.terminate_model(&config.model_key).await;
            return Err(err);
        }
        tracing::info!("llama-server for '{}' is ready", config.model_key);
        Ok(port)
    }

    /// Kill every child process.
    pub async fn shutdown(&self) {
        let mut guard = self.inner.lock().await;
        guard.kill_all();
    }

    async fn terminate_model(&self, model_key: &str) {
        let mut guard = self.inner.lock().await;
        if let Some(mut child) = guard.processes.remove(model_key) {
            let _ = child.kill();
            let _ = child.wait();
        }
        guard.ports.remove(model_key);
    }

    async fn perform_health_check(&self, model_key: &str, port: u16) -> Result<(), LlmError> {
        let url = format!("http://127.0.0.1:{}/health", port);
        let deadline = Instant::now() + self.health_timeout;

        while Instant::now() < deadline {
            if let Some(status) = self.exit_status(model_key).await {
                return Err(LlmError::ProcessExited(status));
            }
            if let Ok(response) = self.client.get(&url).send().await {
                if response.status().is_success() {
                    if let Ok(payload) = response.json::<Value>().await {
                        if payload.get("status").and_then(|v| v.as_str()) == Some("ok") {
                            return Ok(());
                        }
                    }
                }
            }
            sleep(Duration::from_millis(HEALTH_RETRY_MILLIS)).await;
        }

        Err(LlmError::HealthCheck(self.health_timeout.as_secs()))
    }

    async fn exit_status(&self, model_key: &str) -> Option<String> {
        let mut guard = self.inner.lock().await;
        let child = guard.processes.get_mut(model_key)?;
        match child.try_wait() {
            Ok(Some(status)) => Some(status.to_string()),
            _ => None,
        }
    }
}

impl LlamaManager {
    fn get_running_port(&mut self, model_key: &str) -> Option<u16> {
        if let Some(child) = self.processes.get_mut(model_key) {
            if child.try_wait().ok().flatten().is_none() {
                return self.ports.get(model_key).copied();
            }
            self.processes.remove(model_key);
            self.ports.remove(model_key);
        }
        None
    }

    fn build_log_file(&self, model_key: &str) -> Result<fs::File, LlmError> {
        let safe = model_key
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                    c
                } else {
                    '_'
                }
            })
            .collect::<String>();
        let filename = format!(
            "llama_server_{}_{}.log",
            safe,
            chrono::Utc::now().timestamp()
        );
        Ok(fs::File::create(self.logs_dir.join(filename))?)
    }

    fn kill_all(&mut self) {
        for (key, mut child) in self.processes.drain() {
            tracing::info!("Stopping llama-server for '{}'", key);
            let _ = child.kill();
            let _ = child.wait();
        }
        self.ports.clear();
    }
}

impl Drop for LlamaManager {
    fn drop(&mut self) {
        self.kill_all();
    }
}

fn resolve_llama_binary(paths: &AppPaths, configured: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = configured {
        if path.is_file() {
            return Some(path.to_path_buf());
        }
        tracing::warn!("Configured llama.server_path {} does not exist", path.display());
    }

    for key in ["PDFCHAT_LLAMA_SERVER", "LLAMA_SERVER_PATH"] {
        if let Ok(value) = env::var(key) {
            let path = PathBuf::from(value);
            if path.is_file() {
                return Some(path);
            }
        }
    }

    let candidates = [
        paths.user_data_dir.join("bin"),
        paths.project_root.join("bin"),
    ];
    for root in candidates {
        if let Some(found) = find_server_executable(&root) {
            return Some(found);
        }
    }

    which::which(server_executable_name()).ok()
}

fn server_executable_name() -> &'static str {
    if cfg!(target_os = "windows") {
        "llama-server.exe"
    } else {
        "llama-server"
    }
}

fn find_server_executable(root: &Path) -> Option<PathBuf> {
    let exe_name = server_executable_name();
    if !root.exists() {
        return None;
    }

    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(_) => continue,
        };

        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
                continue;
            }
            if path.file_name().and_then(|n| n.to_str()) == Some(exe_name) {
                return Some(path);
            }
        }
    }

    None
}

fn find_free_port() -> Result<u16, LlmError> {
    let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
    Ok(listener.local_addr()?.port())
}
