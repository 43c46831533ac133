use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};

use super::defaults::default_config;
use super::paths::AppPaths;
use super::settings::Settings;
use super::validation::validate_config;
use super::ConfigError;

#[derive(Clone)]
pub struct ConfigService {
    paths: Arc<AppPaths>,
}

impl ConfigService {
    pub fn new(paths: Arc<AppPaths>) -> Self {
        Self { paths }
    }

    pub fn config_path(&self) -> PathBuf {
        self.paths.config_path()
    }

    /// Defaults deep-merged with the user config file, validated.
    pub fn load_config(&self) -> Result<Value, ConfigError> {
        let path = self.config_path();
        let user_config = load_yaml_file(&path)?;
        let mut merged = deep_merge(&default_config(), &user_config);
        apply_env_overrides(&mut merged)?;

        validate_config(&merged)?;
        Ok(merged)
    }

    pub fn load_settings(&self) -> Result<Settings, ConfigError> {
        let config = self.load_config()?;
        let settings: Settings = serde_json::from_value(config)?;
        tracing::info!("Loaded configuration from {}", self.config_path().display());
        Ok(settings)
    }

    /// Resolve a configured relative path against the data dir, then the project root.
    pub fn resolve_path(&self, raw: &str) -> PathBuf {
        resolve_model_path(raw, &self.paths)
    }

    /// Resolve an embedding model identifier to a GGUF file under the models dir.
    ///
    /// Tries the identifier as a path, then `<models>/<id>.gguf`, then the first
    /// `*.gguf` inside `<models>/<id>/` (where downloads land). Falls back to
    /// `<models>/<id>.gguf` so the load error names the expected location.
    pub fn resolve_embedding_model(&self, model_id: &str) -> PathBuf {
        let direct = resolve_model_path(model_id, &self.paths);
        if direct.is_file() {
            return direct;
        }

        let models_dir = &self.paths.models_dir;
        let with_extension = models_dir.join(format!("{}.gguf", model_id));
        if with_extension.is_file() {
            return with_extension;
        }

        if let Some(found) = first_gguf_in(&self.embedding_model_dir(model_id)) {
            return found;
        }

        with_extension
    }

    /// Directory a downloaded embedding model is stored in.
    pub fn embedding_model_dir(&self, model_id: &str) -> PathBuf {
        self.paths.models_dir.join(model_id)
    }
}

pub fn resolve_model_path(raw: &str, paths: &AppPaths) -> PathBuf {
    let candidate = PathBuf::from(raw);
    if candidate.is_absolute() {
        return candidate;
    }
    let user_candidate = paths.user_data_dir.join(&candidate);
    if user_candidate.exists() {
        return user_candidate;
    }
    let project_candidate = paths.project_root.join(&candidate);
    if project_candidate.exists() {
        return project_candidate;
    }
    user_candidate
}

fn first_gguf_in(dir: &Path) -> Option<PathBuf> {
    let entries = fs::read_dir(dir).ok()?;
    let mut files: Vec<PathBuf> = entries
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("gguf"))
        })
        .collect();
    files.sort();
    files.into_iter().next()
}

fn load_yaml_file(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Ok(Value::Object(Map::new()));
    }

    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    if contents.trim().is_empty() {
        return Ok(Value::Object(Map::new()));
    }

    let value: Value = serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Null => Ok(Value::Object(Map::new())),
        _ => Err(ConfigError::Invalid(format!(
            "{} must contain a mapping at the top level",
            path.display()
        ))),
    }
}

fn apply_env_overrides(config: &mut Value) -> Result<(), ConfigError> {
    if let Ok(raw) = env::var("PORT") {
        let port: u16 = raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid(format!("PORT must be a port number, got '{}'", raw)))?;
        if let Some(server) = config.get_mut("server").and_then(|v| v.as_object_mut()) {
            server.insert("port".to_string(), Value::from(port));
        }
    }
    Ok(())
}

fn deep_merge(base: &Value, override_value: &Value) -> Value {
    match (base, override_value) {
        (Value::Object(base_map), Value::Object(override_map)) => {
            let mut merged: Map<String, Value> = base_map.clone();
            for (key, value) in override_map {
                let merged_value = match merged.get(key) {
                    Some(existing) => deep_merge(existing, value),
                    None => value.clone(),
                };
                merged.insert(key.clone(), merged_value);
            }
            Value::Object(merged)
        }
        _ => override_value.clone(),
    }
}
