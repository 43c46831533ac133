use serde_json::{Map, Value};

use super::ConfigError;
use crate::llm::download::{normalize_sha256, sanitize_model_filename};
use crate::rag::OverflowPolicy;

pub fn validate_config(config: &Value) -> Result<(), ConfigError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(document) = expect_optional_object(root, "document")? {
        validate_required_string_field(document, "document.path", "path")?;
        validate_u64_field(document, "document.chunk_size", "chunk_size", 1, 1_000_000)?;
        validate_u64_field(
            document,
            "document.chunk_overlap",
            "chunk_overlap",
            0,
            1_000_000,
        )?;
        let size = document.get("chunk_size").and_then(|v| v.as_u64());
        let overlap = document.get("chunk_overlap").and_then(|v| v.as_u64());
        if let (Some(size), Some(overlap)) = (size, overlap) {
            if overlap >= size {
                return Err(ConfigError::Invalid(format!(
                    "Invalid config at 'document.chunk_overlap': must be smaller than chunk_size ({})",
                    size
                )));
            }
        }
    }

    if let Some(models) = expect_optional_object(root, "models")? {
        if let Some(llm) = expect_optional_object(models, "llm")? {
            validate_required_string_field(llm, "models.llm.path", "path")?;
            validate_u64_field(llm, "models.llm.n_ctx", "n_ctx", 1, 10_000_000)?;
            validate_u64_field(llm, "models.llm.max_tokens", "max_tokens", 1, 1_000_000)?;
            validate_f64_field(llm, "models.llm.temperature", "temperature", 0.0, 2.0)?;
            validate_i64_field(llm, "models.llm.n_gpu_layers", "n_gpu_layers", -1, 1_000_000)?;
            validate_u64_field(llm, "models.llm.port", "port", 0, 65535)?;

            let n_ctx = llm.get("n_ctx").and_then(|v| v.as_u64());
            let max_tokens = llm.get("max_tokens").and_then(|v| v.as_u64());
            if let (Some(n_ctx), Some(max_tokens)) = (n_ctx, max_tokens) {
                if max_tokens >= n_ctx {
                    return Err(ConfigError::Invalid(format!(
                        "Invalid config at 'models.llm.max_tokens': must be smaller than n_ctx ({})",
                        n_ctx
                    )));
                }
            }
        }
        if let Some(embedding) = expect_optional_object(models, "embedding")? {
            validate_required_string_field(embedding, "models.embedding.model", "model")?;
            validate_u64_field(
                embedding,
                "models.embedding.batch_size",
                "batch_size",
                1,
                4096,
            )?;
            validate_i64_field(
                embedding,
                "models.embedding.n_gpu_layers",
                "n_gpu_layers",
                -1,
                1_000_000,
            )?;
            validate_u64_field(embedding, "models.embedding.port", "port", 0, 65535)?;
            if !matches!(embedding.get("download"), None | Some(Value::Null)) {
                if let Some(download) = expect_optional_object(embedding, "download")? {
                    validate_download(download)?;
                }
            }
        }
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 0, 10_000)?;
        validate_u64_field(
            retrieval,
            "retrieval.max_question_chars",
            "max_question_chars",
            1,
            1_000_000,
        )?;
        validate_enum_field(
            retrieval,
            "retrieval.overflow_policy",
            "overflow_policy",
            &OverflowPolicy::ALLOWED,
        )?;
    }

    if let Some(generation) = expect_optional_object(root, "generation")? {
        validate_u64_field(
            generation,
            "generation.timeout_secs",
            "timeout_secs",
            1,
            86_400,
        )?;
    }

    if let Some(server) = expect_optional_object(root, "server")? {
        validate_required_string_field(server, "server.host", "host")?;
        validate_u64_field(server, "server.port", "port", 0, 65535)?;
    }

    if let Some(llama) = expect_optional_object(root, "llama")? {
        if !matches!(llama.get("server_path"), None | Some(Value::Null)) {
            validate_required_string_field(llama, "llama.server_path", "server_path")?;
        }
        validate_u64_field(
            llama,
            "llama.health_timeout_secs",
            "health_timeout_secs",
            1,
            3_600,
        )?;
    }

    Ok(())
}

fn validate_download(download: &Map<String, Value>) -> Result<(), ConfigError> {
    for key in ["endpoint", "repo", "file", "revision"] {
        validate_required_string_field(
            download,
            &format!("models.embedding.download.{}", key),
            key,
        )?;
    }

    let endpoint = download.get("endpoint").and_then(|v| v.as_str()).unwrap_or("");
    if !endpoint.starts_with("http://") && !endpoint.starts_with("https://") {
        return Err(ConfigError::Invalid(
            "Invalid config at 'models.embedding.download.endpoint': expected an http(s) URL"
                .to_string(),
        ));
    }

    let file = download.get("file").and_then(|v| v.as_str()).unwrap_or("");
    if sanitize_model_filename(file).is_none() {
        return Err(ConfigError::Invalid(
            "Invalid config at 'models.embedding.download.file': expected a bare file name"
                .to_string(),
        ));
    }

    match download.get("sha256") {
        None | Some(Value::Null) => Ok(()),
        Some(Value::String(digest)) if normalize_sha256(digest).is_some() => Ok(()),
        Some(_) => Err(ConfigError::Invalid(
            "Invalid config at 'models.embedding.download.sha256': expected 64 hex characters"
                .to_string(),
        )),
    }
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, ConfigError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "non-negative integer"));
    };
    if number < min || number > max {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn validate_i64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: i64,
    max: i64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_i64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if !(min..=max).contains(&number) {
        return Err(range_error(path, min, max));
    }
    Ok(())
}

fn validate_required_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), ConfigError> {
    let value = section.get(key).ok_or_else(|| {
        ConfigError::Invalid(format!("Invalid config at '{}': value is required", path))
    })?;
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.trim().is_empty() {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': value cannot be empty",
            path
        )));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), ConfigError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(ConfigError::Invalid(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn range_error<T: std::fmt::Display>(path: &str, min: T, max: T) -> ConfigError {
    ConfigError::Invalid(format!(
        "Invalid config at '{}': must be between {} and {}",
        path, min, max
    ))
}

fn config_type_error(path: &str, expected: &str) -> ConfigError {
    ConfigError::Invalid(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::core::config::defaults::default_config;

    fn message(result: Result<(), ConfigError>) -> String {
        result.unwrap_err().to_string()
    }

    #[test]
    fn defaults_are_valid() {
        validate_config(&default_config()).expect("defaults should validate");
    }

    #[test]
    fn overlap_must_be_smaller_than_size() {
        let config = json!({ "document": { "path": "a.pdf", "chunk_size": 100, "chunk_overlap": 100 } });
        assert!(message(validate_config(&config)).contains("document.chunk_overlap"));
    }

    #[test]
    fn temperature_out_of_range_is_rejected() {
        let config = json!({ "models": { "llm": { "path": "m.gguf", "temperature": 3.5 } } });
        assert!(message(validate_config(&config)).contains("models.llm.temperature"));
    }

    #[test]
    fn unknown_overflow_policy_is_rejected() {
        let config = json!({ "retrieval": { "overflow_policy": "truncate_everything" } });
        let msg = message(validate_config(&config));
        assert!(msg.contains("retrieval.overflow_policy"));
        assert!(msg.contains("drop_oldest"));
    }

    #[test]
    fn empty_paths_are_rejected() {
        let config = json!({ "document": { "path": "  " } });
        assert!(message(validate_config(&config)).contains("document.path"));
    }

    #[test]
    fn section_must_be_an_object() {
        let config = json!({ "server": "localhost" });
        assert!(message(validate_config(&config)).contains("expected object"));
    }

    #[test]
    fn download_file_must_be_a_bare_name() {
        let config = json!({ "models": { "embedding": { "download": {
            "endpoint": "https://huggingface.co",
            "repo": "owner/model",
            "file": "../escape.gguf",
            "revision": "main"
        } } } });
        assert!(message(validate_config(&config)).contains("models.embedding.download.file"));
    }

    #[test]
    fn download_can_be_disabled_but_not_malformed() {
        let disabled = json!({ "models": { "embedding": { "download": null } } });
        validate_config(&disabled).unwrap();

        let bad_digest = json!({ "models": { "embedding": { "download": {
            "endpoint": "https://huggingface.co",
            "repo": "owner/model",
            "file": "model.gguf",
            "revision": "main",
            "sha256": "abc"
        } } } });
        assert!(message(validate_config(&bad_digest)).contains("download.sha256"));
    }

    #[test]
    fn max_tokens_must_leave_room_for_prompt() {
        let config = json!({ "models": { "llm": { "path": "m.gguf", "n_ctx": 256, "max_tokens": 256 } } });
        assert!(message(validate_config(&config)).contains("models.llm.max_tokens"));
    }
}
