use serde_json::{json, Value};

/// Built-in configuration. A user `config.yml` is deep-merged over this.
pub fn default_config() -> Value {
    json!({
        "document": {
            "path": "book.pdf",
            "chunk_size": 500,
            "chunk_overlap": 50
        },
        "models": {
            "llm": {
                "path": "models/ggml-model-q4_0.gguf",
                "n_ctx": 2048,
                "temperature": 0.0,
                "max_tokens": 256,
                "n_gpu_layers": -1,
                "port": 0
            },
            "embedding": {
                "model": "sentence-transformers/all-MiniLM-L6-v2",
                "batch_size": 32,
                "n_gpu_layers": -1,
                "port": 0,
                "download": {
                    "endpoint": "https://huggingface.co",
                    "repo": "second-state/All-MiniLM-L6-v2-Embedding-GGUF",
                    "file": "all-MiniLM-L6-v2-Q8_0.gguf",
                    "revision": "main",
                    "sha256": null
                }
            }
        },
        "retrieval": {
            "top_k": 3,
            "max_question_chars": 2000,
            "overflow_policy": "drop_oldest"
        },
        "generation": {
            "timeout_secs": 120
        },
        "server": {
            "host": "127.0.0.1",
            "port": 8501
        },
        "llama": {
            "server_path": null,
            "health_timeout_secs": 60
        }
    })
}
