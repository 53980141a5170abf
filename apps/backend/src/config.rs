//! Application settings loaded from the environment (with .env support).
//!
//! Everything downstream receives a `Settings` value; nothing else reads
//! `std::env` at request time.

use std::path::PathBuf;

/// Runtime configuration, collected once at startup.
#[derive(Debug, Clone)]
pub struct Settings {
    /// PostgreSQL connection string.
    pub database_url: String,

    /// Base URL of the local Ollama runtime.
    pub ollama_base_url: String,
    /// Model tag the tutor generates with.
    pub ollama_model: String,

    /// Piper binary: absolute path or a bare name resolved through PATH.
    pub piper_binary_path: PathBuf,
    /// Piper voice model (.onnx). The matching .onnx.json config sits next to it.
    pub piper_model_path: PathBuf,

    /// Default for the `new_cards_per_day` meta seed.
    pub new_cards_per_day: u32,

    pub app_host: String,
    pub app_port: u16,
    pub log_level: String,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = std::env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL must be set"))?;

        Ok(Self {
            database_url,
            ollama_base_url: var_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: var_or("OLLAMA_MODEL", "llama3.1:70b"),
            piper_binary_path: PathBuf::from(var_or("PIPER_BINARY_PATH", "piper")),
            piper_model_path: PathBuf::from(var_or(
                "PIPER_MODEL_PATH",
                "static/piper/ja_JP-kokoro-medium.onnx",
            )),
            new_cards_per_day: parse_var("NEW_CARDS_PER_DAY", 20)?,
            app_host: var_or("APP_HOST", "127.0.0.1"),
            app_port: parse_var("APP_PORT", 8000)?,
            log_level: var_or("LOG_LEVEL", "info"),
        })
    }

    /// Socket address string the server binds to.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.app_host, self.app_port)
    }
}

fn var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_var<T: std::str::FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse()
            .map_err(|e| anyhow::anyhow!("invalid {key}={raw}: {e}")),
        Err(_) => Ok(default),
    }
}
