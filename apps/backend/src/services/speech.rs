//! Offline text-to-speech via the Piper synthesizer subprocess.
//!
//! Each request spawns a fresh process: text goes to stdin, WAV bytes come
//! back on stdout, stderr is drained into the log. A 30-second wall-clock
//! budget bounds every synthesis; `kill_on_drop` guarantees the process
//! dies on timeout and on client abandonment alike.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::Settings;
use crate::error::ApiError;

/// Input cap in Unicode codepoints, enforced before spawning.
pub const MAX_TEXT_CODEPOINTS: usize = 500;
/// Wall-clock budget per synthesis.
const SYNTH_BUDGET: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum SpeechError {
    #[error("text must not be empty")]
    EmptyText,

    #[error("text length {0} exceeds maximum {MAX_TEXT_CODEPOINTS} characters")]
    TextTooLong(usize),

    #[error("piper binary not found: {0}")]
    NotInstalled(String),

    #[error("piper synthesis timed out after {}s", SYNTH_BUDGET.as_secs())]
    TimedOut,

    #[error("piper failed: {0}")]
    Failed(String),
}

impl From<SpeechError> for ApiError {
    fn from(err: SpeechError) -> Self {
        match err {
            SpeechError::EmptyText | SpeechError::TextTooLong(_) => {
                ApiError::Validation(err.to_string())
            }
            _ => ApiError::Unavailable(err.to_string()),
        }
    }
}

/// Handle to the configured Piper installation.
#[derive(Clone)]
pub struct SpeechSynthesizer {
    binary: PathBuf,
    model: PathBuf,
    /// Voice config sitting next to the model (<model>.json).
    model_config: PathBuf,
}

impl SpeechSynthesizer {
    pub fn new(settings: &Settings) -> Self {
        Self::with_paths(
            settings.piper_binary_path.clone(),
            settings.piper_model_path.clone(),
        )
    }

    pub fn with_paths(binary: PathBuf, model: PathBuf) -> Self {
        let mut config_name = model.as_os_str().to_owned();
        config_name.push(".json");
        Self {
            binary,
            model_config: PathBuf::from(config_name),
            model,
        }
    }

    /// True when both the binary and the voice model are present.
    pub fn available(&self) -> bool {
        resolve_binary(&self.binary).is_some() && self.model.exists()
    }

    /// Synthesize `text` into WAV bytes.
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>, SpeechError> {
        let text = validate_text(text)?;

        let binary = resolve_binary(&self.binary)
            .ok_or_else(|| SpeechError::NotInstalled(self.binary.display().to_string()))?;

        let mut child = Command::new(&binary)
            .arg("--model")
            .arg(&self.model)
            .arg("--config")
            .arg(&self.model_config)
            .arg("--output_file")
            .arg("-")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    SpeechError::NotInstalled(self.binary.display().to_string())
                }
                _ => SpeechError::Failed(format!("spawn failed: {e}")),
            })?;

        let mut stdin = child.stdin.take().expect("stdin was piped");
        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");
        let input = text.to_owned();

        // The whole exchange shares one deadline; dropping the future on
        // timeout kills the child via kill_on_drop.
        let exchange = async move {
            stdin
                .write_all(input.as_bytes())
                .await
                .map_err(|e| SpeechError::Failed(format!("stdin write failed: {e}")))?;
            drop(stdin);

            // Drain both pipes together; a full stderr buffer must not
            // stall the audio stream.
            let (wav, err_buf) = tokio::join!(
                async {
                    let mut wav = Vec::new();
                    stdout.read_to_end(&mut wav).await.map(|_| wav)
                },
                async {
                    let mut buf = Vec::new();
                    let _ = stderr.read_to_end(&mut buf).await;
                    buf
                },
            );
            let wav = wav.map_err(|e| SpeechError::Failed(format!("stdout read failed: {e}")))?;

            let status = child
                .wait()
                .await
                .map_err(|e| SpeechError::Failed(format!("wait failed: {e}")))?;

            if !err_buf.is_empty() {
                debug!(stderr = %String::from_utf8_lossy(&err_buf), "piper stderr");
            }

            if !status.success() {
                return Err(SpeechError::Failed(format!(
                    "exited with {}: {}",
                    status,
                    String::from_utf8_lossy(&err_buf).trim()
                )));
            }
            if wav.is_empty() {
                return Err(SpeechError::Failed("produced no audio output".into()));
            }
            Ok(wav)
        };

        match tokio::time::timeout(SYNTH_BUDGET, exchange).await {
            Ok(result) => result,
            Err(_) => {
                warn!("piper exceeded the {}s budget", SYNTH_BUDGET.as_secs());
                Err(SpeechError::TimedOut)
            }
        }
    }
}

/// Trim and bound the input text.
pub fn validate_text(text: &str) -> Result<&str, SpeechError> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(SpeechError::EmptyText);
    }
    let codepoints = trimmed.chars().count();
    if codepoints > MAX_TEXT_CODEPOINTS {
        return Err(SpeechError::TextTooLong(codepoints));
    }
    Ok(trimmed)
}

/// Resolve the configured binary: explicit paths must exist, bare names go
/// through PATH.
fn resolve_binary(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 || binary.is_absolute() {
        return binary.exists().then(|| binary.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.exists())
}
