//! AI tutor gateway: streams tokens from a local Ollama runtime.
//!
//! The system prompt forbids on-demand translation and requires furigana in
//! `<ruby>kanji<rt>kana</rt></ruby>` form. Context (JLPT focus, recent
//! reviews, weak cards) is injected per request from live database state;
//! this module itself never touches storage.

use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::config::Settings;

/// Abort the stream when the runtime produces no token for this long.
const TOKEN_TIMEOUT: Duration = Duration::from_secs(120);
/// Budget for the health probe.
const HEALTH_TIMEOUT: Duration = Duration::from_secs(5);
/// Bounded relay channel; backpressure stalls the upstream read instead of
/// buffering an unbounded transcript.
const RELAY_BUFFER: usize = 32;

/// Conversation mode selected by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TutorMode {
    Teach,
    Quiz,
    Explain,
    Correct,
    Chat,
}

/// Live context injected into the system prompt.
#[derive(Debug, Clone, Default)]
pub struct TutorContext {
    pub jlpt_level: String,
    /// Surface forms from the 10 most recent reviews.
    pub recent_words: Vec<String>,
    /// Surface forms of the 5 lowest-ease cards.
    pub weak_words: Vec<String>,
}

const PERSONA: &str = "\
You are Sensei, an expert offline Japanese language tutor guiding a learner through the JLPT levels in N5 to N1 order.

RULES (must never be broken):
1. You are a TUTOR, not a translator. Never provide a direct Japanese-to-English translation just because the learner asks for one. \
Redirect them to work out meaning from context, examples, or related words you supply.
2. Always annotate kanji with furigana using HTML ruby markup: <ruby>食<rt>た</rt></ruby>べる
3. Explain grammar and concepts in English. Use Japanese for all examples, dialogues, and quiz material.
4. Keep your examples and vocabulary at the learner's JLPT level.
5. Be encouraging, precise, and concise.";

fn mode_instruction(mode: TutorMode, level: &str) -> String {
    match mode {
        TutorMode::Teach => format!(
            "Mode: TEACH\n\
             Introduce ONE grammar point or word class appropriate for {level}.\n\
             Give a brief English explanation, the pattern in Japanese, and a short \
             dialogue example using vocabulary the learner already knows. \
             Finish with one common mistake to avoid."
        ),
        TutorMode::Quiz => format!(
            "Mode: QUIZ\n\
             Generate ONE fill-in-the-blank question using an item from the learner's \
             recently studied vocabulary; fall back to {level} vocabulary when the list \
             is empty. Offer four choices labeled A/B/C/D (one correct, three plausible \
             distractors) and mark which is correct."
        ),
        TutorMode::Explain => format!(
            "Mode: EXPLAIN\n\
             The learner is asking about a specific word, kanji, or grammar point. \
             Explain it deeply: etymology, on- and kun-readings where applicable, and \
             three usage examples with furigana, increasing in complexity and staying \
             near {level}."
        ),
        TutorMode::Correct => "Mode: CORRECT\n\
             The learner has written Japanese for you to check. Identify every particle, \
             conjugation, word-order, and register error. For each: quote the incorrect \
             part, explain why it is wrong, and give the corrected version. Finish with \
             the fully corrected sentence with furigana. Do NOT merely re-translate the \
             sentence into English."
            .to_string(),
        TutorMode::Chat => format!(
            "Mode: CHAT\n\
             Converse freely in Japanese at {level}, keeping your turns short. Offer \
             English explanations only when the learner is clearly stuck."
        ),
    }
}

/// System prompt: persona, then live learner context, then the mode
/// instruction, joined by blank lines.
pub fn build_system_prompt(mode: TutorMode, ctx: &TutorContext) -> String {
    let mut blocks = vec![PERSONA.to_string()];

    let mut context = format!("Learner's current JLPT focus level: {}", ctx.jlpt_level);
    if !ctx.recent_words.is_empty() {
        context.push_str(&format!(
            "\nRecently studied vocabulary (use these where relevant): {}",
            ctx.recent_words.join(", ")
        ));
    }
    if !ctx.weak_words.is_empty() {
        context.push_str(&format!(
            "\nWords the learner finds difficult (reinforce these): {}",
            ctx.weak_words.join(", ")
        ));
    }
    blocks.push(context);

    blocks.push(mode_instruction(mode, &ctx.jlpt_level));
    blocks.join("\n\n")
}

/// One frame relayed to the SSE handler.
#[derive(Debug, Clone, PartialEq)]
pub enum TutorFrame {
    Token(String),
    /// Terminal error code: tutor-unavailable, model-missing:<name>,
    /// response-timed-out.
    Error(String),
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    system: &'a str,
    prompt: &'a str,
    stream: bool,
}

/// One NDJSON line from Ollama's /api/generate stream.
#[derive(Debug, Default, Deserialize, PartialEq)]
pub struct GenerateChunk {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub done: bool,
}

/// Parse one NDJSON line; blank and malformed lines yield None and are
/// skipped without interrupting the stream.
pub fn parse_chunk(line: &[u8]) -> Option<GenerateChunk> {
    let trimmed = std::str::from_utf8(line).ok()?.trim();
    if trimmed.is_empty() {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

#[derive(Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<TagModel>,
}

#[derive(Deserialize)]
struct TagModel {
    #[serde(default)]
    name: String,
}

/// HTTP client for the local Ollama runtime.
#[derive(Clone)]
pub struct TutorClient {
    base_url: String,
    model: String,
    http: reqwest::Client,
}

impl TutorClient {
    pub fn new(settings: &Settings) -> Self {
        Self::with_endpoint(&settings.ollama_base_url, &settings.ollama_model)
    }

    pub fn with_endpoint(base_url: &str, model: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            model: model.to_string(),
            // No overall timeout: generations stream for minutes. Idle
            // detection is enforced per token read instead.
            http: reqwest::Client::builder()
                .connect_timeout(Duration::from_secs(5))
                .build()
                .expect("failed to build ollama client"),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// True when the runtime is reachable and the configured model is
    /// installed (substring match, so quantization suffixes still count).
    pub async fn health(&self) -> bool {
        let url = format!("{}/api/tags", self.base_url);
        let resp = match self.http.get(&url).timeout(HEALTH_TIMEOUT).send().await {
            Ok(r) => r,
            Err(_) => return false,
        };
        if !resp.status().is_success() {
            return false;
        }
        match resp.json::<TagsResponse>().await {
            Ok(tags) => tags.models.iter().any(|m| m.name.contains(&self.model)),
            Err(_) => false,
        }
    }

    /// Open a streaming generation and relay its tokens through a bounded
    /// channel. Dropping the receiver (client disconnect) makes the next
    /// send fail, which aborts the upstream call within one token.
    ///
    /// Failures surface as one `TutorFrame::Error` and then channel close;
    /// the handler appends the terminal [DONE] frame either way.
    pub fn stream_generate(&self, system: String, prompt: String) -> mpsc::Receiver<TutorFrame> {
        let (tx, rx) = mpsc::channel(RELAY_BUFFER);
        let client = self.clone();

        tokio::spawn(async move {
            client.relay(system, prompt, tx).await;
        });

        rx
    }

    async fn relay(&self, system: String, prompt: String, tx: mpsc::Sender<TutorFrame>) {
        let url = format!("{}/api/generate", self.base_url);
        let body = GenerateRequest {
            model: &self.model,
            system: &system,
            prompt: &prompt,
            stream: true,
        };

        let resp = match self.http.post(&url).json(&body).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "ollama unreachable");
                let _ = tx.send(TutorFrame::Error("tutor-unavailable".into())).await;
                return;
            }
        };

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            let _ = tx
                .send(TutorFrame::Error(format!("model-missing:{}", self.model)))
                .await;
            return;
        }
        if !resp.status().is_success() {
            warn!(status = %resp.status(), "ollama rejected generation");
            let _ = tx.send(TutorFrame::Error("tutor-unavailable".into())).await;
            return;
        }

        let mut stream = resp.bytes_stream();
        let mut buf: Vec<u8> = Vec::new();

        loop {
            let chunk = match tokio::time::timeout(TOKEN_TIMEOUT, stream.next()).await {
                Err(_) => {
                    let _ = tx
                        .send(TutorFrame::Error("response-timed-out".into()))
                        .await;
                    return;
                }
                Ok(None) => break,
                Ok(Some(Err(e))) => {
                    warn!(error = %e, "ollama stream interrupted");
                    break;
                }
                Ok(Some(Ok(bytes))) => bytes,
            };

            buf.extend_from_slice(&chunk);
            while let Some(pos) = buf.iter().position(|&b| b == b'\n') {
                let line: Vec<u8> = buf.drain(..=pos).collect();
                let Some(parsed) = parse_chunk(&line) else {
                    continue;
                };
                if !parsed.response.is_empty()
                    && tx.send(TutorFrame::Token(parsed.response)).await.is_err()
                {
                    // Client went away; dropping `stream` cancels upstream.
                    debug!("tutor client disconnected, aborting generation");
                    return;
                }
                if parsed.done {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_is_persona_context_mode() {
        let ctx = TutorContext {
            jlpt_level: "N4".into(),
            recent_words: vec!["食べる".into(), "水".into()],
            weak_words: vec!["難しい".into()],
        };
        let prompt = build_system_prompt(TutorMode::Quiz, &ctx);

        let persona_at = prompt.find("You are Sensei").unwrap();
        let context_at = prompt.find("JLPT focus level: N4").unwrap();
        let mode_at = prompt.find("Mode: QUIZ").unwrap();
        assert!(persona_at < context_at && context_at < mode_at);

        assert!(prompt.contains("食べる, 水"));
        assert!(prompt.contains("難しい"));
        assert!(prompt.contains("<ruby>"));
    }

    #[test]
    fn prompt_omits_empty_context_lists() {
        let ctx = TutorContext {
            jlpt_level: "N5".into(),
            ..Default::default()
        };
        let prompt = build_system_prompt(TutorMode::Chat, &ctx);
        assert!(!prompt.contains("Recently studied"));
        assert!(!prompt.contains("finds difficult"));
        assert!(prompt.contains("Mode: CHAT"));
    }

    #[test]
    fn every_mode_names_itself() {
        let ctx = TutorContext {
            jlpt_level: "N3".into(),
            ..Default::default()
        };
        for (mode, tag) in [
            (TutorMode::Teach, "Mode: TEACH"),
            (TutorMode::Quiz, "Mode: QUIZ"),
            (TutorMode::Explain, "Mode: EXPLAIN"),
            (TutorMode::Correct, "Mode: CORRECT"),
            (TutorMode::Chat, "Mode: CHAT"),
        ] {
            assert!(build_system_prompt(mode, &ctx).contains(tag));
        }
    }

    #[test]
    fn mode_deserializes_from_uppercase() {
        let mode: TutorMode = serde_json::from_str("\"EXPLAIN\"").unwrap();
        assert_eq!(mode, TutorMode::Explain);
        assert!(serde_json::from_str::<TutorMode>("\"explain\"").is_err());
    }

    #[test]
    fn parse_chunk_reads_tokens_and_done() {
        let chunk = parse_chunk(r#"{"response":"を","done":false}"#.as_bytes()).unwrap();
        assert_eq!(chunk.response, "を");
        assert!(!chunk.done);

        let last = parse_chunk(r#"{"response":"","done":true}"#.as_bytes()).unwrap();
        assert!(last.done);
    }

    #[test]
    fn parse_chunk_skips_blank_and_malformed_lines() {
        assert_eq!(parse_chunk(b""), None);
        assert_eq!(parse_chunk(b"  \n"), None);
        assert_eq!(parse_chunk(b"{not json"), None);
        assert_eq!(parse_chunk(&[0xff, 0xfe]), None);
    }
}
