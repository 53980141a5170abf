//! External dependency gateways: the Ollama tutor and the Piper synthesizer.

pub mod speech;
pub mod tutor;
