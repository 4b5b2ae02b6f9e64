use crate::instruction::{Instruction, InstructionPayload};

/// `translation` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TranslationEvent {
    /// Text recognized from the signer's body language
    text: String,
    /// Confidence of the translation (0-1)
    confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl TranslationEvent {
    pub fn new(text: &str, confidence: f64) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            timestamp: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `gesture_detected` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct GestureDetectedEvent {
    /// Detector output; its shape depends on the detector
    gesture: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl GestureDetectedEvent {
    pub fn new(gesture: serde_json::Value) -> Self {
        Self {
            gesture,
            timestamp: None,
        }
    }

    pub fn gesture(&self) -> &serde_json::Value {
        &self.gesture
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `error` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ErrorEvent {
    message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    error_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl ErrorEvent {
    pub fn new(message: &str) -> Self {
        Self {
            message: message.to_string(),
            error_code: None,
            timestamp: None,
        }
    }

    pub fn with_error_code(mut self, error_code: &str) -> Self {
        self.error_code = Some(error_code.to_string());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn error_code(&self) -> Option<&str> {
        self.error_code.as_deref()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `text_echo` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TextEchoEvent {
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl TextEchoEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            timestamp: None,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `body_instructions` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BodyInstructionsEvent {
    /// The text the instructions were generated from, when the backend
    /// transcribed it itself
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    instructions: Vec<InstructionPayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl BodyInstructionsEvent {
    pub fn new(instructions: Vec<Instruction>) -> Self {
        Self {
            text: None,
            instructions: instructions.into_iter().map(Into::into).collect(),
            timestamp: None,
        }
    }

    pub fn with_text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    /// The instructions with defaults filled in, in arrival order. Not
    /// validated; hand them to a sequencer's `load` for that.
    pub fn sequence(&self) -> Vec<Instruction> {
        self.instructions
            .iter()
            .cloned()
            .enumerate()
            .map(|(position, payload)| payload.into_instruction(position as u32))
            .collect()
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct Transcription {
    text: String,
    confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    language: Option<String>,
}

impl Transcription {
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// `audio_transcription` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioTranscriptionEvent {
    transcription: Transcription,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl AudioTranscriptionEvent {
    pub fn transcription(&self) -> &Transcription {
        &self.transcription
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `confidence_update` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ConfidenceUpdateEvent {
    confidence: f64,
    gesture_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl ConfidenceUpdateEvent {
    pub fn confidence(&self) -> f64 {
        self.confidence
    }

    pub fn gesture_type(&self) -> &str {
        &self.gesture_type
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `system` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SystemEvent {
    message_type: String,
    content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl SystemEvent {
    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}

/// `translation_result` event, the envelope form of a translation. `data`
/// is whatever the translator produced, usually with `text` and
/// `confidence` fields.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TranslationResultEvent {
    data: serde_json::Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
}

impl TranslationResultEvent {
    pub fn new(data: serde_json::Value) -> Self {
        Self {
            data,
            timestamp: None,
        }
    }

    pub fn data(&self) -> &serde_json::Value {
        &self.data
    }

    pub fn text(&self) -> Option<&str> {
        self.data.get("text").and_then(|v| v.as_str())
    }

    pub fn confidence(&self) -> Option<f64> {
        self.data.get("confidence").and_then(|v| v.as_f64())
    }

    pub fn timestamp(&self) -> Option<&str> {
        self.timestamp.as_deref()
    }
}
