pub mod client;
pub mod server;

use client::*;
use server::*;

/// Messages this side sends to the translation backend.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ClientEvent {
    #[serde(rename = "text_input")]
    TextInput(TextInputEvent),
    #[serde(rename = "video_frame")]
    VideoFrame(VideoFrameEvent),
    #[serde(rename = "audio_chunk")]
    AudioChunk(AudioChunkEvent),
}

/// Control messages the translation backend sends.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(tag = "type")]
pub enum ServerEvent {
    #[serde(rename = "translation")]
    Translation(TranslationEvent),
    #[serde(rename = "translation_result")]
    TranslationResult(TranslationResultEvent),
    #[serde(rename = "gesture_detected")]
    GestureDetected(GestureDetectedEvent),
    #[serde(rename = "error")]
    Error(ErrorEvent),
    #[serde(rename = "text_echo")]
    TextEcho(TextEchoEvent),
    #[serde(rename = "body_instructions")]
    BodyInstructions(BodyInstructionsEvent),
    #[serde(rename = "audio_transcription")]
    AudioTranscription(AudioTranscriptionEvent),
    #[serde(rename = "confidence_update")]
    ConfidenceUpdate(ConfidenceUpdateEvent),
    #[serde(rename = "system")]
    System(SystemEvent),
}

impl ServerEvent {
    pub fn kind(&self) -> MessageKind {
        match self {
            ServerEvent::Translation(_) => MessageKind::Translation,
            ServerEvent::TranslationResult(_) => MessageKind::TranslationResult,
            ServerEvent::GestureDetected(_) => MessageKind::GestureDetected,
            ServerEvent::Error(_) => MessageKind::Error,
            ServerEvent::TextEcho(_) => MessageKind::TextEcho,
            ServerEvent::BodyInstructions(_) => MessageKind::BodyInstructions,
            ServerEvent::AudioTranscription(_) => MessageKind::AudioTranscription,
            ServerEvent::ConfidenceUpdate(_) => MessageKind::ConfidenceUpdate,
            ServerEvent::System(_) => MessageKind::System,
        }
    }
}

/// The closed set of inbound message kinds, used as the subscription key.
///
/// `Media` stands for opaque binary frames, which carry no JSON tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Translation,
    TranslationResult,
    GestureDetected,
    Error,
    TextEcho,
    BodyInstructions,
    AudioTranscription,
    ConfidenceUpdate,
    System,
    Media,
}

impl MessageKind {
    /// Every kind that arrives as a tagged JSON frame.
    pub const TAGGED: [MessageKind; 9] = [
        MessageKind::Translation,
        MessageKind::TranslationResult,
        MessageKind::GestureDetected,
        MessageKind::Error,
        MessageKind::TextEcho,
        MessageKind::BodyInstructions,
        MessageKind::AudioTranscription,
        MessageKind::ConfidenceUpdate,
        MessageKind::System,
    ];

    /// The wire `type` tag, `None` for binary media.
    pub fn tag(&self) -> Option<&'static str> {
        match self {
            MessageKind::Translation => Some("translation"),
            MessageKind::TranslationResult => Some("translation_result"),
            MessageKind::GestureDetected => Some("gesture_detected"),
            MessageKind::Error => Some("error"),
            MessageKind::TextEcho => Some("text_echo"),
            MessageKind::BodyInstructions => Some("body_instructions"),
            MessageKind::AudioTranscription => Some("audio_transcription"),
            MessageKind::ConfidenceUpdate => Some("confidence_update"),
            MessageKind::System => Some("system"),
            MessageKind::Media => None,
        }
    }

    pub fn from_tag(tag: &str) -> Option<MessageKind> {
        Self::TAGGED
            .into_iter()
            .find(|kind| kind.tag() == Some(tag))
    }
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag().unwrap_or("media"))
    }
}
