use crate::media::{self, Base64EncodedMedia};

/// `text_input` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct TextInputEvent {
    /// Free-form text to translate into gestures
    text: String,
}

impl TextInputEvent {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// `video_frame` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct VideoFrameEvent {
    /// One encoded camera frame
    frame: Base64EncodedMedia,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl VideoFrameEvent {
    pub fn new(frame: &[u8]) -> Self {
        Self {
            frame: media::encode(frame),
            context: None,
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn frame(&self) -> &Base64EncodedMedia {
        &self.frame
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}

/// `audio_chunk` event
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct AudioChunkEvent {
    audio: Base64EncodedMedia,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    context: Option<String>,
}

impl AudioChunkEvent {
    pub fn new(audio: &[u8]) -> Self {
        Self {
            audio: media::encode(audio),
            context: None,
        }
    }

    pub fn with_context(mut self, context: &str) -> Self {
        self.context = Some(context.to_string());
        self
    }

    pub fn audio(&self) -> &Base64EncodedMedia {
        &self.audio
    }

    pub fn context(&self) -> Option<&str> {
        self.context.as_deref()
    }
}
