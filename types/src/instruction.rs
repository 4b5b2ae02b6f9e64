/// Seconds a step lasts when the backend omits `duration`.
pub const DEFAULT_STEP_SECONDS: f64 = 1.0;
/// Intensity used when the backend omits `intensity`.
pub const DEFAULT_INTENSITY: f64 = 1.0;

/// The body region a gesture step animates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(from = "String", into = "String")]
pub enum GestureKind {
    Hand,
    Face,
    Body,
    Pose,
    Other(String),
}

impl GestureKind {
    pub fn as_str(&self) -> &str {
        match self {
            GestureKind::Hand => "hand",
            GestureKind::Face => "face",
            GestureKind::Body => "body",
            GestureKind::Pose => "pose",
            GestureKind::Other(kind) => kind.as_str(),
        }
    }
}

impl From<String> for GestureKind {
    fn from(value: String) -> Self {
        match value.as_str() {
            "hand" => GestureKind::Hand,
            "face" => GestureKind::Face,
            "body" => GestureKind::Body,
            "pose" => GestureKind::Pose,
            _ => GestureKind::Other(value),
        }
    }
}

impl From<GestureKind> for String {
    fn from(value: GestureKind) -> Self {
        value.as_str().to_string()
    }
}

impl std::fmt::Display for GestureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One timed playback step.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Instruction {
    #[serde(rename = "gesture_type")]
    kind: GestureKind,

    /// Human-readable description of the gesture
    description: String,

    /// Seconds the step occupies on the playback timeline
    #[serde(rename = "duration")]
    duration_seconds: f64,

    /// Gesture intensity, usually in 0..=1
    intensity: f64,

    /// Position of the step in its sequence
    #[serde(rename = "sequence_order")]
    order: u32,
}

impl Instruction {
    pub fn new(
        kind: GestureKind,
        description: &str,
        duration_seconds: f64,
        intensity: f64,
        order: u32,
    ) -> Self {
        Self {
            kind,
            description: description.to_string(),
            duration_seconds,
            intensity,
            order,
        }
    }

    pub fn kind(&self) -> &GestureKind {
        &self.kind
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn duration_seconds(&self) -> f64 {
        self.duration_seconds
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn order(&self) -> u32 {
        self.order
    }
}

/// An instruction as the backend sends it, where everything but the kind
/// and description may be missing.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct InstructionPayload {
    gesture_type: GestureKind,
    description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    intensity: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sequence_order: Option<u32>,
}

impl InstructionPayload {
    /// Fills missing fields. A missing order falls back to `position`, the
    /// payload's index in the message it arrived in.
    pub fn into_instruction(self, position: u32) -> Instruction {
        Instruction {
            kind: self.gesture_type,
            description: self.description,
            duration_seconds: self.duration.unwrap_or(DEFAULT_STEP_SECONDS),
            intensity: self.intensity.unwrap_or(DEFAULT_INTENSITY),
            order: self.sequence_order.unwrap_or(position),
        }
    }
}

impl From<Instruction> for InstructionPayload {
    fn from(value: Instruction) -> Self {
        Self {
            gesture_type: value.kind,
            description: value.description,
            duration: Some(value.duration_seconds),
            intensity: Some(value.intensity),
            sequence_order: Some(value.order),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidSequence {
    #[error("sequence contains no instructions")]
    Empty,
    #[error("instruction {order} has a non-positive duration ({duration})")]
    NonPositiveDuration { order: u32, duration: f64 },
    #[error("more than one instruction has order {0}")]
    DuplicateOrder(u32),
}

/// Checks a sequence and returns it sorted by `order`.
///
/// Producers are expected to send unique, increasing orders but nothing
/// relies on that: the result is always re-sorted, and collisions are
/// rejected rather than resolved.
pub fn validate(sequence: Vec<Instruction>) -> Result<Vec<Instruction>, InvalidSequence> {
    if sequence.is_empty() {
        return Err(InvalidSequence::Empty);
    }

    if let Some(bad) = sequence
        .iter()
        .find(|i| i.duration_seconds <= 0.0 || !i.duration_seconds.is_finite())
    {
        return Err(InvalidSequence::NonPositiveDuration {
            order: bad.order,
            duration: bad.duration_seconds,
        });
    }

    let mut sorted = sequence;
    sorted.sort_by_key(|i| i.order);

    if let Some(pair) = sorted.windows(2).find(|pair| pair[0].order == pair[1].order) {
        return Err(InvalidSequence::DuplicateOrder(pair[0].order));
    }

    Ok(sorted)
}
