pub mod events;
pub mod instruction;
pub mod media;

pub use events::{ClientEvent, MessageKind, ServerEvent};
pub use instruction::{validate, GestureKind, Instruction, InstructionPayload, InvalidSequence};
pub use media::Base64EncodedMedia;
