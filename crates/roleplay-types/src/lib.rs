//now people using the types library can use these types
pub mod audio;
pub mod chat;
mod content;

//re-export types for easier access
pub use chat::{ChatRequest, ChatResponse, Choice, ResponseFormat, Usage};
pub use content::message::*;
pub use content::parts::{ContentPart, InputAudio};
