/// Base64 encoded audio bytes, as carried inline in a chat message.
pub type Base64EncodedAudioBytes = String;

/// Format tags accepted by the chat proxy for inline audio.
pub const FORMAT_WAV: &str = "wav";
pub const FORMAT_MP3: &str = "mp3";
pub const FORMAT_WEBM: &str = "webm";
pub const FORMAT_OGG: &str = "ogg";
